//! End-to-end reconciliation passes against the in-memory backend

use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use vmfleet_cloud::{
    Backends, CreateOptions, Fleet, FleetError, MemoryBackend, ModifyMode, ModifyRequest, ResizeTarget,
};
use vmfleet_core::{ClusterSpec, Cloud, ConfigError, Defaults, InstanceRecord, InstanceState, clusters_from_value};

const DEPLOYMENT: &str = "dep";

fn record(id: &str, cluster: &str, group: &str) -> InstanceRecord {
    InstanceRecord {
        id: id.to_string(),
        cloud: Cloud::Aws,
        region: "us-east-1".to_string(),
        zone: "a".to_string(),
        public_ip: String::new(),
        public_hostname: String::new(),
        private_ip: "10.1.0.1".to_string(),
        private_hostname: String::new(),
        ansible_user: "ubuntu".to_string(),
        inventory_groups: BTreeSet::from([cluster.to_string(), group.to_string()]),
        cluster_name: cluster.to_string(),
        group_name: group.to_string(),
        extra_vars: serde_json::Value::Null,
    }
}

fn db_clusters(exact_count: u32) -> Vec<ClusterSpec> {
    clusters_from_value(json!([{
        "cluster_name": "db",
        "copies": 2,
        "cloud": "aws",
        "region": "us-east-1",
        "zone": "a",
        "instance": {"cpu": 4},
        "user": "ubuntu",
        "groups": [{"group_name": "nodes", "exact_count": exact_count, "inventory_groups": ["nodes"]}]
    }]))
    .unwrap()
}

fn defaults() -> Defaults {
    serde_json::from_value(json!({
        "instances": {
            "aws": {
                "4": {"default": "m6i.xlarge"},
                "8": {"default": "m6i.2xlarge"}
            }
        }
    }))
    .unwrap()
}

fn fleet_with(aws: &Arc<MemoryBackend>) -> Fleet {
    Fleet::new(DEPLOYMENT, Backends::new().with(aws.clone()))
}

fn aws() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new(Cloud::Aws).with_regions(["us-east-1", "eu-west-1"]))
}

fn seed_db_scenario(aws: &MemoryBackend) {
    for i in 0..5 {
        aws.seed(DEPLOYMENT, record(&format!("i-0{}", i), "db-0", "nodes"), "m6i.xlarge");
    }
    aws.seed(DEPLOYMENT, record("i-10", "db-1", "nodes"), "m6i.xlarge");
}

fn count_calls(aws: &MemoryBackend, op: &str) -> usize {
    aws.calls().iter().filter(|c| c.starts_with(op)).count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_from_empty_then_idempotent() {
    let aws = aws();
    let fleet = fleet_with(&aws);

    let first = assert_ok!(fleet.create(&db_clusters(3), &defaults(), CreateOptions::default()).await);
    assert_eq!(first.len(), 6);
    assert_eq!(count_calls(&aws, "create"), 6);
    assert!(first.iter().all(|i| !i.private_ip.is_empty()));
    assert!(first.iter().all(|i| i.inventory_groups.contains(&i.cluster_name)));

    aws.clear_calls();
    let second = assert_ok!(fleet.create(&db_clusters(3), &defaults(), CreateOptions::default()).await);
    assert!(aws.calls().is_empty());
    assert_eq!(second.len(), 6);
}

#[tokio::test]
async fn test_copies_scenario_deletes_and_creates() {
    let aws = aws();
    seed_db_scenario(&aws);
    let fleet = fleet_with(&aws);

    let doomed = assert_ok!(fleet.to_be_deleted(&db_clusters(3)).await);
    let ids: Vec<_> = doomed.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["i-03", "i-04"]);
    assert!(aws.calls().is_empty());

    let result = assert_ok!(fleet.create(&db_clusters(3), &defaults(), CreateOptions::default()).await);
    assert_eq!(result.len(), 6);
    assert_eq!(count_calls(&aws, "create"), 2);
    assert_eq!(count_calls(&aws, "delete"), 2);
    assert_eq!(aws.state_of("i-03"), Some(InstanceState::Terminated));
    assert_eq!(aws.state_of("i-04"), Some(InstanceState::Terminated));
    assert_eq!(aws.live_count(), 6);
}

#[tokio::test]
async fn test_preserve_keeps_surplus() {
    let aws = aws();
    seed_db_scenario(&aws);
    let fleet = fleet_with(&aws);

    let options = CreateOptions { preserve: true };
    let result = assert_ok!(fleet.create(&db_clusters(3), &defaults(), options).await);

    assert_eq!(count_calls(&aws, "delete"), 0);
    assert_eq!(count_calls(&aws, "create"), 2);
    assert_eq!(result.len(), 8);
    assert!(result.iter().any(|i| i.id == "i-04"));
    assert_eq!(aws.live_count(), 8);
}

#[tokio::test]
async fn test_partial_failure_then_rerun_converges() {
    let aws = aws();
    let fleet = fleet_with(&aws);
    let clusters = clusters_from_value(json!([{
        "cluster_name": "web",
        "cloud": "aws",
        "region": "us-east-1",
        "zone": "a",
        "instance": {"cpu": 4},
        "groups": [
            {"group_name": "app", "exact_count": 2},
            {"group_name": "lb", "exact_count": 1}
        ]
    }]))
    .unwrap();

    aws.fail("create", "lb");
    let err = fleet.create(&clusters, &defaults(), CreateOptions::default()).await.unwrap_err();
    let FleetError::Aggregate(err) = err else {
        panic!("expected aggregate error, got {err:?}");
    };
    assert_eq!(err.errors.len(), 1);
    assert!(err.errors[0].contains("web-0/lb"));
    // committed creates are not rolled back
    assert_eq!(aws.live_count(), 2);

    aws.clear_failures();
    aws.clear_calls();
    let result = assert_ok!(fleet.create(&clusters, &defaults(), CreateOptions::default()).await);
    assert_eq!(result.len(), 3);
    assert_eq!(aws.calls().len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_stops_before_acting() {
    let aws = aws();
    seed_db_scenario(&aws);
    aws.fail("list", "aws/eu-west-1");
    let fleet = fleet_with(&aws);

    let err = fleet.create(&db_clusters(1), &defaults(), CreateOptions::default()).await.unwrap_err();
    assert!(matches!(err, FleetError::Aggregate(_)));
    assert!(aws.calls().is_empty());
    assert_eq!(aws.live_count(), 6);
}

#[tokio::test]
async fn test_config_error_before_any_call() {
    let aws = aws();
    aws.fail("list", "aws/us-east-1");
    let fleet = fleet_with(&aws);

    let err = fleet.create(&db_clusters(1), &Defaults::default(), CreateOptions::default()).await.unwrap_err();
    assert!(matches!(err, FleetError::Config(_)));
}

#[tokio::test]
async fn test_duplicate_groups_rejected_before_any_call() {
    let aws = aws();
    let fleet = fleet_with(&aws);
    // both clusters fall back to the deployment id for their name
    let unnamed = json!({
        "cloud": "aws", "region": "us-east-1", "zone": "a", "instance": {"cpu": 4},
        "groups": [{"group_name": "nodes", "exact_count": 1}]
    });
    let clusters = clusters_from_value(json!([unnamed.clone(), unnamed])).unwrap();

    let err = fleet.create(&clusters, &defaults(), CreateOptions::default()).await.unwrap_err();
    assert!(matches!(err, FleetError::Config(ConfigError::DuplicateGroup(_))));
    assert!(aws.calls().is_empty());
    assert_eq!(aws.live_count(), 0);
}

#[tokio::test]
async fn test_destroy_removes_everything() {
    let aws = aws();
    seed_db_scenario(&aws);
    let fleet = fleet_with(&aws);

    assert_ok!(fleet.destroy().await);
    assert_eq!(aws.live_count(), 0);
    assert!(fleet.gather().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sequential_modify_pauses_in_order() {
    let aws = Arc::new(MemoryBackend::new(Cloud::Aws).with_latency(Duration::from_secs(1)));
    for id in ["i-3", "i-1", "i-2"] {
        aws.seed(DEPLOYMENT, record(id, "db-0", "nodes"), "m6i.xlarge");
    }
    let fleet = fleet_with(&aws);
    let request = ModifyRequest {
        groups: vec!["nodes".to_string()],
        target: ResizeTarget::new(8),
        mode: ModifyMode::Sequential {
            pause: Duration::from_secs(5),
        },
    };

    let started = tokio::time::Instant::now();
    let resized = assert_ok!(fleet.modify(&request, &defaults()).await);
    let elapsed = started.elapsed();

    // one list, five calls per instance, two pauses
    assert!(elapsed >= Duration::from_secs(1 + 3 * 5 + 2 * 5));
    let ids: Vec<_> = resized.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["i-1", "i-2", "i-3"]);
    assert_eq!(
        aws.calls(),
        vec![
            "stop i-1", "resize i-1", "start i-1", "stop i-2", "resize i-2", "start i-2", "stop i-3",
            "resize i-3", "start i-3",
        ]
    );
    for id in ["i-1", "i-2", "i-3"] {
        assert_eq!(aws.instance_type_of(id).as_deref(), Some("m6i.2xlarge"));
        assert_eq!(aws.state_of(id), Some(InstanceState::Running));
    }
}

#[tokio::test(start_paused = true)]
async fn test_parallel_modify_has_no_pause() {
    let aws = Arc::new(MemoryBackend::new(Cloud::Aws).with_latency(Duration::from_secs(1)));
    for id in ["i-1", "i-2", "i-3"] {
        aws.seed(DEPLOYMENT, record(id, "db-0", "nodes"), "m6i.xlarge");
    }
    let fleet = fleet_with(&aws);
    let request = ModifyRequest {
        groups: vec![],
        target: ResizeTarget::new(8),
        mode: ModifyMode::Parallel,
    };

    let started = tokio::time::Instant::now();
    let resized = assert_ok!(fleet.modify(&request, &defaults()).await);

    assert!(started.elapsed() < Duration::from_secs(1 + 3 * 5));
    assert_eq!(resized.len(), 3);
    assert_eq!(count_calls(&aws, "resize"), 3);
}

#[tokio::test]
async fn test_modify_filters_by_inventory_group() {
    let aws = aws();
    aws.seed(DEPLOYMENT, record("i-1", "db-0", "nodes"), "m6i.xlarge");
    aws.seed(DEPLOYMENT, record("i-2", "web-0", "app"), "m6i.xlarge");
    let fleet = fleet_with(&aws);
    let request = ModifyRequest {
        groups: vec!["app".to_string()],
        target: ResizeTarget::new(8),
        mode: ModifyMode::Parallel,
    };

    let resized = assert_ok!(fleet.modify(&request, &defaults()).await);
    assert_eq!(resized.len(), 1);
    assert_eq!(resized[0].id, "i-2");
    assert_eq!(aws.instance_type_of("i-1").as_deref(), Some("m6i.xlarge"));
}
