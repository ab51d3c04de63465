//! Desired-vs-current diff
//!
//! Pure function over the declared clusters and a fetched instance set. It
//! never talks to a provider; acting on the result is the caller's job.

use crate::error::{ConfigError, Result};
use crate::merge::merge_group;
use crate::model::{ClusterSpec, GroupSpec, InstanceRecord};
use std::collections::HashSet;
use std::fmt;

/// Outcome for a single resolved group
#[derive(Debug, Clone)]
pub struct GroupDiff {
    pub group: GroupSpec,
    /// Existing instances that stay
    pub kept: Vec<InstanceRecord>,
    /// Existing instances beyond `exact_count`
    pub surplus: Vec<InstanceRecord>,
    /// Instances still to create
    pub deficit: u32,
}

/// Partition of the current fleet against the declaration.
///
/// Every fetched instance lands in exactly one of `kept` or `surplus`.
/// Instances that match no declared group are surplus.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub groups: Vec<GroupDiff>,
    pub unmatched: Vec<InstanceRecord>,
}

impl Reconciliation {
    pub fn kept(&self) -> Vec<InstanceRecord> {
        self.groups.iter().flat_map(|g| g.kept.iter().cloned()).collect()
    }

    pub fn surplus(&self) -> Vec<InstanceRecord> {
        self.groups
            .iter()
            .flat_map(|g| g.surplus.iter().cloned())
            .chain(self.unmatched.iter().cloned())
            .collect()
    }

    /// Groups that need new instances, with how many.
    pub fn to_create(&self) -> Vec<(GroupSpec, u32)> {
        self.groups
            .iter()
            .filter(|g| g.deficit > 0)
            .map(|g| (g.group.clone(), g.deficit))
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.groups.iter().map(|g| g.deficit as usize).sum(),
            delete: self.groups.iter().map(|g| g.surplus.len()).sum::<usize>()
                + self.unmatched.len(),
            kept: self.groups.iter().map(|g| g.kept.len()).sum(),
        }
    }

    pub fn has_changes(&self) -> bool {
        let summary = self.summary();
        summary.create > 0 || summary.delete > 0
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub kept: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to delete, {} kept",
            self.create, self.delete, self.kept
        )
    }
}

/// Expand every cluster copy into resolved groups, in declaration order.
///
/// Two groups resolving to the same cluster/group/region/zone would compete
/// for the same instances, so that is a configuration error.
pub fn resolve_groups(deployment_id: &str, clusters: &[ClusterSpec]) -> Result<Vec<GroupSpec>> {
    let mut groups = Vec::new();
    let mut seen = HashSet::new();
    for cluster in clusters {
        cluster.validate(deployment_id)?;
        for cluster_name in cluster.copy_names(deployment_id) {
            for group in &cluster.groups {
                let merged = merge_group(&cluster.shared, group)?;
                let spec = GroupSpec::from_declaration(&cluster_name, &merged)?;
                let key = spec.key();
                if !seen.insert(key.clone()) {
                    return Err(ConfigError::DuplicateGroup(key.to_string()));
                }
                groups.push(spec);
            }
        }
    }
    Ok(groups)
}

/// Diff `current` against the declared clusters.
///
/// `current` is expected in the fetcher's id order; within a group the
/// first `exact_count` instances in that order are kept.
pub fn reconcile(
    deployment_id: &str,
    clusters: &[ClusterSpec],
    current: &[InstanceRecord],
) -> Result<Reconciliation> {
    let groups = resolve_groups(deployment_id, clusters)?;

    let mut remaining: Vec<InstanceRecord> = current.to_vec();
    let mut diffs = Vec::with_capacity(groups.len());

    for group in groups {
        let key = group.key();
        let (mut members, rest): (Vec<_>, Vec<_>) =
            remaining.into_iter().partition(|i| i.matches(&key));
        remaining = rest;

        let desired = group.exact_count as usize;
        let (kept, surplus, deficit) = if members.len() > desired {
            let surplus = members.split_off(desired);
            (members, surplus, 0)
        } else {
            let deficit = (desired - members.len()) as u32;
            (members, Vec::new(), deficit)
        };

        tracing::debug!(
            group = %key,
            kept = kept.len(),
            surplus = surplus.len(),
            deficit,
            "reconciled group"
        );

        diffs.push(GroupDiff {
            group,
            kept,
            surplus,
            deficit,
        });
    }

    if !remaining.is_empty() {
        tracing::debug!(count = remaining.len(), "instances match no declared group");
    }

    Ok(Reconciliation {
        groups: diffs,
        unmatched: remaining,
    })
}
