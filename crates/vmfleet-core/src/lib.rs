//! vmfleet core
//!
//! Everything in this crate is pure: loading declarations, merging the
//! cluster/group inheritance chain, sizing, and diffing a fetched fleet
//! against the declaration. Provider access lives in `vmfleet-cloud`.

pub mod error;
pub mod loader;
pub mod merge;
pub mod model;
pub mod reconcile;

pub use error::{ConfigError, Result};
pub use loader::{Source, load_defaults, load_deployment};
pub use merge::{merge, merge_group};
pub use model::*;
pub use reconcile::{GroupDiff, PlanSummary, Reconciliation, reconcile, resolve_groups};
