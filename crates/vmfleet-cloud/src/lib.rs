//! vmfleet cloud execution
//!
//! Provider abstraction plus the concurrent phases of a reconciliation
//! pass: fetching the current fleet, creating and deleting instances, and
//! resizing them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   vmfleet CLI                    │
//! │      (gather / create / destroy / modify)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 vmfleet-cloud                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ FleetFetcher │  │ Orchestrator │  Modify     │
//! │  └──────┬───────┘  └──────┬───────┘  Workflow   │
//! │  ┌──────▼─────────────────▼─────────────────┐   │
//! │  │    trait ProvisioningBackend { ... }      │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ exec helper   │ │   in-memory   │
//! │ (per cloud)   │ │   backend     │
//! └───────────────┘ └───────────────┘
//! ```
//!
//! Reconciliation itself is pure and lives in `vmfleet-core`.

pub mod accumulator;
pub mod backend;
pub mod error;
pub mod fetch;
pub mod fleet;
pub mod limit;
pub mod memory;
pub mod modify;
pub mod orchestrator;

// Re-exports
pub use accumulator::{Accumulator, Outcome};
pub use backend::{Backends, CreateRequest, ProvisioningBackend, Scope, WaitConfig, instance_name};
pub use error::{AggregateError, BackendError, BackendResult, FleetError, Result};
pub use fetch::FleetFetcher;
pub use fleet::{CreateOptions, Fleet, ModifyRequest};
pub use limit::Limiter;
pub use memory::MemoryBackend;
pub use modify::{ModifyMode, ModifyWorkflow, ResizeTarget};
pub use orchestrator::Orchestrator;
