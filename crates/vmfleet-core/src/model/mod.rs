//! Data model
//!
//! Declarations (clusters and groups), their resolved form, sizing defaults
//! and the instance snapshots reported by providers.

mod declaration;
mod defaults;
mod group;
mod instance;
mod volume;

// Re-exports
pub use declaration::*;
pub use defaults::*;
pub use group::*;
pub use instance::*;
pub use volume::*;
