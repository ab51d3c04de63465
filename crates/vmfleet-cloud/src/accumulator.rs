//! Per-phase result collection
//!
//! Fan-out tasks share one [`Accumulator`] through an `Arc`. Each list has
//! its own lock, held only for the duration of an append; no task awaits
//! while holding it.

use crate::error::AggregateError;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use vmfleet_core::InstanceRecord;

#[derive(Debug, Default)]
pub struct Accumulator {
    instances: Mutex<Vec<InstanceRecord>>,
    errors: Mutex<Vec<String>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn push_instance(&self, instance: InstanceRecord) {
        lock(&self.instances).push(instance);
    }

    pub fn push_instances(&self, instances: Vec<InstanceRecord>) {
        if instances.is_empty() {
            return;
        }
        lock(&self.instances).extend(instances);
    }

    pub fn push_error(&self, error: impl Display) {
        let message = error.to_string();
        tracing::debug!(%message, "Recording error");
        lock(&self.errors).push(message);
    }

    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }

    /// Join barrier: wait for every task in the set. A task that panicked
    /// or was cancelled is recorded as an error like any other failure.
    pub async fn join_all(&self, mut tasks: JoinSet<()>) {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                self.push_error(format!("task failed to complete: {}", e));
            }
        }
    }

    /// Take the collected results.
    pub fn finish(self) -> Outcome {
        Outcome {
            instances: self
                .instances
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            errors: self.errors.into_inner().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Take the collected results once every task holding a clone is done.
    pub fn into_outcome(self: Arc<Self>) -> Outcome {
        match Arc::try_unwrap(self) {
            Ok(acc) => acc.finish(),
            // a detached task still holds a clone; snapshot what is there
            Err(shared) => Outcome {
                instances: lock(&shared.instances).clone(),
                errors: lock(&shared.errors).clone(),
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Joined result of one phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub instances: Vec<InstanceRecord>,
    pub errors: Vec<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Append another phase's results after this one's.
    pub fn absorb(&mut self, other: Outcome) {
        self.instances.extend(other.instances);
        self.errors.extend(other.errors);
    }

    pub fn into_result(self) -> Result<Vec<InstanceRecord>, AggregateError> {
        if self.errors.is_empty() {
            Ok(self.instances)
        } else {
            Err(AggregateError::new(self.errors))
        }
    }
}
