//! Shared environment of a compiled morphline.

use std::sync::Arc;

use crate::metrics::MetricsRegistry;
use crate::registry::Registry;

/// What the root does with a runtime fault that escapes the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Return the fault to the host unchanged.
    #[default]
    Propagate,
    /// Log it at `error` and report the record as rejected.
    LogAndReject,
}

/// Settings and services every command of a morphline can reach.
#[derive(Debug, Clone)]
pub struct MorphlineContext {
    metrics: Arc<MetricsRegistry>,
    registry: Arc<Registry>,
    fault_policy: FaultPolicy,
}

impl Default for MorphlineContext {
    fn default() -> Self {
        Self {
            metrics: Arc::new(MetricsRegistry::new()),
            registry: Registry::global(),
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl MorphlineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Use a private builder catalog instead of [`Registry::global`].
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }
}
