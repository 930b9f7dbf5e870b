//! Overlay scope configuration.

use std::sync::Arc;

use crate::id::{IdGenerator, SequentialGenerator, UuidGenerator};

/// Default id of the container produced by the render layer.
pub const DEFAULT_CONTAINER_ID: &str = "overlay-root";

/// How a scope generates overlay ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// Random v4 UUIDs (default).
    #[default]
    Uuid,
    /// `{prefix}-1`, `{prefix}-2`, ...
    Sequential { prefix: String },
}

impl IdStrategy {
    /// Build the generator for this strategy.
    pub fn generator(&self) -> Arc<dyn IdGenerator> {
        match self {
            Self::Uuid => Arc::new(UuidGenerator),
            Self::Sequential { prefix } => Arc::new(SequentialGenerator::new(prefix.clone())),
        }
    }
}

/// Per-scope configuration.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Display name of the scope, used in log messages.
    pub name: &'static str,

    /// Id given to the container element produced by the render layer.
    pub container_id: String,

    /// Id generation strategy.
    pub id_strategy: IdStrategy,

    /// Log close/resolve calls that arrive after the overlay is gone.
    /// Such calls are always absorbed; this only controls the debug log.
    pub log_stale_calls: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            name: "overlay",
            container_id: DEFAULT_CONTAINER_ID.to_string(),
            id_strategy: IdStrategy::default(),
            log_stale_calls: cfg!(debug_assertions),
        }
    }
}

impl OverlayConfig {
    /// Create a new config with the given scope name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Set the container id.
    pub fn container_id(mut self, id: impl Into<String>) -> Self {
        self.container_id = id.into();
        self
    }

    /// Generate sequential ids with the given prefix.
    pub fn sequential_ids(mut self, prefix: impl Into<String>) -> Self {
        self.id_strategy = IdStrategy::Sequential {
            prefix: prefix.into(),
        };
        self
    }

    /// Enable or disable logging of stale close/resolve calls.
    pub fn log_stale_calls(mut self, enabled: bool) -> Self {
        self.log_stale_calls = enabled;
        self
    }
}
