//! Session configuration.

use serde::{Deserialize, Serialize};

/// How the transaction manager runs commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Everything runs on the calling thread.
    #[default]
    Sync,
    /// Kernel construction runs on the worker pool under a read lock.
    /// Bookkeeping stays serialized.
    Pooled,
}

/// Configuration for opening a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of commands kept on the undo stack.
    pub history_limit: usize,

    /// Whether names are resolved through the shifting-id alias table.
    pub shifting_id: bool,

    /// Default execution mode for submitted commands.
    pub execution_mode: ExecutionMode,

    /// Number of worker threads for pooled execution.
    pub worker_threads: usize,

    /// Number of change events kept for polling.
    pub feed_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: 100,
            shifting_id: false,
            execution_mode: ExecutionMode::Sync,
            worker_threads: 4,
            feed_history: 10_000,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the undo history limit.
    #[must_use]
    pub const fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Sets whether shifting-id resolution is active from the start.
    #[must_use]
    pub const fn shifting_id(mut self, value: bool) -> Self {
        self.shifting_id = value;
        self
    }

    /// Sets the default execution mode.
    #[must_use]
    pub const fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Sets the worker pool size. Zero lets rayon decide.
    #[must_use]
    pub const fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Sets how many change events are kept for polling.
    #[must_use]
    pub const fn feed_history(mut self, events: usize) -> Self {
        self.feed_history = events;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.history_limit, 100);
        assert!(!config.shifting_id);
        assert_eq!(config.execution_mode, ExecutionMode::Sync);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .history_limit(3)
            .execution_mode(ExecutionMode::Pooled)
            .worker_threads(2);

        assert_eq!(config.history_limit, 3);
        assert_eq!(config.execution_mode, ExecutionMode::Pooled);
        assert_eq!(config.worker_threads, 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"history_limit": 5, "execution_mode": "pooled"}"#).unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.execution_mode, ExecutionMode::Pooled);
        assert_eq!(config.feed_history, 10_000);
    }
}
