//! Stream state definitions.

use serde::Serialize;

/// Lifecycle of a single polling stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Registered, task not yet polled.
    Created,
    /// Loop is running cycles.
    Running,
    /// Loop exited after cancellation.
    Stopped,
}

impl StreamState {
    /// Check if the stream is still live.
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if the stream has exited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Stopped)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Created => f.write_str("created"),
            StreamState::Running => f.write_str("running"),
            StreamState::Stopped => f.write_str("stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(StreamState::Created.is_live());
        assert!(StreamState::Running.is_live());
        assert!(StreamState::Stopped.is_terminal());
        assert!(!StreamState::Stopped.is_live());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StreamState::Running).unwrap(),
            "\"running\""
        );
    }
}
