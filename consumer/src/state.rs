//! Consumer state definitions.

/// Subscription lifecycle of the package consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Not yet subscribed.
    Starting,
    /// Subscribed, no record received yet.
    Subscribed,
    /// At least one poll returned a record.
    Consuming,
    /// Subscription released.
    Closed,
}

impl ConsumerState {
    /// Check if the consumer holds a subscription.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, ConsumerState::Subscribed | ConsumerState::Consuming)
    }

    /// Check if the consumer has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsumerState::Closed)
    }
}
