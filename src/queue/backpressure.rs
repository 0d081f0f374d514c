use crate::config::types::{BackpressureStrategy, QueueConfig};

/// Decides the shape of the buffered queue from configuration.
///
/// Without a capacity the queue is unbounded and enqueue never waits. With a
/// capacity, the strategy decides whether producers wait for space or are
/// turned away.
#[derive(Debug, Clone, Copy)]
pub struct BackpressureHandler {
    strategy: BackpressureStrategy,
    capacity: Option<usize>,
}

impl BackpressureHandler {
    pub fn new(strategy: BackpressureStrategy, capacity: Option<usize>) -> Self {
        Self {
            strategy,
            // tokio panics on a zero-sized channel
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(BackpressureStrategy::Block, None)
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.backpressure, config.capacity)
    }

    /// Channel buffer size, or `None` for an unbounded channel
    pub fn channel_buffer_size(&self) -> Option<usize> {
        self.capacity
    }

    pub fn strategy(&self) -> BackpressureStrategy {
        self.strategy
    }

    pub fn is_bounded(&self) -> bool {
        self.capacity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queue_is_unbounded() {
        let handler = BackpressureHandler::from_config(&QueueConfig::default());
        assert!(!handler.is_bounded());
        assert_eq!(handler.channel_buffer_size(), None);
        assert_eq!(handler.strategy(), BackpressureStrategy::Block);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let handler = BackpressureHandler::new(BackpressureStrategy::Reject, Some(0));
        assert_eq!(handler.channel_buffer_size(), Some(1));
    }
}
