pub mod backpressure;
pub mod buffered;

pub use backpressure::BackpressureHandler;
pub use buffered::{
    buffered_queue, BufferedQueue, QueueError, QueueReceiver, QueueStatsSnapshot, WaitOutcome,
};
