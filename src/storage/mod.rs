pub mod rotating;
pub mod traits;

pub use rotating::{RotatingWriter, RotationPolicy, RotationUnit, WriterStatsSnapshot};
pub use traits::{AppendReport, RecordSink, StorageError};
