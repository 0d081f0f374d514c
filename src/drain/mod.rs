pub mod batch;
pub mod remote;
pub mod state;

pub use batch::{spawn_batch_drain, BatchDrainLoop, DrainConfig};
pub use remote::{spawn_remote_drain, RemoteDrainLoop};
pub use state::{DrainHandle, DrainState, DrainStatsSnapshot};
