//! Worker-thread pool for CPU-bound and short blocking work
//!
//! # Features
//! - Fixed or cached (elastically growing) worker sets
//! - Bounded FIFO submission queue with backpressure
//! - Per-task result handles with blocking and bounded waits
//! - Panic capture into task results
//! - Idle-worker reclamation back to the initial size in cached mode
//! - Counter-based metrics sampling

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;

pub use errors::{ConfigurationRejected, TaskError};
pub use handle::TaskHandle;
pub use model::{PoolMetrics, PoolMode};
pub use pool::{Config, ThreadPool};
pub use result::TaskResult;
