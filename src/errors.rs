use thiserror::Error;

/// Failure outcomes delivered through a task's result handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task queue stayed full past the submission timeout")]
    QueueFull,
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("pool is not running")]
    PoolStopped,
    #[error("timed out waiting for the task result")]
    Timeout,
}

/// A configuration change was attempted on a running pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pool configuration cannot change after start")]
pub struct ConfigurationRejected;
