use super::{
    errors::TaskError,
    result::TaskResult,
};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};

/// A queued unit of work. Built by `submit`, consumed exactly once by a
/// worker; the closure owns the sending half of the result channel.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a submitted task's eventual value or failure.
///
/// The handle resolves exactly once. If the pool is torn down before a
/// worker reaches the task, the handle resolves to
/// [`TaskError::PoolStopped`].
pub struct TaskHandle<T> {
    receiver: Receiver<TaskResult<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(receiver: Receiver<TaskResult<T>>) -> Self {
        Self { receiver }
    }

    /// Block until the task resolves.
    #[inline]
    pub fn join(self) -> TaskResult<T> {
        self.receiver.recv().unwrap_or(Err(TaskError::PoolStopped))
    }

    /// Block until the task resolves or `timeout` elapses.
    ///
    /// Timing out does not affect the task; it still runs to completion
    /// on its worker.
    pub fn join_timeout(self, timeout: Duration) -> TaskResult<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(TaskError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::PoolStopped),
        }
    }

    /// Poll for the outcome without blocking. Yields the outcome at most
    /// once; `None` while the task is still pending.
    pub fn try_join(&self) -> Option<TaskResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskError::PoolStopped)),
        }
    }
}
