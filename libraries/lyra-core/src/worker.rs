//! Named threads that can be joined with a deadline
//!
//! Each thread owns the sending half of a channel. The sender drops when the
//! thread's closure returns or unwinds, which wakes a waiting joiner through
//! `recv_timeout` instead of polling `is_finished`.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::io;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use thiserror::Error;

/// Why a bounded join gave up
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("thread did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("thread panicked")]
    Panicked,

    /// The caller is the thread being joined
    #[error("thread cannot join itself")]
    OwnThread,
}

/// A spawned thread plus its completion signal
///
/// Dropping it without joining detaches the thread.
#[derive(Debug)]
pub struct WorkerThread<T> {
    handle: JoinHandle<T>,
    done: Receiver<()>,
}

impl<T: Send + 'static> WorkerThread<T> {
    /// Spawn `f` on a thread called `name`
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be created
    pub fn spawn<F>(name: impl Into<String>, f: F) -> io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (signal, done) = bounded::<()>(1);
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            let _signal = signal;
            f()
        })?;
        Ok(Self { handle, done })
    }
}

impl<T> WorkerThread<T> {
    pub fn id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    /// True when called from the worker thread itself
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait at most `timeout` for the thread, then collect its result
    ///
    /// On `TimedOut` and `OwnThread` the thread is detached.
    ///
    /// # Errors
    /// See [`JoinError`]
    pub fn join_timeout(self, timeout: Duration) -> Result<T, JoinError> {
        if self.is_current() {
            return Err(JoinError::OwnThread);
        }
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => Err(JoinError::TimedOut(timeout)),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.handle.join().map_err(|_| JoinError::Panicked)
            }
        }
    }
}
