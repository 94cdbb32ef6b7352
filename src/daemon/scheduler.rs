//! Cancellable repeating task: run a cycle, wait, repeat.
//!
//! The wait starts only after a cycle returns, so a slow cycle pushes the
//! next one back instead of piling up behind it. Each cycle returns the delay
//! before the next run, which lets the owner re-read its interval every time.
//!
//! Cancellation drops the task's end of a crossbeam channel. The worker's
//! `recv_timeout` then returns `Disconnected` immediately, so a pending wait
//! ends without waiting out the interval. A cycle that is already running is
//! not interrupted; the owner must discard its outcome.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

use crate::core::errors::{HcmError, Result};

/// Handle to a running poll loop. Dropping it cancels the loop.
pub struct PollTask {
    name: String,
    cancel_tx: Option<Sender<()>>,
    cancelled: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    join: Option<thread::JoinHandle<()>>,
}

impl PollTask {
    /// Start `cycle` on a named worker thread. The first run happens at once.
    pub fn spawn<F>(name: impl Into<String>, mut cycle: F) -> Result<Self>
    where
        F: FnMut() -> Duration + Send + 'static,
    {
        let name = name.into();
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let cycles = Arc::new(AtomicU64::new(0));

        let worker_cancelled = Arc::clone(&cancelled);
        let worker_cycles = Arc::clone(&cycles);
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                loop {
                    if worker_cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    let delay = cycle();
                    worker_cycles.fetch_add(1, Ordering::Relaxed);
                    match cancel_rx.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|source| HcmError::Runtime {
                details: format!("failed to spawn poll thread {name}: {source}"),
            })?;

        Ok(Self {
            name,
            cancel_tx: Some(cancel_tx),
            cancelled,
            cycles,
            join: Some(join),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop scheduling further cycles. Does not wait for an in-flight cycle.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.cancel_tx.take();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Number of cycles that have completed.
    #[must_use]
    pub fn completed_cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Whether the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(thread::JoinHandle::is_finished)
    }

    /// Cancel and block until the worker exits (including any in-flight cycle).
    pub fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.join.take()
            && handle.join().is_err()
        {
            eprintln!("[HCM-SCHED] poll thread {} panicked", self.name);
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
