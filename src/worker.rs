//! Worker pool: executes partition-scoped tasks submitted by the session
//! and blocks the submitter until every partition of a task is done
//! (fan-out/fan-in).
//!
//! Jobs run on a plain [`threadpool::ThreadPool`] inside the session's own
//! process: there's no process boundary to cross, so a mapper, reducer, or
//! merge function is just an `Arc<dyn Fn + Send + Sync>` handed straight
//! to the pool, with no serialization step. Each job still only receives
//! a self-contained [`crate::operand::Operand`] and reopens its
//! partitions from the filesystem substrate, so a task never depends on
//! state only reachable through a live handle the submitter happens to
//! be holding.
//!
//! Watchdogging the submitting process's liveness is out of scope here.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};

use crate::error::{Error, Result};

pub struct WorkerPool {
    pool: threadpool::ThreadPool,
}

/// A panic payload carries no `std::error::Error` impl of its own; this
/// wraps its extracted message so it can travel through
/// [`Error::task_failed`] like any other task failure.
#[derive(Debug)]
struct PanicPayload(String);

impl std::fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PanicPayload {}

fn panic_message(payload: Box<dyn Any + Send>) -> Box<dyn std::error::Error + Send + Sync> {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker task panicked with a non-string payload".to_string()
    };
    Box::new(PanicPayload(msg))
}

impl WorkerPool {
    pub fn new(threads: usize) -> WorkerPool {
        WorkerPool {
            pool: threadpool::ThreadPool::new(threads.max(1)),
        }
    }

    /// Submits `job(p)` for every `p` in `0..num_partitions` and blocks
    /// until all have been observed, in partition order. If `job(0)`
    /// fails that error is returned immediately without waiting on the
    /// remaining partitions' outcomes -- the same semantics as awaiting
    /// a list of per-partition futures in ascending index order and
    /// surfacing the first one that errors. Partitions beyond the first
    /// failure keep running in the background; their results are simply
    /// never collected.
    ///
    /// `job` is expected to return `Err` for ordinary failures, but
    /// user-supplied map/reduce/merge closures it calls into are not
    /// required to be panic-free; a panic inside `job(p)` is caught here
    /// and reported as `Error::task_failed(op, p, ...)` rather than
    /// tearing down the worker thread and leaving the submitter to hang
    /// or panic on a closed channel.
    pub fn run_partitioned<T, F>(&self, op: &'static str, num_partitions: u32, job: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(u32) -> Result<T> + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let mut receivers = Vec::with_capacity(num_partitions as usize);
        for p in 0..num_partitions {
            let (tx, rx) = mpsc::channel();
            let job = job.clone();
            self.pool.execute(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(p)));
                let result = outcome.unwrap_or_else(|payload| Err(Error::task_failed(op, p, panic_message(payload))));
                let _ = tx.send(result);
            });
            receivers.push(rx);
        }

        let mut results = Vec::with_capacity(num_partitions as usize);
        for rx in receivers {
            let result = rx
                .recv()
                .expect("worker thread hung up without sending a result");
            results.push(result?);
        }
        Ok(results)
    }
}
