//! Runs one kernel invocation on a worker thread under a time budget

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::RegenTicket;
use crate::feature::{FeatureId, FeatureKind};
use crate::kernel::{Artifact, GeometryKernel, KernelError};

/// How often the waiting side re-checks its ticket
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Abandoned calls allowed to keep running before new calls are refused
const MAX_LINGERING_CALLS: usize = 4;

/// Kernel threads that have not returned yet, shared across passes
#[derive(Debug, Clone, Default)]
pub(super) struct WorkerCount(Arc<AtomicUsize>);

impl WorkerCount {
    pub(super) fn running(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) -> WorkerGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        WorkerGuard(Arc::clone(&self.0))
    }
}

struct WorkerGuard(Arc<AtomicUsize>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(super) enum KernelOutcome {
    /// The kernel answered, failed, timed out or panicked
    Finished(Result<Artifact, KernelError>),
    /// The pass was superseded; the answer must be discarded
    Cancelled,
}

pub(super) fn run_kernel(
    kernel: &Arc<dyn GeometryKernel>,
    id: &FeatureId,
    kind: &FeatureKind,
    parents: Vec<Artifact>,
    ticket: &RegenTicket,
    budget: Duration,
    workers: &WorkerCount,
) -> KernelOutcome {
    // Kernels that ignore their token keep running after a timeout
    let lingering = workers.running();
    if lingering >= MAX_LINGERING_CALLS {
        return KernelOutcome::Finished(Err(KernelError::new(format!(
            "{lingering} abandoned kernel calls are still running"
        ))));
    }

    let token = ticket.token();
    let (tx, rx) = mpsc::channel();

    let worker_kernel = Arc::clone(kernel);
    let worker_kind = kind.clone();
    let worker_token = token.clone();
    let guard = workers.enter();
    let spawned = thread::Builder::new()
        .name(format!("rk-kernel-{id}"))
        .spawn(move || {
            let result = worker_kernel.execute(&worker_kind, &parents, &worker_token);
            drop(guard);
            // The receiver is gone once the call was abandoned
            let _ = tx.send(result);
        });
    if let Err(err) = spawned {
        return KernelOutcome::Finished(Err(KernelError::new(format!(
            "failed to start kernel thread: {err}"
        ))));
    }

    let deadline = Instant::now() + budget;
    loop {
        if ticket.is_cancelled() {
            token.abandon();
            return KernelOutcome::Cancelled;
        }
        let now = Instant::now();
        if now >= deadline {
            token.abandon();
            return KernelOutcome::Finished(Err(KernelError::timeout(budget)));
        }

        match rx.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
            Ok(_) if ticket.is_cancelled() => return KernelOutcome::Cancelled,
            Ok(result) => return KernelOutcome::Finished(result),
            Err(RecvTimeoutError::Timeout) => continue,
            // Sender dropped without sending: the kernel panicked
            Err(RecvTimeoutError::Disconnected) => {
                return KernelOutcome::Finished(Err(KernelError::panicked()));
            }
        }
    }
}
