//! Last-request-wins cancellation for regeneration passes
//!
//! A [`RegenCanceller`] owns a generation counter shared by every ticket it
//! issues. Starting a new pass or calling [`RegenCanceller::cancel`] bumps the
//! counter, which invalidates every older ticket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Cloneable handle that supersedes in-flight regeneration passes
#[derive(Debug, Clone, Default)]
pub struct RegenCanceller {
    generation: Arc<AtomicU64>,
}

impl RegenCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever pass is currently running
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Start a new pass, cancelling any older one
    pub fn begin(&self) -> RegenTicket {
        let issued = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RegenTicket {
            generation: Arc::clone(&self.generation),
            issued,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Permission for one regeneration pass to keep writing results
#[derive(Debug, Clone)]
pub struct RegenTicket {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl RegenTicket {
    /// A ticket nobody can cancel
    pub fn detached() -> Self {
        RegenCanceller::new().begin()
    }

    /// True once a newer pass started or the pass was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.issued
    }

    /// Token handed to the kernel for a single invocation
    pub fn token(&self) -> CancelToken {
        CancelToken {
            ticket: self.clone(),
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Polled by kernels during long operations
#[derive(Debug, Clone)]
pub struct CancelToken {
    ticket: RegenTicket,
    abandoned: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that never fires unless abandoned
    pub fn never() -> Self {
        RegenTicket::detached().token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst) || self.ticket.is_cancelled()
    }

    /// Give up on this invocation only (e.g. time budget exhausted)
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ticket_supersedes_old() {
        let canceller = RegenCanceller::new();
        let first = canceller.begin();
        assert!(!first.is_cancelled());

        let second = canceller.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        canceller.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_abandon_is_local_to_token() {
        let ticket = RegenTicket::detached();
        let a = ticket.token();
        let b = ticket.token();
        a.abandon();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!ticket.is_cancelled());
    }

    #[test]
    fn test_clones_share_generation() {
        let canceller = RegenCanceller::new();
        let ticket = canceller.begin();
        let token = ticket.token();
        canceller.clone().cancel();
        assert!(token.is_cancelled());
    }
}
