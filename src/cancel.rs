//! Cooperative cancellation for organize runs.
//!
//! A run polls its token at fixed checkpoints (before each file and before
//! each directory). Setting the token never interrupts a move in progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared one-way stop flag.
///
/// Clones observe the same flag, so the CLI's ctrl-c handler and the worker
/// thread can each hold one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation (idempotent).
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
