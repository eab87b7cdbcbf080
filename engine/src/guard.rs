//! Re-entrancy guard
//!
//! One flag per engine. Entering sets it, dropping the returned token clears
//! it, so an operation that fails with `?` still releases the guard.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

/// Held for the duration of one guarded operation
#[must_use]
#[derive(Debug)]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> EngineResult<Entered<'_>> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::ReentrantCall)?;
        Ok(Entered { guard: self })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}
