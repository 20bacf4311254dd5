use std::{cell::Cell, rc::Rc};

use solana_program::msg;

use crate::error::RaffleError;

/// Exclusive execution flag around fund-moving operations.
///
/// Clones share the same flag, so a collaborator holding a clone observes
/// (and is refused) any attempt to enter while an operation is running.
#[derive(Clone, Debug, Default)]
pub struct ReentrancyLock {
    locked: Rc<Cell<bool>>,
}

impl ReentrancyLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> Result<LockGuard, RaffleError> {
        if self.locked.replace(true) {
            msg!("Reentrant call rejected");
            return Err(RaffleError::Reentrancy);
        }
        Ok(LockGuard {
            locked: Rc::clone(&self.locked),
        })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }
}

/// Releases the lock when dropped, on every exit path
#[derive(Debug)]
pub struct LockGuard {
    locked: Rc<Cell<bool>>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locked.set(false);
    }
}
