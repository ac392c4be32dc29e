//! Priority lock.
//!
//! A single flag broadcast over a `watch` channel. Every ordinary caller
//! blocked on the lock holds its own receiver, so one release wakes all of
//! them; each re-checks the flag rather than trusting the wake-up.

use tokio::sync::watch;

#[derive(Debug)]
pub(crate) struct PriorityLock {
    locked: watch::Sender<bool>,
}

impl PriorityLock {
    pub(crate) fn new() -> Self {
        let (locked, _rx) = watch::channel(false);
        Self { locked }
    }

    /// Take the lock. Returns `false` if it was already held (no-op).
    pub(crate) fn acquire(&self) -> bool {
        self.locked.send_if_modified(|locked| {
            if *locked {
                false
            } else {
                *locked = true;
                true
            }
        })
    }

    /// Clear the lock and wake every waiter. Returns `false` if it was not held.
    pub(crate) fn release(&self) -> bool {
        self.locked.send_if_modified(|locked| {
            if *locked {
                *locked = false;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn is_locked(&self) -> bool {
        *self.locked.borrow()
    }

    /// Suspend until the lock is observed clear. Returns whether it had to wait.
    pub(crate) async fn wait_until_released(&self) -> bool {
        let mut rx = self.locked.subscribe();
        if !*rx.borrow_and_update() {
            return false;
        }
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|locked| !*locked).await;
        true
    }
}
