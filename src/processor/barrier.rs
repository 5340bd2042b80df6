//! Mutex + condition-variable "wait for my turn" utility, keyed on
//! `chunk_index`. Reused by the ordered compressors, the newline indexer,
//! and the ordered result aggregate — anywhere a stage's side effects must
//! land in strictly ascending chunk order even though work itself runs
//! out of order across worker threads.

use std::sync::{Condvar, Mutex};

pub struct OrderedBarrier {
    next: Mutex<u64>,
    cv: Condvar,
}

impl OrderedBarrier {
    pub fn new() -> Self {
        OrderedBarrier {
            next: Mutex::new(0),
            cv: Condvar::new(),
        }
    }

    /// Blocks the calling thread until `chunk_index` is the next one
    /// expected to commit its side effects.
    pub fn wait_until(&self, chunk_index: u64) {
        let mut next = self.next.lock().expect("ordered barrier mutex poisoned");
        while *next != chunk_index {
            next = self.cv.wait(next).expect("ordered barrier mutex poisoned");
        }
    }

    /// Advances the barrier past the current holder's turn and wakes all
    /// waiters. Must be called exactly once after each `wait_until` whose
    /// turn was granted.
    pub fn advance(&self) {
        let mut next = self.next.lock().expect("ordered barrier mutex poisoned");
        *next += 1;
        self.cv.notify_all();
    }
}

impl Default for OrderedBarrier {
    fn default() -> Self {
        Self::new()
    }
}
