//! The thread-safe, optionally ordered result aggregate (§4.8).
//!
//! Two flavors share one shape: a mutex-guarded buffer plus a condition
//! variable, a `done` flag, and a blocking iterator that yields whatever has
//! accumulated so far and ends once the aggregate is both drained and
//! marked done.
//!
//! - [`CountResult`] — a scalar `u64` sum (`count matches` / `count lines`).
//! - [`ContainerResult<T>`] — a `Vec<T>` that appends each worker's partial
//!   vector. In its *ordered* flavor, partials that arrive out of
//!   `chunk_index` order are buffered in a side table and drained once the
//!   expected index catches up — this is what lets the CLI print matches in
//!   file order regardless of which worker thread found them.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

/// The typed output of searching one chunk (§3 `PartialResult`).
#[derive(Debug, Clone, PartialEq)]
pub enum PartialResult {
    Count(u64),
    MatchByteOffsets(Vec<u64>),
    LineByteOffsets(Vec<u64>),
    LineIndices(Vec<u64>),
    Lines(Vec<String>),
}

impl PartialResult {
    /// Unwraps the scalar count, for the two modes that produce one.
    pub fn into_count(self) -> u64 {
        match self {
            PartialResult::Count(n) => n,
            other => panic!("expected PartialResult::Count, got {other:?}"),
        }
    }
}

/// A scalar `u64` accumulator for `count matches` / `count lines` mode.
pub struct CountResult {
    state: Mutex<CountState>,
    cv: Condvar,
}

struct CountState {
    sum: u64,
    deltas: Vec<u64>,
    yielded: usize,
    done: bool,
}

impl CountResult {
    pub fn new() -> Self {
        CountResult {
            state: Mutex::new(CountState { sum: 0, deltas: Vec::new(), yielded: 0, done: false }),
            cv: Condvar::new(),
        }
    }

    pub fn add(&self, delta: u64) {
        let mut s = self.state.lock().expect("count result mutex poisoned");
        s.sum += delta;
        s.deltas.push(delta);
        self.cv.notify_all();
    }

    pub fn done(&self) {
        let mut s = self.state.lock().expect("count result mutex poisoned");
        s.done = true;
        self.cv.notify_all();
    }

    pub fn total(&self) -> u64 {
        self.state.lock().expect("count result mutex poisoned").sum
    }

    /// Blocks until at least one more delta has arrived or the aggregate is
    /// done with nothing left to yield.
    pub fn next_blocking(&self) -> Option<u64> {
        let mut s = self.state.lock().expect("count result mutex poisoned");
        loop {
            if s.yielded < s.deltas.len() {
                let v = s.deltas[s.yielded];
                s.yielded += 1;
                return Some(v);
            }
            if s.done {
                return None;
            }
            s = self.cv.wait(s).expect("count result mutex poisoned");
        }
    }
}

impl Default for CountResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking iterator over a [`CountResult`]'s deltas, as they are added.
pub struct CountIter<'a>(&'a CountResult);

impl Iterator for CountIter<'_> {
    type Item = u64;
    fn next(&mut self) -> Option<u64> {
        self.0.next_blocking()
    }
}

impl CountResult {
    pub fn iter(&self) -> CountIter<'_> {
        CountIter(self)
    }
}

/// A `Vec<T>` accumulator for the four non-scalar search modes.
pub struct ContainerResult<T> {
    ordered: bool,
    state: Mutex<ContainerState<T>>,
    cv: Condvar,
}

struct ContainerState<T> {
    committed: Vec<T>,
    yielded: usize,
    pending: HashMap<u64, Vec<T>>,
    next_chunk_index: u64,
    done: bool,
}

impl<T> ContainerResult<T> {
    pub fn new(ordered: bool) -> Self {
        ContainerResult {
            ordered,
            state: Mutex::new(ContainerState {
                committed: Vec::new(),
                yielded: 0,
                pending: HashMap::new(),
                next_chunk_index: 0,
                done: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Appends a partial without any ordering requirement.
    pub fn add(&self, partial: Vec<T>) {
        let mut s = self.state.lock().expect("container result mutex poisoned");
        s.committed.extend(partial);
        self.cv.notify_all();
    }

    /// Appends a partial, buffering it if `chunk_index` is not yet next in
    /// line; drains the buffer forward as far as it now can.
    pub fn add_ordered(&self, partial: Vec<T>, chunk_index: u64) {
        let mut s = self.state.lock().expect("container result mutex poisoned");
        if !self.ordered {
            s.committed.extend(partial);
            self.cv.notify_all();
            return;
        }
        if chunk_index == s.next_chunk_index {
            s.committed.extend(partial);
            s.next_chunk_index += 1;
            while let Some(next) = s.pending.remove(&s.next_chunk_index) {
                s.committed.extend(next);
                s.next_chunk_index += 1;
            }
        } else {
            s.pending.insert(chunk_index, partial);
        }
        self.cv.notify_all();
    }

    pub fn done(&self) {
        let mut s = self.state.lock().expect("container result mutex poisoned");
        s.done = true;
        self.cv.notify_all();
    }

    /// Number of items committed (in order) so far.
    pub fn size(&self) -> usize {
        self.state.lock().expect("container result mutex poisoned").committed.len()
    }

    pub fn next_blocking(&self) -> Option<T>
    where
        T: Clone,
    {
        let mut s = self.state.lock().expect("container result mutex poisoned");
        loop {
            if s.yielded < s.committed.len() {
                let v = s.committed[s.yielded].clone();
                s.yielded += 1;
                return Some(v);
            }
            if s.done {
                return None;
            }
            s = self.cv.wait(s).expect("container result mutex poisoned");
        }
    }

    /// Consumes the aggregate, returning everything committed in order.
    /// Callers should ensure `done()` has been observed (e.g. by joining the
    /// executor) before calling this, or the result may be a truncated prefix.
    pub fn into_vec(self) -> Vec<T> {
        self.state.into_inner().expect("container result mutex poisoned").committed
    }
}

/// Blocking iterator over a [`ContainerResult`]'s committed items, in
/// `chunk_index` order when the aggregate is ordered.
pub struct ContainerIter<'a, T>(&'a ContainerResult<T>);

impl<T: Clone> Iterator for ContainerIter<'_, T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        self.0.next_blocking()
    }
}

impl<T> ContainerResult<T> {
    pub fn iter(&self) -> ContainerIter<'_, T> {
        ContainerIter(self)
    }
}
