//! The executor (C8): spawns `num_threads` workers, each independently
//! driving `read -> process -> search -> add` until the provider is
//! exhausted, a worker errors, or `force_stop()` is called. No task
//! stealing; ordering is carried entirely by the `chunk_index` the reader
//! attaches to every chunk.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::processor::InplaceProcessor;
use crate::provider::DataProvider;
use crate::result::{ContainerResult, CountResult};
use crate::searcher::{SearchMode, Searcher};

/// The aggregate shape a [`Searcher`]'s mode produces, wrapped so the
/// executor can commit a worker's [`crate::result::PartialResult`] without
/// the caller needing to match on it first.
pub enum SearchResults {
    Count(Arc<CountResult>),
    Offsets(Arc<ContainerResult<u64>>),
    Lines(Arc<ContainerResult<String>>),
}

impl SearchResults {
    fn for_mode(mode: SearchMode, ordered: bool) -> SearchResults {
        match mode {
            SearchMode::CountMatches | SearchMode::CountLines => {
                SearchResults::Count(Arc::new(CountResult::new()))
            }
            SearchMode::MatchOffsets | SearchMode::LineOffsets | SearchMode::LineIndices => {
                SearchResults::Offsets(Arc::new(ContainerResult::new(ordered)))
            }
            SearchMode::Lines => SearchResults::Lines(Arc::new(ContainerResult::new(ordered))),
        }
    }

    fn commit(&self, partial: crate::result::PartialResult, chunk_index: u64) {
        use crate::result::PartialResult as P;
        match (self, partial) {
            (SearchResults::Count(r), P::Count(n)) => r.add(n),
            (SearchResults::Offsets(r), P::MatchByteOffsets(v)) => r.add_ordered(v, chunk_index),
            (SearchResults::Offsets(r), P::LineByteOffsets(v)) => r.add_ordered(v, chunk_index),
            (SearchResults::Offsets(r), P::LineIndices(v)) => r.add_ordered(v, chunk_index),
            (SearchResults::Lines(r), P::Lines(v)) => r.add_ordered(v, chunk_index),
            (_, other) => unreachable!("searcher mode produced a mismatched partial: {other:?}"),
        }
    }

    fn done(&self) {
        match self {
            SearchResults::Count(r) => r.done(),
            SearchResults::Offsets(r) => r.done(),
            SearchResults::Lines(r) => r.done(),
        }
    }
}

pub struct Executor {
    handles: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    result: Arc<SearchResults>,
    error: Arc<Mutex<Option<Error>>>,
}

impl Executor {
    /// Spawns `num_threads` workers over `provider`, running `processors` in
    /// order on each chunk before handing it to `searcher`. `ordered`
    /// controls whether the result aggregate preserves `chunk_index` order
    /// (the CLI wants this; a one-shot count does not care).
    pub fn spawn(
        provider: Arc<dyn DataProvider>,
        processors: Vec<Arc<dyn InplaceProcessor>>,
        searcher: Arc<Searcher>,
        mode: SearchMode,
        num_threads: usize,
        ordered: bool,
    ) -> Executor {
        let result = Arc::new(SearchResults::for_mode(mode, ordered));
        let stop = Arc::new(AtomicBool::new(false));
        let error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
        let remaining = Arc::new(AtomicUsize::new(num_threads.max(1)));

        let mut handles = Vec::with_capacity(num_threads.max(1));
        for _ in 0..num_threads.max(1) {
            let provider = Arc::clone(&provider);
            let processors = processors.clone();
            let searcher = Arc::clone(&searcher);
            let result = Arc::clone(&result);
            let stop = Arc::clone(&stop);
            let error = Arc::clone(&error);
            let remaining = Arc::clone(&remaining);

            handles.push(thread::spawn(move || {
                worker_loop(&provider, &processors, &searcher, &result, &stop, &error);
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    result.done();
                }
            }));
        }

        Executor { handles, stop, result, error }
    }

    /// Cooperative stop: sets the flag workers check between chunks, then
    /// joins. In-flight chunks are allowed to finish; there is no preemption.
    pub fn force_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// A handle to the result aggregate, usable for live iteration before
    /// `join()` returns (e.g. the CLI streams matches to stdout as they
    /// arrive).
    pub fn result(&self) -> Arc<SearchResults> {
        Arc::clone(&self.result)
    }

    /// Waits for every worker to exit, then returns the first worker error
    /// observed (if any) or the completed result aggregate.
    pub fn join(mut self) -> Result<Arc<SearchResults>> {
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
        if let Some(e) = self.error.lock().expect("executor error mutex poisoned").take() {
            return Err(e);
        }
        Ok(Arc::clone(&self.result))
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

fn worker_loop(
    provider: &Arc<dyn DataProvider>,
    processors: &[Arc<dyn InplaceProcessor>],
    searcher: &Searcher,
    result: &SearchResults,
    stop: &AtomicBool,
    error: &Mutex<Option<Error>>,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let (mut chunk, chunk_index) = match provider.next() {
            Ok(Some(pair)) => pair,
            Ok(None) => break,
            Err(e) => {
                record_error(error, stop, e);
                break;
            }
        };

        let mut failed = false;
        for p in processors {
            if let Err(e) = p.process(&mut chunk) {
                record_error(error, stop, e);
                failed = true;
                break;
            }
        }
        if failed {
            break;
        }

        match searcher.process(&chunk) {
            Ok(partial) => result.commit(partial, chunk_index),
            Err(e) => {
                record_error(error, stop, e);
                break;
            }
        }
    }
}

fn record_error(error: &Mutex<Option<Error>>, stop: &AtomicBool, e: Error) {
    let mut guard = error.lock().expect("executor error mutex poisoned");
    if guard.is_none() {
        *guard = Some(e);
    }
    stop.store(true, Ordering::SeqCst);
}
