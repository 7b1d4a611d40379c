//! Static-partition parallel for-each.
//!
//! A range of `N` elements is split into at most `W` contiguous chunks, the
//! last one absorbing the remainder, and every chunk runs on its own scoped
//! OS thread. The call returns only after all workers have been joined.
//!
//! The first failure, an `Err` from the operation or a panic, is kept in a
//! single mutex-guarded slot and raises a shared abort flag. Workers check
//! the flag before each element and stop consuming their chunk once it is
//! set; in-flight elements are never interrupted. Later failures are
//! discarded.

use std::any::Any;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use thiserror::Error;

/// Failure of a parallel-for call, reported once all workers have finished.
#[derive(Debug, Error)]
pub enum ParallelError<E> {
    /// The operation returned an error for the element at `index`.
    #[error("task failed at element {index}: {error}")]
    Task { index: usize, error: E },

    #[error("worker {worker} panicked: {message}")]
    Panicked { worker: usize, message: String },

    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Hardware parallelism, or 1 if it cannot be queried.
pub fn available_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Split `0..len` into at most `workers` contiguous ranges.
///
/// The worker count is clamped to `1..=len`. All ranges have
/// `len / workers` elements except the last, which takes the remainder.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, len);
    let chunk = len / workers;
    (0..workers)
        .map(|w| {
            let start = w * chunk;
            let end = if w == workers - 1 { len } else { start + chunk };
            start..end
        })
        .collect()
}

/// Thread-per-chunk parallel for-each.
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use eim_rust::parallel::ParallelFor;
///
/// let values: Vec<u64> = (0..100).collect();
/// let total = AtomicU64::new(0);
/// ParallelFor::new(4)
///     .for_each(&values, |v| {
///         total.fetch_add(*v, Ordering::Relaxed);
///         Ok::<(), String>(())
///     })
///     .unwrap();
/// assert_eq!(total.into_inner(), 4950);
/// ```
#[derive(Clone, Copy)]
pub struct ParallelFor<'p> {
    workers: usize,
    progress: Option<&'p (dyn Fn(usize) + Sync)>,
}

impl<'p> ParallelFor<'p> {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress: None,
        }
    }

    /// One worker per hardware thread.
    pub fn available() -> Self {
        Self::new(available_workers())
    }

    /// Called after each worker finishes its chunk with the number of
    /// workers finished so far. Workers call it concurrently.
    pub fn with_progress(mut self, progress: &'p (dyn Fn(usize) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn for_each<T, E, F>(&self, items: &[T], f: F) -> Result<(), ParallelError<E>>
    where
        T: Sync,
        E: Send,
        F: Fn(&T) -> Result<(), E> + Sync,
    {
        self.for_each_indexed(items, |_, item| f(item))
    }

    /// Like [`ParallelFor::for_each`], passing each element's global index.
    pub fn for_each_indexed<T, E, F>(&self, items: &[T], f: F) -> Result<(), ParallelError<E>>
    where
        T: Sync,
        E: Send,
        F: Fn(usize, &T) -> Result<(), E> + Sync,
    {
        let chunks: Vec<(usize, &[T])> = partition(items.len(), self.workers)
            .into_iter()
            .map(|range| (range.start, &items[range]))
            .collect();

        self.run(chunks, |start, chunk, abort| {
            for (offset, item) in chunk.iter().enumerate() {
                if abort.load(Ordering::Relaxed) {
                    break;
                }
                let index = start + offset;
                f(index, item).map_err(|error| (index, error))?;
            }
            Ok(())
        })
    }

    /// Mutable variant: each worker owns a disjoint sub-slice, so results
    /// can be written in place without synchronization.
    pub fn for_each_mut<T, E, F>(&self, items: &mut [T], f: F) -> Result<(), ParallelError<E>>
    where
        T: Send,
        E: Send,
        F: Fn(usize, &mut T) -> Result<(), E> + Sync,
    {
        let ranges = partition(items.len(), self.workers);
        let mut chunks: Vec<(usize, &mut [T])> = Vec::with_capacity(ranges.len());
        let mut rest = items;
        for range in ranges {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            chunks.push((range.start, head));
            rest = tail;
        }

        self.run(chunks, |start, chunk, abort| {
            for (offset, item) in chunk.iter_mut().enumerate() {
                if abort.load(Ordering::Relaxed) {
                    break;
                }
                let index = start + offset;
                f(index, item).map_err(|error| (index, error))?;
            }
            Ok(())
        })
    }

    fn run<C, E, W>(&self, chunks: Vec<(usize, C)>, work: W) -> Result<(), ParallelError<E>>
    where
        C: Send,
        E: Send,
        W: Fn(usize, C, &AtomicBool) -> Result<(), (usize, E)> + Sync,
    {
        if chunks.is_empty() {
            return Ok(());
        }

        let abort = AtomicBool::new(false);
        let completed = AtomicUsize::new(0);
        let failure: Mutex<Option<ParallelError<E>>> = Mutex::new(None);
        let progress = self.progress;

        // First writer wins; the flag is raised under the same lock.
        let record = |err: ParallelError<E>| {
            let mut slot = failure.lock();
            if slot.is_none() {
                *slot = Some(err);
                abort.store(true, Ordering::SeqCst);
            }
        };

        thread::scope(|scope| {
            for (worker, (start, chunk)) in chunks.into_iter().enumerate() {
                let work = &work;
                let abort = &abort;
                let completed = &completed;
                let record = &record;

                let spawned = thread::Builder::new()
                    .name(format!("eim-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(
                            || -> Result<(), (usize, E)> {
                                work(start, chunk, abort)?;
                                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                                if let Some(progress) = progress {
                                    progress(done);
                                }
                                Ok(())
                            },
                        ));
                        match outcome {
                            Ok(Ok(())) => {}
                            Ok(Err((index, error))) => record(ParallelError::Task { index, error }),
                            Err(payload) => record(ParallelError::Panicked {
                                worker,
                                message: panic_message(payload.as_ref()),
                            }),
                        }
                    });

                if let Err(source) = spawned {
                    record(ParallelError::Spawn { worker, source });
                    break;
                }
            }
        });

        match failure.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// How per-element work is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Run on the calling thread.
    #[default]
    Serial,
    /// Run through [`ParallelFor`] with the given worker count.
    Threads(usize),
}

impl Execution {
    pub fn available() -> Self {
        Execution::Threads(available_workers())
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Execution::Threads(w) if *w > 1)
    }

    pub fn for_each_mut<T, E, F>(&self, items: &mut [T], f: F) -> Result<(), ParallelError<E>>
    where
        T: Send,
        E: Send,
        F: Fn(usize, &mut T) -> Result<(), E> + Sync,
    {
        match *self {
            Execution::Serial => {
                for (index, item) in items.iter_mut().enumerate() {
                    f(index, item).map_err(|error| ParallelError::Task { index, error })?;
                }
                Ok(())
            }
            Execution::Threads(workers) => ParallelFor::new(workers).for_each_mut(items, f),
        }
    }
}
