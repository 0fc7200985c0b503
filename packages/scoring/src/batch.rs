//! Bounded-size batching of per-segment work.
//!
//! [`Batches`] splits a slice into consecutive fixed-size windows. It is a
//! plain iterator: finite, cheap to clone, and restartable by creating it
//! again. [`process_batched`] drives a per-item function over those
//! batches, fanning each batch out over the `rayon` pool, and returns the
//! results in input order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::ScoringError;
use crate::progress::{ProgressCallback, null_progress};

/// One window of a [`Batches`] iteration.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a, T> {
    /// Zero-based batch number.
    pub number: usize,
    /// Position of the first item of this batch in the full slice.
    pub offset: usize,
    /// Items in this batch.
    pub items: &'a [T],
}

/// Iterator over consecutive batches of at most `size` items.
#[derive(Debug, Clone)]
pub struct Batches<'a, T> {
    items: &'a [T],
    size: usize,
    next_offset: usize,
    next_number: usize,
}

impl<'a, T> Batches<'a, T> {
    /// Creates a batch iterator. A `size` of zero is treated as one.
    #[must_use]
    pub fn new(items: &'a [T], size: usize) -> Self {
        Self {
            items,
            size: size.max(1),
            next_offset: 0,
            next_number: 0,
        }
    }

    /// Total number of batches this iterator yields from the start.
    #[must_use]
    pub const fn batch_count(&self) -> usize {
        self.items.len().div_ceil(self.size)
    }
}

impl<'a, T> Iterator for Batches<'a, T> {
    type Item = Batch<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_offset >= self.items.len() {
            return None;
        }

        let end = (self.next_offset + self.size).min(self.items.len());
        let batch = Batch {
            number: self.next_number,
            offset: self.next_offset,
            items: &self.items[self.next_offset..end],
        };

        self.next_offset = end;
        self.next_number += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.items.len() - self.next_offset).div_ceil(self.size);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Batches<'_, T> {}

/// Execution options shared by every batched stage of a run.
#[derive(Clone)]
pub struct BatchOptions {
    /// Maximum items per batch.
    pub chunk_size: usize,
    /// When set to `true`, remaining batches are abandoned.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Progress sink, advanced once per finished batch.
    pub progress: Arc<dyn ProgressCallback>,
}

impl BatchOptions {
    /// Options with the given batch size, no cancellation and silent
    /// progress.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            cancel: None,
            progress: null_progress(),
        }
    }

    /// Replaces the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Attaches a cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl std::fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOptions")
            .field("chunk_size", &self.chunk_size)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Applies `work` to every item, one bounded batch at a time.
///
/// Items within a batch run in parallel; batches run sequentially so at
/// most one batch of results is being produced at any moment. The
/// returned vector is in input order.
///
/// # Errors
///
/// Returns [`ScoringError::Cancelled`] if the cancel flag is observed
/// between batches. Partial results are discarded.
pub fn process_batched<T, R, F>(
    items: &[T],
    options: &BatchOptions,
    stage: &'static str,
    work: F,
) -> Result<Vec<R>, ScoringError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let batches = Batches::new(items, options.chunk_size);
    let total_batches = batches.batch_count();

    options.progress.set_total(items.len() as u64);
    options.progress.set_message(format!("{stage} ({total_batches} batches)"));

    let mut results = Vec::with_capacity(items.len());

    for batch in batches {
        if options.is_cancelled() {
            log::warn!(
                "{stage}: cancelled before batch {}/{total_batches}",
                batch.number + 1
            );
            return Err(ScoringError::Cancelled { stage });
        }

        let batch_results: Vec<R> = batch.items.par_iter().map(&work).collect();
        results.extend(batch_results);

        options.progress.inc(batch.items.len() as u64);
        log::debug!(
            "{stage}: finished batch {}/{total_batches} ({} items at offset {})",
            batch.number + 1,
            batch.items.len(),
            batch.offset
        );
    }

    options.progress.finish(format!("{stage}: {} items", items.len()));
    Ok(results)
}
