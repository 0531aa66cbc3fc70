use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::storage::{CommitBatch, CommitLog, StorageError};

/// Accepts a fixed number of commits, then fails every append like a full disk.
pub(crate) struct FlakyLog {
    remaining: AtomicUsize
}

impl FlakyLog {
    pub(crate) fn failing_after(successes: usize) -> Self {
        Self { remaining: AtomicUsize::new(successes) }
    }
}

impl CommitLog for FlakyLog {
    fn append(&self, _batch: &CommitBatch) -> Result<(), StorageError> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| StorageError::Io(io::Error::other("simulated disk failure")))
    }
}
