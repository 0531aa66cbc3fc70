use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, warn};

use crate::storage::{CommitBatch, CommitLog, StorageError};

/// Append-only journal of committed batches, one JSON document per line.
///
/// Each append is synced to disk before it returns. On open, the journal is
/// replayed in order; a final line cut short by a crash is discarded and
/// truncated away, anything malformed before it is treated as corruption.
///
/// If a failed append cannot be rolled back, the journal refuses further
/// appends until it is reopened, since its tail no longer matches what
/// callers were told.
pub struct FileJournal {
    file: Mutex<File>,
    unusable: AtomicBool
}

impl FileJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<CommitBatch>), StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let (batches, valid_len) = replay(&contents)?;

        if valid_len < contents.len() {
            warn!("Discarding torn journal tail at {} ({} bytes)", path.display(), contents.len() - valid_len);
            file.set_len(valid_len as u64)?;
            file.sync_data()?;
        }

        debug!("Replayed {} journal batches from {}", batches.len(), path.display());

        Ok((Self { file: Mutex::new(file), unusable: AtomicBool::new(false) }, batches))
    }

    pub fn is_unusable(&self) -> bool {
        self.unusable.load(Ordering::Acquire)
    }

    pub(crate) fn mark_unusable(&self) {
        self.unusable.store(true, Ordering::Release);
    }
}

impl CommitLog for FileJournal {
    fn append(&self, batch: &CommitBatch) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(batch)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);

        if self.is_unusable() {
            return Err(StorageError::JournalUnusable)
        }

        let committed_len = file.metadata()?.len();

        let written = file.write_all(&line).and_then(|_| file.sync_data());

        if let Err(error) = written {
            //NOTE: Cut back to the last whole batch so a half-written line never precedes later appends
            if let Err(truncate_error) = file.set_len(committed_len) {
                error!("Could not truncate journal after failed append, refusing further appends: {truncate_error}");
                self.mark_unusable();
            }

            return Err(error.into());
        }

        Ok(())
    }
}

/// Parses journal contents, returning the batches and the byte length of the
/// well-formed prefix.
fn replay(contents: &[u8]) -> Result<(Vec<CommitBatch>, usize), StorageError> {
    let mut batches = Vec::new();
    let mut offset = 0;

    for (index, line) in contents.split_inclusive(|byte| *byte == b'\n').enumerate() {
        let complete = line.ends_with(b"\n");
        let body = line.trim_ascii_end();

        if body.is_empty() {
            offset += line.len();
            continue;
        }

        // Appends always end in a newline, so a line without one was torn mid-write
        if !complete {
            break;
        }

        let batch = serde_json::from_slice::<CommitBatch>(body).map_err(|error| {
            StorageError::CorruptJournal { line: index + 1, reason: error.to_string() }
        })?;

        batches.push(batch);
        offset += line.len();
    }

    Ok((batches, offset))
}

/// Non-durable log for in-memory stores; it only counts commits.
#[derive(Default)]
pub struct MemoryLog {
    commits: AtomicU64
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }
}

impl CommitLog for MemoryLog {
    fn append(&self, _batch: &CommitBatch) -> Result<(), StorageError> {
        self.commits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
