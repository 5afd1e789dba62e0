//! The append-only JSONL ledger file writer.
//!
//! One envelope per line, UTF-8, single `\n` terminator. The writer holds an
//! exclusive advisory lock (`flock(LOCK_EX)`) for its lifetime, so at most
//! one process appends to a ledger at a time. Readers may open the file
//! concurrently; they must tolerate a trailing partial line.
//!
//! On open, the file is scanned once to recover the last committed
//! envelope's `(sequence, canonical signing bytes)`. A torn tail (trailing
//! bytes without a final newline) was never durably committed and is
//! truncated before appending resumes. A *complete* line that fails to parse
//! is corruption and fails the open.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use guardclaw_core::Envelope;

use crate::error::LedgerError;

/// State recovered from an existing ledger file at open time.
#[derive(Debug, Default)]
pub struct RecoveredState {
    /// `(sequence, canonical signing bytes)` of the last committed envelope,
    /// or `None` for an empty ledger.
    pub last: Option<(u64, Vec<u8>)>,
    /// Number of committed envelopes found.
    pub entries: u64,
}

/// Exclusive owner of an open ledger file handle.
pub struct LedgerWriter {
    path: PathBuf,
    file: File,
}

impl LedgerWriter {
    /// Open or create the ledger at `path`, acquire the exclusive writer
    /// lock, and scan for recovery state.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, RecoveredState), LedgerError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| LedgerError::Locked { path: path.clone() })?;

        let (recovered, committed_len) = scan(&file)?;

        let file_len = file.metadata()?.len();
        if committed_len < file_len {
            warn!(
                path = %path.display(),
                torn_bytes = file_len - committed_len,
                "truncating torn tail left by an interrupted append"
            );
            file.set_len(committed_len)?;
        }

        debug!(
            path = %path.display(),
            entries = recovered.entries,
            "ledger writer opened"
        );
        Ok((Self { path, file }, recovered))
    }

    /// Append one serialized envelope line.
    ///
    /// The line plus its `\n` terminator go out as a single write, so a
    /// crash leaves either the whole line or a torn tail, never an
    /// interleaved record.
    pub fn append_line(&mut self, line: &str) -> Result<(), LedgerError> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.file.write_all(&buf)?;
        self.file.flush()?;
        Ok(())
    }

    /// Force file contents to stable storage. Callers needing durability
    /// beyond the OS page cache call this after [`Self::append_line`].
    pub fn sync(&self) -> Result<(), LedgerError> {
        self.file.sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Stream the file once, returning recovery state and the byte length of the
/// committed (newline-terminated, parseable) prefix.
fn scan(file: &File) -> Result<(RecoveredState, u64), LedgerError> {
    let mut recovered = RecoveredState::default();
    let mut committed_len: u64 = 0;

    let mut read_handle = file.try_clone()?;
    read_handle.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(read_handle);

    let mut line = String::new();
    let mut line_no = 0usize;
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        line_no += 1;

        if !line.ends_with('\n') {
            // Torn tail: only possible on the final read.
            break;
        }

        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            committed_len += n as u64;
            continue;
        }

        let envelope = Envelope::from_line(trimmed).map_err(|e| LedgerError::Recovery {
            line: line_no,
            reason: e.to_string(),
        })?;
        let bytes = envelope.canonical_signing_bytes()?;
        recovered.last = Some((envelope.sequence, bytes));
        recovered.entries += 1;
        committed_len += n as u64;
    }

    Ok((recovered, committed_len))
}
