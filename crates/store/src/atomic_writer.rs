//! Atomic, hash verified object writer on the local filesystem.
//!
//! Bytes are written to a temporary file next to the final object path. The temporary file
//! is only renamed into place on [`ObjectSink::close`], after the SHA-256 of everything that
//! was written matches the object id. Any other exit (abort, verification failure, io error,
//! or dropping the writer) removes the temporary file.

use std::io::{self, Write};
use std::mem;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::{LongObjectId, ObjectSink, StoreError};

const TEMP_PREFIX: &str = ".tmp-";

#[derive(Debug)]
enum State {
    Open(NamedTempFile),
    Committed,
    Aborted,
}

/// A [`ObjectSink`] publishing a verified object by atomic rename.
#[derive(Debug)]
pub struct AtomicObjectWriter {
    id: LongObjectId,
    path: PathBuf,
    state: State,
    hasher: Sha256,
    written: u64,
    expected_size: Option<u64>,
    max_write_chunk: Option<usize>,
}

impl AtomicObjectWriter {
    /// Creates the temporary file in the directory of `path`.
    ///
    /// The directory must exist; it has to live on the same filesystem as `path` so the
    /// final rename is atomic.
    pub fn create(id: LongObjectId, path: PathBuf) -> Result<Self, StoreError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
        trace!(oid = %id, temp = %file.path().display(), "opened temporary object file");

        Ok(Self {
            id,
            path,
            state: State::Open(file),
            hasher: Sha256::new(),
            written: 0,
            expected_size: None,
            max_write_chunk: None,
        })
    }

    /// Rejects the object unless exactly `size` bytes are written.
    #[must_use]
    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Caps how many bytes a single [`ObjectSink::write`] accepts.
    #[must_use]
    pub fn with_max_write_chunk(mut self, max: usize) -> Self {
        self.max_write_chunk = Some(max.max(1));
        self
    }

    pub fn id(&self) -> &LongObjectId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.state, State::Committed)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, State::Aborted)
    }

    fn verify(&mut self) -> Result<(), StoreError> {
        if let Some(expected) = self.expected_size
            && expected != self.written
        {
            return Err(StoreError::size_mismatch(expected, self.written));
        }

        let actual = LongObjectId::from(mem::take(&mut self.hasher));
        if actual != self.id {
            return Err(StoreError::corrupt_object(self.id, actual));
        }

        Ok(())
    }
}

impl ObjectSink for AtomicObjectWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        let State::Open(file) = &mut self.state else {
            return Err(StoreError::Closed);
        };

        let limit = self.max_write_chunk.map_or(buf.len(), |max| buf.len().min(max));
        let buf = &buf[..limit];

        if let Some(expected) = self.expected_size {
            let offered = self.written + buf.len() as u64;
            if offered > expected {
                return Err(StoreError::size_mismatch(expected, offered));
            }
        }

        let accepted = match file.write(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
            Err(e) => return Err(e.into()),
        };

        self.hasher.update(&buf[..accepted]);
        self.written += accepted as u64;
        Ok(accepted)
    }

    fn abort(&mut self) -> Result<(), StoreError> {
        match mem::replace(&mut self.state, State::Aborted) {
            State::Open(file) => {
                debug!(oid = %self.id, written = self.written, "aborting object write");
                file.close()?;
                Ok(())
            }
            State::Committed => {
                self.state = State::Committed;
                Ok(())
            }
            State::Aborted => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), StoreError> {
        // every early return below leaves the writer aborted, dropping `file` removes it
        let mut file = match mem::replace(&mut self.state, State::Aborted) {
            State::Open(file) => file,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        file.flush()?;
        self.verify()?;
        file.as_file().sync_all()?;

        if self.path.exists() {
            debug!(oid = %self.id, "object already present, discarding duplicate upload");
            file.close()?;
        } else {
            file.persist(&self.path).map_err(StoreError::io)?;
        }

        self.state = State::Committed;
        debug!(oid = %self.id, size = self.written, path = %self.path.display(), "object committed");
        Ok(())
    }
}
