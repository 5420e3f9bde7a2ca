use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{AtomicObjectWriter, LongObjectId, StoreConfig, StoreError};

/// Large objects stored as plain files below a root directory.
///
/// An object lives at `<root>/<id[0..2]>/<id[2..4]>/<id>`, fanning the objects out over
/// 65536 directories.
#[derive(Debug, Clone)]
pub struct FileObjectRepository {
    root: PathBuf,
    max_write_chunk: Option<usize>,
}

impl FileObjectRepository {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into(), max_write_chunk: None }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self { root: config.root.clone(), max_write_chunk: config.max_write_chunk }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, id: &LongObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(hex)
    }

    pub fn exists(&self, id: &LongObjectId) -> bool {
        self.path(id).is_file()
    }

    /// Size of a stored object, `None` if it does not exist.
    pub fn size(&self, id: &LongObjectId) -> Result<Option<u64>, StoreError> {
        match fs::metadata(self.path(id)) {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a sink that publishes `id` once its content has been verified.
    pub fn open_sink(&self, id: &LongObjectId) -> Result<AtomicObjectWriter, StoreError> {
        let path = self.path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!(oid = %id, path = %path.display(), "opening object sink");
        let writer = AtomicObjectWriter::create(*id, path)?;
        Ok(match self.max_write_chunk {
            Some(max) => writer.with_max_write_chunk(max),
            None => writer,
        })
    }

    /// Like [`FileObjectRepository::open_sink`], additionally requiring exactly `size` bytes.
    pub fn open_sink_with_size(&self, id: &LongObjectId, size: u64) -> Result<AtomicObjectWriter, StoreError> {
        Ok(self.open_sink(id)?.with_expected_size(size))
    }
}
