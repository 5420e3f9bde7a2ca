use std::path::Path;

/// Notified after an object upload was committed.
pub trait UploadCallback: Send + Sync {
    /// `path` is where the object now lives, `size` the number of bytes uploaded.
    fn upload_completed(&self, path: &Path, size: u64);
}

impl<F> UploadCallback for F
where
    F: Fn(&Path, u64) + Send + Sync,
{
    fn upload_completed(&self, path: &Path, size: u64) {
        (self)(path, size);
    }
}
