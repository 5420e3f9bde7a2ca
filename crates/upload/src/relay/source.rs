use crate::UploadError;

/// Result of a non-blocking read from a [`Source`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were copied into the buffer. Zero means the same as `NotReady`.
    Read(usize),
    /// Nothing available right now, more may arrive later.
    NotReady,
    /// No byte will ever arrive again.
    Ended,
}

/// The read side of an upload: the request body as seen by the session.
///
/// Implementations must never block; a source without data answers [`ReadStatus::NotReady`]
/// and the dispatcher calls the session again once it has data.
pub trait Source {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<ReadStatus, UploadError>;

    /// Releases the source. Called exactly once by the owning session.
    fn close(&mut self);
}

impl<T: Source + ?Sized> Source for Box<T> {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<ReadStatus, UploadError> {
        (**self).try_read(buf)
    }

    fn close(&mut self) {
        (**self).close();
    }
}
