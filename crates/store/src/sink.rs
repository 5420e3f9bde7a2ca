use crate::StoreError;

/// The write side of an object upload.
///
/// A sink is opened for one object id and ends in exactly one of two ways: `close` publishes
/// the object at its final location (after verifying it), `abort` discards everything written
/// so far. Nothing is ever visible at the final location before a successful `close`.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait ObjectSink {
    /// Writes some prefix of `buf`, returning how many bytes were accepted.
    ///
    /// Accepting fewer bytes than offered is not an error, the caller retries with the rest.
    /// Returns [`StoreError::Closed`] once the sink has been closed or aborted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError>;

    /// Discards the object. Idempotent, and a no-op after a successful close.
    fn abort(&mut self) -> Result<(), StoreError>;

    /// Verifies and publishes the object. Idempotent, and a no-op after abort.
    fn close(&mut self) -> Result<(), StoreError>;
}

impl<T: ObjectSink + ?Sized> ObjectSink for Box<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        (**self).write(buf)
    }

    fn abort(&mut self) -> Result<(), StoreError> {
        (**self).abort()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        (**self).close()
    }
}
