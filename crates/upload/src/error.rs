use std::io;
use std::time::Duration;

use http::StatusCode;
use micro_lfs_store::StoreError;
use thiserror::Error;

/// Why an upload session was aborted.
///
/// The variants split into client faults ([`UploadError::Integrity`]), answered with
/// `400 Bad Request`, and server faults (everything else), answered with
/// `500 Internal Server Error`.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("content integrity violation: {source}")]
    Integrity { source: StoreError },

    #[error("storage error: {source}")]
    Storage { source: StoreError },

    #[error("invalid request body: {reason}")]
    Body { reason: String },

    #[error("no request body data received within {idle:?}")]
    TimedOut { idle: Duration },

    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    pub fn body<S: ToString>(str: S) -> Self {
        Self::Body { reason: str.to_string() }
    }

    pub fn timed_out(idle: Duration) -> Self {
        Self::TimedOut { idle }
    }

    /// A storage fault for a sink that keeps accepting nothing.
    pub(crate) fn write_zero(attempts: usize) -> Self {
        let message = format!("object sink accepted no bytes in {attempts} attempts");
        let e = io::Error::new(io::ErrorKind::WriteZero, message);
        Self::Storage { source: StoreError::io(e) }
    }

    /// True when the client sent bytes that can never be accepted under the claimed id.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, UploadError::Integrity { .. })
    }

    pub fn status(&self) -> StatusCode {
        if self.is_client_fault() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR }
    }
}

impl From<StoreError> for UploadError {
    fn from(source: StoreError) -> Self {
        if source.is_integrity_violation() { Self::Integrity { source } } else { Self::Storage { source } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micro_lfs_store::LongObjectId;

    #[test]
    fn test_store_errors_are_classified() {
        let corrupt = StoreError::corrupt_object(LongObjectId::compute(b"a"), LongObjectId::compute(b"b"));
        let error = UploadError::from(corrupt);
        assert!(matches!(error, UploadError::Integrity { .. }));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);

        let error = UploadError::from(StoreError::size_mismatch(1, 2));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);

        let error = UploadError::from(StoreError::io(io::Error::other("disk full")));
        assert!(matches!(error, UploadError::Storage { .. }));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_transport_faults_are_server_faults() {
        let errors = [
            UploadError::body("connection reset"),
            UploadError::timed_out(Duration::from_secs(1)),
            UploadError::Cancelled,
            UploadError::write_zero(3),
        ];
        for error in errors {
            assert!(!error.is_client_fault());
            assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
