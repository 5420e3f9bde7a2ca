use std::io;
use thiserror::Error;

use crate::LongObjectId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("corrupt object: expected id {expected} but content hashes to {actual}")]
    CorruptObject { expected: LongObjectId, actual: LongObjectId },

    #[error("size mismatch: expected {expected} bytes, received {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("object sink is already closed")]
    Closed,

    #[error("invalid object id: {reason}")]
    InvalidObjectId { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl StoreError {
    pub fn corrupt_object(expected: LongObjectId, actual: LongObjectId) -> Self {
        Self::CorruptObject { expected, actual }
    }

    pub fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    pub fn invalid_object_id<S: ToString>(str: S) -> Self {
        Self::InvalidObjectId { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true when the received bytes do not match what the object id promised.
    ///
    /// These are client faults: retrying the same bytes can never succeed.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, StoreError::CorruptObject { .. } | StoreError::SizeMismatch { .. })
    }
}
