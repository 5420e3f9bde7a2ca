//! Content addressed storage for large objects.
//!
//! Objects are named by the SHA-256 of their content ([`LongObjectId`]). Writes go through the
//! [`ObjectSink`] contract: bytes are accepted incrementally, possibly fewer than offered per
//! call, and the object only becomes visible when the sink is closed and the content matched
//! its id. Aborting a sink leaves no trace at the final location.
//!
//! - [`FileObjectRepository`]: maps ids to paths below a root directory and opens sinks
//! - [`AtomicObjectWriter`]: the filesystem sink, temporary file plus atomic rename
//! - [`StoreError`]: error type, see [`StoreError::is_integrity_violation`]

mod atomic_writer;
mod config;
mod error;
mod oid;
mod repository;
mod sink;

pub use atomic_writer::AtomicObjectWriter;
pub use config::StoreConfig;
pub use error::StoreError;
pub use oid::{LongObjectId, OBJECT_ID_LENGTH, OBJECT_ID_STRING_LENGTH};
pub use repository::FileObjectRepository;
#[cfg(any(test, feature = "mock"))]
pub use sink::MockObjectSink;
pub use sink::ObjectSink;
