//! Non-blocking streaming upload of content addressed objects
//!
//! This crate implements the server side of a large object upload: a client `PUT`s the bytes
//! of an object addressed by its SHA-256 id, and the server persists them atomically and only
//! if the content really hashes to that id. Bodies are relayed through a small fixed size
//! buffer, so memory use does not grow with the object size, and the task reading the
//! network is never blocked waiting for data.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use micro_lfs_store::{FileObjectRepository, LongObjectId};
//! use micro_lfs_upload::{ObjectUploadService, UploadConfig};
//! use std::path::Path;
//! use tracing::info;
//!
//! # async fn example() {
//! let repository = FileObjectRepository::new("/srv/lfs/objects");
//! let service = ObjectUploadService::new(repository, UploadConfig::default())
//!     .with_callback(|path: &Path, size: u64| info!(path = %path.display(), size, "stored"));
//!
//! let content = Bytes::from_static(b"large object");
//! let oid = LongObjectId::compute(&content).to_string();
//! let response = service.put_object(&oid, Full::new(content)).await;
//! assert!(response.status().is_success());
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`relay`]: the [`Source`](relay::Source) contract, the [`PayloadFeed`](relay::PayloadFeed)
//!   source and the bounded [`RelayBuffer`](relay::RelayBuffer)
//! - [`session`]: the [`UploadSession`](session::UploadSession) state machine, the
//!   [`CompletionNotifier`](session::CompletionNotifier) it answers through and the
//!   [`UploadCallback`](session::UploadCallback) hook
//! - [`UploadDriver`]: delivers body frames, end of body, timeouts and cancellation to a session
//! - [`ObjectUploadService`]: opens the sink, wires the pieces together and produces the response
//!
//! # Error Handling
//!
//! Every failure aborts the object write and is answered exactly once:
//!
//! - content that does not match the object id (or the announced size) is a client fault,
//!   `400 Bad Request`, logged as a warning
//! - every other fault (body transport, storage, timeout, cancellation) is a server fault,
//!   `500 Internal Server Error`, logged as an error
//!
//! Error bodies are `{"message": "..."}` with content type `application/vnd.git-lfs+json`.

pub mod relay;
pub mod session;

mod config;
mod driver;
mod error;
mod service;

pub use config::{SuccessStatus, UploadConfig, UploadConfigBuilder};
pub use driver::{SINK_RETRY_INTERVAL, UploadDriver};
pub use error::UploadError;
pub use service::ObjectUploadService;
