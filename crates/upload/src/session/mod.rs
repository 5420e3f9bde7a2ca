//! The upload session state machine and the collaborators it reports to.
//!
//! - [`UploadSession`]: relays a [`Source`](crate::relay::Source) into an
//!   [`ObjectSink`](micro_lfs_store::ObjectSink) and ends in exactly one [`SessionState`]
//! - [`CompletionNotifier`]: receives the response status and the single completion signal,
//!   [`ResponseNotifier`] turns them into an HTTP response
//! - [`UploadCallback`]: optional hook invoked once an object was committed

mod callback;
mod notifier;
mod upload_session;

pub use callback::UploadCallback;
#[cfg(test)]
pub(crate) use notifier::MockCompletionNotifier;
pub use notifier::{CONTENT_TYPE_GIT_LFS_JSON, CompletionNotifier, ResponseNotifier, ResponseReceiver, error_response};
pub use upload_session::{SessionState, UploadOutcome, UploadSession};
