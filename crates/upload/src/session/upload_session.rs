use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use micro_lfs_store::ObjectSink;
use tracing::{Span, debug, error, info, trace, warn};

use crate::UploadError;
use crate::relay::{ReadStatus, RelayBuffer, Source};
use crate::session::{CompletionNotifier, UploadCallback};

/// Lifecycle of an [`UploadSession`]. `Completed` and `Aborted` are final.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Streaming,
    Completed,
    Aborted,
}

impl SessionState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Streaming)
    }
}

/// What a session ended with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub state: SessionState,
    pub bytes_transferred: u64,
}

enum Progress {
    /// The source has nothing right now and the sink took every byte.
    NotReady,
    /// The sink stopped accepting while bytes are pending.
    Backlogged,
    Ended,
}

/// Relays one request body into one object sink.
///
/// The session is driven by a dispatcher through three events:
///
/// - [`on_readable`](UploadSession::on_readable): the source may have data. The session
///   reads and writes until the source has nothing more right now, or until the buffer is
///   full and the sink stopped draining it. It never blocks; a sink that accepts nothing
///   leaves the session [backlogged](UploadSession::is_backlogged) and the dispatcher
///   delivers `on_readable` again later.
/// - [`on_ended`](UploadSession::on_ended): the source is exhausted. Whatever is still
///   buffered is written and the object is closed.
/// - [`on_failure`](UploadSession::on_failure): the transfer broke. The sink is aborted.
///
/// Whichever event first reaches a terminal state wins: the source and sink are released,
/// the response status is set (unless a response was already committed), and the
/// [`CompletionNotifier`] is completed, all exactly once. Later events are ignored.
///
/// A session dropped while still streaming is treated as cancelled.
pub struct UploadSession<S, K, N>
where
    S: Source,
    K: ObjectSink,
    N: CompletionNotifier,
{
    source: S,
    sink: K,
    notifier: N,
    buffer: RelayBuffer,
    transferred: u64,
    state: SessionState,
    path: PathBuf,
    success_status: StatusCode,
    callback: Option<Arc<dyn UploadCallback>>,
    span: Span,
}

impl<S, K, N> UploadSession<S, K, N>
where
    S: Source,
    K: ObjectSink,
    N: CompletionNotifier,
{
    /// Creates a session for a sink already opened at `path`.
    pub fn new<P: Into<PathBuf>>(source: S, sink: K, notifier: N, path: P) -> Self {
        Self {
            source,
            sink,
            notifier,
            buffer: RelayBuffer::new(),
            transferred: 0,
            state: SessionState::Streaming,
            path: path.into(),
            success_status: StatusCode::OK,
            callback: None,
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer = RelayBuffer::with_capacity(capacity);
        self
    }

    #[must_use]
    pub fn with_success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    #[must_use]
    pub fn with_callback(mut self, callback: Arc<dyn UploadCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Every event of the session is recorded inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Bytes accepted by the sink so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.transferred
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn outcome(&self) -> UploadOutcome {
        UploadOutcome { state: self.state, bytes_transferred: self.transferred }
    }

    /// True while read bytes wait for the sink to accept them.
    ///
    /// A backlogged session must see `on_readable` again before the source is fed more data.
    pub fn is_backlogged(&self) -> bool {
        !self.is_terminal() && !self.buffer.is_empty()
    }

    /// The source, for the dispatcher to hand over newly received data.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn on_readable(&mut self) -> SessionState {
        if self.ignore("readable") {
            return self.state;
        }

        let span = self.span.clone();
        let _entered = span.enter();
        match self.transfer() {
            Ok(Progress::NotReady) => trace!(bytes = self.transferred, "waiting for more body data"),
            Ok(Progress::Backlogged) => {
                trace!(bytes = self.transferred, pending = self.buffer.len(), "sink not draining, waiting");
            }
            Ok(Progress::Ended) => {
                let result = self.flush();
                self.finalize(result);
            }
            Err(cause) => self.finalize(Err(cause)),
        }
        self.state
    }

    pub fn on_ended(&mut self) -> SessionState {
        if self.ignore("ended") {
            return self.state;
        }

        let span = self.span.clone();
        let _entered = span.enter();
        let result = self.drain_to_end();
        self.finalize(result);
        self.state
    }

    pub fn on_failure(&mut self, cause: UploadError) -> SessionState {
        if self.is_terminal() {
            debug!(state = ?self.state, cause = %cause, "session already finished, ignoring failure");
            return self.state;
        }

        let span = self.span.clone();
        let _entered = span.enter();
        self.finalize(Err(cause));
        self.state
    }

    fn ignore(&self, event: &'static str) -> bool {
        if self.is_terminal() {
            trace!(event, state = ?self.state, "ignoring event for finished session");
        }
        self.is_terminal()
    }

    fn transfer(&mut self) -> Result<Progress, UploadError> {
        loop {
            // keep writing while the sink makes progress, read more only into free space
            while !self.buffer.is_empty() {
                let accepted = self.buffer.drain_into(&mut self.sink)?;
                if accepted == 0 {
                    break;
                }
                self.transferred += accepted as u64;
            }
            if self.buffer.is_full() {
                return Ok(Progress::Backlogged);
            }

            match self.buffer.fill_from(&mut self.source)? {
                ReadStatus::Read(n) if n > 0 => trace!(read = n, "received body bytes"),
                ReadStatus::Read(_) | ReadStatus::NotReady if self.buffer.is_empty() => return Ok(Progress::NotReady),
                ReadStatus::Read(_) | ReadStatus::NotReady => return Ok(Progress::Backlogged),
                ReadStatus::Ended => return Ok(Progress::Ended),
            }
        }
    }

    /// The source is exhausted: writes out everything still buffered or queued, waiting on
    /// the sink for a bounded number of stalled writes.
    fn drain_to_end(&mut self) -> Result<(), UploadError> {
        loop {
            self.flush()?;
            match self.buffer.fill_from(&mut self.source)? {
                ReadStatus::Read(n) if n > 0 => trace!(read = n, "received body bytes"),
                ReadStatus::Read(_) | ReadStatus::NotReady | ReadStatus::Ended => return Ok(()),
            }
        }
    }

    fn flush(&mut self) -> Result<(), UploadError> {
        self.buffer.flush_into(&mut self.sink, &mut self.transferred)
    }

    fn finalize(&mut self, result: Result<(), UploadError>) {
        debug_assert!(!self.is_terminal());
        self.source.close();

        match result.and_then(|()| self.sink.close().map_err(UploadError::from)) {
            Ok(()) => {
                self.state = SessionState::Completed;
                info!(bytes = self.transferred, path = %self.path.display(), "upload completed");

                if !self.notifier.is_committed() {
                    self.notifier.set_status(self.success_status);
                }
                if let Some(callback) = &self.callback {
                    callback.upload_completed(&self.path, self.transferred);
                }
            }
            Err(cause) => {
                self.state = SessionState::Aborted;
                if let Err(e) = self.sink.abort() {
                    error!(cause = %e, "failed to abort object sink");
                }

                let status = cause.status();
                if cause.is_client_fault() {
                    warn!(%status, bytes = self.transferred, cause = %cause, "upload rejected");
                } else {
                    error!(%status, bytes = self.transferred, cause = %cause, "upload failed");
                }

                if self.notifier.is_committed() {
                    debug!(%status, "response already committed, not sending error");
                } else {
                    self.notifier.send_error(status, &cause.to_string());
                }
            }
        }

        self.notifier.complete();
    }
}

impl<S, K, N> Drop for UploadSession<S, K, N>
where
    S: Source,
    K: ObjectSink,
    N: CompletionNotifier,
{
    fn drop(&mut self) {
        if self.is_terminal() {
            return;
        }

        let span = self.span.clone();
        let _entered = span.enter();
        warn!(bytes = self.transferred, "upload session dropped while streaming");
        self.finalize(Err(UploadError::Cancelled));
    }
}

impl<S, K, N> fmt::Debug for UploadSession<S, K, N>
where
    S: Source,
    K: ObjectSink,
    N: CompletionNotifier,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("bytes_transferred", &self.transferred)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
