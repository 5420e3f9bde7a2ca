//! Drives an [`UploadSession`] from an `http_body::Body`.
//!
//! The driver is the dispatcher of a session: it waits for the next body frame without
//! blocking the runtime, hands the data to the session's [`PayloadFeed`] and delivers the
//! matching event. Events are delivered one at a time and the next frame is only polled after
//! the session drained the feed, so a slow sink slows down reading from the network instead
//! of piling up bytes in memory. A session left backlogged by a sink that stopped accepting
//! bytes is given `on_readable` again after [`SINK_RETRY_INTERVAL`].
//!
//! Timeouts and cancellation are enforced here and reach the session as failures. The idle
//! timeout also bounds how long a backlogged sink may go without accepting a byte.

use std::fmt;
use std::fmt::Display;
use std::time::Duration;

use bytes::{Buf, Bytes};
use http_body::Body;
use http_body_util::BodyExt;
use micro_lfs_store::ObjectSink;
use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::UploadError;
use crate::relay::{PayloadFeed, PayloadItem};
use crate::session::{CompletionNotifier, UploadOutcome, UploadSession};

/// Pause before a backlogged session is asked to write again.
pub const SINK_RETRY_INTERVAL: Duration = Duration::from_millis(1);

enum Event {
    Data(Bytes),
    SinkRetry,
    Trailers,
    Ended,
    Failed(UploadError),
}

pub struct UploadDriver<B, K, N>
where
    K: ObjectSink,
    N: CompletionNotifier,
{
    body: B,
    session: UploadSession<PayloadFeed, K, N>,
    idle_timeout: Option<Duration>,
    cancellation: CancellationToken,
    /// Bytes transferred when the sink was first seen stalled, and since when.
    stall: Option<(u64, Instant)>,
}

impl<B, K, N> UploadDriver<B, K, N>
where
    B: Body + Unpin,
    B::Error: Display,
    K: ObjectSink,
    N: CompletionNotifier,
{
    pub fn new(body: B, session: UploadSession<PayloadFeed, K, N>) -> Self {
        Self { body, session, idle_timeout: None, cancellation: CancellationToken::new(), stall: None }
    }

    /// Fails the upload when no frame arrives within `idle_timeout`.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Fails the upload once `cancellation` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Runs the session to its terminal state.
    pub async fn run(mut self) -> UploadOutcome {
        while !self.session.is_terminal() {
            let event = if self.session.is_backlogged() {
                self.wait_for_sink().await
            } else {
                self.stall = None;
                select! {
                    biased;
                    () = self.cancellation.cancelled() => Event::Failed(UploadError::Cancelled),
                    event = next_event(&mut self.body, self.idle_timeout) => event,
                }
            };
            self.dispatch(event);
        }

        let outcome = self.session.outcome();
        debug!(state = ?outcome.state, bytes = outcome.bytes_transferred, "upload session finished");
        outcome
    }

    async fn wait_for_sink(&mut self) -> Event {
        let transferred = self.session.bytes_transferred();
        let since = match self.stall {
            Some((bytes, since)) if bytes == transferred => since,
            _ => {
                let now = Instant::now();
                self.stall = Some((transferred, now));
                now
            }
        };

        if let Some(idle) = self.idle_timeout
            && since.elapsed() >= idle
        {
            return Event::Failed(UploadError::timed_out(idle));
        }

        select! {
            biased;
            () = self.cancellation.cancelled() => Event::Failed(UploadError::Cancelled),
            () = tokio::time::sleep(SINK_RETRY_INTERVAL) => Event::SinkRetry,
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Data(bytes) => {
                trace!(size = bytes.len(), "body chunk received");
                self.session.source_mut().offer(PayloadItem::Chunk(bytes));
                self.session.on_readable();
            }
            Event::SinkRetry => {
                trace!(bytes = self.session.bytes_transferred(), "retrying backlogged sink");
                self.session.on_readable();
            }
            Event::Trailers => debug!("ignoring request trailers"),
            Event::Ended => {
                self.session.source_mut().offer(PayloadItem::Eof);
                self.session.on_ended();
            }
            Event::Failed(cause) => {
                self.session.on_failure(cause);
            }
        }
    }
}

async fn next_event<B>(body: &mut B, idle_timeout: Option<Duration>) -> Event
where
    B: Body + Unpin,
    B::Error: Display,
{
    let frame = match idle_timeout {
        Some(idle) => match tokio::time::timeout(idle, body.frame()).await {
            Ok(frame) => frame,
            Err(_elapsed) => return Event::Failed(UploadError::timed_out(idle)),
        },
        None => body.frame().await,
    };

    match frame {
        Some(Ok(frame)) => match frame.into_data() {
            Ok(mut data) => Event::Data(data.copy_to_bytes(data.remaining())),
            Err(_trailers) => Event::Trailers,
        },
        Some(Err(e)) => Event::Failed(UploadError::body(e)),
        None => Event::Ended,
    }
}

impl<B, K, N> fmt::Debug for UploadDriver<B, K, N>
where
    K: ObjectSink,
    N: CompletionNotifier,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadDriver")
            .field("session", &self.session)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ResponseNotifier, ResponseReceiver, SessionState};
    use futures::stream;
    use http::{HeaderMap, StatusCode};
    use http_body::Frame;
    use http_body_util::StreamBody;
    use micro_lfs_store::{AtomicObjectWriter, FileObjectRepository, LongObjectId};
    use std::io;
    use tempfile::TempDir;

    type FrameResult = Result<Frame<Bytes>, io::Error>;
    type TestSession<K> = UploadSession<PayloadFeed, K, ResponseNotifier>;

    fn body_of(frames: Vec<FrameResult>) -> StreamBody<stream::Iter<std::vec::IntoIter<FrameResult>>> {
        StreamBody::new(stream::iter(frames))
    }

    fn data(bytes: &'static [u8]) -> FrameResult {
        Ok(Frame::data(Bytes::from_static(bytes)))
    }

    struct Fixture {
        _dir: TempDir,
        repository: FileObjectRepository,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let repository = FileObjectRepository::new(dir.path());
            Self { _dir: dir, repository }
        }

        fn session(&self, id: &LongObjectId) -> (TestSession<AtomicObjectWriter>, ResponseReceiver) {
            self.session_with(id, self.repository.open_sink(id).unwrap())
        }

        fn session_with<K: ObjectSink>(&self, id: &LongObjectId, sink: K) -> (TestSession<K>, ResponseReceiver) {
            let (notifier, receiver) = ResponseNotifier::channel();
            let session = UploadSession::new(PayloadFeed::new(), sink, notifier, self.repository.path(id));
            (session.with_buffer_capacity(4), receiver)
        }
    }

    #[tokio::test]
    async fn test_streams_body_into_repository() {
        let fixture = Fixture::new();
        let id = LongObjectId::compute(b"hello, large object");
        let (session, receiver) = fixture.session(&id);

        let mut trailers = HeaderMap::new();
        trailers.insert("x-checksum", "ignored".parse().unwrap());
        let body = body_of(vec![data(b"hello, "), data(b"large "), data(b"object"), Ok(Frame::trailers(trailers))]);

        let outcome = UploadDriver::new(body, session).run().await;
        assert_eq!(outcome, UploadOutcome { state: SessionState::Completed, bytes_transferred: 19 });
        assert_eq!(receiver.response().await.unwrap().status(), StatusCode::OK);
        assert_eq!(fixture.repository.size(&id).unwrap(), Some(19));
    }

    #[tokio::test]
    async fn test_body_error_aborts() {
        let fixture = Fixture::new();
        let id = LongObjectId::compute(b"never finished");
        let (session, receiver) = fixture.session(&id);
        let body = body_of(vec![data(b"never "), Err(io::Error::other("connection reset"))]);

        let outcome = UploadDriver::new(body, session).run().await;
        assert_eq!(outcome.state, SessionState::Aborted);
        assert_eq!(outcome.bytes_transferred, 6);
        assert_eq!(receiver.response().await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!fixture.repository.exists(&id));
    }

    #[tokio::test]
    async fn test_wrong_content_is_rejected() {
        let fixture = Fixture::new();
        let id = LongObjectId::compute(b"promised content");
        let (session, receiver) = fixture.session(&id);
        let body = body_of(vec![data(b"different content")]);

        let outcome = UploadDriver::new(body, session).run().await;
        assert_eq!(outcome.state, SessionState::Aborted);
        assert_eq!(receiver.response().await.unwrap().status(), StatusCode::BAD_REQUEST);
        assert!(!fixture.repository.exists(&id));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let fixture = Fixture::new();
        let id = LongObjectId::compute(b"cancelled");
        let (session, receiver) = fixture.session(&id);
        let token = CancellationToken::new();
        token.cancel();

        let body = StreamBody::new(stream::pending::<FrameResult>());
        let outcome = UploadDriver::new(body, session).with_cancellation(token).run().await;
        assert_eq!(outcome.state, SessionState::Aborted);
        assert_eq!(receiver.response().await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Accepts nothing for the first `stalls` writes, then forwards to `inner`.
    #[derive(Debug)]
    struct Hesitant<K> {
        inner: K,
        stalls: usize,
    }

    impl<K: ObjectSink> ObjectSink for Hesitant<K> {
        fn write(&mut self, buf: &[u8]) -> Result<usize, micro_lfs_store::StoreError> {
            if self.stalls > 0 {
                self.stalls -= 1;
                return Ok(0);
            }
            self.inner.write(buf)
        }

        fn abort(&mut self) -> Result<(), micro_lfs_store::StoreError> {
            self.inner.abort()
        }

        fn close(&mut self) -> Result<(), micro_lfs_store::StoreError> {
            self.inner.close()
        }
    }

    #[tokio::test]
    async fn test_waits_for_stalled_sink() {
        let fixture = Fixture::new();
        let id = LongObjectId::compute(b"slow disk, patient server");
        let sink = Hesitant { inner: fixture.repository.open_sink(&id).unwrap(), stalls: 40 };
        let (session, receiver) = fixture.session_with(&id, sink);

        let body = body_of(vec![data(b"slow disk, "), data(b"patient server")]);
        let outcome = UploadDriver::new(body, session).with_idle_timeout(Some(Duration::from_secs(5))).run().await;
        assert_eq!(outcome, UploadOutcome { state: SessionState::Completed, bytes_transferred: 25 });
        assert_eq!(receiver.response().await.unwrap().status(), StatusCode::OK);
        assert_eq!(fixture.repository.size(&id).unwrap(), Some(25));
    }

    #[tokio::test]
    async fn test_idle_timeout_bounds_stalled_sink() {
        let fixture = Fixture::new();
        let id = LongObjectId::compute(b"never written");
        let sink = Hesitant { inner: fixture.repository.open_sink(&id).unwrap(), stalls: usize::MAX };
        let (session, receiver) = fixture.session_with(&id, sink);

        let body = body_of(vec![data(b"never written")]);
        let outcome = UploadDriver::new(body, session).with_idle_timeout(Some(Duration::from_millis(20))).run().await;
        assert_eq!(outcome, UploadOutcome { state: SessionState::Aborted, bytes_transferred: 0 });
        assert_eq!(receiver.response().await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!fixture.repository.exists(&id));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let fixture = Fixture::new();
        let id = LongObjectId::compute(b"slow client");
        let (session, receiver) = fixture.session(&id);

        let body = StreamBody::new(stream::pending::<FrameResult>());
        let outcome = UploadDriver::new(body, session).with_idle_timeout(Some(Duration::from_millis(20))).run().await;
        assert_eq!(outcome.state, SessionState::Aborted);
        assert_eq!(receiver.response().await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!fixture.repository.exists(&id));
    }
}
