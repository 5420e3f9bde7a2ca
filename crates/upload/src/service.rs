use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::Full;
use micro_lfs_store::{FileObjectRepository, LongObjectId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span, warn};

use crate::UploadConfig;
use crate::driver::UploadDriver;
use crate::relay::PayloadFeed;
use crate::session::{ResponseNotifier, UploadCallback, UploadSession, error_response};

/// Accepts object uploads into a [`FileObjectRepository`].
///
/// Each upload opens a sink for the addressed object, relays the request body into it and
/// answers once the object was committed or the upload aborted.
#[derive(Clone)]
pub struct ObjectUploadService {
    repository: FileObjectRepository,
    config: UploadConfig,
    callback: Option<Arc<dyn UploadCallback>>,
    shutdown: CancellationToken,
}

impl ObjectUploadService {
    pub fn new(repository: FileObjectRepository, config: UploadConfig) -> Self {
        Self { repository, config, callback: None, shutdown: CancellationToken::new() }
    }

    /// Invokes `callback` after every committed upload.
    #[must_use]
    pub fn with_callback(mut self, callback: impl UploadCallback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Aborts every running upload once `shutdown` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn repository(&self) -> &FileObjectRepository {
        &self.repository
    }

    /// Handles `PUT .../<oid>`, the object id being the last path segment.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        if request.method() != Method::PUT {
            return error_response(StatusCode::METHOD_NOT_ALLOWED, &format!("method {} not allowed", request.method()));
        }

        let oid = request.uri().path().rsplit('/').next().unwrap_or_default().to_owned();
        self.put_object(&oid, request.into_body()).await
    }

    /// Stores `body` as the object `oid`.
    ///
    /// An exact size hint of the body (a `Content-Length`) becomes the expected object size.
    pub async fn put_object<B>(&self, oid: &str, body: B) -> Response<Full<Bytes>>
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        let id = match oid.parse::<LongObjectId>() {
            Ok(id) => id,
            Err(e) => {
                warn!(oid, cause = %e, "rejecting upload");
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        };

        let sink = match body.size_hint().exact() {
            Some(size) => self.repository.open_sink_with_size(&id, size),
            None => self.repository.open_sink(&id),
        };
        let sink = match sink {
            Ok(sink) => sink,
            Err(e) => {
                error!(oid = %id, cause = %e, "can't open object sink");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
            }
        };

        let path = self.repository.path(&id);
        let (notifier, receiver) = ResponseNotifier::channel();
        let mut session = UploadSession::new(PayloadFeed::new(), sink, notifier, path.clone())
            .with_buffer_capacity(self.config.buffer_capacity)
            .with_success_status(self.config.success_status.status_code())
            .with_span(info_span!("upload", oid = %id, path = %path.display()));
        if let Some(callback) = &self.callback {
            session = session.with_callback(Arc::clone(callback));
        }

        UploadDriver::new(body, session)
            .with_idle_timeout(self.config.idle_timeout())
            .with_cancellation(self.shutdown.child_token())
            .run()
            .await;

        match receiver.response().await {
            Some(response) => response,
            None => {
                error!(oid = %id, "upload finished without a response");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "upload finished without a response")
            }
        }
    }
}

impl fmt::Debug for ObjectUploadService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUploadService")
            .field("repository", &self.repository)
            .field("config", &self.config)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}
