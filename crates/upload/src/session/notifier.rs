use bytes::Bytes;
use futures::channel::oneshot;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;
use serde_json::json;
use tracing::{debug, warn};

/// Content type of every Git LFS response, errors included.
pub const CONTENT_TYPE_GIT_LFS_JSON: &str = "application/vnd.git-lfs+json";

/// The response side of an upload request.
///
/// A session sets a status (or sends an error) at most once and then calls
/// [`complete`](CompletionNotifier::complete) exactly once, which ends the request lifecycle.
#[cfg_attr(test, mockall::automock)]
pub trait CompletionNotifier {
    /// True once a response has been committed, e.g. an error was sent by an upstream layer.
    fn is_committed(&self) -> bool;

    fn set_status(&mut self, status: StatusCode);

    /// Commits an error response carrying `message`.
    fn send_error(&mut self, status: StatusCode, message: &str);

    fn complete(&mut self);
}

/// Builds the JSON body used for every error answer: `{"message": "..."}`.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    lfs_response(status, error_body(message))
}

fn error_body(message: &str) -> Bytes {
    Bytes::from(json!({ "message": message }).to_string())
}

fn lfs_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_GIT_LFS_JSON));
    response
}

/// A [`CompletionNotifier`] handing the finished HTTP response to a [`ResponseReceiver`].
#[derive(Debug)]
pub struct ResponseNotifier {
    status: StatusCode,
    body: Bytes,
    committed: bool,
    sender: Option<oneshot::Sender<Response<Full<Bytes>>>>,
}

/// Resolves to the response once the session completed.
#[derive(Debug)]
pub struct ResponseReceiver {
    receiver: oneshot::Receiver<Response<Full<Bytes>>>,
}

impl ResponseNotifier {
    pub fn channel() -> (ResponseNotifier, ResponseReceiver) {
        let (sender, receiver) = oneshot::channel();
        let notifier =
            ResponseNotifier { status: StatusCode::OK, body: Bytes::new(), committed: false, sender: Some(sender) };
        (notifier, ResponseReceiver { receiver })
    }
}

impl CompletionNotifier for ResponseNotifier {
    fn is_committed(&self) -> bool {
        self.committed
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.committed {
            warn!(%status, "response already committed, ignoring status");
            return;
        }
        self.status = status;
    }

    fn send_error(&mut self, status: StatusCode, message: &str) {
        if self.committed {
            warn!(%status, "response already committed, ignoring error");
            return;
        }
        self.status = status;
        self.body = error_body(message);
        self.committed = true;
    }

    fn complete(&mut self) {
        let Some(sender) = self.sender.take() else {
            warn!("upload request completed twice");
            return;
        };

        self.committed = true;
        let response = lfs_response(self.status, std::mem::take(&mut self.body));
        if sender.send(response).is_err() {
            debug!("response receiver dropped before the upload completed");
        }
    }
}

impl ResponseReceiver {
    /// Waits for the response, `None` if the notifier was dropped without completing.
    pub async fn response(self) -> Option<Response<Full<Bytes>>> {
        self.receiver.await.ok()
    }
}
