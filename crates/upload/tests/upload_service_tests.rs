use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream;
use http::{Method, Request, StatusCode};
use http_body::{Body, Frame, SizeHint};
use http_body_util::{BodyExt, Full, StreamBody};
use micro_lfs_store::{FileObjectRepository, LongObjectId};
use micro_lfs_upload::session::CONTENT_TYPE_GIT_LFS_JSON;
use micro_lfs_upload::{ObjectUploadService, SuccessStatus, UploadConfig};
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

type FrameResult = Result<Frame<Bytes>, io::Error>;

struct Fixture {
    _dir: TempDir,
    repository: FileObjectRepository,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repository = FileObjectRepository::new(dir.path().join("objects"));
        Self { _dir: dir, repository }
    }

    fn service(&self, config: UploadConfig) -> ObjectUploadService {
        ObjectUploadService::new(self.repository.clone(), config)
    }
}

fn content(len: usize) -> Bytes {
    (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect::<Vec<_>>().into()
}

fn chunked(content: &Bytes, chunk: usize) -> StreamBody<stream::Iter<std::vec::IntoIter<FrameResult>>> {
    let frames: Vec<FrameResult> = content.chunks(chunk).map(|c| Ok(Frame::data(Bytes::copy_from_slice(c)))).collect();
    StreamBody::new(stream::iter(frames))
}

async fn message_of(response: http::Response<Full<Bytes>>) -> String {
    assert_eq!(response.headers()[http::header::CONTENT_TYPE], CONTENT_TYPE_GIT_LFS_JSON);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    json["message"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn test_upload_commits_object_and_invokes_callback() {
    let fixture = Fixture::new();
    let completed: Arc<Mutex<Vec<(PathBuf, u64)>>> = Arc::default();
    let recorder = Arc::clone(&completed);
    let service = fixture
        .service(UploadConfig::builder().buffer_capacity(1024).build())
        .with_callback(move |path: &Path, size: u64| recorder.lock().unwrap().push((path.to_owned(), size)));

    let content = content(100_000);
    let id = LongObjectId::compute(&content);

    let response = service.put_object(&id.to_string(), chunked(&content, 3000)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let path = fixture.repository.path(&id);
    assert_eq!(std::fs::read(&path).unwrap(), content);
    assert_eq!(*completed.lock().unwrap(), vec![(path, 100_000)]);
}

#[tokio::test]
async fn test_configured_success_status() {
    let fixture = Fixture::new();
    let service = fixture.service(UploadConfig::builder().success_status(SuccessStatus::NoContent).build());

    let content = Bytes::from_static(b"tiny");
    let id = LongObjectId::compute(&content);
    let response = service.put_object(&id.to_string(), Full::new(content)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(fixture.repository.exists(&id));
}

#[tokio::test]
async fn test_corrupt_content_is_rejected() {
    let fixture = Fixture::new();
    let completed = Arc::new(Mutex::new(0));
    let recorder = Arc::clone(&completed);
    let service =
        fixture.service(UploadConfig::default()).with_callback(move |_: &Path, _: u64| *recorder.lock().unwrap() += 1);

    let id = LongObjectId::compute(b"what the client promised");
    let response = service.put_object(&id.to_string(), chunked(&content(20_000), 4096)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(message_of(response).await.contains(&id.to_string()));

    assert!(!fixture.repository.exists(&id));
    assert_eq!(*completed.lock().unwrap(), 0);

    let parent = fixture.repository.path(&id).parent().unwrap().to_owned();
    assert_eq!(std::fs::read_dir(parent).unwrap().count(), 0);
}

#[tokio::test]
async fn test_invalid_object_id() {
    let fixture = Fixture::new();
    let service = fixture.service(UploadConfig::default());

    let response = service.put_object("not-a-sha256", Full::new(Bytes::from_static(b"content"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!message_of(response).await.is_empty());
}

/// A body announcing an exact length it may not honor.
struct Announced<B> {
    inner: B,
    length: u64,
}

impl<B: Body<Data = Bytes> + Unpin> Body for Announced<B> {
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, B::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }
}

#[tokio::test]
async fn test_announced_size_mismatch() {
    let fixture = Fixture::new();
    let service = fixture.service(UploadConfig::default());

    let content = content(5000);
    let id = LongObjectId::compute(&content);

    let body = Announced { inner: chunked(&content, 1000), length: 6000 };
    let response = service.put_object(&id.to_string(), body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(message_of(response).await.contains("size mismatch"));
    assert!(!fixture.repository.exists(&id));

    let body = Announced { inner: chunked(&content, 1000), length: 4000 };
    let response = service.put_object(&id.to_string(), body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!fixture.repository.exists(&id));
}

#[tokio::test]
async fn test_upload_of_existing_object() {
    let fixture = Fixture::new();
    let service = fixture.service(UploadConfig::default());

    let content = content(5000);
    let id = LongObjectId::compute(&content);
    for _ in 0..2 {
        let response = service.put_object(&id.to_string(), chunked(&content, 700)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(fixture.repository.size(&id).unwrap(), Some(5000));
}

#[tokio::test]
async fn test_transport_failure() {
    let fixture = Fixture::new();
    let service = fixture.service(UploadConfig::default());

    let id = LongObjectId::compute(b"interrupted upload");
    let frames: Vec<FrameResult> = vec![
        Ok(Frame::data(Bytes::from_static(b"interrupted"))),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
    ];
    let response = service.put_object(&id.to_string(), StreamBody::new(stream::iter(frames))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(message_of(response).await.contains("reset by peer"));
    assert!(!fixture.repository.exists(&id));
}

#[tokio::test]
async fn test_shutdown_aborts_upload() {
    let fixture = Fixture::new();
    let shutdown = CancellationToken::new();
    let service = fixture.service(UploadConfig::default()).with_shutdown(shutdown.clone());
    shutdown.cancel();

    let id = LongObjectId::compute(b"never sent");
    let response = service.put_object(&id.to_string(), StreamBody::new(stream::pending::<FrameResult>())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!fixture.repository.exists(&id));
}

#[tokio::test]
async fn test_handle_request() {
    let fixture = Fixture::new();
    let service = fixture.service(UploadConfig::default());

    let content = Bytes::from_static(b"routed through a request");
    let id = LongObjectId::compute(&content);

    let uri = format!("/objects/{id}");
    let request = Request::builder().method(Method::PUT).uri(&uri).body(Full::new(content)).unwrap();
    assert_eq!(service.handle(request).await.status(), StatusCode::OK);
    assert!(fixture.repository.exists(&id));

    let request = Request::builder().method(Method::GET).uri(&uri).body(Full::new(Bytes::new())).unwrap();
    assert_eq!(service.handle(request).await.status(), StatusCode::METHOD_NOT_ALLOWED);
}
