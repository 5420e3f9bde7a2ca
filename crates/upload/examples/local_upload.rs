//! Streams a generated object into a temporary repository, once intact and once corrupted.
//!
//! ```sh
//! cargo run -p micro-lfs-upload --example local_upload
//! ```

use std::convert::Infallible;
use std::path::Path;

use bytes::Bytes;
use futures::stream;
use http_body::Frame;
use http_body_util::StreamBody;
use micro_lfs_store::{FileObjectRepository, LongObjectId};
use micro_lfs_upload::{ObjectUploadService, UploadConfig};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

const OBJECT_SIZE: usize = 1024 * 1024;
const FRAME_SIZE: usize = 16 * 1024;

fn body_of(content: &Bytes) -> StreamBody<impl futures::Stream<Item = Result<Frame<Bytes>, Infallible>> + Unpin> {
    let frames: Vec<_> =
        content.chunks(FRAME_SIZE).map(|chunk| Ok(Frame::data(Bytes::copy_from_slice(chunk)))).collect();
    StreamBody::new(stream::iter(frames))
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let dir = tempfile::tempdir().expect("can't create temporary directory");
    let repository = FileObjectRepository::new(dir.path());
    let service = ObjectUploadService::new(repository.clone(), UploadConfig::builder().idle_timeout_secs(5).build())
        .with_callback(|path: &Path, size: u64| info!(path = %path.display(), size, "object stored"));

    let content: Bytes = (0..=u8::MAX).cycle().take(OBJECT_SIZE).collect();
    let id = LongObjectId::compute(&content);

    let response = service.put_object(&id.to_string(), body_of(&content)).await;
    info!(status = %response.status(), exists = repository.exists(&id), "intact upload");

    let mut corrupted = content.to_vec();
    corrupted[OBJECT_SIZE / 2] ^= 0xff;
    let response = service.put_object(&id.to_string(), body_of(&Bytes::from(corrupted))).await;
    info!(status = %response.status(), "corrupted upload");
}
