use std::cmp;
use std::collections::VecDeque;

use bytes::{Buf, Bytes};
use tracing::warn;

use crate::UploadError;
use crate::relay::{ReadStatus, Source};

/// An item of the request body as delivered by the network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    /// A chunk of payload data
    Chunk(Bytes),
    /// Marks the end of the payload stream
    Eof,
}

impl PayloadItem {
    /// Returns true if this item represents the end of the payload stream
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

impl From<Bytes> for PayloadItem {
    fn from(bytes: Bytes) -> Self {
        Self::Chunk(bytes)
    }
}

/// A [`Source`] filled by the dispatcher with the payload items it received.
///
/// The dispatcher [`offer`](PayloadFeed::offer)s what the network delivered and then signals
/// the session, which drains the feed through [`Source::try_read`]. A chunk may be consumed
/// over several reads when it is larger than the free space of the reader's buffer.
#[derive(Debug, Default)]
pub struct PayloadFeed {
    chunks: VecDeque<Bytes>,
    eof: bool,
    closed: bool,
}

impl PayloadFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, item: PayloadItem) {
        if self.closed {
            return;
        }

        match item {
            PayloadItem::Chunk(bytes) if self.eof => {
                warn!(size = bytes.len(), "dropping payload chunk received after eof");
            }
            PayloadItem::Chunk(bytes) => {
                if !bytes.is_empty() {
                    self.chunks.push_back(bytes);
                }
            }
            PayloadItem::Eof => self.eof = true,
        }
    }

    /// True when every offered byte has been read.
    pub fn is_drained(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Number of offered bytes not yet read.
    pub fn buffered(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }
}

impl Source for PayloadFeed {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<ReadStatus, UploadError> {
        if buf.is_empty() {
            return Ok(ReadStatus::Read(0));
        }

        let Some(front) = self.chunks.front_mut() else {
            return Ok(if self.eof { ReadStatus::Ended } else { ReadStatus::NotReady });
        };

        let len = cmp::min(front.len(), buf.len());
        buf[..len].copy_from_slice(&front[..len]);
        front.advance(len);
        if front.is_empty() {
            self.chunks.pop_front();
        }

        Ok(ReadStatus::Read(len))
    }

    fn close(&mut self) {
        self.chunks.clear();
        self.closed = true;
    }
}
