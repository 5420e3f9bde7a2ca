//! Moving body bytes from the network to an object sink.
//!
//! - [`Source`]: the non-blocking read contract of a request body
//! - [`PayloadFeed`]: the source the dispatcher fills with [`PayloadItem`]s
//! - [`RelayBuffer`]: the bounded staging area in between, nothing is read while it holds
//!   bytes the sink has not accepted yet

mod buffer;
mod payload_feed;
mod source;

pub use buffer::{DEFAULT_CAPACITY, MAX_STALLED_WRITES, RelayBuffer};
pub use payload_feed::{PayloadFeed, PayloadItem};
pub use source::{ReadStatus, Source};
