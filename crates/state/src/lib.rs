//! Live key/value state published by the client process.
//!
//! The client's status collector fills twelve named buckets. Scripts read
//! them through [`ProcessStateView::lookup`], which checks the buckets in a
//! fixed priority order and returns the first hit.

mod bucket;
mod snapshot;
mod view;

pub use bucket::{Bucket, BucketKind, ClientStatus, ParseBucketKindError};
pub use snapshot::{StatusError, StatusSnapshot};
pub use view::{ProcessStateView, StateSource};
