//! Stream types returned by the streaming entry points

use crate::error::Result;
use crate::stream::{StateSnapshot, StreamEvent};
use futures::stream::BoxStream;

/// Lazy stream of per-node snapshots; a failed run ends with one `Err` item
pub type SnapshotStream = BoxStream<'static, Result<StateSnapshot>>;

/// Lazy stream of run events, ending with `run_end` or `run_failed`
pub type EventStream = BoxStream<'static, StreamEvent>;
