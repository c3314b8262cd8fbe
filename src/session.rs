//! Hardware decode session abstraction.
//!
//! A [`DecodeSession`] models an asynchronous hardware decoder: the session
//! announces free input buffer slots and finished output buffers as
//! [`SessionEvent`]s on a channel, and the playback engine drives it by
//! filling input slots and releasing output slots back. Platform backends
//! implement this trait over the real codec; [`LoopbackSession`] provides a
//! software stand-in for development and tests.
//!
//! [`LoopbackSession`]: crate::loopback::LoopbackSession

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// Buffer metadata accompanying an output buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Payload size in bytes (zero for a bare EOS marker).
    pub size: usize,
    /// Payload offset within the buffer.
    pub offset: usize,
    /// Presentation timestamp in microseconds.
    pub pts_us: i64,
    /// Buffer flags.
    pub flags: BufferFlags,
}

/// Flags carried on input and output buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferFlags {
    /// No further data follows until the session is restarted.
    pub end_of_stream: bool,
    /// The buffer holds a sync frame (seek anchor).
    pub sync_frame: bool,
}

impl BufferFlags {
    /// Flags for an empty end-of-stream marker buffer.
    pub fn eos() -> Self {
        Self {
            end_of_stream: true,
            sync_frame: false,
        }
    }
}

/// Asynchronous notifications emitted by a decode session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The input buffer slot at `index` is free to be filled.
    InputBufferAvailable(usize),
    /// A decoded buffer is ready at `index`.
    OutputBufferAvailable(usize, BufferInfo),
    /// The output format changed; timing anchors should be re-established.
    OutputFormatChanged { width: u32, height: u32 },
    /// The codec reported an error. Delivery does not stop the session.
    Error(String),
}

/// Opaque vendor-specific decoder parameters, applied at configure time.
///
/// Keys and meanings are backend-defined; the engine passes the pack through
/// without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorParams {
    entries: BTreeMap<String, i64>,
}

impl VendorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.entries.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Display target accepting timed or immediate frame presentation.
pub trait DisplaySurface: Send + Sync {
    /// Present a frame. `display_at` is the wall-clock deadline for the
    /// frame, or `None` to present immediately without timing.
    fn present(&self, pts_us: i64, display_at: Option<Instant>);
}

/// An asynchronous hardware decode session.
///
/// Contract expected by the playback engine:
/// - events are delivered in codec order on the receiver returned by
///   [`events`](Self::events);
/// - [`flush`](Self::flush) discards in-flight buffers and invalidates
///   outstanding slot indices;
/// - after a flush the session must be [`start`](Self::start)ed again before
///   it delivers further events;
/// - [`stop`](Self::stop) closes the event channel, releasing any thread
///   blocked on it.
pub trait DecodeSession: Send {
    /// Bind the output surface and apply vendor parameters.
    fn configure(
        &mut self,
        surface: Arc<dyn DisplaySurface>,
        params: &VendorParams,
    ) -> Result<(), PlayerError>;

    /// Start (or restart after a flush) asynchronous operation.
    fn start(&mut self) -> Result<(), PlayerError>;

    /// Discard all in-flight input and output buffers.
    fn flush(&mut self) -> Result<(), PlayerError>;

    /// Stop the session and close the event channel.
    fn stop(&mut self);

    /// The event channel this session delivers notifications on.
    fn events(&self) -> Receiver<SessionEvent>;

    /// Borrow the writable input buffer at `index`.
    fn input_buffer(&mut self, index: usize) -> Result<&mut Vec<u8>, PlayerError>;

    /// Submit `size` bytes of the input buffer at `index` with the given
    /// presentation timestamp and flags.
    fn queue_input(
        &mut self,
        index: usize,
        size: usize,
        pts_us: i64,
        flags: BufferFlags,
    ) -> Result<(), PlayerError>;

    /// Return the output buffer at `index` to the session, presenting it to
    /// the bound surface at `display_at` (`None` = immediately, untimed).
    fn release_output(&mut self, index: usize, display_at: Option<Instant>)
        -> Result<(), PlayerError>;
}
