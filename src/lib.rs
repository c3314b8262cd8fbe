//! Clip Player Library
//!
//! An asynchronous video playback engine: a decoder state machine driving a
//! hardware decode session, a sample extractor, and a frame renderer.

pub mod caps;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod listener;
pub mod loopback;
pub mod renderer;
pub mod session;

// Re-export commonly used types
pub use caps::DeviceCaps;
pub use decoder::{Decoder, State};
pub use error::{ErrorCode, ExtractorError, PlayerError};
pub use extractor::{Demuxer, Extractor, MemoryDemuxer, Sample, TrackFormat};
pub use listener::PlaybackListener;
pub use loopback::LoopbackSession;
pub use renderer::Renderer;
pub use session::{
    BufferFlags, BufferInfo, DecodeSession, DisplaySurface, SessionEvent, VendorParams,
};
