//! Error types for the playback engine.

use thiserror::Error;

/// Errors that can occur while binding an extractor to a media source.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("failed to open media source: {0}")]
    OpenFailed(String),
    #[error("media source has no video track")]
    NoVideoTrack,
    #[error("sample read failed: {0}")]
    ReadFailed(String),
}

/// Errors crossing the decoder's public boundary.
///
/// Most failure modes are reported through the listener interface instead
/// (see [`ErrorCode`]); only source-open failures and decode session faults
/// surface as typed errors.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
    #[error("decode session: {0}")]
    Session(String),
}

/// Non-fatal error codes delivered through
/// [`PlaybackListener::on_error_format`](crate::listener::PlaybackListener::on_error_format).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The media source could not be opened at all.
    InvalidFile,
    /// Reserved for hosts that address decoder instances by layer id.
    InvalidLayerId,
    /// The source exposes no usable video format.
    NoValidVideoTrack,
    /// Resolution or frame rate falls outside the device capability bounds.
    /// Reported once at initialize; playback still proceeds.
    Dimensions,
}
