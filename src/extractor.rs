//! Encoded sample extraction.
//!
//! [`Extractor`] wraps a [`Demuxer`] and exposes exactly what the playback
//! engine needs: the selected video track's format, an ordered sample read /
//! advance cursor, and keyframe-snapping seeks. Container parsing itself is
//! delegated to the demuxer; [`MemoryDemuxer`] is the minimal in-repo
//! implementation backed by an in-memory sample table.

use serde::{Deserialize, Serialize};

use crate::error::ExtractorError;

/// Format metadata for one track in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFormat {
    /// MIME type, e.g. `video/avc`.
    pub mime: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Display rotation in degrees (0, 90, 180, 270).
    pub rotation_degrees: u32,
    /// Track duration in microseconds.
    pub duration_us: i64,
    /// Source frame rate, if the container records one.
    pub frame_rate: Option<f64>,
}

impl TrackFormat {
    /// Convenience constructor for a video track format.
    pub fn video(width: u32, height: u32, frame_rate: f64, duration_us: i64) -> Self {
        Self {
            mime: "video/avc".to_string(),
            width,
            height,
            rotation_degrees: 0,
            duration_us,
            frame_rate: Some(frame_rate),
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }

    /// A video format the decoder can actually play.
    pub fn is_usable_video(&self) -> bool {
        self.is_video() && self.width > 0 && self.height > 0
    }
}

/// One encoded access unit read from the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Payload size in bytes.
    pub size: usize,
    /// Presentation timestamp in microseconds.
    pub pts_us: i64,
    /// Whether this sample is a sync point (keyframe).
    pub sync_frame: bool,
}

/// Container demultiplexer seam.
///
/// Mirrors the shape of a platform media extractor: a per-track format table,
/// a read/advance cursor over the selected track, and sync-snapping seeks.
pub trait Demuxer: Send {
    fn track_count(&self) -> usize;

    fn track_format(&self, index: usize) -> Option<&TrackFormat>;

    fn select_track(&mut self, index: usize);

    /// Track index of the sample at the cursor, `None` past end of stream.
    fn sample_track_index(&self) -> Option<usize>;

    /// Copy the sample at the cursor into `buf` (replacing its contents).
    /// Returns `None` at end of stream. Does not advance the cursor.
    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Option<Sample>;

    /// Move the cursor to the next sample. Returns false at end of stream.
    fn advance(&mut self) -> bool;

    /// Move the cursor to the nearest sync sample at or before `time_us`.
    fn seek_to_previous_sync(&mut self, time_us: i64);
}

/// Sample source for the playback engine: a demuxer bound to its first
/// video track.
pub struct Extractor {
    demuxer: Box<dyn Demuxer>,
    video_track: usize,
    format: TrackFormat,
}

impl Extractor {
    /// Bind to a demuxed source, selecting its first video track.
    pub fn new(mut demuxer: Box<dyn Demuxer>) -> Result<Self, ExtractorError> {
        let video_track = (0..demuxer.track_count())
            .find(|&i| demuxer.track_format(i).is_some_and(|f| f.is_video()))
            .ok_or(ExtractorError::NoVideoTrack)?;
        let format = demuxer
            .track_format(video_track)
            .cloned()
            .ok_or(ExtractorError::NoVideoTrack)?;
        demuxer.select_track(video_track);
        log::info!(
            "Extractor bound: track {} {} {}x{} @ {:.1} fps, {} us",
            video_track,
            format.mime,
            format.width,
            format.height,
            format.frame_rate.unwrap_or(1.0),
            format.duration_us
        );
        Ok(Self {
            demuxer,
            video_track,
            format,
        })
    }

    /// The selected track's format, if it is playable video.
    pub fn video_format(&self) -> Option<&TrackFormat> {
        self.format.is_usable_video().then_some(&self.format)
    }

    /// Source frame rate; containers without one report 1 fps.
    pub fn frame_rate(&self) -> f64 {
        self.format.frame_rate.unwrap_or(1.0)
    }

    pub fn duration_us(&self) -> i64 {
        self.format.duration_us
    }

    /// Read the sample at the cursor into `buf` without advancing.
    /// Samples belonging to other tracks are skipped over.
    pub fn read_sample(&mut self, buf: &mut Vec<u8>) -> Option<Sample> {
        loop {
            match self.demuxer.sample_track_index() {
                Some(track) if track == self.video_track => {
                    return self.demuxer.read_sample(buf);
                }
                Some(_) => {
                    // Foreign track sample; step over it.
                    if !self.demuxer.advance() {
                        return None;
                    }
                }
                None => return None,
            }
        }
    }

    /// Advance past the sample at the cursor.
    pub fn advance(&mut self) -> bool {
        self.demuxer.advance()
    }

    /// Realign the cursor to the sync point at or before `time_us`.
    pub fn seek_to(&mut self, time_us: i64) {
        let clamped = time_us.clamp(0, self.format.duration_us.max(0));
        self.demuxer.seek_to_previous_sync(clamped);
    }
}

/// One sample in a [`MemoryDemuxer`] track.
#[derive(Debug, Clone)]
pub struct MemorySample {
    pub data: Vec<u8>,
    pub pts_us: i64,
    pub sync: bool,
}

/// One track in a [`MemoryDemuxer`].
#[derive(Debug, Clone)]
pub struct MemoryTrack {
    pub format: TrackFormat,
    pub samples: Vec<MemorySample>,
}

impl MemoryTrack {
    /// Build a synthetic video track: `frames` samples at `frame_rate`, a
    /// sync frame every 30 samples, tiny placeholder payloads.
    pub fn synthetic(width: u32, height: u32, frame_rate: f64, frames: usize) -> Self {
        const SYNC_INTERVAL: usize = 30;
        let frame_us = (1_000_000.0 / frame_rate) as i64;
        let samples = (0..frames)
            .map(|i| MemorySample {
                data: vec![0x42; 64],
                pts_us: i as i64 * frame_us,
                sync: i % SYNC_INTERVAL == 0,
            })
            .collect();
        // Rounded, not summed from the truncated interval, so a 24-frame
        // 24 fps track reports exactly one second.
        let duration_us = (frames as f64 * 1_000_000.0 / frame_rate).round() as i64;
        Self {
            format: TrackFormat::video(width, height, frame_rate, duration_us),
            samples,
        }
    }
}

/// Minimal in-memory demuxer over a prebuilt sample table.
pub struct MemoryDemuxer {
    tracks: Vec<MemoryTrack>,
    selected: Option<usize>,
    cursor: usize,
}

impl MemoryDemuxer {
    pub fn new(tracks: Vec<MemoryTrack>) -> Self {
        Self {
            tracks,
            selected: None,
            cursor: 0,
        }
    }

    /// Single synthetic video track, ready to hand to [`Extractor::new`].
    pub fn synthetic_clip(width: u32, height: u32, frame_rate: f64, frames: usize) -> Self {
        Self::new(vec![MemoryTrack::synthetic(width, height, frame_rate, frames)])
    }

    fn selected_track(&self) -> Option<&MemoryTrack> {
        self.selected.and_then(|i| self.tracks.get(i))
    }
}

impl Demuxer for MemoryDemuxer {
    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn track_format(&self, index: usize) -> Option<&TrackFormat> {
        self.tracks.get(index).map(|t| &t.format)
    }

    fn select_track(&mut self, index: usize) {
        self.selected = Some(index);
        self.cursor = 0;
    }

    fn sample_track_index(&self) -> Option<usize> {
        let track = self.selected_track()?;
        (self.cursor < track.samples.len()).then_some(self.selected.unwrap_or(0))
    }

    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Option<Sample> {
        let track = self.selected_track()?;
        let sample = track.samples.get(self.cursor)?;
        buf.clear();
        buf.extend_from_slice(&sample.data);
        Some(Sample {
            size: sample.data.len(),
            pts_us: sample.pts_us,
            sync_frame: sample.sync,
        })
    }

    fn advance(&mut self) -> bool {
        let Some(track) = self.selected_track() else {
            return false;
        };
        if self.cursor + 1 < track.samples.len() {
            self.cursor += 1;
            true
        } else {
            self.cursor = track.samples.len();
            false
        }
    }

    fn seek_to_previous_sync(&mut self, time_us: i64) {
        let Some(track) = self.selected_track() else {
            return;
        };
        let mut target = 0;
        for (i, sample) in track.samples.iter().enumerate() {
            if sample.pts_us > time_us {
                break;
            }
            if sample.sync {
                target = i;
            }
        }
        self.cursor = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_format() -> TrackFormat {
        TrackFormat {
            mime: "audio/mp4a-latm".to_string(),
            width: 0,
            height: 0,
            rotation_degrees: 0,
            duration_us: 1_000_000,
            frame_rate: None,
        }
    }

    #[test]
    fn test_selects_first_video_track() {
        let demuxer = MemoryDemuxer::new(vec![
            MemoryTrack {
                format: audio_format(),
                samples: vec![],
            },
            MemoryTrack::synthetic(1280, 720, 120.0, 10),
        ]);
        let extractor = Extractor::new(Box::new(demuxer)).unwrap();
        let format = extractor.video_format().unwrap();
        assert_eq!(format.width, 1280);
        assert_eq!(format.height, 720);
    }

    #[test]
    fn test_no_video_track_is_an_error() {
        let demuxer = MemoryDemuxer::new(vec![MemoryTrack {
            format: audio_format(),
            samples: vec![],
        }]);
        assert!(matches!(
            Extractor::new(Box::new(demuxer)),
            Err(ExtractorError::NoVideoTrack)
        ));
    }

    #[test]
    fn test_synthetic_duration_rounds_to_clip_length() {
        // 24 frames at 24 fps is exactly one second even though the
        // per-frame interval truncates to 41_666 us.
        let track = MemoryTrack::synthetic(1280, 720, 24.0, 24);
        assert_eq!(track.format.duration_us, 1_000_000);
        assert_eq!(track.samples.last().unwrap().pts_us, 23 * 41_666);
    }

    #[test]
    fn test_frame_rate_defaults_to_one() {
        let mut track = MemoryTrack::synthetic(640, 480, 30.0, 5);
        track.format.frame_rate = None;
        let extractor = Extractor::new(Box::new(MemoryDemuxer::new(vec![track]))).unwrap();
        assert_eq!(extractor.frame_rate(), 1.0);
    }

    #[test]
    fn test_read_does_not_advance() {
        let demuxer = MemoryDemuxer::synthetic_clip(1280, 720, 120.0, 3);
        let mut extractor = Extractor::new(Box::new(demuxer)).unwrap();
        let mut buf = Vec::new();

        let first = extractor.read_sample(&mut buf).unwrap();
        let again = extractor.read_sample(&mut buf).unwrap();
        assert_eq!(first, again);

        assert!(extractor.advance());
        let next = extractor.read_sample(&mut buf).unwrap();
        assert!(next.pts_us > first.pts_us);
    }

    #[test]
    fn test_end_of_stream() {
        let demuxer = MemoryDemuxer::synthetic_clip(1280, 720, 120.0, 2);
        let mut extractor = Extractor::new(Box::new(demuxer)).unwrap();
        let mut buf = Vec::new();

        assert!(extractor.read_sample(&mut buf).is_some());
        assert!(extractor.advance());
        assert!(extractor.read_sample(&mut buf).is_some());
        assert!(!extractor.advance());
        assert!(extractor.read_sample(&mut buf).is_none());
    }

    #[test]
    fn test_seek_snaps_to_previous_sync() {
        // 100 fps, sync every 30 frames: sync points at 0, 300_000, 600_000 us.
        let demuxer = MemoryDemuxer::synthetic_clip(1280, 720, 100.0, 90);
        let mut extractor = Extractor::new(Box::new(demuxer)).unwrap();
        let mut buf = Vec::new();

        extractor.seek_to(400_000);
        let sample = extractor.read_sample(&mut buf).unwrap();
        assert_eq!(sample.pts_us, 300_000);
        assert!(sample.sync_frame);

        extractor.seek_to(0);
        let sample = extractor.read_sample(&mut buf).unwrap();
        assert_eq!(sample.pts_us, 0);
    }
}
