//! Clip Player - demo playback run
//!
//! Plays a synthetic high-frame-rate clip through the loopback decode
//! session, exercising play, scrub and teardown. An optional argument names
//! a JSON file of vendor decoder parameters to apply at configure time.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use clip_player::{
    Decoder, DeviceCaps, DisplaySurface, ErrorCode, Extractor, LoopbackSession, MemoryDemuxer,
    PlaybackListener, Renderer, VendorParams,
};

/// Surface that logs presentation and paces the loopback pipeline at
/// roughly display rate.
struct ConsoleSurface;

impl DisplaySurface for ConsoleSurface {
    fn present(&self, pts_us: i64, display_at: Option<Instant>) {
        match display_at {
            Some(_) => log::trace!("frame {pts_us} us scheduled"),
            None => log::trace!("frame {pts_us} us presented immediately"),
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Logs coarse progress and lifecycle events.
struct ConsoleListener {
    last_percent: AtomicI32,
}

impl PlaybackListener for ConsoleListener {
    fn on_playback_progress(&self, percent: i32, timestamp_us: i64, seeking: bool) {
        let previous = self.last_percent.swap(percent, Ordering::SeqCst);
        if percent / 10 != previous / 10 || seeking {
            log::info!("progress {percent}% ({timestamp_us} us, seeking: {seeking})");
        }
    }

    fn on_error_format(&self, code: ErrorCode, max_height: u32, max_width: u32) {
        log::warn!("format problem {code:?} (bounds {max_width}x{max_height})");
    }

    fn on_playback_end(&self) {
        log::info!("playback reached the end of the clip");
    }

    fn on_is_playing(&self, playing: bool) {
        log::info!("playing: {playing}");
    }
}

fn load_vendor_params() -> Result<VendorParams> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read vendor params from {path}"))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse vendor params in {path}"))
        }
        None => Ok(VendorParams::new()),
    }
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Starting Clip Player v{}", env!("CARGO_PKG_VERSION"));

    let params = load_vendor_params()?;

    // 6 seconds of synthetic 720p at 120 fps.
    let extractor = Extractor::new(Box::new(MemoryDemuxer::synthetic_clip(
        1280, 720, 120.0, 720,
    )))?;

    let mut decoder = Decoder::new(Box::new(LoopbackSession::new()), DeviceCaps::standard());
    decoder.register_listener(Arc::new(ConsoleListener {
        last_percent: AtomicI32::new(0),
    }));

    decoder.initialize(0, extractor);
    decoder.configure(Arc::new(ConsoleSurface), &params)?;
    decoder.start(Arc::new(Renderer::new()))?;

    decoder.play();
    thread::sleep(Duration::from_secs(1));

    decoder.pause();
    thread::sleep(Duration::from_millis(300));

    decoder.play();
    thread::sleep(Duration::from_millis(300));

    // Scrub to 75% and resume from there.
    decoder.seek();
    decoder.update_progress(75);
    thread::sleep(Duration::from_millis(200));
    decoder.end_seek();
    thread::sleep(Duration::from_secs(1));

    log::info!(
        "last rendered frame at {} us of {} us",
        decoder.last_rendered_pts_us(),
        decoder.duration_us()
    );

    decoder.destroy();
    Ok(())
}
