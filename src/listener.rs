//! Playback event listeners.
//!
//! The decoder fans playback events out to every registered listener in
//! registration order. Listener methods default to no-ops so hosts only
//! implement the callbacks they care about.

use std::sync::{Arc, Mutex};

use crate::error::ErrorCode;

/// Callbacks delivered by the decoder to its host.
///
/// All methods take `&self`; implementations needing mutable state use
/// interior mutability. Callbacks may fire from the decode worker thread.
pub trait PlaybackListener: Send + Sync {
    /// Playback position changed. `percent` is 0-100 of the clip duration,
    /// `timestamp_us` the presentation time of the frame just handled, and
    /// `seeking` whether the decoder is scrubbing.
    fn on_playback_progress(&self, percent: i32, timestamp_us: i64, seeking: bool) {
        let _ = (percent, timestamp_us, seeking);
    }

    /// A configuration problem was detected. `max_height`/`max_width` carry
    /// the capability bounds for [`ErrorCode::Dimensions`], zero otherwise.
    fn on_error_format(&self, code: ErrorCode, max_height: u32, max_width: u32) {
        let _ = (code, max_height, max_width);
    }

    /// The clip played through to its end.
    fn on_playback_end(&self) {}

    /// The decoder started or stopped playing.
    fn on_is_playing(&self, playing: bool) {
        let _ = playing;
    }
}

/// Registration-ordered listener list shared between the public API and the
/// decode worker.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    entries: Arc<Mutex<Vec<Arc<dyn PlaybackListener>>>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, listener: Arc<dyn PlaybackListener>) {
        self.entries
            .lock()
            .expect("listener list lock poisoned")
            .push(listener);
    }

    pub(crate) fn unregister(&self, listener: &Arc<dyn PlaybackListener>) {
        self.entries
            .lock()
            .expect("listener list lock poisoned")
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Deliver an event to every listener in registration order. The list is
    /// snapshotted first so a callback can re-enter register/unregister.
    pub(crate) fn each(&self, f: impl Fn(&dyn PlaybackListener)) {
        let snapshot: Vec<_> = self
            .entries
            .lock()
            .expect("listener list lock poisoned")
            .clone();
        for listener in &snapshot {
            f(listener.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl PlaybackListener for Counter {
        fn on_playback_end(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fan_out_hits_every_listener() {
        let listeners = Listeners::new();
        let a = Arc::new(Counter(AtomicUsize::new(0)));
        let b = Arc::new(Counter(AtomicUsize::new(0)));
        listeners.register(a.clone());
        listeners.register(b.clone());

        listeners.each(|l| l.on_playback_end());

        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let listeners = Listeners::new();
        let a = Arc::new(Counter(AtomicUsize::new(0)));
        listeners.register(a.clone());

        let handle: Arc<dyn PlaybackListener> = a.clone();
        listeners.unregister(&handle);
        listeners.each(|l| l.on_playback_end());

        assert_eq!(a.0.load(Ordering::SeqCst), 0);
    }
}
