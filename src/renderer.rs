//! Frame presentation scheduling.
//!
//! The renderer turns source-relative presentation timestamps into wall-clock
//! display deadlines. The first frame released after each (re)start or
//! seek-resume anchors the clock; every later frame is scheduled at
//! `anchor + (pts - anchor_pts)`. While the user scrubs, frames bypass the
//! clock and present immediately.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::PlayerError;
use crate::session::{BufferInfo, DecodeSession};

type FrameListener = Box<dyn Fn(i64) + Send + Sync>;

#[derive(Default)]
struct Clock {
    /// Wall-clock instant and PTS of the anchoring frame.
    anchor: Option<(Instant, i64)>,
}

/// Schedules decoded buffers onto the display target and reports each
/// handled frame's original presentation timestamp.
#[derive(Default)]
pub struct Renderer {
    clock: Mutex<Clock>,
    listener: Mutex<Option<FrameListener>>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback notified with the PTS of every frame handled,
    /// rendered or dropped.
    pub fn set_frame_listener(&self, listener: impl Fn(i64) + Send + Sync + 'static) {
        *self.listener.lock().expect("renderer listener lock poisoned") = Some(Box::new(listener));
    }

    pub fn clear_frame_listener(&self) {
        *self.listener.lock().expect("renderer listener lock poisoned") = None;
    }

    /// Drop the timing anchor; the next timed frame re-anchors the clock.
    /// Called after restarts, seeks and output format changes.
    pub fn reset_clock(&self) {
        self.clock.lock().expect("renderer clock lock poisoned").anchor = None;
    }

    /// Release the output buffer at `index` back to the session, presenting
    /// it at its scheduled deadline, or immediately when `immediate` is set.
    /// The frame listener is always notified with the buffer's PTS.
    pub fn render(
        &self,
        session: &mut dyn DecodeSession,
        index: usize,
        info: &BufferInfo,
        immediate: bool,
    ) -> Result<(), PlayerError> {
        let display_at = if immediate {
            None
        } else {
            Some(self.deadline(info.pts_us))
        };
        let result = session.release_output(index, display_at);
        if let Some(listener) = &*self.listener.lock().expect("renderer listener lock poisoned") {
            listener(info.pts_us);
        }
        result
    }

    fn deadline(&self, pts_us: i64) -> Instant {
        let mut clock = self.clock.lock().expect("renderer clock lock poisoned");
        let (anchor_at, anchor_pts) = *clock.anchor.get_or_insert_with(|| (Instant::now(), pts_us));
        let delta_us = pts_us - anchor_pts;
        if delta_us <= 0 {
            // Never schedule before the anchor; late frames present at once.
            anchor_at
        } else {
            anchor_at + Duration::from_micros(delta_us as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackSession;
    use crate::session::{BufferFlags, DisplaySurface};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSurface {
        presented: Mutex<Vec<(i64, Option<Instant>)>>,
    }

    impl DisplaySurface for RecordingSurface {
        fn present(&self, pts_us: i64, display_at: Option<Instant>) {
            self.presented
                .lock()
                .unwrap()
                .push((pts_us, display_at));
        }
    }

    /// Session with two decoded outputs (pts 0 and 40_000 us) ready to release.
    fn session_with_two_frames(
        surface: Arc<RecordingSurface>,
    ) -> (LoopbackSession, BufferInfo, BufferInfo) {
        let mut session = LoopbackSession::new();
        session
            .configure(surface, &Default::default())
            .unwrap();
        session.start().unwrap();
        session
            .queue_input(0, 8, 0, BufferFlags::default())
            .unwrap();
        session
            .queue_input(1, 8, 40_000, BufferFlags::default())
            .unwrap();
        let info = |pts_us| BufferInfo {
            size: 8,
            offset: 0,
            pts_us,
            flags: BufferFlags::default(),
        };
        (session, info(0), info(40_000))
    }

    #[test]
    fn test_timed_release_preserves_pts_spacing() {
        let surface = Arc::new(RecordingSurface::default());
        let (mut session, first, second) = session_with_two_frames(surface.clone());
        let renderer = Renderer::new();

        renderer.render(&mut session, 0, &first, false).unwrap();
        renderer.render(&mut session, 1, &second, false).unwrap();

        let presented = surface.presented.lock().unwrap();
        let at0 = presented[0].1.unwrap();
        let at1 = presented[1].1.unwrap();
        assert_eq!(at1.duration_since(at0), Duration::from_micros(40_000));
    }

    #[test]
    fn test_immediate_release_bypasses_clock() {
        let surface = Arc::new(RecordingSurface::default());
        let (mut session, first, _) = session_with_two_frames(surface.clone());
        let renderer = Renderer::new();

        renderer.render(&mut session, 0, &first, true).unwrap();

        let presented = surface.presented.lock().unwrap();
        assert_eq!(presented[0].0, 0);
        assert!(presented[0].1.is_none());
    }

    #[test]
    fn test_reset_clock_reanchors_on_next_frame() {
        let surface = Arc::new(RecordingSurface::default());
        let (mut session, first, second) = session_with_two_frames(surface.clone());
        let renderer = Renderer::new();

        renderer.render(&mut session, 0, &first, false).unwrap();
        renderer.reset_clock();
        let before = Instant::now();
        renderer.render(&mut session, 1, &second, false).unwrap();

        // Re-anchored: frame at pts 40_000 presents now, not 40 ms after
        // the first frame's deadline.
        let presented = surface.presented.lock().unwrap();
        let at1 = presented[1].1.unwrap();
        assert!(at1 >= before);
        assert!(at1.duration_since(before) < Duration::from_millis(20));
    }

    #[test]
    fn test_frame_listener_sees_every_pts() {
        let surface = Arc::new(RecordingSurface::default());
        let (mut session, first, second) = session_with_two_frames(surface);
        let renderer = Renderer::new();
        let last_pts = Arc::new(AtomicI64::new(-1));
        let seen = last_pts.clone();
        renderer.set_frame_listener(move |pts| seen.store(pts, Ordering::SeqCst));

        renderer.render(&mut session, 0, &first, false).unwrap();
        assert_eq!(last_pts.load(Ordering::SeqCst), 0);
        renderer.render(&mut session, 1, &second, true).unwrap();
        assert_eq!(last_pts.load(Ordering::SeqCst), 40_000);
    }
}
