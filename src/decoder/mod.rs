//! Playback decoder: state machine, lifecycle, and listener fan-out.
//!
//! A [`Decoder`] owns one decode session and one extractor, and drives them
//! from a dedicated worker thread running the pump loop (see `worker`). The
//! host thread issues state-change requests; every request is validated
//! against the transition table in [`state`] before taking effect.

mod state;
mod worker;

pub use state::State;

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::caps::DeviceCaps;
use crate::error::{ErrorCode, PlayerError};
use crate::extractor::Extractor;
use crate::listener::{Listeners, PlaybackListener};
use crate::renderer::Renderer;
use crate::session::{DecodeSession, DisplaySurface, VendorParams};

/// Format facts captured at initialize time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u32,
    pub duration_us: i64,
    /// Nominal interval between frames, used to synthesize timestamps
    /// while seeking.
    pub frame_interval_us: i64,
}

/// Mutable session state, guarded by one mutex. The condvar implements the
/// blocking `Paused` wait: the worker parks here and `play()`, `seek()` and
/// `destroy()` signal it after changing state.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    cond: Condvar,
}

pub(crate) struct Inner {
    pub state: State,
    /// State held when the current seek began; restored when it finishes.
    pub resume_state: State,
    /// Desired seek target as a percentage of duration.
    pub pending_seek_pct: i32,
    /// True iff no further input is queued until output EOS is observed and
    /// the session restarted.
    pub sent_eos: bool,
    /// Input chunks submitted since the session last (re)started.
    pub chunk_count: u64,
    /// Timestamp of the last submitted input buffer.
    pub last_queued_pts_us: i64,
    /// Timestamp of the last frame the renderer handled.
    pub last_rendered_pts_us: i64,
    /// Set by `destroy()`; the worker exits as soon as it observes it.
    pub teardown: bool,
    pub info: Option<VideoInfo>,
}

impl Shared {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Uninitialized,
                resume_state: State::Uninitialized,
                pending_seek_pct: 0,
                sent_eos: false,
                chunk_count: 0,
                last_queued_pts_us: 0,
                last_rendered_pts_us: 0,
                teardown: false,
                info: None,
            }),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("decoder state lock poisoned")
    }

    pub(crate) fn state(&self) -> State {
        self.lock().state
    }

    pub(crate) fn is_teardown(&self) -> bool {
        self.lock().teardown
    }

    /// Validated transition. Illegal requests are logged and rejected
    /// without mutating state.
    pub(crate) fn change_state(&self, target: State) -> bool {
        let mut inner = self.lock();
        let current = inner.state;
        if !target.reachable_from(current) {
            log::warn!("rejected state change {current} -> {target}");
            return false;
        }
        if target == State::Seeking {
            inner.resume_state = current;
        }
        inner.state = target;
        log::debug!("state {current} -> {target}");
        if matches!(target, State::Playing | State::Seeking | State::Uninitialized) {
            self.cond.notify_all();
        }
        true
    }

    /// Unvalidated assignment, used to restore the pre-seek state and during
    /// teardown.
    pub(crate) fn force_state(&self, target: State) {
        let mut inner = self.lock();
        log::debug!("state {} -> {target} (forced)", inner.state);
        inner.state = target;
        self.cond.notify_all();
    }

    /// Transition `InitPause` -> `Paused` and block the calling thread until
    /// a transition out of `Paused` or teardown wakes it. Returns false if
    /// teardown was observed.
    pub(crate) fn enter_paused(&self) -> bool {
        let mut inner = self.lock();
        if !State::Paused.reachable_from(inner.state) {
            return !inner.teardown;
        }
        log::debug!("state {} -> {} (worker parked)", inner.state, State::Paused);
        inner.state = State::Paused;
        while inner.state == State::Paused && !inner.teardown {
            inner = self
                .cond
                .wait(inner)
                .expect("decoder state lock poisoned");
        }
        log::debug!("worker resumed in state {}", inner.state);
        !inner.teardown
    }

    pub(crate) fn begin_teardown(&self) {
        let mut inner = self.lock();
        inner.teardown = true;
        self.cond.notify_all();
    }

    fn finish_teardown(&self) {
        let mut inner = self.lock();
        inner.state = State::Uninitialized;
        inner.resume_state = State::Uninitialized;
        inner.teardown = false;
        inner.sent_eos = false;
        inner.chunk_count = 0;
        inner.last_queued_pts_us = 0;
        inner.last_rendered_pts_us = 0;
        inner.pending_seek_pct = 0;
        inner.info = None;
    }
}

type SharedSession = Arc<Mutex<Option<Box<dyn DecodeSession>>>>;
type SharedExtractor = Arc<Mutex<Option<Extractor>>>;

/// Video playback engine driven by an asynchronous decode session.
pub struct Decoder {
    shared: Arc<Shared>,
    session: SharedSession,
    extractor: SharedExtractor,
    renderer: Mutex<Option<Arc<Renderer>>>,
    listeners: Listeners,
    caps: DeviceCaps,
    worker: Option<JoinHandle<()>>,
}

impl Decoder {
    /// Create a decoder over a decode session, validating sources against
    /// the given capability bounds.
    pub fn new(session: Box<dyn DecodeSession>, caps: DeviceCaps) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            session: Arc::new(Mutex::new(Some(session))),
            extractor: Arc::new(Mutex::new(None)),
            renderer: Mutex::new(None),
            listeners: Listeners::new(),
            caps,
            worker: None,
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn PlaybackListener>) {
        self.listeners.register(listener);
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn PlaybackListener>) {
        self.listeners.unregister(listener);
    }

    /// Adopt an extractor and move to `Ready`, seeked to `saved_seek_us`
    /// (snapped to the preceding sync point).
    ///
    /// A source without a usable video format is reported through
    /// [`PlaybackListener::on_error_format`] and leaves the decoder
    /// `Uninitialized`. A source outside the capability bounds is reported
    /// the same way but playback still proceeds. Calling this again after a
    /// successful initialize is a no-op.
    pub fn initialize(&mut self, saved_seek_us: i64, mut extractor: Extractor) {
        if self.shared.state() != State::Uninitialized {
            log::warn!("initialize ignored: decoder already initialized");
            return;
        }

        let Some(format) = extractor.video_format().cloned() else {
            log::warn!("initialize failed: no usable video format");
            self.listeners
                .each(|l| l.on_error_format(ErrorCode::NoValidVideoTrack, 0, 0));
            return;
        };

        let frame_rate = extractor.frame_rate();
        if !self.caps.allows(format.width, format.height, frame_rate) {
            log::warn!(
                "source {}x{} @ {:.1} fps outside device bounds {}x{} @ {:.0}-{:.0} fps",
                format.width,
                format.height,
                frame_rate,
                self.caps.max_width,
                self.caps.max_height,
                self.caps.min_frame_rate,
                self.caps.max_frame_rate
            );
            self.listeners.each(|l| {
                l.on_error_format(
                    ErrorCode::Dimensions,
                    self.caps.max_height,
                    self.caps.max_width,
                )
            });
        }

        extractor.seek_to(saved_seek_us);

        {
            let mut inner = self.shared.lock();
            inner.info = Some(VideoInfo {
                width: format.width,
                height: format.height,
                rotation_degrees: format.rotation_degrees,
                duration_us: extractor.duration_us(),
                frame_interval_us: ((1_000_000.0 / frame_rate) as i64).max(1),
            });
        }
        *self.extractor.lock().expect("extractor lock poisoned") = Some(extractor);

        self.shared.change_state(State::Ready);
        log::info!(
            "initialized: {}x{} @ {:.1} fps, seeked to {} us",
            format.width,
            format.height,
            frame_rate,
            saved_seek_us
        );
    }

    /// Bind the output surface and apply vendor decoder parameters.
    /// Logs and no-ops while `Uninitialized`.
    pub fn configure(
        &self,
        surface: Arc<dyn DisplaySurface>,
        params: &VendorParams,
    ) -> Result<(), PlayerError> {
        if self.shared.state() == State::Uninitialized {
            log::warn!("configure ignored: decoder not initialized");
            return Ok(());
        }
        let mut guard = self.session.lock().expect("session lock poisoned");
        match guard.as_mut() {
            Some(session) => session.configure(surface, params),
            None => Err(PlayerError::Session("session released".into())),
        }
    }

    /// Register the renderer and start the pump loop on a dedicated worker
    /// thread. Logs and no-ops while `Uninitialized`.
    pub fn start(&mut self, renderer: Arc<Renderer>) -> Result<(), PlayerError> {
        if self.shared.state() == State::Uninitialized {
            log::warn!("start ignored: decoder not initialized");
            return Ok(());
        }
        if self.worker.is_some() {
            log::warn!("start ignored: decode pump already running");
            return Ok(());
        }

        renderer.reset_clock();
        renderer.set_frame_listener(Self::progress_reporter(
            self.shared.clone(),
            self.listeners.clone(),
        ));
        *self.renderer.lock().expect("renderer slot lock poisoned") = Some(renderer.clone());

        let events = {
            let mut guard = self.session.lock().expect("session lock poisoned");
            let session = guard
                .as_mut()
                .ok_or_else(|| PlayerError::Session("session released".into()))?;
            let events = session.events();
            session.start()?;
            events
        };

        let pump = worker::PumpLoop::new(
            self.shared.clone(),
            self.session.clone(),
            self.extractor.clone(),
            renderer,
            self.listeners.clone(),
        );
        let handle = thread::Builder::new()
            .name("decode-pump".into())
            .spawn(move || pump.run(events))
            .map_err(|e| PlayerError::Session(format!("failed to spawn worker: {e}")))?;
        self.worker = Some(handle);
        log::info!("decode pump started");
        Ok(())
    }

    /// Frame-completion callback installed on the renderer: tracks the last
    /// rendered timestamp and fans progress out to the listeners.
    fn progress_reporter(shared: Arc<Shared>, listeners: Listeners) -> impl Fn(i64) + Send + Sync {
        move |pts_us| {
            let (percent, seeking) = {
                let mut inner = shared.lock();
                inner.last_rendered_pts_us = pts_us;
                let duration = inner.info.map_or(0, |i| i.duration_us);
                let percent = if duration > 0 {
                    ((pts_us * 100) / duration).clamp(0, 100) as i32
                } else {
                    0
                };
                (percent, inner.state == State::Seeking)
            };
            listeners.each(|l| l.on_playback_progress(percent, pts_us, seeking));
        }
    }

    /// Request playback. Returns whether the transition was legal.
    pub fn play(&self) -> bool {
        let changed = self.shared.change_state(State::Playing);
        if changed {
            self.listeners.each(|l| l.on_is_playing(true));
        }
        changed
    }

    /// Request a pause. The worker parks itself on its next input cycle.
    /// Returns whether the transition was legal.
    pub fn pause(&self) -> bool {
        let changed = self.shared.change_state(State::InitPause);
        if changed {
            self.listeners.each(|l| l.on_is_playing(false));
        }
        changed
    }

    /// Begin scrubbing. Returns whether the transition was legal.
    pub fn seek(&self) -> bool {
        let changed = self.shared.change_state(State::Seeking);
        if changed {
            let mut inner = self.shared.lock();
            let duration = inner.info.map_or(0, |i| i.duration_us);
            inner.pending_seek_pct = if duration > 0 {
                ((inner.last_rendered_pts_us * 100) / duration).clamp(0, 100) as i32
            } else {
                0
            };
        }
        changed
    }

    /// Finish the scrub at the last reported target. Returns whether the
    /// transition was legal.
    pub fn end_seek(&self) -> bool {
        self.shared.change_state(State::TransitionFinishSeeking)
    }

    /// Record the desired seek target. Effective only while `Seeking`.
    pub fn update_progress(&self, percent: i32) {
        let mut inner = self.shared.lock();
        if inner.state == State::Seeking {
            inner.pending_seek_pct = percent.clamp(0, 100);
        } else {
            log::debug!("update_progress({percent}) ignored in state {}", inner.state);
        }
    }

    /// Orderly teardown from any state: wakes a parked worker, stops the
    /// session, joins the worker, releases the extractor, and resets to
    /// `Uninitialized`.
    pub fn destroy(&mut self) {
        log::info!("destroying decoder (state {})", self.shared.state());
        self.shared.begin_teardown();

        if let Some(mut session) = self
            .session
            .lock()
            .expect("session lock poisoned")
            .take()
        {
            session.stop();
        }

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("decode pump panicked during teardown");
            }
        }

        *self.extractor.lock().expect("extractor lock poisoned") = None;
        if let Some(renderer) = self
            .renderer
            .lock()
            .expect("renderer slot lock poisoned")
            .take()
        {
            renderer.clear_frame_listener();
        }

        self.shared.finish_teardown();
    }

    pub fn current_state(&self) -> State {
        self.shared.state()
    }

    pub fn video_width(&self) -> u32 {
        self.shared.lock().info.map_or(0, |i| i.width)
    }

    pub fn video_height(&self) -> u32 {
        self.shared.lock().info.map_or(0, |i| i.height)
    }

    pub fn rotation(&self) -> u32 {
        self.shared.lock().info.map_or(0, |i| i.rotation_degrees)
    }

    pub fn duration_us(&self) -> i64 {
        self.shared.lock().info.map_or(0, |i| i.duration_us)
    }

    /// Presentation time of the most recently rendered frame. Hosts persist
    /// this and feed it back as `saved_seek_us` on the next initialize.
    pub fn last_rendered_pts_us(&self) -> i64 {
        self.shared.lock().last_rendered_pts_us
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        if self.shared.state() != State::Uninitialized || self.worker.is_some() {
            self.destroy();
        }
    }
}
