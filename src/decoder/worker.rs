//! The pump loop: asynchronous decode session callbacks handled on the
//! dedicated worker thread.
//!
//! Input-ready events pull samples from the extractor into the session,
//! output-ready events hand decoded buffers to the renderer, and the
//! end-of-stream buffer drives both seek completion and natural clip end.

use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;

use super::{Shared, State};
use crate::extractor::Extractor;
use crate::listener::Listeners;
use crate::renderer::Renderer;
use crate::session::{BufferFlags, BufferInfo, DecodeSession, SessionEvent};

pub(crate) struct PumpLoop {
    shared: Arc<Shared>,
    session: Arc<Mutex<Option<Box<dyn DecodeSession>>>>,
    extractor: Arc<Mutex<Option<Extractor>>>,
    renderer: Arc<Renderer>,
    listeners: Listeners,
}

impl PumpLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        session: Arc<Mutex<Option<Box<dyn DecodeSession>>>>,
        extractor: Arc<Mutex<Option<Extractor>>>,
        renderer: Arc<Renderer>,
        listeners: Listeners,
    ) -> Self {
        Self {
            shared,
            session,
            extractor,
            renderer,
            listeners,
        }
    }

    pub(crate) fn run(self, events: Receiver<SessionEvent>) {
        log::debug!("decode pump running");
        while let Ok(event) = events.recv() {
            if self.shared.is_teardown() {
                break;
            }
            match event {
                SessionEvent::InputBufferAvailable(index) => self.on_input(index),
                SessionEvent::OutputBufferAvailable(index, info) => self.on_output(index, info),
                SessionEvent::OutputFormatChanged { width, height } => {
                    log::info!("output format changed to {width}x{height}");
                    self.renderer.reset_clock();
                }
                SessionEvent::Error(msg) => {
                    // Codec errors are logged and playback continues; the
                    // session keeps delivering events unless it died, in
                    // which case the channel closes and the loop exits.
                    log::error!("decode session error: {msg}");
                }
            }
        }
        log::debug!("decode pump exited");
    }

    /// An input buffer slot is free: park if a pause is pending, realign if
    /// scrubbing, then feed one sample (or the EOS marker).
    fn on_input(&self, index: usize) {
        if self.shared.state() == State::InitPause && !self.shared.enter_paused() {
            return;
        }

        if self.shared.state() == State::Seeking {
            self.realign_to_pending(true);
        }

        if self.shared.lock().sent_eos {
            // Nothing more to feed until output EOS restarts the session.
            return;
        }
        let state = self.shared.state();

        let mut extractor_guard = self.extractor.lock().expect("extractor lock poisoned");
        let Some(extractor) = extractor_guard.as_mut() else {
            return;
        };
        let mut session_guard = self.session.lock().expect("session lock poisoned");
        let Some(session) = session_guard.as_mut() else {
            return;
        };

        let sample = if state == State::TransitionFinishSeeking {
            // Seek finish drains the pipeline; no further samples.
            None
        } else {
            match session.input_buffer(index) {
                Ok(buf) => extractor.read_sample(buf),
                Err(e) => {
                    log::warn!("input slot {index} unavailable: {e}");
                    return;
                }
            }
        };

        match sample {
            Some(sample) => {
                let pts_us = {
                    let mut inner = self.shared.lock();
                    let interval = inner.info.map_or(1, |i| i.frame_interval_us);
                    let pts = if state == State::Seeking {
                        // Synthesized while scrubbing so a rewind never
                        // submits a non-increasing timestamp.
                        inner.last_queued_pts_us + interval
                    } else {
                        sample.pts_us
                    };
                    inner.last_queued_pts_us = pts;
                    inner.chunk_count += 1;
                    pts
                };
                let flags = BufferFlags {
                    end_of_stream: false,
                    sync_frame: sample.sync_frame,
                };
                if let Err(e) = session.queue_input(index, sample.size, pts_us, flags) {
                    log::warn!("queue_input failed: {e}");
                    return;
                }
                // The cursor only moves during real playback; scrubbing and
                // paused preview re-read the current sample.
                if state == State::Playing {
                    extractor.advance();
                }
            }
            None => {
                let (last_pts, chunks) = {
                    let inner = self.shared.lock();
                    (inner.last_queued_pts_us, inner.chunk_count)
                };
                match session.queue_input(index, 0, last_pts, BufferFlags::eos()) {
                    Ok(()) => {
                        self.shared.lock().sent_eos = true;
                        log::debug!("input EOS submitted at {last_pts} us after {chunks} chunks");
                    }
                    Err(e) => log::warn!("EOS submit failed: {e}"),
                }
            }
        }
    }

    /// A decoded buffer is ready: render it, or handle stream end.
    fn on_output(&self, index: usize, info: BufferInfo) {
        if info.flags.end_of_stream {
            self.on_output_eos();
            return;
        }

        let immediate = self.shared.state() == State::Seeking;
        let mut session_guard = self.session.lock().expect("session lock poisoned");
        let Some(session) = session_guard.as_mut() else {
            return;
        };
        if let Err(e) = self.renderer.render(session.as_mut(), index, &info, immediate) {
            log::warn!("render failed: {e}");
        }
    }

    /// The end-of-stream buffer surfaced on the output side. Flush, then
    /// either complete the in-flight seek or wrap up the clip, and restart.
    fn on_output_eos(&self) {
        log::debug!("output EOS in state {}", self.shared.state());
        {
            let mut session_guard = self.session.lock().expect("session lock poisoned");
            if let Some(session) = session_guard.as_mut() {
                if let Err(e) = session.flush() {
                    log::warn!("flush failed: {e}");
                }
            }
        }

        if self.shared.state() == State::TransitionFinishSeeking {
            self.realign_to_pending(false);
            let resume = self.shared.lock().resume_state;
            let target = match resume {
                // A pause resumes through InitPause so the worker parks on
                // its next input cycle instead of blocking here.
                State::Paused | State::InitPause => State::InitPause,
                other => other,
            };
            if !self.shared.change_state(target) {
                self.shared.force_state(target);
            }
        } else {
            // Natural end of clip: hold paused at the start.
            self.shared.change_state(State::InitPause);
            if let Some(extractor) = self
                .extractor
                .lock()
                .expect("extractor lock poisoned")
                .as_mut()
            {
                extractor.seek_to(0);
            }
            self.listeners.each(|l| l.on_playback_end());
        }
        self.renderer.reset_clock();

        {
            let mut session_guard = self.session.lock().expect("session lock poisoned");
            if let Some(session) = session_guard.as_mut() {
                if let Err(e) = session.start() {
                    log::warn!("session restart failed: {e}");
                }
            }
        }
        let mut inner = self.shared.lock();
        inner.sent_eos = false;
        inner.chunk_count = 0;
    }

    /// Realign the extractor to the pending seek target and report progress.
    fn realign_to_pending(&self, seeking: bool) {
        let (percent, duration) = {
            let inner = self.shared.lock();
            (
                inner.pending_seek_pct,
                inner.info.map_or(0, |i| i.duration_us),
            )
        };
        let target_us = duration * i64::from(percent) / 100;
        if let Some(extractor) = self
            .extractor
            .lock()
            .expect("extractor lock poisoned")
            .as_mut()
        {
            extractor.seek_to(target_us);
        }
        self.listeners
            .each(|l| l.on_playback_progress(percent, target_us, seeking));
    }
}
