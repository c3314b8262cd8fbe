//! Software loopback decode session.
//!
//! `LoopbackSession` implements [`DecodeSession`] without any hardware: every
//! queued input buffer immediately comes back as a decoded output buffer with
//! the same timestamp. It exists so the playback engine can be developed and
//! tested end to end on any machine; platform codec backends replace it in a
//! real deployment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::PlayerError;
use crate::session::{
    BufferFlags, BufferInfo, DecodeSession, DisplaySurface, SessionEvent, VendorParams,
};

const INPUT_SLOTS: usize = 4;

/// Shared handles observing a [`LoopbackSession`] from the outside.
///
/// Used by tests and diagnostics to inspect what the engine submitted without
/// reaching into the session behind its lock.
#[derive(Clone, Default)]
pub struct SessionProbe {
    queued: Arc<Mutex<Vec<(i64, BufferFlags)>>>,
    flushes: Arc<AtomicUsize>,
    starts: Arc<AtomicUsize>,
}

impl SessionProbe {
    /// Every `(pts_us, flags)` pair queued to the input side, in order.
    pub fn queued_inputs(&self) -> Vec<(i64, BufferFlags)> {
        self.queued.lock().expect("probe lock poisoned").clone()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

/// A decode session that echoes input buffers back as decoded output.
pub struct LoopbackSession {
    tx: Option<Sender<SessionEvent>>,
    rx: Receiver<SessionEvent>,
    input_buffers: Vec<Vec<u8>>,
    /// Output infos keyed by slot index, pending release by the engine.
    outputs: HashMap<usize, BufferInfo>,
    next_output: usize,
    surface: Option<Arc<dyn DisplaySurface>>,
    params: VendorParams,
    started: bool,
    probe: SessionProbe,
}

impl LoopbackSession {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Some(tx),
            rx,
            input_buffers: vec![Vec::new(); INPUT_SLOTS],
            outputs: HashMap::new(),
            next_output: 0,
            surface: None,
            params: VendorParams::new(),
            started: false,
            probe: SessionProbe::default(),
        }
    }

    /// Observation handles for this session.
    pub fn probe(&self) -> SessionProbe {
        self.probe.clone()
    }

    /// Vendor parameters applied at configure time.
    pub fn params(&self) -> &VendorParams {
        &self.params
    }

    fn send(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            // Receiver may already be gone during teardown.
            let _ = tx.send(event);
        }
    }
}

impl Default for LoopbackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeSession for LoopbackSession {
    fn configure(
        &mut self,
        surface: Arc<dyn DisplaySurface>,
        params: &VendorParams,
    ) -> Result<(), PlayerError> {
        self.surface = Some(surface);
        self.params = params.clone();
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlayerError> {
        self.started = true;
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        // Announce every input slot, mirroring a codec re-delivering its
        // buffer pool after start.
        for index in 0..self.input_buffers.len() {
            self.send(SessionEvent::InputBufferAvailable(index));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PlayerError> {
        self.outputs.clear();
        self.started = false;
        self.probe.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
        self.tx = None;
    }

    fn events(&self) -> Receiver<SessionEvent> {
        self.rx.clone()
    }

    fn input_buffer(&mut self, index: usize) -> Result<&mut Vec<u8>, PlayerError> {
        self.input_buffers
            .get_mut(index)
            .ok_or_else(|| PlayerError::Session(format!("bad input slot {index}")))
    }

    fn queue_input(
        &mut self,
        index: usize,
        size: usize,
        pts_us: i64,
        flags: BufferFlags,
    ) -> Result<(), PlayerError> {
        if !self.started {
            return Err(PlayerError::Session("queue_input on stopped session".into()));
        }
        self.probe
            .queued
            .lock()
            .expect("probe lock poisoned")
            .push((pts_us, flags));

        let out_index = self.next_output;
        self.next_output += 1;
        let info = BufferInfo {
            size: if flags.end_of_stream { 0 } else { size },
            offset: 0,
            pts_us,
            flags,
        };
        self.outputs.insert(out_index, info);
        self.send(SessionEvent::OutputBufferAvailable(out_index, info));

        // The slot is free again unless the stream just ended.
        if !flags.end_of_stream {
            self.send(SessionEvent::InputBufferAvailable(index));
        }
        Ok(())
    }

    fn release_output(
        &mut self,
        index: usize,
        display_at: Option<Instant>,
    ) -> Result<(), PlayerError> {
        let info = self
            .outputs
            .remove(&index)
            .ok_or_else(|| PlayerError::Session(format!("bad output slot {index}")))?;
        if let Some(surface) = &self.surface {
            surface.present(info.pts_us, display_at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_announces_all_input_slots() {
        let mut session = LoopbackSession::new();
        let rx = session.events();
        session.start().unwrap();

        let mut slots = Vec::new();
        for _ in 0..INPUT_SLOTS {
            match rx.try_recv().unwrap() {
                SessionEvent::InputBufferAvailable(i) => slots.push(i),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(slots, (0..INPUT_SLOTS).collect::<Vec<_>>());
    }

    #[test]
    fn test_queue_echoes_output_and_refreshes_slot() {
        let mut session = LoopbackSession::new();
        let rx = session.events();
        session.start().unwrap();
        for _ in 0..INPUT_SLOTS {
            rx.try_recv().unwrap();
        }

        session.input_buffer(0).unwrap().extend_from_slice(b"abc");
        session
            .queue_input(0, 3, 42_000, BufferFlags::default())
            .unwrap();

        match rx.try_recv().unwrap() {
            SessionEvent::OutputBufferAvailable(_, info) => {
                assert_eq!(info.pts_us, 42_000);
                assert_eq!(info.size, 3);
                assert!(!info.flags.end_of_stream);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::InputBufferAvailable(0)
        ));
    }

    #[test]
    fn test_eos_marker_stops_input_slot_recycling() {
        let mut session = LoopbackSession::new();
        let rx = session.events();
        session.start().unwrap();
        for _ in 0..INPUT_SLOTS {
            rx.try_recv().unwrap();
        }

        session.queue_input(0, 0, 100, BufferFlags::eos()).unwrap();

        match rx.try_recv().unwrap() {
            SessionEvent::OutputBufferAvailable(_, info) => {
                assert!(info.flags.end_of_stream);
                assert_eq!(info.size, 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_closes_event_channel() {
        let mut session = LoopbackSession::new();
        let rx = session.events();
        session.start().unwrap();
        session.stop();
        // Drain the start announcements, then the channel reports closed.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv().is_err());
    }
}
