//! Playback lifecycle states and the transition table.

use std::fmt;

/// Lifecycle state of a playback session. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No session resources held. Initial state, and the teardown target
    /// reachable from every other state.
    Uninitialized,
    /// Initialized and seeked to the starting position, not yet playing.
    Ready,
    Playing,
    /// The decode worker is blocked waiting to resume.
    Paused,
    /// Pause requested; the worker parks itself in `Paused` on its next
    /// input cycle.
    InitPause,
    /// Scrubbing: the extractor realigns to the pending target each cycle.
    Seeking,
    /// Seek finish requested; the pipeline drains and realigns on EOS.
    TransitionFinishSeeking,
}

impl State {
    pub const ALL: [State; 7] = [
        State::Uninitialized,
        State::Ready,
        State::Playing,
        State::Paused,
        State::InitPause,
        State::Seeking,
        State::TransitionFinishSeeking,
    ];

    /// The fixed set of states a transition into `self` is allowed from.
    pub fn allowed_sources(self) -> &'static [State] {
        use State::*;
        match self {
            Uninitialized => &[
                Ready,
                Playing,
                Paused,
                InitPause,
                Seeking,
                TransitionFinishSeeking,
            ],
            Ready => &[Uninitialized],
            Playing => &[Ready, InitPause, Paused, TransitionFinishSeeking],
            Paused => &[InitPause, TransitionFinishSeeking],
            InitPause => &[Ready, Playing, TransitionFinishSeeking],
            Seeking => &[Ready, Playing, Paused],
            TransitionFinishSeeking => &[Seeking],
        }
    }

    /// Whether a transition from `from` into `self` is legal.
    pub fn reachable_from(self, from: State) -> bool {
        self.allowed_sources().contains(&from)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use State::*;

    #[test]
    fn test_transition_table_is_exhaustive() {
        // (target, allowed sources) pairs; every other combination must be
        // rejected.
        let table: &[(State, &[State])] = &[
            (
                Uninitialized,
                &[Ready, Playing, Paused, InitPause, Seeking, TransitionFinishSeeking],
            ),
            (Ready, &[Uninitialized]),
            (Playing, &[Ready, InitPause, Paused, TransitionFinishSeeking]),
            (Paused, &[InitPause, TransitionFinishSeeking]),
            (InitPause, &[Ready, Playing, TransitionFinishSeeking]),
            (Seeking, &[Ready, Playing, Paused]),
            (TransitionFinishSeeking, &[Seeking]),
        ];

        for &(target, allowed) in table {
            for from in State::ALL {
                assert_eq!(
                    target.reachable_from(from),
                    allowed.contains(&from),
                    "transition {from} -> {target}"
                );
            }
        }
    }

    #[test]
    fn test_uninitialized_reachable_from_everywhere_else() {
        for from in State::ALL {
            if from != Uninitialized {
                assert!(Uninitialized.reachable_from(from));
            }
        }
        assert!(!Uninitialized.reachable_from(Uninitialized));
    }
}
