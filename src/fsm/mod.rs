//! Update state machine: state identities and the transition guard.
//!
//! ```text
//!  IDLE ──[message]──▶ VALIDATING ──[decoded]──▶ COMPARING
//!    ▲                      │                        │
//!    │                 [bad payload]      [same] ◀───┤───▶ [different]
//!    │                      │               │                 │
//!    ├──────────────────────┴───────────────┘                 ▼
//!    │                                                    FETCHING
//!    ├──────────────────[fetch error]─────────────────────────┤
//!    │                                                         ▼
//!    ├──────────────────[write error]─────────────────────  WRITING
//!    │                                                         ▼
//!    └──────────────────[verify / commit error]────────── FINALIZING
//!                                                              │
//!                                                         [committed]
//!                                                              ▼
//!                                                         RESTARTING (terminal)
//! ```
//!
//! The orchestrator drives the machine; [`UpdateFsm`] only records where it
//! is, refuses edges that are not in the diagram, and reports every move to
//! the event sink.

use log::{error, info};

use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UpdateState {
    Idle = 0,
    Validating = 1,
    Comparing = 2,
    Fetching = 3,
    Writing = 4,
    Finalizing = 5,
    Restarting = 6,
}

impl UpdateState {
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Idle,
        Self::Validating,
        Self::Comparing,
        Self::Fetching,
        Self::Writing,
        Self::Finalizing,
        Self::Restarting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Validating => "Validating",
            Self::Comparing => "Comparing",
            Self::Fetching => "Fetching",
            Self::Writing => "Writing",
            Self::Finalizing => "Finalizing",
            Self::Restarting => "Restarting",
        }
    }

    /// `Restarting` has no outgoing edge.
    pub fn is_terminal(self) -> bool {
        self == Self::Restarting
    }

    /// The forward edge out of this state, if any.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Validating),
            Self::Validating => Some(Self::Comparing),
            Self::Comparing => Some(Self::Fetching),
            Self::Fetching => Some(Self::Writing),
            Self::Writing => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Restarting),
            Self::Restarting => None,
        }
    }

    /// Whether `self → next` is an edge of the machine.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Idle {
            return self != Self::Idle;
        }
        self.successor() == Some(next)
    }
}

// ---------------------------------------------------------------------------
// Transition guard
// ---------------------------------------------------------------------------

/// Rejected edge, returned by [`UpdateFsm::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: UpdateState,
    pub to: UpdateState,
}

pub struct UpdateFsm {
    current: UpdateState,
}

impl UpdateFsm {
    pub fn new() -> Self {
        Self {
            current: UpdateState::Idle,
        }
    }

    pub fn current(&self) -> UpdateState {
        self.current
    }

    pub fn is_idle(&self) -> bool {
        self.current == UpdateState::Idle
    }

    /// Move to `next` if the edge exists, emitting `StateChanged`.
    pub fn transition(
        &mut self,
        next: UpdateState,
        sink: &mut (impl EventSink + ?Sized),
    ) -> Result<(), InvalidTransition> {
        let from = self.current;
        if !from.can_transition_to(next) {
            error!("FSM: rejected transition {} -> {}", from.name(), next.name());
            return Err(InvalidTransition { from, to: next });
        }

        info!("FSM transition: {} -> {}", from.name(), next.name());
        self.current = next;
        sink.emit(&AgentEvent::StateChanged { from, to: next });
        Ok(())
    }

    /// Return to `Idle` from any non-terminal state. No-op when already idle.
    pub fn reset(&mut self, sink: &mut (impl EventSink + ?Sized)) {
        if self.current != UpdateState::Idle && !self.current.is_terminal() {
            let _ = self.transition(UpdateState::Idle, sink);
        }
    }
}

impl Default for UpdateFsm {
    fn default() -> Self {
        Self::new()
    }
}
