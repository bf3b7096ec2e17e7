//! Connection lifecycle finite state machine.
//!
//! [`transition`] is the single entry point for all lifecycle state
//! changes: pure over `(state, event) -> (state, effects)`, with the
//! effects executed by the runtime controller. Chat traffic is not a
//! lifecycle concern and never passes through here.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── State ────────────────────────────────────────────────────────

/// Connection lifecycle state. Exactly one value exists per process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Spawned into the world and acting.
    Active,
    Disconnected,
    Errored,
    Kicked,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Active => "active",
            Self::Disconnected => "disconnected",
            Self::Errored => "errored",
            Self::Kicked => "kicked",
        }
    }

    /// Terminal states: the session is gone and a rotation is owed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Errored | Self::Kicked)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Events ───────────────────────────────────────────────────────

/// Which terminal path a session ended through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    Disconnected,
    Errored,
    Kicked,
}

impl TerminalKind {
    pub fn state(self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Errored => ConnectionState::Errored,
            Self::Kicked => ConnectionState::Kicked,
        }
    }
}

/// Session lifecycle event as seen by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Login,
    Spawn,
    Death,
    Kicked { reason: String },
    Error { message: String },
    End,
}

// ─── Effects ──────────────────────────────────────────────────────

/// Side effects the runtime must execute after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Reset the reconnect attempt counter (successful spawn).
    ResetAttempts,
    /// Start the day/night poll and the persona's idle behavior.
    StartSchedulers,
    /// Greet the world after arrival.
    AnnounceArrival,
    /// Death flavor line; the server respawns the bot, session stays live.
    AnnounceDeath,
    /// Cancel the behavior slot and the day/night poll.
    StopSchedulers,
    /// Feed the reconnect policy and arm the rotation timer.
    ScheduleRotation {
        kind: TerminalKind,
        detail: Option<String>,
    },
}

/// Result of a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ConnectionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: ConnectionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }
}

// ─── Transition function ──────────────────────────────────────────

/// Apply a lifecycle event to the current connection state.
///
/// Terminal states swallow further lifecycle events: a real session
/// emits `end` right after `kicked`, and only the first terminal event
/// may schedule a rotation.
pub fn transition(state: ConnectionState, event: &LifecycleEvent) -> Transition {
    if state.is_terminal() {
        return Transition::stay(state);
    }

    match event {
        LifecycleEvent::Login => Transition {
            next: ConnectionState::Connected,
            effects: Vec::new(),
        },
        LifecycleEvent::Spawn => Transition {
            next: ConnectionState::Active,
            effects: vec![
                Effect::ResetAttempts,
                Effect::StartSchedulers,
                Effect::AnnounceArrival,
            ],
        },
        // Death is not terminal: the server respawns the bot in place.
        LifecycleEvent::Death => Transition {
            next: state,
            effects: vec![Effect::AnnounceDeath],
        },
        LifecycleEvent::Kicked { reason } => terminal(TerminalKind::Kicked, Some(reason.clone())),
        LifecycleEvent::Error { message } => terminal(TerminalKind::Errored, Some(message.clone())),
        LifecycleEvent::End => terminal(TerminalKind::Disconnected, None),
    }
}

fn terminal(kind: TerminalKind, detail: Option<String>) -> Transition {
    Transition {
        next: kind.state(),
        effects: vec![
            Effect::StopSchedulers,
            Effect::ScheduleRotation { kind, detail },
        ],
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation_count(t: &Transition) -> usize {
        t.effects
            .iter()
            .filter(|e| matches!(e, Effect::ScheduleRotation { .. }))
            .count()
    }

    // ── Happy path ──────────────────────────────────────────────

    #[test]
    fn login_moves_connecting_to_connected() {
        let t = transition(ConnectionState::Connecting, &LifecycleEvent::Login);
        assert_eq!(t.next, ConnectionState::Connected);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn spawn_activates_and_starts_schedulers() {
        let t = transition(ConnectionState::Connected, &LifecycleEvent::Spawn);
        assert_eq!(t.next, ConnectionState::Active);
        assert_eq!(
            t.effects,
            vec![
                Effect::ResetAttempts,
                Effect::StartSchedulers,
                Effect::AnnounceArrival,
            ]
        );
    }

    #[test]
    fn death_keeps_session_active() {
        let t = transition(ConnectionState::Active, &LifecycleEvent::Death);
        assert_eq!(t.next, ConnectionState::Active);
        assert_eq!(t.effects, vec![Effect::AnnounceDeath]);
    }

    // ── Terminal events ─────────────────────────────────────────

    #[test]
    fn kicked_schedules_exactly_one_rotation() {
        let t = transition(
            ConnectionState::Active,
            &LifecycleEvent::Kicked {
                reason: "You have been kicked".to_string(),
            },
        );
        assert_eq!(t.next, ConnectionState::Kicked);
        assert_eq!(t.effects[0], Effect::StopSchedulers);
        assert_eq!(rotation_count(&t), 1);
    }

    #[test]
    fn error_schedules_exactly_one_rotation() {
        let t = transition(
            ConnectionState::Connecting,
            &LifecycleEvent::Error {
                message: "ECONNRESET".to_string(),
            },
        );
        assert_eq!(t.next, ConnectionState::Errored);
        assert_eq!(rotation_count(&t), 1);
    }

    #[test]
    fn end_schedules_exactly_one_rotation() {
        let t = transition(ConnectionState::Active, &LifecycleEvent::End);
        assert_eq!(t.next, ConnectionState::Disconnected);
        assert_eq!(rotation_count(&t), 1);
        assert!(matches!(
            &t.effects[1],
            Effect::ScheduleRotation {
                kind: TerminalKind::Disconnected,
                detail: None,
            }
        ));
    }

    #[test]
    fn terminal_carries_detail_text() {
        let t = transition(
            ConnectionState::Active,
            &LifecycleEvent::Kicked {
                reason: "connection throttled".to_string(),
            },
        );
        match &t.effects[1] {
            Effect::ScheduleRotation { kind, detail } => {
                assert_eq!(*kind, TerminalKind::Kicked);
                assert_eq!(detail.as_deref(), Some("connection throttled"));
            }
            other => panic!("expected ScheduleRotation, got {other:?}"),
        }
    }

    // ── Terminal states swallow late events ─────────────────────

    #[test]
    fn end_after_kicked_is_swallowed() {
        let kicked = transition(
            ConnectionState::Active,
            &LifecycleEvent::Kicked {
                reason: "bye".to_string(),
            },
        );
        assert_eq!(rotation_count(&kicked), 1);

        // A real session emits `end` right after `kicked` — no second rotation.
        let end = transition(kicked.next, &LifecycleEvent::End);
        assert_eq!(end.next, ConnectionState::Kicked);
        assert!(end.effects.is_empty());
    }

    #[test]
    fn all_events_swallowed_in_terminal_states() {
        let events = [
            LifecycleEvent::Login,
            LifecycleEvent::Spawn,
            LifecycleEvent::Death,
            LifecycleEvent::End,
            LifecycleEvent::Error {
                message: "late".to_string(),
            },
        ];
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Errored,
            ConnectionState::Kicked,
        ] {
            for event in &events {
                let t = transition(state, event);
                assert_eq!(t.next, state, "{state:?} + {event:?} should not move");
                assert!(t.effects.is_empty());
            }
        }
    }

    // ── Misc ────────────────────────────────────────────────────

    #[test]
    fn terminal_kind_maps_to_state() {
        assert_eq!(
            TerminalKind::Disconnected.state(),
            ConnectionState::Disconnected
        );
        assert_eq!(TerminalKind::Errored.state(), ConnectionState::Errored);
        assert_eq!(TerminalKind::Kicked.state(), ConnectionState::Kicked);
    }

    #[test]
    fn is_terminal_matches_terminal_states() {
        assert!(ConnectionState::Kicked.is_terminal());
        assert!(ConnectionState::Errored.is_terminal());
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(!ConnectionState::Idle.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Active.is_terminal());
    }

    #[test]
    fn state_serde_uses_lowercase() {
        let json = serde_json::to_string(&ConnectionState::Active).expect("serialize");
        assert_eq!(json, r#""active""#);
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }
}
