//! Read-only status snapshot served over the status surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionState;
use crate::persona::Mode;

/// Point-in-time view of the keeper, queryable without touching the
/// event loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub connection_state: ConnectionState,
    pub persona: String,
    pub mode: Mode,
    pub generation: u64,
    pub is_night: bool,
    pub is_sleeping: bool,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot for a process that has not attempted a connection yet.
    pub fn idle(persona: String, mode: Mode, now: DateTime<Utc>) -> Self {
        Self {
            connection_state: ConnectionState::Idle,
            persona,
            mode,
            generation: 0,
            is_night: false,
            is_sleeping: false,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid RFC3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn idle_snapshot_defaults() {
        let s = StatusSnapshot::idle("Bastion".into(), Mode::Fighter, ts("2026-03-01T12:00:00Z"));
        assert_eq!(s.connection_state, ConnectionState::Idle);
        assert_eq!(s.generation, 0);
        assert!(!s.is_night);
        assert!(!s.is_sleeping);
    }

    #[test]
    fn snapshot_serde_roundtrip() {
        let s = StatusSnapshot {
            connection_state: ConnectionState::Active,
            persona: "Wraith".into(),
            mode: Mode::Specter,
            generation: 4,
            is_night: true,
            is_sleeping: true,
            updated_at: ts("2026-03-01T22:00:00Z"),
        };
        let json = serde_json::to_string(&s).expect("serialize");
        let back: StatusSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(s, back);
    }
}
