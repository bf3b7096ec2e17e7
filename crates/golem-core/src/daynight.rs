//! Day/night phase detection and sleep state.
//!
//! World time runs 0..24000 per simulated day; night is the half-open
//! window `[13000, 23000)`. The detector debounces polls: an edge is
//! reported only when the derived phase differs from the previous one,
//! never once per poll.

use serde::{Deserialize, Serialize};

/// Ticks per simulated day.
pub const DAY_LENGTH_TICKS: u32 = 24_000;

/// First tick of night (inclusive).
pub const NIGHT_START_TICK: u32 = 13_000;

/// First tick of morning (night window is exclusive here).
pub const NIGHT_END_TICK: u32 = 23_000;

/// Night predicate over raw world time.
pub fn is_night(world_time: u32) -> bool {
    let t = world_time % DAY_LENGTH_TICKS;
    (NIGHT_START_TICK..NIGHT_END_TICK).contains(&t)
}

// ─── Phase detector ───────────────────────────────────────────────

/// Simulated day phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPhase {
    #[default]
    Day,
    Night,
}

/// Debounced phase boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEdge {
    NightStart,
    DayStart,
}

/// Two-state debounced edge detector over polled world time.
///
/// Initial phase is `Day` until the first poll resolves.
#[derive(Debug, Clone, Default)]
pub struct PhaseDetector {
    phase: DayPhase,
}

impl PhaseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DayPhase {
        self.phase
    }

    pub fn is_night(&self) -> bool {
        self.phase == DayPhase::Night
    }

    /// Feed one world-time observation. Returns an edge only on a
    /// boundary crossing; repeated polls inside one phase return `None`.
    pub fn observe(&mut self, world_time: u32) -> Option<PhaseEdge> {
        let observed = if is_night(world_time) {
            DayPhase::Night
        } else {
            DayPhase::Day
        };
        if observed == self.phase {
            return None;
        }
        self.phase = observed;
        Some(match observed {
            DayPhase::Night => PhaseEdge::NightStart,
            DayPhase::Day => PhaseEdge::DayStart,
        })
    }
}

// ─── Sleep state ──────────────────────────────────────────────────

/// Whether the persona is asleep. Strictly a function of the latest
/// phase edge plus validated forced transitions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepState {
    #[default]
    Awake,
    Asleep,
}

impl SleepState {
    pub fn is_asleep(self) -> bool {
        self == Self::Asleep
    }

    /// Night-start handler. Returns the next state and whether it changed
    /// (idempotent: a second call while asleep is a no-op).
    pub fn on_night_start(self) -> (Self, bool) {
        (Self::Asleep, self == Self::Awake)
    }

    /// Day-start handler, idempotent like [`Self::on_night_start`].
    pub fn on_day_start(self) -> (Self, bool) {
        (Self::Awake, self == Self::Asleep)
    }
}

/// Outcome of a forced sleep/wake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceOutcome {
    /// State changed.
    Applied,
    /// Already in the requested state.
    Unchanged,
    /// Request disagrees with the actual phase.
    Rejected,
}

/// Forced sleep: only permitted while it is actually night.
pub fn force_sleep(sleep: &mut SleepState, night_now: bool) -> ForceOutcome {
    if !night_now {
        return ForceOutcome::Rejected;
    }
    if sleep.is_asleep() {
        return ForceOutcome::Unchanged;
    }
    *sleep = SleepState::Asleep;
    ForceOutcome::Applied
}

/// Forced wake: only permitted while it is actually day.
pub fn force_wake(sleep: &mut SleepState, night_now: bool) -> ForceOutcome {
    if night_now {
        return ForceOutcome::Rejected;
    }
    if !sleep.is_asleep() {
        return ForceOutcome::Unchanged;
    }
    *sleep = SleepState::Awake;
    ForceOutcome::Applied
}

// ─── Tests ────────────────────────────────────────────────────────
