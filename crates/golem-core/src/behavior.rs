//! Behavior task catalog and tick guards.
//!
//! Every scripted activity is a repeating, cancellable task; this module
//! holds the pure side: which kinds exist, their periods, which sleep
//! state they are valid in, and the per-tick guard verdict. The
//! single-slot cancel-on-replace invariant itself is enforced by the
//! runtime scheduler in one place.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::daynight::SleepState;
use crate::persona::Mode;

// ─── Kind ─────────────────────────────────────────────────────────

/// One scripted activity. Targeted kinds carry the player they track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "target")]
pub enum BehaviorKind {
    /// Slow look sweep over the guarded spot.
    Guard,
    /// Random-heading look around the area.
    Patrol,
    /// Track a player at close range.
    Follow(String),
    /// Specter variant of follow, kept at a distance by the session.
    Stalk(String),
    /// Bounded scare loop against one player.
    Haunt(String),
    /// Fighter idle: occasional wandering glance.
    Wander,
    /// Specter idle: occasional eerie act.
    Lurk,
    /// Night loop: near-zero activity while asleep.
    Rest,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guard => "guard",
            Self::Patrol => "patrol",
            Self::Follow(_) => "follow",
            Self::Stalk(_) => "stalk",
            Self::Haunt(_) => "haunt",
            Self::Wander => "wander",
            Self::Lurk => "lurk",
            Self::Rest => "rest",
        }
    }

    /// Tick period in milliseconds.
    pub fn period_ms(&self) -> u64 {
        match self {
            Self::Guard => 3_000,
            Self::Patrol => 30_000,
            Self::Follow(_) | Self::Stalk(_) => 2_000,
            Self::Haunt(_) => 10_000,
            Self::Wander => 60_000,
            Self::Lurk => 120_000,
            Self::Rest => 45_000,
        }
    }

    /// Sleep state this kind is allowed to tick in. Everything runs
    /// awake except the night rest loop.
    pub fn sleep_gate(&self) -> SleepState {
        match self {
            Self::Rest => SleepState::Asleep,
            _ => SleepState::Awake,
        }
    }

    /// Player name a targeted kind tracks.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Follow(p) | Self::Stalk(p) | Self::Haunt(p) => Some(p),
            _ => None,
        }
    }

    /// The idle behavior resumed on spawn and on waking.
    pub fn idle_for(mode: Mode) -> Self {
        match mode {
            Mode::Fighter => Self::Wander,
            Mode::Specter => Self::Lurk,
        }
    }
}

// ─── Tick guard ───────────────────────────────────────────────────

/// Verdict for one behavior tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    /// Guards passed; the tick may act.
    Act,
    /// The owning session generation was superseded; the task must
    /// cancel itself without acting.
    CancelStaleGeneration,
    /// Sleep state no longer matches the kind's gate; cancel.
    CancelSleepMismatch,
}

/// Evaluate the two mandatory per-tick guards, generation first.
pub fn tick_verdict(
    owning_generation: u64,
    current_generation: u64,
    sleep: SleepState,
    gate: SleepState,
) -> TickVerdict {
    if owning_generation != current_generation {
        return TickVerdict::CancelStaleGeneration;
    }
    if sleep != gate {
        return TickVerdict::CancelSleepMismatch;
    }
    TickVerdict::Act
}

// ─── Haunt budget ─────────────────────────────────────────────────

/// Repetition and wall-clock budget for the haunt loop.
///
/// The loop self-cancels once either bound is hit, even if its target
/// is still present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HauntBudget {
    remaining: u32,
    deadline: DateTime<Utc>,
}

impl HauntBudget {
    pub const DEFAULT_REPS: u32 = 6;
    pub const DEFAULT_CEILING_MS: u64 = 60_000;

    pub fn new(reps: u32, ceiling_ms: u64, now: DateTime<Utc>) -> Self {
        Self {
            remaining: reps,
            deadline: now + TimeDelta::milliseconds(ceiling_ms as i64),
        }
    }

    /// Budget with the default six repetitions over one minute.
    pub fn start(now: DateTime<Utc>) -> Self {
        Self::new(Self::DEFAULT_REPS, Self::DEFAULT_CEILING_MS, now)
    }

    /// Spend one repetition. Returns `false` once either the repetition
    /// count or the wall-clock ceiling is exhausted.
    pub fn spend(&mut self, now: DateTime<Utc>) -> bool {
        if self.remaining == 0 || now >= self.deadline {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

// ─── Tests ────────────────────────────────────────────────────────
