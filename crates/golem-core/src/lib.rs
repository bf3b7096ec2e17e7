//! golem-core: pure, deterministic state machines for the session keeper.
//! Connection lifecycle, reconnection policy, day/night edge detection,
//! behavior catalog, and command dispatch decisions — no IO, no async,
//! no system clock access. All time values are passed in as parameters.

pub mod behavior;
pub mod command;
pub mod connection;
pub mod daynight;
pub mod generation;
pub mod persona;
pub mod reconnect;
pub mod status;

pub use behavior::{BehaviorKind, HauntBudget, TickVerdict, tick_verdict};
pub use command::{CommandAction, dispatch, help_lines};
pub use connection::{ConnectionState, Effect, LifecycleEvent, TerminalKind, Transition, transition};
pub use daynight::{
    DayPhase, ForceOutcome, PhaseDetector, PhaseEdge, SleepState, force_sleep, force_wake, is_night,
};
pub use generation::GenerationCounter;
pub use persona::{Mode, Persona, PersonaRoster};
pub use reconnect::{CooldownTier, ReconnectConfig, ReconnectPolicy, is_throttle_hint};
pub use status::StatusSnapshot;
