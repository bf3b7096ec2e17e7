//! Periodic behavior task bodies.
//!
//! Every body runs the same skeleton: wait one period, re-check the
//! generation and sleep guards, act, repeat. Failing a guard cancels
//! the task from the inside; the scheduler slot keeps the abort handle
//! for cancel-on-replace from the outside.

use std::f64::consts::TAU;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use golem_core::{BehaviorKind, HauntBudget, SleepState, TickVerdict, tick_verdict};
use golem_session::{SessionAction, WorldView};

// ─── Guard state ──────────────────────────────────────────────────

/// Published by the controller; read by every behavior tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickGuardState {
    pub generation: u64,
    pub sleep: SleepState,
}

/// Everything a behavior task needs, captured at start time.
pub struct BehaviorCtx {
    pub kind: BehaviorKind,
    /// Generation of the session this task belongs to.
    pub generation: u64,
    /// Tick period; the kind's catalog period in production.
    pub period: Duration,
    pub guard: watch::Receiver<TickGuardState>,
    pub actions: mpsc::UnboundedSender<SessionAction>,
    pub view: watch::Receiver<WorldView>,
}

impl BehaviorCtx {
    fn send(&self, action: SessionAction) -> bool {
        self.actions.send(action).is_ok()
    }
}

// ─── Task skeleton ────────────────────────────────────────────────

struct Locals {
    sweep_yaw: f64,
    haunt: Option<HauntBudget>,
}

/// Spawn the repeating task for `ctx.kind`.
pub fn spawn(ctx: BehaviorCtx) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ctx.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The interval's first tick completes immediately; behaviors
        // act one full period after installation.
        ticker.tick().await;

        let gate = ctx.kind.sleep_gate();
        let mut locals = Locals {
            sweep_yaw: 0.0,
            haunt: match ctx.kind {
                BehaviorKind::Haunt(_) => Some(HauntBudget::start(Utc::now())),
                _ => None,
            },
        };

        loop {
            ticker.tick().await;
            let g = *ctx.guard.borrow();
            match tick_verdict(ctx.generation, g.generation, g.sleep, gate) {
                TickVerdict::Act => {}
                TickVerdict::CancelStaleGeneration => {
                    tracing::debug!(
                        behavior = ctx.kind.as_str(),
                        generation = ctx.generation,
                        "tick from superseded generation, cancelling"
                    );
                    break;
                }
                TickVerdict::CancelSleepMismatch => {
                    tracing::debug!(behavior = ctx.kind.as_str(), "sleep gate closed, cancelling");
                    break;
                }
            }
            if !tick(&ctx, &mut locals) {
                break;
            }
        }
    })
}

/// One behavior tick. Returns `false` to cancel the task.
fn tick(ctx: &BehaviorCtx, locals: &mut Locals) -> bool {
    let view = ctx.view.borrow().clone();
    let mut rng = rand::rng();

    match &ctx.kind {
        BehaviorKind::Guard => {
            locals.sweep_yaw = (locals.sweep_yaw + 0.5) % TAU;
            ctx.send(SessionAction::Look {
                yaw: locals.sweep_yaw,
                pitch: 0.0,
            })
        }
        BehaviorKind::Patrol => ctx.send(SessionAction::Look {
            yaw: rng.random_range(0.0..TAU),
            pitch: rng.random_range(-0.2..0.2),
        }),
        BehaviorKind::Follow(player) | BehaviorKind::Stalk(player) => {
            match view.player(player) {
                Some(seen) => ctx.send(SessionAction::LookAt(seen.position.eye())),
                // Target gone: clear the slot, same as the original follow loop.
                None => false,
            }
        }
        BehaviorKind::Haunt(player) => haunt_tick(ctx, locals, &view, player, &mut rng),
        BehaviorKind::Wander => {
            if rng.random_bool(0.3) {
                return ctx.send(SessionAction::Look {
                    yaw: rng.random_range(0.0..TAU),
                    pitch: rng.random_range(-0.2..0.2),
                });
            }
            true
        }
        BehaviorKind::Lurk => {
            if rng.random_bool(0.2) {
                return match view.players.first() {
                    Some(seen) if rng.random_bool(0.5) => {
                        ctx.send(SessionAction::LookAt(seen.position.eye()))
                    }
                    _ => ctx.send(SessionAction::Chat(pick(&mut rng, CREEPY_LINES).to_string())),
                };
            }
            true
        }
        BehaviorKind::Rest => {
            if rng.random_bool(0.1) {
                return ctx.send(SessionAction::Look {
                    yaw: rng.random_range(0.0..TAU),
                    pitch: 0.0,
                });
            }
            true
        }
    }
}

fn haunt_tick(
    ctx: &BehaviorCtx,
    locals: &mut Locals,
    view: &WorldView,
    player: &str,
    rng: &mut impl Rng,
) -> bool {
    let Some(budget) = locals.haunt.as_mut() else {
        return false;
    };
    if !budget.spend(Utc::now()) {
        let _ = ctx.send(SessionAction::Chat(
            "The haunting has ended... for now.".to_string(),
        ));
        return false;
    }
    match view.player(player) {
        Some(seen) => {
            if !ctx.send(SessionAction::LookAt(seen.position.eye())) {
                return false;
            }
            if rng.random_bool(0.3) {
                return ctx.send(SessionAction::Chat(format!(
                    "*whispers* {}",
                    pick(rng, WHISPERS)
                )));
            }
            true
        }
        None => false,
    }
}

// ─── Flavor text ──────────────────────────────────────────────────

pub(crate) const CREEPY_LINES: &[&str] = &[
    "The end is near...",
    "They are watching...",
    "Your world is a lie...",
    "The voices speak...",
    "Darkness consumes all...",
    "You cannot escape...",
];

pub(crate) const WHISPERS: &[&str] = &[
    "behind you",
    "in the walls",
    "watching you",
    "coming closer",
    "never alone",
    "too late",
];

pub(crate) const MENTION_RESPONSES: &[&str] = &[
    "...",
    "You called?",
    "I am here...",
    "Why do you speak my name?",
    "The shadows hear you...",
];

pub(crate) fn pick<'a>(rng: &mut impl Rng, lines: &'a [&'a str]) -> &'a str {
    lines[rng.random_range(0..lines.len())]
}

// ─── Tests ────────────────────────────────────────────────────────
