//! Chat reply formatting and the delayed help emitter.
//!
//! The dispatch decisions themselves are pure (`golem_core::command`);
//! this module renders the visible side of them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use golem_core::{Mode, SleepState, help_lines};
use golem_session::{SessionAction, WorldView};

/// Inter-line delay for `!help` output. Readability only; not rate
/// limiting.
pub(crate) const HELP_LINE_DELAY: Duration = Duration::from_millis(100);

pub(crate) fn greeting(sender: &str) -> String {
    format!("Hello {sender}!")
}

pub(crate) fn mode_line(mode: Mode) -> String {
    format!("I'm in {} mode!", mode.as_str().to_uppercase())
}

pub(crate) fn status_line(mode: Mode, sleep: SleepState, view: &WorldView) -> String {
    let activity = if sleep.is_asleep() { "Sleeping" } else { "Active" };
    format!(
        "Status: {} | {} | Health: {} | Nearby: {} players",
        mode.as_str().to_uppercase(),
        activity,
        view.health.floor(),
        view.players.len()
    )
}

pub(crate) fn uptime_line(started_at: DateTime<Utc>, now: DateTime<Utc>, mode: Mode) -> String {
    let elapsed = now.signed_duration_since(started_at);
    let minutes = elapsed.num_minutes().max(0);
    format!(
        "Uptime: {}h {}m in {} mode",
        minutes / 60,
        minutes % 60,
        mode.as_str().to_uppercase()
    )
}

pub(crate) fn sleeping_notice(mode: Mode) -> &'static str {
    match mode {
        Mode::Fighter => "I am sleeping at night. Wait for daytime.",
        Mode::Specter => "Even specters sleep at night...",
    }
}

/// Emit the help block line by line with a small delay between lines.
///
/// Runs as its own short-lived task so the event loop never sleeps;
/// dies with the session when the action channel closes.
pub(crate) fn spawn_help_emitter(
    actions: UnboundedSender<SessionAction>,
    mode: Mode,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for line in help_lines(mode) {
            if actions.send(SessionAction::Chat(line.to_string())).is_err() {
                break;
            }
            tokio::time::sleep(HELP_LINE_DELAY).await;
        }
    })
}

// ─── Tests ────────────────────────────────────────────────────────
