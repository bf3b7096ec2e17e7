//! Chat command dispatch decisions.
//!
//! Inbound chat is matched against an ordered rule table (exact, prefix
//! and substring rules — first match wins); unmatched text is a no-op.
//! Universal commands resolve before the sleep gate and before any
//! persona table, so they stay available while asleep. While asleep,
//! any other `!`-prefixed text collapses to a single sleeping notice.

use crate::persona::Mode;

// ─── Actions ──────────────────────────────────────────────────────

/// Resolved command. Targeted actions apply to the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    // Universal
    Greet,
    ReportMode,
    ManualRotate,
    ShowHelp,
    ShowStatus,
    ShowUptime,
    ForceSleep,
    ForceWake,
    // Fighter
    Guard,
    Patrol,
    FollowSender,
    ComeToSender,
    StopTask,
    // Specter
    RespondToMention,
    StalkSender,
    HauntSender,
    Vanish,
    CreepyMessage,
    // Sleep gate
    SleepingNotice,
}

// ─── Rule table ───────────────────────────────────────────────────

/// Match rule over normalized (lowercased, trimmed) text.
#[derive(Debug, Clone, Copy)]
enum Pattern {
    Exact(&'static str),
    Prefix(&'static str),
    Contains(&'static str),
}

impl Pattern {
    fn matches(self, text: &str) -> bool {
        match self {
            Self::Exact(p) => text == p,
            Self::Prefix(p) => text.starts_with(p),
            Self::Contains(p) => text.contains(p),
        }
    }
}

const UNIVERSAL: &[(Pattern, CommandAction)] = &[
    (Pattern::Exact("hi"), CommandAction::Greet),
    (Pattern::Exact("hello"), CommandAction::Greet),
    (Pattern::Exact("hey"), CommandAction::Greet),
    (Pattern::Exact("!mode"), CommandAction::ReportMode),
    (Pattern::Exact("!rotate"), CommandAction::ManualRotate),
    (Pattern::Exact("!help"), CommandAction::ShowHelp),
    (Pattern::Exact("!status"), CommandAction::ShowStatus),
    (Pattern::Exact("!uptime"), CommandAction::ShowUptime),
    (Pattern::Exact("!sleep"), CommandAction::ForceSleep),
    (Pattern::Exact("!wake"), CommandAction::ForceWake),
];

const FIGHTER: &[(Pattern, CommandAction)] = &[
    (Pattern::Exact("!guard"), CommandAction::Guard),
    (Pattern::Exact("!patrol"), CommandAction::Patrol),
    (Pattern::Exact("!follow me"), CommandAction::FollowSender),
    (Pattern::Exact("!come"), CommandAction::ComeToSender),
    (Pattern::Prefix("!stop"), CommandAction::StopTask),
];

const SPECTER: &[(Pattern, CommandAction)] = &[
    (Pattern::Exact("!stalk"), CommandAction::StalkSender),
    (Pattern::Exact("!haunt"), CommandAction::HauntSender),
    (Pattern::Exact("!vanish"), CommandAction::Vanish),
    (Pattern::Exact("!message"), CommandAction::CreepyMessage),
    (Pattern::Prefix("!stop"), CommandAction::StopTask),
    (Pattern::Contains("ghost"), CommandAction::RespondToMention),
    (Pattern::Contains("spirit"), CommandAction::RespondToMention),
];

fn lookup(table: &[(Pattern, CommandAction)], text: &str) -> Option<CommandAction> {
    table
        .iter()
        .find(|(pattern, _)| pattern.matches(text))
        .map(|&(_, action)| action)
}

// ─── Dispatch ─────────────────────────────────────────────────────

/// Resolve one inbound chat line to an action.
///
/// Self-sent messages and unmatched text resolve to `None`.
pub fn dispatch(
    sender: &str,
    own_name: &str,
    raw: &str,
    mode: Mode,
    asleep: bool,
) -> Option<CommandAction> {
    if sender == own_name {
        return None;
    }
    let text = raw.trim().to_lowercase();

    if let Some(action) = lookup(UNIVERSAL, &text) {
        return Some(action);
    }

    if asleep {
        if text.starts_with('!') {
            return Some(CommandAction::SleepingNotice);
        }
        return None;
    }

    match mode {
        Mode::Fighter => lookup(FIGHTER, &text),
        Mode::Specter => lookup(SPECTER, &text).or_else(|| {
            // Speaking the specter's name summons it.
            text.contains(&own_name.to_lowercase())
                .then_some(CommandAction::RespondToMention)
        }),
    }
}

// ─── Help text ────────────────────────────────────────────────────

const HELP_UNIVERSAL: &[&str] = &[
    "=== COMMANDS ===",
    "!help - show this help",
    "!mode - current mode",
    "!rotate - rotate persona",
    "!status - status line",
    "!uptime - session uptime",
    "!sleep - sleep (night only)",
    "!wake - wake (day only)",
];

const HELP_FIGHTER: &[&str] = &[
    "=== FIGHTER ===",
    "!guard - guard this spot",
    "!patrol - patrol the area",
    "!follow me - follow you",
    "!come - come to you",
    "!stop - stop current task",
];

const HELP_SPECTER: &[&str] = &[
    "=== SPECTER ===",
    "say my name - summon me",
    "!stalk - be stalked",
    "!haunt - be haunted",
    "!vanish - I disappear",
    "!message - a whisper",
    "!stop - stop current task",
];

/// Fixed ordered help block for the active mode. The runtime emits
/// these with a small inter-line delay purely for readability.
pub fn help_lines(mode: Mode) -> Vec<&'static str> {
    let tail = match mode {
        Mode::Fighter => HELP_FIGHTER,
        Mode::Specter => HELP_SPECTER,
    };
    HELP_UNIVERSAL.iter().chain(tail.iter()).copied().collect()
}

// ─── Tests ────────────────────────────────────────────────────────
