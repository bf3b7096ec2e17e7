//! golem-session: IO boundary to the external game collaborator.
//! Defines the session handle, its event/action vocabulary, and the
//! connector seam the runtime (and its tests) plug into. No business
//! logic — the game protocol itself lives behind [`SessionConnector`].

pub mod bridge;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

pub use bridge::BridgeConnector;

// ─── Identity ─────────────────────────────────────────────────────

/// Login identity for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

// ─── World geometry ───────────────────────────────────────────────

/// World-space point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Point raised to eye height, for look-at targets.
    pub fn eye(self) -> Self {
        Self {
            y: self.y + 1.6,
            ..self
        }
    }
}

/// A player the session can currently see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSighting {
    pub name: String,
    pub position: Vec3,
}

/// Continuously updated observation of the world, readable without
/// blocking. This is the clock source: `world_time` runs 0..24000.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldView {
    pub world_time: u32,
    pub health: f64,
    pub players: Vec<PlayerSighting>,
}

impl Default for WorldView {
    fn default() -> Self {
        Self {
            world_time: 0,
            health: 20.0,
            players: Vec::new(),
        }
    }
}

impl WorldView {
    /// Look up a visible player by name.
    pub fn player(&self, name: &str) -> Option<&PlayerSighting> {
        self.players.iter().find(|p| p.name == name)
    }
}

// ─── Events & actions ─────────────────────────────────────────────

/// Lifecycle and chat events emitted by a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Login,
    Spawn,
    Death,
    Kicked { reason: String },
    Error { message: String },
    End,
    Chat { sender: String, text: String },
}

/// Actions the keeper can ask the session to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    Chat(String),
    LookAt(Vec3),
    Look { yaw: f64, pitch: f64 },
    Disconnect,
}

// ─── Handle & connector ───────────────────────────────────────────

/// A live connection: an action sink, an event stream, and the world
/// view. Dropping the handle's channels ends the keeper's interest in
/// the session; the connector owns the wire.
pub struct SessionHandle {
    pub actions: mpsc::UnboundedSender<SessionAction>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub view: watch::Receiver<WorldView>,
}

/// Connection errors surfaced during session construction. All are
/// recoverable; the controller folds them into the errored path.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection refused: {detail}")]
    Refused { detail: String },

    #[error("handshake failed: {detail}")]
    Handshake { detail: String },

    #[error("connection attempt timed out")]
    Timeout,

    #[error("session io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Seam to the game protocol client. Connecting is the only suspension
/// point besides timers; implementations must not block the caller.
pub trait SessionConnector {
    fn connect(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<SessionHandle, SessionError>> + Send;
}

// ─── Tests ────────────────────────────────────────────────────────
