use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─── Mode ─────────────────────────────────────────────────────────

/// Behavior mode a persona embodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fighter,
    Specter,
}

impl Mode {
    pub const ALL: [Self; 2] = [Self::Fighter, Self::Specter];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fighter => "fighter",
            Self::Specter => "specter",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fighter" => Ok(Self::Fighter),
            "specter" => Ok(Self::Specter),
            _ => Err(format!("unknown mode: {s}")),
        }
    }
}

// ─── Persona ──────────────────────────────────────────────────────

/// One named identity/mode pair the keeper can embody.
///
/// Immutable after construction; the roster index is the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: usize,
    pub display_name: String,
    pub mode: Mode,
}

impl Persona {
    /// Parse a `NAME:MODE` CLI spec into a persona (id assigned by the roster).
    pub fn parse_spec(spec: &str, id: usize) -> Result<Self, String> {
        let (name, mode) = spec
            .split_once(':')
            .ok_or_else(|| format!("persona spec missing ':': {spec}"))?;
        if name.is_empty() {
            return Err(format!("persona spec has empty name: {spec}"));
        }
        Ok(Self {
            id,
            display_name: name.to_string(),
            mode: mode.parse()?,
        })
    }
}

// ─── Roster ───────────────────────────────────────────────────────

/// Ordered, fixed persona list with cyclic rotation.
#[derive(Debug, Clone)]
pub struct PersonaRoster {
    personas: Vec<Persona>,
}

impl PersonaRoster {
    /// Build a roster from an ordered persona list. Empty lists are rejected.
    pub fn new(personas: Vec<Persona>) -> Result<Self, String> {
        if personas.is_empty() {
            return Err("persona roster must not be empty".to_string());
        }
        Ok(Self { personas })
    }

    /// Default two-persona roster.
    pub fn default_pair() -> Self {
        Self {
            personas: vec![
                Persona {
                    id: 0,
                    display_name: "Bastion".to_string(),
                    mode: Mode::Fighter,
                },
                Persona {
                    id: 1,
                    display_name: "Wraith".to_string(),
                    mode: Mode::Specter,
                },
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Persona at `index` (index is always taken modulo the roster length).
    pub fn get(&self, index: usize) -> &Persona {
        &self.personas[index % self.personas.len()]
    }

    /// Next index in cyclic order.
    pub fn advance(&self, index: usize) -> usize {
        (index + 1) % self.personas.len()
    }
}

// ─── Tests ────────────────────────────────────────────────────────
