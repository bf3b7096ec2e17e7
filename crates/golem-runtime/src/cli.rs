//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

use golem_core::{Persona, PersonaRoster};

#[derive(Parser)]
#[command(name = "golem", about = "persona-rotating game session keeper")]
pub struct Cli {
    /// UDS socket path (default: /tmp/golem-$USER/golemd.sock)
    #[arg(long, short = 's', global = true)]
    pub socket_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the keeper (controller loop + status server)
    Run(RunOpts),
    /// Query the running keeper's status
    Status,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Game protocol adapter host
    #[arg(long, env = "GOLEM_ADAPTER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Game protocol adapter port
    #[arg(long, env = "GOLEM_ADAPTER_PORT", default_value = "25599")]
    pub port: u16,

    /// World-time poll interval in seconds
    #[arg(long, default_value = "30")]
    pub poll_interval_secs: u64,

    /// Persona as NAME:MODE (repeatable, cycled in order).
    /// Default roster: Bastion:fighter Wraith:specter
    #[arg(long = "persona")]
    pub personas: Vec<String>,
}

/// Build the roster from `--persona` flags, falling back to the
/// default pair.
pub fn build_roster(specs: &[String]) -> Result<PersonaRoster, String> {
    if specs.is_empty() {
        return Ok(PersonaRoster::default_pair());
    }
    let personas = specs
        .iter()
        .enumerate()
        .map(|(id, spec)| Persona::parse_spec(spec, id))
        .collect::<Result<Vec<_>, _>>()?;
    PersonaRoster::new(personas)
}

/// Default socket path using $USER for per-user isolation.
pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/golem/golemd.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/golem-{user}/golemd.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use golem_core::Mode;

    #[test]
    fn empty_specs_use_default_pair() {
        let roster = build_roster(&[]).expect("roster");
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn specs_build_ordered_roster() {
        let specs = vec!["Echo:specter".to_string(), "Anvil:fighter".to_string()];
        let roster = build_roster(&specs).expect("roster");
        assert_eq!(roster.get(0).display_name, "Echo");
        assert_eq!(roster.get(0).mode, Mode::Specter);
        assert_eq!(roster.get(1).display_name, "Anvil");
        assert_eq!(roster.get(1).id, 1);
    }

    #[test]
    fn bad_spec_is_rejected() {
        assert!(build_roster(&["NoMode".to_string()]).is_err());
        assert!(build_roster(&["X:wizard".to_string()]).is_err());
    }
}
