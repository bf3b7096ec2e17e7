//! golem: persona-rotating game session keeper.
//! Single-process binary embedding the controller, the behavior
//! scheduler, and the status server in-process.

use clap::Parser;

mod behaviors;
mod cli;
mod client;
mod controller;
mod dispatch;
mod scheduler;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Run(opts) => {
            let filter = std::env::var("GOLEM_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!("golem keeper starting");

            let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);
            controller::run_keeper(opts, &socket_path).await?;
        }
        cli::Command::Status => {
            let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);
            client::cmd_status(&socket_path).await?;
        }
    }

    Ok(())
}
