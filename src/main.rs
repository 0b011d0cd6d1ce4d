use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;

use netlab_scheduler::domain::clock::SystemClock;
use netlab_scheduler::domain::ids::{LabId, ServerId};
use netlab_scheduler::domain::lab_state::CanonicalState;
use netlab_scheduler::domain::orchestrator::{OpReport, Orchestrator};
use netlab_scheduler::{load_system, logger};

#[derive(Parser)]
#[command(name = "netlab_scheduler", about = "Reservation-driven lifecycle scheduler for virtual network labs")]
struct Cli {
    /// Path to the system configuration file.
    #[arg(short, long, default_value = "config/system.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reservation scheduler until interrupted.
    Run,

    /// Show every lab on a server with its canonical state.
    Status { server_id: ServerId },

    /// Start one lab.
    Start { server_id: ServerId, lab: String },

    /// Stop one lab.
    Stop { server_id: ServerId, lab: String },

    /// Stop every running lab on a server.
    StopAll { server_id: ServerId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();

    let cli = Cli::parse();
    let system = load_system(&cli.config).with_context(|| format!("could not load '{}'", cli.config))?;

    match cli.command {
        Command::Run => {
            let clock = Arc::new(SystemClock);
            let orchestrator = Orchestrator::new(system.manager.clone(), system.reservations.clone(), clock);

            orchestrator.start();
            log::info!("Scheduler running. Press Ctrl-C to stop.");

            tokio::signal::ctrl_c().await.context("could not listen for Ctrl-C")?;
            orchestrator.stop();
            log::info!("Shutdown requested; in-flight work finishes on its own.");
        }

        Command::Status { server_id } => {
            let overview = system.manager.lab_overview(server_id).await?;
            if overview.is_empty() {
                println!("no labs on server {server_id}");
            }
            for (lab, state) in overview {
                println!("{:<40} {}", lab.to_string(), paint(state));
            }
        }

        Command::Start { server_id, lab } => finish(system.manager.start_lab(server_id, &LabId::new(lab)).await)?,

        Command::Stop { server_id, lab } => finish(system.manager.stop_lab(server_id, &LabId::new(lab)).await)?,

        Command::StopAll { server_id } => finish(system.manager.stop_all_labs(server_id).await)?,
    }

    Ok(())
}

fn paint(state: CanonicalState) -> colored::ColoredString {
    match state {
        CanonicalState::Running => "running".green(),
        CanonicalState::Stopped => "stopped".blue(),
        CanonicalState::Unknown => "unknown".yellow(),
    }
}

fn finish(report: OpReport) -> anyhow::Result<()> {
    if report.ok {
        println!("{}", "ok".green());
        Ok(())
    } else {
        bail!(report.reason.unwrap_or_else(|| "unspecified failure".to_string()))
    }
}
