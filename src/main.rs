//! autolinux - Entry point
//!
//! Parses CLI arguments, logs in to the remote host and performs one action.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use autolinux::config::{Action, Args, Config};
use autolinux::error::Result;
use autolinux::{AutolinuxError, Host};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Logs go to stderr, command output to stdout
    let default_level = if args.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::from_args(args)?;

    info!("autolinux v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Connecting to {}@{}", config.user, config.target.address());

    let mut host = Host::with_target(config.target.clone());
    host.set_credential(config.credential());

    if config.action == Action::Test {
        let alive = host.test().await;
        println!("{}", alive);
        close(&mut host).await;
        return Ok(if alive {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let connected = host.connect().await;
    if config.strict {
        connected?;
    }

    let credential = host
        .credential()
        .ok_or_else(|| AutolinuxError::auth("no credential attached"))?;

    let outcome = match &config.action {
        Action::Exec { command } => credential.run_command(command).await.and_then(|out| {
            let json = serde_json::to_string_pretty(&out)
                .map_err(|e| AutolinuxError::command(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }),
        Action::Get { remote, local } => credential.copy_file(remote, local.as_deref()).await,
        Action::Put { local, remote } => credential.copy_to_remote(local, remote.as_deref()).await,
        Action::Test => Ok(()),
    };

    close(&mut host).await;
    outcome?;

    info!("Done");
    Ok(ExitCode::SUCCESS)
}

async fn close(host: &mut Host) {
    if let Some(credential) = host.credential_mut() {
        credential.close().await;
    }
}
