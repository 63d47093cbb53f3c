//! ModOps - command line front end for the mod operation engine.
//!
//! # Execution Flow
//!
//! 1. Parse arguments and load `modops.yaml` (plus `MODOPS_*` overrides)
//! 2. Initialize logging → `<config dir>/logs/modops.<date>`
//! 3. Create a tokio runtime and a [`ModManager`]
//! 4. Run one install, uninstall or status command, printing queue and progress
//!    notifications as they arrive
//! 5. Shutdown the runtime with a 5s timeout

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use modops::logging::{LoggingOptions, setup_logging};
use modops::{APP_NAME, ConfigManager, InstallOutcome, ModManager, VERSION};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "modops")]
#[command(about = "Queued install and uninstall of Spore mods", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding modops.yaml (defaults to the per-user config dir)
    #[arg(long, global = true)]
    config_dir: Option<Utf8PathBuf>,

    /// Debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download and install a mod.
    Install {
        mod_key: String,
        /// Package or zip URL (legacy mods fall back to their catalog URL)
        #[arg(long, default_value = "")]
        url: String,
        /// Display title
        #[arg(long, default_value = "")]
        title: String,
    },

    /// Uninstall a mod.
    Uninstall {
        mod_key: String,
        #[arg(long, default_value = "")]
        title: String,
    },

    /// Report whether a mod is installed.
    Status { mod_key: String },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_manager = match &cli.config_dir {
        Some(dir) => ConfigManager::new(dir)?,
        None => ConfigManager::default_location()?,
    };
    let mut config = config_manager.load()?;
    config.debug_mode |= cli.debug;

    let mut logging = LoggingOptions::new(config_manager.config_dir().join("logs"));
    logging.debug_mode = config.debug_mode;
    logging.console_output = config.debug_mode;
    let _guard = setup_logging(&logging)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("modops-worker")
        .build()?;

    let code = runtime.block_on(run(cli.command, config));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");
    code
}

async fn run(command: Command, config: modops::ModOpsConfig) -> Result<ExitCode> {
    let manager = ModManager::new(config);

    let mut snapshots = manager.subscribe();
    let mut progress = manager.subscribe_progress();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                snapshot = snapshots.recv() => match snapshot {
                    Ok(snapshot) => {
                        if let Some(op) = snapshot.active {
                            println!("[#{}] {} {} {:?} {}%", op.id, op.action, op.mod_key, op.status, op.percent);
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
                update = progress.recv() => match update {
                    Ok(update) => println!(
                        "  {}: {:?} {}% {}",
                        update.mod_key, update.progress.step, update.progress.percent, update.progress.message
                    ),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
            }
        }
    });

    let result = match command {
        Command::Install { mod_key, url, title } => {
            match manager.install(&mod_key, &url, &title).await {
                Ok(InstallOutcome::Completed) => {
                    println!("Installed {}", mod_key);
                    Ok(ExitCode::SUCCESS)
                }
                Ok(InstallOutcome::Cancelled) => {
                    println!("Install of {} was cancelled", mod_key);
                    Ok(ExitCode::from(2))
                }
                Err(e) => Err(e),
            }
        }
        Command::Uninstall { mod_key, title } => manager
            .uninstall(&mod_key, &title)
            .await
            .map(|()| {
                println!("Uninstalled {}", mod_key);
                ExitCode::SUCCESS
            }),
        Command::Status { mod_key } => {
            let installed = manager.is_installed(&mod_key).await;
            println!("{}: {}", mod_key, if installed { "installed" } else { "not installed" });
            Ok(if installed { ExitCode::SUCCESS } else { ExitCode::from(1) })
        }
    };

    printer.abort();

    match result {
        Ok(code) => Ok(code),
        Err(e) => {
            tracing::error!("Operation failed [{}]: {}", e.code(), e);
            eprintln!("{}: {}", e.code(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
