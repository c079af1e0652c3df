mod alerting;
mod config;
mod pipeline;
mod probe;
mod registry;
mod runlog;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shipshape_common::alert::{Alert, AlertCategory, Severity};

use crate::alerting::AlertDispatcher;
use crate::pipeline::{health, prune, RunError, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "shipshape", version, about = "Registry cleanup and fleet health toolkit", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "shipshape.toml")]
    config: PathBuf,

    /// Named context from the configuration to run against
    #[arg(long)]
    context: Option<String>,

    /// Perform mutating actions instead of the default simulation
    #[arg(long)]
    execute: bool,

    /// Append one JSON line per action outcome to this file
    #[arg(long)]
    run_log: Option<PathBuf>,

    /// Also write daily JSON log files into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Number of resources processed in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prune stale image tags from the container registry
    Prune {
        /// Restrict the run to a single repository
        #[arg(long)]
        repository: Option<String>,

        /// How many of the newest tags to keep per repository
        #[arg(long)]
        keep: Option<u32>,
    },
    /// Probe fleet hosts, alert on breaches and restart stopped services
    Health {
        /// Restrict the run to a single configured host
        #[arg(long)]
        host: Option<String>,

        /// Alarm when free disk space drops below this many gigabytes
        #[arg(long)]
        disk_free_gb: Option<f64>,

        /// Alarm when CPU usage rises above this percentage
        #[arg(long)]
        cpu_percent: Option<f64>,

        /// Alarm when memory usage rises above this percentage
        #[arg(long)]
        memory_percent: Option<f64>,
    },
    /// Send a test alert through every configured channel
    TestChannels {
        /// Override the default test message
        #[arg(long)]
        message: Option<String>,
    },
}

fn init_logging(log_dir: Option<&std::path::Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let stdout_layer = fmt::layer().with_writer(std::io::stdout);
            let file_appender = rolling::daily(dir, "shipshape.log");
            let file_layer = fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .json();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(stdout_layer)
                .init();
        }
        None => {
            let stdout_layer = fmt::layer().with_writer(std::io::stdout);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.log_dir.as_deref());
    info!(version = env!("CARGO_PKG_VERSION"), "starting shipshape");
    dotenv().ok();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), RunError> {
    let config = config::load(&cli.config, cli.context.as_deref())?;

    let options = RunOptions {
        run_id: uuid::Uuid::new_v4().to_string(),
        simulate: !cli.execute,
        concurrency: cli.concurrency.unwrap_or(config.concurrency),
        run_log: cli
            .run_log
            .clone()
            .or_else(|| config.run_log.as_ref().map(PathBuf::from)),
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            let _ = cancel_tx.send(true);
        }
    });

    match cli.command {
        Command::Prune { repository, keep } => {
            let summary =
                prune::run(&config, repository.as_deref(), keep, &options, cancel_rx).await?;
            println!("{summary}");
            Ok(())
        }
        Command::Health {
            host,
            disk_free_gb,
            cpu_percent,
            memory_percent,
        } => {
            let overrides = health::ThresholdOverrides {
                disk_free_gb,
                cpu_percent,
                memory_percent,
            };
            let report =
                health::run(&config, host.as_deref(), overrides, &options, cancel_rx).await?;
            println!("{}", report.summary);
            println!("{} alert(s) raised", report.alerts.len());
            Ok(())
        }
        Command::TestChannels { message } => {
            // Sending for real is the point of this command; the simulate
            // default does not apply here.
            let dispatcher = AlertDispatcher::from_config(&config.channels, false);
            let alert = Alert::new(
                Severity::Info,
                AlertCategory::Other,
                "shipshape",
                message.unwrap_or_else(|| "This is a test alert from shipshape.".to_string()),
            );
            let report = dispatcher.dispatch(&alert).await;
            for line in report.lines() {
                println!("{line}");
            }
            Ok(())
        }
    }
}
