// Passpoint Configuration Daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use passpointd::{
    config::{load_config, load_record},
    inventory::{validate_interface_name, DirectoryLister},
    passpoint::Passpoint,
    reconciler::SweepReport,
    state_store::OvshClient,
    status_file::{self, Status},
    types::{Config, FileLayout},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};

type Target = Passpoint<OvshClient, DirectoryLister>;

#[derive(Parser)]
#[command(name = "passpointd")]
#[command(about = "Passpoint (Hotspot 2.0) configuration daemon", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/passpointd/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Write the Passpoint config file for an interface
    Configure {
        if_name: String,
        /// Passpoint record (TOML)
        #[arg(short, long)]
        record: PathBuf,
        /// Write hs20=0 regardless of the record
        #[arg(long)]
        disable: bool,
    },
    /// Reduce the Passpoint config file of an interface to hs20=0
    Deconfigure { if_name: String },
    /// Toggle interfaces whose hostapd config lacks the desired Passpoint setup
    Start,
    /// Toggle interfaces still running Passpoint that is no longer desired
    Stop,
    /// Print a value from the hostapd config of an interface
    Get { key: String, if_name: String },
    /// Print the aggregate Passpoint service state
    Status,
    /// Print the Passpoint fragment hostapd includes for an interface
    HostapdFragment { if_name: String },
    /// Run start/stop sweeps periodically until signalled
    Daemon,
}

fn build_target(config: &Config) -> Target {
    let layout = FileLayout::from(&config.general);
    let lister = DirectoryLister::new(layout.passpoint_dir());
    Passpoint::new(
        layout,
        OvshClient::new(config.store.tool.clone()),
        lister,
        Duration::from_millis(config.general.wait_timeout_ms),
    )
}

fn check_report(report: &SweepReport) -> Result<()> {
    if report.success() {
        return Ok(());
    }
    if report.inventory_error {
        anyhow::bail!(
            "Passpoint {:?} failed: managed interfaces could not be listed",
            report.kind
        );
    }
    let failed = report.failed().collect::<Vec<_>>();
    anyhow::bail!(
        "Passpoint {:?} failed for interface(s): {}",
        report.kind,
        failed.join(", ")
    )
}

/// One daemon iteration: start sweep, stop sweep, then aggregate state
async fn run_sweeps(target: &Target) -> Status {
    let start = target.start().await;
    if let Err(e) = check_report(&start) {
        log::warn!("{}", e);
    }

    let stop = target.stop().await;
    if let Err(e) = check_report(&stop) {
        log::warn!("{}", e);
    }

    Status {
        desired_all: target.passpoint_desired_all(),
        applied_all: target.passpoint_applied_all().await,
        sweep_ok: start.success() && stop.success(),
    }
}

async fn run_daemon(target: &Target, config: &Config) -> Result<()> {
    let status_path = config.general.status_file.clone();

    log::info!("Passpoint directory: {}", target.layout().passpoint_dir().display());
    log::info!("Sweep interval: {}s", config.general.sweep_interval);
    log::info!("Wait timeout: {}ms", config.general.wait_timeout_ms);

    let mut sweep_timer = interval(Duration::from_secs(config.general.sweep_interval));
    // A sweep can outlast the interval when VIFs are slow to converge
    sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Set up signal handlers for graceful shutdown
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to set up SIGTERM handler")?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .context("Failed to set up SIGINT handler")?;

    log::info!("Daemon started successfully");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                log::info!("Received SIGINT");
                break;
            }
            _ = sweep_timer.tick() => {
                let status = run_sweeps(target).await;
                log::debug!("{:?}", status);
                if let Some(path) = &status_path {
                    if let Err(e) = status_file::write_status(path, &status) {
                        log::warn!("{:#}", e);
                    }
                }
            }
        }
    }

    if let Some(path) = &status_path {
        status_file::cleanup(path);
    }
    log::info!("Shutdown complete");
    Ok(())
}

fn main() -> Result<()> {
    // Sweeps run strictly one after another; a single thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .thread_name("passpointd")
        .enable_time()
        .enable_io()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.general.log_level),
    )
    .init();

    let target = build_target(&config);
    target
        .ensure_environment()
        .context("Failed to prepare Passpoint environment")?;

    match args.command {
        Cmd::Configure {
            if_name,
            record,
            disable,
        } => {
            validate_interface_name(&if_name)?;
            let record = load_record(&record)
                .with_context(|| format!("Failed to load Passpoint record from {:?}", record))?;
            let enable = !disable && record.enable.unwrap_or(true);
            if !target.configure(&record, &if_name, enable) {
                anyhow::bail!("Failed to configure Passpoint for {}", if_name);
            }
        }
        Cmd::Deconfigure { if_name } => {
            validate_interface_name(&if_name)?;
            if !target.deconfigure(&if_name) {
                anyhow::bail!("Failed to deconfigure Passpoint for {}", if_name);
            }
        }
        Cmd::Start => check_report(&target.start().await)?,
        Cmd::Stop => check_report(&target.stop().await)?,
        Cmd::Get { key, if_name } => {
            validate_interface_name(&if_name)?;
            let value = target
                .get_configuration(&key, &if_name)
                .with_context(|| format!("{} not set for {}", key, if_name))?;
            println!("{}", value);
        }
        Cmd::Status => {
            println!("desired_all={}", target.passpoint_desired_all());
            println!("applied_all={}", target.passpoint_applied_all().await);
        }
        Cmd::HostapdFragment { if_name } => {
            validate_interface_name(&if_name)?;
            let fragment = target
                .hostapd_fragment(&if_name)
                .with_context(|| format!("No Passpoint config for {}", if_name))?;
            print!("{}", fragment);
        }
        Cmd::Daemon => run_daemon(&target, &config).await?,
    }

    Ok(())
}
