mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use ambilight_integration::{JointSpaceClient, ZoneColorSource};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shared::domain::{Side, SyncMode};
use sync_core::SyncEngine;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wled_integration::WledUdpSink;

use crate::config::Settings;

const HALT_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Mirrors a Philips Ambilight TV onto a WLED controller.
#[derive(Parser, Debug)]
#[command(name = "ambisync", version)]
struct Cli {
    /// TOML settings file. Defaults to ./ambisync.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    tv_ip: Option<String>,
    #[arg(long, global = true)]
    wled_host: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream colors until interrupted.
    Run(RunArgs),
    /// Fetch, map and send a single frame.
    Once(RunArgs),
    /// Print the TV's zone topology.
    Topology,
    /// Print the TV's ambilight mode, or set it when a name is given.
    Mode { name: Option<String> },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[arg(long)]
    mode: Option<SyncMode>,
    #[arg(long)]
    brightness: Option<f64>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

impl RunArgs {
    fn apply(&self, settings: &mut Settings) -> SyncMode {
        if let Some(brightness) = self.brightness {
            settings.brightness = brightness;
        }
        if let Some(interval) = self.poll_interval_ms {
            settings.poll_interval_ms = interval;
        }
        self.mode.unwrap_or(settings.sync_mode)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(tv_ip) = cli.tv_ip {
        settings.tv_ip = tv_ip;
    }
    if let Some(wled_host) = cli.wled_host {
        settings.wled_host = wled_host;
    }

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => {
            let mode = args.apply(&mut settings);
            run(settings, mode).await
        }
        Command::Once(args) => {
            let mode = args.apply(&mut settings);
            once(settings, mode).await
        }
        Command::Topology => {
            let client = JointSpaceClient::new(&settings.tv_ip, settings.api_version)?;
            let topology = client.topology().await?;
            for side in Side::ALL {
                println!("{side}: {} zones", topology.count(side));
            }
            println!("total: {} zones", topology.total());
            Ok(())
        }
        Command::Mode { name } => {
            let client = JointSpaceClient::new(&settings.tv_ip, settings.api_version)?;
            if let Some(name) = name {
                client.set_mode(&name).await?;
            }
            let mode = client.mode().await?;
            println!("current: {}", mode.current);
            if !mode.available.is_empty() {
                println!("available: {}", mode.available.join(", "));
            }
            Ok(())
        }
    }
}

fn build_engine(settings: &Settings) -> Result<SyncEngine> {
    let source = Arc::new(JointSpaceClient::new(&settings.tv_ip, settings.api_version)?);
    let sink = Arc::new(WledUdpSink::new(&settings.wled_host, settings.wled_port));
    Ok(SyncEngine::new(source, sink, settings.sync_config()?))
}

async fn run(settings: Settings, mode: SyncMode) -> Result<()> {
    info!(
        tv = %settings.tv_ip,
        wled = %format!("{}:{}", settings.wled_host, settings.wled_port),
        poll_interval_ms = settings.poll_interval().as_millis() as u64,
        protocol = %settings.protocol,
        "ambisync: starting"
    );
    let engine = build_engine(&settings)?;
    engine.start(mode).await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut report = tokio::time::interval(settings.stats_interval());
    report.tick().await;
    let mut halt_check = tokio::time::interval(HALT_CHECK_INTERVAL);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("failed to listen for ctrl-c")?;
                info!("ambisync: interrupted, shutting down");
                break;
            }
            _ = report.tick() => {
                let stats = engine.stats().await;
                info!(
                    updates = stats.update_count,
                    errors = stats.errors,
                    avg_latency_ms = stats.average_latency_ms,
                    last_update = %stats
                        .last_update
                        .map(|at| at.format("%H:%M:%S").to_string())
                        .unwrap_or_else(|| "never".into()),
                    "ambisync: stats"
                );
            }
            _ = halt_check.tick() => {
                if !engine.state().await.is_running() {
                    break;
                }
            }
        }
    }

    let result = engine.destroy().await;
    let stats = engine.stats().await;
    info!(
        updates = stats.update_count,
        errors = stats.errors,
        "ambisync: stopped"
    );
    if let Err(err) = &result {
        error!(%err, "ambisync: sync loop halted");
    }
    result.context("sync loop halted on a configuration fault")
}

async fn once(settings: Settings, mode: SyncMode) -> Result<()> {
    let engine = build_engine(&settings)?;
    let result = engine.sync_once(mode).await;
    engine.destroy().await?;
    result?;

    let stats = engine.stats().await;
    println!(
        "sent one {mode} frame in {:.1} ms",
        stats.average_latency_ms
    );
    Ok(())
}
