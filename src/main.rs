//! # deskdash
//!
//! A personal desktop dashboard for the terminal.
//!
//! ## Overview
//!
//! `deskdash` keeps an always-on view of the host in one full-screen
//! terminal window: live CPU / RAM / GPU / VRAM gauges, network throughput
//! charts, and a usage bar per tracked volume. It is deliberately a
//! lightweight visual widget, not a metrics agent: nothing is exported,
//! nothing is persisted, and accuracy is traded for a short fixed refresh
//! interval.
//!
//! ## Features
//!
//! - **Metric sampling**: CPU load, memory, GPU utilization/VRAM and
//!   default-interface throughput, queried every couple of seconds with
//!   per-family failure isolation - one broken source blanks only its own
//!   readout
//! - **Disk polling**: per-volume free-space gauges on a slow independent
//!   cadence, with per-volume error isolation
//! - **Rolling charts**: fixed 60-sample history per metric, with dynamic
//!   axis rescaling for the unbounded throughput series
//! - **Headless mode**: one summary line per sample for SSH sessions
//!
//! ## Usage
//!
//! ```bash
//! # Run with the TUI (default)
//! deskdash
//!
//! # Track specific volumes
//! deskdash -d / -d /home
//!
//! # Headless mode, 5-second sampling
//! deskdash --headless -i 5
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`settings`]: tracked-disk settings store
//! - [`provider`]: host metrics provider boundary and live implementation
//! - [`sampler`]: one-tick sampling and derivation math
//! - [`history`]: rolling chart history and axis policy
//! - [`disk`]: per-volume disk usage polling
//! - [`tasks`]: periodic tick drivers and snapshot delivery
//! - [`app`]: dashboard state
//! - [`ui`]: terminal user interface and headless printer

mod app;
mod config;
mod disk;
mod history;
mod provider;
mod sampler;
mod settings;
mod tasks;
mod ui;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use disk::Statvfs;
use provider::SystemMetrics;
use sampler::MetricSampler;
use settings::SettingsStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; the TUI owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let settings = Arc::new(SettingsStore::load(
        Path::new(&config.settings_file),
        &config.disks,
    ));

    let (metrics_tx, metrics_rx) = broadcast::channel(16);
    let (disks_tx, disks_rx) = broadcast::channel(16);

    let sampler = MetricSampler::new(SystemMetrics::new());
    tokio::spawn(tasks::run_sampler(
        sampler,
        metrics_tx,
        config.sample_period(),
    ));
    tokio::spawn(tasks::run_disk_poller(
        Statvfs,
        settings,
        disks_tx,
        config.disk_period(),
    ));

    // Fall back to headless when stdout is not a TTY.
    let use_headless = config.headless || !is_terminal();
    if !config.headless && !is_terminal() {
        eprintln!("Warning: stdout is not a TTY, running in headless mode");
    }

    if use_headless {
        ui::run_headless(App::new(), metrics_rx, disks_rx).await?;
    } else {
        tokio::task::block_in_place(|| ui::run(App::new(), metrics_rx, disks_rx))?;
    }

    Ok(())
}

/// Check if stdout is connected to a terminal.
fn is_terminal() -> bool {
    unsafe { libc::isatty(libc::STDOUT_FILENO) != 0 }
}
