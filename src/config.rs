//! Command-line configuration for deskdash.
//!
//! This module defines all CLI arguments using `clap` for parsing.
//! The configuration controls the two sampling cadences, the tracked-disk
//! list, and the display mode.

use clap::Parser;

/// Personal desktop dashboard.
///
/// deskdash shows live host telemetry (CPU, RAM, GPU, VRAM, network
/// throughput) together with per-volume disk usage gauges, refreshed on
/// short fixed intervals. Metric sampling and disk polling run on
/// independent timers; one unreadable metric source or volume only blanks
/// its own readout.
///
/// # Examples
///
/// ```bash
/// # Run with the terminal dashboard (default)
/// deskdash
///
/// # Track specific volumes instead of the settings file
/// deskdash -d / -d /home
///
/// # Headless mode with 5-second sampling
/// deskdash --headless -i 5
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Live host telemetry and disk usage dashboard")]
pub struct Config {
    /// Interval in seconds between metric samples.
    ///
    /// Drives the CPU/RAM/GPU/network readouts and charts. Values below 1
    /// are clamped to 1; 1-2 seconds is the intended range.
    #[arg(short, long, default_value_t = 2)]
    pub interval: u64,

    /// Interval in seconds between disk usage polls.
    ///
    /// Disk usage changes slowly; polling it at the metric cadence would
    /// waste cycles.
    #[arg(long, default_value_t = 60)]
    pub disk_interval: u64,

    /// Track this volume (repeatable). Overrides the settings file.
    ///
    /// A drive letter token (`C:`) on Windows, a mount path (`/`,
    /// `/home`) elsewhere.
    #[arg(short = 'd', long = "disk", value_name = "PATH")]
    pub disks: Vec<String>,

    /// Path to the dashboard settings file.
    ///
    /// Only the tracked-disk list is read from it; the rest of the
    /// document belongs to the settings editor.
    #[arg(long, default_value = "dashboard_settings.json")]
    pub settings_file: String,

    /// Run in headless mode (no TUI, one summary line per sample).
    ///
    /// Useful for running over SSH without terminal capabilities.
    #[arg(long)]
    pub headless: bool,
}

impl Config {
    /// Metric sampling period with the lower bound applied.
    pub fn sample_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval.max(1))
    }

    /// Disk polling period with the lower bound applied.
    pub fn disk_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.disk_interval.max(1))
    }
}
