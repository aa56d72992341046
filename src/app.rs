//! Dashboard state.
//!
//! [`App`] holds the most recent snapshots from the two tick tasks and owns
//! the chart history. The UI applies incoming snapshots here and reads the
//! state back when drawing; nothing else mutates it.

use crate::disk::DiskSnapshot;
use crate::history::{HistoryBuffer, SeriesKey};
use crate::sampler::MetricSnapshot;

/// State behind the dashboard display.
pub struct App {
    /// Latest metric snapshot, if any tick has completed yet
    pub metrics: Option<MetricSnapshot>,
    /// Latest per-volume disk snapshots, in configured order
    pub disks: Vec<DiskSnapshot>,
    /// Rolling chart history
    pub history: HistoryBuffer,
    /// Number of metric samples applied since startup
    pub samples_seen: u64,
}

impl App {
    pub fn new() -> Self {
        Self {
            metrics: None,
            disks: Vec::new(),
            history: HistoryBuffer::new(),
            samples_seen: 0,
        }
    }

    /// Apply one metric snapshot: append a value (or a gap) to every
    /// series and keep the snapshot for the numeric readouts.
    pub fn apply_metrics(&mut self, snapshot: MetricSnapshot) {
        self.history.record(SeriesKey::Cpu, snapshot.cpu_percent);
        self.history.record(SeriesKey::Ram, snapshot.ram_percent);
        self.history.record(SeriesKey::Gpu, snapshot.gpu_percent);
        self.history.record(SeriesKey::Vram, snapshot.vram_percent);
        self.history
            .record(SeriesKey::Download, Some(snapshot.download_mbps));
        self.history
            .record(SeriesKey::Upload, Some(snapshot.upload_mbps));
        self.metrics = Some(snapshot);
        self.samples_seen += 1;
    }

    /// Replace the disk rows with the latest poll result.
    pub fn apply_disks(&mut self, snapshots: Vec<DiskSnapshot>) {
        self.disks = snapshots;
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
