//! Periodic tick drivers.
//!
//! Two independent self-rescheduling loops: the metric sampler on a short
//! cadence and the disk poller on a slow one. Each loop runs its first tick
//! immediately, awaits tick completion before rescheduling (a slow tick
//! delays, never overlaps, the next one) and pushes its snapshot to a
//! broadcast channel. When the last subscriber is gone the push fails and
//! the loop cancels itself; that is the normal shutdown path, not an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::disk::{self, DiskSnapshot, FilesystemStats};
use crate::provider::HostMetrics;
use crate::sampler::{MetricSampler, MetricSnapshot};
use crate::settings::SettingsStore;

/// Drive the metric sampler until the display surface is gone.
pub async fn run_sampler<P: HostMetrics>(
    sampler: MetricSampler<P>,
    tx: broadcast::Sender<MetricSnapshot>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let snapshot = sampler.sample().await;
        debug!(?snapshot, "metric sample");
        if tx.send(snapshot).is_err() {
            info!("no metric subscribers left, stopping sampler");
            return;
        }
    }
}

/// Drive the disk poller until the display surface is gone.
///
/// The tracked-path list is snapshotted at the top of every tick so a
/// settings change cannot alter an in-flight poll.
pub async fn run_disk_poller<F: FilesystemStats>(
    fs: F,
    settings: Arc<SettingsStore>,
    tx: broadcast::Sender<Vec<DiskSnapshot>>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let paths = settings.tracked_disk_paths();
        let snapshots = disk::poll_all(&fs, &paths);
        debug!(volumes = snapshots.len(), "disk poll");
        if tx.send(snapshots).is_err() {
            info!("no disk subscribers left, stopping poller");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::FsStats;
    use std::io;
    use std::path::Path;

    struct OneVolume;

    impl FilesystemStats for OneVolume {
        fn statfs(&self, _path: &str) -> io::Result<FsStats> {
            Ok(FsStats {
                blocks: 1000,
                block_size: 4096,
                available_blocks: 250,
            })
        }
    }

    #[tokio::test]
    async fn poller_stops_once_receivers_are_gone() {
        let settings = Arc::new(SettingsStore::load(
            Path::new("/nonexistent"),
            &["/".to_string()],
        ));
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        // Must return on its own instead of ticking forever.
        tokio::time::timeout(
            Duration::from_secs(1),
            run_disk_poller(OneVolume, settings, tx, Duration::from_millis(10)),
        )
        .await
        .expect("poller should cancel itself when the channel is closed");
    }

    #[tokio::test]
    async fn poller_delivers_an_immediate_first_tick() {
        let settings = Arc::new(SettingsStore::load(
            Path::new("/nonexistent"),
            &["/".to_string()],
        ));
        let (tx, mut rx) = broadcast::channel(4);
        let handle = tokio::spawn(run_disk_poller(
            OneVolume,
            settings,
            tx,
            Duration::from_secs(3600),
        ));
        let snapshots = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("first tick should arrive without waiting a full period")
            .expect("channel open");
        assert_eq!(snapshots.len(), 1);
        handle.abort();
    }
}
