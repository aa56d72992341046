//! Per-volume disk usage polling.
//!
//! Each tracked path is queried independently on a slow cadence. One
//! unreadable volume must never abort the rest of the poll: its slot in the
//! result carries an error snapshot instead, and the display shows a
//! distinct error state rather than stale numbers.

use std::io;

/// Raw block-level filesystem statistics for one volume.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStats {
    /// Total data blocks on the volume
    pub blocks: u64,
    /// Fundamental block size in bytes
    pub block_size: u64,
    /// Blocks available to unprivileged users
    pub available_blocks: u64,
}

/// Filesystem statistics boundary, substitutable in tests.
pub trait FilesystemStats {
    fn statfs(&self, path: &str) -> io::Result<FsStats>;
}

/// Real implementation backed by `statvfs(2)`.
pub struct Statvfs;

#[cfg(unix)]
impl FilesystemStats for Statvfs {
    fn statfs(&self, path: &str) -> io::Result<FsStats> {
        let c_path = std::ffi::CString::new(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(FsStats {
            blocks: stat.f_blocks as u64,
            // f_frsize is the size f_blocks is counted in
            block_size: stat.f_frsize as u64,
            available_blocks: stat.f_bavail as u64,
        })
    }
}

#[cfg(not(unix))]
impl FilesystemStats for Statvfs {
    fn statfs(&self, _path: &str) -> io::Result<FsStats> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "filesystem statistics are only implemented for unix hosts",
        ))
    }
}

/// Successfully polled usage figures for one volume.
#[derive(Clone, Debug, PartialEq)]
pub struct DiskUsage {
    /// The path as the user configured it
    pub path: String,
    pub used_percent: f64,
    pub free_percent: f64,
    pub total_gb: f64,
    pub free_gb: f64,
}

/// Failed poll for one volume. Carries both path forms so path-translation
/// bugs show up in the message.
#[derive(Clone, Debug, PartialEq)]
pub struct DiskError {
    /// The path as the user configured it
    pub path: String,
    /// The platform-normalized path actually passed to statfs
    pub normalized: String,
    pub message: String,
}

/// Result of polling one tracked volume.
#[derive(Clone, Debug, PartialEq)]
pub enum DiskSnapshot {
    Usage(DiskUsage),
    Error(DiskError),
}

impl DiskSnapshot {
    /// The originally requested path, whichever variant this is.
    pub fn path(&self) -> &str {
        match self {
            DiskSnapshot::Usage(u) => &u.path,
            DiskSnapshot::Error(e) => &e.path,
        }
    }
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Normalize a tracked path to the form the statfs call expects.
///
/// A bare drive-letter token (`C:`, `C:\` or `C:/`) becomes `C:\`; every
/// other path is passed through as given.
pub fn normalize_disk_path(path: &str) -> String {
    let bytes = path.as_bytes();
    let bare_drive = bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    let drive_with_sep = bytes.len() == 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');
    if bare_drive || drive_with_sep {
        format!("{}:\\", &path[..1])
    } else {
        path.to_string()
    }
}

/// Derive display figures from raw block counts.
///
/// Free space uses the unprivileged-available block count, so the numbers
/// reflect what the user can actually write. A zero-sized volume reports
/// 0% used rather than dividing by zero.
fn usage_from_stats(path: &str, stats: &FsStats) -> DiskUsage {
    let total_bytes = stats.blocks.saturating_mul(stats.block_size);
    let free_bytes = stats.available_blocks.saturating_mul(stats.block_size);
    let used_percent = if total_bytes > 0 {
        let used = total_bytes.saturating_sub(free_bytes) as f64;
        round1((used / total_bytes as f64 * 100.0).clamp(0.0, 100.0))
    } else {
        0.0
    };
    DiskUsage {
        path: path.to_string(),
        used_percent,
        free_percent: round1(100.0 - used_percent),
        total_gb: round1(total_bytes as f64 / GIB),
        free_gb: round1(free_bytes as f64 / GIB),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Poll every tracked path, one at a time, in the given order.
///
/// A failed statfs call becomes an error snapshot for that path only; the
/// remaining volumes are still polled.
pub fn poll_all<F: FilesystemStats>(fs: &F, paths: &[String]) -> Vec<DiskSnapshot> {
    paths
        .iter()
        .map(|path| {
            let normalized = normalize_disk_path(path);
            match fs.statfs(&normalized) {
                Ok(stats) => DiskSnapshot::Usage(usage_from_stats(path, &stats)),
                Err(err) => {
                    tracing::warn!("disk poll failed for {path} (as {normalized}): {err}");
                    DiskSnapshot::Error(DiskError {
                        path: path.clone(),
                        normalized: normalized.clone(),
                        message: format!("statfs failed for {path} (as {normalized}): {err}"),
                    })
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeFs {
        volumes: HashMap<String, FsStats>,
    }

    impl FilesystemStats for FakeFs {
        fn statfs(&self, path: &str) -> io::Result<FsStats> {
            self.volumes
                .get(path)
                .copied()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such volume"))
        }
    }

    fn fs_with(path: &str, stats: FsStats) -> FakeFs {
        FakeFs {
            volumes: HashMap::from([(path.to_string(), stats)]),
        }
    }

    #[test]
    fn usage_math_from_block_counts() {
        let usage = usage_from_stats(
            "/",
            &FsStats {
                blocks: 1000,
                block_size: 4096,
                available_blocks: 250,
            },
        );
        // 4_096_000 total bytes, 1_024_000 free
        assert_eq!(usage.used_percent, 75.0);
        assert_eq!(usage.free_percent, 25.0);
    }

    #[test]
    fn gb_figures_use_base_1024() {
        let usage = usage_from_stats(
            "/data",
            &FsStats {
                blocks: 524_288,
                block_size: 1_048_576,
                available_blocks: 131_072,
            },
        );
        assert_eq!(usage.total_gb, 512.0);
        assert_eq!(usage.free_gb, 128.0);
        assert_eq!(usage.used_percent, 75.0);
    }

    #[test]
    fn zero_sized_volume_reports_zero_not_nan() {
        let usage = usage_from_stats(
            "/empty",
            &FsStats {
                blocks: 0,
                block_size: 4096,
                available_blocks: 0,
            },
        );
        assert_eq!(usage.used_percent, 0.0);
        assert_eq!(usage.free_percent, 100.0);
        assert!(usage.total_gb.is_finite());
    }

    #[test]
    fn drive_letter_tokens_are_normalized() {
        assert_eq!(normalize_disk_path("C:"), "C:\\");
        assert_eq!(normalize_disk_path("d:\\"), "d:\\");
        assert_eq!(normalize_disk_path("E:/"), "E:\\");
        assert_eq!(normalize_disk_path("/home"), "/home");
        assert_eq!(normalize_disk_path("C:\\Users"), "C:\\Users");
    }

    #[test]
    fn one_failed_volume_does_not_abort_the_rest() {
        let fs = fs_with(
            "/ok",
            FsStats {
                blocks: 1000,
                block_size: 4096,
                available_blocks: 500,
            },
        );
        let paths = vec!["/missing".to_string(), "/ok".to_string()];
        let snapshots = poll_all(&fs, &paths);
        assert_eq!(snapshots.len(), 2);
        match &snapshots[0] {
            DiskSnapshot::Error(e) => {
                assert_eq!(e.path, "/missing");
                assert!(e.message.contains("/missing"));
            }
            other => panic!("expected error snapshot, got {other:?}"),
        }
        match &snapshots[1] {
            DiskSnapshot::Usage(u) => assert_eq!(u.used_percent, 50.0),
            other => panic!("expected usage snapshot, got {other:?}"),
        }
    }

    #[test]
    fn error_message_carries_both_path_forms() {
        let fs = FakeFs {
            volumes: HashMap::new(),
        };
        let snapshots = poll_all(&fs, &["C:".to_string()]);
        match &snapshots[0] {
            DiskSnapshot::Error(e) => {
                assert_eq!(e.path, "C:");
                assert_eq!(e.normalized, "C:\\");
                assert!(e.message.contains("C:") && e.message.contains("C:\\"));
            }
            other => panic!("expected error snapshot, got {other:?}"),
        }
    }
}
