//! Host metrics provider boundary.
//!
//! The sampler treats the host as an unreliable, possibly-partial data
//! source: every query is individually fallible and a failure in one metric
//! family never implies anything about the others. [`SystemMetrics`] is the
//! real implementation, reading from `sysinfo` plus the `/proc` and `/sys`
//! interfaces.
//!
//! # Data Sources
//!
//! - `sysinfo` - CPU load and memory totals
//! - `/proc/net/route` - default-route interface name
//! - `sysinfo::Networks` - per-interface byte counters (rates derived from
//!   successive refreshes)
//! - `/sys/class/drm/card*/device` - GPU utilization and VRAM (amdgpu
//!   exposes `gpu_busy_percent` and `mem_info_vram_*`; other vendors
//!   enumerate with those fields absent)

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System};
use thiserror::Error;

/// A metric family query failed or returned unusable data.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("metric source unavailable: {0}")]
    Unavailable(String),
    #[error("interface {0} not reported by the host")]
    UnknownInterface(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Instantaneous overall CPU load.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuLoad {
    /// Average load across all cores, 0-100
    pub percent: f64,
}

/// Physical memory totals in bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryInfo {
    pub total: u64,
    /// Actively used memory, excluding reclaimable page cache
    pub active: u64,
}

/// One enumerated graphics controller. Every field is best-effort.
#[derive(Clone, Copy, Debug, Default)]
pub struct GpuController {
    /// Utilization percent, if the controller reports one
    pub utilization_gpu: Option<f64>,
    /// Total VRAM in bytes
    pub memory_total: Option<u64>,
    /// Used VRAM in bytes
    pub memory_used: Option<u64>,
}

/// Byte-per-second throughput of one network interface.
#[derive(Clone, Debug, Default)]
pub struct InterfaceRates {
    pub interface: String,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
}

/// Capability surface the sampler queries once per tick.
///
/// All methods are individually fallible; callers isolate failures per
/// family rather than propagating them.
pub trait HostMetrics {
    fn cpu_load(&self) -> impl std::future::Future<Output = Result<CpuLoad, ProviderError>> + Send;
    fn memory_info(
        &self,
    ) -> impl std::future::Future<Output = Result<MemoryInfo, ProviderError>> + Send;
    fn graphics_controllers(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<GpuController>, ProviderError>> + Send;
    /// Name of the interface on the default outbound route, if resolvable.
    fn default_interface(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<String>, ProviderError>> + Send;
    /// Current throughput for one named interface, or all interfaces when
    /// `iface` is `None` (sorted by name, loopback excluded).
    fn network_stats(
        &self,
        iface: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<InterfaceRates>, ProviderError>> + Send;
}

struct NetState {
    networks: Networks,
    last_refresh: Instant,
}

/// Live host implementation of [`HostMetrics`].
pub struct SystemMetrics {
    sys: Mutex<System>,
    net: Mutex<NetState>,
}

impl SystemMetrics {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // CPU usage is computed as a diff between refreshes; prime the
        // baseline so the first sample is not a flat zero.
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        Self {
            sys: Mutex::new(sys),
            net: Mutex::new(NetState {
                networks: Networks::new_with_refreshed_list(),
                last_refresh: Instant::now(),
            }),
        }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetrics for SystemMetrics {
    async fn cpu_load(&self) -> Result<CpuLoad, ProviderError> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|_| ProviderError::Unavailable("cpu state poisoned".into()))?;
        sys.refresh_cpu_usage();
        let cpus = sys.cpus();
        if cpus.is_empty() {
            return Err(ProviderError::Unavailable("no cpus reported".into()));
        }
        let percent =
            cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64;
        Ok(CpuLoad { percent })
    }

    async fn memory_info(&self) -> Result<MemoryInfo, ProviderError> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|_| ProviderError::Unavailable("memory state poisoned".into()))?;
        sys.refresh_memory();
        Ok(MemoryInfo {
            total: sys.total_memory(),
            active: sys.used_memory(),
        })
    }

    async fn graphics_controllers(&self) -> Result<Vec<GpuController>, ProviderError> {
        let mut controllers = Vec::new();
        let mut cards: Vec<_> = std::fs::read_dir("/sys/class/drm")?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(is_card_entry)
            })
            .collect();
        cards.sort();

        for card in cards {
            let device = card.join("device");
            if !device.exists() {
                continue;
            }
            controllers.push(GpuController {
                utilization_gpu: read_sysfs_u64(&device.join("gpu_busy_percent"))
                    .map(|v| v as f64),
                memory_total: read_sysfs_u64(&device.join("mem_info_vram_total")),
                memory_used: read_sysfs_u64(&device.join("mem_info_vram_used")),
            });
        }
        Ok(controllers)
    }

    async fn default_interface(&self) -> Result<Option<String>, ProviderError> {
        let content = std::fs::read_to_string("/proc/net/route")?;
        Ok(default_route_interface(&content))
    }

    async fn network_stats(
        &self,
        iface: Option<&str>,
    ) -> Result<Vec<InterfaceRates>, ProviderError> {
        let mut net = self
            .net
            .lock()
            .map_err(|_| ProviderError::Unavailable("network state poisoned".into()))?;

        if let Some(want) = iface {
            let known = net.networks.iter().any(|(name, _)| name.as_str() == want);
            if !known {
                return Err(ProviderError::UnknownInterface(want.to_string()));
            }
        }

        // Counters cover the span since the previous refresh.
        let elapsed = net.last_refresh.elapsed().as_secs_f64();
        net.networks.refresh(true);
        net.last_refresh = Instant::now();

        let mut rates: Vec<InterfaceRates> = net
            .networks
            .iter()
            .filter(|(name, _)| match iface {
                Some(want) => name.as_str() == want,
                None => name.as_str() != "lo",
            })
            .map(|(name, data)| InterfaceRates {
                interface: name.clone(),
                rx_bytes_per_sec: per_second(data.received(), elapsed),
                tx_bytes_per_sec: per_second(data.transmitted(), elapsed),
            })
            .collect();
        rates.sort_by(|a, b| a.interface.cmp(&b.interface));
        Ok(rates)
    }
}

/// `true` for whole-card entries (`card0`, `card1`), not connectors
/// (`card0-DP-1`) or render nodes.
fn is_card_entry(name: &str) -> bool {
    name.strip_prefix("card")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn read_sysfs_u64(path: &Path) -> Option<u64> {
    std::fs::read_to_string(path)
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Find the interface of the default route in `/proc/net/route` content
/// (destination `00000000`).
fn default_route_interface(content: &str) -> Option<String> {
    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 && parts[1] == "00000000" {
            return Some(parts[0].to_string());
        }
    }
    None
}

fn per_second(bytes: u64, elapsed: f64) -> f64 {
    // Guard against a zero-length span on the very first tick.
    if elapsed > 0.05 {
        bytes as f64 / elapsed
    } else {
        0.0
    }
}
