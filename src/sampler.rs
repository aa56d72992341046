//! One-tick metric sampling and normalization.
//!
//! [`MetricSampler::sample`] queries every metric family of the host
//! provider, derives display-ready values and returns a [`MetricSnapshot`].
//! The call never fails: a family whose query errors is reported as absent
//! and logged at warning level, leaving the sibling families untouched. A
//! missed sample is not retried within the tick; the next tick self-corrects.

use tracing::{debug, warn};

use crate::provider::{GpuController, HostMetrics, InterfaceRates};

/// Normalized result of one sampling tick.
///
/// Percent fields are absent when their source was unavailable and are
/// clamped to 0-100 otherwise. Throughput is always present (0.00 when the
/// provider is down) so the charts never develop gaps from network noise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricSnapshot {
    pub cpu_percent: Option<f64>,
    pub ram_percent: Option<f64>,
    pub gpu_percent: Option<f64>,
    pub vram_percent: Option<f64>,
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

/// Periodic multi-source metric collector.
pub struct MetricSampler<P> {
    provider: P,
}

impl<P: HostMetrics> MetricSampler<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Run one sampling tick.
    ///
    /// CPU, memory and GPU queries run concurrently; their failures are
    /// independent. The network query runs after them: the default
    /// interface is tried first, and if its resolution or stats fail, all
    /// interfaces are queried and the first one is used. That fallback
    /// mirrors the fact that default-interface resolution is itself
    /// unreliable; on multi-NIC hosts it may pick an unrelated interface.
    pub async fn sample(&self) -> MetricSnapshot {
        let (cpu, memory, gpus) = tokio::join!(
            self.provider.cpu_load(),
            self.provider.memory_info(),
            self.provider.graphics_controllers(),
        );

        let cpu_percent = match cpu {
            Ok(load) => Some(round1(clamp_percent(load.percent))),
            Err(err) => {
                warn!("cpu load query failed: {err}");
                None
            }
        };

        // "Used" is not well-defined as total minus free under page
        // caching; the provider's active figure is the relevant one.
        let ram_percent = match memory {
            Ok(mem) if mem.total > 0 => {
                Some(round1(clamp_percent(
                    mem.active as f64 / mem.total as f64 * 100.0,
                )))
            }
            Ok(_) => {
                warn!("memory query reported zero total");
                None
            }
            Err(err) => {
                warn!("memory query failed: {err}");
                None
            }
        };

        let (gpu_percent, vram_percent) = match gpus {
            Ok(controllers) => select_controller(&controllers),
            Err(err) => {
                warn!("gpu query failed: {err}");
                (None, None)
            }
        };

        let (download_mbps, upload_mbps) = self.network_rates().await;

        MetricSnapshot {
            cpu_percent,
            ram_percent,
            gpu_percent,
            vram_percent,
            download_mbps,
            upload_mbps,
        }
    }

    async fn network_rates(&self) -> (f64, f64) {
        match self.provider.default_interface().await {
            Ok(Some(name)) => match self.provider.network_stats(Some(&name)).await {
                Ok(rates) if !rates.is_empty() => return mbps_pair(&rates[0]),
                Ok(_) => debug!("default interface {name} reported no stats"),
                Err(err) => debug!("stats for default interface {name} failed: {err}"),
            },
            Ok(None) => debug!("no default route found"),
            Err(err) => warn!("default interface query failed: {err}"),
        }

        // Fallback: all interfaces, take the first result.
        match self.provider.network_stats(None).await {
            Ok(rates) => rates.first().map(mbps_pair).unwrap_or((0.0, 0.0)),
            Err(err) => {
                warn!("network stats query failed: {err}");
                (0.0, 0.0)
            }
        }
    }
}

/// Pick the controller to report: the first one exposing a utilization
/// figure, else the first enumerated one (whose utilization then stays
/// absent). VRAM percent needs both memory fields and a non-zero total.
fn select_controller(controllers: &[GpuController]) -> (Option<f64>, Option<f64>) {
    let chosen = controllers
        .iter()
        .find(|c| c.utilization_gpu.is_some())
        .or_else(|| controllers.first());
    let Some(controller) = chosen else {
        return (None, None);
    };

    let gpu = controller
        .utilization_gpu
        .map(|u| round1(clamp_percent(u)));
    let vram = match (controller.memory_used, controller.memory_total) {
        (Some(used), Some(total)) if total > 0 => {
            Some(round1(clamp_percent(used as f64 / total as f64 * 100.0)))
        }
        _ => None,
    };
    (gpu, vram)
}

fn mbps_pair(rates: &InterfaceRates) -> (f64, f64) {
    (mbps(rates.rx_bytes_per_sec), mbps(rates.tx_bytes_per_sec))
}

/// Bytes per second to decimal megabits per second, two decimals.
fn mbps(bytes_per_sec: f64) -> f64 {
    let value = bytes_per_sec * 8.0 / 1_000_000.0;
    if value.is_finite() {
        round2(value.max(0.0))
    } else {
        0.0
    }
}

fn clamp_percent(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CpuLoad, MemoryInfo, ProviderError};

    /// Scriptable provider: each family either succeeds with the canned
    /// value or fails.
    #[derive(Default)]
    struct FakeHost {
        cpu: Option<f64>,
        memory: Option<(u64, u64)>,
        gpus: Option<Vec<GpuController>>,
        default_iface: Option<String>,
        iface_rates: Option<(f64, f64)>,
        all_rates: Vec<(String, f64, f64)>,
    }

    fn unavailable() -> ProviderError {
        ProviderError::Unavailable("scripted failure".into())
    }

    impl HostMetrics for FakeHost {
        async fn cpu_load(&self) -> Result<CpuLoad, ProviderError> {
            self.cpu
                .map(|percent| CpuLoad { percent })
                .ok_or_else(unavailable)
        }

        async fn memory_info(&self) -> Result<MemoryInfo, ProviderError> {
            self.memory
                .map(|(total, active)| MemoryInfo { total, active })
                .ok_or_else(unavailable)
        }

        async fn graphics_controllers(&self) -> Result<Vec<GpuController>, ProviderError> {
            self.gpus.clone().ok_or_else(unavailable)
        }

        async fn default_interface(&self) -> Result<Option<String>, ProviderError> {
            Ok(self.default_iface.clone())
        }

        async fn network_stats(
            &self,
            iface: Option<&str>,
        ) -> Result<Vec<InterfaceRates>, ProviderError> {
            match iface {
                Some(want) => {
                    let (rx, tx) = self
                        .iface_rates
                        .ok_or_else(|| ProviderError::UnknownInterface(want.to_string()))?;
                    Ok(vec![InterfaceRates {
                        interface: want.to_string(),
                        rx_bytes_per_sec: rx,
                        tx_bytes_per_sec: tx,
                    }])
                }
                None => Ok(self
                    .all_rates
                    .iter()
                    .map(|(name, rx, tx)| InterfaceRates {
                        interface: name.clone(),
                        rx_bytes_per_sec: *rx,
                        tx_bytes_per_sec: *tx,
                    })
                    .collect()),
            }
        }
    }

    #[tokio::test]
    async fn ram_percent_uses_active_over_total() {
        let sampler = MetricSampler::new(FakeHost {
            memory: Some((1000, 250)),
            ..Default::default()
        });
        let snapshot = sampler.sample().await;
        assert_eq!(snapshot.ram_percent, Some(25.0));
    }

    #[tokio::test]
    async fn percents_are_clamped_against_noisy_input() {
        let sampler = MetricSampler::new(FakeHost {
            cpu: Some(104.3),
            // active > total
            memory: Some((1000, 1500)),
            ..Default::default()
        });
        let snapshot = sampler.sample().await;
        assert_eq!(snapshot.cpu_percent, Some(100.0));
        assert_eq!(snapshot.ram_percent, Some(100.0));
    }

    #[tokio::test]
    async fn mbps_conversion_uses_decimal_megabits() {
        let sampler = MetricSampler::new(FakeHost {
            default_iface: Some("eth0".into()),
            iface_rates: Some((125_000.0, 62_500.0)),
            ..Default::default()
        });
        let snapshot = sampler.sample().await;
        assert_eq!(snapshot.download_mbps, 1.0);
        assert_eq!(snapshot.upload_mbps, 0.5);
    }

    #[tokio::test]
    async fn gpu_failure_leaves_siblings_untouched() {
        let sampler = MetricSampler::new(FakeHost {
            cpu: Some(12.0),
            memory: Some((1000, 500)),
            gpus: None,
            ..Default::default()
        });
        let snapshot = sampler.sample().await;
        assert_eq!(snapshot.cpu_percent, Some(12.0));
        assert_eq!(snapshot.ram_percent, Some(50.0));
        assert_eq!(snapshot.gpu_percent, None);
        assert_eq!(snapshot.vram_percent, None);
    }

    #[tokio::test]
    async fn everything_down_yields_empty_snapshot() {
        let sampler = MetricSampler::new(FakeHost::default());
        let snapshot = sampler.sample().await;
        assert_eq!(snapshot, MetricSnapshot::default());
        assert_eq!(snapshot.download_mbps, 0.0);
        assert_eq!(snapshot.upload_mbps, 0.0);
    }

    #[tokio::test]
    async fn network_falls_back_to_first_of_all_interfaces() {
        let sampler = MetricSampler::new(FakeHost {
            default_iface: Some("eth0".into()),
            // stats for eth0 fail, forcing the all-interfaces fallback
            iface_rates: None,
            all_rates: vec![
                ("enp3s0".into(), 250_000.0, 125_000.0),
                ("wlan0".into(), 1.0, 1.0),
            ],
            ..Default::default()
        });
        let snapshot = sampler.sample().await;
        assert_eq!(snapshot.download_mbps, 2.0);
        assert_eq!(snapshot.upload_mbps, 1.0);
    }

    #[test]
    fn controller_selection_prefers_defined_utilization() {
        let controllers = [
            GpuController {
                utilization_gpu: None,
                memory_total: Some(100),
                memory_used: Some(10),
            },
            GpuController {
                utilization_gpu: Some(42.0),
                memory_total: Some(1000),
                memory_used: Some(250),
            },
        ];
        assert_eq!(select_controller(&controllers), (Some(42.0), Some(25.0)));
    }

    #[test]
    fn controller_selection_falls_back_to_first() {
        let controllers = [GpuController {
            utilization_gpu: None,
            memory_total: Some(1000),
            memory_used: Some(300),
        }];
        assert_eq!(select_controller(&controllers), (None, Some(30.0)));
        assert_eq!(select_controller(&[]), (None, None));
    }

    #[test]
    fn vram_needs_both_fields_and_nonzero_total() {
        let no_total = [GpuController {
            utilization_gpu: Some(10.0),
            memory_total: None,
            memory_used: Some(300),
        }];
        assert_eq!(select_controller(&no_total), (Some(10.0), None));

        let zero_total = [GpuController {
            utilization_gpu: Some(10.0),
            memory_total: Some(0),
            memory_used: Some(300),
        }];
        assert_eq!(select_controller(&zero_total), (Some(10.0), None));
    }
}
