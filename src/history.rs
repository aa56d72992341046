//! Rolling sample history for the dashboard charts.
//!
//! Each metric key owns a fixed-capacity ring of recent samples. Missing
//! samples are stored as `None` so the charts can render a gap instead of
//! a misleading zero. The module also owns the chart axis policy: bounded
//! percent series use a fixed 0-100 axis, while the two throughput series
//! get a dynamic maximum recomputed from the values currently in the ring.

use std::collections::VecDeque;

/// Number of samples kept per series.
pub const CAPACITY: usize = 60;

/// Axis floor for the throughput series, in Mbps. Keeps a quiet network
/// from producing a degenerate near-zero-height chart.
const THROUGHPUT_AXIS_FLOOR: f64 = 10.0;

/// Identifies one chart series.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SeriesKey {
    Cpu,
    Ram,
    Gpu,
    Vram,
    Download,
    Upload,
}

impl SeriesKey {
    /// All series, in chart order.
    pub const ALL: [SeriesKey; 6] = [
        SeriesKey::Cpu,
        SeriesKey::Ram,
        SeriesKey::Gpu,
        SeriesKey::Vram,
        SeriesKey::Download,
        SeriesKey::Upload,
    ];

    /// Percent series have a natural 0-100 range; throughput does not.
    pub fn bounded(self) -> bool {
        !matches!(self, SeriesKey::Download | SeriesKey::Upload)
    }

    fn index(self) -> usize {
        match self {
            SeriesKey::Cpu => 0,
            SeriesKey::Ram => 1,
            SeriesKey::Gpu => 2,
            SeriesKey::Vram => 3,
            SeriesKey::Download => 4,
            SeriesKey::Upload => 5,
        }
    }
}

/// Fixed-capacity rolling store of recent samples, one ring per series.
///
/// Created once at startup and owned by the chart subsystem for the process
/// lifetime. Single writer (the snapshot handler), single reader (the chart
/// draw step).
pub struct HistoryBuffer {
    series: [VecDeque<Option<f64>>; 6],
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self {
            series: std::array::from_fn(|_| VecDeque::with_capacity(CAPACITY)),
        }
    }

    /// Append a sample (or a `None` gap) to the named series, evicting the
    /// oldest entry once the ring is full.
    pub fn record(&mut self, key: SeriesKey, value: Option<f64>) {
        let ring = &mut self.series[key.index()];
        if ring.len() >= CAPACITY {
            ring.pop_front();
        }
        ring.push_back(value);
    }

    /// Copy of the series, oldest first, left-padded with `None` up to
    /// [`CAPACITY`] while the ring is still filling.
    pub fn samples(&self, key: SeriesKey) -> Vec<Option<f64>> {
        let ring = &self.series[key.index()];
        let mut out = vec![None; CAPACITY - ring.len()];
        out.extend(ring.iter().copied());
        out
    }

    /// Chart y-axis maximum for the series.
    ///
    /// Bounded series are pinned at 100. Throughput series scale to the
    /// observed peak plus 10% headroom, rounded up, never below the floor
    /// of 10 Mbps.
    pub fn axis_max(&self, key: SeriesKey) -> f64 {
        if key.bounded() {
            return 100.0;
        }
        let observed = self.series[key.index()]
            .iter()
            .filter_map(|v| *v)
            .fold(0.0_f64, f64::max);
        (observed * 1.1).ceil().max(THROUGHPUT_AXIS_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_keeps_newest_sixty_in_order() {
        let mut history = HistoryBuffer::new();
        for i in 0..65 {
            history.record(SeriesKey::Cpu, Some(i as f64));
        }
        let samples = history.samples(SeriesKey::Cpu);
        assert_eq!(samples.len(), CAPACITY);
        assert_eq!(samples[0], Some(5.0));
        assert_eq!(samples[CAPACITY - 1], Some(64.0));
        // relative order preserved
        for (a, b) in samples.iter().zip(samples.iter().skip(1)) {
            assert!(a.unwrap() < b.unwrap());
        }
    }

    #[test]
    fn partial_series_is_left_padded() {
        let mut history = HistoryBuffer::new();
        history.record(SeriesKey::Ram, Some(40.0));
        history.record(SeriesKey::Ram, Some(41.0));
        let samples = history.samples(SeriesKey::Ram);
        assert_eq!(samples.len(), CAPACITY);
        assert!(samples[..CAPACITY - 2].iter().all(Option::is_none));
        assert_eq!(&samples[CAPACITY - 2..], &[Some(40.0), Some(41.0)]);
    }

    #[test]
    fn gaps_are_preserved_not_zeroed() {
        let mut history = HistoryBuffer::new();
        history.record(SeriesKey::Gpu, Some(10.0));
        history.record(SeriesKey::Gpu, None);
        history.record(SeriesKey::Gpu, Some(12.0));
        let samples = history.samples(SeriesKey::Gpu);
        assert_eq!(
            &samples[CAPACITY - 3..],
            &[Some(10.0), None, Some(12.0)]
        );
    }

    #[test]
    fn throughput_axis_scales_to_observed_peak() {
        let mut history = HistoryBuffer::new();
        for v in [5.0, 12.0, 8.0] {
            history.record(SeriesKey::Download, Some(v));
        }
        // ceil(12 * 1.1) = 14
        assert_eq!(history.axis_max(SeriesKey::Download), 14.0);
    }

    #[test]
    fn throughput_axis_floor_applies_when_quiet() {
        let mut history = HistoryBuffer::new();
        for v in [1.0, 2.0] {
            history.record(SeriesKey::Upload, Some(v));
        }
        assert_eq!(history.axis_max(SeriesKey::Upload), 10.0);
        // empty series also sits at the floor
        assert_eq!(HistoryBuffer::new().axis_max(SeriesKey::Download), 10.0);
    }

    #[test]
    fn axis_ignores_gaps() {
        let mut history = HistoryBuffer::new();
        history.record(SeriesKey::Download, Some(12.5));
        history.record(SeriesKey::Download, None);
        assert_eq!(history.axis_max(SeriesKey::Download), 14.0);
    }

    #[test]
    fn bounded_series_axis_is_fixed() {
        let mut history = HistoryBuffer::new();
        history.record(SeriesKey::Cpu, Some(250.0));
        assert_eq!(history.axis_max(SeriesKey::Cpu), 100.0);
    }
}
