//! Batch timing statistics.
//!
//! Auxiliary profiling for fleet-wide fan-out: per-host timings, summary
//! statistics for each phase, and outlier/failure flags.

use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Timings for one host in a profiled batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostTiming {
    pub host: String,
    /// Time to obtain a session, absent when the host failed before running
    pub connect: Option<Duration>,
    pub command: Option<Duration>,
    pub total: Duration,
    pub succeeded: bool,
}

/// Summary statistics over a set of samples, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub p95_ms: f64,
}

impl LatencyStats {
    pub fn from_durations<I: IntoIterator<Item = Duration>>(samples: I) -> Option<Self> {
        let mut values: Vec<f64> = samples
            .into_iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let median = if count % 2 == 0 {
            (values[count / 2 - 1] + values[count / 2]) / 2.0
        } else {
            values[count / 2]
        };
        // nearest-rank
        let p95_rank = ((0.95 * count as f64).ceil() as usize).clamp(1, count);

        Some(Self {
            count,
            min_ms: values[0],
            max_ms: values[count - 1],
            mean_ms: mean,
            median_ms: median,
            std_dev_ms: variance.sqrt(),
            p95_ms: values[p95_rank - 1],
        })
    }

    /// Threshold above which a sample counts as an outlier
    pub fn outlier_threshold_ms(&self, stddev_factor: f64) -> f64 {
        self.mean_ms + stddev_factor * self.std_dev_ms
    }
}

/// Profile of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchProfile {
    pub timings: Vec<HostTiming>,
    pub connect: Option<LatencyStats>,
    pub command: Option<LatencyStats>,
    pub total: Option<LatencyStats>,
    pub slow_hosts: Vec<String>,
    pub failed_hosts: Vec<String>,
    pub wall_time: Duration,
}

impl BatchProfile {
    pub fn from_timings(timings: Vec<HostTiming>, stddev_factor: f64, wall_time: Duration) -> Self {
        let connect = LatencyStats::from_durations(timings.iter().filter_map(|t| t.connect));
        let command = LatencyStats::from_durations(timings.iter().filter_map(|t| t.command));
        let total = LatencyStats::from_durations(
            timings.iter().filter(|t| t.succeeded).map(|t| t.total),
        );

        let slow_hosts = match &total {
            Some(stats) if stats.count > 1 => {
                let threshold = stats.outlier_threshold_ms(stddev_factor);
                timings
                    .iter()
                    .filter(|t| t.succeeded && t.total.as_secs_f64() * 1000.0 > threshold)
                    .map(|t| t.host.clone())
                    .collect()
            }
            _ => Vec::new(),
        };
        let failed_hosts = timings
            .iter()
            .filter(|t| !t.succeeded)
            .map(|t| t.host.clone())
            .collect();

        Self {
            timings,
            connect,
            command,
            total,
            slow_hosts,
            failed_hosts,
            wall_time,
        }
    }

    pub fn log_summary(&self) {
        info!(
            hosts = self.timings.len(),
            failed = self.failed_hosts.len(),
            slow = self.slow_hosts.len(),
            wall_time_ms = self.wall_time.as_millis() as u64,
            mean_total_ms = self.total.map(|s| s.mean_ms),
            p95_total_ms = self.total.map(|s| s.p95_ms),
            mean_connect_ms = self.connect.map(|s| s.mean_ms),
            "📊 Batch execution profile"
        );
        if !self.slow_hosts.is_empty() {
            info!(hosts = ?self.slow_hosts, "🐢 Slow hosts");
        }
        if !self.failed_hosts.is_empty() {
            info!(hosts = ?self.failed_hosts, "Failed hosts");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    fn timing(host: &str, total_ms: u64, succeeded: bool) -> HostTiming {
        HostTiming {
            host: host.to_string(),
            connect: succeeded.then(|| Duration::from_millis(total_ms / 2)),
            command: succeeded.then(|| Duration::from_millis(total_ms / 2)),
            total: Duration::from_millis(total_ms),
            succeeded,
        }
    }

    #[test]
    fn test_latency_stats() {
        let stats = LatencyStats::from_durations(ms(&[10, 20, 30, 40])).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 40.0);
        assert_eq!(stats.mean_ms, 25.0);
        assert_eq!(stats.median_ms, 25.0);
        assert!((stats.std_dev_ms - 125.0_f64.sqrt()).abs() < 1e-9);
        assert_eq!(stats.p95_ms, 40.0);
    }

    #[test]
    fn test_empty_samples_have_no_stats() {
        assert!(LatencyStats::from_durations(Vec::new()).is_none());
    }

    #[test]
    fn test_profile_flags_slow_and_failed_hosts() {
        let mut timings: Vec<HostTiming> = (0..9).map(|i| timing(&format!("h{i}"), 100, true)).collect();
        timings.push(timing("laggard", 1_000, true));
        timings.push(timing("down", 50, false));

        let profile = BatchProfile::from_timings(timings, 2.0, Duration::from_millis(1_100));

        assert_eq!(profile.slow_hosts, vec!["laggard".to_string()]);
        assert_eq!(profile.failed_hosts, vec!["down".to_string()]);
        assert_eq!(profile.total.unwrap().count, 10);
        assert_eq!(profile.connect.unwrap().count, 10);
    }
}
