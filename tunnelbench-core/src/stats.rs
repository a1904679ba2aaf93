use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::client::RequestOutcome;

/// Linearly-interpolated percentile over an ascending-sorted sample.
///
/// Empty input yields 0.0; `p <= 0` the minimum; `p >= 100` the maximum.
/// Between two bracketing order statistics the value is interpolated at rank
/// `(n - 1) * p / 100`.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some((first, rest)) = sorted.split_first() else {
        return 0.0;
    };
    if p <= 0.0 {
        return *first;
    }
    let last = rest.last().unwrap_or(first);
    if p >= 100.0 {
        return *last;
    }

    let rank = (sorted.len() - 1) as f64 * (p / 100.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] * (hi as f64 - rank) + sorted[hi] * (rank - lo as f64)
}

#[derive(Debug, Default)]
struct Aggregate {
    ok: u64,
    errors: u64,
    latencies_ms: Vec<f64>,
    error_counts: HashMap<String, u64>,
}

/// Shared run counters plus the latency sample set.
///
/// The single lock is the only serialization point between workers; each
/// completed outcome takes it exactly once.
#[derive(Debug, Default)]
pub struct RunStats {
    inner: Mutex<Aggregate>,
}

impl RunStats {
    pub fn record(&self, outcome: RequestOutcome) {
        let mut agg = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(ms) = outcome.latency_ms {
            agg.latencies_ms.push(ms);
        }
        if outcome.success {
            agg.ok += 1;
        } else {
            agg.errors += 1;
            if let Some(label) = outcome.error {
                *agg.error_counts.entry(label).or_insert(0) += 1;
            }
        }
    }

    pub fn ok_total(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .ok
    }

    pub fn errors_total(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .errors
    }

    /// Freeze the aggregate into a report. Called once, after all workers
    /// have joined.
    #[must_use]
    pub fn summarize(&self, elapsed: Duration, top_errors: usize) -> RunSummary {
        let agg = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut sorted = agg.latencies_ms.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let duration_s = elapsed.as_secs_f64().max(1e-6);
        let total = agg.ok + agg.errors;

        let mean_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };
        // Population stdev, matching how the report treats the sample as the
        // whole run rather than a draw from a larger one.
        let stdev_ms = if sorted.len() >= 2 {
            let variance = sorted
                .iter()
                .map(|v| (v - mean_ms) * (v - mean_ms))
                .sum::<f64>()
                / sorted.len() as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let mut ranked: Vec<(String, u64)> = agg
            .error_counts
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect();
        ranked.sort_by(|(a_label, a_count), (b_label, b_count)| {
            b_count
                .cmp(a_count)
                .then_with(|| a_label.as_str().cmp(b_label.as_str()))
        });
        ranked.truncate(top_errors);

        RunSummary {
            requests: total,
            ok: agg.ok,
            errors: agg.errors,
            duration_s,
            rps: total as f64 / duration_s,
            p50_ms: percentile(&sorted, 50.0),
            p90_ms: percentile(&sorted, 90.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            p999_ms: percentile(&sorted, 99.9),
            max_ms: sorted.last().copied().unwrap_or(0.0),
            mean_ms,
            stdev_ms,
            top_errors: ranked,
        }
    }
}

/// Read-only view over the final aggregate plus elapsed wall time.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub requests: u64,
    pub ok: u64,
    pub errors: u64,
    pub duration_s: f64,
    pub rps: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub stdev_ms: f64,
    /// Error labels by descending count, truncated to the configured top-N.
    pub top_errors: Vec<(String, u64)>,
}
