//! Operation metrics with rolling-window summaries.
//!
//! Every DAO and sync operation reports `{name, duration, outcome}`;
//! summaries aggregate the samples still inside the window into
//! count/min/max/avg and ceiling-index percentiles.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Error,
}

#[derive(Debug, Clone)]
struct Sample {
    duration_ms: f64,
    outcome: Outcome,
    recorded_at: Instant,
}

/// Aggregated view of one operation's recent samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub errors: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// In-process metrics sink, keyed by operation name.
#[derive(Debug)]
pub struct MetricsRegistry {
    inner: Mutex<HashMap<String, VecDeque<Sample>>>,
    window: Duration,
    max_samples_per_metric: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(15 * 60), 2048)
    }
}

impl MetricsRegistry {
    pub fn new(window: Duration, max_samples_per_metric: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            window,
            max_samples_per_metric,
        }
    }

    /// Record one operation sample.
    pub fn record(&self, name: &str, duration: Duration, outcome: Outcome) {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        let samples = inner.entry(name.to_string()).or_default();
        samples.push_back(Sample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            outcome,
            recorded_at: Instant::now(),
        });
        while samples.len() > self.max_samples_per_metric {
            samples.pop_front();
        }
    }

    /// Summary for one operation, if it has samples inside the window.
    pub fn summary(&self, name: &str) -> Option<MetricSummary> {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        let samples = inner.get_mut(name)?;
        Self::prune(samples, self.window);
        summarize(samples)
    }

    /// Summaries for every operation with live samples, sorted by name.
    pub fn summaries(&self) -> BTreeMap<String, MetricSummary> {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        let mut out = BTreeMap::new();
        for (name, samples) in inner.iter_mut() {
            Self::prune(samples, self.window);
            if let Some(summary) = summarize(samples) {
                out.insert(name.clone(), summary);
            }
        }
        out
    }

    fn prune(samples: &mut VecDeque<Sample>, window: Duration) {
        let now = Instant::now();
        while let Some(front) = samples.front() {
            if now.duration_since(front.recorded_at) > window {
                samples.pop_front();
            } else {
                break;
            }
        }
    }
}

fn summarize(samples: &VecDeque<Sample>) -> Option<MetricSummary> {
    if samples.is_empty() {
        return None;
    }
    let mut durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
    durations.sort_by(|a, b| a.total_cmp(b));

    let count = durations.len();
    let errors = samples.iter().filter(|s| s.outcome == Outcome::Error).count();
    let sum: f64 = durations.iter().sum();

    Some(MetricSummary {
        count,
        errors,
        min_ms: durations[0],
        max_ms: durations[count - 1],
        avg_ms: sum / count as f64,
        p50_ms: percentile(&durations, 50.0),
        p95_ms: percentile(&durations, 95.0),
        p99_ms: percentile(&durations, 99.0),
    })
}

/// Ceiling-index percentile over a sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry_with(name: &str, durations_ms: &[u64]) -> MetricsRegistry {
        let registry = MetricsRegistry::default();
        for ms in durations_ms {
            registry.record(name, Duration::from_millis(*ms), Outcome::Ok);
        }
        registry
    }

    #[test]
    fn summary_over_five_samples_matches_ceiling_percentiles() {
        let registry = registry_with("op", &[10, 20, 30, 40, 50]);
        let summary = registry.summary("op").unwrap();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.p50_ms, 30.0);
        assert_eq!(summary.p95_ms, 50.0);
        assert_eq!(summary.p99_ms, 50.0);
        assert_eq!(summary.min_ms, 10.0);
        assert_eq!(summary.max_ms, 50.0);
        assert_eq!(summary.avg_ms, 30.0);
    }

    #[test]
    fn errors_are_counted_separately() {
        let registry = MetricsRegistry::default();
        registry.record("op", Duration::from_millis(5), Outcome::Ok);
        registry.record("op", Duration::from_millis(7), Outcome::Error);
        let summary = registry.summary("op").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn unknown_metric_has_no_summary() {
        let registry = MetricsRegistry::default();
        assert!(registry.summary("nope").is_none());
    }

    #[test]
    fn sample_count_is_bounded() {
        let registry = MetricsRegistry::new(Duration::from_secs(600), 10);
        for i in 0..50 {
            registry.record("op", Duration::from_millis(i), Outcome::Ok);
        }
        assert_eq!(registry.summary("op").unwrap().count, 10);
    }

    #[test]
    fn summaries_cover_all_named_operations() {
        let registry = MetricsRegistry::default();
        registry.record("b", Duration::from_millis(1), Outcome::Ok);
        registry.record("a", Duration::from_millis(2), Outcome::Ok);
        let all = registry.summaries();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn single_sample_percentiles_are_that_sample() {
        let registry = registry_with("op", &[42]);
        let summary = registry.summary("op").unwrap();
        assert_eq!(summary.p50_ms, 42.0);
        assert_eq!(summary.p99_ms, 42.0);
    }
}
