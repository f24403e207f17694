// Wed Aug 05 2026 - Alex

use crate::engine::result::TaskResult;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

/// Per-batch service-time statistics derived from result timestamps.
///
/// A batch is considered complete at the timestamp of its last-finishing
/// result; the service time is the gap between consecutive batch
/// completions. Batch ids wrap at `u16::MAX`, so runs longer than 65536
/// dispatches fold onto earlier batches; fine for a benchmark report,
/// meaningless for correlation.
pub struct ServiceTimes {
    completion: BTreeMap<u16, SystemTime>,
}

impl ServiceTimes {
    pub fn new() -> Self {
        Self {
            completion: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, result: &TaskResult) {
        let entry = self.completion.entry(result.id).or_insert(result.completed_at);
        if result.completed_at > *entry {
            *entry = result.completed_at;
        }
    }

    pub fn batch_count(&self) -> usize {
        self.completion.len()
    }

    pub fn deltas(&self) -> Vec<Duration> {
        let mut times: Vec<SystemTime> = self.completion.values().copied().collect();
        times.sort();

        times
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]).unwrap_or(Duration::ZERO))
            .collect()
    }

    pub fn average(&self) -> Option<Duration> {
        let deltas = self.deltas();
        if deltas.is_empty() {
            return None;
        }

        let total: Duration = deltas.iter().sum();
        Some(total / deltas.len() as u32)
    }
}

impl Default for ServiceTimes {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs() > 0 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if duration.as_millis() > 0 {
        format!("{:.3}ms", duration.as_secs_f64() * 1_000.0)
    } else {
        format!("{}us", duration.as_micros())
    }
}
