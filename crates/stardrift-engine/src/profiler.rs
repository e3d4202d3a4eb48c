//! Per-phase timing statistics.
//!
//! The simulation records the wall-clock duration of every tick phase here.
//! Statistics are exposed as a serializable report so hosts can log or ship
//! them.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default)]
struct PhaseMetrics {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

/// Accumulates durations per named phase.
#[derive(Debug, Default)]
pub struct Profiler {
    phases: HashMap<&'static str, PhaseMetrics>,
    /// First-seen order, so reports list phases in execution order.
    order: Vec<&'static str>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: &'static str, elapsed: Duration) {
        if !self.phases.contains_key(phase) {
            self.order.push(phase);
        }
        let metrics = self.phases.entry(phase).or_default();
        metrics.count += 1;
        metrics.total += elapsed;
        metrics.min = Some(metrics.min.map_or(elapsed, |m| m.min(elapsed)));
        metrics.max = Some(metrics.max.map_or(elapsed, |m| m.max(elapsed)));
    }

    pub fn reset(&mut self) {
        self.phases.clear();
        self.order.clear();
    }

    pub fn statistics(&self) -> ProfilingStatistics {
        let ms = |d: Duration| d.as_secs_f64() * 1e3;
        let phases = self
            .order
            .iter()
            .filter_map(|name| self.phases.get(name).map(|m| (name, m)))
            .map(|(name, m)| PhaseStatistics {
                name: (*name).to_owned(),
                count: m.count,
                total_ms: ms(m.total),
                min_ms: m.min.map_or(0.0, ms),
                max_ms: m.max.map_or(0.0, ms),
                avg_ms: if m.count == 0 {
                    0.0
                } else {
                    ms(m.total) / m.count as f64
                },
            })
            .collect();
        ProfilingStatistics { phases }
    }
}

/// Aggregated timings for one phase, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStatistics {
    pub name: String,
    pub count: u64,
    pub total_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilingStatistics {
    pub phases: Vec<PhaseStatistics>,
}

impl ProfilingStatistics {
    pub fn phase(&self, name: &str) -> Option<&PhaseStatistics> {
        self.phases.iter().find(|p| p.name == name)
    }
}
