//! Phase timers and sample counters.
//!
//! Every engine phase is wrapped in [`Stats::time`], which returns a guard that
//! adds the elapsed time to the phase total when it is dropped. Numeric samples
//! (seed sizes, core sizes, ...) are folded into min/max/avg series.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone)]
struct PhaseTotals {
    total: Duration,
    calls: u64,
}

#[derive(Debug, Clone)]
struct Series {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Series {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

#[derive(Debug, Default)]
struct Inner {
    phases: BTreeMap<String, PhaseTotals>,
    counters: BTreeMap<String, u64>,
    series: BTreeMap<String, Series>,
}

/// Run-wide bookkeeping, shared by reference between the driver and solvers.
#[derive(Debug)]
pub struct Stats {
    started: Instant,
    inner: RefCell<Inner>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Records elapsed time for one phase when dropped.
#[must_use = "the phase is timed until the guard is dropped"]
pub struct PhaseGuard<'a> {
    stats: &'a Stats,
    name: &'static str,
    start: Instant,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mut inner = self.stats.inner.borrow_mut();
        let entry = inner.phases.entry(self.name.to_string()).or_default();
        entry.total += elapsed;
        entry.calls += 1;
    }
}

impl Stats {
    /// Creates an empty record; the wall clock starts now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: RefCell::new(Inner::default()),
        }
    }

    /// Starts timing `name`.
    pub fn time(&self, name: &'static str) -> PhaseGuard<'_> {
        PhaseGuard {
            stats: self,
            name,
            start: Instant::now(),
        }
    }

    /// Bumps the counter `name` by one.
    pub fn increment(&self, name: &str) {
        *self
            .inner
            .borrow_mut()
            .counters
            .entry(name.to_string())
            .or_insert(0) += 1;
    }

    /// Adds one sample to the series `name`.
    pub fn add_sample(&self, name: &str, value: f64) {
        let mut inner = self.inner.borrow_mut();
        match inner.series.get_mut(name) {
            Some(series) => series.push(value),
            None => {
                inner.series.insert(name.to_string(), Series::new(value));
            }
        }
    }

    /// Number of completed timings recorded for `name`.
    pub fn calls(&self, name: &str) -> u64 {
        self.inner
            .borrow()
            .phases
            .get(name)
            .map_or(0, |phase| phase.calls)
    }

    /// Current value of the counter `name`.
    pub fn counter(&self, name: &str) -> u64 {
        self.inner
            .borrow()
            .counters
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of everything recorded so far.
    pub fn report(&self) -> StatsReport {
        let inner = self.inner.borrow();
        let mut phases: Vec<PhaseReport> = inner
            .phases
            .iter()
            .map(|(name, totals)| PhaseReport {
                name: name.clone(),
                seconds: totals.total.as_secs_f64(),
                calls: totals.calls,
                average: if totals.calls == 0 {
                    0.0
                } else {
                    totals.total.as_secs_f64() / totals.calls as f64
                },
            })
            .collect();
        phases.sort_by(|a, b| b.seconds.total_cmp(&a.seconds));

        let series = inner
            .series
            .iter()
            .map(|(name, series)| SeriesReport {
                name: name.clone(),
                count: series.count,
                min: series.min,
                max: series.max,
                average: series.sum / series.count as f64,
            })
            .collect();

        StatsReport {
            total_seconds: self.started.elapsed().as_secs_f64(),
            phases,
            counters: inner.counters.clone(),
            series,
        }
    }
}

/// Serializable statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Wall-clock seconds since the record was created.
    pub total_seconds: f64,
    /// Phase totals, largest first.
    pub phases: Vec<PhaseReport>,
    /// Named event counters.
    pub counters: BTreeMap<String, u64>,
    /// Named sample series.
    pub series: Vec<SeriesReport>,
}

/// Accumulated time of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Phase name as passed to [`Stats::time`].
    pub name: String,
    /// Total seconds spent.
    pub seconds: f64,
    /// Number of timed calls.
    pub calls: u64,
    /// Mean seconds per call.
    pub average: f64,
}

/// Summary of one sample series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReport {
    /// Series name as passed to [`Stats::add_sample`].
    pub name: String,
    /// Number of samples.
    pub count: u64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Mean sample value.
    pub average: f64,
}

impl StatsReport {
    /// Plain-text rendering, one entry per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for phase in &self.phases {
            let _ = writeln!(
                out,
                "{:>12} : {:8.3}s {:>8} calls {:10.6}s avg",
                phase.name, phase.seconds, phase.calls, phase.average
            );
        }
        for (name, value) in &self.counters {
            let _ = writeln!(out, "{name:>12} : {value}");
        }
        for series in &self.series {
            let _ = writeln!(
                out,
                "{:>12} : min {} max {} avg {:.3} ({} samples)",
                series.name, series.min, series.max, series.average, series.count
            );
        }
        let _ = writeln!(out, "{:>12} : {:8.3}s", "total", self.total_seconds);
        out
    }
}
