use std::collections::HashMap;
use std::time::Instant;

use super::frame_loop::TickOutcome;

/// Observer for frame loop events.
///
/// Keeps counting and reporting out of the loop itself so hosts can pick
/// how much they want to see.
pub trait LoopLogger: Send {
    /// Record what one tick did.
    fn tick_outcome(&mut self, outcome: &TickOutcome);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. landmarks per frame).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit a summary of everything seen so far. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events. The loop's default.
pub struct NullLoopLogger;

impl LoopLogger for NullLoopLogger {
    fn tick_outcome(&mut self, _outcome: &TickOutcome) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub idle: u64,
    pub not_ready: u64,
    pub duplicate: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Idle => self.idle += 1,
            TickOutcome::NotReady => self.not_ready += 1,
            TickOutcome::Duplicate => self.duplicate += 1,
            TickOutcome::Delivered(_) => self.delivered += 1,
            TickOutcome::DetectorFailed => self.failed += 1,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.idle + self.not_ready + self.duplicate + self.delivered + self.failed
    }
}

/// Running aggregate of one stage's timings or one metric's values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleStats {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl SampleStats {
    pub fn record(&mut self, value: f64) {
        self.max = if self.count == 0 {
            value
        } else {
            self.max.max(value)
        };
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregates timings and outcome counts and reports through `log`.
///
/// Only running aggregates are kept, so memory stays flat on an
/// unbounded live session.
///
/// A running summary is logged every `summary_every` ticks; zero turns
/// periodic reporting off.
pub struct LogLoopLogger {
    summary_every: u64,
    counts: OutcomeCounts,
    timings: HashMap<String, SampleStats>,
    metrics: HashMap<String, SampleStats>,
    start_time: Instant,
}

impl LogLoopLogger {
    pub fn new(summary_every: u64) -> Self {
        Self {
            summary_every,
            counts: OutcomeCounts::default(),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
        }
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.counts
    }

    pub fn timings_for(&self, stage: &str) -> Option<SampleStats> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<SampleStats> {
        self.metrics.get(name).copied()
    }

    /// Returns the formatted summary, or `None` before the first tick.
    pub fn summary_string(&self) -> Option<String> {
        let ticks = self.counts.ticks();
        if ticks == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let c = &self.counts;
        let mut lines = vec![
            format!("Loop summary ({ticks} ticks, {elapsed_s:.1}s):"),
            format!(
                "  delivered {}  duplicate {}  not-ready {}  failed {}",
                c.delivered, c.duplicate, c.not_ready, c.failed
            ),
        ];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let stats = &self.timings[stage];
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms",
                stats.mean(),
                stats.max
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: avg {:.1}", self.metrics[name].mean()));
        }

        if elapsed_s > 0.0 {
            let fps = c.delivered as f64 / elapsed_s;
            lines.push(format!("  Effective rate: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogLoopLogger {
    fn default() -> Self {
        Self::new(0)
    }
}

impl LoopLogger for LogLoopLogger {
    fn tick_outcome(&mut self, outcome: &TickOutcome) {
        self.counts.record(outcome);
        if self.summary_every > 0 && self.counts.ticks() % self.summary_every == 0 {
            self.summary();
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
