//! Per-run stage timing, compiled in with the `metrics` feature.
//!
//! ```ignore
//! let pipeline = Pipeline::new(config)?;
//! land.randomize(0.3)?.smooth(4)?.wait()?;
//! let metrics = pipeline.metrics();
//! println!("avg stage: {:.1}us", metrics.avg_stage_us());
//! ```

use std::collections::{BTreeMap, VecDeque};

/// Stage durations kept per window.
pub const WINDOW_STAGES: usize = 256;

/// Most recent stage durations in microseconds, with a running total.
#[derive(Debug, Clone)]
pub struct TimingWindow {
  samples: VecDeque<u64>,
  limit: usize,
  total: u64,
}

impl TimingWindow {
  pub fn with_limit(limit: usize) -> Self {
    Self {
      samples: VecDeque::with_capacity(limit),
      limit: limit.max(1),
      total: 0,
    }
  }

  pub fn record(&mut self, micros: u64) {
    if self.samples.len() == self.limit {
      if let Some(evicted) = self.samples.pop_front() {
        self.total -= evicted;
      }
    }
    self.samples.push_back(micros);
    self.total += micros;
  }

  pub fn samples(&self) -> usize {
    self.samples.len()
  }

  pub fn total_us(&self) -> u64 {
    self.total
  }

  /// Mean of the window, 0 when nothing was recorded.
  pub fn mean_us(&self) -> f64 {
    match self.samples.len() {
      0 => 0.0,
      n => self.total as f64 / n as f64,
    }
  }

  pub fn slowest_us(&self) -> Option<u64> {
    self.samples.iter().copied().max()
  }
}

impl Default for TimingWindow {
  fn default() -> Self {
    Self::with_limit(WINDOW_STAGES)
  }
}

/// Stage timings of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
  /// Recent stage durations across all operations.
  pub stages: TimingWindow,
  /// Recent stage durations keyed by operation name.
  pub operations: BTreeMap<&'static str, TimingWindow>,
  /// Duration of the most recently finished stage.
  pub last_stage_us: u64,
  /// Stages timed so far, failed ones included.
  pub total_stages: u64,
}

impl PipelineMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_stage(&mut self, operation: &'static str, elapsed_us: u64) {
    self.stages.record(elapsed_us);
    self.operations.entry(operation).or_default().record(elapsed_us);
    self.last_stage_us = elapsed_us;
    self.total_stages += 1;
  }

  pub fn avg_stage_us(&self) -> f64 {
    self.stages.mean_us()
  }

  /// Average duration of one operation, if it ran.
  pub fn operation_avg_us(&self, operation: &str) -> Option<f64> {
    self.operations.get(operation).map(TimingWindow::mean_us)
  }
}
