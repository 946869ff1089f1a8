/*!
 * In-process metrics for stage clients and pipeline runs.
 *
 * Counters are kept behind a `parking_lot::Mutex` and exposed as plain
 * snapshots; wiring them to an exporter is left to the embedding service.
 */

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{PipelineStage, StageKind};

/// Point-in-time copy of one service's counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceMetricsSnapshot {
    /// HTTP attempts issued
    pub requests: u64,
    /// Calls that returned a usable response
    pub successes: u64,
    /// Retries performed after a timeout
    pub retries: u64,
    /// Failures keyed by error type (`timeout`, `http_500`, ...)
    pub errors: HashMap<String, u64>,
    /// Summed latency of all attempts
    pub total_latency: Duration,
}

impl ServiceMetricsSnapshot {
    pub fn error_count(&self, error_type: &str) -> u64 {
        self.errors.get(error_type).copied().unwrap_or(0)
    }

    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }
}

/// Counters for a single stage client
#[derive(Debug)]
pub struct ServiceMetrics {
    service: StageKind,
    inner: Mutex<ServiceMetricsSnapshot>,
}

impl ServiceMetrics {
    pub fn new(service: StageKind) -> Self {
        Self {
            service,
            inner: Mutex::new(ServiceMetricsSnapshot::default()),
        }
    }

    pub fn service(&self) -> StageKind {
        self.service
    }

    pub fn record_attempt(&self, latency: Duration) {
        let mut inner = self.inner.lock();
        inner.requests += 1;
        inner.total_latency += latency;
    }

    pub fn record_success(&self) {
        self.inner.lock().successes += 1;
    }

    pub fn record_retry(&self) {
        self.inner.lock().retries += 1;
    }

    pub fn record_error(&self, error_type: &str) {
        *self.inner.lock().errors.entry(error_type.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> ServiceMetricsSnapshot {
        self.inner.lock().clone()
    }
}

/// Per-stage durations of one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTimings {
    pub asr: Option<Duration>,
    pub translation: Option<Duration>,
    pub tts: Option<Duration>,
    /// Wall time of the whole run
    pub total: Duration,
}

impl StageTimings {
    pub fn record(&mut self, stage: StageKind, elapsed: Duration) {
        match stage {
            StageKind::Asr => self.asr = Some(elapsed),
            StageKind::Translation => self.translation = Some(elapsed),
            StageKind::Tts => self.tts = Some(elapsed),
        }
    }

    pub fn get(&self, stage: StageKind) -> Option<Duration> {
        match stage {
            StageKind::Asr => self.asr,
            StageKind::Translation => self.translation,
            StageKind::Tts => self.tts,
        }
    }

    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        let fmt = |d: Option<Duration>| match d {
            Some(d) => format!("{:.3}s", d.as_secs_f64()),
            None => "-".to_string(),
        };
        format!(
            "asr={} translation={} tts={} total={:.3}s",
            fmt(self.asr),
            fmt(self.translation),
            fmt(self.tts),
            self.total.as_secs_f64()
        )
    }
}

/// Point-in-time copy of pipeline counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineMetricsSnapshot {
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    /// Failures attributed to each stage label
    pub failures_by_stage: HashMap<String, u64>,
    /// Latency samples per stage label
    pub stage_latencies: HashMap<String, Vec<Duration>>,
}

impl PipelineMetricsSnapshot {
    pub fn failures(&self, stage: PipelineStage) -> u64 {
        self.failures_by_stage.get(stage.label()).copied().unwrap_or(0)
    }

    pub fn latency_samples(&self, stage: StageKind) -> usize {
        self.stage_latencies.get(stage.label()).map_or(0, Vec::len)
    }
}

/// Counters for the orchestrator
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    inner: Mutex<PipelineMetricsSnapshot>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self) {
        self.inner.lock().runs_started += 1;
    }

    pub fn record_stage_latency(&self, stage: StageKind, elapsed: Duration) {
        self.inner
            .lock()
            .stage_latencies
            .entry(stage.label().to_string())
            .or_default()
            .push(elapsed);
    }

    pub fn record_success(&self) {
        self.inner.lock().runs_succeeded += 1;
    }

    pub fn record_failure(&self, stage: PipelineStage) {
        let mut inner = self.inner.lock();
        inner.runs_failed += 1;
        *inner.failures_by_stage.entry(stage.label().to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        self.inner.lock().clone()
    }
}
