use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub checks: BTreeMap<String, CheckMetrics>,
    pub total_duration_ms: f64,
    pub checks_passed: u64,
    pub checks_failed: u64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct CheckMetrics {
    pub calls: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
}

#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    pub fn global() -> &'static MetricsCollector {
        static INSTANCE: Lazy<MetricsCollector> = Lazy::new(|| MetricsCollector {
            inner: Arc::new(Mutex::new(MetricsSnapshot::default())),
        });
        &INSTANCE
    }

    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsSnapshot::default())),
        }
    }

    pub fn start_check(&self, check_name: &str) -> CheckTimer {
        CheckTimer {
            check: check_name.to_string(),
            started_at: Instant::now(),
            collector: self.inner.clone(),
            recorded: false,
        }
    }

    pub fn record_total_duration(&self, duration: Duration) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.total_duration_ms = duration.as_secs_f64() * 1_000.0;
        }
    }

    pub fn record_check_pass(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.checks_passed += 1;
        }
    }

    pub fn record_check_failure(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.checks_failed += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

pub struct CheckTimer {
    check: String,
    started_at: Instant,
    collector: Arc<Mutex<MetricsSnapshot>>,
    recorded: bool,
}

impl CheckTimer {
    fn record(&mut self) {
        if self.recorded {
            return;
        }
        let duration = self.started_at.elapsed();
        if let Ok(mut guard) = self.collector.lock() {
            let metrics = guard.checks.entry(self.check.clone()).or_default();
            metrics.calls += 1;
            let duration_ms = duration.as_secs_f64() * 1_000.0;
            metrics.total_duration_ms += duration_ms;
            if duration_ms > metrics.max_duration_ms {
                metrics.max_duration_ms = duration_ms;
            }
        }
        debug!(
            check = self.check.as_str(),
            duration_ms = duration.as_secs_f64() * 1_000.0,
            "Check duration recorded"
        );
        self.recorded = true;
    }
}

impl Drop for CheckTimer {
    fn drop(&mut self) {
        self.record();
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        total_duration_ms = snapshot.total_duration_ms,
        check_count = snapshot.checks.len(),
        checks_passed = snapshot.checks_passed,
        checks_failed = snapshot.checks_failed,
        "Gate metrics summary"
    );
    for (check, metrics) in &snapshot.checks {
        info!(
            check = check.as_str(),
            calls = metrics.calls,
            total_ms = metrics.total_duration_ms,
            max_ms = metrics.max_duration_ms,
            "Check metrics"
        );
    }
}

impl MetricsSnapshot {
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str("# HELP gatecheck_checks_passed_total Total number of passed checks\n");
        output.push_str("# TYPE gatecheck_checks_passed_total counter\n");
        output.push_str(&format!(
            "gatecheck_checks_passed_total {}\n",
            self.checks_passed
        ));
        output.push_str("# HELP gatecheck_checks_failed_total Total number of failed checks\n");
        output.push_str("# TYPE gatecheck_checks_failed_total counter\n");
        output.push_str(&format!(
            "gatecheck_checks_failed_total {}\n",
            self.checks_failed
        ));
        output.push_str("# HELP gatecheck_check_calls_total Check invocation count\n");
        output.push_str("# TYPE gatecheck_check_calls_total counter\n");
        output.push_str(
            "# HELP gatecheck_check_duration_seconds_total Accumulated check duration in seconds\n",
        );
        output.push_str("# TYPE gatecheck_check_duration_seconds_total counter\n");
        output.push_str(
            "# HELP gatecheck_check_duration_seconds_max Maximum check duration in seconds\n",
        );
        output.push_str("# TYPE gatecheck_check_duration_seconds_max gauge\n");
        for (check, metrics) in &self.checks {
            output.push_str(&format!(
                "gatecheck_check_calls_total{{check=\"{}\"}} {}\n",
                check, metrics.calls
            ));
            output.push_str(&format!(
                "gatecheck_check_duration_seconds_total{{check=\"{}\"}} {:.6}\n",
                check,
                metrics.total_duration_ms / 1_000.0
            ));
            output.push_str(&format!(
                "gatecheck_check_duration_seconds_max{{check=\"{}\"}} {:.6}\n",
                check,
                metrics.max_duration_ms / 1_000.0
            ));
        }
        output.push_str("# HELP gatecheck_gate_duration_seconds Total gate duration\n");
        output.push_str("# TYPE gatecheck_gate_duration_seconds gauge\n");
        output.push_str(&format!(
            "gatecheck_gate_duration_seconds {:.6}\n",
            self.total_duration_ms / 1_000.0
        ));
        output
    }
}
