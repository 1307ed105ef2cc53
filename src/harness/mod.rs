// Run controller module
//
// Coordinates one load-test execution end-to-end: asks the ramp
// scheduler for activation offsets, spawns virtual users as independent
// tasks, enforces the test duration, drains users cooperatively at the
// deadline, and reduces the collected outcomes into a summary.

pub mod ramp;
pub mod vuser;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::LoadTestError;
use crate::gateway::ChatGateway;
use crate::prompts::PromptPool;
use crate::reporter::{ErrorDetail, LoadTestSummary, ResponseTime};
use crate::stats::{StatsCollector, StatsSnapshot};
use vuser::VirtualUser;

/// Validated load-test parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestRequest {
    pub users: u64,
    pub spawn_rate: f64,
    pub test_time: f64,
}

impl LoadTestRequest {
    /// Validate raw parameters. Each violation yields a single error
    /// naming the failed constraint; no run is started on invalid input.
    pub fn try_new(
        users: i64,
        spawn_rate: f64,
        test_time: f64,
        max_users: u64,
    ) -> Result<Self, LoadTestError> {
        if users < 1 {
            return Err(LoadTestError::InvalidParameter(
                "users must be a positive integer".to_string(),
            ));
        }
        if users as u64 > max_users {
            return Err(LoadTestError::InvalidParameter(format!(
                "users must not exceed {}",
                max_users
            )));
        }
        if !spawn_rate.is_finite() || spawn_rate <= 0.0 {
            return Err(LoadTestError::InvalidParameter(
                "spawn_rate must be a positive number".to_string(),
            ));
        }
        if !test_time.is_finite() || test_time <= 0.0 {
            return Err(LoadTestError::InvalidParameter(
                "test_time must be a positive number".to_string(),
            ));
        }
        Ok(Self {
            users: users as u64,
            spawn_rate,
            test_time,
        })
    }

    pub fn test_duration(&self) -> Duration {
        Duration::from_secs_f64(self.test_time)
    }
}

/// Per-request timeout for one run: the configured timeout clamped to
/// the test duration, floored at one second, so a single stalled request
/// cannot keep the run from draining on schedule.
pub fn request_timeout_for(request: &LoadTestRequest, configured_secs: u64) -> Duration {
    let configured = Duration::from_secs(configured_secs.max(1));
    let ceiling = Duration::from_secs_f64(request.test_time.max(1.0));
    configured.min(ceiling)
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    Created = 0,
    Ramping = 1,
    Running = 2,
    Draining = 3,
    Completed = 4,
}

impl RunPhase {
    fn from_u8(v: u8) -> RunPhase {
        match v {
            0 => RunPhase::Created,
            1 => RunPhase::Ramping,
            2 => RunPhase::Running,
            3 => RunPhase::Draining,
            _ => RunPhase::Completed,
        }
    }
}

/// Asynchronously waits until the given `AtomicBool` flag becomes `true`.
/// Uses a short polling interval to avoid busy-waiting while remaining responsive.
pub async fn wait_for_shutdown(flag: &AtomicBool) {
    loop {
        if flag.load(Ordering::Relaxed) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Run controller - owns exactly one run with isolated state.
///
/// The collector and cancellation flag are created per instance and
/// never shared with another run, so concurrent runs do not interfere.
pub struct RunController {
    request: LoadTestRequest,
    gateway: Arc<dyn ChatGateway>,
    prompts: Arc<PromptPool>,
    stats: Arc<StatsCollector>,
    cancel: Arc<AtomicBool>,
    phase: AtomicU8,
    grace: Duration,
}

impl RunController {
    /// Create a controller for one run. `grace` is the per-user wait
    /// applied during draining; callers pass the per-request timeout.
    pub fn new(
        request: LoadTestRequest,
        gateway: Arc<dyn ChatGateway>,
        prompts: Arc<PromptPool>,
        grace: Duration,
    ) -> Self {
        Self {
            request,
            gateway,
            prompts,
            stats: Arc::new(StatsCollector::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            phase: AtomicU8::new(RunPhase::Created as u8),
            grace,
        }
    }

    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    fn set_phase(&self, phase: RunPhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    pub fn cancel_flag(&self) -> &Arc<AtomicBool> {
        &self.cancel
    }

    /// Request early termination (signal handling or programmatic use).
    /// The run drains immediately instead of waiting for the deadline.
    pub fn request_shutdown(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Execute the run to completion and return the summary.
    ///
    /// Activation is scheduling a future start: every user task is
    /// spawned up front with its offset and the controller never blocks
    /// between activations. Elapsed time for throughput is measured from
    /// start to the instant draining begins, so slow aggregation does
    /// not dilute the rate.
    pub async fn run(&self) -> Result<LoadTestSummary, LoadTestError> {
        let start = tokio::time::Instant::now();
        let started_at = unix_timestamp();

        let offsets = ramp::activation_offsets(self.request.users, self.request.spawn_rate);
        self.set_phase(RunPhase::Ramping);
        tracing::info!(
            users = self.request.users,
            spawn_rate = self.request.spawn_rate,
            test_time = self.request.test_time,
            "load-test run starting"
        );

        let mut handles = Vec::with_capacity(offsets.len());
        for (id, offset) in offsets.into_iter().enumerate() {
            let user = VirtualUser::new(
                id as u64,
                offset,
                self.gateway.clone(),
                self.prompts.clone(),
                self.stats.clone(),
                self.cancel.clone(),
            );
            handles.push(tokio::spawn(user.run()));
        }

        let test_duration = self.request.test_duration();
        let full_strength =
            ramp::ramp_duration(self.request.users, self.request.spawn_rate).min(test_duration);

        // Ramping until the last scheduled activation, then Running until
        // the deadline. An externally set flag cuts both waits short.
        tokio::select! {
            _ = tokio::time::sleep_until(start + full_strength) => {
                self.set_phase(RunPhase::Running);
            }
            _ = wait_for_shutdown(&self.cancel) => {}
        }
        if !self.cancel.load(Ordering::Relaxed) {
            tokio::select! {
                _ = tokio::time::sleep_until(start + test_duration) => {}
                _ = wait_for_shutdown(&self.cancel) => {}
            }
        }

        let elapsed = start.elapsed();
        self.set_phase(RunPhase::Draining);
        self.cancel.store(true, Ordering::Relaxed);
        tracing::info!(elapsed_secs = elapsed.as_secs_f64(), "draining virtual users");

        for mut handle in handles {
            match tokio::time::timeout(self.grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => self.stats.record_lost("user_panic"),
                Err(_) => {
                    // Grace period spent; record the loss and move on
                    // instead of waiting indefinitely.
                    handle.abort();
                    self.stats.record_lost("stalled_user");
                }
            }
        }

        self.set_phase(RunPhase::Completed);
        let finished_at = unix_timestamp();
        let snapshot = self.stats.snapshot();
        let summary = build_summary(&self.request, &snapshot, elapsed, &started_at, &finished_at);
        tracing::info!(
            total = summary.total_requests,
            failed = summary.failed_requests,
            rps = summary.requests_per_second,
            "load-test run completed"
        );
        Ok(summary)
    }
}

/// Build a LoadTestSummary from a stats snapshot. `elapsed` is the
/// measured start-to-draining duration, not the collector's lifetime.
pub fn build_summary(
    request: &LoadTestRequest,
    snap: &StatsSnapshot,
    elapsed: Duration,
    started_at: &str,
    finished_at: &str,
) -> LoadTestSummary {
    let secs = elapsed.as_secs_f64();
    let requests_per_second = if secs > 0.0 {
        snap.total_requests as f64 / secs
    } else {
        0.0
    };

    let mut errors: Vec<ErrorDetail> = snap
        .error_kinds
        .iter()
        .map(|(kind, count)| ErrorDetail {
            name: kind.clone(),
            count: *count,
            error_type: error_type_for(kind).to_string(),
        })
        .collect();
    errors.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(&b.name)));

    LoadTestSummary {
        test_duration: secs,
        total_requests: snap.total_requests,
        successful_requests: snap.successful_requests,
        failed_requests: snap.failed_requests,
        requests_per_second,
        concurrent_users: request.users,
        response_time: ResponseTime {
            min_ms: snap.latency.min.as_secs_f64() * 1000.0,
            max_ms: snap.latency.max.as_secs_f64() * 1000.0,
            mean_ms: snap.latency.mean.as_secs_f64() * 1000.0,
            p50_ms: snap.latency.p50.as_secs_f64() * 1000.0,
            p90_ms: snap.latency.p90.as_secs_f64() * 1000.0,
            p95_ms: snap.latency.p95.as_secs_f64() * 1000.0,
            p99_ms: snap.latency.p99.as_secs_f64() * 1000.0,
        },
        status_codes: snap.status_codes.clone(),
        errors,
        started_at: started_at.to_string(),
        finished_at: finished_at.to_string(),
    }
}

/// Coarse grouping of error kinds for the summary's error table.
fn error_type_for(kind: &str) -> &'static str {
    if kind.starts_with("status_") {
        "http_status"
    } else {
        match kind {
            "timeout" => "timeout",
            "connect" => "network",
            "invalid_body" => "response_shape",
            "stalled_user" | "user_panic" => "harness",
            _ => "other",
        }
    }
}

/// Get current time as unix-seconds string.
fn unix_timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}
