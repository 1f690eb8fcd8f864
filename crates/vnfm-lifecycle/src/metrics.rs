//! Observability metrics for lifecycle orchestration.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `vnfm_status_transitions_total` | Counter | `from_status`, `to_status` | Applied status transitions |
//! | `vnfm_guard_failures_total` | Counter | `target_status`, `actual_status` | Guarded transitions that lost |
//! | `vnfm_driver_calls_total` | Counter | `kind`, `driver`, `operation`, `result` | Backend driver invocations |
//! | `vnfm_driver_call_duration_seconds` | Histogram | `kind`, `driver`, `operation` | Backend driver latency |
//! | `vnfm_continuations_total` | Counter | `operation`, `result` | Settled background continuations |
//! | `vnfm_continuations_in_flight` | Gauge | - | Continuations queued or running |
//! | `vnfm_monitored_vnfs` | Gauge | - | VNFs hosted by the health monitor |
//! | `vnfm_monitor_actions_total` | Counter | `action` | Monitor actions fired |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vnfm_lifecycle::metrics::LifecycleMetrics;
//!
//! let metrics = LifecycleMetrics::new();
//! metrics.record_transition("pending_create", "active");
//! metrics.record_driver_call("infra", "noop", "create", "success");
//! metrics.set_in_flight(3);
//! ```

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Applied status transitions.
    pub const STATUS_TRANSITIONS_TOTAL: &str = "vnfm_status_transitions_total";
    /// Counter: Guarded transitions that lost.
    pub const GUARD_FAILURES_TOTAL: &str = "vnfm_guard_failures_total";
    /// Counter: Backend driver invocations.
    pub const DRIVER_CALLS_TOTAL: &str = "vnfm_driver_calls_total";
    /// Histogram: Backend driver latency in seconds.
    pub const DRIVER_CALL_DURATION_SECONDS: &str = "vnfm_driver_call_duration_seconds";
    /// Counter: Settled background continuations.
    pub const CONTINUATIONS_TOTAL: &str = "vnfm_continuations_total";
    /// Gauge: Continuations queued or running.
    pub const CONTINUATIONS_IN_FLIGHT: &str = "vnfm_continuations_in_flight";
    /// Gauge: VNFs hosted by the health monitor.
    pub const MONITORED_VNFS: &str = "vnfm_monitored_vnfs";
    /// Counter: Monitor actions fired.
    pub const MONITOR_ACTIONS_TOTAL: &str = "vnfm_monitor_actions_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Previous status (for transitions).
    pub const FROM_STATUS: &str = "from_status";
    /// Target status (for transitions).
    pub const TO_STATUS: &str = "to_status";
    /// Status a guard attempted to reach.
    pub const TARGET_STATUS: &str = "target_status";
    /// Status observed when a guard lost.
    pub const ACTUAL_STATUS: &str = "actual_status";
    /// Driver registry (infra, mgmt, monitor).
    pub const KIND: &str = "kind";
    /// Driver name.
    pub const DRIVER: &str = "driver";
    /// Operation name (create, `create_wait`, ...).
    pub const OPERATION: &str = "operation";
    /// Result status (success, failure, panic).
    pub const RESULT: &str = "result";
    /// Monitor action name.
    pub const ACTION: &str = "action";
}

/// High-level interface for recording lifecycle metrics.
///
/// Cheap to clone and share across tasks.
#[derive(Debug, Clone, Default)]
pub struct LifecycleMetrics {
    _private: (),
}

impl LifecycleMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an applied status transition.
    pub fn record_transition(&self, from_status: &str, to_status: &str) {
        counter!(
            names::STATUS_TRANSITIONS_TOTAL,
            labels::FROM_STATUS => from_status.to_string(),
            labels::TO_STATUS => to_status.to_string(),
        )
        .increment(1);
    }

    /// Records a guarded transition that lost.
    pub fn record_guard_failure(&self, target_status: &str, actual_status: &str) {
        counter!(
            names::GUARD_FAILURES_TOTAL,
            labels::TARGET_STATUS => target_status.to_string(),
            labels::ACTUAL_STATUS => actual_status.to_string(),
        )
        .increment(1);
    }

    /// Records a backend driver invocation.
    pub fn record_driver_call(&self, kind: &str, driver: &str, operation: &str, result: &str) {
        counter!(
            names::DRIVER_CALLS_TOTAL,
            labels::KIND => kind.to_string(),
            labels::DRIVER => driver.to_string(),
            labels::OPERATION => operation.to_string(),
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records backend driver latency.
    pub fn observe_driver_duration(
        &self,
        kind: &str,
        driver: &str,
        operation: &str,
        duration: Duration,
    ) {
        histogram!(
            names::DRIVER_CALL_DURATION_SECONDS,
            labels::KIND => kind.to_string(),
            labels::DRIVER => driver.to_string(),
            labels::OPERATION => operation.to_string(),
        )
        .record(duration.as_secs_f64());
    }

    /// Records a settled background continuation.
    pub fn record_continuation(&self, operation: &str, result: &str) {
        counter!(
            names::CONTINUATIONS_TOTAL,
            labels::OPERATION => operation.to_string(),
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Sets the number of continuations queued or running.
    #[allow(clippy::cast_precision_loss)] // Gauge values are typically small
    pub fn set_in_flight(&self, count: usize) {
        gauge!(names::CONTINUATIONS_IN_FLIGHT).set(count as f64);
    }

    /// Sets the number of VNFs hosted by the health monitor.
    #[allow(clippy::cast_precision_loss)] // Gauge values are typically small
    pub fn set_monitored_vnfs(&self, count: usize) {
        gauge!(names::MONITORED_VNFS).set(count as f64);
    }

    /// Records a monitor action firing.
    pub fn record_monitor_action(&self, action: &str) {
        counter!(
            names::MONITOR_ACTIONS_TOTAL,
            labels::ACTION => action.to_string(),
        )
        .increment(1);
    }
}

/// A guard that records elapsed time when dropped.
///
/// ## Example
///
/// ```rust
/// use vnfm_lifecycle::metrics::{LifecycleMetrics, TimingGuard};
///
/// let metrics = LifecycleMetrics::new();
/// {
///     let _guard = TimingGuard::new(|duration| {
///         metrics.observe_driver_duration("infra", "noop", "create", duration);
///     });
///     // Invoke the driver...
/// }
/// ```
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_does_not_panic() {
        let metrics = LifecycleMetrics::new();
        metrics.record_transition("active", "pending_scale_out");
        metrics.record_guard_failure("pending_scale_out", "pending_scale_out");
        metrics.record_driver_call("infra", "noop", "scale", "success");
        metrics.observe_driver_duration("infra", "noop", "scale", Duration::from_millis(3));
        metrics.record_continuation("scale", "success");
        metrics.set_in_flight(2);
        metrics.set_monitored_vnfs(1);
        metrics.record_monitor_action("respawn");
    }

    #[test]
    fn timing_guard_measures_duration() {
        let mut recorded = None;
        {
            let _guard = TimingGuard::new(|d| recorded = Some(d));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(recorded.is_some_and(|d| d >= Duration::from_millis(5)));
    }
}
