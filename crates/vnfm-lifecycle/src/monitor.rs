//! Health-monitor subscription.
//!
//! This module provides:
//!
//! - [`VnfMonitor`]: the subscription contract the orchestrator depends on
//! - [`ActionCallback`]: invoked when a health check maps to an action
//! - [`HealthMonitor`]: an in-process monitor that periodically runs
//!   [`MonitorDriver`] checks against every subscribed VNF
//!
//! A VNF's `monitoring_policy` attribute is JSON of the form
//!
//! ```json
//! {
//!   "vdus": {
//!     "VDU1": {
//!       "ping": {
//!         "monitoring_params": {"monitoring_delay": 45, "count": 3},
//!         "actions": {"failure": "respawn"}
//!       }
//!     }
//!   },
//!   "monitoring_delay": 30
//! }
//! ```
//!
//! and its `mgmt_url` is a JSON map from VDU name to management address.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use vnfm_core::VnfId;

use crate::config::VnfmConfig;
use crate::driver::{DriverError, DriverRegistry};
use crate::error::{Error, Result};
use crate::metrics::LifecycleMetrics;
use crate::vnf::{VnfRecord, attrs};

/// Receives the action a health check resolved to.
#[async_trait]
pub trait ActionCallback: Send + Sync {
    /// Handles `action` (e.g. `respawn`) for `vnf`.
    async fn on_action(&self, vnf: &VnfRecord, action: &str);
}

/// Subscription contract of a health-monitoring engine.
#[async_trait]
pub trait VnfMonitor: Send + Sync {
    /// Starts monitoring an active VNF.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonitoringPolicy` if the VNF's policy or management
    /// URL cannot be interpreted.
    async fn subscribe(&self, vnf: &VnfRecord, callback: Arc<dyn ActionCallback>) -> Result<()>;

    /// Stops monitoring a VNF. Returns false if it was not monitored.
    async fn unsubscribe(&self, vnf_id: &VnfId) -> bool;

    /// Stops running checks for a VNF without forgetting it.
    async fn mark_dead(&self, vnf_id: &VnfId);
}

/// Checks for one VDU under one monitor driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSpec {
    /// Driver parameters; `monitoring_delay` overrides the VNF-level delay.
    #[serde(default)]
    pub monitoring_params: serde_json::Map<String, serde_json::Value>,
    /// Map from check outcome to action name.
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
}

impl MonitorSpec {
    fn monitoring_delay(&self) -> Option<u64> {
        self.monitoring_params
            .get("monitoring_delay")
            .and_then(serde_json::Value::as_u64)
    }
}

/// A VNF's monitoring policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringPolicy {
    /// VDU name → monitor driver name → checks.
    #[serde(default)]
    pub vdus: BTreeMap<String, BTreeMap<String, MonitorSpec>>,
    /// Seconds after subscription before checks start.
    #[serde(default)]
    pub monitoring_delay: Option<u64>,
}

impl MonitoringPolicy {
    /// Parses the policy recorded on a VNF.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonitoringPolicy` if the attribute is absent or
    /// malformed.
    pub fn from_vnf(vnf: &VnfRecord) -> Result<Self> {
        let raw = vnf
            .attribute(attrs::MONITORING_POLICY)
            .ok_or_else(|| Error::InvalidMonitoringPolicy {
                vnf_id: vnf.id,
                message: "no monitoring_policy attribute".into(),
            })?;
        serde_json::from_str(raw).map_err(|e| Error::InvalidMonitoringPolicy {
            vnf_id: vnf.id,
            message: e.to_string(),
        })
    }
}

/// A backend that checks a VDU and reports an outcome such as `success` or
/// `failure`.
#[async_trait]
pub trait MonitorDriver: Send + Sync {
    /// Runs one check.
    async fn check(
        &self,
        vnf: &VnfRecord,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<String, DriverError>;
}

struct HostedVnf {
    vnf: VnfRecord,
    mgmt_ips: BTreeMap<String, String>,
    policy: MonitoringPolicy,
    callback: Arc<dyn ActionCallback>,
    boot_at: DateTime<Utc>,
    dead: bool,
}

struct Check {
    vnf_id: VnfId,
    vnf: VnfRecord,
    driver: String,
    params: serde_json::Map<String, serde_json::Value>,
    actions: BTreeMap<String, String>,
    callback: Arc<dyn ActionCallback>,
}

/// In-process health monitor.
pub struct HealthMonitor {
    drivers: DriverRegistry<dyn MonitorDriver>,
    boot_wait: Duration,
    check_interval: Duration,
    hosted: Mutex<BTreeMap<VnfId, HostedVnf>>,
    metrics: LifecycleMetrics,
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("drivers", &self.drivers)
            .field("boot_wait", &self.boot_wait)
            .field("check_interval", &self.check_interval)
            .field("hosted", &self.len())
            .finish_non_exhaustive()
    }
}

impl HealthMonitor {
    /// Creates a monitor. `boot_wait` is the default delay before checks
    /// start for VNFs whose policy sets none.
    #[must_use]
    pub fn new(
        drivers: DriverRegistry<dyn MonitorDriver>,
        boot_wait: Duration,
        check_interval: Duration,
        metrics: LifecycleMetrics,
    ) -> Self {
        Self {
            drivers,
            boot_wait,
            check_interval,
            hosted: Mutex::new(BTreeMap::new()),
            metrics,
        }
    }

    /// Creates a monitor whose default check delay is the configured boot
    /// wait and whose tick is the configured check interval.
    #[must_use]
    pub fn from_config(
        drivers: DriverRegistry<dyn MonitorDriver>,
        config: &VnfmConfig,
        metrics: LifecycleMetrics,
    ) -> Self {
        Self::new(
            drivers,
            config.boot_wait,
            config.monitor_check_interval,
            metrics,
        )
    }

    /// Returns the tick interval of [`run`](Self::run).
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        self.check_interval
    }

    fn hosted(&self) -> MutexGuard<'_, BTreeMap<VnfId, HostedVnf>> {
        self.hosted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of subscribed VNFs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosted().len()
    }

    /// Returns true if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `vnf_id` is subscribed and still being checked.
    #[must_use]
    pub fn is_monitored(&self, vnf_id: &VnfId) -> bool {
        self.hosted().get(vnf_id).is_some_and(|h| !h.dead)
    }

    fn is_dead(&self, vnf_id: &VnfId) -> bool {
        self.hosted().get(vnf_id).is_none_or(|h| h.dead)
    }

    /// Runs every check whose delay has elapsed at `now` and fires the
    /// mapped actions. Returns the actions fired.
    pub async fn check_once(&self, now: DateTime<Utc>) -> Vec<(VnfId, String)> {
        let checks = self.due_checks(now);
        let mut fired = Vec::new();

        for check in checks {
            if self.is_dead(&check.vnf_id) {
                continue;
            }
            let outcome = self
                .drivers
                .invoke(&check.driver, "monitor_call", |d| {
                    let vnf = &check.vnf;
                    let params = &check.params;
                    async move { d.check(vnf, params).await }
                })
                .await;
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(vnf_id = %check.vnf_id, driver = %check.driver, error = %e, "health check errored");
                    continue;
                }
            };
            tracing::debug!(vnf_id = %check.vnf_id, driver = %check.driver, %outcome, "health check");

            if let Some(action) = check.actions.get(&outcome) {
                tracing::info!(vnf_id = %check.vnf_id, %outcome, %action, "monitor action fired");
                self.metrics.record_monitor_action(action);
                check.callback.on_action(&check.vnf, action).await;
                fired.push((check.vnf_id, action.clone()));
            }
        }
        fired
    }

    fn due_checks(&self, now: DateTime<Utc>) -> Vec<Check> {
        let hosted = self.hosted();
        let mut checks = Vec::new();
        for (vnf_id, entry) in hosted.iter().filter(|(_, h)| !h.dead) {
            let vnf_delay = entry
                .policy
                .monitoring_delay
                .unwrap_or_else(|| self.boot_wait.as_secs());
            for (vdu, drivers) in &entry.policy.vdus {
                for (driver, check) in drivers {
                    let delay = check.monitoring_delay().unwrap_or(vnf_delay);
                    let delay = i64::try_from(delay)
                        .ok()
                        .and_then(TimeDelta::try_seconds)
                        .unwrap_or(TimeDelta::MAX);
                    if now.signed_duration_since(entry.boot_at) < delay {
                        continue;
                    }
                    let mut params = check.monitoring_params.clone();
                    if !params.contains_key("mgmt_ip") {
                        if let Some(ip) = entry.mgmt_ips.get(vdu) {
                            params.insert("mgmt_ip".into(), serde_json::Value::String(ip.clone()));
                        }
                    }
                    checks.push(Check {
                        vnf_id: *vnf_id,
                        vnf: entry.vnf.clone(),
                        driver: driver.clone(),
                        params,
                        actions: check.actions.clone(),
                        callback: Arc::clone(&entry.callback),
                    });
                }
            }
        }
        checks
    }

    /// Runs checks every `check_interval`. Never returns.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let fired = self.check_once(Utc::now()).await;
            if !fired.is_empty() {
                tracing::debug!(fired = fired.len(), "monitor tick fired actions");
            }
        }
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}

#[async_trait]
impl VnfMonitor for HealthMonitor {
    async fn subscribe(&self, vnf: &VnfRecord, callback: Arc<dyn ActionCallback>) -> Result<()> {
        let policy = MonitoringPolicy::from_vnf(vnf)?;
        let mgmt_ips = match vnf.mgmt_url.as_deref() {
            Some(url) => {
                serde_json::from_str(url).map_err(|e| Error::InvalidMonitoringPolicy {
                    vnf_id: vnf.id,
                    message: format!("mgmt_url is not a VDU address map: {e}"),
                })?
            }
            None => BTreeMap::new(),
        };
        tracing::debug!(vnf_id = %vnf.id, ?mgmt_ips, "adding hosting VNF");

        let count = {
            let mut hosted = self.hosted();
            hosted.insert(
                vnf.id,
                HostedVnf {
                    vnf: vnf.clone(),
                    mgmt_ips,
                    policy,
                    callback,
                    boot_at: Utc::now(),
                    dead: false,
                },
            );
            hosted.len()
        };
        self.metrics.set_monitored_vnfs(count);
        Ok(())
    }

    async fn unsubscribe(&self, vnf_id: &VnfId) -> bool {
        let (removed, count) = {
            let mut hosted = self.hosted();
            let removed = hosted.remove(vnf_id).is_some();
            (removed, hosted.len())
        };
        if removed {
            tracing::debug!(%vnf_id, "removed hosting VNF");
            self.metrics.set_monitored_vnfs(count);
        }
        removed
    }

    async fn mark_dead(&self, vnf_id: &VnfId) {
        if let Some(entry) = self.hosted().get_mut(vnf_id) {
            entry.dead = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::descriptor::Vnfd;
    use crate::driver::DriverKind;

    struct FixedOutcome(&'static str, AtomicUsize);

    #[async_trait]
    impl MonitorDriver for FixedOutcome {
        async fn check(
            &self,
            _vnf: &VnfRecord,
            params: &serde_json::Map<String, serde_json::Value>,
        ) -> std::result::Result<String, DriverError> {
            assert_eq!(params.get("mgmt_ip"), Some(&json!("10.0.0.7")));
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct Actions(Mutex<Vec<String>>);

    #[async_trait]
    impl ActionCallback for Actions {
        async fn on_action(&self, _vnf: &VnfRecord, action: &str) {
            self.0.lock().expect("lock").push(action.to_string());
        }
    }

    fn monitor(outcome: &'static str) -> (HealthMonitor, Arc<FixedOutcome>) {
        let driver = Arc::new(FixedOutcome(outcome, AtomicUsize::new(0)));
        let registry = DriverRegistry::<dyn MonitorDriver>::builder(DriverKind::Monitor)
            .register("ping", Arc::clone(&driver) as Arc<dyn MonitorDriver>)
            .build(&["ping"])
            .expect("registry");
        let monitor = HealthMonitor::new(
            registry,
            Duration::from_secs(30),
            Duration::from_secs(10),
            LifecycleMetrics::new(),
        );
        (monitor, driver)
    }

    fn monitored_vnf(policy: &serde_json::Value) -> VnfRecord {
        let mut vnf = VnfRecord::new("vnf", "tenant", Vnfd::new("vnfd"));
        vnf.mgmt_url = Some(r#"{"VDU1":"10.0.0.7"}"#.into());
        vnf.attributes
            .insert(attrs::MONITORING_POLICY.into(), policy.to_string());
        vnf
    }

    fn policy(delay: u64) -> serde_json::Value {
        json!({
            "vdus": {"VDU1": {"ping": {
                "monitoring_params": {"monitoring_delay": delay},
                "actions": {"failure": "respawn"}
            }}}
        })
    }

    #[tokio::test]
    async fn config_supplies_default_delay_and_interval() -> Result<()> {
        let driver = Arc::new(FixedOutcome("failure", AtomicUsize::new(0)));
        let registry = DriverRegistry::<dyn MonitorDriver>::builder(DriverKind::Monitor)
            .register("ping", Arc::clone(&driver) as Arc<dyn MonitorDriver>)
            .build(&["ping"])?;
        let config = VnfmConfig::default()
            .with_boot_wait(Duration::ZERO)
            .with_monitor_check_interval(Duration::from_secs(3));
        let monitor = HealthMonitor::from_config(registry, &config, LifecycleMetrics::new());
        assert_eq!(monitor.check_interval(), Duration::from_secs(3));

        let vnf = monitored_vnf(&json!({
            "vdus": {"VDU1": {"ping": {"actions": {"failure": "log"}}}}
        }));
        monitor.subscribe(&vnf, Arc::new(Actions::default())).await?;
        let fired = monitor.check_once(Utc::now()).await;
        assert_eq!(fired, vec![(vnf.id, "log".to_string())]);
        Ok(())
    }

    #[tokio::test]
    async fn fires_mapped_action_after_delay() -> Result<()> {
        let (monitor, driver) = monitor("failure");
        let actions = Arc::new(Actions::default());
        let vnf = monitored_vnf(&policy(45));
        monitor.subscribe(&vnf, actions.clone()).await?;

        assert!(monitor.check_once(Utc::now()).await.is_empty());
        assert_eq!(driver.1.load(Ordering::SeqCst), 0);

        let later = Utc::now() + TimeDelta::seconds(60);
        let fired = monitor.check_once(later).await;
        assert_eq!(fired, vec![(vnf.id, "respawn".to_string())]);
        assert_eq!(*actions.0.lock().expect("lock"), vec!["respawn"]);
        Ok(())
    }

    #[tokio::test]
    async fn unmapped_outcome_fires_nothing() -> Result<()> {
        let (monitor, driver) = monitor("success");
        let vnf = monitored_vnf(&policy(0));
        monitor.subscribe(&vnf, Arc::new(Actions::default())).await?;

        assert!(monitor.check_once(Utc::now()).await.is_empty());
        assert_eq!(driver.1.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn dead_and_unsubscribed_vnfs_are_not_checked() -> Result<()> {
        let (monitor, driver) = monitor("failure");
        let vnf = monitored_vnf(&policy(0));
        monitor.subscribe(&vnf, Arc::new(Actions::default())).await?;
        assert!(monitor.is_monitored(&vnf.id));

        monitor.mark_dead(&vnf.id).await;
        assert!(!monitor.is_monitored(&vnf.id));
        assert!(monitor.check_once(Utc::now()).await.is_empty());
        assert_eq!(driver.1.load(Ordering::SeqCst), 0);

        assert!(monitor.unsubscribe(&vnf.id).await);
        assert!(!monitor.unsubscribe(&vnf.id).await);
        assert!(monitor.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn vnf_level_delay_falls_back_to_boot_wait() -> Result<()> {
        let (monitor, driver) = monitor("success");
        let vnf = monitored_vnf(&json!({"vdus": {"VDU1": {"ping": {}}}}));
        monitor.subscribe(&vnf, Arc::new(Actions::default())).await?;

        monitor.check_once(Utc::now() + TimeDelta::seconds(29)).await;
        assert_eq!(driver.1.load(Ordering::SeqCst), 0);
        monitor.check_once(Utc::now() + TimeDelta::seconds(31)).await;
        assert_eq!(driver.1.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_policy_is_rejected() {
        let (monitor, _) = monitor("success");
        let mut vnf = monitored_vnf(&policy(0));
        vnf.attributes
            .insert(attrs::MONITORING_POLICY.into(), "{not json".into());
        let err = monitor
            .subscribe(&vnf, Arc::new(Actions::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMonitoringPolicy { .. }));
        assert!(monitor.is_empty());
    }
}
