//! Recording drivers with scriptable failures.
//!
//! Every recorder appends to a shared [`CallLog`], so a test can assert the
//! relative order of infrastructure, management and monitor calls.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use vnfm_core::VnfId;
use vnfm_lifecycle::context::RequestContext;
use vnfm_lifecycle::driver::infra::ops;
use vnfm_lifecycle::driver::{DriverError, InfraArgs, InfraDriver, MgmtDriver};
use vnfm_lifecycle::mgmt::{MgmtAction, MgmtHook};
use vnfm_lifecycle::monitor::{ActionCallback, MonitorDriver, VnfMonitor};
use vnfm_lifecycle::policy::ScalingPolicy;
use vnfm_lifecycle::vnf::VnfRecord;

/// Management URL returned by [`RecordingInfraDriver::create_wait`] by default.
pub const DEFAULT_MGMT_URL: &str = r#"{"VDU1":"192.168.120.10"}"#;

/// Record of a driver or monitor call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Infrastructure operation.
    Infra {
        /// Operation name, one of [`ops`].
        op: &'static str,
        /// Instance handle passed to the call, if any.
        instance_id: Option<String>,
    },
    /// Management lifecycle hook.
    Hook {
        /// Hook point.
        hook: MgmtHook,
        /// VNF the hook ran for.
        vnf_id: VnfId,
    },
    /// Management notification.
    Mgmt {
        /// Notification kind.
        action: MgmtAction,
        /// VNF the notification is about.
        vnf_id: VnfId,
    },
    /// Monitor subscription.
    Subscribe {
        /// Subscribed VNF.
        vnf_id: VnfId,
    },
    /// Monitor unsubscription.
    Unsubscribe {
        /// Unsubscribed VNF.
        vnf_id: VnfId,
    },
    /// Monitor told to stop checking a VNF.
    MarkDead {
        /// VNF marked dead.
        vnf_id: VnfId,
    },
}

impl Call {
    /// Returns true for the infrastructure operation `op`.
    pub fn is_infra(&self, op: &str) -> bool {
        matches!(self, Self::Infra { op: recorded, .. } if *recorded == op)
    }

    /// Returns true for the hook `hook`.
    pub fn is_hook(&self, hook: MgmtHook) -> bool {
        matches!(self, Self::Hook { hook: recorded, .. } if *recorded == hook)
    }

    /// Returns true for the notification `action`.
    pub fn is_mgmt(&self, action: MgmtAction) -> bool {
        matches!(self, Self::Mgmt { action: recorded, .. } if *recorded == action)
    }
}

/// Ordered, shared record of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call.
    pub fn record(&self, call: Call) {
        self.calls.lock().expect("lock").push(call);
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    /// Counts calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().expect("lock").iter().filter(|c| pred(c)).count()
    }

    /// Returns the index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.lock().expect("lock").iter().position(pred)
    }

    /// Clears recorded calls.
    pub fn clear(&self) {
        self.calls.lock().expect("lock").clear();
    }
}

/// Infrastructure driver that records calls and fails on demand.
///
/// `create` hands out `stack-N` handles; `create_wait` returns
/// [`DEFAULT_MGMT_URL`] unless told otherwise.
#[derive(Debug)]
pub struct RecordingInfraDriver {
    log: CallLog,
    handles: AtomicUsize,
    no_handle: AtomicBool,
    mgmt_url: Mutex<Option<String>>,
    failures: Mutex<HashMap<&'static str, DriverError>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl RecordingInfraDriver {
    /// Creates a driver recording into `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            handles: AtomicUsize::new(0),
            no_handle: AtomicBool::new(false),
            mgmt_url: Mutex::new(Some(DEFAULT_MGMT_URL.to_string())),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Makes every call to `op` fail with `error`.
    pub fn fail(&self, op: &'static str, error: DriverError) {
        self.failures.lock().expect("lock").insert(op, error);
    }

    /// Removes all scripted failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    /// Makes `create` return no instance handle.
    pub fn return_no_handle(&self) {
        self.no_handle.store(true, Ordering::SeqCst);
    }

    /// Sets the management URL `create_wait` and `scale_wait` return.
    pub fn set_mgmt_url(&self, mgmt_url: Option<String>) {
        *self.mgmt_url.lock().expect("lock") = mgmt_url;
    }

    /// Holds every call to `op` until the returned gate is notified.
    ///
    /// The call is recorded before it blocks.
    pub fn gate(&self, op: &'static str) -> Arc<Notify> {
        Arc::clone(
            self.gates
                .lock()
                .expect("lock")
                .entry(op)
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    async fn enter(&self, op: &'static str, instance_id: Option<&str>) -> Result<(), DriverError> {
        self.log.record(Call::Infra {
            op,
            instance_id: instance_id.map(str::to_string),
        });
        let gate = self.gates.lock().expect("lock").get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.failures.lock().expect("lock").get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn mgmt_url(&self) -> Option<String> {
        self.mgmt_url.lock().expect("lock").clone()
    }
}

#[async_trait]
impl InfraDriver for RecordingInfraDriver {
    async fn create(
        &self,
        _args: InfraArgs<'_>,
        _vnf: &VnfRecord,
    ) -> Result<Option<String>, DriverError> {
        self.enter(ops::CREATE, None).await?;
        if self.no_handle.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let n = self.handles.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(format!("stack-{n}")))
    }

    async fn create_wait(
        &self,
        _args: InfraArgs<'_>,
        _vnf: &VnfRecord,
        instance_id: &str,
    ) -> Result<Option<String>, DriverError> {
        self.enter(ops::CREATE_WAIT, Some(instance_id)).await?;
        Ok(self.mgmt_url())
    }

    async fn update(
        &self,
        _args: InfraArgs<'_>,
        _vnf: &VnfRecord,
        instance_id: Option<&str>,
    ) -> Result<(), DriverError> {
        self.enter(ops::UPDATE, instance_id).await
    }

    async fn update_wait(
        &self,
        _args: InfraArgs<'_>,
        _vnf: &VnfRecord,
        instance_id: Option<&str>,
    ) -> Result<(), DriverError> {
        self.enter(ops::UPDATE_WAIT, instance_id).await
    }

    async fn delete(&self, _args: InfraArgs<'_>, instance_id: &str) -> Result<(), DriverError> {
        self.enter(ops::DELETE, Some(instance_id)).await
    }

    async fn delete_wait(
        &self,
        _args: InfraArgs<'_>,
        instance_id: &str,
    ) -> Result<(), DriverError> {
        self.enter(ops::DELETE_WAIT, Some(instance_id)).await
    }

    async fn scale(&self, _args: InfraArgs<'_>, policy: &ScalingPolicy) -> Result<(), DriverError> {
        self.enter(ops::SCALE, policy.instance_id.as_deref()).await
    }

    async fn scale_wait(
        &self,
        _args: InfraArgs<'_>,
        policy: &ScalingPolicy,
    ) -> Result<Option<String>, DriverError> {
        self.enter(ops::SCALE_WAIT, policy.instance_id.as_deref()).await?;
        Ok(self.mgmt_url())
    }
}

/// Management driver that records hooks and notifications.
#[derive(Debug)]
pub struct RecordingMgmtDriver {
    log: CallLog,
    failing_hooks: Mutex<HashSet<MgmtHook>>,
    failing_calls: Mutex<HashSet<MgmtAction>>,
    config: Mutex<Option<String>>,
}

impl RecordingMgmtDriver {
    /// Creates a driver recording into `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failing_hooks: Mutex::new(HashSet::new()),
            failing_calls: Mutex::new(HashSet::new()),
            config: Mutex::new(None),
        }
    }

    /// Makes `hook` fail.
    pub fn fail_hook(&self, hook: MgmtHook) {
        self.failing_hooks.lock().expect("lock").insert(hook);
    }

    /// Makes the `action` notification fail.
    pub fn fail_call(&self, action: MgmtAction) {
        self.failing_calls.lock().expect("lock").insert(action);
    }

    /// Sets the configuration returned by `get_config`.
    pub fn set_config(&self, config: Option<String>) {
        *self.config.lock().expect("lock") = config;
    }
}

#[async_trait]
impl MgmtDriver for RecordingMgmtDriver {
    async fn hook(
        &self,
        _context: &RequestContext,
        hook: MgmtHook,
        vnf: &VnfRecord,
    ) -> Result<(), DriverError> {
        self.log.record(Call::Hook {
            hook,
            vnf_id: vnf.id,
        });
        if self.failing_hooks.lock().expect("lock").contains(&hook) {
            return Err(DriverError::management(format!("{hook} failed")));
        }
        Ok(())
    }

    async fn get_config(
        &self,
        _context: &RequestContext,
        _vnf: &VnfRecord,
    ) -> Result<Option<String>, DriverError> {
        Ok(self.config.lock().expect("lock").clone())
    }

    async fn call(
        &self,
        _context: &RequestContext,
        action: MgmtAction,
        vnf: &VnfRecord,
    ) -> Result<(), DriverError> {
        self.log.record(Call::Mgmt {
            action,
            vnf_id: vnf.id,
        });
        if self.failing_calls.lock().expect("lock").contains(&action) {
            return Err(DriverError::management(format!("{action} rejected")));
        }
        Ok(())
    }
}

struct Subscription {
    vnf: VnfRecord,
    callback: Arc<dyn ActionCallback>,
    dead: bool,
}

/// Monitor that records subscriptions and fires actions on demand.
#[derive(Default)]
pub struct RecordingMonitor {
    log: CallLog,
    subscriptions: Mutex<HashMap<VnfId, Subscription>>,
}

impl fmt::Debug for RecordingMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingMonitor")
            .field("subscriptions", &self.subscriptions.lock().expect("lock").len())
            .finish_non_exhaustive()
    }
}

impl RecordingMonitor {
    /// Creates a monitor recording into `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `vnf_id` is subscribed and not marked dead.
    pub fn is_watching(&self, vnf_id: &VnfId) -> bool {
        self.subscriptions
            .lock()
            .expect("lock")
            .get(vnf_id)
            .is_some_and(|s| !s.dead)
    }

    /// Returns the subscribed VNF IDs.
    pub fn subscribed(&self) -> Vec<VnfId> {
        self.subscriptions.lock().expect("lock").keys().copied().collect()
    }

    /// Delivers `action` for `vnf_id` as a failed health check would.
    ///
    /// Returns false if the VNF is not watched.
    pub async fn fire(&self, vnf_id: &VnfId, action: &str) -> bool {
        let target = self
            .subscriptions
            .lock()
            .expect("lock")
            .get(vnf_id)
            .filter(|s| !s.dead)
            .map(|s| (s.vnf.clone(), Arc::clone(&s.callback)));
        match target {
            Some((vnf, callback)) => {
                callback.on_action(&vnf, action).await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl VnfMonitor for RecordingMonitor {
    async fn subscribe(
        &self,
        vnf: &VnfRecord,
        callback: Arc<dyn ActionCallback>,
    ) -> vnfm_lifecycle::error::Result<()> {
        self.log.record(Call::Subscribe { vnf_id: vnf.id });
        self.subscriptions.lock().expect("lock").insert(
            vnf.id,
            Subscription {
                vnf: vnf.clone(),
                callback,
                dead: false,
            },
        );
        Ok(())
    }

    async fn unsubscribe(&self, vnf_id: &VnfId) -> bool {
        self.log.record(Call::Unsubscribe { vnf_id: *vnf_id });
        self.subscriptions.lock().expect("lock").remove(vnf_id).is_some()
    }

    async fn mark_dead(&self, vnf_id: &VnfId) {
        self.log.record(Call::MarkDead { vnf_id: *vnf_id });
        if let Some(s) = self.subscriptions.lock().expect("lock").get_mut(vnf_id) {
            s.dead = true;
        }
    }
}

/// Monitor driver whose check outcome is set by the test.
#[derive(Debug)]
pub struct ScriptedMonitorDriver {
    outcome: Mutex<String>,
    checks: AtomicUsize,
}

impl ScriptedMonitorDriver {
    /// Creates a driver that reports `outcome` for every check.
    #[must_use]
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcome: Mutex::new(outcome.into()),
            checks: AtomicUsize::new(0),
        }
    }

    /// Changes the reported outcome.
    pub fn set_outcome(&self, outcome: impl Into<String>) {
        *self.outcome.lock().expect("lock") = outcome.into();
    }

    /// Returns how many checks ran.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MonitorDriver for ScriptedMonitorDriver {
    async fn check(
        &self,
        _vnf: &VnfRecord,
        _params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, DriverError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome.lock().expect("lock").clone())
    }
}
