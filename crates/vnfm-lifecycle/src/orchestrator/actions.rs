//! Reactions to health-monitor actions.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::monitor::ActionCallback;
use crate::status::{TransitionReason, VnfStatus};
use crate::store::RecordPatch;
use crate::tracker::TransitionOutcome;
use crate::vnf::{CreateVnfRequest, VnfRecord, attrs};

use super::VnfmOrchestrator;

/// What to do when a health check maps to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionPolicy {
    /// Retire the VNF and create a replacement from the same descriptor.
    Respawn,
    /// Log the failure only.
    Log,
    /// Log the failure and delete the VNF.
    LogAndKill,
}

impl ActionPolicy {
    /// Returns the action name used in monitoring policies.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Respawn => "respawn",
            Self::Log => "log",
            Self::LogAndKill => "log_and_kill",
        }
    }
}

impl fmt::Display for ActionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionPolicy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "respawn" => Ok(Self::Respawn),
            "log" => Ok(Self::Log),
            "log_and_kill" => Ok(Self::LogAndKill),
            _ => Err(()),
        }
    }
}

/// Callback handed to the monitor for each subscribed VNF.
///
/// Holds the orchestrator weakly so that subscriptions do not keep it alive.
pub(super) struct MonitorActions {
    orchestrator: Weak<VnfmOrchestrator>,
}

impl MonitorActions {
    pub(super) fn new(orchestrator: &Arc<VnfmOrchestrator>) -> Self {
        Self {
            orchestrator: Arc::downgrade(orchestrator),
        }
    }
}

#[async_trait]
impl ActionCallback for MonitorActions {
    async fn on_action(&self, vnf: &VnfRecord, action: &str) {
        match self.orchestrator.upgrade() {
            Some(orchestrator) => orchestrator.handle_monitor_action(vnf, action).await,
            None => tracing::debug!(vnf_id = %vnf.id, %action, "orchestrator gone, action dropped"),
        }
    }
}

impl VnfmOrchestrator {
    /// Applies a monitor action to a VNF.
    ///
    /// Checks stop immediately for `respawn` and `log_and_kill`; the
    /// replacement or teardown runs on the background executor. Unknown
    /// actions are logged and ignored.
    pub async fn handle_monitor_action(self: &Arc<Self>, vnf: &VnfRecord, action: &str) {
        let Ok(policy) = action.parse::<ActionPolicy>() else {
            tracing::warn!(vnf_id = %vnf.id, %action, "unknown monitor action ignored");
            return;
        };

        match policy {
            ActionPolicy::Log => {
                tracing::error!(vnf_id = %vnf.id, name = %vnf.name, "VNF failed health check");
            }
            ActionPolicy::Respawn => {
                tracing::warn!(vnf_id = %vnf.id, "VNF failed health check, respawning");
                self.stop_checks(vnf).await;
                let this = Arc::clone(self);
                let dead = vnf.clone();
                self.executor
                    .submit("respawn", vnf.id, async move { this.respawn(dead).await });
            }
            ActionPolicy::LogAndKill => {
                tracing::error!(vnf_id = %vnf.id, name = %vnf.name, "VNF failed health check, deleting");
                self.stop_checks(vnf).await;
                let this = Arc::clone(self);
                let vnf_id = vnf.id;
                let ctx = RequestContext::admin().for_tenant(vnf.tenant_id.clone());
                self.executor.submit("log_and_kill", vnf_id, async move {
                    this.delete_vnf(&ctx, &vnf_id).await
                });
            }
        }
    }

    async fn stop_checks(&self, vnf: &VnfRecord) {
        if let Some(monitor) = &self.monitor {
            monitor.mark_dead(&vnf.id).await;
        }
    }

    async fn respawn(self: &Arc<Self>, dead: VnfRecord) -> Result<()> {
        let outcome = self
            .tracker
            .transition(
                &dead.id,
                &[VnfStatus::Active],
                VnfStatus::Dead,
                TransitionReason::MonitorDeclaredDead,
                &RecordPatch::new(),
            )
            .await?;
        if let TransitionOutcome::Rejected { actual } = outcome {
            tracing::info!(vnf_id = %dead.id, %actual, "VNF is no longer active, not respawning");
            return Ok(());
        }
        self.unsubscribe_monitor(&dead.id).await;

        let ctx = RequestContext::admin().for_tenant(dead.tenant_id.clone());
        let mut request = CreateVnfRequest::new(dead.vnfd.id, dead.name.clone());
        request.description.clone_from(&dead.description);
        request.vim_id.clone_from(&dead.vim_id);
        request.region_name.clone_from(&dead.placement_attr.region_name);
        request.attributes = dead
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        request.attributes.insert(
            attrs::DEAD_VNF_ID.to_string(),
            serde_json::Value::String(dead.id.to_string()),
        );

        let replacement = self.create_vnf_sync(&ctx, request).await?;
        tracing::info!(
            dead_vnf_id = %dead.id,
            vnf_id = %replacement.id,
            status = %replacement.status,
            "VNF respawned"
        );
        if replacement.status == VnfStatus::Active {
            self.add_vnf_to_monitor(&replacement).await?;
            self.config_vnf(&ctx, &replacement).await?;
        }
        Ok(())
    }
}
