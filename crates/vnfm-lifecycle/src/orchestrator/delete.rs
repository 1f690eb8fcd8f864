//! VNF teardown.

use std::sync::Arc;

use vnfm_core::VnfId;

use crate::context::RequestContext;
use crate::driver::infra::ops;
use crate::error::Result;
use crate::mgmt::MgmtAction;
use crate::status::{TransitionReason, VnfStatus};
use crate::store::RecordPatch;
use crate::vim::VimAuth;
use crate::vnf::VnfRecord;

use super::{VnfmOrchestrator, infra_args, infra_driver_name};

impl VnfmOrchestrator {
    /// Deletes a VNF.
    ///
    /// The VNF moves to `PENDING_DELETE` and its monitor subscription is
    /// cancelled before any hook or backend call. Once the backend has
    /// accepted the delete, the wait phase runs detached: a clean teardown
    /// removes the record, a failed one leaves it `DEAD` with the error.
    ///
    /// A `DEAD` VNF (respawned, or left over from a failed teardown) can be
    /// deleted to release its backend instance.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound`, `Conflict` if the VNF is not `ACTIVE`, `ERROR`
    /// or `DEAD`, or the `mgmt_delete_pre`/infra `delete` failure (after
    /// recording `ERROR`, so the delete can be retried).
    #[tracing::instrument(skip(self, ctx), fields(vnf_id = %vnf_id, tenant_id = %ctx.tenant_id))]
    pub async fn delete_vnf(self: &Arc<Self>, ctx: &RequestContext, vnf_id: &VnfId) -> Result<()> {
        let current = self.tracker.fetch(vnf_id).await?;
        let auth = self.resolve_vim(ctx, &current).await?;

        self.tracker
            .require(
                vnf_id,
                &[VnfStatus::Active, VnfStatus::Error, VnfStatus::Dead],
                VnfStatus::PendingDelete,
                TransitionReason::DeleteRequested,
                &RecordPatch::new(),
            )
            .await?;
        self.unsubscribe_monitor(vnf_id).await;
        let vnf = self.tracker.fetch(vnf_id).await?;

        let torn_down: Result<()> = async {
            self.mgmt.delete_pre(ctx, &vnf).await?;
            if let Err(e) = self.mgmt.call(ctx, MgmtAction::DeleteVnf, &vnf).await {
                tracing::warn!(%vnf_id, error = %e, "mgmt_call DELETE_VNF failed, continuing delete");
            }
            if let Some(instance_id) = vnf.instance_id.as_deref() {
                let driver = infra_driver_name(&vnf)?;
                let args = infra_args(ctx, &auth, &vnf);
                self.infra
                    .invoke(driver, ops::DELETE, |d| async move {
                        d.delete(args, instance_id).await
                    })
                    .await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = torn_down {
            tracing::error!(%vnf_id, error = %e, "delete failed");
            self.tracker
                .resolve_error(
                    vnf_id,
                    VnfStatus::PendingDelete,
                    TransitionReason::DeleteFailed,
                    &e.reason(),
                )
                .await?;
            self.run_delete_post(ctx, vnf_id).await;
            return Err(e);
        }

        let this = Arc::clone(self);
        let ctx = ctx.clone();
        self.executor.submit("delete_wait", *vnf_id, async move {
            this.delete_wait_phase(&ctx, vnf, auth).await
        });
        Ok(())
    }

    async fn delete_wait_phase(
        &self,
        ctx: &RequestContext,
        vnf: VnfRecord,
        auth: VimAuth,
    ) -> Result<()> {
        let mut error = None;
        if let Some(instance_id) = vnf.instance_id.as_deref() {
            let waited: Result<()> = async {
                let driver = infra_driver_name(&vnf)?;
                let args = infra_args(ctx, &auth, &vnf);
                self.infra
                    .invoke(driver, ops::DELETE_WAIT, |d| async move {
                        d.delete_wait(args, instance_id).await
                    })
                    .await
            }
            .await;
            if let Err(e) = waited {
                tracing::error!(vnf_id = %vnf.id, %instance_id, error = %e, "delete wait failed");
                error = Some(e.reason());
            }
        }

        if let Err(e) = self.mgmt.delete_post(ctx, &vnf).await {
            tracing::error!(vnf_id = %vnf.id, error = %e, "mgmt_delete_post failed");
        }

        self.tracker.retire(&vnf.id, error).await
    }

    async fn run_delete_post(&self, ctx: &RequestContext, vnf_id: &VnfId) {
        let posted: Result<()> = async {
            let vnf = self.tracker.fetch(vnf_id).await?;
            self.mgmt.delete_post(ctx, &vnf).await
        }
        .await;
        if let Err(e) = posted {
            tracing::error!(%vnf_id, error = %e, "mgmt_delete_post failed");
        }
    }
}
