//! VNF attribute updates.

use std::collections::BTreeMap;
use std::sync::Arc;

use vnfm_core::VnfId;

use crate::context::RequestContext;
use crate::driver::infra::ops;
use crate::error::Result;
use crate::mgmt::MgmtAction;
use crate::status::{TransitionReason, VnfStatus};
use crate::store::RecordPatch;
use crate::tracker::TransitionOutcome;
use crate::vim::VimAuth;
use crate::vnf::{UpdateVnfRequest, VnfRecord, normalize_attributes};

use super::{VnfmOrchestrator, infra_args, infra_driver_name};

impl VnfmOrchestrator {
    /// Updates a VNF's attributes.
    ///
    /// The VNF moves `ACTIVE → PENDING_UPDATE` and the infra `update` runs on
    /// the caller's path. The returned record carries the merged attributes;
    /// they are persisted when the update settles to `ACTIVE`.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound`, `Conflict` if the VNF is not `ACTIVE`, or the
    /// `mgmt_update_pre`/infra `update` failure (after recording `ERROR`).
    #[tracing::instrument(
        skip(self, ctx, request),
        fields(vnf_id = %vnf_id, tenant_id = %ctx.tenant_id)
    )]
    pub async fn update_vnf(
        self: &Arc<Self>,
        ctx: &RequestContext,
        vnf_id: &VnfId,
        request: UpdateVnfRequest,
    ) -> Result<VnfRecord> {
        let attributes = normalize_attributes(&request.attributes)?;
        let current = self.tracker.fetch(vnf_id).await?;
        let driver = infra_driver_name(&current)?.to_string();
        let auth = self.resolve_vim(ctx, &current).await?;

        self.tracker
            .require(
                vnf_id,
                &[VnfStatus::Active],
                VnfStatus::PendingUpdate,
                TransitionReason::UpdateRequested,
                &RecordPatch::new(),
            )
            .await?;
        let mut vnf = self.tracker.fetch(vnf_id).await?;
        vnf.attributes
            .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));

        let invoked: Result<()> = async {
            self.mgmt.update_pre(ctx, &vnf).await?;
            let record = &vnf;
            let args = infra_args(ctx, &auth, record);
            self.infra
                .invoke(&driver, ops::UPDATE, |d| async move {
                    d.update(args, record, record.instance_id.as_deref()).await
                })
                .await
        }
        .await;

        if let Err(e) = invoked {
            tracing::error!(%vnf_id, error = %e, "update failed");
            self.tracker
                .resolve_error(
                    vnf_id,
                    VnfStatus::PendingUpdate,
                    TransitionReason::UpdateFailed,
                    &e.reason(),
                )
                .await?;
            self.run_update_post(ctx, vnf_id).await;
            return Err(e);
        }

        let this = Arc::clone(self);
        let ctx = ctx.clone();
        let record = vnf.clone();
        self.executor.submit("update_wait", *vnf_id, async move {
            this.update_wait_phase(&ctx, record, auth, attributes).await
        });

        Ok(vnf)
    }

    async fn update_wait_phase(
        &self,
        ctx: &RequestContext,
        vnf: VnfRecord,
        auth: VimAuth,
        attributes: BTreeMap<String, String>,
    ) -> Result<()> {
        let settled: Result<()> = async {
            let record = &vnf;
            let driver = infra_driver_name(record)?;
            let args = infra_args(ctx, &auth, record);
            self.infra
                .invoke(driver, ops::UPDATE_WAIT, |d| async move {
                    d.update_wait(args, record, record.instance_id.as_deref()).await
                })
                .await?;
            self.mgmt.call(ctx, MgmtAction::UpdateVnf, record).await
        }
        .await;

        match settled {
            Ok(()) => {
                let outcome = self
                    .tracker
                    .transition(
                        &vnf.id,
                        &[VnfStatus::PendingUpdate],
                        VnfStatus::Active,
                        TransitionReason::UpdateCompleted,
                        &RecordPatch::new().attributes(attributes),
                    )
                    .await?;
                if let TransitionOutcome::Rejected { actual } = outcome {
                    tracing::warn!(vnf_id = %vnf.id, %actual, "VNF left PENDING_UPDATE before update settled");
                }
            }
            Err(e) => {
                tracing::error!(vnf_id = %vnf.id, error = %e, "update wait failed");
                self.tracker
                    .resolve_error(
                        &vnf.id,
                        VnfStatus::PendingUpdate,
                        TransitionReason::UpdateFailed,
                        &e.reason(),
                    )
                    .await?;
            }
        }

        self.run_update_post(ctx, &vnf.id).await;
        Ok(())
    }

    async fn run_update_post(&self, ctx: &RequestContext, vnf_id: &VnfId) {
        let posted: Result<()> = async {
            let vnf = self.tracker.fetch(vnf_id).await?;
            self.mgmt.update_post(ctx, &vnf).await
        }
        .await;
        if let Err(e) = posted {
            tracing::error!(%vnf_id, error = %e, "mgmt_update_post failed");
        }
    }
}
