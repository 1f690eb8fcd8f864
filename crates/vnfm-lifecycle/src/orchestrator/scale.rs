//! Policy-driven scaling.

use std::sync::Arc;

use vnfm_core::VnfId;

use crate::context::RequestContext;
use crate::driver::infra::ops;
use crate::error::Result;
use crate::policy::{ScaleRequest, ScalingPolicy};
use crate::status::{TransitionReason, VnfStatus};
use crate::store::RecordPatch;
use crate::tracker::TransitionOutcome;
use crate::vim::VimAuth;
use crate::vnf::VnfRecord;

use super::{VnfmOrchestrator, infra_args, infra_driver_name};

impl VnfmOrchestrator {
    /// Scales a VNF by one of its declared policies.
    ///
    /// Returns the policy bound to the requested action as soon as the
    /// backend has accepted the scale. The VNF holds `PENDING_SCALE_IN` or
    /// `PENDING_SCALE_OUT` until the wait phase settles it.
    ///
    /// # Errors
    ///
    /// Returns `PolicyNotFound`, `InvalidPolicyType` or `InvalidPolicyAction`
    /// without touching the VNF, `Conflict` if the VNF is not `ACTIVE`, or the
    /// infra `scale` failure (after recording `ERROR`).
    #[tracing::instrument(
        skip(self, ctx, request),
        fields(
            vnf_id = %vnf_id,
            tenant_id = %ctx.tenant_id,
            policy = %request.policy,
            action = %request.action,
        )
    )]
    pub async fn scale_vnf(
        self: &Arc<Self>,
        ctx: &RequestContext,
        vnf_id: &VnfId,
        request: ScaleRequest,
    ) -> Result<ScalingPolicy> {
        let policy = self
            .get_vnf_policy(vnf_id, &request.policy)
            .await?
            .with_action(request.action);
        let action = policy.validate()?;
        let pending = action.pending_status();

        self.tracker
            .require(
                vnf_id,
                &[VnfStatus::Active],
                pending,
                TransitionReason::ScaleRequested,
                &RecordPatch::new(),
            )
            .await?;
        let vnf = self.tracker.fetch(vnf_id).await?;

        let invoked: Result<VimAuth> = async {
            let auth = self.resolve_vim(ctx, &vnf).await?;
            let driver = infra_driver_name(&vnf)?;
            let args = infra_args(ctx, &auth, &vnf);
            let bound = &policy;
            self.infra
                .invoke(driver, ops::SCALE, |d| async move { d.scale(args, bound).await })
                .await?;
            Ok(auth)
        }
        .await;

        let auth = match invoked {
            Ok(auth) => auth,
            Err(e) => {
                tracing::error!(%vnf_id, error = %e, "scale failed");
                self.tracker
                    .resolve_error(vnf_id, pending, TransitionReason::ScaleFailed, &e.reason())
                    .await?;
                return Err(e);
            }
        };
        tracing::info!(%vnf_id, %action, "scale accepted");

        let this = Arc::clone(self);
        let ctx = ctx.clone();
        let bound = policy.clone();
        self.executor.submit("scale_wait", *vnf_id, async move {
            this.scale_wait_phase(&ctx, vnf, auth, bound, pending).await
        });

        Ok(policy)
    }

    async fn scale_wait_phase(
        &self,
        ctx: &RequestContext,
        vnf: VnfRecord,
        auth: VimAuth,
        policy: ScalingPolicy,
        pending: VnfStatus,
    ) -> Result<()> {
        let waited: Result<Option<String>> = async {
            let driver = infra_driver_name(&vnf)?;
            let args = infra_args(ctx, &auth, &vnf);
            let bound = &policy;
            self.infra
                .invoke(driver, ops::SCALE_WAIT, |d| async move {
                    d.scale_wait(args, bound).await
                })
                .await
        }
        .await;

        match waited {
            Ok(mgmt_url) => {
                let outcome = self
                    .tracker
                    .transition(
                        &vnf.id,
                        &[pending],
                        VnfStatus::Active,
                        TransitionReason::ScaleCompleted,
                        &RecordPatch::new().mgmt_url(mgmt_url),
                    )
                    .await?;
                if let TransitionOutcome::Rejected { actual } = outcome {
                    tracing::warn!(vnf_id = %vnf.id, %actual, %pending, "VNF left pending scale before it settled");
                }
            }
            Err(e) => {
                tracing::error!(vnf_id = %vnf.id, policy = %policy.name, error = %e, "scale wait failed");
                self.tracker
                    .resolve_error(&vnf.id, pending, TransitionReason::ScaleFailed, &e.reason())
                    .await?;
            }
        }
        Ok(())
    }
}
