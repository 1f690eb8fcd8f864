//! VNF instantiation: pre, invoke, wait, configure and subscribe.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::driver::infra::ops;
use crate::error::{Error, Result};
use crate::mgmt::MgmtAction;
use crate::status::{TransitionReason, VnfStatus};
use crate::store::RecordPatch;
use crate::tracker::TransitionOutcome;
use crate::vim::VimAuth;
use crate::vnf::{CreateVnfRequest, UpdateVnfRequest, VnfRecord, attrs, normalize_attributes};

use super::actions::MonitorActions;
use super::{VnfmOrchestrator, infra_args, infra_driver_name};

const NO_INSTANCE_HANDLE: &str = "infra driver returned no instance handle";
const CONFIGURE_FAILED: &str = "Unable to configure VDU";

impl VnfmOrchestrator {
    /// Creates a VNF.
    ///
    /// Returns once the infrastructure driver has accepted the request. The
    /// wait, management notification, monitor subscription and post-boot
    /// configuration run as a detached continuation; their outcome is
    /// recorded on the VNF.
    ///
    /// # Errors
    ///
    /// Returns a validation or not-found error before any record is created,
    /// the `mgmt_create_pre` failure, or the infra `create` failure (after a
    /// compensating delete has been attempted).
    #[tracing::instrument(
        skip(self, ctx, request),
        fields(
            tenant_id = %ctx.tenant_id,
            vnfd_id = %request.vnfd_id,
            vnf_id = tracing::field::Empty,
        )
    )]
    pub async fn create_vnf(
        self: &Arc<Self>,
        ctx: &RequestContext,
        request: CreateVnfRequest,
    ) -> Result<VnfRecord> {
        let (vnf, auth) = self.create_pre(ctx, request).await?;
        tracing::Span::current().record("vnf_id", tracing::field::display(&vnf.id));

        let Some(started) = self.create_invoke(ctx, &vnf, &auth).await? else {
            return self.tracker.fetch(&vnf.id).await;
        };

        let this = Arc::clone(self);
        let ctx = ctx.clone();
        let record = started.clone();
        self.executor.submit("create_wait", started.id, async move {
            let settled = this.create_wait_phase(&ctx, record, &auth).await?;
            if settled.status != VnfStatus::Active {
                return Ok(());
            }
            if let Err(e) = this.add_vnf_to_monitor(&settled).await {
                tracing::error!(vnf_id = %settled.id, error = %e, "monitor subscription failed");
            }
            this.config_vnf(&ctx, &settled).await
        });

        Ok(started)
    }

    /// Creates a VNF and waits for it to settle.
    ///
    /// Used by internal callers that need the final status. Does not
    /// subscribe the VNF to the health monitor or apply post-boot
    /// configuration.
    ///
    /// # Errors
    ///
    /// Same as [`create_vnf`](Self::create_vnf). Wait-phase failures are
    /// recorded on the returned record, not raised.
    #[tracing::instrument(
        skip(self, ctx, request),
        fields(tenant_id = %ctx.tenant_id, vnfd_id = %request.vnfd_id)
    )]
    pub async fn create_vnf_sync(
        self: &Arc<Self>,
        ctx: &RequestContext,
        request: CreateVnfRequest,
    ) -> Result<VnfRecord> {
        let (vnf, auth) = self.create_pre(ctx, request).await?;
        match self.create_invoke(ctx, &vnf, &auth).await? {
            Some(started) => self.create_wait_phase(ctx, started, &auth).await,
            None => self.tracker.fetch(&vnf.id).await,
        }
    }

    /// Subscribes an active VNF to the health monitor.
    ///
    /// Returns false when no monitor is configured, the VNF carries no
    /// monitoring policy, or it has no trusted management URL yet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonitoringPolicy` if the monitor rejects the policy.
    pub async fn add_vnf_to_monitor(self: &Arc<Self>, vnf: &VnfRecord) -> Result<bool> {
        let Some(monitor) = &self.monitor else {
            return Ok(false);
        };
        if vnf.attribute(attrs::MONITORING_POLICY).is_none() {
            return Ok(false);
        }
        if vnf.trusted_mgmt_url().is_none() {
            tracing::debug!(vnf_id = %vnf.id, status = %vnf.status, "no trusted mgmt_url, not monitoring");
            return Ok(false);
        }
        monitor
            .subscribe(vnf, Arc::new(MonitorActions::new(self)))
            .await?;
        tracing::info!(vnf_id = %vnf.id, "VNF added to health monitor");
        Ok(true)
    }

    /// Re-applies the VNF's `config` attribute through
    /// [`update_vnf`](Self::update_vnf) once the guest has had `boot_wait` to
    /// come up. Does nothing when the VNF carries no `config`.
    ///
    /// # Errors
    ///
    /// Returns the update's synchronous failure.
    pub async fn config_vnf(self: &Arc<Self>, ctx: &RequestContext, vnf: &VnfRecord) -> Result<()> {
        let Some(config) = vnf.attribute(attrs::CONFIG).map(str::to_string) else {
            return Ok(());
        };

        tokio::time::sleep(self.config.boot_wait).await;
        tracing::debug!(vnf_id = %vnf.id, "re-applying post-boot config");
        self.update_vnf(
            ctx,
            &vnf.id,
            UpdateVnfRequest::config(serde_json::Value::String(config)),
        )
        .await?;
        Ok(())
    }

    async fn create_pre(
        &self,
        ctx: &RequestContext,
        request: CreateVnfRequest,
    ) -> Result<(VnfRecord, VimAuth)> {
        let attributes = normalize_attributes(&request.attributes)?;
        let vnfd = self.get_vnfd(&request.vnfd_id).await?;
        let driver = vnfd
            .infra_driver
            .as_deref()
            .ok_or(Error::InfraDriverNotSpecified)?;
        self.infra.get(driver)?;
        if let Some(mgmt) = vnfd.mgmt_driver.as_deref() {
            self.mgmt.registry().get(mgmt)?;
        }
        let auth = self
            .vim
            .resolve(ctx, request.vim_id.as_deref(), request.region_name.as_deref())
            .await?;

        let mut vnf = VnfRecord::new(request.name, ctx.tenant_id.clone(), vnfd);
        vnf.description = request.description;
        vnf.placement_attr.region_name = request.region_name;
        RecordPatch::new()
            .vim(auth.vim_id.clone(), auth.vim_name.clone())
            .attributes(attributes)
            .apply(&mut vnf)?;
        if !vnf.attributes.contains_key(attrs::MONITORING_POLICY) {
            if let Some(policy) = &vnf.vnfd.monitoring_policy {
                let encoded = serde_json::to_string(policy).map_err(|e| {
                    Error::serialization(format!("failed to encode monitoring policy: {e}"))
                })?;
                vnf.attributes
                    .insert(attrs::MONITORING_POLICY.to_string(), encoded);
            }
        }

        self.store().create_vnf(&vnf).await?;
        tracing::debug!(vnf_id = %vnf.id, vim_id = %auth.vim_id, "VNF record created");

        if let Err(e) = self.mgmt.create_pre(ctx, &vnf).await {
            tracing::error!(vnf_id = %vnf.id, error = %e, "mgmt_create_pre failed");
            self.tracker
                .resolve_error(
                    &vnf.id,
                    VnfStatus::PendingCreate,
                    TransitionReason::CreateFailed,
                    &e.reason(),
                )
                .await?;
            return Err(e);
        }
        Ok((vnf, auth))
    }

    /// Returns the record with its instance handle, or `None` if the driver
    /// returned no handle and the VNF was settled to `ERROR`.
    async fn create_invoke(
        self: &Arc<Self>,
        ctx: &RequestContext,
        vnf: &VnfRecord,
        auth: &VimAuth,
    ) -> Result<Option<VnfRecord>> {
        let driver = infra_driver_name(vnf)?;
        let args = infra_args(ctx, auth, vnf);
        let handle = match self
            .infra
            .invoke(driver, ops::CREATE, |d| async move { d.create(args, vnf).await })
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(vnf_id = %vnf.id, error = %e, "infra create failed, rolling back");
                self.tracker
                    .resolve_error(
                        &vnf.id,
                        VnfStatus::PendingCreate,
                        TransitionReason::CreateFailed,
                        &e.reason(),
                    )
                    .await?;
                if let Err(rollback) = self.delete_vnf(ctx, &vnf.id).await {
                    tracing::warn!(vnf_id = %vnf.id, error = %rollback, "compensating delete failed");
                }
                return Err(e);
            }
        };

        let Some(instance_id) = handle else {
            tracing::warn!(vnf_id = %vnf.id, "{NO_INSTANCE_HANDLE}");
            self.tracker
                .resolve_error(
                    &vnf.id,
                    VnfStatus::PendingCreate,
                    TransitionReason::CreateFailed,
                    NO_INSTANCE_HANDLE,
                )
                .await?;
            return Ok(None);
        };

        let started = self
            .tracker
            .patch(&vnf.id, &RecordPatch::new().instance_id(instance_id))
            .await?;
        tracing::debug!(vnf_id = %vnf.id, instance_id = ?started.instance_id, "instance handle recorded");
        Ok(Some(started))
    }

    /// Waits for the instance, runs the post hooks and settles the status.
    /// Returns the settled record.
    async fn create_wait_phase(
        &self,
        ctx: &RequestContext,
        mut vnf: VnfRecord,
        auth: &VimAuth,
    ) -> Result<VnfRecord> {
        let driver = infra_driver_name(&vnf)?.to_string();
        let instance_id = vnf.instance_id.clone().unwrap_or_default();
        let waited = {
            let record = &vnf;
            let args = infra_args(ctx, auth, record);
            let instance_id = instance_id.as_str();
            self.infra
                .invoke(&driver, ops::CREATE_WAIT, |d| async move {
                    d.create_wait(args, record, instance_id).await
                })
                .await
        };

        let mut failed = false;
        match waited {
            Ok(mgmt_url) => {
                if mgmt_url.is_some() {
                    vnf.mgmt_url = mgmt_url;
                }
            }
            Err(e) => {
                if e.is_create_wait_failed() {
                    tracing::error!(vnf_id = %vnf.id, %instance_id, error = %e, "VNF never became ready");
                } else {
                    tracing::error!(vnf_id = %vnf.id, %instance_id, error = %e, "create wait raised");
                }
                self.tracker
                    .resolve_error(
                        &vnf.id,
                        VnfStatus::PendingCreate,
                        TransitionReason::CreateFailed,
                        &e.reason(),
                    )
                    .await?;
                failed = true;
            }
        }

        if !failed && vnf.mgmt_url.is_none() {
            match self.mgmt.mgmt_url(ctx, &vnf).await {
                Ok(url) => vnf.mgmt_url = url,
                Err(e) => tracing::warn!(vnf_id = %vnf.id, error = %e, "mgmt_url lookup failed"),
            }
        }

        if let Err(e) = self.mgmt.create_post(ctx, &vnf).await {
            tracing::error!(vnf_id = %vnf.id, error = %e, "mgmt_create_post failed");
            if !failed {
                self.tracker
                    .resolve_error(
                        &vnf.id,
                        VnfStatus::PendingCreate,
                        TransitionReason::ConfigureFailed,
                        &e.reason(),
                    )
                    .await?;
                failed = true;
            }
        }

        if !failed {
            if let Err(e) = self.mgmt.call(ctx, MgmtAction::CreateVnf, &vnf).await {
                tracing::error!(vnf_id = %vnf.id, error = %e, "{CONFIGURE_FAILED}");
                self.tracker
                    .resolve_error(
                        &vnf.id,
                        VnfStatus::PendingCreate,
                        TransitionReason::ConfigureFailed,
                        CONFIGURE_FAILED,
                    )
                    .await?;
            } else {
                let patch = RecordPatch::new().mgmt_url(vnf.mgmt_url.clone());
                let outcome = self
                    .tracker
                    .transition(
                        &vnf.id,
                        &[VnfStatus::PendingCreate],
                        VnfStatus::Active,
                        TransitionReason::CreateCompleted,
                        &patch,
                    )
                    .await?;
                if let TransitionOutcome::Rejected { actual } = outcome {
                    tracing::warn!(vnf_id = %vnf.id, %actual, "VNF left PENDING_CREATE before create settled");
                }
            }
        }

        self.tracker.fetch(&vnf.id).await
    }
}
