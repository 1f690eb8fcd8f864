//! Management hook dispatch.
//!
//! Each orchestrator phase calls a specific hook on [`MgmtDispatcher`]; the
//! dispatcher resolves the management driver named by the VNF's descriptor and
//! invokes it through the management [`DriverRegistry`]. A descriptor without
//! a management driver skips every hook.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::driver::{DriverRegistry, MgmtDriver};
use crate::error::Result;
use crate::vnf::VnfRecord;

/// The fixed lifecycle hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MgmtHook {
    /// Before the infra create call.
    CreatePre,
    /// After the create wait phase.
    CreatePost,
    /// Before the infra update call.
    UpdatePre,
    /// After the update settles or fails.
    UpdatePost,
    /// Before the infra delete call.
    DeletePre,
    /// After teardown settles or fails.
    DeletePost,
}

impl MgmtHook {
    /// Returns the hook name used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreatePre => "mgmt_create_pre",
            Self::CreatePost => "mgmt_create_post",
            Self::UpdatePre => "mgmt_update_pre",
            Self::UpdatePost => "mgmt_update_post",
            Self::DeletePre => "mgmt_delete_pre",
            Self::DeletePost => "mgmt_delete_post",
        }
    }
}

impl fmt::Display for MgmtHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured notifications pushed through `mgmt_call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MgmtAction {
    /// The VNF finished booting.
    CreateVnf,
    /// The VNF's update settled.
    UpdateVnf,
    /// The VNF is being torn down.
    DeleteVnf,
}

impl MgmtAction {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateVnf => "CREATE_VNF",
            Self::UpdateVnf => "UPDATE_VNF",
            Self::DeleteVnf => "DELETE_VNF",
        }
    }
}

impl fmt::Display for MgmtAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatches management hooks to the driver named by each VNF's descriptor.
#[derive(Debug, Clone)]
pub struct MgmtDispatcher {
    registry: DriverRegistry<dyn MgmtDriver>,
}

impl MgmtDispatcher {
    /// Creates a dispatcher over a management registry.
    #[must_use]
    pub const fn new(registry: DriverRegistry<dyn MgmtDriver>) -> Self {
        Self { registry }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &DriverRegistry<dyn MgmtDriver> {
        &self.registry
    }

    /// Runs `mgmt_create_pre`.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn create_pre(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<()> {
        self.hook(ctx, MgmtHook::CreatePre, vnf).await
    }

    /// Runs `mgmt_create_post`.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn create_post(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<()> {
        self.hook(ctx, MgmtHook::CreatePost, vnf).await
    }

    /// Runs `mgmt_update_pre`.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn update_pre(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<()> {
        self.hook(ctx, MgmtHook::UpdatePre, vnf).await
    }

    /// Runs `mgmt_update_post`.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn update_post(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<()> {
        self.hook(ctx, MgmtHook::UpdatePost, vnf).await
    }

    /// Runs `mgmt_delete_pre`.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn delete_pre(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<()> {
        self.hook(ctx, MgmtHook::DeletePre, vnf).await
    }

    /// Runs `mgmt_delete_post`.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn delete_post(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<()> {
        self.hook(ctx, MgmtHook::DeletePost, vnf).await
    }

    /// Runs a hook on the VNF's management driver.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDriver` if the descriptor's driver is not configured,
    /// or the driver's failure.
    pub async fn hook(&self, ctx: &RequestContext, hook: MgmtHook, vnf: &VnfRecord) -> Result<()> {
        let Some(name) = vnf.vnfd.mgmt_driver.as_deref() else {
            tracing::trace!(vnf_id = %vnf.id, %hook, "no mgmt driver, hook skipped");
            return Ok(());
        };
        self.registry
            .invoke(name, hook.as_str(), |d| async move { d.hook(ctx, hook, vnf).await })
            .await
    }

    /// Asks the management driver for configuration to apply.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn get_config(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<Option<String>> {
        let Some(name) = vnf.vnfd.mgmt_driver.as_deref() else {
            return Ok(None);
        };
        self.registry
            .invoke(name, "mgmt_get_config", |d| async move {
                d.get_config(ctx, vnf).await
            })
            .await
    }

    /// Asks the management driver for the VNF's management URL.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn mgmt_url(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<Option<String>> {
        let Some(name) = vnf.vnfd.mgmt_driver.as_deref() else {
            return Ok(vnf.mgmt_url.clone());
        };
        self.registry
            .invoke(name, "mgmt_url", |d| async move { d.mgmt_url(ctx, vnf).await })
            .await
    }

    /// Pushes a structured notification to the management driver.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure.
    pub async fn call(&self, ctx: &RequestContext, action: MgmtAction, vnf: &VnfRecord) -> Result<()> {
        let Some(name) = vnf.vnfd.mgmt_driver.as_deref() else {
            return Ok(());
        };
        tracing::debug!(vnf_id = %vnf.id, %action, driver = name, "mgmt call");
        self.registry
            .invoke(name, "mgmt_call", |d| async move { d.call(ctx, action, vnf).await })
            .await
    }
}
