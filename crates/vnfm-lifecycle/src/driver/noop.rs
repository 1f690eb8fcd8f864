//! Drivers that accept every call without touching a backend.
//!
//! Enabled by default so that a fresh deployment can exercise the lifecycle
//! end to end.

use async_trait::async_trait;
use ulid::Ulid;

use super::{DriverError, InfraArgs, InfraDriver, MgmtDriver};
use crate::context::RequestContext;
use crate::mgmt::MgmtAction;
use crate::policy::ScalingPolicy;
use crate::vnf::VnfRecord;

/// Infrastructure driver that provisions nothing.
///
/// `create` returns a fresh handle so the wait phase runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInfraDriver;

impl NoopInfraDriver {
    /// Creates the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InfraDriver for NoopInfraDriver {
    async fn create(
        &self,
        _args: InfraArgs<'_>,
        vnf: &VnfRecord,
    ) -> Result<Option<String>, DriverError> {
        let handle = format!("noop-{}", Ulid::new());
        tracing::debug!(vnf_id = %vnf.id, instance_id = %handle, "noop create");
        Ok(Some(handle))
    }

    async fn create_wait(
        &self,
        _args: InfraArgs<'_>,
        _vnf: &VnfRecord,
        _instance_id: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(None)
    }

    async fn update(
        &self,
        _args: InfraArgs<'_>,
        _vnf: &VnfRecord,
        _instance_id: Option<&str>,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn update_wait(
        &self,
        _args: InfraArgs<'_>,
        _vnf: &VnfRecord,
        _instance_id: Option<&str>,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn delete(&self, _args: InfraArgs<'_>, _instance_id: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn delete_wait(
        &self,
        _args: InfraArgs<'_>,
        _instance_id: &str,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scale(&self, _args: InfraArgs<'_>, _policy: &ScalingPolicy) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scale_wait(
        &self,
        _args: InfraArgs<'_>,
        _policy: &ScalingPolicy,
    ) -> Result<Option<String>, DriverError> {
        Ok(None)
    }
}

/// Management driver that ignores every hook and notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMgmtDriver;

#[async_trait]
impl MgmtDriver for NoopMgmtDriver {
    async fn call(
        &self,
        _context: &RequestContext,
        action: MgmtAction,
        vnf: &VnfRecord,
    ) -> Result<(), DriverError> {
        tracing::debug!(vnf_id = %vnf.id, %action, "noop mgmt call");
        Ok(())
    }
}
