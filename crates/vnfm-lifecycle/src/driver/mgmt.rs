//! Management driver contract.

use async_trait::async_trait;

use super::DriverError;
use crate::context::RequestContext;
use crate::mgmt::{MgmtAction, MgmtHook};
use crate::vnf::VnfRecord;

/// A backend that configures and is notified about running VNFs.
///
/// Hooks default to no-ops so drivers implement only the phases they care
/// about.
#[async_trait]
pub trait MgmtDriver: Send + Sync {
    /// Runs at one of the fixed lifecycle hook points.
    async fn hook(
        &self,
        _context: &RequestContext,
        _hook: MgmtHook,
        _vnf: &VnfRecord,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    /// Returns configuration the driver wants applied to the VNF.
    async fn get_config(
        &self,
        _context: &RequestContext,
        _vnf: &VnfRecord,
    ) -> Result<Option<String>, DriverError> {
        Ok(None)
    }

    /// Returns the management URL the driver derives for the VNF.
    async fn mgmt_url(
        &self,
        _context: &RequestContext,
        vnf: &VnfRecord,
    ) -> Result<Option<String>, DriverError> {
        Ok(vnf.mgmt_url.clone())
    }

    /// Pushes a structured notification about the VNF.
    async fn call(
        &self,
        context: &RequestContext,
        action: MgmtAction,
        vnf: &VnfRecord,
    ) -> Result<(), DriverError>;
}
