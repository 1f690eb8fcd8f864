//! Infrastructure driver contract.

use async_trait::async_trait;

use super::DriverError;
use crate::context::RequestContext;
use crate::policy::ScalingPolicy;
use crate::vim::VimAuth;
use crate::vnf::VnfRecord;

/// Arguments every infrastructure call receives.
#[derive(Debug, Clone, Copy)]
pub struct InfraArgs<'a> {
    /// Caller identity.
    pub context: &'a RequestContext,
    /// Resolved VIM credentials.
    pub auth: &'a VimAuth,
    /// Target region, if any.
    pub region_name: Option<&'a str>,
}

/// A backend that provisions the compute resources behind a VNF.
///
/// Each mutating call has a matching `*_wait` call. The orchestrator invokes
/// the mutating call on the caller's path and the wait call from a background
/// continuation.
#[async_trait]
pub trait InfraDriver: Send + Sync {
    /// Starts provisioning. Returns the backend instance handle, or `None`
    /// for backends without an instance concept.
    async fn create(
        &self,
        args: InfraArgs<'_>,
        vnf: &VnfRecord,
    ) -> Result<Option<String>, DriverError>;

    /// Waits for the instance to become ready. Returns the management URL.
    ///
    /// Reports [`DriverError::CreateWaitFailed`] if the instance never
    /// became ready.
    async fn create_wait(
        &self,
        args: InfraArgs<'_>,
        vnf: &VnfRecord,
        instance_id: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Starts an update. `vnf` carries the merged attributes.
    async fn update(
        &self,
        args: InfraArgs<'_>,
        vnf: &VnfRecord,
        instance_id: Option<&str>,
    ) -> Result<(), DriverError>;

    /// Waits for an update to settle.
    async fn update_wait(
        &self,
        args: InfraArgs<'_>,
        vnf: &VnfRecord,
        instance_id: Option<&str>,
    ) -> Result<(), DriverError>;

    /// Starts teardown.
    async fn delete(&self, args: InfraArgs<'_>, instance_id: &str) -> Result<(), DriverError>;

    /// Waits for teardown to finish.
    async fn delete_wait(
        &self,
        args: InfraArgs<'_>,
        instance_id: &str,
    ) -> Result<(), DriverError>;

    /// Starts a scale action described by `policy`.
    async fn scale(&self, args: InfraArgs<'_>, policy: &ScalingPolicy) -> Result<(), DriverError>;

    /// Waits for a scale action to settle. Returns the new management URL.
    async fn scale_wait(
        &self,
        args: InfraArgs<'_>,
        policy: &ScalingPolicy,
    ) -> Result<Option<String>, DriverError>;
}

/// Infrastructure operation names, as recorded in logs and metrics.
pub mod ops {
    /// `create`
    pub const CREATE: &str = "create";
    /// `create_wait`
    pub const CREATE_WAIT: &str = "create_wait";
    /// `update`
    pub const UPDATE: &str = "update";
    /// `update_wait`
    pub const UPDATE_WAIT: &str = "update_wait";
    /// `delete`
    pub const DELETE: &str = "delete";
    /// `delete_wait`
    pub const DELETE_WAIT: &str = "delete_wait";
    /// `scale`
    pub const SCALE: &str = "scale";
    /// `scale_wait`
    pub const SCALE_WAIT: &str = "scale_wait";
}
