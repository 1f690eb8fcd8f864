//! Error types for the lifecycle domain.
//!
//! Errors fall into four classes:
//!
//! - **Validation**: rejected before any record is created or mutated
//! - **Not found**: the referenced VNF, descriptor, policy or VIM is absent
//! - **Conflict**: a guarded transition lost because the VNF has moved on
//! - **Driver**: a backend raised; see [`DriverError`]

use vnfm_core::{VnfId, VnfdId};

use crate::driver::{DriverError, DriverKind};
use crate::status::VnfStatus;

/// The result type used throughout vnfm-lifecycle.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A VNF was not found.
    #[error("VNF not found: {vnf_id}")]
    VnfNotFound {
        /// The VNF ID that was not found.
        vnf_id: VnfId,
    },

    /// A VNF descriptor was not found.
    #[error("VNFD not found: {vnfd_id}")]
    VnfdNotFound {
        /// The descriptor ID that was not found.
        vnfd_id: VnfdId,
    },

    /// A driver name is not among the configured drivers of a registry.
    #[error("unknown {kind} driver '{driver}' (available: {available:?})")]
    UnknownDriver {
        /// Which registry was consulted.
        kind: DriverKind,
        /// The requested driver name.
        driver: String,
        /// Names configured in the registry.
        available: Vec<String>,
    },

    /// A driver was enabled in configuration but never registered.
    #[error("{kind} driver '{driver}' is enabled but no implementation is registered")]
    DriverNotAvailable {
        /// Which registry was being built.
        kind: DriverKind,
        /// The enabled driver name.
        driver: String,
    },

    /// The descriptor does not name an infrastructure driver.
    #[error("infra driver is not specified in the VNFD")]
    InfraDriverNotSpecified,

    /// The descriptor names an infrastructure driver that is not enabled.
    #[error("invalid infra driver '{driver}' (valid: {valid:?})")]
    InvalidInfraDriver {
        /// The descriptor's driver name.
        driver: String,
        /// Enabled infrastructure drivers.
        valid: Vec<String>,
    },

    /// The descriptor names a management driver that is not enabled.
    #[error("invalid mgmt driver '{driver}' (valid: {valid:?})")]
    InvalidMgmtDriver {
        /// The descriptor's driver name.
        driver: String,
        /// Enabled management drivers.
        valid: Vec<String>,
    },

    /// The descriptor declares no service types.
    #[error("service types are not specified in the VNFD")]
    ServiceTypesNotSpecified,

    /// The target VIM could not be resolved.
    #[error("VIM not found: {vim_id}")]
    VimNotFound {
        /// The VIM ID (or `default`) that was requested.
        vim_id: String,
    },

    /// The target region is not served by the resolved VIM.
    #[error("region '{region}' not found for VIM {vim_id}")]
    VimRegionNotFound {
        /// The resolved VIM ID.
        vim_id: String,
        /// The requested region.
        region: String,
    },

    /// The named policy is not declared by the VNF's descriptor.
    #[error("policy '{policy}' not found for VNF {vnf_id}")]
    PolicyNotFound {
        /// The requested policy name.
        policy: String,
        /// The VNF that was searched.
        vnf_id: VnfId,
    },

    /// The policy's declared type has no action table entry.
    #[error("policy '{policy}' has invalid type '{policy_type}' (valid: {valid:?})")]
    InvalidPolicyType {
        /// The policy name.
        policy: String,
        /// The declared policy type.
        policy_type: String,
        /// Policy types with a known action table.
        valid: Vec<String>,
    },

    /// The requested action is not allowed for the policy's type.
    #[error("invalid action '{action}' for policy '{policy}' (valid: {valid:?})")]
    InvalidPolicyAction {
        /// The policy name.
        policy: String,
        /// The requested action.
        action: String,
        /// Actions allowed for the policy type.
        valid: Vec<String>,
    },

    /// The VNF's monitoring policy could not be interpreted.
    #[error("invalid monitoring policy for VNF {vnf_id}: {message}")]
    InvalidMonitoringPolicy {
        /// The VNF whose policy is malformed.
        vnf_id: VnfId,
        /// Description of the problem.
        message: String,
    },

    /// A guarded transition lost: the VNF is not in any expected status.
    #[error("VNF {vnf_id} is {actual}, expected one of {expected:?}")]
    Conflict {
        /// The VNF whose guard failed.
        vnf_id: VnfId,
        /// The statuses the operation required.
        expected: Vec<VnfStatus>,
        /// The status observed at the persistence boundary.
        actual: VnfStatus,
    },

    /// A transition is not an edge of the status state machine.
    #[error("invalid status transition: {from} -> {to} ({reason})")]
    InvalidStatusTransition {
        /// The current status.
        from: VnfStatus,
        /// The attempted target status.
        to: VnfStatus,
        /// Why the transition is invalid.
        reason: String,
    },

    /// The VNF already carries an instance handle.
    #[error("VNF {vnf_id} already has instance '{instance_id}'")]
    InstanceAlreadyAssigned {
        /// The VNF.
        vnf_id: VnfId,
        /// The handle already recorded.
        instance_id: String,
    },

    /// A backend driver raised.
    #[error("{kind} driver '{driver}' failed in {operation}: {source}")]
    Driver {
        /// Which registry dispatched the call.
        kind: DriverKind,
        /// The driver name.
        driver: String,
        /// The operation that was invoked.
        operation: &'static str,
        /// The backend failure.
        #[source]
        source: DriverError,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A configuration value was missing or malformed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An error from vnfm-core.
    #[error("core error: {0}")]
    Core(#[from] vnfm_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true for errors raised before any state was touched.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownDriver { .. }
                | Self::InfraDriverNotSpecified
                | Self::InvalidInfraDriver { .. }
                | Self::InvalidMgmtDriver { .. }
                | Self::ServiceTypesNotSpecified
                | Self::PolicyNotFound { .. }
                | Self::InvalidPolicyType { .. }
                | Self::InvalidPolicyAction { .. }
                | Self::InvalidMonitoringPolicy { .. }
        )
    }

    /// Returns true when a guarded transition lost.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true when a referenced resource is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::VnfNotFound { .. }
                | Self::VnfdNotFound { .. }
                | Self::VimNotFound { .. }
                | Self::VimRegionNotFound { .. }
                | Self::PolicyNotFound { .. }
                | Self::Core(vnfm_core::Error::ResourceNotFound { .. })
        )
    }

    /// Returns the backend failure if this error wraps one.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true when a backend reported that a create never became ready.
    #[must_use]
    pub fn is_create_wait_failed(&self) -> bool {
        matches!(self.driver_error(), Some(DriverError::CreateWaitFailed { .. }))
    }

    /// Returns the text recorded as a VNF's error reason.
    ///
    /// Backend failures are recorded with the backend's own message.
    #[must_use]
    pub fn reason(&self) -> String {
        self.driver_error()
            .map_or_else(|| self.to_string(), ToString::to_string)
    }
}
