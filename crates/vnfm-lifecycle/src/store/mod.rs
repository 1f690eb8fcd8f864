//! Pluggable persistence for VNF and VNFD records.
//!
//! The store is the source of truth for VNF status. Status changes go through
//! [`VnfStore::cas_status`], a compare-and-swap on the status field, so that
//! two phases can never both complete a transition meant to happen once.
//!
//! ## Design Principles
//!
//! - **CAS semantics**: status transitions are conditional updates
//! - **Field updates ride along**: instance handle, management URL and
//!   placement are written in the same step as the transition they accompany
//! - **Testability**: [`memory::InMemoryStore`] for tests and development

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

use vnfm_core::{VnfId, VnfdId};

use crate::descriptor::Vnfd;
use crate::error::Result;
use crate::status::{TransitionReason, VnfStatus};
use crate::vnf::VnfRecord;

/// Result of a compare-and-swap operation.
#[derive(Debug, Clone, PartialEq)]
pub enum CasResult {
    /// Transition applied.
    Success {
        /// The record as it was before the transition.
        previous: Box<VnfRecord>,
    },
    /// Record not found.
    NotFound,
    /// Current status was not in the expected set.
    StateMismatch {
        /// The status that was found.
        actual: VnfStatus,
    },
}

impl CasResult {
    /// Returns true if the transition was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns true if the record was not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Field updates that accompany a phase.
///
/// Empty fields are left untouched; attributes are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// Backend instance handle.
    pub instance_id: Option<String>,
    /// Management URL.
    pub mgmt_url: Option<String>,
    /// Resolved VIM ID.
    pub vim_id: Option<String>,
    /// Resolved VIM name, stored in placement.
    pub vim_name: Option<String>,
    /// Attributes to merge.
    pub attributes: BTreeMap<String, String>,
    /// Failure to record.
    pub error_reason: Option<String>,
}

impl RecordPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance handle.
    #[must_use]
    pub fn instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Sets the management URL.
    #[must_use]
    pub fn mgmt_url(mut self, mgmt_url: Option<String>) -> Self {
        self.mgmt_url = mgmt_url;
        self
    }

    /// Sets the resolved VIM.
    #[must_use]
    pub fn vim(mut self, vim_id: impl Into<String>, vim_name: impl Into<String>) -> Self {
        self.vim_id = Some(vim_id.into());
        self.vim_name = Some(vim_name.into());
        self
    }

    /// Merges attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Records a failure.
    #[must_use]
    pub fn error_reason(mut self, reason: impl Into<String>) -> Self {
        self.error_reason = Some(reason.into());
        self
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch to a record.
    ///
    /// # Errors
    ///
    /// Returns `InstanceAlreadyAssigned` if the patch carries a different
    /// instance handle than the one recorded.
    pub fn apply(&self, record: &mut VnfRecord) -> Result<()> {
        if let Some(instance_id) = &self.instance_id {
            record.assign_instance_id(instance_id.clone())?;
        }
        if let Some(mgmt_url) = &self.mgmt_url {
            record.mgmt_url = Some(mgmt_url.clone());
        }
        if let Some(vim_id) = &self.vim_id {
            record.vim_id = Some(vim_id.clone());
        }
        if let Some(vim_name) = &self.vim_name {
            record.placement_attr.vim_name = Some(vim_name.clone());
        }
        record
            .attributes
            .extend(self.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(reason) = &self.error_reason {
            record.error_reason = Some(reason.clone());
        }
        Ok(())
    }
}

/// Storage abstraction for VNF and VNFD records.
///
/// ## CAS Semantics
///
/// `cas_status` applies a transition only if the record's current status is
/// in `expected`, and never mutates the record otherwise. Implementations must
/// also reject targets that are not edges of the status state machine.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` so the store can be shared by the
/// orchestrator and every background continuation.
#[async_trait]
pub trait VnfStore: Send + Sync {
    // --- Descriptor Operations ---

    /// Persists a descriptor.
    async fn create_vnfd(&self, vnfd: &Vnfd) -> Result<()>;

    /// Gets a descriptor by ID.
    async fn get_vnfd(&self, vnfd_id: &VnfdId) -> Result<Option<Vnfd>>;

    /// Lists all descriptors.
    async fn list_vnfds(&self) -> Result<Vec<Vnfd>>;

    // --- VNF Operations ---

    /// Persists a new VNF record.
    async fn create_vnf(&self, record: &VnfRecord) -> Result<()>;

    /// Gets a VNF record by ID.
    async fn fetch(&self, vnf_id: &VnfId) -> Result<Option<VnfRecord>>;

    /// Lists all VNF records.
    async fn list_vnfs(&self) -> Result<Vec<VnfRecord>>;

    /// Atomically transitions status if the current status is in `expected`,
    /// applying `patch` in the same step.
    ///
    /// # Returns
    ///
    /// - `CasResult::Success` with the previous record if applied
    /// - `CasResult::NotFound` if the VNF does not exist
    /// - `CasResult::StateMismatch` if the current status is not expected
    async fn cas_status(
        &self,
        vnf_id: &VnfId,
        expected: &[VnfStatus],
        target: VnfStatus,
        reason: TransitionReason,
        patch: &RecordPatch,
    ) -> Result<CasResult>;

    /// Applies field updates without changing status.
    ///
    /// Returns the updated record, or `None` if the VNF does not exist.
    async fn patch(&self, vnf_id: &VnfId, patch: &RecordPatch) -> Result<Option<VnfRecord>>;

    /// Sets status to `ERROR` with `reason`, whatever the current status.
    ///
    /// Returns the previous record, or `None` if the VNF does not exist.
    async fn set_error_reason(&self, vnf_id: &VnfId, reason: &str) -> Result<Option<VnfRecord>>;

    /// Removes a VNF record. Returns false if it did not exist.
    async fn delete_vnf(&self, vnf_id: &VnfId) -> Result<bool>;

    /// Retires a VNF, recording `error_reason` if given.
    async fn mark_dead(
        &self,
        vnf_id: &VnfId,
        reason: TransitionReason,
        error_reason: Option<String>,
    ) -> Result<CasResult> {
        let patch = RecordPatch {
            error_reason,
            ..RecordPatch::default()
        };
        self.cas_status(
            vnf_id,
            &[VnfStatus::Active, VnfStatus::PendingDelete],
            VnfStatus::Dead,
            reason,
            &patch,
        )
        .await
    }
}
