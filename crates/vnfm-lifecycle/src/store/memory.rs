//! In-memory store implementation for testing.
//!
//! This module provides [`InMemoryStore`], a simple in-memory implementation of
//! the [`VnfStore`] trait suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability
//! - **Single-process only**: State is not shared across process boundaries

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vnfm_core::{VnfId, VnfdId};

use super::{CasResult, RecordPatch, VnfStore};
use crate::descriptor::Vnfd;
use crate::error::{Error, Result};
use crate::status::{TransitionReason, VnfStatus};
use crate::vnf::VnfRecord;

/// One applied status change, kept for auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// The VNF that changed.
    pub vnf_id: VnfId,
    /// Status before the change.
    pub from: VnfStatus,
    /// Status after the change.
    pub to: VnfStatus,
    /// Why it changed.
    pub reason: TransitionReason,
    /// True when the edge table was bypassed by `set_error_reason`.
    pub forced: bool,
    /// When it changed.
    pub at: DateTime<Utc>,
}

/// In-memory store for testing.
///
/// Thread-safe via `RwLock`. Every applied status change is appended to a
/// journal readable through [`InMemoryStore::transitions`].
///
/// ## Example
///
/// ```rust
/// use vnfm_lifecycle::store::memory::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// assert_eq!(store.vnf_count().unwrap(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    vnfds: RwLock<HashMap<VnfdId, Vnfd>>,
    vnfs: RwLock<HashMap<VnfId, VnfRecord>>,
    journal: RwLock<Vec<StatusChange>>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of VNFs currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn vnf_count(&self) -> Result<usize> {
        Ok(self.vnfs.read().map_err(poison_err)?.len())
    }

    /// Returns every status change applied to `vnf_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn transitions(&self, vnf_id: &VnfId) -> Result<Vec<StatusChange>> {
        let journal = self.journal.read().map_err(poison_err)?;
        Ok(journal
            .iter()
            .filter(|c| c.vnf_id == *vnf_id)
            .cloned()
            .collect())
    }

    /// Appends to the journal. Callers hold the VNF write lock so that the
    /// journal order matches the order changes were applied.
    fn record_change(&self, change: StatusChange) -> Result<()> {
        self.journal.write().map_err(poison_err)?.push(change);
        Ok(())
    }
}

#[async_trait]
impl VnfStore for InMemoryStore {
    async fn create_vnfd(&self, vnfd: &Vnfd) -> Result<()> {
        self.vnfds
            .write()
            .map_err(poison_err)?
            .insert(vnfd.id, vnfd.clone());
        Ok(())
    }

    async fn get_vnfd(&self, vnfd_id: &VnfdId) -> Result<Option<Vnfd>> {
        Ok(self.vnfds.read().map_err(poison_err)?.get(vnfd_id).cloned())
    }

    async fn list_vnfds(&self) -> Result<Vec<Vnfd>> {
        let mut vnfds: Vec<_> = self.vnfds.read().map_err(poison_err)?.values().cloned().collect();
        vnfds.sort_by_key(|v| v.id);
        Ok(vnfds)
    }

    async fn create_vnf(&self, record: &VnfRecord) -> Result<()> {
        let mut vnfs = self.vnfs.write().map_err(poison_err)?;
        if vnfs.contains_key(&record.id) {
            return Err(Error::storage(format!("VNF {} already exists", record.id)));
        }
        vnfs.insert(record.id, record.clone());
        Ok(())
    }

    async fn fetch(&self, vnf_id: &VnfId) -> Result<Option<VnfRecord>> {
        Ok(self.vnfs.read().map_err(poison_err)?.get(vnf_id).cloned())
    }

    async fn list_vnfs(&self) -> Result<Vec<VnfRecord>> {
        let mut vnfs: Vec<_> = self.vnfs.read().map_err(poison_err)?.values().cloned().collect();
        vnfs.sort_by_key(|v| v.id);
        Ok(vnfs)
    }

    async fn cas_status(
        &self,
        vnf_id: &VnfId,
        expected: &[VnfStatus],
        target: VnfStatus,
        reason: TransitionReason,
        patch: &RecordPatch,
    ) -> Result<CasResult> {
        let mut vnfs = self.vnfs.write().map_err(poison_err)?;
        let Some(record) = vnfs.get_mut(vnf_id) else {
            return Ok(CasResult::NotFound);
        };
        if !expected.contains(&record.status) {
            return Ok(CasResult::StateMismatch {
                actual: record.status,
            });
        }

        let mut updated = record.clone();
        patch.apply(&mut updated)?;
        updated.transition_to(target, reason)?;
        let previous = std::mem::replace(record, updated);
        self.record_change(StatusChange {
            vnf_id: *vnf_id,
            from: previous.status,
            to: target,
            reason,
            forced: false,
            at: record.updated_at,
        })?;
        drop(vnfs);
        Ok(CasResult::Success {
            previous: Box::new(previous),
        })
    }

    async fn patch(&self, vnf_id: &VnfId, patch: &RecordPatch) -> Result<Option<VnfRecord>> {
        let mut vnfs = self.vnfs.write().map_err(poison_err)?;
        let Some(record) = vnfs.get_mut(vnf_id) else {
            return Ok(None);
        };
        let mut updated = record.clone();
        patch.apply(&mut updated)?;
        updated.updated_at = Utc::now();
        *record = updated.clone();
        Ok(Some(updated))
    }

    async fn set_error_reason(&self, vnf_id: &VnfId, reason: &str) -> Result<Option<VnfRecord>> {
        let mut vnfs = self.vnfs.write().map_err(poison_err)?;
        let Some(record) = vnfs.get_mut(vnf_id) else {
            return Ok(None);
        };
        let mut updated = record.clone();
        updated.force_error(reason)?;
        let previous = std::mem::replace(record, updated);
        self.record_change(StatusChange {
            vnf_id: *vnf_id,
            from: previous.status,
            to: VnfStatus::Error,
            reason: TransitionReason::ErrorForced,
            forced: true,
            at: record.updated_at,
        })?;
        drop(vnfs);
        Ok(Some(previous))
    }

    async fn delete_vnf(&self, vnf_id: &VnfId) -> Result<bool> {
        Ok(self.vnfs.write().map_err(poison_err)?.remove(vnf_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn stored_vnf(store: &InMemoryStore) -> Result<VnfRecord> {
        let record = VnfRecord::new("vnf", "tenant", Vnfd::new("vnfd"));
        store.create_vnf(&record).await?;
        Ok(record)
    }

    #[tokio::test]
    async fn create_and_fetch_vnf() -> Result<()> {
        let store = InMemoryStore::new();
        let record = stored_vnf(&store).await?;

        let fetched = store.fetch(&record.id).await?;
        assert_eq!(fetched.map(|r| r.id), Some(record.id));
        assert_eq!(store.vnf_count()?, 1);

        let err = store.create_vnf(&record).await.unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn cas_status_success_applies_patch() -> Result<()> {
        let store = InMemoryStore::new();
        let record = stored_vnf(&store).await?;

        let result = store
            .cas_status(
                &record.id,
                &[VnfStatus::PendingCreate],
                VnfStatus::Active,
                TransitionReason::CreateCompleted,
                &RecordPatch::new().mgmt_url(Some("{}".into())),
            )
            .await?;
        assert!(result.is_success());

        let updated = store.fetch(&record.id).await?.expect("record");
        assert_eq!(updated.status, VnfStatus::Active);
        assert_eq!(updated.mgmt_url.as_deref(), Some("{}"));

        let journal = store.transitions(&record.id)?;
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].from, VnfStatus::PendingCreate);
        assert_eq!(journal[0].to, VnfStatus::Active);
        assert!(!journal[0].forced);
        Ok(())
    }

    #[tokio::test]
    async fn cas_status_mismatch_does_not_mutate() -> Result<()> {
        let store = InMemoryStore::new();
        let record = stored_vnf(&store).await?;

        let result = store
            .cas_status(
                &record.id,
                &[VnfStatus::Active],
                VnfStatus::PendingUpdate,
                TransitionReason::UpdateRequested,
                &RecordPatch::new().error_reason("should not land"),
            )
            .await?;
        assert_eq!(
            result,
            CasResult::StateMismatch {
                actual: VnfStatus::PendingCreate
            }
        );

        let unchanged = store.fetch(&record.id).await?.expect("record");
        assert_eq!(unchanged, record);
        assert!(store.transitions(&record.id)?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn cas_status_rejects_invalid_edge() -> Result<()> {
        let store = InMemoryStore::new();
        let record = stored_vnf(&store).await?;

        let err = store
            .cas_status(
                &record.id,
                &[VnfStatus::PendingCreate],
                VnfStatus::PendingDelete,
                TransitionReason::DeleteRequested,
                &RecordPatch::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStatusTransition { .. }));
        assert_eq!(
            store.fetch(&record.id).await?.map(|r| r.status),
            Some(VnfStatus::PendingCreate)
        );
        Ok(())
    }

    #[tokio::test]
    async fn cas_status_not_found() -> Result<()> {
        let store = InMemoryStore::new();
        let result = store
            .cas_status(
                &VnfId::generate(),
                &[VnfStatus::Active],
                VnfStatus::Dead,
                TransitionReason::DeleteCompleted,
                &RecordPatch::new(),
            )
            .await?;
        assert!(result.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn set_error_reason_is_unconditional() -> Result<()> {
        let store = InMemoryStore::new();
        let record = stored_vnf(&store).await?;

        let previous = store.set_error_reason(&record.id, "backend exploded").await?;
        assert_eq!(previous.map(|r| r.status), Some(VnfStatus::PendingCreate));

        let updated = store.fetch(&record.id).await?.expect("record");
        assert_eq!(updated.status, VnfStatus::Error);
        assert_eq!(updated.error_reason.as_deref(), Some("backend exploded"));
        assert!(store.transitions(&record.id)?[0].forced);
        Ok(())
    }

    #[tokio::test]
    async fn mark_dead_carries_error() -> Result<()> {
        let store = InMemoryStore::new();
        let record = stored_vnf(&store).await?;
        store
            .cas_status(
                &record.id,
                &[VnfStatus::PendingCreate],
                VnfStatus::Active,
                TransitionReason::CreateCompleted,
                &RecordPatch::new(),
            )
            .await?;

        let result = store
            .mark_dead(
                &record.id,
                TransitionReason::DeleteFailed,
                Some("delete_wait timed out".into()),
            )
            .await?;
        assert!(result.is_success());

        let dead = store.fetch(&record.id).await?.expect("record");
        assert_eq!(dead.status, VnfStatus::Dead);
        assert_eq!(dead.error_reason.as_deref(), Some("delete_wait timed out"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_record() -> Result<()> {
        let store = InMemoryStore::new();
        let record = stored_vnf(&store).await?;
        assert!(store.delete_vnf(&record.id).await?);
        assert!(!store.delete_vnf(&record.id).await?);
        assert!(store.fetch(&record.id).await?.is_none());
        Ok(())
    }
}
