//! Guarded status transitions over a [`VnfStore`].
//!
//! The tracker is the only writer of VNF status. It turns store-level
//! [`CasResult`]s into domain outcomes, counts applied transitions and guard
//! failures, and implements the forced-error path used when an operation
//! fails unrecoverably.

use std::sync::Arc;

use vnfm_core::VnfId;

use crate::error::{Error, Result};
use crate::metrics::LifecycleMetrics;
use crate::status::{TransitionReason, VnfStatus};
use crate::store::{CasResult, RecordPatch, VnfStore};
use crate::vnf::VnfRecord;

/// Outcome of a guarded transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Applied; carries the record as it was before.
    Applied {
        /// The record before the transition.
        previous: Box<VnfRecord>,
    },
    /// The guard failed; nothing was mutated.
    Rejected {
        /// The status found.
        actual: VnfStatus,
    },
}

impl TransitionOutcome {
    /// Returns true if the transition was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Applies guarded and forced status transitions.
#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn VnfStore>,
    metrics: LifecycleMetrics,
}

impl std::fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTracker").finish_non_exhaustive()
    }
}

impl StatusTracker {
    /// Creates a tracker over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn VnfStore>, metrics: LifecycleMetrics) -> Self {
        Self { store, metrics }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn VnfStore> {
        &self.store
    }

    /// Transitions `vnf_id` to `target` if its status is in `expected`,
    /// applying `patch` in the same step.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the record is absent, or
    /// `InvalidStatusTransition` if `target` is not an edge from the current
    /// status.
    pub async fn transition(
        &self,
        vnf_id: &VnfId,
        expected: &[VnfStatus],
        target: VnfStatus,
        reason: TransitionReason,
        patch: &RecordPatch,
    ) -> Result<TransitionOutcome> {
        match self
            .store
            .cas_status(vnf_id, expected, target, reason, patch)
            .await?
        {
            CasResult::Success { previous } => {
                self.metrics
                    .record_transition(previous.status.as_label(), target.as_label());
                tracing::info!(%vnf_id, from = %previous.status, to = %target, %reason, "status transition");
                Ok(TransitionOutcome::Applied { previous })
            }
            CasResult::StateMismatch { actual } => {
                self.metrics
                    .record_guard_failure(target.as_label(), actual.as_label());
                tracing::debug!(%vnf_id, %actual, ?expected, %target, "transition guard failed");
                Ok(TransitionOutcome::Rejected { actual })
            }
            CasResult::NotFound => Err(Error::VnfNotFound { vnf_id: *vnf_id }),
        }
    }

    /// Like [`transition`](Self::transition), but a failed guard is an error.
    ///
    /// Returns the record as it was before the transition.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the status is not in `expected`.
    pub async fn require(
        &self,
        vnf_id: &VnfId,
        expected: &[VnfStatus],
        target: VnfStatus,
        reason: TransitionReason,
        patch: &RecordPatch,
    ) -> Result<VnfRecord> {
        match self
            .transition(vnf_id, expected, target, reason, patch)
            .await?
        {
            TransitionOutcome::Applied { previous } => Ok(*previous),
            TransitionOutcome::Rejected { actual } => Err(Error::Conflict {
                vnf_id: *vnf_id,
                expected: expected.to_vec(),
                actual,
            }),
        }
    }

    /// Forces `ERROR` with `reason`, bypassing the guard.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the record is absent, or
    /// `InvalidStatusTransition` if it is already `DEAD`.
    pub async fn set_error_reason(&self, vnf_id: &VnfId, reason: &str) -> Result<VnfRecord> {
        let previous = self
            .store
            .set_error_reason(vnf_id, reason)
            .await?
            .ok_or(Error::VnfNotFound { vnf_id: *vnf_id })?;
        self.metrics
            .record_transition(previous.status.as_label(), VnfStatus::Error.as_label());
        tracing::warn!(%vnf_id, from = %previous.status, %reason, "status forced to ERROR");
        Ok(previous)
    }

    /// Resolves a pending status to `ERROR` with `message`.
    ///
    /// Tries the guarded `pending → ERROR` edge first; if the VNF has left
    /// `pending` the error is forced instead.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the record is absent.
    pub async fn resolve_error(
        &self,
        vnf_id: &VnfId,
        pending: VnfStatus,
        reason: TransitionReason,
        message: &str,
    ) -> Result<()> {
        let patch = RecordPatch::new().error_reason(message);
        let outcome = self
            .transition(vnf_id, &[pending], VnfStatus::Error, reason, &patch)
            .await?;
        if !outcome.is_applied() {
            self.set_error_reason(vnf_id, message).await?;
        }
        Ok(())
    }

    /// Applies field updates that accompany a phase without changing status.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the record is absent.
    pub async fn patch(&self, vnf_id: &VnfId, patch: &RecordPatch) -> Result<VnfRecord> {
        self.store
            .patch(vnf_id, patch)
            .await?
            .ok_or(Error::VnfNotFound { vnf_id: *vnf_id })
    }

    /// Moves an active or deleting VNF to `DEAD`.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the record is absent.
    pub async fn mark_dead(
        &self,
        vnf_id: &VnfId,
        reason: TransitionReason,
        error_reason: Option<String>,
    ) -> Result<TransitionOutcome> {
        match self.store.mark_dead(vnf_id, reason, error_reason).await? {
            CasResult::Success { previous } => {
                self.metrics
                    .record_transition(previous.status.as_label(), VnfStatus::Dead.as_label());
                tracing::info!(%vnf_id, from = %previous.status, %reason, "VNF marked dead");
                Ok(TransitionOutcome::Applied { previous })
            }
            CasResult::StateMismatch { actual } => {
                self.metrics
                    .record_guard_failure(VnfStatus::Dead.as_label(), actual.as_label());
                Ok(TransitionOutcome::Rejected { actual })
            }
            CasResult::NotFound => Err(Error::VnfNotFound { vnf_id: *vnf_id }),
        }
    }

    /// Settles a VNF whose teardown has finished.
    ///
    /// Without an error the VNF moves to `DEAD` and its record is removed.
    /// With one it stays as `DEAD` carrying the error.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the record is absent.
    pub async fn retire(&self, vnf_id: &VnfId, error: Option<String>) -> Result<()> {
        let reason = match &error {
            Some(_) => TransitionReason::DeleteFailed,
            None => TransitionReason::DeleteCompleted,
        };
        let clean = error.is_none();
        let outcome = self.mark_dead(vnf_id, reason, error).await?;
        if let TransitionOutcome::Rejected { actual } = outcome {
            tracing::warn!(%vnf_id, %actual, "VNF changed status before teardown settled");
            return Ok(());
        }
        if clean {
            self.store.delete_vnf(vnf_id).await?;
            tracing::info!(%vnf_id, "VNF record removed");
        }
        Ok(())
    }

    /// Fetches a record.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the record is absent.
    pub async fn fetch(&self, vnf_id: &VnfId) -> Result<VnfRecord> {
        self.store
            .fetch(vnf_id)
            .await?
            .ok_or(Error::VnfNotFound { vnf_id: *vnf_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Vnfd;
    use crate::store::memory::InMemoryStore;

    async fn tracked() -> Result<(StatusTracker, VnfId)> {
        let store = Arc::new(InMemoryStore::new());
        let vnf = VnfRecord::new("vnf", "tenant", Vnfd::new("vnfd"));
        store.create_vnf(&vnf).await?;
        Ok((StatusTracker::new(store, LifecycleMetrics::new()), vnf.id))
    }

    #[tokio::test]
    async fn require_applies_or_conflicts() -> Result<()> {
        let (tracker, id) = tracked().await?;
        let previous = tracker
            .require(
                &id,
                &[VnfStatus::PendingCreate],
                VnfStatus::Active,
                TransitionReason::CreateCompleted,
                &RecordPatch::new(),
            )
            .await?;
        assert_eq!(previous.status, VnfStatus::PendingCreate);

        let err = tracker
            .require(
                &id,
                &[VnfStatus::PendingCreate],
                VnfStatus::Active,
                TransitionReason::CreateCompleted,
                &RecordPatch::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Conflict { actual: VnfStatus::Active, .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn missing_record_is_not_found() -> Result<()> {
        let (tracker, _) = tracked().await?;
        let ghost = VnfId::generate();
        let err = tracker
            .transition(
                &ghost,
                &[VnfStatus::Active],
                VnfStatus::PendingUpdate,
                TransitionReason::UpdateRequested,
                &RecordPatch::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VnfNotFound { .. }));
        assert!(tracker.set_error_reason(&ghost, "x").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn resolve_error_falls_back_to_forced() -> Result<()> {
        let (tracker, id) = tracked().await?;
        tracker
            .resolve_error(
                &id,
                VnfStatus::PendingScaleOut,
                TransitionReason::ScaleFailed,
                "scale_wait timed out",
            )
            .await?;
        let vnf = tracker.fetch(&id).await?;
        assert_eq!(vnf.status, VnfStatus::Error);
        assert_eq!(vnf.error_reason.as_deref(), Some("scale_wait timed out"));
        Ok(())
    }

    #[tokio::test]
    async fn retire_removes_or_keeps_dead_record() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        let tracker = StatusTracker::new(store.clone(), LifecycleMetrics::new());
        let mut ids = Vec::new();
        for _ in 0..2 {
            let vnf = VnfRecord::new("vnf", "tenant", Vnfd::new("vnfd"));
            store.create_vnf(&vnf).await?;
            for (target, reason) in [
                (VnfStatus::Active, TransitionReason::CreateCompleted),
                (VnfStatus::PendingDelete, TransitionReason::DeleteRequested),
            ] {
                tracker
                    .require(&vnf.id, &[vnf.status, VnfStatus::Active], target, reason, &RecordPatch::new())
                    .await?;
            }
            ids.push(vnf.id);
        }

        tracker.retire(&ids[0], None).await?;
        assert!(store.fetch(&ids[0]).await?.is_none());
        let journal = store.transitions(&ids[0])?;
        assert_eq!(journal.last().map(|c| c.to), Some(VnfStatus::Dead));

        tracker
            .retire(&ids[1], Some("stack DELETE_FAILED".into()))
            .await?;
        let dead = tracker.fetch(&ids[1]).await?;
        assert_eq!(dead.status, VnfStatus::Dead);
        assert_eq!(dead.error_reason.as_deref(), Some("stack DELETE_FAILED"));
        Ok(())
    }

    #[tokio::test]
    async fn resolve_error_uses_guarded_edge() -> Result<()> {
        let (tracker, id) = tracked().await?;
        tracker
            .resolve_error(
                &id,
                VnfStatus::PendingCreate,
                TransitionReason::CreateFailed,
                "stack CREATE_FAILED",
            )
            .await?;
        let vnf = tracker.fetch(&id).await?;
        assert_eq!(vnf.status, VnfStatus::Error);
        assert_eq!(vnf.last_transition_reason, Some(TransitionReason::CreateFailed));
        Ok(())
    }
}
