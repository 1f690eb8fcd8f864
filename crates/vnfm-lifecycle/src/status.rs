//! VNF status state machine.
//!
//! This module provides:
//! - `VnfStatus`: the closed set of states a VNF moves through
//! - `TransitionReason`: the explicit reason attached to every transition

use serde::{Deserialize, Serialize};

/// Reason for a VNF status transition.
///
/// Every transition carries a reason so that the history of a VNF can be
/// audited after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    // --- Create ---
    /// Record persisted by the create pre-phase.
    CreateRequested,
    /// Backend reported the instance ready and configuration succeeded.
    CreateCompleted,
    /// Backend create or wait failed.
    CreateFailed,
    /// Management driver rejected the created instance.
    ConfigureFailed,

    // --- Update ---
    /// Update accepted by the pre-phase.
    UpdateRequested,
    /// Backend update settled.
    UpdateCompleted,
    /// Backend update or wait failed.
    UpdateFailed,

    // --- Delete ---
    /// Delete accepted by the pre-phase.
    DeleteRequested,
    /// Backend teardown settled.
    DeleteCompleted,
    /// Backend teardown failed.
    DeleteFailed,

    // --- Scale ---
    /// Scale accepted by the pre-phase.
    ScaleRequested,
    /// Backend scale settled.
    ScaleCompleted,
    /// Backend scale or wait failed.
    ScaleFailed,

    // --- Monitoring ---
    /// Health monitor declared the VNF dead.
    MonitorDeclaredDead,

    /// Error recorded unconditionally.
    ErrorForced,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateRequested => write!(f, "create_requested"),
            Self::CreateCompleted => write!(f, "create_completed"),
            Self::CreateFailed => write!(f, "create_failed"),
            Self::ConfigureFailed => write!(f, "configure_failed"),
            Self::UpdateRequested => write!(f, "update_requested"),
            Self::UpdateCompleted => write!(f, "update_completed"),
            Self::UpdateFailed => write!(f, "update_failed"),
            Self::DeleteRequested => write!(f, "delete_requested"),
            Self::DeleteCompleted => write!(f, "delete_completed"),
            Self::DeleteFailed => write!(f, "delete_failed"),
            Self::ScaleRequested => write!(f, "scale_requested"),
            Self::ScaleCompleted => write!(f, "scale_completed"),
            Self::ScaleFailed => write!(f, "scale_failed"),
            Self::MonitorDeclaredDead => write!(f, "monitor_declared_dead"),
            Self::ErrorForced => write!(f, "error_forced"),
        }
    }
}

/// VNF status state machine.
///
/// ```text
///                 ┌────────────────┐
///                 │ PENDING_CREATE │
///                 └────────────────┘
///                    │          │
///                    ▼          ▼
/// ┌────────────┐  ┌────────┐  ┌───────┐
/// │ PENDING_*  │◄─│ ACTIVE │  │ ERROR │◄── any non-DEAD (forced)
/// │ UPDATE     │─►│        │  └───────┘
/// │ SCALE_IN   │  └────────┘      │
/// │ SCALE_OUT  │      │           │
/// └────────────┘      ▼           ▼
///                 ┌────────────────┐
///                 │ PENDING_DELETE │──► ERROR
///                 └────────────────┘
///                         │
///                         ▼
///                     ┌──────┐
///                     │ DEAD │ (also ACTIVE ──► DEAD on respawn)
///                     └──────┘
/// ```
///
/// Every `PENDING_*` edge resolves to `ACTIVE` (or `DEAD` for delete) or to
/// `ERROR`. `PENDING_UPDATE` and `PENDING_SCALE_*` also fail to `ERROR`.
/// A `DEAD` VNF that still holds a backend instance (a respawned one, or a
/// teardown whose wait failed) may be deleted again: `DEAD ──► PENDING_DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VnfStatus {
    /// Record persisted, backend create in progress.
    PendingCreate,
    /// Running and configured.
    Active,
    /// Backend update in progress.
    PendingUpdate,
    /// Backend teardown in progress.
    PendingDelete,
    /// Backend scale-in in progress.
    PendingScaleIn,
    /// Backend scale-out in progress.
    PendingScaleOut,
    /// Last operation failed; see the record's error reason.
    Error,
    /// Retired.
    Dead,
}

impl VnfStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::PendingCreate,
        Self::Active,
        Self::PendingUpdate,
        Self::PendingDelete,
        Self::PendingScaleIn,
        Self::PendingScaleOut,
        Self::Error,
        Self::Dead,
    ];

    /// Returns true if an operation on the VNF is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingCreate
                | Self::PendingUpdate
                | Self::PendingDelete
                | Self::PendingScaleIn
                | Self::PendingScaleOut
        )
    }

    /// Returns true if the VNF is retired. A retired VNF can only be torn
    /// down; it is never forced to `ERROR`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead)
    }

    /// Returns true if the transition from self to target is an edge of the
    /// state machine.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::PendingCreate
            | Self::PendingUpdate
            | Self::PendingScaleIn
            | Self::PendingScaleOut => matches!(target, Self::Active | Self::Error),
            Self::Active => matches!(
                target,
                Self::PendingUpdate
                    | Self::PendingDelete
                    | Self::PendingScaleIn
                    | Self::PendingScaleOut
                    | Self::Dead
            ),
            Self::PendingDelete => matches!(target, Self::Dead | Self::Error),
            Self::Error | Self::Dead => matches!(target, Self::PendingDelete),
        }
    }

    /// Returns all valid target states from the current state.
    #[must_use]
    pub fn valid_transitions(&self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|target| self.can_transition_to(*target))
            .collect()
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::PendingCreate => "pending_create",
            Self::Active => "active",
            Self::PendingUpdate => "pending_update",
            Self::PendingDelete => "pending_delete",
            Self::PendingScaleIn => "pending_scale_in",
            Self::PendingScaleOut => "pending_scale_out",
            Self::Error => "error",
            Self::Dead => "dead",
        }
    }
}

impl Default for VnfStatus {
    fn default() -> Self {
        Self::PendingCreate
    }
}

impl std::fmt::Display for VnfStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingCreate => write!(f, "PENDING_CREATE"),
            Self::Active => write!(f, "ACTIVE"),
            Self::PendingUpdate => write!(f, "PENDING_UPDATE"),
            Self::PendingDelete => write!(f, "PENDING_DELETE"),
            Self::PendingScaleIn => write!(f, "PENDING_SCALE_IN"),
            Self::PendingScaleOut => write!(f, "PENDING_SCALE_OUT"),
            Self::Error => write!(f, "ERROR"),
            Self::Dead => write!(f, "DEAD"),
        }
    }
}
