//! Scaling policies.
//!
//! Policies are not persisted on their own: they are derived on demand from
//! the descriptor snapshot on the VNF record plus the requested action.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use vnfm_core::VnfId;

use crate::descriptor::PolicyDeclaration;
use crate::error::{Error, Result};
use crate::status::VnfStatus;

/// The capacity-scaling policy type.
pub const CAPACITY_SCALING: &str = "capacity-scaling";

/// Allowed actions per policy type.
pub const POLICY_ACTIONS: &[(&str, &[&str])] = &[(CAPACITY_SCALING, &["scale-in", "scale-out"])];

fn allowed_actions(policy_type: &str) -> Option<&'static [&'static str]> {
    POLICY_ACTIONS
        .iter()
        .find(|(ty, _)| *ty == policy_type)
        .map(|(_, actions)| *actions)
}

/// A validated scale direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleAction {
    /// Remove capacity.
    ScaleIn,
    /// Add capacity.
    ScaleOut,
}

impl ScaleAction {
    /// Returns the status a VNF holds while this action is in flight.
    #[must_use]
    pub const fn pending_status(&self) -> VnfStatus {
        match self {
            Self::ScaleIn => VnfStatus::PendingScaleIn,
            Self::ScaleOut => VnfStatus::PendingScaleOut,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ScaleIn => "scale-in",
            Self::ScaleOut => "scale-out",
        }
    }
}

impl fmt::Display for ScaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleAction {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scale-in" => Ok(Self::ScaleIn),
            "scale-out" => Ok(Self::ScaleOut),
            _ => Err(()),
        }
    }
}

/// A policy rendered for one VNF, optionally bound to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    /// Policy ID (same as the name).
    pub id: String,
    /// Policy name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub policy_type: String,
    /// Declared properties.
    pub properties: serde_json::Value,
    /// The VNF the policy applies to.
    pub vnf_id: VnfId,
    /// The VNF's backend handle at request time.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Requested action.
    #[serde(default)]
    pub action: Option<String>,
}

impl ScalingPolicy {
    /// Renders a declared policy for a VNF.
    #[must_use]
    pub fn from_declaration(
        name: impl Into<String>,
        declaration: &PolicyDeclaration,
        vnf_id: VnfId,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            policy_type: declaration.policy_type.clone(),
            properties: declaration.properties.clone(),
            vnf_id,
            instance_id: None,
            action: None,
        }
    }

    /// Binds the policy to an action.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Validates the bound action against the policy-type table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicyType` for a type without an action table and
    /// `InvalidPolicyAction` when the action is absent or not allowed.
    pub fn validate(&self) -> Result<ScaleAction> {
        let Some(allowed) = allowed_actions(&self.policy_type) else {
            return Err(Error::InvalidPolicyType {
                policy: self.name.clone(),
                policy_type: self.policy_type.clone(),
                valid: POLICY_ACTIONS.iter().map(|(ty, _)| (*ty).to_string()).collect(),
            });
        };
        let action = self.action.as_deref().unwrap_or_default();
        let invalid = || Error::InvalidPolicyAction {
            policy: self.name.clone(),
            action: action.to_string(),
            valid: allowed.iter().map(|a| (*a).to_string()).collect(),
        };
        if !allowed.contains(&action) {
            return Err(invalid());
        }
        action.parse().map_err(|()| invalid())
    }
}

/// A request to scale a VNF by a declared policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleRequest {
    /// Policy name.
    pub policy: String,
    /// Requested action, e.g. `scale-out`.
    #[serde(rename = "type")]
    pub action: String,
}

impl ScaleRequest {
    /// Creates a scale request.
    #[must_use]
    pub fn new(policy: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            action: action.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(policy_type: &str) -> ScalingPolicy {
        ScalingPolicy::from_declaration(
            "SP1",
            &PolicyDeclaration::new(policy_type),
            VnfId::generate(),
        )
    }

    #[test]
    fn id_equals_name() {
        let p = policy(CAPACITY_SCALING);
        assert_eq!(p.id, "SP1");
        assert_eq!(p.name, "SP1");
        assert!(p.action.is_none());
    }

    #[test]
    fn valid_actions_map_to_pending_status() -> Result<()> {
        let out = policy(CAPACITY_SCALING).with_action("scale-out").validate()?;
        assert_eq!(out.pending_status(), VnfStatus::PendingScaleOut);
        let inn = policy(CAPACITY_SCALING).with_action("scale-in").validate()?;
        assert_eq!(inn.pending_status(), VnfStatus::PendingScaleIn);
        Ok(())
    }

    #[test]
    fn disallowed_action_is_rejected() {
        let err = policy(CAPACITY_SCALING)
            .with_action("scale-up")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicyAction { ref action, .. } if action == "scale-up"));

        let err = policy(CAPACITY_SCALING).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidPolicyAction { .. }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = policy("tosca.policies.tacker.Alarming")
            .with_action("scale-out")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicyType { .. }));
    }

    #[test]
    fn scale_request_serde_uses_type_key() {
        let req: ScaleRequest =
            serde_json::from_str(r#"{"policy":"SP1","type":"scale-in"}"#).expect("parse");
        assert_eq!(req, ScaleRequest::new("SP1", "scale-in"));
    }
}
