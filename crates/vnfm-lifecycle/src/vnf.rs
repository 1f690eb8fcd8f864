//! VNF records and the request payloads that create and update them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vnfm_core::{VnfId, VnfdId};

use crate::descriptor::Vnfd;
use crate::error::{Error, Result};
use crate::status::{TransitionReason, VnfStatus};

/// Well-known keys of [`VnfRecord::attributes`].
pub mod attrs {
    /// Post-boot configuration payload (canonical YAML).
    pub const CONFIG: &str = "config";
    /// Template parameters (canonical YAML).
    pub const PARAM_VALUES: &str = "param_values";
    /// Health-monitoring policy (JSON).
    pub const MONITORING_POLICY: &str = "monitoring_policy";
    /// ID of the dead VNF a respawned VNF replaces.
    pub const DEAD_VNF_ID: &str = "dead_vnf_id";
}

/// Placement metadata, set once by the create pre-phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementAttr {
    /// Region requested by the caller.
    #[serde(default)]
    pub region_name: Option<String>,
    /// Name of the VIM the VNF was placed on.
    #[serde(default)]
    pub vim_name: Option<String>,
    /// Backend-resolved location metadata.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

/// The persisted state of one VNF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnfRecord {
    /// VNF ID.
    pub id: VnfId,
    /// Human-readable name.
    pub name: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Snapshot of the descriptor the VNF was created from.
    pub vnfd: Vnfd,
    /// VIM the VNF was placed on.
    #[serde(default)]
    pub vim_id: Option<String>,
    /// Current status.
    pub status: VnfStatus,
    /// Backend-assigned handle.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Management endpoint (JSON map of VDU name to address).
    #[serde(default)]
    pub mgmt_url: Option<String>,
    /// Placement metadata.
    #[serde(default)]
    pub placement_attr: PlacementAttr,
    /// Free-form attributes; see [`attrs`].
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Last captured failure.
    #[serde(default)]
    pub error_reason: Option<String>,
    /// Reason of the last applied transition.
    #[serde(default)]
    pub last_transition_reason: Option<TransitionReason>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl VnfRecord {
    /// Creates a `PENDING_CREATE` record from a descriptor snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>, tenant_id: impl Into<String>, vnfd: Vnfd) -> Self {
        let now = Utc::now();
        Self {
            id: VnfId::generate(),
            name: name.into(),
            tenant_id: tenant_id.into(),
            description: None,
            vnfd,
            vim_id: None,
            status: VnfStatus::PendingCreate,
            instance_id: None,
            mgmt_url: None,
            placement_attr: PlacementAttr::default(),
            attributes: BTreeMap::new(),
            error_reason: None,
            last_transition_reason: Some(TransitionReason::CreateRequested),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a state-machine edge.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` if `target` is not reachable from the
    /// current status.
    pub fn transition_to(&mut self, target: VnfStatus, reason: TransitionReason) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidStatusTransition {
                from: self.status,
                to: target,
                reason: format!("valid targets: {:?}", self.status.valid_transitions()),
            });
        }
        self.status = target;
        self.last_transition_reason = Some(reason);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves the record to `ERROR` with `reason`, bypassing the edge table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` if the record is already `DEAD`.
    pub fn force_error(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidStatusTransition {
                from: self.status,
                to: VnfStatus::Error,
                reason: "DEAD is retired".into(),
            });
        }
        self.status = VnfStatus::Error;
        self.error_reason = Some(reason.into());
        self.last_transition_reason = Some(TransitionReason::ErrorForced);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records the backend instance handle.
    ///
    /// # Errors
    ///
    /// Returns `InstanceAlreadyAssigned` if a different handle is already
    /// recorded.
    pub fn assign_instance_id(&mut self, instance_id: impl Into<String>) -> Result<()> {
        let instance_id = instance_id.into();
        match &self.instance_id {
            Some(existing) if *existing != instance_id => Err(Error::InstanceAlreadyAssigned {
                vnf_id: self.id,
                instance_id: existing.clone(),
            }),
            _ => {
                self.instance_id = Some(instance_id);
                Ok(())
            }
        }
    }

    /// Returns the management URL once it can be trusted.
    #[must_use]
    pub fn trusted_mgmt_url(&self) -> Option<&str> {
        match self.status {
            VnfStatus::Active => self.mgmt_url.as_deref(),
            _ => None,
        }
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns the requested region.
    #[must_use]
    pub fn region_name(&self) -> Option<&str> {
        self.placement_attr.region_name.as_deref()
    }

    /// Returns the descriptor's infrastructure driver name.
    #[must_use]
    pub fn infra_driver(&self) -> Option<&str> {
        self.vnfd.infra_driver.as_deref()
    }
}

/// Request to create a VNF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVnfRequest {
    /// Descriptor to instantiate.
    pub vnfd_id: VnfdId,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Target VIM; the resolver's default when absent.
    #[serde(default)]
    pub vim_id: Option<String>,
    /// Target region.
    #[serde(default)]
    pub region_name: Option<String>,
    /// Requested attributes; `config` and `param_values` may be structured.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl CreateVnfRequest {
    /// Creates a request for `vnfd_id`.
    #[must_use]
    pub fn new(vnfd_id: VnfdId, name: impl Into<String>) -> Self {
        Self {
            vnfd_id,
            name: name.into(),
            description: None,
            vim_id: None,
            region_name: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the target VIM.
    #[must_use]
    pub fn with_vim(mut self, vim_id: impl Into<String>) -> Self {
        self.vim_id = Some(vim_id.into());
        self
    }

    /// Sets the target region.
    #[must_use]
    pub fn with_region(mut self, region_name: impl Into<String>) -> Self {
        self.region_name = Some(region_name.into());
        self
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Request to update a VNF's attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateVnfRequest {
    /// Attributes to merge; `config` may be structured.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl UpdateVnfRequest {
    /// Creates an update that replaces the post-boot configuration.
    #[must_use]
    pub fn config(config: serde_json::Value) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(attrs::CONFIG.to_string(), config);
        Self { attributes }
    }
}

/// Normalizes requested attributes to their stored string form.
///
/// `config` and `param_values` are stored as canonical YAML. Structured values
/// are encoded and a deprecation warning is logged; strings are stored as
/// given. Other structured attributes are stored as JSON.
///
/// # Errors
///
/// Returns a serialization error if a value cannot be encoded.
pub fn normalize_attributes(
    attributes: &BTreeMap<String, serde_json::Value>,
) -> Result<BTreeMap<String, String>> {
    let mut normalized = BTreeMap::new();
    for (key, value) in attributes {
        let encoded = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => continue,
            structured if key == attrs::CONFIG || key == attrs::PARAM_VALUES => {
                tracing::warn!(
                    attribute = %key,
                    "structured attribute payloads are deprecated; pass canonical YAML text"
                );
                serde_yaml::to_string(structured).map_err(|e| {
                    Error::serialization(format!("failed to encode '{key}' as YAML: {e}"))
                })?
            }
            structured => serde_json::to_string(structured).map_err(|e| {
                Error::serialization(format!("failed to encode '{key}' as JSON: {e}"))
            })?,
        };
        normalized.insert(key.clone(), encoded);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> VnfRecord {
        VnfRecord::new("vnf", "tenant", Vnfd::new("vnfd"))
    }

    #[test]
    fn new_record_is_pending_create() {
        let vnf = record();
        assert_eq!(vnf.status, VnfStatus::PendingCreate);
        assert!(vnf.instance_id.is_none());
        assert!(vnf.error_reason.is_none());
    }

    #[test]
    fn transition_to_validates_edges() -> Result<()> {
        let mut vnf = record();
        vnf.transition_to(VnfStatus::Active, TransitionReason::CreateCompleted)?;
        assert_eq!(vnf.status, VnfStatus::Active);

        let err = vnf
            .transition_to(VnfStatus::PendingCreate, TransitionReason::CreateRequested)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStatusTransition { .. }));
        assert_eq!(vnf.status, VnfStatus::Active);
        Ok(())
    }

    #[test]
    fn force_error_bypasses_edges_but_not_dead() -> Result<()> {
        let mut vnf = record();
        vnf.transition_to(VnfStatus::Active, TransitionReason::CreateCompleted)?;
        vnf.force_error("boom")?;
        assert_eq!(vnf.status, VnfStatus::Error);
        assert_eq!(vnf.error_reason.as_deref(), Some("boom"));

        vnf.status = VnfStatus::Dead;
        assert!(vnf.force_error("again").is_err());
        Ok(())
    }

    #[test]
    fn instance_id_is_set_once() -> Result<()> {
        let mut vnf = record();
        vnf.assign_instance_id("stack-1")?;
        vnf.assign_instance_id("stack-1")?;
        let err = vnf.assign_instance_id("stack-2").unwrap_err();
        assert!(matches!(err, Error::InstanceAlreadyAssigned { .. }));
        assert_eq!(vnf.instance_id.as_deref(), Some("stack-1"));
        Ok(())
    }

    #[test]
    fn mgmt_url_trusted_only_when_active() -> Result<()> {
        let mut vnf = record();
        vnf.mgmt_url = Some(r#"{"VDU1":"10.0.0.4"}"#.into());
        assert!(vnf.trusted_mgmt_url().is_none());
        vnf.transition_to(VnfStatus::Active, TransitionReason::CreateCompleted)?;
        assert!(vnf.trusted_mgmt_url().is_some());
        Ok(())
    }

    #[test]
    fn normalize_encodes_structured_payloads() -> Result<()> {
        let mut requested = BTreeMap::new();
        requested.insert(attrs::CONFIG.to_string(), json!({"vdus": {"vdu1": {"config": {"a": 1}}}}));
        requested.insert(attrs::PARAM_VALUES.to_string(), json!("flavor: m1.tiny\n"));
        requested.insert("extra".to_string(), json!({"k": "v"}));
        requested.insert("skipped".to_string(), serde_json::Value::Null);

        let normalized = normalize_attributes(&requested)?;

        let config: serde_yaml::Value =
            serde_yaml::from_str(&normalized[attrs::CONFIG]).expect("config is YAML");
        assert_eq!(config["vdus"]["vdu1"]["config"]["a"].as_i64(), Some(1));
        assert_eq!(normalized[attrs::PARAM_VALUES], "flavor: m1.tiny\n");
        assert_eq!(normalized["extra"], r#"{"k":"v"}"#);
        assert!(!normalized.contains_key("skipped"));
        Ok(())
    }
}
