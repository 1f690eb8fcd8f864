//! VNF descriptors (VNFDs).
//!
//! A descriptor is immutable once registered: every VNF created from it
//! carries a snapshot, so later operations never re-read the catalog.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vnfm_core::VnfdId;

use crate::error::{Error, Result};

/// A policy declared by a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDeclaration {
    /// Policy type, e.g. `capacity-scaling`.
    #[serde(rename = "type")]
    pub policy_type: String,
    /// Type-specific properties, passed through to the infra driver.
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl PolicyDeclaration {
    /// Creates a declaration with empty properties.
    #[must_use]
    pub fn new(policy_type: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            properties: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Sets the policy properties.
    #[must_use]
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }
}

/// A VNF descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vnfd {
    /// Descriptor ID.
    pub id: VnfdId,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Infrastructure driver name.
    #[serde(default)]
    pub infra_driver: Option<String>,
    /// Management driver name.
    #[serde(default)]
    pub mgmt_driver: Option<String>,
    /// Service types offered by instances.
    #[serde(default)]
    pub service_types: Vec<String>,
    /// Policies declared directly on the descriptor, keyed by name.
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyDeclaration>,
    /// Health-monitoring policy applied to instances.
    #[serde(default)]
    pub monitoring_policy: Option<serde_json::Value>,
    /// TOSCA template text, if the descriptor was authored as one.
    #[serde(default)]
    pub template: Option<String>,
    /// When the descriptor was registered.
    pub created_at: DateTime<Utc>,
}

impl Vnfd {
    /// Creates an empty descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: VnfdId::generate(),
            name: name.into(),
            description: None,
            tenant_id: String::new(),
            infra_driver: None,
            mgmt_driver: None,
            service_types: Vec::new(),
            policies: BTreeMap::new(),
            monitoring_policy: None,
            template: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the owning tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Sets the infrastructure driver.
    #[must_use]
    pub fn with_infra_driver(mut self, driver: impl Into<String>) -> Self {
        self.infra_driver = Some(driver.into());
        self
    }

    /// Sets the management driver.
    #[must_use]
    pub fn with_mgmt_driver(mut self, driver: impl Into<String>) -> Self {
        self.mgmt_driver = Some(driver.into());
        self
    }

    /// Adds a service type.
    #[must_use]
    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_types.push(service_type.into());
        self
    }

    /// Declares a policy.
    #[must_use]
    pub fn with_policy(mut self, name: impl Into<String>, policy: PolicyDeclaration) -> Self {
        self.policies.insert(name.into(), policy);
        self
    }

    /// Sets the health-monitoring policy.
    #[must_use]
    pub fn with_monitoring_policy(mut self, policy: serde_json::Value) -> Self {
        self.monitoring_policy = Some(policy);
        self
    }

    /// Sets the TOSCA template text.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Returns every policy the descriptor declares.
    ///
    /// Policies set directly on the descriptor take precedence. Otherwise a
    /// TOSCA template is read: `topology_template.policies` is a list of
    /// single-entry maps from policy name to `{type, properties}`. Templates
    /// without `tosca_definitions_version` declare no policies.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the template is not valid YAML or a
    /// policy entry is malformed.
    pub fn declared_policies(&self) -> Result<BTreeMap<String, PolicyDeclaration>> {
        if !self.policies.is_empty() {
            return Ok(self.policies.clone());
        }
        let Some(template) = self.template.as_deref() else {
            return Ok(BTreeMap::new());
        };

        let doc: serde_yaml::Value = serde_yaml::from_str(template)
            .map_err(|e| Error::serialization(format!("invalid VNFD template: {e}")))?;
        if doc.get("tosca_definitions_version").is_none() {
            return Ok(BTreeMap::new());
        }
        let Some(entries) = doc
            .get("topology_template")
            .and_then(|t| t.get("policies"))
            .and_then(serde_yaml::Value::as_sequence)
        else {
            return Ok(BTreeMap::new());
        };

        let mut policies = BTreeMap::new();
        for entry in entries {
            let mapping = entry.as_mapping().ok_or_else(|| {
                Error::serialization("VNFD policy entry must map a name to a policy")
            })?;
            for (name, body) in mapping {
                let name = name
                    .as_str()
                    .ok_or_else(|| Error::serialization("VNFD policy name must be a string"))?;
                let policy: PolicyDeclaration = serde_yaml::from_value(body.clone())
                    .map_err(|e| Error::serialization(format!("invalid policy '{name}': {e}")))?;
                policies.insert(name.to_string(), policy);
            }
        }
        Ok(policies)
    }
}
