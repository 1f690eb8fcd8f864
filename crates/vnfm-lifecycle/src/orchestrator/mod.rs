//! The lifecycle orchestrator.
//!
//! [`VnfmOrchestrator`] composes the store (through a [`StatusTracker`]), the
//! VIM resolver, the infrastructure and management driver registries, the
//! optional health monitor and the background executor. Each lifecycle
//! operation lives in its own submodule:
//!
//! - `create`: instantiate, wait, configure, subscribe
//! - `update`: apply new attributes
//! - `delete`: tear down and retire
//! - `scale`: run a declared scaling policy
//! - `actions`: react to health-monitor actions
//!
//! Operations take `self: &Arc<Self>` because their wait phases run as
//! detached continuations that keep the orchestrator alive.

mod actions;
mod create;
mod delete;
mod scale;
mod update;

use std::fmt;
use std::sync::Arc;

use vnfm_core::{VnfId, VnfdId};

use crate::config::VnfmConfig;
use crate::context::RequestContext;
use crate::descriptor::Vnfd;
use crate::driver::{DriverKind, DriverRegistry, DriverRegistryBuilder, InfraArgs, InfraDriver, MgmtDriver};
use crate::error::{Error, Result};
use crate::executor::BackgroundExecutor;
use crate::metrics::LifecycleMetrics;
use crate::mgmt::MgmtDispatcher;
use crate::monitor::VnfMonitor;
use crate::policy::ScalingPolicy;
use crate::store::VnfStore;
use crate::tracker::StatusTracker;
use crate::vim::{VimAuth, VimResolver};
use crate::vnf::VnfRecord;

pub use actions::ActionPolicy;

/// Orchestrates VNF lifecycle operations across pluggable backends.
pub struct VnfmOrchestrator {
    config: VnfmConfig,
    tracker: StatusTracker,
    vim: Arc<dyn VimResolver>,
    infra: DriverRegistry<dyn InfraDriver>,
    mgmt: MgmtDispatcher,
    monitor: Option<Arc<dyn VnfMonitor>>,
    executor: BackgroundExecutor,
    metrics: LifecycleMetrics,
}

impl fmt::Debug for VnfmOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VnfmOrchestrator")
            .field("config", &self.config)
            .field("infra", &self.infra)
            .field("mgmt", self.mgmt.registry())
            .field("monitor", &self.monitor.is_some())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl VnfmOrchestrator {
    /// Starts building an orchestrator.
    #[must_use]
    pub fn builder(config: VnfmConfig) -> VnfmOrchestratorBuilder {
        VnfmOrchestratorBuilder {
            config,
            store: None,
            vim_resolver: None,
            infra: DriverRegistry::<dyn InfraDriver>::builder(DriverKind::Infra),
            mgmt: DriverRegistry::<dyn MgmtDriver>::builder(DriverKind::Management),
            monitor: None,
            metrics: LifecycleMetrics::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &VnfmConfig {
        &self.config
    }

    /// Returns the background executor.
    #[must_use]
    pub const fn executor(&self) -> &BackgroundExecutor {
        &self.executor
    }

    /// Returns the status tracker.
    #[must_use]
    pub const fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Returns the metrics recorder shared with the registries and executor.
    #[must_use]
    pub const fn metrics(&self) -> &LifecycleMetrics {
        &self.metrics
    }

    fn store(&self) -> &Arc<dyn VnfStore> {
        self.tracker.store()
    }

    // --- Descriptors ---

    /// Registers a descriptor.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the descriptor names no infra driver, a
    /// driver that is not enabled, no service types, or carries a malformed
    /// policy template.
    #[tracing::instrument(skip(self, ctx, vnfd), fields(vnfd_id = %vnfd.id, tenant_id = %ctx.tenant_id))]
    pub async fn create_vnfd(&self, ctx: &RequestContext, mut vnfd: Vnfd) -> Result<Vnfd> {
        let infra = vnfd
            .infra_driver
            .as_deref()
            .ok_or(Error::InfraDriverNotSpecified)?;
        if !self.infra.contains(infra) {
            return Err(Error::InvalidInfraDriver {
                driver: infra.to_string(),
                valid: self.infra.names(),
            });
        }
        if let Some(mgmt) = vnfd.mgmt_driver.as_deref() {
            if !self.mgmt.registry().contains(mgmt) {
                return Err(Error::InvalidMgmtDriver {
                    driver: mgmt.to_string(),
                    valid: self.mgmt.registry().names(),
                });
            }
        }
        if vnfd.service_types.is_empty() {
            return Err(Error::ServiceTypesNotSpecified);
        }
        vnfd.declared_policies()?;
        if vnfd.tenant_id.is_empty() {
            vnfd.tenant_id.clone_from(&ctx.tenant_id);
        }

        self.store().create_vnfd(&vnfd).await?;
        tracing::info!(name = %vnfd.name, infra_driver = ?vnfd.infra_driver, "VNFD registered");
        Ok(vnfd)
    }

    /// Gets a descriptor.
    ///
    /// # Errors
    ///
    /// Returns `VnfdNotFound` if absent.
    pub async fn get_vnfd(&self, vnfd_id: &VnfdId) -> Result<Vnfd> {
        self.store()
            .get_vnfd(vnfd_id)
            .await?
            .ok_or(Error::VnfdNotFound { vnfd_id: *vnfd_id })
    }

    /// Lists descriptors.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store fails.
    pub async fn list_vnfds(&self) -> Result<Vec<Vnfd>> {
        self.store().list_vnfds().await
    }

    // --- VNFs ---

    /// Gets a VNF.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if absent.
    pub async fn get_vnf(&self, vnf_id: &VnfId) -> Result<VnfRecord> {
        self.tracker.fetch(vnf_id).await
    }

    /// Lists VNFs.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store fails.
    pub async fn list_vnfs(&self) -> Result<Vec<VnfRecord>> {
        self.store().list_vnfs().await
    }

    // --- Policies ---

    /// Lists the policies declared by a VNF's descriptor, optionally only the
    /// one named `name`.
    ///
    /// # Errors
    ///
    /// Returns `VnfNotFound` if the VNF is absent, or a serialization error
    /// if its descriptor template is malformed.
    pub async fn get_vnf_policies(
        &self,
        vnf_id: &VnfId,
        name: Option<&str>,
    ) -> Result<Vec<ScalingPolicy>> {
        let vnf = self.tracker.fetch(vnf_id).await?;
        let declared = vnf.vnfd.declared_policies()?;
        Ok(declared
            .iter()
            .filter(|(policy_name, _)| name.is_none_or(|n| n == policy_name.as_str()))
            .map(|(policy_name, decl)| {
                let mut policy = ScalingPolicy::from_declaration(policy_name.clone(), decl, vnf.id);
                policy.instance_id.clone_from(&vnf.instance_id);
                policy
            })
            .collect())
    }

    /// Gets one declared policy.
    ///
    /// # Errors
    ///
    /// Returns `PolicyNotFound` if the descriptor declares no such policy.
    pub async fn get_vnf_policy(&self, vnf_id: &VnfId, name: &str) -> Result<ScalingPolicy> {
        self.get_vnf_policies(vnf_id, Some(name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::PolicyNotFound {
                policy: name.to_string(),
                vnf_id: *vnf_id,
            })
    }

    // --- Shared phase helpers ---

    async fn resolve_vim(&self, ctx: &RequestContext, vnf: &VnfRecord) -> Result<VimAuth> {
        self.vim
            .resolve(ctx, vnf.vim_id.as_deref(), vnf.region_name())
            .await
    }

    async fn unsubscribe_monitor(&self, vnf_id: &VnfId) {
        if let Some(monitor) = &self.monitor {
            if monitor.unsubscribe(vnf_id).await {
                tracing::debug!(%vnf_id, "monitor subscription cancelled");
            }
        }
    }
}

fn infra_driver_name(vnf: &VnfRecord) -> Result<&str> {
    vnf.infra_driver().ok_or(Error::InfraDriverNotSpecified)
}

fn infra_args<'a>(ctx: &'a RequestContext, auth: &'a VimAuth, vnf: &'a VnfRecord) -> InfraArgs<'a> {
    InfraArgs {
        context: ctx,
        auth,
        region_name: vnf.region_name(),
    }
}

/// Builder for [`VnfmOrchestrator`].
pub struct VnfmOrchestratorBuilder {
    config: VnfmConfig,
    store: Option<Arc<dyn VnfStore>>,
    vim_resolver: Option<Arc<dyn VimResolver>>,
    infra: DriverRegistryBuilder<dyn InfraDriver>,
    mgmt: DriverRegistryBuilder<dyn MgmtDriver>,
    monitor: Option<Arc<dyn VnfMonitor>>,
    metrics: LifecycleMetrics,
}

impl VnfmOrchestratorBuilder {
    /// Sets the record store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn VnfStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the VIM resolver.
    #[must_use]
    pub fn vim_resolver(mut self, resolver: Arc<dyn VimResolver>) -> Self {
        self.vim_resolver = Some(resolver);
        self
    }

    /// Makes an infrastructure driver available under `name`.
    ///
    /// Only names listed in the configuration are dispatchable.
    #[must_use]
    pub fn infra_driver(mut self, name: impl Into<String>, driver: Arc<dyn InfraDriver>) -> Self {
        self.infra = self.infra.register(name, driver);
        self
    }

    /// Makes a management driver available under `name`.
    #[must_use]
    pub fn mgmt_driver(mut self, name: impl Into<String>, driver: Arc<dyn MgmtDriver>) -> Self {
        self.mgmt = self.mgmt.register(name, driver);
        self
    }

    /// Sets the health monitor that active VNFs subscribe to.
    #[must_use]
    pub fn monitor(mut self, monitor: Arc<dyn VnfMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Sets the metrics recorder.
    #[must_use]
    pub fn metrics(mut self, metrics: LifecycleMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no store or VIM resolver is set, or
    /// `DriverNotAvailable` if a configured driver has no implementation.
    pub fn build(self) -> Result<Arc<VnfmOrchestrator>> {
        let store = self
            .store
            .ok_or_else(|| Error::configuration("a VNF store is required"))?;
        let vim = self
            .vim_resolver
            .ok_or_else(|| Error::configuration("a VIM resolver is required"))?;

        let infra = self
            .infra
            .metrics(self.metrics.clone())
            .build(&self.config.infra_drivers)?;
        let mgmt = self
            .mgmt
            .metrics(self.metrics.clone())
            .build(&self.config.mgmt_drivers)?;
        let executor = BackgroundExecutor::new(self.config.executor_pool_size, self.metrics.clone());

        tracing::info!(
            infra_drivers = ?self.config.infra_drivers,
            mgmt_drivers = ?self.config.mgmt_drivers,
            pool_size = executor.pool_size(),
            monitor = self.monitor.is_some(),
            "orchestrator built"
        );

        Ok(Arc::new(VnfmOrchestrator {
            tracker: StatusTracker::new(store, self.metrics.clone()),
            vim,
            infra,
            mgmt: MgmtDispatcher::new(mgmt),
            monitor: self.monitor,
            executor,
            metrics: self.metrics,
            config: self.config,
        }))
    }
}
