//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create test data with sensible defaults.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use vnfm_core::VnfId;
use vnfm_lifecycle::config::VnfmConfig;
use vnfm_lifecycle::context::RequestContext;
use vnfm_lifecycle::descriptor::{PolicyDeclaration, Vnfd};
use vnfm_lifecycle::orchestrator::VnfmOrchestrator;
use vnfm_lifecycle::policy::CAPACITY_SCALING;
use vnfm_lifecycle::status::VnfStatus;
use vnfm_lifecycle::store::VnfStore;
use vnfm_lifecycle::store::memory::InMemoryStore;
use vnfm_lifecycle::vim::StaticVimResolver;
use vnfm_lifecycle::vnf::{CreateVnfRequest, VnfRecord};

use crate::drivers::{CallLog, RecordingInfraDriver, RecordingMgmtDriver, RecordingMonitor};

/// Name the recording drivers are registered under.
pub const TEST_DRIVER: &str = "test";

/// ID of the single VIM the fixtures resolve to.
pub const TEST_VIM: &str = "vim-1";

/// Tenant used by [`TestVnfm::ctx`].
pub const TEST_TENANT: &str = "tenant-a";

/// Scaling policy declared by [`test_vnfd`].
pub const TEST_POLICY: &str = "SP1";

/// Configuration enabling only the recording drivers, with no boot wait.
#[must_use]
pub fn test_config() -> VnfmConfig {
    VnfmConfig::default()
        .with_infra_drivers([TEST_DRIVER])
        .with_mgmt_drivers([TEST_DRIVER])
        .with_boot_wait(Duration::ZERO)
        .with_executor_pool_size(8)
}

/// A descriptor using the recording drivers and declaring [`TEST_POLICY`].
#[must_use]
pub fn test_vnfd() -> Vnfd {
    Vnfd::new("test-vnfd")
        .with_infra_driver(TEST_DRIVER)
        .with_mgmt_driver(TEST_DRIVER)
        .with_service_type("vnfd")
        .with_policy(TEST_POLICY, PolicyDeclaration::new(CAPACITY_SCALING))
}

/// A monitoring policy pinging `VDU1` that maps `failure` to `action`.
#[must_use]
pub fn monitoring_policy(action: &str) -> serde_json::Value {
    json!({
        "vdus": {
            "VDU1": {
                "ping": {
                    "monitoring_params": {"monitoring_delay": 0, "count": 3},
                    "actions": {"failure": action}
                }
            }
        }
    })
}

/// [`test_vnfd`] with a monitoring policy mapping `failure` to `action`.
#[must_use]
pub fn monitored_vnfd(action: &str) -> Vnfd {
    test_vnfd().with_monitoring_policy(monitoring_policy(action))
}

/// An orchestrator wired to recording drivers and an in-memory store.
pub struct TestVnfm {
    /// The orchestrator under test.
    pub orchestrator: Arc<VnfmOrchestrator>,
    /// Backing store, for journal assertions.
    pub store: Arc<InMemoryStore>,
    /// Infrastructure recorder.
    pub infra: Arc<RecordingInfraDriver>,
    /// Management recorder.
    pub mgmt: Arc<RecordingMgmtDriver>,
    /// Monitor recorder.
    pub monitor: Arc<RecordingMonitor>,
    /// Call log shared by all recorders.
    pub log: CallLog,
    /// Caller context for [`TEST_TENANT`].
    pub ctx: RequestContext,
}

impl TestVnfm {
    /// Creates an environment with [`test_config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates an environment with a custom configuration.
    ///
    /// The configuration must enable [`TEST_DRIVER`] for both registries.
    #[must_use]
    pub fn with_config(config: VnfmConfig) -> Self {
        let log = CallLog::new();
        let store = Arc::new(InMemoryStore::new());
        let infra = Arc::new(RecordingInfraDriver::new(log.clone()));
        let mgmt = Arc::new(RecordingMgmtDriver::new(log.clone()));
        let monitor = Arc::new(RecordingMonitor::new(log.clone()));

        let orchestrator = VnfmOrchestrator::builder(config)
            .store(Arc::clone(&store) as Arc<dyn VnfStore>)
            .vim_resolver(Arc::new(StaticVimResolver::single(TEST_VIM, "test-vim")))
            .infra_driver(TEST_DRIVER, Arc::clone(&infra) as _)
            .mgmt_driver(TEST_DRIVER, Arc::clone(&mgmt) as _)
            .monitor(Arc::clone(&monitor) as _)
            .build()
            .expect("orchestrator");

        Self {
            orchestrator,
            store,
            infra,
            mgmt,
            monitor,
            log,
            ctx: RequestContext::new(TEST_TENANT),
        }
    }

    /// Registers a descriptor.
    pub async fn register_vnfd(&self, vnfd: Vnfd) -> Vnfd {
        self.orchestrator
            .create_vnfd(&self.ctx, vnfd)
            .await
            .expect("register vnfd")
    }

    /// Returns a create request for `vnfd`.
    #[must_use]
    pub fn create_request(vnfd: &Vnfd) -> CreateVnfRequest {
        CreateVnfRequest::new(vnfd.id, "test-vnf")
    }

    /// Registers `vnfd`, creates a VNF from it and waits for it to settle
    /// to `ACTIVE`.
    pub async fn create_active_vnf_from(&self, vnfd: Vnfd) -> VnfRecord {
        let vnfd = self.register_vnfd(vnfd).await;
        let created = self
            .orchestrator
            .create_vnf(&self.ctx, Self::create_request(&vnfd))
            .await
            .expect("create vnf");
        self.settle().await;
        let vnf = self.vnf(&created.id).await;
        assert_eq!(vnf.status, VnfStatus::Active, "VNF did not settle: {vnf:?}");
        vnf
    }

    /// [`create_active_vnf_from`](Self::create_active_vnf_from) with
    /// [`test_vnfd`].
    pub async fn create_active_vnf(&self) -> VnfRecord {
        self.create_active_vnf_from(test_vnfd()).await
    }

    /// Waits for every detached continuation to finish.
    pub async fn settle(&self) {
        self.orchestrator.executor().drain().await;
    }

    /// Fetches a VNF that must exist.
    pub async fn vnf(&self, vnf_id: &VnfId) -> VnfRecord {
        self.orchestrator.get_vnf(vnf_id).await.expect("vnf exists")
    }

    /// Returns the statuses `vnf_id` has moved through, in order.
    #[must_use]
    pub fn statuses(&self, vnf_id: &VnfId) -> Vec<VnfStatus> {
        self.store
            .transitions(vnf_id)
            .expect("journal")
            .into_iter()
            .map(|change| change.to)
            .collect()
    }
}

impl Default for TestVnfm {
    fn default() -> Self {
        Self::new()
    }
}
