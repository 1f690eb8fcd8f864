//! Health-monitor actions: respawn, log, log_and_kill.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use vnfm_lifecycle::context::RequestContext;
use vnfm_lifecycle::driver::infra::ops;
use vnfm_lifecycle::driver::{DriverKind, DriverRegistry};
use vnfm_lifecycle::metrics::LifecycleMetrics;
use vnfm_lifecycle::monitor::{HealthMonitor, MonitorDriver};
use vnfm_lifecycle::orchestrator::{ActionPolicy, VnfmOrchestrator};
use vnfm_lifecycle::status::{TransitionReason, VnfStatus};
use vnfm_lifecycle::store::VnfStore;
use vnfm_lifecycle::store::memory::InMemoryStore;
use vnfm_lifecycle::vim::StaticVimResolver;
use vnfm_lifecycle::vnf::attrs;
use vnfm_test_utils::{
    Call, CallLog, RecordingInfraDriver, RecordingMgmtDriver, ScriptedMonitorDriver, TEST_DRIVER,
    TEST_VIM, TestVnfm, assert_called_before, assert_not_called, assert_status, monitored_vnfd,
    test_config,
};

#[tokio::test]
async fn respawn_replaces_the_dead_vnf() {
    let env = TestVnfm::new();
    let dead = env.create_active_vnf_from(monitored_vnfd("respawn")).await;

    assert!(env.monitor.fire(&dead.id, ActionPolicy::Respawn.as_str()).await);
    assert!(!env.monitor.is_watching(&dead.id));
    env.settle().await;

    let old = env.vnf(&dead.id).await;
    assert_status(&old, VnfStatus::Dead);
    assert_eq!(
        env.store.transitions(&dead.id).unwrap().last().map(|c| c.reason),
        Some(TransitionReason::MonitorDeclaredDead)
    );

    let replacement = env
        .orchestrator
        .list_vnfs()
        .await
        .unwrap()
        .into_iter()
        .find(|v| v.id != dead.id)
        .expect("replacement VNF");
    assert_status(&replacement, VnfStatus::Active);
    assert_eq!(replacement.name, dead.name);
    assert_eq!(replacement.vnfd.id, dead.vnfd.id);
    assert_eq!(replacement.vim_id, dead.vim_id);
    assert_eq!(
        replacement.attribute(attrs::DEAD_VNF_ID),
        Some(dead.id.to_string().as_str())
    );
    assert_ne!(replacement.instance_id, dead.instance_id);
    assert!(env.monitor.is_watching(&replacement.id));

    assert_called_before(
        &env.log,
        |c| *c == Call::MarkDead { vnf_id: dead.id },
        |c| *c == Call::Unsubscribe { vnf_id: dead.id },
    );
    assert_called_before(
        &env.log,
        |c| *c == Call::Unsubscribe { vnf_id: dead.id },
        |c| *c == Call::Subscribe { vnf_id: replacement.id },
    );
}

#[tokio::test]
async fn respawned_vnf_can_be_deleted() {
    let env = TestVnfm::new();
    let dead = env.create_active_vnf_from(monitored_vnfd("respawn")).await;
    assert!(env.monitor.fire(&dead.id, "respawn").await);
    env.settle().await;
    assert_status(&env.vnf(&dead.id).await, VnfStatus::Dead);

    env.orchestrator
        .delete_vnf(&env.ctx, &dead.id)
        .await
        .expect("delete DEAD VNF");
    env.settle().await;

    assert!(env.orchestrator.get_vnf(&dead.id).await.unwrap_err().is_not_found());
    assert_eq!(
        env.log.count(|c| *c
            == Call::Infra {
                op: ops::DELETE,
                instance_id: dead.instance_id.clone(),
            }),
        1
    );
    assert_eq!(env.store.vnf_count().unwrap(), 1);
    let replacement = env.orchestrator.list_vnfs().await.unwrap().remove(0);
    assert_status(&replacement, VnfStatus::Active);
    assert!(env.monitor.is_watching(&replacement.id));
}

#[tokio::test]
async fn respawn_skips_vnf_that_left_active() {
    let env = TestVnfm::new();
    let gate = env.infra.gate(ops::DELETE_WAIT);
    let vnf = env.create_active_vnf_from(monitored_vnfd("respawn")).await;

    env.orchestrator.handle_monitor_action(&vnf, "respawn").await;
    env.orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .expect("delete");

    // Let the respawn continuation run while the delete is held.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(env.store.vnf_count().unwrap(), 1);

    gate.notify_one();
    env.settle().await;
    assert_eq!(env.store.vnf_count().unwrap(), 0);
    assert_eq!(env.log.count(|c| c.is_infra(ops::CREATE)), 1);
}

#[tokio::test]
async fn log_and_kill_deletes_the_vnf() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf_from(monitored_vnfd("log_and_kill")).await;

    assert!(env.monitor.fire(&vnf.id, "log_and_kill").await);
    env.settle().await;

    assert!(env.orchestrator.get_vnf(&vnf.id).await.is_err());
    assert_eq!(env.log.count(|c| c.is_infra(ops::DELETE)), 1);
    assert_eq!(env.log.count(|c| c.is_infra(ops::CREATE)), 1);
}

#[tokio::test]
async fn log_leaves_the_vnf_alone() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf_from(monitored_vnfd("log")).await;

    assert!(env.monitor.fire(&vnf.id, "log").await);
    env.settle().await;

    assert_status(&env.vnf(&vnf.id).await, VnfStatus::Active);
    assert!(env.monitor.is_watching(&vnf.id));
    assert_not_called(&env.log, "mark dead", |c| matches!(c, Call::MarkDead { .. }));
}

#[tokio::test]
async fn unknown_action_is_ignored() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf_from(monitored_vnfd("respawn")).await;

    assert!(env.monitor.fire(&vnf.id, "reboot").await);
    env.settle().await;

    assert_status(&env.vnf(&vnf.id).await, VnfStatus::Active);
    assert_eq!(env.store.vnf_count().unwrap(), 1);
}

#[tokio::test]
async fn health_monitor_drives_respawn_end_to_end() {
    let log = CallLog::new();
    let store = Arc::new(InMemoryStore::new());
    let driver = Arc::new(ScriptedMonitorDriver::new("success"));
    let registry = DriverRegistry::<dyn MonitorDriver>::builder(DriverKind::Monitor)
        .register("ping", Arc::clone(&driver) as Arc<dyn MonitorDriver>)
        .build(&["ping"])
        .expect("monitor registry");
    let monitor = Arc::new(HealthMonitor::from_config(
        registry,
        &test_config(),
        LifecycleMetrics::new(),
    ));

    let orchestrator = VnfmOrchestrator::builder(test_config())
        .store(Arc::clone(&store) as Arc<dyn VnfStore>)
        .vim_resolver(Arc::new(StaticVimResolver::single(TEST_VIM, "test-vim")))
        .infra_driver(TEST_DRIVER, Arc::new(RecordingInfraDriver::new(log.clone())))
        .mgmt_driver(TEST_DRIVER, Arc::new(RecordingMgmtDriver::new(log.clone())))
        .monitor(Arc::clone(&monitor) as _)
        .build()
        .expect("orchestrator");
    let ctx = RequestContext::new("tenant-a");

    let vnfd = orchestrator
        .create_vnfd(&ctx, monitored_vnfd("respawn"))
        .await
        .expect("vnfd");
    let vnf = orchestrator
        .create_vnf(&ctx, TestVnfm::create_request(&vnfd))
        .await
        .expect("create");
    orchestrator.executor().drain().await;
    assert!(monitor.is_monitored(&vnf.id));

    assert!(monitor.check_once(Utc::now()).await.is_empty());

    driver.set_outcome("failure");
    let fired = monitor.check_once(Utc::now()).await;
    assert_eq!(fired, vec![(vnf.id, "respawn".to_string())]);
    assert!(!monitor.is_monitored(&vnf.id));
    orchestrator.executor().drain().await;

    let dead = store.fetch(&vnf.id).await.unwrap().expect("dead record kept");
    assert_eq!(dead.status, VnfStatus::Dead);
    assert_eq!(monitor.len(), 1);
    assert_eq!(store.vnf_count().unwrap(), 2);
    assert!(driver.checks() >= 2);
}
