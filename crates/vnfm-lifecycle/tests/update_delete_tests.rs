//! VNF updates and teardown.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use serde_json::json;

use vnfm_lifecycle::driver::DriverError;
use vnfm_lifecycle::driver::infra::ops;
use vnfm_lifecycle::error::Error;
use vnfm_lifecycle::mgmt::{MgmtAction, MgmtHook};
use vnfm_lifecycle::policy::ScaleRequest;
use vnfm_lifecycle::status::VnfStatus;
use vnfm_lifecycle::vnf::{UpdateVnfRequest, attrs};
use vnfm_test_utils::{
    Call, TEST_POLICY, TestVnfm, assert_called_before, assert_called_once, assert_errored_with,
    assert_not_called, assert_status, monitored_vnfd, test_vnfd,
};

fn update(key: &str, value: &str) -> UpdateVnfRequest {
    let mut request = UpdateVnfRequest::default();
    request.attributes.insert(key.to_string(), json!(value));
    request
}

#[tokio::test]
async fn update_merges_attributes_and_settles_active() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;

    let pending = env
        .orchestrator
        .update_vnf(&env.ctx, &vnf.id, update("flavor", "m1.large"))
        .await
        .expect("update");
    assert_status(&pending, VnfStatus::PendingUpdate);
    assert_eq!(pending.attribute("flavor"), Some("m1.large"));

    env.settle().await;
    let updated = env.vnf(&vnf.id).await;
    assert_status(&updated, VnfStatus::Active);
    assert_eq!(updated.attribute("flavor"), Some("m1.large"));
    assert_called_once(&env.log, "UPDATE_VNF notification", |c| {
        c.is_mgmt(MgmtAction::UpdateVnf)
    });
    assert_called_before(
        &env.log,
        |c| c.is_hook(MgmtHook::UpdatePre),
        |c| c.is_infra(ops::UPDATE),
    );
    assert_called_before(
        &env.log,
        |c| c.is_infra(ops::UPDATE_WAIT),
        |c| c.is_hook(MgmtHook::UpdatePost),
    );
}

#[tokio::test]
async fn update_requires_active() {
    let env = TestVnfm::new();
    let gate = env.infra.gate(ops::CREATE_WAIT);
    let vnfd = env.register_vnfd(test_vnfd()).await;
    let created = env
        .orchestrator
        .create_vnf(&env.ctx, TestVnfm::create_request(&vnfd))
        .await
        .expect("create");

    let err = env
        .orchestrator
        .update_vnf(&env.ctx, &created.id, update(attrs::CONFIG, "vdus: {}"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Conflict {
            actual: VnfStatus::PendingCreate,
            ..
        }
    ));
    assert_not_called(&env.log, "infra update", |c| c.is_infra(ops::UPDATE));

    gate.notify_one();
    env.settle().await;
    assert_status(&env.vnf(&created.id).await, VnfStatus::Active);
}

#[tokio::test]
async fn update_failure_settles_error_and_runs_post() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;
    env.infra
        .fail(ops::UPDATE, DriverError::backend("stack update rejected"));

    let err = env
        .orchestrator
        .update_vnf(&env.ctx, &vnf.id, update("flavor", "m1.large"))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "stack update rejected");

    let failed = env.vnf(&vnf.id).await;
    assert_errored_with(&failed, "stack update rejected");
    assert_eq!(failed.attribute("flavor"), None);
    assert_called_once(&env.log, "mgmt_update_post", |c| {
        c.is_hook(MgmtHook::UpdatePost)
    });
}

#[tokio::test]
async fn update_wait_failure_keeps_previous_attributes() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;
    env.infra
        .fail(ops::UPDATE_WAIT, DriverError::backend("UPDATE_FAILED"));

    env.orchestrator
        .update_vnf(&env.ctx, &vnf.id, update("flavor", "m1.large"))
        .await
        .expect("update accepted");
    env.settle().await;

    let failed = env.vnf(&vnf.id).await;
    assert_errored_with(&failed, "UPDATE_FAILED");
    assert_eq!(failed.attribute("flavor"), None);
    assert_not_called(&env.log, "UPDATE_VNF notification", |c| {
        c.is_mgmt(MgmtAction::UpdateVnf)
    });
}

#[tokio::test]
async fn delete_unsubscribes_before_teardown_and_removes_record() {
    let env = TestVnfm::new();
    let gate = env.infra.gate(ops::DELETE_WAIT);
    let vnf = env.create_active_vnf_from(monitored_vnfd("respawn")).await;
    assert!(env.monitor.is_watching(&vnf.id));

    env.orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .expect("delete");
    assert_status(&env.vnf(&vnf.id).await, VnfStatus::PendingDelete);
    assert!(!env.monitor.is_watching(&vnf.id));

    assert_called_before(
        &env.log,
        |c| matches!(c, Call::Unsubscribe { .. }),
        |c| c.is_hook(MgmtHook::DeletePre),
    );
    assert_called_before(
        &env.log,
        |c| matches!(c, Call::Unsubscribe { .. }),
        |c| c.is_infra(ops::DELETE),
    );
    assert_called_before(
        &env.log,
        |c| c.is_mgmt(MgmtAction::DeleteVnf),
        |c| c.is_infra(ops::DELETE),
    );

    gate.notify_one();
    env.settle().await;
    let err = env.orchestrator.get_vnf(&vnf.id).await.unwrap_err();
    assert!(matches!(err, Error::VnfNotFound { .. }));
    assert_eq!(
        env.statuses(&vnf.id).last(),
        Some(&VnfStatus::Dead),
        "delete should retire through DEAD"
    );
    assert_called_once(&env.log, "mgmt_delete_post", |c| {
        c.is_hook(MgmtHook::DeletePost)
    });
}

#[tokio::test]
async fn delete_notification_failure_does_not_stop_teardown() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;
    env.mgmt.fail_call(MgmtAction::DeleteVnf);

    env.orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .expect("delete");
    env.settle().await;

    assert_called_once(&env.log, "infra delete", |c| c.is_infra(ops::DELETE));
    assert!(env.orchestrator.get_vnf(&vnf.id).await.is_err());
}

#[tokio::test]
async fn delete_wait_failure_keeps_dead_record_until_deleted_again() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;
    env.infra
        .fail(ops::DELETE_WAIT, DriverError::backend("DELETE_FAILED"));

    env.orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .expect("delete accepted");
    env.settle().await;

    let dead = env.vnf(&vnf.id).await;
    assert_status(&dead, VnfStatus::Dead);
    assert_eq!(dead.error_reason.as_deref(), Some("DELETE_FAILED"));

    env.infra.clear_failures();
    env.orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .expect("retry from DEAD");
    env.settle().await;
    assert!(env.orchestrator.get_vnf(&vnf.id).await.is_err());
    assert_eq!(env.log.count(|c| c.is_infra(ops::DELETE)), 2);
}

#[tokio::test]
async fn delete_failure_leaves_retryable_error() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf_from(monitored_vnfd("respawn")).await;
    assert!(env.monitor.is_watching(&vnf.id));
    env.infra
        .fail(ops::DELETE, DriverError::backend("stack locked"));

    let err = env
        .orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "stack locked");
    assert_errored_with(&env.vnf(&vnf.id).await, "stack locked");
    assert!(!env.monitor.is_watching(&vnf.id));
    assert_called_before(
        &env.log,
        |c| *c == Call::Unsubscribe { vnf_id: vnf.id },
        |c| c.is_infra(ops::DELETE),
    );

    env.infra.clear_failures();
    env.orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .expect("retry from ERROR");
    env.settle().await;
    assert!(env.orchestrator.get_vnf(&vnf.id).await.is_err());
}

#[tokio::test]
async fn delete_requires_active_or_error() {
    let env = TestVnfm::new();
    let gate = env.infra.gate(ops::SCALE_WAIT);
    let vnf = env.create_active_vnf().await;
    env.orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-out"))
        .await
        .expect("scale");

    let err = env
        .orchestrator
        .delete_vnf(&env.ctx, &vnf.id)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert_not_called(&env.log, "mgmt_delete_pre", |c| {
        c.is_hook(MgmtHook::DeletePre)
    });

    gate.notify_one();
    env.settle().await;
}
