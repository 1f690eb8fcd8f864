//! Policy-driven scaling.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use vnfm_lifecycle::descriptor::PolicyDeclaration;
use vnfm_lifecycle::driver::DriverError;
use vnfm_lifecycle::driver::infra::ops;
use vnfm_lifecycle::error::Error;
use vnfm_lifecycle::policy::ScaleRequest;
use vnfm_lifecycle::status::VnfStatus;
use vnfm_test_utils::{
    Call, TEST_POLICY, TestVnfm, assert_called_once, assert_errored_with, assert_status,
    test_vnfd,
};

#[tokio::test]
async fn scale_out_passes_through_pending_and_settles_active() {
    let env = TestVnfm::new();
    let gate = env.infra.gate(ops::SCALE_WAIT);
    let vnf = env.create_active_vnf().await;

    let policy = env
        .orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-out"))
        .await
        .expect("scale");
    assert_eq!(policy.name, TEST_POLICY);
    assert_eq!(policy.action.as_deref(), Some("scale-out"));
    assert_eq!(policy.vnf_id, vnf.id);
    assert_eq!(policy.instance_id, vnf.instance_id);
    assert_status(&env.vnf(&vnf.id).await, VnfStatus::PendingScaleOut);

    gate.notify_one();
    env.settle().await;
    assert_status(&env.vnf(&vnf.id).await, VnfStatus::Active);
    assert_called_once(&env.log, "infra scale", |c| {
        *c == Call::Infra {
            op: ops::SCALE,
            instance_id: vnf.instance_id.clone(),
        }
    });
}

#[tokio::test]
async fn scale_in_uses_its_own_pending_status() {
    let env = TestVnfm::new();
    let gate = env.infra.gate(ops::SCALE_WAIT);
    let vnf = env.create_active_vnf().await;

    env.orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-in"))
        .await
        .expect("scale");
    assert_status(&env.vnf(&vnf.id).await, VnfStatus::PendingScaleIn);

    gate.notify_one();
    env.settle().await;
    assert_eq!(
        env.statuses(&vnf.id),
        vec![VnfStatus::Active, VnfStatus::PendingScaleIn, VnfStatus::Active]
    );
}

#[tokio::test]
async fn invalid_action_is_rejected_without_transition() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;

    let err = env
        .orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-sideways"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPolicyAction { ref action, .. } if action == "scale-sideways"));
    assert!(err.is_validation());
    assert_status(&env.vnf(&vnf.id).await, VnfStatus::Active);
    assert_eq!(env.log.count(|c| c.is_infra(ops::SCALE)), 0);
}

#[tokio::test]
async fn unknown_policy_is_not_found() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;

    let err = env
        .orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new("SP9", "scale-out"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PolicyNotFound { .. }));
}

#[tokio::test]
async fn unsupported_policy_type_is_rejected() {
    let env = TestVnfm::new();
    let vnfd = test_vnfd().with_policy("AP1", PolicyDeclaration::new("tosca.policies.Alarming"));
    let vnf = env.create_active_vnf_from(vnfd).await;

    let err = env
        .orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new("AP1", "scale-out"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPolicyType { .. }));
    assert_status(&env.vnf(&vnf.id).await, VnfStatus::Active);
}

#[tokio::test]
async fn concurrent_scale_loses_the_guard() {
    let env = TestVnfm::new();
    let gate = env.infra.gate(ops::SCALE_WAIT);
    let vnf = env.create_active_vnf().await;

    env.orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-out"))
        .await
        .expect("first scale");
    let err = env
        .orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-in"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Conflict {
            actual: VnfStatus::PendingScaleOut,
            ..
        }
    ));
    assert_eq!(env.log.count(|c| c.is_infra(ops::SCALE)), 1);

    gate.notify_one();
    env.settle().await;
    assert_status(&env.vnf(&vnf.id).await, VnfStatus::Active);
}

#[tokio::test]
async fn scale_failure_settles_error() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;
    env.infra
        .fail(ops::SCALE, DriverError::backend("no capacity"));

    let err = env
        .orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-out"))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "no capacity");
    assert_errored_with(&env.vnf(&vnf.id).await, "no capacity");
}

#[tokio::test]
async fn scale_wait_failure_settles_error() {
    let env = TestVnfm::new();
    let vnf = env.create_active_vnf().await;
    env.infra
        .fail(ops::SCALE_WAIT, DriverError::backend("scaling group stuck"));

    env.orchestrator
        .scale_vnf(&env.ctx, &vnf.id, ScaleRequest::new(TEST_POLICY, "scale-out"))
        .await
        .expect("scale accepted");
    env.settle().await;

    assert_errored_with(&env.vnf(&vnf.id).await, "scaling group stuck");
}
