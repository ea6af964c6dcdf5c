//! A failing item never stops the rest of the reconciliation

use std::sync::Arc;

use lbaas_agent::{AgentConfig, LbaasBuilder, MemoryDeviceClient};
use lbaas_common::{LbaasError, Phase, ResourceKey, ResourceKind};
use lbaas_test::{devices, web_service, DeviceVerifier, FailOn, FailingClient};
use pretty_assertions::assert_eq;

fn fleet() -> (Arc<MemoryDeviceClient>, Arc<FailingClient>, LbaasBuilder) {
    let inner = Arc::new(MemoryDeviceClient::new());
    let failing = Arc::new(FailingClient::new(inner.clone()));
    let builder = LbaasBuilder::new(&AgentConfig::default(), failing.clone());
    (inner, failing, builder)
}

/// Scenario:
/// 1. Reject the virtual server create on bigip2 only
/// 2. Verify exactly that item fails and the other devices converge
#[tokio::test]
async fn test_listener_failure_on_one_device() {
    let (inner, failing, builder) = fleet();
    failing
        .fail_on_device("bigip2", FailOn::Create, ResourceKind::VirtualServer, "web")
        .await;
    let fleet_devices = devices(3);

    let batch = builder.assure(&web_service(), &fleet_devices).await;

    let failures: Vec<_> = batch.failures().collect();
    assert!(failures.iter().any(|o| o.phase == Phase::ListenersCreated
        && o.device.as_deref() == Some("bigip2")
        && matches!(o.error(), Some(LbaasError::Device { .. }))));
    assert!(failures.iter().all(|o| o.device.as_deref() == Some("bigip2")));

    let listener_failures = batch
        .phase(Phase::ListenersCreated)
        .filter(|o| !o.is_success())
        .count();
    assert_eq!(listener_failures, 1);

    let verifier = DeviceVerifier::new(&inner);
    for host in ["bigip1", "bigip3"] {
        verifier.assert_object_count(host, 4).await.expect("converged device");
    }
    verifier
        .assert_absent("bigip2", ResourceKind::VirtualServer, &ResourceKey::new("Project_tenant-a", "web"))
        .await
        .expect("rejected listener");
}

/// A pool that cannot be created makes its monitor and member fail on
/// that device only
#[tokio::test]
async fn test_pool_failure_cascades_within_device() {
    let (inner, failing, builder) = fleet();
    failing
        .fail_on_device("bigip1", FailOn::Create, ResourceKind::Pool, "web-pool")
        .await;
    let fleet_devices = devices(2);

    let batch = builder.assure(&web_service(), &fleet_devices).await;

    let failed: Vec<(Phase, &str)> = batch
        .failures()
        .map(|o| (o.phase, o.device.as_deref().unwrap_or("-")))
        .collect();
    assert_eq!(
        failed,
        vec![
            (Phase::PoolsCreated, "bigip1"),
            (Phase::Monitors, "bigip1"),
            (Phase::Members, "bigip1"),
        ]
    );

    let member_error = batch
        .phase(Phase::Members)
        .find(|o| o.device.as_deref() == Some("bigip1"))
        .and_then(|o| o.error());
    assert!(matches!(member_error, Some(LbaasError::NotFound { .. })));

    assert_eq!(inner.object_count("bigip1").await, 2);
    assert_eq!(inner.object_count("bigip2").await, 4);
}

/// Once the fault clears the next run converges
#[tokio::test]
async fn test_next_run_recovers() {
    let (inner, failing, builder) = fleet();
    failing.fail(FailOn::Create, ResourceKind::Pool, "web-pool").await;
    let fleet_devices = devices(2);

    let first = builder.assure(&web_service(), &fleet_devices).await;
    assert!(!first.is_success());

    failing.heal().await;
    let second = builder.assure(&web_service(), &fleet_devices).await;
    assert!(second.is_success());
    for device in &fleet_devices {
        assert_eq!(inner.object_count(&device.hostname).await, 4);
    }
}
