//! Shared translation addresses across tenants

use std::collections::BTreeSet;
use std::sync::Arc;

use lbaas_agent::{
    AgentConfig, Device, MemoryDeviceClient, MemoryPortAllocator, ModelAdapter, NetworkHelper, ResourceManagers,
    SnatManager,
};
use lbaas_common::{ResourceKey, ResourceKind};
use lbaas_test::{subnet, DeviceVerifier, RecordingL3Binding};
use pretty_assertions::assert_eq;

const TRANSLATION: &str = "snat-traffic-group-local-only-shared-subnet_0";

struct Harness {
    client: Arc<MemoryDeviceClient>,
    l3: Arc<RecordingL3Binding>,
    snat: SnatManager,
}

fn harness(config: AgentConfig) -> Harness {
    let client = Arc::new(MemoryDeviceClient::new());
    let l3 = Arc::new(RecordingL3Binding::new());
    let snat = SnatManager::new(
        config,
        ResourceManagers::new(client.clone()),
        client.clone(),
        Arc::new(MemoryPortAllocator::new()),
    )
    .with_l3_binding(l3.clone());
    Harness { client, l3, snat }
}

impl Harness {
    /// Pool members naming the translation must match the tenants holding it
    async fn assert_refcount_matches_cache(&self, device: &Device, subnet_id: &str, tenants: &[&str]) {
        let members = self
            .client
            .snat_pool_member_name_count(device, TRANSLATION)
            .await
            .unwrap();
        let holders = tenants
            .iter()
            .filter(|t| self.snat.cache().contains(&device.hostname, t, subnet_id))
            .count();
        assert_eq!(members, holders);
    }
}

/// Scenario:
/// 1. Two tenants assure the same subnet of a shared network
/// 2. The first tenant leaves: the translation survives, the subnet stays in use
/// 3. The second tenant leaves: the translation is released and unbound once
#[tokio::test]
async fn test_shared_translation_released_by_last_tenant() {
    let h = harness(AgentConfig::default());
    let device = Device::new("bigip1");
    let shared = subnet("shared-subnet", 0, true);

    for tenant in ["t1", "t2"] {
        let addresses = h.snat.get_addresses(&shared, tenant).await.unwrap();
        h.snat.assure(&device, &shared, &addresses, tenant).await.unwrap();
    }
    h.assert_refcount_matches_cache(&device, "shared-subnet", &["t1", "t2"]).await;

    let verifier = DeviceVerifier::new(&h.client);
    let translation = ResourceKey::new("Common", TRANSLATION);
    verifier
        .assert_attribute("bigip1", ResourceKind::SnatTranslation, &translation, "address", "10.0.0.100%0")
        .await
        .expect("one shared translation");
    // One translation plus a pool per tenant
    verifier.assert_object_count("bigip1", 3).await.expect("object count");

    let first = h.snat.delete(&device, &shared, "t1").await.unwrap();
    assert!(first.deleted_names.is_empty());
    assert_eq!(first.in_use_subnets, BTreeSet::from(["shared-subnet".to_string()]));
    verifier
        .assert_exists("bigip1", ResourceKind::SnatTranslation, &translation)
        .await
        .expect("translation kept for t2");
    verifier
        .assert_absent("bigip1", ResourceKind::SnatPool, &ResourceKey::new("Project_t1", "t1"))
        .await
        .expect("t1 pool removed");
    assert_eq!(h.l3.unbind_count().await, 0);
    h.assert_refcount_matches_cache(&device, "shared-subnet", &["t1", "t2"]).await;

    let second = h.snat.delete(&device, &shared, "t2").await.unwrap();
    assert_eq!(second.deleted_names, BTreeSet::from([TRANSLATION.to_string()]));
    assert!(second.in_use_subnets.is_empty());
    assert_eq!(h.l3.unbind_count().await, 1);
    h.assert_refcount_matches_cache(&device, "shared-subnet", &["t1", "t2"]).await;
    verifier.assert_object_count("bigip1", 0).await.expect("device empty");
}

/// Deleting a tenant that never assured the subnet releases nothing still in use
#[tokio::test]
async fn test_delete_unknown_tenant_keeps_other_tenant() {
    let h = harness(AgentConfig::default());
    let device = Device::new("bigip1");
    let shared = subnet("shared-subnet", 0, true);

    let addresses = h.snat.get_addresses(&shared, "t1").await.unwrap();
    h.snat.assure(&device, &shared, &addresses, "t1").await.unwrap();

    let release = h.snat.delete(&device, &shared, "t9").await.unwrap();
    assert!(release.deleted_names.is_empty());
    assert!(release.mutations.is_empty());
    assert!(release.in_use_subnets.contains("shared-subnet"));
    assert_eq!(h.client.object_count("bigip1").await, 2);
}

/// Each device keeps its own reference counts
#[tokio::test]
async fn test_reference_counts_are_per_device() {
    let h = harness(AgentConfig::default());
    let bigip1 = Device::new("bigip1");
    let bigip2 = Device::new("bigip2");
    let shared = subnet("shared-subnet", 0, true);

    let addresses = h.snat.get_addresses(&shared, "t1").await.unwrap();
    h.snat.assure(&bigip1, &shared, &addresses, "t1").await.unwrap();
    h.snat.assure(&bigip2, &shared, &addresses, "t1").await.unwrap();
    let addresses = h.snat.get_addresses(&shared, "t2").await.unwrap();
    h.snat.assure(&bigip2, &shared, &addresses, "t2").await.unwrap();

    let on_first = h.snat.delete(&bigip1, &shared, "t1").await.unwrap();
    assert_eq!(on_first.deleted_names.len(), 1);
    assert!(on_first.in_use_subnets.is_empty());

    let on_second = h.snat.delete(&bigip2, &shared, "t1").await.unwrap();
    assert!(on_second.deleted_names.is_empty());
    assert_eq!(h.client.object_count("bigip2").await, 2);
}

/// Scenario:
/// 1. One tenant assures eleven translations of a subnet
/// 2. The tenant leaves: every translation is released, including the
///    ones whose names extend another translation's name (`_1` and `_10`)
#[tokio::test]
async fn test_eleven_translations_all_released() {
    let h = harness(AgentConfig {
        f5_snat_addresses_per_subnet: 11,
        ..AgentConfig::default()
    });
    let device = Device::new("bigip1");
    let private = subnet("s1", 2, false);

    let addresses = h.snat.get_addresses(&private, "t1").await.unwrap();
    assert_eq!(addresses.len(), 11);
    h.snat.assure(&device, &private, &addresses, "t1").await.unwrap();
    assert_eq!(h.client.object_count("bigip1").await, 12);

    let release = h.snat.delete(&device, &private, "t1").await.unwrap();

    assert_eq!(release.deleted_names.len(), 11);
    assert!(release.deleted_names.contains("snat-traffic-group-local-only-s1_1"));
    assert!(release.deleted_names.contains("snat-traffic-group-local-only-s1_10"));
    assert!(release.in_use_subnets.is_empty());
    assert_eq!(h.l3.unbind_count().await, 11);
    assert_eq!(h.client.object_count("bigip1").await, 0);
}

/// A subnet whose id prefixes another tenant's subnet id is not held by it
#[tokio::test]
async fn test_subnet_id_prefix_is_not_a_reference() {
    let h = harness(AgentConfig::default());
    let device = Device::new("bigip1");
    let short = subnet("s1", 2, false);
    let long = subnet("s10", 2, false);

    let addresses = h.snat.get_addresses(&short, "t1").await.unwrap();
    h.snat.assure(&device, &short, &addresses, "t1").await.unwrap();
    let addresses = h.snat.get_addresses(&long, "t2").await.unwrap();
    h.snat.assure(&device, &long, &addresses, "t2").await.unwrap();

    let release = h.snat.delete(&device, &short, "t1").await.unwrap();

    assert_eq!(
        release.deleted_names,
        BTreeSet::from(["snat-traffic-group-local-only-s1_0".to_string()])
    );
    assert!(release.in_use_subnets.is_empty());

    let other = h.snat.delete(&device, &long, "t2").await.unwrap();
    assert_eq!(other.deleted_names.len(), 1);
    assert_eq!(h.client.object_count("bigip1").await, 0);
}

/// Scenario:
/// 1. Scale-out fleet: the tenant's translation floats with its hashed group
/// 2. A second tenant on the same shared subnet keeps it in use
/// 3. Both leave and the translations are released
#[tokio::test]
async fn test_scale_out_translation_round_trip() {
    let config = AgentConfig {
        f5_ha_type: "scalen".to_string(),
        traffic_groups: vec![
            "/Common/traffic-group-2".to_string(),
            "/Common/traffic-group-3".to_string(),
        ],
        ..AgentConfig::default()
    };
    let adapter = ModelAdapter::new(&config);
    let group_of = |tenant: &str| {
        let group = adapter.tenant_to_traffic_group(tenant).unwrap();
        group.rsplit('/').next().unwrap().to_string()
    };
    let h = harness(config.clone());
    let device = Device::new("bigip1");
    let shared = subnet("shared-subnet", 0, true);

    for tenant in ["t1", "t2"] {
        let addresses = h.snat.get_addresses(&shared, tenant).await.unwrap();
        h.snat.assure(&device, &shared, &addresses, tenant).await.unwrap();
    }

    let group = group_of("t1");
    let name = format!("snat-{}-shared-subnet_0", group);
    DeviceVerifier::new(&h.client)
        .assert_attribute(
            "bigip1",
            ResourceKind::SnatTranslation,
            &ResourceKey::new("Common", &name),
            "trafficGroup",
            group.as_str(),
        )
        .await
        .expect("translation in the tenant's traffic group");

    let first = h.snat.delete(&device, &shared, "t1").await.unwrap();
    assert_eq!(first.in_use_subnets, BTreeSet::from(["shared-subnet".to_string()]));
    if group_of("t2") == group {
        assert!(first.deleted_names.is_empty());
    } else {
        assert_eq!(first.deleted_names, BTreeSet::from([name.clone()]));
    }

    let second = h.snat.delete(&device, &shared, "t2").await.unwrap();
    assert!(second.in_use_subnets.is_empty());
    assert_eq!(second.deleted_names, BTreeSet::from([format!("snat-{}-shared-subnet_0", group_of("t2"))]));
    assert_eq!(h.client.object_count("bigip1").await, 0);
}
