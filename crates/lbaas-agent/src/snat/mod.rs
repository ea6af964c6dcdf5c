//! Shared-address (SNAT) lifecycle.
//!
//! Every tenant subnet reached by a load balancer gets N translation
//! addresses on each device, collected in a per-tenant SNAT pool. The
//! translations are shared between tenants using the same subnet, so
//! deletion consults live reference counts before removing anything and
//! reports which address names the caller may release upstream.

mod cache;
mod naming;

pub use cache::AssuredSubnetCache;
pub use naming::SnatNames;

use std::collections::BTreeSet;
use std::sync::Arc;

use lbaas_common::descriptor::attrs;
use lbaas_common::{Descriptor, LbaasError, LbaasResult, Mutation, ResourceKey};
use tracing::{debug, error, info, instrument};

use crate::adapter::{ModelAdapter, COMMON_PARTITION};
use crate::config::AgentConfig;
use crate::device::{Device, L3Binding, Network, NetworkHelper, PortAllocator, SubnetInfo};
use crate::resource::ResourceManagers;

/// Outcome of removing a tenant's SNAT addresses from a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnatRelease {
    /// Translation names no longer referenced on the device
    pub deleted_names: BTreeSet<String>,
    /// Subnets still referenced by another tenant or pool
    pub in_use_subnets: BTreeSet<String>,
    /// Device changes made
    pub mutations: Vec<Mutation>,
}

/// Manages SNAT translations and pools.
pub struct SnatManager {
    config: AgentConfig,
    adapter: ModelAdapter,
    managers: ResourceManagers,
    network: Arc<dyn NetworkHelper>,
    ports: Arc<dyn PortAllocator>,
    l3_binding: Option<Arc<dyn L3Binding>>,
    cache: AssuredSubnetCache,
}

impl SnatManager {
    /// Creates a manager without network-layer binding.
    pub fn new(
        config: AgentConfig,
        managers: ResourceManagers,
        network: Arc<dyn NetworkHelper>,
        ports: Arc<dyn PortAllocator>,
    ) -> Self {
        Self {
            adapter: ModelAdapter::new(&config),
            config,
            managers,
            network,
            ports,
            l3_binding: None,
            cache: AssuredSubnetCache::new(),
        }
    }

    /// Binds translation addresses at the network layer.
    pub fn with_l3_binding(mut self, l3_binding: Arc<dyn L3Binding>) -> Self {
        self.l3_binding = Some(l3_binding);
        self
    }

    /// Returns the assured-subnet memo.
    pub fn cache(&self) -> &AssuredSubnetCache {
        &self.cache
    }

    /// Resolves the translation names, logging why they cannot be.
    fn names(&self, tenant_id: &str, subnet_id: &str) -> Option<SnatNames> {
        let topology = match self.config.ha_topology() {
            Ok(topology) => topology,
            Err(e) => {
                error!("Skipping SNAT for subnet {}: {}", subnet_id, e);
                return None;
            }
        };
        let names = SnatNames::resolve(topology, &self.adapter, tenant_id, subnet_id);
        if names.is_none() {
            error!("Skipping SNAT for subnet {}: no traffic group configured", subnet_id);
        }
        names
    }

    fn network_folder(&self, network: &Network, tenant_id: &str) -> String {
        if self.network.is_common_network(network) {
            COMMON_PARTITION.to_string()
        } else {
            self.adapter.folder_name(Some(tenant_id))
        }
    }

    fn pool_key(&self, tenant_id: &str) -> ResourceKey {
        ResourceKey::new(self.adapter.folder_name(Some(tenant_id)), tenant_id)
    }

    /// Returns the translation addresses of a subnet, allocating missing ones.
    ///
    /// An existing port named after a translation is reused; otherwise a new
    /// port with one address is requested on the subnet.
    #[instrument(skip(self, subnet), fields(subnet = %subnet.subnet_id))]
    pub async fn get_addresses(&self, subnet: &SubnetInfo, tenant_id: &str) -> LbaasResult<Vec<String>> {
        let Some(names) = self.names(tenant_id, &subnet.subnet_id) else {
            return Ok(Vec::new());
        };

        let mut addresses = Vec::with_capacity(self.config.f5_snat_addresses_per_subnet);
        for index in 0..self.config.f5_snat_addresses_per_subnet {
            let name = names.index_name(index);
            let ports = self.ports.get_port_by_name(&name).await?;

            let port = match ports.into_iter().next() {
                Some(port) => port,
                None => {
                    debug!("Allocating port {} on subnet {}", name, subnet.subnet_id);
                    self.ports
                        .create_port_on_subnet(&subnet.subnet_id, None, &name, 1)
                        .await?
                }
            };

            let address = port
                .first_ip()
                .ok_or_else(|| LbaasError::network("get_addresses", format!("port {} has no address", name)))?;
            addresses.push(address.to_string());
        }
        Ok(addresses)
    }

    /// Ensures the translations of a tenant's subnet exist on a device.
    ///
    /// Does nothing when the (tenant, subnet) pair is already assured on the
    /// device.
    #[instrument(skip(self, device, subnet, addresses), fields(device = %device.hostname, subnet = %subnet.subnet_id))]
    pub async fn assure(
        &self,
        device: &Device,
        subnet: &SubnetInfo,
        addresses: &[String],
        tenant_id: &str,
    ) -> LbaasResult<Vec<Mutation>> {
        let subnet_id = subnet.subnet_id.as_str();
        if self.cache.contains(&device.hostname, tenant_id, subnet_id) {
            return Ok(Vec::new());
        }
        let Some(names) = self.names(tenant_id, subnet_id) else {
            return Ok(Vec::new());
        };
        let network = subnet
            .network
            .as_ref()
            .ok_or_else(|| LbaasError::network("assure_snats", format!("subnet {} has no network", subnet_id)))?;

        let count = self.config.f5_snat_addresses_per_subnet;
        if addresses.len() < count {
            return Err(LbaasError::mapping(
                "addresses",
                format!("{} addresses given, {} required", addresses.len(), count),
            ));
        }

        let folder = self.network_folder(network, tenant_id);
        let pool_key = self.pool_key(tenant_id);
        let mut mutations = Vec::new();

        for (index, address) in addresses.iter().take(count).enumerate() {
            let name = names.index_name(index);
            let ip_address = format!("{}%{}", address, network.route_domain_id);
            let key = ResourceKey::new(&folder, &name);

            let translation = Descriptor::new()
                .with(attrs::NAME, name.as_str())
                .with(attrs::PARTITION, folder.as_str())
                .with(attrs::ADDRESS, ip_address.as_str())
                .with(attrs::TRAFFIC_GROUP, names.traffic_group.as_str());
            mutations.extend(
                self.managers
                    .snat_translations
                    .create_if_absent(device, &key, &translation)
                    .await?,
            );

            let path = key.full_path();
            match self.managers.snat_pools.load(device, &pool_key).await? {
                Some(pool) => {
                    let mut members = pool.list(attrs::MEMBERS);
                    if !members.contains(&path) {
                        members.push(path);
                        let mut patch = Descriptor::new();
                        patch.set_list(attrs::MEMBERS, members);
                        mutations.extend(self.managers.snat_pools.update(device, &pool_key, &patch).await?);
                    }
                }
                None => {
                    let mut pool = Descriptor::new()
                        .with(attrs::NAME, pool_key.name.as_str())
                        .with(attrs::PARTITION, pool_key.partition.as_str());
                    pool.set_list(attrs::MEMBERS, vec![path]);
                    mutations.push(self.managers.snat_pools.create(device, &pool_key, &pool).await?);
                }
            }

            if let Some(l3) = &self.l3_binding {
                l3.bind_address(subnet_id, &ip_address).await?;
            }
        }

        self.cache.mark(&device.hostname, tenant_id, subnet_id);
        info!("Assured {} SNAT addresses for tenant {}", count, tenant_id);
        Ok(mutations)
    }

    /// Removes a tenant's translations for a subnet from a device.
    ///
    /// The tenant's pool membership is always removed; a translation object
    /// is deleted (and its address unbound) only once no SNAT pool on the
    /// device references it any more.
    #[instrument(skip(self, device, subnet), fields(device = %device.hostname, subnet = %subnet.subnet_id))]
    pub async fn delete(&self, device: &Device, subnet: &SubnetInfo, tenant_id: &str) -> LbaasResult<SnatRelease> {
        let subnet_id = subnet.subnet_id.as_str();
        let Some(network) = subnet.network.as_ref() else {
            error!("Cannot delete SNAT addresses of subnet {}: network is missing", subnet_id);
            return Ok(SnatRelease::default());
        };
        let Some(names) = self.names(tenant_id, subnet_id) else {
            return Ok(SnatRelease::default());
        };

        let folder = self.network_folder(network, tenant_id);
        let pool_key = self.pool_key(tenant_id);
        let mut release = SnatRelease::default();

        for index in 0..self.config.f5_snat_addresses_per_subnet {
            let name = names.index_name(index);
            let key = ResourceKey::new(&folder, &name);
            let path = key.full_path();

            if let Some(pool) = self.managers.snat_pools.load(device, &pool_key).await? {
                let before = pool.list(attrs::MEMBERS);
                let members: Vec<String> = before.iter().filter(|m| **m != path).cloned().collect();

                if members.is_empty() {
                    debug!("SNAT pool {} is empty, deleting", pool_key);
                    release
                        .mutations
                        .extend(self.managers.snat_pools.delete(device, &pool_key).await?);
                } else if members.len() != before.len() {
                    let mut patch = Descriptor::new();
                    patch.set_list(attrs::MEMBERS, members);
                    release
                        .mutations
                        .extend(self.managers.snat_pools.update(device, &pool_key, &patch).await?);
                }
            }

            let references = self.network.snat_pool_member_use_count(device, &path).await?;
            if references > 0 {
                debug!("Translation {} still referenced {} times", path, references);
                continue;
            }

            if let Some(translation) = self.managers.snat_translations.load(device, &key).await? {
                if let (Some(l3), Some(address)) = (&self.l3_binding, translation.get_str(attrs::ADDRESS)) {
                    l3.unbind_address(subnet_id, address).await?;
                }
                release
                    .mutations
                    .extend(self.managers.snat_translations.delete(device, &key).await?);
            }
            release.deleted_names.insert(name);
        }

        self.cache.remove(&device.hostname, tenant_id, subnet_id);
        if self.cache.is_subnet_in_use(&device.hostname, subnet_id)
            || self.subnet_member_count(device, subnet_id).await? > 0
        {
            release.in_use_subnets.insert(subnet_id.to_string());
        }

        info!(
            "Removed SNAT addresses of tenant {}: {} released",
            tenant_id,
            release.deleted_names.len()
        );
        Ok(release)
    }

    /// Counts SNAT pool members on a device naming any translation of the
    /// subnet, in any folder and under any traffic group.
    async fn subnet_member_count(&self, device: &Device, subnet_id: &str) -> LbaasResult<usize> {
        let Ok(topology) = self.config.ha_topology() else {
            return Ok(0);
        };
        let mut count = 0;
        for names in SnatNames::for_subnet(topology, &self.adapter, subnet_id) {
            for index in 0..self.config.f5_snat_addresses_per_subnet {
                count += self
                    .network
                    .snat_pool_member_name_count(device, &names.index_name(index))
                    .await?;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{FixedIp, MemoryDeviceClient, Port};
    use async_trait::async_trait;
    use lbaas_common::ResourceKind;
    use pretty_assertions::assert_eq;
    use tokio::sync::Mutex;

    /// Hands out 10.0.0.<n> addresses and remembers ports by name.
    #[derive(Default)]
    struct CountingPorts {
        ports: Mutex<Vec<Port>>,
    }

    #[async_trait]
    impl PortAllocator for CountingPorts {
        async fn get_port_by_name(&self, name: &str) -> LbaasResult<Vec<Port>> {
            let ports = self.ports.lock().await;
            Ok(ports.iter().filter(|p| p.name == name).cloned().collect())
        }

        async fn create_port_on_subnet(
            &self,
            subnet_id: &str,
            _mac_address: Option<&str>,
            name: &str,
            _fixed_address_count: usize,
        ) -> LbaasResult<Port> {
            let mut ports = self.ports.lock().await;
            let port = Port {
                id: format!("port-{}", ports.len()),
                name: name.to_string(),
                fixed_ips: vec![FixedIp {
                    ip_address: format!("10.0.0.{}", ports.len() + 10),
                    subnet_id: subnet_id.to_string(),
                }],
            };
            ports.push(port.clone());
            Ok(port)
        }
    }

    fn subnet() -> SubnetInfo {
        SubnetInfo {
            subnet_id: "s1".to_string(),
            network: Some(Network {
                id: "n1".to_string(),
                route_domain_id: 2,
                shared: false,
            }),
        }
    }

    fn manager(config: AgentConfig) -> (Arc<MemoryDeviceClient>, Arc<CountingPorts>, SnatManager) {
        let client = Arc::new(MemoryDeviceClient::new());
        let ports = Arc::new(CountingPorts::default());
        let manager = SnatManager::new(
            config,
            ResourceManagers::new(client.clone()),
            client.clone(),
            ports.clone(),
        );
        (client, ports, manager)
    }

    #[tokio::test]
    async fn test_get_addresses_reuses_ports() {
        let (_, ports, manager) = manager(AgentConfig::default());

        let first = manager.get_addresses(&subnet(), "t1").await.unwrap();
        let second = manager.get_addresses(&subnet(), "t1").await.unwrap();

        assert_eq!(first, vec!["10.0.0.10".to_string()]);
        assert_eq!(first, second);
        assert_eq!(ports.ports.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_assure_creates_translation_and_pool() {
        let (client, _, manager) = manager(AgentConfig::default());
        let device = Device::new("bigip1");
        let addresses = manager.get_addresses(&subnet(), "t1").await.unwrap();

        let mutations = manager.assure(&device, &subnet(), &addresses, "t1").await.unwrap();
        assert_eq!(mutations.len(), 2);

        let key = ResourceKey::new("Project_t1", "snat-traffic-group-local-only-s1_0");
        let translation = client.get("bigip1", ResourceKind::SnatTranslation, &key).await.unwrap();
        assert_eq!(translation.get_str("address"), Some("10.0.0.10%2"));
        assert_eq!(translation.get_str("trafficGroup"), Some("traffic-group-local-only"));

        let pool = client
            .get("bigip1", ResourceKind::SnatPool, &ResourceKey::new("Project_t1", "t1"))
            .await
            .unwrap();
        assert_eq!(pool.list("members"), vec![key.full_path()]);
        assert!(manager.cache().contains("bigip1", "t1", "s1"));

        // Memoized: no device calls the second time
        client.clear_op_log().await;
        let again = manager.assure(&device, &subnet(), &addresses, "t1").await.unwrap();
        assert!(again.is_empty());
        assert!(client.op_log().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_topology_skips() {
        let (client, _, manager) = manager(AgentConfig {
            f5_ha_type: "ring".to_string(),
            ..AgentConfig::default()
        });
        let device = Device::new("bigip1");

        assert!(manager.get_addresses(&subnet(), "t1").await.unwrap().is_empty());
        let mutations = manager
            .assure(&device, &subnet(), &["10.0.0.10".to_string()], "t1")
            .await
            .unwrap();
        assert!(mutations.is_empty());
        assert!(client.op_log().await.is_empty());
    }

    #[tokio::test]
    async fn test_common_network_uses_common_partition() {
        let (client, _, manager) = manager(AgentConfig::default());
        let device = Device::new("bigip1");
        let mut shared = subnet();
        if let Some(network) = shared.network.as_mut() {
            network.shared = true;
        }

        manager
            .assure(&device, &shared, &["10.0.0.10".to_string()], "t1")
            .await
            .unwrap();

        let key = ResourceKey::new("Common", "snat-traffic-group-local-only-s1_0");
        assert!(client.get("bigip1", ResourceKind::SnatTranslation, &key).await.is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_network() {
        let (_, _, manager) = manager(AgentConfig::default());
        let release = manager
            .delete(
                &Device::new("bigip1"),
                &SubnetInfo {
                    subnet_id: "s1".to_string(),
                    network: None,
                },
                "t1",
            )
            .await
            .unwrap();
        assert_eq!(release, SnatRelease::default());
    }

    #[tokio::test]
    async fn test_delete_last_tenant_releases_everything() {
        let (client, _, manager) = manager(AgentConfig::default());
        let device = Device::new("bigip1");
        manager
            .assure(&device, &subnet(), &["10.0.0.10".to_string()], "t1")
            .await
            .unwrap();

        let release = manager.delete(&device, &subnet(), "t1").await.unwrap();

        assert_eq!(
            release.deleted_names,
            BTreeSet::from(["snat-traffic-group-local-only-s1_0".to_string()])
        );
        assert!(release.in_use_subnets.is_empty());
        assert_eq!(client.object_count("bigip1").await, 0);
        assert!(!manager.cache().contains("bigip1", "t1", "s1"));
    }
}
