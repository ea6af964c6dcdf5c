//! Device and network collaborator seams.
//!
//! The engine never talks to an appliance or to the network control plane
//! directly. Everything goes through the traits below, held as
//! `Arc<dyn Trait>` so a real REST client, the in-memory fleet and test
//! doubles are interchangeable.

mod memory;
mod ports;

pub use memory::{DeviceObject, DeviceOp, MemoryDeviceClient, DEFAULT_OP_LOG_CAPACITY};
pub use ports::MemoryPortAllocator;

use async_trait::async_trait;
use lbaas_common::{Descriptor, LbaasResult, ResourceKey, ResourceKind};
use serde::{Deserialize, Serialize};

/// One appliance of the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Device {
    /// Management hostname
    pub hostname: String,
}

impl Device {
    /// Creates a device handle.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

/// CRUD transport to an appliance.
///
/// `update` is an attribute merge: attributes absent from the descriptor
/// keep their current device value.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Loads an object, `None` if it does not exist.
    async fn load(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> LbaasResult<Option<Descriptor>>;

    /// Creates an object.
    async fn create(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
        descriptor: &Descriptor,
    ) -> LbaasResult<()>;

    /// Updates the supplied attributes of an existing object.
    async fn update(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
        descriptor: &Descriptor,
    ) -> LbaasResult<()>;

    /// Deletes an object.
    async fn delete(&self, device: &Device, kind: ResourceKind, key: &ResourceKey) -> LbaasResult<()>;
}

/// Network-layer address binding.
#[async_trait]
pub trait L3Binding: Send + Sync {
    /// Binds an address on a subnet.
    async fn bind_address(&self, subnet_id: &str, ip_address: &str) -> LbaasResult<()>;

    /// Releases an address binding.
    async fn unbind_address(&self, subnet_id: &str, ip_address: &str) -> LbaasResult<()>;
}

/// Network topology queries.
#[async_trait]
pub trait NetworkHelper: Send + Sync {
    /// Returns true for shared networks whose objects live in `Common`.
    fn is_common_network(&self, network: &Network) -> bool;

    /// Counts SNAT pool members on the device equal to the translation
    /// path `path`.
    async fn snat_pool_member_use_count(&self, device: &Device, path: &str) -> LbaasResult<usize>;

    /// Counts SNAT pool members whose translation name, the last path
    /// segment, is exactly `name`, whatever folder it lives in.
    async fn snat_pool_member_name_count(&self, device: &Device, name: &str) -> LbaasResult<usize>;
}

/// Address allocation from the network control plane.
#[async_trait]
pub trait PortAllocator: Send + Sync {
    /// Returns ports already allocated under `name`.
    async fn get_port_by_name(&self, name: &str) -> LbaasResult<Vec<Port>>;

    /// Allocates a port with `fixed_address_count` addresses on a subnet.
    async fn create_port_on_subnet(
        &self,
        subnet_id: &str,
        mac_address: Option<&str>,
        name: &str,
        fixed_address_count: usize,
    ) -> LbaasResult<Port>;
}

/// Address assigned to a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIp {
    /// Assigned address
    pub ip_address: String,
    /// Subnet the address belongs to
    pub subnet_id: String,
}

/// Network port holding allocated addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port id
    pub id: String,
    /// Port name
    pub name: String,
    /// Allocated addresses
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

impl Port {
    /// Returns the first allocated address.
    pub fn first_ip(&self) -> Option<&str> {
        self.fixed_ips.first().map(|ip| ip.ip_address.as_str())
    }
}

/// Tenant network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Network {
    /// Network id
    pub id: String,
    /// Route domain the network is isolated in
    #[serde(default)]
    pub route_domain_id: u32,
    /// Shared across tenants
    #[serde(default)]
    pub shared: bool,
}

/// Subnet binding hint passed to the shared-address manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubnetInfo {
    /// Subnet id
    pub subnet_id: String,
    /// Network holding the subnet, if known
    #[serde(default)]
    pub network: Option<Network>,
}
