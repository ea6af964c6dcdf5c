//! In-memory device fleet used for dry runs and tests.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use lbaas_common::descriptor::attrs;
use lbaas_common::{Action, Descriptor, LbaasError, LbaasResult, ResourceKey, ResourceKind};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Device, DeviceClient, Network, NetworkHelper};

type ObjectTable = BTreeMap<(ResourceKind, ResourceKey), Descriptor>;

/// Number of mutating calls the op log keeps; older entries are dropped.
pub const DEFAULT_OP_LOG_CAPACITY: usize = 10_000;

/// A mutating call recorded by the in-memory fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceOp {
    /// Device hostname
    pub device: String,
    /// What was done
    pub action: Action,
    /// Resource kind
    pub kind: ResourceKind,
    /// Resource address
    pub key: ResourceKey,
}

/// One object as reported by [`MemoryDeviceClient::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceObject {
    /// Resource kind
    pub kind: ResourceKind,
    /// Resource path
    pub path: String,
    /// Current attributes
    pub attributes: Descriptor,
}

#[derive(Debug)]
struct FleetState {
    devices: BTreeMap<String, ObjectTable>,
    ops: VecDeque<DeviceOp>,
    op_capacity: usize,
}

impl Default for FleetState {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
            ops: VecDeque::new(),
            op_capacity: DEFAULT_OP_LOG_CAPACITY,
        }
    }
}

impl FleetState {
    fn record(&mut self, device: &Device, action: Action, kind: ResourceKind, key: &ResourceKey) {
        if self.op_capacity == 0 {
            return;
        }
        while self.ops.len() >= self.op_capacity {
            self.ops.pop_front();
        }
        self.ops.push_back(DeviceOp {
            device: device.hostname.clone(),
            action,
            kind,
            key: key.clone(),
        });
    }
}

/// Device client keeping every device's objects in memory.
///
/// Behaves like an appliance: creating an existing object or a member of a
/// missing pool fails, updates merge attributes, deleting a pool removes its
/// members. The op log keeps the most recent [`DEFAULT_OP_LOG_CAPACITY`]
/// calls unless another capacity is set.
#[derive(Debug, Default)]
pub struct MemoryDeviceClient {
    state: RwLock<FleetState>,
}

impl MemoryDeviceClient {
    /// Creates an empty fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty fleet whose op log keeps at most `capacity` calls.
    pub fn with_op_log_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(FleetState {
                op_capacity: capacity,
                ..FleetState::default()
            }),
        }
    }

    /// Returns an object's current attributes.
    pub async fn get(&self, hostname: &str, kind: ResourceKind, key: &ResourceKey) -> Option<Descriptor> {
        let state = self.state.read().await;
        state
            .devices
            .get(hostname)
            .and_then(|objects| objects.get(&(kind, key.clone())))
            .cloned()
    }

    /// Returns every object of one kind on a device.
    pub async fn list(&self, hostname: &str, kind: ResourceKind) -> Vec<(ResourceKey, Descriptor)> {
        let state = self.state.read().await;
        state
            .devices
            .get(hostname)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|((k, _), _)| *k == kind)
                    .map(|((_, key), d)| (key.clone(), d.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of objects on a device.
    pub async fn object_count(&self, hostname: &str) -> usize {
        let state = self.state.read().await;
        state.devices.get(hostname).map_or(0, BTreeMap::len)
    }

    /// Returns the retained mutating calls in order.
    pub async fn op_log(&self) -> Vec<DeviceOp> {
        self.state.read().await.ops.iter().cloned().collect()
    }

    /// Forgets the recorded calls.
    pub async fn clear_op_log(&self) {
        self.state.write().await.ops.clear();
    }

    async fn snat_pool_members(&self, hostname: &str) -> Vec<String> {
        self.list(hostname, ResourceKind::SnatPool)
            .await
            .iter()
            .flat_map(|(_, pool)| pool.list(attrs::MEMBERS))
            .collect()
    }

    /// Returns the object tree of every device.
    pub async fn snapshot(&self) -> BTreeMap<String, Vec<DeviceObject>> {
        let state = self.state.read().await;
        state
            .devices
            .iter()
            .map(|(hostname, objects)| {
                let objects = objects
                    .iter()
                    .map(|((kind, key), d)| DeviceObject {
                        kind: *kind,
                        path: key.to_string(),
                        attributes: d.clone(),
                    })
                    .collect();
                (hostname.clone(), objects)
            })
            .collect()
    }
}

#[async_trait]
impl DeviceClient for MemoryDeviceClient {
    async fn load(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> LbaasResult<Option<Descriptor>> {
        Ok(self.get(&device.hostname, kind, key).await)
    }

    async fn create(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
        descriptor: &Descriptor,
    ) -> LbaasResult<()> {
        let mut state = self.state.write().await;
        let objects = state.devices.entry(device.hostname.clone()).or_default();

        if objects.contains_key(&(kind, key.clone())) {
            return Err(LbaasError::device(
                "create",
                kind.as_str(),
                key.to_string(),
                "object already exists",
            ));
        }

        if let Some(parent) = &key.parent {
            let pool = ResourceKey::new(&key.partition, parent);
            if !objects.contains_key(&(ResourceKind::Pool, pool.clone())) {
                return Err(LbaasError::device(
                    "create",
                    kind.as_str(),
                    key.to_string(),
                    format!("parent pool {} does not exist", pool),
                ));
            }
        }

        objects.insert((kind, key.clone()), descriptor.clone());
        state.record(device, Action::Created, kind, key);
        debug!("{}: created {} {}", device.hostname, kind, key);
        Ok(())
    }

    async fn update(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
        descriptor: &Descriptor,
    ) -> LbaasResult<()> {
        let mut state = self.state.write().await;
        let current = state
            .devices
            .get_mut(&device.hostname)
            .and_then(|objects| objects.get_mut(&(kind, key.clone())))
            .ok_or_else(|| LbaasError::not_found(kind.as_str(), key.to_string()))?;

        current.merge(descriptor);
        state.record(device, Action::Updated, kind, key);
        debug!("{}: updated {} {}", device.hostname, kind, key);
        Ok(())
    }

    async fn delete(&self, device: &Device, kind: ResourceKind, key: &ResourceKey) -> LbaasResult<()> {
        let mut state = self.state.write().await;
        let objects = state
            .devices
            .get_mut(&device.hostname)
            .ok_or_else(|| LbaasError::not_found(kind.as_str(), key.to_string()))?;

        if objects.remove(&(kind, key.clone())).is_none() {
            return Err(LbaasError::not_found(kind.as_str(), key.to_string()));
        }

        if kind == ResourceKind::Pool {
            objects.retain(|(k, child), _| {
                !(*k == ResourceKind::PoolMember
                    && child.partition == key.partition
                    && child.parent.as_deref() == Some(key.name.as_str()))
            });
        }

        state.record(device, Action::Deleted, kind, key);
        debug!("{}: deleted {} {}", device.hostname, kind, key);
        Ok(())
    }
}

#[async_trait]
impl NetworkHelper for MemoryDeviceClient {
    fn is_common_network(&self, network: &Network) -> bool {
        network.shared
    }

    async fn snat_pool_member_use_count(&self, device: &Device, path: &str) -> LbaasResult<usize> {
        let count = self
            .snat_pool_members(&device.hostname)
            .await
            .iter()
            .filter(|member| member.as_str() == path)
            .count();
        Ok(count)
    }

    async fn snat_pool_member_name_count(&self, device: &Device, name: &str) -> LbaasResult<usize> {
        let count = self
            .snat_pool_members(&device.hostname)
            .await
            .iter()
            .filter(|member| member.rsplit('/').next() == Some(name))
            .count();
        Ok(count)
    }
}
