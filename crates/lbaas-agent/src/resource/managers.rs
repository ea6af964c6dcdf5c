//! Per-kind resource managers.

use std::sync::Arc;

use lbaas_common::{Descriptor, LbaasError, LbaasResult, Mutation, ResourceKey, ResourceKind};

use super::ResourceHelper;
use crate::device::{Device, DeviceClient};

/// Virtual servers.
#[derive(Clone)]
pub struct VirtualServerManager {
    helper: ResourceHelper,
}

impl VirtualServerManager {
    fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            helper: ResourceHelper::new(ResourceKind::VirtualServer, client),
        }
    }

    /// Creates or updates a virtual server.
    pub async fn assure(&self, device: &Device, key: &ResourceKey, vs: &Descriptor) -> LbaasResult<Option<Mutation>> {
        self.helper.create_or_update(device, key, vs).await
    }

    /// Applies attributes to a virtual server that must exist.
    pub async fn update(&self, device: &Device, key: &ResourceKey, patch: &Descriptor) -> LbaasResult<Option<Mutation>> {
        self.helper.update(device, key, patch).await
    }

    /// Applies attributes if the virtual server exists.
    pub async fn update_if_exists(
        &self,
        device: &Device,
        key: &ResourceKey,
        patch: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        self.helper.update_if_exists(device, key, patch).await
    }

    /// Deletes a virtual server if present.
    pub async fn delete(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Mutation>> {
        self.helper.delete_if_exists(device, key).await
    }
}

/// Pools.
#[derive(Clone)]
pub struct PoolManager {
    helper: ResourceHelper,
}

impl PoolManager {
    fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            helper: ResourceHelper::new(ResourceKind::Pool, client),
        }
    }

    /// Creates or updates a pool.
    pub async fn assure(&self, device: &Device, key: &ResourceKey, pool: &Descriptor) -> LbaasResult<Option<Mutation>> {
        self.helper.create_or_update(device, key, pool).await
    }

    /// Updates a pool that must exist.
    pub async fn update(&self, device: &Device, key: &ResourceKey, pool: &Descriptor) -> LbaasResult<Option<Mutation>> {
        self.helper.update(device, key, pool).await
    }

    /// Updates a pool if present.
    pub async fn update_if_exists(
        &self,
        device: &Device,
        key: &ResourceKey,
        pool: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        self.helper.update_if_exists(device, key, pool).await
    }

    /// Returns true if the pool exists.
    pub async fn exists(&self, device: &Device, key: &ResourceKey) -> LbaasResult<bool> {
        self.helper.exists(device, key).await
    }

    /// Deletes a pool if present.
    pub async fn delete(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Mutation>> {
        self.helper.delete_if_exists(device, key).await
    }
}

/// Health monitors of every supported type.
#[derive(Clone)]
pub struct MonitorManager {
    http: ResourceHelper,
    https: ResourceHelper,
    tcp: ResourceHelper,
}

impl MonitorManager {
    fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            http: ResourceHelper::new(ResourceKind::HttpMonitor, client.clone()),
            https: ResourceHelper::new(ResourceKind::HttpsMonitor, client.clone()),
            tcp: ResourceHelper::new(ResourceKind::TcpMonitor, client),
        }
    }

    fn helper(&self, kind: ResourceKind) -> LbaasResult<&ResourceHelper> {
        match kind {
            ResourceKind::HttpMonitor => Ok(&self.http),
            ResourceKind::HttpsMonitor => Ok(&self.https),
            ResourceKind::TcpMonitor => Ok(&self.tcp),
            other => Err(LbaasError::internal(format!("{} is not a monitor kind", other))),
        }
    }

    /// Creates or updates a monitor.
    pub async fn assure(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
        monitor: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        self.helper(kind)?.create_or_update(device, key, monitor).await
    }

    /// Deletes a monitor if present.
    pub async fn delete(&self, device: &Device, kind: ResourceKind, key: &ResourceKey) -> LbaasResult<Option<Mutation>> {
        self.helper(kind)?.delete_if_exists(device, key).await
    }
}

/// Pool members.
#[derive(Clone)]
pub struct MemberManager {
    helper: ResourceHelper,
    pools: ResourceHelper,
}

impl MemberManager {
    fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            helper: ResourceHelper::new(ResourceKind::PoolMember, client.clone()),
            pools: ResourceHelper::new(ResourceKind::Pool, client),
        }
    }

    /// Creates or updates a member inside an existing pool.
    ///
    /// Fails with `NotFound` when the pool is missing on the device.
    pub async fn assure(
        &self,
        device: &Device,
        pool_key: &ResourceKey,
        key: &ResourceKey,
        member: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        if !self.pools.exists(device, pool_key).await? {
            return Err(LbaasError::not_found(ResourceKind::Pool.as_str(), pool_key.to_string()));
        }
        self.helper.create_or_update(device, key, member).await
    }

    /// Deletes a member if present.
    pub async fn delete(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Mutation>> {
        self.helper.delete_if_exists(device, key).await
    }
}

/// SNAT translation addresses.
#[derive(Clone)]
pub struct SnatTranslationManager {
    helper: ResourceHelper,
}

impl SnatTranslationManager {
    fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            helper: ResourceHelper::new(ResourceKind::SnatTranslation, client),
        }
    }

    /// Loads a translation.
    pub async fn load(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Descriptor>> {
        self.helper.load(device, key).await
    }

    /// Creates a translation unless one with the same key exists.
    pub async fn create_if_absent(
        &self,
        device: &Device,
        key: &ResourceKey,
        translation: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        if self.helper.exists(device, key).await? {
            return Ok(None);
        }
        self.helper.create(device, key, translation).await.map(Some)
    }

    /// Deletes a translation if present.
    pub async fn delete(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Mutation>> {
        self.helper.delete_if_exists(device, key).await
    }
}

/// SNAT pools.
#[derive(Clone)]
pub struct SnatPoolManager {
    helper: ResourceHelper,
}

impl SnatPoolManager {
    fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            helper: ResourceHelper::new(ResourceKind::SnatPool, client),
        }
    }

    /// Loads a SNAT pool.
    pub async fn load(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Descriptor>> {
        self.helper.load(device, key).await
    }

    /// Creates a SNAT pool.
    pub async fn create(&self, device: &Device, key: &ResourceKey, pool: &Descriptor) -> LbaasResult<Mutation> {
        self.helper.create(device, key, pool).await
    }

    /// Updates an existing SNAT pool.
    pub async fn update(&self, device: &Device, key: &ResourceKey, pool: &Descriptor) -> LbaasResult<Option<Mutation>> {
        self.helper.update(device, key, pool).await
    }

    /// Deletes a SNAT pool if present.
    pub async fn delete(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Mutation>> {
        self.helper.delete_if_exists(device, key).await
    }
}

/// All resource managers over one device client.
#[derive(Clone)]
pub struct ResourceManagers {
    /// Virtual servers
    pub virtual_servers: VirtualServerManager,
    /// Pools
    pub pools: PoolManager,
    /// Health monitors
    pub monitors: MonitorManager,
    /// Pool members
    pub members: MemberManager,
    /// SNAT translations
    pub snat_translations: SnatTranslationManager,
    /// SNAT pools
    pub snat_pools: SnatPoolManager,
}

impl ResourceManagers {
    /// Builds every manager on top of `client`.
    pub fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            virtual_servers: VirtualServerManager::new(client.clone()),
            pools: PoolManager::new(client.clone()),
            monitors: MonitorManager::new(client.clone()),
            members: MemberManager::new(client.clone()),
            snat_translations: SnatTranslationManager::new(client.clone()),
            snat_pools: SnatPoolManager::new(client),
        }
    }
}
