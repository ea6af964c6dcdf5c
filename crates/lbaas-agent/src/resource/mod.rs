//! Idempotent per-kind resource operations.
//!
//! [`ResourceHelper`] wraps a [`DeviceClient`] for one resource kind and
//! only issues a mutating call when the device state differs from the
//! desired descriptor. Every operation returns the mutation it performed,
//! or `None` when the device already matched.

mod managers;

pub use managers::{
    MemberManager, MonitorManager, PoolManager, ResourceManagers, SnatPoolManager,
    SnatTranslationManager, VirtualServerManager,
};

use std::sync::Arc;

use lbaas_common::{Action, Descriptor, LbaasError, LbaasResult, Mutation, ResourceKey, ResourceKind};
use tracing::debug;

use crate::device::{Device, DeviceClient};

/// Idempotent operations for one resource kind.
#[derive(Clone)]
pub struct ResourceHelper {
    kind: ResourceKind,
    client: Arc<dyn DeviceClient>,
}

impl ResourceHelper {
    /// Creates a helper for `kind`.
    pub fn new(kind: ResourceKind, client: Arc<dyn DeviceClient>) -> Self {
        Self { kind, client }
    }

    /// Loads the object, `None` if absent.
    pub async fn load(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Descriptor>> {
        self.client.load(device, self.kind, key).await
    }

    /// Returns true if the object exists.
    pub async fn exists(&self, device: &Device, key: &ResourceKey) -> LbaasResult<bool> {
        Ok(self.load(device, key).await?.is_some())
    }

    /// Creates the object unconditionally.
    pub async fn create(
        &self,
        device: &Device,
        key: &ResourceKey,
        desired: &Descriptor,
    ) -> LbaasResult<Mutation> {
        self.client.create(device, self.kind, key, desired).await?;
        Ok(self.mutation(key, Action::Created))
    }

    /// Creates the object when absent, updates it when it differs.
    pub async fn create_or_update(
        &self,
        device: &Device,
        key: &ResourceKey,
        desired: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        match self.load(device, key).await? {
            None => self.create(device, key, desired).await.map(Some),
            Some(current) => self.patch(device, key, desired, &current).await,
        }
    }

    /// Updates an object that must exist.
    pub async fn update(
        &self,
        device: &Device,
        key: &ResourceKey,
        desired: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        let current = self
            .load(device, key)
            .await?
            .ok_or_else(|| LbaasError::not_found(self.kind.as_str(), key.to_string()))?;
        self.patch(device, key, desired, &current).await
    }

    /// Updates the object if it exists.
    pub async fn update_if_exists(
        &self,
        device: &Device,
        key: &ResourceKey,
        desired: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        match self.load(device, key).await? {
            Some(current) => self.patch(device, key, desired, &current).await,
            None => Ok(None),
        }
    }

    /// Deletes the object if it exists.
    pub async fn delete_if_exists(&self, device: &Device, key: &ResourceKey) -> LbaasResult<Option<Mutation>> {
        if !self.exists(device, key).await? {
            debug!("{} {} already absent on {}", self.kind, key, device.hostname);
            return Ok(None);
        }
        self.client.delete(device, self.kind, key).await?;
        Ok(Some(self.mutation(key, Action::Deleted)))
    }

    async fn patch(
        &self,
        device: &Device,
        key: &ResourceKey,
        desired: &Descriptor,
        current: &Descriptor,
    ) -> LbaasResult<Option<Mutation>> {
        if desired.is_satisfied_by(current) {
            return Ok(None);
        }
        self.client.update(device, self.kind, key, desired).await?;
        Ok(Some(self.mutation(key, Action::Updated)))
    }

    fn mutation(&self, key: &ResourceKey, action: Action) -> Mutation {
        Mutation::new(self.kind, key.clone(), action)
    }
}
