//! LbaasBuilder - drives a device fleet towards a service model.
//!
//! One [`LbaasBuilder::assure`] call runs the reconciliation phases in a
//! fixed order. The VIP is bound at the network layer before any device
//! work and unbound after it; the six device phases run per device in
//! order, so a pool is always detached from its listener before it is
//! deleted and a listener is deleted only after its pool is gone.
//!
//! A failing item never stops the call. It is logged, recorded in the
//! [`BatchResult`] and the next item is processed.

use std::sync::Arc;

use lbaas_common::{BatchResult, ItemOutcome, LbaasError, LbaasResult, Mutation, Phase};
use tracing::{error, info, instrument, warn};

use crate::adapter::{monitor_kind, ModelAdapter};
use crate::config::AgentConfig;
use crate::device::{Device, DeviceClient, L3Binding};
use crate::model::{HealthMonitor, Listener, LoadBalancer, Member, Pool, ServiceModel};
use crate::resource::ResourceManagers;

/// Reconciliation orchestrator.
pub struct LbaasBuilder {
    adapter: ModelAdapter,
    managers: ResourceManagers,
    l3_binding: Option<Arc<dyn L3Binding>>,
}

impl LbaasBuilder {
    /// Creates a builder over a device client.
    pub fn new(config: &AgentConfig, client: Arc<dyn DeviceClient>) -> Self {
        Self {
            adapter: ModelAdapter::new(config),
            managers: ResourceManagers::new(client),
            l3_binding: None,
        }
    }

    /// Binds and unbinds the VIP at the network layer.
    pub fn with_l3_binding(mut self, l3_binding: Arc<dyn L3Binding>) -> Self {
        self.l3_binding = Some(l3_binding);
        self
    }

    /// Returns the resource managers.
    pub fn managers(&self) -> &ResourceManagers {
        &self.managers
    }

    /// Reconciles every device with the service model.
    #[instrument(skip_all, fields(loadbalancer = service.loadbalancer.as_ref().map(|lb| lb.id.as_str()), devices = devices.len()))]
    pub async fn assure(&self, service: &ServiceModel, devices: &[Device]) -> BatchResult {
        let mut batch = BatchResult::new();

        let Some(loadbalancer) = service.loadbalancer.as_ref() else {
            warn!("Service has no load balancer, nothing to reconcile");
            return batch;
        };

        if let Some(l3) = &self.l3_binding {
            let result = l3
                .bind_address(&loadbalancer.vip_subnet_id, &loadbalancer.vip_address)
                .await
                .map(|_| Vec::new());
            record(&mut batch, None, Phase::BindVip, &loadbalancer.id, result);
        }

        for device in devices {
            self.assure_device(service, loadbalancer, device, &mut batch).await;
        }

        if loadbalancer.provisioning_status.is_pending_delete() {
            if let Some(l3) = &self.l3_binding {
                let result = l3
                    .unbind_address(&loadbalancer.vip_subnet_id, &loadbalancer.vip_address)
                    .await
                    .map(|_| Vec::new());
                record(&mut batch, None, Phase::UnbindVip, &loadbalancer.id, result);
            }
        }

        info!(
            "Reconciled {} items, {} mutations, {} failures",
            batch.len(),
            batch.mutation_count(),
            batch.failures().count()
        );
        batch
    }

    async fn assure_device(
        &self,
        service: &ServiceModel,
        lb: &LoadBalancer,
        device: &Device,
        batch: &mut BatchResult,
    ) {
        let host = Some(device.hostname.as_str());

        for listener in service.listeners.iter().filter(|l| !l.provisioning_status.is_pending_delete()) {
            let result = self.create_listener(lb, listener, device).await;
            record(batch, host, Phase::ListenersCreated, &listener.id, result);
        }

        for pool in service.pools.iter().filter(|p| !p.provisioning_status.is_pending_delete()) {
            let listener = service.pool_listener(pool);
            let result = self.create_pool(lb, pool, listener, device).await;
            record(batch, host, Phase::PoolsCreated, &pool.id, result);
        }

        for hm in &service.healthmonitors {
            let result = match service.pool(&hm.pool_id) {
                Some(pool) => self.assure_monitor(lb, pool, hm, device).await,
                None => Err(missing_pool(&hm.pool_id)),
            };
            record(batch, host, Phase::Monitors, &hm.id, result);
        }

        for member in &service.members {
            let result = match service.pool(&member.pool_id) {
                Some(pool) => self.assure_member(lb, pool, member, device).await,
                None => Err(missing_pool(&member.pool_id)),
            };
            record(batch, host, Phase::Members, &member.id, result);
        }

        for pool in service.pools.iter().filter(|p| p.provisioning_status.is_pending_delete()) {
            let listener = service.pool_listener(pool);
            let result = self.delete_pool(lb, pool, listener, device).await;
            record(batch, host, Phase::PoolsDeleted, &pool.id, result);
        }

        for listener in service.listeners.iter().filter(|l| l.provisioning_status.is_pending_delete()) {
            let key = self.adapter.virtual_server_key(lb, listener);
            let result = self
                .managers
                .virtual_servers
                .delete(device, &key)
                .await
                .map(|m| m.into_iter().collect());
            record(batch, host, Phase::ListenersDeleted, &listener.id, result);
        }
    }

    async fn create_listener(&self, lb: &LoadBalancer, listener: &Listener, device: &Device) -> LbaasResult<Vec<Mutation>> {
        let vs = self.adapter.virtual_server(lb, listener)?;
        let key = self.adapter.virtual_server_key(lb, listener);
        Ok(self
            .managers
            .virtual_servers
            .assure(device, &key, &vs)
            .await?
            .into_iter()
            .collect())
    }

    /// Creates the pool, then points its first listener at it and applies
    /// the pool's session persistence to that listener.
    async fn create_pool(
        &self,
        lb: &LoadBalancer,
        pool: &Pool,
        listener: Option<&Listener>,
        device: &Device,
    ) -> LbaasResult<Vec<Mutation>> {
        let mut mutations = Vec::new();

        let key = self.adapter.pool_key(lb, pool);
        let desired = self.adapter.pool(lb, pool, None);
        mutations.extend(self.managers.pools.assure(device, &key, &desired).await?);

        if let Some(listener) = listener {
            let vs_key = self.adapter.virtual_server_key(lb, listener);
            let attach = self.adapter.virtual_server_pool(lb, listener, &pool.name);
            mutations.extend(self.managers.virtual_servers.update(device, &vs_key, &attach).await?);

            let persist = self
                .adapter
                .virtual_server_persistence(lb, listener, pool.session_persistence.as_ref());
            mutations.extend(self.managers.virtual_servers.update(device, &vs_key, &persist).await?);
        }

        Ok(mutations)
    }

    async fn assure_monitor(
        &self,
        lb: &LoadBalancer,
        pool: &Pool,
        hm: &HealthMonitor,
        device: &Device,
    ) -> LbaasResult<Vec<Mutation>> {
        let mut mutations = Vec::new();
        let kind = monitor_kind(hm);
        let key = self.adapter.monitor_key(lb, hm);
        let pool_key = self.adapter.pool_key(lb, pool);

        if hm.provisioning_status.is_pending_delete() {
            mutations.extend(self.managers.monitors.delete(device, kind, &key).await?);
            let cleared = self.adapter.pool_without_monitor(lb, pool);
            mutations.extend(self.managers.pools.update_if_exists(device, &pool_key, &cleared).await?);
        } else {
            let monitor = self.adapter.health_monitor(lb, hm);
            mutations.extend(self.managers.monitors.assure(device, kind, &key, &monitor).await?);
            let desired = self.adapter.pool(lb, pool, Some(hm));
            mutations.extend(self.managers.pools.update(device, &pool_key, &desired).await?);
        }

        Ok(mutations)
    }

    async fn assure_member(
        &self,
        lb: &LoadBalancer,
        pool: &Pool,
        member: &Member,
        device: &Device,
    ) -> LbaasResult<Vec<Mutation>> {
        let key = self.adapter.member_key(lb, pool, member);

        let mutation = if member.provisioning_status.is_pending_delete() {
            self.managers.members.delete(device, &key).await?
        } else {
            let pool_key = self.adapter.pool_key(lb, pool);
            let desired = self.adapter.member(lb, member);
            self.managers.members.assure(device, &pool_key, &key, &desired).await?
        };

        Ok(mutation.into_iter().collect())
    }

    /// Detaches the pool from its listener, deletes it, then clears the
    /// listener's persistence.
    async fn delete_pool(
        &self,
        lb: &LoadBalancer,
        pool: &Pool,
        listener: Option<&Listener>,
        device: &Device,
    ) -> LbaasResult<Vec<Mutation>> {
        let mut mutations = Vec::new();

        if let Some(listener) = listener {
            let vs_key = self.adapter.virtual_server_key(lb, listener);
            let detach = self.adapter.virtual_server_pool(lb, listener, "");
            mutations.extend(
                self.managers
                    .virtual_servers
                    .update_if_exists(device, &vs_key, &detach)
                    .await?,
            );
        }

        let key = self.adapter.pool_key(lb, pool);
        mutations.extend(self.managers.pools.delete(device, &key).await?);

        if let Some(listener) = listener {
            let vs_key = self.adapter.virtual_server_key(lb, listener);
            let cleared = self.adapter.virtual_server_persistence(lb, listener, None);
            mutations.extend(
                self.managers
                    .virtual_servers
                    .update_if_exists(device, &vs_key, &cleared)
                    .await?,
            );
        }

        Ok(mutations)
    }
}

fn missing_pool(pool_id: &str) -> LbaasError {
    LbaasError::mapping("pool_id", format!("pool {} is not part of the service", pool_id))
}

fn record(
    batch: &mut BatchResult,
    device: Option<&str>,
    phase: Phase,
    item: &str,
    result: LbaasResult<Vec<Mutation>>,
) {
    if let Err(e) = &result {
        error!(device = device.unwrap_or("-"), phase = %phase, item, retryable = e.is_retryable(), "{}", e);
    }
    batch.push(ItemOutcome {
        device: device.map(str::to_string),
        phase,
        item: item.to_string(),
        result,
    });
}
