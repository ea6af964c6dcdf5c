//! Test fixtures for service models, devices and subnets

use lbaas_agent::{
    Device, HealthMonitor, Listener, ListenerRef, LoadBalancer, Member, Network, Pool,
    ProvisioningStatus, ServiceModel, SubnetInfo,
};

/// Builder for service models
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    service: ServiceModel,
}

impl ServiceBuilder {
    /// Start a service with a load balancer owned by `tenant_id`
    pub fn new(lb_id: &str, tenant_id: &str) -> Self {
        Self {
            service: ServiceModel {
                loadbalancer: Some(LoadBalancer {
                    id: lb_id.to_string(),
                    tenant_id: Some(tenant_id.to_string()),
                    vip_address: "10.0.0.10".to_string(),
                    vip_subnet_id: "vip-subnet".to_string(),
                    ..LoadBalancer::default()
                }),
                ..ServiceModel::default()
            },
        }
    }

    /// Set the VIP address
    pub fn vip(mut self, address: &str) -> Self {
        if let Some(lb) = self.service.loadbalancer.as_mut() {
            lb.vip_address = address.to_string();
        }
        self
    }

    /// Add a listener
    pub fn listener(mut self, id: &str, name: &str, protocol: &str, port: u16) -> Self {
        self.service.listeners.push(Listener {
            id: id.to_string(),
            name: name.to_string(),
            protocol: Some(protocol.to_string()),
            protocol_port: Some(port),
            ..Listener::default()
        });
        self
    }

    /// Add a pool, optionally attached to a listener
    pub fn pool(mut self, id: &str, name: &str, algorithm: &str, listener_id: Option<&str>) -> Self {
        self.service.pools.push(Pool {
            id: id.to_string(),
            name: name.to_string(),
            lb_algorithm: Some(algorithm.to_string()),
            listeners: listener_id
                .map(|l| vec![ListenerRef { id: l.to_string() }])
                .unwrap_or_default(),
            ..Pool::default()
        });
        self
    }

    /// Add a health monitor
    pub fn monitor(mut self, id: &str, pool_id: &str, monitor_type: &str, expected_codes: &str) -> Self {
        self.service.healthmonitors.push(HealthMonitor {
            id: id.to_string(),
            pool_id: pool_id.to_string(),
            monitor_type: Some(monitor_type.to_string()),
            delay: Some(5),
            timeout: Some(3),
            max_retries: Some(3),
            url_path: Some("/".to_string()),
            expected_codes: Some(expected_codes.to_string()),
            ..HealthMonitor::default()
        });
        self
    }

    /// Add a member
    pub fn member(mut self, id: &str, pool_id: &str, address: &str, port: u16) -> Self {
        self.service.members.push(Member {
            id: id.to_string(),
            pool_id: pool_id.to_string(),
            address: address.to_string(),
            protocol_port: port,
            ..Member::default()
        });
        self
    }

    /// Build the service model
    pub fn build(self) -> ServiceModel {
        self.service
    }
}

/// Set the provisioning status of every entity (including the load balancer)
pub fn mark_all(service: &mut ServiceModel, status: ProvisioningStatus) {
    if let Some(lb) = service.loadbalancer.as_mut() {
        lb.provisioning_status = status;
    }
    service.listeners.iter_mut().for_each(|l| l.provisioning_status = status);
    service.pools.iter_mut().for_each(|p| p.provisioning_status = status);
    service.healthmonitors.iter_mut().for_each(|h| h.provisioning_status = status);
    service.members.iter_mut().for_each(|m| m.provisioning_status = status);
}

/// Set the provisioning status of the entity with `id`
pub fn mark(service: &mut ServiceModel, id: &str, status: ProvisioningStatus) {
    for l in service.listeners.iter_mut().filter(|l| l.id == id) {
        l.provisioning_status = status;
    }
    for p in service.pools.iter_mut().filter(|p| p.id == id) {
        p.provisioning_status = status;
    }
    for h in service.healthmonitors.iter_mut().filter(|h| h.id == id) {
        h.provisioning_status = status;
    }
    for m in service.members.iter_mut().filter(|m| m.id == id) {
        m.provisioning_status = status;
    }
}

/// The reference web service: one HTTP listener on port 80, one
/// round-robin pool with one member and one HTTP monitor
pub fn web_service() -> ServiceModel {
    ServiceBuilder::new("lb1", "tenant-a")
        .listener("listener-1", "web", "HTTP", 80)
        .pool("pool-1", "web-pool", "ROUND_ROBIN", Some("listener-1"))
        .monitor("monitor-1", "pool-1", "HTTP", "200,202")
        .member("member-1", "pool-1", "10.0.1.5", 8080)
        .build()
}

/// A fleet of `count` devices named bigip1..bigipN
pub fn devices(count: usize) -> Vec<Device> {
    (1..=count).map(|i| Device::new(format!("bigip{}", i))).collect()
}

/// Subnet on a tenant (or shared) network
pub fn subnet(subnet_id: &str, route_domain_id: u32, shared: bool) -> SubnetInfo {
    SubnetInfo {
        subnet_id: subnet_id.to_string(),
        network: Some(Network {
            id: format!("net-{}", subnet_id),
            route_domain_id,
            shared,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_service_fixture() {
        let service = web_service();
        assert_eq!(service.listeners.len(), 1);
        assert_eq!(service.pool_listener(&service.pools[0]).map(|l| l.name.as_str()), Some("web"));
        assert_eq!(service.healthmonitors[0].expected_codes.as_deref(), Some("200,202"));
    }

    #[test]
    fn test_mark_helpers() {
        let mut service = web_service();
        mark(&mut service, "pool-1", ProvisioningStatus::PendingDelete);
        assert!(service.pools[0].provisioning_status.is_pending_delete());
        assert!(!service.listeners[0].provisioning_status.is_pending_delete());

        mark_all(&mut service, ProvisioningStatus::PendingDelete);
        assert!(service
            .loadbalancer
            .as_ref()
            .is_some_and(|lb| lb.provisioning_status.is_pending_delete()));
    }

    #[test]
    fn test_devices() {
        let fleet = devices(3);
        assert_eq!(fleet.len(), 3);
        assert_eq!(fleet[2].hostname, "bigip3");
    }
}
