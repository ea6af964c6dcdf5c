//! Pool and member mapping.

use lbaas_common::descriptor::attrs;
use lbaas_common::{Descriptor, ResourceKey};

use super::{address_port, ModelAdapter, MONITOR_NAME_PREFIX};
use crate::model::{HealthMonitor, LoadBalancer, Member, Pool};

/// Load-balancing mode used for unknown or missing algorithms.
pub const DEFAULT_LB_MODE: &str = "round-robin";

impl ModelAdapter {
    /// Returns the device key of a pool.
    pub fn pool_key(&self, loadbalancer: &LoadBalancer, pool: &Pool) -> ResourceKey {
        ResourceKey::new(self.partition(loadbalancer), &pool.name)
    }

    /// Maps a pool, referencing its health monitor when one is attached.
    pub fn pool(
        &self,
        loadbalancer: &LoadBalancer,
        pool: &Pool,
        healthmonitor: Option<&HealthMonitor>,
    ) -> Descriptor {
        let mut d = Descriptor::new()
            .with(attrs::NAME, pool.name.as_str())
            .with(attrs::PARTITION, self.partition(loadbalancer))
            .with("loadBalancingMode", lb_method(pool.lb_algorithm.as_deref()));

        if let Some(description) = &pool.description {
            d.insert(attrs::DESCRIPTION, description.as_str());
        }

        if let Some(hm) = healthmonitor {
            d.insert(attrs::MONITOR, format!("{}{}", MONITOR_NAME_PREFIX, hm.id));
        }

        d
    }

    /// Descriptor that clears a pool's monitor reference.
    pub fn pool_without_monitor(&self, loadbalancer: &LoadBalancer, pool: &Pool) -> Descriptor {
        Descriptor::new()
            .with(attrs::NAME, pool.name.as_str())
            .with(attrs::PARTITION, self.partition(loadbalancer))
            .with(attrs::MONITOR, "")
    }

    /// Returns the device key of a member inside its pool.
    pub fn member_key(&self, loadbalancer: &LoadBalancer, pool: &Pool, member: &Member) -> ResourceKey {
        ResourceKey::new(
            self.partition(loadbalancer),
            address_port(&member.address, member.protocol_port),
        )
        .with_parent(&pool.name)
    }

    /// Maps a pool member.
    pub fn member(&self, loadbalancer: &LoadBalancer, member: &Member) -> Descriptor {
        Descriptor::new()
            .with(attrs::NAME, address_port(&member.address, member.protocol_port))
            .with(attrs::PARTITION, self.partition(loadbalancer))
            .with(attrs::ADDRESS, member.address.as_str())
    }
}

/// Maps a load-balancing algorithm name to the device mode.
pub fn lb_method(algorithm: Option<&str>) -> &'static str {
    let Some(algorithm) = algorithm else {
        return DEFAULT_LB_MODE;
    };
    match algorithm.to_uppercase().as_str() {
        "LEAST_CONNECTIONS" => "least-connections-member",
        "RATIO_LEAST_CONNECTIONS" => "ratio-least-connections-member",
        "SOURCE_IP" => "least-connections-node",
        "OBSERVED_MEMBER" => "observed-member",
        "PREDICTIVE_MEMBER" => "predictive-member",
        "RATIO" => "ratio-member",
        _ => DEFAULT_LB_MODE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use pretty_assertions::assert_eq;

    fn loadbalancer() -> LoadBalancer {
        LoadBalancer {
            id: "lb1".to_string(),
            tenant_id: Some("t1".to_string()),
            vip_address: "10.0.0.10".to_string(),
            vip_subnet_id: "subnet1".to_string(),
            ..LoadBalancer::default()
        }
    }

    fn pool(algorithm: Option<&str>) -> Pool {
        Pool {
            id: "p1".to_string(),
            name: "pool1".to_string(),
            lb_algorithm: algorithm.map(str::to_string),
            ..Pool::default()
        }
    }

    #[test]
    fn test_lb_method_table() {
        assert_eq!(lb_method(Some("ROUND_ROBIN")), "round-robin");
        assert_eq!(lb_method(Some("least_connections")), "least-connections-member");
        assert_eq!(lb_method(Some("RATIO_LEAST_CONNECTIONS")), "ratio-least-connections-member");
        assert_eq!(lb_method(Some("SOURCE_IP")), "least-connections-node");
        assert_eq!(lb_method(Some("OBSERVED_MEMBER")), "observed-member");
        assert_eq!(lb_method(Some("PREDICTIVE_MEMBER")), "predictive-member");
        assert_eq!(lb_method(Some("RATIO")), "ratio-member");
        assert_eq!(lb_method(Some("WEIGHTED_RANDOM")), "round-robin");
        assert_eq!(lb_method(None), "round-robin");
    }

    #[test]
    fn test_pool_without_monitor() {
        let adapter = ModelAdapter::new(&AgentConfig::default());
        let d = adapter.pool(&loadbalancer(), &pool(Some("ROUND_ROBIN")), None);

        assert_eq!(d.name(), Some("pool1"));
        assert_eq!(d.partition(), Some("Project_t1"));
        assert_eq!(d.get_str("loadBalancingMode"), Some("round-robin"));
        assert!(!d.has("monitor"));
        assert!(!d.has("description"));
    }

    #[test]
    fn test_pool_with_monitor() {
        let adapter = ModelAdapter::new(&AgentConfig::default());
        let hm = HealthMonitor {
            id: "abc".to_string(),
            pool_id: "p1".to_string(),
            ..HealthMonitor::default()
        };
        let mut p = pool(Some("RATIO"));
        p.description = Some("web tier".to_string());

        let d = adapter.pool(&loadbalancer(), &p, Some(&hm));
        assert_eq!(d.get_str("monitor"), Some("hm_abc"));
        assert_eq!(d.get_str("description"), Some("web tier"));
        assert_eq!(d.get_str("loadBalancingMode"), Some("ratio-member"));

        let cleared = adapter.pool_without_monitor(&loadbalancer(), &p);
        assert_eq!(cleared.get_str("monitor"), Some(""));
    }

    #[test]
    fn test_member_mapping() {
        let adapter = ModelAdapter::new(&AgentConfig::default());
        let v4 = Member {
            id: "m1".to_string(),
            pool_id: "p1".to_string(),
            address: "10.0.1.5".to_string(),
            protocol_port: 8080,
            ..Member::default()
        };
        let v6 = Member {
            address: "2001:db8::5".to_string(),
            ..v4.clone()
        };

        let d = adapter.member(&loadbalancer(), &v4);
        assert_eq!(d.name(), Some("10.0.1.5:8080"));
        assert_eq!(d.get_str("address"), Some("10.0.1.5"));
        assert_eq!(adapter.member(&loadbalancer(), &v6).name(), Some("2001:db8::5.8080"));

        let key = adapter.member_key(&loadbalancer(), &pool(None), &v4);
        assert_eq!(key.parent.as_deref(), Some("pool1"));
        assert_eq!(key.name, "10.0.1.5:8080");
    }
}
