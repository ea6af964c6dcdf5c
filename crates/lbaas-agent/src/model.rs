//! Declarative service model.
//!
//! A service is a tree rooted at a load balancer: listeners, pools, health
//! monitors and members, each carrying the provisioning status that decides
//! whether it is created/updated or removed. The JSON layout matches what the
//! control plane sends to the agent.

use serde::{Deserialize, Serialize};

/// Desired-state tag on a service entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningStatus {
    /// In service
    #[default]
    Active,
    /// Waiting to be created
    PendingCreate,
    /// Waiting to be updated
    PendingUpdate,
    /// Waiting to be removed
    PendingDelete,
}

impl ProvisioningStatus {
    /// Returns true if the entity must be removed from the devices.
    pub fn is_pending_delete(&self) -> bool {
        matches!(self, ProvisioningStatus::PendingDelete)
    }
}

/// Session persistence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistenceType {
    /// Source address affinity
    SourceIp,
    /// Device-inserted cookie
    HttpCookie,
    /// Application cookie
    AppCookie,
}

impl PersistenceType {
    /// Returns true for cookie based persistence.
    pub fn is_cookie(&self) -> bool {
        matches!(self, PersistenceType::HttpCookie | PersistenceType::AppCookie)
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPersistence {
    /// Persistence type
    #[serde(rename = "type")]
    pub persistence_type: PersistenceType,
    /// Cookie name for application cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
}

/// Root of the service tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadBalancer {
    /// Load balancer id
    pub id: String,
    /// Owning tenant
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Virtual IP address
    pub vip_address: String,
    /// Subnet the VIP lives on
    pub vip_subnet_id: String,
    /// Desired state
    #[serde(default)]
    pub provisioning_status: ProvisioningStatus,
    /// Traffic group the virtual servers float with, when pinned
    #[serde(default)]
    pub traffic_group: Option<String>,
}

/// Listener (virtual server).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Listener {
    /// Listener id
    pub id: String,
    /// Device object name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Application protocol (HTTP, HTTPS, TCP, TERMINATED_HTTPS)
    #[serde(default)]
    pub protocol: Option<String>,
    /// Listening port
    #[serde(default)]
    pub protocol_port: Option<u16>,
    /// Connection limit (-1 means unlimited)
    #[serde(default)]
    pub connection_limit: Option<i64>,
    /// Admin state
    #[serde(default)]
    pub admin_state_up: Option<bool>,
    /// Listener-level persistence hint
    #[serde(default)]
    pub session_persistence: Option<SessionPersistence>,
    /// VLAN to listen on
    #[serde(default)]
    pub network_name: Option<String>,
    /// Explicit SNAT pool for address translation
    #[serde(default)]
    pub snat_pool_name: Option<String>,
    /// TLS certificate container
    #[serde(default)]
    pub default_tls_container_ref: Option<String>,
    /// SNI certificate containers
    #[serde(default)]
    pub sni_container_refs: Vec<String>,
    /// Desired state
    #[serde(default)]
    pub provisioning_status: ProvisioningStatus,
}

/// Reference from a pool to a listener.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListenerRef {
    /// Listener id
    pub id: String,
}

/// Backend pool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pool {
    /// Pool id
    pub id: String,
    /// Device object name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Load balancing algorithm (ROUND_ROBIN, LEAST_CONNECTIONS, ...)
    #[serde(default)]
    pub lb_algorithm: Option<String>,
    /// Listeners using this pool
    #[serde(default)]
    pub listeners: Vec<ListenerRef>,
    /// Session persistence applied to the listener
    #[serde(default)]
    pub session_persistence: Option<SessionPersistence>,
    /// Desired state
    #[serde(default)]
    pub provisioning_status: ProvisioningStatus,
}

/// Health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthMonitor {
    /// Monitor id
    pub id: String,
    /// Monitored pool
    pub pool_id: String,
    /// Monitor type (HTTP, HTTPS, TCP, PING)
    #[serde(rename = "type", default)]
    pub monitor_type: Option<String>,
    /// Probe interval in seconds
    #[serde(default)]
    pub delay: Option<u32>,
    /// Probe timeout in seconds
    #[serde(default)]
    pub timeout: Option<u32>,
    /// Failed probes before marking down
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// HTTP path to probe
    #[serde(default)]
    pub url_path: Option<String>,
    /// Accepted HTTP status codes
    #[serde(default)]
    pub expected_codes: Option<String>,
    /// Desired state
    #[serde(default)]
    pub provisioning_status: ProvisioningStatus,
}

/// Pool member.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Member {
    /// Member id
    pub id: String,
    /// Owning pool
    pub pool_id: String,
    /// Backend address
    pub address: String,
    /// Backend port
    pub protocol_port: u16,
    /// Desired state
    #[serde(default)]
    pub provisioning_status: ProvisioningStatus,
}

/// Complete desired service description.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceModel {
    /// Root load balancer
    pub loadbalancer: Option<LoadBalancer>,
    /// Listeners
    pub listeners: Vec<Listener>,
    /// Pools
    pub pools: Vec<Pool>,
    /// Health monitors
    pub healthmonitors: Vec<HealthMonitor>,
    /// Members
    pub members: Vec<Member>,
}

impl ServiceModel {
    /// Finds a pool by id.
    pub fn pool(&self, pool_id: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.id == pool_id)
    }

    /// Finds a listener by id.
    pub fn listener(&self, listener_id: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.id == listener_id)
    }

    /// Resolves the listener a pool is attached to.
    ///
    /// Only the first listener of the pool's list is considered.
    pub fn pool_listener(&self, pool: &Pool) -> Option<&Listener> {
        pool.listeners.first().and_then(|l| self.listener(&l.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SERVICE: &str = r#"{
        "loadbalancer": {
            "id": "lb1",
            "tenant_id": "t1",
            "vip_address": "10.0.0.10",
            "vip_subnet_id": "subnet1",
            "provisioning_status": "ACTIVE"
        },
        "listeners": [
            {"id": "l1", "name": "listener1", "protocol": "HTTP",
             "protocol_port": 80, "provisioning_status": "PENDING_CREATE"}
        ],
        "pools": [
            {"id": "p1", "name": "pool1", "lb_algorithm": "ROUND_ROBIN",
             "listeners": [{"id": "l1"}, {"id": "l2"}],
             "session_persistence": {"type": "HTTP_COOKIE"},
             "provisioning_status": "PENDING_CREATE"}
        ],
        "healthmonitors": [
            {"id": "hm1", "pool_id": "p1", "type": "HTTP",
             "expected_codes": "200,202", "provisioning_status": "PENDING_DELETE"}
        ],
        "members": [
            {"id": "m1", "pool_id": "p1", "address": "10.0.1.5",
             "protocol_port": 8080}
        ]
    }"#;

    #[test]
    fn test_deserialize_service() {
        let service: ServiceModel = serde_json::from_str(SERVICE).unwrap();

        let lb = service.loadbalancer.as_ref().unwrap();
        assert_eq!(lb.tenant_id.as_deref(), Some("t1"));
        assert_eq!(service.listeners[0].protocol_port, Some(80));
        assert_eq!(
            service.pools[0].session_persistence.as_ref().unwrap().persistence_type,
            PersistenceType::HttpCookie
        );
        assert!(service.healthmonitors[0].provisioning_status.is_pending_delete());
        assert_eq!(service.members[0].provisioning_status, ProvisioningStatus::Active);
    }

    #[test]
    fn test_empty_service() {
        let service: ServiceModel = serde_json::from_str("{}").unwrap();
        assert!(service.loadbalancer.is_none());
        assert!(service.pools.is_empty());
    }

    #[test]
    fn test_pool_listener_uses_first_entry() {
        let service: ServiceModel = serde_json::from_str(SERVICE).unwrap();
        let pool = service.pool("p1").unwrap();

        assert_eq!(service.pool_listener(pool).map(|l| l.id.as_str()), Some("l1"));
        assert!(service.listener("l2").is_none());
        assert!(service.pool("missing").is_none());
    }
}
