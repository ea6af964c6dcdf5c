//! Virtual server (listener) mapping.

use lbaas_common::descriptor::attrs;
use lbaas_common::{Descriptor, LbaasError, LbaasResult, ResourceKey};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{address_port, ModelAdapter};
use crate::model::{Listener, LoadBalancer, PersistenceType, SessionPersistence};

/// Transport protocol every supported listener protocol reduces to.
pub const TRANSPORT_PROTOCOL: &str = "tcp";

/// Application-layer profile.
pub const HTTP_PROFILE: &str = "/Common/http";

/// Fast transport-layer profile.
pub const FAST_L4_PROFILE: &str = "/Common/fastL4";

/// Persistence profile for source address affinity.
pub const SOURCE_ADDR_PERSISTENCE: &str = "/Common/source_addr";

/// Persistence profile for cookie affinity.
pub const COOKIE_PERSISTENCE: &str = "/Common/cookie";

/// Route domain suffix stripped from VIP addresses.
const DEFAULT_ROUTE_DOMAIN_SUFFIX: &str = "%0";

const SUPPORTED_PROTOCOLS: [&str; 4] = ["HTTP", "HTTPS", "TCP", "TERMINATED_HTTPS"];

impl ModelAdapter {
    /// Returns the device key of a listener's virtual server.
    pub fn virtual_server_key(&self, loadbalancer: &LoadBalancer, listener: &Listener) -> ResourceKey {
        ResourceKey::new(self.partition(loadbalancer), &listener.name)
    }

    /// Maps a listener to its virtual server descriptor.
    ///
    /// Unsupported protocols are logged and still mapped to the transport
    /// protocol, unless strict protocol validation is configured.
    pub fn virtual_server(
        &self,
        loadbalancer: &LoadBalancer,
        listener: &Listener,
    ) -> LbaasResult<Descriptor> {
        let mut vs = Descriptor::new()
            .with(attrs::NAME, listener.name.as_str())
            .with(attrs::PARTITION, self.partition(loadbalancer));

        if let Some(description) = &listener.description {
            vs.insert(attrs::DESCRIPTION, description.as_str());
        }

        if let Some(protocol) = &listener.protocol {
            if !SUPPORTED_PROTOCOLS.contains(&protocol.as_str()) {
                if self.strict_protocol_validation {
                    return Err(LbaasError::mapping(
                        "protocol",
                        format!("unsupported protocol '{}'", protocol),
                    ));
                }
                warn!("Listener {} has unsupported protocol {}", listener.id, protocol);
            }
            vs.insert("ipProtocol", TRANSPORT_PROTOCOL);
        }

        if let Some(limit) = listener.connection_limit {
            vs.insert("connectionLimit", clamp_connection_limit(limit));
        }

        if let Some(port) = listener.protocol_port {
            let address = loadbalancer
                .vip_address
                .strip_suffix(DEFAULT_ROUTE_DOMAIN_SUFFIX)
                .unwrap_or(&loadbalancer.vip_address);
            vs.insert("destination", address_port(address, port));
        }

        if let Some(admin_state_up) = listener.admin_state_up {
            vs.insert("enabled", admin_state_up);
            vs.insert("disabled", !admin_state_up);
        }

        if listener.default_tls_container_ref.is_some() || !listener.sni_container_refs.is_empty() {
            // TLS termination and SNI are not handled; the references are ignored.
            debug!("Ignoring TLS container references of listener {}", listener.id);
        }

        vs.insert("profiles", json!([profile_for(listener)]));

        let translation = match &listener.snat_pool_name {
            Some(pool) => json!({ "type": "snat", "pool": pool }),
            None => json!({ "type": "automap" }),
        };
        vs.insert("sourceAddressTranslation", translation);

        if let Some(network) = &listener.network_name {
            vs.insert("vlans", json!([network]));
            vs.insert("vlansEnabled", true);
        }

        if let Some(group) = &loadbalancer.traffic_group {
            vs.insert(attrs::TRAFFIC_GROUP, group.as_str());
        }

        Ok(vs)
    }

    /// Descriptor that points a virtual server at a pool (empty name detaches).
    pub fn virtual_server_pool(
        &self,
        loadbalancer: &LoadBalancer,
        listener: &Listener,
        pool_name: &str,
    ) -> Descriptor {
        Descriptor::new()
            .with(attrs::NAME, listener.name.as_str())
            .with(attrs::PARTITION, self.partition(loadbalancer))
            .with(attrs::POOL, pool_name)
    }

    /// Descriptor carrying the persistence profiles of a virtual server.
    ///
    /// `None` yields an empty profile list, which clears persistence.
    pub fn virtual_server_persistence(
        &self,
        loadbalancer: &LoadBalancer,
        listener: &Listener,
        persistence: Option<&SessionPersistence>,
    ) -> Descriptor {
        let persist = match persistence {
            Some(p) => json!([{ "name": persistence_profile(p.persistence_type) }]),
            None => Value::Array(Vec::new()),
        };

        Descriptor::new()
            .with(attrs::NAME, listener.name.as_str())
            .with(attrs::PARTITION, self.partition(loadbalancer))
            .with(attrs::PERSIST, persist)
    }
}

/// Clamps a connection limit to a non-negative value.
pub fn clamp_connection_limit(limit: i64) -> i64 {
    limit.max(0)
}

/// Chooses the profile of a listener's virtual server.
fn profile_for(listener: &Listener) -> &'static str {
    let http = matches!(listener.protocol.as_deref(), Some("HTTP") | Some("HTTPS"));
    let cookie = listener
        .session_persistence
        .as_ref()
        .is_some_and(|p| p.persistence_type.is_cookie());

    if http || cookie {
        HTTP_PROFILE
    } else {
        FAST_L4_PROFILE
    }
}

fn persistence_profile(persistence_type: PersistenceType) -> &'static str {
    match persistence_type {
        PersistenceType::SourceIp => SOURCE_ADDR_PERSISTENCE,
        PersistenceType::HttpCookie | PersistenceType::AppCookie => COOKIE_PERSISTENCE,
    }
}
