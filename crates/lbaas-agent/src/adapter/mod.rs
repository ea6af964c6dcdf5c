//! ModelAdapter - maps service model entities to device resource descriptors.
//!
//! Every function here is pure: the same load balancer and entity always
//! produce the same [`Descriptor`]. No device is contacted and no state is
//! kept, which is what makes create-or-update comparisons meaningful.
//!
//! # Naming conventions
//!
//! The generated names are the contract with the device and must stay
//! stable across releases:
//!
//! | Object | Name |
//! |--------|------|
//! | partition | `environment_prefix + tenant_id` (slashes stripped), `Common` without tenant |
//! | health monitor | `hm_<id>` |
//! | member | `address:port` (IPv4), `address.port` (IPv6) |
//! | virtual server / pool | the entity's `name` |

mod listener;
mod monitor;
mod pool;

pub use listener::{clamp_connection_limit, COOKIE_PERSISTENCE, SOURCE_ADDR_PERSISTENCE};
pub use monitor::{monitor_kind, ExpectedCodes};
pub use pool::{lb_method, DEFAULT_LB_MODE};

use sha2::{Digest, Sha256};

use crate::config::AgentConfig;
use crate::model::LoadBalancer;

/// Partition used for shared objects and tenant-less services.
pub const COMMON_PARTITION: &str = "Common";

/// Prefix of health monitor names.
pub const MONITOR_NAME_PREFIX: &str = "hm_";

/// Maps service entities to device descriptors.
#[derive(Debug, Clone)]
pub struct ModelAdapter {
    environment_prefix: String,
    traffic_groups: Vec<String>,
    strict_protocol_validation: bool,
}

impl ModelAdapter {
    /// Creates an adapter from the agent configuration.
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            environment_prefix: config.environment_prefix.clone(),
            traffic_groups: config.traffic_groups.clone(),
            strict_protocol_validation: config.strict_protocol_validation,
        }
    }

    /// Returns the partition name for a tenant.
    pub fn folder_name(&self, tenant_id: Option<&str>) -> String {
        match tenant_id {
            Some(tenant_id) => format!("{}{}", self.environment_prefix, tenant_id.replace('/', "")),
            None => COMMON_PARTITION.to_string(),
        }
    }

    /// Returns the partition holding a load balancer's objects.
    pub fn partition(&self, loadbalancer: &LoadBalancer) -> String {
        self.folder_name(loadbalancer.tenant_id.as_deref())
    }

    /// Returns the configured traffic groups.
    pub fn traffic_groups(&self) -> &[String] {
        &self.traffic_groups
    }

    /// Deterministically assigns a tenant to one of the configured traffic groups.
    ///
    /// The tenant id is hashed and the digest, read as a big-endian integer,
    /// is reduced modulo the number of groups. Returns `None` when no traffic
    /// group is configured.
    pub fn tenant_to_traffic_group(&self, tenant_id: &str) -> Option<&str> {
        if self.traffic_groups.is_empty() {
            return None;
        }
        let digest = Sha256::digest(tenant_id.as_bytes());
        let index = digest_mod(&digest, self.traffic_groups.len() as u64) as usize;
        self.traffic_groups.get(index).map(String::as_str)
    }
}

/// Reduces a big-endian byte string modulo `modulus`.
fn digest_mod(bytes: &[u8], modulus: u64) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, &b| (acc * 256 + u64::from(b)) % modulus)
}

/// Returns true if the address looks like an IPv6 address.
pub(crate) fn is_ipv6_shaped(address: &str) -> bool {
    address.contains(':')
}

/// Joins an address and a port the way the device expects.
pub(crate) fn address_port(address: &str, port: u16) -> String {
    if is_ipv6_shaped(address) {
        format!("{}.{}", address, port)
    } else {
        format!("{}:{}", address, port)
    }
}
