//! Per-device memo of (tenant, subnet) pairs whose SNAT addresses are in place.

use std::collections::{BTreeSet, HashMap};

use dashmap::DashMap;

/// Assured SNAT subnets, keyed by device hostname then tenant.
#[derive(Debug, Default)]
pub struct AssuredSubnetCache {
    devices: DashMap<String, HashMap<String, BTreeSet<String>>>,
}

impl AssuredSubnetCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the tenant's subnet is assured on the device.
    pub fn contains(&self, hostname: &str, tenant_id: &str, subnet_id: &str) -> bool {
        self.devices
            .get(hostname)
            .and_then(|tenants| tenants.get(tenant_id).map(|s| s.contains(subnet_id)))
            .unwrap_or(false)
    }

    /// Marks the tenant's subnet as assured on the device.
    pub fn mark(&self, hostname: &str, tenant_id: &str, subnet_id: &str) {
        self.devices
            .entry(hostname.to_string())
            .or_default()
            .entry(tenant_id.to_string())
            .or_default()
            .insert(subnet_id.to_string());
    }

    /// Forgets the tenant's subnet on the device. Returns true if it was present.
    ///
    /// Tenants left without subnets, and devices left without tenants, are
    /// dropped.
    pub fn remove(&self, hostname: &str, tenant_id: &str, subnet_id: &str) -> bool {
        let Some(mut tenants) = self.devices.get_mut(hostname) else {
            return false;
        };
        let removed = match tenants.get_mut(tenant_id) {
            Some(subnets) => {
                let removed = subnets.remove(subnet_id);
                if subnets.is_empty() {
                    tenants.remove(tenant_id);
                }
                removed
            }
            None => false,
        };
        let device_empty = tenants.is_empty();
        // Release the shard lock before removing the entry.
        drop(tenants);

        if device_empty {
            self.devices.remove_if(hostname, |_, tenants| tenants.is_empty());
        }
        removed
    }

    /// Returns true if any tenant on the device still holds the subnet.
    pub fn is_subnet_in_use(&self, hostname: &str, subnet_id: &str) -> bool {
        self.devices
            .get(hostname)
            .map(|tenants| tenants.values().any(|s| s.contains(subnet_id)))
            .unwrap_or(false)
    }

    /// Subnets assured for a tenant on a device.
    pub fn subnets(&self, hostname: &str, tenant_id: &str) -> BTreeSet<String> {
        self.devices
            .get(hostname)
            .and_then(|tenants| tenants.get(tenant_id).cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mark_and_remove() {
        let cache = AssuredSubnetCache::new();
        assert!(!cache.contains("bigip1", "t1", "s1"));

        cache.mark("bigip1", "t1", "s1");
        assert!(cache.contains("bigip1", "t1", "s1"));
        assert!(!cache.contains("bigip2", "t1", "s1"));
        assert!(!cache.contains("bigip1", "t2", "s1"));

        assert!(cache.remove("bigip1", "t1", "s1"));
        assert!(!cache.remove("bigip1", "t1", "s1"));
        assert!(cache.subnets("bigip1", "t1").is_empty());
    }

    #[test]
    fn test_subnet_shared_between_tenants() {
        let cache = AssuredSubnetCache::new();
        cache.mark("bigip1", "t1", "s1");
        cache.mark("bigip1", "t2", "s1");

        cache.remove("bigip1", "t1", "s1");
        assert!(cache.is_subnet_in_use("bigip1", "s1"));

        cache.remove("bigip1", "t2", "s1");
        assert!(!cache.is_subnet_in_use("bigip1", "s1"));
    }

    #[test]
    fn test_remove_prunes_empty_entries() {
        let cache = AssuredSubnetCache::new();
        cache.mark("bigip1", "t1", "s1");
        cache.mark("bigip1", "t1", "s2");
        cache.mark("bigip1", "t2", "s1");

        cache.remove("bigip1", "t1", "s1");
        assert_eq!(cache.devices.get("bigip1").map(|t| t.len()), Some(2));

        cache.remove("bigip1", "t1", "s2");
        assert_eq!(cache.devices.get("bigip1").map(|t| t.len()), Some(1));

        assert!(!cache.remove("bigip1", "t9", "s1"));
        cache.remove("bigip1", "t2", "s1");
        assert!(cache.devices.is_empty());

        assert!(!cache.remove("bigip1", "t2", "s1"));
        cache.mark("bigip1", "t2", "s1");
        assert!(cache.contains("bigip1", "t2", "s1"));
    }
}
