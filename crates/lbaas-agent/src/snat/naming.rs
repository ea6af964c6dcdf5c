//! SNAT translation names per HA topology.

use crate::adapter::ModelAdapter;
use crate::config::HaTopology;

const LOCAL_ONLY_TRAFFIC_GROUP: &str = "traffic-group-local-only";
const PAIR_TRAFFIC_GROUP: &str = "traffic-group-1";

/// Base name and traffic group of a subnet's translation addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnatNames {
    /// Name shared by the subnet's translations, before the index suffix
    pub base: String,
    /// Traffic group the translations float with
    pub traffic_group: String,
}

impl SnatNames {
    /// Resolves the names for a tenant's subnet.
    ///
    /// Returns `None` in a scale-out fleet without traffic groups.
    pub fn resolve(
        topology: HaTopology,
        adapter: &ModelAdapter,
        tenant_id: &str,
        subnet_id: &str,
    ) -> Option<Self> {
        match topology {
            HaTopology::Standalone => Some(Self {
                base: format!("snat-{}-{}", LOCAL_ONLY_TRAFFIC_GROUP, subnet_id),
                traffic_group: LOCAL_ONLY_TRAFFIC_GROUP.to_string(),
            }),
            // No separator before the subnet id.
            HaTopology::Pair => Some(Self {
                base: format!("snat-{}{}", PAIR_TRAFFIC_GROUP, subnet_id),
                traffic_group: PAIR_TRAFFIC_GROUP.to_string(),
            }),
            HaTopology::ScaleN => adapter
                .tenant_to_traffic_group(tenant_id)
                .map(|group| Self::scale_out(group, subnet_id)),
        }
    }

    /// Every name set a subnet's translations can carry on a device.
    ///
    /// In a scale-out fleet each tenant hashes onto its own group, so the
    /// subnet may be translated under any configured group.
    pub fn for_subnet(topology: HaTopology, adapter: &ModelAdapter, subnet_id: &str) -> Vec<Self> {
        match topology {
            HaTopology::ScaleN => adapter
                .traffic_groups()
                .iter()
                .map(|group| Self::scale_out(group, subnet_id))
                .collect(),
            _ => Self::resolve(topology, adapter, "", subnet_id).into_iter().collect(),
        }
    }

    fn scale_out(group: &str, subnet_id: &str) -> Self {
        let group = group.rsplit('/').next().unwrap_or(group);
        Self {
            base: format!("snat-{}-{}", group, subnet_id),
            traffic_group: group.to_string(),
        }
    }

    /// Name of the `index`-th translation.
    pub fn index_name(&self, index: usize) -> String {
        format!("{}_{}", self.base, index)
    }
}
