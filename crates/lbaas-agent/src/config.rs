//! Agent configuration.
//!
//! The configuration is read from a YAML file; every field has a default so
//! an empty file is a valid standalone configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use lbaas_common::{LbaasError, LbaasResult};
use serde::{Deserialize, Serialize};

/// Default partition prefix prepended to tenant ids.
pub const DEFAULT_ENVIRONMENT_PREFIX: &str = "Project_";

/// Default HA topology.
pub const DEFAULT_HA_TYPE: &str = "standalone";

/// Default traffic group for scale-out fleets.
pub const DEFAULT_TRAFFIC_GROUP: &str = "/Common/traffic-group-1";

/// Fleet redundancy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaTopology {
    /// Single device
    Standalone,
    /// Active/standby pair
    Pair,
    /// Scale-out (several active devices)
    ScaleN,
}

impl HaTopology {
    /// Returns the configuration value for this topology.
    pub fn as_str(&self) -> &'static str {
        match self {
            HaTopology::Standalone => "standalone",
            HaTopology::Pair => "pair",
            HaTopology::ScaleN => "scalen",
        }
    }
}

impl fmt::Display for HaTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HaTopology {
    type Err = LbaasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standalone" => Ok(HaTopology::Standalone),
            "pair" => Ok(HaTopology::Pair),
            "scalen" => Ok(HaTopology::ScaleN),
            other => Err(LbaasError::config(
                "f5_ha_type",
                format!("unknown HA topology '{}'", other),
            )),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Prefix for tenant partitions
    pub environment_prefix: String,
    /// HA topology, kept raw so an unknown value degrades to skipped
    /// shared-address operations instead of a startup failure
    pub f5_ha_type: String,
    /// Number of SNAT translation addresses per subnet
    pub f5_snat_addresses_per_subnet: usize,
    /// Traffic groups tenants are hashed onto
    pub traffic_groups: Vec<String>,
    /// Reject listeners with an unsupported protocol
    pub strict_protocol_validation: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            environment_prefix: DEFAULT_ENVIRONMENT_PREFIX.to_string(),
            f5_ha_type: DEFAULT_HA_TYPE.to_string(),
            f5_snat_addresses_per_subnet: 1,
            traffic_groups: vec![DEFAULT_TRAFFIC_GROUP.to_string()],
            strict_protocol_validation: false,
        }
    }
}

impl AgentConfig {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> LbaasResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| LbaasError::config("yaml", e.to_string()))
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> LbaasResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LbaasError::config(path.display().to_string(), e.to_string()))?;
        Self::from_yaml(&text)
    }

    /// Resolves the configured HA topology.
    pub fn ha_topology(&self) -> LbaasResult<HaTopology> {
        self.f5_ha_type.parse()
    }
}
