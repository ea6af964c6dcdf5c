//! Device resource descriptors, keys and kinds.
//!
//! A [`Descriptor`] is the flat attribute map a device understands for one
//! configuration object (name, partition, destination, profiles, ...). It is
//! produced deterministically from the service model, so two equal inputs
//! always yield equal descriptors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LbaasError, LbaasResult};

/// Well-known descriptor attribute names.
pub mod attrs {
    /// Object name.
    pub const NAME: &str = "name";
    /// Partition (folder) holding the object.
    pub const PARTITION: &str = "partition";
    /// Free-form description.
    pub const DESCRIPTION: &str = "description";
    /// Pool referenced by a virtual server.
    pub const POOL: &str = "pool";
    /// Monitor referenced by a pool.
    pub const MONITOR: &str = "monitor";
    /// Persistence profiles applied to a virtual server.
    pub const PERSIST: &str = "persist";
    /// Membership list of a SNAT pool.
    pub const MEMBERS: &str = "members";
    /// Address of a member or translation.
    pub const ADDRESS: &str = "address";
    /// Traffic group of a floating object.
    pub const TRAFFIC_GROUP: &str = "trafficGroup";
}

/// Kinds of device objects the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Virtual server (listener).
    VirtualServer,
    /// Backend pool.
    Pool,
    /// Member of a pool.
    PoolMember,
    /// HTTP health monitor.
    HttpMonitor,
    /// HTTPS health monitor.
    HttpsMonitor,
    /// TCP health monitor.
    TcpMonitor,
    /// Source-NAT translation address.
    SnatTranslation,
    /// Source-NAT pool.
    SnatPool,
}

impl ResourceKind {
    /// Returns the device-side name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::VirtualServer => "virtual",
            ResourceKind::Pool => "pool",
            ResourceKind::PoolMember => "member",
            ResourceKind::HttpMonitor => "monitor/http",
            ResourceKind::HttpsMonitor => "monitor/https",
            ResourceKind::TcpMonitor => "monitor/tcp",
            ResourceKind::SnatTranslation => "snat-translation",
            ResourceKind::SnatPool => "snatpool",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one object on a device.
///
/// `parent` scopes objects that live inside another one (pool members live
/// inside their pool).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Partition (folder) name.
    pub partition: String,
    /// Object name.
    pub name: String,
    /// Enclosing object name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ResourceKey {
    /// Creates a top-level key.
    pub fn new(partition: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            name: name.into(),
            parent: None,
        }
    }

    /// Scopes this key under an enclosing object.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Returns the device full path (`/partition/name`).
    pub fn full_path(&self) -> String {
        format!("/{}/{}", self.partition, self.name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "/{}/{}/{}", self.partition, parent, self.name),
            None => write!(f, "/{}/{}", self.partition, self.name),
        }
    }
}

/// Flat mapping of device attribute names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    attrs: BTreeMap<String, Value>,
}

impl Descriptor {
    /// Creates an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute, builder style.
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attr, value);
        self
    }

    /// Sets an attribute.
    pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(attr.into(), value.into());
    }

    /// Gets the value for an attribute, if present.
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    /// Gets a string attribute, if present and a string.
    pub fn get_str(&self, attr: &str) -> Option<&str> {
        self.attrs.get(attr).and_then(Value::as_str)
    }

    /// Checks if an attribute exists.
    pub fn has(&self, attr: &str) -> bool {
        self.attrs.contains_key(attr)
    }

    /// Returns the `name` attribute.
    pub fn name(&self) -> Option<&str> {
        self.get_str(attrs::NAME)
    }

    /// Returns the `partition` attribute.
    pub fn partition(&self) -> Option<&str> {
        self.get_str(attrs::PARTITION)
    }

    /// Builds the device key from `partition` and `name`.
    pub fn key(&self) -> LbaasResult<ResourceKey> {
        let name = self
            .name()
            .ok_or_else(|| LbaasError::mapping(attrs::NAME, "descriptor has no name"))?;
        let partition = self
            .partition()
            .ok_or_else(|| LbaasError::mapping(attrs::PARTITION, "descriptor has no partition"))?;
        Ok(ResourceKey::new(partition, name))
    }

    /// Returns the string items of a list attribute (empty if absent).
    pub fn list(&self, attr: &str) -> Vec<String> {
        match self.attrs.get(attr) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Replaces a list attribute with the given string items.
    pub fn set_list(&mut self, attr: impl Into<String>, items: Vec<String>) {
        self.insert(attr, Value::Array(items.into_iter().map(Value::String).collect()));
    }

    /// Returns true if every attribute of `self` already holds on `current`.
    ///
    /// An attribute absent on `current` is treated as equal to an empty
    /// string, an empty list or null.
    pub fn is_satisfied_by(&self, current: &Descriptor) -> bool {
        self.attrs.iter().all(|(attr, wanted)| match current.get(attr) {
            Some(actual) => actual == wanted || (is_empty_value(actual) && is_empty_value(wanted)),
            None => is_empty_value(wanted),
        })
    }

    /// Merges the attributes of `patch` into `self`.
    pub fn merge(&mut self, patch: &Descriptor) {
        for (attr, value) in &patch.attrs {
            self.attrs.insert(attr.clone(), value.clone());
        }
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Returns true if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Builds a [`Descriptor`] from attribute/value pairs.
#[macro_export]
macro_rules! descriptor {
    ($($attr:expr => $value:expr),* $(,)?) => {{
        let mut d = $crate::Descriptor::new();
        $(d.insert($attr, $value);)*
        d
    }};
}
