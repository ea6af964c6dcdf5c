//! lbaas-agent - load-balancer reconciliation engine
//!
//! Drives a fleet of load-balancing appliances towards a declarative service
//! model (load balancer, listeners, pools, health monitors, members) and
//! manages the shared source-NAT addresses tenant subnets need.
//!
//! # Layers
//!
//! - [`adapter`]: pure mapping from service entities to device descriptors
//! - [`resource`]: idempotent create/update/delete per resource kind
//! - [`builder`]: the phased reconciliation across devices
//! - [`snat`]: SNAT translation and pool lifecycle with reference counting
//! - [`device`]: collaborator traits and the in-memory fleet

pub mod adapter;
pub mod builder;
pub mod config;
pub mod device;
pub mod model;
pub mod resource;
pub mod snat;

pub use adapter::{ExpectedCodes, ModelAdapter};
pub use builder::LbaasBuilder;
pub use config::{AgentConfig, HaTopology};
pub use device::{
    Device, DeviceClient, FixedIp, L3Binding, MemoryDeviceClient, MemoryPortAllocator, Network,
    NetworkHelper, Port, PortAllocator, SubnetInfo,
};
pub use model::{
    HealthMonitor, Listener, ListenerRef, LoadBalancer, Member, PersistenceType, Pool,
    ProvisioningStatus, ServiceModel, SessionPersistence,
};
pub use resource::{ResourceHelper, ResourceManagers};
pub use snat::{AssuredSubnetCache, SnatManager, SnatRelease};
