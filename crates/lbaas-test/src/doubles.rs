//! Collaborator doubles

use std::sync::Arc;

use async_trait::async_trait;
use lbaas_agent::{Device, DeviceClient, L3Binding, LbaasBuilder, MemoryDeviceClient};
use lbaas_common::{Descriptor, LbaasError, LbaasResult, ResourceKey, ResourceKind};
use tokio::sync::Mutex;

/// A network-layer binding call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L3Call {
    /// bind_address(subnet_id, ip_address)
    Bind(String, String),
    /// unbind_address(subnet_id, ip_address)
    Unbind(String, String),
}

/// L3 binding that records every call
#[derive(Debug, Default)]
pub struct RecordingL3Binding {
    calls: Mutex<Vec<L3Call>>,
}

impl RecordingL3Binding {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls in order
    pub async fn calls(&self) -> Vec<L3Call> {
        self.calls.lock().await.clone()
    }

    /// Number of unbind calls
    pub async fn unbind_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, L3Call::Unbind(..)))
            .count()
    }
}

#[async_trait]
impl L3Binding for RecordingL3Binding {
    async fn bind_address(&self, subnet_id: &str, ip_address: &str) -> LbaasResult<()> {
        self.calls
            .lock()
            .await
            .push(L3Call::Bind(subnet_id.to_string(), ip_address.to_string()));
        Ok(())
    }

    async fn unbind_address(&self, subnet_id: &str, ip_address: &str) -> LbaasResult<()> {
        self.calls
            .lock()
            .await
            .push(L3Call::Unbind(subnet_id.to_string(), ip_address.to_string()));
        Ok(())
    }
}

/// Device call a [`FailingClient`] can be told to reject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// create
    Create,
    /// update
    Update,
    /// delete
    Delete,
}

#[derive(Debug, Clone)]
struct FailRule {
    hostname: Option<String>,
    op: FailOn,
    kind: ResourceKind,
    name: String,
}

impl FailRule {
    fn matches(&self, device: &Device, op: FailOn, kind: ResourceKind, key: &ResourceKey) -> bool {
        self.op == op
            && self.kind == kind
            && self.name == key.name
            && self.hostname.as_ref().map_or(true, |h| *h == device.hostname)
    }
}

/// Device client over the in-memory fleet that rejects selected calls
pub struct FailingClient {
    inner: Arc<MemoryDeviceClient>,
    rules: Mutex<Vec<FailRule>>,
}

impl FailingClient {
    /// Wrap an in-memory fleet
    pub fn new(inner: Arc<MemoryDeviceClient>) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
        }
    }

    /// Reject `op` on objects of `kind` named `name`, on every device
    pub async fn fail(&self, op: FailOn, kind: ResourceKind, name: &str) {
        self.push(None, op, kind, name).await;
    }

    /// Reject `op` on objects of `kind` named `name`, on one device only
    pub async fn fail_on_device(&self, hostname: &str, op: FailOn, kind: ResourceKind, name: &str) {
        self.push(Some(hostname.to_string()), op, kind, name).await;
    }

    /// Stop rejecting anything
    pub async fn heal(&self) {
        self.rules.lock().await.clear();
    }

    async fn push(&self, hostname: Option<String>, op: FailOn, kind: ResourceKind, name: &str) {
        self.rules.lock().await.push(FailRule {
            hostname,
            op,
            kind,
            name: name.to_string(),
        });
    }

    async fn check(&self, device: &Device, op: FailOn, kind: ResourceKind, key: &ResourceKey) -> LbaasResult<()> {
        let rules = self.rules.lock().await;
        if rules.iter().any(|r| r.matches(device, op, kind, key)) {
            return Err(LbaasError::device(
                format!("{:?}", op).to_lowercase(),
                kind.as_str(),
                key.to_string(),
                "injected failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceClient for FailingClient {
    async fn load(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> LbaasResult<Option<Descriptor>> {
        self.inner.load(device, kind, key).await
    }

    async fn create(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
        descriptor: &Descriptor,
    ) -> LbaasResult<()> {
        self.check(device, FailOn::Create, kind, key).await?;
        self.inner.create(device, kind, key, descriptor).await
    }

    async fn update(
        &self,
        device: &Device,
        kind: ResourceKind,
        key: &ResourceKey,
        descriptor: &Descriptor,
    ) -> LbaasResult<()> {
        self.check(device, FailOn::Update, kind, key).await?;
        self.inner.update(device, kind, key, descriptor).await
    }

    async fn delete(&self, device: &Device, kind: ResourceKind, key: &ResourceKey) -> LbaasResult<()> {
        self.check(device, FailOn::Delete, kind, key).await?;
        self.inner.delete(device, kind, key).await
    }
}

/// In-memory fleet, recording L3 binding and a builder wired to both
pub struct TestFleet {
    /// Device state
    pub client: Arc<MemoryDeviceClient>,
    /// Network-layer calls
    pub l3: Arc<RecordingL3Binding>,
    /// Orchestrator under test
    pub builder: LbaasBuilder,
}

impl TestFleet {
    /// Fleet with the default configuration
    pub fn new() -> Self {
        Self::with_config(&lbaas_agent::AgentConfig::default())
    }

    /// Fleet with a specific configuration
    pub fn with_config(config: &lbaas_agent::AgentConfig) -> Self {
        let client = Arc::new(MemoryDeviceClient::new());
        let l3 = Arc::new(RecordingL3Binding::new());
        let builder = LbaasBuilder::new(config, client.clone()).with_l3_binding(l3.clone());
        Self { client, l3, builder }
    }
}

impl Default for TestFleet {
    fn default() -> Self {
        Self::new()
    }
}
