//! In-memory port allocation.

use async_trait::async_trait;
use lbaas_common::LbaasResult;
use tokio::sync::Mutex;
use tracing::debug;

use super::{FixedIp, Port, PortAllocator};

/// First host number handed out by [`MemoryPortAllocator`].
const FIRST_HOST: usize = 100;

/// Port allocator handing out sequential addresses from 10.0.0.100.
///
/// Ports are remembered by name, so asking twice for the same translation
/// returns the same address.
#[derive(Debug, Default)]
pub struct MemoryPortAllocator {
    ports: Mutex<Vec<Port>>,
}

impl MemoryPortAllocator {
    /// Creates an allocator with no ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ports allocated so far.
    pub async fn port_count(&self) -> usize {
        self.ports.lock().await.len()
    }
}

#[async_trait]
impl PortAllocator for MemoryPortAllocator {
    async fn get_port_by_name(&self, name: &str) -> LbaasResult<Vec<Port>> {
        let ports = self.ports.lock().await;
        Ok(ports.iter().filter(|p| p.name == name).cloned().collect())
    }

    async fn create_port_on_subnet(
        &self,
        subnet_id: &str,
        _mac_address: Option<&str>,
        name: &str,
        fixed_address_count: usize,
    ) -> LbaasResult<Port> {
        let mut ports = self.ports.lock().await;
        let base = FIRST_HOST + ports.iter().map(|p| p.fixed_ips.len()).sum::<usize>();
        let port = Port {
            id: format!("port-{}", ports.len() + 1),
            name: name.to_string(),
            fixed_ips: (0..fixed_address_count)
                .map(|i| FixedIp {
                    ip_address: format!("10.0.0.{}", base + i),
                    subnet_id: subnet_id.to_string(),
                })
                .collect(),
        };
        debug!("Allocated port {} on subnet {}", port.name, subnet_id);
        ports.push(port.clone());
        Ok(port)
    }
}
