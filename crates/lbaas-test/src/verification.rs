//! Verification helpers for reconciliation tests
//!
//! Provides assertion helpers over the in-memory fleet state and over the
//! order of the mutating calls it recorded

use lbaas_agent::device::DeviceOp;
use lbaas_agent::MemoryDeviceClient;
use lbaas_common::{Action, Descriptor, ResourceKey, ResourceKind};
use serde_json::Value;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected {kind} '{path}' on {device}")]
    ObjectMissing {
        device: String,
        kind: ResourceKind,
        path: String,
    },

    #[error("Unexpected {kind} '{path}' on {device}")]
    UnexpectedObject {
        device: String,
        kind: ResourceKind,
        path: String,
    },

    #[error("Value mismatch for {path}:{attr} on {device}: expected {expected}, got {actual}")]
    AttributeMismatch {
        device: String,
        path: String,
        attr: String,
        expected: Value,
        actual: Value,
    },

    #[error("Expected {expected} objects on {device}, found {actual}")]
    ObjectCountMismatch {
        device: String,
        expected: usize,
        actual: usize,
    },

    #[error("Operation not recorded: {0}")]
    OperationMissing(String),

    #[error("Expected {first} before {second}")]
    OrderViolation { first: String, second: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Device state verification helper
pub struct DeviceVerifier<'a> {
    client: &'a MemoryDeviceClient,
}

impl<'a> DeviceVerifier<'a> {
    /// Create a new device verifier
    pub fn new(client: &'a MemoryDeviceClient) -> Self {
        Self { client }
    }

    /// Verify that an object exists, returning its attributes
    pub async fn assert_exists(&self, device: &str, kind: ResourceKind, key: &ResourceKey) -> VerifyResult<Descriptor> {
        self.client
            .get(device, kind, key)
            .await
            .ok_or_else(|| VerificationError::ObjectMissing {
                device: device.to_string(),
                kind,
                path: key.to_string(),
            })
    }

    /// Verify that an object does not exist
    pub async fn assert_absent(&self, device: &str, kind: ResourceKind, key: &ResourceKey) -> VerifyResult<()> {
        match self.client.get(device, kind, key).await {
            Some(_) => Err(VerificationError::UnexpectedObject {
                device: device.to_string(),
                kind,
                path: key.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Verify that an object attribute has a specific value
    pub async fn assert_attribute(
        &self,
        device: &str,
        kind: ResourceKind,
        key: &ResourceKey,
        attr: &str,
        expected: impl Into<Value>,
    ) -> VerifyResult<()> {
        let object = self.assert_exists(device, kind, key).await?;
        let expected = expected.into();
        let actual = object.get(attr).cloned().unwrap_or(Value::Null);

        if actual != expected {
            return Err(VerificationError::AttributeMismatch {
                device: device.to_string(),
                path: key.to_string(),
                attr: attr.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify the number of objects on a device
    pub async fn assert_object_count(&self, device: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.client.object_count(device).await;
        if actual != expected {
            return Err(VerificationError::ObjectCountMismatch {
                device: device.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Operation log verifier
pub struct OpLogVerifier {
    ops: Vec<DeviceOp>,
}

impl OpLogVerifier {
    /// Create a verifier over recorded operations
    pub fn new(ops: Vec<DeviceOp>) -> Self {
        Self { ops }
    }

    /// Number of recorded mutating calls
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Index of the first matching operation on a device
    pub fn position(&self, device: &str, action: Action, kind: ResourceKind, name: &str) -> Option<usize> {
        self.ops
            .iter()
            .position(|op| op.device == device && op.action == action && op.kind == kind && op.key.name == name)
    }

    /// Verify that one operation was recorded before another on a device
    pub fn assert_before(
        &self,
        device: &str,
        first: (Action, ResourceKind, &str),
        second: (Action, ResourceKind, &str),
    ) -> VerifyResult<()> {
        let describe = |(action, kind, name): (Action, ResourceKind, &str)| format!("{:?} {} {} on {}", action, kind, name, device);

        let a = self
            .position(device, first.0, first.1, first.2)
            .ok_or_else(|| VerificationError::OperationMissing(describe(first)))?;
        let b = self
            .position(device, second.0, second.1, second.2)
            .ok_or_else(|| VerificationError::OperationMissing(describe(second)))?;

        if a >= b {
            return Err(VerificationError::OrderViolation {
                first: describe(first),
                second: describe(second),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbaas_agent::{Device, DeviceClient};
    use lbaas_common::descriptor;

    #[tokio::test]
    async fn test_device_verifier() {
        let client = MemoryDeviceClient::new();
        let key = ResourceKey::new("Project_t1", "pool1");
        client
            .create(
                &Device::new("bigip1"),
                ResourceKind::Pool,
                &key,
                &descriptor! { "name" => "pool1", "monitor" => "hm_1" },
            )
            .await
            .unwrap();

        let verifier = DeviceVerifier::new(&client);
        verifier.assert_exists("bigip1", ResourceKind::Pool, &key).await.unwrap();
        verifier
            .assert_attribute("bigip1", ResourceKind::Pool, &key, "monitor", "hm_1")
            .await
            .unwrap();
        assert!(verifier
            .assert_attribute("bigip1", ResourceKind::Pool, &key, "monitor", "hm_2")
            .await
            .is_err());
        assert!(verifier.assert_absent("bigip2", ResourceKind::Pool, &key).await.is_ok());
        verifier.assert_object_count("bigip1", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_op_log_order() {
        let client = MemoryDeviceClient::new();
        let device = Device::new("bigip1");
        let key = ResourceKey::new("Project_t1", "pool1");
        client
            .create(&device, ResourceKind::Pool, &key, &descriptor! { "name" => "pool1" })
            .await
            .unwrap();
        client.delete(&device, ResourceKind::Pool, &key).await.unwrap();

        let log = OpLogVerifier::new(client.op_log().await);
        assert_eq!(log.len(), 2);
        log.assert_before(
            "bigip1",
            (Action::Created, ResourceKind::Pool, "pool1"),
            (Action::Deleted, ResourceKind::Pool, "pool1"),
        )
        .unwrap();
        assert!(log
            .assert_before(
                "bigip1",
                (Action::Deleted, ResourceKind::Pool, "pool1"),
                (Action::Created, ResourceKind::Pool, "pool1"),
            )
            .is_err());
    }
}
