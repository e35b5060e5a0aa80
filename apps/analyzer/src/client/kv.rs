//! Gateway-wrapped key-value operations.

use crate::client::gateway::{Gateway, GatewayError};
use crate::platform::KvListing;

#[derive(Clone)]
pub struct KeyValueStore {
    gateway: Gateway,
}

impl KeyValueStore {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// `Ok(None)` means the key is absent, not that the call failed.
    pub async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.kv().get(key).await })
            .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<bool, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.kv().set(key, value).await })
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.kv().delete(key).await })
            .await
    }

    pub async fn list(&self, pattern: &str, return_values: bool) -> Result<KvListing, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.kv().list(pattern, return_values).await })
            .await
    }

    pub async fn flush(&self) -> Result<bool, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.kv().flush().await })
            .await
    }
}
