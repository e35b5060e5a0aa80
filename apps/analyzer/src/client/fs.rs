//! Gateway-wrapped file operations.

use bytes::Bytes;

use crate::client::gateway::{Gateway, GatewayError};
use crate::platform::{FileBlob, FsItem};

#[derive(Clone)]
pub struct FileStore {
    gateway: Gateway,
}

impl FileStore {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn write(&self, path: &str, data: Bytes) -> Result<FsItem, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.fs().write(path, data).await })
            .await
    }

    pub async fn read(&self, path: &str) -> Result<Bytes, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.fs().read(path).await })
            .await
    }

    pub async fn upload(&self, files: Vec<FileBlob>) -> Result<FsItem, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.fs().upload(files).await })
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.gateway
            .invoke(|p| async move { p.fs().delete(path).await })
            .await
    }

    pub async fn read_dir(&self, path: &str) -> Result<Vec<FsItem>, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.fs().readdir(path).await })
            .await
    }
}
