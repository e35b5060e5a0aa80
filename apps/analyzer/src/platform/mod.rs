//! Host platform surface: the four capability areas the client consumes.
//!
//! Nothing in this module knows about the gateway. A `Platform` is just a
//! handle; the client layer decides when one is available and wraps every
//! call made through it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::llm_client::LlmError;

#[cfg(test)]
pub mod fake;
pub mod local;
pub mod locator;
pub mod types;

pub use locator::{PlatformLocator, PlatformSlot};
pub use types::{
    ChatMessage, ChatOptions, ChatPrompt, ChatResponse, ContentPart, FileBlob, FsItem, Identity,
    ImageInput, KvItem, KvListing, MessageContent, ResponseMessage, Role,
};

/// A fault raised by a platform implementation while running an operation.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{0}")]
    Operation(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Inference error: {0}")]
    Llm(#[from] LlmError),
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn is_signed_in(&self) -> Result<bool, PlatformError>;
    async fn get_user(&self) -> Result<Identity, PlatformError>;
    async fn sign_in(&self) -> Result<(), PlatformError>;
    async fn sign_out(&self) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait FsApi: Send + Sync {
    async fn upload(&self, files: Vec<FileBlob>) -> Result<FsItem, PlatformError>;
    async fn write(&self, path: &str, data: Bytes) -> Result<FsItem, PlatformError>;
    async fn read(&self, path: &str) -> Result<Bytes, PlatformError>;
    async fn delete(&self, path: &str) -> Result<(), PlatformError>;
    async fn readdir(&self, path: &str) -> Result<Vec<FsItem>, PlatformError>;
}

#[async_trait]
pub trait AiApi: Send + Sync {
    async fn chat(
        &self,
        prompt: ChatPrompt,
        options: Option<ChatOptions>,
    ) -> Result<ChatResponse, PlatformError>;
    async fn img2txt(&self, image: ImageInput) -> Result<String, PlatformError>;
}

#[async_trait]
pub trait KvApi: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError>;
    async fn set(&self, key: &str, value: &str) -> Result<bool, PlatformError>;
    async fn delete(&self, key: &str) -> Result<bool, PlatformError>;
    async fn list(&self, pattern: &str, return_values: bool) -> Result<KvListing, PlatformError>;
    async fn flush(&self) -> Result<bool, PlatformError>;
}

/// The host's capability object. Its presence is the only readiness signal.
pub trait Platform: Send + Sync {
    fn auth(&self) -> &dyn AuthApi;
    fn fs(&self) -> &dyn FsApi;
    fn ai(&self) -> &dyn AiApi;
    fn kv(&self) -> &dyn KvApi;
}

pub type PlatformHandle = Arc<dyn Platform>;
