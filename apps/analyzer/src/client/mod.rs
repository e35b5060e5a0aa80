//! The context object every consumer is handed.
//!
//! Owns one `ErrorChannel`, one `Session` and the readiness state for the
//! whole process. Slices are cheap clones sharing the same gateway.

use std::sync::Arc;

use tokio::sync::watch;

use crate::platform::PlatformLocator;

pub mod ai;
pub mod auth;
pub mod fs;
pub mod gateway;
pub mod kv;
pub mod readiness;

pub use ai::InferenceClient;
pub use auth::{AuthSession, Session};
pub use fs::FileStore;
pub use gateway::{ErrorChannel, Gateway, GatewayError};
pub use kv::KeyValueStore;
pub use readiness::{Readiness, ReadinessDetector, ReadinessSettings};

pub struct PlatformClient {
    errors: ErrorChannel,
    readiness: ReadinessDetector,
    auth: AuthSession,
    fs: FileStore,
    ai: InferenceClient,
    kv: KeyValueStore,
}

impl PlatformClient {
    pub fn new(locator: Arc<dyn PlatformLocator>, settings: ReadinessSettings) -> Self {
        let errors = ErrorChannel::new();
        let gateway = Gateway::new(Arc::clone(&locator), errors.clone());
        Self {
            readiness: ReadinessDetector::new(locator, errors.clone(), settings),
            auth: AuthSession::new(gateway.clone()),
            fs: FileStore::new(gateway.clone()),
            ai: InferenceClient::new(gateway.clone()),
            kv: KeyValueStore::new(gateway),
            errors,
        }
    }

    /// Starts waiting for the platform; runs the first auth check once it appears.
    pub fn initialize(&self) {
        self.readiness.initialize(&self.auth);
    }

    pub fn shutdown(&self) {
        self.readiness.shutdown();
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.state()
    }

    pub async fn wait_ready(&self) -> bool {
        self.readiness.wait_ready().await
    }

    pub fn global_error(&self) -> Option<String> {
        self.errors.current()
    }

    pub fn clear_error(&self) {
        self.errors.clear();
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<String>> {
        self.errors.subscribe()
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn fs(&self) -> &FileStore {
        &self.fs
    }

    pub fn ai(&self) -> &InferenceClient {
        &self.ai
    }

    pub fn kv(&self) -> &KeyValueStore {
        &self.kv
    }
}
