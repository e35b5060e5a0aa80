//! Operation Gateway — the single chokepoint for every platform call.
//!
//! ARCHITECTURAL RULE: no slice may call a `Platform` directly. Every call
//! goes through `Gateway::invoke`, which owns availability checks and fault
//! capture into the shared `ErrorChannel`.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::platform::{PlatformError, PlatformHandle, PlatformLocator};

pub const UNAVAILABLE_MESSAGE: &str = "Platform SDK is not available.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown platform error occurred.";

/// Failure shape of every gateway call. The message is also mirrored into the
/// `ErrorChannel` at the moment the call fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{}", UNAVAILABLE_MESSAGE)]
    Unavailable,

    #[error("{0}")]
    Operation(String),
}

/// Process-wide slot holding the last error message. Observers subscribe to it.
#[derive(Clone)]
pub struct ErrorChannel {
    slot: Arc<watch::Sender<Option<String>>>,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorChannel {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    pub fn set(&self, message: impl Into<String>) {
        self.slot.send_replace(Some(message.into()));
    }

    pub fn clear(&self) {
        self.slot.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.slot.subscribe()
    }
}

#[derive(Clone)]
pub struct Gateway {
    locator: Arc<dyn PlatformLocator>,
    errors: ErrorChannel,
}

impl Gateway {
    pub fn new(locator: Arc<dyn PlatformLocator>, errors: ErrorChannel) -> Self {
        Self { locator, errors }
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Runs `operation` against the platform handle.
    ///
    /// Missing handle → `Unavailable` without running the operation. Otherwise
    /// the error slot is cleared first, and a fault from the operation is
    /// written back to it before returning `Operation`.
    pub async fn invoke<T, F, Fut>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: FnOnce(PlatformHandle) -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let Some(platform) = self.locator.locate() else {
            warn!("Platform call rejected: handle not available");
            self.errors.set(UNAVAILABLE_MESSAGE);
            return Err(GatewayError::Unavailable);
        };

        self.errors.clear();

        match operation(platform).await {
            Ok(value) => {
                debug!("Platform call succeeded");
                Ok(value)
            }
            Err(e) => {
                let message = match e.to_string() {
                    m if m.trim().is_empty() => UNKNOWN_ERROR_MESSAGE.to_string(),
                    m => m,
                };
                warn!("Platform call failed: {message}");
                self.errors.set(message.clone());
                Err(GatewayError::Operation(message))
            }
        }
    }
}
