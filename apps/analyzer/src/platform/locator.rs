use parking_lot::RwLock;
use tracing::info;

use crate::platform::PlatformHandle;

/// Resolves the platform handle, if the host has bound one yet.
pub trait PlatformLocator: Send + Sync {
    fn locate(&self) -> Option<PlatformHandle>;
}

/// A late-binding slot the host fills in once it has finished loading.
#[derive(Default)]
pub struct PlatformSlot {
    handle: RwLock<Option<PlatformHandle>>,
}

impl PlatformSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(handle: PlatformHandle) -> Self {
        Self {
            handle: RwLock::new(Some(handle)),
        }
    }

    pub fn install(&self, handle: PlatformHandle) {
        *self.handle.write() = Some(handle);
        info!("Platform handle installed");
    }
}

impl PlatformLocator for PlatformSlot {
    fn locate(&self) -> Option<PlatformHandle> {
        self.handle.read().clone()
    }
}
