//! Identity slice built on the gateway.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::gateway::Gateway;
use crate::platform::Identity;

/// Observable session state. Starts loading until the first status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: Option<Identity>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
        }
    }
}

impl Session {
    fn signed_out() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: false,
        }
    }
}

#[derive(Clone)]
pub struct AuthSession {
    gateway: Gateway,
    state: Arc<watch::Sender<Session>>,
}

impl AuthSession {
    pub fn new(gateway: Gateway) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            gateway,
            state: Arc::new(state),
        }
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.is_loading = loading);
    }

    /// Stops the loading indicator without touching identity.
    pub(crate) fn finish_loading(&self) {
        self.set_loading(false);
    }

    /// Queries the platform and reconciles identity. Returns `false` when the
    /// user is signed out or the call failed.
    pub async fn check_auth_status(&self) -> bool {
        self.set_loading(true);

        let state = Arc::clone(&self.state);
        let signed_in = self
            .gateway
            .invoke(move |platform| async move {
                let signed_in = platform.auth().is_signed_in().await?;
                if signed_in {
                    let user = platform.auth().get_user().await?;
                    state.send_modify(|s| {
                        s.user = Some(user);
                        s.is_authenticated = true;
                    });
                } else {
                    state.send_modify(|s| {
                        s.user = None;
                        s.is_authenticated = false;
                    });
                }
                Ok(signed_in)
            })
            .await;

        self.set_loading(false);
        signed_in.unwrap_or(false)
    }

    /// Loading is cleared by the nested status check, not here.
    pub async fn sign_in(&self) {
        self.set_loading(true);
        if let Err(e) = self
            .gateway
            .invoke(|platform| async move { platform.auth().sign_in().await })
            .await
        {
            warn!("Sign-in did not complete: {e}");
        }
        let signed_in = self.check_auth_status().await;
        info!("Sign-in reconciled: authenticated={signed_in}");
    }

    /// Always effective locally, whatever the platform answered.
    pub async fn sign_out(&self) {
        self.set_loading(true);
        if let Err(e) = self
            .gateway
            .invoke(|platform| async move { platform.auth().sign_out().await })
            .await
        {
            warn!("Platform sign-out failed, clearing local session anyway: {e}");
        }
        self.state.send_replace(Session::signed_out());
    }

    pub async fn refresh_user(&self) {
        self.set_loading(true);
        let user = self
            .gateway
            .invoke(|platform| async move { platform.auth().get_user().await })
            .await;
        if let Ok(user) = user {
            self.state.send_modify(|s| {
                s.user = Some(user);
                s.is_authenticated = true;
            });
        }
        self.set_loading(false);
    }
}
