//! Waits for the platform handle to be bound.
//!
//! The poll interval and the load deadline live in one `select!`, so they are
//! always cancelled together. A loop is only ever started from `Idle` or
//! `TimedOut`; every other `initialize()` call is a no-op.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::auth::AuthSession;
use crate::client::gateway::ErrorChannel;
use crate::platform::PlatformLocator;

pub const LOAD_TIMEOUT_MESSAGE: &str = "Platform failed to load within 10 seconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessSettings {
    pub poll_interval: Duration,
    pub load_timeout: Duration,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            load_timeout: Duration::from_millis(10_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Idle,
    Polling,
    Ready,
    TimedOut,
}

enum PollOutcome {
    Found { ticks: u32 },
    TimedOut,
    Cancelled,
}

#[derive(Clone)]
pub struct ReadinessDetector {
    inner: Arc<Inner>,
}

struct Inner {
    locator: Arc<dyn PlatformLocator>,
    errors: ErrorChannel,
    settings: ReadinessSettings,
    state: watch::Sender<Readiness>,
    attempt: Mutex<Attempt>,
}

/// The loop currently allowed to publish an outcome.
struct Attempt {
    generation: u64,
    token: CancellationToken,
}

impl ReadinessDetector {
    pub fn new(
        locator: Arc<dyn PlatformLocator>,
        errors: ErrorChannel,
        settings: ReadinessSettings,
    ) -> Self {
        let (state, _) = watch::channel(Readiness::Idle);
        Self {
            inner: Arc::new(Inner {
                locator,
                errors,
                settings,
                state,
                attempt: Mutex::new(Attempt {
                    generation: 0,
                    token: CancellationToken::new(),
                }),
            }),
        }
    }

    pub fn state(&self) -> Readiness {
        *self.inner.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == Readiness::Ready
    }

    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.inner.state.subscribe()
    }

    /// Waits until the current attempt settles. `true` once the handle is bound.
    pub async fn wait_ready(&self) -> bool {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| matches!(s, Readiness::Ready | Readiness::TimedOut))
            .await
            .map(|s| *s == Readiness::Ready);
        settled.unwrap_or(false)
    }

    /// Starts detection. Must be called inside a Tokio runtime.
    pub fn initialize(&self, auth: &AuthSession) {
        let (generation, token) = {
            let mut attempt = self.inner.attempt.lock();
            let started = self.inner.state.send_if_modified(|state| match state {
                Readiness::Idle | Readiness::TimedOut => {
                    *state = Readiness::Polling;
                    true
                }
                Readiness::Polling | Readiness::Ready => false,
            });
            if !started {
                debug!("Readiness detection already {:?}; ignoring", self.state());
                return;
            }
            attempt.generation += 1;

            if self.inner.locator.locate().is_some() {
                info!("Platform handle present at start-up");
                self.inner.state.send_replace(Readiness::Ready);
                drop(attempt);
                let auth = auth.clone();
                tokio::spawn(async move {
                    auth.check_auth_status().await;
                });
                return;
            }

            attempt.token = CancellationToken::new();
            (attempt.generation, attempt.token.clone())
        };

        let inner = Arc::clone(&self.inner);
        let auth = auth.clone();
        tokio::spawn(async move {
            match inner.poll(token).await {
                PollOutcome::Found { ticks } => {
                    let current = inner.settle(generation, Readiness::Ready, || {
                        info!("Platform handle detected after {ticks} poll(s)");
                    });
                    if current {
                        auth.check_auth_status().await;
                    }
                }
                PollOutcome::TimedOut => {
                    inner.settle(generation, Readiness::TimedOut, || {
                        warn!(
                            "Platform handle did not appear within {}ms",
                            inner.settings.load_timeout.as_millis()
                        );
                        inner.errors.set(LOAD_TIMEOUT_MESSAGE);
                        auth.finish_loading();
                    });
                }
                PollOutcome::Cancelled => debug!("Readiness polling cancelled"),
            }
        });
    }

    /// Stops a loop that is still polling; both timers go with it and the
    /// state is back to `Idle` before this returns.
    pub fn shutdown(&self) {
        let mut attempt = self.inner.attempt.lock();
        attempt.token.cancel();
        attempt.generation += 1;
        self.inner.state.send_if_modified(|state| {
            if *state == Readiness::Polling {
                *state = Readiness::Idle;
                true
            } else {
                false
            }
        });
    }
}

impl Inner {
    /// Publishes `outcome` only if `generation` is still the live attempt.
    fn settle(&self, generation: u64, outcome: Readiness, on_current: impl FnOnce()) -> bool {
        let attempt = self.attempt.lock();
        if attempt.generation != generation {
            debug!("Dropping {outcome:?} from superseded readiness attempt");
            return false;
        }
        on_current();
        self.state.send_replace(outcome);
        true
    }

    async fn poll(&self, token: CancellationToken) -> PollOutcome {
        let start = Instant::now();
        let mut ticker =
            tokio::time::interval_at(start + self.settings.poll_interval, self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep_until(start + self.settings.load_timeout);
        tokio::pin!(deadline);

        let mut ticks = 0u32;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return PollOutcome::Cancelled,
                _ = ticker.tick() => {
                    ticks += 1;
                    if self.locator.locate().is_some() {
                        return PollOutcome::Found { ticks };
                    }
                }
                _ = &mut deadline => {
                    return if self.locator.locate().is_some() {
                        PollOutcome::Found { ticks }
                    } else {
                        PollOutcome::TimedOut
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::gateway::Gateway;
    use crate::platform::fake::FakePlatform;
    use crate::platform::PlatformSlot;

    struct Harness {
        slot: Arc<PlatformSlot>,
        errors: ErrorChannel,
        auth: AuthSession,
        detector: ReadinessDetector,
    }

    fn harness(slot: PlatformSlot) -> Harness {
        let slot = Arc::new(slot);
        let errors = ErrorChannel::new();
        let gateway = Gateway::new(slot.clone(), errors.clone());
        let auth = AuthSession::new(gateway);
        let detector =
            ReadinessDetector::new(slot.clone(), errors.clone(), ReadinessSettings::default());
        Harness {
            slot,
            errors,
            auth,
            detector,
        }
    }

    async fn settled_session(auth: &AuthSession) {
        let mut rx = auth.subscribe();
        rx.wait_for(|s| !s.is_loading).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_present_at_start_is_ready_immediately() {
        let fake = FakePlatform::new().signed_in();
        let h = harness(PlatformSlot::with(fake.clone()));

        h.detector.initialize(&h.auth);

        assert!(h.detector.is_ready());
        settled_session(&h.auth).await;
        assert!(h.auth.session().is_authenticated);
        assert_eq!(fake.count("auth.isSignedIn"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_detected_on_first_tick_after_binding() {
        let fake = FakePlatform::new();
        let h = harness(PlatformSlot::empty());
        let start = Instant::now();

        h.detector.initialize(&h.auth);
        assert_eq!(h.detector.state(), Readiness::Polling);

        let slot = h.slot.clone();
        let late = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            slot.install(late);
        });

        assert!(h.detector.wait_ready().await);
        assert_eq!(start.elapsed(), Duration::from_millis(400));

        settled_session(&h.auth).await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fake.count("auth.isSignedIn"), 1);
        assert_eq!(h.errors.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_records_error_and_stops_loading() {
        let h = harness(PlatformSlot::empty());
        let start = Instant::now();

        h.detector.initialize(&h.auth);

        assert!(!h.detector.wait_ready().await);
        assert_eq!(start.elapsed(), Duration::from_millis(10_000));
        assert_eq!(h.detector.state(), Readiness::TimedOut);
        assert_eq!(h.errors.current().as_deref(), Some(LOAD_TIMEOUT_MESSAGE));
        assert!(!h.auth.session().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_while_polling_is_a_no_op() {
        let fake = FakePlatform::new();
        let h = harness(PlatformSlot::empty());

        h.detector.initialize(&h.auth);
        h.detector.initialize(&h.auth);
        h.detector.initialize(&h.auth);

        tokio::time::sleep(Duration::from_millis(250)).await;
        h.slot.install(fake.clone());
        assert!(h.detector.wait_ready().await);
        settled_session(&h.auth).await;

        h.detector.initialize(&h.auth);
        tokio::task::yield_now().await;
        assert_eq!(fake.count("auth.isSignedIn"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_after_timeout_starts_a_new_attempt() {
        let fake = FakePlatform::new();
        let h = harness(PlatformSlot::empty());

        h.detector.initialize(&h.auth);
        assert!(!h.detector.wait_ready().await);

        h.slot.install(fake.clone());
        h.detector.initialize(&h.auth);
        assert!(h.detector.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_polling() {
        let h = harness(PlatformSlot::empty());

        h.detector.initialize(&h.auth);
        h.detector.shutdown();

        assert_eq!(h.detector.state(), Readiness::Idle);
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(h.detector.state(), Readiness::Idle);
        assert_eq!(h.errors.current(), None);
        assert!(h.auth.session().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_right_after_shutdown_detects_handle() {
        let fake = FakePlatform::new();
        let h = harness(PlatformSlot::empty());

        h.detector.initialize(&h.auth);
        h.detector.shutdown();
        h.detector.initialize(&h.auth);
        assert_eq!(h.detector.state(), Readiness::Polling);

        h.slot.install(fake.clone());
        assert!(h.detector.wait_ready().await);
        settled_session(&h.auth).await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(h.detector.state(), Readiness::Ready);
        assert_eq!(fake.count("auth.isSignedIn"), 1);
        assert_eq!(h.errors.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_attempt_cannot_time_out_the_new_one() {
        let h = harness(PlatformSlot::empty());

        h.detector.initialize(&h.auth);
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        h.detector.shutdown();
        h.detector.initialize(&h.auth);

        // Past the first attempt's deadline, short of the second's.
        tokio::time::sleep(Duration::from_millis(6_000)).await;
        assert_eq!(h.detector.state(), Readiness::Polling);
        assert_eq!(h.errors.current(), None);

        assert!(!h.detector.wait_ready().await);
        assert_eq!(h.errors.current().as_deref(), Some(LOAD_TIMEOUT_MESSAGE));
    }
}
