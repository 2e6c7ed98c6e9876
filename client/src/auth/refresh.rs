//! Token refresh scheduler.
//!
//! SYSTEM CONTEXT
//! ==============
//! Watches the session and keeps at most one timer armed for
//! `sessionExpiresAt - REFRESH_LEAD`. When it fires it asks the refresher
//! (the auth service) for a new credential; a successful refresh moves the
//! expiry, which re-arms the timer through the same session observer.
//!
//! DESIGN
//! ======
//! Each armed timer carries a generation. A firing timer first releases its
//! own slot, so the re-arm triggered by its refresh never aborts the task
//! that is still running it.
//!
//! A backend that issues credentials living `REFRESH_LEAD` or less hands back
//! an expiry that is already inside the lead window. Only the first arm after
//! sign-in refreshes at once; after a timer has fired, the next one waits half
//! of the remaining lifetime.

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use super::AuthError;
use crate::runtime::{self, Task};
use crate::state::session::{SessionState, SubscriptionId};

/// How long before expiry the credential is renewed.
pub const REFRESH_LEAD: Duration = Duration::minutes(5);

/// Whatever can renew the session's credential.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// Renew the credential. Implementations sign out on failure.
    async fn refresh(&self) -> Result<(), AuthError>;
}

/// Result of [`RefreshScheduler::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Timer set to fire at the given instant.
    Scheduled(OffsetDateTime),
    /// Already inside the lead window; refreshing now.
    Immediate,
    /// Session already expired; nothing armed.
    Expired,
    /// No async runtime to run the timer on.
    NoRuntime,
}

struct ArmedTimer {
    generation: u64,
    fire_at: OffsetDateTime,
    task: Task,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    armed: Option<ArmedTimer>,
    last_fired: Option<OffsetDateTime>,
}

/// Owner of the single refresh timer.
#[derive(Clone)]
pub struct RefreshScheduler {
    slot: Arc<Mutex<Slot>>,
    refresher: Weak<dyn SessionRefresher>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(refresher: Weak<dyn SessionRefresher>) -> Self {
        Self { slot: Arc::new(Mutex::new(Slot::default())), refresher }
    }

    /// Arm on sign-in or expiry change, disarm on sign-out.
    pub fn attach(&self, session: &SessionState) -> SubscriptionId {
        let scheduler = self.clone();
        session.subscribe(move |prev, next| {
            if !next.is_authenticated {
                scheduler.disarm();
                return;
            }
            let Some(expires_at) = next.session_expires_at else {
                return;
            };
            if !prev.is_authenticated || prev.session_expires_at != next.session_expires_at {
                scheduler.arm(expires_at);
            }
        })
    }

    /// Replace any armed timer with one for `expires_at - REFRESH_LEAD`.
    pub fn arm(&self, expires_at: OffsetDateTime) -> ArmOutcome {
        let now = OffsetDateTime::now_utc();
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.armed.take() {
            previous.task.abort();
        }

        if now > expires_at {
            tracing::debug!("session already expired; refresh timer not armed");
            return ArmOutcome::Expired;
        }

        let lead_fire_at = expires_at - REFRESH_LEAD;
        let fired_recently = slot.last_fired.is_some_and(|at| now - at < REFRESH_LEAD);
        let (fire_at, immediate) = if lead_fire_at > now {
            (lead_fire_at, false)
        } else if fired_recently {
            (now + (expires_at - now) / 2, false)
        } else {
            (now, true)
        };
        let sleep_for = std::time::Duration::try_from(fire_at - now).unwrap_or_default();

        slot.generation += 1;
        let generation = slot.generation;
        let owner = Arc::clone(&self.slot);
        let refresher = self.refresher.clone();
        let Some(task) = runtime::spawn(async move {
            runtime::sleep(sleep_for).await;
            if !release(&owner, generation) {
                return;
            }
            let Some(refresher) = refresher.upgrade() else {
                return;
            };
            tracing::info!("refresh timer fired");
            if let Err(e) = refresher.refresh().await {
                tracing::warn!(error = %e, "scheduled refresh failed");
            }
        }) else {
            tracing::warn!("no async runtime; refresh timer not armed");
            return ArmOutcome::NoRuntime;
        };
        slot.armed = Some(ArmedTimer { generation, fire_at, task });

        if immediate {
            tracing::info!("session inside refresh window; refreshing now");
            ArmOutcome::Immediate
        } else {
            tracing::debug!(fire_in_secs = (fire_at - now).whole_seconds(), "refresh timer armed");
            ArmOutcome::Scheduled(fire_at)
        }
    }

    /// Cancel the armed timer, if any, and forget when the last one fired.
    pub fn disarm(&self) {
        let mut slot = lock(&self.slot);
        slot.last_fired = None;
        if let Some(armed) = slot.armed.take() {
            armed.task.abort();
            tracing::debug!("refresh timer disarmed");
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        lock(&self.slot).armed.is_some()
    }

    /// When the armed timer will fire.
    #[must_use]
    pub fn fire_at(&self) -> Option<OffsetDateTime> {
        lock(&self.slot).armed.as_ref().map(|armed| armed.fire_at)
    }
}

/// Take the slot if it still belongs to `generation`, noting the firing.
fn release(slot: &Mutex<Slot>, generation: u64) -> bool {
    let mut slot = lock(slot);
    if slot.armed.as_ref().is_some_and(|armed| armed.generation == generation) {
        slot.armed = None;
        slot.last_fired = Some(OffsetDateTime::now_utc());
        true
    } else {
        false
    }
}
