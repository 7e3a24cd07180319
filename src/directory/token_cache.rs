//! Single-flight cache for the directory session token.
//!
//! The cache holds one shared future. Callers clone it and await; whoever
//! finds the resolved token stale swaps in a new refresh future, and every
//! concurrent caller rides that one refresh instead of issuing their own.
//! The swap is guarded by pointer identity on the shared future, so two
//! callers racing to replace the same stale slot install exactly one
//! refresh. The refresh itself runs on a detached task: a caller that goes
//! away mid-refresh does not cancel it for everyone else.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use crate::types::{HelplineError, Result};

/// Outcome of one refresh cycle. The error is a plain string because every
/// waiter of the cycle receives its own clone.
type RefreshOutcome = std::result::Result<CachedToken, String>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// A bearer token and when it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at >= now + margin
    }
}

pub struct SingleFlightTokenCache {
    slot: Mutex<SharedRefresh>,
    margin: Duration,
}

impl SingleFlightTokenCache {
    /// `margin` is how long before expiry a token is already considered
    /// stale, covering clock skew and request latency.
    pub fn new(margin: Duration) -> Self {
        // Sentinel that is stale from the start, so the first caller
        // triggers a refresh.
        let expired = CachedToken {
            token: String::new(),
            expires_at: DateTime::<Utc>::MIN_UTC,
        };
        Self {
            slot: Mutex::new(futures::future::ready(Ok(expired)).boxed().shared()),
            margin,
        }
    }

    /// Return a token that is fresh for at least the margin, refreshing at
    /// most once. If the refresh cycle itself comes back stale or failed,
    /// that outcome is returned rather than refreshing in a loop.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<CachedToken>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let mut replaced = false;
        loop {
            let current = self.lock_slot().clone();
            let outcome = current.clone().await;

            if let Ok(token) = &outcome {
                if token.fresh_at(Utc::now(), self.margin) {
                    return Ok(token.clone());
                }
            }

            if replaced {
                // Our own refresh cycle resolved and is still not fresh;
                // surface what it produced. A later call starts over.
                return match outcome {
                    Ok(token) => Ok(token),
                    Err(e) => Err(HelplineError::Directory(format!(
                        "token refresh failed: {}",
                        e
                    ))),
                };
            }

            let mut slot = self.lock_slot();
            if slot.ptr_eq(&current) {
                let task = tokio::spawn(refresh());
                *slot = async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(format!("refresh task died: {}", e)),
                    }
                }
                .boxed()
                .shared();
            }
            drop(slot);
            replaced = true;
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, SharedRefresh> {
        // Nothing in the critical sections can panic, but recover anyway.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
