//! Short-lived email verification codes, keyed by user.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Wrong guesses allowed before a pending code is discarded.
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at: Instant,
    failed_attempts: u32,
}

#[derive(Clone)]
pub struct VerificationCodeStore {
    inner: Arc<RwLock<HashMap<Uuid, PendingCode>>>,
    ttl: Duration,
}

impl VerificationCodeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh six-digit code, replacing any pending one.
    pub async fn issue(&self, user_id: Uuid) -> String {
        self.issue_at(user_id, Instant::now()).await
    }

    async fn issue_at(&self, user_id: Uuid, now: Instant) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let pending = PendingCode {
            code: code.clone(),
            expires_at: now + self.ttl,
            failed_attempts: 0,
        };
        self.inner.write().await.insert(user_id, pending);
        code
    }

    /// A matching unexpired code is consumed. Expired entries are dropped on
    /// read, and the entry is discarded after `MAX_ATTEMPTS` wrong guesses.
    pub async fn verify(&self, user_id: Uuid, code: &str) -> bool {
        self.verify_at(user_id, code, Instant::now()).await
    }

    async fn verify_at(&self, user_id: Uuid, code: &str, now: Instant) -> bool {
        let mut inner = self.inner.write().await;
        let Some(pending) = inner.get_mut(&user_id) else {
            return false;
        };
        if pending.expires_at <= now {
            inner.remove(&user_id);
            return false;
        }
        if pending.code != code {
            pending.failed_attempts += 1;
            if pending.failed_attempts >= MAX_ATTEMPTS {
                inner.remove(&user_id);
                debug!(%user_id, "verification code discarded after too many attempts");
            }
            return false;
        }
        inner.remove(&user_id);
        true
    }

    /// Remove expired entries; returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    async fn sweep_at(&self, now: Instant) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, pending| pending.expires_at > now);
        before - inner.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

pub async fn run_sweeper(store: VerificationCodeStore, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let removed = store.sweep().await;
        if removed > 0 {
            debug!(removed, "expired verification codes swept");
        }
    }
}
