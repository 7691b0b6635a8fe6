//! Single-use verification codes
//!
//! A code is issued per device UDID and must be echoed back through the
//! device's Jamf record before a privileged command is sent:
//! 1. `issue()` generates 32 random bytes with 2-minute validity
//! 2. The value is shown to the user and written to an extension attribute
//! 3. The first verification attempt burns the code, match or not
//! 4. A background [`Sweeper`] drops anything that expired unclaimed

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use cmdod_core::{Classify, ErrorOrigin, Udid};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// How long an issued code stays valid
pub const CODE_VALIDITY: Duration = Duration::from_secs(120);

/// Bytes of entropy behind every code
pub const CODE_ENTROPY_BYTES: usize = 32;

/// How often the background sweeper runs
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Code and verification errors
#[derive(Debug, Error)]
pub enum CodeError {
    #[error("failed to generate code")]
    GenerationFailed(#[source] rand::Error),
    #[error("no valid code found")]
    NotFound,
    #[error("code expired")]
    Expired,
    #[error("code mismatch")]
    Mismatch,
    #[error("extension attribute not found")]
    ProofAttributeNotFound(String),
}

impl Classify for CodeError {
    fn status(&self) -> u16 {
        match self {
            CodeError::GenerationFailed(_) => 500,
            CodeError::NotFound => 401,
            CodeError::Expired => 410,
            CodeError::Mismatch => 400,
            CodeError::ProofAttributeNotFound(_) => 400,
        }
    }

    fn origin(&self) -> ErrorOrigin {
        match self {
            CodeError::GenerationFailed(_) => ErrorOrigin::Service,
            _ => ErrorOrigin::Request,
        }
    }
}

pub type CodeResult<T> = Result<T, CodeError>;

/// An issued verification code
#[derive(Debug, Clone)]
pub struct Code {
    value: String,
    issued_at: Instant,
    expires_at: Instant,
}

impl Code {
    fn generate(validity: Duration) -> CodeResult<Self> {
        let mut bytes = [0u8; CODE_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(CodeError::GenerationFailed)?;

        let now = Instant::now();
        Ok(Self {
            value: URL_SAFE.encode(bytes),
            issued_at: now,
            expires_at: now + validity,
        })
    }

    /// The opaque code value
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn expires_in(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// In-memory store of live codes, one per device
pub struct CodeStore {
    codes: RwLock<HashMap<Udid, Code>>,
    validity: Duration,
}

impl Default for CodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeStore {
    /// Create a store with the standard 2-minute validity
    pub fn new() -> Self {
        Self::with_validity(CODE_VALIDITY)
    }

    /// Create a store with a custom validity window
    pub fn with_validity(validity: Duration) -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            validity,
        }
    }

    /// Issue a fresh code for a device, replacing any previous one
    pub async fn issue(&self, udid: &Udid) -> CodeResult<Code> {
        let code = Code::generate(self.validity)?;

        self.codes.write().await.insert(*udid, code.clone());

        info!(udid = %udid, expires_in = ?code.expires_in(), "Issued verification code");
        Ok(code)
    }

    /// Take the current code for a device
    ///
    /// The entry is removed whatever the outcome, so each code gets exactly
    /// one verification attempt. Lookup, expiry check and removal happen
    /// under a single write lock.
    pub async fn peek_and_consume(&self, udid: &Udid) -> CodeResult<String> {
        let mut codes = self.codes.write().await;
        let code = codes.remove(udid).ok_or(CodeError::NotFound)?;

        if code.is_expired() {
            debug!(udid = %udid, "Code expired before use");
            return Err(CodeError::Expired);
        }

        debug!(udid = %udid, "Code consumed");
        Ok(code.value)
    }

    /// Drop the code for a device if there is one
    pub async fn force_expire(&self, udid: &Udid) {
        if self.codes.write().await.remove(udid).is_some() {
            debug!(udid = %udid, "Forced code expiry");
        }
    }

    /// Remove every expired code, returning how many were dropped
    pub async fn sweep(&self) -> usize {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, code| !code.is_expired());
        let removed = before - codes.len();
        if removed > 0 {
            debug!(removed, "Swept expired codes");
        }
        removed
    }

    /// Whether a live (unexpired) code exists for a device
    pub async fn contains(&self, udid: &Udid) -> bool {
        self.codes
            .read()
            .await
            .get(udid)
            .is_some_and(|code| !code.is_expired())
    }

    /// Number of stored entries, expired or not
    pub async fn len(&self) -> usize {
        self.codes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.codes.read().await.is_empty()
    }

    /// Start a background sweeper for this store
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> Sweeper {
        Sweeper::spawn(self.clone(), every)
    }
}

/// Handle to the periodic sweep task
pub struct Sweeper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a task sweeping `store` every `every`
    pub fn spawn(store: Arc<CodeStore>, every: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        store.sweep().await;
                    }
                }
            }
            debug!("Code sweeper stopped");
        });

        info!(interval = ?every, "Code sweeper started");
        Self { stop_tx, handle }
    }

    /// Signal the task to stop and wait for it to finish
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udid(n: u32) -> Udid {
        Udid::parse(&format!("00000000-0000-4000-8000-{:012X}", n)).unwrap()
    }

    #[tokio::test]
    async fn test_issue_then_consume_once() {
        let store = CodeStore::new();
        let id = udid(1);

        let code = store.issue(&id).await.unwrap();
        assert!(!code.value().is_empty());

        let value = store.peek_and_consume(&id).await.unwrap();
        assert_eq!(value, code.value());

        let again = store.peek_and_consume(&id).await;
        assert!(matches!(again, Err(CodeError::NotFound)));
    }

    #[tokio::test]
    async fn test_code_is_url_safe_and_long_enough() {
        let store = CodeStore::new();
        let code = store.issue(&udid(2)).await.unwrap();
        let decoded = URL_SAFE.decode(code.value()).unwrap();
        assert_eq!(decoded.len(), CODE_ENTROPY_BYTES);
        assert!(!code.value().contains('+') && !code.value().contains('/'));
    }

    #[tokio::test]
    async fn test_reissue_overwrites() {
        let store = CodeStore::new();
        let id = udid(3);

        let first = store.issue(&id).await.unwrap();
        let second = store.issue(&id).await.unwrap();
        assert_ne!(first.value(), second.value());
        assert_eq!(store.len().await, 1);

        let value = store.peek_and_consume(&id).await.unwrap();
        assert_eq!(value, second.value());
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_just_inside_window() {
        let store = CodeStore::new();
        let id = udid(4);

        let code = store.issue(&id).await.unwrap();
        assert_eq!(code.expires_in(), CODE_VALIDITY);
        tokio::time::advance(Duration::from_secs(119)).await;
        assert_eq!(code.expires_in(), Duration::from_secs(1));

        assert_eq!(store.peek_and_consume(&id).await.unwrap(), code.value());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_just_outside_window() {
        let store = CodeStore::new();
        let id = udid(5);

        store.issue(&id).await.unwrap();
        tokio::time::advance(Duration::from_secs(121)).await;

        assert!(!store.contains(&id).await);
        let result = store.peek_and_consume(&id).await;
        assert!(matches!(result, Err(CodeError::Expired)));

        // the expired entry was burned too
        let result = store.peek_and_consume(&id).await;
        assert!(matches!(result, Err(CodeError::NotFound)));
    }

    #[tokio::test]
    async fn test_force_expire_is_idempotent() {
        let store = CodeStore::new();
        let id = udid(6);

        store.force_expire(&id).await;
        assert!(store.is_empty().await);

        store.issue(&id).await.unwrap();
        store.force_expire(&id).await;
        store.force_expire(&id).await;
        assert!(store.is_empty().await);
        assert!(matches!(
            store.peek_and_consume(&id).await,
            Err(CodeError::NotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let store = CodeStore::new();
        let stale = udid(7);
        let fresh = udid(8);

        store.issue(&stale).await.unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;
        store.issue(&fresh).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.contains(&fresh).await);
        assert!(!store.contains(&stale).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issue_distinct_ids() {
        let store = Arc::new(CodeStore::new());

        let tasks = (0..64u32).map(|n| {
            let store = store.clone();
            tokio::spawn(async move {
                let id = udid(100 + n);
                store.issue(&id).await.unwrap();
                let last = store.issue(&id).await.unwrap();
                (id, last.value().to_string())
            })
        });

        let issued = futures::future::join_all(tasks).await;
        assert_eq!(store.len().await, 64);

        for result in issued {
            let (id, value) = result.unwrap();
            assert_eq!(store.peek_and_consume(&id).await.unwrap(), value);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_single_winner() {
        let store = Arc::new(CodeStore::new());
        let id = udid(9);
        store.issue(&id).await.unwrap();

        let tasks = (0..16).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.peek_and_consume(&id).await })
        });

        let results = futures::future::join_all(tasks).await;
        let winners = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_clears_and_stops() {
        let store = Arc::new(CodeStore::new());
        let sweeper = store.spawn_sweeper(DEFAULT_SWEEP_INTERVAL);

        store.issue(&udid(10)).await.unwrap();
        assert_eq!(store.len().await, 1);

        tokio::time::sleep(Duration::from_secs(135)).await;
        assert!(store.is_empty().await);

        sweeper.stop().await;
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(CodeError::NotFound.status(), 401);
        assert_eq!(CodeError::Expired.status(), 410);
        assert_eq!(CodeError::Mismatch.status(), 400);
        assert_eq!(
            CodeError::ProofAttributeNotFound("Wipe Code".into()).origin(),
            ErrorOrigin::Request
        );
    }
}
