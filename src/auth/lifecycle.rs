/// Credential lifecycle state machine
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::auth::broker::AuthBroker;
use crate::auth::store::CredentialStore;
use crate::error::{CollectorError, Result};
use crate::types::{TokenKind, TokenState};

/// Decides per cycle whether a fresh interactive login, a refresh-token
/// exchange, or nothing is needed, and persists whatever it obtains.
///
/// There is no intra-cycle retry; the next scheduled reconcile is the retry.
/// Only this component ever writes tokens - every consumer re-reads the
/// store on use, so persisting a new token is also its propagation.
pub struct TokenLifecycleManager {
    store: Arc<dyn CredentialStore>,
    broker: Arc<dyn AuthBroker>,
    /// Renewal threshold, deliberately earlier than the hard expiry so a
    /// failed renewal still has days of retry margin
    renew_after: Duration,
}

impl TokenLifecycleManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        broker: Arc<dyn AuthBroker>,
        renew_after_days: i64,
    ) -> Self {
        TokenLifecycleManager {
            store,
            broker,
            renew_after: Duration::days(renew_after_days),
        }
    }

    /// Derive the refresh-token state from its age at `now`
    pub async fn refresh_state(&self, now: DateTime<Utc>) -> Result<TokenState> {
        match self.store.age_of(TokenKind::Refresh, now).await {
            Ok(age) => {
                let age_days = age.num_seconds() as f64 / 86_400.0;
                if age >= self.renew_after {
                    info!("Refresh token is {:.1} days old, needs renewal", age_days);
                    Ok(TokenState::RefreshTokenStale)
                } else {
                    debug!("Refresh token is {:.1} days old, still valid", age_days);
                    Ok(TokenState::RefreshTokenValid)
                }
            }
            Err(CollectorError::TokenMissing(_)) => {
                info!("No refresh token on record, initial login required");
                Ok(TokenState::NoRefreshToken)
            }
            Err(e) => Err(e),
        }
    }

    /// Run one reconcile cycle against the scheduler's `now`.
    ///
    /// 1. Missing or stale refresh token triggers an interactive login; a
    ///    login failure aborts the cycle before any exchange is attempted.
    /// 2. A refresh-to-access exchange then runs unconditionally; on failure
    ///    the previously persisted access token stays in place.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<TokenState> {
        let state = self.refresh_state(now).await?;

        if matches!(
            state,
            TokenState::NoRefreshToken | TokenState::RefreshTokenStale
        ) {
            let refresh_token = self.broker.interactive_login().await?;
            self.store
                .write(TokenKind::Refresh, &refresh_token)
                .await?;
            info!("New refresh token persisted");
        }

        let refresh = self.store.read(TokenKind::Refresh).await?;
        match self
            .broker
            .exchange_refresh_for_access(&refresh.value)
            .await
        {
            Ok(access_token) => {
                self.store.write(TokenKind::Access, &access_token).await?;
                info!("Access token renewed and persisted");
                Ok(TokenState::RefreshTokenValid)
            }
            Err(e) => {
                warn!("Access token renewal failed, prior token left in place: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use crate::types::Credential;

    /// In-memory store; refresh-token age derives from a settable saved-at
    /// instant and the caller's clock, like the file store's mtime
    struct MemoryStore {
        creds: Mutex<HashMap<TokenKind, String>>,
        refresh_saved_at: Mutex<DateTime<Utc>>,
    }

    impl MemoryStore {
        fn new(refresh_token: Option<&str>, refresh_saved_at: DateTime<Utc>) -> Self {
            let mut creds = HashMap::new();
            if let Some(token) = refresh_token {
                creds.insert(TokenKind::Refresh, token.to_string());
            }
            MemoryStore {
                creds: Mutex::new(creds),
                refresh_saved_at: Mutex::new(refresh_saved_at),
            }
        }

        async fn get(&self, kind: TokenKind) -> Option<String> {
            self.creds.lock().await.get(&kind).cloned()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn read(&self, kind: TokenKind) -> Result<Credential> {
            let creds = self.creds.lock().await;
            match creds.get(&kind) {
                Some(value) => Ok(Credential {
                    kind,
                    value: value.clone(),
                    saved_at: *self.refresh_saved_at.lock().await,
                }),
                None => Err(CollectorError::TokenMissing(kind.as_str().to_string())),
            }
        }

        async fn write(&self, kind: TokenKind, value: &str) -> Result<()> {
            self.creds.lock().await.insert(kind, value.to_string());
            if kind == TokenKind::Refresh {
                *self.refresh_saved_at.lock().await = Utc::now();
            }
            Ok(())
        }

        async fn age_of(&self, kind: TokenKind, now: DateTime<Utc>) -> Result<Duration> {
            if self.get(kind).await.is_none() {
                return Err(CollectorError::TokenMissing(kind.as_str().to_string()));
            }
            match kind {
                TokenKind::Refresh => Ok(now - *self.refresh_saved_at.lock().await),
                TokenKind::Access => Ok(Duration::zero()),
            }
        }
    }

    struct MockBroker {
        login_calls: AtomicUsize,
        exchange_calls: AtomicUsize,
        login_ok: bool,
        exchange_ok: bool,
    }

    impl MockBroker {
        fn new(login_ok: bool, exchange_ok: bool) -> Self {
            MockBroker {
                login_calls: AtomicUsize::new(0),
                exchange_calls: AtomicUsize::new(0),
                login_ok,
                exchange_ok,
            }
        }
    }

    #[async_trait]
    impl AuthBroker for MockBroker {
        async fn interactive_login(&self) -> Result<String> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if self.login_ok {
                Ok("fresh-refresh-token".to_string())
            } else {
                Err(CollectorError::AuthenticationFailed("login denied".to_string()))
            }
        }

        async fn exchange_refresh_for_access(&self, _refresh_token: &str) -> Result<String> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            if self.exchange_ok {
                Ok("fresh-access-token".to_string())
            } else {
                Err(CollectorError::TokenExchangeFailed("exchange denied".to_string()))
            }
        }
    }

    fn manager(
        store: Arc<MemoryStore>,
        broker: Arc<MockBroker>,
    ) -> TokenLifecycleManager {
        TokenLifecycleManager::new(store, broker, 14)
    }

    fn saved_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_skips_interactive_login() {
        let store = Arc::new(MemoryStore::new(Some("rt"), saved_at()));
        let broker = Arc::new(MockBroker::new(true, true));
        let mgr = manager(Arc::clone(&store), Arc::clone(&broker));

        let state = mgr.reconcile(saved_at() + Duration::days(3)).await.unwrap();
        assert_eq!(state, TokenState::RefreshTokenValid);
        assert_eq!(broker.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(broker.exchange_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get(TokenKind::Access).await.as_deref(),
            Some("fresh-access-token")
        );
    }

    #[tokio::test]
    async fn test_staleness_follows_injected_clock() {
        let store = Arc::new(MemoryStore::new(Some("rt"), saved_at()));
        let broker = Arc::new(MockBroker::new(true, true));
        let mgr = manager(Arc::clone(&store), Arc::clone(&broker));

        // Same persisted token; only the cycle timestamp differs
        assert_eq!(
            mgr.refresh_state(saved_at() + Duration::days(13)).await.unwrap(),
            TokenState::RefreshTokenValid
        );
        assert_eq!(
            mgr.refresh_state(saved_at() + Duration::days(14)).await.unwrap(),
            TokenState::RefreshTokenStale
        );
    }

    #[tokio::test]
    async fn test_stale_token_logs_in_before_exchange() {
        let store = Arc::new(MemoryStore::new(Some("old-rt"), saved_at()));
        let broker = Arc::new(MockBroker::new(true, true));
        let mgr = manager(Arc::clone(&store), Arc::clone(&broker));

        mgr.reconcile(saved_at() + Duration::days(14)).await.unwrap();
        assert_eq!(broker.login_calls.load(Ordering::SeqCst), 1);
        assert_eq!(broker.exchange_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get(TokenKind::Refresh).await.as_deref(),
            Some("fresh-refresh-token")
        );
    }

    #[tokio::test]
    async fn test_missing_token_triggers_initial_login() {
        let store = Arc::new(MemoryStore::new(None, saved_at()));
        let broker = Arc::new(MockBroker::new(true, true));
        let mgr = manager(Arc::clone(&store), Arc::clone(&broker));

        assert_eq!(
            mgr.refresh_state(saved_at()).await.unwrap(),
            TokenState::NoRefreshToken
        );
        mgr.reconcile(saved_at()).await.unwrap();
        assert_eq!(broker.login_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_failure_aborts_cycle_without_exchange() {
        let store = Arc::new(MemoryStore::new(Some("old-rt"), saved_at()));
        let broker = Arc::new(MockBroker::new(false, true));
        let mgr = manager(Arc::clone(&store), Arc::clone(&broker));

        let err = mgr
            .reconcile(saved_at() + Duration::days(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::AuthenticationFailed(_)));
        assert_eq!(broker.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exchange_failure_keeps_prior_access_token() {
        let store = Arc::new(MemoryStore::new(Some("rt"), saved_at()));
        store.write(TokenKind::Access, "prior-access").await.unwrap();
        let broker = Arc::new(MockBroker::new(true, false));
        let mgr = manager(Arc::clone(&store), Arc::clone(&broker));

        let err = mgr
            .reconcile(saved_at() + Duration::days(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::TokenExchangeFailed(_)));
        assert_eq!(
            store.get(TokenKind::Access).await.as_deref(),
            Some("prior-access")
        );
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_when_valid() {
        let store = Arc::new(MemoryStore::new(Some("rt"), saved_at()));
        let broker = Arc::new(MockBroker::new(true, true));
        let mgr = manager(Arc::clone(&store), Arc::clone(&broker));

        let now = saved_at() + Duration::days(1);
        let first = mgr.reconcile(now).await.unwrap();
        let second = mgr.reconcile(now).await.unwrap();
        assert_eq!(first, second);
        // No interactive login either cycle; only the exchange repeats
        assert_eq!(broker.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(broker.exchange_calls.load(Ordering::SeqCst), 2);
    }
}
