use crate::basic::transport::SessionHandle;
use crate::config::{Cluster, FlowConfig};
use crate::core::signer::SignerSession;
use crate::error::{Result, SignflowError};
use crate::types::{AppIdentity, AuthorizationRequest, WalletAccount, WalletSession};
use crate::utils;
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Holds the canonical authorized wallet session.
///
/// Shared across flow invocations. The cached session is swapped as a whole
/// `Arc`, so readers never see a half-updated session.
pub struct SessionStore {
    identity: AppIdentity,
    cluster: Cluster,
    ttl: Option<Duration>,
    current: RwLock<Option<Arc<WalletSession>>>,
    selected: RwLock<Option<Pubkey>>,
    /// Serializes authorization round-trips so one device-wallet pairing
    /// never ends up with two live sessions
    gate: Mutex<()>,
}

impl SessionStore {
    pub fn new(identity: AppIdentity, cluster: Cluster) -> Self {
        Self {
            identity,
            cluster,
            ttl: None,
            current: RwLock::new(None),
            selected: RwLock::new(None),
            gate: Mutex::new(()),
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        let store = Self::new(config.identity.clone(), config.cluster);
        match config.session_ttl {
            Some(ttl) => store.with_ttl(ttl),
            None => store,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Return the cached session if still valid, otherwise authorize through
    /// `handle` and cache the result.
    pub async fn authorize<S: SignerSession>(
        &self,
        handle: &SessionHandle<S>,
    ) -> Result<Arc<WalletSession>> {
        let _gate = self.gate.lock().await;

        let stale = {
            let current = self.current.read().await;
            match current.as_ref() {
                Some(session) if self.is_live(session) => {
                    debug!("Reusing wallet session for {}", session.public_key);
                    return Ok(Arc::clone(session));
                },
                Some(session) => Some(session.auth_token.clone()),
                None => None,
            }
        };

        let request = AuthorizationRequest {
            identity: self.identity.clone(),
            cluster: self.cluster,
            auth_token: stale,
        };

        let granted = handle
            .authorize(&request)
            .await
            .and_then(|grant| WalletSession::from_grant(grant, Utc::now()));
        let session = match granted {
            Ok(session) => Arc::new(session),
            Err(e) => {
                if matches!(e, SignflowError::AuthorizationDenied) {
                    warn!("Wallet denied authorization, discarding cached session");
                    self.revoke().await;
                }
                return Err(e);
            },
        };

        self.replace(Arc::clone(&session)).await;
        info!(
            "Authorized wallet session for {} ({} accounts)",
            session.public_key,
            session.accounts.len()
        );
        Ok(session)
    }

    /// Ask the wallet to invalidate the current token and discard the session.
    ///
    /// The session is discarded even when the wallet call fails.
    pub async fn deauthorize<S: SignerSession>(&self, handle: &SessionHandle<S>) -> Result<()> {
        let _gate = self.gate.lock().await;
        let Some(session) = self.current.write().await.take() else {
            return Ok(());
        };
        self.selected.write().await.take();
        info!("Deauthorizing wallet session for {}", session.public_key);
        handle.deauthorize(&session.auth_token).await
    }

    /// Discard the cached session locally
    pub async fn revoke(&self) -> Option<Arc<WalletSession>> {
        let revoked = self.current.write().await.take();
        self.selected.write().await.take();
        if let Some(session) = &revoked {
            info!("Revoked wallet session for {}", session.public_key);
        }
        revoked
    }

    /// Currently cached session, if any and not expired
    pub async fn current(&self) -> Option<Arc<WalletSession>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|session| self.is_live(session))
            .cloned()
    }

    /// Accounts of the current session; empty once it expired
    pub async fn accounts(&self) -> Vec<WalletAccount> {
        self.current()
            .await
            .map(|session| session.accounts.clone())
            .unwrap_or_default()
    }

    /// Pick which account of the current session acts as owner
    pub async fn select_account(&self, public_key: Pubkey) -> Result<()> {
        let current = self.current.read().await;
        match current.as_ref() {
            Some(session) if self.is_live(session) && session.contains(&public_key) => {
                *self.selected.write().await = Some(public_key);
                debug!("Selected account {}", public_key);
                Ok(())
            },
            _ => Err(SignflowError::UnknownAccount(public_key)),
        }
    }

    pub async fn selected_account(&self) -> Option<Pubkey> {
        *self.selected.read().await
    }

    /// Owner for a flow: the selected account, else the session's primary key
    pub async fn resolve_owner(&self, session: &WalletSession) -> Pubkey {
        utils::resolve_owner(self.selected_account().await, session)
    }

    fn is_live(&self, session: &WalletSession) -> bool {
        !session.is_expired(Utc::now(), self.ttl)
    }

    // Lock order is always `current` before `selected`
    async fn replace(&self, session: Arc<WalletSession>) {
        let mut current = self.current.write().await;
        let mut selected = self.selected.write().await;
        if let Some(key) = *selected {
            if !session.contains(&key) {
                debug!("Dropping selection {} not present in new session", key);
                *selected = None;
            }
        }
        *current = Some(session);
    }
}
