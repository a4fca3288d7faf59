use crate::core::connection::SolConnection;
use crate::core::signer::{SignerEndpoint, SignerSession};
use crate::error::{Result, SignflowError};
use crate::types::{AuthToken, AuthorizationGrant, AuthorizationRequest, WalletAccount};
use async_trait::async_trait;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Wallet backed by a local keypair (Backend/CLI, dev setups).
///
/// Authorizes silently, signs with the keypair and broadcasts through the
/// given connection.
pub struct KeypairWallet<C> {
    keypair: Arc<Keypair>,
    connection: Arc<C>,
    label: Option<String>,
}

impl<C: SolConnection + 'static> KeypairWallet<C> {
    pub fn new(keypair: Keypair, connection: Arc<C>) -> Self {
        Self {
            keypair: Arc::new(keypair),
            connection,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn pubkey(&self) -> solana_sdk::pubkey::Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl<C: SolConnection + 'static> SignerEndpoint for KeypairWallet<C> {
    type Session = KeypairSession<C>;

    async fn open(&self) -> Result<Self::Session> {
        Ok(KeypairSession {
            keypair: Arc::clone(&self.keypair),
            connection: Arc::clone(&self.connection),
            label: self.label.clone(),
            auth_token: None,
        })
    }
}

pub struct KeypairSession<C> {
    keypair: Arc<Keypair>,
    connection: Arc<C>,
    label: Option<String>,
    auth_token: Option<AuthToken>,
}

#[async_trait]
impl<C: SolConnection + 'static> SignerSession for KeypairSession<C> {
    async fn authorize(&mut self, request: &AuthorizationRequest) -> Result<AuthorizationGrant> {
        let auth_token = AuthToken::new(Uuid::new_v4().to_string());
        info!(
            "Keypair wallet authorizing '{}' on {}",
            request.identity.name, request.cluster
        );
        self.auth_token = Some(auth_token.clone());

        let mut account = WalletAccount::new(self.keypair.pubkey());
        account.label = self.label.clone();
        Ok(AuthorizationGrant {
            accounts: vec![account],
            auth_token,
            wallet_uri_base: None,
        })
    }

    async fn deauthorize(&mut self, auth_token: &AuthToken) -> Result<()> {
        if self.auth_token.as_ref() == Some(auth_token) {
            self.auth_token = None;
        }
        Ok(())
    }

    async fn sign_and_send(&mut self, transactions: &[Transaction]) -> Result<Vec<Signature>> {
        let mut signed = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let mut tx = tx.clone();
            let blockhash = tx.message.recent_blockhash;
            tx.try_sign(&[self.keypair.as_ref()], blockhash)
                .map_err(|e| SignflowError::SigningFailed(e.to_string()))?;
            signed.push(tx);
        }

        let mut signatures = Vec::with_capacity(signed.len());
        for tx in &signed {
            match self.connection.send_transaction(tx).await {
                Ok(signature) => {
                    debug!("Broadcast transaction {}", signature);
                    signatures.push(signature);
                },
                Err(e) => {
                    warn!(
                        "Broadcast failed after {} of {} transactions: {}",
                        signatures.len(),
                        signed.len(),
                        e
                    );
                    return Err(SignflowError::SubmissionFailed {
                        reason: e.to_string(),
                        signed: Some(signed[signatures.len()..].to_vec()),
                    });
                },
            }
        }
        Ok(signatures)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
