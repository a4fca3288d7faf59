use crate::core::connection::SolConnection;
use crate::error::{Result, SignflowError, Stage};
use crate::types::WalletSession;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Run `fut` with a stage bound
pub async fn bounded<T>(
    stage: Stage,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| SignflowError::StageTimeout { stage, after })?
}

/// Fetch a fresh blockhash. Never cache the result across submissions.
pub async fn fetch_blockhash(connection: &impl SolConnection) -> Result<Hash> {
    connection
        .get_latest_blockhash()
        .await
        .map_err(|e| SignflowError::Connection(e.to_string()))
}

/// Selected account if any, else the session's primary key
pub fn resolve_owner(selected: Option<Pubkey>, session: &WalletSession) -> Pubkey {
    selected.unwrap_or(session.public_key)
}

/// Resubmit transactions the wallet already signed.
///
/// Used after a `SubmissionFailed` that carried the signed payload; stops at
/// the first broadcast failure.
pub async fn broadcast_signed(
    connection: &impl SolConnection,
    signed: &[Transaction],
) -> Result<Vec<Signature>> {
    let mut signatures = Vec::with_capacity(signed.len());
    for tx in signed {
        match connection.send_transaction(tx).await {
            Ok(signature) => {
                info!("Rebroadcast transaction {}", signature);
                signatures.push(signature);
            },
            Err(e) => {
                warn!("Rebroadcast failed after {} of {}: {}", signatures.len(), signed.len(), e);
                return Err(SignflowError::SubmissionFailed {
                    reason: e.to_string(),
                    signed: Some(signed[signatures.len()..].to_vec()),
                });
            },
        }
    }
    Ok(signatures)
}
