use crate::error::Result;
use crate::types::{AuthToken, AuthorizationGrant, AuthorizationRequest};
use async_trait::async_trait;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// Entry point to an external wallet holding signing authority.
///
/// Implemented by mobile wallet bridges, browser wallet adapters, or the
/// local [`KeypairWallet`](crate::basic::keypair_wallet::KeypairWallet).
#[async_trait]
pub trait SignerEndpoint: Send + Sync + 'static {
    type Session: SignerSession;

    /// Open a connection to the wallet.
    /// Fails with `TransportUnavailable` when the wallet cannot be reached.
    async fn open(&self) -> Result<Self::Session>;
}

/// An open connection to the wallet. Always released through [`close`](Self::close).
#[async_trait]
pub trait SignerSession: Send + 'static {
    /// Ask the wallet to authorize the app.
    /// Fails with `AuthorizationDenied` when the user declines.
    async fn authorize(&mut self, request: &AuthorizationRequest) -> Result<AuthorizationGrant>;

    /// Invalidate a previously issued token
    async fn deauthorize(&mut self, auth_token: &AuthToken) -> Result<()>;

    /// Sign and broadcast, returning one signature per transaction in order.
    ///
    /// Fails with `UserRejected` when the user declines, `SigningFailed` when
    /// the wallet cannot sign, or `SubmissionFailed` when broadcasting fails
    /// after signing (with the signed payload attached if the wallet exposes
    /// it).
    async fn sign_and_send(&mut self, transactions: &[Transaction]) -> Result<Vec<Signature>>;

    async fn close(&mut self) -> Result<()>;
}
