use crate::config::Cluster;
use crate::error::{Result, SignflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::time::Duration;

//=============================================================================
// Authorization
//=============================================================================

/// Opaque token issued by the wallet for an authorized session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// Identity the app presents to the wallet when asking for authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub name: String,
    pub uri: Option<String>,
    pub icon: Option<String>,
}

impl AppIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: None,
            icon: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Authorization request sent to the wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub identity: AppIdentity,
    pub cluster: Cluster,

    /// Token of an expired session, offered as a reauthorization hint
    pub auth_token: Option<AuthToken>,
}

/// A wallet account exposed by an authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub public_key: Pubkey,
    pub label: Option<String>,
}

impl WalletAccount {
    pub fn new(public_key: Pubkey) -> Self {
        Self {
            public_key,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Wallet answer to a successful authorization request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub accounts: Vec<WalletAccount>,
    pub auth_token: AuthToken,
    pub wallet_uri_base: Option<String>,
}

/// Authorized wallet session.
///
/// Replaced wholesale on re-authorization, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSession {
    /// Primary account of the session
    pub public_key: Pubkey,

    /// All accounts the wallet exposed, primary first
    pub accounts: Vec<WalletAccount>,

    pub auth_token: AuthToken,

    pub wallet_uri_base: Option<String>,

    pub issued_at: DateTime<Utc>,
}

impl WalletSession {
    /// Build a session from a grant. A grant without accounts is unusable and
    /// treated as a denial.
    pub fn from_grant(grant: AuthorizationGrant, issued_at: DateTime<Utc>) -> Result<Self> {
        let public_key = grant
            .accounts
            .first()
            .map(|account| account.public_key)
            .ok_or(SignflowError::AuthorizationDenied)?;

        Ok(Self {
            public_key,
            accounts: grant.accounts,
            auth_token: grant.auth_token,
            wallet_uri_base: grant.wallet_uri_base,
            issued_at,
        })
    }

    pub fn contains(&self, public_key: &Pubkey) -> bool {
        self.accounts
            .iter()
            .any(|account| account.public_key == *public_key)
    }

    /// Whether the session outlived `ttl` at `now`. No TTL means no expiry.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        now.signed_duration_since(self.issued_at)
            .to_std()
            .map(|age| age >= ttl)
            .unwrap_or(false)
    }
}

//=============================================================================
// Transactions
//=============================================================================

/// Prepared transaction stamped with a fresh blockhash, ready for the wallet.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    inner: Transaction,
}

impl UnsignedTransaction {
    pub fn new(mut transaction: Transaction, recent_blockhash: Hash) -> Self {
        transaction.message.recent_blockhash = recent_blockhash;
        Self { inner: transaction }
    }

    pub fn recent_blockhash(&self) -> &Hash {
        &self.inner.message.recent_blockhash
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.inner.message.account_keys.first()
    }

    pub fn as_transaction(&self) -> &Transaction {
        &self.inner
    }

    pub fn into_transaction(self) -> Transaction {
        self.inner
    }

    /// Wire encoding of the transaction
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.inner)
            .map_err(|e| SignflowError::BuildFailed(format!("Failed to serialize transaction: {e}")))
    }
}

/// Outcome of a sign-and-send round-trip.
///
/// `signatures[i]` belongs to `submitted_transactions[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedResult {
    signatures: Vec<Signature>,
    submitted_transactions: Vec<UnsignedTransaction>,
}

impl SignedResult {
    pub fn new(
        signatures: Vec<Signature>,
        submitted_transactions: Vec<UnsignedTransaction>,
    ) -> Result<Self> {
        if signatures.len() != submitted_transactions.len() {
            return Err(SignflowError::SignatureMismatch {
                signatures: signatures.len(),
                transactions: submitted_transactions.len(),
            });
        }
        Ok(Self {
            signatures,
            submitted_transactions,
        })
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn submitted_transactions(&self) -> &[UnsignedTransaction] {
        &self.submitted_transactions
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Signature, &UnsignedTransaction)> {
        self.signatures.iter().zip(self.submitted_transactions.iter())
    }
}

//=============================================================================
// Execution state
//=============================================================================

/// State of a guarded executor
#[derive(Debug, Clone, Default)]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Succeeded(SignedResult),
    Failed(SignflowError),
}

impl ExecutionState {
    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionState::Running)
    }

    pub fn error(&self) -> Option<&SignflowError> {
        match self {
            ExecutionState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&SignedResult> {
        match self {
            ExecutionState::Succeeded(result) => Some(result),
            _ => None,
        }
    }
}

/// Caller-facing view of an executor: what a trigger button needs
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub busy: bool,
    pub error: Option<SignflowError>,
}

impl From<&ExecutionState> for Status {
    fn from(state: &ExecutionState) -> Self {
        Self {
            busy: state.is_running(),
            error: state.error().cloned(),
        }
    }
}
