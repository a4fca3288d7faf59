use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Stage of the submission flow that can be bounded by a caller-supplied timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Opening the scoped connection to the wallet
    Open,
    /// Session authorization round-trip
    Authorize,
    /// Latest blockhash fetch
    Blockhash,
    /// Instruction build and transaction preparation
    Build,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Open => write!(f, "wallet open"),
            Stage::Authorize => write!(f, "authorization"),
            Stage::Blockhash => write!(f, "blockhash fetch"),
            Stage::Build => write!(f, "instruction build"),
        }
    }
}

/// Error kinds surfaced by the submission flow.
///
/// Every variant is terminal for the invocation that produced it; nothing in
/// this crate retries on its own.
#[derive(Debug, Clone, Error)]
pub enum SignflowError {
    /// The wallet declined the authorization request
    #[error("Wallet declined the authorization request")]
    AuthorizationDenied,

    /// The scoped wallet connection could not be opened
    #[error("Wallet transport unavailable: {0}")]
    TransportUnavailable(String),

    /// RPC error (blockhash fetch, account lookup)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Owner account state does not permit the action
    #[error("Instruction build failed: {0}")]
    BuildFailed(String),

    /// The builder produced nothing to sign
    #[error("Instruction builder produced no transaction")]
    NoTransaction,

    /// The user declined the signing request in the wallet
    #[error("User rejected the signing request")]
    UserRejected,

    /// The signer could not sign, e.g. it does not hold a required signer.
    /// Nothing was broadcast.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// No answer from the wallet within the signing window
    #[error("No response from wallet within {0:?}")]
    SignatureTimeout(Duration),

    /// Broadcast failed. `signed` carries the signed payload when the wallet
    /// reports it, so the caller can resubmit without signing again.
    #[error("Submission failed: {reason}")]
    SubmissionFailed {
        reason: String,
        signed: Option<Vec<Transaction>>,
    },

    /// A caller-supplied stage bound expired
    #[error("{stage} timed out after {after:?}")]
    StageTimeout { stage: Stage, after: Duration },

    /// Account is not part of the authorized session
    #[error("Account {0} is not part of the authorized session")]
    UnknownAccount(Pubkey),

    /// Signer answered with a signature count that does not line up with the request
    #[error("Wallet returned {signatures} signatures for {transactions} transactions")]
    SignatureMismatch {
        signatures: usize,
        transactions: usize,
    },

    /// The flow body panicked or its task was torn down
    #[error("Signing flow aborted: {0}")]
    Aborted(String),
}

impl SignflowError {
    /// Signed payload attached to a partial submission failure, if any
    pub fn signed_payload(&self) -> Option<&[Transaction]> {
        match self {
            SignflowError::SubmissionFailed {
                signed: Some(signed),
                ..
            } => Some(signed),
            _ => None,
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SignflowError>;
