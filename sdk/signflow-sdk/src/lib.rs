//! Guarded transaction submission through an external Solana wallet.
//!
//! A [`GuardedExecutor`] turns one user intent into one signed and submitted
//! transaction, coordinating a [`SessionStore`], an [`InstructionBuilder`],
//! a [`SolConnection`] and a [`SigningTransport`] to the wallet, and never
//! runs two attempts at once.

pub mod advanced;
pub mod basic;
pub mod config;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;

pub use crate::advanced::builders::{InstructionBuilder, InstructionMethod, PreparedMethod};
pub use crate::basic::executor::GuardedExecutor;
pub use crate::basic::keypair_wallet::KeypairWallet;
pub use crate::basic::session_store::SessionStore;
pub use crate::basic::transport::{SessionHandle, SigningTransport};
pub use crate::config::{Cluster, FlowConfig, StageTimeouts};
pub use crate::core::connection::{RpcConnection, SolConnection};
pub use crate::core::signer::{SignerEndpoint, SignerSession};
pub use crate::error::{Result, SignflowError, Stage};
pub use crate::types::{
    AppIdentity, AuthToken, AuthorizationGrant, AuthorizationRequest, ExecutionState,
    SignedResult, Status, UnsignedTransaction, WalletAccount, WalletSession,
};
pub use crate::utils::broadcast_signed;
