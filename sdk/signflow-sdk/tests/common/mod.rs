#![allow(dead_code)]

use async_trait::async_trait;
use signflow_sdk::{
    AppIdentity, AuthToken, AuthorizationGrant, AuthorizationRequest, Cluster, GuardedExecutor,
    InstructionBuilder, InstructionMethod, SessionStore, SignerEndpoint, SignerSession,
    SignflowError, SigningTransport, SolConnection, StageTimeouts, WalletAccount,
};
use solana_sdk::{
    account::Account,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

//=============================================================================
// RPC connection
//=============================================================================

pub struct TestConnection {
    pub blockhash: Hash,
    pub fail_blockhash: bool,
    pub fail_send: bool,
    pub blockhash_calls: AtomicUsize,
    pub sent: Mutex<Vec<Transaction>>,
}

impl TestConnection {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            fail_blockhash: false,
            fail_send: false,
            blockhash_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_blockhash() -> Self {
        Self {
            fail_blockhash: true,
            ..Self::new()
        }
    }

    pub fn failing_send() -> Self {
        Self {
            fail_send: true,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SolConnection for TestConnection {
    async fn get_latest_blockhash(&self) -> Result<Hash, BoxError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_blockhash {
            return Err("blockhash unavailable".into());
        }
        Ok(self.blockhash)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, BoxError> {
        if self.fail_send {
            return Err("node is behind".into());
        }
        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_else(Signature::new_unique))
    }

    async fn get_account(&self, _pubkey: &Pubkey) -> Result<Option<Account>, BoxError> {
        Ok(None)
    }
}

//=============================================================================
// Wallet
//=============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBehavior {
    Approve,
    Deny,
    Hang,
    /// Approves but exposes no accounts
    NoAccounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignBehavior {
    Approve,
    Reject,
    Hang,
    /// Signs, then reports a broadcast failure with the payload attached
    BroadcastFail,
    /// Answers with one signature too many
    ExtraSignature,
}

/// Scripted wallet that counts every interaction
pub struct TestWallet {
    pub accounts: Vec<Pubkey>,
    pub auth: Mutex<AuthBehavior>,
    pub sign: Mutex<SignBehavior>,
    pub fail_open: bool,
    pub fail_close: bool,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub authorizations: AtomicUsize,
    pub deauthorizations: AtomicUsize,
    pub sign_calls: AtomicUsize,
    pub requests: Mutex<Vec<AuthorizationRequest>>,
    pub signed: Mutex<Vec<Transaction>>,
    /// When set, sign-and-send waits for a notification before answering
    pub sign_gate: Option<Arc<Notify>>,
}

impl TestWallet {
    pub fn new() -> Self {
        Self::with_accounts(vec![Pubkey::new_unique()])
    }

    pub fn with_accounts(accounts: Vec<Pubkey>) -> Self {
        Self {
            accounts,
            auth: Mutex::new(AuthBehavior::Approve),
            sign: Mutex::new(SignBehavior::Approve),
            fail_open: false,
            fail_close: false,
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            authorizations: AtomicUsize::new(0),
            deauthorizations: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            signed: Mutex::new(Vec::new()),
            sign_gate: None,
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.sign_gate = Some(gate);
        self
    }

    pub fn set_auth(&self, behavior: AuthBehavior) {
        *self.auth.lock().unwrap() = behavior;
    }

    pub fn set_sign(&self, behavior: SignBehavior) {
        *self.sign.lock().unwrap() = behavior;
    }

    pub fn primary(&self) -> Pubkey {
        self.accounts[0]
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn authorizations(&self) -> usize {
        self.authorizations.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<AuthorizationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn signed(&self) -> Vec<Transaction> {
        self.signed.lock().unwrap().clone()
    }
}

/// Endpoint handle so tests keep access to the counters
#[derive(Clone)]
pub struct SharedWallet(pub Arc<TestWallet>);

#[async_trait]
impl SignerEndpoint for SharedWallet {
    type Session = TestSession;

    async fn open(&self) -> signflow_sdk::Result<TestSession> {
        if self.0.fail_open {
            return Err(SignflowError::TransportUnavailable(
                "no wallet app installed".to_string(),
            ));
        }
        self.0.opens.fetch_add(1, Ordering::SeqCst);
        Ok(TestSession {
            wallet: Arc::clone(&self.0),
        })
    }
}

pub struct TestSession {
    wallet: Arc<TestWallet>,
}

#[async_trait]
impl SignerSession for TestSession {
    async fn authorize(
        &mut self,
        request: &AuthorizationRequest,
    ) -> signflow_sdk::Result<AuthorizationGrant> {
        self.wallet.requests.lock().unwrap().push(request.clone());
        let behavior = *self.wallet.auth.lock().unwrap();
        match behavior {
            AuthBehavior::Approve => {
                let n = self.wallet.authorizations.fetch_add(1, Ordering::SeqCst);
                Ok(AuthorizationGrant {
                    accounts: self
                        .wallet
                        .accounts
                        .iter()
                        .map(|key| WalletAccount::new(*key))
                        .collect(),
                    auth_token: AuthToken::new(format!("token-{n}")),
                    wallet_uri_base: None,
                })
            },
            AuthBehavior::Deny => Err(SignflowError::AuthorizationDenied),
            AuthBehavior::Hang => std::future::pending().await,
            AuthBehavior::NoAccounts => {
                let n = self.wallet.authorizations.fetch_add(1, Ordering::SeqCst);
                Ok(AuthorizationGrant {
                    accounts: Vec::new(),
                    auth_token: AuthToken::new(format!("token-{n}")),
                    wallet_uri_base: None,
                })
            },
        }
    }

    async fn deauthorize(&mut self, _auth_token: &AuthToken) -> signflow_sdk::Result<()> {
        self.wallet.deauthorizations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_and_send(
        &mut self,
        transactions: &[Transaction],
    ) -> signflow_sdk::Result<Vec<Signature>> {
        self.wallet.sign_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.wallet.sign_gate {
            gate.notified().await;
        }
        let behavior = *self.wallet.sign.lock().unwrap();
        match behavior {
            SignBehavior::Approve => {
                self.wallet
                    .signed
                    .lock()
                    .unwrap()
                    .extend(transactions.iter().cloned());
                Ok(transactions.iter().map(|_| Signature::new_unique()).collect())
            },
            SignBehavior::Reject => Err(SignflowError::UserRejected),
            SignBehavior::Hang => std::future::pending().await,
            SignBehavior::BroadcastFail => Err(SignflowError::SubmissionFailed {
                reason: "blockhash not found".to_string(),
                signed: Some(transactions.to_vec()),
            }),
            SignBehavior::ExtraSignature => Ok(transactions
                .iter()
                .map(|_| Signature::new_unique())
                .chain(std::iter::once(Signature::new_unique()))
                .collect()),
        }
    }

    async fn close(&mut self) -> signflow_sdk::Result<()> {
        self.wallet.closes.fetch_add(1, Ordering::SeqCst);
        if self.wallet.fail_close {
            return Err(SignflowError::TransportUnavailable(
                "wallet already gone".to_string(),
            ));
        }
        Ok(())
    }
}

//=============================================================================
// Instruction builder
//=============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildBehavior {
    Transaction,
    /// Builder yields a method whose transaction is missing
    EmptyMethod,
    /// Builder yields no method at all
    NoMethod,
    AccountExists,
}

pub struct TestBuilder {
    pub program_id: Pubkey,
    pub behavior: BuildBehavior,
    pub owners: Mutex<Vec<Pubkey>>,
}

impl TestBuilder {
    pub fn new(behavior: BuildBehavior) -> Self {
        Self {
            program_id: Pubkey::new_unique(),
            behavior,
            owners: Mutex::new(Vec::new()),
        }
    }

    pub fn owners(&self) -> Vec<Pubkey> {
        self.owners.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstructionBuilder for TestBuilder {
    type Method = InstructionMethod;

    async fn build(&self, owner: Pubkey) -> signflow_sdk::Result<Option<InstructionMethod>> {
        self.owners.lock().unwrap().push(owner);
        match self.behavior {
            BuildBehavior::Transaction => Ok(Some(InstructionMethod::new(owner).add_instruction(
                Instruction::new_with_bytes(
                    self.program_id,
                    b"create_user",
                    vec![AccountMeta::new(owner, true)],
                ),
            ))),
            BuildBehavior::EmptyMethod => Ok(Some(InstructionMethod::new(owner))),
            BuildBehavior::NoMethod => Ok(None),
            BuildBehavior::AccountExists => Err(SignflowError::BuildFailed(
                "user account already exists".to_string(),
            )),
        }
    }
}

//=============================================================================
// Harness
//=============================================================================

pub struct Harness {
    pub wallet: Arc<TestWallet>,
    pub connection: Arc<TestConnection>,
    pub builder: Arc<TestBuilder>,
    pub store: Arc<SessionStore>,
    pub executor: GuardedExecutor<TestConnection, TestBuilder, SharedWallet>,
}

pub fn identity() -> AppIdentity {
    AppIdentity::new("Signflow Tests").with_uri("https://signflow.test")
}

pub fn transport(wallet: &Arc<TestWallet>) -> SigningTransport<SharedWallet> {
    SigningTransport::new(SharedWallet(Arc::clone(wallet)))
        .with_open_timeout(Duration::from_secs(5))
        .with_sign_timeout(Duration::from_secs(30))
}

pub fn harness(wallet: TestWallet, connection: TestConnection, builder: TestBuilder) -> Harness {
    let wallet = Arc::new(wallet);
    let connection = Arc::new(connection);
    let builder = Arc::new(builder);
    let store = Arc::new(SessionStore::new(identity(), Cluster::Devnet));
    let executor = GuardedExecutor::new(
        Arc::clone(&store),
        transport(&wallet),
        Arc::clone(&connection),
        Arc::clone(&builder),
        StageTimeouts::default(),
    );
    Harness {
        wallet,
        connection,
        builder,
        store,
        executor,
    }
}

pub fn default_harness() -> Harness {
    harness(
        TestWallet::new(),
        TestConnection::new(),
        TestBuilder::new(BuildBehavior::Transaction),
    )
}
