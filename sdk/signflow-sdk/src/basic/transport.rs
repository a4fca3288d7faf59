//! Scoped hand-off to the external wallet.
//!
//! The wallet is a user-paced boundary: it may take arbitrarily long or never
//! answer. Every connection opened here is closed on every exit path, and the
//! close runs on its own task so it does not depend on the caller still
//! polling.

use crate::config::FlowConfig;
use crate::core::constants::{DEFAULT_OPEN_TIMEOUT_SECS, DEFAULT_SIGN_TIMEOUT_SECS};
use crate::core::signer::{SignerEndpoint, SignerSession};
use crate::error::{Result, SignflowError, Stage};
use crate::types::{
    AuthToken, AuthorizationGrant, AuthorizationRequest, SignedResult, UnsignedTransaction,
};
use solana_sdk::transaction::Transaction;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Handle to an open wallet connection, valid inside [`SigningTransport::with_session`].
///
/// Not `Clone`. A handle moved out of the body (for instance into a
/// spawned task) fails with `TransportUnavailable` once the session closed.
///
/// ```compile_fail
/// use signflow_sdk::basic::keypair_wallet::KeypairSession;
/// use signflow_sdk::{RpcConnection, SessionHandle};
///
/// fn requires_clone<T: Clone>() {}
/// requires_clone::<SessionHandle<KeypairSession<RpcConnection>>>();
/// ```
pub struct SessionHandle<S> {
    session: Arc<Mutex<Option<S>>>,
    sign_timeout: Duration,
}

impl<S: SignerSession> SessionHandle<S> {
    fn new(session: S, sign_timeout: Duration) -> Self {
        Self {
            session: Arc::new(Mutex::new(Some(session))),
            sign_timeout,
        }
    }

    /// Second handle on the same session, kept by the transport for the close
    fn closer(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            sign_timeout: self.sign_timeout,
        }
    }

    pub async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationGrant> {
        let mut guard = self.session.lock().await;
        open_session(&mut guard)?.authorize(request).await
    }

    pub async fn deauthorize(&self, auth_token: &AuthToken) -> Result<()> {
        let mut guard = self.session.lock().await;
        open_session(&mut guard)?.deauthorize(auth_token).await
    }

    /// Sign and broadcast. Consumes the transactions; they come back inside
    /// the result, positionally matched with their signatures.
    pub async fn sign_and_send(
        &self,
        transactions: Vec<UnsignedTransaction>,
    ) -> Result<SignedResult> {
        let raw: Vec<Transaction> = transactions
            .iter()
            .map(|tx| tx.as_transaction().clone())
            .collect();

        let mut guard = self.session.lock().await;
        let session = open_session(&mut guard)?;
        let signatures = match timeout(self.sign_timeout, session.sign_and_send(&raw)).await {
            Ok(result) => result?,
            Err(_) => return Err(SignflowError::SignatureTimeout(self.sign_timeout)),
        };

        SignedResult::new(signatures, transactions)
    }

    /// Close failures are logged, never returned
    async fn close(&self, close_timeout: Duration) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };
        match timeout(close_timeout, session.close()).await {
            Ok(Ok(())) => debug!("Wallet session closed"),
            Ok(Err(e)) => warn!("Failed to close wallet session: {}", e),
            Err(_) => warn!("Wallet session close timed out after {:?}", close_timeout),
        }
    }
}

fn open_session<S>(slot: &mut Option<S>) -> Result<&mut S> {
    slot.as_mut().ok_or_else(|| {
        SignflowError::TransportUnavailable("wallet session already closed".to_string())
    })
}

/// Opens scoped wallet connections
pub struct SigningTransport<E> {
    endpoint: Arc<E>,
    open_timeout: Duration,
    sign_timeout: Duration,
}

impl<E: SignerEndpoint> SigningTransport<E> {
    pub fn new(endpoint: E) -> Self {
        Self::from_shared(Arc::new(endpoint))
    }

    pub fn from_shared(endpoint: Arc<E>) -> Self {
        Self {
            endpoint,
            open_timeout: Duration::from_secs(DEFAULT_OPEN_TIMEOUT_SECS),
            sign_timeout: Duration::from_secs(DEFAULT_SIGN_TIMEOUT_SECS),
        }
    }

    pub fn from_config(endpoint: E, config: &FlowConfig) -> Self {
        Self::new(endpoint)
            .with_open_timeout(config.open_timeout)
            .with_sign_timeout(config.sign_timeout)
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_sign_timeout(mut self, timeout: Duration) -> Self {
        self.sign_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Run `body` against a freshly opened wallet connection.
    ///
    /// The connection is closed after `body` finishes, fails, panics, or
    /// times out, and also when the future returned here is dropped before
    /// completion.
    pub async fn with_session<T, F, Fut>(&self, body: F) -> Result<T>
    where
        F: FnOnce(SessionHandle<E::Session>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let endpoint = Arc::clone(&self.endpoint);
        let open_timeout = self.open_timeout;
        let sign_timeout = self.sign_timeout;

        let bracket = tokio::spawn(async move {
            let session = match timeout(open_timeout, endpoint.open()).await {
                Ok(Ok(session)) => session,
                Ok(Err(SignflowError::TransportUnavailable(reason))) => {
                    return Err(SignflowError::TransportUnavailable(reason));
                },
                Ok(Err(e)) => return Err(SignflowError::TransportUnavailable(e.to_string())),
                Err(_) => {
                    return Err(SignflowError::StageTimeout {
                        stage: Stage::Open,
                        after: open_timeout,
                    })
                },
            };
            debug!("Wallet session opened");

            let handle = SessionHandle::new(session, sign_timeout);
            let closer = handle.closer();

            // Separate task so a panic in `body` still reaches the close below
            let outcome = match tokio::spawn(body(handle)).await {
                Ok(outcome) => outcome,
                Err(e) => Err(SignflowError::Aborted(e.to_string())),
            };

            closer.close(open_timeout).await;
            outcome
        });

        match bracket.await {
            Ok(outcome) => outcome,
            Err(e) => Err(SignflowError::Aborted(e.to_string())),
        }
    }
}
