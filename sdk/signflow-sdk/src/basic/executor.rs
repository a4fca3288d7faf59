//! Single-flight controller for the submission flow.
//!
//! `Idle -> Running -> Succeeded | Failed`, and back to `Running` on the next
//! accepted `invoke`. An `invoke` while `Running` is dropped: it does not
//! queue, error, or restart the attempt in flight.

use crate::advanced::builders::{InstructionBuilder, PreparedMethod};
use crate::basic::session_store::SessionStore;
use crate::basic::transport::SigningTransport;
use crate::config::{FlowConfig, StageTimeouts};
use crate::core::connection::SolConnection;
use crate::core::signer::SignerEndpoint;
use crate::error::{Result, SignflowError, Stage};
use crate::types::{ExecutionState, SignedResult, Status, UnsignedTransaction};
use crate::utils::{bounded, fetch_blockhash};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct GuardedExecutor<C, B, E> {
    inner: Arc<Inner<C, B, E>>,
}

impl<C, B, E> Clone for GuardedExecutor<C, B, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C, B, E> {
    /// Also the single-flight flag: `Running` is claimed and released only
    /// under the channel's write lock
    state: watch::Sender<ExecutionState>,
    store: Arc<SessionStore>,
    transport: SigningTransport<E>,
    connection: Arc<C>,
    builder: Arc<B>,
    timeouts: StageTimeouts,
}

impl<C, B, E> GuardedExecutor<C, B, E>
where
    C: SolConnection + 'static,
    B: InstructionBuilder,
    E: SignerEndpoint,
{
    pub fn new(
        store: Arc<SessionStore>,
        transport: SigningTransport<E>,
        connection: Arc<C>,
        builder: Arc<B>,
        timeouts: StageTimeouts,
    ) -> Self {
        let (state, _) = watch::channel(ExecutionState::Idle);
        Self {
            inner: Arc::new(Inner {
                state,
                store,
                transport,
                connection,
                builder,
                timeouts,
            }),
        }
    }

    /// Wire every piece from one config
    pub fn from_config(
        config: &FlowConfig,
        endpoint: E,
        connection: Arc<C>,
        builder: Arc<B>,
    ) -> Self {
        Self::new(
            Arc::new(SessionStore::from_config(config)),
            SigningTransport::from_config(endpoint, config),
            connection,
            builder,
            config.stage_timeouts,
        )
    }

    /// Start the flow unless one is already in flight.
    ///
    /// Returns the flow task when accepted, `None` when dropped as re-entrant.
    /// The flow runs on its own task and reaches a terminal state even if the
    /// caller goes away. Accepted as soon as `status().busy` reads false.
    /// Must be called inside a tokio runtime.
    pub fn invoke(&self) -> Option<JoinHandle<()>> {
        let accepted = self.inner.state.send_if_modified(|state| {
            if state.is_running() {
                return false;
            }
            *state = ExecutionState::Running;
            true
        });
        if !accepted {
            debug!("Submission already in flight, ignoring invoke");
            return None;
        }
        info!("Submission flow started");

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            let mut flight = Flight::new(&inner.state);
            let next = match inner.run().await {
                Ok(result) => {
                    info!("Submission succeeded with {} signature(s)", result.len());
                    ExecutionState::Succeeded(result)
                },
                Err(e) => {
                    error!("Submission failed: {}", e);
                    ExecutionState::Failed(e)
                },
            };
            flight.land(next);
        }))
    }

    pub fn state(&self) -> ExecutionState {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> Status {
        Status::from(&*self.inner.state.borrow())
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.borrow().is_running()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.inner.state.subscribe()
    }

    /// Wait until no flow is running and return the state it settled in
    pub async fn settled(&self) -> ExecutionState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|state| !state.is_running()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }
}

impl<C, B, E> Inner<C, B, E>
where
    C: SolConnection + 'static,
    B: InstructionBuilder,
    E: SignerEndpoint,
{
    async fn run(&self) -> Result<SignedResult> {
        let store = Arc::clone(&self.store);
        let connection = Arc::clone(&self.connection);
        let builder = Arc::clone(&self.builder);
        let timeouts = self.timeouts;

        self.transport
            .with_session(move |handle| async move {
                // Either failure aborts without waiting on the other
                let (session, blockhash) = tokio::try_join!(
                    bounded(Stage::Authorize, timeouts.authorize, store.authorize(&handle)),
                    bounded(
                        Stage::Blockhash,
                        timeouts.blockhash,
                        fetch_blockhash(connection.as_ref())
                    ),
                )?;

                let owner = store.resolve_owner(&session).await;
                debug!("Building transaction for owner {}", owner);

                let method = bounded(Stage::Build, timeouts.build, builder.build(owner))
                    .await?
                    .ok_or(SignflowError::NoTransaction)?;
                let transaction = bounded(Stage::Build, timeouts.build, method.transaction())
                    .await?
                    .ok_or(SignflowError::NoTransaction)?;

                handle
                    .sign_and_send(vec![UnsignedTransaction::new(transaction, blockhash)])
                    .await
            })
            .await
    }
}

/// Returns the executor to a non-running state when the flow task ends,
/// including by panic.
struct Flight<'a> {
    state: &'a watch::Sender<ExecutionState>,
    landed: bool,
}

impl<'a> Flight<'a> {
    fn new(state: &'a watch::Sender<ExecutionState>) -> Self {
        Self {
            state,
            landed: false,
        }
    }

    /// Publishing the terminal state is what releases the executor
    fn land(&mut self, next: ExecutionState) {
        self.state.send_replace(next);
        self.landed = true;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.landed {
            self.land(ExecutionState::Failed(SignflowError::Aborted(
                "submission task ended before reaching a terminal state".to_string(),
            )));
        }
    }
}
