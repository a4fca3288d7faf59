// Example: creating a Gum user through the guarded executor
//
// Signs with a throwaway local keypair standing in for an external wallet.
// Fund it on devnet first or the submission fails with SubmissionFailed.
//
//   SIGNFLOW_CLUSTER=devnet RUST_LOG=debug cargo run --example create_user

use signflow_create_user::CreateUserBuilder;
use signflow_sdk::{FlowConfig, GuardedExecutor, KeypairWallet, RpcConnection};
use solana_sdk::signature::Keypair;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = FlowConfig::from_env()?;
    info!("Submitting to {} via {}", config.cluster, config.rpc_url);

    let connection = Arc::new(RpcConnection::new(config.rpc_url.clone()));
    let wallet = KeypairWallet::new(Keypair::new(), Arc::clone(&connection)).with_label("demo");
    let builder = CreateUserBuilder::new(Arc::clone(&connection));
    info!("Owner: {}", wallet.pubkey());
    info!("User PDA: {}", builder.user_pda(&wallet.pubkey()));

    let executor = GuardedExecutor::from_config(&config, wallet, connection, Arc::new(builder));

    if executor.invoke().is_none() {
        anyhow::bail!("executor unexpectedly busy");
    }
    let state = executor.settled().await;

    match (state.result(), state.error()) {
        (Some(result), _) => {
            for signature in result.signatures() {
                info!("Submitted: {}", signature);
            }
        },
        (None, Some(err)) => error!("Create user failed: {}", err),
        (None, None) => {},
    }

    Ok(())
}
