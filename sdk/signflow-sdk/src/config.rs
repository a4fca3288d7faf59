//! Flow configuration

use crate::core::constants::{
    DEFAULT_APP_NAME, DEFAULT_AUTHORIZE_TIMEOUT_SECS, DEFAULT_BLOCKHASH_TIMEOUT_SECS,
    DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_OPEN_TIMEOUT_SECS, DEFAULT_SIGN_TIMEOUT_SECS,
};
use crate::types::AppIdentity;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Solana cluster the wallet should authorize for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Cluster {
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Devnet => write!(f, "devnet"),
            Cluster::Testnet => write!(f, "testnet"),
            Cluster::MainnetBeta => write!(f, "mainnet-beta"),
        }
    }
}

impl FromStr for Cluster {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet" | "mainnet-beta" => Ok(Cluster::MainnetBeta),
            other => bail!("Invalid cluster '{other}'. Must be 'devnet', 'testnet' or 'mainnet-beta'"),
        }
    }
}

/// Bounds for the flow stages that have no timeout of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub authorize: Duration,
    pub blockhash: Duration,
    pub build: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            authorize: Duration::from_secs(DEFAULT_AUTHORIZE_TIMEOUT_SECS),
            blockhash: Duration::from_secs(DEFAULT_BLOCKHASH_TIMEOUT_SECS),
            build: Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Identity presented to the wallet
    pub identity: AppIdentity,

    pub cluster: Cluster,

    /// Solana RPC URL
    pub rpc_url: String,

    /// Bound on opening the wallet connection
    pub open_timeout: Duration,

    /// Wallet answer window for sign-and-send
    pub sign_timeout: Duration,

    pub stage_timeouts: StageTimeouts,

    /// Sessions older than this are re-authorized. `None` keeps them until revoked.
    pub session_ttl: Option<Duration>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        let cluster = Cluster::default();
        Self {
            identity: AppIdentity::new(DEFAULT_APP_NAME),
            cluster,
            rpc_url: cluster.rpc_url().to_string(),
            open_timeout: Duration::from_secs(DEFAULT_OPEN_TIMEOUT_SECS),
            sign_timeout: Duration::from_secs(DEFAULT_SIGN_TIMEOUT_SECS),
            stage_timeouts: StageTimeouts::default(),
            session_ttl: None,
        }
    }
}

impl FlowConfig {
    /// Load from `SIGNFLOW_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let cluster = match std::env::var("SIGNFLOW_CLUSTER") {
            Ok(value) => value.parse().context("Invalid SIGNFLOW_CLUSTER")?,
            Err(_) => defaults.cluster,
        };

        let mut identity = AppIdentity::new(
            std::env::var("SIGNFLOW_APP_NAME").unwrap_or_else(|_| DEFAULT_APP_NAME.to_string()),
        );
        identity.uri = std::env::var("SIGNFLOW_APP_URI").ok();
        identity.icon = std::env::var("SIGNFLOW_APP_ICON").ok();

        Ok(FlowConfig {
            identity,
            cluster,
            rpc_url: std::env::var("SIGNFLOW_RPC_URL")
                .unwrap_or_else(|_| cluster.rpc_url().to_string()),
            open_timeout: secs_from_env("SIGNFLOW_OPEN_TIMEOUT_SECS")?
                .unwrap_or(defaults.open_timeout),
            sign_timeout: secs_from_env("SIGNFLOW_SIGN_TIMEOUT_SECS")?
                .unwrap_or(defaults.sign_timeout),
            stage_timeouts: StageTimeouts {
                authorize: secs_from_env("SIGNFLOW_AUTHORIZE_TIMEOUT_SECS")?
                    .unwrap_or(defaults.stage_timeouts.authorize),
                blockhash: secs_from_env("SIGNFLOW_BLOCKHASH_TIMEOUT_SECS")?
                    .unwrap_or(defaults.stage_timeouts.blockhash),
                build: secs_from_env("SIGNFLOW_BUILD_TIMEOUT_SECS")?
                    .unwrap_or(defaults.stage_timeouts.build),
            },
            session_ttl: secs_from_env("SIGNFLOW_SESSION_TTL_SECS")?,
        })
    }

    pub fn with_identity(mut self, identity: AppIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Switches the cluster and its default RPC URL
    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.cluster = cluster;
        self.rpc_url = cluster.rpc_url().to_string();
        self
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_sign_timeout(mut self, timeout: Duration) -> Self {
        self.sign_timeout = timeout;
        self
    }

    pub fn with_stage_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.stage_timeouts = timeouts;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }
}

fn secs_from_env(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(value) => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("Invalid {key}"))?;
            Ok(Some(Duration::from_secs(secs)))
        },
        Err(_) => Ok(None),
    }
}
