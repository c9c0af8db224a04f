//! # wallet-bridge-config
//!
//! Wallet bridge configuration.
//!
//! Values are layered in this order, later layers winning:
//! 1. built-in defaults
//! 2. `wallets.toml` in the selected root (optional)
//! 3. `WALLET_BRIDGE_*` environment variables, nested keys split by `__`

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

mod error;
pub use error::{ConfigIssue, ConfigSource, ExtractConfigError};

mod platform;
pub use platform::Platform;

mod walletconnect;
pub use walletconnect::{AppMetadata, WalletConnectConfig};

pub use figment;

/// Bounded waits applied to remote round-trips.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long to wait for the remote wallet to approve a pairing, in milliseconds.
    pub approval_ms: u64,
    /// How long to wait for account resolution over an existing session, in milliseconds.
    pub account_ms: u64,
}

impl TimeoutConfig {
    /// Default approval deadline.
    pub const DEFAULT_APPROVAL_MS: u64 = 40_000;
    /// Default account resolution deadline.
    pub const DEFAULT_ACCOUNT_MS: u64 = 10_000;

    pub fn approval(&self) -> Duration {
        Duration::from_millis(self.approval_ms)
    }

    pub fn account(&self) -> Duration {
        Duration::from_millis(self.account_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { approval_ms: Self::DEFAULT_APPROVAL_MS, account_ms: Self::DEFAULT_ACCOUNT_MS }
    }
}

/// Wallet bridge configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Wallet type used when the caller does not name one.
    ///
    /// Kept as a raw identifier; the registry parses it and reports unknown values.
    pub default_wallet: String,
    /// Relay settings for the remote pairing wallets. Absent disables them.
    pub walletconnect: Option<WalletConnectConfig>,
    /// Deadlines for remote round-trips.
    pub timeouts: TimeoutConfig,
    /// The platform the host application runs on.
    pub platform: Platform,
    /// Where the durable "reconnect on load" flag is stored. `None` keeps it in memory.
    pub reconnect_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_wallet: Self::DEFAULT_WALLET.to_string(),
            walletconnect: None,
            timeouts: TimeoutConfig::default(),
            platform: Platform::default(),
            reconnect_file: None,
        }
    }
}

impl BridgeConfig {
    /// The default profile name.
    pub const DEFAULT_PROFILE: Profile = Profile::Default;

    /// File name of the config file looked up in the root.
    pub const FILE_NAME: &'static str = "wallets.toml";

    /// Prefix of the environment variables merged over the file.
    pub const ENV_PREFIX: &'static str = "WALLET_BRIDGE_";

    /// Wallet selected when nothing else is configured.
    pub const DEFAULT_WALLET: &'static str = "keplr";

    /// Returns the current `BridgeConfig` read from the working directory.
    ///
    /// See [`figment_with_root`](Self::figment_with_root) for more details.
    pub fn load() -> Result<Self, ExtractConfigError> {
        Self::load_with_root(".")
    }

    /// Returns the `BridgeConfig` read from `root`.
    pub fn load_with_root(root: impl AsRef<Path>) -> Result<Self, ExtractConfigError> {
        Self::try_from(Self::figment_with_root(root))
    }

    /// Attempts to extract a `BridgeConfig` from `provider`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use wallet_bridge_config::{
    ///     BridgeConfig,
    ///     figment::providers::{Format, Toml},
    /// };
    ///
    /// let figment = BridgeConfig::figment().merge(Toml::string("default_wallet = \"leap\""));
    /// let config = BridgeConfig::try_from(figment).unwrap();
    /// assert_eq!(config.default_wallet, "leap");
    /// ```
    pub fn try_from<T: Provider>(provider: T) -> Result<Self, ExtractConfigError> {
        trace!("load config with provider: {:?}", provider.metadata());
        let figment = Figment::from(provider);
        figment.extract::<Self>().map_err(ExtractConfigError::new)
    }

    /// Returns the figment holding only the built-in defaults.
    pub fn figment() -> Figment {
        Figment::from(Self::default())
    }

    /// Returns the default figment merged with `wallets.toml` under `root` and the environment.
    pub fn figment_with_root(root: impl AsRef<Path>) -> Figment {
        let file = root.as_ref().join(Self::FILE_NAME);
        Self::figment()
            .merge(Toml::file(file))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
    }

    /// Returns the relay project identifier if one is configured and non-empty.
    pub fn project_id(&self) -> Option<&str> {
        self.walletconnect.as_ref().map(|wc| wc.project_id.trim()).filter(|id| !id.is_empty())
    }
}

impl Provider for BridgeConfig {
    fn metadata(&self) -> Metadata {
        Metadata::named("wallet bridge defaults")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}
