use serde::{Deserialize, Serialize};

/// Relay settings for remote pairing wallets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConnectConfig {
    /// Relay project identifier. Required before a sign client can be created.
    pub project_id: String,
    /// Overrides the relay endpoint.
    pub relay_url: Option<String>,
    /// Describes the dapp to the remote wallet during pairing.
    pub metadata: AppMetadata,
}

/// Dapp description shown by the remote wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
}
