use crate::WalletType;
use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T, E = WalletError> = std::result::Result<T, E>;

/// Failures reported by the relay protocol client.
///
/// The relay classifies its own failures so callers can match on the kind instead of
/// inspecting message text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The record addressed by the call (session, pairing, subscription) no longer exists.
    #[error("no matching key: {0}")]
    NoMatchingKey(String),
    /// The remote wallet declined the proposal or request.
    #[error("rejected by remote wallet: {0}")]
    Rejected(String),
    /// The relay transport failed.
    #[error("relay transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Returns `true` if the target of the call was already gone.
    ///
    /// Cleanup paths swallow these; every other kind surfaces.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoMatchingKey(_))
    }
}

/// Failures decoding text-encoded binary fields.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid bech32 address `{address}`: {source}")]
    Bech32 { address: String, source: bech32::DecodeError },
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The provider global this wallet type is discovered through is absent.
    #[error("{wallet} is not installed: `window.{global}` is not defined")]
    NotFound { wallet: WalletType, global: &'static str },
    /// Required configuration is missing.
    #[error("{wallet} is not available: missing `{setting}`")]
    MissingConfig { wallet: WalletType, setting: &'static str },
    #[error("{operation} is not supported by {wallet}")]
    Unsupported { wallet: WalletType, operation: &'static str },
    #[error("no active session for chain `{chain_id}`")]
    NoSession { chain_id: String },
    #[error("account is not defined")]
    AccountNotDefined,
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout { operation: &'static str, after: Duration },
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("unknown wallet type `{0}`")]
    UnknownWalletType(String),
    #[error("unexpected response to {method}: {reason}")]
    UnexpectedResponse { method: &'static str, reason: String },
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// An injected provider failed the call.
    #[error("{wallet} provider error: {message}")]
    Provider { wallet: WalletType, message: String },
}

impl WalletError {
    pub fn provider(wallet: WalletType, message: impl std::fmt::Display) -> Self {
        Self::Provider { wallet, message: message.to_string() }
    }

    /// Returns `true` for relay failures whose target was already gone.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Relay(err) if err.is_benign())
    }

    /// Returns `true` if the wallet is simply not installed or not configured.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::MissingConfig { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
