//! # wallet-bridge-wallets
//!
//! One capability contract over cosmos wallets: browser extensions that inject a provider into
//! the page, and mobile wallets reached through a relay pairing session.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wallet_bridge_wallets::{Wallet, WalletRegistry, WalletSignerExt, WalletType};
//!
//! # async fn run() -> wallet_bridge_wallets::Result<()> {
//! let registry = WalletRegistry::builder().build().expect("all fields have defaults");
//! let wallet = registry.get_wallet(Some(WalletType::Keplr))?;
//! wallet.enable("cosmoshub-4").await?;
//! let signer = wallet.get_offline_signer_auto("cosmoshub-4").await?;
//! # let _ = signer;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod encoding;
pub mod error;
pub mod events;
pub mod injected;
pub mod registry;
pub mod signer;
pub mod store;
pub mod types;
pub mod walletconnect;

mod wallet;
mod wallet_type;

pub use error::{RelayError, Result, WalletError};
pub use events::{ReconnectCallback, Subscription};
pub use registry::{NotFoundCallback, WalletRegistry, WalletRegistryBuilder};
pub use signer::{
    AutoSigner, OfflineAminoSigner, OfflineDirectSigner, OfflineSigner, WalletSignerExt,
};
pub use store::SessionStore;
pub use wallet::Wallet;
pub use wallet_type::WalletType;
pub use walletconnect::{WalletConnectSetup, WalletConnectWallet};

pub use wallet_bridge_config::{BridgeConfig, Platform, TimeoutConfig};
