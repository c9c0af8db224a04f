//! Wallet selection by type.

use crate::{
    Wallet, WalletType,
    error::{Result, WalletError},
    injected::{Globals, InjectedWallet, VectisWallet, Vendor},
    store::{DurableStorage, FileStorage, MemoryStorage, SessionStore},
    walletconnect::{WalletConnectParams, WalletConnectSetup, WalletConnectWallet},
};
use derive_builder::Builder;
use std::{collections::BTreeMap, fmt, sync::Arc};
use strum::IntoEnumIterator;
use wallet_bridge_config::BridgeConfig;

/// Invoked when a requested wallet is not installed or not configured.
pub type NotFoundCallback = Arc<dyn Fn(&WalletError) + Send + Sync>;

/// Maps wallet types to adapters.
///
/// Adapters are created fresh on every [`get_wallet`](Self::get_wallet) call and share the
/// registry's [`SessionStore`].
#[derive(Clone, Builder)]
#[builder(pattern = "owned", setter(into))]
pub struct WalletRegistry {
    /// Identifier used when no wallet type is given. Parsed lazily.
    #[builder(default = "BridgeConfig::DEFAULT_WALLET.to_string()")]
    default_wallet: String,
    #[builder(default)]
    store: Arc<SessionStore>,
    #[builder(default)]
    globals: Arc<Globals>,
    /// Relay collaborators. Remote pairing wallets are unavailable without them.
    #[builder(default, setter(strip_option))]
    walletconnect: Option<Arc<WalletConnectSetup>>,
    #[builder(default, setter(strip_option))]
    on_not_found: Option<NotFoundCallback>,
}

impl fmt::Debug for WalletRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRegistry")
            .field("default_wallet", &self.default_wallet)
            .field("globals", &self.globals)
            .field("walletconnect", &self.walletconnect.is_some())
            .finish_non_exhaustive()
    }
}

impl WalletRegistry {
    pub fn builder() -> WalletRegistryBuilder {
        WalletRegistryBuilder::default()
    }

    /// Returns a builder seeded from `config`: the default wallet and a session store whose
    /// reconnect flag lives in `config.reconnect_file` when set.
    ///
    /// Remote pairing wallets additionally need
    /// [`WalletConnectSetup::from_config`](crate::WalletConnectSetup::from_config).
    pub fn from_config(config: &BridgeConfig) -> WalletRegistryBuilder {
        let durable: Arc<dyn DurableStorage> = match &config.reconnect_file {
            Some(path) => Arc::new(FileStorage::new(path)),
            None => Arc::new(MemoryStorage::default()),
        };
        Self::builder()
            .default_wallet(config.default_wallet.clone())
            .store(Arc::new(SessionStore::new(durable)))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn globals(&self) -> &Arc<Globals> {
        &self.globals
    }

    /// The configured default wallet type.
    pub fn default_wallet_type(&self) -> Result<WalletType> {
        WalletType::parse(&self.default_wallet)
    }

    /// Returns the adapter for `wallet_type`, or for the default wallet if `None`.
    ///
    /// If the wallet is not installed or not configured, the not-found callback runs before the
    /// error is returned.
    pub fn get_wallet(&self, wallet_type: Option<WalletType>) -> Result<Arc<dyn Wallet>> {
        let wallet_type = match wallet_type {
            Some(wallet_type) => wallet_type,
            None => self.default_wallet_type()?,
        };
        self.create(wallet_type).inspect_err(|err| {
            if err.is_not_found() {
                debug!(%wallet_type, %err, "wallet not available");
                if let Some(on_not_found) = &self.on_not_found {
                    on_not_found(err);
                }
            }
        })
    }

    /// Like [`get_wallet`](Self::get_wallet), parsing the type from `name`.
    pub fn get_wallet_by_name(&self, name: &str) -> Result<Arc<dyn Wallet>> {
        self.get_wallet(Some(WalletType::parse(name)?))
    }

    /// Returns the remote pairing adapter for `wallet_type`.
    pub fn get_walletconnect(&self, wallet_type: WalletType) -> Result<WalletConnectWallet> {
        let params = WalletConnectParams::for_type(wallet_type).ok_or(WalletError::Unsupported {
            wallet: wallet_type,
            operation: "remote pairing",
        })?;
        let setup = self
            .walletconnect
            .as_ref()
            .filter(|setup| setup.options().has_project_id())
            .ok_or(WalletError::MissingConfig {
                wallet: wallet_type,
                setting: "walletconnect.project_id",
            })?;
        Ok(WalletConnectWallet::new(params, setup.clone(), self.store.clone()))
    }

    /// Whether `wallet_type` (or the default) can be created. Never runs the not-found callback.
    pub fn check_wallet(&self, wallet_type: Option<WalletType>) -> bool {
        let wallet_type = match wallet_type {
            Some(wallet_type) => wallet_type,
            None => match self.default_wallet_type() {
                Ok(wallet_type) => wallet_type,
                Err(_) => return false,
            },
        };
        self.create(wallet_type).is_ok()
    }

    /// Probes every known wallet type.
    pub fn get_available_wallets(&self) -> BTreeMap<WalletType, bool> {
        WalletType::iter().map(|ty| (ty, self.check_wallet(Some(ty)))).collect()
    }

    fn create(&self, wallet_type: WalletType) -> Result<Arc<dyn Wallet>> {
        if wallet_type.is_walletconnect() {
            return Ok(Arc::new(self.get_walletconnect(wallet_type)?));
        }
        if wallet_type == WalletType::Vectis {
            return Ok(Arc::new(VectisWallet::new(&self.globals, self.store.clone())?));
        }
        let vendor = Vendor::for_type(wallet_type)
            .ok_or(WalletError::UnknownWalletType(wallet_type.to_string()))?;
        Ok(Arc::new(InjectedWallet::new(vendor, &self.globals, self.store.clone())?))
    }
}
