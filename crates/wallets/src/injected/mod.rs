//! Adapters over providers injected by browser extensions.
//!
//! Discovery is presence-only: a vendor's wallet exists iff its provider is registered in
//! [`Globals`] under the vendor's global name.

use crate::{
    Wallet, WalletType,
    encoding::bech32_data,
    error::{Result, WalletError},
    events::{EventEmitter, EventTarget, Handler, ReconnectCallback, Subscription},
    store::SessionStore,
    types::{AminoSignResponse, ChainInfo, DirectSignResponse, Key, SignDoc, StdSignDoc},
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::{collections::HashMap, fmt, sync::Arc};

mod provider;
pub use provider::{
    KeplrProvider, ProviderError, ProviderResult, VectisChainInfo, VectisKey, VectisProvider,
};

/// Where a vendor dispatches its change event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSource {
    Window,
    /// The provider object itself, see [`KeplrProvider::events`].
    Provider,
}

/// How one extension vendor is discovered and observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vendor {
    pub wallet_type: WalletType,
    /// Dotted path of the provider on the global object.
    pub global: &'static str,
    /// Event fired when the user switches accounts.
    pub change_event: &'static str,
    pub event_source: EventSource,
}

impl Vendor {
    pub const KEPLR: Self = Self {
        wallet_type: WalletType::Keplr,
        global: "keplr",
        change_event: "keplr_keystorechange",
        event_source: EventSource::Window,
    };

    pub const LEAP: Self = Self {
        wallet_type: WalletType::Leap,
        global: "leap",
        change_event: "leap_keystorechange",
        event_source: EventSource::Window,
    };

    pub const COSMOSTATION: Self = Self {
        wallet_type: WalletType::Cosmostation,
        global: "cosmostation.providers.keplr",
        change_event: "accountChanged",
        event_source: EventSource::Provider,
    };

    // Compass is a Leap fork and fires Leap's event.
    pub const COMPASS: Self = Self {
        wallet_type: WalletType::Compass,
        global: "compass",
        change_event: "leap_keystorechange",
        event_source: EventSource::Window,
    };

    pub const XDEFI: Self = Self {
        wallet_type: WalletType::Xdefi,
        global: "xfi.keplr",
        change_event: "keplr_keystorechange",
        event_source: EventSource::Window,
    };

    pub const VECTIS: Self = Self {
        wallet_type: WalletType::Vectis,
        global: "vectis.cosmos",
        change_event: "vectis_accountChanged",
        event_source: EventSource::Window,
    };

    pub const ALL: [Self; 6] =
        [Self::KEPLR, Self::LEAP, Self::COSMOSTATION, Self::COMPASS, Self::XDEFI, Self::VECTIS];

    pub fn for_type(wallet_type: WalletType) -> Option<Self> {
        Self::ALL.into_iter().find(|vendor| vendor.wallet_type == wallet_type)
    }
}

/// The host's global object: injected providers plus the window event target.
pub struct Globals {
    keplr: RwLock<HashMap<String, Arc<dyn KeplrProvider>>>,
    vectis: RwLock<Option<Arc<dyn VectisProvider>>>,
    window: Arc<dyn EventTarget>,
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut globals: Vec<_> = self.keplr.read().keys().cloned().collect();
        if self.vectis.read().is_some() {
            globals.push(Vendor::VECTIS.global.to_string());
        }
        globals.sort();
        f.debug_struct("Globals").field("providers", &globals).finish_non_exhaustive()
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self::new(Arc::new(EventEmitter::<String, ()>::new()))
    }
}

impl Globals {
    pub fn new(window: Arc<dyn EventTarget>) -> Self {
        Self { keplr: Default::default(), vectis: Default::default(), window }
    }

    pub fn window(&self) -> Arc<dyn EventTarget> {
        self.window.clone()
    }

    /// Registers a Keplr-shaped provider under `global`, e.g. `"leap"` or `"xfi.keplr"`.
    pub fn set_provider(&self, global: impl Into<String>, provider: Arc<dyn KeplrProvider>) {
        self.keplr.write().insert(global.into(), provider);
    }

    pub fn provider(&self, global: &str) -> Option<Arc<dyn KeplrProvider>> {
        self.keplr.read().get(global).cloned()
    }

    pub fn remove_provider(&self, global: &str) -> bool {
        self.keplr.write().remove(global).is_some()
    }

    pub fn set_vectis(&self, provider: Option<Arc<dyn VectisProvider>>) {
        *self.vectis.write() = provider;
    }

    pub fn vectis(&self) -> Option<Arc<dyn VectisProvider>> {
        self.vectis.read().clone()
    }
}

/// Listens for `event` on `target`; firing it clears the recorded session and calls `reconnect`.
fn watch_account_change(
    target: Arc<dyn EventTarget>,
    event: &'static str,
    store: Arc<SessionStore>,
    reconnect: ReconnectCallback,
) -> Subscription {
    let listener: Handler<()> = Arc::new(move |_: &()| {
        debug!(event, "account changed");
        store.clear_session();
        reconnect();
    });
    let id = target.add_event_listener(event, listener);
    Subscription::new(move || {
        target.remove_event_listener(event, id);
    })
}

/// An extension wallet exposing the Keplr provider shape.
#[derive(Clone)]
pub struct InjectedWallet {
    vendor: Vendor,
    provider: Arc<dyn KeplrProvider>,
    window: Arc<dyn EventTarget>,
    store: Arc<SessionStore>,
}

impl fmt::Debug for InjectedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedWallet")
            .field("vendor", &self.vendor)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl InjectedWallet {
    /// Looks up the vendor's provider, failing with `NotFound` if it is not injected.
    pub fn new(vendor: Vendor, globals: &Globals, store: Arc<SessionStore>) -> Result<Self> {
        let provider = globals
            .provider(vendor.global)
            .ok_or(WalletError::NotFound { wallet: vendor.wallet_type, global: vendor.global })?;
        Ok(Self { vendor, provider, window: globals.window(), store })
    }

    pub fn vendor(&self) -> &Vendor {
        &self.vendor
    }

    fn err(&self, err: ProviderError) -> WalletError {
        WalletError::provider(self.vendor.wallet_type, err)
    }
}

#[async_trait]
impl Wallet for InjectedWallet {
    fn wallet_type(&self) -> WalletType {
        self.vendor.wallet_type
    }

    async fn enable(&self, chain_id: &str) -> Result<()> {
        self.provider.enable(&[chain_id.to_string()]).await.map_err(|e| self.err(e))?;
        let key = self.get_key(chain_id).await?;
        self.store.set_connected(chain_id, key);
        self.store.set_reconnect(self.vendor.wallet_type);
        Ok(())
    }

    async fn get_key(&self, chain_id: &str) -> Result<Key> {
        self.provider.get_key(chain_id).await.map_err(|e| self.err(e))
    }

    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: SignDoc,
    ) -> Result<DirectSignResponse> {
        self.provider.sign_direct(chain_id, signer, sign_doc).await.map_err(|e| self.err(e))
    }

    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse> {
        self.provider.sign_amino(chain_id, signer, sign_doc).await.map_err(|e| self.err(e))
    }

    async fn experimental_suggest_chain(&self, chain_info: &ChainInfo) -> Result<()> {
        self.provider.experimental_suggest_chain(chain_info).await.map_err(|e| self.err(e))
    }

    fn subscription(&self, reconnect: ReconnectCallback) -> Subscription {
        let target = match self.vendor.event_source {
            EventSource::Window => self.window.clone(),
            EventSource::Provider => match self.provider.events() {
                Some(target) => target,
                None => {
                    warn!(wallet = %self.vendor.wallet_type, "provider exposes no event target");
                    return Subscription::noop();
                }
            },
        };
        watch_account_change(target, self.vendor.change_event, self.store.clone(), reconnect)
    }

    async fn disconnect(&self) -> Result<()> {
        self.store.clear_session();
        self.store.clear_reconnect();
        Ok(())
    }
}

/// The Vectis extension, whose provider differs from the Keplr shape.
#[derive(Clone)]
pub struct VectisWallet {
    provider: Arc<dyn VectisProvider>,
    window: Arc<dyn EventTarget>,
    store: Arc<SessionStore>,
}

impl fmt::Debug for VectisWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectisWallet").field("provider", &self.provider).finish_non_exhaustive()
    }
}

impl VectisWallet {
    pub fn new(globals: &Globals, store: Arc<SessionStore>) -> Result<Self> {
        let provider = globals.vectis().ok_or(WalletError::NotFound {
            wallet: WalletType::Vectis,
            global: Vendor::VECTIS.global,
        })?;
        Ok(Self { provider, window: globals.window(), store })
    }

    fn err(err: ProviderError) -> WalletError {
        WalletError::provider(WalletType::Vectis, err)
    }
}

#[async_trait]
impl Wallet for VectisWallet {
    fn wallet_type(&self) -> WalletType {
        WalletType::Vectis
    }

    async fn enable(&self, chain_id: &str) -> Result<()> {
        self.provider.enable(&[chain_id.to_string()]).await.map_err(Self::err)?;
        let key = self.get_key(chain_id).await?;
        self.store.set_connected(chain_id, key);
        self.store.set_reconnect(WalletType::Vectis);
        Ok(())
    }

    async fn get_key(&self, chain_id: &str) -> Result<Key> {
        let key = self.provider.get_key(chain_id).await.map_err(Self::err)?;
        Ok(Key {
            address: bech32_data(&key.address)?,
            algo: key.algo,
            bech32_address: key.address,
            name: key.name,
            pub_key: key.pub_key,
            is_keystone: false,
            is_nano_ledger: key.is_nano_ledger,
        })
    }

    async fn sign_direct(
        &self,
        _chain_id: &str,
        signer: &str,
        sign_doc: SignDoc,
    ) -> Result<DirectSignResponse> {
        self.provider.sign_direct(signer, sign_doc).await.map_err(Self::err)
    }

    async fn sign_amino(
        &self,
        _chain_id: &str,
        signer: &str,
        sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse> {
        self.provider.sign_amino(signer, sign_doc).await.map_err(Self::err)
    }

    async fn experimental_suggest_chain(&self, chain_info: &ChainInfo) -> Result<()> {
        self.provider.suggest_chains(&[VectisChainInfo::from(chain_info)]).await.map_err(Self::err)
    }

    fn subscription(&self, reconnect: ReconnectCallback) -> Subscription {
        watch_account_change(
            self.window.clone(),
            Vendor::VECTIS.change_event,
            self.store.clone(),
            reconnect,
        )
    }

    async fn disconnect(&self) -> Result<()> {
        self.store.clear_session();
        self.store.clear_reconnect();
        Ok(())
    }
}
