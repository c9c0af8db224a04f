//! Remote pairing adapter.
//!
//! Connects to a mobile wallet through a relay sign client. Sessions are owned by the client;
//! this adapter only looks them up by chain, dispatches requests over their topics and keeps the
//! [`SessionStore`] in step with them.

use crate::{
    Wallet, WalletType,
    encoding::{Encoding, bech32_data},
    error::{RelayError, Result, WalletError},
    events::{Handler, ReconnectCallback, Subscription},
    store::SessionStore,
    types::{
        AminoSignResponse, ChainInfo, DirectSignResponse, Key, SignDoc, StdSignDoc, StdSignature,
    },
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use wallet_bridge_config::{BridgeConfig, Platform, TimeoutConfig};

mod client;
pub use client::{
    Approval, COSMOS_NAMESPACE, ConnectParams, DisconnectReason, Pairing, PendingSession,
    ProposalNamespace, RelayEvent, RelayEventKind, RequestArguments, RequiredNamespaces, Session,
    SessionEventData, SessionNamespace, SessionRequest, SignClient, SignClientFactory,
    SignClientOptions, SignClientOptionsBuilder, caip2, events, methods,
};

mod modal;
pub use modal::{LogModal, Modal};

mod redirect;
pub use redirect::{DeepLink, Navigator, redirect};

/// What distinguishes one remote wallet from another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalletConnectParams {
    pub wallet_type: WalletType,
    /// Text encoding the wallet expects for sign-doc bytes and public keys.
    pub encoding: Encoding,
    /// App to foreground on mobile. `None` always presents the pairing URI in the modal.
    pub deep_link: Option<DeepLink>,
}

impl WalletConnectParams {
    pub const fn generic() -> Self {
        Self { wallet_type: WalletType::WalletConnect, encoding: Encoding::Base64, deep_link: None }
    }

    pub const fn keplr_mobile() -> Self {
        Self {
            wallet_type: WalletType::WcKeplrMobile,
            encoding: Encoding::Base64,
            deep_link: Some(DeepLink::KEPLR),
        }
    }

    pub const fn leap_mobile() -> Self {
        Self {
            wallet_type: WalletType::WcLeapMobile,
            encoding: Encoding::Base64,
            deep_link: Some(DeepLink::LEAP),
        }
    }

    pub const fn cosmostation_mobile() -> Self {
        Self {
            wallet_type: WalletType::WcCosmostationMobile,
            encoding: Encoding::Hex,
            deep_link: Some(DeepLink::COSMOSTATION),
        }
    }

    /// Returns the parameters for a remote pairing wallet type.
    pub const fn for_type(wallet_type: WalletType) -> Option<Self> {
        match wallet_type {
            WalletType::WalletConnect => Some(Self::generic()),
            WalletType::WcKeplrMobile => Some(Self::keplr_mobile()),
            WalletType::WcLeapMobile => Some(Self::leap_mobile()),
            WalletType::WcCosmostationMobile => Some(Self::cosmostation_mobile()),
            _ => None,
        }
    }
}

/// Per-chain async locks serializing `enable`.
#[derive(Default)]
struct ChainLocks(Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>);

impl ChainLocks {
    fn get(&self, chain_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.0.lock().entry(chain_id.to_string()).or_default().clone()
    }
}

impl fmt::Debug for ChainLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.lock().keys()).finish()
    }
}

/// Relay collaborators shared by every remote pairing wallet of an application.
#[derive(Debug)]
pub struct WalletConnectSetup {
    options: SignClientOptions,
    factory: Arc<dyn SignClientFactory>,
    modal: Arc<dyn Modal>,
    navigator: Option<Arc<dyn Navigator>>,
    platform: Platform,
    timeouts: TimeoutConfig,
    init_lock: tokio::sync::Mutex<()>,
    chain_locks: ChainLocks,
}

impl WalletConnectSetup {
    pub fn new(options: SignClientOptions, factory: Arc<dyn SignClientFactory>) -> Self {
        Self {
            options,
            factory,
            modal: Arc::new(LogModal),
            navigator: None,
            platform: Platform::default(),
            timeouts: TimeoutConfig::default(),
            init_lock: Default::default(),
            chain_locks: Default::default(),
        }
    }

    /// Builds the relay setup from `config`, or `None` if it has no `walletconnect` section.
    pub fn from_config(config: &BridgeConfig, factory: Arc<dyn SignClientFactory>) -> Option<Self> {
        let walletconnect = config.walletconnect.as_ref()?;
        Some(
            Self::new(SignClientOptions::from(walletconnect), factory)
                .with_platform(config.platform)
                .with_timeouts(config.timeouts),
        )
    }

    pub fn with_modal(mut self, modal: Arc<dyn Modal>) -> Self {
        self.modal = modal;
        self
    }

    /// Sets the navigator used for deep links. Without one, mobile redirects are skipped.
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn options(&self) -> &SignClientOptions {
        &self.options
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

/// Signing payload as sent over the relay, with bytes text-encoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSignDoc {
    chain_id: String,
    account_number: AccountNumber,
    body_bytes: String,
    auth_info_bytes: String,
}

/// Account numbers travel as decimal strings. Some wallets answer with a JSON number.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AccountNumber {
    Number(u64),
    Text(String),
}

impl AccountNumber {
    fn parse(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireDirectResponse {
    signed: WireSignDoc,
    signature: StdSignature,
}

/// Account entry returned by `cosmos_getAccounts`. The public key is text-encoded.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoteAccount {
    pub address: String,
    pub algo: String,
    pub pubkey: String,
}

/// A wallet reached through the relay protocol.
#[derive(Clone, Debug)]
pub struct WalletConnectWallet {
    params: WalletConnectParams,
    setup: Arc<WalletConnectSetup>,
    store: Arc<SessionStore>,
}

impl WalletConnectWallet {
    pub fn new(
        params: WalletConnectParams,
        setup: Arc<WalletConnectSetup>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self { params, setup, store }
    }

    pub fn params(&self) -> &WalletConnectParams {
        &self.params
    }

    /// Returns the shared sign client, creating and storing it on first use.
    pub async fn init(&self) -> Result<Arc<dyn SignClient>> {
        if let Some(client) = self.store.sign_client() {
            return Ok(client);
        }
        if !self.setup.options.has_project_id() {
            return Err(WalletError::MissingConfig {
                wallet: self.params.wallet_type,
                setting: "walletconnect.project_id",
            });
        }
        let _guard = self.setup.init_lock.lock().await;
        if let Some(client) = self.store.sign_client() {
            return Ok(client);
        }
        debug!(wallet = %self.params.wallet_type, "creating sign client");
        let client = self.setup.factory.create(&self.setup.options).await?;
        self.store.set_sign_client(Some(client.clone()));
        Ok(client)
    }

    /// Returns the live session for `chain_id`, or `None`.
    ///
    /// A lapsed session is torn down before `None` is returned.
    pub async fn check_session(&self, chain_id: &str) -> Option<Session> {
        self.find_session(chain_id).await.map(|(_, session)| session)
    }

    /// Like [`check_session`](Self::check_session) but fails with `NoSession`.
    pub async fn get_session(&self, chain_id: &str) -> Result<Session> {
        self.check_session(chain_id)
            .await
            .ok_or_else(|| WalletError::NoSession { chain_id: chain_id.to_string() })
    }

    async fn find_session(&self, chain_id: &str) -> Option<(Arc<dyn SignClient>, Session)> {
        let client = self.store.sign_client()?;
        let session = client.sessions().into_iter().rev().find(|s| s.includes_chain(chain_id))?;
        if session.is_expired_at(now_ms()) {
            debug!(chain_id, topic = %session.topic, expiry = session.expiry, "session expired");
            if let Err(err) = self.teardown(&client, Some(session)).await {
                warn!(chain_id, %err, "failed to tear down expired session");
            }
            return None;
        }
        Some((client, session))
    }

    async fn session_for(&self, chain_id: &str) -> Result<(Arc<dyn SignClient>, Session)> {
        self.find_session(chain_id)
            .await
            .ok_or_else(|| WalletError::NoSession { chain_id: chain_id.to_string() })
    }

    /// Asks the remote wallet for its account on `chain_id`.
    pub async fn get_account(&self, chain_id: &str) -> Result<RemoteAccount> {
        let (client, session) = self.session_for(chain_id).await?;
        self.redirect(None);
        let accounts: Vec<RemoteAccount> = self
            .request(&client, &session, chain_id, methods::GET_ACCOUNTS, json!({}))
            .await?;
        accounts.into_iter().next().ok_or(WalletError::UnexpectedResponse {
            method: methods::GET_ACCOUNTS,
            reason: "no accounts returned".to_string(),
        })
    }

    fn key_from_account(&self, account: RemoteAccount) -> Result<Key> {
        Ok(Key {
            address: bech32_data(&account.address)?,
            pub_key: self.params.encoding.decode(&account.pubkey)?,
            algo: account.algo,
            bech32_address: account.address,
            name: String::new(),
            is_keystone: false,
            is_nano_ledger: false,
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        client: &Arc<dyn SignClient>,
        session: &Session,
        chain_id: &str,
        method: &'static str,
        params: Value,
    ) -> Result<T> {
        trace!(method, chain_id, topic = %session.topic, "sending session request");
        let response = match client
            .request(SessionRequest {
                topic: session.topic.clone(),
                chain_id: caip2(chain_id),
                request: RequestArguments { method: method.to_string(), params },
            })
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_benign() => {
                debug!(method, chain_id, topic = %session.topic, %err, "session unknown to relay");
                if let Err(cleanup) = self.teardown(client, Some(session.clone())).await {
                    warn!(chain_id, err = %cleanup, "failed to tear down stale session");
                }
                return Err(WalletError::NoSession { chain_id: chain_id.to_string() });
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_value(response)
            .map_err(|err| WalletError::UnexpectedResponse { method, reason: err.to_string() })
    }

    /// Opens the vendor app when on mobile and a deep link is configured.
    fn redirect(&self, uri: Option<&str>) {
        if let Some(navigator) = &self.setup.navigator {
            redirect(&**navigator, self.setup.platform, self.params.deep_link.as_ref(), uri);
        }
    }

    /// Whether pairing URIs are handed to the vendor app instead of the modal.
    fn deep_links(&self) -> bool {
        self.setup.platform.is_mobile()
            && self.params.deep_link.is_some()
            && self.setup.navigator.is_some()
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        after: Duration,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(wallet = %self.params.wallet_type, operation, ?after, "timed out");
                Err(WalletError::Timeout { operation, after })
            }
        }
    }

    /// Resolves the account over an existing session and records it.
    ///
    /// `NoSession` means the relay no longer knew the topic and the session was already torn
    /// down.
    async fn resume(&self, chain_id: &str, session: Session) -> Result<()> {
        let after = self.setup.timeouts.account();
        match self.with_timeout("account resolution", after, self.get_key(chain_id)).await {
            Ok(key) => {
                self.record_connected(chain_id, key);
                Ok(())
            }
            Err(err @ WalletError::NoSession { .. }) => Err(err),
            Err(err) => {
                debug!(chain_id, topic = %session.topic, %err, "dropping stale session");
                if let Some(client) = self.store.sign_client()
                    && let Err(cleanup) = self.teardown(&client, Some(session)).await
                {
                    warn!(chain_id, err = %cleanup, "failed to tear down stale session");
                }
                Err(err)
            }
        }
    }

    /// Proposes a new session for `chain_id` and waits for the remote wallet to approve it.
    async fn handshake(&self, client: &Arc<dyn SignClient>, chain_id: &str) -> Result<()> {
        debug!(wallet = %self.params.wallet_type, chain_id, "starting pairing");
        let required_namespaces = RequiredNamespaces::from([(
            COSMOS_NAMESPACE.to_string(),
            ProposalNamespace::cosmos(chain_id),
        )]);
        let PendingSession { uri, approval } =
            client.connect(ConnectParams { required_namespaces, pairing_topic: None }).await?;

        let mut presented = false;
        if let Some(uri) = uri.as_deref() {
            if self.deep_links() {
                self.redirect(Some(uri));
            } else {
                self.setup.modal.open(uri);
                presented = true;
            }
        }

        let after = self.setup.timeouts.approval();
        let approved = self
            .with_timeout("pairing approval", after, async {
                approval.await.map_err(WalletError::from)
            })
            .await;
        if presented {
            self.setup.modal.close();
        }
        let session = approved?;
        debug!(chain_id, topic = %session.topic, "session approved");

        let after = self.setup.timeouts.account();
        match self.with_timeout("account resolution", after, self.get_key(chain_id)).await {
            Ok(key) => {
                self.record_connected(chain_id, key);
                Ok(())
            }
            Err(err @ WalletError::NoSession { .. }) => Err(err),
            Err(err) => {
                if let Err(cleanup) = self.teardown(client, Some(session)).await {
                    warn!(chain_id, err = %cleanup, "failed to tear down new session");
                }
                Err(err)
            }
        }
    }

    fn record_connected(&self, chain_id: &str, key: Key) {
        self.store.set_connected(chain_id, key);
        self.store.set_reconnect(self.params.wallet_type);
    }

    fn clear_local(&self) {
        self.store.clear_session();
        self.store.clear_reconnect();
    }

    /// Terminates `session`, collects inactive pairings and clears local state.
    ///
    /// Already-gone targets are ignored. Cleanup always runs to the end; the first other error
    /// is returned afterwards.
    async fn teardown(
        &self,
        client: &Arc<dyn SignClient>,
        sessions: impl IntoIterator<Item = Session>,
    ) -> Result<()> {
        let mut first_err: Option<RelayError> = None;
        for session in sessions {
            match client.disconnect(&session.topic, DisconnectReason::user_disconnected()).await {
                Ok(()) => debug!(topic = %session.topic, "session disconnected"),
                Err(err) if err.is_benign() => {
                    trace!(topic = %session.topic, %err, "session already gone");
                }
                Err(err) => {
                    warn!(topic = %session.topic, %err, "failed to disconnect session");
                    first_err.get_or_insert(err);
                }
            }
        }

        let inactive: Vec<_> = client.pairings().into_iter().filter(|p| !p.active).collect();
        if !inactive.is_empty() {
            debug!(count = inactive.len(), "deleting inactive pairings");
        }
        for pairing in inactive {
            match client.delete_pairing(&pairing.topic, DisconnectReason::user_disconnected()).await
            {
                Ok(()) => {}
                Err(err) if err.is_benign() => {
                    trace!(topic = %pairing.topic, %err, "pairing already gone");
                }
                Err(err) => {
                    error!(topic = %pairing.topic, %err, "failed to delete pairing");
                    first_err.get_or_insert(err);
                }
            }
        }

        self.clear_local();
        first_err.map_or(Ok(()), |err| Err(err.into()))
    }

    fn on_session_event(
        &self,
        chain_id: &str,
        event: &SessionEventData,
        reconnect: &ReconnectCallback,
    ) {
        let chain_id = chain_id.strip_prefix("cosmos:").unwrap_or(chain_id).to_string();
        let changed = changed_address(&event.data);
        let current = self.store.account().map(|key| key.bech32_address);
        debug!(event = %event.name, %chain_id, ?changed, "session event");
        match changed {
            Some(address) if current.as_deref() != Some(address.as_str()) => {
                let Ok(handle) = tokio::runtime::Handle::try_current() else {
                    warn!(%chain_id, "no runtime to re-enable on; reconnecting instead");
                    reconnect();
                    return;
                };
                let wallet = self.clone();
                handle.spawn(async move {
                    if let Err(err) = wallet.enable(&chain_id).await {
                        warn!(%chain_id, %err, "failed to re-enable after account change");
                    }
                });
            }
            _ => reconnect(),
        }
    }
}

/// Extracts the bech32 address from an `accountsChanged` or `chainChanged` payload.
fn changed_address(data: &Value) -> Option<String> {
    let first = match data {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let text = match first {
        Value::String(s) => s.as_str(),
        Value::Object(fields) => fields.get("address")?.as_str()?,
        _ => return None,
    };
    Some(text.rsplit_once(':').map_or(text, |(_, address)| address).to_string())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[async_trait]
impl Wallet for WalletConnectWallet {
    fn wallet_type(&self) -> WalletType {
        self.params.wallet_type
    }

    async fn enable(&self, chain_id: &str) -> Result<()> {
        let client = self.init().await?;
        let lock = self.setup.chain_locks.get(chain_id);
        let _guard = lock.lock().await;

        if let Some(session) = self.check_session(chain_id).await {
            trace!(chain_id, topic = %session.topic, "reusing session");
            match self.resume(chain_id, session).await {
                Ok(()) => return Ok(()),
                Err(WalletError::NoSession { .. }) => {
                    debug!(chain_id, "session gone, pairing again");
                }
                Err(err) => return Err(err),
            }
        }
        self.handshake(&client, chain_id).await
    }

    async fn get_key(&self, chain_id: &str) -> Result<Key> {
        let account = self.get_account(chain_id).await?;
        self.key_from_account(account)
    }

    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: SignDoc,
    ) -> Result<DirectSignResponse> {
        let (client, session) = self.session_for(chain_id).await?;
        if self.store.account().is_none() {
            return Err(WalletError::AccountNotDefined);
        }
        let encoding = self.params.encoding;
        let wire = WireSignDoc {
            chain_id: sign_doc.chain_id,
            account_number: AccountNumber::Text(sign_doc.account_number.to_string()),
            body_bytes: encoding.encode(&sign_doc.body_bytes),
            auth_info_bytes: encoding.encode(&sign_doc.auth_info_bytes),
        };
        self.redirect(None);
        let response: WireDirectResponse = self
            .request(
                &client,
                &session,
                chain_id,
                methods::SIGN_DIRECT,
                json!({ "signerAddress": signer, "signDoc": wire }),
            )
            .await?;

        let signed = response.signed;
        let account_number =
            signed.account_number.parse().ok_or_else(|| WalletError::UnexpectedResponse {
                method: methods::SIGN_DIRECT,
                reason: "invalid account number".to_string(),
            })?;
        Ok(DirectSignResponse {
            signed: SignDoc {
                body_bytes: encoding.decode(&signed.body_bytes)?,
                auth_info_bytes: encoding.decode(&signed.auth_info_bytes)?,
                chain_id: signed.chain_id,
                account_number,
            },
            signature: response.signature,
        })
    }

    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse> {
        let (client, session) = self.session_for(chain_id).await?;
        if self.store.account().is_none() {
            return Err(WalletError::AccountNotDefined);
        }
        self.redirect(None);
        self.request(
            &client,
            &session,
            chain_id,
            methods::SIGN_AMINO,
            json!({ "signerAddress": signer, "signDoc": sign_doc }),
        )
        .await
    }

    async fn experimental_suggest_chain(&self, _chain_info: &ChainInfo) -> Result<()> {
        Err(WalletError::Unsupported {
            wallet: self.params.wallet_type,
            operation: "experimental_suggest_chain",
        })
    }

    /// Listens for relay session events on the shared sign client.
    ///
    /// The client must exist already: call [`init`](Self::init) or `enable` first. Without one
    /// this returns [`Subscription::noop`] and later sessions go unobserved until the caller
    /// subscribes again.
    fn subscription(&self, reconnect: ReconnectCallback) -> Subscription {
        let Some(client) = self.store.sign_client() else {
            warn!(wallet = %self.params.wallet_type, "no sign client, relay events ignored");
            return Subscription::noop();
        };

        let teardown: Handler<RelayEvent> = {
            let wallet = self.clone();
            Arc::new(move |event: &RelayEvent| {
                debug!(kind = %event.kind(), topic = event.topic(), "session ended by relay");
                wallet.clear_local();
            })
        };
        let changed: Handler<RelayEvent> = {
            let wallet = self.clone();
            Arc::new(move |event: &RelayEvent| {
                if let RelayEvent::SessionEvent { chain_id, event, .. } = event {
                    wallet.on_session_event(chain_id, event, &reconnect);
                }
            })
        };

        let ids = [
            (RelayEventKind::SessionDelete, teardown.clone()),
            (RelayEventKind::SessionExpire, teardown),
            (RelayEventKind::SessionEvent, changed),
        ]
        .map(|(kind, handler)| (kind, client.on(kind, handler)));
        Subscription::new(move || {
            for (kind, id) in ids {
                client.off(kind, id);
            }
        })
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(client) = self.store.sign_client() else {
            self.clear_local();
            return Ok(());
        };
        let chain_ids = self.store.active_chain_ids();
        let mut sessions: Vec<Session> = Vec::new();
        for session in client.sessions().into_iter().rev() {
            if chain_ids.iter().any(|id| session.includes_chain(id))
                && !sessions.iter().any(|s| s.topic == session.topic)
            {
                sessions.push(session);
            }
        }
        debug!(wallet = %self.params.wallet_type, sessions = sessions.len(), "disconnecting");
        self.teardown(&client, sessions).await
    }
}
