//! Recording mocks of every collaborator the adapters talk to.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};
use wallet_bridge_wallets::{
    Platform, RelayError, SessionStore, TimeoutConfig, WalletConnectSetup, WalletConnectWallet,
    events::{EventEmitter, EventTarget, Handler, ListenerId},
    injected::{
        KeplrProvider, ProviderError, ProviderResult, VectisChainInfo, VectisKey, VectisProvider,
    },
    types::{
        AminoSignResponse, ChainInfo, DirectSignResponse, Key, PubKey, SignDoc, StdSignDoc,
        StdSignature,
    },
    walletconnect::{
        ConnectParams, DisconnectReason, Modal, Navigator, Pairing, PendingSession, RelayEvent,
        RelayEventKind, Session, SessionNamespace, SessionRequest, SignClient, SignClientFactory,
        SignClientOptions, WalletConnectParams,
    },
};

/// `cosmos1` address of the bytes `1..=20`.
pub const ADDR: &str = "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu";
/// `cosmos1` address of twenty `0xaa` bytes.
pub const OTHER_ADDR: &str = "cosmos142424242424242424242424242424242a7m5mu";
pub const CHAIN: &str = "cosmoshub-4";
pub const PAIRING_URI: &str = "wc:7f6e@2?relay-protocol=irn&symKey=587d";

pub fn addr_bytes() -> Vec<u8> {
    (1..=20).collect()
}

pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

pub fn session(topic: &str, chain_id: &str, address: &str, expiry: u64) -> Session {
    Session {
        topic: topic.to_string(),
        pairing_topic: Some(format!("pairing-{topic}")),
        namespaces: [(
            "cosmos".to_string(),
            SessionNamespace {
                accounts: vec![format!("cosmos:{chain_id}:{address}")],
                methods: vec![],
                events: vec![],
            },
        )]
        .into(),
        expiry,
    }
}

pub fn live_session(topic: &str) -> Session {
    session(topic, CHAIN, ADDR, now_secs() + 3600)
}

pub fn pairing(topic: &str, active: bool) -> Pairing {
    Pairing { topic: topic.to_string(), active, expiry: now_secs() + 3600 }
}

pub fn key(address: &str) -> Key {
    Key {
        address: addr_bytes(),
        algo: "secp256k1".to_string(),
        bech32_address: address.to_string(),
        name: "test".to_string(),
        pub_key: vec![2; 33],
        ..Default::default()
    }
}

pub fn signature() -> StdSignature {
    StdSignature {
        pub_key: PubKey {
            type_: "tendermint/PubKeySecp256k1".to_string(),
            value: "Ag==".to_string(),
        },
        signature: "c2lnbmF0dXJl".to_string(),
    }
}

pub type Responder = Arc<dyn Fn(&SessionRequest) -> Result<Value, RelayError> + Send + Sync>;

#[derive(Clone)]
pub enum ApprovalBehavior {
    Approve(Session),
    Reject(RelayError),
    Never,
}

/// A relay client with scripted answers that records every call.
#[derive(Default)]
pub struct MockSignClient {
    pub sessions: Arc<Mutex<Vec<Session>>>,
    pub pairings: Mutex<Vec<Pairing>>,
    pub connects: Mutex<Vec<ConnectParams>>,
    pub requests: Mutex<Vec<SessionRequest>>,
    pub disconnects: Mutex<Vec<(String, DisconnectReason)>>,
    pub deleted_pairings: Mutex<Vec<String>>,
    pub approval: Mutex<Option<ApprovalBehavior>>,
    pub responders: Mutex<HashMap<String, Responder>>,
    pub pairing_errors: Mutex<HashMap<String, RelayError>>,
    pub hang_requests: AtomicBool,
    pub events: EventEmitter<RelayEventKind, RelayEvent>,
}

impl std::fmt::Debug for MockSignClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSignClient").finish_non_exhaustive()
    }
}

impl MockSignClient {
    pub fn add_session(&self, session: Session) {
        self.sessions.lock().push(session);
    }

    pub fn respond(&self, method: &str, responder: Responder) {
        self.responders.lock().insert(method.to_string(), responder);
    }

    pub fn respond_with(&self, method: &str, value: Value) {
        self.respond(method, Arc::new(move |_: &SessionRequest| Ok(value.clone())));
    }

    /// Answers `cosmos_getAccounts` with `address` and a base64 public key.
    pub fn respond_accounts(&self, address: &str) {
        self.respond_with(
            "cosmos_getAccounts",
            json!([{ "address": address, "algo": "secp256k1", "pubkey": "AgICAg==" }]),
        );
    }

    pub fn approve_with(&self, behavior: ApprovalBehavior) {
        *self.approval.lock() = Some(behavior);
    }

    pub fn emit(&self, event: RelayEvent) -> usize {
        self.events.emit(&event.kind(), &event)
    }

    pub fn request_methods(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.request.method.clone()).collect()
    }
}

#[async_trait]
impl SignClient for MockSignClient {
    async fn connect(&self, params: ConnectParams) -> Result<PendingSession, RelayError> {
        self.connects.lock().push(params);
        let behavior = self.approval.lock().clone().unwrap_or(ApprovalBehavior::Never);
        let approval: wallet_bridge_wallets::walletconnect::Approval = match behavior {
            ApprovalBehavior::Approve(session) => {
                let sessions = self.sessions.clone();
                Box::pin(async move {
                    sessions.lock().push(session.clone());
                    Ok::<_, RelayError>(session)
                })
            }
            ApprovalBehavior::Reject(err) => Box::pin(async move { Err::<Session, _>(err) }),
            ApprovalBehavior::Never => {
                Box::pin(std::future::pending::<Result<Session, RelayError>>())
            }
        };
        Ok(PendingSession { uri: Some(PAIRING_URI.to_string()), approval })
    }

    async fn request(&self, request: SessionRequest) -> Result<Value, RelayError> {
        self.requests.lock().push(request.clone());
        if self.hang_requests.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let responder = self.responders.lock().get(&request.request.method).cloned();
        match responder {
            Some(responder) => responder(&request),
            None => {
                Err(RelayError::Other(format!("no response for {}", request.request.method)))
            }
        }
    }

    async fn disconnect(&self, topic: &str, reason: DisconnectReason) -> Result<(), RelayError> {
        self.disconnects.lock().push((topic.to_string(), reason));
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|s| s.topic != topic);
        if sessions.len() == before {
            return Err(RelayError::NoMatchingKey(format!("session topic: {topic}")));
        }
        Ok(())
    }

    fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().clone()
    }

    fn pairings(&self) -> Vec<Pairing> {
        self.pairings.lock().clone()
    }

    async fn delete_pairing(
        &self,
        topic: &str,
        _reason: DisconnectReason,
    ) -> Result<(), RelayError> {
        self.deleted_pairings.lock().push(topic.to_string());
        if let Some(err) = self.pairing_errors.lock().get(topic) {
            return Err(err.clone());
        }
        self.pairings.lock().retain(|p| p.topic != topic);
        Ok(())
    }

    fn on(&self, kind: RelayEventKind, handler: Handler<RelayEvent>) -> ListenerId {
        self.events.on(kind, handler)
    }

    fn off(&self, kind: RelayEventKind, id: ListenerId) -> bool {
        self.events.off(&kind, id)
    }
}

#[derive(Debug, Default)]
pub struct MockFactory {
    pub client: Arc<MockSignClient>,
    pub created: AtomicUsize,
}

#[async_trait]
impl SignClientFactory for MockFactory {
    async fn create(
        &self,
        _options: &SignClientOptions,
    ) -> Result<Arc<dyn SignClient>, RelayError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone())
    }
}

#[derive(Debug, Default)]
pub struct MockModal {
    pub opened: Mutex<Vec<String>>,
    pub closed: AtomicUsize,
}

impl Modal for MockModal {
    fn open(&self, uri: &str) {
        self.opened.lock().push(uri.to_string());
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MockNavigator {
    pub urls: Mutex<Vec<String>>,
}

impl Navigator for MockNavigator {
    fn open(&self, url: &str) {
        self.urls.lock().push(url.to_string());
    }
}

/// A remote pairing wallet wired to mocks.
pub struct Harness {
    pub factory: Arc<MockFactory>,
    pub modal: Arc<MockModal>,
    pub navigator: Arc<MockNavigator>,
    pub store: Arc<SessionStore>,
    pub wallet: WalletConnectWallet,
}

impl Harness {
    pub fn new(params: WalletConnectParams, platform: Platform) -> Self {
        Self::with_project_id(params, platform, "test-project")
    }

    pub fn with_project_id(
        params: WalletConnectParams,
        platform: Platform,
        project_id: &str,
    ) -> Self {
        let factory = Arc::new(MockFactory::default());
        let modal = Arc::new(MockModal::default());
        let navigator = Arc::new(MockNavigator::default());
        let store = Arc::new(SessionStore::default());
        let options = SignClientOptions::builder().project_id(project_id).build().unwrap();
        let setup = WalletConnectSetup::new(options, factory.clone())
            .with_modal(modal.clone())
            .with_navigator(navigator.clone())
            .with_platform(platform)
            .with_timeouts(TimeoutConfig::default());
        let wallet = WalletConnectWallet::new(params, Arc::new(setup), store.clone());
        Self { factory, modal, navigator, store, wallet }
    }

    pub fn desktop() -> Self {
        Self::new(WalletConnectParams::generic(), Platform::Desktop)
    }

    pub fn client(&self) -> &Arc<MockSignClient> {
        &self.factory.client
    }

    /// Creates the sign client so sessions can be looked up.
    pub async fn init(&self) -> &Self {
        self.wallet.init().await.unwrap();
        self
    }
}

/// A Keplr-shaped extension provider that records calls.
#[derive(Debug)]
pub struct MockKeplr {
    pub key: Mutex<ProviderResult<Key>>,
    pub enabled: Mutex<Vec<String>>,
    pub suggested: Mutex<Vec<ChainInfo>>,
    pub events: Option<Arc<EventEmitter<String, ()>>>,
}

impl MockKeplr {
    pub fn new(key: Key) -> Self {
        Self {
            key: Mutex::new(Ok(key)),
            enabled: Default::default(),
            suggested: Default::default(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventEmitter<String, ()>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn failing(message: &str) -> Self {
        let provider = Self::new(Key::default());
        *provider.key.lock() = Err(ProviderError::from(message));
        provider
    }
}

#[async_trait]
impl KeplrProvider for MockKeplr {
    async fn enable(&self, chain_ids: &[String]) -> ProviderResult<()> {
        self.enabled.lock().extend(chain_ids.iter().cloned());
        Ok(())
    }

    async fn get_key(&self, _chain_id: &str) -> ProviderResult<Key> {
        self.key.lock().clone()
    }

    async fn sign_direct(
        &self,
        _chain_id: &str,
        _signer: &str,
        sign_doc: SignDoc,
    ) -> ProviderResult<DirectSignResponse> {
        Ok(DirectSignResponse { signed: sign_doc, signature: signature() })
    }

    async fn sign_amino(
        &self,
        _chain_id: &str,
        _signer: &str,
        sign_doc: StdSignDoc,
    ) -> ProviderResult<AminoSignResponse> {
        Ok(AminoSignResponse { signed: sign_doc, signature: signature() })
    }

    async fn experimental_suggest_chain(&self, chain_info: &ChainInfo) -> ProviderResult<()> {
        self.suggested.lock().push(chain_info.clone());
        Ok(())
    }

    fn events(&self) -> Option<Arc<dyn EventTarget>> {
        self.events.clone().map(|events| events as Arc<dyn EventTarget>)
    }
}

#[derive(Debug, Default)]
pub struct MockVectis {
    pub key: VectisKey,
    pub suggested: Mutex<Vec<VectisChainInfo>>,
}

#[async_trait]
impl VectisProvider for MockVectis {
    async fn enable(&self, _chain_ids: &[String]) -> ProviderResult<()> {
        Ok(())
    }

    async fn get_key(&self, _chain_id: &str) -> ProviderResult<VectisKey> {
        Ok(self.key.clone())
    }

    async fn sign_direct(
        &self,
        _signer: &str,
        sign_doc: SignDoc,
    ) -> ProviderResult<DirectSignResponse> {
        Ok(DirectSignResponse { signed: sign_doc, signature: signature() })
    }

    async fn sign_amino(
        &self,
        _signer: &str,
        sign_doc: StdSignDoc,
    ) -> ProviderResult<AminoSignResponse> {
        Ok(AminoSignResponse { signed: sign_doc, signature: signature() })
    }

    async fn suggest_chains(&self, chains: &[VectisChainInfo]) -> ProviderResult<()> {
        self.suggested.lock().extend(chains.iter().cloned());
        Ok(())
    }
}

/// Counts how often a reconnect callback ran.
pub fn reconnect_counter() -> (Arc<AtomicUsize>, wallet_bridge_wallets::ReconnectCallback) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let callback: wallet_bridge_wallets::ReconnectCallback = Arc::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}
