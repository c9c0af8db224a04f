//! The relay sign-client contract and its wire types.
//!
//! See <https://specs.walletconnect.com/2.0/specs/clients/sign/data-structures>

use crate::{
    error::RelayError,
    events::{Handler, ListenerId},
};
use async_trait::async_trait;
use derive_builder::Builder;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};
use wallet_bridge_config::{AppMetadata, WalletConnectConfig};

/// The CAIP-2 namespace used for every cosmos chain.
pub const COSMOS_NAMESPACE: &str = "cosmos";

/// Session request methods.
pub mod methods {
    pub const GET_ACCOUNTS: &str = "cosmos_getAccounts";
    pub const SIGN_DIRECT: &str = "cosmos_signDirect";
    pub const SIGN_AMINO: &str = "cosmos_signAmino";

    pub const ALL: [&str; 3] = [GET_ACCOUNTS, SIGN_AMINO, SIGN_DIRECT];
}

/// Session event names.
pub mod events {
    pub const CHAIN_CHANGED: &str = "chainChanged";
    pub const ACCOUNTS_CHANGED: &str = "accountsChanged";

    pub const ALL: [&str; 2] = [CHAIN_CHANGED, ACCOUNTS_CHANGED];
}

/// Returns the CAIP-2 identifier `cosmos:<chain_id>`.
pub fn caip2(chain_id: &str) -> String {
    format!("{COSMOS_NAMESPACE}:{chain_id}")
}

/// Options used to construct a sign client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder)]
#[builder(setter(into), default)]
pub struct SignClientOptions {
    pub project_id: String,
    pub relay_url: Option<String>,
    pub metadata: AppMetadata,
}

impl From<&WalletConnectConfig> for SignClientOptions {
    fn from(config: &WalletConnectConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            relay_url: config.relay_url.clone(),
            metadata: config.metadata.clone(),
        }
    }
}

impl SignClientOptions {
    pub fn builder() -> SignClientOptionsBuilder {
        SignClientOptionsBuilder::default()
    }

    /// Whether a non-empty relay project identifier is present.
    pub fn has_project_id(&self) -> bool {
        !self.project_id.trim().is_empty()
    }
}

/// Namespace requested in a pairing proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalNamespace {
    pub chains: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

impl ProposalNamespace {
    /// The cosmos namespace for `chain_id` with every method and event this crate uses.
    pub fn cosmos(chain_id: &str) -> Self {
        Self {
            chains: vec![caip2(chain_id)],
            methods: methods::ALL.iter().map(|m| m.to_string()).collect(),
            events: events::ALL.iter().map(|e| e.to_string()).collect(),
        }
    }
}

pub type RequiredNamespaces = BTreeMap<String, ProposalNamespace>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub required_namespaces: RequiredNamespaces,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<String>,
}

/// Namespace granted in a settled session. Accounts are CAIP-10 strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNamespace {
    pub accounts: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<String>,
    pub namespaces: BTreeMap<String, SessionNamespace>,
    /// Unix timestamp in seconds.
    pub expiry: u64,
}

impl Session {
    /// Whether any granted account lives on `chain_id`.
    pub fn includes_chain(&self, chain_id: &str) -> bool {
        let prefix = format!("{}:", caip2(chain_id));
        self.namespaces
            .values()
            .flat_map(|ns| ns.accounts.iter())
            .any(|account| account.starts_with(&prefix))
    }

    /// Whether the session expires within one second of `now_ms`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expiry.saturating_mul(1000) <= now_ms.saturating_add(1000)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub topic: String,
    pub active: bool,
    pub expiry: u64,
}

/// Resolves once the remote wallet approves or rejects the proposal.
pub type Approval = BoxFuture<'static, Result<Session, RelayError>>;

/// The outcome of a connect call: a pairing URI to present and the pending approval.
pub struct PendingSession {
    pub uri: Option<String>,
    pub approval: Approval,
}

impl fmt::Debug for PendingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSession").field("uri", &self.uri).finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub topic: String,
    /// CAIP-2 chain identifier.
    pub chain_id: String,
    pub request: RequestArguments,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    pub params: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectReason {
    pub code: i64,
    pub message: String,
}

impl DisconnectReason {
    pub const USER_DISCONNECTED_CODE: i64 = 6000;

    pub fn user_disconnected() -> Self {
        Self { code: Self::USER_DISCONNECTED_CODE, message: "User disconnected.".to_string() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RelayEventKind {
    SessionDelete,
    SessionExpire,
    SessionEvent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEventData {
    pub name: String,
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    SessionDelete { topic: String },
    SessionExpire { topic: String },
    SessionEvent { topic: String, chain_id: String, event: SessionEventData },
}

impl RelayEvent {
    pub fn kind(&self) -> RelayEventKind {
        match self {
            Self::SessionDelete { .. } => RelayEventKind::SessionDelete,
            Self::SessionExpire { .. } => RelayEventKind::SessionExpire,
            Self::SessionEvent { .. } => RelayEventKind::SessionEvent,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Self::SessionDelete { topic }
            | Self::SessionExpire { topic }
            | Self::SessionEvent { topic, .. } => topic,
        }
    }
}

/// The relay protocol client.
///
/// The client owns every session and pairing; adapters only read them and dispatch through
/// them.
#[async_trait]
pub trait SignClient: Send + Sync + fmt::Debug {
    /// Proposes a session for `params.required_namespaces`.
    async fn connect(&self, params: ConnectParams) -> Result<PendingSession, RelayError>;

    /// Sends a request over a session topic and returns the method-specific result.
    async fn request(&self, request: SessionRequest) -> Result<Value, RelayError>;

    async fn disconnect(&self, topic: &str, reason: DisconnectReason) -> Result<(), RelayError>;

    /// Every live session, oldest first.
    fn sessions(&self) -> Vec<Session>;

    fn pairings(&self) -> Vec<Pairing>;

    async fn delete_pairing(&self, topic: &str, reason: DisconnectReason)
    -> Result<(), RelayError>;

    fn on(&self, kind: RelayEventKind, handler: Handler<RelayEvent>) -> ListenerId;

    fn off(&self, kind: RelayEventKind, id: ListenerId) -> bool;
}

/// Creates sign clients from options.
#[async_trait]
pub trait SignClientFactory: Send + Sync + fmt::Debug {
    async fn create(&self, options: &SignClientOptions) -> Result<Arc<dyn SignClient>, RelayError>;
}
