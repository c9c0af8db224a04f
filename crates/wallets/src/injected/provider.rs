//! Contracts of the providers browser extensions inject into the page.

use crate::{
    events::EventTarget,
    types::{
        AminoSignResponse, Bip44, ChainInfo, Currency, DirectSignResponse, Key, SignDoc,
        StdSignDoc,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// A failure reported by an injected provider.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl From<&str> for ProviderError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for ProviderError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// The Keplr-compatible provider shape shared by most cosmos extensions.
#[async_trait]
pub trait KeplrProvider: Send + Sync + fmt::Debug {
    async fn enable(&self, chain_ids: &[String]) -> ProviderResult<()>;

    async fn get_key(&self, chain_id: &str) -> ProviderResult<Key>;

    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: SignDoc,
    ) -> ProviderResult<DirectSignResponse>;

    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: StdSignDoc,
    ) -> ProviderResult<AminoSignResponse>;

    async fn experimental_suggest_chain(&self, chain_info: &ChainInfo) -> ProviderResult<()>;

    /// Event target of the provider object itself, for vendors that dispatch change events
    /// there instead of on the window.
    fn events(&self) -> Option<Arc<dyn EventTarget>> {
        None
    }
}

/// Key as returned by the Vectis extension. Carries no raw address bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VectisKey {
    pub name: String,
    pub algo: String,
    pub pub_key: Vec<u8>,
    /// Bech32 address.
    pub address: String,
    pub is_nano_ledger: bool,
    pub is_vectis_account: bool,
}

/// Chain description in the shape Vectis expects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectisChainInfo {
    pub chain_id: String,
    pub pretty_name: String,
    pub rpc_url: String,
    pub rest_url: String,
    pub bech32_prefix: String,
    pub bip44: Bip44,
    pub currencies: Vec<Currency>,
    pub fee_tokens: Vec<Currency>,
    pub stake_token: Currency,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl From<&ChainInfo> for VectisChainInfo {
    fn from(info: &ChainInfo) -> Self {
        Self {
            chain_id: info.chain_id.clone(),
            pretty_name: info.chain_name.clone(),
            rpc_url: info.rpc.clone(),
            rest_url: info.rest.clone(),
            bech32_prefix: info.bech32_config.bech32_prefix_acc_addr.clone(),
            bip44: info.bip44.clone(),
            currencies: info.currencies.clone(),
            fee_tokens: info.fee_currencies.clone(),
            stake_token: info.stake_currency.clone(),
            features: info.features.clone(),
        }
    }
}

/// The provider injected by the Vectis extension.
#[async_trait]
pub trait VectisProvider: Send + Sync + fmt::Debug {
    async fn enable(&self, chain_ids: &[String]) -> ProviderResult<()>;

    async fn get_key(&self, chain_id: &str) -> ProviderResult<VectisKey>;

    async fn sign_direct(&self, signer: &str, sign_doc: SignDoc)
    -> ProviderResult<DirectSignResponse>;

    async fn sign_amino(&self, signer: &str, sign_doc: StdSignDoc)
    -> ProviderResult<AminoSignResponse>;

    async fn suggest_chains(&self, chains: &[VectisChainInfo]) -> ProviderResult<()>;
}
