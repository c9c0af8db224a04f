//! Normalized key, sign-doc and chain types shared by every adapter.

use serde::{Deserialize, Serialize};

/// A wallet's identity on one chain, normalized across providers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Key {
    /// Raw address bytes.
    pub address: Vec<u8>,
    /// Signing algorithm tag, e.g. `secp256k1`.
    pub algo: String,
    pub bech32_address: String,
    /// Display name. Empty when the transport does not carry it.
    pub name: String,
    /// Raw public key bytes.
    pub pub_key: Vec<u8>,
    pub is_keystone: bool,
    /// Set for hardware devices that can only sign amino documents.
    pub is_nano_ledger: bool,
}

/// Account entry exposed by offline signers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountData {
    pub address: String,
    pub algo: String,
    pub pubkey: Vec<u8>,
}

impl From<&Key> for AccountData {
    fn from(key: &Key) -> Self {
        Self {
            address: key.bech32_address.clone(),
            algo: key.algo.clone(),
            pubkey: key.pub_key.clone(),
        }
    }
}

/// Protobuf sign document for direct signing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignDoc {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    pub chain_id: String,
    pub account_number: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    pub pub_key: PubKey,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectSignResponse {
    /// The document that was actually signed. Wallets may adjust fees or memo.
    pub signed: SignDoc,
    pub signature: StdSignature,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    pub gas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granter: Option<String>,
}

/// Amino JSON sign document.
///
/// Messages are passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignDoc {
    pub chain_id: String,
    pub account_number: String,
    pub sequence: String,
    pub fee: StdFee,
    pub msgs: Vec<serde_json::Value>,
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_height: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AminoSignResponse {
    pub signed: StdSignDoc,
    pub signature: StdSignature,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub coin_denom: String,
    pub coin_minimal_denom: String,
    pub coin_decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_gecko_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bip44 {
    pub coin_type: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bech32Config {
    pub bech32_prefix_acc_addr: String,
    pub bech32_prefix_acc_pub: String,
    pub bech32_prefix_val_addr: String,
    pub bech32_prefix_val_pub: String,
    pub bech32_prefix_cons_addr: String,
    pub bech32_prefix_cons_pub: String,
}

impl Bech32Config {
    /// Derives the standard cosmos-sdk prefixes from the account prefix.
    pub fn from_prefix(prefix: &str) -> Self {
        Self {
            bech32_prefix_acc_addr: prefix.to_string(),
            bech32_prefix_acc_pub: format!("{prefix}pub"),
            bech32_prefix_val_addr: format!("{prefix}valoper"),
            bech32_prefix_val_pub: format!("{prefix}valoperpub"),
            bech32_prefix_cons_addr: format!("{prefix}valcons"),
            bech32_prefix_cons_pub: format!("{prefix}valconspub"),
        }
    }
}

/// Chain description handed to `experimental_suggest_chain`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc: String,
    pub rest: String,
    pub bip44: Bip44,
    pub bech32_config: Bech32Config,
    pub currencies: Vec<Currency>,
    pub fee_currencies: Vec<Currency>,
    pub stake_currency: Currency,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}
