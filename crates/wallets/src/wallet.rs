use crate::{
    WalletType,
    error::Result,
    events::{ReconnectCallback, Subscription},
    types::{
        AccountData, AminoSignResponse, ChainInfo, DirectSignResponse, Key, SignDoc, StdSignDoc,
    },
};
use async_trait::async_trait;
use std::fmt;

/// The capability contract every adapter implements.
///
/// Offline signers over any wallet are built through
/// [`WalletSignerExt`](crate::WalletSignerExt).
#[async_trait]
pub trait Wallet: Send + Sync + fmt::Debug {
    /// The registry identifier this adapter was created for.
    fn wallet_type(&self) -> WalletType;

    /// Asks the wallet to authorize `chain_id`.
    async fn enable(&self, chain_id: &str) -> Result<()>;

    async fn get_key(&self, chain_id: &str) -> Result<Key>;

    /// Lists the accounts the offline signers expose.
    async fn get_accounts(&self, chain_id: &str) -> Result<Vec<AccountData>> {
        let key = self.get_key(chain_id).await?;
        Ok(vec![AccountData::from(&key)])
    }

    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: SignDoc,
    ) -> Result<DirectSignResponse>;

    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse>;

    /// Asks the wallet to add a chain it does not know yet.
    async fn experimental_suggest_chain(&self, chain_info: &ChainInfo) -> Result<()>;

    /// Watches for account changes.
    ///
    /// When the wallet reports one, local session state is cleared and `reconnect` runs.
    fn subscription(&self, reconnect: ReconnectCallback) -> Subscription;

    /// Tears down the connection and clears local session state.
    async fn disconnect(&self) -> Result<()>;
}
