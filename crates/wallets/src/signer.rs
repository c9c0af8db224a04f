//! Offline signers bound to one wallet and chain.

use crate::{
    Wallet,
    error::Result,
    types::{AccountData, AminoSignResponse, DirectSignResponse, SignDoc, StdSignDoc},
};
use async_trait::async_trait;
use std::sync::Arc;

macro_rules! offline_signer {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug)]
        pub struct $name<W: ?Sized = dyn Wallet> {
            wallet: Arc<W>,
            chain_id: String,
        }

        impl<W: ?Sized> Clone for $name<W> {
            fn clone(&self) -> Self {
                Self { wallet: self.wallet.clone(), chain_id: self.chain_id.clone() }
            }
        }

        impl<W: Wallet + ?Sized> $name<W> {
            pub fn new(wallet: Arc<W>, chain_id: impl Into<String>) -> Self {
                Self { wallet, chain_id: chain_id.into() }
            }

            pub fn chain_id(&self) -> &str {
                &self.chain_id
            }

            pub async fn get_accounts(&self) -> Result<Vec<AccountData>> {
                self.wallet.get_accounts(&self.chain_id).await
            }
        }
    };
}

macro_rules! sign_direct {
    ($name:ident) => {
        impl<W: Wallet + ?Sized> $name<W> {
            pub async fn sign_direct(
                &self,
                signer: &str,
                sign_doc: SignDoc,
            ) -> Result<DirectSignResponse> {
                self.wallet.sign_direct(&self.chain_id, signer, sign_doc).await
            }
        }
    };
}

macro_rules! sign_amino {
    ($name:ident) => {
        impl<W: Wallet + ?Sized> $name<W> {
            pub async fn sign_amino(
                &self,
                signer: &str,
                sign_doc: StdSignDoc,
            ) -> Result<AminoSignResponse> {
                self.wallet.sign_amino(&self.chain_id, signer, sign_doc).await
            }
        }
    };
}

offline_signer!(
    /// Signs in both direct and amino modes.
    OfflineSigner
);
offline_signer!(
    /// Signs protobuf documents only.
    OfflineDirectSigner
);
offline_signer!(
    /// Signs amino JSON documents only, as hardware wallets require.
    OfflineAminoSigner
);

sign_direct!(OfflineSigner);
sign_amino!(OfflineSigner);
sign_direct!(OfflineDirectSigner);
sign_amino!(OfflineAminoSigner);

/// The signer picked by [`WalletSignerExt::get_offline_signer_auto`].
#[derive(Debug)]
pub enum AutoSigner<W: ?Sized = dyn Wallet> {
    Amino(OfflineAminoSigner<W>),
    Direct(OfflineDirectSigner<W>),
}

impl<W: ?Sized> Clone for AutoSigner<W> {
    fn clone(&self) -> Self {
        match self {
            Self::Amino(signer) => Self::Amino(signer.clone()),
            Self::Direct(signer) => Self::Direct(signer.clone()),
        }
    }
}

impl<W: Wallet + ?Sized> AutoSigner<W> {
    pub fn is_amino_only(&self) -> bool {
        matches!(self, Self::Amino(_))
    }

    pub async fn get_accounts(&self) -> Result<Vec<AccountData>> {
        match self {
            Self::Amino(signer) => signer.get_accounts().await,
            Self::Direct(signer) => signer.get_accounts().await,
        }
    }
}

/// Builds offline signers over a shared wallet.
#[async_trait]
pub trait WalletSignerExt {
    type Target: Wallet + ?Sized;

    fn get_offline_signer(&self, chain_id: &str) -> OfflineSigner<Self::Target>;

    fn get_offline_signer_direct(&self, chain_id: &str) -> OfflineDirectSigner<Self::Target>;

    fn get_offline_signer_only_amino(&self, chain_id: &str) -> OfflineAminoSigner<Self::Target>;

    /// Picks the amino-only signer for ledger keys and the direct signer otherwise.
    async fn get_offline_signer_auto(&self, chain_id: &str) -> Result<AutoSigner<Self::Target>>;
}

#[async_trait]
impl<W: Wallet + ?Sized> WalletSignerExt for Arc<W> {
    type Target = W;

    fn get_offline_signer(&self, chain_id: &str) -> OfflineSigner<W> {
        OfflineSigner::new(self.clone(), chain_id)
    }

    fn get_offline_signer_direct(&self, chain_id: &str) -> OfflineDirectSigner<W> {
        OfflineDirectSigner::new(self.clone(), chain_id)
    }

    fn get_offline_signer_only_amino(&self, chain_id: &str) -> OfflineAminoSigner<W> {
        OfflineAminoSigner::new(self.clone(), chain_id)
    }

    async fn get_offline_signer_auto(&self, chain_id: &str) -> Result<AutoSigner<W>> {
        let key = self.get_key(chain_id).await?;
        if key.is_nano_ledger {
            trace!(chain_id, "ledger key, using amino-only signer");
            Ok(AutoSigner::Amino(self.get_offline_signer_only_amino(chain_id)))
        } else {
            Ok(AutoSigner::Direct(self.get_offline_signer_direct(chain_id)))
        }
    }
}
