use crate::error::{Result, WalletError};
use std::str::FromStr;

/// Every wallet the registry can hand out.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum WalletType {
    Keplr,
    Leap,
    Cosmostation,
    Compass,
    Xdefi,
    Vectis,
    #[strum(to_string = "walletconnect", serialize = "wallet-connect")]
    WalletConnect,
    WcKeplrMobile,
    WcLeapMobile,
    WcCosmostationMobile,
}

impl WalletType {
    /// Parses a wallet identifier, accepting kebab-case or snake_case in any letter case.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(&name.trim().replace('_', "-"))
            .map_err(|_| WalletError::UnknownWalletType(name.to_string()))
    }

    /// Returns `true` for wallets reached through the relay protocol.
    pub const fn is_walletconnect(self) -> bool {
        matches!(
            self,
            Self::WalletConnect
                | Self::WcKeplrMobile
                | Self::WcLeapMobile
                | Self::WcCosmostationMobile
        )
    }
}
