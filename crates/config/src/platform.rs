use serde::{Deserialize, Serialize};

/// The platform the host application runs on.
///
/// Mobile platforms reach remote wallets through deep links instead of a pairing modal.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Platform {
    #[default]
    Desktop,
    Ios,
    Android,
}

impl Platform {
    /// Returns `true` for iOS and Android.
    pub const fn is_mobile(self) -> bool {
        matches!(self, Self::Ios | Self::Android)
    }
}
