//! Text encodings for binary sign-doc fields sent over the relay.

use crate::error::EncodingError;
use base64::{Engine, engine::general_purpose::STANDARD};

/// How a remote wallet expects binary fields to be represented in JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Encoding {
    #[default]
    Base64,
    Hex,
}

impl Encoding {
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64 => STANDARD.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }

    pub fn decode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        Ok(match self {
            Self::Base64 => STANDARD.decode(text)?,
            Self::Hex => hex::decode(text.strip_prefix("0x").unwrap_or(text))?,
        })
    }
}

/// Decodes the data part of a bech32 address.
///
/// An empty address yields empty bytes; providers that expose no address at all are mapped
/// through this placeholder.
pub fn bech32_data(address: &str) -> Result<Vec<u8>, EncodingError> {
    if address.is_empty() {
        return Ok(Vec::new());
    }
    bech32::decode(address)
        .map(|(_, data)| data)
        .map_err(|source| EncodingError::Bech32 { address: address.to_string(), source })
}
