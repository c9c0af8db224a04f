//! Deep links that bring a mobile wallet app to the foreground.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use wallet_bridge_config::Platform;

/// Characters escaped in a pairing URI placed in a deep-link query.
///
/// Everything but ASCII alphanumerics and `- _ . ! ~ * ' ( )`.
pub(crate) const URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Opens URLs in the host's current browsing context.
pub trait Navigator: Send + Sync + fmt::Debug {
    fn open(&self, url: &str);
}

/// A vendor app's URL scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeepLink {
    pub scheme: &'static str,
    pub path: &'static str,
    /// Android package the intent suffix targets.
    pub android_package: &'static str,
}

impl DeepLink {
    pub const KEPLR: Self =
        Self { scheme: "keplrwallet", path: "wcV2", android_package: "com.chainapsis.keplr" };

    pub const LEAP: Self =
        Self { scheme: "leapcosmos", path: "wcV2", android_package: "io.leapwallet.cosmos" };

    pub const COSMOSTATION: Self =
        Self { scheme: "cosmostation", path: "wc", android_package: "wannabit.io.cosmostaion" };

    /// Formats the link for `platform`, carrying `uri` when pairing.
    ///
    /// Returns `None` on desktop.
    pub fn format(&self, platform: Platform, uri: Option<&str>) -> Option<String> {
        let mut url = format!("{}://{}", self.scheme, self.path);
        if let Some(uri) = uri {
            url.push('?');
            url.extend(utf8_percent_encode(uri, URI_COMPONENT_SET));
        }
        match platform {
            Platform::Desktop => return None,
            Platform::Ios => {}
            Platform::Android => {
                url.push_str(&format!(
                    "#Intent;package={};scheme={};end;",
                    self.android_package, self.scheme
                ));
            }
        }
        Some(url)
    }
}

/// Opens the wallet app for `deep_link`, passing `uri` if any.
///
/// Does nothing outside mobile platforms or without a configured link.
pub fn redirect(
    navigator: &dyn Navigator,
    platform: Platform,
    deep_link: Option<&DeepLink>,
    uri: Option<&str>,
) {
    let Some(deep_link) = deep_link else { return };
    let Some(url) = deep_link.format(platform, uri) else { return };
    debug!(scheme = deep_link.scheme, %platform, "redirecting to wallet app");
    navigator.open(&url);
}
