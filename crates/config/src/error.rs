//! Configuration extraction errors.

use crate::Platform;
use figment::providers::{Format, Toml};
use std::fmt;
use strum::IntoEnumIterator;

/// Where a rejected value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ConfigSource {
    #[strum(to_string = "wallets.toml")]
    File,
    #[strum(to_string = "environment")]
    Env,
    #[strum(to_string = "provided settings")]
    Other,
}

impl ConfigSource {
    fn of(error: &figment::Error) -> Self {
        match error.metadata.as_ref().map(|meta| meta.name.as_ref()) {
            Some(name) if name.contains(Toml::NAME) => Self::File,
            Some(name) if name.contains("environment") => Self::Env,
            _ => Self::Other,
        }
    }
}

/// One rejected setting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigIssue {
    pub source: ConfigSource,
    /// Dotted path of the setting, e.g. `timeouts.approval_ms`. `None` for the whole document.
    pub setting: Option<String>,
    pub message: String,
}

impl ConfigIssue {
    fn new(error: &figment::Error) -> Self {
        Self {
            source: ConfigSource::of(error),
            setting: (!error.path.is_empty()).then(|| error.path.join(".")),
            message: error.kind.to_string(),
        }
    }

    /// Accepted values for `platform` when serde did not already list them.
    fn hint(&self) -> Option<String> {
        if self.setting.as_deref() != Some("platform") || self.message.contains("expected one of")
        {
            return None;
        }
        let platforms: Vec<_> = Platform::iter().map(|p| format!("`{p}`")).collect();
        Some(platforms.join(", "))
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.source)?;
        if let Some(setting) = &self.setting {
            write!(f, "invalid `{setting}`: ")?;
        }
        f.write_str(&self.message)?;
        if let Some(hint) = self.hint() {
            write!(f, " (expected one of {hint})")?;
        }
        Ok(())
    }
}

/// A `BridgeConfig` could not be extracted from its layers.
///
/// Figment reports one error per rejected value and may repeat them across profiles; the
/// issues are kept once each, in report order.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("failed to extract wallet bridge config:{}", render(.issues))]
pub struct ExtractConfigError {
    issues: Vec<ConfigIssue>,
    #[source]
    error: figment::Error,
}

impl ExtractConfigError {
    pub fn new(error: figment::Error) -> Self {
        let mut issues: Vec<ConfigIssue> = Vec::with_capacity(error.count());
        for err in error.clone() {
            let issue = ConfigIssue::new(&err);
            if !issues.contains(&issue) {
                issues.push(issue);
            }
        }
        Self { issues, error }
    }

    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    /// Whether `setting` (a dotted path) was among the rejected values.
    pub fn rejects(&self, setting: &str) -> bool {
        self.issues.iter().any(|issue| issue.setting.as_deref() == Some(setting))
    }
}

fn render(issues: &[ConfigIssue]) -> String {
    issues.iter().map(|issue| format!("\n  - {issue}")).collect()
}
