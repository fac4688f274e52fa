//! Wallet configuration - passed from higher layers

use crate::core::methods::injected;
use serde::Deserialize;

/// Session configuration. Higher layers construct this.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalletConfig {
    /// Reload the host page when the provider switches chain
    pub reload_on_chain_change: bool,
    /// `window` property holding the injected provider
    pub provider_key: String,
    /// Boolean property that marks a compatible provider
    pub capability_marker: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            reload_on_chain_change: true,
            provider_key: injected::PROVIDER_KEY.into(),
            capability_marker: injected::CAPABILITY_MARKER.into(),
        }
    }
}

impl WalletConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_reload_on_chain_change(mut self, reload: bool) -> Self { self.reload_on_chain_change = reload; self }
    pub fn with_provider_key(mut self, key: impl Into<String>) -> Self { self.provider_key = key.into(); self }
    pub fn with_capability_marker(mut self, marker: impl Into<String>) -> Self { self.capability_marker = marker.into(); self }

    /// Defaults overridden by `WALLETSYNC_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(reload) = std::env::var("WALLETSYNC_RELOAD_ON_CHAIN_CHANGE").ok().and_then(|v| parse_flag(&v)) {
            config.reload_on_chain_change = reload;
        }
        if let Ok(key) = std::env::var("WALLETSYNC_PROVIDER_KEY") {
            if !key.trim().is_empty() {
                config.provider_key = key.trim().to_string();
            }
        }
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
