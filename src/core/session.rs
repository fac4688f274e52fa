//! SessionState - the one shared snapshot of the wallet connection
//!
//! The transition function is pure: `SessionState::apply` returns the next
//! snapshot and never mutates in place. The store owns the only live copy.

use super::event::ProviderEvent;
use serde::{Deserialize, Serialize};

/// Snapshot of the wallet session.
///
/// Invariants: `connected == address.is_some()`, and `installed == false`
/// implies `connected == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub connected: bool,
    pub address: Option<String>,
    pub installed: bool,
    pub chain_id: Option<String>,
}

impl SessionState {
    /// No provider: nothing can ever connect.
    pub fn not_installed() -> Self {
        Self::default()
    }

    /// Build the state a fresh probe observed.
    ///
    /// Only the first account counts; a missing provider forces the
    /// disconnected shape whatever the reads returned.
    pub fn probed(installed: bool, accounts: &[String], chain_id: Option<String>) -> Self {
        if !installed {
            return Self::not_installed();
        }
        let address = accounts.first().map(|a| a.to_ascii_lowercase());
        Self {
            connected: address.is_some(),
            address,
            installed,
            chain_id,
        }
    }

    /// Next snapshot after `event`.
    pub fn apply(&self, event: &ProviderEvent) -> Self {
        match event {
            ProviderEvent::AccountsChanged(address) => Self {
                connected: true,
                address: Some(address.to_ascii_lowercase()),
                installed: self.installed,
                chain_id: self.chain_id.clone(),
            },
            ProviderEvent::ChainChanged(chain_id) => Self {
                chain_id: Some(chain_id.clone()),
                ..self.clone()
            },
            ProviderEvent::Disconnected => Self {
                connected: false,
                address: None,
                installed: self.installed,
                chain_id: None,
            },
        }
    }

    /// Authoritative connected snapshot pushed after a successful connect.
    pub fn with_connection(&self, address: &str, chain_id: Option<String>) -> Self {
        Self {
            connected: true,
            address: Some(address.to_ascii_lowercase()),
            installed: self.installed,
            chain_id,
        }
    }

    /// Both invariants hold
    pub fn is_consistent(&self) -> bool {
        self.connected == self.address.is_some() && (self.installed || !self.connected)
    }
}
