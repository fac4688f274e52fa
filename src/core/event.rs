//! ProviderEvent - internal vocabulary the relay feeds into the store

/// One provider-side change, consumed exactly once by the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Active account is now this (lowercase) address
    AccountsChanged(String),
    /// Provider switched network; id in the provider's native encoding
    ChainChanged(String),
    /// No account is exposed anymore
    Disconnected,
}

impl ProviderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::AccountsChanged(_) => "accounts-changed",
            ProviderEvent::ChainChanged(_) => "chain-changed",
            ProviderEvent::Disconnected => "disconnected",
        }
    }
}
