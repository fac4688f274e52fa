//! WalletSession - process root owning one of every component
//!
//! ```text
//! WalletSession
//!   ├── ProviderHandle ── Rc<dyn Provider>
//!   ├── RequestGateway ── connect / accounts / chain id / sign / send
//!   ├── SessionStore ──── SubscriptionHub ──▶ ObserverAdapter, ...
//!   └── EventRelay ────── accountsChanged / chainChanged / disconnect
//! ```
//!
//! Construct one per page (or process) and hand it to whatever needs wallet
//! state; there is no global instance.

use crate::config::WalletConfig;
use crate::core::error::{WalletError, WalletResult};
use crate::core::event::ProviderEvent;
use crate::core::request::{SignRequest, TransactionRequest};
use crate::core::session::SessionState;
use crate::gateway::RequestGateway;
use crate::hub::{Subscription, SubscriptionHub};
use crate::observer::ObserverAdapter;
use crate::provider::{Provider, ProviderHandle};
use crate::relay::{EventRelay, HeadlessHost, Host};
use crate::store::SessionStore;
use futures::channel::mpsc;
use std::rc::Rc;
use tracing::info;

pub struct WalletSession {
    config: WalletConfig,
    gateway: RequestGateway,
    store: Rc<SessionStore>,
    relay: Rc<EventRelay>,
}

impl WalletSession {
    /// Probe the provider, build the store, then start relaying events
    pub async fn new(provider: Option<Rc<dyn Provider>>, host: Rc<dyn Host>, config: WalletConfig) -> Self {
        let handle = ProviderHandle::new(provider);
        let gateway = RequestGateway::new(handle.clone());
        let store = Rc::new(SessionStore::initialize(&gateway, SubscriptionHub::new()).await);
        let relay = EventRelay::new(handle, store.clone(), host, &config);
        let listeners = relay.attach();
        info!(listeners, "wallet session ready");
        Self { config, gateway, store, relay }
    }

    /// Session with default config and no page to reload
    pub async fn headless(provider: Option<Rc<dyn Provider>>) -> Self {
        Self::new(provider, Rc::new(HeadlessHost::new()), WalletConfig::default()).await
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn store(&self) -> &Rc<SessionStore> {
        &self.store
    }

    pub fn is_installed(&self) -> bool {
        self.gateway.is_installed()
    }

    pub fn snapshot(&self) -> SessionState {
        self.store.snapshot()
    }

    pub fn subscribe(&self, callback: impl Fn(&SessionState) + 'static) -> Subscription {
        self.store.subscribe(callback)
    }

    pub fn watch(&self) -> mpsc::UnboundedReceiver<SessionState> {
        self.store.watch()
    }

    /// New observer with its own connect attempt state
    pub async fn observe(&self) -> ObserverAdapter {
        ObserverAdapter::attach(self.gateway.clone(), self.store.clone()).await
    }

    /// Connect and push the granted account plus current chain into the store
    pub async fn connect(&self) -> WalletResult<String> {
        let address = self.gateway.connect().await?;
        let chain_id = self.gateway.get_chain_id().await;
        self.store.reconcile(&address, chain_id);
        Ok(address)
    }

    /// Clear the connection locally; the provider is not contacted
    pub fn disconnect(&self) {
        self.store.apply(&ProviderEvent::Disconnected);
    }

    /// Sign `message` with the connected account
    pub async fn sign_message(&self, message: &str) -> WalletResult<String> {
        if !self.is_installed() {
            return Err(WalletError::ProviderNotInstalled);
        }
        let address = self
            .snapshot()
            .address
            .ok_or_else(|| WalletError::SigningFailed("no connected account".into()))?;
        self.gateway.sign_message(&SignRequest::new(message, address)).await
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> WalletResult<String> {
        self.gateway.send_transaction(tx).await
    }

    /// Stop relaying provider events
    pub fn close(&self) {
        self.relay.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::methods::{events, rpc};
    use crate::provider::MemoryProvider;

    async fn session(provider: &MemoryProvider) -> WalletSession {
        WalletSession::headless(Some(Rc::new(provider.clone()))).await
    }

    #[tokio::test]
    async fn sign_uses_connected_address() {
        let provider = MemoryProvider::new().with_accounts(&["0xabc"]);
        let session = session(&provider).await;
        assert_eq!(session.sign_message("hi").await.unwrap(), "0x6869");
        let call = provider.calls().pop().unwrap();
        assert_eq!(call.method, rpc::PERSONAL_SIGN);
        assert_eq!(call.params[1], "0xabc");
    }

    #[tokio::test]
    async fn sign_without_account_never_calls_provider() {
        let provider = MemoryProvider::new();
        let session = session(&provider).await;
        let calls = provider.calls().len();
        assert!(matches!(session.sign_message("hi").await, Err(WalletError::SigningFailed(_))));
        assert_eq!(provider.calls().len(), calls);

        let absent = WalletSession::headless(None).await;
        assert_eq!(absent.sign_message("hi").await, Err(WalletError::ProviderNotInstalled));
    }

    #[tokio::test]
    async fn close_detaches_relay() {
        let provider = MemoryProvider::new();
        let session = session(&provider).await;
        assert_eq!(provider.listener_count(events::DISCONNECT), 1);
        session.close();
        assert_eq!(provider.listener_count(events::DISCONNECT), 0);
    }

    #[tokio::test]
    async fn second_session_over_same_provider_does_not_double_register() {
        let provider = MemoryProvider::new();
        let first = session(&provider).await;
        let second = session(&provider).await;

        for event in events::ALL {
            assert_eq!(provider.listener_count(event), 1);
        }

        // closing the replaced session leaves the live one relaying
        first.close();
        assert_eq!(provider.listener_count(events::ACCOUNTS_CHANGED), 1);
        provider.emit_accounts_changed(&["0xabc"]);
        assert!(second.snapshot().connected);
    }

    #[tokio::test]
    async fn session_connect_reconciles_store() {
        let provider = MemoryProvider::new().with_wallet_accounts(&["0xabc"]).with_chain_id("0x1");
        let session = session(&provider).await;
        assert_eq!(session.connect().await.unwrap(), "0xabc");
        assert_eq!(session.snapshot().chain_id.as_deref(), Some("0x1"));
        session.disconnect();
        assert!(!session.snapshot().connected);
    }
}
