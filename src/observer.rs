//! ObserverAdapter - one consumer's live view of the session
//!
//! Each adapter keeps its own `ConnectAttempt` (`connecting` / `error`).
//! Those fields never reach the shared store; two adapters connecting at
//! once each see only their own attempt, and both converge on the store's
//! snapshot when either succeeds.

use crate::core::error::{WalletError, WalletResult, CONNECT_FAILED_MESSAGE};
use crate::core::event::ProviderEvent;
use crate::core::session::SessionState;
use crate::gateway::RequestGateway;
use crate::hub::Subscription;
use crate::store::SessionStore;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};

/// In-flight connect state local to one adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectAttempt {
    pub in_flight: bool,
    pub last_error: Option<String>,
}

/// Session snapshot merged with the adapter's own transient fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    #[serde(flatten)]
    pub session: SessionState,
    pub connecting: bool,
    pub error: Option<String>,
}

pub struct ObserverAdapter {
    gateway: RequestGateway,
    store: Rc<SessionStore>,
    view: Rc<RefCell<SessionState>>,
    attempt: RefCell<ConnectAttempt>,
    /// Connect calls on this adapter not yet finished
    pending: Cell<usize>,
    subscription: Subscription,
}

impl ObserverAdapter {
    /// Subscribe, then probe the provider directly for the initial view.
    ///
    /// The subscription goes in first so no event can slip between probe and
    /// registration; if one arrives while the probe is pending, it wins.
    pub async fn attach(gateway: RequestGateway, store: Rc<SessionStore>) -> Self {
        let view = Rc::new(RefCell::new(store.snapshot()));
        let delivered = Rc::new(Cell::new(false));
        let subscription = {
            let (view, delivered) = (view.clone(), delivered.clone());
            store.subscribe(move |snapshot| {
                *view.borrow_mut() = snapshot.clone();
                delivered.set(true);
            })
        };

        let accounts = gateway.get_accounts().await;
        let chain_id = gateway.get_chain_id().await;
        if !delivered.get() {
            *view.borrow_mut() = SessionState::probed(gateway.is_installed(), &accounts, chain_id);
        }
        debug!(connected = view.borrow().connected, "observer attached");

        Self {
            gateway,
            store,
            view,
            attempt: RefCell::new(ConnectAttempt::default()),
            pending: Cell::new(0),
            subscription,
        }
    }

    /// Latest session snapshot this adapter saw
    pub fn snapshot(&self) -> SessionState {
        self.view.borrow().clone()
    }

    pub fn connecting(&self) -> bool {
        self.attempt.borrow().in_flight
    }

    pub fn error(&self) -> Option<String> {
        self.attempt.borrow().last_error.clone()
    }

    pub fn attempt(&self) -> ConnectAttempt {
        self.attempt.borrow().clone()
    }

    pub fn state(&self) -> ObservedState {
        let attempt = self.attempt();
        ObservedState {
            session: self.snapshot(),
            connecting: attempt.in_flight,
            error: attempt.last_error,
        }
    }

    /// Request account access and push the result into the shared store.
    ///
    /// Failures land in this adapter's `error` only, as the provider's own
    /// message. There is no timeout: a provider that never answers leaves
    /// `connecting` set. Overlapping calls keep `connecting` set until the
    /// last one finishes.
    pub async fn connect(&self) -> WalletResult<String> {
        if !self.view.borrow().installed {
            let err = WalletError::ProviderNotInstalled;
            self.attempt.borrow_mut().last_error = Some(err.reason().to_string());
            return Err(err);
        }
        self.pending.set(self.pending.get() + 1);
        {
            let mut attempt = self.attempt.borrow_mut();
            attempt.in_flight = true;
            attempt.last_error = None;
        }

        let outcome = match self.gateway.connect().await {
            Ok(address) => {
                let chain_id = self.gateway.get_chain_id().await;
                self.store.reconcile(&address, chain_id);
                Ok(address)
            }
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                let reason = match err.reason() {
                    "" => CONNECT_FAILED_MESSAGE,
                    reason => reason,
                };
                self.attempt.borrow_mut().last_error = Some(reason.to_string());
                Err(err)
            }
        };
        self.pending.set(self.pending.get() - 1);
        self.attempt.borrow_mut().in_flight = self.pending.get() > 0;
        outcome
    }

    /// Forget the connection locally. Providers have no disconnect request,
    /// so only the shared store is cleared.
    pub fn disconnect(&self) {
        self.store.apply(&ProviderEvent::Disconnected);
    }

    /// Stop following the store; the view freezes at its last snapshot
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::methods::{codes, rpc};
    use crate::hub::SubscriptionHub;
    use crate::provider::{MemoryProvider, Provider, ProviderFailure, ProviderHandle};

    async fn setup(provider: &MemoryProvider) -> (RequestGateway, Rc<SessionStore>) {
        let dyn_provider: Rc<dyn Provider> = Rc::new(provider.clone());
        let gateway = RequestGateway::new(ProviderHandle::new(Some(dyn_provider)));
        let store = Rc::new(SessionStore::initialize(&gateway, SubscriptionHub::new()).await);
        (gateway, store)
    }

    #[tokio::test]
    async fn initial_view_comes_from_direct_probe() {
        let provider = MemoryProvider::new().with_chain_id("0x1");
        let (gateway, store) = setup(&provider).await;

        // accounts authorized after the store probed, no event fired
        provider.emit_accounts_changed(&["0xabc"]);
        let observer = ObserverAdapter::attach(gateway, store.clone()).await;

        assert_eq!(observer.snapshot().address.as_deref(), Some("0xabc"));
        assert!(!store.snapshot().connected);
    }

    #[tokio::test]
    async fn connect_success_writes_shared_store() {
        let provider = MemoryProvider::new().with_wallet_accounts(&["0xabc"]).with_chain_id("0x1");
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway.clone(), store.clone()).await;
        let other = ObserverAdapter::attach(gateway, store.clone()).await;

        assert_eq!(observer.connect().await.unwrap(), "0xabc");

        let expected = SessionState {
            connected: true,
            address: Some("0xabc".into()),
            installed: true,
            chain_id: Some("0x1".into()),
        };
        assert_eq!(store.snapshot(), expected);
        assert_eq!(observer.snapshot(), expected);
        assert_eq!(other.snapshot(), expected);
        assert_eq!(observer.attempt(), ConnectAttempt::default());
    }

    #[tokio::test]
    async fn connect_failure_stays_local() {
        let provider = MemoryProvider::new().with_wallet_accounts(&["0xabc"]);
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway.clone(), store.clone()).await;
        let other = ObserverAdapter::attach(gateway, store.clone()).await;

        provider.fail_next(rpc::REQUEST_ACCOUNTS, ProviderFailure::new(codes::USER_REJECTED, "User rejected the request."));
        let err = observer.connect().await.unwrap_err();

        assert!(matches!(err, WalletError::UserRejected(_)));
        assert_eq!(observer.error().as_deref(), Some("User rejected the request."));
        assert!(!observer.connecting());
        assert_eq!(other.error(), None);
        assert!(!store.snapshot().connected);
    }

    #[tokio::test]
    async fn empty_rejection_message_falls_back() {
        let provider = MemoryProvider::new().with_wallet_accounts(&["0xabc"]);
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway, store).await;

        provider.fail_next(rpc::REQUEST_ACCOUNTS, ProviderFailure::message(""));
        assert!(matches!(observer.connect().await, Err(WalletError::ProviderError(_))));
        assert_eq!(observer.error().as_deref(), Some(CONNECT_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn overlapping_connects_stay_in_flight_until_both_finish() {
        let provider = MemoryProvider::new().with_wallet_accounts(&["0xabc"]);
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway, store).await;

        // both park; the one resumed first takes the rejection
        provider.hold(rpc::REQUEST_ACCOUNTS);
        let second = observer.connect();
        futures::pin_mut!(second);
        assert!(futures::poll!(second.as_mut()).is_pending());

        let first = observer.connect();
        futures::pin_mut!(first);
        assert!(futures::poll!(first.as_mut()).is_pending());
        assert_eq!(provider.pending_count(), 2);

        provider.release(rpc::REQUEST_ACCOUNTS);
        provider.fail_next(rpc::REQUEST_ACCOUNTS, ProviderFailure::new(codes::USER_REJECTED, "denied"));
        assert!(first.await.is_err());
        assert!(observer.connecting());
        assert_eq!(observer.error().as_deref(), Some("denied"));

        assert_eq!(second.await.unwrap(), "0xabc");
        assert!(!observer.connecting());
        assert_eq!(observer.error().as_deref(), Some("denied"));
    }

    #[tokio::test]
    async fn connect_without_provider_sets_local_error_only() {
        let provider = MemoryProvider::new().without_marker().with_wallet_accounts(&["0xabc"]);
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway, store.clone()).await;

        assert_eq!(observer.connect().await, Err(WalletError::ProviderNotInstalled));
        assert_eq!(observer.error().as_deref(), Some(crate::NOT_INSTALLED_MESSAGE));
        assert!(provider.calls().is_empty());
        assert_eq!(store.snapshot(), SessionState::not_installed());
    }

    #[tokio::test]
    async fn hung_connect_keeps_in_flight_set() {
        let provider = MemoryProvider::new().with_wallet_accounts(&["0xabc"]);
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway, store.clone()).await;
        provider.hold(rpc::REQUEST_ACCOUNTS);

        let pending = observer.connect();
        futures::pin_mut!(pending);
        assert!(futures::poll!(pending.as_mut()).is_pending());
        assert!(observer.connecting());
        assert!(observer.state().connecting);

        provider.release(rpc::REQUEST_ACCOUNTS);
        assert_eq!(pending.await.unwrap(), "0xabc");
        assert!(!observer.connecting());
    }

    #[tokio::test]
    async fn disconnect_is_local_and_shared() {
        let provider = MemoryProvider::new().with_accounts(&["0xabc"]);
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway.clone(), store.clone()).await;
        let other = ObserverAdapter::attach(gateway, store.clone()).await;
        let calls_before = provider.calls().len();

        observer.disconnect();

        assert!(!other.snapshot().connected);
        assert!(!store.snapshot().connected);
        assert_eq!(provider.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn detached_observer_freezes() {
        let provider = MemoryProvider::new().with_accounts(&["0xabc"]);
        let (gateway, store) = setup(&provider).await;
        let observer = ObserverAdapter::attach(gateway, store.clone()).await;
        observer.detach();
        store.apply(&ProviderEvent::Disconnected);
        assert!(observer.snapshot().connected);
        assert!(store.hub().is_empty());
    }

    #[test]
    fn observed_state_serializes_flat() {
        let state = ObservedState {
            session: SessionState { installed: true, ..Default::default() },
            connecting: true,
            error: None,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["installed"], true);
        assert_eq!(json["connecting"], true);
        assert!(json.get("session").is_none());
    }
}
