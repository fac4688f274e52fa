//! SessionStore - sole owner and sole mutator of the shared SessionState
//!
//! ```text
//! Uninitialized ──probe──▶ Disconnected ◀──Disconnected── Connected
//!                               │                           ▲   │
//!                               └──AccountsChanged(addr)────┘   └─AccountsChanged(addr')
//!                     ChainChanged(id): any state, chain id replaced
//! ```
//!
//! `Uninitialized` is never observable: a store only exists once
//! `initialize` has finished its probe. Every accepted transition notifies
//! the hub synchronously, identical snapshots included.

use crate::core::event::ProviderEvent;
use crate::core::session::SessionState;
use crate::gateway::RequestGateway;
use crate::hub::{Subscription, SubscriptionHub};
use futures::channel::mpsc;
use std::cell::RefCell;
use tracing::{debug, info};

pub struct SessionStore {
    state: RefCell<SessionState>,
    hub: SubscriptionHub,
}

impl SessionStore {
    /// Probe installation, accounts and chain id, then start serving.
    pub async fn initialize(gateway: &RequestGateway, hub: SubscriptionHub) -> Self {
        let installed = gateway.is_installed();
        let accounts = gateway.get_accounts().await;
        let chain_id = gateway.get_chain_id().await;
        let state = SessionState::probed(installed, &accounts, chain_id);
        info!(
            installed = state.installed,
            connected = state.connected,
            chain_id = ?state.chain_id,
            "session initialized"
        );
        Self::with_state(state, hub)
    }

    /// Store seeded with a known snapshot
    pub fn with_state(state: SessionState, hub: SubscriptionHub) -> Self {
        Self { state: RefCell::new(state), hub }
    }

    /// Current snapshot (a copy; later transitions do not affect it)
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    pub fn subscribe(&self, callback: impl Fn(&SessionState) + 'static) -> Subscription {
        self.hub.subscribe(callback)
    }

    pub fn watch(&self) -> mpsc::UnboundedReceiver<SessionState> {
        self.hub.watch()
    }

    /// Run one event through the state machine.
    ///
    /// Returns false when the event was ignored: without an installed
    /// provider nothing may connect, so the snapshot stays frozen.
    pub fn apply(&self, event: &ProviderEvent) -> bool {
        let current = self.snapshot();
        if !current.installed {
            debug!(event = event.name(), "ignoring event, provider not installed");
            return false;
        }
        debug!(event = event.name(), "session transition");
        self.commit(current.apply(event));
        true
    }

    /// Authoritative push after a successful connect: one transition, one
    /// notification, address and chain id together.
    pub fn reconcile(&self, address: &str, chain_id: Option<String>) -> bool {
        let current = self.snapshot();
        if !current.installed {
            return false;
        }
        debug!(%address, ?chain_id, "session reconciled");
        self.commit(current.with_connection(address, chain_id));
        true
    }

    fn commit(&self, next: SessionState) {
        debug_assert!(next.is_consistent());
        *self.state.borrow_mut() = next.clone();
        self.hub.notify(next);
    }
}
