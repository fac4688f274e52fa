//! EventRelay - native provider notifications → ProviderEvent → store
//!
//! | Native event | Payload | Becomes |
//! |--------------|---------|---------|
//! | `accountsChanged` | `[]` | `Disconnected` |
//! | `accountsChanged` | `[a, ..]` | `AccountsChanged(a)` |
//! | `chainChanged` | `"0x.."` | `ChainChanged(id)`, then host reload |
//! | `disconnect` | error object | `Disconnected` |
//!
//! A chain switch reloads the whole host page instead of reconciling
//! in-flight work against the new network. `WalletConfig` can turn that off.

use crate::config::WalletConfig;
use crate::core::event::ProviderEvent;
use crate::core::methods::events;
use crate::provider::{NativeHandler, ProviderHandle, RegistrationToken};
use crate::store::SessionStore;
use serde_json::Value;
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

/// The page or process hosting the session
pub trait Host {
    /// Throw away all in-memory state and start over
    fn reload(&self);
}

/// Host without a page to reload (native, tests). Counts reload requests.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    reloads: Cell<usize>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.get()
    }
}

impl Host for HeadlessHost {
    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
        info!("reload requested (headless host)");
    }
}

pub struct EventRelay {
    handle: ProviderHandle,
    store: Rc<SessionStore>,
    host: Rc<dyn Host>,
    reload_on_chain_change: bool,
    registration: Cell<Option<RegistrationToken>>,
}

impl EventRelay {
    pub fn new(handle: ProviderHandle, store: Rc<SessionStore>, host: Rc<dyn Host>, config: &WalletConfig) -> Rc<Self> {
        Rc::new(Self {
            handle,
            store,
            host,
            reload_on_chain_change: config.reload_on_chain_change,
            registration: Cell::new(None),
        })
    }

    /// Register one listener per native event. Attaching twice is a no-op,
    /// and any relay attached to the same provider earlier is replaced.
    pub fn attach(self: &Rc<Self>) -> usize {
        if self.is_attached() {
            return self.handle.registered_listeners();
        }
        let handlers: Vec<(&'static str, NativeHandler)> = events::ALL
            .iter()
            .map(|&event| (event, self.handler(event)))
            .collect();
        let token = self.handle.register_listeners(handlers);
        self.registration.set(token);
        if token.is_some() { self.handle.registered_listeners() } else { 0 }
    }

    /// Remove the native listeners if this relay still owns them. Idempotent.
    pub fn detach(&self) {
        if let Some(token) = self.registration.take() {
            if !self.handle.unregister_listeners(token) {
                debug!("relay was already replaced, nothing to detach");
            }
        }
    }

    /// False once detached or replaced by a later relay
    pub fn is_attached(&self) -> bool {
        self.registration.get().map(|token| self.handle.owns(token)).unwrap_or(false)
    }

    fn handler(self: &Rc<Self>, event: &'static str) -> NativeHandler {
        let relay: Weak<Self> = Rc::downgrade(self);
        Rc::new(move |payload: Value| {
            if let Some(relay) = relay.upgrade() {
                relay.relay(event, payload);
            }
        })
    }

    fn relay(&self, native: &str, payload: Value) {
        let Some(event) = translate(native, &payload) else {
            warn!(event = native, %payload, "dropping malformed provider event");
            return;
        };
        let chain_switch = matches!(event, ProviderEvent::ChainChanged(_));
        self.store.apply(&event);
        if chain_switch {
            info!(chain_id = ?self.store.snapshot().chain_id, "chain changed");
            if self.reload_on_chain_change {
                self.host.reload();
            }
        }
    }
}

/// Translate one native notification. `None` for unknown events or
/// payloads of the wrong shape.
pub fn translate(native: &str, payload: &Value) -> Option<ProviderEvent> {
    match native {
        events::ACCOUNTS_CHANGED => {
            let accounts = payload.as_array()?;
            match accounts.first() {
                None => Some(ProviderEvent::Disconnected),
                Some(first) => first
                    .as_str()
                    .map(|a| ProviderEvent::AccountsChanged(a.to_ascii_lowercase())),
            }
        }
        events::CHAIN_CHANGED => payload.as_str().map(|id| ProviderEvent::ChainChanged(id.to_string())),
        events::DISCONNECT => Some(ProviderEvent::Disconnected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::SessionState;
    use crate::hub::SubscriptionHub;
    use crate::provider::{MemoryProvider, Provider};
    use serde_json::json;

    struct Fixture {
        provider: MemoryProvider,
        handle: ProviderHandle,
        store: Rc<SessionStore>,
        host: Rc<HeadlessHost>,
    }

    fn fixture() -> Fixture {
        let provider = MemoryProvider::new();
        let dyn_provider: Rc<dyn Provider> = Rc::new(provider.clone());
        let handle = ProviderHandle::new(Some(dyn_provider));
        let state = SessionState { installed: true, ..Default::default() };
        let store = Rc::new(SessionStore::with_state(state, SubscriptionHub::new()));
        Fixture { provider, handle, store, host: Rc::new(HeadlessHost::new()) }
    }

    fn relay(f: &Fixture, config: &WalletConfig) -> Rc<EventRelay> {
        EventRelay::new(f.handle.clone(), f.store.clone(), f.host.clone(), config)
    }

    #[test]
    fn translation_table() {
        assert_eq!(translate("accountsChanged", &json!([])), Some(ProviderEvent::Disconnected));
        assert_eq!(
            translate("accountsChanged", &json!(["0xABC", "0xdef"])),
            Some(ProviderEvent::AccountsChanged("0xabc".into()))
        );
        assert_eq!(translate("chainChanged", &json!("0x89")), Some(ProviderEvent::ChainChanged("0x89".into())));
        assert_eq!(translate("disconnect", &json!({"code": 4900})), Some(ProviderEvent::Disconnected));
        assert_eq!(translate("accountsChanged", &json!("0xabc")), None);
        assert_eq!(translate("chainChanged", &json!(137)), None);
        assert_eq!(translate("message", &json!({})), None);
    }

    #[test]
    fn attach_registers_one_listener_per_event() {
        let f = fixture();
        let relay = relay(&f, &WalletConfig::default());
        assert_eq!(relay.attach(), 3);
        assert_eq!(relay.attach(), 3);

        // a second relay over the same handle replaces the first
        let again = EventRelay::new(f.handle.clone(), f.store.clone(), f.host.clone(), &WalletConfig::default());
        again.attach();

        for event in events::ALL {
            assert_eq!(f.provider.listener_count(event), 1);
        }
    }

    #[test]
    fn replaced_relay_detaching_leaves_successor_attached() {
        let f = fixture();
        let first = relay(&f, &WalletConfig::default());
        first.attach();
        let second = relay(&f, &WalletConfig::default());
        second.attach();
        assert!(!first.is_attached());
        assert!(second.is_attached());

        first.detach();
        assert!(second.is_attached());
        assert_eq!(f.provider.listener_count(events::ACCOUNTS_CHANGED), 1);

        f.provider.emit_accounts_changed(&["0xabc"]);
        assert!(f.store.snapshot().connected);
    }

    #[test]
    fn relays_over_separate_handles_share_registrations() {
        let f = fixture();
        let first = relay(&f, &WalletConfig::default());
        first.attach();

        let dyn_provider: Rc<dyn Provider> = Rc::new(f.provider.clone());
        let other_handle = ProviderHandle::new(Some(dyn_provider));
        let second = EventRelay::new(other_handle, f.store.clone(), f.host.clone(), &WalletConfig::default());
        assert_eq!(second.attach(), 3);

        for event in events::ALL {
            assert_eq!(f.provider.listener_count(event), 1);
        }
        f.provider.emit_chain_changed("0x89");
        assert_eq!(f.host.reload_count(), 1);
    }

    #[test]
    fn detach_removes_listeners() {
        let f = fixture();
        let relay = relay(&f, &WalletConfig::default());
        relay.attach();
        relay.detach();
        relay.detach();
        assert!(!relay.is_attached());
        assert_eq!(f.provider.listener_count(events::ACCOUNTS_CHANGED), 0);

        f.provider.emit_accounts_changed(&["0xabc"]);
        assert!(!f.store.snapshot().connected);
    }

    #[test]
    fn native_events_drive_the_store() {
        let f = fixture();
        let relay = relay(&f, &WalletConfig::default());
        relay.attach();

        f.provider.emit_accounts_changed(&["0xabc"]);
        assert_eq!(f.store.snapshot().address.as_deref(), Some("0xabc"));

        f.provider.emit_accounts_changed(&[]);
        assert!(!f.store.snapshot().connected);

        f.provider.emit_accounts_changed(&["0xdef"]);
        f.provider.emit_disconnect();
        assert_eq!(f.store.snapshot().address, None);
    }

    #[test]
    fn chain_change_updates_store_then_reloads() {
        let f = fixture();
        let relay = relay(&f, &WalletConfig::default());
        relay.attach();

        f.provider.emit_chain_changed("0x89");
        assert_eq!(f.store.snapshot().chain_id.as_deref(), Some("0x89"));
        assert_eq!(f.host.reload_count(), 1);
    }

    #[test]
    fn reload_can_be_disabled() {
        let f = fixture();
        let relay = relay(&f, &WalletConfig::new().with_reload_on_chain_change(false));
        relay.attach();
        f.provider.emit_chain_changed("0x5");
        assert_eq!(f.host.reload_count(), 0);
        assert_eq!(f.store.snapshot().chain_id.as_deref(), Some("0x5"));
    }

    #[test]
    fn malformed_payload_leaves_store_alone() {
        let f = fixture();
        let relay = relay(&f, &WalletConfig::default());
        relay.attach();
        f.provider.emit(events::ACCOUNTS_CHANGED, json!({"not": "a list"}));
        assert_eq!(f.store.snapshot(), SessionState { installed: true, ..Default::default() });
    }

    #[test]
    fn relay_on_missing_provider_registers_nothing() {
        let store = Rc::new(SessionStore::with_state(SessionState::not_installed(), SubscriptionHub::new()));
        let relay = EventRelay::new(ProviderHandle::absent(), store, Rc::new(HeadlessHost::new()), &WalletConfig::default());
        assert_eq!(relay.attach(), 0);
        assert!(!relay.is_attached());
    }
}
