//! Provider seam: the one injected wallet object this crate talks to
//!
//! ```text
//! ProviderHandle (installed? cached once)
//!     │
//!     └── Rc<dyn Provider>
//!           ├── MemoryProvider   (scriptable, tests + demo CLI)
//!           └── InjectedProvider (window.ethereum, feature "wasm")
//! ```
//!
//! Providers are single-threaded (`?Send`): everything runs on one
//! cooperative executor, the browser event loop or a current-thread runtime.

mod memory;

pub use memory::MemoryProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Callback receiving a native event payload (accounts array, chain id, error object)
pub type NativeHandler = Rc<dyn Fn(Value)>;

/// Identifies one registered native listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// `{ method, params }` request object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArgs {
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl RequestArgs {
    pub fn new(method: &str) -> Self {
        Self { method: method.to_string(), params: Vec::new() }
    }

    pub fn with_params(method: &str, params: Vec<Value>) -> Self {
        Self { method: method.to_string(), params }
    }
}

/// Rejection raised by the provider (EIP-1193 `ProviderRpcError` shape)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code: Some(code), message: message.into() }
    }

    /// Failure without a numeric code (thrown strings, malformed responses)
    pub fn message(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Injected wallet provider
#[async_trait(?Send)]
pub trait Provider {
    /// Whether the object carries the marker identifying a compatible wallet
    fn capability_marker(&self) -> bool;

    /// Issue one request
    async fn request(&self, args: RequestArgs) -> Result<Value, ProviderFailure>;

    /// Register a native event listener. `None` when the object cannot
    /// take listeners.
    fn on(&self, event: &str, handler: NativeHandler) -> Option<ListenerId>;

    /// Remove a listener registered with `on`; unknown ids are ignored
    fn remove_listener(&self, event: &str, id: ListenerId);

    /// Listeners this crate registered on the provider, shared by every
    /// handle and session built over it
    fn listener_registry(&self) -> &ListenerRegistry;
}

/// Proof of owning the current registrations in a `ListenerRegistry`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(u64);

#[derive(Default)]
struct Registrations {
    owner: Option<RegistrationToken>,
    next_token: u64,
    ids: Vec<(&'static str, ListenerId)>,
}

/// Native listener ids registered on one provider. At most one owner holds
/// registrations at a time; clones share state.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Rc<RefCell<Registrations>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<RegistrationToken> {
        self.inner.borrow().owner
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every registration regardless of owner
    fn take(&self) -> Vec<(&'static str, ListenerId)> {
        let state = &mut *self.inner.borrow_mut();
        state.owner = None;
        std::mem::take(&mut state.ids)
    }

    /// Take the registrations only if `token` still owns them
    fn take_owned(&self, token: RegistrationToken) -> Option<Vec<(&'static str, ListenerId)>> {
        if self.owner() != Some(token) {
            return None;
        }
        Some(self.take())
    }

    fn install(&self, ids: Vec<(&'static str, ListenerId)>) -> RegistrationToken {
        let state = &mut *self.inner.borrow_mut();
        state.next_token += 1;
        let token = RegistrationToken(state.next_token);
        state.owner = Some(token);
        state.ids = ids;
        token
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("ListenerRegistry")
            .field("owner", &state.owner)
            .field("listeners", &state.ids.len())
            .finish()
    }
}

/// Shared handle to the injected provider.
///
/// Installation is probed once at construction; a provider cannot appear
/// mid-session in a way this crate reacts to.
///
/// Native listeners are tracked on the provider itself, so whoever
/// registers through any handle over it replaces the previous registrations
/// instead of adding to them.
#[derive(Clone)]
pub struct ProviderHandle {
    provider: Option<Rc<dyn Provider>>,
    installed: bool,
}

impl ProviderHandle {
    pub fn new(provider: Option<Rc<dyn Provider>>) -> Self {
        let installed = provider.as_ref().map(|p| p.capability_marker()).unwrap_or(false);
        tracing::debug!(installed, "provider probed");
        Self { provider, installed }
    }

    /// No injected object at all
    pub fn absent() -> Self {
        Self::new(None)
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// The provider, only when it passed the capability probe
    pub fn installed(&self) -> Option<&Rc<dyn Provider>> {
        if self.installed { self.provider.as_ref() } else { None }
    }

    /// Register one native listener per `(event, handler)` pair, first
    /// removing whatever this crate registered on the provider before.
    ///
    /// `None` when nothing could be registered.
    pub fn register_listeners(&self, handlers: Vec<(&'static str, NativeHandler)>) -> Option<RegistrationToken> {
        let provider = self.installed()?;
        let registry = provider.listener_registry();
        for (event, id) in registry.take() {
            provider.remove_listener(event, id);
        }
        let ids: Vec<(&'static str, ListenerId)> = handlers
            .into_iter()
            .filter_map(|(event, handler)| provider.on(event, handler).map(|id| (event, id)))
            .collect();
        if ids.is_empty() {
            return None;
        }
        Some(registry.install(ids))
    }

    /// Remove the listeners registered under `token`. Returns `false` when
    /// `token` no longer owns them (already removed or replaced).
    pub fn unregister_listeners(&self, token: RegistrationToken) -> bool {
        let Some(provider) = self.installed() else { return false };
        let Some(previous) = provider.listener_registry().take_owned(token) else { return false };
        for (event, id) in previous {
            provider.remove_listener(event, id);
        }
        true
    }

    /// Whether `token` still owns the provider's registrations
    pub fn owns(&self, token: RegistrationToken) -> bool {
        self.installed()
            .map(|p| p.listener_registry().owner() == Some(token))
            .unwrap_or(false)
    }

    /// Listeners currently registered on the provider by this crate
    pub fn registered_listeners(&self) -> usize {
        self.installed().map(|p| p.listener_registry().len()).unwrap_or(0)
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("present", &self.provider.is_some())
            .field("installed", &self.installed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_provider_is_not_installed() {
        let handle = ProviderHandle::absent();
        assert!(!handle.is_installed());
        assert!(handle.installed().is_none());
    }

    #[test]
    fn marker_decides_installation() {
        let marked: Rc<dyn Provider> = Rc::new(MemoryProvider::new());
        assert!(ProviderHandle::new(Some(marked)).is_installed());

        let unmarked: Rc<dyn Provider> = Rc::new(MemoryProvider::new().without_marker());
        let handle = ProviderHandle::new(Some(unmarked));
        assert!(!handle.is_installed());
        assert!(handle.installed().is_none());
    }

    #[test]
    fn registering_again_replaces_listeners() {
        let memory = MemoryProvider::new();
        let provider: Rc<dyn Provider> = Rc::new(memory.clone());
        let handle = ProviderHandle::new(Some(provider));
        let noop: NativeHandler = Rc::new(|_| {});

        let first = handle.register_listeners(vec![("accountsChanged", noop.clone())]).unwrap();
        let second = handle.clone().register_listeners(vec![("accountsChanged", noop)]).unwrap();
        assert_eq!(memory.listener_count("accountsChanged"), 1);
        assert!(!handle.owns(first));
        assert!(handle.owns(second));

        assert!(!handle.unregister_listeners(first));
        assert_eq!(memory.listener_count("accountsChanged"), 1);

        assert!(handle.unregister_listeners(second));
        assert!(!handle.unregister_listeners(second));
        assert_eq!(memory.listener_count("accountsChanged"), 0);
        assert_eq!(handle.registered_listeners(), 0);
    }

    #[test]
    fn registry_is_shared_across_handles_over_one_provider() {
        let memory = MemoryProvider::new();
        let a = ProviderHandle::new(Some(Rc::new(memory.clone()) as Rc<dyn Provider>));
        let b = ProviderHandle::new(Some(Rc::new(memory.clone()) as Rc<dyn Provider>));
        let noop: NativeHandler = Rc::new(|_| {});

        let stale = a.register_listeners(vec![("chainChanged", noop.clone())]).unwrap();
        let current = b.register_listeners(vec![("chainChanged", noop)]).unwrap();

        assert_eq!(memory.listener_count("chainChanged"), 1);
        assert!(!a.unregister_listeners(stale));
        assert!(a.owns(current));
        assert_eq!(a.registered_listeners(), 1);
    }

    /// Injected object without an `on` method
    struct Deaf(ListenerRegistry);

    #[async_trait(?Send)]
    impl Provider for Deaf {
        fn capability_marker(&self) -> bool {
            true
        }
        async fn request(&self, _args: RequestArgs) -> Result<Value, ProviderFailure> {
            Ok(Value::Null)
        }
        fn on(&self, _event: &str, _handler: NativeHandler) -> Option<ListenerId> {
            None
        }
        fn remove_listener(&self, _event: &str, _id: ListenerId) {}
        fn listener_registry(&self) -> &ListenerRegistry {
            &self.0
        }
    }

    #[test]
    fn listeners_the_provider_refused_are_not_counted() {
        let handle = ProviderHandle::new(Some(Rc::new(Deaf(ListenerRegistry::new())) as Rc<dyn Provider>));
        let noop: NativeHandler = Rc::new(|_| {});
        assert!(handle.is_installed());
        assert_eq!(handle.register_listeners(vec![("accountsChanged", noop)]), None);
        assert_eq!(handle.registered_listeners(), 0);
    }

    #[test]
    fn absent_provider_registers_nothing() {
        let noop: NativeHandler = Rc::new(|_| {});
        assert_eq!(ProviderHandle::absent().register_listeners(vec![("disconnect", noop)]), None);
    }

    #[test]
    fn failure_display_includes_code() {
        let failure = ProviderFailure::new(4001, "User rejected the request.");
        assert_eq!(failure.to_string(), "User rejected the request. (code 4001)");
        assert_eq!(ProviderFailure::message("boom").to_string(), "boom");
    }
}
