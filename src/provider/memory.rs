//! MemoryProvider - scriptable in-memory wallet provider
//!
//! Stands in for the injected object on native targets: tests and the demo
//! CLI drive accounts, chain switches and rejections through it.

use super::{ListenerId, ListenerRegistry, NativeHandler, Provider, ProviderFailure, RequestArgs};
use crate::core::methods::{codes, events, rpc};
use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

struct MemoryState {
    marker: bool,
    /// Accounts exposed to the page (eth_accounts)
    exposed: Vec<String>,
    /// Accounts granted when the user approves eth_requestAccounts
    wallet: Vec<String>,
    chain_id: Option<String>,
    emit_on_connect: bool,
    failures: HashMap<String, VecDeque<ProviderFailure>>,
    held: HashSet<String>,
    pending: Vec<(String, oneshot::Sender<()>)>,
    listeners: HashMap<String, Vec<(ListenerId, NativeHandler)>>,
    next_listener: u64,
    tx_count: u64,
    calls: Vec<RequestArgs>,
}

/// In-memory provider. Clones share state.
#[derive(Clone)]
pub struct MemoryProvider {
    inner: Rc<RefCell<MemoryState>>,
    registry: ListenerRegistry,
}

impl MemoryProvider {
    /// Compatible provider, no accounts, no chain
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryState {
                marker: true,
                exposed: Vec::new(),
                wallet: Vec::new(),
                chain_id: None,
                emit_on_connect: false,
                failures: HashMap::new(),
                held: HashSet::new(),
                pending: Vec::new(),
                listeners: HashMap::new(),
                next_listener: 1,
                tx_count: 0,
                calls: Vec::new(),
            })),
            registry: ListenerRegistry::new(),
        }
    }

    /// Injected object without the capability marker
    pub fn without_marker(self) -> Self {
        self.inner.borrow_mut().marker = false;
        self
    }

    /// Accounts already authorized for this page
    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        let accounts: Vec<String> = accounts.iter().map(|a| a.to_string()).collect();
        {
            let mut state = self.inner.borrow_mut();
            state.exposed = accounts.clone();
            state.wallet = accounts;
        }
        self
    }

    /// Accounts the wallet grants on the next connect request
    pub fn with_wallet_accounts(self, accounts: &[&str]) -> Self {
        self.inner.borrow_mut().wallet = accounts.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_chain_id(self, chain_id: &str) -> Self {
        self.inner.borrow_mut().chain_id = Some(chain_id.to_string());
        self
    }

    /// Also fire `accountsChanged` when a connect request is approved
    pub fn emitting_on_connect(self) -> Self {
        self.inner.borrow_mut().emit_on_connect = true;
        self
    }

    /// Reject the next request for `method` with `failure`
    pub fn fail_next(&self, method: &str, failure: ProviderFailure) {
        self.inner
            .borrow_mut()
            .failures
            .entry(method.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Park every request for `method` until `release` is called
    pub fn hold(&self, method: &str) {
        self.inner.borrow_mut().held.insert(method.to_string());
    }

    /// Resume parked requests for `method` and stop holding it
    pub fn release(&self, method: &str) {
        let parked: Vec<oneshot::Sender<()>> = {
            let state = &mut *self.inner.borrow_mut();
            state.held.remove(method);
            let (matching, rest): (Vec<_>, Vec<_>) =
                state.pending.drain(..).partition(|(m, _)| m == method);
            state.pending = rest;
            matching.into_iter().map(|(_, tx)| tx).collect()
        };
        for tx in parked {
            let _ = tx.send(());
        }
    }

    /// Requests currently parked by `hold`
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Every request received so far, in order
    pub fn calls(&self) -> Vec<RequestArgs> {
        self.inner.borrow().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.inner.borrow().calls.iter().filter(|c| c.method == method).count()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.borrow().listeners.get(event).map(Vec::len).unwrap_or(0)
    }

    // =========================================================================
    // NATIVE EVENTS
    // =========================================================================

    /// Fire a raw native event to every listener registered for it
    pub fn emit(&self, event: &str, payload: Value) {
        let handlers: Vec<NativeHandler> = self
            .inner
            .borrow()
            .listeners
            .get(event)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(payload.clone());
        }
    }

    /// User switched (or revoked, with an empty slice) accounts
    pub fn emit_accounts_changed(&self, accounts: &[&str]) {
        let accounts: Vec<String> = accounts.iter().map(|a| a.to_string()).collect();
        {
            let mut state = self.inner.borrow_mut();
            state.exposed = accounts.clone();
            if !accounts.is_empty() {
                state.wallet = accounts.clone();
            }
        }
        self.emit(events::ACCOUNTS_CHANGED, json!(accounts));
    }

    pub fn emit_chain_changed(&self, chain_id: &str) {
        self.inner.borrow_mut().chain_id = Some(chain_id.to_string());
        self.emit(events::CHAIN_CHANGED, json!(chain_id));
    }

    pub fn emit_disconnect(&self) {
        self.inner.borrow_mut().exposed.clear();
        self.emit(
            events::DISCONNECT,
            json!({"code": codes::DISCONNECTED, "message": "Provider disconnected"}),
        );
    }

    // =========================================================================
    // REQUEST HANDLING
    // =========================================================================

    fn respond(&self, args: &RequestArgs) -> Result<Value, ProviderFailure> {
        let state = &mut *self.inner.borrow_mut();
        if let Some(failure) = state.failures.get_mut(&args.method).and_then(VecDeque::pop_front) {
            return Err(failure);
        }
        match args.method.as_str() {
            rpc::REQUEST_ACCOUNTS => {
                if state.wallet.is_empty() {
                    return Err(ProviderFailure::new(codes::UNAUTHORIZED, "No accounts available"));
                }
                state.exposed = state.wallet.clone();
                Ok(json!(state.exposed))
            }
            rpc::ACCOUNTS => Ok(json!(state.exposed)),
            rpc::CHAIN_ID => Ok(json!(state.chain_id)),
            rpc::PERSONAL_SIGN => {
                let message = args.params.first().and_then(Value::as_str).unwrap_or_default();
                let address = args.params.get(1).and_then(Value::as_str).unwrap_or_default();
                if !state.exposed.iter().any(|a| a.eq_ignore_ascii_case(address)) {
                    return Err(ProviderFailure::new(codes::UNAUTHORIZED, "Unknown signer"));
                }
                let digest: String = message.bytes().map(|b| format!("{:02x}", b)).collect();
                Ok(json!(format!("0x{}", digest)))
            }
            rpc::SEND_TRANSACTION => {
                if state.exposed.is_empty() {
                    return Err(ProviderFailure::new(codes::UNAUTHORIZED, "Not connected"));
                }
                state.tx_count += 1;
                Ok(json!(format!("0x{:064x}", state.tx_count)))
            }
            other => Err(ProviderFailure::new(
                codes::UNSUPPORTED_METHOD,
                format!("Unsupported method: {}", other),
            )),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Provider for MemoryProvider {
    fn capability_marker(&self) -> bool {
        self.inner.borrow().marker
    }

    async fn request(&self, args: RequestArgs) -> Result<Value, ProviderFailure> {
        let parked = {
            let mut state = self.inner.borrow_mut();
            state.calls.push(args.clone());
            if state.held.contains(&args.method) {
                let (tx, rx) = oneshot::channel();
                state.pending.push((args.method.clone(), tx));
                Some(rx)
            } else {
                None
            }
        };
        if let Some(rx) = parked {
            rx.await
                .map_err(|_| ProviderFailure::message("Request dropped by provider"))?;
        }

        let result = self.respond(&args);
        let emit = args.method == rpc::REQUEST_ACCOUNTS
            && result.is_ok()
            && self.inner.borrow().emit_on_connect;
        if emit {
            let exposed = self.inner.borrow().exposed.clone();
            self.emit(events::ACCOUNTS_CHANGED, json!(exposed));
        }
        result
    }

    fn on(&self, event: &str, handler: NativeHandler) -> Option<ListenerId> {
        let mut state = self.inner.borrow_mut();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.entry(event.to_string()).or_default().push((id, handler));
        Some(id)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        if let Some(list) = self.inner.borrow_mut().listeners.get_mut(event) {
            list.retain(|(existing, _)| *existing != id);
        }
    }

    fn listener_registry(&self) -> &ListenerRegistry {
        &self.registry
    }
}
