//! WalletBridge: the session exposed to JavaScript via wasm-bindgen
//!
//! ```javascript
//! import { WalletBridge } from 'walletsync';
//!
//! const wallet = await WalletBridge.create();
//! const id = wallet.subscribe((state) => render(state));
//!
//! const observer = await wallet.observe();
//! try { await observer.connect(); } catch (e) { console.log(e.name, observer.state().error); }
//!
//! const signature = await wallet.signMessage('hello');
//! wallet.unsubscribe(id);
//! ```

use super::injected::{BrowserHost, InjectedProvider};
use super::log;
use crate::config::WalletConfig;
use crate::core::error::WalletError;
use crate::core::request::TransactionRequest;
use crate::hub::Subscription;
use crate::observer::ObserverAdapter;
use crate::provider::Provider;
use crate::session::WalletSession;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// `Error` whose `name` is the failure kind, so JS can branch on it
fn wallet_error(err: WalletError) -> JsValue {
    let js = js_sys::Error::new(&err.to_string());
    js.set_name(err.kind());
    js.into()
}

/// Browser wallet session with JS bindings
#[wasm_bindgen]
pub struct WalletBridge {
    session: Rc<WalletSession>,
    subscriptions: RefCell<HashMap<u32, Subscription>>,
    next_subscription: Cell<u32>,
}

#[wasm_bindgen]
impl WalletBridge {
    /// Detect the injected provider and start a session.
    /// `config` is optional: `{ reloadOnChainChange, providerKey, capabilityMarker }`.
    #[wasm_bindgen]
    pub async fn create(config: JsValue) -> Result<WalletBridge, JsValue> {
        let config: WalletConfig = if config.is_undefined() || config.is_null() {
            WalletConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let provider = InjectedProvider::detect(&config).map(|p| p as Rc<dyn Provider>);
        log!("[walletsync] provider detected: {}", provider.is_some());

        let session = WalletSession::new(provider, Rc::new(BrowserHost), config).await;
        Ok(Self {
            session: Rc::new(session),
            subscriptions: RefCell::new(HashMap::new()),
            next_subscription: Cell::new(1),
        })
    }

    #[wasm_bindgen(js_name = "isInstalled")]
    pub fn is_installed(&self) -> bool {
        self.session.is_installed()
    }

    /// `{ connected, address, installed, chainId }`
    #[wasm_bindgen]
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.snapshot())
    }

    /// Resolves to the connected address
    #[wasm_bindgen]
    pub async fn connect(&self) -> Result<String, JsValue> {
        self.session.connect().await.map_err(wallet_error)
    }

    #[wasm_bindgen]
    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    #[wasm_bindgen(js_name = "signMessage")]
    pub async fn sign_message(&self, message: String) -> Result<String, JsValue> {
        self.session.sign_message(&message).await.map_err(wallet_error)
    }

    /// `tx`: `{ to, from, value?, data?, gas? }`; resolves to the tx hash
    #[wasm_bindgen(js_name = "sendTransaction")]
    pub async fn send_transaction(&self, tx: JsValue) -> Result<String, JsValue> {
        let tx: TransactionRequest =
            serde_wasm_bindgen::from_value(tx).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.session.send_transaction(&tx).await.map_err(wallet_error)
    }

    /// Call `callback(state)` on every change; returns a subscription id
    #[wasm_bindgen]
    pub fn subscribe(&self, callback: js_sys::Function) -> u32 {
        let subscription = self.session.subscribe(move |state| {
            if let Ok(js_state) = to_js(state) {
                let _ = callback.call1(&JsValue::NULL, &js_state);
            }
        });
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);
        self.subscriptions.borrow_mut().insert(id, subscription);
        id
    }

    /// Returns false when `id` was unknown or already removed
    #[wasm_bindgen]
    pub fn unsubscribe(&self, id: u32) -> bool {
        // dropping the Subscription unsubscribes
        let removed = self.subscriptions.borrow_mut().remove(&id);
        removed.is_some()
    }

    /// Per-component observer with its own `connecting` / `error`
    #[wasm_bindgen]
    pub async fn observe(&self) -> WalletObserver {
        WalletObserver { inner: Rc::new(self.session.observe().await) }
    }

    /// Stop listening to provider events
    #[wasm_bindgen]
    pub fn close(&self) {
        self.subscriptions.borrow_mut().clear();
        self.session.close();
    }
}

/// One UI binding's view: session snapshot plus its own connect attempt
#[wasm_bindgen]
pub struct WalletObserver {
    inner: Rc<ObserverAdapter>,
}

#[wasm_bindgen]
impl WalletObserver {
    /// `{ connected, address, installed, chainId, connecting, error }`
    #[wasm_bindgen]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.state())
    }

    #[wasm_bindgen]
    pub async fn connect(&self) -> Result<String, JsValue> {
        let observer = self.inner.clone();
        observer.connect().await.map_err(wallet_error)
    }

    #[wasm_bindgen]
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }
}
