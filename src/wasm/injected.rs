//! InjectedProvider - `window.ethereum` behind the Provider trait

use crate::config::WalletConfig;
use crate::provider::{ListenerId, ListenerRegistry, NativeHandler, Provider, ProviderFailure, RequestArgs};
use crate::relay::Host;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

thread_local! {
    /// One wrapper per injected object, so every bridge on the page shares
    /// its listener registry
    static DETECTED: RefCell<Vec<Rc<InjectedProvider>>> = RefCell::new(Vec::new());
}

/// The provider object a wallet extension injected into the page
pub struct InjectedProvider {
    object: js_sys::Object,
    marker: String,
    closures: RefCell<HashMap<u64, Closure<dyn Fn(JsValue)>>>,
    next_id: Cell<u64>,
    registry: ListenerRegistry,
}

impl InjectedProvider {
    /// Look up `window[config.provider_key]`; `None` when nothing was injected.
    /// Detecting the same object twice returns the same wrapper.
    pub fn detect(config: &WalletConfig) -> Option<Rc<Self>> {
        let window = web_sys::window()?;
        let value = js_sys::Reflect::get(&window, &JsValue::from_str(&config.provider_key)).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        let object = value.dyn_into::<js_sys::Object>().ok()?;
        DETECTED.with(|detected| {
            let mut detected = detected.borrow_mut();
            let known = detected
                .iter()
                .find(|p| js_sys::Object::is(&p.object, &object) && p.marker == config.capability_marker);
            if let Some(provider) = known {
                return Some(provider.clone());
            }
            let provider = Rc::new(Self {
                object,
                marker: config.capability_marker.clone(),
                closures: RefCell::new(HashMap::new()),
                next_id: Cell::new(1),
                registry: ListenerRegistry::new(),
            });
            detected.push(provider.clone());
            Some(provider)
        })
    }

    fn method(&self, name: &str) -> Option<js_sys::Function> {
        js_sys::Reflect::get(&self.object, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<js_sys::Function>()
            .ok()
    }
}

/// Read `{ code, message }` off a rejection; fall back to its string form
fn failure_from_js(err: JsValue) -> ProviderFailure {
    let code = js_sys::Reflect::get(&err, &JsValue::from_str("code"))
        .ok()
        .and_then(|c| c.as_f64())
        .map(|c| c as i64);
    let message = js_sys::Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    ProviderFailure { code, message }
}

#[async_trait(?Send)]
impl Provider for InjectedProvider {
    fn capability_marker(&self) -> bool {
        js_sys::Reflect::get(&self.object, &JsValue::from_str(&self.marker))
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    async fn request(&self, args: RequestArgs) -> Result<Value, ProviderFailure> {
        let request = self
            .method("request")
            .ok_or_else(|| ProviderFailure::message("provider has no request method"))?;
        let js_args = args
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| ProviderFailure::message(e.to_string()))?;
        let returned = request.call1(&self.object, &js_args).map_err(failure_from_js)?;
        let promise = returned
            .dyn_into::<js_sys::Promise>()
            .map_err(|_| ProviderFailure::message("request did not return a promise"))?;
        let result = JsFuture::from(promise).await.map_err(failure_from_js)?;
        if result.is_undefined() || result.is_null() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result).map_err(|e| ProviderFailure::message(e.to_string()))
    }

    fn on(&self, event: &str, handler: NativeHandler) -> Option<ListenerId> {
        let Some(on) = self.method("on") else {
            super::log!("[walletsync] provider has no on(), {} not relayed", event);
            return None;
        };
        let closure = Closure::<dyn Fn(JsValue)>::new(move |payload: JsValue| {
            let value = serde_wasm_bindgen::from_value(payload).unwrap_or(Value::Null);
            handler(value);
        });
        if let Err(err) = on.call2(&self.object, &JsValue::from_str(event), closure.as_ref().unchecked_ref()) {
            super::log!("[walletsync] on({}) threw: {:?}", event, err);
            return None;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.closures.borrow_mut().insert(id, closure);
        Some(ListenerId(id))
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        let Some(closure) = self.closures.borrow_mut().remove(&id.0) else { return };
        if let Some(remove) = self.method("removeListener") {
            let _ = remove.call2(&self.object, &JsValue::from_str(event), closure.as_ref().unchecked_ref());
        }
    }

    fn listener_registry(&self) -> &ListenerRegistry {
        &self.registry
    }
}

/// The hosting page; reload is `window.location.reload()`
#[derive(Debug, Default)]
pub struct BrowserHost;

impl Host for BrowserHost {
    fn reload(&self) {
        if let Some(window) = web_sys::window() {
            super::log!("[walletsync] chain changed, reloading page");
            let _ = window.location().reload();
        }
    }
}
