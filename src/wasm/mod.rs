//! WASM module: the session inside a browser page
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     WalletBridge / WalletObserver (JS)  │
//! │  connect, signMessage, subscribe, ...   │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │            WalletSession                │
//! │  gateway, store, hub, relay             │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │  InjectedProvider (window.ethereum)     │
//! │  BrowserHost (location.reload)          │
//! └─────────────────────────────────────────┘
//! ```

mod bridge;
mod injected;

pub use bridge::{WalletBridge, WalletObserver};
pub use injected::{BrowserHost, InjectedProvider};

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;
