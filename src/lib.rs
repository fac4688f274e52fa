//! Walletsync: wallet session synchronization for an injected provider.
//!
//! # Architecture
//!
//! ```text
//! Provider (window.ethereum / MemoryProvider)
//!   │  accountsChanged, chainChanged, disconnect
//!   ▼
//! EventRelay ──ProviderEvent──▶ SessionStore ──snapshot──▶ SubscriptionHub
//!                                    ▲                          │
//!                                    │ reconcile                ▼
//! RequestGateway ◀──connect/sign/send── ObserverAdapter (connecting, error)
//! ```
//!
//! Reads flow down from the provider, writes go out through the gateway and
//! come back into the store. Everything is single-threaded (`Rc`/`RefCell`)
//! and cooperative: the browser event loop or a current-thread runtime.
//!
//! # Inbound interface
//!
//! | Operation | Method |
//! |-----------|--------|
//! | installed? | `session.is_installed()` |
//! | snapshot | `session.snapshot()` |
//! | connect | `session.connect()` / `observer.connect()` |
//! | disconnect | `session.disconnect()` / `observer.disconnect()` |
//! | sign | `session.sign_message(msg)` |
//! | send | `session.send_transaction(&tx)` |
//! | subscribe | `session.subscribe(cb)` / `session.watch()` |
//!
//! # Features
//!
//! - `native` - tokio runtime, tracing subscriber, demo CLI
//! - `wasm` - `window.ethereum` provider and the `WalletBridge` JS binding
//!
//! # Usage
//!
//! ```ignore
//! use walletsync::{MemoryProvider, WalletSession};
//! use std::rc::Rc;
//!
//! let provider = MemoryProvider::new().with_wallet_accounts(&["0xabc"]);
//! let session = WalletSession::headless(Some(Rc::new(provider))).await;
//! let observer = session.observe().await;
//! observer.connect().await?;
//! assert_eq!(session.snapshot().address.as_deref(), Some("0xabc"));
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod config;
pub mod core;
pub mod gateway;
pub mod hub;
pub mod observer;
pub mod provider;
pub mod relay;
pub mod session;
pub mod store;

// =============================================================================
// Native-only modules
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod replay;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports
// =============================================================================
pub use config::WalletConfig;
pub use crate::core::error::{WalletError, WalletResult, CONNECT_FAILED_MESSAGE, NOT_INSTALLED_MESSAGE};
pub use crate::core::event::ProviderEvent;
pub use crate::core::request::{SignRequest, TransactionRequest};
pub use crate::core::session::SessionState;
pub use gateway::RequestGateway;
pub use hub::{Subscription, SubscriptionHub};
pub use observer::{ConnectAttempt, ObservedState, ObserverAdapter};
pub use provider::{
    ListenerId, ListenerRegistry, MemoryProvider, NativeHandler, Provider, ProviderFailure, ProviderHandle,
    RegistrationToken, RequestArgs,
};
pub use relay::{EventRelay, HeadlessHost, Host};
pub use session::WalletSession;
pub use store::SessionStore;

#[cfg(feature = "wasm")]
pub use wasm::{BrowserHost, InjectedProvider, WalletBridge};
