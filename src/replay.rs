//! Replay - drive a session over MemoryProvider from a JSON script
//!
//! ```json
//! {
//!   "provider": { "walletAccounts": ["0xabc"], "chainId": "0x1" },
//!   "config": { "reloadOnChainChange": false },
//!   "steps": [
//!     { "op": "connect" },
//!     { "op": "accountsChanged", "accounts": ["0xdef"] },
//!     { "op": "chainChanged", "chainId": "0x89" },
//!     { "op": "reject", "method": "eth_requestAccounts", "code": 4001, "message": "denied" },
//!     { "op": "sign", "message": "hello" }
//!   ]
//! }
//! ```
//!
//! Every snapshot the hub delivers and every step outcome is recorded as one
//! JSON line, in the order it happened.

use crate::config::WalletConfig;
use crate::core::request::TransactionRequest;
use crate::provider::{MemoryProvider, Provider, ProviderFailure};
use crate::relay::HeadlessHost;
use crate::session::WalletSession;
use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Initial state of the scripted provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderSetup {
    pub installed: bool,
    pub accounts: Vec<String>,
    pub wallet_accounts: Vec<String>,
    pub chain_id: Option<String>,
    pub emit_on_connect: bool,
}

impl Default for ProviderSetup {
    fn default() -> Self {
        Self {
            installed: true,
            accounts: Vec::new(),
            wallet_accounts: Vec::new(),
            chain_id: None,
            emit_on_connect: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    Connect,
    Disconnect,
    #[serde(rename_all = "camelCase")]
    AccountsChanged { accounts: Vec<String> },
    #[serde(rename_all = "camelCase")]
    ChainChanged { chain_id: String },
    DisconnectEvent,
    Reject { method: String, code: Option<i64>, message: String },
    Sign { message: String },
    Send { tx: TransactionRequest },
    Snapshot,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub provider: ProviderSetup,
    pub config: WalletConfig,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    fn build_provider(&self) -> MemoryProvider {
        let setup = &self.provider;
        let accounts: Vec<&str> = setup.accounts.iter().map(String::as_str).collect();
        let wallet: Vec<&str> = setup.wallet_accounts.iter().map(String::as_str).collect();
        let mut provider = MemoryProvider::new().with_accounts(&accounts);
        if !wallet.is_empty() {
            provider = provider.with_wallet_accounts(&wallet);
        }
        if let Some(chain_id) = &setup.chain_id {
            provider = provider.with_chain_id(chain_id);
        }
        if setup.emit_on_connect {
            provider = provider.emitting_on_connect();
        }
        if !setup.installed {
            provider = provider.without_marker();
        }
        provider
    }

    /// Run every step; returns the recorded JSON lines
    pub async fn run(&self) -> Vec<Value> {
        let provider = self.build_provider();
        let host = Rc::new(HeadlessHost::new());
        let dyn_provider: Rc<dyn Provider> = Rc::new(provider.clone());
        let session = WalletSession::new(Some(dyn_provider), host.clone(), self.config.clone()).await;

        let log: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        log.borrow_mut().push(json!({"initial": session.snapshot()}));
        let sink = log.clone();
        let _subscription = session.subscribe(move |state| sink.borrow_mut().push(json!({"snapshot": state})));
        let observer = session.observe().await;

        for step in &self.steps {
            let outcome = match step {
                Step::Connect => outcome("connect", observer.connect().await.map(Value::from)),
                Step::Disconnect => {
                    observer.disconnect();
                    json!({"op": "disconnect"})
                }
                Step::AccountsChanged { accounts } => {
                    let accounts: Vec<&str> = accounts.iter().map(String::as_str).collect();
                    provider.emit_accounts_changed(&accounts);
                    json!({"op": "accountsChanged"})
                }
                Step::ChainChanged { chain_id } => {
                    provider.emit_chain_changed(chain_id);
                    json!({"op": "chainChanged", "reloads": host.reload_count()})
                }
                Step::DisconnectEvent => {
                    provider.emit_disconnect();
                    json!({"op": "disconnectEvent"})
                }
                Step::Reject { method, code, message } => {
                    provider.fail_next(method, ProviderFailure { code: *code, message: message.clone() });
                    json!({"op": "reject", "method": method})
                }
                Step::Sign { message } => outcome("sign", session.sign_message(message).await.map(Value::from)),
                Step::Send { tx } => outcome("send", session.send_transaction(tx).await.map(Value::from)),
                Step::Snapshot => json!({"op": "snapshot", "state": observer.state()}),
            };
            log.borrow_mut().push(outcome);
        }

        session.close();
        let lines = log.borrow().clone();
        lines
    }
}

fn outcome(op: &str, result: crate::WalletResult<Value>) -> Value {
    match result {
        Ok(value) => json!({"op": op, "result": value}),
        Err(err) => json!({"op": op, "error": {"kind": err.kind(), "message": err.to_string()}}),
    }
}
