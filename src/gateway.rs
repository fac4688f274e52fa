//! RequestGateway - the five provider requests, with typed failures
//!
//! | Operation | Method | On failure |
//! |-----------|--------|------------|
//! | `connect` | `eth_requestAccounts` | `UserRejected` / `ProviderError` |
//! | `get_accounts` | `eth_accounts` | empty list |
//! | `get_chain_id` | `eth_chainId` | `None` |
//! | `sign_message` | `personal_sign` | `SigningFailed` |
//! | `send_transaction` | `eth_sendTransaction` | `TransactionFailed` |
//!
//! Every mutating request fails with `ProviderNotInstalled` before touching
//! the provider when the capability probe failed. The gateway never writes
//! session state; callers push successful results into the store.

use crate::core::error::{WalletError, WalletResult};
use crate::core::methods::{codes, rpc};
use crate::core::request::{SignRequest, TransactionRequest};
use crate::provider::{Provider, ProviderFailure, ProviderHandle, RequestArgs};
use serde_json::{json, Value};
use std::rc::Rc;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct RequestGateway {
    handle: ProviderHandle,
}

impl RequestGateway {
    pub fn new(handle: ProviderHandle) -> Self {
        Self { handle }
    }

    pub fn is_installed(&self) -> bool {
        self.handle.is_installed()
    }

    fn provider(&self) -> WalletResult<Rc<dyn Provider>> {
        self.handle.installed().cloned().ok_or(WalletError::ProviderNotInstalled)
    }

    /// Ask the user for account access; returns the first granted address.
    pub async fn connect(&self) -> WalletResult<String> {
        let provider = self.provider()?;
        let value = provider
            .request(RequestArgs::new(rpc::REQUEST_ACCOUNTS))
            .await
            .map_err(|failure| {
                warn!(%failure, "connect rejected");
                classify_connect(failure)
            })?;
        let accounts = parse_accounts(value).map_err(WalletError::ProviderError)?;
        let address = accounts
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::ProviderError("provider returned no accounts".into()))?;
        debug!(%address, "connect granted");
        Ok(address)
    }

    /// Authorized accounts. Never fails: missing provider or a failed read
    /// both yield an empty list, so this is safe to poll.
    pub async fn get_accounts(&self) -> Vec<String> {
        let Ok(provider) = self.provider() else { return Vec::new() };
        match provider.request(RequestArgs::new(rpc::ACCOUNTS)).await {
            Ok(value) => parse_accounts(value).unwrap_or_else(|e| {
                warn!(error = %e, "malformed accounts response");
                Vec::new()
            }),
            Err(failure) => {
                warn!(%failure, "failed to get accounts");
                Vec::new()
            }
        }
    }

    /// Current chain id. Never fails, `None` when unknown.
    pub async fn get_chain_id(&self) -> Option<String> {
        let provider = self.provider().ok()?;
        match provider.request(RequestArgs::new(rpc::CHAIN_ID)).await {
            Ok(Value::String(chain_id)) => Some(chain_id),
            Ok(Value::Null) => None,
            Ok(other) => {
                warn!(response = %other, "malformed chain id response");
                None
            }
            Err(failure) => {
                warn!(%failure, "failed to get chain id");
                None
            }
        }
    }

    pub async fn sign_message(&self, request: &SignRequest) -> WalletResult<String> {
        let provider = self.provider()?;
        let args = RequestArgs::with_params(
            rpc::PERSONAL_SIGN,
            vec![json!(request.message), json!(request.address)],
        );
        let value = provider.request(args).await.map_err(|failure| {
            warn!(%failure, "failed to sign message");
            WalletError::SigningFailed(failure.message)
        })?;
        parse_string(value).map_err(WalletError::SigningFailed)
    }

    pub async fn send_transaction(&self, request: &TransactionRequest) -> WalletResult<String> {
        let provider = self.provider()?;
        let tx = serde_json::to_value(request)
            .map_err(|e| WalletError::TransactionFailed(e.to_string()))?;
        let args = RequestArgs::with_params(rpc::SEND_TRANSACTION, vec![tx]);
        let value = provider.request(args).await.map_err(|failure| {
            warn!(%failure, "failed to send transaction");
            WalletError::TransactionFailed(failure.message)
        })?;
        parse_string(value).map_err(WalletError::TransactionFailed)
    }
}

fn classify_connect(failure: ProviderFailure) -> WalletError {
    match failure.code {
        Some(codes::USER_REJECTED) => WalletError::UserRejected(failure.message),
        _ => WalletError::ProviderError(failure.message),
    }
}

/// Account list, lowercased. `null` reads as no accounts.
fn parse_accounts(value: Value) -> Result<Vec<String>, String> {
    let accounts: Option<Vec<String>> =
        serde_json::from_value(value).map_err(|e| format!("invalid accounts response: {}", e))?;
    Ok(accounts
        .unwrap_or_default()
        .into_iter()
        .map(|a| a.to_ascii_lowercase())
        .collect())
}

fn parse_string(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(format!("unexpected provider response: {}", other)),
    }
}
