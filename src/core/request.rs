//! Pass-through request objects handed to the provider as-is

use serde::{Deserialize, Serialize};

/// Message to sign with `personal_sign`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub message: String,
    pub address: String,
}

impl SignRequest {
    pub fn new(message: impl Into<String>, address: impl Into<String>) -> Self {
        Self { message: message.into(), address: address.into() }
    }
}

/// Transaction forwarded to `eth_sendTransaction`. The provider validates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: String,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
}

impl TransactionRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into(), ..Default::default() }
    }
    pub fn with_value(mut self, value: impl Into<String>) -> Self { self.value = Some(value.into()); self }
    pub fn with_data(mut self, data: impl Into<String>) -> Self { self.data = Some(data.into()); self }
    pub fn with_gas(mut self, gas: impl Into<String>) -> Self { self.gas = Some(gas.into()); self }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transaction_omits_absent_fields() {
        let tx = TransactionRequest::new("0xabc", "0xdef").with_value("0x10");
        assert_eq!(
            serde_json::to_value(&tx).unwrap(),
            json!({"to": "0xdef", "from": "0xabc", "value": "0x10"})
        );
    }
}
