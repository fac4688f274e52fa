//! Method and event name constants for the injected provider
//!
//! Centralized registry for every name that crosses the provider boundary.

/// JSON-RPC request methods
pub mod rpc {
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const CHAIN_ID: &str = "eth_chainId";
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const PERSONAL_SIGN: &str = "personal_sign";

    pub const ALL: &[&str] = &[REQUEST_ACCOUNTS, ACCOUNTS, CHAIN_ID, SEND_TRANSACTION, PERSONAL_SIGN];
}

/// Native provider events
pub mod events {
    pub const ACCOUNTS_CHANGED: &str = "accountsChanged";
    pub const CHAIN_CHANGED: &str = "chainChanged";
    pub const DISCONNECT: &str = "disconnect";

    pub const ALL: &[&str] = &[ACCOUNTS_CHANGED, CHAIN_CHANGED, DISCONNECT];
}

/// EIP-1193 provider error codes
pub mod codes {
    /// The user rejected the request
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
}

/// Browser globals used by the injected provider binding
pub mod injected {
    /// `window` property holding the provider
    pub const PROVIDER_KEY: &str = "ethereum";
    /// Boolean property identifying a compatible provider
    pub const CAPABILITY_MARKER: &str = "isMetaMask";
}
