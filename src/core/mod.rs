//! Core types shared by every layer (compile on native and wasm)

pub mod error;
pub mod event;
pub mod methods;
pub mod request;
pub mod session;
