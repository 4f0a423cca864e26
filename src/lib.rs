//! Petaline — a privacy-first customer support agent for a flower shop.
//!
//! Single Rust binary. Every customer message is stripped of PII by an
//! external detect-encrypt service before any model or store sees it;
//! plaintext only reappears in the final, decrypted reply.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod http;
pub mod logging;

pub mod bundle;
pub mod cryptor;
pub mod model;
pub mod store;

pub mod actions;
pub mod intent;
pub mod pipeline;
pub mod render;

pub mod shell;
