//! Lock-and-mint relayer - Library interface
//!
//! Watches a source chain for `TokensLocked` events and mirrors each one as a
//! `mintTokens` call on the destination chain, tracking scan progress in a
//! crash-safe cursor. Re-exports internal modules for use in integration tests.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod cursor;
pub mod error;
pub mod pipeline;
pub mod redact;
pub mod relay;
pub mod retry;
pub mod scanner;
pub mod server;
pub mod translator;
pub mod types;
