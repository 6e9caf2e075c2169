//! Shared domain types for quotabot.
//!
//! This crate contains the types used across the quotabot engine:
//! inbound events, sessions, tracked messages, transactions, configuration,
//! and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod transaction;
