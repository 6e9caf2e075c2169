//! Infrastructure implementations for quotabot.
//!
//! SQLite-backed stores (WAL mode, split read/write pools), DashMap-backed
//! in-memory stores for tests and ephemeral runs, and the toml config
//! loader.

pub mod config;
pub mod memory;
pub mod sqlite;
