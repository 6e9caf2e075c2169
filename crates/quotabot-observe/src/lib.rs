//! Observability setup for quotabot.

pub mod tracing_setup;
