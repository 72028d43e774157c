//! agentwatch daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `agentwatch` is used as a binary (main.rs).

pub mod cli;
pub mod commands;
pub mod format;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod telegram;
pub mod worker;
