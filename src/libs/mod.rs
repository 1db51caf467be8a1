//! Core library modules for doover.
//!
//! - **Session**: login state and the task/tag operations built on it
//! - **Reconciliation**: keyed snapshot diff used by tag sync
//! - **Infrastructure**: configuration, data storage, credential codec,
//!   messages and logging

pub mod config;
pub mod data_storage;
pub mod logging;
pub mod messages;
pub mod reconcile;
pub mod secret;
pub mod session;
pub mod task;
