//! # doover - Habitica To-Do Over
//!
//! Signs in to Habitica, creates and edits to-do tasks, and mirrors the
//! user's tag list into a local SQLite store.
//!
//! ## Features
//!
//! - **Authentication**: password login or login with a stored, encrypted API token
//! - **Tasks**: create to-dos with an optional due date, edit them afterwards
//! - **Tag Sync**: full-snapshot reconciliation of Habitica tags into the local store
//! - **Credential Storage**: AES-256 encrypted API tokens at rest
//!
//! ## Usage
//!
//! ```rust,no_run
//! use doover::libs::{config::Config, logging, session::{Session, SessionController}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     logging::init();
//!     let config = Config::read()?;
//!     let mut controller = SessionController::from_config(&config, Session::default())?;
//!     controller.resume("6b2f0a37-user-id").await?;
//!     let tags = controller.sync_tags().await?;
//!     println!("{} tags", tags.len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod db;
pub mod libs;
