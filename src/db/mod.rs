//! Local SQLite store.
//!
//! Holds the users that have logged in (with their encrypted API tokens) and
//! the Habitica tags mirrored for each of them.
//!
//! ```rust,no_run
//! use doover::db::{db::Db, tags::{TagRecord, Tags}, users::{UserRecord, Users}};
//! use std::path::Path;
//!
//! let mut users = Users::with_db(Db::open(Path::new("doover.db"))?);
//! users.upsert(&UserRecord {
//!     user_id: "b0b".to_string(),
//!     username: "bob".to_string(),
//!     encrypted_api_token: b"...".to_vec(),
//! })?;
//!
//! let mut tags = Tags::with_db(Db::open(Path::new("doover.db"))?);
//! tags.upsert(&TagRecord::new("t1", "b0b", "home"))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Connection setup: opens the file, enables foreign keys, runs migrations.
pub mod db;

/// Versioned schema migrations.
pub mod migrations;

/// Tags mirrored from Habitica, keyed by Habitica tag id.
pub mod tags;

/// Users keyed by Habitica user id.
pub mod users;
