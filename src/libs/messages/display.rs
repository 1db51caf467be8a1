//! Display implementation for doover messages.
//!
//! All message wording is defined here so that log lines, console output and
//! error texts stay consistent across the crate.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === AUTHENTICATION MESSAGES ===
            Message::LoginSucceeded(username) => format!("Logged in as {}", username),
            Message::TokenLoginSucceeded(username) => format!("Logged in as {} with a stored API token", username),
            Message::LoginRejected(status) => format!("Login rejected by Habitica (HTTP {})", status),
            Message::TokenLoginRejected(status) => format!("Stored API token rejected by Habitica (HTTP {})", status),
            Message::CredentialsNotSet => "User ID and API token must be set before logging in with an API key".to_string(),
            Message::NotLoggedIn => "You must be logged in to do that".to_string(),
            Message::UserNotFound(id) => format!("User {} not found", id),

            // === TASK MESSAGES ===
            Message::TaskCreated(id) => format!("Task {} created", id),
            Message::TaskUpdated(id) => format!("Task {} updated", id),
            Message::TaskIdMissing => "Task has no ID yet, create it before editing".to_string(),
            Message::TaskRejected(status) => format!("Task request rejected by Habitica (HTTP {})", status),

            // === TAG MESSAGES ===
            Message::TagUpserted { id, text } => format!("Stored tag {} ({})", id, text),
            Message::TagDeleted(id) => format!("Deleting tag {}", id),
            Message::TagNotFound(id) => format!("Tag {} not found", id),
            Message::TagsSynced { upserted, deleted } => format!("Tags synced: {} stored, {} deleted", upserted, deleted),
            Message::TagListRejected(status) => format!("Tag list request rejected by Habitica (HTTP {})", status),
            Message::EmptyTagListRejected => "Habitica returned no tags, local tags left untouched".to_string(),
            Message::EmptyTagListWipes(count) => format!("Habitica returned no tags, removing {} local tag(s)", count),

            // === HTTP MESSAGES ===
            Message::HttpRequest { method, path } => format!("{} {}", method, path),
            Message::HttpResponse { path, status } => format!("{} answered HTTP {}", path, status),

            // === DATABASE MESSAGES ===
            Message::MigrationApplying { version, name } => format!("Applying migration v{}: {}", version, name),
            Message::MigrationApplied(version) => format!("Migration v{} applied", version),
            Message::DbVersion(version) => format!("Database schema version: {}", version),

            // === CONFIGURATION MESSAGES ===
            Message::ConfigDefaultsUsed => "No configuration file found, using defaults".to_string(),
            Message::ConfigSaved(path) => format!("Configuration saved to {}", path),
        };
        write!(f, "{}", text)
    }
}
