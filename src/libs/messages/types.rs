/// Every user-facing text the crate emits, keyed by what happened.
///
/// Variants carry the values interpolated into the text; the wording lives in
/// the `Display` implementation in `display.rs`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // === AUTHENTICATION MESSAGES ===
    LoginSucceeded(String),      // username
    TokenLoginSucceeded(String), // username
    LoginRejected(u16),          // HTTP status
    TokenLoginRejected(u16),     // HTTP status
    CredentialsNotSet,
    NotLoggedIn,
    UserNotFound(String), // user id

    // === TASK MESSAGES ===
    TaskCreated(String), // task id
    TaskUpdated(String), // task id
    TaskIdMissing,
    TaskRejected(u16), // HTTP status

    // === TAG MESSAGES ===
    TagUpserted { id: String, text: String },
    TagDeleted(String),  // tag id
    TagNotFound(String), // tag id
    TagsSynced { upserted: usize, deleted: usize },
    TagListRejected(u16), // HTTP status
    EmptyTagListRejected,
    EmptyTagListWipes(usize), // local tag count

    // === HTTP MESSAGES ===
    HttpRequest { method: String, path: String },
    HttpResponse { path: String, status: u16 },

    // === DATABASE MESSAGES ===
    MigrationApplying { version: u32, name: String },
    MigrationApplied(u32),
    DbVersion(u32),

    // === CONFIGURATION MESSAGES ===
    ConfigDefaultsUsed,
    ConfigSaved(String), // path
}
