//! Session controller.
//!
//! A [`Session`] starts `Anonymous` and becomes `Authenticated` after a
//! successful password or API-token login. Every other operation needs an
//! authenticated session and fails fast with
//! [`SessionError::PreconditionViolation`] otherwise.
//!
//! Remote failures never escape as panics: each operation returns a single
//! `Result`, and the last HTTP status seen is kept on the session for
//! diagnostics.
//!
//! ```rust,no_run
//! use doover::libs::config::Config;
//! use doover::libs::session::{Session, SessionController};
//! use doover::libs::task::{PendingTask, Priority};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::read()?;
//! let mut controller = SessionController::from_config(&config, Session::new("kirska"))?;
//! controller.login("hunter2").await?;
//!
//! let mut task = PendingTask::new("Clean the garage", "", 7, Priority::Medium);
//! controller.create_task(&mut task).await?;
//! controller.sync_tags().await?;
//! # Ok(())
//! # }
//! ```

use crate::api::{ApiAuth, ApiError, ApiResult, Habitica, RemoteTag, TaskApi};
use crate::db::db::Db;
use crate::db::tags::{TagRecord, Tags};
use crate::db::users::{UserRecord, Users};
use crate::libs::config::{Config, EmptyTagPolicy};
use crate::libs::messages::Message;
use crate::libs::reconcile::Reconciliation;
use crate::libs::secret::{Cipher, CipherError};
use crate::libs::task::PendingTask;
use crate::{msg_debug, msg_info, msg_success, msg_warning};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Which requirement an operation found unmet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    NotLoggedIn,
    MissingCredentials,
    MissingTaskId,
    UnknownUser(String),
}

impl Display for Precondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let message = match self {
            Precondition::NotLoggedIn => Message::NotLoggedIn,
            Precondition::MissingCredentials => Message::CredentialsNotSet,
            Precondition::MissingTaskId => Message::TaskIdMissing,
            Precondition::UnknownUser(user_id) => Message::UserNotFound(user_id.clone()),
        };
        write!(f, "{}", message)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("remote rejected the request with HTTP {0}")]
    RemoteRejected(u16),
    #[error("remote answered without the expected data")]
    EmptyResponse,
    #[error("could not recover the API token: {0}")]
    Decryption(#[from] CipherError),
    #[error("{0}")]
    PreconditionViolation(Precondition),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("local store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<ApiError> for SessionError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Rejected(status) => SessionError::RemoteRejected(status),
            ApiError::EmptyResponse(_) => SessionError::EmptyResponse,
            ApiError::Transport(reason) => SessionError::Transport(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated,
}

/// Identity and state of one login session.
///
/// Only the controller mutates a session; callers read it through accessors.
#[derive(Debug, Clone, Default)]
pub struct Session {
    username: String,
    user_id: String,
    encrypted_api_token: Vec<u8>,
    state: SessionState,
    last_http_status: Option<u16>,
}

impl Session {
    /// A session that will log in with a password.
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Self::default()
        }
    }

    /// A session that will log in with a previously stored API token.
    pub fn restore(user_id: &str, encrypted_api_token: Vec<u8>) -> Self {
        Self {
            user_id: user_id.to_string(),
            encrypted_api_token,
            ..Self::default()
        }
    }

    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone(),
            ..Self::restore(&record.user_id, record.encrypted_api_token.clone())
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn encrypted_api_token(&self) -> &[u8] {
        &self.encrypted_api_token
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Status of the most recent remote call; `None` before any call or after
    /// a call that got no HTTP response.
    pub fn last_http_status(&self) -> Option<u16> {
        self.last_http_status
    }
}

pub struct SessionController<A> {
    api: A,
    cipher: Cipher,
    users: Users,
    tags: Tags,
    empty_tags: EmptyTagPolicy,
    session: Session,
}

impl SessionController<Habitica> {
    /// Builds a controller talking to Habitica with the configured codec and store.
    pub fn from_config(config: &Config, session: Session) -> anyhow::Result<Self> {
        let api = Habitica::new(&config.habitica())?;
        let cipher = config.cipher()?;
        let (users, tags) = match config.database_path() {
            Some(path) => (Users::with_db(Db::open(path)?), Tags::with_db(Db::open(path)?)),
            None => (Users::new()?, Tags::new()?),
        };

        Ok(Self::new(api, cipher, users, tags, session).with_empty_tag_policy(config.empty_tag_policy()))
    }
}

impl<A: TaskApi> SessionController<A> {
    pub fn new(api: A, cipher: Cipher, users: Users, tags: Tags, session: Session) -> Self {
        Self {
            api,
            cipher,
            users,
            tags,
            empty_tags: EmptyTagPolicy::default(),
            session,
        }
    }

    pub fn with_empty_tag_policy(mut self, policy: EmptyTagPolicy) -> Self {
        self.empty_tags = policy;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Logs in with the session's username and `password`.
    ///
    /// On success the API token is encrypted, the user is upserted and the
    /// session becomes authenticated. On failure the session is left
    /// anonymous and nothing is written.
    pub async fn login(&mut self, password: &str) -> Result<(), SessionError> {
        self.session.state = SessionState::Anonymous;

        let outcome = self.api.authenticate_with_password(&self.session.username, password).await;
        let credentials = self.record(outcome).inspect_err(|e| {
            if let SessionError::RemoteRejected(status) = e {
                msg_warning!(Message::LoginRejected(*status));
            }
        })?;

        let encrypted_api_token = self.cipher.encrypt_token(&credentials.api_token)?;
        self.users.upsert(&UserRecord {
            user_id: credentials.user_id.clone(),
            username: credentials.username.clone(),
            encrypted_api_token: encrypted_api_token.clone(),
        })?;

        self.session.user_id = credentials.user_id;
        self.session.username = credentials.username;
        self.session.encrypted_api_token = encrypted_api_token;
        self.session.state = SessionState::Authenticated;
        msg_success!(Message::LoginSucceeded(self.session.username.clone()));
        Ok(())
    }

    /// Logs in with the user id and encrypted API token already on the session.
    pub async fn login_with_api_key(&mut self) -> Result<(), SessionError> {
        self.session.state = SessionState::Anonymous;
        if self.session.user_id.is_empty() || self.session.encrypted_api_token.is_empty() {
            return Err(SessionError::PreconditionViolation(Precondition::MissingCredentials));
        }

        let auth = self.auth()?;
        let outcome = self.api.authenticate_with_token(&auth).await;
        let username = self.record(outcome).inspect_err(|e| {
            if let SessionError::RemoteRejected(status) = e {
                msg_warning!(Message::TokenLoginRejected(*status));
            }
        })?;

        self.users.upsert(&UserRecord {
            user_id: self.session.user_id.clone(),
            username: username.clone(),
            encrypted_api_token: self.session.encrypted_api_token.clone(),
        })?;

        self.session.username = username;
        self.session.state = SessionState::Authenticated;
        msg_success!(Message::TokenLoginSucceeded(self.session.username.clone()));
        Ok(())
    }

    /// Restores the stored login of `user_id` and re-authenticates with its token.
    pub async fn resume(&mut self, user_id: &str) -> Result<(), SessionError> {
        let record = self
            .users
            .get(user_id)?
            .ok_or_else(|| SessionError::PreconditionViolation(Precondition::UnknownUser(user_id.to_string())))?;

        self.session = Session::from_record(&record);
        self.login_with_api_key().await
    }

    /// Creates `task` remotely and stores the id Habitica assigned on it.
    pub async fn create_task(&mut self, task: &mut PendingTask) -> Result<String, SessionError> {
        self.require_login()?;
        let auth = self.auth()?;

        let outcome = self.api.create_task(&auth, task).await;
        let task_id = self.record(outcome).inspect_err(Self::warn_task_rejected)?;

        task.task_id = task_id.clone();
        msg_info!(Message::TaskCreated(task_id.clone()));
        Ok(task_id)
    }

    /// Pushes the current fields of an already created `task`.
    pub async fn edit_task(&mut self, task: &mut PendingTask) -> Result<String, SessionError> {
        self.require_login()?;
        if !task.is_created() {
            return Err(SessionError::PreconditionViolation(Precondition::MissingTaskId));
        }
        let auth = self.auth()?;

        let outcome = self.api.edit_task(&auth, task).await;
        let task_id = self.record(outcome).inspect_err(Self::warn_task_rejected)?;

        task.task_id = task_id.clone();
        msg_info!(Message::TaskUpdated(task_id.clone()));
        Ok(task_id)
    }

    /// Mirrors the user's Habitica tags into the local store.
    ///
    /// Every remote tag is upserted, then local tags Habitica no longer
    /// reports are deleted. A failure part-way leaves the store partially
    /// updated; running the sync again completes it.
    pub async fn sync_tags(&mut self) -> Result<Vec<RemoteTag>, SessionError> {
        self.require_login()?;
        let auth = self.auth()?;

        let outcome = self.api.list_tags(&auth).await;
        let remote = self.record(outcome).inspect_err(|e| {
            if let SessionError::RemoteRejected(status) = e {
                msg_warning!(Message::TagListRejected(*status));
            }
        })?;

        let owner = self.session.user_id.clone();
        let local = self.tags.ids_for_owner(&owner)?;
        if remote.is_empty() {
            match self.empty_tags {
                EmptyTagPolicy::Reject => {
                    msg_warning!(Message::EmptyTagListRejected);
                    return Err(SessionError::EmptyResponse);
                }
                EmptyTagPolicy::Wipe => msg_warning!(Message::EmptyTagListWipes(local.len())),
            }
        }

        let report = Reconciliation::between(local, &remote, |tag: &RemoteTag| tag.tag_id.clone()).apply(
            &mut self.tags,
            |tags, tag| {
                tags.upsert(&TagRecord::new(&tag.tag_id, &owner, &tag.name))?;
                msg_debug!(Message::TagUpserted {
                    id: tag.tag_id.clone(),
                    text: tag.name.clone(),
                });
                Ok(())
            },
            |tags, tag_id| {
                msg_debug!(Message::TagDeleted(tag_id.clone()));
                tags.delete_if_exists(tag_id).map(|_| ())
            },
        )?;

        msg_info!(Message::TagsSynced {
            upserted: report.upserted,
            deleted: report.deleted,
        });
        Ok(remote)
    }

    fn require_login(&self) -> Result<(), SessionError> {
        match self.session.state {
            SessionState::Authenticated => Ok(()),
            SessionState::Anonymous => Err(SessionError::PreconditionViolation(Precondition::NotLoggedIn)),
        }
    }

    fn auth(&self) -> Result<ApiAuth, SessionError> {
        let api_token = self.cipher.decrypt_token(&self.session.encrypted_api_token)?;
        Ok(ApiAuth {
            user_id: self.session.user_id.clone(),
            api_token,
        })
    }

    /// Keeps the status of `outcome` on the session and unwraps its payload.
    fn record<T>(&mut self, outcome: ApiResult<T>) -> Result<T, SessionError> {
        match outcome {
            Ok(reply) => {
                self.session.last_http_status = Some(reply.status);
                Ok(reply.data)
            }
            Err(error) => {
                self.session.last_http_status = error.status();
                Err(error.into())
            }
        }
    }

    fn warn_task_rejected(error: &SessionError) {
        if let SessionError::RemoteRejected(status) = error {
            msg_warning!(Message::TaskRejected(*status));
        }
    }
}
