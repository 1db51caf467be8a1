//! Remote task API.
//!
//! [`TaskApi`] is the seam between the session controller and the network:
//! [`habitica::Habitica`] implements it over HTTP, tests implement it with
//! scripted replies. Every call reports the HTTP status it saw, on success
//! through [`Reply::status`] and on failure through [`ApiError::status`], so
//! the caller can keep it for diagnostics.

use crate::libs::task::PendingTask;
use serde::Deserialize;
use thiserror::Error;

pub mod habitica;

pub use habitica::{Habitica, HabiticaConfig};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Any status other than the one the endpoint answers on success.
    #[error("request rejected with HTTP {0}")]
    Rejected(u16),
    /// Success status, but the body lacked the expected `data`.
    #[error("HTTP {0} response carried no data")]
    EmptyResponse(u16),
    /// No HTTP response at all (connection, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected(status) | ApiError::EmptyResponse(status) => Some(*status),
            ApiError::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Transport(error.to_string())
    }
}

/// A successful exchange: the status received and the extracted payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub status: u16,
    pub data: T,
}

pub type ApiResult<T> = Result<Reply<T>, ApiError>;

/// Header-based credentials for token-authenticated calls.
#[derive(Clone)]
pub struct ApiAuth {
    pub user_id: String,
    pub api_token: String,
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAuth").field("user_id", &self.user_id).finish_non_exhaustive()
    }
}

/// Identity returned by a password login.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub user_id: String,
    pub username: String,
    pub api_token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTag {
    #[serde(rename = "id")]
    pub tag_id: String,
    pub name: String,
}

impl RemoteTag {
    pub fn new(tag_id: &str, name: &str) -> Self {
        Self {
            tag_id: tag_id.to_string(),
            name: name.to_string(),
        }
    }
}

/// The remote operations the session controller relies on.
#[allow(async_fn_in_trait)]
pub trait TaskApi {
    /// `POST /user/auth/local/login`; success iff HTTP 200.
    async fn authenticate_with_password(&self, username: &str, password: &str) -> ApiResult<Credentials>;

    /// `GET /user`; success iff HTTP 200. Returns the profile name.
    async fn authenticate_with_token(&self, auth: &ApiAuth) -> ApiResult<String>;

    /// `POST /tasks/user`; success iff HTTP 201. Returns the new task id.
    async fn create_task(&self, auth: &ApiAuth, task: &PendingTask) -> ApiResult<String>;

    /// `PUT /tasks/{id}`; success iff HTTP 200. Returns the task id.
    async fn edit_task(&self, auth: &ApiAuth, task: &PendingTask) -> ApiResult<String>;

    /// `GET /tags`; success iff HTTP 200.
    async fn list_tags(&self, auth: &ApiAuth) -> ApiResult<Vec<RemoteTag>>;
}
