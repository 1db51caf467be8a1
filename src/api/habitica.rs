//! Habitica v3 HTTP client.
//!
//! One request per operation. URLs are built segment by segment, so ids are
//! percent-encoded and cannot escape their endpoint. Token-authenticated calls send `x-api-user`
//! and `x-api-key`, plus `x-client` when a client id is configured. Every
//! response body is the Habitica envelope `{"success": .., "data": ..}`; only
//! `data` is read.

use super::{ApiAuth, ApiError, ApiResult, Credentials, RemoteTag, Reply, TaskApi};
use crate::libs::messages::Message;
use crate::libs::task::PendingTask;
use crate::msg_debug;
use chrono::{DateTime, Local, SecondsFormat};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder, StatusCode, Url,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://habitica.com/api/v3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &[&str] = &["user", "auth", "local", "login"];
const USER_PATH: &[&str] = &["user"];
const CREATE_TASK_PATH: &[&str] = &["tasks", "user"];
const TASK_SEGMENT: &str = "tasks";
const TAGS_PATH: &[&str] = &["tags"];
const TODO_TYPE: &str = "todo";

const API_USER_HEADER: &str = "x-api-user";
const API_KEY_HEADER: &str = "x-api-key";
const CLIENT_HEADER: &str = "x-client";

#[derive(Serialize)]
struct LoginCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    id: String,
    username: String,
    api_token: String,
}

#[derive(Deserialize)]
struct UserData {
    profile: UserProfile,
}

#[derive(Deserialize)]
struct UserProfile {
    name: String,
}

#[derive(Deserialize)]
struct TaskData {
    id: String,
}

/// Request body for creating or editing a to-do.
///
/// `date` is left out entirely when the task has no deadline; Habitica reads a
/// missing field as "no due date".
#[derive(Debug, Serialize)]
pub struct TaskPayload<'a> {
    pub text: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub notes: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub priority: f64,
    pub tags: &'a BTreeSet<String>,
}

impl<'a> TaskPayload<'a> {
    pub fn for_create(task: &'a PendingTask, now: DateTime<Local>) -> Self {
        Self {
            kind: Some(TODO_TYPE),
            ..Self::for_edit(task, now)
        }
    }

    pub fn for_edit(task: &'a PendingTask, now: DateTime<Local>) -> Self {
        Self {
            text: &task.name,
            kind: None,
            notes: &task.notes,
            date: task.due_date(now).map(|due| due.to_rfc3339_opts(SecondsFormat::Millis, false)),
            priority: task.priority.weight(),
            tags: &task.tag_ids,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HabiticaConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Sent as `x-client`, Habitica's `<author-user-id>-<app-name>` identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for HabiticaConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            client_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Habitica {
    client: Client,
    config: HabiticaConfig,
}

impl Habitica {
    /// Builds the client. A `timeout_secs` of 0 falls back to [`DEFAULT_TIMEOUT_SECS`].
    pub fn new(config: &HabiticaConfig) -> Result<Self, ApiError> {
        let timeout_secs = match config.timeout_secs {
            0 => DEFAULT_TIMEOUT_SECS,
            secs => secs,
        };
        let client = Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(segment) = segments.iter().find(|s| s.is_empty() || **s == "." || **s == "..") {
            return Err(ApiError::Transport(format!("invalid path segment {:?}", segment)));
        }

        let invalid_base = || ApiError::Transport(format!("invalid api_url: {}", self.config.api_url));
        let mut url = Url::parse(&self.config.api_url).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.url(segments)?;
        msg_debug!(Message::HttpRequest {
            method: method.to_string(),
            path: url.path().to_string(),
        });

        let mut headers = HeaderMap::new();
        if let Some(client_id) = &self.config.client_id {
            headers.insert(HeaderName::from_static(CLIENT_HEADER), header_value(client_id)?);
        }
        Ok(self.client.request(method, url).headers(headers))
    }

    fn authed(&self, method: Method, segments: &[&str], auth: &ApiAuth) -> Result<RequestBuilder, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_USER_HEADER), header_value(&auth.user_id)?);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), header_value(&auth.api_token)?);
        Ok(self.request(method, segments)?.headers(headers))
    }

    async fn exchange<T: DeserializeOwned>(&self, request: RequestBuilder, expected: StatusCode) -> ApiResult<T> {
        let res = request.send().await?;
        let status = res.status();
        msg_debug!(Message::HttpResponse {
            path: res.url().path().to_string(),
            status: status.as_u16(),
        });

        if status != expected {
            return Err(ApiError::Rejected(status.as_u16()));
        }

        let envelope = res
            .json::<Envelope<T>>()
            .await
            .map_err(|_| ApiError::EmptyResponse(status.as_u16()))?;
        match envelope.data {
            Some(data) => Ok(Reply {
                status: status.as_u16(),
                data,
            }),
            None => Err(ApiError::EmptyResponse(status.as_u16())),
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|e| ApiError::Transport(format!("invalid header value: {}", e)))
}

impl TaskApi for Habitica {
    async fn authenticate_with_password(&self, username: &str, password: &str) -> ApiResult<Credentials> {
        let request = self.request(Method::POST, LOGIN_PATH)?.json(&LoginCredentials { username, password });
        let reply = self.exchange::<LoginData>(request, StatusCode::OK).await?;

        Ok(Reply {
            status: reply.status,
            data: Credentials {
                user_id: reply.data.id,
                username: reply.data.username,
                api_token: reply.data.api_token,
            },
        })
    }

    async fn authenticate_with_token(&self, auth: &ApiAuth) -> ApiResult<String> {
        let request = self.authed(Method::GET, USER_PATH, auth)?;
        let reply = self.exchange::<UserData>(request, StatusCode::OK).await?;

        Ok(Reply {
            status: reply.status,
            data: reply.data.profile.name,
        })
    }

    async fn create_task(&self, auth: &ApiAuth, task: &PendingTask) -> ApiResult<String> {
        let payload = TaskPayload::for_create(task, Local::now());
        let request = self.authed(Method::POST, CREATE_TASK_PATH, auth)?.json(&payload);
        let reply = self.exchange::<TaskData>(request, StatusCode::CREATED).await?;

        Ok(Reply {
            status: reply.status,
            data: reply.data.id,
        })
    }

    async fn edit_task(&self, auth: &ApiAuth, task: &PendingTask) -> ApiResult<String> {
        let payload = TaskPayload::for_edit(task, Local::now());
        let request = self.authed(Method::PUT, &[TASK_SEGMENT, task.task_id.as_str()], auth)?.json(&payload);
        let reply = self.exchange::<TaskData>(request, StatusCode::OK).await?;

        Ok(Reply {
            status: reply.status,
            data: reply.data.id,
        })
    }

    async fn list_tags(&self, auth: &ApiAuth) -> ApiResult<Vec<RemoteTag>> {
        let request = self.authed(Method::GET, TAGS_PATH, auth)?;
        self.exchange::<Vec<RemoteTag>>(request, StatusCode::OK).await
    }
}
