//! Request descriptors for the user API and the raw response type.
//!
//! The core treats an [`ApiRequest`] as opaque: it is built here, handed to a
//! [`RequestExecutor`](crate::executor::RequestExecutor), and the answer comes back as an
//! [`ApiResponse`] that is decoded with [`ApiResponse::json`].

use crate::model::{UserCreationParams, UserUpdateParams};
use crate::session::Session;
use crate::RosterError;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

const USERS_PATH: [&str; 2] = ["v3", "users"];

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four user-API operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRequest {
    /// `POST /v3/users`
    Create(UserCreationParams),
    /// `PUT /v3/users/{user_id}`
    Update(UserUpdateParams),
    /// `GET /v3/users/{user_id}`
    GetById(String),
    /// `GET /v3/users?limit={limit}&nickname={nickname}`
    ListByNickname { nickname: String, limit: u32 },
}

impl UserRequest {
    /// Operation name shared by every [`UserRequest::Create`], single or batched.
    pub const CREATE_OPERATION: &'static str = "create_user";

    pub fn method(&self) -> Method {
        match self {
            UserRequest::Create(_) => Method::Post,
            UserRequest::Update(_) => Method::Put,
            UserRequest::GetById(_) | UserRequest::ListByNickname { .. } => Method::Get,
        }
    }

    /// Path segments below the host, unencoded.
    pub fn path_segments(&self) -> Vec<&str> {
        let mut segments = USERS_PATH.to_vec();
        match self {
            UserRequest::Update(params) => segments.push(params.user_id.as_str()),
            UserRequest::GetById(user_id) => segments.push(user_id.as_str()),
            UserRequest::Create(_) | UserRequest::ListByNickname { .. } => {}
        }
        segments
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            UserRequest::ListByNickname { nickname, limit } => {
                vec![("limit", limit.to_string()), ("nickname", nickname.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// JSON body, if the operation carries one.
    pub fn body(&self) -> Result<Option<Vec<u8>>, RosterError> {
        let encoded = match self {
            UserRequest::Create(params) => serde_json::to_vec(params),
            UserRequest::Update(params) => serde_json::to_vec(params),
            UserRequest::GetById(_) | UserRequest::ListByNickname { .. } => return Ok(None),
        };
        encoded.map(Some).map_err(|e| RosterError::Request(format!("failed to encode body: {e}")))
    }

    /// Short operation name carried by log lines and telemetry events.
    pub fn operation(&self) -> &'static str {
        match self {
            UserRequest::Create(_) => Self::CREATE_OPERATION,
            UserRequest::Update(_) => "update_user",
            UserRequest::GetById(_) => "get_user",
            UserRequest::ListByNickname { .. } => "get_users",
        }
    }
}

/// A fully built request: method, URL, headers and optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Build the descriptor for `request` under the given session.
    ///
    /// `api_host` is a URL template; `{application_id}` is replaced with the session's id.
    pub fn build(
        session: &Session,
        api_host: &str,
        request: &UserRequest,
    ) -> Result<Self, RosterError> {
        if !session.is_initialized() {
            return Err(RosterError::Request("application has not been initialized".into()));
        }
        let base = api_host.replace("{application_id}", &session.application_id);
        let mut url = Url::parse(&base)
            .map_err(|e| RosterError::Request(format!("invalid base URL {base:?}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| RosterError::Request(format!("base URL {base:?} cannot carry a path")))?
            .clear()
            .extend(request.path_segments());
        let query = request.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("Api-Token".to_string(), session.api_token.clone());

        Ok(Self { method: request.method(), url, headers, body: request.body()? })
    }

    /// Path part of the URL.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// First value of a query parameter, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Raw response: status code plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    /// Response carrying a JSON document.
    pub fn from_json(status: u16, value: &serde_json::Value) -> Self {
        Self { status, body: value.to_string().into_bytes() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a 2xx body as `T`; other statuses fail with `Status`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RosterError> {
        if !self.is_success() {
            return Err(RosterError::Status(self.status));
        }
        serde_json::from_slice(&self.body).map_err(|e| RosterError::Decode(e.to_string()))
    }
}
