//! User records and the parameter types used to create or update them.
//!
//! Field names match the wire format (`user_id`, `nickname`, `profile_url`), so the serde
//! derives need no renames.

use serde::{Deserialize, Serialize};

/// A user record as returned by the remote API and held in the cache.
///
/// `user_id` is the primary key. Records are only ever replaced whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub user_id: String,
    /// Display name; not unique.
    pub nickname: String,
    /// Optional avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}

impl User {
    /// Build a record without a profile URL.
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), nickname: nickname.into(), profile_url: None }
    }

    /// Attach a profile URL.
    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = Some(url.into());
        self
    }
}

/// Parameters for `POST /v3/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreationParams {
    pub user_id: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}

impl UserCreationParams {
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), nickname: nickname.into(), profile_url: None }
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = Some(url.into());
        self
    }
}

/// Parameters for `PUT /v3/users/{user_id}`.
///
/// Unset fields are left out of the request body and keep their server-side value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdateParams {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}

impl UserUpdateParams {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), nickname: None, profile_url: None }
    }

    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = Some(url.into());
        self
    }
}

/// Body of the list endpoint: `{"users": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub users: Vec<User>,
}
