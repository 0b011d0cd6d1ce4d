use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /api/auth/login`. The `html5` field is required by the
/// product even though this client never opens an HTML5 console.
#[derive(Debug, Serialize)]
pub struct EveLoginRequestDto {
    pub username: String,
    pub password: String,
    pub html5: String,
}

impl EveLoginRequestDto {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        EveLoginRequestDto { username: username.into(), password: password.into(), html5: "-1".to_string() }
    }
}

/// Standard EVE response envelope: `{"code": 200, "status": "success", "data": ...}`.
#[derive(Debug, Deserialize)]
pub struct EveResponseDto<T> {
    pub code: i64,

    #[serde(default)]
    pub status: Option<String>,

    pub data: Option<T>,
}

/// One node as returned by `GET /api/labs/{lab}/nodes`.
#[derive(Debug, Clone, Deserialize)]
pub struct EveNodeDto {
    #[serde(default)]
    pub name: String,

    /// Raw status code; `0` is stopped, `2` is running.
    pub status: i64,
}

/// The node map is keyed by node id.
pub type EveNodeMapDto = HashMap<String, EveNodeDto>;
