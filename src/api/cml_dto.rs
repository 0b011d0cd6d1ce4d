use serde::Serialize;

/// Body of `POST /api/v0/authenticate`. The response is a bare JSON string
/// holding the bearer token, so it needs no DTO of its own.
#[derive(Debug, Serialize)]
pub struct CmlAuthRequestDto {
    pub username: String,
    pub password: String,
}
