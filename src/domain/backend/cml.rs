use async_trait::async_trait;
use std::time::Duration;

use crate::api::cml_dto::CmlAuthRequestDto;
use crate::domain::backend::endpoint::CmlEndpoint;
use crate::domain::backend::{LabBackend, Session, SessionToken};
use crate::domain::ids::LabId;
use crate::domain::lab_state::RawLabState;
use crate::domain::server::{Server, ServerKind};
use crate::error::{BackendError, BackendResult, Error, Result};

/// Client for the commercial simulator.
///
/// Start and stop exist as lab-level verbs here, and the controller enforces
/// nothing about concurrent labs; that is the exclusivity enforcer's job.
#[derive(Debug)]
pub struct CmlBackend {
    client: reqwest::Client,
    timeout: Duration,
}

impl CmlBackend {
    pub fn new(timeout: Duration) -> Result<Self> {
        // Lab controllers ship self-signed certificates.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::InvalidConfigError(format!("could not build HTTP client: {e}")))?;

        Ok(CmlBackend { client, timeout })
    }

    fn request(&self, method: reqwest::Method, session: &Session, endpoint: CmlEndpoint<'_>) -> reqwest::RequestBuilder {
        session.apply(self.client.request(method, format!("{}{}", session.base_url, endpoint.path())))
    }

    async fn send(&self, builder: reqwest::RequestBuilder, context: &str) -> BackendResult<reqwest::Response> {
        let response = builder.send().await.map_err(|e| BackendError::from_transport(e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::from_status(status, context));
        }
        Ok(response)
    }
}

#[async_trait]
impl LabBackend for CmlBackend {
    fn kind(&self) -> ServerKind {
        ServerKind::Cml
    }

    async fn authenticate(&self, server: &Server) -> BackendResult<Session> {
        let url = format!("{}{}", server.base_url(), CmlEndpoint::Authenticate.path());
        let body = CmlAuthRequestDto { username: server.username.clone(), password: server.password.clone() };

        let response = self
            .send(self.client.post(url).json(&body), &format!("authenticate as '{}' against {}", server.username, server.address))
            .await?;

        // The controller answers with a bare JSON string holding the token.
        let token: String = response
            .json()
            .await
            .map_err(|e| BackendError::Unknown(format!("authenticate against {}: malformed token response: {e}", server.address)))?;

        Ok(Session::new(server, SessionToken::Bearer(token)))
    }

    async fn logout(&self, session: &Session) {
        let result = self.send(self.request(reqwest::Method::POST, session, CmlEndpoint::Logout), "logout").await;
        if let Err(e) = result {
            log::warn!("server {}: logout failed (session {}): {}", session.server_id, session.id, e);
        }
    }

    async fn list_labs(&self, session: &Session) -> BackendResult<Vec<LabId>> {
        let response =
            self.send(self.request(reqwest::Method::GET, session, CmlEndpoint::Labs), &format!("list labs on server {}", session.server_id)).await?;

        let ids: Vec<String> = response
            .json()
            .await
            .map_err(|e| BackendError::Unknown(format!("list labs on server {}: malformed response: {e}", session.server_id)))?;

        Ok(ids.into_iter().map(LabId::new).collect())
    }

    async fn lab_state(&self, session: &Session, lab: &LabId) -> BackendResult<RawLabState> {
        let context = format!("state of lab '{}' on server {}", lab, session.server_id);
        let response = self.send(self.request(reqwest::Method::GET, session, CmlEndpoint::LabState(lab.as_str())), &context).await?;

        let state: String = response.json().await.map_err(|e| BackendError::Unknown(format!("{context}: malformed response: {e}")))?;

        Ok(RawLabState::Text(state))
    }

    async fn start_lab(&self, session: &Session, lab: &LabId) -> BackendResult<()> {
        let context = format!("start lab '{}' on server {}", lab, session.server_id);
        self.send(self.request(reqwest::Method::PUT, session, CmlEndpoint::StartLab(lab.as_str())), &context).await?;
        Ok(())
    }

    async fn stop_lab(&self, session: &Session, lab: &LabId) -> BackendResult<()> {
        let context = format!("stop lab '{}' on server {}", lab, session.server_id);
        self.send(self.request(reqwest::Method::PUT, session, CmlEndpoint::StopLab(lab.as_str())), &context).await?;
        Ok(())
    }
}
