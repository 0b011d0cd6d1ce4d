pub mod cml;
pub mod endpoint;
pub mod eve;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::ids::{LabId, ServerId};
use crate::domain::lab_state::RawLabState;
use crate::domain::server::{Server, ServerKind};
use crate::error::{BackendResult, Result};

/// Credential artifact carried by a session, attached to every call.
#[derive(Debug, Clone)]
pub enum SessionToken {
    /// `Authorization: Bearer <token>` (family CML).
    Bearer(String),
    /// Raw `Cookie` header value (family EVE).
    Cookie(String),
}

/// A short-lived authenticated handle to one server.
///
/// Obtained per authentication call, held exclusively by the operation
/// sequence that created it, and never shared across concurrent sequences:
/// each sequence authenticates on its own, accepting the extra round trip as
/// the price of safety. Never persisted.
#[derive(Debug, Clone)]
pub struct Session {
    /// Correlation id for log lines belonging to one operation sequence.
    pub id: Uuid,
    pub server_id: ServerId,
    pub base_url: String,
    pub token: SessionToken,
}

impl Session {
    pub fn new(server: &Server, token: SessionToken) -> Self {
        Session { id: Uuid::new_v4(), server_id: server.id, base_url: server.base_url(), token }
    }

    /// Attaches this session's credential artifact to a request.
    pub fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            SessionToken::Bearer(token) => builder.bearer_auth(token),
            SessionToken::Cookie(cookie) => builder.header(reqwest::header::COOKIE, cookie.clone()),
        }
    }
}

/// The per-family backend capability: authenticate, read state, start, stop.
///
/// One implementation per backend family. Family differences (lab-level
/// verbs on CML versus per-node aggregation on EVE) live entirely inside
/// the implementations; the scheduler only sees this contract.
#[async_trait]
pub trait LabBackend: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> ServerKind;

    /// Authenticates against the server and returns a fresh session.
    /// Bounded by the configured network timeout; failures are classified,
    /// never raised as unstructured faults.
    async fn authenticate(&self, server: &Server) -> BackendResult<Session>;

    /// Best-effort session invalidation. Failures are logged, never escalated.
    async fn logout(&self, session: &Session);

    async fn list_labs(&self, session: &Session) -> BackendResult<Vec<LabId>>;

    /// Returns the family-specific raw state of one lab, `NotFound` if the
    /// lab vanished.
    async fn lab_state(&self, session: &Session, lab: &LabId) -> BackendResult<RawLabState>;

    async fn start_lab(&self, session: &Session, lab: &LabId) -> BackendResult<()>;

    async fn stop_lab(&self, session: &Session, lab: &LabId) -> BackendResult<()>;
}

/// One shared backend client per family.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: HashMap<ServerKind, Arc<dyn LabBackend>>,
}

impl BackendRegistry {
    /// Builds the production registry with one HTTP client per family.
    pub fn with_defaults(timeout: Duration) -> Result<Self> {
        let cml: Arc<dyn LabBackend> = Arc::new(cml::CmlBackend::new(timeout)?);
        let eve: Arc<dyn LabBackend> = Arc::new(eve::EveBackend::new(timeout)?);
        Ok(Self::new(vec![cml, eve]))
    }

    /// Builds a registry from arbitrary implementations (fakes in tests).
    pub fn new(backends: Vec<Arc<dyn LabBackend>>) -> Self {
        BackendRegistry { backends: backends.into_iter().map(|b| (b.kind(), b)).collect() }
    }

    pub fn backend_for(&self, kind: ServerKind) -> Option<Arc<dyn LabBackend>> {
        self.backends.get(&kind).cloned()
    }
}
