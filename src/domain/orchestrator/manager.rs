use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::backend::{BackendRegistry, LabBackend, Session};
use crate::domain::ids::{LabId, ServerId};
use crate::domain::lab_state::{CanonicalState, normalize};
use crate::domain::orchestrator::decision::SchedulerPolicy;
use crate::domain::orchestrator::exclusivity::ensure_only_running;
use crate::domain::server::Server;
use crate::domain::server_directory::ServerDirectory;
use crate::error::{BackendError, BackendResult, Error, Result};

/// Outcome surface for peripheral callers (web screens, remote console).
///
/// Always a (success, reason) pair; no fault from the backend layer ever
/// reaches those callers unhandled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpReport {
    pub ok: bool,
    pub reason: Option<String>,
}

impl OpReport {
    pub fn success() -> Self {
        OpReport { ok: true, reason: None }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        OpReport { ok: false, reason: Some(reason.into()) }
    }
}

/// The two lifecycle transitions a sequence can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Start => write!(f, "start"),
            Verb::Stop => write!(f, "stop"),
        }
    }
}

/// How a start/stop sequence ended when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// A command was issued and acknowledged.
    Acted,

    /// The lab was already in the requested state; no command was issued.
    AlreadyInState,

    /// The lab reported an unmapped state; nothing was done (fail-safe).
    SkippedUnknown,
}

/// One async lock per physical server.
///
/// Two sequences targeting the same server must not interleave their remote
/// calls: the exclusivity check's list-then-stop is not atomic against a
/// concurrent start. Sequences on different servers proceed concurrently.
#[derive(Debug, Default)]
pub struct ServerLocks {
    inner: StdMutex<HashMap<ServerId, Arc<AsyncMutex<()>>>>,
}

impl ServerLocks {
    pub fn for_server(&self, id: ServerId) -> Arc<AsyncMutex<()>> {
        let mut guard = self.inner.lock().expect("Mutex poisoned");
        guard.entry(id).or_default().clone()
    }
}

/// Drives idempotent start/stop transitions against the backends.
///
/// Holds no session state between operations: every sequence authenticates,
/// acts, and logs out on its own, so sequences never share credentials even
/// when they race on different servers.
#[derive(Debug)]
pub struct LabManager {
    servers: Arc<dyn ServerDirectory>,
    backends: BackendRegistry,
    policy: SchedulerPolicy,
    locks: ServerLocks,
}

impl LabManager {
    pub fn new(servers: Arc<dyn ServerDirectory>, backends: BackendRegistry, policy: SchedulerPolicy) -> Self {
        LabManager { servers, backends, policy, locks: ServerLocks::default() }
    }

    fn resolve(&self, server_id: ServerId) -> Result<(Server, Arc<dyn LabBackend>)> {
        let server = self.servers.get(server_id).ok_or(Error::UnknownServerError(server_id))?;
        let backend = self
            .backends
            .backend_for(server.kind)
            .ok_or_else(|| Error::InvalidConfigError(format!("no backend registered for family {}", server.kind)))?;
        Ok((server, backend))
    }

    /// Starts a lab, serialized against every other sequence on the same
    /// server. Already running reports success without issuing a command.
    pub async fn start_lab(&self, server_id: ServerId, lab: &LabId) -> OpReport {
        self.run_locked(server_id, lab, Verb::Start).await
    }

    /// Stops a lab. Already stopped reports success without issuing a command.
    pub async fn stop_lab(&self, server_id: ServerId, lab: &LabId) -> OpReport {
        self.run_locked(server_id, lab, Verb::Stop).await
    }

    async fn run_locked(&self, server_id: ServerId, lab: &LabId, verb: Verb) -> OpReport {
        let (server, backend) = match self.resolve(server_id) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("{verb} of lab '{lab}' failed: {e}");
                return OpReport::failure(e.to_string());
            }
        };

        let lock = self.locks.for_server(server_id);
        let _guard = lock.lock().await;

        let outcome = async {
            let session = backend.authenticate(&server).await?;
            let result = self.run_sequence(&server, backend.as_ref(), &session, lab, verb).await;
            backend.logout(&session).await;
            result
        }
        .await;

        match outcome {
            Ok(SequenceOutcome::SkippedUnknown) => {
                OpReport::failure(format!("lab '{lab}' on server {server_id} reports an unmapped state; refusing to act"))
            }
            Ok(_) => OpReport::success(),
            Err(e) => {
                log::error!("{verb} of lab '{lab}' on server {server_id} failed: {e}");
                OpReport::failure(e.to_string())
            }
        }
    }

    /// The sequence body, entered with the server lock held and a fresh
    /// session: read the state, short-circuit when already there, otherwise
    /// clear the server (starts on exclusive families) and issue the command.
    async fn run_sequence(
        &self,
        server: &Server,
        backend: &dyn LabBackend,
        session: &Session,
        lab: &LabId,
        verb: Verb,
    ) -> BackendResult<SequenceOutcome> {
        let raw = backend.lab_state(session, lab).await?;
        let state = normalize(server.kind, &raw);

        if state == CanonicalState::Unknown {
            log::error!("server {}: lab '{}' reports unmapped state {}, taking no action", server.id, lab, raw);
            return Ok(SequenceOutcome::SkippedUnknown);
        }

        match verb {
            Verb::Start => {
                if state == CanonicalState::Running {
                    log::info!("server {}: lab '{}' already running", server.id, lab);
                    return Ok(SequenceOutcome::AlreadyInState);
                }
                if self.policy.is_exclusive(server.kind) {
                    ensure_only_running(backend, session, server, lab).await?;
                }
                backend.start_lab(session, lab).await?;
                log::info!("server {}: lab '{}' started", server.id, lab);
            }
            Verb::Stop => {
                if state == CanonicalState::Stopped {
                    log::info!("server {}: lab '{}' already stopped", server.id, lab);
                    return Ok(SequenceOutcome::AlreadyInState);
                }
                backend.stop_lab(session, lab).await?;
                log::info!("server {}: lab '{}' stopped", server.id, lab);
            }
        }

        Ok(SequenceOutcome::Acted)
    }

    /// Stops every running lab on a server, aggregating to one report.
    pub async fn stop_all_labs(&self, server_id: ServerId) -> OpReport {
        let (server, backend) = match self.resolve(server_id) {
            Ok(pair) => pair,
            Err(e) => return OpReport::failure(e.to_string()),
        };

        let lock = self.locks.for_server(server_id);
        let _guard = lock.lock().await;

        let result = async {
            let session = backend.authenticate(&server).await?;

            let result = async {
                let labs = backend.list_labs(&session).await?;
                let mut failed: Vec<String> = Vec::new();

                for lab in &labs {
                    if let Err(e) = self.run_sequence(&server, backend.as_ref(), &session, lab, Verb::Stop).await {
                        log::error!("server {}: stop of lab '{}' failed: {}", server.id, lab, e);
                        failed.push(lab.to_string());
                    }
                }

                if failed.is_empty() { Ok(labs.len()) } else { Err(BackendError::PartialFailure { total: labs.len(), failed }) }
            }
            .await;

            backend.logout(&session).await;
            result
        }
        .await;

        match result {
            Ok(count) => {
                log::info!("server {}: all {} labs confirmed stopped", server_id, count);
                OpReport::success()
            }
            Err(e) => OpReport::failure(e.to_string()),
        }
    }

    /// Canonical state of one lab, for the read-only peripheral callers.
    pub async fn canonical_state(&self, server_id: ServerId, lab: &LabId) -> Result<CanonicalState> {
        let (server, backend) = self.resolve(server_id)?;

        let session = backend.authenticate(&server).await?;
        let raw = backend.lab_state(&session, lab).await;
        backend.logout(&session).await;

        Ok(normalize(server.kind, &raw?))
    }

    /// Every lab on a server with its canonical state, for status screens.
    pub async fn lab_overview(&self, server_id: ServerId) -> Result<Vec<(LabId, CanonicalState)>> {
        let (server, backend) = self.resolve(server_id)?;

        let session = backend.authenticate(&server).await?;
        let result = async {
            let labs = backend.list_labs(&session).await?;
            let mut overview = Vec::with_capacity(labs.len());
            for lab in labs {
                let state = match backend.lab_state(&session, &lab).await {
                    Ok(raw) => normalize(server.kind, &raw),
                    Err(BackendError::NotFound(_)) => continue,
                    Err(e) => return Err(e),
                };
                overview.push((lab, state));
            }
            Ok(overview)
        }
        .await;
        backend.logout(&session).await;

        Ok(result?)
    }

    pub fn policy(&self) -> &SchedulerPolicy {
        &self.policy
    }
}
