use thiserror::Error;

use crate::domain::backend::{LabBackend, Session};
use crate::domain::ids::LabId;
use crate::domain::lab_state::{CanonicalState, normalize};
use crate::domain::server::Server;
use crate::error::BackendError;

/// Why the server could not be cleared for the target lab.
#[derive(Debug, Error)]
pub enum ExclusivityError {
    #[error("could not survey the labs on the server: {0}")]
    Survey(#[source] BackendError),

    #[error("lab '{lab}' could not be stopped: {source}")]
    StopFailed { lab: LabId, #[source] source: BackendError },
}

impl From<ExclusivityError> for BackendError {
    fn from(err: ExclusivityError) -> Self {
        BackendError::Unknown(err.to_string())
    }
}

/// Clears the server for `target` on families that allow only one running
/// lab per physical box.
///
/// Lists all labs, normalizes each state, and stops every *other* lab that
/// is running. The target already running is fine (the caller treats it as
/// an idempotent no-op). Fails closed: if any stop fails, the error names
/// the lab that is still holding the server and the caller must not start
/// the target.
///
/// The list-then-stop sequence is not atomic against a concurrent start on
/// the same server; the per-server lock in the scheduler is what makes it
/// safe.
pub async fn ensure_only_running(
    backend: &dyn LabBackend,
    session: &Session,
    server: &Server,
    target: &LabId,
) -> Result<(), ExclusivityError> {
    let labs = backend.list_labs(session).await.map_err(ExclusivityError::Survey)?;

    for lab in labs.iter().filter(|lab| *lab != target) {
        let raw = match backend.lab_state(session, lab).await {
            Ok(raw) => raw,
            // Vanished between list and read; nothing holds the server.
            Err(BackendError::NotFound(_)) => continue,
            Err(e) => return Err(ExclusivityError::Survey(e)),
        };

        match normalize(server.kind, &raw) {
            CanonicalState::Stopped => {}
            CanonicalState::Running => {
                log::info!("server {}: stopping lab '{}' to free the box for '{}'", server.id, lab, target);
                if let Err(e) = backend.stop_lab(session, lab).await {
                    log::error!("server {}: lab '{}' could not be stopped: {}", server.id, lab, e);
                    return Err(ExclusivityError::StopFailed { lab: lab.clone(), source: e });
                }
            }
            CanonicalState::Unknown => {
                // Fail-safe: never guess about a lab in an unmapped state.
                log::warn!("server {}: lab '{}' reports unmapped state {}, leaving it alone", server.id, lab, raw);
            }
        }
    }

    Ok(())
}
