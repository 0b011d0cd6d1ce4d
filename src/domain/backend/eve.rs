use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::api::eve_dto::{EveLoginRequestDto, EveNodeDto, EveNodeMapDto, EveResponseDto};
use crate::domain::backend::endpoint::EveEndpoint;
use crate::domain::backend::{LabBackend, Session, SessionToken};
use crate::domain::ids::{LabId, NodeId};
use crate::domain::lab_state::{EVE_STATUS_RUNNING, EVE_STATUS_STOPPED, RawLabState};
use crate::domain::server::{Server, ServerKind};
use crate::error::{BackendError, BackendResult, Error, Result};

/// Client for the community simulator.
///
/// The product has no lab-level start/stop verb: both operations enumerate
/// the lab's nodes and act on each node, aggregated to a single verdict.
/// A lab's state is likewise derived from its node status codes.
#[derive(Debug)]
pub struct EveBackend {
    client: reqwest::Client,
    timeout: Duration,
}

/// Goal state of a per-node command plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeGoal {
    Started,
    Stopped,
}

impl NodeGoal {
    fn satisfied_by(self, status: i64) -> bool {
        match self {
            NodeGoal::Started => status == EVE_STATUS_RUNNING,
            NodeGoal::Stopped => status == EVE_STATUS_STOPPED,
        }
    }
}

/// Picks the nodes that still need a command to reach `goal`.
///
/// Nodes already in the goal state are skipped, which is what lets a retry
/// after a partial failure touch only the remainder. Sorted for a
/// deterministic command order.
pub(crate) fn plan_node_ops(nodes: &EveNodeMapDto, goal: NodeGoal) -> Vec<NodeId> {
    let mut pending: Vec<NodeId> =
        nodes.iter().filter(|(_, node)| !goal.satisfied_by(node.status)).map(|(id, _)| NodeId::new(id.clone())).collect();
    pending.sort();
    pending
}

/// Derives the lab-level raw status code from the node codes.
///
/// Any running node means the lab occupies the server, so running wins;
/// otherwise an unmapped node code surfaces as-is (and normalizes to
/// `Unknown`). A lab whose nodes are all stopped, or that has no nodes,
/// is stopped.
pub(crate) fn derive_lab_code<I: IntoIterator<Item = i64>>(statuses: I) -> i64 {
    let mut unmapped = None;
    for status in statuses {
        if status == EVE_STATUS_RUNNING {
            return EVE_STATUS_RUNNING;
        }
        if status != EVE_STATUS_STOPPED && unmapped.is_none() {
            unmapped = Some(status);
        }
    }
    unmapped.unwrap_or(EVE_STATUS_STOPPED)
}

impl EveBackend {
    pub fn new(timeout: Duration) -> Result<Self> {
        // Lab servers ship self-signed certificates.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::InvalidConfigError(format!("could not build HTTP client: {e}")))?;

        Ok(EveBackend { client, timeout })
    }

    fn request(&self, method: reqwest::Method, session: &Session, endpoint: EveEndpoint<'_>) -> reqwest::RequestBuilder {
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

    /// Unwraps the `{code, status, data}` envelope every EVE endpoint uses.
    async fn payload<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response, context: &str) -> BackendResult<T> {
        let envelope: EveResponseDto<T> =
            response.json().await.map_err(|e| BackendError::Unknown(format!("{context}: malformed response: {e}")))?;

        if !(200..300).contains(&envelope.code) {
            return Err(BackendError::Unknown(format!("{context}: server answered code {}", envelope.code)));
        }

        envelope.data.ok_or_else(|| BackendError::Unknown(format!("{context}: response carried no data")))
    }

    async fn nodes(&self, session: &Session, lab: &LabId) -> BackendResult<EveNodeMapDto> {
        let context = format!("list nodes of lab '{}' on server {}", lab, session.server_id);
        let response = self.send(self.request(reqwest::Method::GET, session, EveEndpoint::Nodes(lab.as_str())), &context).await?;
        self.payload(response, &context).await
    }

    /// Issues one command per pending node and aggregates the verdict.
    ///
    /// Nodes already acted on are not rolled back when a later node fails;
    /// the partial failure is reported and the next tick retries the rest.
    async fn drive_nodes(&self, session: &Session, lab: &LabId, nodes: &EveNodeMapDto, goal: NodeGoal) -> BackendResult<()> {
        let pending = plan_node_ops(nodes, goal);
        if pending.is_empty() {
            return Ok(());
        }

        let total = pending.len();
        let mut failed: Vec<String> = Vec::new();
        let mut first_error: Option<BackendError> = None;

        for node in &pending {
            let (verb, endpoint) = match goal {
                NodeGoal::Started => ("start", EveEndpoint::StartNode(lab.as_str(), node.as_str())),
                NodeGoal::Stopped => ("stop", EveEndpoint::StopNode(lab.as_str(), node.as_str())),
            };
            let context = format!("{} node '{}' of lab '{}' on server {}", verb, node, lab, session.server_id);

            match self.send(self.request(reqwest::Method::GET, session, endpoint), &context).await {
                Ok(_) => {}
                Err(e) => {
                    log::warn!("{}: {}", context, e);
                    failed.push(node.to_string());
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else if failed.len() == total {
            // Nothing succeeded; the concrete cause is more useful than an
            // aggregate.
            Err(first_error.expect("at least one failure recorded"))
        } else {
            Err(BackendError::PartialFailure { total, failed })
        }
    }
}

#[async_trait]
impl LabBackend for EveBackend {
    fn kind(&self) -> ServerKind {
        ServerKind::Eve
    }

    async fn authenticate(&self, server: &Server) -> BackendResult<Session> {
        let url = format!("{}{}", server.base_url(), EveEndpoint::Login.path());
        let body = EveLoginRequestDto::new(&server.username, &server.password);
        let context = format!("authenticate as '{}' against {}", server.username, server.address);

        let response = self.send(self.client.post(url).json(&body), &context).await?;

        // The session credential is the cookie the server sets on login.
        let cookie = response
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
            .ok_or_else(|| BackendError::Unknown(format!("{context}: login response carried no session cookie")))?;

        Ok(Session::new(server, SessionToken::Cookie(cookie)))
    }

    async fn logout(&self, session: &Session) {
        let result = self.send(self.request(reqwest::Method::GET, session, EveEndpoint::Logout), "logout").await;
        if let Err(e) = result {
            log::warn!("server {}: logout failed (session {}): {}", session.server_id, session.id, e);
        }
    }

    async fn list_labs(&self, session: &Session) -> BackendResult<Vec<LabId>> {
        let context = format!("list labs on server {}", session.server_id);
        let response = self.send(self.request(reqwest::Method::GET, session, EveEndpoint::Labs), &context).await?;
        let labs: Vec<String> = self.payload(response, &context).await?;
        Ok(labs.into_iter().map(LabId::new).collect())
    }

    async fn lab_state(&self, session: &Session, lab: &LabId) -> BackendResult<RawLabState> {
        let nodes = self.nodes(session, lab).await?;
        Ok(RawLabState::Code(derive_lab_code(nodes.values().map(|node| node.status))))
    }

    async fn start_lab(&self, session: &Session, lab: &LabId) -> BackendResult<()> {
        let nodes = self.nodes(session, lab).await?;
        self.drive_nodes(session, lab, &nodes, NodeGoal::Started).await
    }

    async fn stop_lab(&self, session: &Session, lab: &LabId) -> BackendResult<()> {
        let nodes = self.nodes(session, lab).await?;
        self.drive_nodes(session, lab, &nodes, NodeGoal::Stopped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, status: i64) -> EveNodeDto {
        EveNodeDto { name: name.to_string(), status }
    }

    fn node_map(entries: &[(&str, i64)]) -> EveNodeMapDto {
        entries.iter().map(|(id, status)| (id.to_string(), node(id, *status))).collect()
    }

    #[test]
    fn start_plan_skips_nodes_already_running() {
        let nodes = node_map(&[("1", EVE_STATUS_RUNNING), ("2", EVE_STATUS_STOPPED), ("3", EVE_STATUS_STOPPED)]);
        let pending = plan_node_ops(&nodes, NodeGoal::Started);
        assert_eq!(pending, vec![NodeId::new("2"), NodeId::new("3")]);
    }

    #[test]
    fn stop_plan_skips_nodes_already_stopped() {
        let nodes = node_map(&[("1", EVE_STATUS_RUNNING), ("2", EVE_STATUS_STOPPED)]);
        let pending = plan_node_ops(&nodes, NodeGoal::Stopped);
        assert_eq!(pending, vec![NodeId::new("1")]);
    }

    #[test]
    fn retry_after_partial_failure_only_touches_the_remainder() {
        // First attempt started node 1 but failed on node 2; the lab now
        // reports node 1 running. The follow-up plan must only contain node 2.
        let nodes = node_map(&[("1", EVE_STATUS_RUNNING), ("2", EVE_STATUS_STOPPED)]);
        let pending = plan_node_ops(&nodes, NodeGoal::Started);
        assert_eq!(pending, vec![NodeId::new("2")]);
    }

    #[test]
    fn a_running_node_marks_the_lab_running() {
        assert_eq!(derive_lab_code([EVE_STATUS_STOPPED, EVE_STATUS_RUNNING, EVE_STATUS_STOPPED]), EVE_STATUS_RUNNING);
    }

    #[test]
    fn all_stopped_nodes_mark_the_lab_stopped() {
        assert_eq!(derive_lab_code([EVE_STATUS_STOPPED, EVE_STATUS_STOPPED]), EVE_STATUS_STOPPED);
    }

    #[test]
    fn an_empty_lab_is_stopped() {
        assert_eq!(derive_lab_code([]), EVE_STATUS_STOPPED);
    }

    #[test]
    fn an_unmapped_node_code_surfaces_without_a_running_node() {
        // Status 3 is outside the known vocabulary; it must not be coerced.
        assert_eq!(derive_lab_code([EVE_STATUS_STOPPED, 3]), 3);
        assert_eq!(derive_lab_code([3, EVE_STATUS_RUNNING]), EVE_STATUS_RUNNING);
    }
}
