#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netlab_scheduler::domain::backend::{BackendRegistry, LabBackend, Session, SessionToken};
use netlab_scheduler::domain::clock::ManualClock;
use netlab_scheduler::domain::ids::{LabId, ReservationId, ServerId};
use netlab_scheduler::domain::lab_state::RawLabState;
use netlab_scheduler::domain::orchestrator::decision::SchedulerPolicy;
use netlab_scheduler::domain::orchestrator::manager::LabManager;
use netlab_scheduler::domain::orchestrator::scheduler::Orchestrator;
use netlab_scheduler::domain::reservation::Reservation;
use netlab_scheduler::domain::reservation_store::InMemoryReservationStore;
use netlab_scheduler::domain::server::{Server, ServerKind};
use netlab_scheduler::domain::server_directory::InMemoryServerDirectory;
use netlab_scheduler::error::{BackendError, BackendResult};

/// Scripted in-memory backend that records every remote call in order.
///
/// Calls are tagged `verb:lab` so tests can assert call order and absence;
/// an optional artificial delay widens race windows for the serialization
/// assertions.
#[derive(Debug)]
pub struct FakeBackend {
    kind: ServerKind,
    labs: Mutex<HashMap<LabId, RawLabState>>,
    calls: Mutex<Vec<String>>,
    fail_stop: Mutex<HashSet<LabId>>,
    fail_start: Mutex<HashSet<LabId>>,
    delay: Option<Duration>,
}

impl FakeBackend {
    pub fn new(kind: ServerKind) -> Self {
        FakeBackend {
            kind,
            labs: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_stop: Mutex::new(HashSet::new()),
            fail_start: Mutex::new(HashSet::new()),
            delay: None,
        }
    }

    pub fn with_delay(kind: ServerKind, delay: Duration) -> Self {
        FakeBackend { delay: Some(delay), ..FakeBackend::new(kind) }
    }

    fn running_raw(&self) -> RawLabState {
        match self.kind {
            ServerKind::Cml => RawLabState::Text("STARTED".to_string()),
            ServerKind::Eve => RawLabState::Code(2),
        }
    }

    fn stopped_raw(&self) -> RawLabState {
        match self.kind {
            ServerKind::Cml => RawLabState::Text("STOPPED".to_string()),
            ServerKind::Eve => RawLabState::Code(0),
        }
    }

    pub fn add_stopped_lab(&self, lab: &str) {
        self.set_lab(lab, self.stopped_raw());
    }

    pub fn add_running_lab(&self, lab: &str) {
        self.set_lab(lab, self.running_raw());
    }

    pub fn set_lab(&self, lab: &str, raw: RawLabState) {
        self.labs.lock().unwrap().insert(LabId::new(lab), raw);
    }

    pub fn fail_stop_of(&self, lab: &str) {
        self.fail_stop.lock().unwrap().insert(LabId::new(lab));
    }

    pub fn fail_start_of(&self, lab: &str) {
        self.fail_start.lock().unwrap().insert(LabId::new(lab));
    }

    pub fn raw_state(&self, lab: &str) -> Option<RawLabState> {
        self.labs.lock().unwrap().get(&LabId::new(lab)).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LabBackend for FakeBackend {
    fn kind(&self) -> ServerKind {
        self.kind
    }

    async fn authenticate(&self, server: &Server) -> BackendResult<Session> {
        self.pause().await;
        self.record(format!("authenticate:{}", server.id));
        Ok(Session::new(server, SessionToken::Bearer("fake-token".to_string())))
    }

    async fn logout(&self, session: &Session) {
        self.record(format!("logout:{}", session.server_id));
    }

    async fn list_labs(&self, _session: &Session) -> BackendResult<Vec<LabId>> {
        self.pause().await;
        self.record("list_labs".to_string());
        let mut labs: Vec<LabId> = self.labs.lock().unwrap().keys().cloned().collect();
        labs.sort();
        Ok(labs)
    }

    async fn lab_state(&self, _session: &Session, lab: &LabId) -> BackendResult<RawLabState> {
        self.pause().await;
        self.record(format!("state:{lab}"));
        self.labs.lock().unwrap().get(lab).cloned().ok_or_else(|| BackendError::NotFound(format!("lab '{lab}'")))
    }

    async fn start_lab(&self, _session: &Session, lab: &LabId) -> BackendResult<()> {
        self.pause().await;
        self.record(format!("start:{lab}"));
        if self.fail_start.lock().unwrap().contains(lab) {
            return Err(BackendError::Unknown(format!("scripted start failure for '{lab}'")));
        }
        let running = self.running_raw();
        self.labs.lock().unwrap().insert(lab.clone(), running);
        Ok(())
    }

    async fn stop_lab(&self, _session: &Session, lab: &LabId) -> BackendResult<()> {
        self.pause().await;
        self.record(format!("stop:{lab}"));
        if self.fail_stop.lock().unwrap().contains(lab) {
            return Err(BackendError::Unknown(format!("scripted stop failure for '{lab}'")));
        }
        let stopped = self.stopped_raw();
        self.labs.lock().unwrap().insert(lab.clone(), stopped);
        Ok(())
    }
}

pub fn server(id: ServerId, kind: ServerKind) -> Server {
    Server {
        id,
        name: format!("server-{id}"),
        kind,
        address: format!("198.51.100.{id}"),
        username: "admin".to_string(),
        password: "secret".to_string(),
    }
}

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 6, h, m, 0).unwrap()
}

pub fn reservation(id: ReservationId, server_id: ServerId, lab: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Reservation {
    Reservation::new(id, "alice", server_id, LabId::new(lab), start, end).unwrap()
}

/// A fully wired test system around one fake backend.
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub manager: Arc<LabManager>,
    pub store: Arc<InMemoryReservationStore>,
    pub clock: ManualClock,
    pub orchestrator: Orchestrator,
}

pub fn harness(backend: FakeBackend, servers: Vec<Server>) -> Harness {
    let backend = Arc::new(backend);
    let directory = Arc::new(InMemoryServerDirectory::new());
    for server in servers {
        directory.insert(server).unwrap();
    }

    let registry = BackendRegistry::new(vec![backend.clone() as Arc<dyn LabBackend>]);
    let manager = Arc::new(LabManager::new(directory, registry, SchedulerPolicy::default()));

    let store = Arc::new(InMemoryReservationStore::new());
    let clock = ManualClock::new(at(0, 0));
    let orchestrator = Orchestrator::new(manager.clone(), store.clone(), Arc::new(clock.clone()));

    Harness { backend, manager, store, clock, orchestrator }
}

pub fn count(calls: &[String], needle: &str) -> usize {
    calls.iter().filter(|call| call.as_str() == needle || call.starts_with(&format!("{needle}:"))).count()
}

pub fn index_of(calls: &[String], call: &str) -> Option<usize> {
    calls.iter().position(|c| c == call)
}

/// Asserts that the calls touching lab `a` and lab `b` form two disjoint
/// spans, i.e. the two sequences did not interleave their remote calls.
pub fn assert_no_interleave(calls: &[String], a: &str, b: &str) {
    let span = |lab: &str| {
        let suffix = format!(":{lab}");
        let indices: Vec<usize> = calls.iter().enumerate().filter(|(_, c)| c.ends_with(&suffix)).map(|(i, _)| i).collect();
        assert!(!indices.is_empty(), "no calls recorded for lab '{lab}' in {calls:?}");
        (*indices.first().unwrap(), *indices.last().unwrap())
    };

    let (a_first, a_last) = span(a);
    let (b_first, b_last) = span(b);

    assert!(a_last < b_first || b_last < a_first, "sequences for '{a}' and '{b}' interleaved: {calls:?}");
}
