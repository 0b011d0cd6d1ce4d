mod common;

use common::{FakeBackend, count, harness, server};
use netlab_scheduler::domain::ids::LabId;
use netlab_scheduler::domain::lab_state::{CanonicalState, RawLabState};
use netlab_scheduler::domain::server::ServerKind;

#[tokio::test]
async fn stop_all_stops_every_running_lab() {
    let backend = FakeBackend::new(ServerKind::Eve);
    backend.add_running_lab("A");
    backend.add_running_lab("B");
    backend.add_stopped_lab("C");

    let h = harness(backend, vec![server(1, ServerKind::Eve)]);
    let report = h.manager.stop_all_labs(1).await;

    assert!(report.ok, "{:?}", report.reason);
    let calls = h.backend.calls();
    assert_eq!(count(&calls, "stop"), 2, "only the running labs need a command: {calls:?}");
    assert_eq!(h.backend.raw_state("A"), Some(RawLabState::Code(0)));
    assert_eq!(h.backend.raw_state("B"), Some(RawLabState::Code(0)));
}

#[tokio::test]
async fn stop_all_reports_the_labs_that_would_not_stop() {
    let backend = FakeBackend::new(ServerKind::Eve);
    backend.add_running_lab("A");
    backend.add_running_lab("B");
    backend.fail_stop_of("B");

    let h = harness(backend, vec![server(1, ServerKind::Eve)]);
    let report = h.manager.stop_all_labs(1).await;

    assert!(!report.ok);
    let reason = report.reason.unwrap_or_default();
    assert!(reason.contains('B'), "the failed lab must be named: {reason}");
    // A was still stopped; the partial result is not rolled back.
    assert_eq!(h.backend.raw_state("A"), Some(RawLabState::Code(0)));
}

#[tokio::test]
async fn canonical_state_reads_through_the_normalizer() {
    let backend = FakeBackend::new(ServerKind::Cml);
    backend.add_running_lab("A");
    backend.set_lab("W", RawLabState::Text("WEDGED".to_string()));

    let h = harness(backend, vec![server(1, ServerKind::Cml)]);

    assert_eq!(h.manager.canonical_state(1, &LabId::new("A")).await.unwrap(), CanonicalState::Running);
    assert_eq!(h.manager.canonical_state(1, &LabId::new("W")).await.unwrap(), CanonicalState::Unknown);
    assert!(h.manager.canonical_state(1, &LabId::new("missing")).await.is_err());
}

#[tokio::test]
async fn lab_overview_lists_every_lab_with_its_state() {
    let backend = FakeBackend::new(ServerKind::Cml);
    backend.add_running_lab("A");
    backend.add_stopped_lab("B");

    let h = harness(backend, vec![server(1, ServerKind::Cml)]);
    let overview = h.manager.lab_overview(1).await.unwrap();

    assert_eq!(overview, vec![(LabId::new("A"), CanonicalState::Running), (LabId::new("B"), CanonicalState::Stopped)]);
}

#[tokio::test]
async fn an_unknown_server_yields_a_report_not_a_fault() {
    let backend = FakeBackend::new(ServerKind::Cml);
    let h = harness(backend, vec![server(1, ServerKind::Cml)]);

    let report = h.manager.start_lab(99, &LabId::new("A")).await;
    assert!(!report.ok);
    assert!(report.reason.unwrap_or_default().contains("99"));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn every_sequence_authenticates_and_logs_out_on_its_own() {
    let backend = FakeBackend::new(ServerKind::Cml);
    backend.add_stopped_lab("A");

    let h = harness(backend, vec![server(1, ServerKind::Cml)]);
    h.manager.start_lab(1, &LabId::new("A")).await;
    h.manager.stop_lab(1, &LabId::new("A")).await;

    let calls = h.backend.calls();
    assert_eq!(count(&calls, "authenticate"), 2, "sessions are never reused across sequences: {calls:?}");
    assert_eq!(count(&calls, "logout"), 2, "sessions are invalidated best-effort after each sequence: {calls:?}");
}
