mod common;

use common::{FakeBackend, harness, server};
use netlab_scheduler::domain::ids::LabId;
use netlab_scheduler::domain::lab_state::RawLabState;
use netlab_scheduler::domain::server::ServerKind;

// Single test in this file: logtest installs a process-global logger.
#[tokio::test]
async fn an_unmapped_state_is_logged_and_nothing_is_driven() {
    let mut logger = logtest::Logger::start();

    let backend = FakeBackend::new(ServerKind::Cml);
    backend.set_lab("L1", RawLabState::Text("MAINTENANCE".to_string()));

    let h = harness(backend, vec![server(1, ServerKind::Cml)]);
    let report = h.manager.start_lab(1, &LabId::new("L1")).await;

    assert!(!report.ok, "an unmapped state must refuse the action");

    let mut saw_unmapped_error = false;
    while let Some(record) = logger.pop() {
        if record.level() == log::Level::Error && record.args().contains("unmapped state") {
            saw_unmapped_error = true;
        }
    }
    assert!(saw_unmapped_error, "the unmapped state must be logged at error level");
}
