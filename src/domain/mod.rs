pub mod backend;
pub mod clock;
pub mod ids;
pub mod lab_state;
pub mod orchestrator;
pub mod reservation;
pub mod reservation_store;
pub mod server;
pub mod server_directory;
