use std::sync::Arc;

use crate::api::config_dto::SystemConfigDto;
use crate::domain::backend::BackendRegistry;
use crate::domain::orchestrator::decision::SchedulerPolicy;
use crate::domain::orchestrator::manager::LabManager;
use crate::domain::reservation::Reservation;
use crate::domain::reservation_store::InMemoryReservationStore;
use crate::domain::server::Server;
use crate::domain::server_directory::{InMemoryServerDirectory, ServerDirectory};
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// The assembled system: stores, manager, policy. The binary wires an
/// `Orchestrator` and the CLI commands on top of this.
#[derive(Debug)]
pub struct System {
    pub servers: Arc<InMemoryServerDirectory>,
    pub reservations: Arc<InMemoryReservationStore>,
    pub manager: Arc<LabManager>,
    pub policy: SchedulerPolicy,
}

/// Loads the configuration file and assembles the system from it.
pub fn load_system(file_path: &str) -> Result<System> {
    let config: SystemConfigDto = parse_json_file::<SystemConfigDto>(file_path)?;
    log::info!("Configuration file parsed successfully.");

    let policy = SchedulerPolicy::from_dto(config.policy)?;

    let servers = Arc::new(InMemoryServerDirectory::new());
    for dto in config.servers {
        servers.insert(Server::from_dto(dto)?)?;
    }

    let reservations = Arc::new(InMemoryReservationStore::new());
    for dto in config.reservations {
        reservations.insert(Reservation::from_dto(dto)?)?;
    }

    let backends = BackendRegistry::with_defaults(policy.auth_timeout)?;
    let manager = Arc::new(LabManager::new(servers.clone(), backends, policy.clone()));

    log::info!("System assembled: {} servers, {} seed reservations.", servers.all().len(), reservations.len());

    Ok(System { servers, reservations, manager, policy })
}
