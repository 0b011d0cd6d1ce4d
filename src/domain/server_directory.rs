use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::ids::ServerId;
use crate::domain::server::Server;
use crate::error::{Error, Result};

/// Lookup of managed server records. External collaborator, interface only;
/// server records are immutable during a tick.
pub trait ServerDirectory: std::fmt::Debug + Send + Sync {
    fn get(&self, id: ServerId) -> Option<Server>;
    fn all(&self) -> Vec<Server>;
}

/// In-memory directory used by the binary and the tests.
#[derive(Debug, Clone)]
pub struct InMemoryServerDirectory {
    servers: Arc<RwLock<HashMap<ServerId, Server>>>,
}

impl InMemoryServerDirectory {
    pub fn new() -> Self {
        Self { servers: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn insert(&self, server: Server) -> Result<()> {
        let mut guard = self.servers.write().expect("RwLock poisoned");
        if guard.contains_key(&server.id) {
            return Err(Error::InvalidConfigError(format!("server id {} already exists", server.id)));
        }
        guard.insert(server.id, server);
        Ok(())
    }
}

impl Default for InMemoryServerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerDirectory for InMemoryServerDirectory {
    fn get(&self, id: ServerId) -> Option<Server> {
        self.servers.read().expect("RwLock poisoned").get(&id).cloned()
    }

    fn all(&self) -> Vec<Server> {
        self.servers.read().expect("RwLock poisoned").values().cloned().collect()
    }
}
