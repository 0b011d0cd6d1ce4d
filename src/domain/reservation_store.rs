use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::ids::ReservationId;
use crate::domain::reservation::Reservation;
use crate::error::{Error, Result};

/// Read/delete access to the reservation records.
///
/// The relational store behind the booking front end is an external
/// collaborator; the scheduler only ever consumes this interface. A failing
/// `get_all` aborts the current tick, nothing more.
pub trait ReservationGateway: std::fmt::Debug + Send + Sync {
    fn get_all(&self) -> Result<Vec<Reservation>>;

    /// Deletes a reservation. Deleting an id that is already gone is a no-op,
    /// so pruning stays idempotent across overlapping ticks.
    fn delete(&self, id: ReservationId) -> Result<()>;
}

new_key_type! {
    pub struct ReservationKey;
}

#[derive(Debug)]
struct StoreInner {
    /// Reservation storage.
    slots: SlotMap<ReservationKey, Reservation>,

    /// Index lookup of the internal key using the record id.
    id_index: HashMap<ReservationId, ReservationKey>,
}

/// In-memory reservation store used by the binary and the tests.
///
/// Both maps are protected with a single lock.
#[derive(Debug, Clone)]
pub struct InMemoryReservationStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(StoreInner { slots: SlotMap::with_key(), id_index: HashMap::new() })) }
    }

    /// Adds a reservation to the store.
    ///
    /// # Returns
    /// Returns the internal key, or an error if the record id is already taken.
    pub fn insert(&self, reservation: Reservation) -> Result<ReservationKey> {
        let mut guard = self.inner.write().expect("RwLock poisoned");

        if guard.id_index.contains_key(&reservation.id) {
            return Err(Error::InvalidReservationError(format!("reservation id {} already exists", reservation.id)));
        }

        let id = reservation.id;
        let key = guard.slots.insert(reservation);
        guard.id_index.insert(id, key);

        Ok(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("RwLock poisoned").slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationGateway for InMemoryReservationStore {
    fn get_all(&self) -> Result<Vec<Reservation>> {
        let guard = self.inner.read().expect("RwLock poisoned");
        Ok(guard.slots.values().cloned().collect())
    }

    fn delete(&self, id: ReservationId) -> Result<()> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        if let Some(key) = guard.id_index.remove(&id) {
            guard.slots.remove(key);
        }
        Ok(())
    }
}
