use std::fmt;
use std::marker::PhantomData;

/// Backend-facing identifiers are plain strings on the wire; the phantom
/// tag keeps lab and node ids from being mixed up inside the crate.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct Id<T> {
    pub id: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {:?}", display_name, self.id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct LabTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct NodeTag;

/// Backend-specific lab identifier (a path on EVE, an opaque id on CML).
pub type LabId = Id<LabTag>;
/// Identifier of a single node inside an EVE lab.
pub type NodeId = Id<NodeTag>;

/// Identity of a managed physical server record.
pub type ServerId = i64;
/// Identity of a reservation record, assigned by the booking front end.
pub type ReservationId = i64;
