use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

use crate::domain::server::ServerKind;

/// The normalized lab state used by the scheduler regardless of backend
/// family.
///
/// Every backend-specific raw state maps onto exactly one of these; anything
/// outside the known vocabulary becomes `Unknown` and is treated as a
/// non-actionable, logged condition. It is never silently coerced to
/// `Stopped` or `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalState {
    /// The lab is fully stopped and the server's resources are free.
    Stopped,

    /// The lab is starting or running. The two are not distinguished:
    /// a starting lab already occupies the server.
    Running,

    /// The backend reported something outside the known vocabulary.
    Unknown,
}

impl fmt::Display for CanonicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalState::Stopped => write!(f, "stopped"),
            CanonicalState::Running => write!(f, "running"),
            CanonicalState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A lab state as reported by a backend, before normalization.
///
/// Family CML reports textual states, family EVE integer status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawLabState {
    Text(String),
    Code(i64),
}

impl fmt::Display for RawLabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawLabState::Text(s) => write!(f, "'{s}'"),
            RawLabState::Code(c) => write!(f, "{c}"),
        }
    }
}

/// EVE node status code meaning "stopped".
pub const EVE_STATUS_STOPPED: i64 = 0;
/// EVE node status code meaning "running".
pub const EVE_STATUS_RUNNING: i64 = 2;

lazy_static! {
    static ref CML_STATES: HashMap<&'static str, CanonicalState> = {
        let mut m = HashMap::new();
        m.insert("DEFINED_ON_CORE", CanonicalState::Stopped);
        m.insert("STOPPED", CanonicalState::Stopped);
        m.insert("QUEUED", CanonicalState::Running);
        m.insert("STARTED", CanonicalState::Running);
        m.insert("BOOTED", CanonicalState::Running);
        m
    };
    static ref EVE_STATES: HashMap<i64, CanonicalState> = {
        let mut m = HashMap::new();
        m.insert(EVE_STATUS_STOPPED, CanonicalState::Stopped);
        m.insert(EVE_STATUS_RUNNING, CanonicalState::Running);
        m
    };
}

/// Maps a family's raw state onto the canonical model.
///
/// Pure and total: unmapped values (including a raw value of the wrong shape
/// for the family, which can only come from stale or partial data) normalize
/// to `Unknown`.
pub fn normalize(kind: ServerKind, raw: &RawLabState) -> CanonicalState {
    match (kind, raw) {
        (ServerKind::Cml, RawLabState::Text(s)) => CML_STATES.get(s.as_str()).copied().unwrap_or(CanonicalState::Unknown),
        (ServerKind::Eve, RawLabState::Code(c)) => EVE_STATES.get(c).copied().unwrap_or(CanonicalState::Unknown),
        _ => CanonicalState::Unknown,
    }
}
