use std::fmt;
use std::str::FromStr;

use crate::api::config_dto::ServerDto;
use crate::domain::ids::ServerId;
use crate::error::{Error, Result};

/// The two supported backend lab-simulation products.
///
/// Each family has its own authentication scheme and API shape; everything
/// above the backend layer only ever sees this tag and the canonical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    /// Commercial simulator. Lab-granularity start/stop, bearer-token auth.
    Cml,
    /// Community simulator. Node-granularity start/stop, cookie auth.
    Eve,
}

impl FromStr for ServerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CML" => Ok(ServerKind::Cml),
            "EVE" | "EVE-NG" => Ok(ServerKind::Eve),
            other => Err(Error::InvalidConfigError(format!("unknown server family '{other}'"))),
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKind::Cml => write!(f, "CML"),
            ServerKind::Eve => write!(f, "EVE"),
        }
    }
}

/// A managed physical lab server.
///
/// Externally managed and immutable during a tick; the credential pair is
/// only ever used to obtain short-lived sessions, never attached to any
/// shared client state.
#[derive(Debug, Clone)]
pub struct Server {
    pub id: ServerId,

    /// Human-readable name used in logs and the CLI.
    pub name: String,

    /// Backend family this server runs.
    pub kind: ServerKind,

    /// Network address, `host` or `host:port`.
    pub address: String,

    pub username: String,
    pub password: String,
}

impl Server {
    pub fn from_dto(dto: ServerDto) -> Result<Server> {
        let kind = dto.family.parse::<ServerKind>()?;

        if dto.address.trim().is_empty() {
            return Err(Error::InvalidConfigError(format!("server '{}' has an empty address", dto.name)));
        }

        Ok(Server { id: dto.id, name: dto.name, kind, address: dto.address, username: dto.username, password: dto.password })
    }

    /// Base URL for API calls against this server.
    pub fn base_url(&self) -> String {
        format!("https://{}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_families() {
        assert_eq!("CML".parse::<ServerKind>().unwrap(), ServerKind::Cml);
        assert_eq!("eve".parse::<ServerKind>().unwrap(), ServerKind::Eve);
        assert_eq!("EVE-NG".parse::<ServerKind>().unwrap(), ServerKind::Eve);
    }

    #[test]
    fn rejects_unknown_family() {
        let result = "GNS3".parse::<ServerKind>();
        assert!(matches!(result, Err(Error::InvalidConfigError(_))), "Expected InvalidConfigError, got {:?}", result);
    }
}
