/// API paths of the CML controller, relative to the server's base URL.
#[derive(Debug)]
pub enum CmlEndpoint<'a> {
    Authenticate,
    Logout,
    Labs,
    LabState(&'a str),
    StartLab(&'a str),
    StopLab(&'a str),
}

impl CmlEndpoint<'_> {
    pub fn path(&self) -> String {
        match self {
            Self::Authenticate => "/api/v0/authenticate".to_string(),
            Self::Logout => "/api/v0/logout".to_string(),
            Self::Labs => "/api/v0/labs".to_string(),
            Self::LabState(lab) => format!("/api/v0/labs/{lab}/state"),
            Self::StartLab(lab) => format!("/api/v0/labs/{lab}/start"),
            Self::StopLab(lab) => format!("/api/v0/labs/{lab}/stop"),
        }
    }
}

/// API paths of the EVE server. Node start/stop are GET requests; that is
/// how the product's API works.
#[derive(Debug)]
pub enum EveEndpoint<'a> {
    Login,
    Logout,
    Labs,
    Nodes(&'a str),
    StartNode(&'a str, &'a str),
    StopNode(&'a str, &'a str),
}

impl EveEndpoint<'_> {
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/api/auth/login".to_string(),
            Self::Logout => "/api/auth/logout".to_string(),
            Self::Labs => "/api/labs".to_string(),
            Self::Nodes(lab) => format!("/api/labs/{lab}/nodes"),
            Self::StartNode(lab, node) => format!("/api/labs/{lab}/nodes/{node}/start"),
            Self::StopNode(lab, node) => format!("/api/labs/{lab}/nodes/{node}/stop"),
        }
    }
}
