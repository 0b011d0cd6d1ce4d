use serde::Deserialize;

/// Root of the system configuration file.
#[derive(Debug, Deserialize)]
pub struct SystemConfigDto {
    #[serde(default)]
    pub policy: PolicyDto,

    pub servers: Vec<ServerDto>,

    /// Optional seed bookings, mainly useful for demos and tests.
    #[serde(default)]
    pub reservations: Vec<ReservationDto>,
}

/// Scheduler tuning. Every field is optional; the defaults match the
/// one-minute tick the windows were designed around.
#[derive(Debug, Default, Deserialize)]
pub struct PolicyDto {
    pub tick_period_secs: Option<u64>,
    pub stop_grace_mins: Option<i64>,
    pub prune_after_months: Option<u32>,
    pub auth_timeout_secs: Option<u64>,

    /// Families subject to the one-lab-per-server rule.
    pub exclusive_families: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ServerDto {
    pub id: i64,
    pub name: String,

    /// Backend family tag, e.g. `"CML"` or `"EVE"`.
    pub family: String,

    pub address: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ReservationDto {
    pub id: i64,
    pub user: String,
    pub server_id: i64,
    pub lab: String,

    /// `YYYY-MM-DD HH:MM`, same format the booking screens use.
    pub start: String,
    pub end: String,
}
