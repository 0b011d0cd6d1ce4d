use chrono::{DateTime, Duration, Months, Utc};

use crate::api::config_dto::PolicyDto;
use crate::domain::reservation::Reservation;
use crate::domain::server::ServerKind;
use crate::error::Result;

/// Scheduler tuning.
///
/// The stop grace window and the start condition are asymmetric on purpose
/// (starting is bounded by the whole booking interval, stopping by a short
/// window after its end). Both were designed around the one-minute tick;
/// change `tick_period` and they should be revisited together.
#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    /// Period of the recurring scheduler tick.
    pub tick_period: std::time::Duration,

    /// How long after a reservation's end a stop is still attempted.
    pub stop_grace: Duration,

    /// How long after its end a reservation record is kept before pruning.
    pub prune_after: Months,

    /// Bound on every authentication and command round trip.
    pub auth_timeout: std::time::Duration,

    /// Families subject to the one-lab-per-server rule.
    pub exclusive_families: Vec<ServerKind>,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        SchedulerPolicy {
            tick_period: std::time::Duration::from_secs(60),
            stop_grace: Duration::minutes(5),
            prune_after: Months::new(6),
            auth_timeout: std::time::Duration::from_secs(25),
            exclusive_families: vec![ServerKind::Cml],
        }
    }
}

impl SchedulerPolicy {
    pub fn from_dto(dto: PolicyDto) -> Result<Self> {
        let defaults = SchedulerPolicy::default();

        let exclusive_families = match dto.exclusive_families {
            None => defaults.exclusive_families,
            Some(families) => families.iter().map(|f| f.parse::<ServerKind>()).collect::<Result<Vec<_>>>()?,
        };

        Ok(SchedulerPolicy {
            tick_period: dto.tick_period_secs.map(std::time::Duration::from_secs).unwrap_or(defaults.tick_period),
            stop_grace: dto.stop_grace_mins.map(Duration::minutes).unwrap_or(defaults.stop_grace),
            prune_after: dto.prune_after_months.map(Months::new).unwrap_or(defaults.prune_after),
            auth_timeout: dto.auth_timeout_secs.map(std::time::Duration::from_secs).unwrap_or(defaults.auth_timeout),
            exclusive_families,
        })
    }

    pub fn is_exclusive(&self, kind: ServerKind) -> bool {
        self.exclusive_families.contains(&kind)
    }
}

/// What a reservation's time window asks for at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    /// `start <= now < end`: the lab is supposed to be running.
    ShouldBeRunning,

    /// `end <= now < end + grace`: the window just closed, stop the lab.
    ShouldBeStopped,

    /// The record is long expired and only kept for deletion.
    Prunable,

    /// Nothing to do at this instant.
    Dormant,
}

/// Classifies a reservation against the current wall-clock time.
///
/// Pure; the scheduler calls this once per reservation per tick before any
/// network traffic happens. Timestamps are minute-granular, so `start == now`
/// is covered by the inclusive lower bound.
pub fn classify(reservation: &Reservation, now: DateTime<Utc>, policy: &SchedulerPolicy) -> WindowClass {
    let prune_deadline = reservation.end.checked_add_months(policy.prune_after).unwrap_or(DateTime::<Utc>::MAX_UTC);
    if prune_deadline < now {
        return WindowClass::Prunable;
    }
    if reservation.start <= now && now < reservation.end {
        return WindowClass::ShouldBeRunning;
    }
    if reservation.end <= now && now < reservation.end + policy.stop_grace {
        return WindowClass::ShouldBeStopped;
    }
    WindowClass::Dormant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::LabId;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, h, m, 0).unwrap()
    }

    fn reservation() -> Reservation {
        Reservation::new(1, "alice", 1, LabId::new("lab1"), at(10, 0), at(12, 0)).unwrap()
    }

    #[test]
    fn dormant_before_the_window_opens() {
        assert_eq!(classify(&reservation(), at(9, 59), &SchedulerPolicy::default()), WindowClass::Dormant);
    }

    #[test]
    fn running_from_the_first_minute_of_the_window() {
        let policy = SchedulerPolicy::default();
        assert_eq!(classify(&reservation(), at(10, 0), &policy), WindowClass::ShouldBeRunning);
        assert_eq!(classify(&reservation(), at(11, 30), &policy), WindowClass::ShouldBeRunning);
        assert_eq!(classify(&reservation(), at(11, 59), &policy), WindowClass::ShouldBeRunning);
    }

    #[test]
    fn stopping_within_the_grace_window() {
        let policy = SchedulerPolicy::default();
        assert_eq!(classify(&reservation(), at(12, 0), &policy), WindowClass::ShouldBeStopped);
        assert_eq!(classify(&reservation(), at(12, 4), &policy), WindowClass::ShouldBeStopped);
    }

    #[test]
    fn dormant_once_the_grace_window_closed() {
        assert_eq!(classify(&reservation(), at(12, 5), &SchedulerPolicy::default()), WindowClass::Dormant);
    }

    #[test]
    fn prunable_six_months_after_the_end() {
        let policy = SchedulerPolicy::default();
        let now = Utc.with_ymd_and_hms(2027, 2, 6, 12, 1, 0).unwrap();
        assert_eq!(classify(&reservation(), now, &policy), WindowClass::Prunable);

        let just_before = Utc.with_ymd_and_hms(2027, 2, 6, 11, 0, 0).unwrap();
        assert_ne!(classify(&reservation(), just_before, &policy), WindowClass::Prunable);
    }
}
