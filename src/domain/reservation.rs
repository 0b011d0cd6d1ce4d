use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::api::config_dto::ReservationDto;
use crate::domain::ids::{LabId, ReservationId, ServerId};
use crate::error::{Error, Result};

/// Timestamp format used by the booking front end, minute granularity.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A booked time window for one lab on one server.
///
/// Created by the user-facing booking action and owned by the reservation
/// store; the scheduler only reads and deletes. A reservation is never
/// updated in place: cancelling means deleting the record, and expired
/// records are pruned automatically once they are six months past their end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,

    /// Identity of the user who booked the window.
    pub user: String,

    /// The physical server the lab lives on.
    pub server_id: ServerId,

    /// Backend-specific identifier of the lab to start and stop.
    pub lab_id: LabId,

    /// Start of the booked window, wall clock, minute granularity.
    pub start: DateTime<Utc>,

    /// End of the booked window. Same calendar day as `start`.
    pub end: DateTime<Utc>,
}

impl Reservation {
    /// Builds a reservation, enforcing the booking invariants:
    /// start before end, both on the same calendar day, at least one hour long.
    pub fn new(
        id: ReservationId,
        user: impl Into<String>,
        server_id: ServerId,
        lab_id: LabId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Reservation> {
        let reservation = Reservation { id, user: user.into(), server_id, lab_id, start, end };
        reservation.validate()?;
        Ok(reservation)
    }

    pub fn from_dto(dto: ReservationDto) -> Result<Reservation> {
        let start = parse_booking_time(&dto.start)?;
        let end = parse_booking_time(&dto.end)?;

        Reservation::new(dto.id, dto.user, dto.server_id, LabId::new(dto.lab), start, end)
    }

    fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(Error::InvalidReservationError(format!("reservation {}: start must be before end", self.id)));
        }
        if self.start.date_naive() != self.end.date_naive() {
            return Err(Error::InvalidReservationError(format!("reservation {}: start and end must fall on the same day", self.id)));
        }
        if self.end - self.start < Duration::hours(1) {
            return Err(Error::InvalidReservationError(format!("reservation {}: duration must be at least one hour", self.id)));
        }
        Ok(())
    }

}

fn parse_booking_time(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::InvalidReservationError(format!("could not parse timestamp '{s}': {e}")))
}
