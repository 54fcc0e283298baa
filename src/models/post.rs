use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Capital;

pub const MIN_CAPACITY: i32 = 1;
pub const MAX_CAPACITY: i32 = 100;

/// Business-rule rejection for post creation. Returned, never thrown:
/// handlers translate this into a 422 at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown location: '{0}'")]
    UnknownLocation(String),

    #[error("Origin and destination must differ")]
    SameOriginDestination,

    #[error("Departure time must not be in the past")]
    DepartureInPast,

    #[error("Invalid departure timestamp: '{0}'")]
    BadDepartureTimestamp(String),

    #[error("Capacity must be between {MIN_CAPACITY} and {MAX_CAPACITY}, got {0}")]
    CapacityOutOfRange(i32),
}

/// Validated input for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub origin: Capital,
    pub destination: Capital,
    pub departure_at: DateTime<Utc>,
    pub capacity: i32,
}

/// Checks every creation invariant before anything touches the store.
pub fn validate_new_post(
    origin: &str,
    destination: &str,
    departure_at: &str,
    capacity: i32,
    now: DateTime<Utc>,
) -> Result<NewPost, ValidationError> {
    let origin = Capital::parse(origin)
        .ok_or_else(|| ValidationError::UnknownLocation(origin.to_string()))?;
    let destination = Capital::parse(destination)
        .ok_or_else(|| ValidationError::UnknownLocation(destination.to_string()))?;

    if origin == destination {
        return Err(ValidationError::SameOriginDestination);
    }

    let departure_at = DateTime::parse_from_rfc3339(departure_at)
        .map_err(|_| ValidationError::BadDepartureTimestamp(departure_at.to_string()))?
        .with_timezone(&Utc);

    if departure_at < now {
        return Err(ValidationError::DepartureInPast);
    }

    if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
        return Err(ValidationError::CapacityOutOfRange(capacity));
    }

    Ok(NewPost {
        origin,
        destination,
        departure_at,
        capacity,
    })
}

/// Lifecycle state of a post. Only `open` and `closed` are persisted;
/// `full` and `departed` are derived so they can never race the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Open,
    Full,
    Closed,
    Departed,
}

impl PostStatus {
    #[must_use]
    pub const fn value(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Full => "full",
            Self::Closed => "closed",
            Self::Departed => "departed",
        }
    }

    /// Derives the effective status from the persisted state and counters.
    ///
    /// An unparseable departure timestamp is treated as departed: it can
    /// only come from manual tampering and refusing joins is the safe side.
    #[must_use]
    pub fn derive(
        persisted: &str,
        engaged_count: i32,
        capacity: i32,
        departure_at: &str,
        now: DateTime<Utc>,
    ) -> Self {
        if persisted == Self::Closed.value() {
            return Self::Closed;
        }

        let departed = DateTime::parse_from_rfc3339(departure_at)
            .map_or(true, |dep| dep.with_timezone(&Utc) <= now);
        if departed {
            return Self::Departed;
        }

        if engaged_count >= capacity {
            Self::Full
        } else {
            Self::Open
        }
    }

    /// Whether the post still accepts join/leave mutations.
    #[must_use]
    pub const fn accepts_changes(self) -> bool {
        matches!(self, Self::Open | Self::Full)
    }
}
