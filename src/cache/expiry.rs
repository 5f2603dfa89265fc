//! Expiration Policy Module
//!
//! Turns the TTL forms callers pass in into one absolute [`Expiry`].

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

// == Expiry ==
/// When an entry stops being readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    Never,
    At(DateTime<Utc>),
}

impl Expiry {
    // == Is Expired ==
    /// Returns `true` once `now` has reached the expiry instant.
    ///
    /// The boundary is inclusive, so an entry expiring exactly at `now` is
    /// already gone.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => *at <= now,
        }
    }

    /// The expiry instant, or `None` for entries that never expire.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Expiry::Never => None,
            Expiry::At(at) => Some(*at),
        }
    }

    /// Time left before expiry, `None` when the entry never expires.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.instant()
            .map(|at| if at > now { at - now } else { Duration::zero() })
    }
}

impl From<Option<DateTime<Utc>>> for Expiry {
    fn from(at: Option<DateTime<Utc>>) -> Self {
        at.map_or(Expiry::Never, Expiry::At)
    }
}

// == TTL Input ==
/// Every way a caller can say how long a value lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ttl {
    /// Never expires
    #[default]
    Never,
    /// Whole seconds from now; zero or negative means already expired
    Seconds(i64),
    /// A duration from now; zero means already expired
    After(StdDuration),
    /// An absolute instant
    At(DateTime<Utc>),
}

impl Ttl {
    // == Normalize ==
    /// Resolves this TTL against `now`.
    pub fn normalize(self, now: DateTime<Utc>) -> Expiry {
        match self {
            Ttl::Never => Expiry::Never,
            Ttl::Seconds(secs) if secs <= 0 => already_expired(now),
            Ttl::Seconds(secs) => Expiry::At(
                Duration::try_seconds(secs)
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            Ttl::After(d) if d.is_zero() => already_expired(now),
            Ttl::After(d) => Expiry::At(
                Duration::from_std(d)
                    .ok()
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            Ttl::At(at) => Expiry::At(at),
        }
    }
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Ttl::Seconds(secs)
    }
}

impl From<StdDuration> for Ttl {
    fn from(d: StdDuration) -> Self {
        Ttl::After(d)
    }
}

impl From<DateTime<Utc>> for Ttl {
    fn from(at: DateTime<Utc>) -> Self {
        Ttl::At(at)
    }
}

impl<T: Into<Ttl>> From<Option<T>> for Ttl {
    fn from(ttl: Option<T>) -> Self {
        ttl.map_or(Ttl::Never, Into::into)
    }
}

/// An instant strictly before `now`.
fn already_expired(now: DateTime<Utc>) -> Expiry {
    Expiry::At(now - Duration::seconds(1))
}
