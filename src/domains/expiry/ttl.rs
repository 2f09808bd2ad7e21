use std::time::Duration;
use tokio::time::Instant;

use crate::domains::error::ExpiryError;

/// How long an entry lives once assigned or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Due `Duration` after the moment it was set. Zero means due on the next sweep.
    After(Duration),
    /// Never reaped. Only explicit removal gets rid of the entry.
    Never,
    /// Whatever the map was configured with.
    #[default]
    Default,
}

impl Ttl {
    pub fn secs(secs: u64) -> Self {
        Ttl::After(Duration::from_secs(secs))
    }

    pub fn millis(millis: u64) -> Self {
        Ttl::After(Duration::from_millis(millis))
    }

    /// Fractional seconds. Positive infinity means [`Ttl::Never`].
    pub fn from_secs_f64(secs: f64) -> Result<Self, ExpiryError> {
        if secs == f64::INFINITY {
            return Ok(Ttl::Never);
        }
        if secs.is_nan() || secs < 0.0 {
            return Err(ExpiryError::InvalidTtl(secs));
        }
        Duration::try_from_secs_f64(secs).map(Ttl::After).map_err(|_| ExpiryError::InvalidTtl(secs))
    }

    /// `None` means the entry carries no deadline.
    pub(crate) fn resolve(self, default: Ttl) -> Option<Duration> {
        match self {
            | Ttl::After(duration) => Some(duration),
            | Ttl::Never => None,
            | Ttl::Default => match default {
                | Ttl::After(duration) => Some(duration),
                | Ttl::Never | Ttl::Default => None,
            },
        }
    }

    // a deadline past the end of representable time is as good as never
    pub(crate) fn deadline_from(self, now: Instant, default: Ttl) -> Option<Instant> {
        self.resolve(default).and_then(|ttl| now.checked_add(ttl))
    }
}

impl From<Duration> for Ttl {
    fn from(value: Duration) -> Self {
        Ttl::After(value)
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(value: Option<Duration>) -> Self {
        value.map_or(Ttl::Never, Ttl::After)
    }
}
