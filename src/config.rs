use std::time::Duration;

use crate::domains::error::ExpiryError;
use crate::domains::expiry::ttl::Ttl;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryConfig {
    /// Applied to entries assigned without an explicit ttl.
    pub default_ttl: Ttl,
    /// How often the reaper wakes up. Bounds how late an entry may be removed.
    pub poll_interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        ExpiryConfig { default_ttl: Ttl::Never, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

impl ExpiryConfig {
    /// `None` for `default_ttl_secs` means entries never expire unless told to.
    pub fn from_secs(default_ttl_secs: Option<f64>, poll_secs: f64) -> Result<Self, ExpiryError> {
        let default_ttl = match default_ttl_secs {
            | Some(secs) => Ttl::from_secs_f64(secs)?,
            | None => Ttl::Never,
        };
        let poll_interval = Duration::try_from_secs_f64(poll_secs)
            .map_err(|_| ExpiryError::InvalidInterval(poll_secs))?;

        Ok(Self::default().with_default_ttl(default_ttl).with_poll_interval(poll_interval))
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        // a default pointing at itself means nothing
        self.default_ttl = if ttl == Ttl::Default { Ttl::Never } else { ttl };
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }
}
