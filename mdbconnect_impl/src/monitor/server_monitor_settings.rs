use crate::MdbResult;
use std::time::Duration;

/// Timing of the heartbeats of a [`ServerMonitor`](crate::ServerMonitor).
///
/// # Example
///
/// ```rust
/// use mdbconnect_impl::ServerMonitorSettings;
/// use std::time::Duration;
/// let settings = ServerMonitorSettings::default()
///     .with_heartbeat_frequency(Duration::from_secs(5))
///     .with_min_heartbeat_frequency(Duration::from_millis(200));
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerMonitorSettings {
    heartbeat_frequency: Duration,
    min_heartbeat_frequency: Duration,
}

impl Default for ServerMonitorSettings {
    fn default() -> Self {
        Self {
            heartbeat_frequency: Self::DEFAULT_HEARTBEAT_FREQUENCY,
            min_heartbeat_frequency: Self::DEFAULT_MIN_HEARTBEAT_FREQUENCY,
        }
    }
}

impl ServerMonitorSettings {
    /// Default interval between two regular heartbeats.
    pub const DEFAULT_HEARTBEAT_FREQUENCY: Duration = Duration::from_secs(10);
    /// Default minimal interval between two heartbeats, also when they are requested
    /// explicitly.
    pub const DEFAULT_MIN_HEARTBEAT_FREQUENCY: Duration = Duration::from_millis(500);

    /// Builder method to set the regular heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_frequency(mut self, frequency: Duration) -> Self {
        self.heartbeat_frequency = frequency;
        self
    }
    /// Builder method to set the minimal heartbeat interval.
    #[must_use]
    pub fn with_min_heartbeat_frequency(mut self, frequency: Duration) -> Self {
        self.min_heartbeat_frequency = frequency;
        self
    }

    /// Sets the regular heartbeat interval.
    pub fn set_heartbeat_frequency(&mut self, frequency: Duration) {
        self.heartbeat_frequency = frequency;
    }
    /// Sets the minimal heartbeat interval.
    pub fn set_min_heartbeat_frequency(&mut self, frequency: Duration) {
        self.min_heartbeat_frequency = frequency;
    }

    /// The regular heartbeat interval.
    pub fn heartbeat_frequency(&self) -> Duration {
        self.heartbeat_frequency
    }
    /// The minimal heartbeat interval.
    pub fn min_heartbeat_frequency(&self) -> Duration {
        self.min_heartbeat_frequency
    }

    /// Checks the consistency of the settings.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for inconsistent values.
    pub fn validate(&self) -> MdbResult<()> {
        if self.heartbeat_frequency.is_zero() {
            return Err(usage_err!("heartbeat_frequency must be greater than 0"));
        }
        if self.min_heartbeat_frequency > self.heartbeat_frequency {
            return Err(usage_err!(
                "min_heartbeat_frequency ({:?}) must not exceed heartbeat_frequency ({:?})",
                self.min_heartbeat_frequency,
                self.heartbeat_frequency
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::ServerMonitorSettings;
    use std::time::Duration;

    #[test]
    fn test_validation() {
        assert!(ServerMonitorSettings::default().validate().is_ok());
        assert!(ServerMonitorSettings::default()
            .with_heartbeat_frequency(Duration::from_millis(100))
            .validate()
            .is_err());
        assert!(ServerMonitorSettings::default()
            .with_heartbeat_frequency(Duration::ZERO)
            .with_min_heartbeat_frequency(Duration::ZERO)
            .validate()
            .is_err());
    }
}
