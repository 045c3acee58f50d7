use crate::MdbResult;
use std::time::Duration;

/// Limits and timings of a [`ConnectionPool`](crate::ConnectionPool).
///
/// All values are validated when the pool is created.
///
/// # Example
///
/// ```rust
/// use mdbconnect_impl::ConnectionPoolSettings;
/// use std::time::Duration;
///
/// let settings = ConnectionPoolSettings::default()
///     .with_max_size(20)
///     .with_min_size(2)
///     .with_max_connection_idle_time(Some(Duration::from_secs(300)));
/// assert!(settings.validate().is_ok());
/// assert!(settings.needs_maintenance());
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionPoolSettings {
    max_size: usize,
    min_size: usize,
    max_wait_queue_size: usize,
    max_wait_time: Option<Duration>,
    max_connection_life_time: Option<Duration>,
    max_connection_idle_time: Option<Duration>,
    maintenance_initial_delay: Duration,
    maintenance_frequency: Duration,
}

impl Default for ConnectionPoolSettings {
    fn default() -> Self {
        Self {
            max_size: Self::DEFAULT_MAX_SIZE,
            min_size: 0,
            max_wait_queue_size: Self::DEFAULT_MAX_WAIT_QUEUE_SIZE,
            max_wait_time: Self::DEFAULT_MAX_WAIT_TIME,
            max_connection_life_time: None,
            max_connection_idle_time: None,
            maintenance_initial_delay: Duration::ZERO,
            maintenance_frequency: Self::DEFAULT_MAINTENANCE_FREQUENCY,
        }
    }
}

impl ConnectionPoolSettings {
    /// Default value for the maximal number of connections.
    pub const DEFAULT_MAX_SIZE: usize = 100;

    /// Default value for the maximal number of callers that may wait for a connection
    /// at the same time.
    pub const DEFAULT_MAX_WAIT_QUEUE_SIZE: usize = 500;

    /// Default value for the time an acquire may wait; `None` waits forever.
    pub const DEFAULT_MAX_WAIT_TIME: Option<Duration> = Some(Duration::from_secs(120));

    /// Default value for the interval of the maintenance runs.
    pub const DEFAULT_MAINTENANCE_FREQUENCY: Duration = Duration::from_secs(60);

    /// Builder-method for the maximal number of connections.
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
    /// Builder-method for the number of connections the maintenance keeps open.
    #[must_use]
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }
    /// Builder-method for the maximal number of concurrent callers of `acquire`.
    #[must_use]
    pub fn with_max_wait_queue_size(mut self, max_wait_queue_size: usize) -> Self {
        self.max_wait_queue_size = max_wait_queue_size;
        self
    }
    /// Builder-method for the default timeout of `acquire`.
    #[must_use]
    pub fn with_max_wait_time(mut self, max_wait_time: Option<Duration>) -> Self {
        self.max_wait_time = max_wait_time;
        self
    }
    /// Builder-method for the time after which an opened connection is retired.
    #[must_use]
    pub fn with_max_connection_life_time(mut self, life_time: Option<Duration>) -> Self {
        self.max_connection_life_time = life_time;
        self
    }
    /// Builder-method for the time after which an unused connection is retired.
    #[must_use]
    pub fn with_max_connection_idle_time(mut self, idle_time: Option<Duration>) -> Self {
        self.max_connection_idle_time = idle_time;
        self
    }
    /// Builder-method for the delay of the first maintenance run.
    #[must_use]
    pub fn with_maintenance_initial_delay(mut self, delay: Duration) -> Self {
        self.maintenance_initial_delay = delay;
        self
    }
    /// Builder-method for the interval of the maintenance runs.
    #[must_use]
    pub fn with_maintenance_frequency(mut self, frequency: Duration) -> Self {
        self.maintenance_frequency = frequency;
        self
    }

    /// Sets the maximal number of connections.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }
    /// Sets the number of connections the maintenance keeps open.
    pub fn set_min_size(&mut self, min_size: usize) {
        self.min_size = min_size;
    }
    /// Sets the default timeout of `acquire`.
    pub fn set_max_wait_time(&mut self, max_wait_time: Option<Duration>) {
        self.max_wait_time = max_wait_time;
    }

    /// The maximal number of connections.
    pub fn max_size(&self) -> usize {
        self.max_size
    }
    /// The number of connections the maintenance keeps open.
    pub fn min_size(&self) -> usize {
        self.min_size
    }
    /// The maximal number of concurrent callers of `acquire`.
    pub fn max_wait_queue_size(&self) -> usize {
        self.max_wait_queue_size
    }
    /// The default timeout of `acquire`.
    pub fn max_wait_time(&self) -> Option<Duration> {
        self.max_wait_time
    }
    /// The time after which an opened connection is retired.
    pub fn max_connection_life_time(&self) -> Option<Duration> {
        self.max_connection_life_time
    }
    /// The time after which an unused connection is retired.
    pub fn max_connection_idle_time(&self) -> Option<Duration> {
        self.max_connection_idle_time
    }
    /// The delay of the first maintenance run.
    pub fn maintenance_initial_delay(&self) -> Duration {
        self.maintenance_initial_delay
    }
    /// The interval of the maintenance runs.
    pub fn maintenance_frequency(&self) -> Duration {
        self.maintenance_frequency
    }

    /// True if a maintenance task has something to do.
    pub fn needs_maintenance(&self) -> bool {
        self.min_size > 0
            || self.max_connection_idle_time.is_some()
            || self.max_connection_life_time.is_some()
    }

    /// Checks the consistency of the settings.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for inconsistent values.
    pub fn validate(&self) -> MdbResult<()> {
        if self.max_size == 0 {
            return Err(usage_err!("max_size must be greater than 0"));
        }
        if self.min_size > self.max_size {
            return Err(usage_err!(
                "min_size ({}) must not exceed max_size ({})",
                self.min_size,
                self.max_size
            ));
        }
        if self.maintenance_frequency.is_zero() {
            return Err(usage_err!("maintenance_frequency must be greater than 0"));
        }
        Ok(())
    }
}
