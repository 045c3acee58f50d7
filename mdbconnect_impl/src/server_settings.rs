use crate::{
    monitor::{MonitorListeners, ServerMonitorSettings},
    pool::{ConnectionPoolListener, ConnectionPoolSettings},
    MdbResult,
};
use debug_ignore::DebugIgnore;
use std::sync::Arc;

/// Settings of a server's connection pool and monitor, and the listeners they report to.
#[derive(Clone, Debug, Default)]
pub struct ServerSettings {
    pool: ConnectionPoolSettings,
    monitor: ServerMonitorSettings,
    pool_listener: DebugIgnore<Option<Arc<dyn ConnectionPoolListener>>>,
    monitor_listeners: MonitorListeners,
}

impl ServerSettings {
    /// Builder method to set the pool settings.
    #[must_use]
    pub fn with_pool_settings(mut self, pool: ConnectionPoolSettings) -> Self {
        self.pool = pool;
        self
    }
    /// Builder method to set the monitor settings.
    #[must_use]
    pub fn with_monitor_settings(mut self, monitor: ServerMonitorSettings) -> Self {
        self.monitor = monitor;
        self
    }
    /// Builder method to set the observer of the pool.
    #[must_use]
    pub fn with_pool_listener(mut self, listener: Arc<dyn ConnectionPoolListener>) -> Self {
        self.pool_listener = DebugIgnore(Some(listener));
        self
    }
    /// Builder method to set the listeners of the monitor.
    #[must_use]
    pub fn with_monitor_listeners(mut self, listeners: MonitorListeners) -> Self {
        self.monitor_listeners = listeners;
        self
    }

    /// The pool settings.
    pub fn pool_settings(&self) -> &ConnectionPoolSettings {
        &self.pool
    }
    /// The monitor settings.
    pub fn monitor_settings(&self) -> &ServerMonitorSettings {
        &self.monitor
    }

    /// Checks the pool and monitor settings.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for inconsistent values.
    pub fn validate(&self) -> MdbResult<()> {
        self.pool.validate()?;
        self.monitor.validate()
    }

    pub(crate) fn pool_listener(&self) -> Option<Arc<dyn ConnectionPoolListener>> {
        self.pool_listener.0.clone()
    }
    pub(crate) fn monitor_listeners(&self) -> MonitorListeners {
        self.monitor_listeners.clone()
    }
}
