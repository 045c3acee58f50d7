use super::ServerDescription;
use crate::{
    conn::{HandshakeReply, ServerAddress},
    MdbError,
};
use std::{sync::Arc, time::Duration};

/// A change of a server's description.
#[derive(Clone, Debug)]
pub struct ServerDescriptionChangedEvent {
    previous: ServerDescription,
    current: ServerDescription,
}
impl ServerDescriptionChangedEvent {
    pub(crate) fn new(previous: ServerDescription, current: ServerDescription) -> Self {
        Self { previous, current }
    }
    /// The description before the change.
    pub fn previous(&self) -> &ServerDescription {
        &self.previous
    }
    /// The new description.
    pub fn current(&self) -> &ServerDescription {
        &self.current
    }
}

/// Receives the description changes a server monitor detects.
///
/// It is usually the component that selects servers. A description in state
/// `Connecting` with an error is how a monitor reports a lost server.
#[allow(unused_variables)]
pub trait ServerListener: Send + Sync {
    /// Called from the monitor's execution context after a meaningful change.
    fn server_description_changed(&self, event: &ServerDescriptionChangedEvent) {}
}

/// Observer of the individual heartbeats.
#[allow(unused_variables)]
pub trait ServerMonitorListener: Send + Sync {
    /// A heartbeat is about to be sent.
    fn heartbeat_started(&self, address: &ServerAddress) {}
    /// A heartbeat was answered.
    fn heartbeat_succeeded(&self, address: &ServerAddress, elapsed: Duration, reply: &HandshakeReply) {
    }
    /// A heartbeat failed, also after the retry.
    fn heartbeat_failed(&self, address: &ServerAddress, elapsed: Duration, error: &MdbError) {}
}

struct NoListener;
impl ServerListener for NoListener {}
impl ServerMonitorListener for NoListener {}

/// The listeners a monitor reports to; by default nobody.
#[derive(Clone)]
pub struct MonitorListeners {
    pub(crate) server: Arc<dyn ServerListener>,
    pub(crate) monitor: Arc<dyn ServerMonitorListener>,
}
impl Default for MonitorListeners {
    fn default() -> Self {
        Self {
            server: Arc::new(NoListener),
            monitor: Arc::new(NoListener),
        }
    }
}
impl MonitorListeners {
    /// Builder method to set the receiver of description changes.
    #[must_use]
    pub fn with_server_listener(mut self, listener: Arc<dyn ServerListener>) -> Self {
        self.server = listener;
        self
    }
    /// Builder method to set the heartbeat observer.
    #[must_use]
    pub fn with_monitor_listener(mut self, listener: Arc<dyn ServerMonitorListener>) -> Self {
        self.monitor = listener;
        self
    }
}
impl std::fmt::Debug for MonitorListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MonitorListeners")
    }
}
