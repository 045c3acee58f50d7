//! Background monitoring of a server.
//!
//! A monitor keeps its own connection to the server, probes it with the handshake
//! command, and publishes a [`ServerDescription`] per probe.

#[cfg(feature = "async")]
mod async_server_monitor;
mod heartbeat;
mod monitor_core;
mod monitor_listener;
mod round_trip_time;
mod server_description;
mod server_monitor_settings;
#[cfg(feature = "sync")]
mod sync_server_monitor;

#[cfg(feature = "async")]
pub use self::{async_server_monitor::AsyncServerMonitor, heartbeat::AsyncHeartbeat};
pub use self::{
    heartbeat::{Invalidate, NothingToInvalidate},
    monitor_listener::{
        MonitorListeners, ServerDescriptionChangedEvent, ServerListener, ServerMonitorListener,
    },
    round_trip_time::RoundTripTimeAverage,
    server_description::{ServerDescription, ServerState},
    server_monitor_settings::ServerMonitorSettings,
};
#[cfg(feature = "sync")]
pub use self::{heartbeat::SyncHeartbeat, sync_server_monitor::ServerMonitor};
