use super::{
    monitor_core::MonitorCore, Invalidate, MonitorListeners, ServerDescription,
    ServerMonitorSettings, SyncHeartbeat,
};
use crate::{
    conn::{HandshakeReply, ServerAddress},
    pool::{ConnectionFactory, ManagedConnection, SyncOpen},
    MdbResult,
};
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

/// Watches one server from a dedicated thread.
///
/// The monitor sends a heartbeat over its own connection whenever the heartbeat
/// frequency has passed, or earlier if [`ServerMonitor::connect`] asks for it, but never
/// more often than the minimal heartbeat frequency allows. Each heartbeat produces a new
/// [`ServerDescription`]; meaningful changes are reported to the
/// [`ServerListener`](crate::ServerListener).
///
/// Dropping the monitor closes it.
pub struct ServerMonitor {
    address: ServerAddress,
    signal: Arc<Signal>,
    current: Arc<Mutex<ServerDescription>>,
}

impl ServerMonitor {
    /// Starts monitoring the server that the factory's connections go to.
    ///
    /// A transport failure of a heartbeat invalidates `invalidate`, usually the
    /// server's connection pool.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for inconsistent settings, `MdbError::Io` if the thread
    /// cannot be started.
    pub fn start<F>(
        address: ServerAddress,
        factory: F,
        settings: ServerMonitorSettings,
        invalidate: Arc<dyn Invalidate>,
        listeners: MonitorListeners,
    ) -> MdbResult<Self>
    where
        F: ConnectionFactory,
        F::Connection: SyncHeartbeat + SyncOpen,
    {
        settings.validate()?;
        let core = MonitorCore::new(address.clone(), invalidate, listeners);
        let current = core.current();
        let signal = Arc::new(Signal::default());
        let monitor_loop = MonitorLoop {
            core,
            factory,
            settings,
            signal: Arc::clone(&signal),
            connection: None,
        };
        std::thread::Builder::new()
            .name(format!("mdb-monitor-{address}"))
            .spawn(move || monitor_loop.run())?;
        Ok(Self {
            address,
            signal,
            current,
        })
    }

    /// The address of the monitored server.
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// The description produced by the latest heartbeat.
    pub fn description(&self) -> ServerDescription {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests an immediate heartbeat.
    pub fn connect(&self) {
        self.signal.lock().wake_requested = true;
        self.signal.condvar.notify_all();
    }

    /// Stops the monitor; does not wait for a running heartbeat to finish.
    ///
    /// Closing a closed monitor has no effect.
    pub fn close(&self) {
        let mut state = self.signal.lock();
        if !state.closed {
            debug!("closing the monitor of {}", self.address);
            state.closed = true;
            self.signal.condvar.notify_all();
        }
    }

    /// True if the monitor was closed.
    pub fn is_closed(&self) -> bool {
        self.signal.lock().closed
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ServerMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServerMonitor for {}", self.address)
    }
}

#[derive(Default)]
struct SignalState {
    wake_requested: bool,
    closed: bool,
}

#[derive(Default)]
struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}
impl Signal {
    fn lock(&self) -> MutexGuard<SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Waits until the next heartbeat is due; returns false once the monitor is closed.
    fn wait(&self, settings: &ServerMonitorSettings, heartbeat_started: Instant) -> bool {
        let (mut state, _) = self
            .condvar
            .wait_timeout_while(self.lock(), settings.heartbeat_frequency(), |s| {
                !s.closed && !s.wake_requested
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.wake_requested = false;
        if state.closed {
            return false;
        }

        // only closing interrupts this
        let remaining = (heartbeat_started + settings.min_heartbeat_frequency())
            .saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            state = self
                .condvar
                .wait_timeout_while(state, remaining, |s| !s.closed)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        !state.closed
    }
}

struct MonitorLoop<F: ConnectionFactory> {
    core: MonitorCore,
    factory: F,
    settings: ServerMonitorSettings,
    signal: Arc<Signal>,
    connection: Option<F::Connection>,
}

impl<F> MonitorLoop<F>
where
    F: ConnectionFactory,
    F::Connection: SyncHeartbeat + SyncOpen,
{
    fn run(mut self) {
        debug!("monitor of {} starts", self.core.address());
        loop {
            let started = self.core.heartbeat_started();
            let outcome = self.check();
            self.core.heartbeat_finished(started, outcome);
            if !self.signal.wait(&self.settings, started) {
                break;
            }
        }
        self.drop_connection();
        debug!("monitor of {} ends", self.core.address());
    }

    fn check(&mut self) -> MdbResult<(HandshakeReply, Duration)> {
        self.ensure_open()?;
        match self.heartbeat() {
            Err(e) if e.is_transport() => {
                self.core.transport_failed(&e);
                self.drop_connection();
                self.ensure_open()?;
                self.heartbeat()
            }
            outcome => outcome,
        }
    }

    fn ensure_open(&mut self) -> MdbResult<()> {
        if self
            .connection
            .as_ref()
            .is_some_and(|c| c.is_opened() && !c.is_closed())
        {
            return Ok(());
        }
        self.drop_connection();
        let mut connection = self.factory.create();
        if let Err(e) = connection.open_sync() {
            connection.close();
            return Err(e);
        }
        self.connection = Some(connection);
        Ok(())
    }

    fn heartbeat(&mut self) -> MdbResult<(HandshakeReply, Duration)> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| impl_err!("monitor has no open connection"))?;
        let start = Instant::now();
        let reply = connection.heartbeat_sync()?;
        Ok((reply, start.elapsed()))
    }

    fn drop_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}
