use super::{
    monitor_core::MonitorCore, AsyncHeartbeat, Invalidate, MonitorListeners, ServerDescription,
    ServerMonitorSettings,
};
use crate::{
    conn::{HandshakeReply, ServerAddress},
    pool::{AsyncOpen, ConnectionFactory, ManagedConnection},
    MdbResult,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};
use tokio::sync::Notify;

/// Watches one server from a tokio task.
///
/// Behaves like [`ServerMonitor`](crate::ServerMonitor), but never blocks a thread.
/// Dropping the monitor closes it.
pub struct AsyncServerMonitor {
    address: ServerAddress,
    signal: Arc<Signal>,
    current: Arc<Mutex<ServerDescription>>,
}

impl AsyncServerMonitor {
    /// Starts monitoring the server that the factory's connections go to.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for inconsistent settings, or if called outside of a tokio
    /// runtime.
    pub fn start<F>(
        address: ServerAddress,
        factory: F,
        settings: ServerMonitorSettings,
        invalidate: Arc<dyn Invalidate>,
        listeners: MonitorListeners,
    ) -> MdbResult<Self>
    where
        F: ConnectionFactory,
        F::Connection: AsyncHeartbeat + AsyncOpen,
    {
        settings.validate()?;
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| usage_err!("the async monitor needs a tokio runtime: {e}"))?;
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
        handle.spawn(monitor_loop.run());
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
        self.signal.wake.notify_one();
    }

    /// Stops the monitor; does not wait for a running heartbeat to finish.
    ///
    /// Closing a closed monitor has no effect.
    pub fn close(&self) {
        if !self.signal.closed.swap(true, Ordering::SeqCst) {
            debug!("closing the monitor of {}", self.address);
            self.signal.wake.notify_one();
            self.signal.closing.notify_one();
        }
    }

    /// True if the monitor was closed.
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }
}

impl Drop for AsyncServerMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AsyncServerMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AsyncServerMonitor for {}", self.address)
    }
}

// A notification that is sent while nobody waits is kept for the next wait.
#[derive(Default)]
struct Signal {
    closed: AtomicBool,
    wake: Notify,
    closing: Notify,
}
impl Signal {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // Waits until the next heartbeat is due; returns false once the monitor is closed.
    async fn wait(&self, settings: &ServerMonitorSettings, heartbeat_started: Instant) -> bool {
        if self.is_closed() {
            return false;
        }
        let _woken = tokio::time::timeout(settings.heartbeat_frequency(), self.wake.notified()).await;
        if self.is_closed() {
            return false;
        }

        // only closing interrupts this
        let remaining = (heartbeat_started + settings.min_heartbeat_frequency())
            .saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            let _closing = tokio::time::timeout(remaining, self.closing.notified()).await;
        }
        !self.is_closed()
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
    F::Connection: AsyncHeartbeat + AsyncOpen,
{
    async fn run(mut self) {
        debug!("async monitor of {} starts", self.core.address());
        loop {
            let started = self.core.heartbeat_started();
            let outcome = self.check().await;
            self.core.heartbeat_finished(started, outcome);
            if !self.signal.wait(&self.settings, started).await {
                break;
            }
        }
        self.drop_connection();
        debug!("async monitor of {} ends", self.core.address());
    }

    async fn check(&mut self) -> MdbResult<(HandshakeReply, Duration)> {
        self.ensure_open().await?;
        match self.heartbeat().await {
            Err(e) if e.is_transport() => {
                self.core.transport_failed(&e);
                self.drop_connection();
                self.ensure_open().await?;
                self.heartbeat().await
            }
            outcome => outcome,
        }
    }

    async fn ensure_open(&mut self) -> MdbResult<()> {
        if self
            .connection
            .as_ref()
            .is_some_and(|c| c.is_opened() && !c.is_closed())
        {
            return Ok(());
        }
        self.drop_connection();
        let mut connection = self.factory.create();
        if let Err(e) = connection.open_async().await {
            connection.close();
            return Err(e);
        }
        self.connection = Some(connection);
        Ok(())
    }

    async fn heartbeat(&mut self) -> MdbResult<(HandshakeReply, Duration)> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| impl_err!("monitor has no open connection"))?;
        let start = Instant::now();
        let reply = connection.heartbeat_async().await?;
        Ok((reply, start.elapsed()))
    }

    fn drop_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}
