use super::Connection;
use crate::{
    conn::{ConnectParams, ConnectionConfiguration, ConnectionCoreFactory, ServerId},
    monitor::{AsyncServerMonitor, Invalidate, ServerDescription},
    pool::{ConnectionPool, PoolStatistics},
    MdbResult, ServerSettings,
};
use std::{sync::Arc, time::Instant};

/// One server, with its connection pool and its monitor; the monitor and the pool
/// maintenance run as tokio tasks.
///
/// # Example
///
/// ```rust,no_run
/// use mdbconnect_impl::{
///     a_sync::Server, ClusterId, ConnectParams, ConnectionConfiguration, ServerAddress, ServerId,
///     ServerSettings,
/// };
/// # async fn example() -> mdbconnect_impl::MdbResult<()> {
/// let address = ServerAddress::new("localhost", 27017);
/// let server = Server::start(
///     ServerId::new(ClusterId::new(), address.clone()),
///     ConnectParams::new(address),
///     ConnectionConfiguration::default(),
///     ServerSettings::default(),
/// )?;
/// let mut connection = server.get_connection().await?;
/// let reply = connection.command("admin", bson::doc! {"ping": 1}).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Server {
    server_id: ServerId,
    pool: ConnectionPool<ConnectionCoreFactory>,
    monitor: AsyncServerMonitor,
}

impl Server {
    /// Creates the pool and starts the monitor and, if configured, the pool maintenance.
    ///
    /// Connections are opened lazily.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for inconsistent settings, or if called outside of a tokio
    /// runtime.
    pub fn start(
        server_id: ServerId,
        params: ConnectParams,
        config: ConnectionConfiguration,
        settings: ServerSettings,
    ) -> MdbResult<Self> {
        settings.validate()?;
        let factory = ConnectionCoreFactory::new(server_id.clone(), params, config);
        let pool = match settings.pool_listener() {
            Some(listener) => ConnectionPool::with_listener(
                factory.clone(),
                settings.pool_settings().clone(),
                listener,
            )?,
            None => ConnectionPool::new(factory.clone(), settings.pool_settings().clone())?,
        };
        pool.start_maintenance_async()?;
        let monitor = AsyncServerMonitor::start(
            server_id.address().clone(),
            factory,
            settings.monitor_settings().clone(),
            Arc::new(pool.clone()) as Arc<dyn Invalidate>,
            settings.monitor_listeners(),
        )?;
        debug!("server {server_id} started");
        Ok(Self {
            server_id,
            pool,
            monitor,
        })
    }

    /// The id of the server.
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// Takes a connection from the pool, waiting at most the configured maximal wait time.
    ///
    /// # Errors
    ///
    /// `MdbError::Timeout`, `MdbError::WaitQueueFull`, `MdbError::PoolClosed`, or the error
    /// that made opening a new connection fail.
    pub async fn get_connection(&self) -> MdbResult<Connection> {
        let start = Instant::now();
        let pooled = self
            .pool
            .acquire_async(self.pool.settings().max_wait_time())
            .await?;
        trace!(
            "got connection to {} in {} µs",
            self.server_id,
            Instant::now().duration_since(start).as_micros()
        );
        Ok(Connection::new(pooled))
    }

    /// What the monitor's latest heartbeat revealed.
    pub fn description(&self) -> ServerDescription {
        self.monitor.description()
    }

    /// Asks the monitor for an immediate heartbeat.
    pub fn connect(&self) {
        self.monitor.connect();
    }

    /// Marks all current connections of the pool as stale.
    pub fn invalidate(&self) {
        self.pool.invalidate();
    }

    /// The counters of the pool.
    pub fn pool_statistics(&self) -> PoolStatistics {
        self.pool.statistics()
    }

    /// Stops the monitor and closes the pool.
    ///
    /// Connections that are in use are closed when they are dropped.
    pub fn close(&self) {
        self.monitor.close();
        self.pool.close();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}
