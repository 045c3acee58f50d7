use super::{
    pool_listener::NoListener, ConnectionFactory, ConnectionPoolListener, ConnectionPoolSettings,
    ConnectionState, ManagedConnection, PooledConnection, RemovalReason, StaleReason,
    TrackedConnection,
};
#[cfg(feature = "async")]
use super::AsyncOpen;
#[cfg(feature = "sync")]
use super::SyncOpen;
use crate::{MdbError, MdbResult};
use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

/// A bounded pool of connections to one server.
///
/// The pool creates connections lazily with its [`ConnectionFactory`]; the first caller
/// that gets a new connection opens it. Every connection is stamped with the pool's
/// generation when it is created; [`ConnectionPool::invalidate`] starts a new generation,
/// and connections of older generations are destroyed at their next check, rather than
/// being torn down while they are in use.
///
/// The handle is cheap to clone; all clones share the same pool.
pub struct ConnectionPool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}
impl<F: ConnectionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
impl<F: ConnectionFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConnectionPool {:?}", self.statistics())
    }
}

/// A snapshot of the counters of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStatistics {
    total: usize,
    available: usize,
    waiters: usize,
    generation: u64,
}
impl PoolStatistics {
    /// Number of connections that exist, whether in use or not.
    pub fn total(&self) -> usize {
        self.total
    }
    /// Number of connections that wait in the pool for being used.
    pub fn available(&self) -> usize {
        self.available
    }
    /// Number of connections that are currently handed out, or being opened.
    pub fn in_use(&self) -> usize {
        self.total - self.available
    }
    /// Number of callers that are currently in `acquire`.
    pub fn waiters(&self) -> usize {
        self.waiters
    }
    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Creates a pool without listener.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if the settings are inconsistent.
    pub fn new(factory: F, settings: ConnectionPoolSettings) -> MdbResult<Self> {
        Self::with_listener(factory, settings, Arc::new(NoListener))
    }

    /// Creates a pool that reports to the given listener.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if the settings are inconsistent.
    pub fn with_listener(
        factory: F,
        settings: ConnectionPoolSettings,
        listener: Arc<dyn ConnectionPoolListener>,
    ) -> MdbResult<Self> {
        settings.validate()?;
        listener.connection_pool_opened(&settings);
        debug!("connection pool opened with max_size {}", settings.max_size());
        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                settings,
                state: Mutex::new(PoolState::new()),
                maintenance_signal: Condvar::new(),
                listener,
            }),
        })
    }

    /// The settings of the pool.
    pub fn settings(&self) -> &ConnectionPoolSettings {
        &self.inner.settings
    }

    /// The factory of the pool.
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Gives a connection back to the pool.
    ///
    /// Dropping the connection has the same effect.
    pub fn release(&self, connection: PooledConnection<F>) {
        connection.release();
    }

    /// Starts a new generation; all existing connections will be destroyed at their
    /// next check.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    /// Closes the pool and all connections in it; connections that are in use are
    /// closed when they come back.
    ///
    /// Callers that wait for a connection fail with `MdbError::PoolClosed`.
    /// Closing a closed pool has no effect.
    pub fn close(&self) {
        self.inner.close();
    }

    /// True if the pool was closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock_recover().closed
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.inner.lock_recover().generation
    }

    /// The current counters.
    pub fn statistics(&self) -> PoolStatistics {
        let state = self.inner.lock_recover();
        PoolStatistics {
            total: state.total,
            available: state.available.len(),
            waiters: state.waiters,
            generation: state.generation,
        }
    }
}

#[cfg(feature = "sync")]
impl<F> ConnectionPool<F>
where
    F: ConnectionFactory,
    F::Connection: SyncOpen,
{
    /// Hands out a connection, blocking.
    ///
    /// With `None` the call waits as long as it takes, with `Some(Duration::ZERO)`
    /// it never waits.
    ///
    /// # Errors
    ///
    /// `MdbError::WaitQueueFull` if too many callers are already in `acquire`;
    /// `MdbError::Timeout` if no connection became available in time;
    /// `MdbError::PoolClosed`; or the error that made opening a new connection fail.
    pub fn acquire_sync(&self, timeout: Option<Duration>) -> MdbResult<PooledConnection<F>> {
        let start = Instant::now();
        let slot = {
            let _wait_queue = WaitQueueGuard::enter(&self.inner)?;
            self.inner.wait_for_slot_sync(start, timeout.map(|t| start + t))?
        };
        let connection = self.inner.open_slot_sync(slot)?;
        trace!(
            "acquired connection after {} µs",
            Instant::now().duration_since(start).as_micros()
        );
        Ok(connection)
    }

    /// Starts a thread that regularly removes expired connections and tops the pool up
    /// to its minimal size.
    ///
    /// Does nothing if the settings require no maintenance. The thread ends when the pool
    /// is closed.
    ///
    /// # Errors
    ///
    /// `MdbError::Io` if the thread cannot be started.
    pub fn start_maintenance_sync(&self) -> MdbResult<()> {
        if !self.inner.settings.needs_maintenance() {
            return Ok(());
        }
        let weak = Arc::downgrade(&self.inner);
        let initial_delay = self.inner.settings.maintenance_initial_delay();
        let frequency = self.inner.settings.maintenance_frequency();
        std::thread::Builder::new()
            .name("mdb-pool-maintenance".to_string())
            .spawn(move || {
                let mut delay = initial_delay;
                while let Some(inner) = weak.upgrade() {
                    if !inner.sleep_unless_closed(delay) {
                        break;
                    }
                    inner.maintain_sync();
                    delay = frequency;
                }
                debug!("pool maintenance thread ends");
            })?;
        Ok(())
    }
}

#[cfg(feature = "async")]
impl<F> ConnectionPool<F>
where
    F: ConnectionFactory,
    F::Connection: AsyncOpen,
{
    /// Hands out a connection; waits without blocking a thread.
    ///
    /// With `None` the call waits as long as it takes, with `Some(Duration::ZERO)`
    /// it never waits.
    ///
    /// # Errors
    ///
    /// `MdbError::WaitQueueFull` if too many callers are already in `acquire`;
    /// `MdbError::Timeout` if no connection became available in time;
    /// `MdbError::PoolClosed`; or the error that made opening a new connection fail.
    pub async fn acquire_async(
        &self,
        timeout: Option<Duration>,
    ) -> MdbResult<PooledConnection<F>> {
        let start = Instant::now();
        let slot = {
            let _wait_queue = WaitQueueGuard::enter(&self.inner)?;
            self.inner
                .wait_for_slot_async(start, timeout.map(|t| start + t))
                .await?
        };
        let connection = self.inner.open_slot_async(slot).await?;
        trace!(
            "acquired connection after {} µs",
            Instant::now().duration_since(start).as_micros()
        );
        Ok(connection)
    }

    /// Spawns a task that regularly removes expired connections and tops the pool up
    /// to its minimal size.
    ///
    /// Does nothing if the settings require no maintenance. The task ends when the pool
    /// is closed.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if called outside of a tokio runtime.
    pub fn start_maintenance_async(&self) -> MdbResult<()> {
        if !self.inner.settings.needs_maintenance() {
            return Ok(());
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| usage_err!("pool maintenance needs a tokio runtime: {e}"))?;
        let weak = Arc::downgrade(&self.inner);
        let initial_delay = self.inner.settings.maintenance_initial_delay();
        let frequency = self.inner.settings.maintenance_frequency();
        handle.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut interval = tokio::time::interval(frequency);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if inner.lock_recover().closed {
                    break;
                }
                inner.maintain_async().await;
            }
            debug!("pool maintenance task ends");
        });
        Ok(())
    }
}

// How a blocked caller is woken up.
enum Waker {
    #[cfg(feature = "sync")]
    Thread(std::thread::Thread),
    #[cfg(feature = "async")]
    Task(Arc<tokio::sync::Notify>),
}
impl Waker {
    #[cfg(feature = "sync")]
    fn is_thread(&self) -> bool {
        matches!(self, Self::Thread(_))
    }
    #[cfg(not(feature = "sync"))]
    fn is_thread(&self) -> bool {
        false
    }

    fn wake(self) {
        match self {
            #[cfg(feature = "sync")]
            Self::Thread(thread) => thread.unpark(),
            #[cfg(feature = "async")]
            Self::Task(notify) => notify.notify_one(),
        }
    }
}

// What a caller gets from the pool: a pooled connection, or the permission to create one.
enum Slot<C> {
    Pooled(TrackedConnection<C>),
    New { generation: u64 },
}

struct PoolState<C> {
    available: VecDeque<TrackedConnection<C>>,
    // created and not yet destroyed, including those that are being opened
    total: usize,
    generation: u64,
    waiters: usize,
    blocked: VecDeque<(u64, Waker)>,
    next_waiter_id: u64,
    closed: bool,
}
impl<C: ManagedConnection> PoolState<C> {
    fn new() -> Self {
        Self {
            available: VecDeque::new(),
            total: 0,
            generation: 0,
            waiters: 0,
            blocked: VecDeque::new(),
            next_waiter_id: 0,
            closed: false,
        }
    }

    // Takes the most recently returned usable connection, or reserves room for a new one.
    // Stale connections found on the way are taken out and returned for destruction; they
    // keep their room until they are closed.
    #[allow(clippy::type_complexity)]
    fn checkout(
        &mut self,
        settings: &ConnectionPoolSettings,
    ) -> (Option<Slot<C>>, Vec<(TrackedConnection<C>, StaleReason)>) {
        let now = Instant::now();
        let mut stale = Vec::new();
        while let Some(tracked) = self.available.pop_back() {
            match tracked.state(self.generation, settings, now) {
                ConnectionState::Active { .. } => return (Some(Slot::Pooled(tracked)), stale),
                ConnectionState::Stale(reason) => stale.push((tracked, reason)),
            }
        }
        if self.total < settings.max_size() {
            self.total += 1;
            (
                Some(Slot::New {
                    generation: self.generation,
                }),
                stale,
            )
        } else {
            (None, stale)
        }
    }

    fn block(&mut self, waker: Waker) -> u64 {
        let id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.blocked.push_back((id, waker));
        id
    }

    // Returns false if the waiter was already woken up.
    fn unblock(&mut self, id: u64) -> bool {
        match self.blocked.iter().position(|(i, _)| *i == id) {
            Some(pos) => {
                self.blocked.remove(pos);
                true
            }
            None => false,
        }
    }

    // Wakes exactly one blocked caller, blocked threads first.
    fn wake_one(&mut self) {
        let position = self
            .blocked
            .iter()
            .position(|(_, w)| w.is_thread())
            .or(if self.blocked.is_empty() { None } else { Some(0) });
        if let Some((_, waker)) = position.and_then(|pos| self.blocked.remove(pos)) {
            waker.wake();
        }
    }

    fn wake_all(&mut self) {
        for (_, waker) in self.blocked.drain(..) {
            waker.wake();
        }
    }
}

pub(crate) struct PoolInner<F: ConnectionFactory> {
    factory: F,
    settings: ConnectionPoolSettings,
    state: Mutex<PoolState<F::Connection>>,
    maintenance_signal: Condvar,
    listener: Arc<dyn ConnectionPoolListener>,
}

impl<F: ConnectionFactory> PoolInner<F> {
    fn lock(&self) -> MdbResult<MutexGuard<PoolState<F::Connection>>> {
        Ok(self.state.lock()?)
    }

    // For paths that cannot report errors; the state is consistent after every
    // critical section, so a poisoned lock is still usable.
    fn lock_recover(&self) -> MutexGuard<PoolState<F::Connection>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn invalidate(&self) {
        let generation = {
            let mut state = self.lock_recover();
            state.generation += 1;
            state.generation
        };
        debug!("connection pool invalidated, new generation is {generation}");
    }

    fn close(&self) {
        let drained: Vec<TrackedConnection<F::Connection>> = {
            let mut state = self.lock_recover();
            if state.closed {
                return;
            }
            state.closed = true;
            state.wake_all();
            state.available.drain(..).collect()
        };
        self.maintenance_signal.notify_all();
        for tracked in drained {
            self.remove(tracked, RemovalReason::PoolClosed);
        }
        self.listener.connection_pool_closed();
        debug!("connection pool closed");
    }

    fn destroy(&self, mut tracked: TrackedConnection<F::Connection>, reason: RemovalReason) {
        trace!(
            "destroying connection of generation {}: {reason:?}",
            tracked.generation()
        );
        tracked.connection.close();
        self.listener.connection_removed(reason);
    }

    // Closes a connection that still has its room in the pool, and only then gives the
    // room to a waiter.
    fn remove(&self, tracked: TrackedConnection<F::Connection>, reason: RemovalReason) {
        self.destroy(tracked, reason);
        let mut state = self.lock_recover();
        state.total -= 1;
        state.wake_one();
    }

    fn remove_stale(&self, stale: Vec<(TrackedConnection<F::Connection>, StaleReason)>) {
        for (tracked, reason) in stale {
            self.remove(tracked, RemovalReason::Stale(reason));
        }
    }

    pub(crate) fn check_in(&self, tracked: TrackedConnection<F::Connection>) {
        let generation = tracked.generation();
        let rejected = self.put_back(tracked);
        self.listener.connection_checked_in(generation);
        if let Some((tracked, reason)) = rejected {
            self.remove(tracked, reason);
        }
    }

    // Returns the connection if it must be removed; it keeps its room until then.
    fn put_back(
        &self,
        tracked: TrackedConnection<F::Connection>,
    ) -> Option<(TrackedConnection<F::Connection>, RemovalReason)> {
        let mut state = self.lock_recover();
        let rejection = if state.closed {
            Some(RemovalReason::PoolClosed)
        } else {
            match tracked.state(state.generation, &self.settings, Instant::now()) {
                ConnectionState::Active { .. } => None,
                ConnectionState::Stale(reason) => Some(RemovalReason::Stale(reason)),
            }
        };
        match rejection {
            None => {
                state.available.push_back(tracked);
                state.wake_one();
                None
            }
            Some(reason) => Some((tracked, reason)),
        }
    }

    // Finds a slot, or the outcome of the attempt, without waiting.
    fn try_slot(
        &self,
        start: Instant,
        deadline: Option<Instant>,
    ) -> MdbResult<Result<Slot<F::Connection>, MutexGuard<PoolState<F::Connection>>>> {
        loop {
            let mut state = self.lock()?;
            if state.closed {
                return Err(MdbError::PoolClosed);
            }
            let (slot, stale) = state.checkout(&self.settings);
            if !stale.is_empty() {
                drop(state);
                self.remove_stale(stale);
                match slot {
                    Some(slot) => return Ok(Ok(slot)),
                    // the removed connections made room
                    None => continue,
                }
            }
            if let Some(slot) = slot {
                return Ok(Ok(slot));
            }
            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return Err(MdbError::Timeout {
                    waited: now.duration_since(start),
                });
            }
            return Ok(Err(state));
        }
    }

    #[cfg(feature = "sync")]
    fn wait_for_slot_sync(
        &self,
        start: Instant,
        deadline: Option<Instant>,
    ) -> MdbResult<Slot<F::Connection>> {
        loop {
            let mut state = match self.try_slot(start, deadline)? {
                Ok(slot) => return Ok(slot),
                Err(state) => state,
            };
            let id = state.block(Waker::Thread(std::thread::current()));
            drop(state);
            match deadline {
                Some(deadline) => {
                    std::thread::park_timeout(deadline.saturating_duration_since(Instant::now()));
                }
                None => std::thread::park(),
            }
            self.lock()?.unblock(id);
        }
    }

    #[cfg(feature = "async")]
    async fn wait_for_slot_async(
        &self,
        start: Instant,
        deadline: Option<Instant>,
    ) -> MdbResult<Slot<F::Connection>> {
        loop {
            let (notify, blocked) = {
                let mut state = match self.try_slot(start, deadline)? {
                    Ok(slot) => return Ok(slot),
                    Err(state) => state,
                };
                let notify = Arc::new(tokio::sync::Notify::new());
                let id = state.block(Waker::Task(Arc::clone(&notify)));
                (notify, BlockedGuard { inner: self, id })
            };
            match deadline {
                Some(deadline) => {
                    let deadline = tokio::time::Instant::from_std(deadline);
                    let _elapsed = tokio::time::timeout_at(deadline, notify.notified()).await;
                }
                None => notify.notified().await,
            }
            blocked.finish();
        }
    }

    #[cfg(feature = "sync")]
    fn open_slot_sync(self: &Arc<Self>, slot: Slot<F::Connection>) -> MdbResult<PooledConnection<F>>
    where
        F::Connection: SyncOpen,
    {
        let mut tracked = self.tracked_from(slot);
        if !tracked.connection.is_opened() {
            if let Err(e) = tracked.connection.open_sync() {
                warn!("opening a pooled connection failed: {e}");
                self.remove(tracked, RemovalReason::OpenFailed);
                return Err(e);
            }
            tracked.mark_opened();
            self.listener.connection_added(tracked.generation());
        }
        Ok(self.hand_out(tracked))
    }

    #[cfg(feature = "async")]
    async fn open_slot_async(
        self: &Arc<Self>,
        slot: Slot<F::Connection>,
    ) -> MdbResult<PooledConnection<F>>
    where
        F::Connection: AsyncOpen,
    {
        let mut tracked = self.tracked_from(slot);
        if !tracked.connection.is_opened() {
            if let Err(e) = tracked.connection.open_async().await {
                warn!("opening a pooled connection failed: {e}");
                self.remove(tracked, RemovalReason::OpenFailed);
                return Err(e);
            }
            tracked.mark_opened();
            self.listener.connection_added(tracked.generation());
        }
        Ok(self.hand_out(tracked))
    }

    fn tracked_from(&self, slot: Slot<F::Connection>) -> TrackedConnection<F::Connection> {
        match slot {
            Slot::Pooled(tracked) => tracked,
            Slot::New { generation } => TrackedConnection::new(self.factory.create(), generation),
        }
    }

    fn hand_out(self: &Arc<Self>, tracked: TrackedConnection<F::Connection>) -> PooledConnection<F> {
        self.listener.connection_checked_out(tracked.generation());
        PooledConnection::new(tracked, Arc::clone(self))
    }

    // Returns false if the pool was closed.
    #[cfg(feature = "sync")]
    fn sleep_unless_closed(&self, duration: Duration) -> bool {
        let state = self.lock_recover();
        let (state, _) = self
            .maintenance_signal
            .wait_timeout_while(state, duration, |state| !state.closed)
            .unwrap_or_else(PoisonError::into_inner);
        !state.closed
    }

    // Removes expired connections from the pool.
    fn prune(&self) {
        let stale = {
            let mut state = self.lock_recover();
            if state.closed {
                return;
            }
            let now = Instant::now();
            let generation = state.generation;
            let mut stale = Vec::new();
            let mut kept = VecDeque::with_capacity(state.available.len());
            for tracked in state.available.drain(..) {
                match tracked.state(generation, &self.settings, now) {
                    ConnectionState::Active { .. } => kept.push_back(tracked),
                    ConnectionState::Stale(reason) => stale.push((tracked, reason)),
                }
            }
            state.available = kept;
            stale
        };
        if !stale.is_empty() {
            debug!("pool maintenance removes {} connection(s)", stale.len());
        }
        self.remove_stale(stale);
    }

    // Reserves room for a connection if the pool is below its minimal size.
    fn reserve_for_min_size(&self) -> Option<u64> {
        let mut state = self.lock_recover();
        if state.closed || state.total >= self.settings.min_size() {
            None
        } else {
            state.total += 1;
            Some(state.generation)
        }
    }

    fn add_opened(&self, mut tracked: TrackedConnection<F::Connection>) {
        tracked.mark_opened();
        self.listener.connection_added(tracked.generation());
        if let Some((tracked, reason)) = self.put_back(tracked) {
            self.remove(tracked, reason);
        }
    }

    #[cfg(feature = "sync")]
    fn maintain_sync(&self)
    where
        F::Connection: SyncOpen,
    {
        self.prune();
        while let Some(generation) = self.reserve_for_min_size() {
            let mut tracked = TrackedConnection::new(self.factory.create(), generation);
            match tracked.connection.open_sync() {
                Ok(()) => self.add_opened(tracked),
                Err(e) => {
                    warn!("pool maintenance cannot open a connection: {e}");
                    self.remove(tracked, RemovalReason::OpenFailed);
                    break;
                }
            }
        }
    }

    #[cfg(feature = "async")]
    async fn maintain_async(&self)
    where
        F::Connection: AsyncOpen,
    {
        self.prune();
        while let Some(generation) = self.reserve_for_min_size() {
            let mut tracked = TrackedConnection::new(self.factory.create(), generation);
            match tracked.connection.open_async().await {
                Ok(()) => self.add_opened(tracked),
                Err(e) => {
                    warn!("pool maintenance cannot open a connection: {e}");
                    self.remove(tracked, RemovalReason::OpenFailed);
                    break;
                }
            }
        }
    }
}

// Admission to `acquire`; leaving the scope, also by cancellation, frees the place.
struct WaitQueueGuard<'a, F: ConnectionFactory> {
    inner: &'a PoolInner<F>,
}
impl<'a, F: ConnectionFactory> WaitQueueGuard<'a, F> {
    fn enter(inner: &'a PoolInner<F>) -> MdbResult<Self> {
        {
            let mut state = inner.lock()?;
            if state.closed {
                return Err(MdbError::PoolClosed);
            }
            if state.waiters >= inner.settings.max_wait_queue_size() {
                return Err(MdbError::WaitQueueFull {
                    max: inner.settings.max_wait_queue_size(),
                });
            }
            state.waiters += 1;
        }
        inner.listener.wait_queue_entered();
        Ok(Self { inner })
    }
}
impl<F: ConnectionFactory> Drop for WaitQueueGuard<'_, F> {
    fn drop(&mut self) {
        self.inner.lock_recover().waiters -= 1;
        self.inner.listener.wait_queue_exited();
    }
}

// A registered async waiter. If the waiting future is dropped after it was woken up,
// the wake-up is passed on, so that it is not lost.
#[cfg(feature = "async")]
struct BlockedGuard<'a, F: ConnectionFactory> {
    inner: &'a PoolInner<F>,
    id: u64,
}
#[cfg(feature = "async")]
impl<F: ConnectionFactory> BlockedGuard<'_, F> {
    fn finish(self) {
        self.inner.lock_recover().unblock(self.id);
        std::mem::forget(self);
    }
}
#[cfg(feature = "async")]
impl<F: ConnectionFactory> Drop for BlockedGuard<'_, F> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_recover();
        if !state.unblock(self.id) {
            state.wake_one();
        }
    }
}

impl<F: ConnectionFactory> crate::monitor::Invalidate for ConnectionPool<F> {
    fn invalidate(&self) {
        self.inner.invalidate();
    }
}
