use super::{ConnectionPoolSettings, ManagedConnection};
use std::time::Instant;

/// Why a pooled connection must not be used anymore.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleReason {
    /// The connection was closed, or broke.
    Closed,
    /// The pool was invalidated after the connection was created.
    Generation,
    /// The connection was not used for longer than the configured idle time.
    IdleTime,
    /// The connection exists for longer than the configured life time.
    LifeTime,
}

/// The state of a pooled connection, as seen by the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// The connection can be used; it belongs to the given generation.
    Active {
        /// The pool generation the connection was created in.
        generation: u64,
    },
    /// The connection must be destroyed.
    Stale(StaleReason),
}

// A connection with the metadata the pool needs to judge it.
#[derive(Debug)]
pub(crate) struct TrackedConnection<C> {
    pub(crate) connection: C,
    generation: u64,
    opened_at: Instant,
    last_used_at: Instant,
}
impl<C: ManagedConnection> TrackedConnection<C> {
    pub(crate) fn new(connection: C, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            connection,
            generation,
            opened_at: now,
            last_used_at: now,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn mark_opened(&mut self) {
        let now = Instant::now();
        self.opened_at = now;
        self.last_used_at = now;
    }

    pub(crate) fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    pub(crate) fn state(
        &self,
        pool_generation: u64,
        settings: &ConnectionPoolSettings,
        now: Instant,
    ) -> ConnectionState {
        if self.connection.is_closed() {
            ConnectionState::Stale(StaleReason::Closed)
        } else if self.generation != pool_generation {
            ConnectionState::Stale(StaleReason::Generation)
        } else if settings
            .max_connection_life_time()
            .is_some_and(|max| now.saturating_duration_since(self.opened_at) > max)
        {
            ConnectionState::Stale(StaleReason::LifeTime)
        } else if settings
            .max_connection_idle_time()
            .is_some_and(|max| now.saturating_duration_since(self.last_used_at) > max)
        {
            ConnectionState::Stale(StaleReason::IdleTime)
        } else {
            ConnectionState::Active {
                generation: self.generation,
            }
        }
    }
}
