use super::{
    Invalidate, MonitorListeners, RoundTripTimeAverage, ServerDescription,
    ServerDescriptionChangedEvent,
};
use crate::{
    conn::{HandshakeReply, ServerAddress},
    MdbError, MdbResult,
};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

// The part of a monitor that does not depend on how it waits and does I/O:
// it evaluates heartbeat outcomes and publishes descriptions.
pub(crate) struct MonitorCore {
    address: ServerAddress,
    invalidate: Arc<dyn Invalidate>,
    listeners: MonitorListeners,
    round_trip_time: RoundTripTimeAverage,
    current: Arc<Mutex<ServerDescription>>,
}

impl MonitorCore {
    pub(crate) fn new(
        address: ServerAddress,
        invalidate: Arc<dyn Invalidate>,
        listeners: MonitorListeners,
    ) -> Self {
        Self {
            current: Arc::new(Mutex::new(ServerDescription::connecting(address.clone()))),
            address,
            invalidate,
            listeners,
            round_trip_time: RoundTripTimeAverage::default(),
        }
    }

    pub(crate) fn address(&self) -> &ServerAddress {
        &self.address
    }

    // The handle through which the monitor's owner reads the latest description.
    pub(crate) fn current(&self) -> Arc<Mutex<ServerDescription>> {
        Arc::clone(&self.current)
    }

    pub(crate) fn heartbeat_started(&self) -> Instant {
        trace!("heartbeat to {}", self.address);
        self.listeners.monitor.heartbeat_started(&self.address);
        Instant::now()
    }

    // Called after the first attempt of a heartbeat failed on the transport level.
    pub(crate) fn transport_failed(&self, error: &MdbError) {
        warn!(
            "heartbeat to {} failed with \"{error}\", invalidating the pool and retrying",
            self.address
        );
        self.invalidate.invalidate();
    }

    pub(crate) fn heartbeat_finished(
        &mut self,
        started: Instant,
        outcome: MdbResult<(HandshakeReply, Duration)>,
    ) {
        let description = match outcome {
            Ok((reply, round_trip)) => {
                let average = self.round_trip_time.add_sample(round_trip);
                self.listeners
                    .monitor
                    .heartbeat_succeeded(&self.address, round_trip, &reply);
                ServerDescription::connected(self.address.clone(), &reply, average)
            }
            Err(e) => {
                warn!("heartbeat to {} failed: {e}", self.address);
                self.round_trip_time.reset();
                self.listeners
                    .monitor
                    .heartbeat_failed(&self.address, started.elapsed(), &e);
                ServerDescription::failed(self.address.clone(), e)
            }
        };
        self.publish(description);
    }

    fn publish(&self, description: ServerDescription) {
        let previous = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, description.clone())
        };
        if description.changed_from(&previous) {
            debug!(
                "description of {} changed: {:?} {:?} -> {:?} {:?}",
                self.address,
                previous.state(),
                previous.server_type(),
                description.state(),
                description.server_type()
            );
            self.listeners
                .server
                .server_description_changed(&ServerDescriptionChangedEvent::new(
                    previous,
                    description,
                ));
        }
    }
}
