use std::time::Duration;

/// Exponentially weighted moving average of the measured heartbeat round trips.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundTripTimeAverage {
    average: Option<Duration>,
}
impl RoundTripTimeAverage {
    /// Weight of a new sample.
    pub const ALPHA: f64 = 0.2;

    /// Adds a sample and returns the new average.
    ///
    /// The first sample is taken as it is.
    pub fn add_sample(&mut self, sample: Duration) -> Duration {
        let average = match self.average {
            None => sample,
            Some(previous) => previous.mul_f64(1.0 - Self::ALPHA) + sample.mul_f64(Self::ALPHA),
        };
        self.average = Some(average);
        average
    }

    /// The current average, if there is one.
    pub fn average(&self) -> Option<Duration> {
        self.average
    }

    /// Forgets all samples.
    pub fn reset(&mut self) {
        self.average = None;
    }
}
