/// Traffic counters of a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionStatistics {
    sent_messages: u32,
    received_messages: u32,
    sent_bytes: u64,
    received_bytes: u64,
    created_at: time::OffsetDateTime,
    last_reset_at: time::OffsetDateTime,
    wait_time: std::time::Duration,
}
impl Default for ConnectionStatistics {
    fn default() -> Self {
        let timestamp = time::OffsetDateTime::now_utc();
        Self {
            created_at: timestamp,
            last_reset_at: timestamp,
            sent_messages: 0,
            received_messages: 0,
            sent_bytes: 0,
            received_bytes: 0,
            wait_time: std::time::Duration::default(),
        }
    }
}
impl ConnectionStatistics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets all counters to zero.
    pub fn reset(&mut self) {
        *self = Self {
            created_at: self.created_at,
            last_reset_at: time::OffsetDateTime::now_utc(),
            ..Default::default()
        };
    }

    pub(crate) fn add_sent(&mut self, bytes: usize) {
        self.sent_messages += 1;
        self.sent_bytes += bytes as u64;
    }

    pub(crate) fn add_received(&mut self, bytes: usize, wait_time: std::time::Duration) {
        self.received_messages += 1;
        self.received_bytes += bytes as u64;
        self.wait_time += wait_time;
    }

    /// Number of messages sent since the last reset.
    pub fn sent_messages(&self) -> u32 {
        self.sent_messages
    }
    /// Number of messages received since the last reset.
    pub fn received_messages(&self) -> u32 {
        self.received_messages
    }
    /// Number of bytes sent since the last reset.
    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }
    /// Number of bytes received since the last reset.
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }
    /// Accumulated time spent waiting for replies since the last reset.
    pub fn accumulated_wait_time(&self) -> std::time::Duration {
        self.wait_time
    }
    /// When the connection was created.
    pub fn created_at(&self) -> time::OffsetDateTime {
        self.created_at
    }
}

impl std::fmt::Display for ConnectionStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Connection statistics")?;
        writeln!(f, "Created at:        {}", self.created_at)?;
        writeln!(f, "Last reset at:     {}", self.last_reset_at)?;
        writeln!(
            f,
            "Sent:              {} messages, {} bytes",
            self.sent_messages, self.sent_bytes
        )?;
        writeln!(
            f,
            "Received:          {} messages, {} bytes",
            self.received_messages, self.received_bytes
        )?;
        writeln!(f, "Total wait time:   {:?}", self.wait_time)?;
        Ok(())
    }
}
