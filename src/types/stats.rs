//! Byte counters for a session.

/// Bytes moved over the link since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Bytes accepted by the transport.
    pub sent_bytes: u64,
    /// Bytes received while not paused.
    pub received_bytes: u64,
}

impl SessionStats {
    /// Records bytes accepted by the transport.
    pub fn record_sent(&mut self, count: usize) {
        self.sent_bytes = self.sent_bytes.saturating_add(count as u64);
    }

    /// Records received bytes.
    pub fn record_received(&mut self, count: usize) {
        self.received_bytes = self.received_bytes.saturating_add(count as u64);
    }

    /// Zeroes both counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = SessionStats::default();
        stats.record_sent(5);
        stats.record_sent(3);
        stats.record_received(7);
        assert_eq!(stats.sent_bytes, 8);
        assert_eq!(stats.received_bytes, 7);

        stats.reset();
        assert_eq!(stats, SessionStats::default());
    }
}
