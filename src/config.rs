use std::path::PathBuf;
use std::time::Duration;

/// How long a command waits for its `$ACK`/`$NAK`.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_QUEUE_DEPTH: usize = 64;
pub const DEFAULT_MAX_IDLE_READS: u32 = 64;

/// Settings for an [`SK6`](crate::device::SK6) connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub ack_timeout: Duration,
    /// Notifications buffered for the delivery task before new ones are dropped
    pub queue_depth: usize,
    pub max_idle_reads: u32,
    /// File that playback readings are appended to
    pub playback_log: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_idle_reads: DEFAULT_MAX_IDLE_READS,
            playback_log: None,
        }
    }
}

impl DeviceConfig {
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn with_max_idle_reads(mut self, reads: u32) -> Self {
        self.max_idle_reads = reads;
        self
    }

    pub fn with_playback_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.playback_log = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = DeviceConfig::default()
            .with_ack_timeout(Duration::from_millis(250))
            .with_queue_depth(0)
            .with_playback_log("/tmp/playback.csv");
        assert_eq!(config.ack_timeout, Duration::from_millis(250));
        assert_eq!(config.queue_depth, 1);
        assert_eq!(config.max_idle_reads, DEFAULT_MAX_IDLE_READS);
        assert_eq!(config.playback_log, Some(PathBuf::from("/tmp/playback.csv")));
    }
}
