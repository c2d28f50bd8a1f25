//! Preview/monitor capture configuration

use std::time::Duration;

/// Configuration for the capture loops
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between capture ticks (100ms is roughly 10 fps)
    pub capture_period: Duration,

    /// How long one capture call may wait for a frame
    pub capture_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capture_period: Duration::from_millis(100),
            capture_timeout: Duration::from_millis(1),
        }
    }
}

impl MonitorConfig {
    pub fn capture_period(mut self, period: Duration) -> Self {
        self.capture_period = period.max(Duration::from_millis(1));
        self
    }

    pub fn capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }
}
