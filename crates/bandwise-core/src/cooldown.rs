use std::time::Duration;

use tracing::debug;

/// Fixed pause between two backend calls of the same run.
///
/// The backend quota counts calls per time window, so the pause is taken every
/// time, however fast the previous call returned. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownScheduler {
    duration: Duration,
}

impl CooldownScheduler {
    pub const DEFAULT_MS: u64 = 5000;

    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn wait(&self) {
        debug!(cooldown_ms = self.duration.as_millis() as u64, "cooling down");
        tokio::time::sleep(self.duration).await;
    }
}

impl Default for CooldownScheduler {
    fn default() -> Self {
        Self::from_millis(Self::DEFAULT_MS)
    }
}
