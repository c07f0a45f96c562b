//! Fixed inter-call delay shared by probes and label writes.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum gap between consecutive external calls.
///
/// A plain sleep, not adaptive backoff. One pacer is shared by everything
/// in a run that talks to the network.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
        }
    }

    /// No delay at all; used by tests and dry runs.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait until the next call may start, then mark it as started.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
