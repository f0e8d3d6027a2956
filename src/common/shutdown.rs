use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Process-wide running flag. Readable from blocking threads and awaitable
/// from async tasks.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        ShutdownSignal { tx: Arc::new(tx) }
    }

    pub fn is_running(&self) -> bool {
        !*self.tx.borrow()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // Only fails if the sender is gone, and we hold it.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Blocking sleep that wakes early on shutdown. Returns `true` if the
    /// process is still running afterwards.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_is_cut_short_by_trigger() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(60));
            remote.trigger();
        });
        let started = Instant::now();
        assert!(!signal.sleep(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!signal.is_running());
    }

    #[tokio::test]
    async fn triggered_resolves_after_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let s = signal.clone();
            tokio::spawn(async move { s.triggered().await })
        };
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }
}
