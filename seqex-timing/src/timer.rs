use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Time source for keypress stamps and elapsed-time checks.
pub trait Clock: Clone + Send + Sync {
    /// Wall-clock timestamp, never earlier than a previously returned one.
    fn now(&self) -> DateTime<Utc>;
    /// Monotonic instant on the runtime's clock.
    fn instant(&self) -> Instant;
}

/// Wall-clock time anchored once and advanced by the monotonic clock, so
/// stamps keep their order if the system clock is adjusted mid-run.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(anchor_wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall,
            anchor: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn stamps_follow_the_runtime_clock() {
        let anchor = Utc.timestamp_millis_opt(1_000_000).unwrap();
        let clock = MonotonicClock::anchored_at(anchor);
        let start = clock.instant();

        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert_eq!(clock.now(), Utc.timestamp_millis_opt(1_001_500).unwrap());
        assert_eq!(clock.instant() - start, Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn stamps_never_go_backwards() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(3)).await;
            let next = clock.now();
            assert!(next >= last);
            last = next;
        }
    }
}
