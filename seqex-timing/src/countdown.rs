//! Cancellable countdowns with a 1 Hz tick.
//!
//! Every countdown runs on its own task. Callbacks go through a per-handle
//! gate: once [`TimerHandle::cancel`] returns, no callback of that handle
//! starts, even if a tick was already due. The gate is reentrant, so a
//! callback may cancel its own handle.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::ReentrantMutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const TICK: Duration = Duration::from_secs(1);
/// Longer countdowns are clamped to this.
pub const MAX_COUNTDOWN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

struct Gate {
    closed: ReentrantMutex<Cell<bool>>,
}

impl Gate {
    fn new() -> Self {
        Self {
            closed: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Runs `f` unless the gate is closed. Holds the lock for the duration of
    /// the call so a concurrent close waits for it.
    fn run<F: FnOnce()>(&self, f: F) -> bool {
        let closed = self.closed.lock();
        if closed.get() {
            return false;
        }
        f();
        true
    }

    fn close(&self) {
        self.closed.lock().set(true);
    }

    fn is_closed(&self) -> bool {
        self.closed.lock().get()
    }
}

/// Owner of a running countdown. Dropping it cancels the countdown.
pub struct TimerHandle {
    id: TimerId,
    gate: Arc<Gate>,
    token: CancellationToken,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Stops both the tick and the pending expiry. Idempotent.
    pub fn cancel(&self) {
        self.gate.close();
        self.token.cancel();
    }

    /// True once cancelled or expired.
    pub fn is_finished(&self) -> bool {
        self.gate.is_closed()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Issues countdowns. Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct TimerService {
    next_id: AtomicU64,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks once per second with the remaining whole seconds and calls
    /// `on_expire` once after `duration`. When a tick and the expiry fall due
    /// together only the expiry fires.
    pub fn start_countdown<T, E>(&self, duration: Duration, mut on_tick: T, on_expire: E) -> TimerHandle
    where
        T: FnMut(u64) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let duration = duration.min(MAX_COUNTDOWN);
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let gate = Arc::new(Gate::new());
        let token = CancellationToken::new();

        let started = Instant::now();
        let deadline = started + duration;
        let task_gate = Arc::clone(&gate);
        let task_token = token.clone();

        tokio::spawn(async move {
            let expiry = tokio::time::sleep_until(deadline);
            tokio::pin!(expiry);
            let mut ticker = tokio::time::interval_at(started + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut on_expire = Some(on_expire);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => {
                        debug!(%id, "countdown cancelled");
                        break;
                    }
                    _ = &mut expiry => {
                        if let Some(f) = on_expire.take() {
                            task_gate.run(f);
                        }
                        task_gate.close();
                        break;
                    }
                    _ = ticker.tick() => {
                        let remaining = remaining_whole_secs(deadline, Instant::now());
                        task_gate.run(|| on_tick(remaining));
                    }
                }
            }
        });

        debug!(%id, ?duration, "countdown started");
        TimerHandle { id, gate, token }
    }
}

/// Remaining time rounded to the nearest whole second.
pub fn remaining_whole_secs(deadline: Instant, now: Instant) -> u64 {
    whole_secs(deadline.saturating_duration_since(now))
}

/// `left` rounded to the nearest whole second.
pub fn whole_secs(left: Duration) -> u64 {
    left.as_secs() + u64::from(left.subsec_millis() >= 500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, PartialEq)]
    enum Fired {
        Tick(u64),
        Expired,
    }

    fn recorder() -> (
        Arc<Mutex<Vec<Fired>>>,
        impl FnMut(u64) + Send + 'static,
        impl FnOnce() + Send + 'static,
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ticks = Arc::clone(&log);
        let expiry = Arc::clone(&log);
        (
            log,
            move |remaining| ticks.lock().unwrap().push(Fired::Tick(remaining)),
            move || expiry.lock().unwrap().push(Fired::Expired),
        )
    }

    #[test]
    fn rounds_remaining_time() {
        let now = Instant::now();
        assert_eq!(remaining_whole_secs(now + Duration::from_millis(2_400), now), 2);
        assert_eq!(remaining_whole_secs(now + Duration::from_millis(2_500), now), 3);
        assert_eq!(remaining_whole_secs(now, now + Duration::from_secs(1)), 0);
        assert_eq!(whole_secs(Duration::from_millis(499)), 0);
        assert_eq!(whole_secs(Duration::from_secs(5)), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_then_expires_once() {
        let timers = TimerService::new();
        let (log, on_tick, on_expire) = recorder();
        let handle = timers.start_countdown(Duration::from_secs(3), on_tick, on_expire);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![Fired::Tick(2), Fired::Tick(1), Fired::Expired]
        );
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_expiry() {
        let timers = TimerService::new();
        let (log, on_tick, on_expire) = recorder();
        let handle = timers.start_countdown(Duration::from_secs(5), on_tick, on_expire);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        handle.cancel();
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*log.lock().unwrap(), vec![Fired::Tick(4)]);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_when_tick_is_due_suppresses_it() {
        let timers = TimerService::new();
        let (log, on_tick, on_expire) = recorder();
        let handle = timers.start_countdown(Duration::from_secs(2), on_tick, on_expire);

        // Move the clock past the tick without letting the timer task run.
        tokio::time::advance(Duration::from_millis(1_100)).await;
        let fired_before_cancel = log.lock().unwrap().len();
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(log.lock().unwrap().len(), fired_before_cancel);
        assert!(log.lock().unwrap().iter().all(|f| *f != Fired::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_countdown_does_not_overflow() {
        let timers = TimerService::new();
        let (log, on_tick, on_expire) = recorder();
        let handle = timers.start_countdown(Duration::MAX, on_tick, on_expire);

        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(!handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let timers = TimerService::new();
        let (log, on_tick, on_expire) = recorder();
        drop(timers.start_countdown(Duration::from_secs(2), on_tick, on_expire));

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn callback_may_cancel_its_own_handle() {
        let timers = TimerService::new();
        let slot: Arc<OnceLock<TimerHandle>> = Arc::new(OnceLock::new());
        let (log, mut on_tick, on_expire) = recorder();

        let tick_slot = Arc::clone(&slot);
        let handle = timers.start_countdown(
            Duration::from_secs(3),
            move |remaining| {
                on_tick(remaining);
                if let Some(handle) = tick_slot.get() {
                    handle.cancel();
                }
            },
            on_expire,
        );
        let _ = slot.set(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*log.lock().unwrap(), vec![Fired::Tick(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_unique() {
        let timers = TimerService::new();
        let a = timers.start_countdown(Duration::from_secs(1), |_| {}, || {});
        let b = timers.start_countdown(Duration::from_secs(1), |_| {}, || {});
        assert_ne!(a.id(), b.id());
    }
}
