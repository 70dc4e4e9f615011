pub mod countdown;
pub mod timer;

pub use countdown::{TICK, TimerHandle, TimerId, TimerService, remaining_whole_secs, whole_secs};
pub use timer::{Clock, MonotonicClock};
