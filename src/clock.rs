use core::fmt;

use serde::{Deserialize, Serialize};

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FatTimeSpec {
    pub sec: u64,
    pub nsec: u32,
}

impl FatTimeSpec {
    pub const fn new(sec: u64, nsec: u32) -> Self {
        Self { sec, nsec }
    }
}

impl fmt::Display for FatTimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Time source for entry timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> FatTimeSpec;
}

#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> FatTimeSpec {
        let d = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        FatTimeSpec::new(d.as_secs(), d.subsec_nanos())
    }
}

/// Clock that advances one second per reading.
#[derive(Debug, Default)]
pub struct StepClock {
    ticks: core::sync::atomic::AtomicU64,
}

impl StepClock {
    pub fn starting_at(sec: u64) -> Self {
        Self {
            ticks: core::sync::atomic::AtomicU64::new(sec),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> FatTimeSpec {
        let sec = self
            .ticks
            .fetch_add(1, core::sync::atomic::Ordering::SeqCst);
        FatTimeSpec::new(sec, 0)
    }
}
