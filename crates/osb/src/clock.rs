//! 🕰️ Clocks. One tells the truth, one tells whatever the test wants to hear.

use chrono::{DateTime, Utc};

/// ⏱️ Source of "now". Injected everywhere the current date leaks into output,
/// so timestamp fallbacks and date-templated destinations can be pinned in tests.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 🌍 The wall clock. Moves forward, never asks permission.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 📌 A clock stuck at one instant. Like the office clock that died in 2019.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
