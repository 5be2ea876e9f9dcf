//! Wall-clock time as seen by the token authority
//!
//! Token expiry is judged exclusively through a [`Clock`], so tests can pin "now" to a known
//! instant with a [`TestClock`] instead of minting tokens relative to the real time.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Seconds elapsed since 1970-01-01T00:00:00Z
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixTime(pub u64);

impl UnixTime {
    /// Returns the time `secs` seconds later, saturating at the end of representable time
    #[inline]
    #[must_use]
    pub const fn plus_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A source of the current time
pub trait Clock: Send + Sync {
    /// The current time according to this clock
    fn now(&self) -> UnixTime;
}

/// The operating system's wall clock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        // A clock set before 1970 reads as the epoch, which makes every token look expired.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| UnixTime(d.as_secs()))
            .unwrap_or_default()
    }
}

/// A manually driven clock
///
/// Clones share the same underlying instant, so a test can keep a handle and move time
/// forward after handing a clone to the code under test.
#[derive(Clone, Debug, Default)]
pub struct TestClock {
    now: Arc<AtomicU64>,
}

impl TestClock {
    /// Constructs a clock frozen at `time`
    pub fn new(time: UnixTime) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(time.0)),
        }
    }

    /// Moves the clock to `time`
    pub fn set(&self, time: UnixTime) {
        self.now.store(time.0, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs` seconds
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.now.load(Ordering::SeqCst))
    }
}
