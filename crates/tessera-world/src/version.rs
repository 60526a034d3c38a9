use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic freshness stamp.
///
/// Local chunk versions and stamps handed out by the remote authority share this type
/// but come from different clocks; only stamps from the same clock are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    pub const ZERO: Version = Version(0);

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Hands out strictly increasing versions. Never returns zero.
#[derive(Debug, Default)]
pub struct VersionClock {
    counter: AtomicU64,
}

impl VersionClock {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub fn tick(&self) -> Version {
        Version(self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1).max(1))
    }

    pub fn current(&self) -> Version {
        Version(self.counter.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = VersionClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(a > Version::ZERO);
        assert!(b > a);
        assert_eq!(clock.current(), b);
    }
}
