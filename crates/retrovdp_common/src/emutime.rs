use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// A moment in emulated time, measured in master-clock ticks since power-on.
///
/// All synchronization in the VDP core reasons about "has actor X been
/// brought up to time T", so the only structure this type needs is a total
/// order and tick arithmetic.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
pub struct EmuTime(u64);

impl EmuTime {
    pub const ZERO: EmuTime = EmuTime(0);

    #[inline]
    pub const fn from_ticks(ticks: u64) -> EmuTime {
        EmuTime(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }
}

impl Add<u64> for EmuTime {
    type Output = EmuTime;

    #[inline]
    fn add(self, ticks: u64) -> EmuTime {
        EmuTime(self.0 + ticks)
    }
}

impl AddAssign<u64> for EmuTime {
    #[inline]
    fn add_assign(&mut self, ticks: u64) {
        self.0 += ticks;
    }
}

impl Sub for EmuTime {
    type Output = u64;

    /// Tick distance between two moments. The left operand must not be
    /// earlier than the right one.
    #[inline]
    fn sub(self, earlier: EmuTime) -> u64 {
        debug_assert!(self.0 >= earlier.0);
        self.0 - earlier.0
    }
}

impl fmt::Debug for EmuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmuTime({})", self.0)
    }
}

impl fmt::Display for EmuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A clock that tracks how far some piece of state has been brought up to
/// date. Rewriting history is not allowed: `advance` may never move the
/// clock backward.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Clock {
    time: EmuTime,
}

impl Clock {
    #[inline]
    pub const fn new(time: EmuTime) -> Clock {
        Clock { time }
    }

    #[inline]
    pub const fn time(&self) -> EmuTime {
        self.time
    }

    /// Move the clock forward to `time`.
    #[inline]
    pub fn advance(&mut self, time: EmuTime) {
        debug_assert!(
            time >= self.time,
            "clock moved backward: {} -> {}",
            self.time,
            time
        );
        self.time = time;
    }

    /// Restore from a snapshot; unlike `advance` this may go backward.
    #[inline]
    pub fn restore(&mut self, time: EmuTime) {
        self.time = time;
    }
}
