//! Microsecond-resolution timestamps used throughout the pipeline.

use std::fmt;
use std::ops::{Add, Sub};

/// Microseconds since the Unix epoch. All timeframe, frame and matcher
/// bookkeeping is done in this unit so that arithmetic stays exact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UsTime(pub i64);

impl UsTime {
    pub const ZERO: UsTime = UsTime(0);

    pub fn from_secs_micros(secs: i64, micros: i64) -> Self {
        UsTime(secs * 1_000_000 + micros)
    }

    pub fn from_fsec(secs: f64) -> Self {
        UsTime((secs * 1_000_000.0).round() as i64)
    }

    pub fn to_fsec(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn unix_secs(self) -> i64 {
        self.0.div_euclid(1_000_000)
    }

    pub fn unix_micros_of_sec(self) -> i64 {
        self.0.rem_euclid(1_000_000)
    }

    pub fn checked_add_micros(self, micros: i64) -> Self {
        UsTime(self.0 + micros)
    }
}

impl fmt::Debug for UsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UsTime({}us)", self.0)
    }
}

impl Add<i64> for UsTime {
    type Output = UsTime;
    fn add(self, rhs: i64) -> UsTime {
        UsTime(self.0 + rhs)
    }
}

impl Sub for UsTime {
    type Output = i64;
    fn sub(self, rhs: UsTime) -> i64 {
        self.0 - rhs.0
    }
}
