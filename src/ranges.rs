//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Degrees and circular degree ranges.

use crate::result::{RotlockError, RotlockResult};
use std::fmt;
use std::ops::RangeInclusive;

/// Number of discrete positions on the circle.
pub const DEGREES: usize = 360;

/// A single position on the circle, always in `0..360`.
///
/// # Examples
///
/// ```rust
/// use rotlock::Degree;
///
/// assert_eq!(Degree::new(359).unwrap().get(), 359);
/// assert!(Degree::new(360).is_err());
/// assert!(Degree::new(-1).is_err());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Degree(u16);

impl Degree {
    /// Validates `value` and wraps it as a `Degree`.
    pub fn new(value: i32) -> RotlockResult<Self> {
        match u16::try_from(value) {
            Ok(v) if usize::from(v) < DEGREES => Ok(Degree(v)),
            _ => Err(RotlockError::invalid_argument(format!(
                "degree {value} is outside 0..{DEGREES}"
            ))),
        }
    }

    /// Returns the raw degree value.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }

    /// Returns the degree as a slot index.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Iterates every degree of the circle in increasing order.
    ///
    /// ```rust
    /// use rotlock::Degree;
    ///
    /// assert_eq!(Degree::all().count(), 360);
    /// assert_eq!(Degree::all().last().unwrap().get(), 359);
    /// ```
    pub fn all() -> impl Iterator<Item = Degree> {
        (0..360).map(Degree)
    }
}

impl TryFrom<i32> for Degree {
    type Error = RotlockError;

    fn try_from(value: i32) -> RotlockResult<Self> {
        Degree::new(value)
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.0)
    }
}

/// An inclusive range of degrees on the circle.
///
/// When `low <= high` the range covers `low..=high`. When `low > high` it wraps past 359
/// and covers `low..=359` followed by `0..=high`. A range can therefore never be empty,
/// and `(n, n)` covers exactly one degree.
///
/// # Examples
///
/// ```rust
/// use rotlock::{Degree, DegreeRange};
///
/// let range = DegreeRange::new(350, 10).unwrap();
/// assert!(range.is_wrapping());
/// assert!(range.contains(Degree::new(355).unwrap()));
/// assert!(range.contains(Degree::new(0).unwrap()));
/// assert!(!range.contains(Degree::new(200).unwrap()));
/// assert_eq!(range.len(), 21);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DegreeRange {
    low: Degree,
    high: Degree,
}

impl DegreeRange {
    /// Validates both ends and builds the range.
    pub fn new(low: i32, high: i32) -> RotlockResult<Self> {
        Ok(Self::from_degrees(Degree::new(low)?, Degree::new(high)?))
    }

    /// Builds a range from already validated ends.
    #[must_use]
    pub fn from_degrees(low: Degree, high: Degree) -> Self {
        DegreeRange { low, high }
    }

    /// The range covering the whole circle.
    #[must_use]
    pub fn full() -> Self {
        DegreeRange {
            low: Degree(0),
            high: Degree(359),
        }
    }

    /// First degree of the range.
    #[must_use]
    pub fn low(&self) -> Degree {
        self.low
    }

    /// Last degree of the range.
    #[must_use]
    pub fn high(&self) -> Degree {
        self.high
    }

    /// Returns true when the range wraps past 359 back to 0.
    #[must_use]
    pub fn is_wrapping(&self) -> bool {
        self.low > self.high
    }

    /// Returns true when `degree` lies inside the range.
    #[must_use]
    pub fn contains(&self, degree: Degree) -> bool {
        if self.is_wrapping() {
            degree >= self.low || degree <= self.high
        } else {
            self.low <= degree && degree <= self.high
        }
    }

    /// Number of degrees covered.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.is_wrapping() {
            DEGREES - self.low.index() + self.high.index() + 1
        } else {
            self.high.index() - self.low.index() + 1
        }
    }

    /// Always false; a degree range covers at least one degree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true when the two ranges share at least one degree.
    #[must_use]
    pub fn overlaps(&self, other: &DegreeRange) -> bool {
        self.contains(other.low) || other.contains(self.low)
    }

    /// Iterates the slot indices covered by the range, in circular order starting at `low`.
    pub fn degrees(&self) -> impl Iterator<Item = usize> + use<> {
        let (head, tail) = self.spans();
        head.chain(tail)
    }

    /// Splits the range into at most two linear spans, the second empty unless wrapping.
    #[allow(clippy::reversed_empty_ranges)]
    fn spans(&self) -> (RangeInclusive<usize>, RangeInclusive<usize>) {
        let (low, high) = (self.low.index(), self.high.index());
        if low <= high {
            (low..=high, 1..=0)
        } else {
            (low..=DEGREES - 1, 0..=high)
        }
    }
}

impl fmt::Display for DegreeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low.0, self.high.0)
    }
}
