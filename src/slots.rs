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

use crate::ranges::{DEGREES, Degree, DegreeRange};
use crate::registry::LockMode;

/// Reader and writer accounting for a single degree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Shared locks currently covering this degree.
    pub active_readers: u32,
    /// Exclusive locks currently covering this degree. Never more than one.
    pub active_writers: u32,
    /// Exclusive requests parked on a range covering this degree.
    pub waiting_writers: u32,
}

impl Slot {
    /// Returns true when nothing holds or waits on this degree.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Slot::default()
    }
}

/// A `SlotTable` keeps one [`Slot`] per degree of the circle.
///
/// Every mutator applies to all degrees of the given range in one call, so a range is
/// never left half counted. The table does no locking of its own; callers keep it behind
/// a single mutex.
///
/// # Examples
///
/// ```rust
/// use rotlock::{DegreeRange, LockMode, SlotTable};
///
/// let mut table = SlotTable::new();
/// let range = DegreeRange::new(350, 10).unwrap();
///
/// assert!(table.admits(range, LockMode::Exclusive));
/// table.inc_reader(range);
/// assert!(!table.admits(range, LockMode::Exclusive));
/// assert!(table.admits(range, LockMode::Shared));
/// table.dec_reader(range);
/// assert!(table.is_idle());
/// ```
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: [Slot; DEGREES],
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotTable {
    /// Creates a table with every count at zero.
    #[must_use]
    pub fn new() -> Self {
        SlotTable {
            slots: [Slot::default(); DEGREES],
        }
    }

    /// Returns a copy of the slot for `degree`.
    #[must_use]
    pub fn get(&self, degree: Degree) -> Slot {
        self.slots[degree.index()]
    }

    /// Returns true when every slot is idle.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(Slot::is_idle)
    }

    /// Returns true when `range` can be granted in `mode` as far as the counts go.
    ///
    /// Shared requests yield to active and waiting writers alike. Exclusive requests
    /// only look at active holders; other waiting writers do not hold them back.
    #[must_use]
    pub fn admits(&self, range: DegreeRange, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => range.degrees().all(|i| {
                let slot = &self.slots[i];
                slot.active_writers == 0 && slot.waiting_writers == 0
            }),
            LockMode::Exclusive => range.degrees().all(|i| {
                let slot = &self.slots[i];
                slot.active_readers == 0 && slot.active_writers == 0
            }),
        }
    }

    /// Counts a granted lock of `mode` on every degree of `range`.
    pub fn inc_active(&mut self, range: DegreeRange, mode: LockMode) {
        match mode {
            LockMode::Shared => self.inc_reader(range),
            LockMode::Exclusive => self.inc_writer(range),
        }
    }

    /// Reverses [`SlotTable::inc_active`].
    pub fn dec_active(&mut self, range: DegreeRange, mode: LockMode) {
        match mode {
            LockMode::Shared => self.dec_reader(range),
            LockMode::Exclusive => self.dec_writer(range),
        }
    }

    /// Adds a shared holder on every degree of `range`.
    pub fn inc_reader(&mut self, range: DegreeRange) {
        self.apply(range, |slot| slot.active_readers += 1);
    }

    /// Removes a shared holder on every degree of `range`.
    pub fn dec_reader(&mut self, range: DegreeRange) {
        self.apply(range, |slot| {
            debug_assert!(slot.active_readers > 0, "reader count underflow");
            slot.active_readers -= 1;
        });
    }

    /// Adds an exclusive holder on every degree of `range`.
    pub fn inc_writer(&mut self, range: DegreeRange) {
        self.apply(range, |slot| {
            debug_assert_eq!(slot.active_writers, 0, "second writer on a degree");
            slot.active_writers += 1;
        });
    }

    /// Removes an exclusive holder on every degree of `range`.
    pub fn dec_writer(&mut self, range: DegreeRange) {
        self.apply(range, |slot| {
            debug_assert_eq!(slot.active_writers, 1, "writer count underflow");
            slot.active_writers -= 1;
        });
    }

    /// Registers a parked exclusive request on every degree of `range`.
    pub fn inc_waiting_writer(&mut self, range: DegreeRange) {
        self.apply(range, |slot| slot.waiting_writers += 1);
    }

    /// Withdraws a parked exclusive request on every degree of `range`.
    pub fn dec_waiting_writer(&mut self, range: DegreeRange) {
        self.apply(range, |slot| {
            debug_assert!(slot.waiting_writers > 0, "waiting writer count underflow");
            slot.waiting_writers -= 1;
        });
    }

    fn apply(&mut self, range: DegreeRange, mut f: impl FnMut(&mut Slot)) {
        for index in range.degrees() {
            f(&mut self.slots[index]);
        }
    }
}
