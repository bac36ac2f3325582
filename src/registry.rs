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

//! Bookkeeping of granted locks.

use crate::ranges::DegreeRange;
use crate::result::{RotlockError, RotlockResult};
use std::collections::BTreeMap;
use std::fmt;

/// Access mode of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read access; any number of shared holders may overlap.
    Shared,
    /// Write access; excludes every other holder on the covered degrees.
    Exclusive,
}

impl LockMode {
    /// Raw code for [`LockMode::Shared`].
    pub const READ: i32 = 0;
    /// Raw code for [`LockMode::Exclusive`].
    pub const WRITE: i32 = 1;
}

impl TryFrom<i32> for LockMode {
    type Error = RotlockError;

    fn try_from(code: i32) -> RotlockResult<Self> {
        match code {
            LockMode::READ => Ok(LockMode::Shared),
            LockMode::WRITE => Ok(LockMode::Exclusive),
            other => Err(RotlockError::invalid_argument(format!(
                "unrecognized lock mode {other}"
            ))),
        }
    }
}

/// Opaque identity of a caller, compared only for equality when releasing.
///
/// # Examples
///
/// ```rust
/// use rotlock::Owner;
///
/// assert_eq!(Owner::new(7), Owner::from(7));
/// assert_ne!(Owner::new(7), Owner::new(8));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner(u64);

impl Owner {
    /// Wraps a raw identity such as a process or task id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Owner(raw)
    }
}

impl From<u64> for Owner {
    fn from(raw: u64) -> Self {
        Owner(raw)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Identifier of a granted lock. Ids are handed out in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(u64);

impl LockId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        LockId(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for LockId {
    type Error = RotlockError;

    fn try_from(raw: i64) -> RotlockResult<Self> {
        u64::try_from(raw)
            .map(LockId)
            .map_err(|_| RotlockError::invalid_argument(format!("lock id {raw} is negative")))
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A granted lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    /// Id returned to the caller at admission.
    pub id: LockId,
    /// Caller that was granted the lock.
    pub owner: Owner,
    /// Degrees covered by the lock.
    pub range: DegreeRange,
    /// Shared or exclusive.
    pub mode: LockMode,
}

/// Live lock records keyed by id, plus the id counter.
#[derive(Debug, Default)]
pub(crate) struct LockRegistry {
    records: BTreeMap<LockId, LockRecord>,
    next_id: u64,
}

impl LockRegistry {
    /// Allocates the next id and records the lock under it.
    pub(crate) fn insert(&mut self, owner: Owner, range: DegreeRange, mode: LockMode) -> LockId {
        let id = LockId(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            LockRecord {
                id,
                owner,
                range,
                mode,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: LockId) -> Option<&LockRecord> {
        self.records.get(&id)
    }

    pub(crate) fn remove(&mut self, id: LockId) -> Option<LockRecord> {
        self.records.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &LockRecord> {
        self.records.values()
    }
}
