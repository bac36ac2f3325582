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

//! Implementation of the orientation-gated range lock.

use crate::position::PositionStore;
use crate::ranges::{Degree, DegreeRange};
use crate::registry::{LockId, LockMode, LockRecord, LockRegistry, Owner};
use crate::result::{RotlockError, RotlockResult};
use crate::slots::{Slot, SlotTable};
use crate::waiter::{WaitCoordinator, Wake};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Grants shared or exclusive access to degree ranges of a circular coordinate space,
/// gated on the current orientation.
///
/// A request is admitted once the current position lies inside the requested range and no
/// conflicting holder covers any of its degrees. Until then the caller blocks. Shared
/// requests also yield to exclusive requests already waiting on an overlapping range, so a
/// steady stream of readers cannot starve a writer.
///
/// The orientation and the lock table sit behind two separate mutexes. Any path that needs
/// both takes the orientation first.
///
/// Cloning a `RangeLockManager` yields another handle to the same state.
///
/// # Examples
///
/// ```rust
/// use rotlock::{LockMode, Owner, RangeLockManager};
///
/// let manager = RangeLockManager::new();
/// manager.set_position(100).unwrap();
///
/// let owner = Owner::new(1);
/// let id = manager.acquire(50, 150, LockMode::Shared, owner).unwrap();
/// assert_eq!(id.get(), 0);
///
/// // A writer on an overlapping range cannot get in while the reader holds it.
/// let writer = manager.try_acquire(
///     rotlock::DegreeRange::new(100, 120).unwrap(),
///     LockMode::Exclusive,
///     owner,
/// );
/// assert!(writer.is_err());
///
/// manager.release(id, owner).unwrap();
/// ```
#[derive(Clone, Default)]
pub struct RangeLockManager {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    position: PositionStore,
    table: Mutex<Table>,
    waiter: WaitCoordinator,
}

#[derive(Default)]
struct Table {
    slots: SlotTable,
    registry: LockRegistry,
}

impl Shared {
    fn lock_table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How long an admission attempt may block.
#[derive(Clone, Copy)]
struct WaitPolicy<'a> {
    block: bool,
    deadline: Option<Instant>,
    cancel: Option<&'a CancelToken>,
}

impl WaitPolicy<'static> {
    const NEVER: WaitPolicy<'static> = WaitPolicy {
        block: false,
        deadline: None,
        cancel: None,
    };

    const FOREVER: WaitPolicy<'static> = WaitPolicy {
        block: true,
        deadline: None,
        cancel: None,
    };
}

impl WaitPolicy<'_> {
    fn give_up(&self, expired: bool) -> Option<RotlockError> {
        if !self.block {
            Some(RotlockError::WouldBlock)
        } else if self.cancel.is_some_and(CancelToken::is_cancelled) {
            Some(RotlockError::Interrupted)
        } else if expired {
            Some(RotlockError::TimedOut)
        } else {
            None
        }
    }
}

static GLOBAL: OnceLock<RangeLockManager> = OnceLock::new();

impl RangeLockManager {
    /// Creates a manager with the orientation at 0 and no locks held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with the orientation at `position`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rotlock::{Degree, RangeLockManager};
    ///
    /// let manager = RangeLockManager::with_position(Degree::new(90).unwrap());
    /// assert_eq!(manager.position().get(), 90);
    /// ```
    #[must_use]
    pub fn with_position(position: Degree) -> Self {
        RangeLockManager {
            inner: Arc::new(Shared {
                position: PositionStore::new(position),
                table: Mutex::default(),
                waiter: WaitCoordinator::new(),
            }),
        }
    }

    /// Returns the process-wide manager, creating it on first use.
    pub fn global() -> &'static RangeLockManager {
        GLOBAL.get_or_init(RangeLockManager::new)
    }

    /// Returns the current orientation.
    #[must_use]
    pub fn position(&self) -> Degree {
        self.inner.position.get()
    }

    /// Sets the current orientation and wakes every blocked request so it can re-check.
    ///
    /// Fails with [`RotlockError::InvalidArgument`] unless `0 <= value < 360`, leaving the
    /// orientation unchanged.
    pub fn set_position(&self, value: i32) -> RotlockResult<()> {
        let degree = Degree::new(value)?;
        let mut position = self.inner.position.lock();
        *position = degree;
        // Taking the table lock before notifying closes the window between a waiter's
        // check and its park.
        let _table = self.inner.lock_table();
        self.inner.waiter.wake_all();
        trace!(%degree, "orientation changed");
        Ok(())
    }

    /// Blocks until `low..=high` can be granted in `mode`, then grants it to `owner`.
    ///
    /// `low > high` denotes a range wrapping past 359. Fails with
    /// [`RotlockError::InvalidArgument`] if either end is outside `0..360`, without touching
    /// any state.
    pub fn acquire(
        &self,
        low: i32,
        high: i32,
        mode: LockMode,
        owner: Owner,
    ) -> RotlockResult<LockId> {
        let range = DegreeRange::new(low, high)?;
        self.admit(range, mode, owner, WaitPolicy::FOREVER)
    }

    /// Blocks until `range` can be granted in `mode`, then grants it to `owner`.
    pub fn acquire_range(
        &self,
        range: DegreeRange,
        mode: LockMode,
        owner: Owner,
    ) -> RotlockResult<LockId> {
        self.admit(range, mode, owner, WaitPolicy::FOREVER)
    }

    /// Grants `range` only if it is admissible right now.
    ///
    /// Fails with [`RotlockError::WouldBlock`] otherwise. A failed attempt leaves no trace,
    /// in particular it never registers as a waiting writer.
    pub fn try_acquire(
        &self,
        range: DegreeRange,
        mode: LockMode,
        owner: Owner,
    ) -> RotlockResult<LockId> {
        self.admit(range, mode, owner, WaitPolicy::NEVER)
    }

    /// Like [`RangeLockManager::acquire_range`] but gives up with
    /// [`RotlockError::TimedOut`] once `timeout` has elapsed.
    ///
    /// A `timeout` too large to add to the current instant, such as [`Duration::MAX`], means
    /// no deadline at all and the call waits as long as [`RangeLockManager::acquire_range`].
    pub fn acquire_timeout(
        &self,
        range: DegreeRange,
        mode: LockMode,
        owner: Owner,
        timeout: Duration,
    ) -> RotlockResult<LockId> {
        let policy = WaitPolicy {
            block: true,
            deadline: Instant::now().checked_add(timeout),
            cancel: None,
        };
        self.admit(range, mode, owner, policy)
    }

    /// Like [`RangeLockManager::acquire_range`] but gives up with
    /// [`RotlockError::Interrupted`] once `token` is cancelled.
    ///
    /// `token` must come from [`RangeLockManager::cancel_token`] on this manager.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rotlock::{DegreeRange, LockMode, Owner, RangeLockManager, RotlockError};
    ///
    /// let manager = RangeLockManager::new();
    /// let token = manager.cancel_token();
    /// token.cancel();
    ///
    /// // Position 0 is outside the range, so the request would have to wait.
    /// let range = DegreeRange::new(90, 180).unwrap();
    /// let result = manager.acquire_cancellable(range, LockMode::Exclusive, Owner::new(1), &token);
    /// assert_eq!(result, Err(RotlockError::Interrupted));
    /// ```
    pub fn acquire_cancellable(
        &self,
        range: DegreeRange,
        mode: LockMode,
        owner: Owner,
        token: &CancelToken,
    ) -> RotlockResult<LockId> {
        if !Arc::ptr_eq(&self.inner, &token.shared) {
            return Err(RotlockError::invalid_argument(
                "cancel token belongs to another manager",
            ));
        }
        let policy = WaitPolicy {
            block: true,
            deadline: None,
            cancel: Some(token),
        };
        self.admit(range, mode, owner, policy)
    }

    /// Blocks until `range` is granted and returns a guard releasing it on drop.
    pub fn lock(
        &self,
        range: DegreeRange,
        mode: LockMode,
        owner: Owner,
    ) -> RotlockResult<RotationGuard> {
        let id = self.acquire_range(range, mode, owner)?;
        Ok(RotationGuard {
            manager: self.clone(),
            record: LockRecord {
                id,
                owner,
                range,
                mode,
            },
            released: false,
        })
    }

    /// Creates a token that can interrupt requests waiting on this manager.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            shared: Arc::clone(&self.inner),
        }
    }

    /// Releases lock `id` held by `caller` and wakes every blocked request.
    ///
    /// Fails with [`RotlockError::InvalidArgument`] if no such lock is held, and with
    /// [`RotlockError::PermissionDenied`] if it is held by someone else. Neither failure
    /// changes any state.
    pub fn release(&self, id: LockId, caller: Owner) -> RotlockResult<()> {
        let mut table = self.inner.lock_table();
        let record = match table.registry.get(id) {
            None => {
                return Err(RotlockError::invalid_argument(format!("no lock with id {id}")));
            }
            Some(record) if record.owner != caller => {
                return Err(RotlockError::PermissionDenied { id, owner: caller });
            }
            Some(record) => *record,
        };
        table.registry.remove(id);
        table.slots.dec_active(record.range, record.mode);
        self.inner.waiter.wake_all();
        debug!(%id, range = %record.range, mode = ?record.mode, owner = %caller, "lock released");
        Ok(())
    }

    /// Looks up a live lock by id.
    #[must_use]
    pub fn find(&self, id: LockId) -> Option<LockRecord> {
        self.inner.lock_table().registry.get(id).copied()
    }

    /// Returns every live lock, ordered by id.
    #[must_use]
    pub fn locks(&self) -> Vec<LockRecord> {
        self.inner.lock_table().registry.iter().copied().collect()
    }

    /// Returns the counts for a single degree.
    #[must_use]
    pub fn slot(&self, degree: Degree) -> Slot {
        self.inner.lock_table().slots.get(degree)
    }

    fn admit(
        &self,
        range: DegreeRange,
        mode: LockMode,
        owner: Owner,
        policy: WaitPolicy<'_>,
    ) -> RotlockResult<LockId> {
        let shared = &*self.inner;
        let mut position = shared.position.lock();
        let mut table = shared.lock_table();
        let mut waiting = false;
        let mut expired = false;

        while !(range.contains(*position) && table.slots.admits(range, mode)) {
            if let Some(error) = policy.give_up(expired) {
                if waiting {
                    table.slots.dec_waiting_writer(range);
                    // Shared requests held back by this writer may now get in.
                    shared.waiter.wake_all();
                }
                debug!(%range, ?mode, %owner, %error, "lock request withdrawn");
                return Err(error);
            }
            if mode == LockMode::Exclusive && !waiting {
                table.slots.inc_waiting_writer(range);
                waiting = true;
            }
            trace!(%range, ?mode, %owner, position = %*position, "lock request parked");

            drop(position);
            let (parked, wake) = shared.waiter.park(table, policy.deadline);
            expired = wake == Wake::Expired;
            drop(parked);

            position = shared.position.lock();
            table = shared.lock_table();
        }

        if waiting {
            table.slots.dec_waiting_writer(range);
        }
        table.slots.inc_active(range, mode);
        let id = table.registry.insert(owner, range, mode);
        debug!(%id, %range, ?mode, %owner, position = %*position, "lock granted");
        Ok(id)
    }

    /// Verifies the slot counts against the live records.
    #[cfg(test)]
    fn assert_consistent(&self) {
        let table = self.inner.lock_table();
        for degree in Degree::all() {
            let covering = |mode: LockMode| {
                table
                    .registry
                    .iter()
                    .filter(|r| r.mode == mode && r.range.contains(degree))
                    .count()
            };
            let slot = table.slots.get(degree);
            assert_eq!(slot.active_readers as usize, covering(LockMode::Shared));
            assert_eq!(slot.active_writers as usize, covering(LockMode::Exclusive));
            assert!(slot.active_writers <= 1);
            assert!(slot.active_writers == 0 || slot.active_readers == 0);
        }
    }
}

impl std::fmt::Debug for RangeLockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RangeLockManager {{ .. }}")
    }
}

/// Interrupts requests blocked in [`RangeLockManager::acquire_cancellable`].
///
/// Cancellation is sticky; once cancelled, every later request made with this token fails
/// with [`RotlockError::Interrupted`] unless it is admissible straight away.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl CancelToken {
    /// Cancels the token and wakes every blocked request so waiters using it bail out.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _table = self.shared.lock_table();
        self.shared.waiter.wake_all();
    }

    /// Returns true once [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A RAII guard for a lock granted by [`RangeLockManager::lock`].
///
/// The lock is released when the guard is dropped.
///
/// # Examples
///
/// ```rust
/// use rotlock::{DegreeRange, LockMode, Owner, RangeLockManager};
///
/// let manager = RangeLockManager::new();
/// let range = DegreeRange::new(350, 10).unwrap();
/// {
///     let guard = manager.lock(range, LockMode::Exclusive, Owner::new(1)).unwrap();
///     assert_eq!(guard.range(), range);
///     assert!(manager.find(guard.id()).is_some());
/// }
/// assert!(manager.locks().is_empty());
/// ```
pub struct RotationGuard {
    manager: RangeLockManager,
    record: LockRecord,
    released: bool,
}

impl RotationGuard {
    /// Returns the id of the held lock.
    #[must_use]
    pub fn id(&self) -> LockId {
        self.record.id
    }

    /// Returns the degrees this guard is locking.
    #[must_use]
    pub fn range(&self) -> DegreeRange {
        self.record.range
    }

    /// Returns the mode this guard holds.
    #[must_use]
    pub fn mode(&self) -> LockMode {
        self.record.mode
    }

    /// Releases the lock now, reporting the outcome.
    pub fn unlock(mut self) -> RotlockResult<()> {
        self.released = true;
        self.manager.release(self.record.id, self.record.owner)
    }
}

impl std::fmt::Debug for RotationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RotationGuard {{ id: {}, range: {} }}", self.record.id, self.record.range)
    }
}

impl Drop for RotationGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(error) = self.manager.release(self.record.id, self.record.owner) {
            warn!(id = %self.record.id, %error, "failed to release rotation lock on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    const OWNER_A: Owner = Owner::new(1);
    const OWNER_B: Owner = Owner::new(2);

    fn range(low: i32, high: i32) -> DegreeRange {
        DegreeRange::new(low, high).unwrap()
    }

    fn deg(value: i32) -> Degree {
        Degree::new(value).unwrap()
    }

    fn snapshot(manager: &RangeLockManager) -> Vec<Slot> {
        Degree::all().map(|d| manager.slot(d)).collect()
    }

    /// Polls `condition` until it holds, failing the test after five seconds.
    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition never became true");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_reader_then_blocked_writer() {
        let manager = RangeLockManager::new();
        manager.set_position(100).unwrap();

        let reader = manager.acquire(50, 150, LockMode::Shared, OWNER_A).unwrap();
        assert_eq!(reader, LockId::new(0));

        let writer = {
            let manager = manager.clone();
            thread::spawn(move || manager.acquire(100, 120, LockMode::Exclusive, OWNER_B))
        };
        wait_until(|| manager.slot(deg(110)).waiting_writers == 1);
        assert_eq!(manager.locks().len(), 1);

        manager.release(reader, OWNER_A).unwrap();
        let writer = writer.join().unwrap().unwrap();
        assert_eq!(writer, LockId::new(1));
        assert_eq!(manager.slot(deg(110)).waiting_writers, 0);
        assert_eq!(manager.slot(deg(110)).active_writers, 1);
        manager.assert_consistent();
    }

    #[test]
    fn test_invalid_arguments_leave_no_trace() {
        let manager = RangeLockManager::new();
        let before = snapshot(&manager);

        assert!(matches!(
            manager.acquire(-1, 10, LockMode::Shared, OWNER_A),
            Err(RotlockError::InvalidArgument(_))
        ));
        assert!(matches!(
            manager.acquire(0, 360, LockMode::Exclusive, OWNER_A),
            Err(RotlockError::InvalidArgument(_))
        ));
        assert!(matches!(
            manager.set_position(360),
            Err(RotlockError::InvalidArgument(_))
        ));
        assert_eq!(manager.position(), deg(0));
        assert_eq!(snapshot(&manager), before);
        assert!(manager.locks().is_empty());
    }

    #[test]
    fn test_release_by_other_owner_is_denied() {
        let manager = RangeLockManager::new();
        for _ in 0..5 {
            let id = manager.acquire(0, 10, LockMode::Shared, OWNER_A).unwrap();
            manager.release(id, OWNER_A).unwrap();
        }
        let id = manager.acquire(0, 10, LockMode::Exclusive, OWNER_A).unwrap();
        assert_eq!(id, LockId::new(5));
        let before = snapshot(&manager);

        assert_eq!(
            manager.release(id, OWNER_B),
            Err(RotlockError::PermissionDenied { id, owner: OWNER_B })
        );
        assert_eq!(snapshot(&manager), before);
        assert!(manager.find(id).is_some());

        manager.release(id, OWNER_A).unwrap();
        assert!(manager.find(id).is_none());
    }

    #[test]
    fn test_release_unknown_lock() {
        let manager = RangeLockManager::new();
        assert!(matches!(
            manager.release(LockId::new(42), OWNER_A),
            Err(RotlockError::InvalidArgument(_))
        ));

        let id = manager.acquire(0, 0, LockMode::Shared, OWNER_A).unwrap();
        manager.release(id, OWNER_A).unwrap();
        assert!(matches!(
            manager.release(id, OWNER_A),
            Err(RotlockError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_acquire_release_round_trip() {
        let manager = RangeLockManager::with_position(deg(5));
        let held = manager.acquire(0, 30, LockMode::Shared, OWNER_B).unwrap();
        let before = snapshot(&manager);

        let id = manager.acquire(355, 20, LockMode::Shared, OWNER_A).unwrap();
        assert_ne!(snapshot(&manager), before);
        manager.release(id, OWNER_A).unwrap();
        assert_eq!(snapshot(&manager), before);

        manager.release(held, OWNER_B).unwrap();
        assert!(snapshot(&manager).iter().all(Slot::is_idle));
    }

    #[test]
    fn test_waiting_writer_blocks_new_readers() {
        let manager = RangeLockManager::with_position(deg(100));
        let reader = manager.acquire(90, 110, LockMode::Shared, OWNER_A).unwrap();

        let writer = {
            let manager = manager.clone();
            thread::spawn(move || manager.acquire(100, 120, LockMode::Exclusive, OWNER_B))
        };
        wait_until(|| manager.slot(deg(100)).waiting_writers == 1);

        // overlapping readers must wait behind the pending writer
        assert_eq!(
            manager.try_acquire(range(95, 105), LockMode::Shared, OWNER_A),
            Err(RotlockError::WouldBlock)
        );
        let late_reader = {
            let manager = manager.clone();
            thread::spawn(move || manager.acquire(95, 105, LockMode::Shared, OWNER_A))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!late_reader.is_finished());

        manager.release(reader, OWNER_A).unwrap();
        let writer = writer.join().unwrap().unwrap();
        assert!(!late_reader.is_finished());

        manager.release(writer, OWNER_B).unwrap();
        let late = late_reader.join().unwrap().unwrap();
        assert!(late > writer);

        manager.release(late, OWNER_A).unwrap();
        manager.assert_consistent();
    }

    #[test]
    fn test_position_gates_admission() {
        let manager = RangeLockManager::with_position(deg(200));
        assert_eq!(
            manager.try_acquire(range(350, 10), LockMode::Shared, OWNER_A),
            Err(RotlockError::WouldBlock)
        );
        assert!(snapshot(&manager).iter().all(Slot::is_idle));

        let waiter = {
            let manager = manager.clone();
            thread::spawn(move || manager.acquire(350, 10, LockMode::Exclusive, OWNER_A))
        };
        wait_until(|| manager.slot(deg(0)).waiting_writers == 1);
        assert_eq!(manager.slot(deg(355)).waiting_writers, 1);

        // nothing is released; the position change alone must wake the request
        manager.set_position(355).unwrap();
        let id = waiter.join().unwrap().unwrap();
        let record = manager.find(id).unwrap();
        assert_eq!(record.range, range(350, 10));
        assert_eq!(record.mode, LockMode::Exclusive);
        assert_eq!(manager.slot(deg(5)).active_writers, 1);
        assert_eq!(manager.slot(deg(200)).active_writers, 0);
    }

    #[test]
    fn test_disjoint_writers_hold_concurrently() {
        let manager = RangeLockManager::with_position(deg(0));
        let a = manager.acquire(350, 10, LockMode::Exclusive, OWNER_A).unwrap();
        manager.set_position(180).unwrap();
        let b = manager
            .try_acquire(range(11, 349), LockMode::Exclusive, OWNER_B)
            .unwrap();
        assert_eq!(manager.locks().len(), 2);
        assert_eq!(
            manager.try_acquire(range(180, 180), LockMode::Shared, OWNER_A),
            Err(RotlockError::WouldBlock)
        );
        manager.assert_consistent();
        manager.release(a, OWNER_A).unwrap();
        manager.release(b, OWNER_B).unwrap();
    }

    #[test]
    fn test_timeout_unwinds_waiting_writer() {
        let manager = RangeLockManager::with_position(deg(10));
        let reader = manager.acquire(0, 20, LockMode::Shared, OWNER_A).unwrap();

        let result = manager.acquire_timeout(
            range(5, 15),
            LockMode::Exclusive,
            OWNER_B,
            Duration::from_millis(30),
        );
        assert_eq!(result, Err(RotlockError::TimedOut));
        assert_eq!(manager.slot(deg(10)).waiting_writers, 0);

        // the withdrawn writer no longer holds readers back
        let second = manager.try_acquire(range(5, 15), LockMode::Shared, OWNER_B).unwrap();
        manager.release(second, OWNER_B).unwrap();
        manager.release(reader, OWNER_A).unwrap();
        manager.assert_consistent();
    }

    #[test]
    fn test_timeout_succeeds_when_free() {
        let manager = RangeLockManager::new();
        let id = manager
            .acquire_timeout(range(0, 0), LockMode::Exclusive, OWNER_A, Duration::ZERO)
            .unwrap();
        manager.release(id, OWNER_A).unwrap();
    }

    #[test]
    fn test_unrepresentable_timeout_waits_without_deadline() {
        let manager = RangeLockManager::new();
        let id = manager
            .acquire_timeout(range(350, 10), LockMode::Exclusive, OWNER_A, Duration::MAX)
            .unwrap();
        assert_eq!(manager.find(id).unwrap().range, range(350, 10));
        manager.release(id, OWNER_A).unwrap();
    }

    #[test]
    fn test_timed_out_writer_wakes_parked_reader() {
        let manager = RangeLockManager::with_position(deg(10));
        let holder = manager.acquire(0, 20, LockMode::Shared, OWNER_A).unwrap();

        let writer = {
            let manager = manager.clone();
            thread::spawn(move || {
                manager.acquire_timeout(
                    range(5, 15),
                    LockMode::Exclusive,
                    OWNER_B,
                    Duration::from_millis(300),
                )
            })
        };
        wait_until(|| manager.slot(deg(10)).waiting_writers == 1);

        // held back only by the waiting writer, not by the shared holder
        let reader = {
            let manager = manager.clone();
            thread::spawn(move || manager.acquire(8, 30, LockMode::Shared, OWNER_A))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!reader.is_finished());

        assert_eq!(writer.join().unwrap(), Err(RotlockError::TimedOut));
        // no lock is released; the withdrawal alone must let the reader in
        wait_until(|| reader.is_finished());
        let id = reader.join().unwrap().unwrap();
        assert_eq!(manager.find(id).unwrap().mode, LockMode::Shared);
        assert_eq!(manager.slot(deg(10)).waiting_writers, 0);

        manager.release(id, OWNER_A).unwrap();
        manager.release(holder, OWNER_A).unwrap();
        manager.assert_consistent();
    }

    #[test]
    fn test_cancelled_writer_wakes_parked_reader() {
        let manager = RangeLockManager::with_position(deg(10));
        let holder = manager.acquire(0, 20, LockMode::Shared, OWNER_A).unwrap();
        let token = manager.cancel_token();

        let writer = {
            let manager = manager.clone();
            let token = token.clone();
            thread::spawn(move || {
                manager.acquire_cancellable(range(5, 15), LockMode::Exclusive, OWNER_B, &token)
            })
        };
        wait_until(|| manager.slot(deg(10)).waiting_writers == 1);

        let reader = {
            let manager = manager.clone();
            thread::spawn(move || manager.acquire(8, 30, LockMode::Shared, OWNER_A))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!reader.is_finished());

        token.cancel();
        assert_eq!(writer.join().unwrap(), Err(RotlockError::Interrupted));
        wait_until(|| reader.is_finished());
        let id = reader.join().unwrap().unwrap();
        assert_eq!(manager.slot(deg(10)).waiting_writers, 0);
        assert_eq!(manager.slot(deg(10)).active_readers, 2);

        manager.release(id, OWNER_A).unwrap();
        manager.release(holder, OWNER_A).unwrap();
        manager.assert_consistent();
    }

    #[test]
    fn test_cancel_interrupts_waiting_writer() {
        let manager = RangeLockManager::with_position(deg(0));
        let token = manager.cancel_token();

        let waiter = {
            let manager = manager.clone();
            let token = token.clone();
            thread::spawn(move || {
                manager.acquire_cancellable(range(90, 180), LockMode::Exclusive, OWNER_A, &token)
            })
        };
        wait_until(|| manager.slot(deg(90)).waiting_writers == 1);

        token.cancel();
        assert_eq!(waiter.join().unwrap(), Err(RotlockError::Interrupted));
        assert!(token.is_cancelled());
        assert!(snapshot(&manager).iter().all(Slot::is_idle));
        assert!(manager.locks().is_empty());
    }

    #[test]
    fn test_cancelled_token_still_admits_free_range() {
        let manager = RangeLockManager::new();
        let token = manager.cancel_token();
        token.cancel();
        let id = manager
            .acquire_cancellable(range(0, 10), LockMode::Shared, OWNER_A, &token)
            .unwrap();
        manager.release(id, OWNER_A).unwrap();
    }

    #[test]
    fn test_foreign_cancel_token_rejected() {
        let manager = RangeLockManager::new();
        let other = RangeLockManager::new();
        let token = other.cancel_token();
        assert!(matches!(
            manager.acquire_cancellable(range(0, 10), LockMode::Shared, OWNER_A, &token),
            Err(RotlockError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_guard_drop_releases_lock() {
        let manager = RangeLockManager::new();
        {
            let guard = manager.lock(range(0, 90), LockMode::Exclusive, OWNER_A).unwrap();
            assert_eq!(guard.mode(), LockMode::Exclusive);
            assert_eq!(manager.slot(deg(45)).active_writers, 1);
        }
        assert!(manager.locks().is_empty());
        assert!(manager.slot(deg(45)).is_idle());

        let guard = manager.lock(range(0, 90), LockMode::Shared, OWNER_A).unwrap();
        let id = guard.id();
        guard.unlock().unwrap();
        assert!(manager.find(id).is_none());
    }

    #[test]
    fn test_ids_unique_under_contention() {
        let manager = RangeLockManager::with_position(deg(0));
        let mut handles = vec![];

        for t in 0..8u64 {
            let manager = manager.clone();
            handles.push(thread::spawn(move || {
                let owner = Owner::new(t);
                let mut ids = vec![];
                for i in 0..50u64 {
                    let mode = if (t + i) % 3 == 0 {
                        LockMode::Exclusive
                    } else {
                        LockMode::Shared
                    };
                    let range = if t % 2 == 0 { range(350, 20) } else { range(0, 0) };
                    let id = manager.acquire_range(range, mode, owner).unwrap();
                    ids.push(id);
                    manager.release(id, owner).unwrap();
                }
                ids
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 400);
        assert!(snapshot(&manager).iter().all(Slot::is_idle));
    }

    #[test]
    fn test_concurrent_holders_stay_consistent() {
        let manager = RangeLockManager::with_position(deg(180));
        let mut handles = vec![];

        for t in 0..6u64 {
            let manager = manager.clone();
            handles.push(thread::spawn(move || {
                let owner = Owner::new(t);
                for i in 0..40 {
                    let low = ((t * 37 + i * 11) % 180) as i32;
                    let mode = if i % 4 == 0 {
                        LockMode::Exclusive
                    } else {
                        LockMode::Shared
                    };
                    let guard = manager.lock(range(low, low + 180), mode, owner).unwrap();
                    manager.assert_consistent();
                    drop(guard);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        manager.assert_consistent();
        assert!(snapshot(&manager).iter().all(Slot::is_idle));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(
            RangeLockManager::global(),
            RangeLockManager::global()
        ));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RangeLockManager>();
        assert_send_sync::<CancelToken>();
        assert_send_sync::<RotationGuard>();
    }
}
