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

//! Broadcast parking for requests that are not yet admissible.

use std::sync::{Condvar, MutexGuard, PoisonError};
use std::time::Instant;

/// Why a parked caller came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// Notified, or woken spuriously. Either way the caller re-checks.
    Notified,
    /// The deadline passed.
    Expired,
}

/// A single "something changed" signal shared by every parked caller.
///
/// Wakes are never targeted. Each woken caller re-evaluates its own request against the
/// current state and parks again if it still cannot be admitted.
#[derive(Debug, Default)]
pub(crate) struct WaitCoordinator {
    changed: Condvar,
}

impl WaitCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Releases `guard`, sleeps until woken or until `deadline`, then takes `guard` back.
    pub(crate) fn park<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, T>, Wake) {
        match deadline {
            None => {
                let guard = self
                    .changed
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
                (guard, Wake::Notified)
            }
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return (guard, Wake::Expired);
                }
                let (guard, result) = self
                    .changed
                    .wait_timeout(guard, remaining)
                    .unwrap_or_else(PoisonError::into_inner);
                if result.timed_out() {
                    (guard, Wake::Expired)
                } else {
                    (guard, Wake::Notified)
                }
            }
        }
    }

    /// Wakes every parked caller.
    pub(crate) fn wake_all(&self) {
        self.changed.notify_all();
    }
}
