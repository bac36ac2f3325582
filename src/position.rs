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

use crate::ranges::Degree;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The current orientation, behind its own mutex.
///
/// This is the outer of the two locks; whoever needs both takes this one first.
#[derive(Debug, Default)]
pub(crate) struct PositionStore {
    current: Mutex<Degree>,
}

impl PositionStore {
    pub(crate) fn new(initial: Degree) -> Self {
        PositionStore {
            current: Mutex::new(initial),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Degree> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self) -> Degree {
        *self.lock()
    }
}
