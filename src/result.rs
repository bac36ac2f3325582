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

use crate::registry::{LockId, Owner};
use thiserror::Error;

/// Result type returned by every fallible rotation lock operation.
pub type RotlockResult<T> = Result<T, RotlockError>;

/// Errors reported by the rotation lock.
///
/// Every error is synchronous and local to the call that produced it. Nothing is retried
/// internally; re-issuing a request is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotlockError {
    /// A degree, mode or lock id was malformed, or the lock id is not live.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The lock exists but belongs to somebody else.
    #[error("lock {id} is not owned by {owner}")]
    PermissionDenied {
        /// The lock the caller tried to release.
        id: LockId,
        /// The caller that tried to release it.
        owner: Owner,
    },
    /// The wait was cancelled before the request became admissible.
    #[error("interrupted while waiting for the lock")]
    Interrupted,
    /// A non-blocking request could not be admitted immediately.
    #[error("lock is not immediately available")]
    WouldBlock,
    /// A bounded wait expired before the request became admissible.
    #[error("timed out waiting for the lock")]
    TimedOut,
}

impl RotlockError {
    /// Builds an [`RotlockError::InvalidArgument`] carrying `message`.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        RotlockError::InvalidArgument(message.into())
    }

    /// Returns the positive errno value corresponding to this error.
    ///
    /// ```rust
    /// use rotlock::RotlockError;
    ///
    /// assert_eq!(RotlockError::Interrupted.errno(), 4);
    /// assert_eq!(RotlockError::invalid_argument("bad").errno(), 22);
    /// ```
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            RotlockError::InvalidArgument(_) => 22,
            RotlockError::PermissionDenied { .. } => 1,
            RotlockError::Interrupted => 4,
            RotlockError::WouldBlock => 11,
            RotlockError::TimedOut => 110,
        }
    }
}
