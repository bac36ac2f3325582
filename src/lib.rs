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

//! # Rotlock
//!
//! An orientation-gated range lock. The 360 degrees of a circle are lockable positions;
//! callers claim shared (read) or exclusive (write) access to a contiguous or wrap-around
//! degree range, and a claim is only granted while the device orientation lies inside it.
//!
//! ## Features
//!
//! - Shared and exclusive access over circular degree ranges, `(350, 10)` wrapping past 359
//! - Requests block until both the orientation and the holders allow them
//! - Pending writers hold back new overlapping readers, so writers are not starved
//! - Non-blocking, timed and cancellable variants of every request
//! - RAII guards that release automatically
//!
//! ## Example
//!
//! ```rust
//! use rotlock::{LockMode, Owner, RangeLockManager};
//! use std::thread;
//!
//! let manager = RangeLockManager::new();
//! manager.set_position(10).unwrap();
//!
//! let reader = Owner::new(1);
//! let id = manager.acquire(350, 20, LockMode::Shared, reader).unwrap();
//!
//! let writer = {
//!     let manager = manager.clone();
//!     thread::spawn(move || manager.acquire(0, 30, LockMode::Exclusive, Owner::new(2)))
//! };
//!
//! // The writer is admitted once the reader lets go.
//! manager.release(id, reader).unwrap();
//! let write_id = writer.join().unwrap().unwrap();
//! assert!(write_id > id);
//! ```

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

mod manager;
mod position;
mod ranges;
mod registry;
mod result;
mod slots;
mod waiter;

pub use self::manager::{CancelToken, RangeLockManager, RotationGuard};
pub use self::ranges::{DEGREES, Degree, DegreeRange};
pub use self::registry::{LockId, LockMode, LockRecord, Owner};
pub use self::result::{RotlockError, RotlockResult};
pub use self::slots::{Slot, SlotTable};
