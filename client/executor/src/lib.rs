// This file is part of Spindle.

// Copyright (C) Spindle Developers.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The runtime executor.
//!
//! A runtime is an opaque code blob exposing a fixed set of entry points;
//! the interpreter that runs it is pluggable behind [`RuntimeBackend`].
//! Instances are pooled per code hash, execution is single-threaded per
//! instance, and every host call is dispatched through a per-instance
//! [`HostContext`] that carries the storage overlay and the offchain
//! handles of the calling task.

mod api;
mod backend;
mod cache;
mod error;
mod externalities;
mod host;
mod result;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use api::{InherentData, RuntimeVersion};
pub use backend::{RuntimeBackend, RuntimeInstance};
pub use cache::{RuntimeCache, RuntimeCode};
pub use error::{ApiError, Error};
pub use externalities::{BasicExternalities, Externalities};
pub use host::HostContext;
pub use result::{decode_apply_extrinsic_result, decode_validate_transaction_result};

/// The well-known storage key holding the runtime code.
pub const CODE_KEY: &[u8] = b":code";
