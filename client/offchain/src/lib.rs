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

//! The offchain HTTP request set.
//!
//! Runtime code may issue outbound HTTP requests through dedicated host
//! calls. This crate arbitrates those calls: a bounded pool of request ids
//! (1..=1000), per-request state tracking and deadline-bounded body I/O.
//!
//! The id ring and the request table are owned by a single task; every
//! operation is a message to that task. Body transfers of in-flight
//! requests run on their own tasks and feed chunks back to the owner, so
//! one slow peer never stalls the set.

mod http;

pub use http::{HttpError, HttpSet, HttpSetHandle, RequestId, ResponseInfo, MAX_CONCURRENT_REQUESTS};
