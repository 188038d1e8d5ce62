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

//! The interpreter contract.
//!
//! The executor does not interpret WASM itself. An interpreter plugs in
//! behind [`RuntimeBackend`] and binds its imports against the host-call
//! surface of [`HostContext`](crate::HostContext); the executor only
//! relies on the entry-point calling convention: SCALE-encoded arguments
//! in, SCALE-encoded return value out.

use crate::{Error, HostContext};

/// A factory for runtime instances of one interpreter kind.
pub trait RuntimeBackend: Send + Sync {
	/// The name of the interpreter, as referenced by the node
	/// configuration.
	fn name(&self) -> &'static str;

	/// Compile and instantiate the given runtime code.
	fn instantiate(&self, code: &[u8]) -> Result<Box<dyn RuntimeInstance>, Error>;
}

/// A single runtime instance.
///
/// Calls are synchronous and must not yield; the executor serializes
/// callers so that an instance never runs two calls concurrently.
pub trait RuntimeInstance: Send {
	/// Call a runtime entry point.
	fn call(
		&mut self,
		context: &mut HostContext<'_>,
		method: &str,
		data: &[u8],
	) -> Result<Vec<u8>, Error>;
}
