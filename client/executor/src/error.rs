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

//! Executor error types.

use spindle_primitives::transaction::TransactionValidityError;

/// An error at the runtime API boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ApiError {
	/// The runtime reported an opaque application-level error.
	#[error("transparent api error")]
	TransparentApi,
	/// The return value of the call could not be decoded.
	#[error("failed to decode return value")]
	FailedToDecodeReturnValue,
}

/// Errors of the runtime executor.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum Error {
	/// The configured interpreter is not available.
	#[error("unknown wasm interpreter {0:?}")]
	WasmInterpreterUnknown(String),
	/// Instantiating the runtime module failed.
	#[error("failed to instantiate runtime: {0}")]
	Instantiation(String),
	/// The runtime does not expose the requested entry point.
	#[error("missing entry point {0:?}")]
	MissingEntryPoint(String),
	/// The call trapped or failed inside the interpreter.
	#[error("execution failed: {0}")]
	Execution(String),
	/// The runtime rejected the extrinsic.
	#[error(transparent)]
	Validity(TransactionValidityError),
	/// The call failed at the API boundary.
	#[error(transparent)]
	Api(#[from] ApiError),
}
