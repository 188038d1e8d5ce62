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

//! The Spindle node: configuration, chain specs, keystore and the
//! assembly of all services into a running node.

pub mod chain_spec;
pub mod cli;
pub mod keystore;
pub mod metrics;
pub mod rpc;
pub mod service;
pub mod writer;

pub use chain_spec::{create_genesis_with_runtime, ChainSpec};
pub use keystore::Keystore;
pub use service::{Service, ServiceConfig};
pub use writer::PrefixedWriter;

/// Top-level node errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The configuration does not describe a runnable node.
	#[error("invalid configuration: {0}")]
	ConfigInvalid(String),
	/// The chain spec or genesis state could not be loaded.
	#[error("failed to load genesis: {0}")]
	GenesisLoadFailed(String),
	/// The keystore could not be loaded.
	#[error("invalid keystore: {0}")]
	KeystoreInvalid(String),
	/// The configured WASM interpreter is not available.
	#[error("unknown wasm interpreter {0:?}")]
	WasmInterpreterUnknown(String),
	/// The RPC server failed.
	#[error("rpc: {0}")]
	Rpc(String),
	/// The metrics endpoint failed.
	#[error("metrics: {0}")]
	Metrics(String),
	/// A locally submitted transaction was rejected.
	#[error("transaction rejected: {0}")]
	TransactionRejected(String),
	/// A state backend failure.
	#[error(transparent)]
	State(#[from] spindle_state::Error),
	/// A runtime call failure.
	#[error(transparent)]
	Executor(#[from] spindle_executor::Error),
}
