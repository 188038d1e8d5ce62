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

//! Pooling of runtime instances per code hash.

use crate::{Error, HostContext, RuntimeBackend, RuntimeInstance};
use parking_lot::Mutex;
use spindle_primitives::{blake2_256, Hash};
use std::{collections::HashMap, sync::Arc};

const LOG_TARGET: &str = "executor";

/// A runtime code blob together with its hash, as resolved by the state
/// backend for a particular block.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RuntimeCode {
	/// The blake2-256 hash of the code.
	pub hash: Hash,
	/// The code itself.
	pub code: Vec<u8>,
}

impl RuntimeCode {
	/// Wrap a code blob, computing its hash.
	pub fn new(code: Vec<u8>) -> Self {
		Self { hash: blake2_256(&code).into(), code }
	}
}

/// A pool of runtime instances keyed by code hash.
///
/// An instance executes one call at a time; concurrent callers of the
/// same runtime queue on the instance lock.
pub struct RuntimeCache {
	backend: Arc<dyn RuntimeBackend>,
	instances: Mutex<HashMap<Hash, Arc<Mutex<Box<dyn RuntimeInstance>>>>>,
}

impl RuntimeCache {
	/// Create a new cache over the given interpreter backend.
	pub fn new(backend: Arc<dyn RuntimeBackend>) -> Self {
		Self { backend, instances: Mutex::new(HashMap::new()) }
	}

	/// The name of the underlying interpreter.
	pub fn backend_name(&self) -> &'static str {
		self.backend.name()
	}

	/// Call a runtime entry point with the given SCALE-encoded arguments.
	pub fn call(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
		method: &str,
		data: &[u8],
	) -> Result<Vec<u8>, Error> {
		let instance = self.instance(code)?;
		let mut instance = instance.lock();
		instance.call(context, method, data)
	}

	fn instance(&self, code: &RuntimeCode) -> Result<Arc<Mutex<Box<dyn RuntimeInstance>>>, Error> {
		if let Some(instance) = self.instances.lock().get(&code.hash) {
			return Ok(instance.clone());
		}

		log::debug!(
			target: LOG_TARGET,
			"instantiating runtime {:?} with interpreter {}",
			code.hash,
			self.backend.name(),
		);
		let instance = Arc::new(Mutex::new(self.backend.instantiate(&code.code)?));
		Ok(self
			.instances
			.lock()
			.entry(code.hash)
			.or_insert(instance)
			.clone())
	}

	/// Drop cached instances whose code hash is not in `keep`; called when
	/// pruning makes old runtimes unreachable.
	pub fn retain(&self, keep: impl Fn(&Hash) -> bool) {
		self.instances.lock().retain(|hash, _| keep(hash));
	}
}
