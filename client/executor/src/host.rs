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

//! The host-call surface.
//!
//! One [`HostContext`] exists per runtime call; it owns the borrow of the
//! storage overlay and carries the handles a call may need. Interpreters
//! dispatch every import through it, so there is no process-global host
//! state.

use crate::Externalities;
use spindle_offchain::{HttpError, HttpSetHandle, RequestId};
use spindle_primitives::{blake2_256, ed25519, sr25519, Hash};
use std::time::Duration;

const LOG_TARGET: &str = "runtime";

/// The context threaded through a single runtime call.
pub struct HostContext<'a> {
	ext: &'a mut dyn Externalities,
	offchain: Option<HttpSetHandle>,
}

impl<'a> HostContext<'a> {
	/// Create a context over the given storage overlay.
	pub fn new(ext: &'a mut dyn Externalities) -> Self {
		Self { ext, offchain: None }
	}

	/// Attach the offchain HTTP set, enabling the `offchain_http_*` host
	/// calls.
	pub fn with_offchain(mut self, offchain: HttpSetHandle) -> Self {
		self.offchain = Some(offchain);
		self
	}

	// ---- storage ----

	/// `ext_storage_get`
	pub fn storage_get(&self, key: &[u8]) -> Option<Vec<u8>> {
		self.ext.storage_get(key)
	}

	/// `ext_storage_set`
	pub fn storage_set(&mut self, key: Vec<u8>, value: Vec<u8>) {
		self.ext.storage_set(key, value);
	}

	/// `ext_storage_clear`
	pub fn storage_clear(&mut self, key: &[u8]) {
		self.ext.storage_clear(key);
	}

	/// `ext_storage_next_key`
	pub fn storage_next_key(&self, key: &[u8]) -> Option<Vec<u8>> {
		self.ext.storage_next_key(key)
	}

	/// `ext_storage_root`
	pub fn storage_root(&mut self) -> Hash {
		self.ext.storage_root()
	}

	// ---- hashing and crypto ----

	/// `ext_hashing_blake2_256`
	pub fn hashing_blake2_256(&self, data: &[u8]) -> [u8; 32] {
		blake2_256(data)
	}

	/// `ext_crypto_sr25519_verify`
	pub fn crypto_sr25519_verify(
		&self,
		signature: &sr25519::Signature,
		message: &[u8],
		public: &sr25519::Public,
	) -> bool {
		public.verify(message, signature)
	}

	/// `ext_crypto_ed25519_verify`
	pub fn crypto_ed25519_verify(
		&self,
		signature: &ed25519::Signature,
		message: &[u8],
		public: &ed25519::Public,
	) -> bool {
		public.verify(message, signature)
	}

	// ---- misc ----

	/// `ext_misc_log`: route runtime log lines into the host logger.
	pub fn misc_log(&self, level: u8, message: &[u8]) {
		let message = String::from_utf8_lossy(message);
		match level {
			0 => log::error!(target: LOG_TARGET, "{message}"),
			1 => log::warn!(target: LOG_TARGET, "{message}"),
			2 => log::info!(target: LOG_TARGET, "{message}"),
			3 => log::debug!(target: LOG_TARGET, "{message}"),
			_ => log::trace!(target: LOG_TARGET, "{message}"),
		}
	}

	// ---- offchain http ----
	//
	// Runtime calls are synchronous; the offchain set is served by its
	// owning task, so these block the calling thread on the round trip.

	/// `ext_offchain_http_request_start`
	pub fn offchain_http_request_start(
		&self,
		method: &str,
		uri: &str,
	) -> Result<RequestId, HttpError> {
		let offchain = self.offchain()?;
		futures::executor::block_on(offchain.start_request(method, uri))
	}

	/// `ext_offchain_http_request_add_header`
	pub fn offchain_http_request_add_header(
		&self,
		id: RequestId,
		name: &str,
		value: &str,
	) -> Result<(), HttpError> {
		let offchain = self.offchain()?;
		futures::executor::block_on(offchain.add_header(id, name, value))
	}

	/// `ext_offchain_http_request_write_body`
	pub fn offchain_http_request_write_body(
		&self,
		id: RequestId,
		chunk: &[u8],
		deadline_ms: Option<u64>,
	) -> Result<(), HttpError> {
		let offchain = self.offchain()?;
		futures::executor::block_on(offchain.write_body(
			id,
			chunk,
			deadline_ms.map(Duration::from_millis),
		))
	}

	/// `ext_offchain_http_request_send`
	pub fn offchain_http_request_send(&self, id: RequestId) -> Result<(), HttpError> {
		let offchain = self.offchain()?;
		futures::executor::block_on(offchain.send(id))
	}

	/// `ext_offchain_http_response_wait`: status code and headers, waiting
	/// for the response to arrive.
	pub fn offchain_http_response_info(
		&self,
		id: RequestId,
		deadline_ms: Option<u64>,
	) -> Result<spindle_offchain::ResponseInfo, HttpError> {
		let offchain = self.offchain()?;
		futures::executor::block_on(
			offchain.response_info(id, deadline_ms.map(Duration::from_millis)),
		)
	}

	/// `ext_offchain_http_response_read_body`
	pub fn offchain_http_response_read_body(
		&self,
		id: RequestId,
		max: usize,
		deadline_ms: Option<u64>,
	) -> Result<Vec<u8>, HttpError> {
		let offchain = self.offchain()?;
		futures::executor::block_on(offchain.response_read(
			id,
			max,
			deadline_ms.map(Duration::from_millis),
		))
	}

	/// `ext_offchain_http_request_remove`
	pub fn offchain_http_request_remove(&self, id: RequestId) -> Result<(), HttpError> {
		let offchain = self.offchain()?;
		futures::executor::block_on(offchain.remove(id))
	}

	fn offchain(&self) -> Result<&HttpSetHandle, HttpError> {
		self.offchain.as_ref().ok_or(HttpError::Terminated)
	}
}
