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

//! A native runtime backend for tests and development chains.
//!
//! The mock runtime keeps all of its state in the host storage overlay,
//! so authoring and re-execution of a block arrive at the same state
//! root. Extrinsics are SCALE-encoded [`MockCall`]s.

use crate::{
	Error, HostContext, InherentData, RuntimeBackend, RuntimeInstance, RuntimeVersion,
};
use codec::{Decode, Encode};
use spindle_consensus_primitives::{babe::BabeConfiguration, grandpa::AuthorityList};
use spindle_primitives::{
	extrinsics_root,
	transaction::{
		InvalidTransaction, TransactionValidity, TransactionValidityError, ValidTransaction,
	},
	Block, Digest, Hash, Header, OpaqueExtrinsic,
};

/// Storage key under which a chain spec places the SCALE-encoded
/// [`BabeConfiguration`].
pub const BABE_CONFIG_KEY: &[u8] = b":babe:config";

/// Storage key under which a chain spec places the SCALE-encoded GRANDPA
/// [`AuthorityList`].
pub const GRANDPA_AUTHORITIES_KEY: &[u8] = b":grandpa:authorities";

// Scratch keys used between `initialize_block` and `finalize_block`;
// cleared before the final root is computed.
const PENDING_HEADER_KEY: &[u8] = b":mock:pending_header";
const PENDING_EXTRINSICS_KEY: &[u8] = b":mock:pending_extrinsics";

/// The calls the mock runtime understands.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum MockCall {
	/// Write `value` under `key`.
	#[codec(index = 0)]
	Set(Vec<u8>, Vec<u8>),
	/// The timestamp inherent.
	#[codec(index = 1)]
	Timestamp(u64),
	/// Do nothing.
	#[codec(index = 2)]
	Noop,
}

/// Build a `Set` extrinsic.
pub fn set_extrinsic(key: &[u8], value: &[u8]) -> OpaqueExtrinsic {
	OpaqueExtrinsic(MockCall::Set(key.to_vec(), value.to_vec()).encode())
}

/// Build a timestamp inherent extrinsic.
pub fn timestamp_extrinsic(timestamp: u64) -> OpaqueExtrinsic {
	OpaqueExtrinsic(MockCall::Timestamp(timestamp).encode())
}

/// The native mock backend.
#[derive(Default)]
pub struct MockBackend;

impl MockBackend {
	/// Create a new backend.
	pub fn new() -> Self {
		Self
	}
}

impl RuntimeBackend for MockBackend {
	fn name(&self) -> &'static str {
		"mock"
	}

	fn instantiate(&self, _code: &[u8]) -> Result<Box<dyn RuntimeInstance>, Error> {
		Ok(Box::new(MockInstance))
	}
}

struct MockInstance;

impl RuntimeInstance for MockInstance {
	fn call(
		&mut self,
		context: &mut HostContext<'_>,
		method: &str,
		mut data: &[u8],
	) -> Result<Vec<u8>, Error> {
		match method {
			"Core_version" => Ok(RuntimeVersion {
				spec_name: "spindle-mock".into(),
				impl_name: "spindle-mock-native".into(),
				authoring_version: 1,
				spec_version: 1,
				impl_version: 1,
			}
			.encode()),
			"Core_initialize_block" => {
				let header = Header::decode(&mut data).map_err(bad_input)?;
				initialize_block(context, &header);
				Ok(Vec::new())
			},
			"Core_execute_block" => {
				let block = Block::decode(&mut data).map_err(bad_input)?;
				execute_block(context, &block)?;
				Ok(Vec::new())
			},
			"BlockBuilder_inherent_extrinsics" => {
				let data = InherentData::decode(&mut data).map_err(bad_input)?;
				Ok(vec![timestamp_extrinsic(data.timestamp)].encode())
			},
			"BlockBuilder_apply_extrinsic" => {
				let extrinsic = OpaqueExtrinsic::decode(&mut data).map_err(bad_input)?;
				Ok(apply_extrinsic(context, &extrinsic))
			},
			"BlockBuilder_finalize_block" => Ok(finalize_block(context).encode()),
			"TaggedTransactionQueue_validate_transaction" => {
				let extrinsic = OpaqueExtrinsic::decode(&mut data).map_err(bad_input)?;
				Ok(validate_transaction(&extrinsic).encode())
			},
			"BabeApi_configuration" => {
				Ok(context.storage_get(BABE_CONFIG_KEY).unwrap_or_else(|| {
					BabeConfiguration {
						slot_duration: 3_000,
						epoch_length: 200,
						threshold: u128::MAX,
						authorities: vec![],
						randomness: [0; 32],
						secondary_slots: 1,
					}
					.encode()
				}))
			},
			"GrandpaApi_grandpa_authorities" => Ok(context
				.storage_get(GRANDPA_AUTHORITIES_KEY)
				.unwrap_or_else(|| AuthorityList::new().encode())),
			_ => Err(Error::MissingEntryPoint(method.into())),
		}
	}
}

fn bad_input(e: codec::Error) -> Error {
	Error::Execution(format!("malformed call data: {e}"))
}

fn initialize_block(context: &mut HostContext<'_>, header: &Header) {
	context.storage_set(PENDING_HEADER_KEY.to_vec(), header.encode());
	context.storage_set(PENDING_EXTRINSICS_KEY.to_vec(), Vec::<OpaqueExtrinsic>::new().encode());
}

fn apply_extrinsic(context: &mut HostContext<'_>, extrinsic: &OpaqueExtrinsic) -> Vec<u8> {
	let Ok(call) = MockCall::decode(&mut &extrinsic.0[..]) else {
		return dispatch_error(TransactionValidityError::Invalid(InvalidTransaction::Call));
	};

	match call {
		MockCall::Set(key, value) => context.storage_set(key, value),
		MockCall::Timestamp(timestamp) => {
			context.storage_set(b":timestamp".to_vec(), timestamp.encode())
		},
		MockCall::Noop => {},
	}

	let mut pending: Vec<OpaqueExtrinsic> = context
		.storage_get(PENDING_EXTRINSICS_KEY)
		.and_then(|raw| Decode::decode(&mut &raw[..]).ok())
		.unwrap_or_default();
	pending.push(extrinsic.clone());
	context.storage_set(PENDING_EXTRINSICS_KEY.to_vec(), pending.encode());

	let mut out = vec![0, 0];
	out.extend(ValidTransaction::default().encode());
	out
}

fn dispatch_error(error: TransactionValidityError) -> Vec<u8> {
	let mut out = vec![0, 1];
	out.extend(error.encode());
	out
}

fn finalize_block(context: &mut HostContext<'_>) -> Header {
	let pending_header: Header = context
		.storage_get(PENDING_HEADER_KEY)
		.and_then(|raw| Decode::decode(&mut &raw[..]).ok())
		.unwrap_or_else(|| Header {
			parent_hash: Hash::zero(),
			number: 0,
			state_root: Hash::zero(),
			extrinsics_root: Hash::zero(),
			digest: Digest::default(),
		});
	let pending: Vec<OpaqueExtrinsic> = context
		.storage_get(PENDING_EXTRINSICS_KEY)
		.and_then(|raw| Decode::decode(&mut &raw[..]).ok())
		.unwrap_or_default();

	// The scratch space must not leak into the state root.
	context.storage_clear(PENDING_HEADER_KEY);
	context.storage_clear(PENDING_EXTRINSICS_KEY);

	Header {
		parent_hash: pending_header.parent_hash,
		number: pending_header.number,
		state_root: context.storage_root(),
		extrinsics_root: extrinsics_root(&pending),
		digest: pending_header.digest,
	}
}

fn execute_block(context: &mut HostContext<'_>, block: &Block) -> Result<(), Error> {
	initialize_block(context, &block.header);
	for extrinsic in &block.extrinsics {
		let out = apply_extrinsic(context, extrinsic);
		if out.get(1) != Some(&0) {
			return Err(Error::Execution(format!(
				"extrinsic {:?} failed in block {}",
				extrinsic.hash(),
				block.header.number,
			)));
		}
	}
	let header = finalize_block(context);
	if header.extrinsics_root != block.header.extrinsics_root {
		return Err(Error::Execution(format!(
			"extrinsics root mismatch in block {}",
			block.header.number,
		)));
	}
	Ok(())
}

fn validate_transaction(extrinsic: &OpaqueExtrinsic) -> TransactionValidity {
	let call = MockCall::decode(&mut &extrinsic.0[..])
		.map_err(|_| TransactionValidityError::Invalid(InvalidTransaction::Call))?;
	match call {
		MockCall::Set(..) | MockCall::Noop => Ok(ValidTransaction {
			priority: 1,
			requires: vec![],
			provides: vec![extrinsic.hash().as_bytes().to_vec()],
			longevity: 64,
			propagate: true,
		}),
		// Inherents only enter blocks through the block builder.
		MockCall::Timestamp(_) => {
			Err(TransactionValidityError::Invalid(InvalidTransaction::BadMandatory))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{BasicExternalities, RuntimeCache, RuntimeCode};
	use std::sync::Arc;

	fn cache() -> (RuntimeCache, RuntimeCode) {
		(RuntimeCache::new(Arc::new(MockBackend::new())), RuntimeCode::new(b"mock".to_vec()))
	}

	fn header(parent: Hash, number: u32) -> Header {
		Header {
			parent_hash: parent,
			number,
			state_root: Hash::zero(),
			extrinsics_root: Hash::zero(),
			digest: Digest::default(),
		}
	}

	#[test]
	fn version_is_reported() {
		let (cache, code) = cache();
		let mut ext = BasicExternalities::new();
		let mut ctx = HostContext::new(&mut ext);
		let version = cache.core_version(&code, &mut ctx).unwrap();
		assert_eq!(version.spec_name, "spindle-mock");
	}

	#[test]
	fn build_and_reexecute_agree_on_state() {
		let (cache, code) = cache();

		// Author a block.
		let mut author_state = BasicExternalities::new();
		let built = {
			let mut ctx = HostContext::new(&mut author_state);
			cache.core_initialize_block(&code, &mut ctx, &header(Hash::zero(), 1)).unwrap();
			let inherents = cache
				.inherent_extrinsics(&code, &mut ctx, &InherentData { timestamp: 12345 })
				.unwrap();
			let mut extrinsics = inherents;
			extrinsics.push(set_extrinsic(b"answer", b"42"));
			for xt in &extrinsics {
				cache.apply_extrinsic(&code, &mut ctx, xt).unwrap();
			}
			let header = cache.finalize_block(&code, &mut ctx).unwrap();
			Block { header, extrinsics }
		};

		// Re-execute it from scratch.
		let mut import_state = BasicExternalities::new();
		let mut ctx = HostContext::new(&mut import_state);
		cache.core_execute_block(&code, &mut ctx, &built).unwrap();
		assert_eq!(ctx.storage_root(), built.header.state_root);
		assert_eq!(ctx.storage_get(b"answer"), Some(b"42".to_vec()));
		assert_eq!(ctx.storage_get(b":timestamp"), Some(12345u64.encode()));
	}

	#[test]
	fn tampered_extrinsics_root_is_rejected() {
		let (cache, code) = cache();
		let mut state = BasicExternalities::new();
		let mut block = {
			let mut ctx = HostContext::new(&mut state);
			cache.core_initialize_block(&code, &mut ctx, &header(Hash::zero(), 1)).unwrap();
			let xt = set_extrinsic(b"k", b"v");
			cache.apply_extrinsic(&code, &mut ctx, &xt).unwrap();
			let header = cache.finalize_block(&code, &mut ctx).unwrap();
			Block { header, extrinsics: vec![xt] }
		};
		block.extrinsics.push(set_extrinsic(b"sneaky", b"x"));

		let mut import_state = BasicExternalities::new();
		let mut ctx = HostContext::new(&mut import_state);
		assert!(cache.core_execute_block(&code, &mut ctx, &block).is_err());
	}

	#[test]
	fn timestamp_does_not_validate_as_a_pool_transaction() {
		let validity = validate_transaction(&timestamp_extrinsic(5));
		assert_eq!(
			validity,
			Err(TransactionValidityError::Invalid(InvalidTransaction::BadMandatory)),
		);
	}

	#[test]
	fn default_babe_configuration_is_served() {
		let (cache, code) = cache();
		let mut ext = BasicExternalities::new();
		let mut ctx = HostContext::new(&mut ext);
		let config = cache.babe_configuration(&code, &mut ctx).unwrap();
		assert_eq!(config.threshold, u128::MAX);
		assert_eq!(config.epoch_length, 200);
	}
}
