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

//! Typed wrappers around the runtime entry points the node relies on.

use crate::{
	decode_apply_extrinsic_result, decode_validate_transaction_result, ApiError, Error,
	HostContext, RuntimeCache, RuntimeCode,
};
use codec::{Decode, Encode};
use spindle_consensus_primitives::{babe::BabeConfiguration, grandpa::AuthorityList};
use spindle_primitives::{
	transaction::{TransactionValidity, ValidTransaction},
	Block, Header, OpaqueExtrinsic,
};

/// The version information a runtime reports about itself.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct RuntimeVersion {
	/// The identifier of the chain logic.
	pub spec_name: String,
	/// The identifier of the implementation.
	pub impl_name: String,
	/// Bumped when the authoring interface changes.
	pub authoring_version: u32,
	/// Bumped on every change to the chain logic.
	pub spec_version: u32,
	/// Bumped on implementation-only changes.
	pub impl_version: u32,
}

/// The inherent data passed to `BlockBuilder_inherent_extrinsics`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct InherentData {
	/// The timestamp of the slot the block is authored in, in
	/// milliseconds.
	pub timestamp: u64,
}

impl RuntimeCache {
	/// `Core_version`
	pub fn core_version(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
	) -> Result<RuntimeVersion, Error> {
		let out = self.call(code, context, "Core_version", &[])?;
		decode(&out)
	}

	/// `Core_execute_block`
	pub fn core_execute_block(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
		block: &Block,
	) -> Result<(), Error> {
		self.call(code, context, "Core_execute_block", &block.encode())?;
		Ok(())
	}

	/// `Core_initialize_block`
	pub fn core_initialize_block(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
		header: &Header,
	) -> Result<(), Error> {
		self.call(code, context, "Core_initialize_block", &header.encode())?;
		Ok(())
	}

	/// `BlockBuilder_inherent_extrinsics`
	pub fn inherent_extrinsics(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
		data: &InherentData,
	) -> Result<Vec<OpaqueExtrinsic>, Error> {
		let out = self.call(code, context, "BlockBuilder_inherent_extrinsics", &data.encode())?;
		decode(&out)
	}

	/// `BlockBuilder_apply_extrinsic`
	pub fn apply_extrinsic(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
		extrinsic: &OpaqueExtrinsic,
	) -> Result<ValidTransaction, Error> {
		let out = self.call(code, context, "BlockBuilder_apply_extrinsic", &extrinsic.encode())?;
		decode_apply_extrinsic_result(&out)
	}

	/// `BlockBuilder_finalize_block`
	pub fn finalize_block(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
	) -> Result<Header, Error> {
		let out = self.call(code, context, "BlockBuilder_finalize_block", &[])?;
		decode(&out)
	}

	/// `TaggedTransactionQueue_validate_transaction`
	pub fn validate_transaction(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
		extrinsic: &OpaqueExtrinsic,
	) -> Result<TransactionValidity, Error> {
		let out = self.call(
			code,
			context,
			"TaggedTransactionQueue_validate_transaction",
			&extrinsic.encode(),
		)?;
		decode_validate_transaction_result(&out)
	}

	/// `BabeApi_configuration`
	pub fn babe_configuration(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
	) -> Result<BabeConfiguration, Error> {
		let out = self.call(code, context, "BabeApi_configuration", &[])?;
		decode(&out)
	}

	/// `GrandpaApi_grandpa_authorities`
	pub fn grandpa_authorities(
		&self,
		code: &RuntimeCode,
		context: &mut HostContext<'_>,
	) -> Result<AuthorityList, Error> {
		let out = self.call(code, context, "GrandpaApi_grandpa_authorities", &[])?;
		decode(&out)
	}
}

fn decode<T: Decode>(mut out: &[u8]) -> Result<T, Error> {
	T::decode(&mut out).map_err(|_| Error::Api(ApiError::FailedToDecodeReturnValue))
}
