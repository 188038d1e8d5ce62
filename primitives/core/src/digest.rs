// This file is part of Spindle.

// Copyright (C) Spindle Developers.
// SPDX-License-Identifier: Apache-2.0

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Header digests: per-block, per-engine auxiliary data.

use codec::{Decode, Encode};

/// Consensus engine unique ID.
pub type ConsensusEngineId = [u8; 4];

/// Generic header digest.
#[derive(Clone, PartialEq, Eq, Debug, Default, Encode, Decode)]
pub struct Digest {
	/// A list of digest items.
	pub logs: Vec<DigestItem>,
}

impl Digest {
	/// Push a new digest item.
	pub fn push(&mut self, item: DigestItem) {
		self.logs.push(item);
	}

	/// Pop a digest item.
	pub fn pop(&mut self) -> Option<DigestItem> {
		self.logs.pop()
	}

	/// All digest items.
	pub fn logs(&self) -> &[DigestItem] {
		&self.logs
	}
}

/// Digest item that is able to encode/decode 'system' digest items and
/// provide opaque access to other items.
///
/// The variant indices are part of the wire format and must not change.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum DigestItem {
	/// A message from the runtime to the consensus engine. The first
	/// element is the engine ID, the second the opaque payload.
	#[codec(index = 4)]
	Consensus(ConsensusEngineId, Vec<u8>),

	/// Put a Seal on it. This is only used by native code and is never
	/// seen by the runtime as part of the unsealed header.
	#[codec(index = 5)]
	Seal(ConsensusEngineId, Vec<u8>),

	/// A pre-runtime digest.
	///
	/// These are generally used to pass data from the consensus engine
	/// to the runtime, e.g. the slot claim of the block author.
	#[codec(index = 6)]
	PreRuntime(ConsensusEngineId, Vec<u8>),
}

impl DigestItem {
	/// Returns the opaque data attached to this item if it is a
	/// pre-runtime digest of the given engine.
	pub fn as_pre_runtime(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
		match self {
			Self::PreRuntime(id, data) if *id == engine => Some(data),
			_ => None,
		}
	}

	/// Returns the opaque data attached to this item if it is a consensus
	/// digest of the given engine.
	pub fn as_consensus(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
		match self {
			Self::Consensus(id, data) if *id == engine => Some(data),
			_ => None,
		}
	}

	/// Returns the opaque data attached to this item if it is a seal of
	/// the given engine.
	pub fn as_seal(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
		match self {
			Self::Seal(id, data) if *id == engine => Some(data),
			_ => None,
		}
	}

	/// Decode the payload of a pre-runtime digest of the given engine.
	pub fn pre_runtime_try_to<T: Decode>(&self, engine: ConsensusEngineId) -> Option<T> {
		self.as_pre_runtime(engine).and_then(|mut data| T::decode(&mut data).ok())
	}

	/// Decode the payload of a consensus digest of the given engine.
	pub fn consensus_try_to<T: Decode>(&self, engine: ConsensusEngineId) -> Option<T> {
		self.as_consensus(engine).and_then(|mut data| T::decode(&mut data).ok())
	}

	/// Decode the payload of a seal of the given engine.
	pub fn seal_try_to<T: Decode>(&self, engine: ConsensusEngineId) -> Option<T> {
		self.as_seal(engine).and_then(|mut data| T::decode(&mut data).ok())
	}
}
