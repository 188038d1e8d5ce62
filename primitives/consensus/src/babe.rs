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

//! Primitives for BABE: epochs, pre-runtime digests, consensus logs and
//! the VRF transcript.

use crate::slots::Slot;
use codec::{Decode, Encode};
use merlin::Transcript;
use spindle_primitives::{
	blake2_256,
	sr25519::{VrfInOut, VrfOutput, VrfProof},
	ConsensusEngineId,
};

/// The `ConsensusEngineId` of BABE.
pub const BABE_ENGINE_ID: ConsensusEngineId = *b"BABE";

/// VRF context used for slot eligibility.
pub const VRF_OUTPUT_CONTEXT: &[u8] = b"spindle-babe-vrf";

/// A BABE authority identifier.
pub type AuthorityId = spindle_primitives::sr25519::Public;

/// The index of an authority.
pub type AuthorityIndex = u32;

/// The weight of an authority.
pub type BabeAuthorityWeight = u64;

/// Randomness injected into the VRF transcript of every slot of an epoch.
pub type Randomness = [u8; 32];

/// Configuration that can change with every epoch.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct BabeEpochConfiguration {
	/// The primary-slot eligibility threshold the VRF output is compared
	/// against.
	pub threshold: u128,
	/// Whether, and how, secondary slots are assigned. Zero disables
	/// secondary slots entirely.
	pub secondary_slots: u8,
}

/// BABE epoch information.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct Epoch {
	/// The epoch index.
	pub epoch_index: u64,
	/// The starting slot of the epoch.
	pub start_slot: Slot,
	/// The duration of this epoch in slots.
	pub duration: u64,
	/// The authorities and their weights.
	pub authorities: Vec<(AuthorityId, BabeAuthorityWeight)>,
	/// Randomness for this epoch.
	pub randomness: Randomness,
	/// Configuration of the epoch.
	pub config: BabeEpochConfiguration,
}

impl Epoch {
	/// The first slot after the end of the epoch.
	pub fn end_slot(&self) -> Slot {
		self.start_slot.saturating_add(self.duration)
	}

	/// Whether the given slot falls into this epoch's window.
	pub fn contains_slot(&self, slot: Slot) -> bool {
		self.start_slot <= slot && slot < self.end_slot()
	}
}

/// The static protocol configuration reported by the runtime at genesis.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct BabeConfiguration {
	/// The slot duration in milliseconds.
	pub slot_duration: u64,
	/// The length of every epoch, in slots.
	pub epoch_length: u64,
	/// The initial eligibility threshold.
	pub threshold: u128,
	/// The initial authorities.
	pub authorities: Vec<(AuthorityId, BabeAuthorityWeight)>,
	/// The initial randomness.
	pub randomness: Randomness,
	/// The initial secondary-slot mode.
	pub secondary_slots: u8,
}

impl BabeConfiguration {
	/// The genesis epoch described by this configuration. Its window is
	/// bound to the slot of the first block produced on top of genesis.
	pub fn genesis_epoch(&self, start_slot: Slot) -> Epoch {
		Epoch {
			epoch_index: 0,
			start_slot,
			duration: self.epoch_length,
			authorities: self.authorities.clone(),
			randomness: self.randomness,
			config: BabeEpochConfiguration {
				threshold: self.threshold,
				secondary_slots: self.secondary_slots,
			},
		}
	}
}

/// A primary slot claim, backed by a VRF evaluation below the epoch
/// threshold.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct PrimaryPreDigest {
	/// The index of the claiming authority in the epoch's authority list.
	pub authority_index: AuthorityIndex,
	/// The claimed slot.
	pub slot: Slot,
	/// The VRF pre-output.
	pub vrf_output: VrfOutput,
	/// The VRF proof.
	pub vrf_proof: VrfProof,
}

/// A secondary slot claim, deterministically assigned by the round-robin
/// fallback rule.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct SecondaryPlainPreDigest {
	/// The index of the assigned authority.
	pub authority_index: AuthorityIndex,
	/// The claimed slot.
	pub slot: Slot,
}

/// The BABE pre-runtime digest carried by every block.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum PreDigest {
	/// A primary VRF-based slot claim.
	#[codec(index = 1)]
	Primary(PrimaryPreDigest),
	/// A secondary deterministic slot claim.
	#[codec(index = 2)]
	SecondaryPlain(SecondaryPlainPreDigest),
}

impl PreDigest {
	/// The claiming authority's index.
	pub fn authority_index(&self) -> AuthorityIndex {
		match self {
			Self::Primary(d) => d.authority_index,
			Self::SecondaryPlain(d) => d.authority_index,
		}
	}

	/// The claimed slot.
	pub fn slot(&self) -> Slot {
		match self {
			Self::Primary(d) => d.slot,
			Self::SecondaryPlain(d) => d.slot,
		}
	}

	/// Whether this is a primary claim; primary claims carry fork-choice
	/// weight.
	pub fn is_primary(&self) -> bool {
		matches!(self, Self::Primary(_))
	}
}

/// Information about the next epoch, announced in the first block of the
/// preceding epoch.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct NextEpochDescriptor {
	/// The authorities of the next epoch.
	pub authorities: Vec<(AuthorityId, BabeAuthorityWeight)>,
	/// The randomness of the next epoch.
	pub randomness: Randomness,
}

/// A configuration change for the epoch after next.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct NextConfigDescriptor {
	/// The new eligibility threshold.
	pub threshold: u128,
	/// The new secondary-slot mode.
	pub secondary_slots: u8,
}

/// A BABE consensus digest, emitted by the runtime.
///
/// The variant indices are part of the wire format and must not change.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum ConsensusLog {
	/// The descriptor of the upcoming epoch, carried by the first block of
	/// every epoch.
	#[codec(index = 1)]
	NextEpochData(NextEpochDescriptor),
	/// An authority got disabled and must not author until the next epoch.
	#[codec(index = 2)]
	OnDisabled(AuthorityIndex),
	/// A configuration change taking effect with the next epoch data.
	#[codec(index = 3)]
	NextConfigData(NextConfigDescriptor),
}

/// The VRF transcript evaluated for a slot claim.
pub fn make_transcript(randomness: &Randomness, slot: Slot, epoch_index: u64) -> Transcript {
	let mut transcript = Transcript::new(b"BABE");
	transcript.append_u64(b"slot number", slot.into());
	transcript.append_u64(b"current epoch", epoch_index);
	transcript.append_message(b"chain randomness", randomness);
	transcript
}

/// Check whether a VRF evaluation makes its author eligible for a primary
/// slot under the given threshold.
pub fn check_primary_threshold(inout: &VrfInOut, threshold: u128) -> bool {
	u128::from_le_bytes(inout.make_bytes16(VRF_OUTPUT_CONTEXT)) < threshold
}

/// The authority expected to author the given secondary slot, or `None`
/// when the authority list is empty.
pub fn secondary_slot_author(
	randomness: &Randomness,
	slot: Slot,
	authorities: usize,
) -> Option<AuthorityIndex> {
	if authorities == 0 {
		return None;
	}
	let mut data = randomness.to_vec();
	data.extend_from_slice(&slot.encode());
	let hash = blake2_256(&data);
	let rand = u64::from_le_bytes(hash[..8].try_into().expect("slice is 8 bytes; qed"));
	Some((rand % authorities as u64) as AuthorityIndex)
}

#[cfg(test)]
mod tests {
	use super::*;
	use spindle_primitives::Keyring;

	#[test]
	fn consensus_log_indices_are_pinned() {
		let next = ConsensusLog::NextEpochData(NextEpochDescriptor {
			authorities: vec![],
			randomness: [0; 32],
		});
		assert_eq!(next.encode()[0], 1);
		assert_eq!(ConsensusLog::OnDisabled(3).encode()[0], 2);
		let config = ConsensusLog::NextConfigData(NextConfigDescriptor {
			threshold: 1,
			secondary_slots: 1,
		});
		assert_eq!(config.encode()[0], 3);
	}

	#[test]
	fn pre_digest_indices_are_pinned() {
		let secondary = PreDigest::SecondaryPlain(SecondaryPlainPreDigest {
			authority_index: 0,
			slot: 1.into(),
		});
		assert_eq!(secondary.encode()[0], 2);
	}

	#[test]
	fn epoch_window() {
		let epoch = Epoch {
			epoch_index: 3,
			start_slot: 100.into(),
			duration: 50,
			authorities: vec![],
			randomness: [0; 32],
			config: BabeEpochConfiguration { threshold: 0, secondary_slots: 1 },
		};
		assert!(epoch.contains_slot(100.into()));
		assert!(epoch.contains_slot(149.into()));
		assert!(!epoch.contains_slot(150.into()));
		assert!(!epoch.contains_slot(99.into()));
	}

	#[test]
	fn max_threshold_always_eligible() {
		let pair = Keyring::Alice.sr25519_pair();
		let (inout, _, _) = pair.vrf_sign(make_transcript(&[1; 32], 7.into(), 0));
		assert!(check_primary_threshold(&inout, u128::MAX));
		assert!(!check_primary_threshold(&inout, 0));
	}

	#[test]
	fn secondary_author_is_stable_and_in_range() {
		let a = secondary_slot_author(&[9; 32], 42.into(), 4).unwrap();
		let b = secondary_slot_author(&[9; 32], 42.into(), 4).unwrap();
		assert_eq!(a, b);
		assert!((a as usize) < 4);
		assert_eq!(secondary_slot_author(&[9; 32], 42.into(), 0), None);
	}
}
