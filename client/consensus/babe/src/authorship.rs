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

//! Slot claiming and block proposing.

use crate::Error;
use codec::Encode;
use spindle_consensus_primitives::{
	babe::{
		check_primary_threshold, make_transcript, secondary_slot_author, Epoch, PreDigest,
		PrimaryPreDigest, SecondaryPlainPreDigest, BABE_ENGINE_ID,
	},
	Slot, SlotDuration,
};
use spindle_executor::{HostContext, InherentData, RuntimeCache};
use spindle_primitives::{sr25519, Block, Digest, DigestItem, Hash, Header};
use spindle_state::Backend;
use std::sync::Arc;

const LOG_TARGET: &str = "babe";

/// Try to claim `slot` with the given key: a primary claim if the VRF
/// evaluation is below the epoch threshold, otherwise a secondary claim
/// if the fallback rule assigns the slot to this authority.
pub fn claim_slot(epoch: &Epoch, slot: Slot, keypair: &sr25519::Pair) -> Option<PreDigest> {
	let public = keypair.public();
	let authority_index = epoch
		.authorities
		.iter()
		.position(|(authority, _)| *authority == public)? as u32;

	let transcript = make_transcript(&epoch.randomness, slot, epoch.epoch_index);
	let (inout, vrf_output, vrf_proof) = keypair.vrf_sign(transcript);
	if check_primary_threshold(&inout, epoch.config.threshold) {
		return Some(PreDigest::Primary(PrimaryPreDigest {
			authority_index,
			slot,
			vrf_output,
			vrf_proof,
		}));
	}

	if epoch.config.secondary_slots != 0
		&& secondary_slot_author(&epoch.randomness, slot, epoch.authorities.len())
			== Some(authority_index)
	{
		return Some(PreDigest::SecondaryPlain(SecondaryPlainPreDigest { authority_index, slot }));
	}

	None
}

/// Builds blocks on top of the best chain through the runtime.
pub struct Proposer {
	backend: Arc<Backend>,
	runtime: Arc<RuntimeCache>,
	slot_duration: SlotDuration,
}

impl Proposer {
	/// Create a new proposer.
	pub fn new(backend: Arc<Backend>, runtime: Arc<RuntimeCache>, slot_duration: SlotDuration) -> Self {
		Self { backend, runtime, slot_duration }
	}

	/// Build and seal a block on top of `parent` for the claimed slot.
	pub fn propose(
		&self,
		parent: &Header,
		pre_digest: &PreDigest,
		keypair: &sr25519::Pair,
	) -> Result<Block, Error> {
		let parent_hash = parent.hash();
		let slot = pre_digest.slot();
		let code = self.backend.runtime_code(&parent_hash)?;
		let mut overlay = self.backend.storage.overlay_at(&parent.state_root)?;
		let mut context = HostContext::new(&mut overlay);

		let template = Header {
			parent_hash,
			number: parent.number + 1,
			state_root: Hash::zero(),
			extrinsics_root: Hash::zero(),
			digest: Digest {
				logs: vec![DigestItem::PreRuntime(BABE_ENGINE_ID, pre_digest.encode())],
			},
		};
		self.runtime.core_initialize_block(&code, &mut context, &template)?;

		let inherent_data =
			InherentData { timestamp: u64::from(slot) * self.slot_duration.as_millis() };
		let mut extrinsics = self.runtime.inherent_extrinsics(&code, &mut context, &inherent_data)?;
		for extrinsic in &extrinsics {
			self.runtime.apply_extrinsic(&code, &mut context, extrinsic)?;
		}

		for transaction in self.backend.pool.ready() {
			match self.runtime.apply_extrinsic(&code, &mut context, &transaction.data) {
				Ok(_) => extrinsics.push(transaction.data.clone()),
				Err(spindle_executor::Error::Validity(error)) => {
					// The transaction went stale between validation and
					// inclusion; drop it and keep building.
					log::debug!(
						target: LOG_TARGET,
						"dropping transaction {:?} from block: {error}",
						transaction.hash,
					);
					self.backend.pool.remove(&transaction.hash);
				},
				Err(error) => return Err(error.into()),
			}
		}

		let mut header = self.runtime.finalize_block(&code, &mut context)?;
		drop(context);

		let seal = keypair.sign(header.hash().as_bytes());
		header.digest.push(DigestItem::Seal(BABE_ENGINE_ID, seal.encode()));

		log::debug!(
			target: LOG_TARGET,
			"built block {} ({:?}) on top of {parent_hash:?} at slot {slot}",
			header.number,
			header.hash(),
		);
		Ok(Block { header, extrinsics })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use spindle_consensus_primitives::babe::BabeEpochConfiguration;
	use spindle_primitives::Keyring;

	fn epoch(threshold: u128, secondary_slots: u8) -> Epoch {
		Epoch {
			epoch_index: 1,
			start_slot: 100.into(),
			duration: 50,
			authorities: vec![
				(Keyring::Alice.sr25519_public(), 1),
				(Keyring::Bob.sr25519_public(), 1),
			],
			randomness: [7; 32],
			config: BabeEpochConfiguration { threshold, secondary_slots },
		}
	}

	#[test]
	fn max_threshold_claims_every_slot_as_primary() {
		let epoch = epoch(u128::MAX, 0);
		for slot in 100u64..110 {
			let claim = claim_slot(&epoch, slot.into(), &Keyring::Alice.sr25519_pair())
				.expect("always below threshold");
			assert!(claim.is_primary());
			assert_eq!(claim.slot(), slot.into());
			assert_eq!(claim.authority_index(), 0);
		}
	}

	#[test]
	fn zero_threshold_leaves_only_secondary_claims() {
		let epoch = epoch(0, 1);
		let alice = Keyring::Alice.sr25519_pair();
		let bob = Keyring::Bob.sr25519_pair();
		for slot in 100u64..120 {
			let a = claim_slot(&epoch, slot.into(), &alice);
			let b = claim_slot(&epoch, slot.into(), &bob);
			// Exactly one of the two authorities owns each secondary slot.
			assert_eq!(a.is_some() ^ b.is_some(), true, "slot {slot}");
			let claim = a.or(b).unwrap();
			assert!(!claim.is_primary());
		}
	}

	#[test]
	fn zero_threshold_without_secondary_claims_nothing() {
		let epoch = epoch(0, 0);
		for slot in 100u64..120 {
			assert!(claim_slot(&epoch, slot.into(), &Keyring::Alice.sr25519_pair()).is_none());
		}
	}

	#[test]
	fn non_authority_cannot_claim() {
		let epoch = epoch(u128::MAX, 1);
		assert!(claim_slot(&epoch, 100.into(), &Keyring::Eve.sr25519_pair()).is_none());
	}
}
