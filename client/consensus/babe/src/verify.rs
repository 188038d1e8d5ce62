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

//! BABE header verification, as performed by the import pipeline.

use crate::Error;
use codec::Decode;
use spindle_consensus_primitives::babe::{
	check_primary_threshold, make_transcript, secondary_slot_author, PreDigest, BABE_ENGINE_ID,
};
use spindle_primitives::{sr25519, DigestItem, Header};
use spindle_state::{Backend, EpochEntry};
use std::sync::Arc;

/// The outcome of verifying a header.
pub struct VerifiedHeader {
	/// The decoded slot claim.
	pub pre_digest: PreDigest,
	/// The epoch entry the block belongs to, ready to be updated from the
	/// block's own digests and attached to it.
	pub epoch_entry: EpochEntry,
	/// The header with the seal stripped, as fed to the runtime.
	pub pre_header: Header,
}

/// Checks slot claims and seals against the epoch index.
pub struct BabeVerifier {
	backend: Arc<Backend>,
}

impl BabeVerifier {
	/// Create a new verifier.
	pub fn new(backend: Arc<Backend>) -> Self {
		Self { backend }
	}

	/// Extract the slot claim of a header without checking it; used to
	/// find the claimed slot of stored blocks.
	pub fn pre_digest(header: &Header) -> Result<PreDigest, Error> {
		let mut pre_digest = None;
		for log in header.digest.logs() {
			if let Some(data) = log.as_pre_runtime(BABE_ENGINE_ID) {
				if pre_digest.is_some() {
					return Err(Error::MultiplePreDigests);
				}
				pre_digest =
					Some(PreDigest::decode(&mut &*data).map_err(|_| Error::MissingPreDigest)?);
			}
		}
		pre_digest.ok_or(Error::MissingPreDigest)
	}

	/// Verify the slot claim and seal of `header`, whose parent must be in
	/// the block tree.
	pub fn verify_header(&self, header: &Header) -> Result<VerifiedHeader, Error> {
		let hash = header.hash();
		let parent = self
			.backend
			.blockchain
			.entry(&header.parent_hash)
			.ok_or(Error::UnknownParent(header.parent_hash))?;

		let pre_digest = Self::pre_digest(header)?;
		let slot = pre_digest.slot();

		// Slots strictly increase along a chain.
		if let Some(parent_slot) = parent.slot {
			if slot <= parent_slot {
				return Err(Error::SlotNotIncreasing { slot, parent_slot });
			}
		}

		let epoch_entry = self.backend.epochs.epoch_for_child(&header.parent_hash, slot)?;
		let epoch = &epoch_entry.current;

		let authority_index = pre_digest.authority_index();
		let (authority, _) = epoch
			.authorities
			.get(authority_index as usize)
			.ok_or(Error::BadAuthorityIndex(authority_index))?;
		if epoch_entry.disabled.contains(&authority_index) {
			return Err(Error::AuthorityDisabled(authority_index));
		}

		// Strip and check the seal: the last digest item, a signature over
		// the pre-seal header hash by the claiming authority.
		let mut pre_header = header.clone();
		let seal = pre_header.digest.pop().ok_or(Error::Unsealed(hash))?;
		let signature = seal
			.seal_try_to::<sr25519::Signature>(BABE_ENGINE_ID)
			.ok_or(Error::Unsealed(hash))?;
		if !authority.verify(pre_header.hash().as_bytes(), &signature) {
			return Err(Error::BadSeal(hash));
		}

		match &pre_digest {
			PreDigest::Primary(primary) => {
				let transcript = make_transcript(&epoch.randomness, slot, epoch.epoch_index);
				let inout = authority
					.vrf_verify(transcript, &primary.vrf_output, &primary.vrf_proof)
					.ok_or(Error::BadVrf(slot))?;
				if !check_primary_threshold(&inout, epoch.config.threshold) {
					return Err(Error::BadVrf(slot));
				}
			},
			PreDigest::SecondaryPlain(_) => {
				if epoch.config.secondary_slots == 0 {
					return Err(Error::SecondarySlotsDisabled);
				}
				if secondary_slot_author(&epoch.randomness, slot, epoch.authorities.len())
					!= Some(authority_index)
				{
					return Err(Error::WrongSecondaryAuthor(authority_index, slot));
				}
			},
		}

		Ok(VerifiedHeader { pre_digest, epoch_entry, pre_header })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::authorship::claim_slot;
	use codec::Encode;
	use spindle_consensus_primitives::babe::BabeConfiguration;
	use spindle_executor::CODE_KEY;
	use spindle_primitives::{Digest, Hash, Keyring};

	fn backend(threshold: u128) -> Arc<Backend> {
		let backend = Backend::new_in_memory(vec![(CODE_KEY.to_vec(), b"code".to_vec())]).unwrap();
		backend.initialize_genesis_epoch(&BabeConfiguration {
			slot_duration: 1_000,
			epoch_length: 100,
			threshold,
			authorities: vec![
				(Keyring::Alice.sr25519_public(), 1),
				(Keyring::Bob.sr25519_public(), 1),
			],
			randomness: [3; 32],
			secondary_slots: 1,
		});
		backend
	}

	fn sealed_header(backend: &Backend, slot: u64, keyring: Keyring) -> Header {
		let genesis = backend.blockchain.genesis_hash();
		let entry = backend.epochs.epoch_for_child(&genesis, slot.into()).unwrap();
		let pair = keyring.sr25519_pair();
		let pre_digest = claim_slot(&entry.current, slot.into(), &pair).expect("claimable slot");

		let mut header = Header {
			parent_hash: genesis,
			number: 1,
			state_root: Hash::repeat_byte(1),
			extrinsics_root: Hash::repeat_byte(2),
			digest: Digest {
				logs: vec![DigestItem::PreRuntime(BABE_ENGINE_ID, pre_digest.encode())],
			},
		};
		let seal = pair.sign(header.hash().as_bytes());
		header.digest.push(DigestItem::Seal(BABE_ENGINE_ID, seal.encode()));
		header
	}

	#[test]
	fn well_formed_header_verifies() {
		let backend = backend(u128::MAX);
		let verifier = BabeVerifier::new(backend.clone());
		let header = sealed_header(&backend, 1_000, Keyring::Alice);

		let verified = verifier.verify_header(&header).unwrap();
		assert!(verified.pre_digest.is_primary());
		assert_eq!(verified.pre_header.digest.logs().len(), 1);
		assert_eq!(verified.epoch_entry.current.epoch_index, 0);
	}

	#[test]
	fn tampered_seal_is_rejected() {
		let backend = backend(u128::MAX);
		let verifier = BabeVerifier::new(backend.clone());
		let mut header = sealed_header(&backend, 1_000, Keyring::Alice);
		// Change the header after sealing.
		header.state_root = Hash::repeat_byte(9);
		assert!(matches!(verifier.verify_header(&header), Err(Error::BadSeal(_))));
	}

	#[test]
	fn unsealed_header_is_rejected() {
		let backend = backend(u128::MAX);
		let verifier = BabeVerifier::new(backend.clone());
		let mut header = sealed_header(&backend, 1_000, Keyring::Alice);
		header.digest.pop();
		// The remaining last digest is the pre-runtime item, not a seal.
		assert!(matches!(verifier.verify_header(&header), Err(Error::Unsealed(_))));
	}

	#[test]
	fn missing_pre_digest_is_rejected() {
		let backend = backend(u128::MAX);
		let verifier = BabeVerifier::new(backend.clone());
		let header = Header {
			parent_hash: backend.blockchain.genesis_hash(),
			number: 1,
			state_root: Hash::zero(),
			extrinsics_root: Hash::zero(),
			digest: Digest::default(),
		};
		assert!(matches!(verifier.verify_header(&header), Err(Error::MissingPreDigest)));
	}

	#[test]
	fn unknown_parent_is_rejected() {
		let backend = backend(u128::MAX);
		let verifier = BabeVerifier::new(backend.clone());
		let mut header = sealed_header(&backend, 1_000, Keyring::Alice);
		header.parent_hash = Hash::repeat_byte(0xaa);
		assert!(matches!(verifier.verify_header(&header), Err(Error::UnknownParent(_))));
	}

	#[test]
	fn primary_claim_under_zero_threshold_is_rejected() {
		// Author with max threshold, verify against a chain whose genesis
		// config sets the threshold to zero.
		let authoring = backend(u128::MAX);
		let header = sealed_header(&authoring, 1_000, Keyring::Alice);

		let verifying = backend(0);
		let verifier = BabeVerifier::new(verifying);
		assert!(matches!(verifier.verify_header(&header), Err(Error::BadVrf(_))));
	}
}
