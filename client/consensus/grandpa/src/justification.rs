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

//! Building and verifying finality justifications.

use crate::{round::ChainLookup, Error, VoterSet};
use codec::DecodeAll;
use spindle_consensus_primitives::grandpa::{
	localized_payload, Commit, GrandpaJustification, Message, RoundNumber, SetId,
	SignedPrecommit,
};
use spindle_primitives::{BlockNumber, Hash};
use std::collections::HashSet;

/// Assemble a justification from the precommits collected in a round.
pub fn build_justification(
	round: RoundNumber,
	target_hash: Hash,
	target_number: BlockNumber,
	precommits: Vec<SignedPrecommit>,
) -> GrandpaJustification {
	GrandpaJustification {
		round,
		commit: Commit { target_hash, target_number, precommits },
	}
}

/// Decode and verify a justification for the given target under the given
/// authority set.
pub fn decode_and_verify_justification(
	encoded: &[u8],
	target_hash: Hash,
	target_number: BlockNumber,
	set_id: SetId,
	voters: &VoterSet,
	chain: &dyn ChainLookup,
) -> Result<GrandpaJustification, Error> {
	let justification = GrandpaJustification::decode_all(&mut &*encoded)
		.map_err(|e| Error::BadJustification(format!("malformed: {e}")))?;
	verify_justification(&justification, target_hash, target_number, set_id, voters, chain)?;
	Ok(justification)
}

/// Verify a justification: the commit must name the target, and the
/// precommits must reach a supermajority of valid voter signatures, every
/// one targeting the target block or one of its descendants.
pub fn verify_justification(
	justification: &GrandpaJustification,
	target_hash: Hash,
	target_number: BlockNumber,
	set_id: SetId,
	voters: &VoterSet,
	chain: &dyn ChainLookup,
) -> Result<(), Error> {
	let commit = &justification.commit;
	if commit.target_hash != target_hash || commit.target_number != target_number {
		return Err(Error::BadJustification("commit names a different target".into()));
	}

	let mut seen: HashSet<_> = HashSet::new();
	let mut weight = 0;
	for signed in &commit.precommits {
		let Some(voter_weight) = voters.weight_of(&signed.id) else {
			return Err(Error::BadJustification("precommit by a non-voter".into()));
		};
		if !seen.insert(signed.id) {
			return Err(Error::BadJustification("duplicate precommit voter".into()));
		}
		let payload =
			localized_payload(justification.round, set_id, &Message::Precommit(signed.precommit));
		if !signed.id.verify(&payload, &signed.signature) {
			return Err(Error::BadJustification("invalid precommit signature".into()));
		}
		if !chain.is_descendant_of(&target_hash, &signed.precommit.target_hash) {
			return Err(Error::BadJustification(
				"precommit target is not a descendant of the finalized block".into(),
			));
		}
		weight += voter_weight;
	}

	if weight < voters.threshold() {
		return Err(Error::BadJustification(format!(
			"insufficient weight {weight}, need {}",
			voters.threshold(),
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::round::tests::{voters, TestChain};
	use codec::Encode;
	use spindle_consensus_primitives::grandpa::Precommit;
	use spindle_primitives::Keyring;

	fn signed_precommit(
		key: Keyring,
		round: RoundNumber,
		set_id: SetId,
		target: u8,
	) -> SignedPrecommit {
		let precommit = Precommit {
			target_hash: Hash::repeat_byte(target),
			target_number: target as BlockNumber,
		};
		let payload = localized_payload(round, set_id, &Message::Precommit(precommit));
		let pair = key.ed25519_pair();
		SignedPrecommit { precommit, signature: pair.sign(&payload), id: pair.public() }
	}

	fn test_justification(keys: &[Keyring], target: u8, vote_target: u8) -> GrandpaJustification {
		build_justification(
			1,
			Hash::repeat_byte(target),
			target as BlockNumber,
			keys.iter().map(|k| signed_precommit(*k, 1, 0, vote_target)).collect(),
		)
	}

	const TRIO: &[Keyring] = &[Keyring::Alice, Keyring::Bob, Keyring::Charlie];

	#[test]
	fn valid_justification_verifies_and_roundtrips() {
		let chain = TestChain::linear(5);
		let justification = test_justification(TRIO, 2, 4);
		verify_justification(&justification, Hash::repeat_byte(2), 2, 0, &voters(TRIO), &chain)
			.unwrap();

		let encoded = justification.encode();
		let decoded = decode_and_verify_justification(
			&encoded,
			Hash::repeat_byte(2),
			2,
			0,
			&voters(TRIO),
			&chain,
		)
		.unwrap();
		assert_eq!(decoded, justification);
	}

	#[test]
	fn wrong_target_is_rejected() {
		let chain = TestChain::linear(5);
		let justification = test_justification(TRIO, 2, 4);
		assert!(verify_justification(
			&justification,
			Hash::repeat_byte(3),
			3,
			0,
			&voters(TRIO),
			&chain,
		)
		.is_err());
	}

	#[test]
	fn wrong_set_id_is_rejected() {
		let chain = TestChain::linear(5);
		let justification = test_justification(TRIO, 2, 4);
		assert!(verify_justification(
			&justification,
			Hash::repeat_byte(2),
			2,
			1,
			&voters(TRIO),
			&chain,
		)
		.is_err());
	}

	#[test]
	fn insufficient_weight_is_rejected() {
		let chain = TestChain::linear(5);
		// Only two of three voters signed.
		let justification = test_justification(&[Keyring::Alice, Keyring::Bob], 2, 4);
		assert!(verify_justification(
			&justification,
			Hash::repeat_byte(2),
			2,
			0,
			&voters(TRIO),
			&chain,
		)
		.is_err());
	}

	#[test]
	fn precommit_off_the_finalized_chain_is_rejected() {
		let chain = TestChain::linear(5);
		// Precommits target block 1, which is an ancestor, not a
		// descendant, of block 2.
		let justification = test_justification(TRIO, 2, 1);
		assert!(verify_justification(
			&justification,
			Hash::repeat_byte(2),
			2,
			0,
			&voters(TRIO),
			&chain,
		)
		.is_err());
	}

	#[test]
	fn duplicate_voters_are_rejected() {
		let chain = TestChain::linear(5);
		let mut justification = test_justification(TRIO, 2, 4);
		let dup = justification.commit.precommits[0].clone();
		justification.commit.precommits.push(dup);
		assert!(verify_justification(
			&justification,
			Hash::repeat_byte(2),
			2,
			0,
			&voters(TRIO),
			&chain,
		)
		.is_err());
	}

	#[test]
	fn non_voter_signature_is_rejected() {
		let chain = TestChain::linear(5);
		let justification = test_justification(&[Keyring::Alice, Keyring::Bob, Keyring::Eve], 2, 4);
		assert!(verify_justification(
			&justification,
			Hash::repeat_byte(2),
			2,
			0,
			&voters(TRIO),
			&chain,
		)
		.is_err());
	}
}
