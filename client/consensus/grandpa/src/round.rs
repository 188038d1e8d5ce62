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

//! Vote accounting for a single round.

use spindle_consensus_primitives::grandpa::{
	supermajority_threshold, AuthorityId, AuthorityList, AuthorityWeight, Message, Precommit,
	Prevote, RoundNumber, SetId, SignedMessage, SignedPrecommit,
};
use spindle_primitives::{BlockNumber, Hash};
use std::collections::HashMap;

const LOG_TARGET: &str = "grandpa";

/// The ancestry queries vote accounting needs.
pub trait ChainLookup: Send + Sync {
	/// The number of a known block.
	fn number(&self, hash: &Hash) -> Option<BlockNumber>;
	/// The parent of a known block.
	fn parent(&self, hash: &Hash) -> Option<Hash>;
	/// Whether `descendant` is `ancestor` or descends from it.
	fn is_descendant_of(&self, ancestor: &Hash, descendant: &Hash) -> bool;
}

impl ChainLookup for spindle_state::BlockTree {
	fn number(&self, hash: &Hash) -> Option<BlockNumber> {
		self.header(hash).map(|h| h.number)
	}

	fn parent(&self, hash: &Hash) -> Option<Hash> {
		let header = self.header(hash)?;
		(header.number > 0).then_some(header.parent_hash)
	}

	fn is_descendant_of(&self, ancestor: &Hash, descendant: &Hash) -> bool {
		spindle_state::BlockTree::is_descendant_of(self, ancestor, descendant)
	}
}

/// A weighted voter set.
#[derive(Clone, Debug)]
pub struct VoterSet {
	authorities: AuthorityList,
	total_weight: AuthorityWeight,
}

impl VoterSet {
	/// Build a voter set from an authority list.
	pub fn new(authorities: AuthorityList) -> Self {
		let total_weight = authorities.iter().map(|(_, weight)| *weight).sum();
		Self { authorities, total_weight }
	}

	/// The weight of the given voter, if a member.
	pub fn weight_of(&self, id: &AuthorityId) -> Option<AuthorityWeight> {
		self.authorities.iter().find(|(voter, _)| voter == id).map(|(_, weight)| *weight)
	}

	/// Whether the given id is a voter.
	pub fn contains(&self, id: &AuthorityId) -> bool {
		self.weight_of(id).is_some()
	}

	/// The total voting weight.
	pub fn total_weight(&self) -> AuthorityWeight {
		self.total_weight
	}

	/// The supermajority threshold of this set.
	pub fn threshold(&self) -> AuthorityWeight {
		supermajority_threshold(self.total_weight)
	}
}

/// Why a vote was not imported.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum VoteError {
	/// The vote is for another round.
	#[error("vote is for a different round")]
	WrongRound,
	/// The vote is for another authority set.
	#[error("vote is for a different set id")]
	WrongSetId,
	/// The signer is not a voter of this set.
	#[error("signer is not a voter")]
	NotAVoter,
	/// The signature does not verify.
	#[error("bad vote signature")]
	BadSignature,
}

/// The votes of one round.
pub struct RoundState {
	round: RoundNumber,
	set_id: SetId,
	voters: VoterSet,
	prevotes: HashMap<AuthorityId, Prevote>,
	precommits: HashMap<AuthorityId, SignedPrecommit>,
}

impl RoundState {
	/// Start accounting for the given round.
	pub fn new(round: RoundNumber, set_id: SetId, voters: VoterSet) -> Self {
		Self { round, set_id, voters, prevotes: HashMap::new(), precommits: HashMap::new() }
	}

	/// The round number.
	pub fn round(&self) -> RoundNumber {
		self.round
	}

	/// The voter set of the round.
	pub fn voters(&self) -> &VoterSet {
		&self.voters
	}

	/// Import a signed vote. Returns whether it was new. Votes carrying
	/// the wrong round or set id are rejected, as are non-voters and bad
	/// signatures; a second differing vote from the same voter is ignored
	/// and logged as an equivocation.
	pub fn import_vote(&mut self, signed: &SignedMessage) -> Result<bool, VoteError> {
		if signed.round != self.round {
			return Err(VoteError::WrongRound);
		}
		if signed.set_id != self.set_id {
			return Err(VoteError::WrongSetId);
		}
		if !self.voters.contains(&signed.id) {
			return Err(VoteError::NotAVoter);
		}
		if !signed.check_signature() {
			return Err(VoteError::BadSignature);
		}

		match signed.message {
			Message::Prevote(prevote) => match self.prevotes.get(&signed.id) {
				None => {
					self.prevotes.insert(signed.id, prevote);
					Ok(true)
				},
				Some(existing) if *existing == prevote => Ok(false),
				Some(_) => {
					log::warn!(
						target: LOG_TARGET,
						"voter {:?} equivocated in prevote of round {}",
						signed.id,
						self.round,
					);
					Ok(false)
				},
			},
			Message::Precommit(precommit) => match self.precommits.get(&signed.id) {
				None => {
					self.precommits.insert(
						signed.id,
						SignedPrecommit { precommit, signature: signed.signature, id: signed.id },
					);
					Ok(true)
				},
				Some(existing) if existing.precommit == precommit => Ok(false),
				Some(_) => {
					log::warn!(
						target: LOG_TARGET,
						"voter {:?} equivocated in precommit of round {}",
						signed.id,
						self.round,
					);
					Ok(false)
				},
			},
		}
	}

	/// The accumulated prevote weight.
	pub fn prevote_weight(&self) -> AuthorityWeight {
		self.prevotes.keys().filter_map(|id| self.voters.weight_of(id)).sum()
	}

	/// The accumulated precommit weight.
	pub fn precommit_weight(&self) -> AuthorityWeight {
		self.precommits.keys().filter_map(|id| self.voters.weight_of(id)).sum()
	}

	/// The prevote-GHOST: the deepest block whose descendant set (itself
	/// included) carries a supermajority of prevote weight.
	pub fn prevote_ghost(&self, chain: &dyn ChainLookup) -> Option<(Hash, BlockNumber)> {
		let votes = self
			.prevotes
			.iter()
			.map(|(id, vote)| (*id, vote.target_hash));
		Self::ghost(votes, &self.voters, chain)
	}

	/// The deepest block supported by a supermajority of precommit
	/// weight.
	pub fn precommit_target(&self, chain: &dyn ChainLookup) -> Option<(Hash, BlockNumber)> {
		let votes = self
			.precommits
			.iter()
			.map(|(id, signed)| (*id, signed.precommit.target_hash));
		Self::ghost(votes, &self.voters, chain)
	}

	fn ghost(
		votes: impl Iterator<Item = (AuthorityId, Hash)>,
		voters: &VoterSet,
		chain: &dyn ChainLookup,
	) -> Option<(Hash, BlockNumber)> {
		// Push every vote's weight onto the target and all its ancestors.
		let mut cumulative: HashMap<Hash, AuthorityWeight> = HashMap::new();
		for (id, target) in votes {
			let Some(weight) = voters.weight_of(&id) else { continue };
			let mut current = Some(target);
			while let Some(block) = current {
				if chain.number(&block).is_none() {
					break;
				}
				*cumulative.entry(block).or_default() += weight;
				current = chain.parent(&block);
			}
		}

		cumulative
			.into_iter()
			.filter(|(_, weight)| *weight >= voters.threshold())
			.filter_map(|(hash, _)| chain.number(&hash).map(|number| (hash, number)))
			.max_by_key(|(hash, number)| (*number, std::cmp::Reverse(*hash)))
	}

	/// The precommits proving finality of `target`: every imported
	/// precommit whose target is `target` or one of its descendants.
	pub fn finality_precommits(
		&self,
		target: &Hash,
		chain: &dyn ChainLookup,
	) -> Vec<SignedPrecommit> {
		self.precommits
			.values()
			.filter(|signed| chain.is_descendant_of(target, &signed.precommit.target_hash))
			.cloned()
			.collect()
	}
}
