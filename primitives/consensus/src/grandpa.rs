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

//! Primitives for GRANDPA: authority sets, consensus logs, vote messages
//! and justifications.

use codec::{Decode, Encode};
use spindle_primitives::{ed25519, BlockNumber, ConsensusEngineId, Hash};

/// The `ConsensusEngineId` of GRANDPA.
pub const GRANDPA_ENGINE_ID: ConsensusEngineId = *b"FRNK";

/// A GRANDPA authority identifier.
pub type AuthorityId = ed25519::Public;

/// A GRANDPA authority signature.
pub type AuthoritySignature = ed25519::Signature;

/// The weight of an authority.
pub type AuthorityWeight = u64;

/// The monotonic identifier of a GRANDPA authority set.
pub type SetId = u64;

/// The round indicator.
pub type RoundNumber = u64;

/// A list of GRANDPA authorities with associated weights.
pub type AuthorityList = Vec<(AuthorityId, AuthorityWeight)>;

/// A scheduled change of authority set.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct ScheduledChange {
	/// The new authorities after the change, along with their respective
	/// weights.
	pub next_authorities: AuthorityList,
	/// The number of blocks to delay.
	pub delay: BlockNumber,
}

/// A GRANDPA consensus digest, emitted by the runtime.
///
/// The variant indices are part of the wire format and must not change.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum ConsensusLog {
	/// Schedule an authority set change after the given delay of finalized
	/// blocks.
	#[codec(index = 1)]
	ScheduledChange(ScheduledChange),
	/// Force an authority set change. The first element is the
	/// best-finalized block at the time the change was signalled; the
	/// delay is applied from there, overriding any pending standard
	/// changes at greater depths.
	#[codec(index = 2)]
	ForcedChange(BlockNumber, ScheduledChange),
	/// An authority with the given index got disabled.
	#[codec(index = 3)]
	OnDisabled(u64),
	/// Pause voting after the given delay.
	#[codec(index = 4)]
	Pause(BlockNumber),
	/// Resume voting after the given delay.
	#[codec(index = 5)]
	Resume(BlockNumber),
}

/// A prevote for a block and its ancestors.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct Prevote {
	/// The target block's hash.
	pub target_hash: Hash,
	/// The target block's number.
	pub target_number: BlockNumber,
}

/// A precommit for a block and its ancestors.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct Precommit {
	/// The target block's hash.
	pub target_hash: Hash,
	/// The target block's number.
	pub target_number: BlockNumber,
}

/// A vote message, the body of what gets signed and gossiped.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub enum Message {
	/// A prevote.
	#[codec(index = 0)]
	Prevote(Prevote),
	/// A precommit.
	#[codec(index = 1)]
	Precommit(Precommit),
}

impl Message {
	/// The target of the vote.
	pub fn target(&self) -> (Hash, BlockNumber) {
		match self {
			Self::Prevote(v) => (v.target_hash, v.target_number),
			Self::Precommit(v) => (v.target_hash, v.target_number),
		}
	}
}

/// Encode the payload that gets signed for a vote: the message localized
/// to a round and an authority-set id. Votes from other sets or rounds
/// never verify.
pub fn localized_payload(round: RoundNumber, set_id: SetId, message: &Message) -> Vec<u8> {
	(message, round, set_id).encode()
}

/// A vote message together with its signature and origin, localized to a
/// round and set id.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct SignedMessage {
	/// The round this vote belongs to.
	pub round: RoundNumber,
	/// The authority-set id this vote belongs to.
	pub set_id: SetId,
	/// The vote itself.
	pub message: Message,
	/// The signature over [`localized_payload`].
	pub signature: AuthoritySignature,
	/// The voter.
	pub id: AuthorityId,
}

impl SignedMessage {
	/// Sign a vote message.
	pub fn sign(
		pair: &ed25519::Pair,
		round: RoundNumber,
		set_id: SetId,
		message: Message,
	) -> Self {
		let signature = pair.sign(&localized_payload(round, set_id, &message));
		Self { round, set_id, message, signature, id: pair.public() }
	}

	/// Verify the signature against the claimed voter.
	pub fn check_signature(&self) -> bool {
		self.id
			.verify(&localized_payload(self.round, self.set_id, &self.message), &self.signature)
	}
}

/// A precommit with its signature and origin, as carried inside commits
/// and justifications.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct SignedPrecommit {
	/// The precommit.
	pub precommit: Precommit,
	/// The signature over [`localized_payload`].
	pub signature: AuthoritySignature,
	/// The voter.
	pub id: AuthorityId,
}

/// A commit: a target block together with the precommits proving its
/// finality.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct Commit {
	/// The finalized block's hash.
	pub target_hash: Hash,
	/// The finalized block's number.
	pub target_number: BlockNumber,
	/// Precommits by voters holding more than two thirds of the total
	/// weight, each targeting the block or one of its descendants.
	pub precommits: Vec<SignedPrecommit>,
}

/// A commit localized to a round and set id, as gossiped between voters.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct CommitMessage {
	/// The round the commit was created in.
	pub round: RoundNumber,
	/// The authority-set id the commit belongs to.
	pub set_id: SetId,
	/// The commit itself.
	pub commit: Commit,
}

/// A GRANDPA justification as persisted alongside a finalized block and
/// served to light clients.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct GrandpaJustification {
	/// The round the proof was created in.
	pub round: RoundNumber,
	/// The commit proving finality of the target.
	pub commit: Commit,
}

/// The smallest weight that is strictly more than two thirds of `total`.
pub fn supermajority_threshold(total: AuthorityWeight) -> AuthorityWeight {
	total - total.saturating_sub(1) / 3
}

/// A vote message or a commit, as carried by the GRANDPA gossip protocol.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum GossipMessage {
	/// A round-local vote.
	#[codec(index = 0)]
	Vote(SignedMessage),
	/// A commit finalizing a block.
	#[codec(index = 1)]
	Commit(CommitMessage),
}
