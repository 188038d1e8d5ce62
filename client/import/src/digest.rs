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

//! The digest handler.
//!
//! Consensus digests are handled in header order: BABE logs update the
//! block's epoch entry, GRANDPA logs feed the shared authority set's
//! pending-change queue.

use spindle_consensus_primitives::{babe, grandpa};
use spindle_grandpa::SharedAuthoritySet;
use spindle_primitives::Header;
use spindle_state::EpochEntry;

const LOG_TARGET: &str = "digest";

/// Parses the consensus digests of an imported block.
pub struct DigestHandler;

impl DigestHandler {
	/// Apply the consensus digests of `header` to the block's epoch entry
	/// (starting from the prototype derived from its parent) and to the
	/// GRANDPA pending-change queue. Returns the finished epoch entry to
	/// attach to the block.
	pub fn handle(
		header: &Header,
		mut entry: EpochEntry,
		authority_set: &SharedAuthoritySet,
	) -> EpochEntry {
		let number = header.number;
		for log in header.digest.logs() {
			if let Some(babe_log) =
				log.consensus_try_to::<babe::ConsensusLog>(babe::BABE_ENGINE_ID)
			{
				match babe_log {
					babe::ConsensusLog::NextEpochData(descriptor) => {
						log::debug!(
							target: LOG_TARGET,
							"block {number} announces epoch {}",
							entry.current.epoch_index + 1,
						);
						entry.pending_next = Some(descriptor);
					},
					babe::ConsensusLog::OnDisabled(authority_index) => {
						log::info!(
							target: LOG_TARGET,
							"BABE authority {authority_index} disabled at block {number}",
						);
						if !entry.disabled.contains(&authority_index) {
							entry.disabled.push(authority_index);
						}
					},
					babe::ConsensusLog::NextConfigData(config) => {
						entry.pending_config = Some(config);
					},
				}
			} else if let Some(grandpa_log) =
				log.consensus_try_to::<grandpa::ConsensusLog>(grandpa::GRANDPA_ENGINE_ID)
			{
				match grandpa_log {
					grandpa::ConsensusLog::ScheduledChange(change) => {
						authority_set.with_mut(|set| {
							set.schedule_standard_change(
								change.next_authorities,
								number + change.delay,
							)
						});
					},
					grandpa::ConsensusLog::ForcedChange(best_finalized, change) => {
						authority_set.with_mut(|set| {
							set.schedule_forced_change(
								change.next_authorities,
								best_finalized + change.delay,
							)
						});
					},
					grandpa::ConsensusLog::OnDisabled(authority_index) => {
						authority_set.with_mut(|set| set.disable_authority(authority_index));
					},
					grandpa::ConsensusLog::Pause(delay) => {
						authority_set.with_mut(|set| set.schedule_pause(number + delay));
					},
					grandpa::ConsensusLog::Resume(delay) => {
						authority_set.with_mut(|set| set.schedule_resume(number + delay));
					},
				}
			}
		}
		entry
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use codec::Encode;
	use spindle_consensus_primitives::babe::BabeConfiguration;
	use spindle_grandpa::AuthoritySet;
	use spindle_primitives::{Digest, DigestItem, Hash, Keyring};
	use spindle_state::EpochIndex;

	fn prototype() -> EpochEntry {
		let index = EpochIndex::new();
		let genesis = Hash::repeat_byte(1);
		index.set_genesis(
			genesis,
			&BabeConfiguration {
				slot_duration: 1_000,
				epoch_length: 10,
				threshold: u128::MAX,
				authorities: vec![(Keyring::Alice.sr25519_public(), 1)],
				randomness: [0; 32],
				secondary_slots: 1,
			},
		);
		index.epoch_for_child(&genesis, 100.into()).unwrap()
	}

	fn header(number: u32, logs: Vec<DigestItem>) -> Header {
		Header {
			parent_hash: Hash::zero(),
			number,
			state_root: Hash::zero(),
			extrinsics_root: Hash::zero(),
			digest: Digest { logs },
		}
	}

	fn shared_set() -> SharedAuthoritySet {
		SharedAuthoritySet::new(AuthoritySet::genesis(vec![(
			Keyring::Alice.ed25519_public(),
			1,
		)]))
	}

	#[test]
	fn next_epoch_data_is_recorded() {
		let set = shared_set();
		let descriptor = babe::NextEpochDescriptor {
			authorities: vec![(Keyring::Bob.sr25519_public(), 1)],
			randomness: [5; 32],
		};
		let header = header(
			7,
			vec![DigestItem::Consensus(
				babe::BABE_ENGINE_ID,
				babe::ConsensusLog::NextEpochData(descriptor.clone()).encode(),
			)],
		);
		let entry = DigestHandler::handle(&header, prototype(), &set);
		assert_eq!(entry.pending_next, Some(descriptor));
	}

	#[test]
	fn scheduled_change_lands_in_the_pending_queue() {
		let set = shared_set();
		let change = grandpa::ScheduledChange {
			next_authorities: vec![(Keyring::Bob.ed25519_public(), 1)],
			delay: 3,
		};
		let header = header(
			10,
			vec![DigestItem::Consensus(
				grandpa::GRANDPA_ENGINE_ID,
				grandpa::ConsensusLog::ScheduledChange(change).encode(),
			)],
		);
		DigestHandler::handle(&header, prototype(), &set);

		// Effective at 10 + 3; finalizing 13 applies it.
		set.with_mut(|s| {
			assert!(!s.apply_finalized(12));
			assert!(s.apply_finalized(13));
		});
		assert_eq!(set.set_id(), 1);
		assert_eq!(set.current_authorities(), vec![(Keyring::Bob.ed25519_public(), 1)]);
	}

	#[test]
	fn forced_change_counts_from_the_signalled_base() {
		let set = shared_set();
		let change = grandpa::ScheduledChange {
			next_authorities: vec![(Keyring::Charlie.ed25519_public(), 1)],
			delay: 2,
		};
		let header = header(
			50,
			vec![DigestItem::Consensus(
				grandpa::GRANDPA_ENGINE_ID,
				grandpa::ConsensusLog::ForcedChange(20, change).encode(),
			)],
		);
		DigestHandler::handle(&header, prototype(), &set);
		// Effective at 20 + 2, well before the signalling block's height.
		set.with_mut(|s| assert!(s.apply_finalized(22)));
		assert_eq!(set.set_id(), 1);
	}

	#[test]
	fn pause_and_resume_are_scheduled_with_delay() {
		let set = shared_set();
		let header = header(
			5,
			vec![DigestItem::Consensus(
				grandpa::GRANDPA_ENGINE_ID,
				grandpa::ConsensusLog::Pause(2).encode(),
			)],
		);
		DigestHandler::handle(&header, prototype(), &set);
		set.with_mut(|s| {
			s.apply_finalized(6);
			assert!(!s.is_paused());
			s.apply_finalized(7);
			assert!(s.is_paused());
		});
	}

	#[test]
	fn babe_disabled_authorities_accumulate() {
		let set = shared_set();
		let header = header(
			5,
			vec![
				DigestItem::Consensus(
					babe::BABE_ENGINE_ID,
					babe::ConsensusLog::OnDisabled(2).encode(),
				),
				DigestItem::Consensus(
					babe::BABE_ENGINE_ID,
					babe::ConsensusLog::OnDisabled(2).encode(),
				),
			],
		);
		let entry = DigestHandler::handle(&header, prototype(), &set);
		assert_eq!(entry.disabled, vec![2]);
	}
}
