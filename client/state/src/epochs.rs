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

//! The fork-aware epoch index.
//!
//! Every block carries an entry describing the epoch it lives in and the
//! announcement state for the next one. A child's entry starts as a copy
//! derived from its parent and is then updated from the child's digests,
//! so resolving the epoch of any block never walks further than its own
//! entry. This keeps the invariant that an epoch descriptor is always the
//! one announced by the nearest announcing ancestor.

use crate::Error;
use parking_lot::RwLock;
use spindle_consensus_primitives::{
	babe::{
		AuthorityIndex, BabeConfiguration, BabeEpochConfiguration, Epoch, NextConfigDescriptor,
		NextEpochDescriptor,
	},
	Slot,
};
use spindle_primitives::Hash;
use std::{collections::HashMap, sync::Arc};

const LOG_TARGET: &str = "epochs";

/// The epoch bookkeeping attached to one block.
#[derive(Clone, Debug)]
pub struct EpochEntry {
	/// The epoch the block belongs to.
	pub current: Arc<Epoch>,
	/// The next-epoch announcement seen on this chain for
	/// `current.epoch_index + 1`, if any.
	pub pending_next: Option<NextEpochDescriptor>,
	/// A configuration override for the next epoch, if announced.
	pub pending_config: Option<NextConfigDescriptor>,
	/// Authorities disabled for the remainder of the epoch.
	pub disabled: Vec<AuthorityIndex>,
	/// Whether the epoch window is not yet anchored to a slot. Only the
	/// genesis entry is unanchored; the first block on top of it fixes
	/// the start slot.
	pub unanchored: bool,
}

/// The per-block epoch index.
pub struct EpochIndex {
	entries: RwLock<HashMap<Hash, EpochEntry>>,
}

impl Default for EpochIndex {
	fn default() -> Self {
		Self { entries: RwLock::new(HashMap::new()) }
	}
}

impl EpochIndex {
	/// Create an empty index.
	pub fn new() -> Self {
		Self::default()
	}

	/// Install the genesis entry from the runtime's configuration.
	pub fn set_genesis(&self, genesis_hash: Hash, config: &BabeConfiguration) {
		let entry = EpochEntry {
			current: Arc::new(config.genesis_epoch(0.into())),
			pending_next: None,
			pending_config: None,
			disabled: Vec::new(),
			unanchored: true,
		};
		self.entries.write().insert(genesis_hash, entry);
	}

	/// The entry of a known block.
	pub fn entry(&self, hash: &Hash) -> Option<EpochEntry> {
		self.entries.read().get(hash).cloned()
	}

	/// Attach an entry to a block.
	pub fn insert(&self, hash: Hash, entry: EpochEntry) {
		self.entries.write().insert(hash, entry);
	}

	/// Drop entries of pruned blocks.
	pub fn prune(&self, removed: &[Hash]) {
		let mut entries = self.entries.write();
		for hash in removed {
			entries.remove(hash);
		}
	}

	/// Resolve the epoch a child of `parent` claiming `slot` belongs to,
	/// together with the entry prototype the child starts from. The
	/// prototype still has to be updated from the child's own digests and
	/// inserted.
	pub fn epoch_for_child(&self, parent: &Hash, slot: Slot) -> Result<EpochEntry, Error> {
		let parent_entry = self
			.entry(parent)
			.ok_or(Error::MissingEpochData(*parent))?;

		if parent_entry.unanchored {
			// First block of the chain anchors the genesis epoch.
			let mut epoch = (*parent_entry.current).clone();
			epoch.start_slot = slot;
			return Ok(EpochEntry {
				current: Arc::new(epoch),
				pending_next: None,
				pending_config: None,
				disabled: Vec::new(),
				unanchored: false,
			});
		}

		if slot < parent_entry.current.start_slot {
			return Err(Error::SlotBeforeEpoch(slot));
		}

		if parent_entry.current.contains_slot(slot) {
			return Ok(EpochEntry {
				current: parent_entry.current.clone(),
				pending_next: parent_entry.pending_next.clone(),
				pending_config: parent_entry.pending_config.clone(),
				disabled: parent_entry.disabled.clone(),
				unanchored: false,
			});
		}

		// The child is the first block of a later epoch.
		let mut epoch = (*parent_entry.current).clone();
		let mut pending_next = parent_entry.pending_next.clone();
		let mut pending_config = parent_entry.pending_config.clone();
		while !epoch.contains_slot(slot) {
			let next_start = epoch.end_slot();
			match pending_next.take() {
				Some(descriptor) => {
					epoch = Epoch {
						epoch_index: epoch.epoch_index + 1,
						start_slot: next_start,
						duration: epoch.duration,
						authorities: descriptor.authorities,
						randomness: descriptor.randomness,
						config: match pending_config.take() {
							Some(config) => BabeEpochConfiguration {
								threshold: config.threshold,
								secondary_slots: config.secondary_slots,
							},
							None => epoch.config,
						},
					};
				},
				None => {
					// No announcement on this chain: carry the current
					// descriptor forward. Development chains with a single
					// well-known authority rely on this.
					log::trace!(
						target: LOG_TARGET,
						"no next-epoch announcement below epoch {}, reusing its descriptor",
						epoch.epoch_index + 1,
					);
					epoch = Epoch {
						epoch_index: epoch.epoch_index + 1,
						start_slot: next_start,
						..epoch
					};
				},
			}
		}

		Ok(EpochEntry {
			current: Arc::new(epoch),
			pending_next: None,
			pending_config: None,
			disabled: Vec::new(),
			unanchored: false,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use spindle_primitives::Keyring;

	fn config() -> BabeConfiguration {
		BabeConfiguration {
			slot_duration: 1_000,
			epoch_length: 10,
			threshold: u128::MAX,
			authorities: vec![(Keyring::Alice.sr25519_public(), 1)],
			randomness: [1; 32],
			secondary_slots: 1,
		}
	}

	#[test]
	fn genesis_epoch_is_anchored_by_the_first_block() {
		let index = EpochIndex::new();
		let genesis = Hash::repeat_byte(1);
		index.set_genesis(genesis, &config());

		let entry = index.epoch_for_child(&genesis, 1234.into()).unwrap();
		assert_eq!(entry.current.epoch_index, 0);
		assert_eq!(entry.current.start_slot, 1234.into());
		assert!(!entry.unanchored);
		assert!(entry.current.contains_slot(1243.into()));
	}

	#[test]
	fn same_epoch_keeps_the_descriptor() {
		let index = EpochIndex::new();
		let genesis = Hash::repeat_byte(1);
		index.set_genesis(genesis, &config());

		let first = index.epoch_for_child(&genesis, 100.into()).unwrap();
		let block1 = Hash::repeat_byte(2);
		index.insert(block1, first.clone());

		let second = index.epoch_for_child(&block1, 105.into()).unwrap();
		assert_eq!(second.current.epoch_index, 0);
		assert_eq!(second.current.start_slot, first.current.start_slot);
	}

	#[test]
	fn announced_descriptor_takes_over_at_the_boundary() {
		let index = EpochIndex::new();
		let genesis = Hash::repeat_byte(1);
		index.set_genesis(genesis, &config());

		let mut entry = index.epoch_for_child(&genesis, 100.into()).unwrap();
		entry.pending_next = Some(NextEpochDescriptor {
			authorities: vec![(Keyring::Bob.sr25519_public(), 1)],
			randomness: [9; 32],
		});
		let block1 = Hash::repeat_byte(2);
		index.insert(block1, entry);

		// Slot 110 is past the 10-slot epoch starting at 100.
		let next = index.epoch_for_child(&block1, 110.into()).unwrap();
		assert_eq!(next.current.epoch_index, 1);
		assert_eq!(next.current.start_slot, 110.into());
		assert_eq!(next.current.randomness, [9; 32]);
		assert_eq!(next.current.authorities, vec![(Keyring::Bob.sr25519_public(), 1)]);
		// The announcement is consumed.
		assert!(next.pending_next.is_none());
	}

	#[test]
	fn missing_announcement_carries_the_descriptor_forward() {
		let index = EpochIndex::new();
		let genesis = Hash::repeat_byte(1);
		index.set_genesis(genesis, &config());

		let entry = index.epoch_for_child(&genesis, 100.into()).unwrap();
		let block1 = Hash::repeat_byte(2);
		index.insert(block1, entry);

		// Several epochs elapse without blocks.
		let next = index.epoch_for_child(&block1, 135.into()).unwrap();
		assert_eq!(next.current.epoch_index, 3);
		assert_eq!(next.current.start_slot, 130.into());
		assert_eq!(next.current.authorities, config().authorities);
	}

	#[test]
	fn slot_before_the_epoch_is_rejected() {
		let index = EpochIndex::new();
		let genesis = Hash::repeat_byte(1);
		index.set_genesis(genesis, &config());

		let entry = index.epoch_for_child(&genesis, 100.into()).unwrap();
		let block1 = Hash::repeat_byte(2);
		index.insert(block1, entry);

		assert!(matches!(
			index.epoch_for_child(&block1, 99.into()),
			Err(Error::SlotBeforeEpoch(_))
		));
	}
}
