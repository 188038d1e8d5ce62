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

//! The append-only block tree: leaves, best-chain pointer, finalized
//! pointer and the primary-weight fork choice.

use crate::{
	columns,
	database::{Database, Transaction},
	Error,
};
use codec::{Decode, Encode};
use parking_lot::RwLock;
use spindle_consensus_primitives::Slot;
use spindle_primitives::{Block, BlockNumber, Hash, Header, OpaqueExtrinsic};
use std::{
	collections::{HashMap, HashSet, VecDeque},
	sync::Arc,
};

const LOG_TARGET: &str = "block-tree";

const META_BEST: &[u8] = b"best";
const META_FINALIZED: &[u8] = b"final";
const META_GENESIS: &[u8] = b"gen";

/// Per-block bookkeeping.
#[derive(Clone, Debug)]
pub struct BlockEntry {
	/// The block header.
	pub header: Header,
	/// Children imported so far.
	pub children: Vec<Hash>,
	/// Cumulative count of primary-slot blocks from genesis.
	pub primary_weight: u64,
	/// The slot claimed by the block's pre-runtime digest; `None` for
	/// genesis.
	pub slot: Option<Slot>,
}

struct TreeInner {
	blocks: HashMap<Hash, BlockEntry>,
	leaves: HashSet<Hash>,
	best: Hash,
	finalized: Hash,
	genesis: Hash,
}

/// The block tree.
pub struct BlockTree {
	db: Arc<dyn Database>,
	inner: RwLock<TreeInner>,
}

impl BlockTree {
	/// Create a tree containing only the given genesis header.
	pub fn new(db: Arc<dyn Database>, genesis: Header) -> Result<Self, Error> {
		let genesis_hash = genesis.hash();

		let mut tx = Transaction::new();
		tx.set(columns::HEADERS, genesis_hash.as_bytes().to_vec(), genesis.encode());
		tx.set(columns::META, META_BEST.to_vec(), genesis_hash.encode());
		tx.set(columns::META, META_FINALIZED.to_vec(), genesis_hash.encode());
		tx.set(columns::META, META_GENESIS.to_vec(), genesis_hash.encode());
		db.commit(tx).map_err(|e| Error::Database(e.to_string()))?;

		let entry =
			BlockEntry { header: genesis, children: Vec::new(), primary_weight: 0, slot: None };
		let mut blocks = HashMap::new();
		blocks.insert(genesis_hash, entry);

		Ok(Self {
			db,
			inner: RwLock::new(TreeInner {
				blocks,
				leaves: HashSet::from([genesis_hash]),
				best: genesis_hash,
				finalized: genesis_hash,
				genesis: genesis_hash,
			}),
		})
	}

	/// Insert a block whose parent is already in the tree. Returns whether
	/// it became the new best.
	pub fn insert(
		&self,
		header: Header,
		body: Vec<OpaqueExtrinsic>,
		is_primary: bool,
		slot: Slot,
	) -> Result<bool, Error> {
		let hash = header.hash();
		let mut inner = self.inner.write();

		if inner.blocks.contains_key(&hash) {
			return Err(Error::AlreadyInTree(hash));
		}
		let parent_weight = inner
			.blocks
			.get(&header.parent_hash)
			.ok_or(Error::UnknownBlock(header.parent_hash))?
			.primary_weight;

		let mut tx = Transaction::new();
		tx.set(columns::HEADERS, hash.as_bytes().to_vec(), header.encode());
		tx.set(columns::BODIES, hash.as_bytes().to_vec(), body.encode());

		let entry = BlockEntry {
			header: header.clone(),
			children: Vec::new(),
			primary_weight: parent_weight + u64::from(is_primary),
			slot: Some(slot),
		};
		inner.blocks.insert(hash, entry);
		inner
			.blocks
			.get_mut(&header.parent_hash)
			.expect("parent presence checked above; qed")
			.children
			.push(hash);
		inner.leaves.remove(&header.parent_hash);
		inner.leaves.insert(hash);

		let best = Self::select_best(&inner);
		let is_new_best = best != inner.best;
		if is_new_best {
			inner.best = best;
			tx.set(columns::META, META_BEST.to_vec(), best.encode());
		}
		self.db.commit(tx).map_err(|e| Error::Database(e.to_string()))?;

		log::trace!(
			target: LOG_TARGET,
			"inserted block {hash:?} number {} (new best: {is_new_best})",
			header.number,
		);
		Ok(is_new_best)
	}

	/// The fork-choice rule: the leaf with the greatest cumulative primary
	/// weight, ties broken by the greater number, then the
	/// lexicographically smaller hash.
	fn select_best(inner: &TreeInner) -> Hash {
		let mut best: Option<(u64, BlockNumber, Hash)> = None;
		for leaf in &inner.leaves {
			let entry = &inner.blocks[leaf];
			let key = (entry.primary_weight, entry.header.number, *leaf);
			best = Some(match best {
				None => key,
				Some(current) => {
					if (key.0, key.1) > (current.0, current.1)
						|| ((key.0, key.1) == (current.0, current.1) && key.2 < current.2)
					{
						key
					} else {
						current
					}
				},
			});
		}
		best.map(|(_, _, hash)| hash).expect("the tree always has a leaf; qed")
	}

	/// The header of a known block.
	pub fn header(&self, hash: &Hash) -> Option<Header> {
		self.inner.read().blocks.get(hash).map(|e| e.header.clone())
	}

	/// Per-block bookkeeping of a known block.
	pub fn entry(&self, hash: &Hash) -> Option<BlockEntry> {
		self.inner.read().blocks.get(hash).cloned()
	}

	/// Whether the block is in the tree.
	pub fn contains(&self, hash: &Hash) -> bool {
		self.inner.read().blocks.contains_key(hash)
	}

	/// The body of a block, from the database.
	pub fn body(&self, hash: &Hash) -> Option<Vec<OpaqueExtrinsic>> {
		let raw = self.db.get(columns::BODIES, hash.as_bytes())?;
		Decode::decode(&mut &raw[..]).ok()
	}

	/// The full block, if header and body are available.
	pub fn block(&self, hash: &Hash) -> Option<Block> {
		let header = self.header(hash)?;
		let extrinsics = if header.number == 0 { Vec::new() } else { self.body(hash)? };
		Some(Block { header, extrinsics })
	}

	/// The justification stored for a finalized block.
	pub fn justification(&self, hash: &Hash) -> Option<Vec<u8>> {
		self.db.get(columns::JUSTIFICATIONS, hash.as_bytes())
	}

	/// The hash of the best block.
	pub fn best_hash(&self) -> Hash {
		self.inner.read().best
	}

	/// The header of the best block.
	pub fn best_header(&self) -> Header {
		let inner = self.inner.read();
		inner.blocks[&inner.best].header.clone()
	}

	/// The hash of the last finalized block.
	pub fn finalized_hash(&self) -> Hash {
		self.inner.read().finalized
	}

	/// The header of the last finalized block.
	pub fn finalized_header(&self) -> Header {
		let inner = self.inner.read();
		inner.blocks[&inner.finalized].header.clone()
	}

	/// The genesis hash.
	pub fn genesis_hash(&self) -> Hash {
		self.inner.read().genesis
	}

	/// The current leaves of the tree.
	pub fn leaves(&self) -> Vec<Hash> {
		self.inner.read().leaves.iter().copied().collect()
	}

	/// Whether `descendant` is `ancestor` or one of its descendants.
	pub fn is_descendant_of(&self, ancestor: &Hash, descendant: &Hash) -> bool {
		let inner = self.inner.read();
		let Some(ancestor_number) = inner.blocks.get(ancestor).map(|e| e.header.number) else {
			return false;
		};
		let mut current = *descendant;
		loop {
			let Some(entry) = inner.blocks.get(&current) else { return false };
			if current == *ancestor {
				return true;
			}
			if entry.header.number <= ancestor_number {
				return false;
			}
			current = entry.header.parent_hash;
		}
	}

	/// The hash at `number` on the chain of `head`.
	pub fn ancestor_at_number(&self, head: &Hash, number: BlockNumber) -> Option<Hash> {
		let inner = self.inner.read();
		let mut current = *head;
		loop {
			let entry = inner.blocks.get(&current)?;
			if entry.header.number == number {
				return Some(current);
			}
			if entry.header.number < number {
				return None;
			}
			current = entry.header.parent_hash;
		}
	}

	/// The hash at `number` on the best chain.
	pub fn hash_by_number(&self, number: BlockNumber) -> Option<Hash> {
		let best = self.best_hash();
		self.ancestor_at_number(&best, number)
	}

	/// Mark `hash` as finalized, storing the justification and pruning
	/// every branch not passing through it. Returns the pruned hashes.
	pub fn finalize(
		&self,
		hash: Hash,
		justification: Option<&[u8]>,
	) -> Result<Vec<Hash>, Error> {
		let mut inner = self.inner.write();
		if !inner.blocks.contains_key(&hash) {
			return Err(Error::UnknownBlock(hash));
		}

		// Keep the finalized chain itself plus everything descending from
		// the new finalized block.
		let mut keep = HashSet::new();
		let mut current = hash;
		loop {
			keep.insert(current);
			if current == inner.genesis {
				break;
			}
			current = inner.blocks[&current].header.parent_hash;
		}
		let mut queue = VecDeque::from([hash]);
		while let Some(next) = queue.pop_front() {
			for child in &inner.blocks[&next].children {
				if keep.insert(*child) {
					queue.push_back(*child);
				}
			}
		}

		let pruned: Vec<Hash> =
			inner.blocks.keys().filter(|h| !keep.contains(*h)).copied().collect();
		let mut tx = Transaction::new();
		for stale in &pruned {
			inner.blocks.remove(stale);
			inner.leaves.remove(stale);
			tx.remove(columns::HEADERS, stale.as_bytes().to_vec());
			tx.remove(columns::BODIES, stale.as_bytes().to_vec());
		}
		// Parents of pruned blocks may still list them.
		if !pruned.is_empty() {
			let pruned_set: HashSet<_> = pruned.iter().copied().collect();
			for entry in inner.blocks.values_mut() {
				entry.children.retain(|c| !pruned_set.contains(c));
			}
		}

		inner.finalized = hash;
		if !inner.blocks.contains_key(&inner.best) {
			inner.best = Self::select_best(&inner);
			tx.set(columns::META, META_BEST.to_vec(), inner.best.encode());
		}
		tx.set(columns::META, META_FINALIZED.to_vec(), hash.encode());
		if let Some(justification) = justification {
			tx.set(columns::JUSTIFICATIONS, hash.as_bytes().to_vec(), justification.to_vec());
		}
		self.db.commit(tx).map_err(|e| Error::Database(e.to_string()))?;

		log::debug!(
			target: LOG_TARGET,
			"finalized {hash:?}, pruned {} stale blocks",
			pruned.len(),
		);
		Ok(pruned)
	}
}
