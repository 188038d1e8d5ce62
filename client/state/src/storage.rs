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

//! Versioned trie state: one root per imported block, overlays for
//! execution.

use crate::{
	columns,
	database::{Database, Transaction},
	trie, Error,
};
use codec::{Decode, Encode};
use parking_lot::RwLock;
use spindle_executor::Externalities;
use spindle_primitives::Hash;
use std::{
	collections::{BTreeMap, HashMap},
	ops::Bound,
	sync::Arc,
};

const LOG_TARGET: &str = "state";

/// Key prefix for state snapshots in the state column; trie nodes use
/// their raw 32-byte hash as key.
const SNAPSHOT_PREFIX: u8 = b's';

fn snapshot_key(root: &Hash) -> Vec<u8> {
	let mut key = Vec::with_capacity(33);
	key.push(SNAPSHOT_PREFIX);
	key.extend_from_slice(root.as_bytes());
	key
}

/// The store of committed state versions.
///
/// Every committed root maps to a full key-value snapshot; the trie nodes
/// behind the root are persisted by hash. The consensus contract is one
/// root per block, with execution happening on an overlay cloned from the
/// parent's root.
pub struct StorageState {
	db: Arc<dyn Database>,
	snapshots: RwLock<HashMap<Hash, Arc<BTreeMap<Vec<u8>, Vec<u8>>>>>,
}

impl StorageState {
	/// Create an empty store.
	pub fn new(db: Arc<dyn Database>) -> Self {
		Self { db, snapshots: RwLock::new(HashMap::new()) }
	}

	/// Commit the genesis state and return its root.
	pub fn insert_genesis(
		&self,
		pairs: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
	) -> Result<Hash, Error> {
		let state: BTreeMap<_, _> = pairs.into_iter().collect();
		self.commit_state(state)
	}

	/// The snapshot at the given root.
	pub fn pairs_at(&self, root: &Hash) -> Result<Arc<BTreeMap<Vec<u8>, Vec<u8>>>, Error> {
		if let Some(state) = self.snapshots.read().get(root) {
			return Ok(state.clone());
		}
		// Fall back to the persisted snapshot.
		let raw = self
			.db
			.get(columns::STATE, &snapshot_key(root))
			.ok_or(Error::UnknownState(*root))?;
		let pairs: Vec<(Vec<u8>, Vec<u8>)> =
			Decode::decode(&mut &raw[..]).map_err(|e| Error::Corrupt(e.to_string()))?;
		let state = Arc::new(pairs.into_iter().collect::<BTreeMap<_, _>>());
		self.snapshots.write().insert(*root, state.clone());
		Ok(state)
	}

	/// Read a single value at the given root.
	pub fn storage_at(&self, root: &Hash, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		Ok(self.pairs_at(root)?.get(key).cloned())
	}

	/// Open an overlay over the state at `root`.
	pub fn overlay_at(&self, root: &Hash) -> Result<TrieOverlay, Error> {
		Ok(TrieOverlay::new(self.pairs_at(root)?))
	}

	/// Commit an overlay, persisting the new trie and snapshot. Returns
	/// the new root.
	pub fn commit_overlay(&self, overlay: TrieOverlay) -> Result<Hash, Error> {
		self.commit_state(overlay.into_state())
	}

	/// Drop in-memory snapshots for roots that are no longer reachable.
	pub fn retain(&self, keep: impl Fn(&Hash) -> bool) {
		self.snapshots.write().retain(|root, _| keep(root));
	}

	fn commit_state(&self, state: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<Hash, Error> {
		let commit = trie::build_trie(&state);

		let mut tx = Transaction::new();
		for (hash, encoded) in commit.nodes {
			tx.set(columns::STATE, hash.as_bytes().to_vec(), encoded);
		}
		let pairs: Vec<(&Vec<u8>, &Vec<u8>)> = state.iter().collect();
		tx.set(columns::STATE, snapshot_key(&commit.root), pairs.encode());
		self.db.commit(tx).map_err(|e| Error::Database(e.to_string()))?;

		log::trace!(target: LOG_TARGET, "committed state root {:?} ({} keys)", commit.root, state.len());
		self.snapshots.write().insert(commit.root, Arc::new(state));
		Ok(commit.root)
	}
}

/// A copy-on-write layer above a committed state, exclusive to the task
/// executing a block.
pub struct TrieOverlay {
	parent: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
	changes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
	cached_root: Option<Hash>,
}

impl TrieOverlay {
	fn new(parent: Arc<BTreeMap<Vec<u8>, Vec<u8>>>) -> Self {
		Self { parent, changes: BTreeMap::new(), cached_root: None }
	}

	/// Whether any key was written or cleared.
	pub fn is_dirty(&self) -> bool {
		!self.changes.is_empty()
	}

	/// Materialize the overlaid state.
	fn into_state(self) -> BTreeMap<Vec<u8>, Vec<u8>> {
		let mut state = (*self.parent).clone();
		for (key, change) in self.changes {
			match change {
				Some(value) => {
					state.insert(key, value);
				},
				None => {
					state.remove(&key);
				},
			}
		}
		state
	}

	fn merged(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
		let mut state = (*self.parent).clone();
		for (key, change) in &self.changes {
			match change {
				Some(value) => {
					state.insert(key.clone(), value.clone());
				},
				None => {
					state.remove(key);
				},
			}
		}
		state
	}
}

impl Externalities for TrieOverlay {
	fn storage_get(&self, key: &[u8]) -> Option<Vec<u8>> {
		match self.changes.get(key) {
			Some(change) => change.clone(),
			None => self.parent.get(key).cloned(),
		}
	}

	fn storage_set(&mut self, key: Vec<u8>, value: Vec<u8>) {
		self.cached_root = None;
		self.changes.insert(key, Some(value));
	}

	fn storage_clear(&mut self, key: &[u8]) {
		self.cached_root = None;
		self.changes.insert(key.to_vec(), None);
	}

	fn storage_next_key(&self, key: &[u8]) -> Option<Vec<u8>> {
		let mut from = key.to_vec();
		loop {
			let parent_next = self
				.parent
				.range::<[u8], _>((Bound::Excluded(&from[..]), Bound::Unbounded))
				.next()
				.map(|(k, _)| k.clone());
			let changes_next = self
				.changes
				.range::<[u8], _>((Bound::Excluded(&from[..]), Bound::Unbounded))
				.next()
				.map(|(k, change)| (k.clone(), change.is_some()));

			let candidate = match (parent_next, changes_next) {
				(None, None) => return None,
				(Some(p), None) => p,
				(None, Some((c, live))) => {
					if live {
						return Some(c);
					}
					from = c;
					continue;
				},
				(Some(p), Some((c, live))) => {
					if c <= p {
						if live {
							return Some(c);
						}
						from = c;
						continue;
					}
					p
				},
			};
			// A parent key is only visible if not deleted in the overlay.
			match self.changes.get(&candidate) {
				Some(None) => {
					from = candidate;
				},
				_ => return Some(candidate),
			}
		}
	}

	fn storage_root(&mut self) -> Hash {
		if let Some(root) = self.cached_root {
			return root;
		}
		let root = trie::trie_root(&self.merged());
		self.cached_root = Some(root);
		root
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::database::MemDb;

	fn storage() -> StorageState {
		StorageState::new(Arc::new(MemDb::new()))
	}

	#[test]
	fn genesis_roundtrip() {
		let storage = storage();
		let root = storage
			.insert_genesis(vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())])
			.unwrap();
		assert_eq!(storage.storage_at(&root, b"a").unwrap(), Some(b"1".to_vec()));
		assert_eq!(storage.storage_at(&root, b"c").unwrap(), None);
	}

	#[test]
	fn overlay_commit_yields_a_new_version() {
		let storage = storage();
		let genesis = storage.insert_genesis(vec![(b"a".to_vec(), b"1".to_vec())]).unwrap();

		let mut overlay = storage.overlay_at(&genesis).unwrap();
		overlay.storage_set(b"b".to_vec(), b"2".to_vec());
		let expected_root = overlay.storage_root();
		let root = storage.commit_overlay(overlay).unwrap();
		assert_eq!(root, expected_root);

		// Both versions remain readable.
		assert_eq!(storage.storage_at(&genesis, b"b").unwrap(), None);
		assert_eq!(storage.storage_at(&root, b"b").unwrap(), Some(b"2".to_vec()));
		assert_eq!(storage.storage_at(&root, b"a").unwrap(), Some(b"1".to_vec()));
	}

	#[test]
	fn overlay_shadows_and_deletes() {
		let storage = storage();
		let genesis = storage
			.insert_genesis(vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())])
			.unwrap();

		let mut overlay = storage.overlay_at(&genesis).unwrap();
		overlay.storage_set(b"a".to_vec(), b"changed".to_vec());
		overlay.storage_clear(b"b");
		assert_eq!(overlay.storage_get(b"a"), Some(b"changed".to_vec()));
		assert_eq!(overlay.storage_get(b"b"), None);
	}

	#[test]
	fn unchanged_overlay_commits_to_the_same_root() {
		let storage = storage();
		let genesis = storage.insert_genesis(vec![(b"a".to_vec(), b"1".to_vec())]).unwrap();
		let overlay = storage.overlay_at(&genesis).unwrap();
		assert!(!overlay.is_dirty());
		assert_eq!(storage.commit_overlay(overlay).unwrap(), genesis);
	}

	#[test]
	fn next_key_sees_through_the_overlay() {
		let storage = storage();
		let genesis = storage
			.insert_genesis(vec![(b"a".to_vec(), b"1".to_vec()), (b"c".to_vec(), b"3".to_vec())])
			.unwrap();

		let mut overlay = storage.overlay_at(&genesis).unwrap();
		overlay.storage_set(b"b".to_vec(), b"2".to_vec());
		overlay.storage_clear(b"c");

		assert_eq!(overlay.storage_next_key(b"a"), Some(b"b".to_vec()));
		assert_eq!(overlay.storage_next_key(b"b"), None);
		assert_eq!(overlay.storage_next_key(b""), Some(b"a".to_vec()));
	}

	#[test]
	fn snapshots_survive_a_cache_sweep() {
		let storage = storage();
		let root = storage.insert_genesis(vec![(b"a".to_vec(), b"1".to_vec())]).unwrap();
		storage.retain(|_| false);
		// Reloaded from the database.
		assert_eq!(storage.storage_at(&root, b"a").unwrap(), Some(b"1".to_vec()));
	}
}
