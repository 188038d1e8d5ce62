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

//! The storage interface runtime execution operates on.

use spindle_primitives::Hash;

/// A mutable view of chain state, exclusive to the task executing a
/// block. The state backend implements this on its trie overlay.
pub trait Externalities: Send {
	/// Read a storage value.
	fn storage_get(&self, key: &[u8]) -> Option<Vec<u8>>;

	/// Write a storage value.
	fn storage_set(&mut self, key: Vec<u8>, value: Vec<u8>);

	/// Remove a storage value.
	fn storage_clear(&mut self, key: &[u8]);

	/// The lexicographically next storage key after `key`.
	fn storage_next_key(&self, key: &[u8]) -> Option<Vec<u8>>;

	/// The state root over the current contents of the overlay.
	fn storage_root(&mut self) -> Hash;
}

/// A plain in-memory [`Externalities`], enough for unit tests and for
/// runtime calls that only read genesis-style state.
#[derive(Default)]
pub struct BasicExternalities {
	state: std::collections::BTreeMap<Vec<u8>, Vec<u8>>,
}

impl BasicExternalities {
	/// Create empty state.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create state pre-populated with the given pairs.
	pub fn from_pairs(pairs: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
		Self { state: pairs.into_iter().collect() }
	}

	/// Consume the externalities and return the raw state.
	pub fn into_pairs(self) -> std::collections::BTreeMap<Vec<u8>, Vec<u8>> {
		self.state
	}
}

impl Externalities for BasicExternalities {
	fn storage_get(&self, key: &[u8]) -> Option<Vec<u8>> {
		self.state.get(key).cloned()
	}

	fn storage_set(&mut self, key: Vec<u8>, value: Vec<u8>) {
		self.state.insert(key, value);
	}

	fn storage_clear(&mut self, key: &[u8]) {
		self.state.remove(key);
	}

	fn storage_next_key(&self, key: &[u8]) -> Option<Vec<u8>> {
		use std::ops::Bound;
		self.state
			.range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
			.next()
			.map(|(k, _)| k.clone())
	}

	fn storage_root(&mut self) -> Hash {
		// A flat hash over the sorted pairs; the real backend computes a
		// trie root.
		use codec::Encode;
		let pairs: Vec<_> = self.state.iter().collect();
		spindle_primitives::blake2_256(&pairs.encode()).into()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn basic_externalities_behave_like_a_map() {
		let mut ext = BasicExternalities::new();
		ext.storage_set(b"a".to_vec(), b"1".to_vec());
		ext.storage_set(b"b".to_vec(), b"2".to_vec());
		assert_eq!(ext.storage_get(b"a"), Some(b"1".to_vec()));
		assert_eq!(ext.storage_next_key(b"a"), Some(b"b".to_vec()));
		assert_eq!(ext.storage_next_key(b"b"), None);
		ext.storage_clear(b"a");
		assert_eq!(ext.storage_get(b"a"), None);
	}

	#[test]
	fn root_changes_with_content() {
		let mut a = BasicExternalities::new();
		let empty = a.storage_root();
		a.storage_set(b"k".to_vec(), b"v".to_vec());
		assert_ne!(a.storage_root(), empty);
	}
}
