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

//! The base-16 Merkle-Patricia trie over opaque key-value pairs.
//!
//! Keys are expanded to nibbles; interior nodes carry the shared partial
//! path. A node is identified by the blake2-256 of its SCALE encoding and
//! child references are by hash, so equal subtrees share nodes in the
//! store. The root over a given set of pairs is independent of insertion
//! order.

use codec::{Decode, Encode};
use spindle_primitives::{blake2_256, Hash};
use std::collections::BTreeMap;

/// A computed trie: the root hash plus every node body, keyed by hash.
#[derive(Clone, Debug)]
pub struct TrieCommit {
	/// The root hash.
	pub root: Hash,
	/// The encoded nodes making up the trie.
	pub nodes: Vec<(Hash, Vec<u8>)>,
}

#[derive(Encode, Decode)]
enum Node {
	#[codec(index = 0)]
	Leaf { partial: Vec<u8>, value: Vec<u8> },
	#[codec(index = 1)]
	Branch { partial: Vec<u8>, children: [Option<Hash>; 16], value: Option<Vec<u8>> },
}

/// The root of the empty trie.
pub fn empty_root() -> Hash {
	blake2_256(&[]).into()
}

/// Build the trie over the given pairs, returning the root and all nodes.
pub fn build_trie(pairs: &BTreeMap<Vec<u8>, Vec<u8>>) -> TrieCommit {
	let entries: Vec<(Vec<u8>, &Vec<u8>)> =
		pairs.iter().map(|(key, value)| (to_nibbles(key), value)).collect();
	let mut nodes = Vec::new();
	let root = build_node(&entries, 0, &mut nodes).unwrap_or_else(empty_root);
	TrieCommit { root, nodes }
}

/// Compute only the root over the given pairs.
pub fn trie_root(pairs: &BTreeMap<Vec<u8>, Vec<u8>>) -> Hash {
	build_trie(pairs).root
}

fn to_nibbles(key: &[u8]) -> Vec<u8> {
	let mut nibbles = Vec::with_capacity(key.len() * 2);
	for byte in key {
		nibbles.push(byte >> 4);
		nibbles.push(byte & 0x0f);
	}
	nibbles
}

fn push_node(node: Node, nodes: &mut Vec<(Hash, Vec<u8>)>) -> Hash {
	let encoded = node.encode();
	let hash: Hash = blake2_256(&encoded).into();
	nodes.push((hash, encoded));
	hash
}

/// Build the subtree over `entries`, which all share their first `depth`
/// nibbles. Entries are sorted and keys are unique.
fn build_node(
	entries: &[(Vec<u8>, &Vec<u8>)],
	depth: usize,
	nodes: &mut Vec<(Hash, Vec<u8>)>,
) -> Option<Hash> {
	match entries {
		[] => None,
		[(nibbles, value)] => {
			let node = Node::Leaf { partial: nibbles[depth..].to_vec(), value: (*value).clone() };
			Some(push_node(node, nodes))
		},
		_ => {
			// Extend the shared path as far as every entry agrees.
			let first = &entries[0].0;
			let mut common = 0;
			'extend: while depth + common < first.len() {
				let nibble = first[depth + common];
				for (key, _) in &entries[1..] {
					if key.len() <= depth + common || key[depth + common] != nibble {
						break 'extend;
					}
				}
				common += 1;
			}

			let branch_depth = depth + common;
			let mut children: [Option<Hash>; 16] = Default::default();
			let mut value = None;
			let mut index = 0;

			// At most one key can terminate exactly at the branch; it
			// sorts first.
			if entries[0].0.len() == branch_depth {
				value = Some(entries[0].1.clone());
				index = 1;
			}
			while index < entries.len() {
				let nibble = entries[index].0[branch_depth];
				let start = index;
				while index < entries.len() && entries[index].0[branch_depth] == nibble {
					index += 1;
				}
				children[nibble as usize] = build_node(&entries[start..index], branch_depth + 1, nodes);
			}

			let node = Node::Branch { partial: first[depth..branch_depth].to_vec(), children, value };
			Some(push_node(node, nodes))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pairs(items: &[(&[u8], &[u8])]) -> BTreeMap<Vec<u8>, Vec<u8>> {
		items.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect()
	}

	#[test]
	fn empty_trie_has_the_empty_root() {
		assert_eq!(trie_root(&BTreeMap::new()), empty_root());
	}

	#[test]
	fn root_is_independent_of_insertion_order() {
		let mut a = BTreeMap::new();
		a.insert(b"one".to_vec(), b"1".to_vec());
		a.insert(b"two".to_vec(), b"2".to_vec());
		a.insert(b"three".to_vec(), b"3".to_vec());

		let mut b = BTreeMap::new();
		b.insert(b"three".to_vec(), b"3".to_vec());
		b.insert(b"one".to_vec(), b"1".to_vec());
		b.insert(b"two".to_vec(), b"2".to_vec());

		assert_eq!(trie_root(&a), trie_root(&b));
	}

	#[test]
	fn root_commits_to_values_and_keys() {
		let base = pairs(&[(b"key", b"value")]);
		let other_value = pairs(&[(b"key", b"other")]);
		let other_key = pairs(&[(b"kez", b"value")]);
		assert_ne!(trie_root(&base), trie_root(&other_value));
		assert_ne!(trie_root(&base), trie_root(&other_key));
	}

	#[test]
	fn prefix_keys_are_handled() {
		// One key is a strict prefix of the others, exercising the
		// branch-with-value case.
		let trie = pairs(&[
			(&[0x11][..], &b"a"[..]),
			(&[0x11, 0x22][..], &b"b"[..]),
			(&[0x11, 0x23][..], &b"c"[..]),
		]);
		let commit = build_trie(&trie);
		assert_ne!(commit.root, empty_root());

		// Removing the prefix key changes the root.
		let without = pairs(&[(&[0x11, 0x22][..], &b"b"[..]), (&[0x11, 0x23][..], &b"c"[..])]);
		assert_ne!(commit.root, trie_root(&without));
	}

	#[test]
	fn removal_restores_the_previous_root() {
		let mut map = pairs(&[(b"a", b"1"), (b"b", b"2")]);
		let before = trie_root(&map);
		map.insert(b"c".to_vec(), b"3".to_vec());
		assert_ne!(trie_root(&map), before);
		map.remove(&b"c".to_vec());
		assert_eq!(trie_root(&map), before);
	}

	#[test]
	fn shared_subtrees_share_nodes() {
		// Two tries with a common subtree produce overlapping node sets.
		let a = build_trie(&pairs(&[(b"aa", b"1"), (b"ab", b"2"), (b"zz", b"3")]));
		let b = build_trie(&pairs(&[(b"aa", b"1"), (b"ab", b"2"), (b"zz", b"4")]));
		let a_hashes: std::collections::HashSet<_> = a.nodes.iter().map(|(h, _)| *h).collect();
		assert!(b.nodes.iter().any(|(h, _)| a_hashes.contains(h)));
		assert_ne!(a.root, b.root);
	}

	#[test]
	fn single_entry_is_a_leaf() {
		let commit = build_trie(&pairs(&[(b"k", b"v")]));
		assert_eq!(commit.nodes.len(), 1);
	}
}
