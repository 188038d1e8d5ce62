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

//! Block and header types.

use crate::{hashing::blake2_256, BlockNumber, Digest, Hash};
use codec::{Decode, Encode};

/// A block header.
///
/// The wire format is `parent_hash ++ compact(number) ++ state_root ++
/// extrinsics_root ++ digest`; the block hash is the blake2-256 of the
/// SCALE-encoded header.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct Header {
	/// The parent hash.
	pub parent_hash: Hash,
	/// The block number.
	#[codec(compact)]
	pub number: BlockNumber,
	/// The state trie merkle root.
	pub state_root: Hash,
	/// The merkle root of the extrinsics.
	pub extrinsics_root: Hash,
	/// A chain-specific digest of data useful for light clients or
	/// referencing auxiliary data.
	pub digest: Digest,
}

impl Header {
	/// Returns the hash of the header.
	pub fn hash(&self) -> Hash {
		blake2_256(&self.encode()).into()
	}
}

/// An extrinsic right from the external world. This is unchecked and so can
/// contain a signature.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct OpaqueExtrinsic(pub Vec<u8>);

impl OpaqueExtrinsic {
	/// The hash identifying this extrinsic.
	pub fn hash(&self) -> Hash {
		blake2_256(&self.0).into()
	}
}

/// A block: a header and a body of opaque extrinsics.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct Block {
	/// The block header.
	pub header: Header,
	/// The accompanying extrinsics.
	pub extrinsics: Vec<OpaqueExtrinsic>,
}

impl Block {
	/// Returns the hash of the block, i.e. the hash of its header.
	pub fn hash(&self) -> Hash {
		self.header.hash()
	}
}

/// Compute the extrinsics root committed to by a header.
pub fn extrinsics_root(extrinsics: &[OpaqueExtrinsic]) -> Hash {
	blake2_256(&extrinsics.encode()).into()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::DigestItem;

	fn header() -> Header {
		Header {
			parent_hash: Hash::repeat_byte(1),
			number: 42,
			state_root: Hash::repeat_byte(2),
			extrinsics_root: Hash::repeat_byte(3),
			digest: Digest { logs: vec![DigestItem::PreRuntime(*b"BABE", vec![9])] },
		}
	}

	#[test]
	fn header_roundtrip() {
		let h = header();
		let encoded = h.encode();
		assert_eq!(Header::decode(&mut &encoded[..]).unwrap(), h);
	}

	#[test]
	fn number_is_compact_encoded() {
		let h = header();
		// 32 bytes of parent hash, then a single-byte compact for 42.
		assert_eq!(h.encode()[32], 42 << 2);
	}

	#[test]
	fn hash_commits_to_digest() {
		let a = header();
		let mut b = a.clone();
		b.digest.push(DigestItem::Seal(*b"BABE", vec![0]));
		assert_ne!(a.hash(), b.hash());
	}

	#[test]
	fn extrinsics_root_depends_on_order() {
		let x = OpaqueExtrinsic(vec![1]);
		let y = OpaqueExtrinsic(vec![2]);
		assert_ne!(
			extrinsics_root(&[x.clone(), y.clone()]),
			extrinsics_root(&[y, x])
		);
	}
}
