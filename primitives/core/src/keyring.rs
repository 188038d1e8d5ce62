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

//! A set of well-known test accounts.

use crate::{ed25519, sr25519};

/// Set of test accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyring {
	Alice,
	Bob,
	Charlie,
	Dave,
	Eve,
	Ferdie,
}

impl Keyring {
	const ALL: [Keyring; 6] = [
		Keyring::Alice,
		Keyring::Bob,
		Keyring::Charlie,
		Keyring::Dave,
		Keyring::Eve,
		Keyring::Ferdie,
	];

	/// Returns an iterator over all test accounts.
	pub fn iter() -> impl Iterator<Item = Keyring> {
		Self::ALL.into_iter()
	}

	/// The name of the account.
	pub fn name(self) -> &'static str {
		match self {
			Keyring::Alice => "Alice",
			Keyring::Bob => "Bob",
			Keyring::Charlie => "Charlie",
			Keyring::Dave => "Dave",
			Keyring::Eve => "Eve",
			Keyring::Ferdie => "Ferdie",
		}
	}

	/// The deterministic seed of the account.
	pub fn seed(self) -> [u8; 32] {
		let mut seed = [0u8; 32];
		let name = self.name().as_bytes();
		seed[..name.len()].copy_from_slice(name);
		seed
	}

	/// The sr25519 pair of the account, as used for block production.
	pub fn sr25519_pair(self) -> sr25519::Pair {
		sr25519::Pair::from_seed(&self.seed())
	}

	/// The ed25519 pair of the account, as used for finality voting.
	pub fn ed25519_pair(self) -> ed25519::Pair {
		ed25519::Pair::from_seed(&self.seed())
	}

	/// Shorthand for the sr25519 public key.
	pub fn sr25519_public(self) -> sr25519::Public {
		self.sr25519_pair().public()
	}

	/// Shorthand for the ed25519 public key.
	pub fn ed25519_public(self) -> ed25519::Public {
		self.ed25519_pair().public()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accounts_are_distinct() {
		let publics: std::collections::HashSet<_> =
			Keyring::iter().map(|k| k.sr25519_public()).collect();
		assert_eq!(publics.len(), 6);
	}

	#[test]
	fn pairs_are_deterministic() {
		assert_eq!(Keyring::Alice.sr25519_public(), Keyring::Alice.sr25519_public());
		assert_eq!(Keyring::Alice.ed25519_public(), Keyring::Alice.ed25519_public());
	}
}
