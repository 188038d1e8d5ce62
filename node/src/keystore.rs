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

//! The node keystore.
//!
//! Holds the sr25519 key used for block production (key type `babe`) and
//! the ed25519 key used for finality voting (key type `gran`). Keys are
//! loaded once at startup, from a well-known name, a hex seed or seed
//! files under `<base>/keystore/`, and are read-only afterwards.

use crate::Error;
use spindle_primitives::{ed25519, sr25519, Keyring};
use std::path::Path;

const BABE_SEED_FILE: &str = "babe.seed";
const GRANDPA_SEED_FILE: &str = "gran.seed";

/// The loaded keys of the node.
#[derive(Clone, Default)]
pub struct Keystore {
	babe: Option<sr25519::Pair>,
	grandpa: Option<ed25519::Pair>,
}

impl Keystore {
	/// An empty keystore; the node runs as a non-authority.
	pub fn none() -> Self {
		Self::default()
	}

	/// Derive both key types from a `--key` value: a well-known name
	/// ("alice" .. "ferdie") or a 0x-prefixed 32-byte hex seed.
	pub fn from_key(value: &str) -> Result<Self, Error> {
		if let Some(keyring) = Keyring::iter().find(|k| k.name().eq_ignore_ascii_case(value)) {
			return Ok(Self {
				babe: Some(keyring.sr25519_pair()),
				grandpa: Some(keyring.ed25519_pair()),
			});
		}

		let seed = parse_seed(value)?;
		Ok(Self {
			babe: Some(sr25519::Pair::from_seed(&seed)),
			grandpa: Some(ed25519::Pair::from_seed(&seed)),
		})
	}

	/// Load seed files from `<base>/keystore/`. Missing files leave the
	/// corresponding role disabled.
	pub fn load(base_path: &Path) -> Result<Self, Error> {
		let dir = base_path.join("keystore");
		let read_seed = |file: &str| -> Result<Option<[u8; 32]>, Error> {
			let path = dir.join(file);
			if !path.exists() {
				return Ok(None);
			}
			let raw = std::fs::read_to_string(&path)
				.map_err(|e| Error::KeystoreInvalid(format!("{}: {e}", path.display())))?;
			parse_seed(raw.trim()).map(Some)
		};

		Ok(Self {
			babe: read_seed(BABE_SEED_FILE)?.map(|seed| sr25519::Pair::from_seed(&seed)),
			grandpa: read_seed(GRANDPA_SEED_FILE)?.map(|seed| ed25519::Pair::from_seed(&seed)),
		})
	}

	/// The block-production key.
	pub fn babe(&self) -> Option<&sr25519::Pair> {
		self.babe.as_ref()
	}

	/// The finality-voting key.
	pub fn grandpa(&self) -> Option<&ed25519::Pair> {
		self.grandpa.as_ref()
	}

	/// Whether any key is loaded.
	pub fn is_authority(&self) -> bool {
		self.babe.is_some() || self.grandpa.is_some()
	}
}

fn parse_seed(value: &str) -> Result<[u8; 32], Error> {
	let raw = hex::decode(value.trim_start_matches("0x"))
		.map_err(|e| Error::KeystoreInvalid(format!("bad seed hex: {e}")))?;
	raw.try_into()
		.map_err(|_| Error::KeystoreInvalid("seed must be 32 bytes".into()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn well_known_names_resolve() {
		let store = Keystore::from_key("alice").unwrap();
		assert_eq!(store.babe().unwrap().public(), Keyring::Alice.sr25519_public());
		assert_eq!(store.grandpa().unwrap().public(), Keyring::Alice.ed25519_public());
		assert!(store.is_authority());
	}

	#[test]
	fn hex_seeds_resolve() {
		let seed = [7u8; 32];
		let store = Keystore::from_key(&format!("0x{}", hex::encode(seed))).unwrap();
		assert_eq!(store.babe().unwrap().public(), sr25519::Pair::from_seed(&seed).public());
	}

	#[test]
	fn malformed_keys_are_rejected() {
		assert!(matches!(Keystore::from_key("zelda"), Err(Error::KeystoreInvalid(_))));
		assert!(matches!(Keystore::from_key("0x1234"), Err(Error::KeystoreInvalid(_))));
	}

	#[test]
	fn seed_files_load() {
		let dir = tempfile::tempdir().unwrap();
		let keystore_dir = dir.path().join("keystore");
		std::fs::create_dir_all(&keystore_dir).unwrap();
		std::fs::write(
			keystore_dir.join(BABE_SEED_FILE),
			format!("0x{}\n", hex::encode([9u8; 32])),
		)
		.unwrap();

		let store = Keystore::load(dir.path()).unwrap();
		assert!(store.babe().is_some());
		assert!(store.grandpa().is_none());
	}

	#[test]
	fn missing_keystore_directory_is_empty() {
		let dir = tempfile::tempdir().unwrap();
		let store = Keystore::load(dir.path()).unwrap();
		assert!(!store.is_authority());
	}
}
