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

//! Ed25519 keys, backed by `ed25519-dalek`.

use codec::{Decode, Encode};
use ed25519_dalek::{Signer as _, Verifier as _};

/// The byte length of a seed.
pub const SEED_LENGTH: usize = 32;

/// An ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Public(pub [u8; 32]);

impl std::fmt::Debug for Public {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl AsRef<[u8]> for Public {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

/// An ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Signature(pub [u8; 64]);

impl std::fmt::Debug for Signature {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

/// An ed25519 key pair.
#[derive(Clone)]
pub struct Pair(ed25519_dalek::SigningKey);

impl Pair {
	/// Make a new key pair from a 32 byte seed.
	pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
		Self(ed25519_dalek::SigningKey::from_bytes(seed))
	}

	/// Generate a new random key pair.
	pub fn generate() -> Self {
		let mut seed = [0u8; SEED_LENGTH];
		rand::Rng::fill(&mut rand::thread_rng(), &mut seed[..]);
		Self::from_seed(&seed)
	}

	/// The public key of this pair.
	pub fn public(&self) -> Public {
		Public(self.0.verifying_key().to_bytes())
	}

	/// Sign a message.
	pub fn sign(&self, message: &[u8]) -> Signature {
		Signature(self.0.sign(message).to_bytes())
	}
}

impl Public {
	/// Verify a signature on a message.
	pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
		let Ok(public) = ed25519_dalek::VerifyingKey::from_bytes(&self.0) else { return false };
		let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
		public.verify(message, &sig).is_ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sign_and_verify() {
		let pair = Pair::from_seed(&[1u8; 32]);
		let signature = pair.sign(b"grandpa vote");
		assert!(pair.public().verify(b"grandpa vote", &signature));
		assert!(!pair.public().verify(b"another vote", &signature));
	}

	#[test]
	fn other_key_cannot_verify() {
		let pair = Pair::from_seed(&[1u8; 32]);
		let other = Pair::from_seed(&[2u8; 32]);
		let signature = pair.sign(b"msg");
		assert!(!other.public().verify(b"msg", &signature));
	}
}
