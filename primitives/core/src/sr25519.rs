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

//! Simple sr25519 (Schnorr-Ristretto) API with VRF support, backed by the
//! `schnorrkel` crate.

use codec::{Decode, Encode};
use merlin::Transcript;
use schnorrkel::{
	vrf::{VRFPreOut, VRFProof},
	ExpansionMode, Keypair, MiniSecretKey, PublicKey,
	Signature as SchnorrkelSignature,
};

/// The context used for substrate-compatible sr25519 signatures.
const SIGNING_CONTEXT: &[u8] = b"substrate";

/// The byte length of a seed.
pub const SEED_LENGTH: usize = 32;

/// An sr25519 public key.
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

/// An sr25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Signature(pub [u8; 64]);

impl std::fmt::Debug for Signature {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

/// A VRF pre-output, the curve point produced by evaluating the VRF.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct VrfOutput(pub [u8; 32]);

/// A VRF proof, attesting that [`VrfOutput`] was produced honestly.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct VrfProof(pub [u8; 64]);

impl std::fmt::Debug for VrfProof {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

/// The input/output pair of a VRF evaluation; the only thing from which
/// verifier and prover can derive identical pseudo-random bytes.
pub struct VrfInOut(schnorrkel::vrf::VRFInOut);

impl VrfInOut {
	/// Derive 16 pseudo-random bytes from the evaluation, domain-separated
	/// by `context`.
	pub fn make_bytes16(&self, context: &[u8]) -> [u8; 16] {
		self.0.make_bytes::<[u8; 16]>(context)
	}
}

/// An sr25519 key pair.
#[derive(Clone)]
pub struct Pair(Keypair);

impl Pair {
	/// Make a new key pair from a 32 byte seed.
	pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
		let mini = MiniSecretKey::from_bytes(&seed[..])
			.expect("32 bytes always make a mini secret key; qed");
		Self(mini.expand_to_keypair(ExpansionMode::Ed25519))
	}

	/// Generate a new random key pair.
	pub fn generate() -> Self {
		let mut seed = [0u8; SEED_LENGTH];
		rand::Rng::fill(&mut rand::thread_rng(), &mut seed[..]);
		Self::from_seed(&seed)
	}

	/// The public key of this pair.
	pub fn public(&self) -> Public {
		Public(self.0.public.to_bytes())
	}

	/// Sign a message.
	pub fn sign(&self, message: &[u8]) -> Signature {
		let sig = self.0.secret.sign_simple(SIGNING_CONTEXT, message, &self.0.public);
		Signature(sig.to_bytes())
	}

	/// Evaluate the VRF on the given transcript.
	pub fn vrf_sign(&self, transcript: Transcript) -> (VrfInOut, VrfOutput, VrfProof) {
		let (inout, proof, _) = self.0.vrf_sign(transcript);
		let output = VrfOutput(inout.to_preout().to_bytes());
		(VrfInOut(inout), output, VrfProof(proof.to_bytes()))
	}
}

impl Public {
	/// Verify a signature on a message.
	pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
		let Ok(public) = PublicKey::from_bytes(&self.0) else { return false };
		let Ok(sig) = SchnorrkelSignature::from_bytes(&signature.0) else { return false };
		public.verify_simple(SIGNING_CONTEXT, message, &sig).is_ok()
	}

	/// Verify a VRF evaluation, returning the input/output pair on success.
	pub fn vrf_verify(
		&self,
		transcript: Transcript,
		output: &VrfOutput,
		proof: &VrfProof,
	) -> Option<VrfInOut> {
		let public = PublicKey::from_bytes(&self.0).ok()?;
		let preout = VRFPreOut::from_bytes(&output.0).ok()?;
		let proof = VRFProof::from_bytes(&proof.0).ok()?;
		let (inout, _) = public.vrf_verify(transcript, &preout, &proof).ok()?;
		Some(VrfInOut(inout))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn transcript() -> Transcript {
		let mut t = Transcript::new(b"test");
		t.append_u64(b"slot", 7);
		t
	}

	#[test]
	fn sign_and_verify() {
		let pair = Pair::from_seed(&[1u8; 32]);
		let message = b"something important";
		let signature = pair.sign(message);
		assert!(pair.public().verify(message, &signature));
		assert!(!pair.public().verify(b"something else", &signature));
	}

	#[test]
	fn seed_is_deterministic() {
		let a = Pair::from_seed(&[42u8; 32]);
		let b = Pair::from_seed(&[42u8; 32]);
		assert_eq!(a.public(), b.public());
	}

	#[test]
	fn other_key_cannot_verify() {
		let pair = Pair::from_seed(&[1u8; 32]);
		let other = Pair::from_seed(&[2u8; 32]);
		let signature = pair.sign(b"msg");
		assert!(!other.public().verify(b"msg", &signature));
	}

	#[test]
	fn vrf_verifies_and_derives_equal_bytes() {
		let pair = Pair::from_seed(&[3u8; 32]);
		let (inout, output, proof) = pair.vrf_sign(transcript());
		let verified = pair.public().vrf_verify(transcript(), &output, &proof).unwrap();
		assert_eq!(inout.make_bytes16(b"vrf"), verified.make_bytes16(b"vrf"));
	}

	#[test]
	fn vrf_rejects_wrong_transcript() {
		let pair = Pair::from_seed(&[3u8; 32]);
		let (_, output, proof) = pair.vrf_sign(transcript());
		let mut other = Transcript::new(b"test");
		other.append_u64(b"slot", 8);
		assert!(pair.public().vrf_verify(other, &output, &proof).is_none());
	}
}
