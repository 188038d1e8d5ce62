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

//! Core primitives for the Spindle node: block and header types, digests,
//! hashing and the crypto key wrappers shared by every other crate.

pub mod ed25519;
pub mod hashing;
pub mod keyring;
pub mod sr25519;
pub mod transaction;

mod digest;
mod header;

pub use digest::{ConsensusEngineId, Digest, DigestItem};
pub use hashing::blake2_256;
pub use header::{extrinsics_root, Block, Header, OpaqueExtrinsic};
pub use keyring::Keyring;

/// The canonical block hash type.
pub type Hash = primitive_types::H256;

/// The block number type.
///
/// Headers encode it SCALE-compact on the wire.
pub type BlockNumber = u32;
