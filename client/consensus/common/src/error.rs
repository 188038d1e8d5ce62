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

//! Consensus error types.

/// The part of block verification that failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VerifyFailure {
	/// Structural header checks failed.
	Header,
	/// A consensus or pre-runtime digest is missing or malformed.
	Digest,
	/// The VRF output or proof does not check out.
	Vrf,
	/// The seal signature is missing or wrong.
	Seal,
	/// Post-execution state root differs from the header's.
	StateRoot,
}

impl std::fmt::Display for VerifyFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let what = match self {
			Self::Header => "header",
			Self::Digest => "digest",
			Self::Vrf => "vrf",
			Self::Seal => "seal",
			Self::StateRoot => "state root",
		};
		f.write_str(what)
	}
}

/// Why a finalization request was rejected.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FinalityFailure {
	/// The target is at or below the finalized block and is not on the
	/// finalized chain.
	BelowFinalized,
	/// The supplied justification does not prove finality of the target.
	BadJustification(String),
}

impl std::fmt::Display for FinalityFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::BelowFinalized => f.write_str("target below finalized"),
			Self::BadJustification(why) => write!(f, "bad justification: {why}"),
		}
	}
}

/// Errors of the import pipeline and the finality path.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ConsensusError {
	/// Verification failed; the block is bad and the announcing peer may
	/// be penalized.
	#[error("verification failed: invalid {0}")]
	VerifyFailed(VerifyFailure),
	/// The parent of the block is not known (yet).
	#[error("unknown parent")]
	UnknownParent,
	/// The block is already part of the chain.
	#[error("duplicate block")]
	DuplicateBlock,
	/// Executing the block through the runtime failed.
	#[error("block execution failed: {0}")]
	ExecutionFailed(String),
	/// Finalization was rejected.
	#[error("finality rejected: {0}")]
	FinalityRejected(FinalityFailure),
	/// A runtime API call failed.
	#[error("runtime api: {0}")]
	RuntimeApi(String),
	/// The backing store failed.
	#[error("storage i/o: {0}")]
	StorageIo(String),
	/// The operation was cancelled by shutdown.
	#[error("cancelled")]
	Cancelled,
}
