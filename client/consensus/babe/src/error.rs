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

//! BABE errors.

use spindle_consensus_primitives::{babe::AuthorityIndex, Slot};
use spindle_primitives::Hash;

/// Errors of the BABE service and verifier.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum Error {
	/// The header carries no BABE pre-runtime digest.
	#[error("missing BABE pre-runtime digest")]
	MissingPreDigest,
	/// The header carries more than one BABE pre-runtime digest.
	#[error("multiple BABE pre-runtime digests")]
	MultiplePreDigests,
	/// The header's last digest is not a BABE seal.
	#[error("header {0:?} is unsealed")]
	Unsealed(Hash),
	/// The seal signature does not verify under the claimed authority.
	#[error("bad seal signature on header {0:?}")]
	BadSeal(Hash),
	/// The VRF output or proof is invalid or above the threshold.
	#[error("invalid VRF claim for slot {0}")]
	BadVrf(Slot),
	/// Secondary slots are disabled in this epoch.
	#[error("secondary slot claims are disabled")]
	SecondarySlotsDisabled,
	/// The claiming authority is not the assigned secondary author.
	#[error("authority {0} is not the secondary author of slot {1}")]
	WrongSecondaryAuthor(AuthorityIndex, Slot),
	/// The claimed authority index is out of bounds.
	#[error("authority index {0} out of bounds")]
	BadAuthorityIndex(AuthorityIndex),
	/// The claiming authority was disabled in this epoch.
	#[error("authority {0} is disabled")]
	AuthorityDisabled(AuthorityIndex),
	/// The slot does not increase over the parent's.
	#[error("slot {slot} is not after the parent slot {parent_slot}")]
	SlotNotIncreasing {
		/// The claimed slot.
		slot: Slot,
		/// The parent's slot.
		parent_slot: Slot,
	},
	/// The parent block is not in the tree.
	#[error("unknown parent {0:?}")]
	UnknownParent(Hash),
	/// A state backend failure.
	#[error(transparent)]
	State(#[from] spindle_state::Error),
	/// A runtime call failure.
	#[error(transparent)]
	Executor(#[from] spindle_executor::Error),
	/// Submitting an authored block failed.
	#[error("import of authored block failed: {0}")]
	Import(#[from] spindle_consensus::ConsensusError),
}
