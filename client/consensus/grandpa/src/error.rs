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

//! GRANDPA errors.

use spindle_primitives::Hash;

/// Errors of the GRANDPA service.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum Error {
	/// A justification failed verification.
	#[error("bad justification: {0}")]
	BadJustification(String),
	/// The referenced block is not in the tree.
	#[error("unknown block {0:?}")]
	UnknownBlock(Hash),
	/// Finalizing through the import pipeline failed.
	#[error("finalization failed: {0}")]
	Finalize(#[from] spindle_consensus::ConsensusError),
}
