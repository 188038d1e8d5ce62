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

//! The block import and finalization seams.

use crate::ConsensusError;
use spindle_primitives::{Block, Hash};

/// Where a block came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockOrigin {
	/// The block was authored by this node.
	Own,
	/// The block was announced by a peer.
	NetworkBroadcast,
	/// The block arrived as part of initial sync.
	NetworkInitialSync,
	/// The block was read from a file or injected locally.
	File,
}

impl BlockOrigin {
	/// Whether blocks from this origin with an unknown parent should be
	/// held back until the parent arrives.
	pub fn buffers_orphans(self) -> bool {
		matches!(self, Self::NetworkBroadcast | Self::NetworkInitialSync)
	}
}

/// The outcome of importing a block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImportResult {
	/// The block was committed.
	Imported {
		/// Whether the block became the new best.
		is_new_best: bool,
	},
	/// The block was known already.
	AlreadyInChain,
}

/// Something that can import whole blocks into the chain.
#[async_trait::async_trait]
pub trait BlockImport: Send + Sync {
	/// Verify, execute and commit the given block.
	async fn import_block(
		&self,
		block: Block,
		origin: BlockOrigin,
	) -> Result<ImportResult, ConsensusError>;
}

/// Something that can finalize an already imported block.
#[async_trait::async_trait]
pub trait Finalizer: Send + Sync {
	/// Mark the given block as final, verifying the justification if one
	/// is supplied.
	async fn finalize_block(
		&self,
		hash: Hash,
		justification: Option<Vec<u8>>,
	) -> Result<(), ConsensusError>;
}
