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

//! An import front-end that buffers network blocks whose parents have not
//! arrived yet.

use crate::{BlockImport, BlockOrigin, ConsensusError, ImportResult};
use parking_lot::Mutex;
use spindle_primitives::Block;
use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};

const LOG_TARGET: &str = "import-queue";

/// The default bound on the orphan buffer.
pub const DEFAULT_MAX_ORPHANS: usize = 512;

/// Wraps a [`BlockImport`] with a bounded orphan buffer: blocks from the
/// network whose parent is unknown are parked and retried whenever another
/// import succeeds. On overflow the oldest orphan is dropped.
pub struct ImportQueue {
	import: Arc<dyn BlockImport>,
	orphans: Mutex<VecDeque<(Block, BlockOrigin)>>,
	max_orphans: usize,
	orphans_dropped: AtomicU64,
}

impl ImportQueue {
	/// Create a new queue in front of the given import.
	pub fn new(import: Arc<dyn BlockImport>) -> Self {
		Self::with_capacity(import, DEFAULT_MAX_ORPHANS)
	}

	/// Create a new queue with a custom orphan bound.
	pub fn with_capacity(import: Arc<dyn BlockImport>, max_orphans: usize) -> Self {
		Self {
			import,
			orphans: Mutex::new(VecDeque::new()),
			max_orphans,
			orphans_dropped: AtomicU64::new(0),
		}
	}

	/// Import a block, parking it if its parent is unknown and the origin
	/// buffers orphans. A successful import retries parked orphans until
	/// no further progress is made.
	pub async fn submit(
		&self,
		block: Block,
		origin: BlockOrigin,
	) -> Result<ImportResult, ConsensusError> {
		match self.import.import_block(block.clone(), origin).await {
			Ok(result) => {
				self.drain_orphans().await;
				Ok(result)
			},
			Err(ConsensusError::UnknownParent) if origin.buffers_orphans() => {
				self.park(block, origin);
				Err(ConsensusError::UnknownParent)
			},
			Err(e) => Err(e),
		}
	}

	/// The number of currently parked orphans.
	pub fn orphan_count(&self) -> usize {
		self.orphans.lock().len()
	}

	/// How many orphans were dropped due to the buffer bound.
	pub fn orphans_dropped(&self) -> u64 {
		self.orphans_dropped.load(Ordering::Relaxed)
	}

	fn park(&self, block: Block, origin: BlockOrigin) {
		let mut orphans = self.orphans.lock();
		if orphans.len() >= self.max_orphans {
			if let Some((dropped, _)) = orphans.pop_front() {
				self.orphans_dropped.fetch_add(1, Ordering::Relaxed);
				log::debug!(
					target: LOG_TARGET,
					"orphan buffer full, dropped oldest orphan {:?}",
					dropped.hash(),
				);
			}
		}
		log::trace!(target: LOG_TARGET, "parking orphan {:?}", block.hash());
		orphans.push_back((block, origin));
	}

	async fn drain_orphans(&self) {
		loop {
			let pending: Vec<_> = self.orphans.lock().drain(..).collect();
			if pending.is_empty() {
				return;
			}

			let mut progress = false;
			let mut retained = VecDeque::new();
			for (block, origin) in pending {
				match self.import.import_block(block.clone(), origin).await {
					Ok(_) => progress = true,
					Err(ConsensusError::UnknownParent) => retained.push_back((block, origin)),
					Err(e) => {
						log::debug!(
							target: LOG_TARGET,
							"dropping parked orphan {:?}: {e}",
							block.hash(),
						);
					},
				}
			}

			{
				// New orphans may have been parked while we were importing;
				// keep the retained ones in front to preserve arrival order.
				let mut orphans = self.orphans.lock();
				for item in retained.into_iter().rev() {
					orphans.push_front(item);
				}
			}

			if !progress {
				return;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex as PlMutex;
	use spindle_primitives::{Digest, Hash, Header};
	use std::collections::HashSet;

	/// Accepts a block iff its parent is genesis or was accepted before.
	struct TrackingImport {
		known: PlMutex<HashSet<Hash>>,
	}

	impl TrackingImport {
		fn new(genesis: Hash) -> Self {
			let mut known = HashSet::new();
			known.insert(genesis);
			Self { known: PlMutex::new(known) }
		}
	}

	#[async_trait::async_trait]
	impl BlockImport for TrackingImport {
		async fn import_block(
			&self,
			block: Block,
			_origin: BlockOrigin,
		) -> Result<ImportResult, ConsensusError> {
			let mut known = self.known.lock();
			if !known.contains(&block.header.parent_hash) {
				return Err(ConsensusError::UnknownParent);
			}
			if !known.insert(block.hash()) {
				return Ok(ImportResult::AlreadyInChain);
			}
			Ok(ImportResult::Imported { is_new_best: true })
		}
	}

	fn block(parent: Hash, number: u32) -> Block {
		Block {
			header: Header {
				parent_hash: parent,
				number,
				state_root: Hash::zero(),
				extrinsics_root: Hash::zero(),
				digest: Digest::default(),
			},
			extrinsics: vec![],
		}
	}

	#[tokio::test]
	async fn orphan_is_imported_once_parent_arrives() {
		let genesis = Hash::repeat_byte(9);
		let queue = ImportQueue::new(Arc::new(TrackingImport::new(genesis)));

		let parent = block(genesis, 1);
		let child = block(parent.hash(), 2);

		// Child first: parked.
		let err = queue.submit(child.clone(), BlockOrigin::NetworkBroadcast).await.unwrap_err();
		assert_eq!(err, ConsensusError::UnknownParent);
		assert_eq!(queue.orphan_count(), 1);

		// Parent arrives: both land.
		queue.submit(parent, BlockOrigin::NetworkBroadcast).await.unwrap();
		assert_eq!(queue.orphan_count(), 0);
	}

	#[tokio::test]
	async fn chained_orphans_drain_in_one_pass() {
		let genesis = Hash::repeat_byte(9);
		let queue = ImportQueue::new(Arc::new(TrackingImport::new(genesis)));

		let b1 = block(genesis, 1);
		let b2 = block(b1.hash(), 2);
		let b3 = block(b2.hash(), 3);

		queue.submit(b3, BlockOrigin::NetworkBroadcast).await.unwrap_err();
		queue.submit(b2, BlockOrigin::NetworkBroadcast).await.unwrap_err();
		assert_eq!(queue.orphan_count(), 2);

		queue.submit(b1, BlockOrigin::NetworkBroadcast).await.unwrap();
		assert_eq!(queue.orphan_count(), 0);
	}

	#[tokio::test]
	async fn own_blocks_do_not_buffer() {
		let genesis = Hash::repeat_byte(9);
		let queue = ImportQueue::new(Arc::new(TrackingImport::new(genesis)));
		let orphan = block(Hash::repeat_byte(1), 5);
		queue.submit(orphan, BlockOrigin::Own).await.unwrap_err();
		assert_eq!(queue.orphan_count(), 0);
	}

	#[tokio::test]
	async fn overflow_drops_the_oldest() {
		let genesis = Hash::repeat_byte(9);
		let queue =
			ImportQueue::with_capacity(Arc::new(TrackingImport::new(genesis)), 2);

		for i in 0..3u8 {
			let orphan = block(Hash::repeat_byte(i + 10), 5);
			let _ = queue.submit(orphan, BlockOrigin::NetworkBroadcast).await;
		}
		assert_eq!(queue.orphan_count(), 2);
		assert_eq!(queue.orphans_dropped(), 1);
	}
}
