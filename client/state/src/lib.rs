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

//! The state service: the single writer of persistent chain state.
//!
//! [`Backend`] ties together the block tree, the versioned trie storage,
//! the epoch index and the transaction pool, and owns the import and
//! finality notification hubs every other service subscribes to.

pub mod blockchain;
pub mod database;
pub mod epochs;
pub mod storage;
pub mod transaction_pool;
pub mod trie;

pub use blockchain::{BlockEntry, BlockTree};
pub use database::{columns, Change, ColumnId, Database, DatabaseError, MemDb, Transaction};
pub use epochs::{EpochEntry, EpochIndex};
pub use storage::{StorageState, TrieOverlay};
pub use transaction_pool::{PoolError, PoolTransaction, TransactionPool};

use codec::Encode;
use parking_lot::RwLock;
use spindle_consensus::{FinalityNotification, ImportNotification, NotificationHub};
use spindle_consensus_primitives::{babe::BabeConfiguration, Slot};
use spindle_executor::{RuntimeCode, CODE_KEY};
use spindle_primitives::{extrinsics_root, Digest, Hash, Header};
use std::{collections::HashMap, sync::Arc};

const META_CODE_SUBSTITUTES: &[u8] = b"code_substitutes";

/// Errors of the state service.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum Error {
	/// The referenced block is not in the tree.
	#[error("unknown block {0:?}")]
	UnknownBlock(Hash),
	/// The block is already in the tree.
	#[error("block {0:?} already in the tree")]
	AlreadyInTree(Hash),
	/// No state is stored under the given root.
	#[error("unknown state root {0:?}")]
	UnknownState(Hash),
	/// No epoch data is attached to the given block.
	#[error("missing epoch data for block {0:?}")]
	MissingEpochData(Hash),
	/// A slot before the epoch of its chain.
	#[error("slot {0} is before the current epoch")]
	SlotBeforeEpoch(Slot),
	/// No runtime code at the given block.
	#[error("missing runtime code at block {0:?}")]
	MissingCode(Hash),
	/// Persisted data failed to decode; the database is damaged.
	#[error("corrupt storage: {0}")]
	Corrupt(String),
	/// The backing store failed.
	#[error("database: {0}")]
	Database(String),
}

/// The state service.
pub struct Backend {
	db: Arc<dyn Database>,
	/// The block tree.
	pub blockchain: BlockTree,
	/// Versioned trie storage.
	pub storage: StorageState,
	/// The per-block epoch index.
	pub epochs: EpochIndex,
	/// The transaction pool.
	pub pool: TransactionPool,
	/// Import notifications, published in commit order.
	pub import_notifications: NotificationHub<ImportNotification>,
	/// Finality notifications; never published before the corresponding
	/// import notification.
	pub finality_notifications: NotificationHub<FinalityNotification>,
	code_substitutes: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl Backend {
	/// Initialize the backend over a database, committing the genesis
	/// state and block.
	pub fn new(
		db: Arc<dyn Database>,
		genesis_state: Vec<(Vec<u8>, Vec<u8>)>,
	) -> Result<Arc<Self>, Error> {
		let storage = StorageState::new(db.clone());
		let state_root = storage.insert_genesis(genesis_state)?;
		let genesis_header = Header {
			parent_hash: Hash::zero(),
			number: 0,
			state_root,
			extrinsics_root: extrinsics_root(&[]),
			digest: Digest::default(),
		};
		let blockchain = BlockTree::new(db.clone(), genesis_header)?;

		Ok(Arc::new(Self {
			db,
			blockchain,
			storage,
			epochs: EpochIndex::new(),
			pool: TransactionPool::new(),
			import_notifications: NotificationHub::new(),
			finality_notifications: NotificationHub::new(),
			code_substitutes: RwLock::new(HashMap::new()),
		}))
	}

	/// Initialize an in-memory backend, for tests and development chains.
	pub fn new_in_memory(
		genesis_state: Vec<(Vec<u8>, Vec<u8>)>,
	) -> Result<Arc<Self>, Error> {
		Self::new(Arc::new(MemDb::new()), genesis_state)
	}

	/// Install the genesis epoch from the runtime configuration. Must run
	/// before the first block is imported or authored.
	pub fn initialize_genesis_epoch(&self, config: &BabeConfiguration) {
		self.epochs.set_genesis(self.blockchain.genesis_hash(), config);
	}

	/// The state root of a known block.
	pub fn state_root(&self, at: &Hash) -> Result<Hash, Error> {
		Ok(self.blockchain.header(at).ok_or(Error::UnknownBlock(*at))?.state_root)
	}

	/// Resolve the runtime code in effect at the given block: the code
	/// substitute registered for the block hash, or the nearest `:code`
	/// committed to its state.
	pub fn runtime_code(&self, at: &Hash) -> Result<RuntimeCode, Error> {
		if let Some(code) = self.code_substitutes.read().get(at) {
			return Ok(RuntimeCode::new(code.clone()));
		}
		let state_root = self.state_root(at)?;
		let code = self
			.storage
			.storage_at(&state_root, CODE_KEY)?
			.ok_or(Error::MissingCode(*at))?;
		Ok(RuntimeCode::new(code))
	}

	/// Register a runtime-code substitute for the given block hash.
	pub fn set_code_substitute(&self, at: Hash, code: Vec<u8>) -> Result<(), Error> {
		let mut substitutes = self.code_substitutes.write();
		substitutes.insert(at, code);
		let encoded: Vec<(&Hash, &Vec<u8>)> = substitutes.iter().collect();
		let mut tx = Transaction::new();
		tx.set(columns::META, META_CODE_SUBSTITUTES.to_vec(), encoded.encode());
		self.db.commit(tx).map_err(|e| Error::Database(e.to_string()))
	}

	/// Sweep caches after pruning: snapshots of removed blocks and epoch
	/// entries go away.
	pub fn sweep_pruned(&self, pruned: &[Hash]) {
		self.epochs.prune(pruned);
		// Snapshots are keyed by state root; collect the roots still
		// referenced by live headers.
		let live: std::collections::HashSet<Hash> = self
			.blockchain
			.leaves()
			.iter()
			.filter_map(|leaf| self.blockchain.header(leaf))
			.map(|h| h.state_root)
			.collect();
		let finalized_root = self.blockchain.finalized_header().state_root;
		self.storage.retain(|root| live.contains(root) || *root == finalized_root);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn genesis_pairs() -> Vec<(Vec<u8>, Vec<u8>)> {
		vec![
			(CODE_KEY.to_vec(), b"runtime code".to_vec()),
			(b"key".to_vec(), b"value".to_vec()),
		]
	}

	#[test]
	fn genesis_is_committed() {
		let backend = Backend::new_in_memory(genesis_pairs()).unwrap();
		let genesis = backend.blockchain.genesis_hash();
		assert_eq!(backend.blockchain.best_hash(), genesis);
		assert_eq!(backend.blockchain.finalized_hash(), genesis);

		let root = backend.state_root(&genesis).unwrap();
		assert_eq!(
			backend.storage.storage_at(&root, b"key").unwrap(),
			Some(b"value".to_vec())
		);
	}

	#[test]
	fn runtime_code_resolves_from_state() {
		let backend = Backend::new_in_memory(genesis_pairs()).unwrap();
		let genesis = backend.blockchain.genesis_hash();
		let code = backend.runtime_code(&genesis).unwrap();
		assert_eq!(code.code, b"runtime code".to_vec());
	}

	#[test]
	fn code_substitute_overrides_state() {
		let backend = Backend::new_in_memory(genesis_pairs()).unwrap();
		let genesis = backend.blockchain.genesis_hash();
		backend.set_code_substitute(genesis, b"replacement".to_vec()).unwrap();
		let code = backend.runtime_code(&genesis).unwrap();
		assert_eq!(code.code, b"replacement".to_vec());
	}

	#[test]
	fn missing_code_is_an_error() {
		let backend =
			Backend::new_in_memory(vec![(b"other".to_vec(), b"x".to_vec())]).unwrap();
		let genesis = backend.blockchain.genesis_hash();
		assert!(matches!(backend.runtime_code(&genesis), Err(Error::MissingCode(_))));
	}
}
