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

//! The column key-value store the node persists into.
//!
//! A production deployment plugs a disk-backed implementation in behind
//! [`Database`]; [`MemDb`] implements the same contract in memory.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// A column identifier.
pub type ColumnId = u32;

/// The columns of the Spindle database.
pub mod columns {
	use super::ColumnId;

	/// Block headers, keyed by block hash.
	pub const HEADERS: ColumnId = 0;
	/// Block bodies, keyed by block hash.
	pub const BODIES: ColumnId = 1;
	/// Finality justifications, keyed by block hash.
	pub const JUSTIFICATIONS: ColumnId = 2;
	/// Trie nodes and state snapshots.
	pub const STATE: ColumnId = 3;
	/// Chain metadata: best hash, finalized hash, genesis hash, code
	/// substitutes.
	pub const META: ColumnId = 4;
	/// Persistent offchain storage.
	pub const OFFCHAIN: ColumnId = 5;
}

/// A single change in a [`Transaction`].
#[derive(Clone, Debug)]
pub enum Change {
	/// Insert or overwrite a value.
	Set(ColumnId, Vec<u8>, Vec<u8>),
	/// Remove a value.
	Remove(ColumnId, Vec<u8>),
}

/// An ordered batch of changes, committed atomically.
#[derive(Clone, Debug, Default)]
pub struct Transaction(pub Vec<Change>);

impl Transaction {
	/// Create an empty transaction.
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a set.
	pub fn set(&mut self, col: ColumnId, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
		self.0.push(Change::Set(col, key.into(), value.into()));
	}

	/// Append a removal.
	pub fn remove(&mut self, col: ColumnId, key: impl Into<Vec<u8>>) {
		self.0.push(Change::Remove(col, key.into()));
	}
}

/// Errors of the backing store.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("database error: {0}")]
pub struct DatabaseError(pub String);

/// The persistence contract of the state backend.
pub trait Database: Send + Sync {
	/// Commit a batch of changes atomically.
	fn commit(&self, transaction: Transaction) -> Result<(), DatabaseError>;

	/// Read a value.
	fn get(&self, col: ColumnId, key: &[u8]) -> Option<Vec<u8>>;

	/// Whether a key exists.
	fn contains(&self, col: ColumnId, key: &[u8]) -> bool {
		self.get(col, key).is_some()
	}
}

/// This implements [`Database`] as an in-memory map per column.
#[derive(Default)]
pub struct MemDb(RwLock<HashMap<ColumnId, BTreeMap<Vec<u8>, Vec<u8>>>>);

impl MemDb {
	/// Create a new instance.
	pub fn new() -> Self {
		Self::default()
	}

	/// Count the number of values in a column.
	pub fn count(&self, col: ColumnId) -> usize {
		self.0.read().get(&col).map(|c| c.len()).unwrap_or(0)
	}
}

impl Database for MemDb {
	fn commit(&self, transaction: Transaction) -> Result<(), DatabaseError> {
		let mut columns = self.0.write();
		for change in transaction.0 {
			match change {
				Change::Set(col, key, value) => {
					columns.entry(col).or_default().insert(key, value);
				},
				Change::Remove(col, key) => {
					columns.entry(col).or_default().remove(&key);
				},
			}
		}
		Ok(())
	}

	fn get(&self, col: ColumnId, key: &[u8]) -> Option<Vec<u8>> {
		self.0.read().get(&col).and_then(|c| c.get(key).cloned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_and_remove() {
		let db = MemDb::new();
		let mut tx = Transaction::new();
		tx.set(columns::META, &b"a"[..], &b"1"[..]);
		tx.set(columns::META, &b"b"[..], &b"2"[..]);
		db.commit(tx).unwrap();
		assert_eq!(db.get(columns::META, b"a"), Some(b"1".to_vec()));
		assert_eq!(db.count(columns::META), 2);

		let mut tx = Transaction::new();
		tx.remove(columns::META, &b"a"[..]);
		db.commit(tx).unwrap();
		assert!(!db.contains(columns::META, b"a"));
	}

	#[test]
	fn columns_are_disjoint() {
		let db = MemDb::new();
		let mut tx = Transaction::new();
		tx.set(columns::HEADERS, &b"k"[..], &b"h"[..]);
		tx.set(columns::BODIES, &b"k"[..], &b"b"[..]);
		db.commit(tx).unwrap();
		assert_eq!(db.get(columns::HEADERS, b"k"), Some(b"h".to_vec()));
		assert_eq!(db.get(columns::BODIES, b"k"), Some(b"b".to_vec()));
	}

	#[test]
	fn later_changes_win_within_a_transaction() {
		let db = MemDb::new();
		let mut tx = Transaction::new();
		tx.set(columns::META, &b"k"[..], &b"1"[..]);
		tx.set(columns::META, &b"k"[..], &b"2"[..]);
		db.commit(tx).unwrap();
		assert_eq!(db.get(columns::META, b"k"), Some(b"2".to_vec()));
	}
}
