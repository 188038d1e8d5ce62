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

//! The transaction pool.
//!
//! Transactions enter with the validity the runtime reported for them and
//! leave when included in a block, re-validated away, or expired. Ready
//! ordering follows priority within the constraint of the
//! `requires`/`provides` tag graph.

use parking_lot::RwLock;
use spindle_primitives::{
	transaction::{TransactionTag, ValidTransaction},
	BlockNumber, Hash, OpaqueExtrinsic,
};
use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

const LOG_TARGET: &str = "txpool";

/// Errors of the transaction pool.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum PoolError {
	/// The transaction is already in the pool.
	#[error("transaction already in the pool")]
	AlreadyImported,
}

/// A pooled transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolTransaction {
	/// The opaque transaction data.
	pub data: OpaqueExtrinsic,
	/// The transaction hash.
	pub hash: Hash,
	/// The validity the runtime reported.
	pub validity: ValidTransaction,
	/// The block number the transaction was validated at; longevity
	/// counts from here.
	pub inserted_at: BlockNumber,
}

impl PoolTransaction {
	fn expired_at(&self, number: BlockNumber) -> bool {
		let expiry = u64::from(self.inserted_at).saturating_add(self.validity.longevity);
		u64::from(number) > expiry
	}
}

#[derive(Default)]
struct PoolInner {
	transactions: HashMap<Hash, Arc<PoolTransaction>>,
}

/// The pool.
#[derive(Default)]
pub struct TransactionPool {
	inner: RwLock<PoolInner>,
}

impl TransactionPool {
	/// Create an empty pool.
	pub fn new() -> Self {
		Self::default()
	}

	/// Submit a transaction with the validity the runtime reported at
	/// block `at`.
	pub fn submit(
		&self,
		at: BlockNumber,
		data: OpaqueExtrinsic,
		validity: ValidTransaction,
	) -> Result<Arc<PoolTransaction>, PoolError> {
		let hash = data.hash();
		let mut inner = self.inner.write();
		if inner.transactions.contains_key(&hash) {
			return Err(PoolError::AlreadyImported);
		}
		let transaction =
			Arc::new(PoolTransaction { data, hash, validity, inserted_at: at });
		inner.transactions.insert(hash, transaction.clone());
		log::trace!(target: LOG_TARGET, "imported transaction {hash:?}");
		Ok(transaction)
	}

	/// The transactions ready for inclusion, in inclusion order: highest
	/// priority first among those whose required tags are satisfied by
	/// previously emitted provides. Transactions whose requirements are
	/// never met stay behind.
	pub fn ready(&self) -> Vec<Arc<PoolTransaction>> {
		let inner = self.inner.read();
		let mut remaining: Vec<&Arc<PoolTransaction>> = inner.transactions.values().collect();
		let mut satisfied: HashSet<TransactionTag> = HashSet::new();
		let mut output = Vec::with_capacity(remaining.len());

		loop {
			// Among the transactions whose requirements are met, take the
			// highest priority; break ties by hash for determinism.
			let next = remaining
				.iter()
				.enumerate()
				.filter(|(_, tx)| {
					tx.validity.requires.iter().all(|tag| satisfied.contains(tag))
				})
				.max_by_key(|(_, tx)| (tx.validity.priority, std::cmp::Reverse(tx.hash)))
				.map(|(i, _)| i);
			let Some(index) = next else { break };
			let tx = remaining.swap_remove(index);
			satisfied.extend(tx.validity.provides.iter().cloned());
			output.push(tx.clone());
		}
		output
	}

	/// Remove transactions included in a block and those that expired at
	/// the new height.
	pub fn prune(&self, number: BlockNumber, included: &[OpaqueExtrinsic]) {
		let included: HashSet<Hash> = included.iter().map(|xt| xt.hash()).collect();
		let mut inner = self.inner.write();
		let before = inner.transactions.len();
		inner
			.transactions
			.retain(|hash, tx| !included.contains(hash) && !tx.expired_at(number));
		let removed = before - inner.transactions.len();
		if removed > 0 {
			log::debug!(target: LOG_TARGET, "pruned {removed} transactions at block {number}");
		}
	}

	/// Remove a single transaction.
	pub fn remove(&self, hash: &Hash) -> Option<Arc<PoolTransaction>> {
		self.inner.write().transactions.remove(hash)
	}

	/// Whether the pool holds the given transaction.
	pub fn contains(&self, hash: &Hash) -> bool {
		self.inner.read().transactions.contains_key(hash)
	}

	/// The number of pooled transactions.
	pub fn len(&self) -> usize {
		self.inner.read().transactions.len()
	}

	/// Whether the pool is empty.
	pub fn is_empty(&self) -> bool {
		self.inner.read().transactions.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn xt(byte: u8) -> OpaqueExtrinsic {
		OpaqueExtrinsic(vec![byte])
	}

	fn validity(priority: u64) -> ValidTransaction {
		ValidTransaction { priority, ..Default::default() }
	}

	#[test]
	fn ready_is_ordered_by_priority() {
		let pool = TransactionPool::new();
		pool.submit(0, xt(1), validity(10)).unwrap();
		pool.submit(0, xt(2), validity(30)).unwrap();
		pool.submit(0, xt(3), validity(20)).unwrap();

		let priorities: Vec<u64> =
			pool.ready().iter().map(|tx| tx.validity.priority).collect();
		assert_eq!(priorities, vec![30, 20, 10]);
	}

	#[test]
	fn requires_defer_higher_priority() {
		let pool = TransactionPool::new();
		// The highest-priority transaction depends on a tag only the
		// lowest-priority one provides.
		pool.submit(
			0,
			xt(1),
			ValidTransaction {
				priority: 100,
				requires: vec![b"tag".to_vec()],
				..Default::default()
			},
		)
		.unwrap();
		pool.submit(
			0,
			xt(2),
			ValidTransaction {
				priority: 1,
				provides: vec![b"tag".to_vec()],
				..Default::default()
			},
		)
		.unwrap();
		pool.submit(0, xt(3), validity(50)).unwrap();

		let order: Vec<u64> = pool.ready().iter().map(|tx| tx.validity.priority).collect();
		assert_eq!(order, vec![50, 1, 100]);
	}

	#[test]
	fn unmet_requirements_stay_behind() {
		let pool = TransactionPool::new();
		pool.submit(
			0,
			xt(1),
			ValidTransaction {
				priority: 5,
				requires: vec![b"never".to_vec()],
				..Default::default()
			},
		)
		.unwrap();
		pool.submit(0, xt(2), validity(1)).unwrap();
		assert_eq!(pool.ready().len(), 1);
	}

	#[test]
	fn duplicates_are_rejected() {
		let pool = TransactionPool::new();
		pool.submit(0, xt(1), validity(1)).unwrap();
		assert_eq!(pool.submit(0, xt(1), validity(1)), Err(PoolError::AlreadyImported));
	}

	#[test]
	fn included_transactions_are_pruned() {
		let pool = TransactionPool::new();
		pool.submit(0, xt(1), validity(1)).unwrap();
		pool.submit(0, xt(2), validity(1)).unwrap();
		pool.prune(1, &[xt(1)]);
		assert_eq!(pool.len(), 1);
		assert!(!pool.contains(&xt(1).hash()));
	}

	#[test]
	fn longevity_expires_transactions() {
		let pool = TransactionPool::new();
		pool.submit(
			5,
			xt(1),
			ValidTransaction { longevity: 10, ..Default::default() },
		)
		.unwrap();
		pool.prune(15, &[]);
		assert_eq!(pool.len(), 1);
		pool.prune(16, &[]);
		assert_eq!(pool.len(), 0);
	}

	#[test]
	fn propagate_flag_is_preserved() {
		let pool = TransactionPool::new();
		let tx = pool
			.submit(
				0,
				xt(1),
				ValidTransaction { propagate: false, ..Default::default() },
			)
			.unwrap();
		assert!(!tx.validity.propagate);
	}
}
