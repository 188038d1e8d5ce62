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

//! Transaction validity interface.

use codec::{Decode, Encode};

/// The priority of a transaction, used to order transactions in the pool.
pub type TransactionPriority = u64;

/// A tag on a transaction, encoding a dependency or a provision.
pub type TransactionTag = Vec<u8>;

/// How long a transaction remains valid, counted in blocks from the block
/// at which it was validated.
pub type TransactionLongevity = u64;

/// Information on a valid transaction.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct ValidTransaction {
	/// The priority of the transaction.
	///
	/// Priority determines the ordering of two transactions that have all
	/// their dependencies (required tags) satisfied.
	pub priority: TransactionPriority,
	/// Transaction dependencies.
	///
	/// A non-empty list signifies that some other transactions which provide
	/// given tags are required to be included before this one.
	pub requires: Vec<TransactionTag>,
	/// Provided tags.
	///
	/// A list of tags this transaction provides. Successfully importing the
	/// transaction will enable other transactions that depend on these tags.
	pub provides: Vec<TransactionTag>,
	/// Transaction longevity.
	pub longevity: TransactionLongevity,
	/// A flag indicating if the transaction should be propagated to other
	/// peers.
	pub propagate: bool,
}

impl Default for ValidTransaction {
	fn default() -> Self {
		Self {
			priority: 0,
			requires: vec![],
			provides: vec![],
			longevity: TransactionLongevity::MAX,
			propagate: true,
		}
	}
}

/// An invalid transaction validity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, thiserror::Error)]
pub enum InvalidTransaction {
	/// The call of the transaction is not expected.
	#[codec(index = 0)]
	#[error("transaction call is not expected")]
	Call,
	/// General error to do with the inability to pay some fees.
	#[codec(index = 1)]
	#[error("inability to pay some fees")]
	Payment,
	/// General error to do with the transaction not yet being valid.
	#[codec(index = 2)]
	#[error("transaction will be valid in the future")]
	Future,
	/// General error to do with the transaction being outdated.
	#[codec(index = 3)]
	#[error("transaction is outdated")]
	Stale,
	/// General error to do with the transaction's proofs.
	#[codec(index = 4)]
	#[error("invalid transaction proof")]
	BadProof,
	/// The transaction birth block is ancient.
	#[codec(index = 5)]
	#[error("ancient birth block")]
	AncientBirthBlock,
	/// The transaction would exhaust the resources of the current block.
	#[codec(index = 6)]
	#[error("transaction would exhaust block resources")]
	ExhaustsResources,
	/// Any other custom invalid validity.
	#[codec(index = 7)]
	#[error("unknown invalidity: {0}")]
	Custom(u8),
	/// An extrinsic with mandatory dispatch resulted in an error.
	#[codec(index = 8)]
	#[error("mandatory dispatch error")]
	Mandatory,
	/// A transaction with mandatory dispatch tried to be validated.
	#[codec(index = 9)]
	#[error("mandatory dispatch is not validated")]
	BadMandatory,
}

/// An unknown transaction validity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, thiserror::Error)]
pub enum UnknownTransaction {
	/// Could not lookup some information required to validate the
	/// transaction.
	#[codec(index = 0)]
	#[error("lookup failed")]
	CannotLookup,
	/// No validator found for the given unsigned transaction.
	#[codec(index = 1)]
	#[error("no unsigned validator")]
	NoUnsignedValidator,
	/// Any other custom unknown validity.
	#[codec(index = 2)]
	#[error("unknown transaction validity: {0}")]
	Custom(u8),
}

/// Errors that can occur while checking the validity of a transaction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, thiserror::Error)]
pub enum TransactionValidityError {
	/// The transaction is invalid.
	#[codec(index = 0)]
	#[error("invalid transaction: {0}")]
	Invalid(#[from] InvalidTransaction),
	/// Transaction validity can't be determined.
	#[codec(index = 1)]
	#[error("unknown transaction validity: {0}")]
	Unknown(#[from] UnknownTransaction),
}

/// The result of the runtime checking a transaction's validity.
pub type TransactionValidity = Result<ValidTransaction, TransactionValidityError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn valid_transaction_roundtrip() {
		let v = ValidTransaction {
			priority: 1000,
			requires: vec![vec![1, 2]],
			provides: vec![vec![3, 4], vec![5]],
			longevity: 64,
			propagate: true,
		};
		let encoded = v.encode();
		assert_eq!(ValidTransaction::decode(&mut &encoded[..]).unwrap(), v);
	}

	#[test]
	fn error_discriminants_are_pinned() {
		assert_eq!(InvalidTransaction::Call.encode(), vec![0]);
		assert_eq!(InvalidTransaction::ExhaustsResources.encode(), vec![6]);
		assert_eq!(InvalidTransaction::Custom(42).encode(), vec![7, 42]);
		assert_eq!(InvalidTransaction::BadMandatory.encode(), vec![9]);
		assert_eq!(UnknownTransaction::CannotLookup.encode(), vec![0]);
		assert_eq!(UnknownTransaction::Custom(7).encode(), vec![2, 7]);
		assert_eq!(
			TransactionValidityError::Invalid(InvalidTransaction::Call).encode(),
			vec![0, 0]
		);
		assert_eq!(
			TransactionValidityError::Unknown(UnknownTransaction::CannotLookup).encode(),
			vec![1, 0]
		);
	}

	#[test]
	fn validity_result_roundtrip() {
		let validity: TransactionValidity = Ok(ValidTransaction::default());
		let encoded = validity.encode();
		assert_eq!(TransactionValidity::decode(&mut &encoded[..]).unwrap(), validity);

		let invalid: TransactionValidity =
			Err(TransactionValidityError::Invalid(InvalidTransaction::Stale));
		let encoded = invalid.encode();
		assert_eq!(TransactionValidity::decode(&mut &encoded[..]).unwrap(), invalid);
	}
}
