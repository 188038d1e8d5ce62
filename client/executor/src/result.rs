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

//! Decoding of the transaction-related runtime call results.

use crate::{ApiError, Error};
use codec::Decode;
use spindle_primitives::transaction::{
	TransactionValidity, TransactionValidityError, ValidTransaction,
};

/// Decode the result of `TaggedTransactionQueue_validate_transaction`:
/// a SCALE `Result<ValidTransaction, TransactionValidityError>`.
pub fn decode_validate_transaction_result(mut data: &[u8]) -> Result<TransactionValidity, Error> {
	TransactionValidity::decode(&mut data)
		.map_err(|_| Error::Api(ApiError::FailedToDecodeReturnValue))
}

/// Decode the result of `BlockBuilder_apply_extrinsic`.
///
/// The outer byte distinguishes a dispatch outcome (`0`) from an error at
/// the API boundary (`1`). Within a dispatch outcome, the second byte
/// selects the applied validity (`0`) or a transaction validity error
/// (`1`). At the API boundary only the opaque application error (`3`) has
/// a defined mapping; anything else means the return value was not
/// understood.
pub fn decode_apply_extrinsic_result(data: &[u8]) -> Result<ValidTransaction, Error> {
	match (data.first(), data.get(1)) {
		(Some(0), Some(0)) => ValidTransaction::decode(&mut &data[2..])
			.map_err(|_| Error::Api(ApiError::FailedToDecodeReturnValue)),
		(Some(0), Some(1)) => {
			let error = TransactionValidityError::decode(&mut &data[2..])
				.map_err(|_| Error::Api(ApiError::FailedToDecodeReturnValue))?;
			Err(Error::Validity(error))
		},
		(Some(1), Some(3)) => Err(Error::Api(ApiError::TransparentApi)),
		(Some(1), _) => Err(Error::Api(ApiError::FailedToDecodeReturnValue)),
		_ => Err(Error::Api(ApiError::FailedToDecodeReturnValue)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use codec::Encode;
	use spindle_primitives::transaction::{InvalidTransaction, UnknownTransaction};

	#[test]
	fn lookup_failed() {
		assert_eq!(
			decode_apply_extrinsic_result(&[0, 1, 1, 0]),
			Err(Error::Validity(TransactionValidityError::Unknown(
				UnknownTransaction::CannotLookup
			))),
		);
	}

	#[test]
	fn unexpected_transaction_call() {
		assert_eq!(
			decode_apply_extrinsic_result(&[0, 1, 0, 0]),
			Err(Error::Validity(TransactionValidityError::Invalid(InvalidTransaction::Call))),
		);
	}

	#[test]
	fn valid_path() {
		let mut data = vec![0, 0];
		data.extend(ValidTransaction::default().encode());
		assert_eq!(decode_apply_extrinsic_result(&data), Ok(ValidTransaction::default()));
	}

	#[test]
	fn api_error() {
		// Observed in the wild as the return value of a failed dispatch.
		assert_eq!(
			decode_apply_extrinsic_result(&[1, 0, 5]),
			Err(Error::Api(ApiError::FailedToDecodeReturnValue)),
		);
	}

	#[test]
	fn application_error_is_transparent() {
		assert_eq!(
			decode_apply_extrinsic_result(&[1, 3]),
			Err(Error::Api(ApiError::TransparentApi)),
		);
	}

	#[test]
	fn garbage_fails_to_decode() {
		assert_eq!(
			decode_apply_extrinsic_result(&[]),
			Err(Error::Api(ApiError::FailedToDecodeReturnValue)),
		);
		assert_eq!(
			decode_apply_extrinsic_result(&[0, 9]),
			Err(Error::Api(ApiError::FailedToDecodeReturnValue)),
		);
	}

	#[test]
	fn validate_transaction_decodes_a_full_validity() {
		// priority = 1000, one require and one provide tag, longevity =
		// 64, propagate = true.
		let mut data = vec![0x00];
		data.extend(0x3e8u64.to_le_bytes());
		// requires: one 2-byte tag.
		data.extend([0x04, 0x08, 0xaa, 0xbb]);
		// provides: one 1-byte tag.
		data.extend([0x04, 0x04, 0xcc]);
		data.extend([0x40, 0, 0, 0, 0, 0, 0, 0]);
		data.push(0x01);

		let validity = decode_validate_transaction_result(&data).unwrap().unwrap();
		assert_eq!(validity.priority, 1000);
		assert_eq!(validity.requires, vec![vec![0xaa, 0xbb]]);
		assert_eq!(validity.provides, vec![vec![0xcc]]);
		assert_eq!(validity.longevity, 64);
		assert!(validity.propagate);
	}

	#[test]
	fn validate_transaction_decodes_errors() {
		let stale: TransactionValidity =
			Err(TransactionValidityError::Invalid(InvalidTransaction::Stale));
		assert_eq!(decode_validate_transaction_result(&stale.encode()), Ok(stale));
	}

	#[test]
	fn validity_roundtrip() {
		let validity = ValidTransaction {
			priority: 5,
			requires: vec![vec![1]],
			provides: vec![vec![2]],
			longevity: 3,
			propagate: false,
		};
		assert_eq!(
			ValidTransaction::decode(&mut &validity.encode()[..]).unwrap(),
			validity
		);
	}
}
