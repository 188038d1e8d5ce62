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

//! The per-epoch slot loop.
//!
//! At epoch entry every slot of the epoch is mapped to its pre-runtime
//! digest eagerly; the loop then sleeps to each claimed slot boundary and
//! hands the claim to the slot handler. Slots whose start has already
//! passed are skipped, and handler errors are reported without stopping
//! the loop.

use crate::{authorship::claim_slot, Error};
use spindle_consensus_primitives::{
	babe::{AuthorityIndex, Epoch, PreDigest},
	slots::{current_slot, time_until_slot},
	Slot, SlotDuration,
};
use spindle_primitives::sr25519;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::mpsc;

const LOG_TARGET: &str = "babe";

/// The timing constants of the chain.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Constants {
	/// The slot duration.
	pub slot_duration: SlotDuration,
	/// The number of slots per epoch.
	pub epoch_length: u64,
}

/// What to do when an owned slot arrives.
#[async_trait::async_trait]
pub trait SlotHandler: Send + Sync {
	/// Handle an owned slot: pick a parent, build a block, seal it and
	/// submit it for import.
	async fn handle_slot(
		&self,
		epoch: u64,
		slot: Slot,
		authority_index: AuthorityIndex,
		pre_digest: PreDigest,
	) -> Result<(), Error>;
}

/// Drives the slots of a single epoch.
pub struct EpochHandler {
	epoch_index: u64,
	first_slot: Slot,
	constants: Constants,
	slot_to_pre_digest: BTreeMap<Slot, PreDigest>,
	handler: Arc<dyn SlotHandler>,
}

impl EpochHandler {
	/// Create a handler for the epoch starting at `first_slot`, eagerly
	/// claiming every slot in `first_slot..first_slot + epoch_length`.
	pub fn new(
		epoch_index: u64,
		first_slot: Slot,
		epoch: &Epoch,
		constants: Constants,
		handler: Arc<dyn SlotHandler>,
		keypair: &sr25519::Pair,
	) -> Self {
		let mut slot_to_pre_digest = BTreeMap::new();
		for i in 0..constants.epoch_length {
			let slot = first_slot.saturating_add(i);
			if let Some(pre_digest) = claim_slot(epoch, slot, keypair) {
				slot_to_pre_digest.insert(slot, pre_digest);
			}
		}
		log::debug!(
			target: LOG_TARGET,
			"epoch {epoch_index}: claimed {} of {} slots from {first_slot}",
			slot_to_pre_digest.len(),
			constants.epoch_length,
		);
		Self { epoch_index, first_slot, constants, slot_to_pre_digest, handler }
	}

	/// The epoch this handler drives.
	pub fn epoch_index(&self) -> u64 {
		self.epoch_index
	}

	/// The first slot of the window this handler covers.
	pub fn first_slot(&self) -> Slot {
		self.first_slot
	}

	/// The number of slots claimed in this epoch.
	pub fn claimed_slots(&self) -> usize {
		self.slot_to_pre_digest.len()
	}

	/// Work through the epoch's claimed slots in order. Handler errors go
	/// to `errors`; the loop only ends when the window is exhausted (or
	/// the surrounding task is dropped).
	pub async fn run(self, errors: mpsc::UnboundedSender<Error>) {
		for (slot, pre_digest) in self.slot_to_pre_digest {
			// A slot whose start already passed is lost; move on to the
			// next reachable one.
			if slot < current_slot(self.constants.slot_duration) {
				continue;
			}
			tokio::time::sleep(time_until_slot(slot, self.constants.slot_duration)).await;

			let authority_index = pre_digest.authority_index();
			if let Err(error) = self
				.handler
				.handle_slot(self.epoch_index, slot, authority_index, pre_digest)
				.await
			{
				log::warn!(target: LOG_TARGET, "failed to handle slot {slot}: {error}");
				let _ = errors.send(error);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use spindle_consensus_primitives::babe::BabeEpochConfiguration;
	use spindle_primitives::Keyring;

	fn test_epoch() -> Epoch {
		Epoch {
			epoch_index: 1,
			start_slot: 0.into(),
			duration: 200,
			authorities: vec![(Keyring::Alice.sr25519_public(), 1)],
			randomness: [0; 32],
			config: BabeEpochConfiguration { threshold: u128::MAX, secondary_slots: 1 },
		}
	}

	struct CountingHandler {
		calls: Mutex<Vec<(u64, Slot, AuthorityIndex)>>,
	}

	#[async_trait::async_trait]
	impl SlotHandler for CountingHandler {
		async fn handle_slot(
			&self,
			epoch: u64,
			slot: Slot,
			authority_index: AuthorityIndex,
			_pre_digest: PreDigest,
		) -> Result<(), Error> {
			self.calls.lock().push((epoch, slot, authority_index));
			Ok(())
		}
	}

	#[test]
	fn new_epoch_handler_claims_the_whole_window() {
		let constants = Constants {
			slot_duration: SlotDuration::from_millis(6_000),
			epoch_length: 200,
		};
		let handler = Arc::new(CountingHandler { calls: Mutex::new(Vec::new()) });
		let epoch_handler = EpochHandler::new(
			1,
			9999.into(),
			&test_epoch(),
			constants,
			handler,
			&Keyring::Alice.sr25519_pair(),
		);
		assert_eq!(epoch_handler.claimed_slots(), 200);
		assert_eq!(epoch_handler.epoch_index(), 1);
		assert_eq!(epoch_handler.first_slot(), 9999.into());
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn run_handles_every_remaining_slot_exactly_once() {
		const EPOCH_LENGTH: u64 = 100;
		let slot_duration = SlotDuration::from_millis(10);
		let constants = Constants { slot_duration, epoch_length: EPOCH_LENGTH };
		let start_slot = current_slot(slot_duration);

		let handler = Arc::new(CountingHandler { calls: Mutex::new(Vec::new()) });
		let epoch_handler = EpochHandler::new(
			1,
			start_slot,
			&test_epoch(),
			constants,
			handler.clone(),
			&Keyring::Alice.sr25519_pair(),
		);
		assert_eq!(epoch_handler.claimed_slots() as u64, EPOCH_LENGTH);

		let (errors, mut error_rx) = mpsc::unbounded_channel();
		let run = tokio::spawn(epoch_handler.run(errors));
		tokio::time::sleep(slot_duration.as_duration() * EPOCH_LENGTH as u32).await;
		run.abort();
		assert!(error_rx.try_recv().is_err(), "no handler errors expected");

		let calls = handler.calls.lock();
		assert!(!calls.is_empty());
		let first_executed = calls[0].1;
		// Every slot from the first executed one to the end of the window
		// was handled, contiguously.
		assert_eq!(
			calls.len() as u64,
			EPOCH_LENGTH - (u64::from(first_executed) - u64::from(start_slot)),
		);
		for (i, (epoch, slot, authority_index)) in calls.iter().enumerate() {
			assert_eq!(*epoch, 1);
			assert_eq!(*authority_index, 0);
			assert_eq!(u64::from(*slot), u64::from(first_executed) + i as u64);
		}
	}
}
