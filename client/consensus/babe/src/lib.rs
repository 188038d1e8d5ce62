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

//! BABE: slot-based block production.
//!
//! The worker instantiates one [`EpochHandler`] per epoch. The handler
//! eagerly claims every slot of the epoch with the local key, then wakes
//! at each claimed slot boundary to build a block on the current best
//! chain and submit it to the import pipeline. Epoch transitions follow
//! the epoch index maintained by the digest handler at import time.

mod authorship;
mod epoch_handler;
mod error;
mod verify;

pub use authorship::{claim_slot, Proposer};
pub use epoch_handler::{Constants, EpochHandler, SlotHandler};
pub use error::Error;
pub use verify::{BabeVerifier, VerifiedHeader};

use futures::StreamExt;
use spindle_consensus::{BlockImport, BlockOrigin, Network};
use spindle_consensus_primitives::{
	babe::{AuthorityIndex, PreDigest},
	slots::{current_slot, time_until_slot},
	Slot, SlotDuration,
};
use spindle_executor::RuntimeCache;
use spindle_primitives::sr25519;
use spindle_state::Backend;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "babe";

/// Everything the BABE worker needs.
pub struct BabeParams {
	/// The authoring key; without one the worker exits immediately.
	pub keypair: Option<Arc<sr25519::Pair>>,
	/// The state backend.
	pub backend: Arc<Backend>,
	/// The runtime executor.
	pub runtime: Arc<RuntimeCache>,
	/// Where authored blocks are submitted.
	pub block_import: Arc<dyn BlockImport>,
	/// Where authored blocks are announced.
	pub network: Arc<dyn Network>,
	/// The chain's slot duration.
	pub slot_duration: SlotDuration,
	/// The chain's epoch length in slots.
	pub epoch_length: u64,
	/// Whether to author on top of a bare genesis without waiting for a
	/// peer's block first.
	pub lead: bool,
}

/// Run the BABE worker until cancelled.
pub async fn run_babe_worker(params: BabeParams, cancel: CancellationToken) {
	let Some(keypair) = params.keypair.clone() else {
		log::info!(target: LOG_TARGET, "no authoring key, BABE worker idle");
		return;
	};

	let constants = Constants {
		slot_duration: params.slot_duration,
		epoch_length: params.epoch_length,
	};
	let handler: Arc<dyn SlotHandler> = Arc::new(AuthoringHandler {
		proposer: Proposer::new(
			params.backend.clone(),
			params.runtime.clone(),
			params.slot_duration,
		),
		backend: params.backend.clone(),
		block_import: params.block_import.clone(),
		network: params.network.clone(),
		keypair: keypair.clone(),
	});

	// A follower waits for the chain to move before claiming slots, so
	// that a freshly joined authority does not fork off genesis.
	if !params.lead && params.backend.blockchain.best_header().number == 0 {
		log::info!(target: LOG_TARGET, "waiting for the first imported block before authoring");
		let mut imports = params.backend.import_notifications.subscribe();
		tokio::select! {
			_ = cancel.cancelled() => return,
			_ = imports.next() => {},
		}
	}

	let (error_tx, mut error_rx) = mpsc::unbounded_channel();
	let error_logger = tokio::spawn(async move {
		while let Some(error) = error_rx.recv().await {
			log::warn!(target: LOG_TARGET, "slot handling error: {error}");
		}
	});

	loop {
		let best = params.backend.blockchain.best_hash();
		let slot_now = current_slot(params.slot_duration);
		let entry = match params.backend.epochs.epoch_for_child(&best, slot_now) {
			Ok(entry) => entry,
			Err(error) => {
				log::error!(target: LOG_TARGET, "cannot resolve current epoch: {error}");
				break;
			},
		};
		let epoch = entry.current.clone();
		let first_slot = epoch.start_slot.max(slot_now);

		let epoch_handler = EpochHandler::new(
			epoch.epoch_index,
			first_slot,
			&epoch,
			constants,
			handler.clone(),
			&keypair,
		);
		log::info!(
			target: LOG_TARGET,
			"entering epoch {} at slot {first_slot} with {} claimed slots",
			epoch.epoch_index,
			epoch_handler.claimed_slots(),
		);

		let epoch_end = time_until_slot(epoch.end_slot(), params.slot_duration);
		tokio::select! {
			_ = cancel.cancelled() => break,
			// The wall clock crossed into the next epoch.
			_ = tokio::time::sleep(epoch_end) => {},
			// All claimed slots of the window were handled early.
			_ = epoch_handler.run(error_tx.clone()) => {
				// Wait out the rest of the epoch before transitioning.
				tokio::select! {
					_ = cancel.cancelled() => break,
					_ = tokio::time::sleep(
						time_until_slot(epoch.end_slot(), params.slot_duration),
					) => {},
				}
			},
		}
	}

	drop(error_tx);
	let _ = error_logger.await;
	log::info!(target: LOG_TARGET, "BABE worker stopped");
}

/// The production slot handler: builds a block on the best chain and
/// submits it.
struct AuthoringHandler {
	proposer: Proposer,
	backend: Arc<Backend>,
	block_import: Arc<dyn BlockImport>,
	network: Arc<dyn Network>,
	keypair: Arc<sr25519::Pair>,
}

#[async_trait::async_trait]
impl SlotHandler for AuthoringHandler {
	async fn handle_slot(
		&self,
		epoch: u64,
		slot: Slot,
		_authority_index: AuthorityIndex,
		pre_digest: PreDigest,
	) -> Result<(), Error> {
		let parent = self.backend.blockchain.best_header();
		log::debug!(
			target: LOG_TARGET,
			"authoring at slot {slot} of epoch {epoch} on top of {:?}",
			parent.hash(),
		);

		let block = self.proposer.propose(&parent, &pre_digest, &self.keypair)?;
		self.block_import.import_block(block.clone(), BlockOrigin::Own).await?;
		self.network.announce_block(block);
		Ok(())
	}
}
