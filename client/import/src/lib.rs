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

//! The block-import pipeline.
//!
//! [`BlockImporter`] is the only way blocks enter the chain: it checks
//! parentage, slot claim, seal and equivocations, executes the block
//! through the runtime against the parent state, requires the resulting
//! root to match the header, commits, advances the fork choice, feeds the
//! digests to the digest handler and publishes notifications in commit
//! order. It also implements the finalize path GRANDPA drives.

mod digest;
mod metrics;

pub use digest::DigestHandler;
pub use metrics::Metrics;

use parking_lot::Mutex;
use prometheus::Registry;
use spindle_babe::BabeVerifier;
use spindle_consensus::{
	BlockImport, BlockOrigin, ConsensusError, FinalityFailure, FinalityNotification, Finalizer,
	ImportNotification, ImportResult, VerifyFailure,
};
use spindle_consensus_primitives::{babe::AuthorityIndex, Slot};
use spindle_executor::{Externalities as _, HostContext, RuntimeCache};
use spindle_grandpa::{decode_and_verify_justification, SharedAuthoritySet, VoterSet};
use spindle_offchain::HttpSetHandle;
use spindle_primitives::{Block, Hash};
use spindle_state::Backend;
use std::{collections::HashMap, sync::Arc};

const LOG_TARGET: &str = "import";

/// The block-import pipeline.
pub struct BlockImporter {
	backend: Arc<Backend>,
	runtime: Arc<RuntimeCache>,
	verifier: BabeVerifier,
	authority_set: SharedAuthoritySet,
	offchain: Option<HttpSetHandle>,
	metrics: Option<Metrics>,
	// Serializes commits so that subscribers observe them in commit
	// order.
	import_lock: tokio::sync::Mutex<()>,
	// First block seen per (slot, authority); a second one is an
	// equivocation.
	slot_claims: Mutex<HashMap<(Slot, AuthorityIndex), Hash>>,
}

impl BlockImporter {
	/// Create the pipeline over the given backend and runtime.
	pub fn new(
		backend: Arc<Backend>,
		runtime: Arc<RuntimeCache>,
		authority_set: SharedAuthoritySet,
	) -> Self {
		Self {
			verifier: BabeVerifier::new(backend.clone()),
			backend,
			runtime,
			authority_set,
			offchain: None,
			metrics: None,
			import_lock: tokio::sync::Mutex::new(()),
			slot_claims: Mutex::new(HashMap::new()),
		}
	}

	/// Attach the offchain HTTP set handed to runtime calls.
	pub fn with_offchain(mut self, offchain: HttpSetHandle) -> Self {
		self.offchain = Some(offchain);
		self
	}

	/// Register and attach import metrics.
	pub fn with_metrics(mut self, registry: &Registry) -> Result<Self, prometheus::Error> {
		self.metrics = Some(Metrics::register(registry)?);
		Ok(self)
	}

	fn reject<T>(&self, error: ConsensusError) -> Result<T, ConsensusError> {
		if let Some(metrics) = &self.metrics {
			metrics.blocks_rejected.inc();
		}
		Err(error)
	}
}

fn map_verify_error(error: spindle_babe::Error) -> ConsensusError {
	use spindle_babe::Error as E;
	match error {
		E::UnknownParent(_) => ConsensusError::UnknownParent,
		E::Unsealed(_) | E::BadSeal(_) => ConsensusError::VerifyFailed(VerifyFailure::Seal),
		E::BadVrf(_) | E::SecondarySlotsDisabled | E::WrongSecondaryAuthor(..) => {
			ConsensusError::VerifyFailed(VerifyFailure::Vrf)
		},
		E::MissingPreDigest
		| E::MultiplePreDigests
		| E::BadAuthorityIndex(_)
		| E::AuthorityDisabled(_)
		| E::SlotNotIncreasing { .. } => ConsensusError::VerifyFailed(VerifyFailure::Digest),
		E::State(spindle_state::Error::SlotBeforeEpoch(_))
		| E::State(spindle_state::Error::MissingEpochData(_)) => {
			ConsensusError::VerifyFailed(VerifyFailure::Digest)
		},
		E::State(e) => ConsensusError::StorageIo(e.to_string()),
		E::Executor(e) => ConsensusError::ExecutionFailed(e.to_string()),
		E::Import(e) => e,
	}
}

#[async_trait::async_trait]
impl BlockImport for BlockImporter {
	async fn import_block(
		&self,
		block: Block,
		origin: BlockOrigin,
	) -> Result<ImportResult, ConsensusError> {
		let _commit_guard = self.import_lock.lock().await;

		let hash = block.hash();
		if self.backend.blockchain.contains(&hash) {
			return Ok(ImportResult::AlreadyInChain);
		}
		let Some(parent) = self.backend.blockchain.header(&block.header.parent_hash) else {
			return Err(ConsensusError::UnknownParent);
		};
		if block.header.number != parent.number + 1 {
			return self.reject(ConsensusError::VerifyFailed(VerifyFailure::Header));
		}

		let verified = match self.verifier.verify_header(&block.header) {
			Ok(verified) => verified,
			Err(error) => {
				log::debug!(target: LOG_TARGET, "verification of {hash:?} failed: {error}");
				return self.reject(map_verify_error(error));
			},
		};

		let slot = verified.pre_digest.slot();
		let authority_index = verified.pre_digest.authority_index();
		{
			let mut claims = self.slot_claims.lock();
			match claims.get(&(slot, authority_index)) {
				Some(existing) if *existing != hash => {
					log::warn!(
						target: LOG_TARGET,
						"authority {authority_index} equivocated at slot {slot}: \
						 {existing:?} and {hash:?}",
					);
					return self.reject(ConsensusError::VerifyFailed(VerifyFailure::Digest));
				},
				_ => {
					claims.insert((slot, authority_index), hash);
				},
			}
		}

		// Execute against the parent state; the committed root must be
		// exactly the one the header claims.
		let code = self
			.backend
			.runtime_code(&block.header.parent_hash)
			.map_err(|e| ConsensusError::StorageIo(e.to_string()))?;
		let mut overlay = self
			.backend
			.storage
			.overlay_at(&parent.state_root)
			.map_err(|e| ConsensusError::StorageIo(e.to_string()))?;
		{
			let mut context = HostContext::new(&mut overlay);
			if let Some(offchain) = &self.offchain {
				context = context.with_offchain(offchain.clone());
			}
			let pre_block =
				Block { header: verified.pre_header.clone(), extrinsics: block.extrinsics.clone() };
			if let Err(error) = self.runtime.core_execute_block(&code, &mut context, &pre_block) {
				log::debug!(target: LOG_TARGET, "execution of {hash:?} failed: {error}");
				return self.reject(ConsensusError::ExecutionFailed(error.to_string()));
			}
		}
		if overlay.storage_root() != block.header.state_root {
			log::debug!(
				target: LOG_TARGET,
				"state root mismatch in {hash:?}: got {:?}, header says {:?}",
				overlay.storage_root(),
				block.header.state_root,
			);
			return self.reject(ConsensusError::VerifyFailed(VerifyFailure::StateRoot));
		}

		self.backend
			.storage
			.commit_overlay(overlay)
			.map_err(|e| ConsensusError::StorageIo(e.to_string()))?;
		let is_new_best = self
			.backend
			.blockchain
			.insert(
				block.header.clone(),
				block.extrinsics.clone(),
				verified.pre_digest.is_primary(),
				slot,
			)
			.map_err(|e| ConsensusError::StorageIo(e.to_string()))?;

		let entry = DigestHandler::handle(&block.header, verified.epoch_entry, &self.authority_set);
		self.backend.epochs.insert(hash, entry);
		self.backend.pool.prune(block.header.number, &block.extrinsics);

		if let Some(metrics) = &self.metrics {
			metrics.blocks_imported.inc();
		}
		log::info!(
			target: LOG_TARGET,
			"imported block {} ({hash:?}), best: {is_new_best}",
			block.header.number,
		);
		self.backend.import_notifications.notify(ImportNotification {
			hash,
			header: block.header,
			origin,
			is_new_best,
		});
		Ok(ImportResult::Imported { is_new_best })
	}
}

#[async_trait::async_trait]
impl Finalizer for BlockImporter {
	async fn finalize_block(
		&self,
		hash: Hash,
		justification: Option<Vec<u8>>,
	) -> Result<(), ConsensusError> {
		let _commit_guard = self.import_lock.lock().await;

		let Some(header) = self.backend.blockchain.header(&hash) else {
			return Err(ConsensusError::FinalityRejected(FinalityFailure::BadJustification(
				format!("unknown block {hash:?}"),
			)));
		};
		let finalized = self.backend.blockchain.finalized_header();
		if header.number <= finalized.number
			|| !self.backend.blockchain.is_descendant_of(&finalized.hash(), &hash)
		{
			return Err(ConsensusError::FinalityRejected(FinalityFailure::BelowFinalized));
		}

		if let Some(encoded) = &justification {
			let voters = VoterSet::new(self.authority_set.current_authorities());
			decode_and_verify_justification(
				encoded,
				hash,
				header.number,
				self.authority_set.set_id(),
				&voters,
				&self.backend.blockchain,
			)
			.map_err(|e| {
				ConsensusError::FinalityRejected(FinalityFailure::BadJustification(e.to_string()))
			})?;
		}

		let pruned = self
			.backend
			.blockchain
			.finalize(hash, justification.as_deref())
			.map_err(|e| ConsensusError::StorageIo(e.to_string()))?;
		self.backend.sweep_pruned(&pruned);
		self.slot_claims.lock().retain(|_, block| self.backend.blockchain.contains(block));

		// Apply any authority-set transition triggered by this height.
		let changed = self.authority_set.with_mut(|set| set.apply_finalized(header.number));
		if changed {
			log::info!(
				target: LOG_TARGET,
				"authority set advanced to id {} at finalized block {}",
				self.authority_set.set_id(),
				header.number,
			);
		}

		if let Some(metrics) = &self.metrics {
			metrics.finalized_height.set(i64::from(header.number));
		}
		log::info!(target: LOG_TARGET, "finalized block {} ({hash:?})", header.number);
		self.backend
			.finality_notifications
			.notify(FinalityNotification { hash, header });
		Ok(())
	}
}
