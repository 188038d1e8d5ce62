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

//! The GRANDPA voter task.
//!
//! Rounds progress monotonically through prevote, precommit and finalize
//! phases. A round without a supermajority is retried rather than
//! advanced; the round number only moves forward once a precommit
//! supermajority was observed. Authority-set changes applied by the
//! finalize path reset the voter into round 1 of the new set.

use crate::{
	build_justification, verify_justification, RoundState, SharedAuthoritySet, VoterSet,
};
use codec::Encode;
use futures::{channel::mpsc::UnboundedReceiver, StreamExt};
use spindle_consensus::{Finalizer, Network};
use spindle_consensus_primitives::grandpa::{
	CommitMessage, GossipMessage, GrandpaJustification, Message, Precommit, Prevote,
	RoundNumber, SignedMessage,
};
use spindle_primitives::{ed25519, BlockNumber, Hash};
use spindle_state::Backend;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "grandpa";

/// Everything the GRANDPA voter needs.
pub struct GrandpaParams {
	/// The voting key; without one (or with a key outside the set) the
	/// task only observes commits.
	pub keypair: Option<Arc<ed25519::Pair>>,
	/// The state backend.
	pub backend: Arc<Backend>,
	/// The shared authority set, mutated by the finalize path.
	pub authority_set: SharedAuthoritySet,
	/// The gossip network.
	pub network: Arc<dyn Network>,
	/// Where finalizations are submitted.
	pub finalizer: Arc<dyn Finalizer>,
	/// How long to wait for votes in each phase before retrying.
	pub round_interval: Duration,
}

/// Run the GRANDPA voter until cancelled.
pub async fn run_grandpa_voter(params: GrandpaParams, cancel: CancellationToken) {
	let mut gossip = params.network.grandpa_messages();
	let mut round: RoundNumber = 1;
	let mut last_precommit: Option<Hash> = None;
	let mut tracked_set = params.authority_set.set_id();

	'rounds: loop {
		if cancel.is_cancelled() {
			break;
		}

		let set_id = params.authority_set.set_id();
		if set_id != tracked_set {
			log::info!(
				target: LOG_TARGET,
				"authority set advanced to {set_id}, restarting at round 1",
			);
			tracked_set = set_id;
			round = 1;
			last_precommit = None;
		}

		if params.authority_set.is_paused() {
			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep(params.round_interval) => {},
			}
			continue;
		}

		let voters = VoterSet::new(params.authority_set.current_authorities());
		let keypair = params
			.keypair
			.as_ref()
			.filter(|keypair| voters.contains(&keypair.public()));
		let Some(keypair) = keypair else {
			// Observer mode: follow commits only.
			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep(params.round_interval) => {},
				message = gossip.next() => match message {
					None => break,
					Some(GossipMessage::Commit(commit)) => handle_commit(&params, commit).await,
					Some(GossipMessage::Vote(_)) => {},
				},
			}
			continue 'rounds;
		};

		// Prevote: the highest block of the best chain that descends from
		// the last finalized block.
		let finalized = params.backend.blockchain.finalized_hash();
		let best = params.backend.blockchain.best_hash();
		let target = if params.backend.blockchain.is_descendant_of(&finalized, &best) {
			best
		} else {
			finalized
		};
		let Some(target_header) = params.backend.blockchain.header(&target) else {
			continue;
		};

		let mut state = RoundState::new(round, set_id, voters.clone());
		let prevote = SignedMessage::sign(
			keypair,
			round,
			set_id,
			Message::Prevote(Prevote { target_hash: target, target_number: target_header.number }),
		);
		let _ = state.import_vote(&prevote);
		params.network.gossip_grandpa(GossipMessage::Vote(prevote));
		log::trace!(target: LOG_TARGET, "round {round}: prevoted {target:?}");

		let Some((ghost_hash, ghost_number)) =
			collect_phase(&params, &mut gossip, &mut state, &cancel, Phase::Prevote).await
		else {
			// No prevote supermajority within the interval; retry the
			// round with the votes gathered so far discarded.
			continue;
		};

		// Precommit the prevote-GHOST, unless it would contradict an
		// earlier precommit on an incompatible fork.
		let compatible = last_precommit.map_or(true, |previous| {
			!params.backend.blockchain.contains(&previous)
				|| params.backend.blockchain.is_descendant_of(&previous, &ghost_hash)
				|| params.backend.blockchain.is_descendant_of(&ghost_hash, &previous)
		});
		if compatible {
			let precommit = SignedMessage::sign(
				keypair,
				round,
				set_id,
				Message::Precommit(Precommit {
					target_hash: ghost_hash,
					target_number: ghost_number,
				}),
			);
			let _ = state.import_vote(&precommit);
			params.network.gossip_grandpa(GossipMessage::Vote(precommit));
			last_precommit = Some(ghost_hash);
			log::trace!(target: LOG_TARGET, "round {round}: precommitted {ghost_hash:?}");
		} else {
			log::warn!(
				target: LOG_TARGET,
				"round {round}: withholding precommit for {ghost_hash:?}, \
				 it contradicts an earlier precommit",
			);
		}

		let Some((final_hash, final_number)) =
			collect_phase(&params, &mut gossip, &mut state, &cancel, Phase::Precommit).await
		else {
			continue;
		};

		// Finalize if the supermajority target advances finality.
		let mut advanced = false;
		let finalized_number = params.backend.blockchain.finalized_header().number;
		if final_number > finalized_number
			&& params.backend.blockchain.is_descendant_of(&finalized, &final_hash)
		{
			let precommits =
				state.finality_precommits(&final_hash, &params.backend.blockchain);
			let justification =
				build_justification(round, final_hash, final_number, precommits);
			match params
				.finalizer
				.finalize_block(final_hash, Some(justification.encode()))
				.await
			{
				Ok(()) => {
					advanced = true;
					log::info!(
						target: LOG_TARGET,
						"round {round}: finalized {final_hash:?} at {final_number}",
					);
					params.network.gossip_grandpa(GossipMessage::Commit(CommitMessage {
						round,
						set_id,
						commit: justification.commit,
					}));
				},
				Err(error) => {
					log::warn!(
						target: LOG_TARGET,
						"round {round}: finalizing {final_hash:?} failed: {error}",
					);
				},
			}
		}
		round += 1;

		// A completed round that moved nothing forward means the chain is
		// waiting for new blocks; pace the next round instead of spinning.
		if !advanced {
			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep(params.round_interval) => {},
			}
		}
	}

	log::info!(target: LOG_TARGET, "GRANDPA voter stopped");
}

#[derive(Clone, Copy)]
enum Phase {
	Prevote,
	Precommit,
}

fn phase_target(
	state: &RoundState,
	phase: Phase,
	backend: &Backend,
) -> Option<(Hash, BlockNumber)> {
	match phase {
		Phase::Prevote => state.prevote_ghost(&backend.blockchain),
		Phase::Precommit => state.precommit_target(&backend.blockchain),
	}
}

/// Gather votes until the phase has a supermajority target or the round
/// interval elapses. Commits are applied as they arrive regardless of
/// phase.
async fn collect_phase(
	params: &GrandpaParams,
	gossip: &mut UnboundedReceiver<GossipMessage>,
	state: &mut RoundState,
	cancel: &CancellationToken,
	phase: Phase,
) -> Option<(Hash, BlockNumber)> {
	if let Some(found) = phase_target(state, phase, &params.backend) {
		return Some(found);
	}

	let deadline = tokio::time::Instant::now() + params.round_interval;
	loop {
		tokio::select! {
			// On cancellation the phase completes with whatever arrived;
			// an already-sent prevote is still followed by its precommit.
			_ = cancel.cancelled() => return phase_target(state, phase, &params.backend),
			_ = tokio::time::sleep_until(deadline) => {
				return phase_target(state, phase, &params.backend)
			},
			message = gossip.next() => match message {
				None => return phase_target(state, phase, &params.backend),
				Some(GossipMessage::Vote(signed)) => {
					match state.import_vote(&signed) {
						Ok(true) => {
							if let Some(found) = phase_target(state, phase, &params.backend) {
								return Some(found);
							}
						},
						Ok(false) => {},
						Err(error) => {
							log::trace!(
								target: LOG_TARGET,
								"ignoring vote from {:?}: {error}",
								signed.id,
							);
						},
					}
				},
				Some(GossipMessage::Commit(commit)) => handle_commit(params, commit).await,
			},
		}
	}
}

/// Apply a gossiped commit: verify its justification against the current
/// set and finalize through the pipeline. Valid commits that advanced
/// finality are re-broadcast.
async fn handle_commit(params: &GrandpaParams, message: CommitMessage) {
	let set_id = params.authority_set.set_id();
	if message.set_id != set_id {
		log::debug!(
			target: LOG_TARGET,
			"ignoring commit for set {} (current {set_id})",
			message.set_id,
		);
		return;
	}

	let target_hash = message.commit.target_hash;
	let target_number = message.commit.target_number;
	if target_number <= params.backend.blockchain.finalized_header().number {
		return;
	}

	let voters = VoterSet::new(params.authority_set.current_authorities());
	let justification =
		GrandpaJustification { round: message.round, commit: message.commit.clone() };
	if let Err(error) = verify_justification(
		&justification,
		target_hash,
		target_number,
		set_id,
		&voters,
		&params.backend.blockchain,
	) {
		log::warn!(target: LOG_TARGET, "dropping invalid commit for {target_hash:?}: {error}");
		return;
	}

	match params.finalizer.finalize_block(target_hash, Some(justification.encode())).await {
		Ok(()) => params.network.gossip_grandpa(GossipMessage::Commit(message)),
		Err(error) => {
			log::debug!(
				target: LOG_TARGET,
				"commit for {target_hash:?} could not be applied: {error}",
			);
		},
	}
}
