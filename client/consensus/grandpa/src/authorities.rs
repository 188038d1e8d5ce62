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

//! Tracking of the GRANDPA authority set and its pending changes.

use parking_lot::RwLock;
use spindle_consensus_primitives::grandpa::{AuthorityList, SetId};
use spindle_primitives::BlockNumber;
use std::sync::Arc;

const LOG_TARGET: &str = "grandpa";

/// A not-yet-applied authority-set change.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PendingChange {
	/// The authorities after the change.
	pub next_authorities: AuthorityList,
	/// The finalized height at which the change takes effect.
	pub effective_number: BlockNumber,
}

/// The current authority set, its monotonically increasing id and the
/// changes scheduled on top of it.
#[derive(Clone, Debug)]
pub struct AuthoritySet {
	current_authorities: AuthorityList,
	set_id: SetId,
	pending_standard: Vec<PendingChange>,
	pending_forced: Vec<PendingChange>,
	paused: bool,
	pause_at: Option<BlockNumber>,
	resume_at: Option<BlockNumber>,
}

impl AuthoritySet {
	/// The genesis authority set, with id 0.
	pub fn genesis(authorities: AuthorityList) -> Self {
		Self {
			current_authorities: authorities,
			set_id: 0,
			pending_standard: Vec::new(),
			pending_forced: Vec::new(),
			paused: false,
			pause_at: None,
			resume_at: None,
		}
	}

	/// The active authorities.
	pub fn current_authorities(&self) -> &AuthorityList {
		&self.current_authorities
	}

	/// The current set id.
	pub fn set_id(&self) -> SetId {
		self.set_id
	}

	/// Whether voting is paused.
	pub fn is_paused(&self) -> bool {
		self.paused
	}

	/// Schedule a standard change, effective when the block at
	/// `effective_number` is finalized.
	pub fn schedule_standard_change(
		&mut self,
		next_authorities: AuthorityList,
		effective_number: BlockNumber,
	) {
		log::debug!(
			target: LOG_TARGET,
			"scheduled standard authority-set change effective at {effective_number}",
		);
		self.pending_standard.push(PendingChange { next_authorities, effective_number });
		self.pending_standard.sort_by_key(|change| change.effective_number);
	}

	/// Schedule a forced change. Standard changes scheduled at the same or
	/// a greater depth are discarded.
	pub fn schedule_forced_change(
		&mut self,
		next_authorities: AuthorityList,
		effective_number: BlockNumber,
	) {
		let before = self.pending_standard.len();
		self.pending_standard.retain(|change| change.effective_number < effective_number);
		log::info!(
			target: LOG_TARGET,
			"scheduled forced authority-set change effective at {effective_number}, \
			 discarding {} standard changes",
			before - self.pending_standard.len(),
		);
		self.pending_forced.push(PendingChange { next_authorities, effective_number });
		self.pending_forced.sort_by_key(|change| change.effective_number);
	}

	/// Schedule a voting pause.
	pub fn schedule_pause(&mut self, effective_number: BlockNumber) {
		self.pause_at = Some(effective_number);
	}

	/// Schedule a voting resume.
	pub fn schedule_resume(&mut self, effective_number: BlockNumber) {
		self.resume_at = Some(effective_number);
	}

	/// Apply the effects of finalizing height `finalized`: at most one
	/// authority-set change (forced changes take precedence), plus any due
	/// pause or resume. Returns whether the set changed.
	pub fn apply_finalized(&mut self, finalized: BlockNumber) -> bool {
		let mut changed = false;

		let due_forced =
			self.pending_forced.first().is_some_and(|c| c.effective_number <= finalized);
		if due_forced {
			let change = self.pending_forced.remove(0);
			self.apply_change(change, finalized);
			changed = true;
		} else if self
			.pending_standard
			.first()
			.is_some_and(|c| c.effective_number <= finalized)
		{
			let change = self.pending_standard.remove(0);
			self.apply_change(change, finalized);
			changed = true;
		}

		if self.pause_at.is_some_and(|at| at <= finalized) {
			self.paused = true;
			self.pause_at = None;
			log::info!(target: LOG_TARGET, "voting paused at finalized height {finalized}");
		}
		if self.resume_at.is_some_and(|at| at <= finalized) {
			self.paused = false;
			self.resume_at = None;
			log::info!(target: LOG_TARGET, "voting resumed at finalized height {finalized}");
		}

		changed
	}

	fn apply_change(&mut self, change: PendingChange, finalized: BlockNumber) {
		self.current_authorities = change.next_authorities;
		self.set_id += 1;
		log::info!(
			target: LOG_TARGET,
			"authority set changed to id {} at finalized height {finalized}",
			self.set_id,
		);
	}

	/// Strip an authority of its voting weight for the remainder of the
	/// set's lifetime. Does not advance the set id.
	pub fn disable_authority(&mut self, index: u64) {
		match self.current_authorities.get_mut(index as usize) {
			Some((_, weight)) => {
				*weight = 0;
				log::info!(target: LOG_TARGET, "authority {index} disabled in set {}", self.set_id);
			},
			None => {
				log::warn!(target: LOG_TARGET, "cannot disable unknown authority {index}");
			},
		}
	}

	/// The number of pending changes, for inspection.
	pub fn pending_changes(&self) -> usize {
		self.pending_standard.len() + self.pending_forced.len()
	}
}

/// A shared handle on the authority set. Mutation happens only under the
/// import pipeline's finalize path; everyone else reads.
#[derive(Clone)]
pub struct SharedAuthoritySet(Arc<RwLock<AuthoritySet>>);

impl SharedAuthoritySet {
	/// Wrap a fresh set.
	pub fn new(set: AuthoritySet) -> Self {
		Self(Arc::new(RwLock::new(set)))
	}

	/// The active authorities.
	pub fn current_authorities(&self) -> AuthorityList {
		self.0.read().current_authorities.clone()
	}

	/// The current set id.
	pub fn set_id(&self) -> SetId {
		self.0.read().set_id
	}

	/// Whether voting is paused.
	pub fn is_paused(&self) -> bool {
		self.0.read().paused
	}

	/// Run a closure with mutable access; reserved for the finalize path
	/// and the digest handler.
	pub fn with_mut<R>(&self, f: impl FnOnce(&mut AuthoritySet) -> R) -> R {
		f(&mut self.0.write())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use spindle_primitives::Keyring;

	fn authorities(keys: &[Keyring]) -> AuthorityList {
		keys.iter().map(|k| (k.ed25519_public(), 1)).collect()
	}

	#[test]
	fn standard_change_applies_at_its_height() {
		let mut set = AuthoritySet::genesis(authorities(&[Keyring::Alice]));
		set.schedule_standard_change(authorities(&[Keyring::Bob]), 10);

		assert!(!set.apply_finalized(9));
		assert_eq!(set.set_id(), 0);

		assert!(set.apply_finalized(10));
		assert_eq!(set.set_id(), 1);
		assert_eq!(set.current_authorities(), &authorities(&[Keyring::Bob]));
	}

	#[test]
	fn one_finalization_advances_the_set_by_at_most_one() {
		let mut set = AuthoritySet::genesis(authorities(&[Keyring::Alice]));
		set.schedule_standard_change(authorities(&[Keyring::Bob]), 5);
		set.schedule_standard_change(authorities(&[Keyring::Charlie]), 7);

		// Both changes are due, only one applies per finalization.
		assert!(set.apply_finalized(20));
		assert_eq!(set.set_id(), 1);
		assert!(set.apply_finalized(20));
		assert_eq!(set.set_id(), 2);
		assert_eq!(set.current_authorities(), &authorities(&[Keyring::Charlie]));
	}

	#[test]
	fn forced_change_overrides_deeper_standard_changes() {
		let mut set = AuthoritySet::genesis(authorities(&[Keyring::Alice]));
		set.schedule_standard_change(authorities(&[Keyring::Bob]), 8);
		set.schedule_standard_change(authorities(&[Keyring::Charlie]), 12);
		set.schedule_forced_change(authorities(&[Keyring::Dave]), 10);

		// The standard change at 12 was discarded; the one at 8 survives
		// but the forced change wins once due.
		assert_eq!(set.pending_changes(), 2);
		assert!(set.apply_finalized(10));
		assert_eq!(set.set_id(), 1);
		assert_eq!(set.current_authorities(), &authorities(&[Keyring::Dave]));
	}

	#[test]
	fn pause_and_resume_do_not_touch_the_set_id() {
		let mut set = AuthoritySet::genesis(authorities(&[Keyring::Alice]));
		set.schedule_pause(5);
		set.apply_finalized(5);
		assert!(set.is_paused());
		assert_eq!(set.set_id(), 0);

		set.schedule_resume(8);
		set.apply_finalized(8);
		assert!(!set.is_paused());
		assert_eq!(set.set_id(), 0);
	}
}
