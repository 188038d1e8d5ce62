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

//! Slot arithmetic.

use codec::{Decode, Encode};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unit type wrapper that represents a slot.
#[derive(
	Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Encode, Decode,
)]
pub struct Slot(u64);

impl Slot {
	/// Saturating addition of a number of slots.
	pub fn saturating_add(self, rhs: u64) -> Self {
		Self(self.0.saturating_add(rhs))
	}

	/// Saturating subtraction of a number of slots.
	pub fn saturating_sub(self, rhs: u64) -> Self {
		Self(self.0.saturating_sub(rhs))
	}

	/// The wall-clock instant at which this slot starts.
	pub fn start(self, duration: SlotDuration) -> Duration {
		Duration::from_millis(self.0.saturating_mul(duration.as_millis()))
	}
}

impl From<u64> for Slot {
	fn from(slot: u64) -> Self {
		Self(slot)
	}
}

impl From<Slot> for u64 {
	fn from(slot: Slot) -> Self {
		slot.0
	}
}

impl std::fmt::Display for Slot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

/// A slot duration defined in milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct SlotDuration(u64);

impl SlotDuration {
	/// Initialize from the given milliseconds.
	pub fn from_millis(millis: u64) -> Self {
		Self(millis)
	}

	/// The slot duration in milliseconds.
	pub fn as_millis(self) -> u64 {
		self.0
	}

	/// The slot duration as [`Duration`].
	pub fn as_duration(self) -> Duration {
		Duration::from_millis(self.0)
	}
}

/// The slot the wall clock is currently in.
///
/// `slot = floor(unix_millis / slot_duration_millis)`.
pub fn current_slot(duration: SlotDuration) -> Slot {
	let now = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is after the unix epoch; qed");
	Slot(now.as_millis() as u64 / duration.as_millis())
}

/// How long until the given slot starts. Zero if the slot has already
/// started.
pub fn time_until_slot(slot: Slot, duration: SlotDuration) -> Duration {
	let now = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is after the unix epoch; qed");
	slot.start(duration).saturating_sub(now)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slot_of_the_current_time_is_current() {
		let duration = SlotDuration::from_millis(6_000);
		let slot = current_slot(duration);
		let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
		assert_eq!(u64::from(slot), now / 6_000);
	}

	#[test]
	fn past_slot_starts_now() {
		let duration = SlotDuration::from_millis(10);
		let past = current_slot(duration).saturating_sub(5);
		assert_eq!(time_until_slot(past, duration), Duration::ZERO);
	}

	#[test]
	fn future_slot_is_bounded_by_duration() {
		let duration = SlotDuration::from_millis(1_000);
		let next = current_slot(duration).saturating_add(1);
		let wait = time_until_slot(next, duration);
		assert!(wait <= Duration::from_millis(1_000));
	}
}
