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

//! Import and finality notification streams.
//!
//! The state backend owns one hub per event kind; the import pipeline
//! publishes into them and never holds a backend reference from within a
//! callback. Subscribers observe events in commit order.

use crate::BlockOrigin;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use parking_lot::Mutex;
use spindle_primitives::{Hash, Header};

/// Summary of an imported block.
#[derive(Clone, Debug)]
pub struct ImportNotification {
	/// The hash of the imported block.
	pub hash: Hash,
	/// The header of the imported block.
	pub header: Header,
	/// Where the block came from.
	pub origin: BlockOrigin,
	/// Whether the block became the new best.
	pub is_new_best: bool,
}

/// Summary of a finalized block.
#[derive(Clone, Debug)]
pub struct FinalityNotification {
	/// The hash of the finalized block.
	pub hash: Hash,
	/// The header of the finalized block.
	pub header: Header,
}

/// A multi-consumer broadcast hub. Slow or dropped subscribers never block
/// the publisher; closed sinks are swept on the next notification.
pub struct NotificationHub<T> {
	sinks: Mutex<Vec<UnboundedSender<T>>>,
}

impl<T> Default for NotificationHub<T> {
	fn default() -> Self {
		Self { sinks: Mutex::new(Vec::new()) }
	}
}

impl<T: Clone> NotificationHub<T> {
	/// Create an empty hub.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a new subscriber.
	pub fn subscribe(&self) -> UnboundedReceiver<T> {
		let (tx, rx) = unbounded();
		self.sinks.lock().push(tx);
		rx
	}

	/// Publish an event to all live subscribers.
	pub fn notify(&self, event: T) {
		self.sinks.lock().retain(|sink| sink.unbounded_send(event.clone()).is_ok());
	}

	/// The number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.sinks.lock().len()
	}
}
