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

//! The network facade the consensus services talk to.
//!
//! The transport itself (discovery, noise, multiplexing, request
//! protocols) lives outside this repository; consensus code only depends
//! on this trait. [`LoopbackNetwork`] implements it in-process for tests
//! and single-node development chains.

use crate::NotificationHub;
use futures::channel::mpsc::UnboundedReceiver;
use spindle_consensus_primitives::grandpa::GossipMessage;
use spindle_primitives::{Block, Hash};

/// Direction of a block request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncDirection {
	/// From the given block towards the chain tip.
	Ascending,
	/// From the given block towards genesis.
	Descending,
}

/// Network errors surfaced to consensus code.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum NetworkError {
	/// No peer could serve the request.
	#[error("no peer available")]
	NoPeers,
}

/// The operations the consensus services need from the network.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
	/// Announce a freshly imported or authored block.
	fn announce_block(&self, block: Block);

	/// Gossip a transaction to peers.
	fn gossip_transaction(&self, transaction: Vec<u8>);

	/// Gossip a GRANDPA vote or commit.
	fn gossip_grandpa(&self, message: GossipMessage);

	/// Request a range of blocks from peers.
	async fn request_blocks(
		&self,
		from: Hash,
		count: u32,
		direction: SyncDirection,
	) -> Result<Vec<Block>, NetworkError>;

	/// Subscribe to announced blocks.
	fn block_announcements(&self) -> UnboundedReceiver<Block>;

	/// Subscribe to gossiped transactions.
	fn transactions(&self) -> UnboundedReceiver<Vec<u8>>;

	/// Subscribe to GRANDPA gossip.
	fn grandpa_messages(&self) -> UnboundedReceiver<GossipMessage>;
}

/// An in-process network: everything gossiped is delivered to local
/// subscribers, block requests find no peers.
#[derive(Default)]
pub struct LoopbackNetwork {
	announcements: NotificationHub<Block>,
	transactions: NotificationHub<Vec<u8>>,
	grandpa: NotificationHub<GossipMessage>,
}

impl LoopbackNetwork {
	/// Create a new loopback network.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl Network for LoopbackNetwork {
	fn announce_block(&self, block: Block) {
		self.announcements.notify(block);
	}

	fn gossip_transaction(&self, transaction: Vec<u8>) {
		self.transactions.notify(transaction);
	}

	fn gossip_grandpa(&self, message: GossipMessage) {
		self.grandpa.notify(message);
	}

	async fn request_blocks(
		&self,
		_from: Hash,
		_count: u32,
		_direction: SyncDirection,
	) -> Result<Vec<Block>, NetworkError> {
		Err(NetworkError::NoPeers)
	}

	fn block_announcements(&self) -> UnboundedReceiver<Block> {
		self.announcements.subscribe()
	}

	fn transactions(&self) -> UnboundedReceiver<Vec<u8>> {
		self.transactions.subscribe()
	}

	fn grandpa_messages(&self) -> UnboundedReceiver<GossipMessage> {
		self.grandpa.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;
	use spindle_consensus_primitives::grandpa::{
		CommitMessage, Commit, GossipMessage,
	};

	#[tokio::test]
	async fn grandpa_gossip_loops_back() {
		let network = LoopbackNetwork::new();
		let mut rx = network.grandpa_messages();
		let message = GossipMessage::Commit(CommitMessage {
			round: 1,
			set_id: 0,
			commit: Commit {
				target_hash: Hash::repeat_byte(1),
				target_number: 1,
				precommits: vec![],
			},
		});
		network.gossip_grandpa(message.clone());
		assert_eq!(rx.next().await, Some(message));
	}

	#[tokio::test]
	async fn block_requests_find_no_peers() {
		let network = LoopbackNetwork::new();
		let res = network.request_blocks(Hash::zero(), 1, SyncDirection::Ascending).await;
		assert_eq!(res, Err(NetworkError::NoPeers));
	}
}
