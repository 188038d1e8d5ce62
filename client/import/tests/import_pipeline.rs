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

//! End-to-end exercises of the import pipeline against the mock runtime:
//! author a block, import it, finalize it.

use codec::Encode;
use futures::StreamExt;
use spindle_babe::{claim_slot, Proposer};
use spindle_consensus::{
	BlockImport, BlockOrigin, ConsensusError, Finalizer, ImportResult, VerifyFailure,
};
use spindle_consensus_primitives::{
	babe::BabeConfiguration,
	grandpa::{localized_payload, Message, Precommit, SignedPrecommit},
	SlotDuration,
};
use spindle_executor::{
	mock::{self, MockBackend},
	RuntimeCache, CODE_KEY,
};
use spindle_grandpa::{build_justification, AuthoritySet, SharedAuthoritySet};
use spindle_import::BlockImporter;
use spindle_primitives::{Block, Hash, Keyring};
use spindle_state::Backend;
use std::sync::Arc;

const SLOT_DURATION_MS: u64 = 1_000;

struct TestNode {
	backend: Arc<Backend>,
	importer: Arc<BlockImporter>,
	proposer: Proposer,
	authority_set: SharedAuthoritySet,
}

fn test_node() -> TestNode {
	let babe_config = BabeConfiguration {
		slot_duration: SLOT_DURATION_MS,
		epoch_length: 200,
		threshold: u128::MAX,
		authorities: vec![(Keyring::Alice.sr25519_public(), 1)],
		randomness: [0; 32],
		secondary_slots: 1,
	};
	let grandpa_authorities = vec![(Keyring::Alice.ed25519_public(), 1u64)];

	let backend = Backend::new_in_memory(vec![
		(CODE_KEY.to_vec(), b"mock code".to_vec()),
		(mock::BABE_CONFIG_KEY.to_vec(), babe_config.encode()),
		(mock::GRANDPA_AUTHORITIES_KEY.to_vec(), grandpa_authorities.encode()),
	])
	.unwrap();
	backend.initialize_genesis_epoch(&babe_config);

	let runtime = Arc::new(RuntimeCache::new(Arc::new(MockBackend::new())));
	let authority_set = SharedAuthoritySet::new(AuthoritySet::genesis(grandpa_authorities));
	let importer = Arc::new(BlockImporter::new(
		backend.clone(),
		runtime.clone(),
		authority_set.clone(),
	));
	let proposer = Proposer::new(
		backend.clone(),
		runtime,
		SlotDuration::from_millis(SLOT_DURATION_MS),
	);
	TestNode { backend, importer, proposer, authority_set }
}

fn author_block(node: &TestNode, slot: u64) -> Block {
	let parent = node.backend.blockchain.best_header();
	let entry = node
		.backend
		.epochs
		.epoch_for_child(&parent.hash(), slot.into())
		.unwrap();
	let pair = Keyring::Alice.sr25519_pair();
	let pre_digest = claim_slot(&entry.current, slot.into(), &pair).expect("max threshold");
	node.proposer.propose(&parent, &pre_digest, &pair).unwrap()
}

fn alice_justification(node: &TestNode, target: &Block) -> Vec<u8> {
	let precommit = Precommit {
		target_hash: target.hash(),
		target_number: target.header.number,
	};
	let payload = localized_payload(
		1,
		node.authority_set.set_id(),
		&Message::Precommit(precommit),
	);
	let pair = Keyring::Alice.ed25519_pair();
	let signed = SignedPrecommit { precommit, signature: pair.sign(&payload), id: pair.public() };
	build_justification(1, target.hash(), target.header.number, vec![signed]).encode()
}

#[tokio::test]
async fn authored_blocks_import_and_execute() {
	let node = test_node();
	let mut imports = node.backend.import_notifications.subscribe();

	// Submit a transaction so the block carries more than the inherent.
	let xt = mock::set_extrinsic(b"answer", b"42");
	node.backend
		.pool
		.submit(0, xt.clone(), Default::default())
		.unwrap();

	let block = author_block(&node, 1_000);
	assert!(block.extrinsics.contains(&xt));

	let result = node
		.importer
		.import_block(block.clone(), BlockOrigin::Own)
		.await
		.unwrap();
	assert_eq!(result, ImportResult::Imported { is_new_best: true });
	assert_eq!(node.backend.blockchain.best_hash(), block.hash());

	// The execution state is committed under the header root.
	assert_eq!(
		node.backend
			.storage
			.storage_at(&block.header.state_root, b"answer")
			.unwrap(),
		Some(b"42".to_vec()),
	);
	// The included transaction left the pool.
	assert!(node.backend.pool.is_empty());

	let notification = imports.next().await.unwrap();
	assert_eq!(notification.hash, block.hash());
	assert!(notification.is_new_best);

	// Importing the same block again is a no-op.
	let again = node.importer.import_block(block, BlockOrigin::NetworkBroadcast).await.unwrap();
	assert_eq!(again, ImportResult::AlreadyInChain);
}

#[tokio::test]
async fn state_root_mismatch_is_rejected() {
	let node = test_node();
	let mut block = author_block(&node, 1_000);

	// Tamper with the claimed state root and re-seal so only the root is
	// wrong.
	block.header.digest.pop();
	block.header.state_root = Hash::repeat_byte(0xde);
	let seal = Keyring::Alice.sr25519_pair().sign(block.header.hash().as_bytes());
	block.header.digest.push(spindle_primitives::DigestItem::Seal(
		spindle_consensus_primitives::babe::BABE_ENGINE_ID,
		seal.encode(),
	));

	let err = node
		.importer
		.import_block(block, BlockOrigin::NetworkBroadcast)
		.await
		.unwrap_err();
	assert_eq!(err, ConsensusError::VerifyFailed(VerifyFailure::StateRoot));
}

#[tokio::test]
async fn unknown_parent_is_reported() {
	let node = test_node();
	let mut block = author_block(&node, 1_000);
	block.header.parent_hash = Hash::repeat_byte(0xaa);
	let err = node
		.importer
		.import_block(block, BlockOrigin::NetworkBroadcast)
		.await
		.unwrap_err();
	assert_eq!(err, ConsensusError::UnknownParent);
}

#[tokio::test]
async fn equivocating_blocks_are_rejected() {
	let node = test_node();

	// Two different blocks by the same authority for the same slot on the
	// same parent: vary the contents via the pool.
	let genesis = node.backend.blockchain.best_header();
	let entry = node.backend.epochs.epoch_for_child(&genesis.hash(), 1_000.into()).unwrap();
	let pair = Keyring::Alice.sr25519_pair();
	let pre_digest = claim_slot(&entry.current, 1_000.into(), &pair).unwrap();

	let first = node.proposer.propose(&genesis, &pre_digest, &pair).unwrap();
	node.backend
		.pool
		.submit(0, mock::set_extrinsic(b"fork", b"b"), Default::default())
		.unwrap();
	let second = node.proposer.propose(&genesis, &pre_digest, &pair).unwrap();
	assert_ne!(first.hash(), second.hash());

	node.importer.import_block(first, BlockOrigin::Own).await.unwrap();
	let err = node
		.importer
		.import_block(second, BlockOrigin::NetworkBroadcast)
		.await
		.unwrap_err();
	assert_eq!(err, ConsensusError::VerifyFailed(VerifyFailure::Digest));
}

#[tokio::test]
async fn finalize_with_a_valid_justification() {
	let node = test_node();
	let mut finality = node.backend.finality_notifications.subscribe();

	let block = author_block(&node, 1_000);
	node.importer.import_block(block.clone(), BlockOrigin::Own).await.unwrap();

	let justification = alice_justification(&node, &block);
	node.importer
		.finalize_block(block.hash(), Some(justification.clone()))
		.await
		.unwrap();

	assert_eq!(node.backend.blockchain.finalized_hash(), block.hash());
	assert_eq!(
		node.backend.blockchain.justification(&block.hash()),
		Some(justification),
	);
	let notification = finality.next().await.unwrap();
	assert_eq!(notification.hash, block.hash());

	// Finalizing it a second time is rejected as below-finalized.
	let err = node.importer.finalize_block(block.hash(), None).await.unwrap_err();
	assert!(matches!(err, ConsensusError::FinalityRejected(_)));
}

#[tokio::test]
async fn bad_justification_is_rejected() {
	let node = test_node();
	let block = author_block(&node, 1_000);
	node.importer.import_block(block.clone(), BlockOrigin::Own).await.unwrap();

	// A justification signed by a non-voter.
	let precommit = Precommit {
		target_hash: block.hash(),
		target_number: block.header.number,
	};
	let payload = localized_payload(1, 0, &Message::Precommit(precommit));
	let pair = Keyring::Eve.ed25519_pair();
	let signed = SignedPrecommit { precommit, signature: pair.sign(&payload), id: pair.public() };
	let bad = build_justification(1, block.hash(), block.header.number, vec![signed]).encode();

	let err = node
		.importer
		.finalize_block(block.hash(), Some(bad))
		.await
		.unwrap_err();
	assert!(matches!(err, ConsensusError::FinalityRejected(_)));
	assert_ne!(node.backend.blockchain.finalized_hash(), block.hash());
}

#[tokio::test]
async fn finalization_prunes_competing_forks() {
	let node = test_node();

	let a = author_block(&node, 1_000);
	node.importer.import_block(a.clone(), BlockOrigin::Own).await.unwrap();

	// A competing child of genesis at a later slot with different content.
	node.backend
		.pool
		.submit(0, mock::set_extrinsic(b"fork", b"b"), Default::default())
		.unwrap();
	let genesis = node.backend.blockchain.genesis_hash();
	let parent = node.backend.blockchain.header(&genesis).unwrap();
	let entry = node.backend.epochs.epoch_for_child(&genesis, 1_001.into()).unwrap();
	let pair = Keyring::Alice.sr25519_pair();
	let pre_digest = claim_slot(&entry.current, 1_001.into(), &pair).unwrap();
	let b = node.proposer.propose(&parent, &pre_digest, &pair).unwrap();
	node.importer.import_block(b.clone(), BlockOrigin::NetworkBroadcast).await.unwrap();

	assert_eq!(node.backend.blockchain.leaves().len(), 2);

	node.importer
		.finalize_block(a.hash(), Some(alice_justification(&node, &a)))
		.await
		.unwrap();
	assert!(!node.backend.blockchain.contains(&b.hash()));
	assert_eq!(node.backend.blockchain.leaves().len(), 1);
}
