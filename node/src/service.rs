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

//! Service assembly.
//!
//! Builds the state backend from the chain spec, resolves the genesis
//! runtime, and spawns the long-lived tasks: BABE authoring, the GRANDPA
//! voter, network intake and the optional RPC and metrics servers. All
//! tasks share one cancellation token and drain their in-flight work on
//! shutdown.

use crate::{chain_spec::ChainSpec, keystore::Keystore, Error};
use futures::StreamExt;
use prometheus::Registry;
use spindle_babe::{run_babe_worker, BabeParams};
use spindle_consensus::{BlockOrigin, ImportQueue, LoopbackNetwork, Network};
use spindle_consensus_primitives::SlotDuration;
use spindle_executor::{
	mock::MockBackend, HostContext, RuntimeBackend, RuntimeCache,
};
use spindle_grandpa::{run_grandpa_voter, AuthoritySet, GrandpaParams, SharedAuthoritySet};
use spindle_import::BlockImporter;
use spindle_offchain::HttpSet;
use spindle_primitives::{Block, Hash, OpaqueExtrinsic};
use spindle_state::{Backend, MemDb};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "service";

/// The assembled configuration of a node.
pub struct ServiceConfig {
	/// The chain to run.
	pub chain_spec: ChainSpec,
	/// The loaded keys.
	pub keystore: Keystore,
	/// Author on a bare genesis without waiting for peers.
	pub babe_lead: bool,
	/// The WASM interpreter to use.
	pub wasm_interpreter: String,
	/// Where to serve JSON-RPC, if anywhere.
	pub rpc_addr: Option<SocketAddr>,
	/// Where to serve prometheus metrics, if anywhere.
	pub metrics_addr: Option<SocketAddr>,
	/// The GRANDPA per-phase vote-collection interval.
	pub grandpa_round_interval: Duration,
}

impl ServiceConfig {
	/// A configuration with service defaults.
	pub fn new(chain_spec: ChainSpec, keystore: Keystore) -> Self {
		Self {
			chain_spec,
			keystore,
			babe_lead: false,
			wasm_interpreter: "mock".into(),
			rpc_addr: None,
			metrics_addr: None,
			grandpa_round_interval: Duration::from_secs(1),
		}
	}
}

/// A running node.
pub struct Service {
	/// The state backend.
	pub backend: Arc<Backend>,
	/// The import pipeline.
	pub importer: Arc<BlockImporter>,
	/// The orphan-buffering import front-end fed by the network.
	pub import_queue: Arc<ImportQueue>,
	/// The network facade.
	pub network: Arc<dyn Network>,
	/// The shared GRANDPA authority set.
	pub authority_set: SharedAuthoritySet,
	runtime: Arc<RuntimeCache>,
	cancel: CancellationToken,
	tasks: Vec<JoinHandle<()>>,
	rpc: Option<jsonrpsee::server::ServerHandle>,
}

impl Service {
	/// Build and start a node from the given configuration.
	pub async fn start(config: ServiceConfig) -> Result<Self, Error> {
		let chain_name = config.chain_spec.name.clone();
		log::info!(target: LOG_TARGET, "starting node for chain {chain_name:?}");

		let backend = Backend::new(Arc::new(MemDb::new()), config.chain_spec.genesis_pairs()?)?;

		let runtime_backend: Arc<dyn RuntimeBackend> =
			match config.wasm_interpreter.as_str() {
				"mock" => Arc::new(MockBackend::new()),
				other => return Err(Error::WasmInterpreterUnknown(other.into())),
			};
		let runtime = Arc::new(RuntimeCache::new(runtime_backend));
		log::info!(
			target: LOG_TARGET,
			"created runtime with interpreter {}",
			runtime.backend_name(),
		);

		// Resolve the consensus configuration from the genesis runtime.
		let genesis = backend.blockchain.genesis_hash();
		let code = backend.runtime_code(&genesis)?;
		let genesis_root = backend.state_root(&genesis)?;
		let (babe_config, grandpa_authorities) = {
			let mut overlay = backend.storage.overlay_at(&genesis_root)?;
			let mut context = HostContext::new(&mut overlay);
			let version = runtime.core_version(&code, &mut context)?;
			log::info!(
				target: LOG_TARGET,
				"runtime {} spec {} impl {}",
				version.spec_name,
				version.spec_version,
				version.impl_version,
			);
			(
				runtime.babe_configuration(&code, &mut context)?,
				runtime.grandpa_authorities(&code, &mut context)?,
			)
		};
		backend.initialize_genesis_epoch(&babe_config);
		let authority_set = SharedAuthoritySet::new(AuthoritySet::genesis(grandpa_authorities));

		let offchain = HttpSet::spawn();
		let registry = Registry::new();
		let importer = BlockImporter::new(backend.clone(), runtime.clone(), authority_set.clone())
			.with_offchain(offchain);
		let importer = if config.metrics_addr.is_some() {
			importer.with_metrics(&registry).map_err(|e| Error::Metrics(e.to_string()))?
		} else {
			importer
		};
		let importer = Arc::new(importer);
		let import_queue = Arc::new(ImportQueue::new(importer.clone()));
		let network: Arc<dyn Network> = Arc::new(LoopbackNetwork::new());

		let cancel = CancellationToken::new();
		let mut tasks = Vec::new();

		tasks.push(tokio::spawn(run_babe_worker(
			BabeParams {
				keypair: config.keystore.babe().cloned().map(Arc::new),
				backend: backend.clone(),
				runtime: runtime.clone(),
				block_import: importer.clone(),
				network: network.clone(),
				slot_duration: SlotDuration::from_millis(babe_config.slot_duration),
				epoch_length: babe_config.epoch_length,
				lead: config.babe_lead,
			},
			cancel.clone(),
		)));

		tasks.push(tokio::spawn(run_grandpa_voter(
			GrandpaParams {
				keypair: config.keystore.grandpa().cloned().map(Arc::new),
				backend: backend.clone(),
				authority_set: authority_set.clone(),
				network: network.clone(),
				finalizer: importer.clone(),
				round_interval: config.grandpa_round_interval,
			},
			cancel.clone(),
		)));

		tasks.push(tokio::spawn(inbound_blocks(
			network.clone(),
			import_queue.clone(),
			cancel.clone(),
		)));
		tasks.push(tokio::spawn(inbound_transactions(
			network.clone(),
			backend.clone(),
			runtime.clone(),
			cancel.clone(),
		)));

		if let Some(addr) = config.metrics_addr {
			let registry = registry.clone();
			let cancel = cancel.clone();
			tasks.push(tokio::spawn(async move {
				if let Err(error) = crate::metrics::run_metrics_server(addr, registry, cancel).await
				{
					log::error!(target: LOG_TARGET, "metrics server failed: {error}");
				}
			}));
		}

		let rpc = match config.rpc_addr {
			Some(addr) => {
				Some(crate::rpc::start_rpc_server(addr, backend.clone(), chain_name).await?)
			},
			None => None,
		};

		Ok(Self {
			backend,
			importer,
			import_queue,
			network,
			authority_set,
			runtime,
			cancel,
			tasks,
			rpc,
		})
	}

	/// Validate a transaction at the best block and add it to the pool,
	/// gossiping it if the runtime allows propagation.
	pub fn submit_transaction(&self, data: Vec<u8>) -> Result<Hash, Error> {
		let extrinsic = OpaqueExtrinsic(data);
		let best = self.backend.blockchain.best_header();
		let code = self.backend.runtime_code(&best.hash())?;
		let mut overlay = self.backend.storage.overlay_at(&best.state_root)?;
		let mut context = HostContext::new(&mut overlay);
		let validity = self
			.runtime
			.validate_transaction(&code, &mut context, &extrinsic)?
			.map_err(|e| Error::TransactionRejected(e.to_string()))?;

		let propagate = validity.propagate;
		let transaction = self
			.backend
			.pool
			.submit(best.number, extrinsic.clone(), validity)
			.map_err(|e| Error::TransactionRejected(e.to_string()))?;
		if propagate {
			self.network.gossip_transaction(extrinsic.0);
		}
		Ok(transaction.hash)
	}

	/// Stop every task, waiting for in-flight work to drain.
	pub async fn shutdown(self) {
		log::info!(target: LOG_TARGET, "shutting down");
		self.cancel.cancel();
		if let Some(rpc) = self.rpc {
			let _ = rpc.stop();
		}
		for task in self.tasks {
			let _ = task.await;
		}
	}
}

/// Feed announced blocks into the import queue.
async fn inbound_blocks(
	network: Arc<dyn Network>,
	import_queue: Arc<ImportQueue>,
	cancel: CancellationToken,
) {
	let mut announcements = network.block_announcements();
	loop {
		let block: Block = tokio::select! {
			_ = cancel.cancelled() => break,
			block = announcements.next() => match block {
				Some(block) => block,
				None => break,
			},
		};
		let hash = block.hash();
		if let Err(error) = import_queue.submit(block, BlockOrigin::NetworkBroadcast).await {
			log::debug!(target: LOG_TARGET, "announced block {hash:?} not imported: {error}");
		}
	}
}

/// Validate gossiped transactions and pool them.
async fn inbound_transactions(
	network: Arc<dyn Network>,
	backend: Arc<Backend>,
	runtime: Arc<RuntimeCache>,
	cancel: CancellationToken,
) {
	let mut transactions = network.transactions();
	loop {
		let data = tokio::select! {
			_ = cancel.cancelled() => break,
			data = transactions.next() => match data {
				Some(data) => data,
				None => break,
			},
		};
		let extrinsic = OpaqueExtrinsic(data);
		if backend.pool.contains(&extrinsic.hash()) {
			continue;
		}

		let best = backend.blockchain.best_header();
		let validity = backend
			.runtime_code(&best.hash())
			.map_err(Error::from)
			.and_then(|code| {
				let mut overlay = backend.storage.overlay_at(&best.state_root)?;
				let mut context = HostContext::new(&mut overlay);
				Ok(runtime.validate_transaction(&code, &mut context, &extrinsic)?)
			});
		match validity {
			Ok(Ok(validity)) => {
				let _ = backend.pool.submit(best.number, extrinsic, validity);
			},
			Ok(Err(invalid)) => {
				log::debug!(
					target: LOG_TARGET,
					"dropping gossiped transaction {:?}: {invalid}",
					extrinsic.hash(),
				);
			},
			Err(error) => {
				log::warn!(
					target: LOG_TARGET,
					"cannot validate gossiped transaction: {error}",
				);
			},
		}
	}
}
