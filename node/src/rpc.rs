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

//! The JSON-RPC surface: chain and system queries.

use crate::Error;
use jsonrpsee::{server::ServerHandle, RpcModule};
use spindle_primitives::{BlockNumber, Hash, Header};
use spindle_state::Backend;
use std::{net::SocketAddr, sync::Arc};

const LOG_TARGET: &str = "rpc";

struct RpcContext {
	backend: Arc<Backend>,
	chain_name: String,
}

/// Build the RPC module over the given backend.
pub fn rpc_module(backend: Arc<Backend>, chain_name: String) -> Result<RpcModule<()>, Error> {
	let context = Arc::new(RpcContext { backend, chain_name });
	let mut module = RpcModule::new(());

	module
		.register_method("system_name", |_, _, _| "spindle")
		.map_err(|e| Error::Rpc(e.to_string()))?;
	module
		.register_method("system_version", |_, _, _| env!("CARGO_PKG_VERSION"))
		.map_err(|e| Error::Rpc(e.to_string()))?;
	{
		let context = context.clone();
		module
			.register_method("system_chain", move |_, _, _| context.chain_name.clone())
			.map_err(|e| Error::Rpc(e.to_string()))?;
	}
	{
		let context = context.clone();
		module
			.register_method("chain_getFinalizedHead", move |_, _, _| {
				hex_hash(&context.backend.blockchain.finalized_hash())
			})
			.map_err(|e| Error::Rpc(e.to_string()))?;
	}
	{
		let context = context.clone();
		module
			.register_method("chain_getBlockHash", move |params, _, _| {
				let number: Option<BlockNumber> = params.one().ok();
				let hash = match number {
					Some(number) => context.backend.blockchain.hash_by_number(number),
					None => Some(context.backend.blockchain.best_hash()),
				};
				hash.map(|h| hex_hash(&h))
			})
			.map_err(|e| Error::Rpc(e.to_string()))?;
	}
	{
		let context = context.clone();
		module
			.register_method("chain_getHeader", move |params, _, _| {
				let hash = match params.one::<String>().ok() {
					Some(hex) => parse_hash(&hex)?,
					None => context.backend.blockchain.best_hash(),
				};
				Ok::<_, jsonrpsee::types::ErrorObjectOwned>(
					context.backend.blockchain.header(&hash).map(header_json),
				)
			})
			.map_err(|e| Error::Rpc(e.to_string()))?;
	}

	Ok(module)
}

/// Start the RPC server.
pub async fn start_rpc_server(
	addr: SocketAddr,
	backend: Arc<Backend>,
	chain_name: String,
) -> Result<ServerHandle, Error> {
	let server = jsonrpsee::server::Server::builder()
		.build(addr)
		.await
		.map_err(|e| Error::Rpc(e.to_string()))?;
	let local_addr = server.local_addr().map_err(|e| Error::Rpc(e.to_string()))?;
	let handle = server.start(rpc_module(backend, chain_name)?);
	log::info!(target: LOG_TARGET, "JSON-RPC server listening on {local_addr}");
	Ok(handle)
}

fn hex_hash(hash: &Hash) -> String {
	format!("0x{}", hex::encode(hash.as_bytes()))
}

fn parse_hash(hex: &str) -> Result<Hash, jsonrpsee::types::ErrorObjectOwned> {
	let raw = hex::decode(hex.trim_start_matches("0x")).map_err(|_| bad_params())?;
	if raw.len() != 32 {
		return Err(bad_params());
	}
	Ok(Hash::from_slice(&raw))
}

fn bad_params() -> jsonrpsee::types::ErrorObjectOwned {
	jsonrpsee::types::ErrorObjectOwned::owned(
		jsonrpsee::types::error::INVALID_PARAMS_CODE,
		"expected a 0x-prefixed 32-byte hash",
		None::<()>,
	)
}

fn header_json(header: Header) -> serde_json::Value {
	serde_json::json!({
		"parentHash": hex_hash(&header.parent_hash),
		"number": header.number,
		"stateRoot": hex_hash(&header.state_root),
		"extrinsicsRoot": hex_hash(&header.extrinsics_root),
		"digest": {
			"logs": header
				.digest
				.logs()
				.iter()
				.map(|log| format!("0x{}", hex::encode(codec::Encode::encode(log))))
				.collect::<Vec<_>>(),
		},
	})
}
