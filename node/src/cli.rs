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

//! The command-line interface of the node.

use clap::{Args, Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};

/// The Spindle node.
#[derive(Parser, Debug)]
#[command(name = "spindle", version, about = "Spindle blockchain node")]
pub struct Cli {
	/// Utility subcommands; without one the node runs.
	#[command(subcommand)]
	pub subcommand: Option<Command>,

	#[command(flatten)]
	pub run: RunCmd,
}

/// Utility subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Replace the runtime in a chain-spec file with a compiled WASM blob
	/// and print the result.
	ImportRuntime(ImportRuntimeCmd),
}

/// Parameters of `import-runtime`.
#[derive(Args, Debug)]
pub struct ImportRuntimeCmd {
	/// Path to the compiled runtime blob.
	pub wasm: PathBuf,
	/// Path to the chain-spec file to update.
	pub chain: PathBuf,
}

/// Parameters of a running node.
#[derive(Args, Debug)]
pub struct RunCmd {
	/// The authoring key: a well-known name ("alice" .. "ferdie") or a
	/// 0x-prefixed 32-byte seed. Without it the node runs as a full node.
	#[arg(long)]
	pub key: Option<String>,

	/// The chain spec to use: "dev" or a path to a spec file.
	#[arg(long, default_value = "dev")]
	pub chain: String,

	/// The p2p listen port.
	#[arg(long, default_value_t = 30333)]
	pub port: u16,

	/// Enable the JSON-RPC server.
	#[arg(long)]
	pub rpc: bool,

	/// Listen for RPC on all interfaces instead of localhost only.
	#[arg(long)]
	pub rpc_external: bool,

	/// The JSON-RPC port.
	#[arg(long, default_value_t = 9933)]
	pub rpc_port: u16,

	/// Publish prometheus metrics.
	#[arg(long)]
	pub publish_metrics: bool,

	/// The metrics listen address.
	#[arg(long, default_value = "127.0.0.1:9615")]
	pub metrics_address: SocketAddr,

	/// Author on top of a bare genesis without waiting for a peer block
	/// first.
	#[arg(long)]
	pub babe_lead: bool,

	/// The public DNS name to advertise to peers.
	#[arg(long)]
	pub pubdns: Option<String>,

	/// The base path for the database and keystore.
	#[arg(long)]
	pub base_path: Option<PathBuf>,

	/// The WASM interpreter to execute the runtime with.
	#[arg(long, default_value = "mock")]
	pub wasm_interpreter: String,

	/// Prefix every log line, useful when multiplexing several nodes into
	/// one stream.
	#[arg(long)]
	pub log_prefix: Option<String>,
}

impl RunCmd {
	/// The socket address the RPC server should bind, if enabled.
	pub fn rpc_addr(&self) -> Option<SocketAddr> {
		self.rpc.then(|| {
			let host = if self.rpc_external { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
			SocketAddr::from((host, self.rpc_port))
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_parse() {
		let cli = Cli::parse_from(["spindle"]);
		assert!(cli.subcommand.is_none());
		assert_eq!(cli.run.chain, "dev");
		assert_eq!(cli.run.port, 30333);
		assert!(!cli.run.babe_lead);
		assert_eq!(cli.run.rpc_addr(), None);
	}

	#[test]
	fn rpc_addr_follows_the_external_flag() {
		let cli = Cli::parse_from(["spindle", "--rpc", "--rpc-port", "1234"]);
		assert_eq!(cli.run.rpc_addr(), Some(SocketAddr::from(([127, 0, 0, 1], 1234))));

		let cli = Cli::parse_from(["spindle", "--rpc", "--rpc-external"]);
		assert_eq!(cli.run.rpc_addr(), Some(SocketAddr::from(([0, 0, 0, 0], 9933))));
	}

	#[test]
	fn authority_flags_parse() {
		let cli = Cli::parse_from([
			"spindle",
			"--key",
			"alice",
			"--babe-lead",
			"--publish-metrics",
			"--metrics-address",
			"0.0.0.0:9999",
			"--pubdns",
			"node.example.com",
		]);
		assert_eq!(cli.run.key.as_deref(), Some("alice"));
		assert!(cli.run.babe_lead);
		assert!(cli.run.publish_metrics);
		assert_eq!(cli.run.metrics_address, SocketAddr::from(([0, 0, 0, 0], 9999)));
		assert_eq!(cli.run.pubdns.as_deref(), Some("node.example.com"));
	}

	#[test]
	fn import_runtime_subcommand_parses() {
		let cli = Cli::parse_from(["spindle", "import-runtime", "runtime.wasm", "chain.json"]);
		match cli.subcommand {
			Some(Command::ImportRuntime(cmd)) => {
				assert_eq!(cmd.wasm, PathBuf::from("runtime.wasm"));
				assert_eq!(cmd.chain, PathBuf::from("chain.json"));
			},
			_ => panic!("expected the import-runtime subcommand"),
		}
	}
}
