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

//! The Spindle node binary.

use clap::Parser;
use spindle_node::{
	chain_spec::create_genesis_with_runtime,
	cli::{Cli, Command, RunCmd},
	ChainSpec, Error, Keystore, PrefixedWriter, Service, ServiceConfig,
};
use std::{io::Write as _, process::ExitCode};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_logger(cli.run.log_prefix.clone());

	let runtime = match tokio::runtime::Runtime::new() {
		Ok(runtime) => runtime,
		Err(error) => {
			eprintln!("failed to start the async runtime: {error}");
			return ExitCode::FAILURE;
		},
	};

	let result = match cli.subcommand {
		Some(Command::ImportRuntime(cmd)) => {
			match create_genesis_with_runtime(&cmd.wasm, &cmd.chain) {
				Ok(spec) => {
					let mut stdout = std::io::stdout();
					if let Err(error) = stdout.write_all(spec.as_bytes()) {
						eprintln!("failed to write the spec: {error}");
						return ExitCode::FAILURE;
					}
					Ok(())
				},
				Err(error) => Err(error),
			}
		},
		None => runtime.block_on(run_node(cli.run)),
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(error) => {
			eprintln!("error: {error}");
			ExitCode::FAILURE
		},
	}
}

async fn run_node(cmd: RunCmd) -> Result<(), Error> {
	let chain_spec = match cmd.chain.as_str() {
		"dev" => ChainSpec::development(),
		path => ChainSpec::from_json_file(std::path::Path::new(path))?,
	};

	let keystore = match (&cmd.key, &cmd.base_path) {
		(Some(key), _) => Keystore::from_key(key)?,
		(None, Some(base_path)) => Keystore::load(base_path)?,
		(None, None) => Keystore::none(),
	};

	if let Some(pubdns) = &cmd.pubdns {
		log::info!("advertising public address {pubdns}:{}", cmd.port);
	}

	let mut config = ServiceConfig::new(chain_spec, keystore);
	config.babe_lead = cmd.babe_lead;
	config.wasm_interpreter = cmd.wasm_interpreter.clone();
	config.rpc_addr = cmd.rpc_addr();
	config.metrics_addr = cmd.publish_metrics.then_some(cmd.metrics_address);

	let service = Service::start(config).await?;
	log::info!(
		"node started; genesis {:?}",
		service.backend.blockchain.genesis_hash(),
	);

	tokio::signal::ctrl_c()
		.await
		.map_err(|e| Error::ConfigInvalid(format!("cannot listen for shutdown: {e}")))?;
	service.shutdown().await;
	Ok(())
}

fn init_logger(prefix: Option<String>) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let builder = tracing_subscriber::fmt().with_env_filter(filter);
	match prefix {
		Some(prefix) => {
			let prefix = prefix.into_bytes();
			builder
				.with_writer(move || PrefixedWriter::new(prefix.clone(), std::io::stdout()))
				.init();
		},
		None => builder.init(),
	}
}
