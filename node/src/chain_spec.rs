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

//! Chain specifications.
//!
//! A spec carries chain metadata plus the genesis state, either in raw
//! form (hex-encoded trie pairs under `genesis.raw.top`) or in
//! human-readable form (`genesis.runtime.<module>.<key>`). Raw form is
//! authoritative; from the human-readable form only the module entries
//! with a defined storage mapping are used.

use crate::Error;
use codec::Encode;
use serde::{Deserialize, Serialize};
use spindle_consensus_primitives::babe::BabeConfiguration;
use spindle_executor::{mock, CODE_KEY};
use spindle_primitives::Keyring;
use std::{collections::BTreeMap, path::Path};

/// A chain specification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainSpec {
	/// The human-readable chain name.
	pub name: String,
	/// The chain identifier.
	pub id: String,
	/// Addresses of the initial peers.
	#[serde(default, rename = "bootNodes")]
	pub boot_nodes: Vec<String>,
	/// The network protocol identifier.
	#[serde(default, rename = "protocolId")]
	pub protocol_id: Option<String>,
	/// Telemetry endpoints with verbosity levels.
	#[serde(default, rename = "telemetryEndpoints")]
	pub telemetry_endpoints: Option<serde_json::Value>,
	/// The genesis state.
	pub genesis: Genesis,
}

/// The genesis section of a spec.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genesis {
	/// Raw storage pairs.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub raw: Option<RawGenesis>,
	/// Module-qualified human-readable entries.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub runtime: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The raw genesis form: hex key to hex value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawGenesis {
	/// The top trie pairs.
	pub top: BTreeMap<String, String>,
}

impl ChainSpec {
	/// Load a spec from a JSON file.
	pub fn from_json_file(path: &Path) -> Result<Self, Error> {
		let raw = std::fs::read(path)
			.map_err(|e| Error::GenesisLoadFailed(format!("{}: {e}", path.display())))?;
		Self::from_json_bytes(&raw)
	}

	/// Parse a spec from JSON bytes.
	pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, Error> {
		serde_json::from_slice(bytes).map_err(|e| Error::GenesisLoadFailed(e.to_string()))
	}

	/// The built-in development chain: Alice is the only BABE and GRANDPA
	/// authority, every slot is primary-eligible.
	pub fn development() -> Self {
		Self::development_with_slot_duration(3_000)
	}

	/// The development chain with a custom slot duration, for tests that
	/// need fast blocks.
	pub fn development_with_slot_duration(slot_duration_millis: u64) -> Self {
		let babe_config = BabeConfiguration {
			slot_duration: slot_duration_millis,
			epoch_length: 200,
			threshold: u128::MAX,
			authorities: vec![(Keyring::Alice.sr25519_public(), 1)],
			randomness: [0; 32],
			secondary_slots: 1,
		};
		let grandpa_authorities = vec![(Keyring::Alice.ed25519_public(), 1u64)];

		let mut top = BTreeMap::new();
		let mut put = |key: &[u8], value: Vec<u8>| {
			top.insert(to_hex(key), to_hex(&value));
		};
		put(CODE_KEY, b"spindle-dev-runtime".to_vec());
		put(mock::BABE_CONFIG_KEY, babe_config.encode());
		put(mock::GRANDPA_AUTHORITIES_KEY, grandpa_authorities.encode());

		Self {
			name: "Development".into(),
			id: "dev".into(),
			boot_nodes: vec![],
			protocol_id: Some("spindle-dev".into()),
			telemetry_endpoints: None,
			genesis: Genesis { raw: Some(RawGenesis { top }), runtime: None },
		}
	}

	/// The genesis storage pairs described by this spec.
	pub fn genesis_pairs(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
		if let Some(raw) = &self.genesis.raw {
			return raw
				.top
				.iter()
				.map(|(key, value)| Ok((from_hex(key)?, from_hex(value)?)))
				.collect();
		}

		// Human-readable form: only entries with a defined storage mapping
		// are honored.
		let Some(runtime) = &self.genesis.runtime else {
			return Err(Error::GenesisLoadFailed("spec has neither raw nor runtime genesis".into()));
		};
		let mut pairs = Vec::new();
		for (module, entries) in runtime {
			let Some(entries) = entries.as_object() else { continue };
			for (key, value) in entries {
				match (module.as_str(), key.as_str(), value.as_str()) {
					("system", "code", Some(code)) => {
						pairs.push((CODE_KEY.to_vec(), from_hex(code)?));
					},
					_ => log::debug!(
						"ignoring human-readable genesis entry {module}.{key} without a \
						 storage mapping",
					),
				}
			}
		}
		Ok(pairs)
	}
}

/// Replace `genesis.runtime.system.code` in the spec at `spec_path` with
/// the hex encoding of the WASM blob at `wasm_path` and return the
/// updated spec as pretty JSON.
pub fn create_genesis_with_runtime(wasm_path: &Path, spec_path: &Path) -> Result<String, Error> {
	let code = std::fs::read(wasm_path)
		.map_err(|e| Error::GenesisLoadFailed(format!("{}: {e}", wasm_path.display())))?;
	let raw = std::fs::read(spec_path)
		.map_err(|e| Error::GenesisLoadFailed(format!("{}: {e}", spec_path.display())))?;
	let mut spec: serde_json::Value =
		serde_json::from_slice(&raw).map_err(|e| Error::GenesisLoadFailed(e.to_string()))?;

	let runtime = spec
		.pointer_mut("/genesis/runtime")
		.and_then(|runtime| runtime.as_object_mut())
		.ok_or_else(|| Error::GenesisLoadFailed("spec has no genesis.runtime section".into()))?;
	let system = runtime
		.entry("system")
		.or_insert_with(|| serde_json::json!({}))
		.as_object_mut()
		.ok_or_else(|| {
			Error::GenesisLoadFailed("genesis.runtime.system is not an object".into())
		})?;
	system.insert("code".into(), serde_json::Value::String(to_hex(&code)));

	serde_json::to_string_pretty(&spec).map_err(|e| Error::GenesisLoadFailed(e.to_string()))
}

fn to_hex(data: &[u8]) -> String {
	format!("0x{}", hex::encode(data))
}

fn from_hex(data: &str) -> Result<Vec<u8>, Error> {
	hex::decode(data.trim_start_matches("0x"))
		.map_err(|e| Error::GenesisLoadFailed(format!("bad hex in genesis: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn development_spec_roundtrips_through_json() {
		let spec = ChainSpec::development();
		let json = serde_json::to_string(&spec).unwrap();
		let parsed = ChainSpec::from_json_bytes(json.as_bytes()).unwrap();
		assert_eq!(parsed.id, "dev");
		assert_eq!(parsed.genesis_pairs().unwrap(), spec.genesis_pairs().unwrap());
	}

	#[test]
	fn raw_genesis_pairs_decode() {
		let spec = ChainSpec::development();
		let pairs = spec.genesis_pairs().unwrap();
		assert!(pairs.iter().any(|(key, value)| {
			key == CODE_KEY && value == b"spindle-dev-runtime"
		}));
	}

	#[test]
	fn human_readable_code_is_mapped() {
		let json = serde_json::json!({
			"name": "Test",
			"id": "test",
			"genesis": {
				"runtime": {
					"system": { "code": "0xdeadbeef" },
					"balances": { "balances": [] },
				}
			}
		});
		let spec = ChainSpec::from_json_bytes(json.to_string().as_bytes()).unwrap();
		let pairs = spec.genesis_pairs().unwrap();
		assert_eq!(pairs, vec![(CODE_KEY.to_vec(), vec![0xde, 0xad, 0xbe, 0xef])]);
	}

	#[test]
	fn create_genesis_with_runtime_embeds_the_blob() {
		let dir = tempfile::tempdir().unwrap();

		let wasm_path = dir.path().join("test.wasm");
		std::fs::File::create(&wasm_path)
			.unwrap()
			.write_all(b"somecode")
			.unwrap();

		let spec_path = dir.path().join("chain.json");
		let template = serde_json::json!({
			"name": "Test",
			"id": "test",
			"genesis": { "runtime": { "system": { "code": "0x00" } } }
		});
		std::fs::write(&spec_path, template.to_string()).unwrap();

		let out = create_genesis_with_runtime(&wasm_path, &spec_path).unwrap();
		let spec: serde_json::Value = serde_json::from_str(&out).unwrap();
		assert_eq!(
			spec.pointer("/genesis/runtime/system/code").and_then(|v| v.as_str()),
			Some(format!("0x{}", hex::encode(b"somecode")).as_str()),
		);
	}

	#[test]
	fn missing_genesis_section_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let wasm_path = dir.path().join("test.wasm");
		std::fs::write(&wasm_path, b"code").unwrap();
		let spec_path = dir.path().join("chain.json");
		std::fs::write(&spec_path, "{\"name\": \"x\"}").unwrap();
		assert!(create_genesis_with_runtime(&wasm_path, &spec_path).is_err());
	}
}
