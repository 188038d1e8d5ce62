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

//! Import pipeline metrics.

use prometheus::{IntCounter, IntGauge, Registry};

/// Prometheus metrics of the import pipeline.
#[derive(Clone)]
pub struct Metrics {
	/// Blocks committed through the pipeline.
	pub blocks_imported: IntCounter,
	/// Blocks rejected by verification or execution.
	pub blocks_rejected: IntCounter,
	/// The height of the last finalized block.
	pub finalized_height: IntGauge,
}

impl Metrics {
	/// Create and register the metrics.
	pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
		let blocks_imported = IntCounter::new(
			"spindle_blocks_imported_total",
			"Number of blocks committed through the import pipeline",
		)?;
		let blocks_rejected = IntCounter::new(
			"spindle_blocks_rejected_total",
			"Number of blocks rejected by verification or execution",
		)?;
		let finalized_height =
			IntGauge::new("spindle_finalized_height", "Height of the last finalized block")?;
		registry.register(Box::new(blocks_imported.clone()))?;
		registry.register(Box::new(blocks_rejected.clone()))?;
		registry.register(Box::new(finalized_height.clone()))?;
		Ok(Self { blocks_imported, blocks_rejected, finalized_height })
	}
}
