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

//! Collective consensus machinery shared by the block producer, the
//! finality voter and the import pipeline: the [`BlockImport`] and
//! [`Finalizer`] seams, the orphan-buffering [`ImportQueue`], notification
//! hubs and the network facade.

mod block_import;
mod error;
mod import_queue;
mod network;
mod notifications;

pub use block_import::{BlockImport, BlockOrigin, Finalizer, ImportResult};
pub use error::{ConsensusError, FinalityFailure, VerifyFailure};
pub use import_queue::ImportQueue;
pub use network::{LoopbackNetwork, Network, NetworkError, SyncDirection};
pub use notifications::{FinalityNotification, ImportNotification, NotificationHub};
