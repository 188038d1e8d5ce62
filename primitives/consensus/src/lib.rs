// This file is part of Spindle.

// Copyright (C) Spindle Developers.
// SPDX-License-Identifier: Apache-2.0

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Consensus primitives shared by the BABE and GRANDPA services and the
//! block-import pipeline: slot arithmetic, epoch descriptors, consensus
//! digests and finality vote payloads.

pub mod babe;
pub mod grandpa;
pub mod slots;

pub use slots::{Slot, SlotDuration};
