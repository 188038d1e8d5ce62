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

//! GRANDPA block finality for Spindle chains.
//!
//! Voters agree on chains rather than individual blocks: each round they
//! prevote for the head of their best chain, compute the common ancestor
//! supported by a supermajority (the prevote-GHOST), precommit it and,
//! once precommits reach a supermajority, finalize it with a
//! justification any third party can check.

mod authorities;
mod error;
mod justification;
mod round;
mod voter;

pub use authorities::{AuthoritySet, PendingChange, SharedAuthoritySet};
pub use error::Error;
pub use justification::{
	build_justification, decode_and_verify_justification, verify_justification,
};
pub use round::{ChainLookup, RoundState, VoteError, VoterSet};
pub use voter::{run_grandpa_voter, GrandpaParams};
