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

//! A writer that tags every write with a fixed prefix.

use std::io::{self, Write};

/// Prepends `prefix` to every write. The reported written length is the
/// length of the caller's buffer, so the writer is transparent to
/// formatting machinery.
pub struct PrefixedWriter<W> {
	prefix: Vec<u8>,
	writer: W,
}

impl<W> PrefixedWriter<W> {
	/// Wrap `writer`, prefixing each write with `prefix`.
	pub fn new(prefix: impl Into<Vec<u8>>, writer: W) -> Self {
		Self { prefix: prefix.into(), writer }
	}
}

impl<W: Write> Write for PrefixedWriter<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.writer.write_all(&self.prefix)?;
		self.writer.write_all(buf)?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		self.writer.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefixes_every_write_and_reports_input_length() {
		let mut sink = Vec::new();
		let mut writer = PrefixedWriter::new(&b"prefix: "[..], &mut sink);

		let n = writer.write(b"message\n").unwrap();
		assert_eq!(n, 8);
		let n = writer.write(b"message two\n").unwrap();
		assert_eq!(n, 12);

		assert_eq!(
			String::from_utf8(sink).unwrap(),
			"prefix: message\nprefix: message two\n",
		);
	}

	#[test]
	fn empty_prefix_is_transparent() {
		let mut sink = Vec::new();
		let mut writer = PrefixedWriter::new(Vec::new(), &mut sink);
		writer.write(b"plain").unwrap();
		assert_eq!(sink, b"plain");
	}
}
