// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CRC-32 footers.
//!
//! Every segment file ends with a 4-byte big-endian CRC-32 of all preceding
//! bytes. If the footer is wrong, something got corrupted or truncated;
//! don't trust the data. Writers either stream through [`ChecksumWriter`]
//! (postings, positions) or build a buffer, patch header fields, and call
//! [`append_footer`] (dictionary, tombstones).

use std::io::{self, Write};

use crc32fast::Hasher;

/// Size of the footer in bytes.
pub const FOOTER_LEN: usize = 4;

/// A `Write` adapter that accumulates a CRC-32 over everything written.
///
/// `finish` appends the big-endian checksum and hands the inner writer
/// back, so the caller can flush and fsync.
pub struct ChecksumWriter<W: Write> {
    inner: W,
    hasher: Hasher,
    written: u64,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        ChecksumWriter {
            inner,
            hasher: Hasher::new(),
            written: 0,
        }
    }

    /// Bytes written so far, excluding the footer. This is the offset the
    /// next write will land at.
    pub fn position(&self) -> u64 {
        self.written
    }

    /// Append the footer and return `(inner, total_bytes_including_footer)`.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        let crc = self.hasher.finalize();
        self.inner.write_all(&crc.to_be_bytes())?;
        Ok((self.inner, self.written + FOOTER_LEN as u64))
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Compute the CRC-32 of `buf` and append it big-endian.
pub fn append_footer(buf: &mut Vec<u8>) {
    let mut hasher = Hasher::new();
    hasher.update(buf);
    let crc = hasher.finalize();
    buf.extend_from_slice(&crc.to_be_bytes());
}

/// Check the footer of a whole file image and return the body (everything
/// before the CRC). The error string names the mismatch so callers can wrap
/// it with the file path.
pub fn verify_footer(bytes: &[u8]) -> Result<&[u8], String> {
    if bytes.len() < FOOTER_LEN {
        return Err(format!(
            "file too short for CRC footer ({} bytes)",
            bytes.len()
        ));
    }
    let (body, footer) = bytes.split_at(bytes.len() - FOOTER_LEN);
    let stored = u32::from_be_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let mut hasher = Hasher::new();
    hasher.update(body);
    let actual = hasher.finalize();
    if stored != actual {
        return Err(format!(
            "CRC mismatch: stored {:08x}, computed {:08x}",
            stored, actual
        ));
    }
    Ok(body)
}
