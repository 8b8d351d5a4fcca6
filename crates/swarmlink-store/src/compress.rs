// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Gzip packing for action input/output blobs.
//!
//! Hook clients post full tool inputs and outputs; anything above 1 KiB is
//! stored gzip-compressed with a flag column so reads know whether to
//! inflate. Small payloads are stored raw — gzip overhead would grow them.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Payloads at or below this many bytes are stored uncompressed.
pub const COMPRESS_THRESHOLD: usize = 1024;

/// Pack a payload for storage. Returns the bytes and whether they are
/// compressed.
pub fn pack(text: &str) -> (Vec<u8>, bool) {
    let raw = text.as_bytes();
    if raw.len() <= COMPRESS_THRESHOLD {
        return (raw.to_vec(), false);
    }
    let mut enc = GzEncoder::new(Vec::with_capacity(raw.len() / 4), Compression::default());
    // Writing to a Vec cannot fail; fall back to the raw bytes if it somehow does.
    if enc.write_all(raw).is_err() {
        return (raw.to_vec(), false);
    }
    match enc.finish() {
        Ok(packed) => (packed, true),
        Err(_) => (raw.to_vec(), false),
    }
}

/// Unpack a stored payload. Invalid gzip data (flag set but bytes corrupt)
/// yields `None` rather than an error — the action row itself is still
/// useful without its blob.
pub fn unpack(data: &[u8], compressed: bool) -> Option<String> {
    if !compressed {
        return Some(String::from_utf8_lossy(data).into_owned());
    }
    let mut dec = GzDecoder::new(data);
    let mut out = String::new();
    dec.read_to_string(&mut out).ok()?;
    Some(out)
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payloads_stay_raw() {
        let (bytes, compressed) = pack("read src/main.rs");
        assert!(!compressed);
        assert_eq!(unpack(&bytes, compressed).unwrap(), "read src/main.rs");
    }

    #[test]
    fn boundary_payload_stays_raw() {
        let text = "x".repeat(COMPRESS_THRESHOLD);
        let (_, compressed) = pack(&text);
        assert!(!compressed, "exactly 1 KiB must not be compressed");
    }

    #[test]
    fn large_payloads_are_compressed_and_round_trip() {
        let text = "fn main() { println!(\"hello\"); }\n".repeat(200);
        let (bytes, compressed) = pack(&text);
        assert!(compressed);
        assert!(
            bytes.len() < text.len(),
            "repetitive text must shrink under gzip"
        );
        assert_eq!(unpack(&bytes, compressed).unwrap(), text);
    }

    #[test]
    fn corrupt_compressed_data_yields_none() {
        assert!(unpack(b"not gzip at all", true).is_none());
    }
}
