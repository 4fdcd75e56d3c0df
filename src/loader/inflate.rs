//! Streams zlib-compressed blocks into owned buffers.

use std::io::{self, Read};

use flate2::read::ZlibDecoder;

use crate::error::{LoadError, LoadResult};

/// A block header: an (unchecked) version stamp followed by the compressed
/// length, then that many bytes of zlib stream.
pub struct BlockHeader {
    /// Version stamp as stored in the block (typically `0x320`); not
    /// validated, kept for diagnostics.
    pub version_stamp: u32,
    /// Length in bytes of the compressed payload that follows the header.
    pub compressed_len: u32,
}

/// Inflate exactly `compressed_len` bytes of zlib input into an owned
/// buffer that grows until the stream reports end-of-stream.
///
/// Returns `LoadError::Corrupt` on any zlib error, and
/// `LoadError::ResourceExhausted` if the output buffer cannot be grown.
pub fn inflate_block(compressed: &[u8]) -> LoadResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| {
        if e.kind() == io::ErrorKind::OutOfMemory {
            LoadError::ResourceExhausted(format!("could not grow inflate buffer: {}", e))
        } else {
            LoadError::Corrupt(format!("zlib inflate failed: {}", e))
        }
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(payload: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn round_trip_inflation() {
        let payload = b"hello";
        let compressed = zlib(payload);
        let out = inflate_block(&compressed).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn garbage_input_is_corrupt() {
        let garbage = [0xFF, 0x00, 0x11, 0x22];
        assert!(inflate_block(&garbage).is_err());
    }
}
