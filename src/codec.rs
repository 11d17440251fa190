//! MSZIP data block codec.
//!
//! MSZIP blocks are raw deflate streams prefixed with the two-byte `CK`
//! signature. The deflate history window is shared across a folder's blocks:
//! a block may back-reference data from its predecessors, so decompression
//! carries the previous output forward as a preset dictionary. Compression
//! emits self-contained blocks (each stream gets a fresh window), which every
//! MSZIP decompressor accepts and which matches what the deployment tooling
//! this crate targets produces.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::format::{MAX_UNCOMPRESSED_BLOCK, MSZIP_SIGNATURE};

/// Errors internal to MSZIP block coding.
///
/// The parser maps these into [`FormatError`](crate::FormatError) variants
/// with folder context attached.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The block does not start with `CK`.
    #[error("missing MSZIP block signature")]
    MissingSignature,

    /// The deflate stream is malformed.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// The stream inflated to a different length than the block declared.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length the CFDATA header declared.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },
}

/// Compresses one uncompressed block into an MSZIP block (`CK` + deflate).
pub fn mszip_compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    out.extend_from_slice(&MSZIP_SIGNATURE);

    let mut encoder = DeflateEncoder::new(out, Compression::best());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| CodecError::Deflate(e.to_string()))
}

/// Streaming decompressor for one folder's MSZIP blocks.
///
/// Blocks must be fed in folder order; the decoder keeps the trailing 32 KiB
/// of output as the dictionary for the next block.
#[derive(Debug, Default)]
pub struct MsZipDecoder {
    history: Vec<u8>,
}

impl MsZipDecoder {
    /// Creates a decoder with an empty history window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decompresses one block, verifying the declared uncompressed length.
    pub fn decompress(&mut self, block: &[u8], expected: usize) -> Result<Vec<u8>, CodecError> {
        if block.len() < 2 || block[..2] != MSZIP_SIGNATURE {
            return Err(CodecError::MissingSignature);
        }
        let stream = &block[2..];

        let mut inflater = Decompress::new(false);
        if !self.history.is_empty() {
            inflater
                .set_dictionary(&self.history)
                .map_err(|e| CodecError::Deflate(e.to_string()))?;
        }

        let mut out = Vec::with_capacity(expected);
        loop {
            let before_in = inflater.total_in();
            let status = inflater
                .decompress_vec(
                    &stream[inflater.total_in() as usize..],
                    &mut out,
                    FlushDecompress::Finish,
                )
                .map_err(|e| CodecError::Deflate(e.to_string()))?;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if out.len() > expected {
                        break;
                    }
                    if out.len() == out.capacity() {
                        out.reserve(MAX_UNCOMPRESSED_BLOCK / 4);
                    } else if inflater.total_in() == before_in {
                        // No forward progress on a non-full buffer: the
                        // stream is stalled and therefore corrupt.
                        return Err(CodecError::Deflate("stalled deflate stream".into()));
                    }
                }
            }
        }

        if out.len() != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                actual: out.len(),
            });
        }

        self.push_history(&out);
        Ok(out)
    }

    fn push_history(&mut self, block: &[u8]) {
        self.history.extend_from_slice(block);
        if self.history.len() > MAX_UNCOMPRESSED_BLOCK {
            let start = self.history.len() - MAX_UNCOMPRESSED_BLOCK;
            self.history.drain(..start);
        }
    }
}
