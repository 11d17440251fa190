//! CFDATA checksum computation.
//!
//! Cabinets protect each data block with the format's own rolling checksum
//! (MS-CAB `CSUMCompute`), not a CRC: the input is XOR-folded as little-endian
//! 32-bit words, and a trailing 1-3 byte remainder is packed high-byte-first
//! before the final XOR. The checksum is seedable so multi-piece inputs (block
//! payload, reserve area, size fields) can be accumulated across calls.
//!
//! # Example
//!
//! ```rust
//! use cabforge::checksum::CabChecksum;
//!
//! // Incremental, piece-by-piece accumulation
//! let mut csum = CabChecksum::new();
//! csum.update(b"block payload");
//! csum.update(&[0u8; 4]);
//! let value = csum.finalize();
//!
//! // One-shot
//! let value = CabChecksum::compute(b"block payload");
//! ```

/// Rolling XOR checksum over little-endian 32-bit words.
///
/// Each call to [`update`](Self::update) processes one piece: whole words are
/// XOR-ed in, then the piece's remainder bytes are folded immediately. Word
/// alignment therefore restarts at every piece boundary, exactly as the
/// reference `CSUMCompute` behaves when chained via its seed argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct CabChecksum {
    csum: u32,
}

impl CabChecksum {
    /// Creates a checksum with a zero seed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a checksum seeded with a previously computed value.
    pub fn with_seed(seed: u32) -> Self {
        Self { csum: seed }
    }

    /// Folds one piece of data into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        let mut chunks = data.chunks_exact(4);
        for word in &mut chunks {
            self.csum ^= u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }

        let rest = chunks.remainder();
        let mut ul = 0u32;
        // Remainder bytes fold high-first: [a, b, c] becomes a<<16 | b<<8 | c.
        match rest.len() {
            3 => ul = (rest[0] as u32) << 16 | (rest[1] as u32) << 8 | rest[2] as u32,
            2 => ul = (rest[0] as u32) << 8 | rest[1] as u32,
            1 => ul = rest[0] as u32,
            _ => {}
        }
        self.csum ^= ul;
    }

    /// Returns the accumulated checksum.
    pub fn finalize(&self) -> u32 {
        self.csum
    }

    /// Computes the checksum of a single piece in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut csum = Self::new();
        csum.update(data);
        csum.finalize()
    }
}
