//! Error types for cabinet parsing, editing, and writing.
//!
//! Failures are split into three typed enums matching the crate's three
//! boundaries: [`FormatError`] for malformed or unsupported input bytes,
//! [`EditError`] for invalid mutations of an in-memory document, and
//! [`WriteError`] for layouts that cannot be serialized. A failed parse
//! produces no document; a failed edit leaves the document exactly as it was
//! before the call; a failed write produces no output bytes.
//!
//! The umbrella [`Error`] type exists for callers that want a single error
//! channel (for example, the path-based convenience APIs, which also need to
//! carry I/O errors).
//!
//! ```rust,no_run
//! use cabforge::{Cabinet, Result};
//!
//! fn strip_file(path: &str) -> Result<Vec<u8>> {
//!     let mut cab = Cabinet::parse_path(path)?;
//!     cab.remove_file("obsolete.dll")?;
//!     Ok(cab.write()?)
//! }
//! ```

use std::io;

/// Errors produced while decoding cabinet bytes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FormatError {
    /// The buffer does not start with the `MSCF` signature.
    #[error("bad signature: expected MSCF, got {found:02x?}")]
    BadSignature {
        /// The four bytes found where the signature should be.
        found: [u8; 4],
    },

    /// The header's prev/next-cabinet flag bits are set.
    ///
    /// Chained multi-cabinet sets are a deliberate non-goal; refusing them
    /// outright beats a silent best-effort parse of half a set.
    #[error("chained multi-cabinet sets are not supported (flags {flags:#06x})")]
    UnsupportedChaining {
        /// The raw header flags.
        flags: u16,
    },

    /// The buffer ended before a structure could be fully read.
    #[error("truncated cabinet: {reason} at offset {offset:#x}")]
    Truncated {
        /// Byte offset at which the read failed.
        offset: usize,
        /// What was being read.
        reason: &'static str,
    },

    /// A file entry references a folder index outside the folder table.
    #[error("file {name:?} references nonexistent folder {folder_index}")]
    DanglingFileReference {
        /// Name of the offending file entry.
        name: String,
        /// The out-of-range folder index.
        folder_index: u16,
    },

    /// A declared reserve length exceeds the format's ceiling.
    #[error("declared header reserve of {declared} bytes exceeds maximum {max}")]
    ReserveTooLarge {
        /// The declared reserve size.
        declared: u16,
        /// The maximum the format allows.
        max: u16,
    },

    /// A folder uses a compression scheme this crate cannot decode.
    #[error("unsupported compression type {type_compress:#06x} in folder {folder_index}")]
    UnsupportedCompression {
        /// Index of the folder.
        folder_index: u16,
        /// The raw typeCompress value.
        type_compress: u16,
    },

    /// An MSZIP data block is missing its `CK` signature.
    #[error("invalid MSZIP block signature in folder {folder_index}")]
    BadBlockSignature {
        /// Index of the folder containing the block.
        folder_index: u16,
    },

    /// A data block failed to decompress or produced the wrong length.
    #[error("corrupt data block in folder {folder_index}: {reason}")]
    CorruptDataBlock {
        /// Index of the folder containing the block.
        folder_index: u16,
        /// What went wrong.
        reason: String,
    },

    /// A file's declared span lies outside its folder's uncompressed stream.
    #[error("file {name:?} extends beyond folder data ({end} > {available})")]
    FileOutOfBounds {
        /// Name of the offending file entry.
        name: String,
        /// End offset the file claims.
        end: u64,
        /// Bytes actually available in the folder stream.
        available: u64,
    },
}

/// Errors produced by editor operations on a loaded document.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EditError {
    /// An entry with this name already exists (names compare
    /// case-insensitively, as CAB consumers do).
    #[error("file {name:?} already exists in the cabinet")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// No entry with this name exists.
    #[error("file {name:?} not found in the cabinet")]
    NotFound {
        /// The missing name.
        name: String,
    },

    /// The payload is larger than any single folder can hold.
    #[error("payload of {size} bytes exceeds maximum folder capacity {max}")]
    PayloadTooLarge {
        /// The payload size.
        size: u64,
        /// The per-folder stream ceiling.
        max: u64,
    },
}

/// Errors produced while serializing a document back to bytes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WriteError {
    /// A single file's payload exceeds the representable folder stream size.
    #[error("file {name:?} ({size} bytes) exceeds maximum folder capacity {max}")]
    FolderCapacityExceeded {
        /// Name of the offending file.
        name: String,
        /// The payload size.
        size: u64,
        /// The per-folder stream ceiling.
        max: u64,
    },

    /// The document contains no files.
    #[error("cannot write an empty cabinet")]
    EmptyCabinet,

    /// A data block failed to compress.
    #[error("block compression failed: {reason}")]
    BlockEncode {
        /// What the compressor reported.
        reason: String,
    },
}

/// Umbrella error type covering all crate operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error from the path-based convenience APIs.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A malformed or unsupported cabinet.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// An invalid edit operation.
    #[error(transparent)]
    Edit(#[from] EditError),

    /// A document that cannot be serialized.
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Convenience alias for results with the umbrella [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_display() {
        let err = FormatError::BadSignature {
            found: *b"PK\x03\x04",
        };
        assert!(err.to_string().contains("MSCF"));

        let err = FormatError::UnsupportedChaining { flags: 0x0003 };
        assert!(err.to_string().contains("0x0003"));
    }

    #[test]
    fn edit_error_display() {
        let err = EditError::NotFound {
            name: "app.exe".into(),
        };
        assert!(err.to_string().contains("app.exe"));
    }

    #[test]
    fn umbrella_conversions() {
        let err: Error = FormatError::UnsupportedChaining { flags: 1 }.into();
        assert!(matches!(err, Error::Format(_)));

        let err: Error = EditError::DuplicateName { name: "x".into() }.into();
        assert!(matches!(err, Error::Edit(_)));

        let err: Error = WriteError::EmptyCabinet.into();
        assert!(matches!(err, Error::Write(_)));
    }
}
