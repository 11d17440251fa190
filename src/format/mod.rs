//! Cabinet format constants, record codecs, and low-level parsing utilities.
//!
//! Field widths and orderings follow the MS-CAB structure definitions:
//! CFHEADER, then the optional reserve-size trio and header reserve, the
//! CFFOLDER table (each entry trailed by a `cbCFFolder` reserve block), the
//! CFFILE table at `coffFiles`, and finally the CFDATA stream.

pub mod header;
pub mod parser;
pub mod reader;

/// The cabinet file signature: `MSCF`.
pub const SIGNATURE: [u8; 4] = *b"MSCF";

/// Header flag: a previous cabinet in a chained set exists.
pub const FLAG_PREV_CABINET: u16 = 0x0001;
/// Header flag: a next cabinet in a chained set exists.
pub const FLAG_NEXT_CABINET: u16 = 0x0002;
/// Header flag: the reserve-size fields and reserve areas are present.
pub const FLAG_RESERVE_PRESENT: u16 = 0x0004;

/// Size of the fixed CFHEADER portion in bytes.
pub const CFHEADER_SIZE: usize = 36;
/// Size of the optional reserve-size trio (cbCFHeader, cbCFFolder, cbCFData).
pub const CFHEADER_RESERVE_SIZE: usize = 4;
/// Size of a CFFOLDER entry, excluding its reserve block.
pub const CFFOLDER_SIZE: usize = 8;
/// Size of the fixed CFFILE portion, excluding the NUL-terminated name.
pub const CFFILE_FIXED_SIZE: usize = 16;
/// Size of a CFDATA header, excluding its reserve block and payload.
pub const CFDATA_HEADER_SIZE: usize = 8;

/// Format version emitted in CFHEADER (1.3, the only version in the wild).
pub const VERSION_MAJOR: u8 = 1;
/// Format version emitted in CFHEADER (minor part).
pub const VERSION_MINOR: u8 = 3;

/// Maximum declared per-cabinet header reserve the format allows.
pub const MAX_HEADER_RESERVE: u16 = 60_000;

/// Maximum uncompressed bytes per CFDATA block.
///
/// Every cabinet producer splits folder streams at this boundary; MSZIP
/// requires it, since each block's deflate stream is reset at 32 KiB.
pub const MAX_UNCOMPRESSED_BLOCK: usize = 0x8000;

/// Maximum uncompressed bytes a single folder stream can address.
///
/// A CFFOLDER stores its block count in a u16, so a folder tops out at
/// `MAX_UNCOMPRESSED_BLOCK` bytes per block times 0xFFFF blocks.
pub const MAX_FOLDER_STREAM: u64 = MAX_UNCOMPRESSED_BLOCK as u64 * u16::MAX as u64;

/// Folder index values at and above this mark chained-set continuation
/// entries (CONTINUED_FROM_PREV and friends).
pub const FOLDER_INDEX_CONTINUED: u16 = 0xFFFD;

/// typeCompress value for stored (uncompressed) folders.
pub const COMPRESS_NONE: u16 = 0x0000;
/// typeCompress value for MSZIP folders.
pub const COMPRESS_MSZIP: u16 = 0x0001;

/// The two-byte signature opening every MSZIP data block.
pub const MSZIP_SIGNATURE: [u8; 2] = *b"CK";

/// File attribute bit: name is encoded as UTF-8 rather than the OEM code page.
pub const ATTR_NAME_IS_UTF: u16 = 0x80;
