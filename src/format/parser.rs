//! Full-cabinet parsing: bytes in, a validated [`Cabinet`] out.
//!
//! Parsing is strict about archive structure (signature, table bounds,
//! folder references, block signatures) and lenient about ancillary content:
//! a block checksum mismatch or a malformed `_setup.xml` is recorded as a
//! warning rather than failing the load, matching how deployment tooling
//! treats cabinets in the field.

use std::path::Path;

use log::{debug, warn};

use crate::checksum::CabChecksum;
use crate::codec::{CodecError, MsZipDecoder};
use crate::document::{Cabinet, DataBlock, FileEntry, Folder, MANIFEST_NAME};
use crate::error::FormatError;
use crate::format::header::{CfDataRecord, CfFileRecord, CfFolderRecord, CfHeader};
use crate::format::reader::ByteReader;
use crate::format::{
    COMPRESS_MSZIP, COMPRESS_NONE, FLAG_NEXT_CABINET, FLAG_PREV_CABINET, FLAG_RESERVE_PRESENT,
    FOLDER_INDEX_CONTINUED, MAX_HEADER_RESERVE, VERSION_MAJOR, VERSION_MINOR,
};
use crate::manifest::SetupManifest;

impl Cabinet {
    /// Parses a cabinet from a byte buffer.
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        parse(data)
    }

    /// Reads and parses a cabinet file from disk.
    pub fn parse_path<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let data = std::fs::read(path)?;
        Ok(parse(&data)?)
    }
}

/// Parses a complete cabinet image.
pub fn parse(data: &[u8]) -> Result<Cabinet, FormatError> {
    let mut r = ByteReader::new(data);
    let mut warnings = Vec::new();

    let header = CfHeader::read(&mut r)?;
    if header.flags & (FLAG_PREV_CABINET | FLAG_NEXT_CABINET) != 0 {
        return Err(FormatError::UnsupportedChaining {
            flags: header.flags,
        });
    }
    if (header.version_major, header.version_minor) != (VERSION_MAJOR, VERSION_MINOR) {
        warnings.push(format!(
            "unexpected format version {}.{}",
            header.version_major, header.version_minor
        ));
    }

    // Optional reserve-size trio and trailing header reserve area.
    let reserve_present = header.flags & FLAG_RESERVE_PRESENT != 0;
    let (cb_cf_header, cb_cf_folder, cb_cf_data) = if reserve_present {
        let cb_header = r.read_u16_le("cbCFHeader")?;
        if cb_header > MAX_HEADER_RESERVE {
            return Err(FormatError::ReserveTooLarge {
                declared: cb_header,
                max: MAX_HEADER_RESERVE,
            });
        }
        let cb_folder = r.read_u8("cbCFFolder")?;
        let cb_data = r.read_u8("cbCFData")?;
        (cb_header, cb_folder, cb_data)
    } else {
        (0, 0, 0)
    };
    let header_reserve = r
        .read_bytes(cb_cf_header as usize, "header reserve area")?
        .to_vec();

    // Folder table. Each entry is trailed by its cbCFFolder reserve block.
    let mut folder_records = Vec::with_capacity(header.num_folders as usize);
    for _ in 0..header.num_folders {
        let record = CfFolderRecord::read(&mut r)?;
        let reserve = r
            .read_bytes(cb_cf_folder as usize, "folder reserve block")?
            .to_vec();
        folder_records.push((record, reserve));
    }

    // File table, at the absolute offset the header declares.
    r.seek(header.files_offset as usize, "CFFILE table")?;
    let mut file_records = Vec::with_capacity(header.num_files as usize);
    for _ in 0..header.num_files {
        let record = CfFileRecord::read(&mut r)?;
        if record.folder_index >= FOLDER_INDEX_CONTINUED {
            return Err(FormatError::UnsupportedChaining {
                flags: header.flags,
            });
        }
        if record.folder_index >= header.num_folders {
            return Err(FormatError::DanglingFileReference {
                name: record.name,
                folder_index: record.folder_index,
            });
        }
        file_records.push(record);
    }

    // Walk each folder's CFDATA chain and reassemble its uncompressed stream.
    let mut folders = Vec::with_capacity(folder_records.len());
    let mut streams: Vec<Vec<u8>> = Vec::with_capacity(folder_records.len());
    for (folder_index, (record, reserve)) in folder_records.into_iter().enumerate() {
        let (stream, data_blocks) = read_folder_stream(
            data,
            folder_index as u16,
            &record,
            cb_cf_data,
            &mut warnings,
        )?;
        debug!(
            "folder {folder_index}: {} blocks, {} bytes uncompressed",
            data_blocks.len(),
            stream.len()
        );
        folders.push(Folder {
            compression: record.type_compress,
            reserve,
            data_blocks,
        });
        streams.push(stream);
    }

    // Slice each file's payload out of its folder stream.
    let mut files = Vec::with_capacity(file_records.len());
    for record in file_records {
        let stream = &streams[record.folder_index as usize];
        let start = record.folder_offset as usize;
        let end = start as u64 + record.size as u64;
        if end > stream.len() as u64 {
            return Err(FormatError::FileOutOfBounds {
                name: record.name,
                end,
                available: stream.len() as u64,
            });
        }
        let end = end as usize;
        files.push(FileEntry {
            name: record.name,
            date: record.date,
            time: record.time,
            attributes: record.attributes,
            folder_index: record.folder_index,
            folder_offset: record.folder_offset,
            payload: stream[start..end].to_vec(),
        });
    }

    // The manifest is metadata: a decode failure degrades to a warning.
    let manifest = files
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(MANIFEST_NAME))
        .and_then(|f| match SetupManifest::parse(&f.payload) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("{MANIFEST_NAME} present but unusable: {e}");
                warnings.push(format!("{MANIFEST_NAME} present but unusable: {e}"));
                None
            }
        });

    for w in &warnings {
        warn!("{w}");
    }

    Ok(Cabinet {
        reserve_present,
        set_id: header.set_id,
        cabinet_index: header.cabinet_index,
        cb_cf_header,
        cb_cf_folder,
        cb_cf_data,
        header_reserve,
        folders,
        files,
        manifest,
        manifest_edited: false,
        warnings,
    })
}

/// Reads one folder's CFDATA chain, returning the reassembled uncompressed
/// stream and the raw blocks as stored.
fn read_folder_stream(
    data: &[u8],
    folder_index: u16,
    record: &CfFolderRecord,
    cb_cf_data: u8,
    warnings: &mut Vec<String>,
) -> Result<(Vec<u8>, Vec<DataBlock>), FormatError> {
    // Low nibble selects the scheme; high bits are window-size parameters
    // used only by schemes this crate rejects anyway.
    let scheme = record.type_compress & 0x000F;
    if scheme != COMPRESS_NONE && scheme != COMPRESS_MSZIP {
        return Err(FormatError::UnsupportedCompression {
            folder_index,
            type_compress: record.type_compress,
        });
    }

    let mut r = ByteReader::new(data);
    r.seek(record.data_offset as usize, "CFDATA chain start")?;

    let mut stream = Vec::new();
    let mut blocks = Vec::with_capacity(record.num_data_blocks as usize);
    let mut decoder = MsZipDecoder::new();

    for block_index in 0..record.num_data_blocks {
        let block_header = CfDataRecord::read(&mut r)?;
        let _reserve = r.read_bytes(cb_cf_data as usize, "data block reserve")?;
        let payload = r.read_bytes(block_header.compressed_size as usize, "data block payload")?;

        if block_header.checksum != 0 {
            let computed = block_checksum(payload, &block_header);
            if computed != block_header.checksum {
                warnings.push(format!(
                    "checksum mismatch in folder {folder_index} block {block_index}: \
                     stored {:#010x}, computed {computed:#010x}",
                    block_header.checksum
                ));
            }
        }

        let uncompressed = match scheme {
            COMPRESS_NONE => {
                if block_header.compressed_size != block_header.uncompressed_size {
                    return Err(FormatError::CorruptDataBlock {
                        folder_index,
                        reason: format!(
                            "stored block sizes disagree ({} != {})",
                            block_header.compressed_size, block_header.uncompressed_size
                        ),
                    });
                }
                payload.to_vec()
            }
            _ => decoder
                .decompress(payload, block_header.uncompressed_size as usize)
                .map_err(|e| match e {
                    CodecError::MissingSignature => {
                        FormatError::BadBlockSignature { folder_index }
                    }
                    other => FormatError::CorruptDataBlock {
                        folder_index,
                        reason: other.to_string(),
                    },
                })?,
        };

        stream.extend_from_slice(&uncompressed);
        blocks.push(DataBlock {
            checksum: block_header.checksum,
            compressed: payload.to_vec(),
            uncompressed_size: block_header.uncompressed_size,
        });
    }

    Ok((stream, blocks))
}

/// The CFDATA checksum: the payload folded first, then the two size fields
/// seeded with the payload sum.
pub(crate) fn block_checksum(payload: &[u8], header: &CfDataRecord) -> u32 {
    let seed = CabChecksum::compute(payload);
    let mut sizes = CabChecksum::with_seed(seed);
    sizes.update(&header.compressed_size.to_le_bytes());
    sizes.update(&header.uncompressed_size.to_le_bytes());
    sizes.finalize()
}
