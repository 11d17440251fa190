//! Serializes a [`Cabinet`] back into a byte-exact cabinet image.

use std::borrow::Cow;
use std::path::Path;

use log::debug;

use crate::codec::mszip_compress;
use crate::document::{Cabinet, MANIFEST_NAME};
use crate::error::WriteError;
use crate::format::header::{CfDataRecord, CfFileRecord, CfFolderRecord, CfHeader};
use crate::format::parser::block_checksum;
use crate::format::{
    CFDATA_HEADER_SIZE, CFFOLDER_SIZE, CFHEADER_RESERVE_SIZE, CFHEADER_SIZE, COMPRESS_NONE,
    FLAG_RESERVE_PRESENT, MAX_FOLDER_STREAM, MAX_UNCOMPRESSED_BLOCK, VERSION_MAJOR, VERSION_MINOR,
};

impl Cabinet {
    /// Serializes the cabinet to a complete in-memory image.
    pub fn write(&self) -> Result<Vec<u8>, WriteError> {
        write(self)
    }

    /// Serializes the cabinet and writes it to a file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::Error> {
        let data = self.write()?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Serializes a complete cabinet image.
pub fn write(cab: &Cabinet) -> Result<Vec<u8>, WriteError> {
    if cab.files().is_empty() {
        return Err(WriteError::EmptyCabinet);
    }

    let payloads = effective_payloads(cab);

    // Folder streams are the payloads of each folder's files, concatenated
    // in global file order; file offsets fall out of the concatenation.
    let mut streams: Vec<Vec<u8>> = vec![Vec::new(); cab.folder_count()];
    let mut offsets = Vec::with_capacity(cab.files().len());
    for (file, payload) in cab.files().iter().zip(&payloads) {
        let stream = &mut streams[file.folder_index() as usize];
        if stream.len() as u64 + payload.len() as u64 > MAX_FOLDER_STREAM {
            return Err(WriteError::FolderCapacityExceeded {
                name: file.name().to_string(),
                size: payload.len() as u64,
                max: MAX_FOLDER_STREAM,
            });
        }
        offsets.push(stream.len() as u32);
        stream.extend_from_slice(payload);
    }

    // Encode every folder's CFDATA chain before laying out tables, since the
    // folder records need block counts and the header needs the total size.
    let mut data_sections = Vec::with_capacity(streams.len());
    for (folder, stream) in cab.folders().iter().zip(&streams) {
        data_sections.push(encode_folder_data(
            stream,
            folder.compression(),
            cab.data_reserve_size(),
        )?);
    }

    let mut file_table = Vec::new();
    for ((file, payload), offset) in cab.files().iter().zip(&payloads).zip(&offsets) {
        CfFileRecord {
            size: payload.len() as u32,
            folder_offset: *offset,
            folder_index: file.folder_index(),
            date: file.date(),
            time: file.time(),
            attributes: file.attributes(),
            name: file.name().to_string(),
        }
        .write(&mut file_table);
    }

    let reserve_trio = if cab.reserve_present() {
        CFHEADER_RESERVE_SIZE + cab.header_reserve_size() as usize
    } else {
        0
    };
    let folder_table_size =
        cab.folder_count() * (CFFOLDER_SIZE + cab.folder_reserve_size() as usize);
    let files_offset = CFHEADER_SIZE + reserve_trio + folder_table_size;
    let data_start = files_offset + file_table.len();

    let mut folder_table = Vec::with_capacity(folder_table_size);
    let mut data_offset = data_start;
    for (folder, (num_blocks, section)) in cab.folders().iter().zip(&data_sections) {
        CfFolderRecord {
            data_offset: data_offset as u32,
            num_data_blocks: *num_blocks,
            type_compress: folder.compression(),
        }
        .write(&mut folder_table);
        folder_table.extend_from_slice(folder.reserve());
        data_offset += section.len();
    }
    let total_size = data_offset;

    let flags = if cab.reserve_present() {
        FLAG_RESERVE_PRESENT
    } else {
        0
    };
    let mut out = Vec::with_capacity(total_size);
    CfHeader {
        cabinet_size: total_size as u32,
        files_offset: files_offset as u32,
        version_minor: VERSION_MINOR,
        version_major: VERSION_MAJOR,
        num_folders: cab.folder_count() as u16,
        num_files: cab.files().len() as u16,
        flags,
        set_id: cab.set_id(),
        cabinet_index: cab.cabinet_index(),
    }
    .write(&mut out);

    if cab.reserve_present() {
        out.extend_from_slice(&cab.header_reserve_size().to_le_bytes());
        out.push(cab.folder_reserve_size());
        out.push(cab.data_reserve_size());
        out.extend_from_slice(cab.header_reserve());
    }
    out.extend_from_slice(&folder_table);
    out.extend_from_slice(&file_table);
    for (_, section) in &data_sections {
        out.extend_from_slice(section);
    }

    debug!(
        "wrote cabinet: {} folders, {} files, {total_size} bytes",
        cab.folder_count(),
        cab.files().len()
    );
    Ok(out)
}

/// The bytes each file contributes to its folder stream.
///
/// When the cabinet carries an auto-synchronized manifest, the `_setup.xml`
/// entry is serialized from the live manifest so that edits made through the
/// editor persist; every other entry writes its stored payload.
fn effective_payloads(cab: &Cabinet) -> Vec<Cow<'_, [u8]>> {
    cab.files()
        .iter()
        .map(|file| {
            if file.name().eq_ignore_ascii_case(MANIFEST_NAME)
                && !cab.manifest_edited
                && let Some(manifest) = cab.manifest()
                && let Ok(xml) = manifest.to_xml()
            {
                return Cow::Owned(xml);
            }
            Cow::Borrowed(file.payload())
        })
        .collect()
}

/// Encodes one folder's uncompressed stream as a CFDATA chain, splitting at
/// the per-block ceiling. Returns the block count and the encoded bytes.
fn encode_folder_data(
    stream: &[u8],
    type_compress: u16,
    data_reserve: u8,
) -> Result<(u16, Vec<u8>), WriteError> {
    let mut out = Vec::new();
    let mut num_blocks = 0u16;

    for chunk in stream.chunks(MAX_UNCOMPRESSED_BLOCK) {
        let encoded: Cow<'_, [u8]> = if type_compress & 0x000F == COMPRESS_NONE {
            Cow::Borrowed(chunk)
        } else {
            Cow::Owned(mszip_compress(chunk).map_err(|e| WriteError::BlockEncode {
                reason: e.to_string(),
            })?)
        };

        let header = CfDataRecord {
            checksum: 0,
            compressed_size: encoded.len() as u16,
            uncompressed_size: chunk.len() as u16,
        };
        let header = CfDataRecord {
            checksum: block_checksum(&encoded, &header),
            ..header
        };

        header.write(&mut out);
        out.extend_from_slice(&vec![0u8; data_reserve as usize]);
        out.extend_from_slice(&encoded);
        num_blocks += 1;
    }

    debug!(
        "encoded folder stream: {} bytes into {num_blocks} blocks ({} on disk)",
        stream.len(),
        out.len() - num_blocks as usize * (CFDATA_HEADER_SIZE + data_reserve as usize)
    );
    Ok((num_blocks, out))
}
