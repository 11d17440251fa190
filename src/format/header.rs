//! CFHEADER, CFFOLDER, CFFILE, and CFDATA record codecs.
//!
//! Each record type knows how to decode itself from a [`ByteReader`] and
//! encode itself onto an output buffer. Reserve blocks trail the fixed
//! portions and are handled by the parser and writer, which know the declared
//! reserve lengths.

use crate::error::FormatError;
use crate::format::reader::{ByteReader, put_u16_le, put_u32_le};
use crate::format::{ATTR_NAME_IS_UTF, SIGNATURE};

/// The fixed 36-byte CFHEADER record.
#[derive(Debug, Clone)]
pub struct CfHeader {
    /// Total cabinet size in bytes (cbCabinet).
    pub cabinet_size: u32,
    /// Absolute offset of the first CFFILE entry (coffFiles).
    pub files_offset: u32,
    /// Format version, minor part.
    pub version_minor: u8,
    /// Format version, major part.
    pub version_major: u8,
    /// Number of CFFOLDER entries.
    pub num_folders: u16,
    /// Number of CFFILE entries.
    pub num_files: u16,
    /// Header flags.
    pub flags: u16,
    /// Cabinet set identifier, opaque.
    pub set_id: u16,
    /// Index of this cabinet within its set.
    pub cabinet_index: u16,
}

impl CfHeader {
    /// Decodes the fixed header, verifying the `MSCF` signature.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let sig = r.read_bytes(4, "CFHEADER signature")?;
        if sig != SIGNATURE {
            return Err(FormatError::BadSignature {
                found: [sig[0], sig[1], sig[2], sig[3]],
            });
        }

        let _reserved1 = r.read_u32_le("CFHEADER reserved1")?;
        let cabinet_size = r.read_u32_le("CFHEADER cbCabinet")?;
        let _reserved2 = r.read_u32_le("CFHEADER reserved2")?;
        let files_offset = r.read_u32_le("CFHEADER coffFiles")?;
        let _reserved3 = r.read_u32_le("CFHEADER reserved3")?;
        let version_minor = r.read_u8("CFHEADER versionMinor")?;
        let version_major = r.read_u8("CFHEADER versionMajor")?;
        let num_folders = r.read_u16_le("CFHEADER cFolders")?;
        let num_files = r.read_u16_le("CFHEADER cFiles")?;
        let flags = r.read_u16_le("CFHEADER flags")?;
        let set_id = r.read_u16_le("CFHEADER setID")?;
        let cabinet_index = r.read_u16_le("CFHEADER iCabinet")?;

        Ok(Self {
            cabinet_size,
            files_offset,
            version_minor,
            version_major,
            num_folders,
            num_files,
            flags,
            set_id,
            cabinet_index,
        })
    }

    /// Encodes the fixed header.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&SIGNATURE);
        put_u32_le(out, 0); // reserved1
        put_u32_le(out, self.cabinet_size);
        put_u32_le(out, 0); // reserved2
        put_u32_le(out, self.files_offset);
        put_u32_le(out, 0); // reserved3
        out.push(self.version_minor);
        out.push(self.version_major);
        put_u16_le(out, self.num_folders);
        put_u16_le(out, self.num_files);
        put_u16_le(out, self.flags);
        put_u16_le(out, self.set_id);
        put_u16_le(out, self.cabinet_index);
    }
}

/// The fixed 8-byte CFFOLDER record, excluding its reserve block.
#[derive(Debug, Clone)]
pub struct CfFolderRecord {
    /// Absolute offset of the folder's first CFDATA block (coffCabStart).
    pub data_offset: u32,
    /// Number of CFDATA blocks in the folder (cCFData).
    pub num_data_blocks: u16,
    /// Compression scheme (typeCompress), opaque passthrough.
    pub type_compress: u16,
}

impl CfFolderRecord {
    /// Decodes one folder record.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            data_offset: r.read_u32_le("CFFOLDER coffCabStart")?,
            num_data_blocks: r.read_u16_le("CFFOLDER cCFData")?,
            type_compress: r.read_u16_le("CFFOLDER typeCompress")?,
        })
    }

    /// Encodes one folder record.
    pub fn write(&self, out: &mut Vec<u8>) {
        put_u32_le(out, self.data_offset);
        put_u16_le(out, self.num_data_blocks);
        put_u16_le(out, self.type_compress);
    }
}

/// A CFFILE record: the fixed 16 bytes plus the NUL-terminated name.
#[derive(Debug, Clone)]
pub struct CfFileRecord {
    /// Uncompressed file size (cbFile).
    pub size: u32,
    /// Byte offset within the folder's uncompressed stream (uoffFolderStart).
    pub folder_offset: u32,
    /// Index into the folder table (iFolder).
    pub folder_index: u16,
    /// DOS-encoded date.
    pub date: u16,
    /// DOS-encoded time.
    pub time: u16,
    /// File attribute bits.
    pub attributes: u16,
    /// File name, decoded per the attribute encoding flag.
    pub name: String,
}

impl CfFileRecord {
    /// Decodes one file record including the trailing name.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let size = r.read_u32_le("CFFILE cbFile")?;
        let folder_offset = r.read_u32_le("CFFILE uoffFolderStart")?;
        let folder_index = r.read_u16_le("CFFILE iFolder")?;
        let date = r.read_u16_le("CFFILE date")?;
        let time = r.read_u16_le("CFFILE time")?;
        let attributes = r.read_u16_le("CFFILE attribs")?;
        let name_bytes = r.read_null_terminated("CFFILE szName")?;

        let name = if attributes & ATTR_NAME_IS_UTF != 0 {
            String::from_utf8_lossy(name_bytes).into_owned()
        } else {
            // Legacy names are effectively Latin-1: one char per byte.
            name_bytes.iter().map(|&b| b as char).collect()
        };

        Ok(Self {
            size,
            folder_offset,
            folder_index,
            date,
            time,
            attributes,
            name,
        })
    }

    /// Encodes one file record including the trailing name.
    ///
    /// Names that fit in Latin-1 are written one byte per char; anything else
    /// is written as UTF-8 with the name-encoding attribute bit set.
    pub fn write(&self, out: &mut Vec<u8>) {
        let (name_bytes, needs_utf) = encode_name(&self.name);
        let attributes = if needs_utf {
            self.attributes | ATTR_NAME_IS_UTF
        } else {
            self.attributes
        };

        put_u32_le(out, self.size);
        put_u32_le(out, self.folder_offset);
        put_u16_le(out, self.folder_index);
        put_u16_le(out, self.date);
        put_u16_le(out, self.time);
        put_u16_le(out, attributes);
        out.extend_from_slice(&name_bytes);
        out.push(0);
    }
}

/// The fixed 8-byte CFDATA record, excluding reserve and payload.
#[derive(Debug, Clone, Copy)]
pub struct CfDataRecord {
    /// Block checksum (csum).
    pub checksum: u32,
    /// Compressed payload length (cbData).
    pub compressed_size: u16,
    /// Uncompressed payload length (cbUncomp).
    pub uncompressed_size: u16,
}

impl CfDataRecord {
    /// Decodes one data block header.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            checksum: r.read_u32_le("CFDATA csum")?,
            compressed_size: r.read_u16_le("CFDATA cbData")?,
            uncompressed_size: r.read_u16_le("CFDATA cbUncomp")?,
        })
    }

    /// Encodes one data block header.
    pub fn write(&self, out: &mut Vec<u8>) {
        put_u32_le(out, self.checksum);
        put_u16_le(out, self.compressed_size);
        put_u16_le(out, self.uncompressed_size);
    }
}

/// Encodes a file name, returning the bytes and whether UTF-8 was required.
fn encode_name(name: &str) -> (Vec<u8>, bool) {
    if name.chars().all(|c| (c as u32) < 0x100) {
        (name.chars().map(|c| c as u8).collect(), false)
    } else {
        (name.as_bytes().to_vec(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = CfHeader {
            cabinet_size: 1234,
            files_offset: 100,
            version_minor: 3,
            version_major: 1,
            num_folders: 2,
            num_files: 5,
            flags: 0x0004,
            set_id: 0xBEEF,
            cabinet_index: 0,
        };

        let mut out = Vec::new();
        header.write(&mut out);
        assert_eq!(out.len(), crate::format::CFHEADER_SIZE);

        let mut r = ByteReader::new(&out);
        let back = CfHeader::read(&mut r).unwrap();
        assert_eq!(back.cabinet_size, 1234);
        assert_eq!(back.files_offset, 100);
        assert_eq!(back.num_folders, 2);
        assert_eq!(back.num_files, 5);
        assert_eq!(back.flags, 0x0004);
        assert_eq!(back.set_id, 0xBEEF);
    }

    #[test]
    fn header_bad_signature() {
        let data = b"MSCX\x00\x00\x00\x00";
        let mut r = ByteReader::new(data);
        assert!(matches!(
            CfHeader::read(&mut r),
            Err(FormatError::BadSignature { .. })
        ));
    }

    #[test]
    fn file_record_round_trip() {
        let rec = CfFileRecord {
            size: 42,
            folder_offset: 10,
            folder_index: 1,
            date: 0x5821,
            time: 0x63C0,
            attributes: 0x20,
            name: "dir\\app.exe".into(),
        };

        let mut out = Vec::new();
        rec.write(&mut out);

        let mut r = ByteReader::new(&out);
        let back = CfFileRecord::read(&mut r).unwrap();
        assert_eq!(back.name, "dir\\app.exe");
        assert_eq!(back.size, 42);
        assert_eq!(back.folder_index, 1);
        assert_eq!(back.attributes, 0x20);
    }

    #[test]
    fn non_latin1_name_sets_utf_flag() {
        let rec = CfFileRecord {
            size: 1,
            folder_offset: 0,
            folder_index: 0,
            date: 0,
            time: 0,
            attributes: 0,
            name: "résumé™.txt".into(),
        };

        let mut out = Vec::new();
        rec.write(&mut out);

        let mut r = ByteReader::new(&out);
        let back = CfFileRecord::read(&mut r).unwrap();
        assert_eq!(back.name, "résumé™.txt");
        assert_ne!(back.attributes & ATTR_NAME_IS_UTF, 0);
    }

    #[test]
    fn data_record_round_trip() {
        let rec = CfDataRecord {
            checksum: 0xDEADBEEF,
            compressed_size: 100,
            uncompressed_size: 200,
        };

        let mut out = Vec::new();
        rec.write(&mut out);
        assert_eq!(out.len(), crate::format::CFDATA_HEADER_SIZE);

        let mut r = ByteReader::new(&out);
        let back = CfDataRecord::read(&mut r).unwrap();
        assert_eq!(back.checksum, 0xDEADBEEF);
        assert_eq!(back.compressed_size, 100);
        assert_eq!(back.uncompressed_size, 200);
    }
}
