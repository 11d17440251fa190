//! Read-only Authenticode signature detection.
//!
//! Signed cabinets carry a 20-byte header reserve pointing at a PKCS#7
//! SignedData blob appended past the structured data. This module only
//! reports what is there; it never verifies certificate chains and never
//! modifies the blob. Note that any rewrite of a signed cabinet invalidates
//! its signature, since the digest covers the whole image.

use crate::error::FormatError;
use crate::format::header::CfHeader;
use crate::format::reader::ByteReader;
use crate::format::{FLAG_RESERVE_PRESENT, MAX_HEADER_RESERVE};

/// Size of the header reserve used by Authenticode-signed cabinets.
pub const SIGNATURE_RESERVE_SIZE: u16 = 20;

/// Magic value opening a signature reserve block.
pub const SIGNATURE_MAGIC: u32 = 0x0010_0000;

/// DER tag bytes opening a definite-length SignedData blob.
const DER_SEQUENCE_PREFIX: [u8; 2] = [0x30, 0x82];

/// What a signature probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// No signature reserve is present.
    Unsigned,
    /// A signature blob is present and structurally plausible.
    Signed {
        /// Absolute offset of the PKCS#7 blob within the image.
        offset: u32,
        /// Length of the blob in bytes.
        length: u32,
    },
    /// A signature reserve is present but its contents do not describe a
    /// usable blob.
    Malformed {
        /// What failed the structural check.
        reason: String,
    },
}

impl SignatureStatus {
    /// Whether a structurally plausible signature was found.
    pub fn is_signed(&self) -> bool {
        matches!(self, SignatureStatus::Signed { .. })
    }
}

/// Probes a raw cabinet image for an Authenticode signature.
///
/// Fails only when the image is too malformed to locate the header reserve;
/// a reserve that merely fails the signature shape checks reports
/// [`SignatureStatus::Malformed`] instead.
pub fn probe_signature(data: &[u8]) -> Result<SignatureStatus, FormatError> {
    let mut r = ByteReader::new(data);
    let header = CfHeader::read(&mut r)?;
    if header.flags & FLAG_RESERVE_PRESENT == 0 {
        return Ok(SignatureStatus::Unsigned);
    }

    let cb_cf_header = r.read_u16_le("cbCFHeader")?;
    if cb_cf_header > MAX_HEADER_RESERVE {
        return Err(FormatError::ReserveTooLarge {
            declared: cb_cf_header,
            max: MAX_HEADER_RESERVE,
        });
    }
    let _cb_cf_folder = r.read_u8("cbCFFolder")?;
    let _cb_cf_data = r.read_u8("cbCFData")?;
    if cb_cf_header != SIGNATURE_RESERVE_SIZE {
        return Ok(SignatureStatus::Unsigned);
    }

    let reserve = r.read_bytes(SIGNATURE_RESERVE_SIZE as usize, "header reserve area")?;
    let magic = u32::from_le_bytes([reserve[0], reserve[1], reserve[2], reserve[3]]);
    if magic != SIGNATURE_MAGIC {
        return Ok(SignatureStatus::Unsigned);
    }

    let offset = u32::from_le_bytes([reserve[4], reserve[5], reserve[6], reserve[7]]);
    let length = u32::from_le_bytes([reserve[8], reserve[9], reserve[10], reserve[11]]);
    if length == 0 {
        return Ok(SignatureStatus::Malformed {
            reason: "zero-length signature blob".to_string(),
        });
    }
    let end = offset as u64 + length as u64;
    if end > data.len() as u64 {
        return Ok(SignatureStatus::Malformed {
            reason: format!(
                "signature blob at {offset}..{end} extends past the image ({} bytes)",
                data.len()
            ),
        });
    }

    let blob = &data[offset as usize..(offset + length) as usize];
    if blob.len() < 2 || blob[..2] != DER_SEQUENCE_PREFIX {
        return Ok(SignatureStatus::Malformed {
            reason: "signature blob is not a DER SignedData sequence".to_string(),
        });
    }

    Ok(SignatureStatus::Signed { offset, length })
}
