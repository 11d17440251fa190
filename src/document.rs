//! The in-memory cabinet model.
//!
//! A [`Cabinet`] is created by the parser from a validated byte buffer,
//! mutated in place by editor operations, and consumed by the writer. Files
//! live in one global sequence in source order with `folder_index`
//! back-references into the folder table; folders never own file lists, so
//! "preserve source file order" and "folder membership is derived" hold as
//! independent invariants. Folder count is always derived from the live
//! `folder_index` references: removing the last file of a folder removes the
//! folder itself.
//!
//! Layout-relevant characteristics captured at load (reserve flag, set id,
//! the three declared reserve sizes, header reserve bytes, per-folder reserve
//! bytes, per-folder compression values) are held verbatim and reproduced
//! bit-exactly on write.

use crate::manifest::SetupManifest;

/// Conventional name of the embedded deployment manifest.
pub const MANIFEST_NAME: &str = "_setup.xml";

/// A parsed cabinet, open for editing.
///
/// See the crate-level docs for the parse/edit/write lifecycle. All editor
/// operations live in [`crate::edit`]; serialization lives in
/// [`crate::write`].
#[derive(Debug)]
pub struct Cabinet {
    pub(crate) reserve_present: bool,
    pub(crate) set_id: u16,
    pub(crate) cabinet_index: u16,
    pub(crate) cb_cf_header: u16,
    pub(crate) cb_cf_folder: u8,
    pub(crate) cb_cf_data: u8,
    pub(crate) header_reserve: Vec<u8>,
    pub(crate) folders: Vec<Folder>,
    pub(crate) files: Vec<FileEntry>,
    pub(crate) manifest: Option<SetupManifest>,
    /// Set once the user edits `_setup.xml` directly; suppresses automatic
    /// manifest synchronization for the rest of the session.
    pub(crate) manifest_edited: bool,
    pub(crate) warnings: Vec<String>,
}

/// One compression unit inside a cabinet.
#[derive(Debug, Clone)]
pub struct Folder {
    /// Raw typeCompress value, reproduced on write without re-evaluation.
    pub(crate) compression: u16,
    /// Reserve block of length `cb_cf_folder`, copied verbatim from source
    /// (zero-filled for folders created during the session).
    pub(crate) reserve: Vec<u8>,
    /// Data blocks as captured at parse time. The writer re-derives these;
    /// they are kept for inspection of the loaded layout.
    pub(crate) data_blocks: Vec<DataBlock>,
}

impl Folder {
    /// Raw typeCompress value of this folder.
    pub fn compression(&self) -> u16 {
        self.compression
    }

    /// The folder's reserve block, exactly `cbCFFolder` bytes.
    pub fn reserve(&self) -> &[u8] {
        &self.reserve
    }

    /// Data blocks captured at parse time (empty for folders created by
    /// edits; the writer re-splits streams regardless).
    pub fn data_blocks(&self) -> &[DataBlock] {
        &self.data_blocks
    }
}

/// One file entry, payload held in memory for the session.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub(crate) name: String,
    pub(crate) date: u16,
    pub(crate) time: u16,
    pub(crate) attributes: u16,
    pub(crate) folder_index: u16,
    pub(crate) folder_offset: u32,
    pub(crate) payload: Vec<u8>,
}

impl FileEntry {
    /// The entry's path name as stored in the cabinet.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size in bytes.
    pub fn size(&self) -> u32 {
        self.payload.len() as u32
    }

    /// DOS-encoded modification date.
    pub fn date(&self) -> u16 {
        self.date
    }

    /// DOS-encoded modification time.
    pub fn time(&self) -> u16 {
        self.time
    }

    /// File attribute bits.
    pub fn attributes(&self) -> u16 {
        self.attributes
    }

    /// Index of the folder holding this file's bytes.
    pub fn folder_index(&self) -> u16 {
        self.folder_index
    }

    /// Byte offset within the folder's uncompressed stream.
    pub fn folder_offset(&self) -> u32 {
        self.folder_offset
    }

    /// The file's content.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Modification time as a "YYYY-MM-DD HH:MM:SS" display string, or an
    /// empty string when the DOS date is zero.
    pub fn modified_display(&self) -> String {
        format_dos_datetime(self.date, self.time)
    }
}

/// One CFDATA block as captured at parse time.
#[derive(Debug, Clone)]
pub struct DataBlock {
    /// Stored block checksum.
    pub(crate) checksum: u32,
    /// Compressed payload bytes.
    pub(crate) compressed: Vec<u8>,
    /// Declared uncompressed length.
    pub(crate) uncompressed_size: u16,
}

impl DataBlock {
    /// The checksum stored in the source cabinet.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// The compressed payload.
    pub fn compressed(&self) -> &[u8] {
        &self.compressed
    }

    /// Declared uncompressed length of this block.
    pub fn uncompressed_size(&self) -> u16 {
        self.uncompressed_size
    }
}

/// A display-friendly summary of one cabinet entry.
#[derive(Debug, Clone)]
pub struct FileSummary {
    /// Entry name as stored in the cabinet.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u32,
    /// Formatted modification time, empty if unset.
    pub modified: String,
    /// Install directory from the manifest mapping, if one exists.
    pub install_dir: Option<String>,
}

impl Cabinet {
    /// Whether the header's reserve-fields-present flag (0x0004) was set.
    pub fn reserve_present(&self) -> bool {
        self.reserve_present
    }

    /// The cabinet set identifier, copied verbatim from source.
    pub fn set_id(&self) -> u16 {
        self.set_id
    }

    /// Index of this cabinet within its set (iCabinet), copied verbatim.
    pub fn cabinet_index(&self) -> u16 {
        self.cabinet_index
    }

    /// Declared per-cabinet header reserve length (cbCFHeader).
    pub fn header_reserve_size(&self) -> u16 {
        self.cb_cf_header
    }

    /// Declared per-folder reserve length (cbCFFolder).
    pub fn folder_reserve_size(&self) -> u8 {
        self.cb_cf_folder
    }

    /// Declared per-data-block reserve length (cbCFData).
    pub fn data_reserve_size(&self) -> u8 {
        self.cb_cf_data
    }

    /// The header reserve bytes, exactly `cbCFHeader` long.
    pub fn header_reserve(&self) -> &[u8] {
        &self.header_reserve
    }

    /// Number of folders currently referenced by files.
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Number of file entries.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// All folders in source order.
    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    /// All file entries in source order (appended entries last).
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Looks up a file entry by name, case-insensitively.
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.find_file(name).map(|idx| &self.files[idx])
    }

    /// Whether an entry with this name exists (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.find_file(name).is_some()
    }

    /// The decoded `_setup.xml` mapping, if the cabinet carries one that
    /// parsed cleanly.
    pub fn manifest(&self) -> Option<&SetupManifest> {
        self.manifest.as_ref()
    }

    /// Non-fatal problems recorded while loading (for example, a present but
    /// malformed `_setup.xml`).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Display summaries for every entry, joined with the manifest's install
    /// directories where available.
    pub fn records(&self) -> Vec<FileSummary> {
        self.files
            .iter()
            .map(|f| FileSummary {
                name: f.name.clone(),
                size: f.size(),
                modified: f.modified_display(),
                install_dir: self
                    .manifest
                    .as_ref()
                    .and_then(|m| m.directory_of(&f.name).map(str::to_owned)),
            })
            .collect()
    }

    pub(crate) fn find_file(&self, name: &str) -> Option<usize> {
        self.files
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// DOS date/time stamp for entries created during the session.
///
/// 2000-01-01 00:00:00, fixed so that repeated writes of the same edits are
/// byte-identical. DOS dates count years from 1980.
pub(crate) const DEFAULT_DOS_DATE: u16 = (20 << 9) | (1 << 5) | 1;
/// Companion time stamp for [`DEFAULT_DOS_DATE`].
pub(crate) const DEFAULT_DOS_TIME: u16 = 0;

/// Formats a DOS date/time pair for display; empty when the date is zero.
fn format_dos_datetime(date: u16, time: u16) -> String {
    if date == 0 {
        return String::new();
    }
    let day = date & 0x1F;
    let month = (date >> 5) & 0x0F;
    let year = ((date >> 9) & 0x7F) + 1980;
    let seconds = (time & 0x1F) * 2;
    let minutes = (time >> 5) & 0x3F;
    let hours = (time >> 11) & 0x1F;
    format!("{year:04}-{month:02}-{day:02} {hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_datetime_display() {
        // 2024-01-15 12:30:00
        let date = (44 << 9) | (1 << 5) | 15;
        let time = (12 << 11) | (30 << 5);
        assert_eq!(format_dos_datetime(date, time), "2024-01-15 12:30:00");
    }

    #[test]
    fn zero_date_displays_empty() {
        assert_eq!(format_dos_datetime(0, 0), "");
    }

    #[test]
    fn default_stamp_decodes_to_y2k() {
        assert_eq!(
            format_dos_datetime(DEFAULT_DOS_DATE, DEFAULT_DOS_TIME),
            "2000-01-01 00:00:00"
        );
    }
}
