//! Add, replace, and remove operations on a loaded cabinet.

use log::debug;

use crate::document::{
    Cabinet, DEFAULT_DOS_DATE, DEFAULT_DOS_TIME, FileEntry, Folder, MANIFEST_NAME,
};
use crate::error::EditError;
use crate::format::{COMPRESS_NONE, MAX_FOLDER_STREAM};
use crate::manifest::SetupManifest;

impl Cabinet {
    /// Appends a new file to the cabinet.
    ///
    /// The entry lands in the first folder with room for its payload, or in a
    /// fresh stored-compression folder when every existing folder is full.
    /// When the cabinet carries a usable `_setup.xml` that the caller has not
    /// edited directly, a file mapping for the new entry is inserted
    /// automatically.
    ///
    /// Fails with [`EditError::DuplicateName`] if an entry with this name
    /// (case-insensitive) already exists, and [`EditError::PayloadTooLarge`]
    /// if the payload cannot fit any folder.
    pub fn add_file(
        &mut self,
        name: &str,
        payload: Vec<u8>,
        attributes: u16,
    ) -> Result<(), EditError> {
        if payload.len() as u64 > MAX_FOLDER_STREAM {
            return Err(EditError::PayloadTooLarge {
                size: payload.len() as u64,
                max: MAX_FOLDER_STREAM,
            });
        }
        if self.contains(name) {
            return Err(EditError::DuplicateName {
                name: name.to_string(),
            });
        }

        let folder_index = self.place_payload(payload.len() as u64);
        let folder_offset = self.folder_used_bytes(folder_index) as u32;
        debug!(
            "adding {name:?} ({} bytes) to folder {folder_index} at offset {folder_offset}",
            payload.len()
        );

        self.files.push(FileEntry {
            name: name.to_string(),
            date: DEFAULT_DOS_DATE,
            time: DEFAULT_DOS_TIME,
            attributes,
            folder_index: folder_index as u16,
            folder_offset,
            payload,
        });

        if name.eq_ignore_ascii_case(MANIFEST_NAME) {
            self.reload_manifest();
        } else {
            self.sync_manifest_add(name);
        }
        Ok(())
    }

    /// Replaces an existing file's content in place.
    ///
    /// The entry keeps its name, attributes, timestamps, position in the file
    /// sequence, and folder assignment; only its payload (and the derived
    /// offsets of later files in the same folder) change.
    pub fn replace_file(&mut self, name: &str, payload: Vec<u8>) -> Result<(), EditError> {
        if payload.len() as u64 > MAX_FOLDER_STREAM {
            return Err(EditError::PayloadTooLarge {
                size: payload.len() as u64,
                max: MAX_FOLDER_STREAM,
            });
        }
        let idx = self.find_file(name).ok_or_else(|| EditError::NotFound {
            name: name.to_string(),
        })?;

        self.files[idx].payload = payload;
        self.rebuild_folder_offsets();

        if name.eq_ignore_ascii_case(MANIFEST_NAME) {
            self.reload_manifest();
        }
        Ok(())
    }

    /// Removes a file from the cabinet.
    ///
    /// If this was the last file in its folder, the folder is removed too and
    /// the remaining files' folder references are renumbered densely. When an
    /// auto-synchronized `_setup.xml` is present, the entry's file mapping is
    /// removed along with it.
    pub fn remove_file(&mut self, name: &str) -> Result<(), EditError> {
        let idx = self.find_file(name).ok_or_else(|| EditError::NotFound {
            name: name.to_string(),
        })?;

        let removed = self.files.remove(idx);
        debug!("removed {:?} from folder {}", removed.name, removed.folder_index);
        self.prune_folders();
        self.rebuild_folder_offsets();

        if removed.name.eq_ignore_ascii_case(MANIFEST_NAME) {
            self.manifest = None;
            self.manifest_edited = true;
        } else {
            self.sync_manifest_remove(&removed.name);
        }
        Ok(())
    }

    /// Derives a short source name from a display name, 8.3-style, that does
    /// not collide with any existing entry.
    ///
    /// Deployment cabinets conventionally store files under DOS-ish short
    /// names while `_setup.xml` carries the real install name.
    pub fn derive_source_name(&self, display_name: &str) -> String {
        let sanitized: String = display_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '.' | '_' | '-' | '~'))
            .collect::<String>()
            .to_ascii_uppercase();

        let (base, ext) = match sanitized.rsplit_once('.') {
            Some((b, e)) if !b.is_empty() && !e.is_empty() => {
                (b.replace('.', ""), format!(".{}", truncate(e, 3)))
            }
            _ => (sanitized.replace('.', ""), String::new()),
        };
        let base = if base.is_empty() { "FILE".to_string() } else { base };

        let plain = format!("{}{ext}", truncate(&base, 8));
        if !self.contains(&plain) {
            return plain;
        }
        for n in 1u32.. {
            let suffix = format!("~{n}");
            let head = truncate(&base, 8usize.saturating_sub(suffix.len()));
            let candidate = format!("{head}{suffix}{ext}");
            if !self.contains(&candidate) {
                return candidate;
            }
        }
        unreachable!("collision counter exhausted");
    }

    /// Index of the first folder with room for `size` more bytes, creating a
    /// new stored-compression folder when none has capacity.
    fn place_payload(&mut self, size: u64) -> usize {
        for idx in 0..self.folders.len() {
            if self.folder_used_bytes(idx) + size <= MAX_FOLDER_STREAM {
                return idx;
            }
        }
        self.folders.push(Folder {
            compression: COMPRESS_NONE,
            reserve: vec![0; self.cb_cf_folder as usize],
            data_blocks: Vec::new(),
        });
        self.folders.len() - 1
    }

    /// Total uncompressed bytes currently assigned to a folder.
    fn folder_used_bytes(&self, folder_index: usize) -> u64 {
        self.files
            .iter()
            .filter(|f| f.folder_index as usize == folder_index)
            .map(|f| f.payload.len() as u64)
            .sum()
    }

    /// Drops folders no file references anymore and renumbers the survivors
    /// densely, updating every file's folder reference.
    fn prune_folders(&mut self) {
        let mut referenced = vec![false; self.folders.len()];
        for file in &self.files {
            referenced[file.folder_index as usize] = true;
        }
        if referenced.iter().all(|&r| r) {
            return;
        }

        let mut remap = vec![0u16; self.folders.len()];
        let mut next = 0u16;
        for (idx, &keep) in referenced.iter().enumerate() {
            if keep {
                remap[idx] = next;
                next += 1;
            }
        }

        let mut idx = 0;
        self.folders.retain(|_| {
            let keep = referenced[idx];
            idx += 1;
            keep
        });
        for file in &mut self.files {
            file.folder_index = remap[file.folder_index as usize];
        }
    }

    /// Recomputes every file's offset within its folder stream from the
    /// global file order. Folder streams are the files assigned to a folder,
    /// concatenated in source order.
    pub(crate) fn rebuild_folder_offsets(&mut self) {
        let mut used = vec![0u32; self.folders.len()];
        for file in &mut self.files {
            let slot = &mut used[file.folder_index as usize];
            file.folder_offset = *slot;
            *slot += file.payload.len() as u32;
        }
    }

    /// Re-decodes the manifest from the `_setup.xml` entry's current payload
    /// and latches off automatic synchronization.
    fn reload_manifest(&mut self) {
        self.manifest_edited = true;
        let payload = self
            .files
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(MANIFEST_NAME))
            .map(|f| f.payload.clone());
        self.manifest = match payload {
            Some(raw) => match SetupManifest::parse(&raw) {
                Ok(m) => Some(m),
                Err(e) => {
                    self.warnings
                        .push(format!("{MANIFEST_NAME} replaced with unusable content: {e}"));
                    None
                }
            },
            None => None,
        };
    }

    fn sync_manifest_add(&mut self, name: &str) {
        if self.manifest_edited {
            return;
        }
        if let Some(m) = self.manifest.as_mut()
            && !m.contains_source(name)
        {
            m.insert(name, name, None);
        }
    }

    fn sync_manifest_remove(&mut self, name: &str) {
        if self.manifest_edited {
            return;
        }
        if let Some(m) = self.manifest.as_mut() {
            m.remove(name);
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
