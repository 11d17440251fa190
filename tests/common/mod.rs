//! Shared fixtures: synthetic cabinets built byte-by-byte, independent of
//! the crate's own writer, so parser tests cannot be fooled by a writer bug.

#![allow(dead_code)]

use cabforge::checksum::CabChecksum;
use cabforge::codec::mszip_compress;

pub const SETUP_XML: &str = r#"<wap-provisioningdoc>
  <characteristic type="Install">
    <parm name="InstallPhase" value="install"/>
    <parm name="NumFiles" value="2"/>
  </characteristic>
  <characteristic type="FileOperation">
    <characteristic type="\Program Files\Demo" translation="install">
      <characteristic type="demo.exe" translation="install">
        <characteristic type="Extract">
          <parm name="Source" value="DEMO~1.EXE"/>
        </characteristic>
      </characteristic>
      <characteristic type="demo.cfg" translation="install">
        <characteristic type="Extract">
          <parm name="Source" value="DEMO~1.CFG"/>
        </characteristic>
      </characteristic>
    </characteristic>
  </characteristic>
</wap-provisioningdoc>"#;

/// Options for [`build_cabinet`].
#[derive(Clone)]
pub struct CabinetSpec {
    pub set_id: u16,
    pub cabinet_index: u16,
    /// `Some((header_reserve_bytes, cb_cf_folder, cb_cf_data))` enables the
    /// reserve trio and areas.
    pub reserves: Option<(Vec<u8>, u8, u8)>,
    /// One entry per folder: its compression scheme and the files stored in
    /// it, in order.
    pub folders: Vec<FolderSpec>,
}

#[derive(Clone)]
pub struct FolderSpec {
    pub mszip: bool,
    pub files: Vec<(String, Vec<u8>)>,
}

impl Default for CabinetSpec {
    fn default() -> Self {
        Self {
            set_id: 0x0622,
            cabinet_index: 0,
            reserves: None,
            folders: Vec::new(),
        }
    }
}

pub fn stored_folder(files: &[(&str, &[u8])]) -> FolderSpec {
    FolderSpec {
        mszip: false,
        files: files
            .iter()
            .map(|(n, p)| (n.to_string(), p.to_vec()))
            .collect(),
    }
}

pub fn mszip_folder(files: &[(&str, &[u8])]) -> FolderSpec {
    FolderSpec {
        mszip: true,
        files: files
            .iter()
            .map(|(n, p)| (n.to_string(), p.to_vec()))
            .collect(),
    }
}

/// A one-folder stored cabinet without reserves, the simplest useful image.
pub fn simple_cabinet(files: &[(&str, &[u8])]) -> Vec<u8> {
    build_cabinet(&CabinetSpec {
        folders: vec![stored_folder(files)],
        ..CabinetSpec::default()
    })
}

/// A cabinet whose first entry is a `_setup.xml` mapping the other files.
pub fn provisioned_cabinet() -> Vec<u8> {
    build_cabinet(&CabinetSpec {
        folders: vec![stored_folder(&[
            ("_setup.xml", SETUP_XML.as_bytes()),
            ("DEMO~1.EXE", b"MZ fake executable"),
            ("DEMO~1.CFG", b"[settings]\nkey=value\n"),
        ])],
        ..CabinetSpec::default()
    })
}

/// Serializes a [`CabinetSpec`] into a cabinet image.
pub fn build_cabinet(spec: &CabinetSpec) -> Vec<u8> {
    let (header_reserve, cb_cf_folder, cb_cf_data) = match &spec.reserves {
        Some((bytes, folder, data)) => (bytes.clone(), *folder, *data),
        None => (Vec::new(), 0, 0),
    };

    // Encode each folder's data section and remember block counts.
    let mut sections = Vec::new();
    for folder in &spec.folders {
        let stream: Vec<u8> = folder
            .files
            .iter()
            .flat_map(|(_, p)| p.iter().copied())
            .collect();
        sections.push(encode_data_section(&stream, folder.mszip, cb_cf_data));
    }

    // File table, all folders' files in folder order.
    let mut file_table = Vec::new();
    let mut num_files = 0u16;
    for (folder_index, folder) in spec.folders.iter().enumerate() {
        let mut offset = 0u32;
        for (name, payload) in &folder.files {
            file_table.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            file_table.extend_from_slice(&offset.to_le_bytes());
            file_table.extend_from_slice(&(folder_index as u16).to_le_bytes());
            file_table.extend_from_slice(&0x5821u16.to_le_bytes()); // date
            file_table.extend_from_slice(&0x63C0u16.to_le_bytes()); // time
            file_table.extend_from_slice(&0x20u16.to_le_bytes()); // attribs
            file_table.extend_from_slice(name.as_bytes());
            file_table.push(0);
            offset += payload.len() as u32;
            num_files += 1;
        }
    }

    let reserve_trio = if spec.reserves.is_some() {
        4 + header_reserve.len()
    } else {
        0
    };
    let folder_table_size = spec.folders.len() * (8 + cb_cf_folder as usize);
    let files_offset = 36 + reserve_trio + folder_table_size;
    let data_start = files_offset + file_table.len();

    let mut folder_table = Vec::new();
    let mut data_offset = data_start;
    for (folder, (num_blocks, section)) in spec.folders.iter().zip(&sections) {
        folder_table.extend_from_slice(&(data_offset as u32).to_le_bytes());
        folder_table.extend_from_slice(&num_blocks.to_le_bytes());
        let type_compress: u16 = if folder.mszip { 1 } else { 0 };
        folder_table.extend_from_slice(&type_compress.to_le_bytes());
        folder_table.extend_from_slice(&vec![0u8; cb_cf_folder as usize]);
        data_offset += section.len();
    }
    let total = data_offset;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"MSCF");
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(files_offset as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.push(3); // versionMinor
    out.push(1); // versionMajor
    out.extend_from_slice(&(spec.folders.len() as u16).to_le_bytes());
    out.extend_from_slice(&num_files.to_le_bytes());
    let flags: u16 = if spec.reserves.is_some() { 0x0004 } else { 0 };
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&spec.set_id.to_le_bytes());
    out.extend_from_slice(&spec.cabinet_index.to_le_bytes());

    if spec.reserves.is_some() {
        out.extend_from_slice(&(header_reserve.len() as u16).to_le_bytes());
        out.push(cb_cf_folder);
        out.push(cb_cf_data);
        out.extend_from_slice(&header_reserve);
    }
    out.extend_from_slice(&folder_table);
    out.extend_from_slice(&file_table);
    for (_, section) in &sections {
        out.extend_from_slice(section);
    }
    out
}

fn encode_data_section(stream: &[u8], mszip: bool, cb_cf_data: u8) -> (u16, Vec<u8>) {
    let mut out = Vec::new();
    let mut num_blocks = 0u16;
    let chunks: Vec<&[u8]> = if stream.is_empty() {
        Vec::new()
    } else {
        stream.chunks(0x8000).collect()
    };
    for chunk in chunks {
        let encoded = if mszip {
            mszip_compress(chunk).expect("deflate to memory cannot fail")
        } else {
            chunk.to_vec()
        };
        let mut csum = CabChecksum::with_seed(CabChecksum::compute(&encoded));
        csum.update(&(encoded.len() as u16).to_le_bytes());
        csum.update(&(chunk.len() as u16).to_le_bytes());

        out.extend_from_slice(&csum.finalize().to_le_bytes());
        out.extend_from_slice(&(encoded.len() as u16).to_le_bytes());
        out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
        out.extend_from_slice(&vec![0u8; cb_cf_data as usize]);
        out.extend_from_slice(&encoded);
        num_blocks += 1;
    }
    (num_blocks, out)
}
