//! End-to-end editing: parse, mutate, write, and verify against a fresh
//! parse of the result.

mod common;

use cabforge::{Cabinet, EditError, WriteError};
use common::{simple_cabinet, stored_folder, CabinetSpec};

#[test]
fn add_file_appends_after_existing_entries() {
    let mut cab = Cabinet::parse(&simple_cabinet(&[("a.txt", b"aaa")])).unwrap();
    cab.add_file("b.txt", b"bbb".to_vec(), 0x20).unwrap();

    let back = Cabinet::parse(&cab.write().unwrap()).unwrap();
    assert_eq!(back.files()[0].name(), "a.txt");
    assert_eq!(back.files()[1].name(), "b.txt");
    assert_eq!(back.file("b.txt").unwrap().payload(), b"bbb");
}

#[test]
fn added_file_reuses_existing_folder() {
    let mut cab = Cabinet::parse(&simple_cabinet(&[("a.txt", b"aaa")])).unwrap();
    cab.add_file("b.txt", b"bbb".to_vec(), 0).unwrap();
    assert_eq!(cab.folder_count(), 1);

    let back = Cabinet::parse(&cab.write().unwrap()).unwrap();
    assert_eq!(back.folder_count(), 1);
    assert_eq!(back.file("b.txt").unwrap().folder_index(), 0);
}

#[test]
fn replace_preserves_order_and_folder() {
    let image = common::build_cabinet(&CabinetSpec {
        folders: vec![
            stored_folder(&[("a.txt", b"aaa")]),
            stored_folder(&[("b.txt", b"bbb"), ("c.txt", b"ccc")]),
        ],
        ..CabinetSpec::default()
    });
    let mut cab = Cabinet::parse(&image).unwrap();
    cab.replace_file("b.txt", b"much longer replacement".to_vec())
        .unwrap();

    let back = Cabinet::parse(&cab.write().unwrap()).unwrap();
    let names: Vec<_> = back.files().iter().map(|f| f.name()).collect();
    assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
    assert_eq!(back.file("b.txt").unwrap().folder_index(), 1);
    assert_eq!(
        back.file("b.txt").unwrap().payload(),
        b"much longer replacement"
    );
    // c.txt still follows b.txt in the same folder stream.
    assert_eq!(back.file("c.txt").unwrap().folder_offset(), 23);
    assert_eq!(back.file("c.txt").unwrap().payload(), b"ccc");
}

#[test]
fn remove_middle_file_keeps_neighbors() {
    let mut cab =
        Cabinet::parse(&simple_cabinet(&[("a.txt", b"aaa"), ("b.txt", b"bbb"), ("c.txt", b"ccc")]))
            .unwrap();
    cab.remove_file("b.txt").unwrap();

    let back = Cabinet::parse(&cab.write().unwrap()).unwrap();
    assert_eq!(back.file_count(), 2);
    assert!(back.file("b.txt").is_none());
    assert_eq!(back.file("a.txt").unwrap().payload(), b"aaa");
    assert_eq!(back.file("c.txt").unwrap().payload(), b"ccc");
}

#[test]
fn remove_whole_folder_renumbers_references() {
    let image = common::build_cabinet(&CabinetSpec {
        folders: vec![
            stored_folder(&[("only.bin", b"folder zero")]),
            stored_folder(&[("keep.bin", b"folder one")]),
        ],
        ..CabinetSpec::default()
    });
    let mut cab = Cabinet::parse(&image).unwrap();
    cab.remove_file("only.bin").unwrap();

    let back = Cabinet::parse(&cab.write().unwrap()).unwrap();
    assert_eq!(back.folder_count(), 1);
    assert_eq!(back.file("keep.bin").unwrap().folder_index(), 0);
    assert_eq!(back.file("keep.bin").unwrap().payload(), b"folder one");
}

#[test]
fn removing_every_file_makes_cabinet_unwritable() {
    let mut cab = Cabinet::parse(&simple_cabinet(&[("a.txt", b"x")])).unwrap();
    cab.remove_file("a.txt").unwrap();
    assert!(matches!(cab.write(), Err(WriteError::EmptyCabinet)));
}

#[test]
fn failed_edits_leave_cabinet_untouched() {
    let image = simple_cabinet(&[("a.txt", b"aaa")]);
    let mut cab = Cabinet::parse(&image).unwrap();
    let baseline = cab.write().unwrap();

    assert!(matches!(
        cab.add_file("A.TXT", b"dup".to_vec(), 0),
        Err(EditError::DuplicateName { .. })
    ));
    assert!(matches!(
        cab.replace_file("missing", b"x".to_vec()),
        Err(EditError::NotFound { .. })
    ));
    assert!(matches!(
        cab.remove_file("missing"),
        Err(EditError::NotFound { .. })
    ));

    assert_eq!(cab.write().unwrap(), baseline);
}

#[test]
fn names_match_case_insensitively() {
    let mut cab = Cabinet::parse(&simple_cabinet(&[("App.EXE", b"mz")])).unwrap();
    assert!(cab.contains("APP.exe"));
    cab.replace_file("app.exe", b"MZ2".to_vec()).unwrap();
    cab.remove_file("APP.EXE").unwrap();
    assert_eq!(cab.file_count(), 0);
}

#[test]
fn edits_preserve_reserve_layout() {
    let header_reserve = vec![0x42u8; 12];
    let image = common::build_cabinet(&CabinetSpec {
        reserves: Some((header_reserve.clone(), 6, 2)),
        folders: vec![stored_folder(&[("a.txt", b"aaa")])],
        ..CabinetSpec::default()
    });
    let mut cab = Cabinet::parse(&image).unwrap();
    cab.add_file("b.txt", b"bbb".to_vec(), 0).unwrap();
    cab.remove_file("a.txt").unwrap();

    let back = Cabinet::parse(&cab.write().unwrap()).unwrap();
    assert!(back.reserve_present());
    assert_eq!(back.header_reserve(), &header_reserve[..]);
    assert_eq!(back.folder_reserve_size(), 6);
    assert_eq!(back.data_reserve_size(), 2);
    assert_eq!(back.folders()[0].reserve().len(), 6);
}

#[test]
fn removal_in_a_wide_cabinet_renumbers_densely() {
    // 33 folders holding 47 files: the first 14 folders carry two files
    // each, the rest one. Removing the sole file of a middle folder must
    // collapse that folder and shift every later reference down by one.
    let folders: Vec<common::FolderSpec> = (0..33)
        .map(|fi| {
            let count = if fi < 14 { 2 } else { 1 };
            let files: Vec<(String, Vec<u8>)> = (0..count)
                .map(|i| (format!("F{fi:02}_{i}.BIN"), vec![fi as u8; 32 + i]))
                .collect();
            common::FolderSpec { mszip: false, files }
        })
        .collect();
    let image = common::build_cabinet(&CabinetSpec {
        reserves: Some((Vec::new(), 64, 0)),
        folders,
        ..CabinetSpec::default()
    });

    let mut cab = Cabinet::parse(&image).unwrap();
    assert_eq!(cab.folder_count(), 33);
    assert_eq!(cab.file_count(), 47);

    cab.remove_file("F20_0.BIN").unwrap();

    let back = Cabinet::parse(&cab.write().unwrap()).unwrap();
    assert_eq!(back.folder_count(), 32);
    assert_eq!(back.file_count(), 46);
    assert_eq!(back.folder_reserve_size(), 64);
    assert!(back.folders().iter().all(|f| f.reserve().len() == 64));
    assert_eq!(back.file("F19_0.BIN").unwrap().folder_index(), 19);
    assert_eq!(back.file("F21_0.BIN").unwrap().folder_index(), 20);
    assert_eq!(back.file("F32_0.BIN").unwrap().folder_index(), 31);
    assert_eq!(back.file("F32_0.BIN").unwrap().payload(), &vec![32u8; 32][..]);
}

#[test]
fn replace_is_idempotent() {
    let image = simple_cabinet(&[("a.txt", b"aaa"), ("b.txt", b"bbb")]);

    let mut once = Cabinet::parse(&image).unwrap();
    once.replace_file("a.txt", b"new content".to_vec()).unwrap();

    let mut twice = Cabinet::parse(&image).unwrap();
    twice.replace_file("a.txt", b"new content".to_vec()).unwrap();
    twice.replace_file("a.txt", b"new content".to_vec()).unwrap();

    assert_eq!(once.write().unwrap(), twice.write().unwrap());
}

#[test]
fn derive_source_name_avoids_existing_entries() {
    let cab = Cabinet::parse(&simple_cabinet(&[("LONGNA~1.TXT", b"x")])).unwrap();
    assert_eq!(cab.derive_source_name("longnamefile.txt"), "LONGNAME.TXT");
    assert_eq!(cab.derive_source_name("longna~1.txt"), "LONGNA~2.TXT");
}

#[test]
fn records_expose_summary_rows() {
    let cab = Cabinet::parse(&simple_cabinet(&[("a.txt", b"hello")])).unwrap();
    let records = cab.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "a.txt");
    assert_eq!(records[0].size, 5);
    assert!(!records[0].modified.is_empty());
    assert!(records[0].install_dir.is_none());
}
