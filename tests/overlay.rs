/*
    SacdFS
    https://github.com/dbalsom/sacdfs

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

mod common;

use common::*;
use sacdfs::{
    overlay::{Overlay, OverlayEntry, W_OK},
    SacdFsError,
};
use std::{fs, time::Duration};

#[test]
fn iso_is_hidden_and_replaced_by_a_directory() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));
    fs::write(dir.path().join("A.iso.xml"), "<sacd_overlay></sacd_overlay>").unwrap();
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let entries = listing(&overlay, "/");

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["A", "notes.txt"]);
    assert!(entries[0].is_dir);
    assert!(!entries[1].is_dir);
}

#[test]
fn stereo_only_disc_lists_a_single_area() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    assert_eq!(names(&overlay, "/A"), vec!["Stereo"]);
}

#[test]
fn tracks_list_in_number_order() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(
        &dir.path().join("A.iso"),
        &DiscSpec::stereo_only(&["One", "Two", "Three"]),
    );

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    assert_eq!(
        names(&overlay, "/A/Stereo"),
        vec!["01. One.dsf", "02. Two.dsf", "03. Three.dsf"]
    );
}

#[test]
fn both_areas_are_listed_when_present() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let mut spec = DiscSpec::stereo_only(&["One"]);
    spec.multichannel_tracks = vec![("One".to_string(), 10)];
    write_iso(&dir.path().join("A.iso"), &spec);

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    assert_eq!(names(&overlay, "/A"), vec!["Stereo", "Multi-channel"]);
}

#[test]
fn hidden_area_falls_back_when_it_is_the_only_one() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let mut config = overlay_config(dir.path());
    config.visibility = sacdfs::index::AreaVisibility::MULTICHANNEL;
    let overlay = Overlay::new(config).unwrap();

    // The disc only has a stereo area; hiding it would hide the whole disc, so the
    // area is shown anyway.
    assert_eq!(names(&overlay, "/A"), vec!["Stereo"]);
}

#[test]
fn colliding_display_names_get_suffixes() {
    init();
    let dir = tempfile::tempdir().unwrap();
    // Same stem after extension stripping, both valid SACDs.
    write_iso(&dir.path().join("B.iso"), &DiscSpec::stereo_only(&["One"]));
    write_iso(&dir.path().join("B.ISO"), &DiscSpec::stereo_only(&["Two"]));

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let mut found = names(&overlay, "/");
    found.sort();
    assert_eq!(found, vec!["B", "B (1)"]);

    // Both resolve to browsable virtual folders.
    assert!(overlay.getattr("/B").unwrap().is_dir());
    assert!(overlay.getattr("/B (1)").unwrap().is_dir());
}

#[test]
fn mount_cap_is_honoured() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));
    write_iso(&dir.path().join("B.iso"), &DiscSpec::stereo_only(&["One"]));

    let mut config = overlay_config(dir.path());
    config.max_open_isos = 1;
    let overlay = Overlay::new(config).unwrap();

    // Listing registers A (sorted first) and must skip B at the cap.
    let entries = names(&overlay, "/");
    assert_eq!(entries, vec!["A"]);
    assert_eq!(overlay.mount_count(), 1);

    // A direct approach to the unregistered ISO reports the limit.
    assert!(matches!(overlay.getattr("/B"), Err(SacdFsError::ResourceLimit)));
    assert_eq!(overlay.mount_count(), 1);
}

#[test]
fn passthrough_files_read_through() {
    init();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "plain contents").unwrap();

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let bytes = read_range(&overlay, "/notes.txt", 6, 8);
    assert_eq!(&bytes, b"contents");

    let fh = overlay.open("/notes.txt", false).unwrap();
    assert!(matches!(
        overlay.write(fh, 0, b"nope"),
        Err(SacdFsError::PermissionDenied)
    ));
    overlay.release(fh).unwrap();
}

#[test]
fn invalid_iso_stays_a_plain_file() {
    init();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fake.iso"), vec![0u8; 4096]).unwrap();

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let entries = listing(&overlay, "/");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "fake.iso");
    assert!(!entries[0].is_dir);
    assert_eq!(overlay.mount_count(), 0);
}

#[test]
fn discs_in_subdirectories_shadow_in_place() {
    init();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("classical")).unwrap();
    write_iso(
        &dir.path().join("classical").join("A.iso"),
        &DiscSpec::stereo_only(&["One"]),
    );

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    assert_eq!(names(&overlay, "/classical"), vec!["A"]);
    assert!(overlay.getattr("/classical/A/Stereo").unwrap().is_dir());
    assert_eq!(
        names(&overlay, "/classical/A/Stereo"),
        vec!["01. One.dsf"]
    );
}

#[test]
fn stat_is_deterministic() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let path = "/A/Stereo/01. One.dsf";
    let first = overlay.getattr(path).unwrap();
    let second = overlay.getattr(path).unwrap();
    assert_eq!(first.name(), second.name());
    assert_eq!(first.size(), second.size());
    assert_eq!(first.is_dir(), second.is_dir());
}

#[test]
fn idle_mounts_are_evicted_but_referenced_mounts_stay() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let mut config = overlay_config(dir.path());
    config.cache_timeout = Duration::from_secs(0);
    let overlay = Overlay::new(config).unwrap();

    let _ = names(&overlay, "/A");
    assert_eq!(overlay.active_vfs_count(), 1);

    // An open handle holds a reference; the sweep must leave the VFS alone.
    let fh = overlay.open("/A/Stereo/01. One.dsf", false).unwrap();
    overlay.sweep_idle();
    assert_eq!(overlay.active_vfs_count(), 1);

    overlay.release(fh).unwrap();
    overlay.sweep_idle();
    assert_eq!(overlay.active_vfs_count(), 0);

    // The mount entry itself survives eviction and can be re-entered.
    assert_eq!(overlay.mount_count(), 1);
    assert_eq!(names(&overlay, "/A/Stereo"), vec!["01. One.dsf"]);
}

#[test]
fn access_reflects_write_capability() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let read_only = Overlay::new({
        let mut c = overlay_config(dir.path());
        c.editable_tags = false;
        c
    })
    .unwrap();
    assert!(read_only.access("/A/Stereo/01. One.dsf", 4).is_ok());
    assert!(matches!(
        read_only.access("/A/Stereo/01. One.dsf", W_OK),
        Err(SacdFsError::PermissionDenied)
    ));

    let editable = Overlay::new(overlay_config(dir.path())).unwrap();
    assert!(editable.access("/A/Stereo/01. One.dsf", W_OK).is_ok());
}

#[test]
fn writes_inside_the_audio_region_are_refused() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let path = "/A/Stereo/01. One.dsf";
    let fh = overlay.open(path, true).unwrap();

    // Offset 92 is the first audio byte.
    assert!(matches!(
        overlay.write(fh, 92, b"junk"),
        Err(SacdFsError::PermissionDenied)
    ));
    overlay.release(fh).unwrap();

    // No mutation: the audio still materializes from the disc.
    let magic = read_range(&overlay, path, 0, 4);
    assert_eq!(&magic, b"DSD ");
}

#[test]
fn tag_edits_survive_close_and_reopen() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let path = "/A/Stereo/01. One.dsf";
    let offset = metadata_offset(&overlay, path);
    assert!(offset > 0);

    let new_tag = b"ID3-replacement-tag";
    let fh = overlay.open(path, true).unwrap();
    assert_eq!(overlay.write(fh, offset, new_tag).unwrap(), new_tag.len());
    overlay.release(fh).unwrap();

    let bytes = read_range(&overlay, path, offset, new_tag.len());
    assert_eq!(&bytes, new_tag);

    // The file size reflects the replacement tag.
    match overlay.getattr(path).unwrap() {
        OverlayEntry::File { size, .. } => assert_eq!(size, offset + new_tag.len() as u64),
        _ => panic!("expected a file"),
    }
}

#[test]
fn truncate_is_a_noop_on_virtual_files() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let path = "/A/Stereo/01. One.dsf";
    let before = overlay.getattr(path).unwrap().size();
    overlay.truncate(path, 0).unwrap();
    assert_eq!(overlay.getattr(path).unwrap().size(), before);
}

#[test]
fn release_is_idempotent() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write_iso(&dir.path().join("A.iso"), &DiscSpec::stereo_only(&["One"]));

    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();
    let fh = overlay.open("/A/Stereo/01. One.dsf", false).unwrap();
    overlay.release(fh).unwrap();
    overlay.release(fh).unwrap();
    assert!(matches!(
        overlay.read(fh, 0, &mut [0u8; 4]),
        Err(SacdFsError::StaleHandle)
    ));
}
