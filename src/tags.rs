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

//! The `tags` module keeps user-edited ID3 tags alive across the read-only disc image.
//!
//! Edits live in memory with per-entry dirty tracking and are persisted to a sidecar
//! XML file next to the ISO (`<iso>.xml`). The sidecar is advisory: a malformed file
//! is logged once and treated as empty, and a failed save leaves the in-memory state
//! untouched so the caller can retry.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::{index::Area, SacdFsError};

struct TagEntry {
    bytes: Vec<u8>,
    dirty: bool,
}

#[derive(Default)]
struct TagStoreInner {
    entries: HashMap<(Area, u8), TagEntry>,
    /// Set by operations that have no entry left to carry a dirty flag (clears).
    store_dirty: bool,
}

/// The per-ISO tag overlay store.
pub struct TagStore {
    sidecar_path: PathBuf,
    embedded: HashMap<(Area, u8), Vec<u8>>,
    inner: Mutex<TagStoreInner>,
}

/// Derive the sidecar path for an ISO: the full filename with `.xml` appended.
pub fn sidecar_path_for(iso_path: &Path) -> PathBuf {
    let mut s = iso_path.as_os_str().to_os_string();
    s.push(".xml");
    PathBuf::from(s)
}

impl TagStore {
    /// Create a store for `iso_path` with the given disc-embedded tags, loading any
    /// existing sidecar.
    pub fn new(iso_path: &Path, embedded: HashMap<(Area, u8), Vec<u8>>) -> TagStore {
        let store = TagStore {
            sidecar_path: sidecar_path_for(iso_path),
            embedded,
            inner: Mutex::new(TagStoreInner::default()),
        };
        store.load();
        store
    }

    /// Create an empty store that has no embedded tags and skips the sidecar load.
    pub fn detached(iso_path: PathBuf) -> TagStore {
        TagStore {
            sidecar_path: sidecar_path_for(&iso_path),
            embedded: HashMap::new(),
            inner: Mutex::new(TagStoreInner::default()),
        }
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    /// The effective tag for a track: the overlay entry if present, else the
    /// disc-embedded tag, else none.
    pub fn get(&self, area: Area, track: u8) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.entries.get(&(area, track)) {
            return Some(entry.bytes.clone());
        }
        self.embedded.get(&(area, track)).cloned()
    }

    /// Replace or insert an overlay entry and mark it dirty.
    pub fn set(&self, area: Area, track: u8, bytes: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert((area, track), TagEntry { bytes, dirty: true });
    }

    /// Remove an overlay entry, restoring the disc-embedded tag for the track.
    pub fn clear(&self, area: Area, track: u8) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.remove(&(area, track)).is_some() {
            inner.store_dirty = true;
        }
    }

    /// `true` when any edit has not yet been persisted.
    pub fn unsaved_changes(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.store_dirty || inner.entries.values().any(|e| e.dirty)
    }

    /// Persist the overlay to the sidecar: write-to-temp then rename. Dirty flags are
    /// cleared only after the rename lands; a failure leaves the store untouched.
    pub fn save(&self) -> Result<(), SacdFsError> {
        // Snapshot the serialized document first so no lock is held across disk IO.
        let document = {
            let inner = self.inner.lock().unwrap();
            Self::serialize(&inner)?
        };

        let tmp_path = self.sidecar_path.with_extension("xml.tmp");
        fs::write(&tmp_path, &document)?;
        if let Err(e) = fs::rename(&tmp_path, &self.sidecar_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        let mut inner = self.inner.lock().unwrap();
        inner.store_dirty = false;
        for entry in inner.entries.values_mut() {
            entry.dirty = false;
        }
        log::debug!("save(): wrote tag sidecar {}", self.sidecar_path.display());
        Ok(())
    }

    fn serialize(inner: &TagStoreInner) -> Result<Vec<u8>, SacdFsError> {
        fn xml_err<E: std::fmt::Display>(e: E) -> SacdFsError {
            SacdFsError::IoError(e.to_string())
        }

        let mut writer = quick_xml::Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("sacd_overlay")))
            .map_err(xml_err)?;

        // Stable entry order keeps consecutive saves byte-identical.
        let mut keys: Vec<&(Area, u8)> = inner.entries.keys().collect();
        keys.sort_by_key(|(area, track)| (area.to_string(), *track));

        for key in keys {
            let (area, track) = key;
            let entry = &inner.entries[key];
            let mut tag = BytesStart::new("tag");
            tag.push_attribute(("area", area.to_string().as_str()));
            tag.push_attribute(("track", track.to_string().as_str()));
            writer.write_event(Event::Start(tag)).map_err(xml_err)?;
            let encoded = BASE64.encode(&entry.bytes);
            writer
                .write_event(Event::Text(BytesText::new(&encoded)))
                .map_err(xml_err)?;
            writer.write_event(Event::End(BytesEnd::new("tag"))).map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("sacd_overlay")))
            .map_err(xml_err)?;
        Ok(writer.into_inner())
    }

    /// Populate the store from the sidecar, if one exists. The overlay is advisory:
    /// a malformed sidecar is logged and the store proceeds as empty.
    fn load(&self) {
        let content = match fs::read_to_string(&self.sidecar_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                log::warn!(
                    "load(): could not read tag sidecar {}: {}",
                    self.sidecar_path.display(),
                    e
                );
                return;
            }
        };

        match Self::parse(&content) {
            Ok(entries) => {
                let mut inner = self.inner.lock().unwrap();
                for ((area, track), bytes) in entries {
                    inner.entries.insert((area, track), TagEntry { bytes, dirty: false });
                }
            }
            Err(e) => {
                log::warn!(
                    "load(): malformed tag sidecar {}: {}; proceeding with an empty overlay",
                    self.sidecar_path.display(),
                    e
                );
            }
        }
    }

    fn parse(content: &str) -> Result<Vec<((Area, u8), Vec<u8>)>, String> {
        let mut reader = quick_xml::Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut entries = Vec::new();
        let mut current: Option<(Area, u8)> = None;

        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(e) if e.name().as_ref() == b"tag" => {
                    let mut area = None;
                    let mut track = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| e.to_string())?;
                        let value = attr.unescape_value().map_err(|e| e.to_string())?;
                        match attr.key.as_ref() {
                            b"area" => area = Area::from_str_loose(&value),
                            b"track" => track = value.parse::<u8>().ok(),
                            _ => {}
                        }
                    }
                    match (area, track) {
                        (Some(area), Some(track)) if track > 0 => current = Some((area, track)),
                        _ => return Err("tag element with missing or invalid attributes".to_string()),
                    }
                }
                Event::Text(t) => {
                    if let Some(key) = current {
                        let text = t.unescape().map_err(|e| e.to_string())?;
                        let bytes = BASE64
                            .decode(text.trim().as_bytes())
                            .map_err(|e| e.to_string())?;
                        entries.push((key, bytes));
                    }
                }
                Event::End(e) if e.name().as_ref() == b"tag" => current = None,
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(entries)
    }
}
