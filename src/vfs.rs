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

//! The `vfs` module models one SACD disc image as a small virtual directory tree:
//! one directory per visible area (`Stereo`, `Multi-channel`), one DSF file per track.
//!
//! File handles route reads and seeks to the DSF materializer; writes land in a
//! bounded tag edit buffer that is flushed through the tag overlay store when the
//! handle closes.

use std::{
    collections::HashMap,
    io::SeekFrom,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
};

use crate::{
    decoder::{DecodeCoordinator, DstDecoderFactory, WorkerPool},
    disc::{Disc, FrameFormat, FrameSource},
    dsf::DsfFile,
    index::{Area, AreaVisibility, IsoIndex},
    tags::TagStore,
    util::{normalize_vpath, sanitize_name, track_file_name, TrackNameFormat},
    SacdFsError,
    DSF_BLOCK_SIZE,
    DSF_HEADER_SIZE,
    FRAME_BYTES_PER_CHANNEL,
    MAX_TAG_SIZE,
};

/// Per-ISO VFS construction parameters.
#[derive(Clone)]
pub struct VfsConfig {
    pub visibility: AreaVisibility,
    pub name_format: TrackNameFormat,
    /// When false, `file_open_write` is refused and virtual files advertise no write bit.
    pub writable_tags: bool,
    pub pool: Arc<WorkerPool>,
    pub decoder_factory: Option<DstDecoderFactory>,
}

/// A directory entry of the virtual tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VfsEntry {
    Directory { name: String },
    File { name: String, size: u64 },
}

impl VfsEntry {
    pub fn name(&self) -> &str {
        match self {
            VfsEntry::Directory { name } => name,
            VfsEntry::File { name, .. } => name,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum VfsPath {
    Root,
    AreaDir(Area),
    Track(Area, u8),
}

struct TagEditBuffer {
    bytes: Vec<u8>,
    high_water: usize,
    dirty: bool,
}

struct VfsHandle {
    dsf: DsfFile,
    area: Area,
    track: u8,
    edit: Option<TagEditBuffer>,
}

/// The virtual filesystem of one mounted disc image.
pub struct IsoVfs {
    index: IsoIndex,
    source: Arc<Mutex<dyn FrameSource>>,
    tags: Arc<TagStore>,
    pool: Arc<WorkerPool>,
    decoder_factory: Option<DstDecoderFactory>,
    coordinators: Mutex<HashMap<Area, Arc<DecodeCoordinator>>>,
    name_format: TrackNameFormat,
    writable_tags: bool,
    /// Track filenames per area, indexed by track number - 1. Computed once so that
    /// listings and lookups always agree.
    track_names: HashMap<Area, Vec<String>>,
    handles: Mutex<HashMap<u64, Arc<Mutex<VfsHandle>>>>,
    next_handle: AtomicU64,
}

impl IsoVfs {
    /// Open a disc image from the host filesystem.
    pub fn open<P: AsRef<Path>>(iso_path: P, config: VfsConfig) -> Result<IsoVfs, SacdFsError> {
        let disc = Disc::open(iso_path.as_ref())?;
        Self::from_source(disc, iso_path.as_ref(), config)
    }

    /// Build a VFS over any frame source. `iso_path` locates the tag sidecar.
    pub fn from_source<S: FrameSource + 'static>(
        source: S,
        iso_path: &Path,
        config: VfsConfig,
    ) -> Result<IsoVfs, SacdFsError> {
        let index = IsoIndex::build(source.toc(), config.visibility);

        let mut embedded = HashMap::new();
        for area in index.visible_areas() {
            if let Some(area_index) = index.area(area) {
                for track in area_index.tracks() {
                    embedded.insert((area, track.number), track.embedded_id3.clone());
                }
            }
        }
        let tags = Arc::new(TagStore::new(iso_path, embedded));

        let track_names = Self::build_track_names(&index, config.name_format);

        Ok(IsoVfs {
            index,
            source: Arc::new(Mutex::new(source)),
            tags,
            pool: config.pool,
            decoder_factory: config.decoder_factory,
            coordinators: Mutex::new(HashMap::new()),
            name_format: config.name_format,
            writable_tags: config.writable_tags,
            track_names,
            handles: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    fn build_track_names(index: &IsoIndex, format: TrackNameFormat) -> HashMap<Area, Vec<String>> {
        let mut map = HashMap::new();
        for area in [Area::Stereo, Area::Multichannel] {
            let Some(area_index) = index.area(area) else {
                continue;
            };
            let mut seen: HashMap<String, u32> = HashMap::new();
            let mut names = Vec::with_capacity(area_index.tracks().len());
            for track in area_index.tracks() {
                let mut name = track_file_name(format, track.number, &track.title, &track.performer);
                match seen.get_mut(&name) {
                    Some(count) => {
                        *count += 1;
                        let stem = name.trim_end_matches(".dsf").to_string();
                        name = format!("{} ({}).dsf", stem, count);
                    }
                    None => {
                        seen.insert(name.clone(), 0);
                    }
                }
                names.push(name);
            }
            map.insert(area, names);
        }
        map
    }

    /// The sanitized album title of the disc.
    pub fn album_name(&self) -> String {
        sanitize_name(&self.index.album.title)
    }

    pub fn index(&self) -> &IsoIndex {
        &self.index
    }

    pub fn tags(&self) -> &Arc<TagStore> {
        &self.tags
    }

    pub fn name_format(&self) -> TrackNameFormat {
        self.name_format
    }

    pub fn writable_tags(&self) -> bool {
        self.writable_tags
    }

    /// Number of file handles currently open.
    pub fn open_handle_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    /// Persist the tag overlay if it has unsaved edits.
    pub fn flush_tags(&self) -> Result<(), SacdFsError> {
        if self.tags.unsaved_changes() {
            self.tags.save()?;
        }
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<VfsPath, SacdFsError> {
        let path = normalize_vpath(path);
        if path == "/" {
            return Ok(VfsPath::Root);
        }

        let mut segments = path[1..].split('/');
        let area_name = segments.next().unwrap_or("");
        let area = [Area::Stereo, Area::Multichannel]
            .into_iter()
            .find(|a| a.dir_name() == area_name && self.index.should_show_area(*a))
            .ok_or(SacdFsError::NotFound)?;

        let Some(file_name) = segments.next() else {
            return Ok(VfsPath::AreaDir(area));
        };
        if segments.next().is_some() {
            return Err(SacdFsError::NotFound);
        }

        let names = self.track_names.get(&area).ok_or(SacdFsError::NotFound)?;
        let position = names
            .iter()
            .position(|n| n == file_name)
            .ok_or(SacdFsError::NotFound)?;
        Ok(VfsPath::Track(area, (position + 1) as u8))
    }

    /// Total synthetic file size of a track, computed without materializing it.
    fn track_file_size(&self, area: Area, number: u8) -> Result<u64, SacdFsError> {
        let area_index = self.index.area(area).ok_or(SacdFsError::NotFound)?;
        let track = area_index.track(number).ok_or(SacdFsError::NotFound)?;

        let block = DSF_BLOCK_SIZE as u64;
        let raw = track.frame_count as u64 * FRAME_BYTES_PER_CHANNEL as u64;
        let padded = raw.div_ceil(block) * block;
        let audio = padded * area_index.channel_count as u64;
        let metadata = self.tags.get(area, number).map(|b| b.len() as u64).unwrap_or(0);
        Ok(DSF_HEADER_SIZE + audio + metadata)
    }

    /// Emit the entries of a directory in stable order: area directories first (stereo
    /// before multi-channel), then track files by track number. Returns the entry count.
    pub fn readdir(&self, path: &str, cb: &mut dyn FnMut(VfsEntry)) -> Result<usize, SacdFsError> {
        match self.resolve(path)? {
            VfsPath::Root => {
                let mut count = 0;
                for area in self.index.visible_areas() {
                    cb(VfsEntry::Directory {
                        name: area.dir_name().to_string(),
                    });
                    count += 1;
                }
                Ok(count)
            }
            VfsPath::AreaDir(area) => {
                let names = self.track_names.get(&area).ok_or(SacdFsError::NotFound)?;
                for (i, name) in names.iter().enumerate() {
                    cb(VfsEntry::File {
                        name: name.clone(),
                        size: self.track_file_size(area, (i + 1) as u8)?,
                    });
                }
                Ok(names.len())
            }
            VfsPath::Track(_, _) => Err(SacdFsError::NotADirectory),
        }
    }

    pub fn stat(&self, path: &str) -> Result<VfsEntry, SacdFsError> {
        match self.resolve(path)? {
            VfsPath::Root => Ok(VfsEntry::Directory {
                name: self.album_name(),
            }),
            VfsPath::AreaDir(area) => Ok(VfsEntry::Directory {
                name: area.dir_name().to_string(),
            }),
            VfsPath::Track(area, number) => {
                let names = &self.track_names[&area];
                Ok(VfsEntry::File {
                    name: names[number as usize - 1].clone(),
                    size: self.track_file_size(area, number)?,
                })
            }
        }
    }

    /// The default decode coordinator of an area, created on first use. `None` for raw
    /// DSD areas.
    fn default_coordinator(&self, area: Area) -> Result<Option<Arc<DecodeCoordinator>>, SacdFsError> {
        let pool = self.pool.clone();
        self.coordinator_on_pool(area, &pool)
    }

    fn coordinator_on_pool(
        &self,
        area: Area,
        pool: &Arc<WorkerPool>,
    ) -> Result<Option<Arc<DecodeCoordinator>>, SacdFsError> {
        let area_index = self.index.area(area).ok_or(SacdFsError::NotFound)?;
        if area_index.frame_format != FrameFormat::Dst {
            return Ok(None);
        }

        let factory = self.decoder_factory.as_ref().ok_or_else(|| {
            SacdFsError::DecodeError("disc is DST-compressed but no decoder capability is configured".to_string())
        })?;

        let shares_default_pool = Arc::ptr_eq(pool, &self.pool);
        if shares_default_pool {
            let mut coordinators = self.coordinators.lock().unwrap();
            if let Some(c) = coordinators.get(&area) {
                return Ok(Some(c.clone()));
            }
            let c = Arc::new(DecodeCoordinator::new(
                area_index.channel_count,
                pool.worker_count(),
                factory,
                pool.clone(),
            ));
            coordinators.insert(area, c.clone());
            Ok(Some(c))
        }
        else {
            // Caller-supplied pools get a private coordinator bound to that pool.
            Ok(Some(Arc::new(DecodeCoordinator::new(
                area_index.channel_count,
                pool.worker_count(),
                factory,
                pool.clone(),
            ))))
        }
    }

    fn open_internal(
        &self,
        path: &str,
        write: bool,
        pool: Option<&Arc<WorkerPool>>,
    ) -> Result<u64, SacdFsError> {
        let (area, number) = match self.resolve(path)? {
            VfsPath::Track(area, number) => (area, number),
            _ => return Err(SacdFsError::IsADirectory),
        };
        if write && !self.writable_tags {
            return Err(SacdFsError::PermissionDenied);
        }

        let coordinator = match pool {
            Some(pool) => self.coordinator_on_pool(area, pool)?,
            None => self.default_coordinator(area)?,
        };

        let dsf = DsfFile::new(
            &self.index,
            self.source.clone(),
            coordinator,
            self.tags.clone(),
            area,
            number,
        )?;

        let handle = VfsHandle {
            dsf,
            area,
            track: number,
            edit: write.then(|| TagEditBuffer {
                bytes: Vec::new(),
                high_water: 0,
                dirty: false,
            }),
        };

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().unwrap().insert(id, Arc::new(Mutex::new(handle)));
        log::trace!("open_internal(): handle {} -> {}:{:?}:{}", id, path, area, number);
        Ok(id)
    }

    /// Open a track for reading with the per-ISO default decoder pool.
    pub fn file_open(&self, path: &str) -> Result<u64, SacdFsError> {
        self.open_internal(path, false, None)
    }

    /// Open a track for reading, binding DST decode work to a caller-supplied pool.
    pub fn file_open_mt(&self, path: &str, pool: &Arc<WorkerPool>) -> Result<u64, SacdFsError> {
        self.open_internal(path, false, Some(pool))
    }

    /// Open a track with tag-edit capability.
    pub fn file_open_write(&self, path: &str) -> Result<u64, SacdFsError> {
        self.open_internal(path, true, None)
    }

    fn handle(&self, id: u64) -> Result<Arc<Mutex<VfsHandle>>, SacdFsError> {
        self.handles
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SacdFsError::StaleHandle)
    }

    pub fn file_read(&self, id: u64, dst: &mut [u8]) -> Result<usize, SacdFsError> {
        let handle = self.handle(id)?;
        let mut handle = handle.lock().unwrap();
        handle.dsf.read(dst)
    }

    pub fn file_read_at(&self, id: u64, offset: u64, dst: &mut [u8]) -> Result<usize, SacdFsError> {
        let handle = self.handle(id)?;
        let mut handle = handle.lock().unwrap();
        handle.dsf.read_at(offset, dst)
    }

    pub fn file_seek(&self, id: u64, whence: SeekFrom) -> Result<u64, SacdFsError> {
        let handle = self.handle(id)?;
        let mut handle = handle.lock().unwrap();
        handle.dsf.seek(whence)
    }

    pub fn file_tell(&self, id: u64) -> Result<u64, SacdFsError> {
        let handle = self.handle(id)?;
        let handle = handle.lock().unwrap();
        Ok(handle.dsf.tell())
    }

    /// Write into the metadata edit window of a handle opened with write capability.
    /// Offsets below the metadata region are refused; the edit buffer replaces the
    /// track's tag when the handle closes.
    pub fn file_write_at(&self, id: u64, offset: u64, data: &[u8]) -> Result<usize, SacdFsError> {
        let handle = self.handle(id)?;
        let mut handle = handle.lock().unwrap();

        let info = handle.dsf.info();
        let metadata_start = DSF_HEADER_SIZE + info.audio_size;
        if offset < metadata_start {
            return Err(SacdFsError::PermissionDenied);
        }

        let edit = handle.edit.as_mut().ok_or(SacdFsError::PermissionDenied)?;
        let rel = (offset - metadata_start) as usize;
        let end = rel
            .checked_add(data.len())
            .ok_or_else(|| SacdFsError::InvalidParameter("tag write overflow".to_string()))?;
        if end > MAX_TAG_SIZE {
            return Err(SacdFsError::InvalidParameter(format!(
                "tag write of {} bytes exceeds the {} byte edit window",
                end, MAX_TAG_SIZE
            )));
        }

        if edit.bytes.len() < end {
            edit.bytes.resize(end, 0);
        }
        edit.bytes[rel..end].copy_from_slice(data);
        edit.high_water = edit.high_water.max(end);
        edit.dirty = true;
        Ok(data.len())
    }

    /// Push a dirty edit buffer into the tag store and persist the sidecar.
    pub fn file_flush(&self, id: u64) -> Result<(), SacdFsError> {
        let handle = self.handle(id)?;
        let mut handle = handle.lock().unwrap();
        self.commit_edit(&mut handle);
        drop(handle);
        self.flush_tags()
    }

    fn commit_edit(&self, handle: &mut VfsHandle) {
        if let Some(edit) = handle.edit.as_mut() {
            if edit.dirty {
                let bytes = edit.bytes[..edit.high_water].to_vec();
                self.tags.set(handle.area, handle.track, bytes);
                edit.dirty = false;
            }
        }
    }

    /// Close a handle, flushing any pending tag edit. Closing an unknown or
    /// already-closed handle is a no-op.
    pub fn file_close(&self, id: u64) -> Result<(), SacdFsError> {
        let removed = self.handles.lock().unwrap().remove(&id);
        let Some(handle) = removed else {
            return Ok(());
        };
        let mut handle = handle.lock().unwrap();
        self.commit_edit(&mut handle);
        drop(handle);

        // Sidecar persistence is best-effort at close; unsaved edits stay dirty in the
        // store and are retried at eviction or teardown.
        if let Err(e) = self.flush_tags() {
            log::error!("file_close(): tag sidecar save failed: {}", e);
        }
        Ok(())
    }
}
