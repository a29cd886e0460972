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

//! The `overlay` module shadow-browses a host directory tree, replacing every valid
//! SACD ISO with a browsable virtual folder of DSF files.
//!
//! Lock order is table-then-mount: the mount table mutex is held only for table
//! mutation and short lookups, never across IO, and no mount lock is ever taken while
//! iterating the table under its lock.

use std::{
    collections::HashMap,
    fs,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::{Duration, Instant, SystemTime},
};

use crate::{
    decoder::{DstDecoderFactory, WorkerPool},
    disc::Disc,
    index::AreaVisibility,
    tags::sidecar_path_for,
    util::{display_name_with_suffix, join_vpath, normalize_vpath, split_vpath, vpath_has_prefix, TrackNameFormat},
    vfs::{IsoVfs, VfsConfig, VfsEntry},
    SacdFsError,
};

/// Access mask bit for write permission checks.
pub const W_OK: u32 = 2;

/// Idle-eviction sweeps run at most this often, piggybacked on overlay operations.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Overlay construction parameters.
#[derive(Clone)]
pub struct OverlayConfig {
    /// Host directory the overlay shadows.
    pub root: PathBuf,
    /// Worker threads of the shared pool. 0 selects the available parallelism.
    pub threads: usize,
    /// Idle time after which an unreferenced mount's VFS is torn down.
    pub cache_timeout: Duration,
    /// Cap on concurrently mounted ISOs. 0 is unlimited.
    pub max_open_isos: usize,
    pub visibility: AreaVisibility,
    /// When true, virtual DSF files accept metadata edits.
    pub editable_tags: bool,
    pub name_format: TrackNameFormat,
    pub decoder_factory: Option<DstDecoderFactory>,
}

impl OverlayConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> OverlayConfig {
        OverlayConfig {
            root: root.into(),
            threads: 0,
            cache_timeout: Duration::from_secs(300),
            max_open_isos: 0,
            visibility: AreaVisibility::all(),
            editable_tags: false,
            name_format: TrackNameFormat::default(),
            decoder_factory: None,
        }
    }
}

/// Attributes of one overlay entry, as reported by `getattr`.
#[derive(Clone, Debug)]
pub enum OverlayEntry {
    Directory {
        name: String,
        mtime: SystemTime,
        writable: bool,
    },
    File {
        name: String,
        size: u64,
        mtime: SystemTime,
        writable: bool,
    },
}

impl OverlayEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self, OverlayEntry::Directory { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            OverlayEntry::Directory { name, .. } => name,
            OverlayEntry::File { name, .. } => name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            OverlayEntry::Directory { .. } => 0,
            OverlayEntry::File { size, .. } => *size,
        }
    }

    pub fn writable(&self) -> bool {
        match self {
            OverlayEntry::Directory { writable, .. } => *writable,
            OverlayEntry::File { writable, .. } => *writable,
        }
    }
}

/// A directory listing entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayDirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// One registered ISO. The entry itself is permanent for the life of the overlay
/// context; the VFS behind it comes and goes with demand and idle eviction.
pub struct IsoMount {
    iso_path: PathBuf,
    parent_vpath: String,
    display_name: String,
    collision_index: u32,
    state: Mutex<MountState>,
}

struct MountState {
    vfs: Option<Arc<IsoVfs>>,
    ref_count: u32,
    last_access: Instant,
}

impl IsoMount {
    pub fn vpath(&self) -> String {
        join_vpath(&self.parent_vpath, &self.display_name)
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn collision_index(&self) -> u32 {
        self.collision_index
    }

    pub fn iso_path(&self) -> &Path {
        &self.iso_path
    }

    fn mtime(&self) -> SystemTime {
        fs::metadata(&self.iso_path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

enum OverlayHandle {
    Passthrough(Mutex<fs::File>),
    Virtual {
        mount: Arc<IsoMount>,
        vfs: Arc<IsoVfs>,
        inner: u64,
    },
}

enum Resolved {
    HostDir(PathBuf),
    HostFile(PathBuf),
    Mount(Arc<IsoMount>, String),
}

/// The overlay directory layer: one per mounted root.
pub struct Overlay {
    config: OverlayConfig,
    pool: Arc<WorkerPool>,
    mounts: Mutex<HashMap<PathBuf, Arc<IsoMount>>>,
    handles: Mutex<HashMap<u64, Arc<OverlayHandle>>>,
    next_handle: AtomicU64,
    last_sweep: Mutex<Instant>,
}

impl Overlay {
    pub fn new(config: OverlayConfig) -> Result<Overlay, SacdFsError> {
        let meta = fs::metadata(&config.root)?;
        if !meta.is_dir() {
            return Err(SacdFsError::NotADirectory);
        }

        let threads = if config.threads > 0 {
            config.threads
        }
        else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        };

        log::info!(
            "Overlay::new(): shadowing {} with {} worker thread(s)",
            config.root.display(),
            threads
        );

        Ok(Overlay {
            pool: Arc::new(WorkerPool::new(threads)),
            config,
            mounts: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            last_sweep: Mutex::new(Instant::now()),
        })
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Number of registered mounts.
    pub fn mount_count(&self) -> usize {
        self.mounts.lock().unwrap().len()
    }

    /// Number of mounts whose per-ISO VFS is currently instantiated.
    pub fn active_vfs_count(&self) -> usize {
        let mounts: Vec<Arc<IsoMount>> = self.mounts.lock().unwrap().values().cloned().collect();
        mounts
            .iter()
            .filter(|m| m.state.lock().unwrap().vfs.is_some())
            .count()
    }

    fn is_iso_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("iso"))
            .unwrap_or(false)
    }

    fn is_sidecar_name(name: &str) -> bool {
        name.to_ascii_lowercase().ends_with(".iso.xml")
    }

    fn host_path(&self, vpath: &str) -> PathBuf {
        let mut path = self.config.root.clone();
        for component in vpath.split('/').filter(|c| !c.is_empty()) {
            path.push(component);
        }
        path
    }

    /// Register (or fetch) the mount entry for `iso_path`, assigning a collision
    /// suffix when the display name is already taken under `parent_vpath`. SACD
    /// validation happens before the table lock is taken; the lock is never held
    /// across IO.
    fn register_mount(
        &self,
        parent_vpath: &str,
        iso_path: &Path,
    ) -> Result<Arc<IsoMount>, SacdFsError> {
        // Fast path: already registered.
        if let Some(mount) = self.mounts.lock().unwrap().get(iso_path) {
            return Ok(mount.clone());
        }

        if !Disc::probe(iso_path) {
            return Err(SacdFsError::NotSacd);
        }

        let base = iso_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("disc")
            .to_string();

        let mut mounts = self.mounts.lock().unwrap();
        // Raced registration between probe and re-lock.
        if let Some(mount) = mounts.get(iso_path) {
            return Ok(mount.clone());
        }
        if self.config.max_open_isos > 0 && mounts.len() >= self.config.max_open_isos {
            return Err(SacdFsError::ResourceLimit);
        }

        let mut collision_index = 0u32;
        let mut display_name = base.clone();
        while mounts
            .values()
            .any(|m| m.parent_vpath == parent_vpath && m.display_name == display_name)
        {
            collision_index += 1;
            display_name = display_name_with_suffix(&base, collision_index);
        }

        let mount = Arc::new(IsoMount {
            iso_path: iso_path.to_path_buf(),
            parent_vpath: parent_vpath.to_string(),
            display_name,
            collision_index,
            state: Mutex::new(MountState {
                vfs: None,
                ref_count: 0,
                last_access: Instant::now(),
            }),
        });
        mounts.insert(iso_path.to_path_buf(), mount.clone());
        log::debug!(
            "register_mount(): {} -> {}",
            iso_path.display(),
            mount.vpath()
        );
        Ok(mount)
    }

    /// Lazily instantiate the per-ISO VFS behind a mount and stamp its access time.
    fn vfs_for(&self, mount: &Arc<IsoMount>) -> Result<Arc<IsoVfs>, SacdFsError> {
        let mut state = mount.state.lock().unwrap();
        state.last_access = Instant::now();
        if let Some(vfs) = &state.vfs {
            return Ok(vfs.clone());
        }

        log::debug!("vfs_for(): opening {}", mount.iso_path.display());
        let vfs = Arc::new(IsoVfs::open(
            &mount.iso_path,
            VfsConfig {
                visibility: self.config.visibility,
                name_format: self.config.name_format,
                writable_tags: self.config.editable_tags,
                pool: self.pool.clone(),
                decoder_factory: self.config.decoder_factory.clone(),
            },
        )?);
        state.vfs = Some(vfs.clone());
        Ok(vfs)
    }

    /// Resolve a virtual path to a mount sub-path or a host path. Longest mount
    /// prefix wins; the mount table lock is released before any host IO.
    fn resolve(&self, vpath: &str) -> Result<Resolved, SacdFsError> {
        let vpath = normalize_vpath(vpath);
        if vpath.split('/').any(|c| c == "..") {
            return Err(SacdFsError::InvalidParameter("path escapes the overlay root".to_string()));
        }

        self.maybe_sweep();

        let best = {
            let mounts = self.mounts.lock().unwrap();
            let mut best: Option<(Arc<IsoMount>, usize)> = None;
            for mount in mounts.values() {
                let mount_vpath = mount.vpath();
                if vpath_has_prefix(&vpath, &mount_vpath) {
                    let len = mount_vpath.len();
                    if best.as_ref().map(|(_, l)| len > *l).unwrap_or(true) {
                        best = Some((mount.clone(), len));
                    }
                }
            }
            best
        };

        if let Some((mount, prefix_len)) = best {
            let sub = normalize_vpath(&vpath[prefix_len..]);
            return Ok(Resolved::Mount(mount, sub));
        }

        let host = self.host_path(&vpath);
        match fs::metadata(&host) {
            Ok(meta) if meta.is_dir() => Ok(Resolved::HostDir(host)),
            Ok(_) => {
                let (_, leaf) = split_vpath(&vpath);
                if Self::is_sidecar_name(leaf) {
                    // Tag sidecars are hidden unconditionally.
                    return Err(SacdFsError::NotFound);
                }
                if Self::is_iso_file(&host) {
                    // Valid SACD images are hidden and replaced by their virtual
                    // folder; anything else passes through.
                    if Disc::probe(&host) {
                        return Err(SacdFsError::NotFound);
                    }
                    return Ok(Resolved::HostFile(host));
                }
                Ok(Resolved::HostFile(host))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // A missing host path may descend through a virtual ISO folder that has
                // not been registered yet (direct access without a prior parent
                // listing). Try each ancestor as an ISO candidate, deepest first.
                let mut prefix: &str = &vpath;
                while prefix != "/" {
                    let mut candidate = self.host_path(prefix).into_os_string();
                    candidate.push(".iso");
                    let candidate = PathBuf::from(candidate);
                    if candidate.is_file() {
                        let (parent, _) = split_vpath(prefix);
                        let mount = self.register_mount(parent, &candidate)?;
                        let sub = normalize_vpath(&vpath[prefix.len()..]);
                        return Ok(Resolved::Mount(mount, sub));
                    }
                    prefix = split_vpath(prefix).0;
                }
                Err(SacdFsError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `getattr`: attributes of the entry at `vpath`.
    pub fn getattr(&self, vpath: &str) -> Result<OverlayEntry, SacdFsError> {
        match self.resolve(vpath)? {
            Resolved::HostDir(host) => {
                let meta = fs::metadata(&host)?;
                Ok(OverlayEntry::Directory {
                    name: leaf_name(&host),
                    mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    writable: !meta.permissions().readonly(),
                })
            }
            Resolved::HostFile(host) => {
                let meta = fs::metadata(&host)?;
                Ok(OverlayEntry::File {
                    name: leaf_name(&host),
                    size: meta.len(),
                    mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    writable: !meta.permissions().readonly(),
                })
            }
            Resolved::Mount(mount, sub) => {
                if sub == "/" {
                    return Ok(OverlayEntry::Directory {
                        name: mount.display_name.clone(),
                        mtime: mount.mtime(),
                        writable: false,
                    });
                }
                let vfs = self.vfs_for(&mount)?;
                let mtime = mount.mtime();
                match vfs.stat(&sub)? {
                    VfsEntry::Directory { name } => Ok(OverlayEntry::Directory {
                        name,
                        mtime,
                        writable: false,
                    }),
                    VfsEntry::File { name, size } => Ok(OverlayEntry::File {
                        name,
                        size,
                        mtime,
                        writable: self.config.editable_tags,
                    }),
                }
            }
        }
    }

    /// `readdir`: emit `.` and `..` first, then the directory's entries in a stable
    /// sorted order. Returns the number of entries emitted.
    pub fn readdir(
        &self,
        vpath: &str,
        filler: &mut dyn FnMut(OverlayDirEntry),
    ) -> Result<usize, SacdFsError> {
        let vpath = normalize_vpath(vpath);
        let mut count = 0usize;
        let mut emit = |name: &str, is_dir: bool, filler: &mut dyn FnMut(OverlayDirEntry)| {
            filler(OverlayDirEntry {
                name: name.to_string(),
                is_dir,
            });
        };

        match self.resolve(&vpath)? {
            Resolved::HostFile(_) => Err(SacdFsError::NotADirectory),
            Resolved::HostDir(host) => {
                emit(".", true, filler);
                emit("..", true, filler);
                count += 2;

                // Collect and sort before registering so collision indices are
                // deterministic regardless of host readdir order.
                let mut host_entries: Vec<(String, PathBuf, fs::Metadata)> = Vec::new();
                for entry in fs::read_dir(&host)? {
                    let entry = entry?;
                    let name = entry.file_name().to_string_lossy().to_string();
                    let meta = match entry.metadata() {
                        Ok(meta) => meta,
                        Err(_) => continue,
                    };
                    host_entries.push((name, entry.path(), meta));
                }
                host_entries.sort_by(|a, b| a.0.cmp(&b.0));

                let mut names: Vec<(String, bool)> = Vec::new();
                for (name, path, meta) in host_entries {
                    if Self::is_sidecar_name(&name) {
                        continue;
                    }

                    if meta.is_file() && Self::is_iso_file(&path) {
                        match self.register_mount(&vpath, &path) {
                            Ok(mount) => names.push((mount.display_name.clone(), true)),
                            Err(SacdFsError::NotSacd) => {
                                // ISO-named but not an SACD: plain passthrough.
                                names.push((name, false));
                            }
                            Err(SacdFsError::ResourceLimit) => {
                                log::warn!(
                                    "readdir(): mount limit reached, hiding {}",
                                    path.display()
                                );
                            }
                            Err(e) => {
                                log::warn!("readdir(): cannot mount {}: {}", path.display(), e);
                            }
                        }
                    }
                    else {
                        names.push((name, meta.is_dir()));
                    }
                }

                names.sort_by(|a, b| a.0.cmp(&b.0));
                for (name, is_dir) in names {
                    emit(&name, is_dir, filler);
                    count += 1;
                }
                Ok(count)
            }
            Resolved::Mount(mount, sub) => {
                let vfs = self.vfs_for(&mount)?;
                emit(".", true, filler);
                emit("..", true, filler);
                count += 2;
                count += vfs.readdir(&sub, &mut |entry| match entry {
                    VfsEntry::Directory { name } => filler(OverlayDirEntry { name, is_dir: true }),
                    VfsEntry::File { name, .. } => filler(OverlayDirEntry { name, is_dir: false }),
                })?;
                Ok(count)
            }
        }
    }

    /// `open`: acquire a handle on a file. Write capability is only grantable on
    /// virtual DSF files, and only when the overlay allows metadata editing.
    pub fn open(&self, vpath: &str, write: bool) -> Result<u64, SacdFsError> {
        let handle = match self.resolve(vpath)? {
            Resolved::HostDir(_) => return Err(SacdFsError::IsADirectory),
            Resolved::HostFile(host) => {
                if write {
                    return Err(SacdFsError::PermissionDenied);
                }
                OverlayHandle::Passthrough(Mutex::new(fs::File::open(&host)?))
            }
            Resolved::Mount(mount, sub) => {
                if sub == "/" {
                    return Err(SacdFsError::IsADirectory);
                }
                let vfs = self.vfs_for(&mount)?;
                let inner = if write {
                    vfs.file_open_write(&sub)?
                }
                else {
                    vfs.file_open(&sub)?
                };
                let mut state = mount.state.lock().unwrap();
                state.ref_count += 1;
                state.last_access = Instant::now();
                drop(state);
                OverlayHandle::Virtual { mount, vfs, inner }
            }
        };

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().unwrap().insert(id, Arc::new(handle));
        Ok(id)
    }

    fn handle(&self, id: u64) -> Result<Arc<OverlayHandle>, SacdFsError> {
        self.handles
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SacdFsError::StaleHandle)
    }

    /// `read`: offset-addressed read from an open handle.
    pub fn read(&self, id: u64, offset: u64, dst: &mut [u8]) -> Result<usize, SacdFsError> {
        match &*self.handle(id)? {
            OverlayHandle::Passthrough(file) => {
                let mut file = file.lock().unwrap();
                file.seek(SeekFrom::Start(offset))?;
                let mut filled = 0;
                while filled < dst.len() {
                    let n = file.read(&mut dst[filled..])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                Ok(filled)
            }
            OverlayHandle::Virtual { mount, vfs, inner } => {
                touch(mount);
                vfs.file_read_at(*inner, offset, dst)
            }
        }
    }

    /// `write`: only the metadata region of a virtual DSF file is writable.
    pub fn write(&self, id: u64, offset: u64, data: &[u8]) -> Result<usize, SacdFsError> {
        match &*self.handle(id)? {
            OverlayHandle::Passthrough(_) => Err(SacdFsError::PermissionDenied),
            OverlayHandle::Virtual { mount, vfs, inner } => {
                touch(mount);
                vfs.file_write_at(*inner, offset, data)
            }
        }
    }

    /// `flush`: push pending tag edits through to the sidecar.
    pub fn flush(&self, id: u64) -> Result<(), SacdFsError> {
        match &*self.handle(id)? {
            OverlayHandle::Passthrough(_) => Ok(()),
            OverlayHandle::Virtual { vfs, inner, .. } => vfs.file_flush(*inner),
        }
    }

    /// `release`: close a handle. Closing an already-closed handle is a no-op.
    pub fn release(&self, id: u64) -> Result<(), SacdFsError> {
        let removed = self.handles.lock().unwrap().remove(&id);
        let Some(handle) = removed else {
            return Ok(());
        };
        if let OverlayHandle::Virtual { mount, vfs, inner } = &*handle {
            vfs.file_close(*inner)?;
            let mut state = mount.state.lock().unwrap();
            state.ref_count = state.ref_count.saturating_sub(1);
            state.last_access = Instant::now();
        }
        Ok(())
    }

    /// `access`: permission probe. `W_OK` on a read-only target is refused.
    pub fn access(&self, vpath: &str, mask: u32) -> Result<(), SacdFsError> {
        let entry = self.getattr(vpath)?;
        if mask & W_OK != 0 && !entry.writable() {
            return Err(SacdFsError::PermissionDenied);
        }
        Ok(())
    }

    /// `truncate`: accepted as a no-op on virtual files, forwarded for passthrough.
    pub fn truncate(&self, vpath: &str, size: u64) -> Result<(), SacdFsError> {
        match self.resolve(vpath)? {
            Resolved::HostDir(_) => Err(SacdFsError::IsADirectory),
            Resolved::HostFile(host) => {
                let file = fs::OpenOptions::new().write(true).open(&host)?;
                file.set_len(size)?;
                Ok(())
            }
            Resolved::Mount(_, sub) => {
                if sub == "/" {
                    return Err(SacdFsError::IsADirectory);
                }
                Ok(())
            }
        }
    }

    fn maybe_sweep(&self) {
        {
            let mut last = self.last_sweep.lock().unwrap();
            if last.elapsed() < SWEEP_INTERVAL {
                return;
            }
            *last = Instant::now();
        }
        self.sweep_idle();
    }

    /// Tear down the VFS of every mount that is unreferenced and idle past the
    /// configured timeout. Dirty tag overlays are flushed first. The mount entries
    /// themselves stay registered so display names remain stable.
    pub fn sweep_idle(&self) {
        let mounts: Vec<Arc<IsoMount>> = self.mounts.lock().unwrap().values().cloned().collect();

        for mount in mounts {
            let mut state = mount.state.lock().unwrap();
            let idle = state.last_access.elapsed() >= self.config.cache_timeout;
            if state.ref_count == 0 && idle {
                if let Some(vfs) = state.vfs.take() {
                    if let Err(e) = vfs.flush_tags() {
                        log::error!(
                            "sweep_idle(): tag flush for {} failed: {}",
                            mount.iso_path.display(),
                            e
                        );
                    }
                    log::debug!("sweep_idle(): evicted {}", mount.iso_path.display());
                }
            }
        }
    }

    /// The sidecar path a given ISO's tags persist to. Exposed for tooling.
    pub fn sidecar_for(iso_path: &Path) -> PathBuf {
        sidecar_path_for(iso_path)
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        // Teardown flushes every dirty tag overlay before the mounts go away.
        let mounts: Vec<Arc<IsoMount>> = self.mounts.lock().unwrap().values().cloned().collect();
        for mount in mounts {
            let state = mount.state.lock().unwrap();
            if let Some(vfs) = &state.vfs {
                if let Err(e) = vfs.flush_tags() {
                    log::error!(
                        "drop(): tag flush for {} failed: {}",
                        mount.iso_path.display(),
                        e
                    );
                }
            }
        }
    }
}

fn touch(mount: &Arc<IsoMount>) {
    let mut state = mount.state.lock().unwrap();
    state.last_access = Instant::now();
}

fn leaf_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
