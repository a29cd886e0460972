/*
    sacdmount
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

    crates/sacdmount/src/fs.rs

    Thin translator from the fuser callback protocol to overlay operations:
    inode bookkeeping, attribute conversion and errno mapping live here,
    nothing else.
*/

use std::{
    collections::HashMap,
    ffi::OsStr,
    time::{Duration, SystemTime},
};

use fuser::{
    FileAttr,
    FileType,
    Filesystem,
    ReplyAttr,
    ReplyData,
    ReplyDirectory,
    ReplyEmpty,
    ReplyEntry,
    ReplyOpen,
    ReplyWrite,
    Request,
    TimeOrNow,
};
use sacdfs::{
    overlay::{Overlay, OverlayEntry},
    util::{join_vpath, split_vpath},
    SacdFsError,
};

const TTL: Duration = Duration::from_secs(1);
const ROOT_INO: u64 = 1;

fn errno(e: &SacdFsError) -> i32 {
    match e {
        SacdFsError::InvalidParameter(_) => libc::EINVAL,
        SacdFsError::NotFound => libc::ENOENT,
        SacdFsError::IsADirectory => libc::EISDIR,
        SacdFsError::NotADirectory => libc::ENOTDIR,
        SacdFsError::PermissionDenied => libc::EACCES,
        SacdFsError::IoError(_) => libc::EIO,
        SacdFsError::NotSacd => libc::ENOENT,
        SacdFsError::ResourceLimit => libc::EMFILE,
        SacdFsError::DecodeError(_) => libc::EIO,
        SacdFsError::StaleHandle => libc::EBADF,
        SacdFsError::EndOfFile => libc::EIO,
    }
}

pub struct SacdMountFs {
    overlay: Overlay,
    inode_to_vpath: HashMap<u64, String>,
    vpath_to_inode: HashMap<String, u64>,
    next_inode: u64,
    uid: u32,
    gid: u32,
}

impl SacdMountFs {
    pub fn new(overlay: Overlay) -> SacdMountFs {
        let mut fs = SacdMountFs {
            overlay,
            inode_to_vpath: HashMap::new(),
            vpath_to_inode: HashMap::new(),
            next_inode: ROOT_INO + 1,
            uid: unsafe { libc::geteuid() },
            gid: unsafe { libc::getegid() },
        };
        fs.inode_to_vpath.insert(ROOT_INO, "/".to_string());
        fs.vpath_to_inode.insert("/".to_string(), ROOT_INO);
        fs
    }

    fn inode_for(&mut self, vpath: &str) -> u64 {
        if let Some(ino) = self.vpath_to_inode.get(vpath) {
            return *ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.inode_to_vpath.insert(ino, vpath.to_string());
        self.vpath_to_inode.insert(vpath.to_string(), ino);
        ino
    }

    fn vpath_of(&self, ino: u64) -> Option<String> {
        self.inode_to_vpath.get(&ino).cloned()
    }

    fn attr_from(&self, ino: u64, entry: &OverlayEntry) -> FileAttr {
        let (kind, perm, nlink) = match entry {
            OverlayEntry::Directory { .. } => (FileType::Directory, 0o555, 2),
            OverlayEntry::File { writable, .. } => {
                (FileType::RegularFile, if *writable { 0o644 } else { 0o444 }, 1)
            }
        };
        let mtime = match entry {
            OverlayEntry::Directory { mtime, .. } => *mtime,
            OverlayEntry::File { mtime, .. } => *mtime,
        };
        FileAttr {
            ino,
            size: entry.size(),
            blocks: entry.size().div_ceil(512),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: SystemTime::UNIX_EPOCH,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            flags: 0,
            blksize: 4096,
        }
    }
}

impl Filesystem for SacdMountFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_vpath) = self.vpath_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let vpath = join_vpath(&parent_vpath, &name.to_string_lossy());
        match self.overlay.getattr(&vpath) {
            Ok(entry) => {
                let ino = self.inode_for(&vpath);
                reply.entry(&TTL, &self.attr_from(ino, &entry), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(vpath) = self.vpath_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.overlay.getattr(&vpath) {
            Ok(entry) => reply.attr(&TTL, &self.attr_from(ino, &entry)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(vpath) = self.vpath_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if let Some(size) = size {
            if let Err(e) = self.overlay.truncate(&vpath, size) {
                reply.error(errno(&e));
                return;
            }
        }
        match self.overlay.getattr(&vpath) {
            Ok(entry) => reply.attr(&TTL, &self.attr_from(ino, &entry)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(vpath) = self.vpath_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let mut entries = Vec::new();
        let result = self.overlay.readdir(&vpath, &mut |entry| entries.push(entry));
        if let Err(e) = result {
            reply.error(errno(&e));
            return;
        }

        let parent_ino = self
            .vpath_to_inode
            .get(split_vpath(&vpath).0)
            .copied()
            .unwrap_or(ROOT_INO);

        for (i, entry) in entries.into_iter().enumerate().skip(offset as usize) {
            let entry_ino = match entry.name.as_str() {
                "." => ino,
                ".." => parent_ino,
                name => {
                    let child = join_vpath(&vpath, name);
                    self.inode_for(&child)
                }
            };
            let kind = if entry.is_dir {
                FileType::Directory
            }
            else {
                FileType::RegularFile
            };
            if reply.add(entry_ino, (i + 1) as i64, kind, entry.name.as_str()) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(vpath) = self.vpath_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let write = flags & libc::O_ACCMODE != libc::O_RDONLY;
        match self.overlay.open(&vpath, write) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let mut buf = vec![0u8; size as usize];
        match self.overlay.read(fh, offset as u64, &mut buf) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.overlay.write(fh, offset as u64, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match self.overlay.flush(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.overlay.release(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let Some(vpath) = self.vpath_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.overlay.access(&vpath, mask as u32) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }
}
