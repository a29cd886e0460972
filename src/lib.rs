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

//! # sacdfs
//!
//! sacdfs is a Rust library for presenting Super Audio CD disc images (SACD ISOs) as read-mostly
//! virtual filesystems in which every disc image appears as a directory of Sony DSF audio files.
//!
//! The virtual DSF files are materialized on demand from the disc's native frame-oriented DSD
//! encoding: header chunks are synthesized, audio bytes are bit-reversed and transposed into the
//! DSF block-interleaved layout, and DST-compressed areas are decoded through a shared worker
//! pool. User-edited ID3 tags are kept in a sidecar file next to the ISO, so the disc image
//! itself is never modified.
//!
//! The main interface is the [`overlay::Overlay`], which shadow-browses a host directory and
//! replaces every SACD ISO it finds with a browsable virtual folder. A single disc can also be
//! opened directly through [`vfs::IsoVfs`].
//!
//! sacdfs does not speak the host filesystem protocol itself; the `sacdmount` crate in this
//! workspace binds the overlay to FUSE.

pub mod decoder;
pub mod disc;
pub mod dsf;
pub mod id3;
pub mod index;
mod io;
pub mod overlay;
pub mod tags;
pub mod util;
pub mod vfs;

use thiserror::Error;

/// Logical sector size of an SACD disc image, in bytes.
pub const SACD_LSN_SIZE: usize = 2048;

/// Logical sector number at which the Master TOC is stored.
pub const MASTER_TOC_LSN: u32 = 510;

/// The DSD sample rate of a standard SACD: 64 x 44100 Hz.
pub const DSD_SAMPLE_RATE: u32 = 2_822_400;

/// Audio frames per second. One frame holds 1/75th of a second of audio.
pub const FRAMES_PER_SECOND: u32 = 75;

/// Bytes of DSD audio per channel in one frame (2822400 / 75 / 8).
pub const FRAME_BYTES_PER_CHANNEL: usize = 4704;

/// DSD samples per channel in one frame.
pub const FRAME_SAMPLES_PER_CHANNEL: u64 = (FRAME_BYTES_PER_CHANNEL * 8) as u64;

/// Per-channel block size of the DSF data chunk, in bytes.
pub const DSF_BLOCK_SIZE: usize = 4096;

/// Total size of the three synthesized DSF header chunks (DSD + fmt + data).
pub const DSF_HEADER_SIZE: u64 = 92;

/// Upper bound on the size of an edited ID3 tag accepted through the metadata edit window.
pub const MAX_TAG_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum SacdFsError {
    #[error("An invalid parameter was supplied: {0}")]
    InvalidParameter(String),
    #[error("The path or track could not be found")]
    NotFound,
    #[error("The path is a directory")]
    IsADirectory,
    #[error("The path is not a directory")]
    NotADirectory,
    #[error("The operation is not permitted on this entry")]
    PermissionDenied,
    #[error("An IO error occurred reading or writing: {0}")]
    IoError(String),
    #[error("The file is not a valid SACD disc image")]
    NotSacd,
    #[error("The limit on concurrently mounted disc images has been reached")]
    ResourceLimit,
    #[error("The DST decoder failed: {0}")]
    DecodeError(String),
    #[error("The file handle is invalid or has been closed")]
    StaleHandle,
    #[error("Read past the end of the virtual file")]
    EndOfFile,
}

impl From<std::io::Error> for SacdFsError {
    fn from(e: std::io::Error) -> Self {
        SacdFsError::IoError(e.to_string())
    }
}

pub mod prelude {
    pub use crate::{
        decoder::{DstDecoder, DstDecoderFactory, WorkerPool},
        disc::{Disc, FrameFormat, FrameSource},
        dsf::{DsfFile, DsfFileInfo},
        index::{Area, IsoIndex, TrackEntry},
        overlay::{Overlay, OverlayConfig, OverlayEntry},
        tags::TagStore,
        util::TrackNameFormat,
        vfs::{IsoVfs, VfsEntry},
        SacdFsError,
    };
}
