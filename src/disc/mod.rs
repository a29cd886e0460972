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

//! The `disc` module reads SACD disc images: it probes the physical sector layout,
//! parses the Master and area TOCs, and serves audio frames.
//!
//! The rest of the crate consumes discs through the [`FrameSource`] trait so that the
//! materialization stack never depends on a concrete reader. [`Disc`] is the file-backed
//! implementation.

pub mod sector;
pub mod toc;

use std::{
    fs::File,
    io::BufReader,
    path::Path,
};

use binrw::BinRead;

use crate::{
    disc::{
        sector::SectorReader,
        toc::{
            decode_text,
            AlbumText,
            AreaToc,
            MasterToc,
            ALBUM_TEXT_SIGNATURE,
            FRAME_FORMAT_DSD_3_IN_14,
            FRAME_FORMAT_DSD_3_IN_16,
            FRAME_FORMAT_DST,
            MULTI_CHANNEL_TOC_SIGNATURE,
            TWO_CHANNEL_TOC_SIGNATURE,
        },
    },
    index::Area,
    io::ReadSeek,
    SacdFsError,
    FRAME_BYTES_PER_CHANNEL,
    MASTER_TOC_LSN,
    SACD_LSN_SIZE,
};

/// Encoding of the audio frames within one area.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    /// Raw DSD samples.
    Dsd,
    /// DST-compressed DSD; each frame must be decoded before use.
    Dst,
}

#[derive(Clone, Debug, Default)]
pub struct AlbumInfo {
    pub title: String,
    pub artist: String,
    pub catalog_number: String,
}

#[derive(Clone, Debug)]
pub struct DiscTrack {
    /// One-based track number.
    pub number: u8,
    /// First audio frame of the track, 0-based within the area.
    pub start_frame: u32,
    pub frame_count: u32,
    pub title: String,
    pub performer: String,
}

#[derive(Clone, Debug)]
pub struct DiscArea {
    pub area: Area,
    pub channel_count: u8,
    pub frame_format: FrameFormat,
    pub total_frames: u32,
    pub tracks: Vec<DiscTrack>,
    /// LSN of the first audio sector of the area.
    pub(crate) track_area_start: u32,
    /// Byte offsets of each DST frame within the audio region; `total_frames + 1`
    /// entries (prefix sums). Empty for raw DSD areas.
    pub(crate) dst_frame_offsets: Vec<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct DiscToc {
    pub album: AlbumInfo,
    pub areas: Vec<DiscArea>,
}

impl DiscToc {
    pub fn area(&self, area: Area) -> Option<&DiscArea> {
        self.areas.iter().find(|a| a.area == area)
    }
}

/// One audio frame as served by a [`FrameSource`].
#[derive(Clone, Debug)]
pub enum Frame {
    /// Raw DSD: one 4704-byte buffer per channel, MSB-first samples.
    Dsd(Vec<Vec<u8>>),
    /// One DST-compressed frame covering all channels.
    Dst(Vec<u8>),
}

/// Ordered access to the frames and directory information of one disc image.
///
/// Implementations are not required to be thread-safe; callers that share a source
/// across file handles wrap it in a mutex.
pub trait FrameSource: Send {
    fn toc(&self) -> &DiscToc;

    fn frame_format(&self, area: Area) -> Option<FrameFormat> {
        self.toc().area(area).map(|a| a.frame_format)
    }

    fn channel_count(&self, area: Area) -> Option<u8> {
        self.toc().area(area).map(|a| a.channel_count)
    }

    fn frame_count(&self, area: Area) -> Option<u32> {
        self.toc().area(area).map(|a| a.total_frames)
    }

    /// Read `count` frames starting at `first_frame`. Frames are returned in order.
    fn read_frames(&mut self, area: Area, first_frame: u32, count: u32) -> Result<Vec<Frame>, SacdFsError>;
}

/// A file-backed SACD disc image.
pub struct Disc {
    reader: SectorReader<Box<dyn ReadSeek>>,
    toc: DiscToc,
}

impl Disc {
    /// Open a disc image from a host path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SacdFsError> {
        let file = File::open(path.as_ref())?;
        Self::from_io(Box::new(BufReader::new(file)))
    }

    /// Open a disc image from any seekable byte source.
    pub fn from_io(io: Box<dyn ReadSeek>) -> Result<Self, SacdFsError> {
        let mut reader = SectorReader::open(io)?;
        let toc = Self::read_toc(&mut reader)?;
        Ok(Self { reader, toc })
    }

    /// Cheap validity check: does this file carry a Master TOC under any known layout?
    pub fn probe<P: AsRef<Path>>(path: P) -> bool {
        match File::open(path.as_ref()) {
            Ok(file) => SectorReader::open(Box::new(BufReader::new(file)) as Box<dyn ReadSeek>).is_ok(),
            Err(_) => false,
        }
    }

    fn read_toc(reader: &mut SectorReader<Box<dyn ReadSeek>>) -> Result<DiscToc, SacdFsError> {
        let mut sector = vec![0u8; SACD_LSN_SIZE];
        reader.read_sectors(MASTER_TOC_LSN, 1, &mut sector)?;
        let master =
            MasterToc::read(&mut std::io::Cursor::new(&sector)).map_err(|_| SacdFsError::NotSacd)?;

        reader.read_sectors(MASTER_TOC_LSN + 1, 1, &mut sector)?;
        let text =
            AlbumText::read(&mut std::io::Cursor::new(&sector)).map_err(|_| SacdFsError::NotSacd)?;
        if text.signature != ALBUM_TEXT_SIGNATURE {
            return Err(SacdFsError::NotSacd);
        }

        let album = AlbumInfo {
            title: decode_text(&text.album_title),
            artist: decode_text(&text.album_artist),
            catalog_number: decode_text(&master.catalog_number),
        };

        let mut areas = Vec::new();
        let declared = [
            (Area::Stereo, master.area_1_toc_start, master.area_1_toc_size),
            (Area::Multichannel, master.area_2_toc_start, master.area_2_toc_size),
        ];
        for (area, toc_start, toc_size) in declared {
            if toc_start == 0 {
                continue;
            }
            areas.push(Self::read_area_toc(reader, area, toc_start, toc_size)?);
        }

        if areas.is_empty() {
            return Err(SacdFsError::NotSacd);
        }

        log::debug!(
            "read_toc(): album '{}' with {} area(s)",
            album.title,
            areas.len()
        );
        Ok(DiscToc { album, areas })
    }

    fn read_area_toc(
        reader: &mut SectorReader<Box<dyn ReadSeek>>,
        area: Area,
        toc_start: u32,
        toc_size: u32,
    ) -> Result<DiscArea, SacdFsError> {
        if toc_size == 0 || toc_size > 4096 {
            return Err(SacdFsError::NotSacd);
        }
        let mut buf = vec![0u8; toc_size as usize * SACD_LSN_SIZE];
        reader.read_sectors(toc_start, toc_size, &mut buf)?;

        let toc = AreaToc::read(&mut std::io::Cursor::new(&buf)).map_err(|_| SacdFsError::NotSacd)?;

        let expected_signature = match area {
            Area::Stereo => TWO_CHANNEL_TOC_SIGNATURE,
            Area::Multichannel => MULTI_CHANNEL_TOC_SIGNATURE,
        };
        if toc.signature != expected_signature {
            return Err(SacdFsError::NotSacd);
        }

        let frame_format = match toc.frame_format {
            FRAME_FORMAT_DST => FrameFormat::Dst,
            FRAME_FORMAT_DSD_3_IN_14 | FRAME_FORMAT_DSD_3_IN_16 => FrameFormat::Dsd,
            _ => return Err(SacdFsError::NotSacd),
        };
        if toc.channel_count == 0 || toc.channel_count > 6 {
            return Err(SacdFsError::NotSacd);
        }

        let mut tracks = Vec::with_capacity(toc.tracks.len());
        for (i, desc) in toc.tracks.iter().enumerate() {
            let start_frame = desc.start.to_frames();
            let frame_count = desc.length.to_frames();
            // A track may never extend past the end of its area.
            if start_frame as u64 + frame_count as u64 > toc.total_frames as u64 {
                return Err(SacdFsError::NotSacd);
            }
            tracks.push(DiscTrack {
                number: (i + 1) as u8,
                start_frame,
                frame_count,
                title: decode_text(&desc.title),
                performer: decode_text(&desc.performer),
            });
        }

        let mut dst_frame_offsets = Vec::new();
        if frame_format == FrameFormat::Dst {
            dst_frame_offsets.reserve(toc.dst_frame_sizes.len() + 1);
            let mut offset = 0u64;
            dst_frame_offsets.push(0);
            for size in &toc.dst_frame_sizes {
                offset += *size as u64;
                dst_frame_offsets.push(offset);
            }
        }

        Ok(DiscArea {
            area,
            channel_count: toc.channel_count,
            frame_format,
            total_frames: toc.total_frames,
            tracks,
            track_area_start: toc.track_area_start,
            dst_frame_offsets,
        })
    }

    fn area_or_err(&self, area: Area) -> Result<&DiscArea, SacdFsError> {
        self.toc.area(area).ok_or(SacdFsError::NotFound)
    }
}

impl FrameSource for Disc {
    fn toc(&self) -> &DiscToc {
        &self.toc
    }

    fn read_frames(&mut self, area: Area, first_frame: u32, count: u32) -> Result<Vec<Frame>, SacdFsError> {
        // Copy out what the frame reads need so the reader can be borrowed mutably.
        let (channels, frame_format, area_base, dst_spans) = {
            let info = self.area_or_err(area)?;
            if first_frame as u64 + count as u64 > info.total_frames as u64 {
                return Err(SacdFsError::InvalidParameter(format!(
                    "frame range {}+{} exceeds area frame count {}",
                    first_frame, count, info.total_frames
                )));
            }
            let spans = (info.frame_format == FrameFormat::Dst).then(|| {
                info.dst_frame_offsets[first_frame as usize..=(first_frame + count) as usize].to_vec()
            });
            (
                info.channel_count as usize,
                info.frame_format,
                info.track_area_start as u64 * SACD_LSN_SIZE as u64,
                spans,
            )
        };

        let mut frames = Vec::with_capacity(count as usize);
        match frame_format {
            FrameFormat::Dsd => {
                // Raw DSD frames have a fixed size and are byte-interleaved across
                // channels on disc; deinterleave into per-channel buffers here.
                let frame_size = FRAME_BYTES_PER_CHANNEL * channels;
                let mut raw = vec![0u8; frame_size * count as usize];
                let start = area_base + first_frame as u64 * frame_size as u64;
                self.reader.read_bytes(start, &mut raw)?;

                for f in 0..count as usize {
                    let src = &raw[f * frame_size..(f + 1) * frame_size];
                    let mut per_channel = vec![vec![0u8; FRAME_BYTES_PER_CHANNEL]; channels];
                    for (j, byte) in src.iter().enumerate() {
                        per_channel[j % channels][j / channels] = *byte;
                    }
                    frames.push(Frame::Dsd(per_channel));
                }
            }
            FrameFormat::Dst => {
                let offsets = dst_spans.unwrap_or_default();
                for window in offsets.windows(2) {
                    let mut blob = vec![0u8; (window[1] - window[0]) as usize];
                    self.reader.read_bytes(area_base + window[0], &mut blob)?;
                    frames.push(Frame::Dst(blob));
                }
            }
        }

        Ok(frames)
    }
}
