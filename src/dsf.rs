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

//! The `dsf` module materializes one track of an SACD as a byte-addressable DSF file.
//!
//! Nothing is rendered ahead of time: the three header chunks are synthesized from the
//! track description, audio bytes are produced from SACD frames on demand, and the
//! trailing metadata region mirrors the tag overlay store. SACD frames store samples
//! MSB-first while DSF stores them LSB-first, so every audio byte is bit-reversed on
//! its way out; bytes are also transposed from frame order into DSF's per-channel
//! 4096-byte block interleave, with the final partial block zero-padded.

use std::{
    collections::VecDeque,
    io::SeekFrom,
    sync::{Arc, Mutex},
};

use binrw::{binrw, BinWrite};

use crate::{
    decoder::DecodeCoordinator,
    disc::{Frame, FrameFormat, FrameSource},
    index::{Area, IsoIndex},
    tags::TagStore,
    SacdFsError,
    DSF_BLOCK_SIZE,
    DSF_HEADER_SIZE,
    FRAME_BYTES_PER_CHANNEL,
    FRAME_SAMPLES_PER_CHANNEL,
};

/// Number of decoded frames the materializer keeps resident. A 4096-byte block spans
/// at most two 4704-byte frames, so this comfortably covers a block plus prefetch.
const FRAME_WINDOW: usize = 8;

const fn reverse_bits(mut byte: u8) -> u8 {
    byte = (byte >> 4) | (byte << 4);
    byte = ((byte & 0x33) << 2) | ((byte & 0xCC) >> 2);
    byte = ((byte & 0x55) << 1) | ((byte & 0xAA) >> 1);
    byte
}

const fn build_reverse_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = reverse_bits(i as u8);
        i += 1;
    }
    table
}

/// MSB-first to LSB-first byte conversion table.
pub(crate) const BIT_REVERSE: [u8; 256] = build_reverse_table();

#[derive(Debug)]
#[binrw]
#[brw(little, magic = b"DSD ")]
struct DsdChunk {
    chunk_size: u64, // Always 28
    file_size: u64,
    metadata_offset: u64, // 0 when the file carries no metadata
}

#[derive(Debug)]
#[binrw]
#[brw(little, magic = b"fmt ")]
struct FmtChunk {
    chunk_size: u64, // Always 52
    format_version: u32, // Always 1
    format_id: u32, // 0 = DSD raw
    channel_type: u32,
    channel_num: u32,
    sampling_frequency: u32,
    bits_per_sample: u32, // Always 1
    sample_count: u64, // Per channel
    block_size_per_channel: u32, // Always 4096
    reserved: u32,
}

#[derive(Debug)]
#[binrw]
#[brw(little, magic = b"data")]
struct DataChunkHeader {
    chunk_size: u64, // Audio byte count + 12
}

/// DSF channel type code for a channel count.
fn channel_type_for(channels: u8) -> u32 {
    match channels {
        1 => 1, // mono
        2 => 2, // stereo
        3 => 3, // 3 channels
        4 => 4, // quad
        5 => 6, // 5 channels
        6 => 7, // 5.1
        _ => 2,
    }
}

#[derive(Clone, Debug)]
pub struct DsfFileInfo {
    pub total_size: u64,
    pub header_size: u64,
    pub audio_size: u64,
    /// Absolute offset of the metadata region, or 0 when the file has none.
    pub metadata_offset: u64,
    pub metadata_size: u64,
    pub channels: u8,
    pub sample_rate: u32,
    /// Samples per channel.
    pub sample_count: u64,
    pub duration_secs: f64,
    pub frame_format: FrameFormat,
}

/// A sliding cache of decoded frames, keyed by absolute frame index.
struct FrameWindow {
    frames: VecDeque<(u32, Vec<Vec<u8>>)>,
}

impl FrameWindow {
    fn new() -> Self {
        FrameWindow {
            frames: VecDeque::with_capacity(FRAME_WINDOW),
        }
    }

    fn get(&self, index: u32) -> Option<&Vec<Vec<u8>>> {
        self.frames.iter().find(|(i, _)| *i == index).map(|(_, data)| data)
    }

    fn insert(&mut self, index: u32, data: Vec<Vec<u8>>) {
        if self.frames.len() == FRAME_WINDOW {
            self.frames.pop_front();
        }
        self.frames.push_back((index, data));
    }
}

/// A byte-addressable view of one track, synthesized on the fly.
///
/// Not safe for concurrent use; open one `DsfFile` per reader. Independent instances
/// over the same track may coexist and share the underlying frame source.
pub struct DsfFile {
    source: Arc<Mutex<dyn FrameSource>>,
    coordinator: Option<Arc<DecodeCoordinator>>,
    tags: Arc<TagStore>,
    area: Area,
    track_number: u8,
    channels: u8,
    sample_rate: u32,
    frame_format: FrameFormat,
    start_frame: u32,
    frame_count: u32,
    cursor: u64,
    window: FrameWindow,
}

impl DsfFile {
    /// Bind a materializer to `(area, track_number)` of an indexed disc. The
    /// coordinator is required for DST areas and unused for raw DSD.
    pub fn new(
        index: &IsoIndex,
        source: Arc<Mutex<dyn FrameSource>>,
        coordinator: Option<Arc<DecodeCoordinator>>,
        tags: Arc<TagStore>,
        area: Area,
        track_number: u8,
    ) -> Result<Self, SacdFsError> {
        let area_index = index.area(area).ok_or(SacdFsError::NotFound)?;
        let track = area_index.track(track_number).ok_or(SacdFsError::NotFound)?;

        Ok(DsfFile {
            source,
            coordinator,
            tags,
            area,
            track_number,
            channels: area_index.channel_count,
            sample_rate: area_index.sample_rate,
            frame_format: area_index.frame_format,
            start_frame: track.start_frame,
            frame_count: track.frame_count,
            cursor: 0,
            window: FrameWindow::new(),
        })
    }

    /// Raw (unpadded) audio bytes per channel.
    fn raw_bytes_per_channel(&self) -> u64 {
        self.frame_count as u64 * FRAME_BYTES_PER_CHANNEL as u64
    }

    /// Audio bytes per channel rounded up to a whole number of DSF blocks.
    fn padded_bytes_per_channel(&self) -> u64 {
        let block = DSF_BLOCK_SIZE as u64;
        self.raw_bytes_per_channel().div_ceil(block) * block
    }

    fn audio_size(&self) -> u64 {
        self.padded_bytes_per_channel() * self.channels as u64
    }

    fn metadata_bytes(&self) -> Option<Vec<u8>> {
        self.tags.get(self.area, self.track_number)
    }

    pub fn info(&self) -> DsfFileInfo {
        let audio_size = self.audio_size();
        let metadata_size = self.metadata_bytes().map(|b| b.len() as u64).unwrap_or(0);
        let metadata_offset = if metadata_size > 0 {
            DSF_HEADER_SIZE + audio_size
        }
        else {
            0
        };
        let sample_count = self.frame_count as u64 * FRAME_SAMPLES_PER_CHANNEL;

        DsfFileInfo {
            total_size: DSF_HEADER_SIZE + audio_size + metadata_size,
            header_size: DSF_HEADER_SIZE,
            audio_size,
            metadata_offset,
            metadata_size,
            channels: self.channels,
            sample_rate: self.sample_rate,
            sample_count,
            duration_secs: sample_count as f64 / self.sample_rate as f64,
            frame_format: self.frame_format,
        }
    }

    fn synthesize_header(&self) -> Result<Vec<u8>, SacdFsError> {
        let info = self.info();
        let mut buf = std::io::Cursor::new(Vec::with_capacity(DSF_HEADER_SIZE as usize));

        let write = |e: binrw::Error| SacdFsError::IoError(e.to_string());
        DsdChunk {
            chunk_size: 28,
            file_size: info.total_size,
            metadata_offset: info.metadata_offset,
        }
        .write(&mut buf)
        .map_err(write)?;

        FmtChunk {
            chunk_size: 52,
            format_version: 1,
            format_id: 0,
            channel_type: channel_type_for(self.channels),
            channel_num: self.channels as u32,
            sampling_frequency: self.sample_rate,
            bits_per_sample: 1,
            sample_count: info.sample_count,
            block_size_per_channel: DSF_BLOCK_SIZE as u32,
            reserved: 0,
        }
        .write(&mut buf)
        .map_err(write)?;

        DataChunkHeader {
            chunk_size: info.audio_size + 12,
        }
        .write(&mut buf)
        .map_err(write)?;

        let header = buf.into_inner();
        debug_assert_eq!(header.len(), DSF_HEADER_SIZE as usize);
        Ok(header)
    }

    /// Make sure `frame` (absolute, area-relative) is resident, prefetching ahead
    /// within the track.
    fn ensure_frame(&mut self, frame: u32) -> Result<(), SacdFsError> {
        if self.window.get(frame).is_some() {
            return Ok(());
        }

        let track_end = self.start_frame + self.frame_count;
        let prefetch = (FRAME_WINDOW as u32).min(track_end - frame);

        let raw = {
            let mut source = self.source.lock().unwrap();
            source.read_frames(self.area, frame, prefetch)?
        };

        match self.frame_format {
            FrameFormat::Dsd => {
                for (i, f) in raw.into_iter().enumerate() {
                    match f {
                        Frame::Dsd(channels) => self.window.insert(frame + i as u32, channels),
                        Frame::Dst(_) => {
                            return Err(SacdFsError::DecodeError(
                                "source produced a DST frame in a raw DSD area".to_string(),
                            ))
                        }
                    }
                }
            }
            FrameFormat::Dst => {
                let coordinator = self.coordinator.as_ref().ok_or_else(|| {
                    SacdFsError::DecodeError("no DST decoder bound to this handle".to_string())
                })?;

                let mut blobs = Vec::with_capacity(raw.len());
                for f in raw {
                    match f {
                        Frame::Dst(blob) => blobs.push(blob),
                        Frame::Dsd(_) => {
                            return Err(SacdFsError::DecodeError(
                                "source produced a raw frame in a DST area".to_string(),
                            ))
                        }
                    }
                }

                // Decoded results come back in dispatch order, so frame indices line up.
                let decoded = coordinator.decode_batch(blobs)?;
                let channels = self.channels as usize;
                for (i, bytes) in decoded.into_iter().enumerate() {
                    if bytes.len() != FRAME_BYTES_PER_CHANNEL * channels {
                        return Err(SacdFsError::DecodeError(format!(
                            "decoder produced {} bytes, expected {}",
                            bytes.len(),
                            FRAME_BYTES_PER_CHANNEL * channels
                        )));
                    }
                    let mut per_channel = vec![vec![0u8; FRAME_BYTES_PER_CHANNEL]; channels];
                    for (j, byte) in bytes.iter().enumerate() {
                        per_channel[j % channels][j / channels] = *byte;
                    }
                    self.window.insert(frame + i as u32, per_channel);
                }
            }
        }
        Ok(())
    }

    /// Fill `dst` from the audio region starting at `audio_offset` (0-based within the
    /// region). Returns the byte count produced, short only at the region end.
    fn read_audio(&mut self, audio_offset: u64, dst: &mut [u8]) -> Result<usize, SacdFsError> {
        let block = DSF_BLOCK_SIZE as u64;
        let stride = block * self.channels as u64;
        let raw_per_channel = self.raw_bytes_per_channel();
        let audio_size = self.audio_size();

        let mut filled = 0usize;
        while filled < dst.len() {
            let pos = audio_offset + filled as u64;
            if pos >= audio_size {
                break;
            }

            let channel = ((pos % stride) / block) as usize;
            let intra = pos % block;
            let cell_left = (block - intra) as usize;
            let want = (dst.len() - filled).min(cell_left);

            // Position of this byte within the channel's linear sample stream.
            let channel_pos = (pos / stride) * block + intra;

            if channel_pos >= raw_per_channel {
                // Zero padding between the end of the audio and the end of the block.
                for b in &mut dst[filled..filled + want] {
                    *b = 0;
                }
                filled += want;
                continue;
            }

            let frame = self.start_frame + (channel_pos / FRAME_BYTES_PER_CHANNEL as u64) as u32;
            let frame_byte = (channel_pos % FRAME_BYTES_PER_CHANNEL as u64) as usize;
            let take = want
                .min(FRAME_BYTES_PER_CHANNEL - frame_byte)
                .min((raw_per_channel - channel_pos) as usize);

            self.ensure_frame(frame)?;
            let data = self
                .window
                .get(frame)
                .ok_or_else(|| SacdFsError::IoError("frame window eviction race".to_string()))?;
            let src = &data[channel][frame_byte..frame_byte + take];
            for (d, s) in dst[filled..filled + take].iter_mut().zip(src) {
                *d = BIT_REVERSE[*s as usize];
            }
            filled += take;
        }
        Ok(filled)
    }

    /// Read from the current cursor, advancing it. A read at or past end of file
    /// returns zero bytes.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize, SacdFsError> {
        let info = self.info();
        let mut filled = 0usize;

        while filled < dst.len() {
            let pos = self.cursor + filled as u64;
            if pos >= info.total_size {
                break;
            }

            let n = if pos < DSF_HEADER_SIZE {
                let header = self.synthesize_header()?;
                let start = pos as usize;
                let take = (dst.len() - filled).min(header.len() - start);
                dst[filled..filled + take].copy_from_slice(&header[start..start + take]);
                take
            }
            else if pos < DSF_HEADER_SIZE + info.audio_size {
                let audio_offset = pos - DSF_HEADER_SIZE;
                let dst_end = dst.len();
                self.read_audio(audio_offset, &mut dst[filled..dst_end])?
            }
            else {
                let tag = self.metadata_bytes().unwrap_or_default();
                let start = (pos - DSF_HEADER_SIZE - info.audio_size) as usize;
                if start >= tag.len() {
                    break;
                }
                let take = (dst.len() - filled).min(tag.len() - start);
                dst[filled..filled + take].copy_from_slice(&tag[start..start + take]);
                take
            };

            if n == 0 {
                break;
            }
            filled += n;
        }

        self.cursor += filled as u64;
        Ok(filled)
    }

    /// Position the cursor. Seeking past end of file is legal; subsequent reads
    /// return zero bytes.
    pub fn seek(&mut self, whence: SeekFrom) -> Result<u64, SacdFsError> {
        let base = match whence {
            SeekFrom::Start(offset) => {
                self.cursor = offset;
                return Ok(self.cursor);
            }
            SeekFrom::Current(delta) => (self.cursor, delta),
            SeekFrom::End(delta) => (self.info().total_size, delta),
        };

        let target = base.0 as i64 + base.1;
        if target < 0 {
            return Err(SacdFsError::InvalidParameter(
                "seek before start of file".to_string(),
            ));
        }
        self.cursor = target as u64;
        Ok(self.cursor)
    }

    pub fn tell(&self) -> u64 {
        self.cursor
    }

    /// Convenience for offset-addressed callers: seek then read.
    pub fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<usize, SacdFsError> {
        self.seek(SeekFrom::Start(offset))?;
        self.read(dst)
    }
}
