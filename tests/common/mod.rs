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

    tests/common/mod.rs

    Common support routines for tests: a synthetic SACD image builder and
    overlay listing helpers.
*/

use std::path::Path;

use binrw::BinWrite;
use sacdfs::{
    disc::toc::{
        AlbumText,
        AreaToc,
        MasterToc,
        TimeCode,
        TrackDescriptor,
        FRAME_FORMAT_DSD_3_IN_16,
    },
    overlay::{Overlay, OverlayDirEntry},
    FRAME_BYTES_PER_CHANNEL,
    SACD_LSN_SIZE,
};

pub const MASTER_TOC_LSN: u32 = 510;
pub const AREA_1_TOC_LSN: u32 = 520;
pub const AREA_2_TOC_LSN: u32 = 540;
pub const AREA_1_AUDIO_LSN: u32 = 600;

#[allow(dead_code)]
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic audio pattern: the byte of `channel` at per-channel stream
/// position `index` within an area.
#[allow(dead_code)]
pub fn area_byte(channel: usize, index: u64) -> u8 {
    ((index.wrapping_mul(7) + channel as u64 * 13) % 251) as u8
}

/// MSB-first to LSB-first, as the DSF output applies it.
#[allow(dead_code)]
pub fn reverse_bits(mut byte: u8) -> u8 {
    byte = (byte >> 4) | (byte << 4);
    byte = ((byte & 0x33) << 2) | ((byte & 0xCC) >> 2);
    byte = ((byte & 0x55) << 1) | ((byte & 0xAA) >> 1);
    byte
}

pub struct DiscSpec {
    pub album_title: String,
    pub album_artist: String,
    /// Stereo tracks as (title, frame_count).
    pub stereo_tracks: Vec<(String, u32)>,
    /// Multi-channel tracks as (title, frame_count); empty = no such area.
    pub multichannel_tracks: Vec<(String, u32)>,
}

impl DiscSpec {
    pub fn stereo_only(titles: &[&str]) -> DiscSpec {
        DiscSpec {
            album_title: "Test Album".to_string(),
            album_artist: "Test Artist".to_string(),
            stereo_tracks: titles.iter().map(|t| (t.to_string(), 10)).collect(),
            multichannel_tracks: Vec::new(),
        }
    }
}

fn text_field<const N: usize>(s: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = s.as_bytes();
    let n = bytes.len().min(N - 1);
    field[..n].copy_from_slice(&bytes[..n]);
    field
}

fn timecode(frames: u32) -> TimeCode {
    TimeCode {
        minute: (frames / (75 * 60)) as u8,
        second: ((frames / 75) % 60) as u8,
        frame: (frames % 75) as u8,
    }
}

macro_rules! serialize {
    ($value:expr) => {{
        let mut cursor = std::io::Cursor::new(Vec::new());
        $value.write(&mut cursor).expect("serialize TOC struct");
        cursor.into_inner()
    }};
}

fn write_at(image: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    if image.len() < offset + bytes.len() {
        image.resize(offset + bytes.len(), 0);
    }
    image[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn area_toc(
    signature: [u8; 8],
    channels: u8,
    audio_lsn: u32,
    tracks: &[(String, u32)],
    artist: &str,
) -> AreaToc {
    let mut descriptors = Vec::new();
    let mut cursor = 0u32;
    for (title, frames) in tracks {
        descriptors.push(TrackDescriptor {
            start: timecode(cursor),
            length: timecode(*frames),
            title: text_field::<64>(title),
            performer: text_field::<64>(artist),
        });
        cursor += frames;
    }

    let mut toc = AreaToc {
        signature,
        version_major: 1,
        version_minor: 20,
        size_in_sectors: 0,
        channel_count: channels,
        frame_format: FRAME_FORMAT_DSD_3_IN_16,
        track_count: tracks.len() as u8,
        track_area_start: audio_lsn,
        total_frames: cursor,
        tracks: descriptors,
        dst_frame_sizes: Vec::new(),
    };
    let sectors = serialize!(&toc).len().div_ceil(SACD_LSN_SIZE) as u16;
    toc.size_in_sectors = sectors;
    toc
}

/// Write the byte-interleaved raw DSD audio of one area.
fn write_area_audio(image: &mut Vec<u8>, audio_lsn: u32, channels: usize, total_frames: u32) {
    let frame_size = FRAME_BYTES_PER_CHANNEL * channels;
    let base = audio_lsn as usize * SACD_LSN_SIZE;
    let mut bytes = vec![0u8; frame_size * total_frames as usize];
    for (j, b) in bytes.iter_mut().enumerate() {
        let frame = j / frame_size;
        let within = j % frame_size;
        let channel = within % channels;
        let index = frame as u64 * FRAME_BYTES_PER_CHANNEL as u64 + (within / channels) as u64;
        *b = area_byte(channel, index);
    }
    write_at(image, base, &bytes);
}

/// Assemble a complete, valid SACD image for the given spec.
pub fn build_iso(spec: &DiscSpec) -> Vec<u8> {
    let mut image = Vec::new();

    let stereo = area_toc(
        *b"TWOCHTOC",
        2,
        AREA_1_AUDIO_LSN,
        &spec.stereo_tracks,
        &spec.album_artist,
    );

    let stereo_audio_sectors = (stereo.total_frames as usize * FRAME_BYTES_PER_CHANNEL * 2)
        .div_ceil(SACD_LSN_SIZE) as u32;
    let area_2_audio_lsn = AREA_1_AUDIO_LSN + stereo_audio_sectors + 1;

    let multichannel = (!spec.multichannel_tracks.is_empty()).then(|| {
        area_toc(
            *b"MULCHTOC",
            6,
            area_2_audio_lsn,
            &spec.multichannel_tracks,
            &spec.album_artist,
        )
    });

    let master = MasterToc {
        version_major: 2,
        version_minor: 0,
        album_set_size: 1,
        album_sequence: 1,
        area_1_toc_start: AREA_1_TOC_LSN,
        area_1_toc_size: stereo.size_in_sectors as u32,
        area_2_toc_start: multichannel.as_ref().map(|_| AREA_2_TOC_LSN).unwrap_or(0),
        area_2_toc_size: multichannel.as_ref().map(|t| t.size_in_sectors as u32).unwrap_or(0),
        catalog_number: *b"TEST-00000000001",
        disc_date_year: 2024,
        disc_date_month: 6,
        disc_date_day: 1,
    };

    let text = AlbumText {
        signature: *b"SACDText",
        album_title: text_field::<128>(&spec.album_title),
        album_artist: text_field::<128>(&spec.album_artist),
    };

    write_at(&mut image, MASTER_TOC_LSN as usize * SACD_LSN_SIZE, &serialize!(&master));
    write_at(
        &mut image,
        (MASTER_TOC_LSN + 1) as usize * SACD_LSN_SIZE,
        &serialize!(&text),
    );
    write_at(&mut image, AREA_1_TOC_LSN as usize * SACD_LSN_SIZE, &serialize!(&stereo));
    write_area_audio(&mut image, AREA_1_AUDIO_LSN, 2, stereo.total_frames);

    if let Some(multichannel) = &multichannel {
        write_at(
            &mut image,
            AREA_2_TOC_LSN as usize * SACD_LSN_SIZE,
            &serialize!(multichannel),
        );
        write_area_audio(&mut image, area_2_audio_lsn, 6, multichannel.total_frames);
    }

    // Round the image out to a whole sector.
    let len = image.len().div_ceil(SACD_LSN_SIZE) * SACD_LSN_SIZE;
    image.resize(len, 0);
    image
}

pub fn write_iso(path: &Path, spec: &DiscSpec) {
    std::fs::write(path, build_iso(spec)).expect("write synthetic iso");
}

/// A workable overlay configuration for tests: editable tags, a small pool, and a
/// long idle timeout so nothing is evicted behind a test's back.
#[allow(dead_code)]
pub fn overlay_config(root: &Path) -> sacdfs::overlay::OverlayConfig {
    let mut config = sacdfs::overlay::OverlayConfig::new(root);
    config.threads = 2;
    config.editable_tags = true;
    config
}

/// Open, read one range, close.
#[allow(dead_code)]
pub fn read_range(overlay: &Overlay, vpath: &str, offset: u64, len: usize) -> Vec<u8> {
    let fh = overlay.open(vpath, false).expect("open for read");
    let mut buf = vec![0u8; len];
    let n = overlay.read(fh, offset, &mut buf).expect("read");
    overlay.release(fh).expect("release");
    buf.truncate(n);
    buf
}

/// The absolute metadata offset recorded in a virtual file's DSD chunk.
#[allow(dead_code)]
pub fn metadata_offset(overlay: &Overlay, vpath: &str) -> u64 {
    let bytes = read_range(overlay, vpath, 20, 8);
    u64::from_le_bytes(bytes.try_into().expect("metadata offset field"))
}

/// Collect a directory listing, dropping `.` and `..`.
#[allow(dead_code)]
pub fn listing(overlay: &Overlay, vpath: &str) -> Vec<OverlayDirEntry> {
    let mut entries = Vec::new();
    overlay
        .readdir(vpath, &mut |e| entries.push(e))
        .unwrap_or_else(|e| panic!("readdir({}) failed: {}", vpath, e));
    entries.retain(|e| e.name != "." && e.name != "..");
    entries
}

#[allow(dead_code)]
pub fn names(overlay: &Overlay, vpath: &str) -> Vec<String> {
    listing(overlay, vpath).into_iter().map(|e| e.name).collect()
}
