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

    src/disc/toc.rs

    On-disc table-of-contents structures. All multi-byte integers in SACD
    TOC sectors are big-endian. Timecodes count at 75 frames per second.
*/

use binrw::binrw;

use crate::FRAMES_PER_SECOND;

/// Frame format code: DST-compressed DSD.
pub const FRAME_FORMAT_DST: u8 = 0;
/// Frame format code: raw DSD, 3-in-14 sector packing.
pub const FRAME_FORMAT_DSD_3_IN_14: u8 = 2;
/// Frame format code: raw DSD, 3-in-16 sector packing.
pub const FRAME_FORMAT_DSD_3_IN_16: u8 = 3;

pub(crate) const TWO_CHANNEL_TOC_SIGNATURE: [u8; 8] = *b"TWOCHTOC";
pub(crate) const MULTI_CHANNEL_TOC_SIGNATURE: [u8; 8] = *b"MULCHTOC";
pub(crate) const ALBUM_TEXT_SIGNATURE: [u8; 8] = *b"SACDText";

/// The Master TOC, stored at logical sector 510.
#[derive(Debug)]
#[binrw]
#[brw(big, magic = b"SACDMTOC")]
pub struct MasterToc {
    pub version_major: u8, // Specification version, major
    pub version_minor: u8, // Specification version, minor
    #[brw(pad_before = 6)]
    pub album_set_size: u16, // Number of discs in the album set
    pub album_sequence: u16, // Position of this disc within the set, 1-based
    pub area_1_toc_start: u32, // LSN of the two-channel area TOC, 0 if the area is absent
    pub area_1_toc_size: u32, // Size of the two-channel area TOC in sectors
    pub area_2_toc_start: u32, // LSN of the multi-channel area TOC, 0 if the area is absent
    pub area_2_toc_size: u32, // Size of the multi-channel area TOC in sectors
    pub catalog_number: [u8; 16], // Space-padded ASCII
    pub disc_date_year: u16,
    pub disc_date_month: u8,
    pub disc_date_day: u8,
}

/// Album text, stored in the sector following the Master TOC.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct AlbumText {
    pub signature: [u8; 8], // “SACDText”
    #[brw(pad_before = 8)]
    pub album_title: [u8; 128], // NUL-padded UTF-8
    pub album_artist: [u8; 128], // NUL-padded UTF-8
}

/// An area TOC, one per audio area present on the disc.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct AreaToc {
    pub signature: [u8; 8], // “TWOCHTOC” or “MULCHTOC”
    pub version_major: u8,
    pub version_minor: u8,
    pub size_in_sectors: u16,
    pub channel_count: u8,
    pub frame_format: u8, // One of the FRAME_FORMAT_* codes
    #[brw(pad_before = 2)]
    pub track_count: u8,
    #[brw(pad_before = 3)]
    pub track_area_start: u32, // LSN of the first audio sector of the area
    pub total_frames: u32, // Total audio frames in the area
    #[br(count = track_count)]
    pub tracks: Vec<TrackDescriptor>,
    // DST areas carry a frame size table so that frames can be located without a
    // sequential scan; raw DSD frames have a fixed size and need none.
    #[br(if(frame_format == FRAME_FORMAT_DST), count = total_frames)]
    pub dst_frame_sizes: Vec<u32>,
}

#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct TrackDescriptor {
    pub start: TimeCode,
    pub length: TimeCode,
    pub title: [u8; 64], // NUL-padded UTF-8
    pub performer: [u8; 64], // NUL-padded UTF-8
}

/// A (minute, second, frame) timecode triplet.
#[derive(Copy, Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct TimeCode {
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
}

impl TimeCode {
    pub fn to_frames(self) -> u32 {
        (self.minute as u32 * 60 + self.second as u32) * FRAMES_PER_SECOND + self.frame as u32
    }
}

/// Decode a NUL-padded UTF-8 text field.
pub(crate) fn decode_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}
