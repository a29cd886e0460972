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

    tests/dsf.rs

    End-to-end materialization checks: synthetic SACD image in, bit-exact DSF
    bytes out.
*/

mod common;

use common::*;
use sacdfs::{overlay::Overlay, DSF_BLOCK_SIZE, FRAME_BYTES_PER_CHANNEL};

const TRACK_FRAMES: u64 = 10;
const RAW_PER_CHANNEL: u64 = TRACK_FRAMES * FRAME_BYTES_PER_CHANNEL as u64;

fn stereo_overlay(dir: &tempfile::TempDir) -> Overlay {
    write_iso(
        &dir.path().join("A.iso"),
        &DiscSpec::stereo_only(&["One", "Two", "Three"]),
    );
    Overlay::new(overlay_config(dir.path())).unwrap()
}

/// Expected DSF audio byte for a stereo track starting at `start_frame`.
fn expected_audio_byte(start_frame: u64, audio_offset: u64) -> u8 {
    let block = DSF_BLOCK_SIZE as u64;
    let stride = 2 * block;
    let channel = ((audio_offset % stride) / block) as usize;
    let channel_pos = (audio_offset / stride) * block + audio_offset % block;
    if channel_pos >= RAW_PER_CHANNEL {
        0
    }
    else {
        reverse_bits(area_byte(channel, start_frame * FRAME_BYTES_PER_CHANNEL as u64 + channel_pos))
    }
}

#[test]
fn file_begins_with_dsd_magic() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let magic = read_range(&overlay, "/A/Stereo/01. One.dsf", 0, 4);
    assert_eq!(&magic, b"DSD ");
}

#[test]
fn header_chunks_are_consistent() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let path = "/A/Stereo/01. One.dsf";

    let header = read_range(&overlay, path, 0, 92);
    assert_eq!(header.len(), 92);

    let u64_at = |o: usize| u64::from_le_bytes(header[o..o + 8].try_into().unwrap());
    let u32_at = |o: usize| u32::from_le_bytes(header[o..o + 4].try_into().unwrap());

    // DSD chunk.
    assert_eq!(&header[0..4], b"DSD ");
    assert_eq!(u64_at(4), 28);
    let stat_size = overlay.getattr(path).unwrap().size();
    assert_eq!(u64_at(12), stat_size);

    // fmt chunk.
    assert_eq!(&header[28..32], b"fmt ");
    assert_eq!(u64_at(32), 52);
    assert_eq!(u32_at(40), 1); // format version
    assert_eq!(u32_at(44), 0); // format id: DSD raw
    assert_eq!(u32_at(48), 2); // channel type: stereo
    assert_eq!(u32_at(52), 2); // channel count
    assert_eq!(u32_at(56), 2_822_400); // sample rate
    assert_eq!(u32_at(60), 1); // bits per sample
    assert_eq!(u64_at(64), TRACK_FRAMES * FRAME_BYTES_PER_CHANNEL as u64 * 8); // samples
    assert_eq!(u32_at(72), 4096); // block size per channel

    // data chunk header.
    assert_eq!(&header[80..84], b"data");
    let audio_size = u64_at(84) - 12;
    assert_eq!(audio_size % DSF_BLOCK_SIZE as u64, 0);

    // Metadata sits immediately after the audio and runs to end of file.
    let metadata_offset = u64_at(20);
    assert_eq!(metadata_offset, 92 + audio_size);
    assert!(metadata_offset < stat_size);
}

#[test]
fn metadata_region_carries_an_id3_tag() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let path = "/A/Stereo/01. One.dsf";

    let offset = metadata_offset(&overlay, path);
    let magic = read_range(&overlay, path, offset, 3);
    assert_eq!(&magic, b"ID3");
}

#[test]
fn audio_bytes_are_bit_reversed_block_interleaved() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let path = "/A/Stereo/01. One.dsf";

    // Two full per-channel blocks' worth from the start of the audio region.
    let span = 4 * DSF_BLOCK_SIZE;
    let audio = read_range(&overlay, path, 92, span);
    assert_eq!(audio.len(), span);
    for (i, byte) in audio.iter().enumerate() {
        assert_eq!(
            *byte,
            expected_audio_byte(0, i as u64),
            "mismatch at audio offset {}",
            i
        );
    }
}

#[test]
fn final_block_is_zero_padded() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let path = "/A/Stereo/01. One.dsf";

    let audio_size = metadata_offset(&overlay, path) - 92;
    // The last two blocks (one per channel) contain the tail of the audio plus the
    // pad out to the block boundary.
    let tail_len = 2 * DSF_BLOCK_SIZE;
    let tail_start = 92 + audio_size - tail_len as u64;
    let tail = read_range(&overlay, path, tail_start, tail_len);

    for (i, byte) in tail.iter().enumerate() {
        let audio_offset = (tail_start - 92) + i as u64;
        assert_eq!(*byte, expected_audio_byte(0, audio_offset));
    }
    // And the very last byte of each channel's final block is pad.
    assert_eq!(tail[DSF_BLOCK_SIZE - 1], 0);
    assert_eq!(tail[2 * DSF_BLOCK_SIZE - 1], 0);
}

#[test]
fn second_track_starts_at_its_own_frames() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);

    let audio = read_range(&overlay, "/A/Stereo/02. Two.dsf", 92, 64);
    for (i, byte) in audio.iter().enumerate() {
        assert_eq!(*byte, expected_audio_byte(TRACK_FRAMES, i as u64));
    }
}

#[test]
fn reads_are_offset_consistent() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let path = "/A/Stereo/01. One.dsf";

    let o1 = 500u64;
    let o2 = 92 + 5000u64;
    let len = 3000usize;

    let long = read_range(&overlay, path, o1, (o2 - o1) as usize + len);
    let short = read_range(&overlay, path, o2, len);
    assert_eq!(&long[(o2 - o1) as usize..], &short[..]);
}

#[test]
fn read_past_end_is_a_short_read() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let path = "/A/Stereo/01. One.dsf";

    let size = overlay.getattr(path).unwrap().size();
    assert!(read_range(&overlay, path, size, 64).is_empty());
    assert!(read_range(&overlay, path, size + 10_000, 64).is_empty());

    // A read straddling end of file returns only the bytes that exist.
    let tail = read_range(&overlay, path, size - 5, 64);
    assert_eq!(tail.len(), 5);
}

#[test]
fn multichannel_tracks_use_six_channel_layout() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let mut spec = DiscSpec::stereo_only(&["One"]);
    spec.multichannel_tracks = vec![("One".to_string(), 10)];
    write_iso(&dir.path().join("A.iso"), &spec);
    let overlay = Overlay::new(overlay_config(dir.path())).unwrap();

    let path = "/A/Multi-channel/01. One.dsf";
    let header = read_range(&overlay, path, 0, 92);
    let u32_at = |o: usize| u32::from_le_bytes(header[o..o + 4].try_into().unwrap());
    assert_eq!(u32_at(48), 7); // channel type: 5.1
    assert_eq!(u32_at(52), 6); // channel count

    // Channel 3's first block begins three blocks into the audio region.
    let offset = 92 + 3 * DSF_BLOCK_SIZE as u64;
    let bytes = read_range(&overlay, path, offset, 16);
    for (i, byte) in bytes.iter().enumerate() {
        assert_eq!(*byte, reverse_bits(area_byte(3, i as u64)));
    }
}

#[test]
fn whole_file_read_matches_stat_size() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let overlay = stereo_overlay(&dir);
    let path = "/A/Stereo/03. Three.dsf";

    let size = overlay.getattr(path).unwrap().size();
    let fh = overlay.open(path, false).unwrap();
    let mut total = 0u64;
    let mut buf = vec![0u8; 32768];
    loop {
        let n = overlay.read(fh, total, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        total += n as u64;
    }
    overlay.release(fh).unwrap();
    assert_eq!(total, size);
}
