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

    src/id3.rs

    Minimal ID3v2.4 tag synthesis. SACD discs carry plain track text, not ID3;
    the index converts that text into a small tag once at mount time so that the
    metadata region of a virtual DSF file always has something sensible to serve.
*/

/// Encode a 28-bit value as a 4-byte syncsafe integer.
fn syncsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// Append one UTF-8 text frame (encoding byte 0x03).
fn push_text_frame(out: &mut Vec<u8>, id: &[u8; 4], text: &str) {
    let body_len = 1 + text.len();
    out.extend_from_slice(id);
    out.extend_from_slice(&syncsafe(body_len as u32));
    out.extend_from_slice(&[0, 0]); // frame flags
    out.push(0x03); // UTF-8
    out.extend_from_slice(text.as_bytes());
}

/// Build an ID3v2.4 tag with TALB/TPE1/TIT2/TRCK frames. Empty text fields are
/// omitted; the TRCK frame is always present.
pub fn synthesize_tag(album: &str, performer: &str, title: &str, track: u8, track_total: u8) -> Vec<u8> {
    let mut frames = Vec::new();
    if !album.is_empty() {
        push_text_frame(&mut frames, b"TALB", album);
    }
    if !performer.is_empty() {
        push_text_frame(&mut frames, b"TPE1", performer);
    }
    if !title.is_empty() {
        push_text_frame(&mut frames, b"TIT2", title);
    }
    push_text_frame(&mut frames, b"TRCK", &format!("{}/{}", track, track_total));

    let mut tag = Vec::with_capacity(10 + frames.len());
    tag.extend_from_slice(b"ID3");
    tag.extend_from_slice(&[0x04, 0x00]); // version 2.4.0
    tag.push(0x00); // no flags
    tag.extend_from_slice(&syncsafe(frames.len() as u32));
    tag.extend_from_slice(&frames);
    tag
}

/// Total size in bytes of an ID3v2 tag starting at `bytes`, or `None` if the bytes
/// do not start with a plausible tag header.
pub fn tag_size(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < 10 || &bytes[..3] != b"ID3" {
        return None;
    }
    if bytes[6..10].iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = ((bytes[6] as usize) << 21)
        | ((bytes[7] as usize) << 14)
        | ((bytes[8] as usize) << 7)
        | (bytes[9] as usize);
    Some(10 + size)
}
