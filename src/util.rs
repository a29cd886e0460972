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

//! The `util` module provides virtual path manipulation and filename generation utilities.
//!
//! Virtual paths are always forward-slash separated, rooted at `/`, with no trailing or
//! repeated separators. Host separators (backslashes) are folded into this canonical form
//! on entry so the rest of the crate never sees them.

use regex::Regex;

/// Maximum byte length of a generated virtual filename. Kept under common NAME_MAX limits
/// with headroom for a collision suffix and extension.
pub const MAX_NAME_BYTES: usize = 240;

/// Selects which of the three virtual track filename formats the generator produces.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrackNameFormat {
    /// `"NN.dsf"`
    Number,
    /// `"NN. <title>.dsf"`
    #[default]
    NumberTitle,
    /// `"NN. <performer> - <title>.dsf"`
    NumberArtistTitle,
}

/// Canonicalize a virtual path: forward slashes only, single leading `/`, no repeated
/// separators, no trailing separator except for the root itself.
pub fn normalize_vpath(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');

    let mut last_sep = true;
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' {
            if !last_sep {
                out.push('/');
            }
            last_sep = true;
        }
        else {
            out.push(c);
            last_sep = false;
        }
    }

    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Split a normalized virtual path into `(parent, leaf)`. The root splits into `("/", "")`.
pub fn split_vpath(path: &str) -> (&str, &str) {
    if path == "/" {
        return ("/", "");
    }
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("/", path),
    }
}

/// Join a normalized parent path and a leaf name.
pub fn join_vpath(parent: &str, leaf: &str) -> String {
    if parent == "/" {
        format!("/{}", leaf)
    }
    else {
        format!("{}/{}", parent, leaf)
    }
}

/// Return `true` if `path` equals `prefix` or descends from it.
pub fn vpath_has_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// Replace characters that are invalid in host filenames with `_`, trim leading and
/// trailing spaces and dots, collapse runs of underscores, and cap the result at a
/// platform-safe byte length. An input that sanitizes to nothing becomes `"_"`.
pub fn sanitize_name(name: &str) -> String {
    let mut replaced = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => replaced.push('_'),
            c if c.is_control() => replaced.push('_'),
            c => replaced.push(c),
        }
    }

    let re = Regex::new(r"_{2,}").expect("Invalid regex");
    let collapsed = re.replace_all(&replaced, "_");

    let trimmed = collapsed.trim_matches(|c| c == ' ' || c == '.');

    let mut capped = trimmed.to_string();
    if capped.len() > MAX_NAME_BYTES {
        let mut end = MAX_NAME_BYTES;
        while !capped.is_char_boundary(end) {
            end -= 1;
        }
        capped.truncate(end);
    }

    if capped.is_empty() {
        capped.push('_');
    }
    capped
}

/// Append a collision index to a display name: index 0 is the name itself, index 1
/// becomes `"name (1)"`, and so on.
pub fn display_name_with_suffix(name: &str, collision_index: u32) -> String {
    if collision_index == 0 {
        name.to_string()
    }
    else {
        format!("{} ({})", name, collision_index)
    }
}

/// Generate a virtual track filename in the configured format. Track numbers are
/// zero-padded to two digits.
pub fn track_file_name(format: TrackNameFormat, number: u8, title: &str, performer: &str) -> String {
    let title = sanitize_name(title);
    let performer = sanitize_name(performer);

    match format {
        TrackNameFormat::Number => format!("{:02}.dsf", number),
        TrackNameFormat::NumberTitle => {
            if title == "_" {
                format!("{:02}.dsf", number)
            }
            else {
                format!("{:02}. {}.dsf", number, title)
            }
        }
        TrackNameFormat::NumberArtistTitle => match (performer.as_str(), title.as_str()) {
            ("_", "_") => format!("{:02}.dsf", number),
            ("_", t) => format!("{:02}. {}.dsf", number, t),
            (p, "_") => format!("{:02}. {}.dsf", number, p),
            (p, t) => format!("{:02}. {} - {}.dsf", number, p, t),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_vpath(""), "/");
        assert_eq!(normalize_vpath("/"), "/");
        assert_eq!(normalize_vpath("a/b"), "/a/b");
        assert_eq!(normalize_vpath("//a///b//"), "/a/b");
        assert_eq!(normalize_vpath("\\a\\b\\"), "/a/b");
    }

    #[test]
    fn split_parent_and_leaf() {
        assert_eq!(split_vpath("/"), ("/", ""));
        assert_eq!(split_vpath("/a"), ("/", "a"));
        assert_eq!(split_vpath("/a/b"), ("/a", "b"));
    }

    #[test]
    fn prefix_matching_requires_separator() {
        assert!(vpath_has_prefix("/a/b", "/a"));
        assert!(vpath_has_prefix("/a", "/a"));
        assert!(!vpath_has_prefix("/ab", "/a"));
        assert!(vpath_has_prefix("/anything", "/"));
    }

    #[test]
    fn sanitize_replaces_and_collapses() {
        assert_eq!(sanitize_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_name("a???b"), "a_b");
        assert_eq!(sanitize_name(" .name. "), "name");
        assert_eq!(sanitize_name("???"), "_");
        assert_eq!(sanitize_name("tab\there"), "tab_here");
    }

    #[test]
    fn sanitize_caps_length_on_char_boundary() {
        let long = "é".repeat(300);
        let capped = sanitize_name(&long);
        assert!(capped.len() <= MAX_NAME_BYTES);
        assert!(capped.chars().all(|c| c == 'é'));
    }

    #[test]
    fn track_names_by_format() {
        assert_eq!(track_file_name(TrackNameFormat::Number, 3, "Song", "Band"), "03.dsf");
        assert_eq!(
            track_file_name(TrackNameFormat::NumberTitle, 3, "Song", "Band"),
            "03. Song.dsf"
        );
        assert_eq!(
            track_file_name(TrackNameFormat::NumberArtistTitle, 12, "Song", "Band"),
            "12. Band - Song.dsf"
        );
        assert_eq!(track_file_name(TrackNameFormat::NumberTitle, 4, "", ""), "04.dsf");
    }

    #[test]
    fn collision_suffixes() {
        assert_eq!(display_name_with_suffix("B", 0), "B");
        assert_eq!(display_name_with_suffix("B", 1), "B (1)");
        assert_eq!(display_name_with_suffix("B", 2), "B (2)");
    }
}
