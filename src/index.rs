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

//! The `index` module builds the per-disc track/area index at mount time and
//! enforces the area visibility policy.

use bitflags::bitflags;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    disc::{AlbumInfo, DiscToc, FrameFormat},
    id3,
    DSD_SAMPLE_RATE,
};

/// One of the two audio areas an SACD may carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum Area {
    #[strum(to_string = "stereo")]
    Stereo,
    #[strum(to_string = "multichannel")]
    Multichannel,
}

impl Area {
    /// The virtual directory name of this area.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Area::Stereo => "Stereo",
            Area::Multichannel => "Multi-channel",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Area> {
        match s {
            "stereo" => Some(Area::Stereo),
            "multichannel" => Some(Area::Multichannel),
            _ => None,
        }
    }
}

bitflags! {
    /// Caller-requested area visibility.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct AreaVisibility: u8 {
        const STEREO = 0b01;
        const MULTICHANNEL = 0b10;
    }
}

impl Default for AreaVisibility {
    fn default() -> Self {
        AreaVisibility::all()
    }
}

impl AreaVisibility {
    fn contains_area(&self, area: Area) -> bool {
        match area {
            Area::Stereo => self.contains(AreaVisibility::STEREO),
            Area::Multichannel => self.contains(AreaVisibility::MULTICHANNEL),
        }
    }
}

/// One track of one area, as the VFS sees it.
#[derive(Clone, Debug)]
pub struct TrackEntry {
    /// One-based track number.
    pub number: u8,
    /// First audio frame, 0-based within the area.
    pub start_frame: u32,
    pub frame_count: u32,
    pub title: String,
    pub performer: String,
    /// ID3v2 bytes synthesized from the disc text; what the metadata region serves
    /// when the tag overlay has no entry for this track.
    pub embedded_id3: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct AreaIndex {
    pub area: Area,
    pub channel_count: u8,
    pub sample_rate: u32,
    pub frame_format: FrameFormat,
    pub total_frames: u32,
    tracks: Vec<TrackEntry>,
}

impl AreaIndex {
    /// Look up a track by its one-based number.
    pub fn track(&self, number: u8) -> Option<&TrackEntry> {
        if number == 0 {
            return None;
        }
        self.tracks.get(number as usize - 1)
    }

    /// Tracks in track-number order.
    pub fn tracks(&self) -> &[TrackEntry] {
        &self.tracks
    }
}

/// The per-ISO index: everything the VFS needs to list and locate tracks, built once
/// from the disc TOC at mount time.
#[derive(Clone, Debug)]
pub struct IsoIndex {
    pub album: AlbumInfo,
    areas: Vec<AreaIndex>,
    visibility: AreaVisibility,
}

impl IsoIndex {
    pub fn build(toc: &DiscToc, visibility: AreaVisibility) -> IsoIndex {
        let areas = toc
            .areas
            .iter()
            .map(|disc_area| {
                let tracks = disc_area
                    .tracks
                    .iter()
                    .map(|t| TrackEntry {
                        number: t.number,
                        start_frame: t.start_frame,
                        frame_count: t.frame_count,
                        title: t.title.clone(),
                        performer: t.performer.clone(),
                        embedded_id3: id3::synthesize_tag(
                            &toc.album.title,
                            &t.performer,
                            &t.title,
                            t.number,
                            disc_area.tracks.len() as u8,
                        ),
                    })
                    .collect();
                AreaIndex {
                    area: disc_area.area,
                    channel_count: disc_area.channel_count,
                    sample_rate: DSD_SAMPLE_RATE,
                    frame_format: disc_area.frame_format,
                    total_frames: disc_area.total_frames,
                    tracks,
                }
            })
            .collect();

        IsoIndex {
            album: toc.album.clone(),
            areas,
            visibility,
        }
    }

    pub fn area(&self, area: Area) -> Option<&AreaIndex> {
        self.areas.iter().find(|a| a.area == area)
    }

    /// Look up a track by `(area, one-based number)`.
    pub fn track(&self, area: Area, number: u8) -> Option<&TrackEntry> {
        self.area(area).and_then(|a| a.track(number))
    }

    /// The canonical visibility policy: an area is shown iff it exists and either its
    /// visibility flag is set or it is the only area the disc carries.
    pub fn should_show_area(&self, area: Area) -> bool {
        if self.area(area).is_none() {
            return false;
        }
        self.visibility.contains_area(area) || self.areas.len() == 1
    }

    /// Areas that pass the visibility policy, in enumeration order (stereo first).
    pub fn visible_areas(&self) -> Vec<Area> {
        Area::iter().filter(|a| self.should_show_area(*a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::{DiscArea, DiscTrack};

    fn toc_with_areas(areas: &[Area]) -> DiscToc {
        DiscToc {
            album: AlbumInfo {
                title: "Album".to_string(),
                artist: "Artist".to_string(),
                catalog_number: "CAT-1".to_string(),
            },
            areas: areas
                .iter()
                .map(|&area| DiscArea {
                    area,
                    channel_count: if area == Area::Stereo { 2 } else { 6 },
                    frame_format: FrameFormat::Dsd,
                    total_frames: 750,
                    tracks: vec![DiscTrack {
                        number: 1,
                        start_frame: 0,
                        frame_count: 750,
                        title: "One".to_string(),
                        performer: "Artist".to_string(),
                    }],
                    track_area_start: 1000,
                    dst_frame_offsets: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn hidden_area_is_not_shown() {
        let toc = toc_with_areas(&[Area::Stereo, Area::Multichannel]);
        let index = IsoIndex::build(&toc, AreaVisibility::STEREO);
        assert!(index.should_show_area(Area::Stereo));
        assert!(!index.should_show_area(Area::Multichannel));
        assert_eq!(index.visible_areas(), vec![Area::Stereo]);
    }

    #[test]
    fn only_area_is_shown_despite_hidden_flag() {
        let toc = toc_with_areas(&[Area::Multichannel]);
        let index = IsoIndex::build(&toc, AreaVisibility::STEREO);
        assert!(index.should_show_area(Area::Multichannel));
    }

    #[test]
    fn missing_area_is_never_shown() {
        let toc = toc_with_areas(&[Area::Stereo]);
        let index = IsoIndex::build(&toc, AreaVisibility::all());
        assert!(!index.should_show_area(Area::Multichannel));
    }

    #[test]
    fn track_lookup_is_one_based() {
        let toc = toc_with_areas(&[Area::Stereo]);
        let index = IsoIndex::build(&toc, AreaVisibility::all());
        assert!(index.track(Area::Stereo, 0).is_none());
        assert_eq!(index.track(Area::Stereo, 1).unwrap().title, "One");
        assert!(index.track(Area::Stereo, 2).is_none());
    }

    #[test]
    fn embedded_tags_are_synthesized() {
        let toc = toc_with_areas(&[Area::Stereo]);
        let index = IsoIndex::build(&toc, AreaVisibility::all());
        let tag = &index.track(Area::Stereo, 1).unwrap().embedded_id3;
        assert_eq!(&tag[..3], b"ID3");
    }
}
