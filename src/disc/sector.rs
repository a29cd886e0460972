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

    src/disc/sector.rs

    Uniform logical-sector access over the physical sector layouts found in
    SACD rips. The layout is probed once at open by looking for the Master
    TOC signature and is constant for the lifetime of the reader.
*/

use crate::{io::ReadSeek, SacdFsError, MASTER_TOC_LSN, SACD_LSN_SIZE};
use std::io::SeekFrom;

pub(crate) const MASTER_TOC_SIGNATURE: &[u8; 8] = b"SACDMTOC";

/// Physical sector layouts of SACD disc images.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectorLayout {
    /// Plain 2048-byte logical sectors.
    Iso2048,
    /// 2048 data bytes followed by a 6-byte per-sector trailer.
    Trailer2054,
    /// A 12-byte per-sector header, 2048 data bytes, and a 4-byte trailer.
    Header2064,
}

const LAYOUTS: [SectorLayout; 3] = [
    SectorLayout::Iso2048,
    SectorLayout::Trailer2054,
    SectorLayout::Header2064,
];

impl SectorLayout {
    /// Size of one physical sector, in bytes.
    pub fn physical_size(&self) -> usize {
        match self {
            SectorLayout::Iso2048 => 2048,
            SectorLayout::Trailer2054 => 2054,
            SectorLayout::Header2064 => 2064,
        }
    }

    /// Offset of the 2048 data bytes within a physical sector.
    pub fn data_offset(&self) -> usize {
        match self {
            SectorLayout::Iso2048 | SectorLayout::Trailer2054 => 0,
            SectorLayout::Header2064 => 12,
        }
    }
}

pub(crate) struct SectorReader<RS> {
    io: RS,
    layout: SectorLayout,
}

impl<RS: ReadSeek> SectorReader<RS> {
    /// Probe `io` against each candidate layout and return a reader fixed to the
    /// matching one. Fails with [`SacdFsError::NotSacd`] when no layout places the
    /// Master TOC signature at logical sector 510.
    pub fn open(mut io: RS) -> Result<Self, SacdFsError> {
        for layout in LAYOUTS {
            if Self::probe_layout(&mut io, layout)? {
                log::debug!("SectorReader::open(): detected sector layout {:?}", layout);
                return Ok(Self { io, layout });
            }
        }
        Err(SacdFsError::NotSacd)
    }

    fn probe_layout(io: &mut RS, layout: SectorLayout) -> Result<bool, SacdFsError> {
        let offset = MASTER_TOC_LSN as u64 * layout.physical_size() as u64 + layout.data_offset() as u64;
        if io.seek(SeekFrom::Start(offset)).is_err() {
            return Ok(false);
        }
        let mut signature = [0u8; 8];
        match io.read_exact(&mut signature) {
            Ok(()) => Ok(&signature == MASTER_TOC_SIGNATURE),
            // A source shorter than the probe offset simply doesn't match this layout.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[allow(dead_code)]
    pub fn layout(&self) -> SectorLayout {
        self.layout
    }

    /// Read `count` logical sectors starting at `lsn` into `buf`. The buffer must hold
    /// exactly `count * 2048` bytes.
    pub fn read_sectors(&mut self, lsn: u32, count: u32, buf: &mut [u8]) -> Result<(), SacdFsError> {
        debug_assert_eq!(buf.len(), count as usize * SACD_LSN_SIZE);

        if self.layout == SectorLayout::Iso2048 {
            // Logical and physical layouts coincide; one contiguous read.
            self.io.seek(SeekFrom::Start(lsn as u64 * SACD_LSN_SIZE as u64))?;
            self.io.read_exact(buf)?;
            return Ok(());
        }

        let physical = self.layout.physical_size() as u64;
        let data_offset = self.layout.data_offset() as u64;
        for (i, chunk) in buf.chunks_exact_mut(SACD_LSN_SIZE).enumerate() {
            let offset = (lsn as u64 + i as u64) * physical + data_offset;
            self.io.seek(SeekFrom::Start(offset))?;
            self.io.read_exact(chunk)?;
        }
        Ok(())
    }

    /// Read an arbitrary byte range of the logical sector space.
    pub fn read_bytes(&mut self, byte_offset: u64, buf: &mut [u8]) -> Result<(), SacdFsError> {
        if self.layout == SectorLayout::Iso2048 {
            self.io.seek(SeekFrom::Start(byte_offset))?;
            self.io.read_exact(buf)?;
            return Ok(());
        }

        // Sparse layouts: pull whole sectors and copy the spanned slice out.
        let first_lsn = (byte_offset / SACD_LSN_SIZE as u64) as u32;
        let intra = (byte_offset % SACD_LSN_SIZE as u64) as usize;
        let sector_ct = (intra + buf.len()).div_ceil(SACD_LSN_SIZE) as u32;

        let mut sectors = vec![0u8; sector_ct as usize * SACD_LSN_SIZE];
        self.read_sectors(first_lsn, sector_ct, &mut sectors)?;
        buf.copy_from_slice(&sectors[intra..intra + buf.len()]);
        Ok(())
    }
}
