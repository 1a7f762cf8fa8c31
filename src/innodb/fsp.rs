//! File-space header and extent descriptor (FSP_HDR / XDES) pages.
//!
//! Page 0 of every tablespace is an FSP_HDR page: the file-space header
//! (space ID, size, free limit, flags, and the list bases anchoring extent
//! and inode management) followed by an array of extent descriptors. Every
//! `pages_per_bookkeeping_page`-th page after it (16384 for the default
//! page size) is an XDES page with the identical layout but a zeroed
//! header area — only the descriptor array is meaningful there.
//!
//! Each [`XdesEntry`] is 40 bytes and describes one 64-page extent: the
//! owning segment, the list linkage, an allocation state, and a bitmap of
//! 2 bits per page (free, clean). Extent `n` covers pages
//! `[64n, 64n + 63]`.

use serde::Serialize;

use crate::innodb::list::{ListBase, ListNode};
use crate::innodb::page::{Page, FIL_PAGE_DATA};
use crate::IbdError;

/// Pages per extent.
pub const PAGES_PER_EXTENT: u32 = 64;
/// Size of one XDES entry on disk.
pub const XDES_ENTRY_SIZE: usize = 40;
/// Size of the file-space header.
pub const FSP_HEADER_SIZE: usize = 112;
/// Offset of the XDES entry array within an FSP_HDR/XDES page.
pub const XDES_ARRAY_OFFSET: usize = FIL_PAGE_DATA + FSP_HEADER_SIZE;

/// Allocation state of an extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum XdesState {
    /// Entry unused (state field 0).
    NotInitialized,
    /// On the space's FREE list.
    Free,
    /// On the FREE_FRAG list (partially used for fragment pages).
    FreeFrag,
    /// On the FULL_FRAG list (all fragment pages used).
    FullFrag,
    /// Allocated to a segment.
    Fseg,
    /// Any other state value.
    Unknown(u32),
}

impl XdesState {
    fn from_u32(value: u32) -> Self {
        match value {
            0 => XdesState::NotInitialized,
            1 => XdesState::Free,
            2 => XdesState::FreeFrag,
            3 => XdesState::FullFrag,
            4 => XdesState::Fseg,
            v => XdesState::Unknown(v),
        }
    }
}

/// The file-space header stored at byte 38 of page 0.
#[derive(Debug, Clone, Serialize)]
pub struct FspHeader {
    /// Space ID.
    pub space_id: u32,
    /// Size of the space in pages (high-water mark).
    pub size: u32,
    /// Lowest page number not yet initialized.
    pub free_limit: u32,
    /// Space flags (page size, format).
    pub flags: u32,
    /// Pages used from the FREE_FRAG extents.
    pub frag_n_used: u32,
    /// Extents with every page free.
    pub free: ListBase,
    /// Extents donating individual fragment pages, not yet full.
    pub free_frag: ListBase,
    /// Fragment extents with no free page left.
    pub full_frag: ListBase,
    /// Next unused segment ID.
    pub first_unused_seg: u64,
    /// Inode pages with no free inode slot.
    pub full_inodes: ListBase,
    /// Inode pages with at least one free slot.
    pub free_inodes: ListBase,
}

impl FspHeader {
    /// Parse the header from a full FSP_HDR page buffer.
    pub fn parse(page: &Page) -> Result<Self, IbdError> {
        let mut c = page.cursor(FIL_PAGE_DATA);
        c.name("fsp_header", |c| {
            let space_id = c.read_u32()?;
            c.skip(4); // unused
            Ok(FspHeader {
                space_id,
                size: c.read_u32()?,
                free_limit: c.read_u32()?,
                flags: c.read_u32()?,
                frag_n_used: c.read_u32()?,
                free: ListBase::read(c)?,
                free_frag: ListBase::read(c)?,
                full_frag: ListBase::read(c)?,
                first_unused_seg: c.read_u64()?,
                full_inodes: ListBase::read(c)?,
                free_inodes: ListBase::read(c)?,
            })
        })
    }

    /// Page size encoded in the flags, or the 16 KiB default when the
    /// ssize field is zero.
    pub fn page_size(&self) -> u32 {
        let ssize = (self.flags >> 6) & 0x0F;
        if ssize == 0 {
            16384
        } else {
            // ssize encodes 1 << (ssize + 9): 3 => 4K ... 5 => 16K.
            1 << (ssize + 9)
        }
    }
}

/// One extent descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct XdesEntry {
    /// Index of this entry within its bookkeeping page.
    pub position: usize,
    /// First page of the described extent.
    pub start_page: u32,
    /// Owning segment ID; 0 when not allocated to a segment.
    pub fseg_id: u64,
    /// Linkage on whichever XDES list holds this extent.
    pub list_node: ListNode,
    /// Allocation state.
    pub state: XdesState,
    /// 2 bits per page: free flag, clean flag.
    bitmap: [u8; 16],
}

impl XdesEntry {
    /// Last page of the described extent.
    pub fn end_page(&self) -> u32 {
        self.start_page + PAGES_PER_EXTENT - 1
    }

    /// True when the extent belongs to a segment.
    pub fn allocated_to_fseg(&self) -> bool {
        self.fseg_id != 0 && self.state == XdesState::Fseg
    }

    /// Free/clean bits for a page of this extent (0-based within the extent).
    pub fn page_status(&self, index: u32) -> Result<PageStatus, IbdError> {
        if index >= PAGES_PER_EXTENT {
            return Err(IbdError::Argument(format!(
                "page index {} outside the 64-page extent",
                index
            )));
        }
        // Pairs are stored LSB-first within each byte; the free flag is
        // bit 0 of the pair and the clean flag bit 1.
        let byte = self.bitmap[index as usize / 4];
        let shift = (index as usize % 4) * 2;
        let pair = (byte >> shift) & 0x03;
        Ok(PageStatus {
            free: pair & 0x01 != 0,
            clean: pair & 0x02 != 0,
        })
    }

    /// Count of free pages in the extent.
    pub fn free_pages(&self) -> u32 {
        (0..PAGES_PER_EXTENT)
            .filter(|&i| self.page_status(i).map(|s| s.free).unwrap_or(false))
            .count() as u32
    }
}

/// The two bitmap bits tracked for each page of an extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageStatus {
    pub free: bool,
    pub clean: bool,
}

/// Specialized view over an FSP_HDR or XDES page.
pub struct FspPage<'a> {
    page: &'a Page,
}

impl<'a> FspPage<'a> {
    pub fn new(page: &'a Page) -> Self {
        FspPage { page }
    }

    /// The underlying page.
    pub fn page(&self) -> &'a Page {
        self.page
    }

    /// The file-space header. Meaningful only on page 0; XDES pages carry
    /// zeroes here.
    pub fn fsp_header(&self) -> Result<FspHeader, IbdError> {
        FspHeader::parse(self.page)
    }

    /// Number of XDES entries this page can hold.
    pub fn entries_per_page(&self) -> usize {
        self.page.size() / PAGES_PER_EXTENT as usize
    }

    /// Decode the XDES entry at `position`.
    pub fn xdes_entry(&self, position: usize) -> Result<XdesEntry, IbdError> {
        if position >= self.entries_per_page() {
            return Err(IbdError::Argument(format!(
                "XDES position {} out of range ({} per page)",
                position,
                self.entries_per_page()
            )));
        }
        let mut c = self
            .page
            .cursor(XDES_ARRAY_OFFSET + position * XDES_ENTRY_SIZE);
        c.name("xdes_entry", |c| {
            let fseg_id = c.read_u64()?;
            let list_node = ListNode::read(c)?;
            let state = XdesState::from_u32(c.read_u32()?);
            let mut bitmap = [0u8; 16];
            bitmap.copy_from_slice(c.read_bytes(16)?);
            Ok(XdesEntry {
                position,
                start_page: self.page.number() + position as u32 * PAGES_PER_EXTENT,
                fseg_id,
                list_node,
                state,
                bitmap,
            })
        })
    }

    /// Iterate all initialized XDES entries on this page.
    pub fn each_xdes_entry(&self) -> impl Iterator<Item = Result<XdesEntry, IbdError>> + '_ {
        (0..self.entries_per_page()).map(move |i| self.xdes_entry(i))
    }
}
