//! Segment inode (INODE) pages.
//!
//! A file segment (FSEG) is backed by one 192-byte inode entry. INODE
//! pages hold 85 such entries after a 12-byte list node that chains the
//! page into the FSP header's SEG_INODES_FULL / SEG_INODES_FREE lists.
//!
//! Each entry records the segment ID (0 means the slot is unallocated),
//! the three extent lists (FREE, NOT_FULL, FULL), a magic number that must
//! equal 97937874 for allocated slots, and a 32-slot fragment array of
//! individually allocated page numbers. The fragment array is exposed raw:
//! `UINT32_MAX` holes are preserved at their positions.

use serde::Serialize;

use crate::innodb::cursor::Cursor;
use crate::innodb::list::{ListBase, ListNode};
use crate::innodb::page::{page_number_or_none, Page, FIL_PAGE_DATA, UINT32_UNDEFINED};
use crate::IbdError;

/// Size of one inode entry on disk.
pub const INODE_ENTRY_SIZE: usize = 192;
/// Inode entries per INODE page.
pub const INODES_PER_PAGE: usize = 85;
/// Magic number stamped into every allocated inode entry.
pub const INODE_MAGIC: u32 = 97_937_874;
/// Slots in the fragment page array.
pub const FRAG_ARRAY_SIZE: usize = 32;
/// Offset of the first inode entry (after the page list node).
pub const INODE_ARRAY_OFFSET: usize = FIL_PAGE_DATA + 12;

/// One segment inode.
#[derive(Debug, Clone, Serialize)]
pub struct InodeEntry {
    /// Position of this entry within its page.
    pub position: usize,
    /// Byte offset of this entry within its page.
    pub offset: u16,
    /// Owning segment ID; 0 for an unused slot.
    pub fseg_id: u64,
    /// Pages used from the NOT_FULL extents.
    pub not_full_n_used: u32,
    /// Extents with every page free.
    pub free: ListBase,
    /// Extents partially used by the segment.
    pub not_full: ListBase,
    /// Extents with no free page.
    pub full: ListBase,
    /// Magic number; 97937874 on allocated slots.
    pub magic: u32,
    /// The raw fragment page array: 32 slots, `UINT32_MAX` where empty.
    pub fragment_pages: Vec<u32>,
}

impl InodeEntry {
    /// Decode one entry at the cursor position.
    pub fn read(c: &mut Cursor<'_>, position: usize, offset: u16) -> Result<Self, IbdError> {
        c.name("inode", |c| {
            let fseg_id = c.read_u64()?;
            let not_full_n_used = c.read_u32()?;
            let free = ListBase::read(c)?;
            let not_full = ListBase::read(c)?;
            let full = ListBase::read(c)?;
            let magic = c.read_u32()?;
            let mut fragment_pages = Vec::with_capacity(FRAG_ARRAY_SIZE);
            for _ in 0..FRAG_ARRAY_SIZE {
                fragment_pages.push(c.read_u32()?);
            }
            Ok(InodeEntry {
                position,
                offset,
                fseg_id,
                not_full_n_used,
                free,
                not_full,
                full,
                magic,
                fragment_pages,
            })
        })
    }

    /// True when this slot backs a live segment.
    pub fn allocated(&self) -> bool {
        self.fseg_id != 0
    }

    /// Allocated inodes must carry the magic number; anything else is
    /// corruption.
    pub fn magic_valid(&self) -> bool {
        !self.allocated() || self.magic == INODE_MAGIC
    }

    /// The fragment pages actually in use, holes skipped.
    pub fn used_fragment_pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.fragment_pages
            .iter()
            .copied()
            .filter_map(page_number_or_none)
    }

    /// Total pages assigned to the segment (fragment pages plus the pages
    /// of every extent on the three lists).
    pub fn extent_count(&self) -> u32 {
        self.free.length + self.not_full.length + self.full.length
    }
}

/// Specialized view over an INODE page.
pub struct InodePage<'a> {
    page: &'a Page,
}

impl<'a> InodePage<'a> {
    pub fn new(page: &'a Page) -> Self {
        InodePage { page }
    }

    /// The list node chaining this page into the FSP inode lists.
    pub fn list_node(&self) -> Result<ListNode, IbdError> {
        ListNode::read(&mut self.page.cursor(FIL_PAGE_DATA))
    }

    /// Decode the inode entry at `position` (0..85).
    pub fn inode_at(&self, position: usize) -> Result<InodeEntry, IbdError> {
        if position >= INODES_PER_PAGE {
            return Err(IbdError::Argument(format!(
                "inode position {} out of range ({} per page)",
                position, INODES_PER_PAGE
            )));
        }
        let offset = INODE_ARRAY_OFFSET + position * INODE_ENTRY_SIZE;
        let mut c = self.page.cursor(offset);
        InodeEntry::read(&mut c, position, offset as u16)
    }

    /// Iterate every inode slot, allocated or not.
    pub fn each_inode(&self) -> impl Iterator<Item = Result<InodeEntry, IbdError>> + '_ {
        (0..INODES_PER_PAGE).map(move |i| self.inode_at(i))
    }

    /// Iterate only the allocated inodes.
    pub fn each_allocated_inode(
        &self,
    ) -> impl Iterator<Item = Result<InodeEntry, IbdError>> + '_ {
        self.each_inode().filter(|entry| {
            entry.as_ref().map(InodeEntry::allocated).unwrap_or(true)
        })
    }
}

/// Byte offset of inode slot `position` within an INODE page. Used when a
/// FSEG header points directly at an inode.
pub fn inode_offset(position: usize) -> usize {
    INODE_ARRAY_OFFSET + position * INODE_ENTRY_SIZE
}

/// True when a fragment array slot is a hole.
pub fn is_fragment_hole(slot: u32) -> bool {
    slot == UINT32_UNDEFINED
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    const PS: usize = 16384;

    fn build_inode_page() -> Page {
        let mut buf = vec![0u8; PS];
        BigEndian::write_u32(&mut buf[4..], 2);
        BigEndian::write_u16(&mut buf[24..], 3); // INODE

        // Page list node: prev absent, next absent.
        BigEndian::write_u32(&mut buf[FIL_PAGE_DATA..], 0xFFFF_FFFF);
        BigEndian::write_u32(&mut buf[FIL_PAGE_DATA + 6..], 0xFFFF_FFFF);

        // Inode 0: fseg 1 with two fragment pages and a hole between them.
        let base = INODE_ARRAY_OFFSET;
        BigEndian::write_u64(&mut buf[base..], 1);
        BigEndian::write_u32(&mut buf[base + 8..], 3); // not_full_n_used
        for list in 0..3 {
            let list_base = base + 12 + list * 16;
            BigEndian::write_u32(&mut buf[list_base + 4..], 0xFFFF_FFFF);
            BigEndian::write_u32(&mut buf[list_base + 10..], 0xFFFF_FFFF);
        }
        BigEndian::write_u32(&mut buf[base + 60..], INODE_MAGIC);
        let frag = base + 64;
        BigEndian::write_u32(&mut buf[frag..], 3);
        BigEndian::write_u32(&mut buf[frag + 4..], 0xFFFF_FFFF);
        BigEndian::write_u32(&mut buf[frag + 8..], 5);
        for slot in 3..FRAG_ARRAY_SIZE {
            BigEndian::write_u32(&mut buf[frag + slot * 4..], 0xFFFF_FFFF);
        }

        Page::new(buf, PS, 2).unwrap()
    }

    #[test]
    fn test_inode_entry_fields() {
        let page = build_inode_page();
        let inodes = InodePage::new(&page);

        let node = inodes.list_node().unwrap();
        assert_eq!(node.prev, None);
        assert_eq!(node.next, None);

        let entry = inodes.inode_at(0).unwrap();
        assert_eq!(entry.fseg_id, 1);
        assert!(entry.allocated());
        assert!(entry.magic_valid());
        assert_eq!(entry.not_full_n_used, 3);
        assert_eq!(entry.offset as usize, inode_offset(0));

        // Raw fragment array keeps the hole at slot 1.
        assert_eq!(entry.fragment_pages[0], 3);
        assert!(is_fragment_hole(entry.fragment_pages[1]));
        assert_eq!(entry.fragment_pages[2], 5);
        assert_eq!(entry.fragment_pages.len(), FRAG_ARRAY_SIZE);
        assert_eq!(entry.used_fragment_pages().collect::<Vec<_>>(), vec![3, 5]);
    }

    #[test]
    fn test_unallocated_slots() {
        let page = build_inode_page();
        let inodes = InodePage::new(&page);

        let entry = inodes.inode_at(1).unwrap();
        assert!(!entry.allocated());
        assert!(entry.magic_valid()); // magic only binds allocated slots

        let allocated: Vec<_> = inodes
            .each_allocated_inode()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(allocated.len(), 1);
        assert_eq!(allocated[0].fseg_id, 1);
    }

    #[test]
    fn test_position_bounds() {
        let page = build_inode_page();
        let inodes = InodePage::new(&page);
        assert!(inodes.inode_at(85).is_err());
        assert_eq!(inodes.each_inode().count(), INODES_PER_PAGE);
    }
}
