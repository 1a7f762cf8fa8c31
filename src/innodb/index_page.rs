//! INDEX page internal structure.
//!
//! INDEX pages are the B+Tree nodes. Each carries a 36-byte page header at
//! byte 38 ([`IndexHeader`]), two 10-byte FSEG pointers (meaningful only on
//! the root), the infimum and supremum pseudo-records, user records growing
//! upward from the system records, and the page directory growing downward
//! from the page end as an array of 2-byte record offsets.
//!
//! Each directory slot "owns" 4-8 records: the slot points at the last
//! record of its group and that record's `n_owned` holds the group size.
//! Slot 0 owns infimum alone; the last slot owns supremum.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::innodb::page::{Page, FIL_PAGE_DATA, FIL_TRAILER_SIZE};
use crate::IbdError;

/// INDEX page header size (without the FSEG pointers).
pub const INDEX_HEADER_SIZE: usize = 36;
/// Size of one FSEG header pointer.
pub const FSEG_HEADER_SIZE: usize = 10;
/// Start of the system records: FIL header + page header + 2 FSEG headers.
pub const SYSTEM_RECORDS_OFFSET: usize = FIL_PAGE_DATA + INDEX_HEADER_SIZE + 2 * FSEG_HEADER_SIZE;
/// Extra (header) bytes preceding a compact record origin.
pub const COMPACT_EXTRA_BYTES: usize = 5;
/// Extra (header) bytes preceding a redundant record origin.
pub const REDUNDANT_EXTRA_BYTES: usize = 6;
/// Infimum record origin, compact format.
pub const COMPACT_INFIMUM: usize = SYSTEM_RECORDS_OFFSET + COMPACT_EXTRA_BYTES; // 99
/// Supremum record origin, compact format.
pub const COMPACT_SUPREMUM: usize = SYSTEM_RECORDS_OFFSET + 2 * COMPACT_EXTRA_BYTES + 8; // 112
/// Infimum record origin, redundant format.
pub const REDUNDANT_INFIMUM: usize = SYSTEM_RECORDS_OFFSET + 1 + REDUNDANT_EXTRA_BYTES; // 101
/// Supremum record origin, redundant format.
pub const REDUNDANT_SUPREMUM: usize = SYSTEM_RECORDS_OFFSET + 2 + 2 * REDUNDANT_EXTRA_BYTES + 8; // 116
/// Size of one page directory slot.
pub const DIRECTORY_SLOT_SIZE: usize = 2;

const PAGE_N_DIR_SLOTS: usize = 0;
const PAGE_HEAP_TOP: usize = 2;
const PAGE_N_HEAP: usize = 4;
const PAGE_FREE: usize = 6;
const PAGE_GARBAGE: usize = 8;
const PAGE_LAST_INSERT: usize = 10;
const PAGE_DIRECTION: usize = 12;
const PAGE_N_DIRECTION: usize = 14;
const PAGE_N_RECS: usize = 16;
const PAGE_MAX_TRX_ID: usize = 18;
const PAGE_LEVEL: usize = 26;
const PAGE_INDEX_ID: usize = 28;

/// The on-disk row format of an INDEX page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowFormat {
    /// New-style records: 5-byte header, NULL bitmap, variable-length array.
    Compact,
    /// Old-style records: 6-byte header, per-field end-offset array.
    Redundant,
}

/// Last-insert direction values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageDirection {
    Left,
    Right,
    SameRecord,
    SamePage,
    NoDirection,
    Unknown(u16),
}

impl PageDirection {
    fn from_u16(value: u16) -> Self {
        match value {
            1 => PageDirection::Left,
            2 => PageDirection::Right,
            3 => PageDirection::SameRecord,
            4 => PageDirection::SamePage,
            5 => PageDirection::NoDirection,
            v => PageDirection::Unknown(v),
        }
    }
}

/// Parsed INDEX page header.
#[derive(Debug, Clone, Serialize)]
pub struct IndexHeader {
    /// Number of page directory slots.
    pub n_dir_slots: u16,
    /// Byte offset of the record heap top.
    pub heap_top: u16,
    /// Heap record count with the format flag in bit 15.
    n_heap_raw: u16,
    /// Head of the free (garbage) record list, 0 if none.
    pub garbage_offset: u16,
    /// Bytes held in deleted records.
    pub garbage_size: u16,
    /// Offset of the last inserted record, 0 after reorganize.
    pub last_insert_offset: u16,
    /// Direction of the most recent inserts.
    pub direction: PageDirection,
    /// Consecutive inserts in `direction`.
    pub n_direction: u16,
    /// Number of user records on the page.
    pub n_recs: u16,
    /// Highest transaction ID that modified this page (secondary indexes).
    pub max_trx_id: u64,
    /// Level in the B+Tree; 0 is the leaf level.
    pub level: u16,
    /// ID of the index this page belongs to.
    pub index_id: u64,
}

impl IndexHeader {
    /// Parse from a full page buffer.
    pub fn parse(data: &[u8]) -> Result<Self, IbdError> {
        if data.len() < FIL_PAGE_DATA + INDEX_HEADER_SIZE {
            return Err(IbdError::InvalidBuffer(format!(
                "INDEX header needs {} bytes, buffer has {}",
                FIL_PAGE_DATA + INDEX_HEADER_SIZE,
                data.len()
            )));
        }
        let d = &data[FIL_PAGE_DATA..];
        Ok(IndexHeader {
            n_dir_slots: BigEndian::read_u16(&d[PAGE_N_DIR_SLOTS..]),
            heap_top: BigEndian::read_u16(&d[PAGE_HEAP_TOP..]),
            n_heap_raw: BigEndian::read_u16(&d[PAGE_N_HEAP..]),
            garbage_offset: BigEndian::read_u16(&d[PAGE_FREE..]),
            garbage_size: BigEndian::read_u16(&d[PAGE_GARBAGE..]),
            last_insert_offset: BigEndian::read_u16(&d[PAGE_LAST_INSERT..]),
            direction: PageDirection::from_u16(BigEndian::read_u16(&d[PAGE_DIRECTION..])),
            n_direction: BigEndian::read_u16(&d[PAGE_N_DIRECTION..]),
            n_recs: BigEndian::read_u16(&d[PAGE_N_RECS..]),
            max_trx_id: BigEndian::read_u64(&d[PAGE_MAX_TRX_ID..]),
            level: BigEndian::read_u16(&d[PAGE_LEVEL..]),
            index_id: BigEndian::read_u64(&d[PAGE_INDEX_ID..]),
        })
    }

    /// Records in the heap, including infimum and supremum.
    pub fn n_heap(&self) -> u16 {
        self.n_heap_raw & 0x7FFF
    }

    /// The row format flag (bit 15 of n_heap).
    pub fn format(&self) -> RowFormat {
        if self.n_heap_raw & 0x8000 != 0 {
            RowFormat::Compact
        } else {
            RowFormat::Redundant
        }
    }

    /// True for leaf-level pages.
    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }
}

/// An FSEG header pointer: the location of a segment inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FsegHeader {
    /// Space holding the inode page.
    pub space_id: u32,
    /// Page number of the inode page.
    pub page_number: u32,
    /// Byte offset of the inode entry within that page.
    pub offset: u16,
}

impl FsegHeader {
    /// Parse from 10 bytes.
    pub fn parse(data: &[u8]) -> Result<Self, IbdError> {
        if data.len() < FSEG_HEADER_SIZE {
            return Err(IbdError::InvalidBuffer(format!(
                "FSEG header needs {} bytes, buffer has {}",
                FSEG_HEADER_SIZE,
                data.len()
            )));
        }
        Ok(FsegHeader {
            space_id: BigEndian::read_u32(&data[0..]),
            page_number: BigEndian::read_u32(&data[4..]),
            offset: BigEndian::read_u16(&data[8..]),
        })
    }

    /// An unset FSEG header (non-root pages) is all zeroes.
    pub fn is_unset(&self) -> bool {
        self.space_id == 0 && self.page_number == 0 && self.offset == 0
    }
}

/// Specialized view over an INDEX page.
pub struct IndexPage<'a> {
    page: &'a Page,
}

impl<'a> IndexPage<'a> {
    pub fn new(page: &'a Page) -> Self {
        IndexPage { page }
    }

    /// The underlying page.
    pub fn page(&self) -> &'a Page {
        self.page
    }

    /// The parsed page header.
    pub fn header(&self) -> Result<IndexHeader, IbdError> {
        IndexHeader::parse(self.page.data())
    }

    /// The leaf-segment FSEG pointer (valid only on the root page).
    pub fn leaf_fseg(&self) -> Result<FsegHeader, IbdError> {
        let base = FIL_PAGE_DATA + INDEX_HEADER_SIZE;
        FsegHeader::parse(&self.page.data()[base..])
    }

    /// The internal-segment FSEG pointer (valid only on the root page).
    pub fn internal_fseg(&self) -> Result<FsegHeader, IbdError> {
        let base = FIL_PAGE_DATA + INDEX_HEADER_SIZE + FSEG_HEADER_SIZE;
        FsegHeader::parse(&self.page.data()[base..])
    }

    /// Origin offset of the infimum pseudo-record for this page's format.
    pub fn infimum_origin(&self) -> Result<usize, IbdError> {
        Ok(match self.header()?.format() {
            RowFormat::Compact => COMPACT_INFIMUM,
            RowFormat::Redundant => REDUNDANT_INFIMUM,
        })
    }

    /// Origin offset of the supremum pseudo-record for this page's format.
    pub fn supremum_origin(&self) -> Result<usize, IbdError> {
        Ok(match self.header()?.format() {
            RowFormat::Compact => COMPACT_SUPREMUM,
            RowFormat::Redundant => REDUNDANT_SUPREMUM,
        })
    }

    /// The ASCII text stored in the infimum record ("infimum\0").
    pub fn infimum_text(&self) -> Result<&'a [u8], IbdError> {
        let origin = self.infimum_origin()?;
        Ok(&self.page.data()[origin..origin + 8])
    }

    /// The ASCII text stored in the supremum record ("supremum").
    pub fn supremum_text(&self) -> Result<&'a [u8], IbdError> {
        let origin = self.supremum_origin()?;
        Ok(&self.page.data()[origin..origin + 8])
    }

    /// Record offset held in directory slot `n`. Slot 0 points at infimum,
    /// the last slot at supremum.
    pub fn directory_slot(&self, n: u16) -> Result<u16, IbdError> {
        let header = self.header()?;
        if n >= header.n_dir_slots {
            return Err(IbdError::Argument(format!(
                "directory slot {} out of range ({} slots)",
                n, header.n_dir_slots
            )));
        }
        let base =
            self.page.size() - FIL_TRAILER_SIZE - (n as usize + 1) * DIRECTORY_SLOT_SIZE;
        Ok(BigEndian::read_u16(&self.page.data()[base..]))
    }

    /// All directory slots, in slot order.
    pub fn directory(&self) -> Result<Vec<u16>, IbdError> {
        let header = self.header()?;
        (0..header.n_dir_slots).map(|n| self.directory_slot(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS: usize = 16384;

    fn build_index_page() -> Page {
        let mut buf = vec![0u8; PS];
        BigEndian::write_u32(&mut buf[4..], 3);
        BigEndian::write_u16(&mut buf[24..], 17855);
        let d = FIL_PAGE_DATA;
        BigEndian::write_u16(&mut buf[d + PAGE_N_DIR_SLOTS..], 2);
        BigEndian::write_u16(&mut buf[d + PAGE_HEAP_TOP..], 120);
        BigEndian::write_u16(&mut buf[d + PAGE_N_HEAP..], 0x8002); // compact, 2 heap recs
        BigEndian::write_u16(&mut buf[d + PAGE_DIRECTION..], 5);
        BigEndian::write_u16(&mut buf[d + PAGE_N_RECS..], 0);
        BigEndian::write_u16(&mut buf[d + PAGE_LEVEL..], 0);
        BigEndian::write_u64(&mut buf[d + PAGE_INDEX_ID..], 55);

        // Root FSEG headers.
        let leaf = FIL_PAGE_DATA + INDEX_HEADER_SIZE;
        BigEndian::write_u32(&mut buf[leaf..], 1);
        BigEndian::write_u32(&mut buf[leaf + 4..], 2);
        BigEndian::write_u16(&mut buf[leaf + 8..], 50);

        // System records.
        buf[COMPACT_INFIMUM..COMPACT_INFIMUM + 8].copy_from_slice(b"infimum\0");
        buf[COMPACT_SUPREMUM..COMPACT_SUPREMUM + 8].copy_from_slice(b"supremum");

        // Directory: slot 0 -> infimum, slot 1 -> supremum.
        let slot0 = PS - FIL_TRAILER_SIZE - DIRECTORY_SLOT_SIZE;
        BigEndian::write_u16(&mut buf[slot0..], COMPACT_INFIMUM as u16);
        BigEndian::write_u16(&mut buf[slot0 - DIRECTORY_SLOT_SIZE..], COMPACT_SUPREMUM as u16);

        Page::new(buf, PS, 3).unwrap()
    }

    #[test]
    fn test_header_fields() {
        let page = build_index_page();
        let index = IndexPage::new(&page);
        let header = index.header().unwrap();
        assert_eq!(header.n_dir_slots, 2);
        assert_eq!(header.n_heap(), 2);
        assert_eq!(header.format(), RowFormat::Compact);
        assert_eq!(header.direction, PageDirection::NoDirection);
        assert!(header.is_leaf());
        assert_eq!(header.index_id, 55);
    }

    #[test]
    fn test_fseg_headers() {
        let page = build_index_page();
        let index = IndexPage::new(&page);
        let leaf = index.leaf_fseg().unwrap();
        assert_eq!(leaf.space_id, 1);
        assert_eq!(leaf.page_number, 2);
        assert_eq!(leaf.offset, 50);
        assert!(!leaf.is_unset());
        assert!(index.internal_fseg().unwrap().is_unset());
    }

    #[test]
    fn test_system_records_and_directory() {
        let page = build_index_page();
        let index = IndexPage::new(&page);
        assert_eq!(index.infimum_origin().unwrap(), 99);
        assert_eq!(index.supremum_origin().unwrap(), 112);
        assert_eq!(index.infimum_text().unwrap(), b"infimum\0");
        assert_eq!(index.supremum_text().unwrap(), b"supremum");
        assert_eq!(
            index.directory().unwrap(),
            vec![COMPACT_INFIMUM as u16, COMPACT_SUPREMUM as u16]
        );
        assert!(index.directory_slot(2).is_err());
    }

    #[test]
    fn test_redundant_offsets() {
        assert_eq!(REDUNDANT_INFIMUM, 101);
        assert_eq!(REDUNDANT_SUPREMUM, 116);
        assert_eq!(COMPACT_INFIMUM, 99);
        assert_eq!(COMPACT_SUPREMUM, 112);
    }
}
