//! Undo log (UNDO_LOG) pages.
//!
//! Undo pages store previous versions of modified records for MVCC and
//! rollback. Each page begins with an [`UndoPageHeader`] (undo type, first
//! record offset, free offset, page list node) and — on the segment's
//! first page — an [`UndoSegmentHeader`]. Undo records are chained within
//! the page by 2-byte next/prev offsets; the payload of each record is
//! surfaced raw alongside its decoded type.

use serde::Serialize;

use crate::innodb::cursor::Cursor;
use crate::innodb::index_page::FsegHeader;
use crate::innodb::list::{ListBase, ListNode};
use crate::innodb::page::{Page, FIL_PAGE_DATA, FIL_TRAILER_SIZE};
use crate::IbdError;

/// Size of the undo page header.
pub const UNDO_PAGE_HEADER_SIZE: usize = 18;
/// Offset of the segment header (first page of a segment only).
pub const UNDO_SEGMENT_HEADER_OFFSET: usize = FIL_PAGE_DATA + UNDO_PAGE_HEADER_SIZE;

/// Type of an undo page, from `trx0undo.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UndoPageType {
    /// Insert undo: needed only until the transaction commits.
    Insert,
    /// Update undo: kept for MVCC until purged.
    Update,
    Unknown(u16),
}

impl UndoPageType {
    fn from_u16(value: u16) -> Self {
        match value {
            1 => UndoPageType::Insert,
            2 => UndoPageType::Update,
            v => UndoPageType::Unknown(v),
        }
    }
}

/// State of an undo segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UndoSegmentState {
    /// Contains an active transaction's undo log.
    Active,
    /// Cached for reuse.
    Cached,
    /// Insert undo of a committed transaction, freeable.
    ToFree,
    /// Update undo of a committed transaction, purgeable.
    ToPurge,
    /// Belongs to a prepared XA transaction.
    Prepared,
    Unknown(u16),
}

impl UndoSegmentState {
    fn from_u16(value: u16) -> Self {
        match value {
            1 => UndoSegmentState::Active,
            2 => UndoSegmentState::Cached,
            3 => UndoSegmentState::ToFree,
            4 => UndoSegmentState::ToPurge,
            5 => UndoSegmentState::Prepared,
            v => UndoSegmentState::Unknown(v),
        }
    }
}

/// Type of one undo record, from the low bits of its type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UndoRecordType {
    /// A fresh insert (type 11).
    Insert,
    /// Update of an existing record (type 12).
    UpdateExisting,
    /// Update of a delete-marked record (type 13).
    UpdateDeleted,
    /// Delete mark (type 14).
    DeleteMark,
    Unknown(u8),
}

impl UndoRecordType {
    fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            11 => UndoRecordType::Insert,
            12 => UndoRecordType::UpdateExisting,
            13 => UndoRecordType::UpdateDeleted,
            14 => UndoRecordType::DeleteMark,
            v => UndoRecordType::Unknown(v),
        }
    }
}

/// Parsed undo page header.
#[derive(Debug, Clone, Serialize)]
pub struct UndoPageHeader {
    /// Insert or update undo.
    pub undo_type: UndoPageType,
    /// Offset of the latest undo log header on this page.
    pub latest_log_offset: u16,
    /// First free byte on the page.
    pub free_offset: u16,
    /// Linkage in the segment's page list.
    pub page_list_node: ListNode,
}

/// Parsed undo segment header.
#[derive(Debug, Clone, Serialize)]
pub struct UndoSegmentHeader {
    pub state: UndoSegmentState,
    /// Offset of the last undo log header on the segment's first page.
    pub last_log_offset: u16,
    /// The segment backing this undo log.
    pub fseg: FsegHeader,
    /// Pages of the segment.
    pub page_list: ListBase,
}

/// One undo record with its intra-page linkage and raw payload.
#[derive(Debug, Clone, Serialize)]
pub struct UndoRecord {
    /// Byte offset of the record within the page.
    pub offset: u16,
    /// Offset of the previous record, from the trailing pointer.
    pub prev_offset: u16,
    /// Offset of the next record; 0 ends the chain.
    pub next_offset: u16,
    pub record_type: UndoRecordType,
    /// Compiler info bits from the type byte's high nibble.
    pub cmpl_info: u8,
    /// Raw payload bytes (type-specific, surfaced undecoded).
    pub payload: Vec<u8>,
}

/// Specialized view over an UNDO_LOG page.
pub struct UndoPage<'a> {
    page: &'a Page,
}

impl<'a> UndoPage<'a> {
    pub fn new(page: &'a Page) -> Self {
        UndoPage { page }
    }

    /// The undo page header.
    pub fn header(&self) -> Result<UndoPageHeader, IbdError> {
        let mut c = self.page.cursor(FIL_PAGE_DATA);
        c.name("undo_page_header", |c| {
            Ok(UndoPageHeader {
                undo_type: UndoPageType::from_u16(c.read_u16()?),
                latest_log_offset: c.read_u16()?,
                free_offset: c.read_u16()?,
                page_list_node: ListNode::read(c)?,
            })
        })
    }

    /// The segment header (meaningful on the segment's first page).
    pub fn segment_header(&self) -> Result<UndoSegmentHeader, IbdError> {
        let mut c = self.page.cursor(UNDO_SEGMENT_HEADER_OFFSET);
        c.name("undo_segment_header", |c| {
            let state = UndoSegmentState::from_u16(c.read_u16()?);
            let last_log_offset = c.read_u16()?;
            let fseg = FsegHeader::parse(c.read_bytes(10)?)?;
            let page_list = ListBase::read(c)?;
            Ok(UndoSegmentHeader {
                state,
                last_log_offset,
                fseg,
                page_list,
            })
        })
    }

    /// Walk the undo records chained after `start_offset` (typically the
    /// undo log header's first-record offset).
    ///
    /// Each record is framed by a 2-byte next pointer at its start and a
    /// 2-byte back pointer at its end; the byte after the next pointer
    /// packs the record type and compiler info.
    pub fn records_from(&self, start_offset: u16) -> Result<Vec<UndoRecord>, IbdError> {
        let header = self.header()?;
        let limit = (header.free_offset as usize).min(self.page.size() - FIL_TRAILER_SIZE);
        let mut records = Vec::new();
        let mut offset = start_offset as usize;

        while offset >= FIL_PAGE_DATA && offset + 3 < limit {
            let mut c = Cursor::at(self.page.data(), offset);
            let (next_offset, type_byte) = c.name("undo_record", |c| {
                Ok((c.read_u16()?, c.read_u8()?))
            })?;

            let end = if next_offset == 0 {
                limit
            } else {
                next_offset as usize
            };
            if end <= offset + 3 || end > limit {
                break;
            }
            // The last two bytes before the next record hold the back pointer.
            let payload_end = end.saturating_sub(2).max(offset + 3);
            let prev_offset =
                u16::from(self.page.data()[payload_end]) << 8
                    | u16::from(self.page.data()[payload_end + 1]);

            records.push(UndoRecord {
                offset: offset as u16,
                prev_offset,
                next_offset,
                record_type: UndoRecordType::from_u8(type_byte),
                cmpl_info: type_byte >> 4,
                payload: self.page.data()[offset + 3..payload_end].to_vec(),
            });

            if next_offset == 0 {
                break;
            }
            offset = next_offset as usize;
        }
        Ok(records)
    }
}
