//! Page base: the FIL envelope and typed dispatch.
//!
//! Every InnoDB page begins with a 38-byte FIL header ([`FilHeader`])
//! containing the checksum, page number, prev/next siblings, LSN, type tag,
//! flush LSN, and space ID. The last 8 bytes form the FIL trailer
//! ([`FilTrailer`]) with the old-style checksum and the low 32 bits of the
//! LSN.
//!
//! [`Page`] owns one page-sized buffer and decodes on access: nothing is
//! parsed until asked for, so opening a large space stays cheap.
//! [`Page::typed`] dispatches to the specialized per-type views as a tagged
//! union; unknown types fall back to the base page.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::innodb::blob::BlobPage;
use crate::innodb::checksum::{verify_page, ChecksumResult};
use crate::innodb::cursor::Cursor;
use crate::innodb::fsp::FspPage;
use crate::innodb::ibuf_bitmap::IbufBitmapPage;
use crate::innodb::index_page::IndexPage;
use crate::innodb::inode::InodePage;
use crate::innodb::page_types::PageType;
use crate::innodb::sdi::SdiPage;
use crate::innodb::trx_sys::TrxSysPage;
use crate::innodb::undo::UndoPage;
use crate::IbdError;

/// Size of the FIL header in bytes.
pub const FIL_HEADER_SIZE: usize = 38;
/// Size of the FIL trailer in bytes.
pub const FIL_TRAILER_SIZE: usize = 8;
/// Start of the page payload, immediately after the FIL header.
pub const FIL_PAGE_DATA: usize = 38;
/// The "undefined" sentinel for page numbers and other 32-bit fields.
pub const UINT32_UNDEFINED: u32 = 0xFFFF_FFFF;

const FIL_PAGE_SPACE_OR_CHKSUM: usize = 0;
const FIL_PAGE_OFFSET: usize = 4;
const FIL_PAGE_PREV: usize = 8;
const FIL_PAGE_NEXT: usize = 12;
const FIL_PAGE_LSN: usize = 16;
const FIL_PAGE_TYPE: usize = 24;
const FIL_PAGE_FILE_FLUSH_LSN: usize = 26;
const FIL_PAGE_SPACE_ID: usize = 34;

/// Map the `UINT32_MAX` sentinel to "absent".
pub fn page_number_or_none(value: u32) -> Option<u32> {
    if value == UINT32_UNDEFINED {
        None
    } else {
        Some(value)
    }
}

/// Parsed FIL header (38 bytes, at the start of every page).
#[derive(Debug, Clone, Serialize)]
pub struct FilHeader {
    /// Stored checksum (bytes 0-3).
    pub checksum: u32,
    /// Page number within the tablespace (bytes 4-7).
    pub offset: u32,
    /// Previous sibling page, `UINT32_MAX` if none (bytes 8-11).
    pub prev: u32,
    /// Next sibling page, `UINT32_MAX` if none (bytes 12-15).
    pub next: u32,
    /// LSN of the newest modification (bytes 16-23).
    pub lsn: u64,
    /// Page type (bytes 24-25).
    pub page_type: PageType,
    /// Flush LSN, meaningful only on page 0 of the system space (bytes 26-33).
    pub flush_lsn: u64,
    /// Space ID (bytes 34-37).
    pub space_id: u32,
}

impl FilHeader {
    /// Parse from the start of a page buffer.
    pub fn parse(data: &[u8]) -> Result<Self, IbdError> {
        if data.len() < FIL_HEADER_SIZE {
            return Err(IbdError::InvalidBuffer(format!(
                "FIL header needs {} bytes, buffer has {}",
                FIL_HEADER_SIZE,
                data.len()
            )));
        }
        Ok(FilHeader {
            checksum: BigEndian::read_u32(&data[FIL_PAGE_SPACE_OR_CHKSUM..]),
            offset: BigEndian::read_u32(&data[FIL_PAGE_OFFSET..]),
            prev: BigEndian::read_u32(&data[FIL_PAGE_PREV..]),
            next: BigEndian::read_u32(&data[FIL_PAGE_NEXT..]),
            lsn: BigEndian::read_u64(&data[FIL_PAGE_LSN..]),
            page_type: PageType::from_u16(BigEndian::read_u16(&data[FIL_PAGE_TYPE..])),
            flush_lsn: BigEndian::read_u64(&data[FIL_PAGE_FILE_FLUSH_LSN..]),
            space_id: BigEndian::read_u32(&data[FIL_PAGE_SPACE_ID..]),
        })
    }
}

/// Parsed FIL trailer (last 8 bytes of every page).
#[derive(Debug, Clone, Serialize)]
pub struct FilTrailer {
    /// Old-style checksum.
    pub checksum: u32,
    /// Low 32 bits of the page LSN; must match the header LSN.
    pub lsn_low32: u32,
}

/// One page: an owned page-size buffer identified by its position.
pub struct Page {
    buf: Vec<u8>,
    /// Position of this page in its file, as the space reported it.
    number: u32,
}

impl Page {
    /// Wrap a raw page buffer.
    ///
    /// `number` is the page's position in the file. The buffer length must
    /// equal the page size exactly.
    pub fn new(buf: Vec<u8>, page_size: usize, number: u32) -> Result<Self, IbdError> {
        if buf.len() != page_size || page_size < FIL_HEADER_SIZE + FIL_TRAILER_SIZE {
            return Err(IbdError::InvalidBuffer(format!(
                "page {} buffer is {} bytes, page size is {}",
                number,
                buf.len(),
                page_size
            )));
        }
        Ok(Page { buf, number })
    }

    /// The raw page bytes.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// The page size in bytes.
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// The page's position in the file (not the stored header field).
    pub fn number(&self) -> u32 {
        self.number
    }

    /// A cursor over the page bytes, positioned at `offset`.
    pub fn cursor(&self, offset: usize) -> Cursor<'_> {
        Cursor::at(&self.buf, offset)
    }

    /// The parsed FIL header.
    pub fn fil_header(&self) -> FilHeader {
        FilHeader {
            checksum: self.checksum(),
            offset: self.offset(),
            prev: BigEndian::read_u32(&self.buf[FIL_PAGE_PREV..]),
            next: BigEndian::read_u32(&self.buf[FIL_PAGE_NEXT..]),
            lsn: self.lsn(),
            page_type: self.page_type(),
            flush_lsn: BigEndian::read_u64(&self.buf[FIL_PAGE_FILE_FLUSH_LSN..]),
            space_id: self.space_id(),
        }
    }

    /// The parsed FIL trailer.
    pub fn fil_trailer(&self) -> FilTrailer {
        let base = self.buf.len() - FIL_TRAILER_SIZE;
        FilTrailer {
            checksum: BigEndian::read_u32(&self.buf[base..]),
            lsn_low32: BigEndian::read_u32(&self.buf[base + 4..]),
        }
    }

    /// Stored page number from the FIL header.
    pub fn offset(&self) -> u32 {
        BigEndian::read_u32(&self.buf[FIL_PAGE_OFFSET..])
    }

    /// Previous sibling, or None.
    pub fn prev(&self) -> Option<u32> {
        page_number_or_none(BigEndian::read_u32(&self.buf[FIL_PAGE_PREV..]))
    }

    /// Next sibling, or None.
    pub fn next(&self) -> Option<u32> {
        page_number_or_none(BigEndian::read_u32(&self.buf[FIL_PAGE_NEXT..]))
    }

    /// LSN of the newest modification.
    pub fn lsn(&self) -> u64 {
        BigEndian::read_u64(&self.buf[FIL_PAGE_LSN..])
    }

    /// Stored checksum field.
    pub fn checksum(&self) -> u32 {
        BigEndian::read_u32(&self.buf[FIL_PAGE_SPACE_OR_CHKSUM..])
    }

    /// Space ID from the FIL header.
    pub fn space_id(&self) -> u32 {
        BigEndian::read_u32(&self.buf[FIL_PAGE_SPACE_ID..])
    }

    /// The page type tag.
    pub fn page_type(&self) -> PageType {
        PageType::from_u16(BigEndian::read_u16(&self.buf[FIL_PAGE_TYPE..]))
    }

    /// True when the stored page number disagrees with the page's position.
    /// Such a page is considered corrupt but remains parseable.
    pub fn misplaced(&self) -> bool {
        self.offset() != self.number
    }

    /// Verify the stored checksum against both algorithms.
    pub fn checksum_result(&self) -> ChecksumResult {
        verify_page(&self.buf)
    }

    /// True when neither checksum algorithm validates, or the page is
    /// misplaced.
    pub fn corrupt(&self) -> bool {
        self.misplaced() || self.checksum_result().corrupt()
    }

    /// True for a never-written page (type 0 and every byte zero).
    pub fn freshly_allocated(&self) -> bool {
        self.page_type() == PageType::Allocated && self.buf.iter().all(|&b| b == 0)
    }

    /// Dispatch to the specialized view for this page's type.
    pub fn typed(&self) -> TypedPage<'_> {
        match self.page_type() {
            PageType::FspHdr => TypedPage::FspHdr(FspPage::new(self)),
            PageType::Xdes => TypedPage::Xdes(FspPage::new(self)),
            PageType::Inode => TypedPage::Inode(InodePage::new(self)),
            PageType::Index | PageType::Rtree => TypedPage::Index(IndexPage::new(self)),
            PageType::TrxSys => TypedPage::TrxSys(TrxSysPage::new(self)),
            PageType::IbufBitmap => TypedPage::IbufBitmap(IbufBitmapPage::new(self)),
            // SDI BLOB continuation pages share the plain BLOB layout.
            PageType::Blob | PageType::SdiBlob => TypedPage::Blob(BlobPage::new(self)),
            PageType::UndoLog => TypedPage::Undo(UndoPage::new(self)),
            PageType::Sdi => TypedPage::Sdi(SdiPage::new(self)),
            _ => TypedPage::Base(self),
        }
    }
}

/// A page dispatched to its specialized decoder.
///
/// FSP_HDR and XDES pages share a layout; both map to [`FspPage`], but the
/// FSP header itself is only meaningful on page 0. Types without a
/// specialized decoder (SYS, allocated, unknown) fall back to `Base`.
pub enum TypedPage<'a> {
    FspHdr(FspPage<'a>),
    Xdes(FspPage<'a>),
    Inode(InodePage<'a>),
    Index(IndexPage<'a>),
    TrxSys(TrxSysPage<'a>),
    IbufBitmap(IbufBitmapPage<'a>),
    Blob(BlobPage<'a>),
    Undo(UndoPage<'a>),
    Sdi(SdiPage<'a>),
    Base(&'a Page),
}
