//! BLOB continuation pages and off-page value reassembly.
//!
//! When a column value is too long to stay in the record, the record keeps
//! a 768-byte prefix plus a 20-byte [`ExternReference`]; the remainder
//! lives on BLOB pages chained through a next-page pointer. Each BLOB page
//! carries the length of its portion and the next page number (`UINT32_MAX`
//! on the last page).

use serde::Serialize;

use crate::innodb::data_types::ExternReference;
use crate::innodb::page::{page_number_or_none, Page, FIL_PAGE_DATA};
use crate::innodb::space::Space;
use crate::IbdError;

/// Size of the BLOB page header: part length (4) + next page (4).
pub const BLOB_HEADER_SIZE: usize = 8;
/// Offset where BLOB data begins on each page.
pub const BLOB_DATA_OFFSET: usize = FIL_PAGE_DATA + BLOB_HEADER_SIZE;

/// Parsed BLOB page header.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BlobHeader {
    /// Bytes of value data stored on this page.
    pub part_length: u32,
    /// Next chain page, or `UINT32_MAX` at the end.
    pub next_page: u32,
}

/// Specialized view over a BLOB page.
pub struct BlobPage<'a> {
    page: &'a Page,
}

impl<'a> BlobPage<'a> {
    pub fn new(page: &'a Page) -> Self {
        BlobPage { page }
    }

    /// The parsed header.
    pub fn header(&self) -> Result<BlobHeader, IbdError> {
        let mut c = self.page.cursor(FIL_PAGE_DATA);
        c.name("blob_header", |c| {
            Ok(BlobHeader {
                part_length: c.read_u32()?,
                next_page: c.read_u32()?,
            })
        })
    }

    /// Next page of the chain, or None.
    pub fn next_page(&self) -> Result<Option<u32>, IbdError> {
        Ok(page_number_or_none(self.header()?.next_page))
    }

    /// The value bytes stored on this page.
    pub fn payload(&self) -> Result<&'a [u8], IbdError> {
        let header = self.header()?;
        let end = BLOB_DATA_OFFSET + header.part_length as usize;
        if end > self.page.size() {
            return Err(IbdError::InvalidBuffer(format!(
                "BLOB part length {} overruns page {}",
                header.part_length,
                self.page.number()
            )));
        }
        Ok(&self.page.data()[BLOB_DATA_OFFSET..end])
    }
}

/// Reassemble the full off-page portion of an externally stored field by
/// walking the BLOB chain, truncated at the reference's declared length.
pub fn read_extern_value(
    space: &Space,
    reference: &ExternReference,
) -> Result<Vec<u8>, IbdError> {
    let mut out = Vec::with_capacity(reference.length.min(1 << 24) as usize);
    let mut next = page_number_or_none(reference.page_number);

    while let Some(page_number) = next {
        if out.len() as u64 >= reference.length {
            break;
        }
        let page = space.page(page_number)?.ok_or_else(|| {
            IbdError::InvalidBuffer(format!(
                "BLOB chain points past the space at page {}",
                page_number
            ))
        })?;
        let blob = BlobPage::new(&page);
        out.extend_from_slice(blob.payload()?);
        next = blob.next_page()?;
    }

    out.truncate(reference.length as usize);
    Ok(out)
}
