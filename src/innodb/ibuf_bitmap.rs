//! Insert buffer bitmap (IBUF_BITMAP) pages.
//!
//! An IBUF_BITMAP page tracks 4 bits for each page of its tablespace
//! neighborhood: a 2-bit free-space level, a "changes buffered" bit, and an
//! "is part of the insert buffer" bit. Two pages are packed per byte, even
//! page in the low nibble.

use serde::Serialize;

use crate::innodb::page::{Page, FIL_PAGE_DATA};
use crate::IbdError;

/// Per-page status held in the bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IbufPageStatus {
    /// Free-space level, 0..=3.
    pub free: u8,
    /// Changes are buffered for the page.
    pub buffered: bool,
    /// The page belongs to the insert buffer tree itself.
    pub ibuf: bool,
}

/// Specialized view over an IBUF_BITMAP page.
pub struct IbufBitmapPage<'a> {
    page: &'a Page,
}

impl<'a> IbufBitmapPage<'a> {
    pub fn new(page: &'a Page) -> Self {
        IbufBitmapPage { page }
    }

    /// Number of pages this bitmap describes (4 bits each).
    pub fn pages_described(&self) -> usize {
        // The bitmap fills the page body; each byte covers two pages.
        (self.page.size() - FIL_PAGE_DATA - 8) * 2
    }

    /// Status bits for the `index`-th page of the described run.
    pub fn page_status(&self, index: usize) -> Result<IbufPageStatus, IbdError> {
        if index >= self.pages_described() {
            return Err(IbdError::Argument(format!(
                "bitmap index {} out of range ({} pages described)",
                index,
                self.pages_described()
            )));
        }
        let byte = self.page.data()[FIL_PAGE_DATA + index / 2];
        let nibble = (byte >> ((index % 2) * 4)) & 0x0F;
        Ok(IbufPageStatus {
            free: nibble & 0x03,
            buffered: nibble & 0x04 != 0,
            ibuf: nibble & 0x08 != 0,
        })
    }

    /// Iterate the status of every described page, in page order.
    pub fn each_page_status(
        &self,
    ) -> impl Iterator<Item = (usize, IbufPageStatus)> + '_ {
        (0..self.pages_described()).filter_map(move |i| {
            self.page_status(i).ok().map(|status| (i, status))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    const PS: usize = 16384;

    #[test]
    fn test_page_status_nibbles() {
        let mut buf = vec![0u8; PS];
        BigEndian::write_u16(&mut buf[24..], 5); // IBUF_BITMAP
        // Page 0: free=2, buffered; page 1: free=3, ibuf.
        buf[FIL_PAGE_DATA] = 0x06 | 0xB0;
        let page = Page::new(buf, PS, 1).unwrap();
        let bitmap = IbufBitmapPage::new(&page);

        assert_eq!(
            bitmap.page_status(0).unwrap(),
            IbufPageStatus { free: 2, buffered: true, ibuf: false }
        );
        assert_eq!(
            bitmap.page_status(1).unwrap(),
            IbufPageStatus { free: 3, buffered: false, ibuf: true }
        );
        assert_eq!(
            bitmap.page_status(2).unwrap(),
            IbufPageStatus { free: 0, buffered: false, ibuf: false }
        );
    }

    #[test]
    fn test_bounds_and_iteration() {
        let mut buf = vec![0u8; PS];
        BigEndian::write_u16(&mut buf[24..], 5);
        let page = Page::new(buf, PS, 1).unwrap();
        let bitmap = IbufBitmapPage::new(&page);

        assert_eq!(bitmap.pages_described(), (PS - FIL_PAGE_DATA - 8) * 2);
        assert!(bitmap.page_status(bitmap.pages_described()).is_err());
        assert_eq!(bitmap.each_page_status().count(), bitmap.pages_described());
    }
}
