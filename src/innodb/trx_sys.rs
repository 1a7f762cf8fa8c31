//! Transaction system (TRX_SYS) page.
//!
//! Page 5 of the system tablespace holds the transaction system header:
//! the maximum assigned transaction ID, the rollback segment directory,
//! optional replication coordinates (binary log and master log positions),
//! and the doublewrite buffer bookkeeping near the end of the page.

use serde::Serialize;

use crate::innodb::index_page::FsegHeader;
use crate::innodb::page::{page_number_or_none, Page, FIL_PAGE_DATA};
use crate::IbdError;

/// Magic value marking valid binary/master log info blocks.
pub const MYSQL_LOG_MAGIC: u32 = 873_422_344;
/// Magic value marking an initialized doublewrite buffer.
pub const DOUBLEWRITE_MAGIC: u32 = 536_853_855;
/// Rollback segment directory slots.
pub const N_RSEG_SLOTS: usize = 128;

const BINARY_LOG_INFO_OFFSET_FROM_END: usize = 1000;
const MASTER_LOG_INFO_OFFSET_FROM_END: usize = 2000;
const DOUBLEWRITE_INFO_OFFSET_FROM_END: usize = 200;

/// A rollback segment directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RsegSlot {
    pub space_id: u32,
    pub page_number: u32,
}

/// Replication coordinates stored on the TRX_SYS page.
#[derive(Debug, Clone, Serialize)]
pub struct LogInfo {
    /// High half of the byte offset within the log file.
    pub offset_high: u32,
    /// Low half of the byte offset.
    pub offset_low: u32,
    /// Log file name (NUL-terminated on disk).
    pub name: String,
}

/// Doublewrite buffer bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct DoublewriteInfo {
    /// The segment owning the doublewrite blocks.
    pub fseg: FsegHeader,
    /// First pages of the two doublewrite extents.
    pub block_pages: [u32; 2],
    /// True when the stored magic matches [`DOUBLEWRITE_MAGIC`].
    pub valid: bool,
}

/// Specialized view over the TRX_SYS page.
pub struct TrxSysPage<'a> {
    page: &'a Page,
}

impl<'a> TrxSysPage<'a> {
    pub fn new(page: &'a Page) -> Self {
        TrxSysPage { page }
    }

    /// The highest assigned transaction ID at the time of the last flush.
    pub fn trx_id(&self) -> Result<u64, IbdError> {
        self.page.cursor(FIL_PAGE_DATA).read_u64()
    }

    /// The transaction system's own segment.
    pub fn fseg(&self) -> Result<FsegHeader, IbdError> {
        FsegHeader::parse(&self.page.data()[FIL_PAGE_DATA + 8..])
    }

    /// The rollback segment directory, stopping at the first unused slot.
    pub fn rollback_segments(&self) -> Result<Vec<RsegSlot>, IbdError> {
        let mut c = self.page.cursor(FIL_PAGE_DATA + 8 + 10);
        let mut slots = Vec::new();
        for _ in 0..N_RSEG_SLOTS {
            let slot = c.name("rseg_slot", |c| {
                let space_id = c.read_u32()?;
                let page = c.read_u32()?;
                Ok((space_id, page))
            })?;
            match page_number_or_none(slot.1) {
                None => break,
                Some(page_number) => slots.push(RsegSlot {
                    space_id: slot.0,
                    page_number,
                }),
            }
        }
        Ok(slots)
    }

    /// Binary log coordinates, when present.
    pub fn binary_log_info(&self) -> Result<Option<LogInfo>, IbdError> {
        self.log_info_at(self.page.size() - BINARY_LOG_INFO_OFFSET_FROM_END)
    }

    /// Master (relay) log coordinates, when present.
    pub fn master_log_info(&self) -> Result<Option<LogInfo>, IbdError> {
        self.log_info_at(self.page.size() - MASTER_LOG_INFO_OFFSET_FROM_END)
    }

    fn log_info_at(&self, offset: usize) -> Result<Option<LogInfo>, IbdError> {
        let mut c = self.page.cursor(offset);
        c.name("log_info", |c| {
            if c.read_u32()? != MYSQL_LOG_MAGIC {
                return Ok(None);
            }
            let offset_high = c.read_u32()?;
            let offset_low = c.read_u32()?;
            let raw = c.read_bytes(100)?;
            let name = raw
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| b as char)
                .collect();
            Ok(Some(LogInfo {
                offset_high,
                offset_low,
                name,
            }))
        })
    }

    /// The doublewrite buffer descriptor.
    pub fn doublewrite_info(&self) -> Result<DoublewriteInfo, IbdError> {
        let offset = self.page.size() - DOUBLEWRITE_INFO_OFFSET_FROM_END;
        let mut c = self.page.cursor(offset);
        c.name("doublewrite", |c| {
            let fseg_bytes = c.read_bytes(10)?;
            let fseg = FsegHeader::parse(fseg_bytes)?;
            let magic = c.read_u32()?;
            let block1 = c.read_u32()?;
            let block2 = c.read_u32()?;
            Ok(DoublewriteInfo {
                fseg,
                block_pages: [block1, block2],
                valid: magic == DOUBLEWRITE_MAGIC,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    const PS: usize = 16384;

    fn build_trx_sys_page() -> Page {
        let mut buf = vec![0u8; PS];
        BigEndian::write_u32(&mut buf[4..], 5);
        BigEndian::write_u16(&mut buf[24..], 7); // TRX_SYS
        let base = FIL_PAGE_DATA;
        BigEndian::write_u64(&mut buf[base..], 0x500); // trx id

        // Two rseg slots then the UINT32_MAX terminator.
        let rsegs = base + 18;
        BigEndian::write_u32(&mut buf[rsegs..], 0);
        BigEndian::write_u32(&mut buf[rsegs + 4..], 6);
        BigEndian::write_u32(&mut buf[rsegs + 8..], 0);
        BigEndian::write_u32(&mut buf[rsegs + 12..], 45);
        BigEndian::write_u32(&mut buf[rsegs + 16..], 0);
        BigEndian::write_u32(&mut buf[rsegs + 20..], 0xFFFF_FFFF);

        // Binary log info.
        let binlog = PS - BINARY_LOG_INFO_OFFSET_FROM_END;
        BigEndian::write_u32(&mut buf[binlog..], MYSQL_LOG_MAGIC);
        BigEndian::write_u32(&mut buf[binlog + 4..], 0);
        BigEndian::write_u32(&mut buf[binlog + 8..], 107);
        buf[binlog + 12..binlog + 22].copy_from_slice(b"binlog.01\0");

        // Doublewrite info.
        let dblwr = PS - DOUBLEWRITE_INFO_OFFSET_FROM_END;
        BigEndian::write_u32(&mut buf[dblwr..], 0); // fseg space
        BigEndian::write_u32(&mut buf[dblwr + 4..], 2); // fseg page
        BigEndian::write_u16(&mut buf[dblwr + 8..], 242); // fseg offset
        BigEndian::write_u32(&mut buf[dblwr + 10..], DOUBLEWRITE_MAGIC);
        BigEndian::write_u32(&mut buf[dblwr + 14..], 64);
        BigEndian::write_u32(&mut buf[dblwr + 18..], 128);

        Page::new(buf, PS, 5).unwrap()
    }

    #[test]
    fn test_trx_id_and_rsegs() {
        let page = build_trx_sys_page();
        let trx_sys = TrxSysPage::new(&page);
        assert_eq!(trx_sys.trx_id().unwrap(), 0x500);

        let slots = trx_sys.rollback_segments().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], RsegSlot { space_id: 0, page_number: 6 });
        assert_eq!(slots[1], RsegSlot { space_id: 0, page_number: 45 });
    }

    #[test]
    fn test_binary_log_info() {
        let page = build_trx_sys_page();
        let trx_sys = TrxSysPage::new(&page);

        let info = trx_sys.binary_log_info().unwrap().unwrap();
        assert_eq!(info.name, "binlog.01");
        assert_eq!(info.offset_low, 107);

        // Master log block was never written; magic is zero.
        assert!(trx_sys.master_log_info().unwrap().is_none());
    }

    #[test]
    fn test_doublewrite_info() {
        let page = build_trx_sys_page();
        let trx_sys = TrxSysPage::new(&page);

        let info = trx_sys.doublewrite_info().unwrap();
        assert!(info.valid);
        assert_eq!(info.block_pages, [64, 128]);
        assert_eq!(info.fseg.page_number, 2);
    }
}
