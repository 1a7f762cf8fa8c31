//! Page type codes and names.
//!
//! Maps the 2-byte page type field (bytes 24-25 of the FIL header) to a
//! [`PageType`] enum. Values are from `fil0fil.h` in the MySQL source.

use serde::Serialize;
use std::fmt;

/// InnoDB page types this parser understands.
///
/// Types not in the table are preserved as `Unknown(code)`; pages of an
/// unknown type still expose their FIL envelope through the base page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PageType {
    /// Freshly allocated, type field not initialized (0).
    Allocated,
    /// Undo log page (2).
    UndoLog,
    /// File segment inode page (3).
    Inode,
    /// Insert buffer free list (4).
    IbufFreeList,
    /// Insert buffer bitmap (5).
    IbufBitmap,
    /// System internal page, e.g. the data dictionary header (6).
    Sys,
    /// Transaction system header (7).
    TrxSys,
    /// File space header, page 0 of each tablespace (8).
    FspHdr,
    /// Extent descriptor bookkeeping page (9).
    Xdes,
    /// Uncompressed BLOB continuation page (10).
    Blob,
    /// First compressed BLOB page (11).
    ZBlob,
    /// Subsequent compressed BLOB page (12).
    ZBlob2,
    /// Uncompressed SDI BLOB continuation page (18, MySQL 8.0+).
    SdiBlob,
    /// Compressed SDI BLOB continuation page (19, MySQL 8.0+).
    SdiZblob,
    /// Serialized Dictionary Information index page (17853, MySQL 8.0+).
    Sdi,
    /// R-tree index page for spatial indexes (17854).
    Rtree,
    /// B+Tree index page (17855).
    Index,
    /// Any type code not in the dispatch table.
    Unknown(u16),
}

impl PageType {
    /// Map a raw type code from the FIL header.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => PageType::Allocated,
            2 => PageType::UndoLog,
            3 => PageType::Inode,
            4 => PageType::IbufFreeList,
            5 => PageType::IbufBitmap,
            6 => PageType::Sys,
            7 => PageType::TrxSys,
            8 => PageType::FspHdr,
            9 => PageType::Xdes,
            10 => PageType::Blob,
            11 => PageType::ZBlob,
            12 => PageType::ZBlob2,
            18 => PageType::SdiBlob,
            19 => PageType::SdiZblob,
            17853 => PageType::Sdi,
            17854 => PageType::Rtree,
            17855 => PageType::Index,
            v => PageType::Unknown(v),
        }
    }

    /// The MySQL source-style name for this type.
    pub fn name(&self) -> &'static str {
        match self {
            PageType::Allocated => "ALLOCATED",
            PageType::UndoLog => "UNDO_LOG",
            PageType::Inode => "INODE",
            PageType::IbufFreeList => "IBUF_FREE_LIST",
            PageType::IbufBitmap => "IBUF_BITMAP",
            PageType::Sys => "SYS",
            PageType::TrxSys => "TRX_SYS",
            PageType::FspHdr => "FSP_HDR",
            PageType::Xdes => "XDES",
            PageType::Blob => "BLOB",
            PageType::ZBlob => "ZBLOB",
            PageType::ZBlob2 => "ZBLOB2",
            PageType::SdiBlob => "SDI_BLOB",
            PageType::SdiZblob => "SDI_ZBLOB",
            PageType::Sdi => "SDI",
            PageType::Rtree => "RTREE",
            PageType::Index => "INDEX",
            PageType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageType::Unknown(v) => write!(f, "UNKNOWN({})", v),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(PageType::from_u16(8), PageType::FspHdr);
        assert_eq!(PageType::from_u16(9), PageType::Xdes);
        assert_eq!(PageType::from_u16(3), PageType::Inode);
        assert_eq!(PageType::from_u16(7), PageType::TrxSys);
        assert_eq!(PageType::from_u16(17855), PageType::Index);
        assert_eq!(PageType::from_u16(17853), PageType::Sdi);
    }

    #[test]
    fn test_unknown_codes_preserved() {
        assert_eq!(PageType::from_u16(999), PageType::Unknown(999));
        assert_eq!(format!("{}", PageType::Unknown(999)), "UNKNOWN(999)");
    }

    #[test]
    fn test_names() {
        assert_eq!(PageType::Index.name(), "INDEX");
        assert_eq!(PageType::FspHdr.name(), "FSP_HDR");
        assert_eq!(format!("{}", PageType::UndoLog), "UNDO_LOG");
    }
}
