//! Page checksum algorithms and verification.
//!
//! InnoDB has stored two different checksums in the FIL header over its
//! lifetime:
//!
//! - **CRC-32C** (Castagnoli): the XOR of two independent CRC32c values
//!   computed over bytes `[4..26)` and `[38..page_size-8)`. The two ranges
//!   are NOT chained — each is checksummed separately and the results XORed.
//! - **Legacy InnoDB fold**: `ut_fold_ulint_pair` applied byte-at-a-time
//!   over the same two ranges, with the two folds summed (wrapping).
//!
//! The FIL trailer additionally stores the "old" checksum, a fold over the
//! first 26 bytes of the page.
//!
//! Verification accepts a page when *either* algorithm matches the stored
//! value, since files written by different server generations coexist on
//! disk. [`verify_page`] reports which algorithm matched, if any.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

/// First random mask used by `ut_fold_ulint_pair`.
const UT_HASH_RANDOM_MASK: u32 = 1_463_735_687;
/// Second random mask used by `ut_fold_ulint_pair`.
const UT_HASH_RANDOM_MASK2: u32 = 1_653_893_711;

const FIL_PAGE_OFFSET: usize = 4;
const FIL_PAGE_FILE_FLUSH_LSN: usize = 26;
const FIL_PAGE_DATA: usize = 38;
const FIL_TRAILER_SIZE: usize = 8;

/// The checksum algorithm that validated a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChecksumAlgorithm {
    /// CRC-32C over the two disjoint page ranges, XORed.
    Crc32c,
    /// Legacy InnoDB fold checksum.
    InnoDb,
}

/// Outcome of verifying one page's stored checksum against both algorithms.
#[derive(Debug, Clone, Serialize)]
pub struct ChecksumResult {
    /// Value stored in the FIL header (bytes 0-3).
    pub stored: u32,
    /// CRC-32C over the page ranges.
    pub crc32c: u32,
    /// Legacy fold checksum over the page ranges.
    pub innodb: u32,
    /// Which algorithm matched the stored value, if either.
    pub matched: Option<ChecksumAlgorithm>,
}

impl ChecksumResult {
    /// True when neither algorithm validates the stored checksum.
    pub fn corrupt(&self) -> bool {
        self.matched.is_none()
    }
}

/// InnoDB's `ut_fold_ulint_pair` folding step, in wrapping u32 arithmetic.
#[inline]
fn ut_fold_ulint_pair(n1: u32, n2: u32) -> u32 {
    let step = n1 ^ n2 ^ UT_HASH_RANDOM_MASK2;
    let step = (step << 8).wrapping_add(n1);
    let step = step ^ UT_HASH_RANDOM_MASK;
    step.wrapping_add(n2)
}

/// Fold a byte range one byte at a time.
pub fn fold_bytes(data: &[u8]) -> u32 {
    let mut fold: u32 = 0;
    for &byte in data {
        fold = ut_fold_ulint_pair(fold, u32::from(byte));
    }
    fold
}

/// Legacy InnoDB header checksum: fold of bytes `[4..26)` plus the fold of
/// bytes `[38..page_size-8)`, wrapping.
pub fn page_checksum_innodb(page: &[u8]) -> u32 {
    let end = page.len() - FIL_TRAILER_SIZE;
    let fold1 = fold_bytes(&page[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
    let fold2 = fold_bytes(&page[FIL_PAGE_DATA..end]);
    fold1.wrapping_add(fold2)
}

/// Legacy InnoDB trailer ("old") checksum: fold of the first 26 bytes.
pub fn page_checksum_innodb_old(page: &[u8]) -> u32 {
    fold_bytes(&page[0..FIL_PAGE_FILE_FLUSH_LSN])
}

/// CRC-32C page checksum: independent CRCs of bytes `[4..26)` and
/// `[38..page_size-8)`, XORed (the ranges are not chained).
pub fn page_checksum_crc32c(page: &[u8]) -> u32 {
    let end = page.len() - FIL_TRAILER_SIZE;
    let crc1 = crc32c::crc32c(&page[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
    let crc2 = crc32c::crc32c(&page[FIL_PAGE_DATA..end]);
    crc1 ^ crc2
}

/// Verify a page buffer against both algorithms.
///
/// The buffer must be a whole page; the stored checksum is read from the
/// FIL header. A page passes when either algorithm reproduces the stored
/// value.
pub fn verify_page(page: &[u8]) -> ChecksumResult {
    let stored = BigEndian::read_u32(&page[0..4]);
    let crc = page_checksum_crc32c(page);
    let fold = page_checksum_innodb(page);

    let matched = if stored == crc {
        Some(ChecksumAlgorithm::Crc32c)
    } else if stored == fold {
        Some(ChecksumAlgorithm::InnoDb)
    } else {
        None
    };

    ChecksumResult {
        stored,
        crc32c: crc,
        innodb: fold,
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS: usize = 16384;

    fn sample_page() -> Vec<u8> {
        let mut page = vec![0u8; PS];
        for (i, byte) in page.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        page
    }

    #[test]
    fn test_fold_is_order_sensitive() {
        assert_ne!(fold_bytes(&[1, 2, 3]), fold_bytes(&[3, 2, 1]));
        assert_eq!(fold_bytes(&[]), 0);
    }

    #[test]
    fn test_verify_accepts_crc32c() {
        let mut page = sample_page();
        let crc = page_checksum_crc32c(&page);
        BigEndian::write_u32(&mut page[0..4], crc);

        let result = verify_page(&page);
        assert_eq!(result.matched, Some(ChecksumAlgorithm::Crc32c));
        assert!(!result.corrupt());
    }

    #[test]
    fn test_verify_accepts_legacy_fold() {
        let mut page = sample_page();
        let fold = page_checksum_innodb(&page);
        BigEndian::write_u32(&mut page[0..4], fold);

        let result = verify_page(&page);
        assert_eq!(result.matched, Some(ChecksumAlgorithm::InnoDb));
        assert!(!result.corrupt());
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let mut page = sample_page();
        BigEndian::write_u32(&mut page[0..4], 0x1234_5678);

        let result = verify_page(&page);
        assert!(result.corrupt());
        assert_eq!(result.stored, 0x1234_5678);
    }

    #[test]
    fn test_checksum_ignores_flush_lsn_and_trailer() {
        // Bytes 26..38 and the trailer are excluded from both algorithms.
        let mut page = sample_page();
        let crc_before = page_checksum_crc32c(&page);
        let fold_before = page_checksum_innodb(&page);

        page[30] = !page[30];
        page[PS - 3] = !page[PS - 3];

        assert_eq!(page_checksum_crc32c(&page), crc_before);
        assert_eq!(page_checksum_innodb(&page), fold_before);
    }

    #[test]
    fn test_old_checksum_covers_header_only() {
        let mut page = sample_page();
        let old = page_checksum_innodb_old(&page);
        page[100] = !page[100];
        assert_eq!(page_checksum_innodb_old(&page), old);
        page[10] = !page[10];
        assert_ne!(page_checksum_innodb_old(&page), old);
    }
}
