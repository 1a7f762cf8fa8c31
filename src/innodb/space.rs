//! File-backed, page-addressable tablespace access.
//!
//! [`Space`] opens one tablespace file read-only and hands out [`Page`]s by
//! number. The page size is discovered from the FSP flags on page 0 (16 KiB
//! when absent); everything else is derived from it: the page count, the
//! spacing of XDES bookkeeping pages, and the mapping from any page number
//! to the extent descriptor covering it.
//!
//! A `Space` holds its file handle in a `RefCell`, so reads take `&self`
//! and a single instance must not be shared across threads. Callers that
//! want parallelism open one `Space` per thread.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::innodb::btree::Index;
use crate::innodb::describer::RecordDescriber;
use crate::innodb::fsp::{FspHeader, XdesEntry, PAGES_PER_EXTENT};
use crate::innodb::index_page::FsegHeader;
use crate::innodb::inode::{InodeEntry, InodePage, INODE_ARRAY_OFFSET, INODE_ENTRY_SIZE};
use crate::innodb::page::{Page, TypedPage};
use crate::innodb::page_types::PageType;
use crate::util;
use crate::IbdError;

/// Default InnoDB page size.
pub const DEFAULT_PAGE_SIZE: usize = 16384;

/// An open tablespace file.
pub struct Space {
    file: RefCell<File>,
    path: PathBuf,
    size: u64,
    page_size: usize,
    pages: u32,
    space_id: u32,
}

impl Space {
    /// Open a tablespace, discovering the page size from page 0.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IbdError> {
        Self::open_inner(path.as_ref(), None)
    }

    /// Open with an explicit page size, bypassing detection.
    pub fn open_with_page_size<P: AsRef<Path>>(
        path: P,
        page_size: usize,
    ) -> Result<Self, IbdError> {
        Self::open_inner(path.as_ref(), Some(page_size))
    }

    fn open_inner(path: &Path, forced_page_size: Option<usize>) -> Result<Self, IbdError> {
        let mut file = File::open(path)
            .map_err(|e| IbdError::Io(format!("cannot open {}: {}", path.display(), e)))?;
        let size = file
            .metadata()
            .map_err(|e| IbdError::Io(format!("cannot stat {}: {}", path.display(), e)))?
            .len();

        // Probe page 0 for the FSP flags and space ID.
        let probe_len = size.min(DEFAULT_PAGE_SIZE as u64) as usize;
        let mut probe = vec![0u8; probe_len];
        file.read_exact(&mut probe)
            .map_err(|e| IbdError::Io(format!("cannot read page 0 of {}: {}", path.display(), e)))?;

        let page_size = match forced_page_size {
            Some(explicit) => explicit,
            None => detect_page_size(&probe),
        };
        if size % page_size as u64 != 0 {
            util::trace(&format!(
                "space {}: {} bytes is not a whole number of {}-byte pages",
                path.display(),
                size,
                page_size
            ));
        }

        let space_id = if probe.len() >= 42 {
            u32::from_be_bytes([probe[34], probe[35], probe[36], probe[37]])
        } else {
            0
        };

        util::trace(&format!(
            "space {}: page_size={} pages={} space_id={}",
            path.display(),
            page_size,
            size / page_size as u64,
            space_id
        ));

        Ok(Space {
            file: RefCell::new(file),
            path: path.to_path_buf(),
            size,
            page_size,
            pages: (size / page_size as u64) as u32,
            space_id,
        })
    }

    /// The file path this space was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// The space ID read from page 0.
    pub fn space_id(&self) -> u32 {
        self.space_id
    }

    /// True for the system tablespace (space 0).
    pub fn is_system_space(&self) -> bool {
        self.space_id == 0
    }

    /// Pages covered by each XDES bookkeeping page.
    pub fn pages_per_bookkeeping_page(&self) -> u32 {
        self.page_size as u32
    }

    /// Read page `n`, or None past the end of the file.
    pub fn page(&self, n: u32) -> Result<Option<Page>, IbdError> {
        if n >= self.pages {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.page_size];
        {
            let mut file = self.file.borrow_mut();
            file.seek(SeekFrom::Start(n as u64 * self.page_size as u64))
                .map_err(|e| IbdError::Io(format!("cannot seek to page {}: {}", n, e)))?;
            file.read_exact(&mut buf)
                .map_err(|e| IbdError::Io(format!("cannot read page {}: {}", n, e)))?;
        }
        Ok(Some(Page::new(buf, self.page_size, n)?))
    }

    /// The file-space header from page 0.
    pub fn fsp_header(&self) -> Result<FspHeader, IbdError> {
        let page = self.page(0)?.ok_or_else(|| {
            IbdError::InvalidBuffer(format!("{} has no page 0", self.path.display()))
        })?;
        FspHeader::parse(&page)
    }

    /// Iterate all pages in ascending order. The iterator is restartable:
    /// calling this again yields a fresh pass.
    pub fn each_page(&self) -> impl Iterator<Item = Result<(u32, Page), IbdError>> + '_ {
        (0..self.pages).map(move |n| {
            let page = self.page(n)?.ok_or_else(|| {
                IbdError::Io(format!("page {} vanished during iteration", n))
            })?;
            Ok((n, page))
        })
    }

    /// Page numbers of the XDES bookkeeping pages.
    pub fn xdes_page_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        let stride = self.pages_per_bookkeeping_page();
        (0..).map(move |k| k * stride).take_while(move |&n| n < self.pages)
    }

    /// Iterate the XDES bookkeeping pages themselves.
    pub fn each_xdes_page(&self) -> impl Iterator<Item = Result<Page, IbdError>> + '_ {
        self.xdes_page_numbers().map(move |n| {
            self.page(n)?.ok_or_else(|| {
                IbdError::Io(format!("bookkeeping page {} vanished", n))
            })
        })
    }

    /// The extent descriptor covering page `n`.
    pub fn xdes_for_page(&self, n: u32) -> Result<XdesEntry, IbdError> {
        if n >= self.pages {
            return Err(IbdError::Argument(format!(
                "page {} beyond the {}-page space",
                n, self.pages
            )));
        }
        let stride = self.pages_per_bookkeeping_page();
        let bookkeeping = (n / stride) * stride;
        let entry = ((n % stride) / PAGES_PER_EXTENT) as usize;
        let page = self.page(bookkeeping)?.ok_or_else(|| {
            IbdError::Io(format!("bookkeeping page {} vanished", bookkeeping))
        })?;
        match page.typed() {
            TypedPage::FspHdr(fsp) | TypedPage::Xdes(fsp) => fsp.xdes_entry(entry),
            _ => Err(IbdError::UnknownType(format!(
                "page {} is not an FSP_HDR/XDES page (type {})",
                bookkeeping,
                page.page_type()
            ))),
        }
    }

    /// Resolve an FSEG header to its inode entry.
    pub fn inode_at(&self, fseg: &FsegHeader) -> Result<InodeEntry, IbdError> {
        let page = self.page(fseg.page_number)?.ok_or_else(|| {
            IbdError::Argument(format!(
                "FSEG header points past the space at page {}",
                fseg.page_number
            ))
        })?;
        let offset = fseg.offset as usize;
        if offset < INODE_ARRAY_OFFSET
            || (offset - INODE_ARRAY_OFFSET) % INODE_ENTRY_SIZE != 0
        {
            return Err(IbdError::InvalidBuffer(format!(
                "FSEG header offset {} is not an inode slot",
                offset
            )));
        }
        InodePage::new(&page).inode_at((offset - INODE_ARRAY_OFFSET) / INODE_ENTRY_SIZE)
    }

    /// An index handle rooted at `root_page`, decoding records with
    /// `describer`.
    pub fn index(&self, root_page: u32, describer: RecordDescriber) -> Index<'_> {
        Index::new(self, root_page, describer)
    }

    /// Run-length summary of the page-type sequence.
    pub fn page_type_regions(&self) -> Result<Vec<PageTypeRegion>, IbdError> {
        let mut regions: Vec<PageTypeRegion> = Vec::new();
        for entry in self.each_page() {
            let (n, page) = entry?;
            let page_type = page.page_type();
            match regions.last_mut() {
                Some(last) if last.page_type == page_type => {
                    last.end = n;
                    last.count += 1;
                }
                _ => regions.push(PageTypeRegion {
                    start: n,
                    end: n,
                    page_type,
                    count: 1,
                }),
            }
        }
        Ok(regions)
    }
}

/// A maximal run of consecutive pages sharing one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageTypeRegion {
    pub start: u32,
    pub end: u32,
    pub page_type: PageType,
    pub count: u32,
}

/// Detect the page size from the FSP flags in a page-0 buffer, falling
/// back to 16 KiB.
fn detect_page_size(probe: &[u8]) -> usize {
    if probe.len() < 58 {
        return DEFAULT_PAGE_SIZE;
    }
    let flags = u32::from_be_bytes([probe[54], probe[55], probe[56], probe[57]]);
    let ssize = (flags >> 6) & 0x0F;
    if ssize == 0 {
        return DEFAULT_PAGE_SIZE;
    }
    let size = 1usize << (ssize + 9);
    if (4096..=65536).contains(&size) {
        size
    } else {
        DEFAULT_PAGE_SIZE
    }
}
