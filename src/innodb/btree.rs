//! B+Tree navigation, record cursors, and key search.
//!
//! An [`Index`] is a handle on one B+Tree: a space, a root page number, and
//! the [`RecordDescriber`] needed to decode its records. It descends levels
//! through node pointer records, iterates leaf records in either direction
//! across sibling pages, and answers key lookups two ways:
//!
//! - [`Index::linear_search`] scans records in order at every level.
//! - [`Index::binary_search`] bisects the page directory (each slot owns a
//!   group of 4-8 records) and linear-scans only within the located group.
//!
//! Both must return the same record for the same key; the binary variant
//! just pays an order of magnitude fewer key comparisons. Comparison counts
//! go into an explicit [`Stats`] collector passed by the caller — there is
//! deliberately no global counter.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::innodb::data_types::Value;
use crate::innodb::describer::RecordDescriber;
use crate::innodb::index_page::{IndexPage, RowFormat};
use crate::innodb::page::Page;
use crate::innodb::record::{Record, RecordReader, RecordType};
use crate::innodb::space::Space;
use crate::IbdError;

/// A counter bag for measuring search work. Callers reset between
/// measurements.
#[derive(Debug, Default)]
pub struct Stats {
    counters: HashMap<&'static str, u64>,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    /// Add one to a counter.
    pub fn increment(&mut self, name: &'static str) {
        *self.counters.entry(name).or_insert(0) += 1;
    }

    /// Current value of a counter (0 if never touched).
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Clear all counters.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}

/// Counter name for key comparisons performed by searches.
pub const STAT_COMPARE_KEY: &str = "compare_key";

/// Iteration direction for a [`RecordCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    Forward,
    Backward,
}

/// Starting position for a [`RecordCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPosition {
    /// The leftmost record of the leaf level.
    Min,
    /// The rightmost record of the leaf level.
    Max,
    /// A specific record origin on a specific page.
    At { page: u32, origin: usize },
}

/// A handle on one B+Tree within a space.
pub struct Index<'a> {
    space: &'a Space,
    root_page: u32,
    describer: RecordDescriber,
}

/// One loaded page together with its decode context.
struct LoadedPage {
    page: Page,
    leaf: bool,
    format: RowFormat,
    infimum: usize,
    supremum: usize,
    n_dir_slots: u16,
}

impl<'a> Index<'a> {
    /// Create a handle. The describer is the schema authority for every
    /// record this index decodes.
    pub fn new(space: &'a Space, root_page: u32, describer: RecordDescriber) -> Self {
        Index {
            space,
            root_page,
            describer,
        }
    }

    /// The root page number.
    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    /// The schema in use.
    pub fn describer(&self) -> &RecordDescriber {
        &self.describer
    }

    fn load(&self, page_number: u32) -> Result<LoadedPage, IbdError> {
        let page = self.space.page(page_number)?.ok_or_else(|| {
            IbdError::Argument(format!(
                "index page {} is beyond the space",
                page_number
            ))
        })?;
        let view = IndexPage::new(&page);
        let header = view.header()?;
        let infimum = view.infimum_origin()?;
        let supremum = view.supremum_origin()?;
        Ok(LoadedPage {
            leaf: header.is_leaf(),
            format: header.format(),
            infimum,
            supremum,
            n_dir_slots: header.n_dir_slots,
            page,
        })
    }

    fn reader<'p>(&'p self, loaded: &'p LoadedPage) -> RecordReader<'p> {
        RecordReader::new(&loaded.page, &self.describer, loaded.format, loaded.leaf)
    }

    /// Level of the root page, i.e. the tree height minus one.
    pub fn root_level(&self) -> Result<u16, IbdError> {
        let root = self.load(self.root_page)?;
        IndexPage::new(&root.page).header().map(|h| h.level)
    }

    /// Descend via leftmost child pointers to the first page at `level`.
    pub fn min_page_at_level(&self, level: u16) -> Result<Page, IbdError> {
        self.edge_page_at_level(level, true)
    }

    /// Descend via rightmost child pointers to the last page at `level`.
    pub fn max_page_at_level(&self, level: u16) -> Result<Page, IbdError> {
        self.edge_page_at_level(level, false)
    }

    fn edge_page_at_level(&self, level: u16, leftmost: bool) -> Result<Page, IbdError> {
        let mut current = self.load(self.root_page)?;
        loop {
            let header = IndexPage::new(&current.page).header()?;
            if header.level == level {
                return Ok(current.page);
            }
            if header.level < level {
                return Err(IbdError::Argument(format!(
                    "level {} above the root (root level {})",
                    level, header.level
                )));
            }
            let reader = self.reader(&current);
            let edge = if leftmost {
                self.first_user_record(&current, &reader)?
            } else {
                self.last_user_record(&current, &reader)?
            };
            let child = edge
                .and_then(|record| record.child_page_number)
                .ok_or_else(|| {
                    IbdError::InvalidBuffer(format!(
                        "non-leaf page {} has no usable node pointer",
                        current.page.number()
                    ))
                })?;
            current = self.load(child)?;
        }
    }

    /// The leftmost record at the leaf level.
    pub fn min_record(&self) -> Result<Option<Record>, IbdError> {
        let loaded = self.wrap_loaded(self.min_page_at_level(0)?)?;
        let reader = self.reader(&loaded);
        self.first_user_record(&loaded, &reader)
    }

    /// The rightmost record at the leaf level.
    pub fn max_record(&self) -> Result<Option<Record>, IbdError> {
        let loaded = self.wrap_loaded(self.max_page_at_level(0)?)?;
        let reader = self.reader(&loaded);
        self.last_user_record(&loaded, &reader)
    }

    fn wrap_loaded(&self, page: Page) -> Result<LoadedPage, IbdError> {
        let view = IndexPage::new(&page);
        let header = view.header()?;
        let infimum = view.infimum_origin()?;
        let supremum = view.supremum_origin()?;
        Ok(LoadedPage {
            leaf: header.is_leaf(),
            format: header.format(),
            infimum,
            supremum,
            n_dir_slots: header.n_dir_slots,
            page,
        })
    }

    /// First user record of a page, or None when the page is empty.
    fn first_user_record(
        &self,
        loaded: &LoadedPage,
        reader: &RecordReader<'_>,
    ) -> Result<Option<Record>, IbdError> {
        let next = reader.header_at(loaded.infimum)?.next;
        match next {
            Some(origin) if origin != loaded.supremum => {
                Ok(Some(reader.try_record_at(origin)?))
            }
            _ => Ok(None),
        }
    }

    /// Last user record of a page: the record whose `next` is supremum.
    fn last_user_record(
        &self,
        loaded: &LoadedPage,
        reader: &RecordReader<'_>,
    ) -> Result<Option<Record>, IbdError> {
        let mut origin = match reader.header_at(loaded.infimum)?.next {
            Some(o) if o != loaded.supremum => o,
            _ => return Ok(None),
        };
        loop {
            let header = reader.header_at(origin)?;
            match header.next {
                Some(next) if next != loaded.supremum => origin = next,
                _ => return Ok(Some(reader.try_record_at(origin)?)),
            }
        }
    }

    /// A cursor over leaf records.
    pub fn cursor(
        &self,
        position: CursorPosition,
        direction: CursorDirection,
    ) -> Result<RecordCursor<'_, 'a>, IbdError> {
        let start = match position {
            CursorPosition::Min => self
                .min_record()?
                .map(|r| (r.page_number, r.offset)),
            CursorPosition::Max => self
                .max_record()?
                .map(|r| (r.page_number, r.offset)),
            CursorPosition::At { page, origin } => Some((page, origin)),
        };
        Ok(RecordCursor {
            index: self,
            direction,
            include_deleted: false,
            position: start,
            current: None,
        })
    }

    /// Compare a record's key fields to a search key, field by field. A
    /// search key shorter than the stored key compares as a prefix.
    fn compare_key(
        &self,
        record: &Record,
        key: &[Value],
        stats: &mut Stats,
    ) -> Result<Ordering, IbdError> {
        stats.increment(STAT_COMPARE_KEY);
        for (field, wanted) in record.key.iter().zip(key.iter()) {
            let ord = field.value.compare(wanted).ok_or_else(|| {
                IbdError::Argument(format!(
                    "search key is not comparable with field {}",
                    field.name
                ))
            })?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }

    /// Search by scanning records in order at every level. Returns the
    /// matching leaf record, or None when no record equals the key.
    pub fn linear_search(
        &self,
        key: &[Value],
        stats: &mut Stats,
    ) -> Result<Option<Record>, IbdError> {
        let mut loaded = self.load(self.root_page)?;
        loop {
            let reader = self.reader(&loaded);
            let start = reader.header_at(loaded.infimum)?.next;
            let candidate =
                self.scan_group(&loaded, &reader, start, None, key, stats)?;
            match self.step_down(loaded, candidate, key, stats)? {
                SearchStep::Done(result) => return Ok(result),
                SearchStep::Descend(next) => loaded = next,
            }
        }
    }

    /// Search by bisecting the page directory at every level, then scanning
    /// only the located 4-8 record group. Must agree with `linear_search`.
    pub fn binary_search(
        &self,
        key: &[Value],
        stats: &mut Stats,
    ) -> Result<Option<Record>, IbdError> {
        let mut loaded = self.load(self.root_page)?;
        loop {
            let reader = self.reader(&loaded);
            let view = IndexPage::new(&loaded.page);

            // Bisect the slots: lo stays ≤ key (slot 0 is infimum, treated
            // as -inf), hi stays > key (the last slot is supremum, +inf).
            let mut lo: u16 = 0;
            let mut hi: u16 = loaded.n_dir_slots.saturating_sub(1);
            while lo + 1 < hi {
                let mid = (lo + hi) / 2;
                let origin = view.directory_slot(mid)? as usize;
                let record = reader.try_record_at(origin)?;
                match self.compare_key(&record, key, stats)? {
                    Ordering::Greater => hi = mid,
                    _ => lo = mid,
                }
            }

            // Scan the owned group: from the record at slot lo (or infimum)
            // up to and including the record at slot hi.
            let start = if lo == 0 {
                reader.header_at(loaded.infimum)?.next
            } else {
                Some(view.directory_slot(lo)? as usize)
            };
            let stop = view.directory_slot(hi)? as usize;
            let candidate =
                self.scan_group(&loaded, &reader, start, Some(stop), key, stats)?;
            match self.step_down(loaded, candidate, key, stats)? {
                SearchStep::Done(result) => return Ok(result),
                SearchStep::Descend(next) => loaded = next,
            }
        }
    }

    /// Scan records from `start` (an origin) while they compare ≤ key,
    /// returning the greatest such record. Stops after `stop` when given.
    fn scan_group(
        &self,
        loaded: &LoadedPage,
        reader: &RecordReader<'_>,
        start: Option<usize>,
        stop: Option<usize>,
        key: &[Value],
        stats: &mut Stats,
    ) -> Result<Option<Record>, IbdError> {
        let mut candidate: Option<Record> = None;
        let mut next = start;
        while let Some(origin) = next {
            if origin == loaded.supremum {
                break;
            }
            let record = reader.try_record_at(origin)?;
            if record.header.record_type == RecordType::Supremum {
                break;
            }
            // The first node pointer of a non-leaf page acts as -inf: it
            // is the fallback candidate even when its key is larger.
            let is_floor = !loaded.leaf && candidate.is_none() && record.header.min_rec;
            let ord = self.compare_key(&record, key, stats)?;
            if ord == Ordering::Greater && !is_floor {
                break;
            }
            next = record.header.next;
            let at_stop = stop == Some(record.offset);
            candidate = Some(record);
            if at_stop {
                break;
            }
        }
        Ok(candidate)
    }

    fn step_down(
        &self,
        loaded: LoadedPage,
        candidate: Option<Record>,
        key: &[Value],
        stats: &mut Stats,
    ) -> Result<SearchStep, IbdError> {
        if loaded.leaf {
            // Leaf level: equality or nothing. Deleted records stay
            // invisible to search.
            let matched = match candidate {
                Some(record)
                    if !record.header.deleted
                        && self.compare_key(&record, key, stats)? == Ordering::Equal =>
                {
                    Some(record)
                }
                _ => None,
            };
            return Ok(SearchStep::Done(matched));
        }

        let child = match candidate {
            Some(record) => record.child_page_number,
            None => {
                // Key below every node pointer: follow the leftmost child.
                let reader = self.reader(&loaded);
                self.first_user_record(&loaded, &reader)?
                    .and_then(|r| r.child_page_number)
            }
        };
        let child = child.ok_or_else(|| {
            IbdError::InvalidBuffer(format!(
                "no child pointer to descend from page {}",
                loaded.page.number()
            ))
        })?;
        Ok(SearchStep::Descend(self.load(child)?))
    }
}

enum SearchStep {
    Done(Option<Record>),
    Descend(LoadedPage),
}

/// A position-and-direction cursor over leaf records.
///
/// Deleted records are skipped unless [`RecordCursor::include_deleted`]
/// opts in. Crossing a page boundary follows the sibling pointers; the
/// supremum of one page conceptually links to the next page's infimum.
pub struct RecordCursor<'i, 'a> {
    index: &'i Index<'a>,
    direction: CursorDirection,
    include_deleted: bool,
    /// The record to return on the next call.
    position: Option<(u32, usize)>,
    current: Option<LoadedPage>,
}

impl RecordCursor<'_, '_> {
    /// Surface delete-marked records instead of skipping them.
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    fn ensure_page(&mut self, page_number: u32) -> Result<(), IbdError> {
        let stale = match &self.current {
            Some(loaded) => loaded.page.number() != page_number,
            None => true,
        };
        if stale {
            self.current = Some(self.index.load(page_number)?);
        }
        Ok(())
    }

    /// Return the record at the cursor and advance one step. Returns None
    /// past the end of the index.
    pub fn record(&mut self) -> Result<Option<Record>, IbdError> {
        loop {
            let Some((page_number, origin)) = self.position else {
                return Ok(None);
            };
            self.ensure_page(page_number)?;
            let loaded = self.current.as_ref().ok_or_else(|| {
                IbdError::Io(format!("cursor lost page {}", page_number))
            })?;
            let reader = self.index.reader(loaded);
            let record = reader.record_at(origin);

            self.position = if record.corrupt {
                // Cannot follow links out of a corrupt record; resume on
                // the sibling page so iteration continues.
                self.jump_page(loaded)?
            } else {
                match self.direction {
                    CursorDirection::Forward => self.advance_forward(loaded, &record)?,
                    CursorDirection::Backward => self.advance_backward(loaded, &record)?,
                }
            };

            if record.header.deleted && !self.include_deleted {
                continue;
            }
            return Ok(Some(record));
        }
    }

    fn jump_page(&self, loaded: &LoadedPage) -> Result<Option<(u32, usize)>, IbdError> {
        match self.direction {
            CursorDirection::Forward => match loaded.page.next() {
                Some(next) => {
                    let sibling = self.index.load(next)?;
                    let reader = self.index.reader(&sibling);
                    Ok(self
                        .index
                        .first_user_record(&sibling, &reader)?
                        .map(|r| (next, r.offset)))
                }
                None => Ok(None),
            },
            CursorDirection::Backward => match loaded.page.prev() {
                Some(prev) => {
                    let sibling = self.index.load(prev)?;
                    let reader = self.index.reader(&sibling);
                    Ok(self
                        .index
                        .last_user_record(&sibling, &reader)?
                        .map(|r| (prev, r.offset)))
                }
                None => Ok(None),
            },
        }
    }

    fn advance_forward(
        &self,
        loaded: &LoadedPage,
        record: &Record,
    ) -> Result<Option<(u32, usize)>, IbdError> {
        match record.header.next {
            Some(next) if next != loaded.supremum => Ok(Some((loaded.page.number(), next))),
            _ => self.jump_page(loaded),
        }
    }

    fn advance_backward(
        &self,
        loaded: &LoadedPage,
        record: &Record,
    ) -> Result<Option<(u32, usize)>, IbdError> {
        // Records are singly linked; find the predecessor by walking from
        // infimum.
        let reader = self.index.reader(loaded);
        let mut previous: Option<usize> = None;
        let mut next = reader.header_at(loaded.infimum)?.next;
        while let Some(origin) = next {
            if origin == record.offset || origin == loaded.supremum {
                break;
            }
            previous = Some(origin);
            next = reader.header_at(origin)?.next;
        }
        match previous {
            Some(origin) => Ok(Some((loaded.page.number(), origin))),
            None => self.jump_page(loaded),
        }
    }
}
