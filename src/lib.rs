//! Read-only forensic parser for InnoDB on-disk file formats.
//!
//! The `innodb-inspect` crate (library name `ibd`) parses the physical
//! structures of MySQL's InnoDB storage engine: tablespace files (`.ibd`,
//! `ibdata1`) and redo log files (`ib_logfile*`). Pages, extents, segments,
//! indexes, records, undo logs, and redo records are exposed as navigable
//! Rust types so that structure can be inspected, checksums validated,
//! B+Trees walked, and records decoded against a schema description.
//!
//! Nothing here writes to disk. There is no recovery execution, no
//! transactional interpretation, and no support for live servers — this is
//! a parser for bytes at rest.
//!
//! # Library API
//!
//! ```no_run
//! use ibd::innodb::space::Space;
//! use ibd::innodb::page::TypedPage;
//!
//! // Open a tablespace (page size is auto-detected from page 0)
//! let space = Space::open("ibdata1").unwrap();
//! println!("{} pages of {} bytes", space.pages(), space.page_size());
//!
//! // Read and dispatch a page
//! let page = space.page(0).unwrap().unwrap();
//! if let TypedPage::FspHdr(fsp) = page.typed() {
//!     let header = fsp.fsp_header().unwrap();
//!     println!("space {} has {} pages", header.space_id, header.size);
//! }
//! ```
//!
//! ## Key entry points
//!
//! | Type / Function | Purpose |
//! |-----------------|---------|
//! | [`Space`](innodb::space::Space) | Open a tablespace file, read pages, iterate |
//! | [`Page`](innodb::page::Page) | One page: FIL envelope, checksum state, typed dispatch |
//! | [`Index`](innodb::btree::Index) | B+Tree navigation, record cursors, key search |
//! | [`RecordDescriber`](innodb::describer::RecordDescriber) | Schema description used to decode records |
//! | [`System`](innodb::system::System) | Multiple spaces + the data dictionary |
//! | [`LogGroup`](innodb::redo::LogGroup) | Redo log files as one LSN-addressed stream |
//! | [`LogReader`](innodb::redo::LogReader) | Iterate reassembled redo records |
//!
//! ## CLI front-ends
//!
//! Two thin binaries are built with the default `cli` feature: `ibd-space`
//! (tablespace inspector) and `ibd-log` (redo log inspector). Both exit 0 on
//! success and non-zero on any fatal decode or checksum error. Setting the
//! `INNODB_DEBUG` environment variable enables verbose trace on stderr.

#[cfg(feature = "cli")]
pub mod cli;
pub mod innodb;
pub mod util;

use thiserror::Error;

/// Errors returned by `ibd` operations.
#[derive(Error, Debug)]
pub enum IbdError {
    /// An I/O error occurred (file open, read, or seek failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A cursor read past the end of a buffer, or a buffer had the wrong size.
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Neither checksum algorithm validates the stored value.
    #[error("Checksum mismatch: {0}")]
    ChecksumMismatch(String),

    /// A page type, redo record type, or column type is not in the dispatch table.
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// A textual data-type specification could not be parsed.
    #[error("Invalid type specification: {0}")]
    InvalidSpecification(String),

    /// No record describer was supplied for a requested index.
    #[error("Schema missing: {0}")]
    SchemaMissing(String),

    /// A self-describing data dictionary table failed to parse.
    #[error("Dictionary corruption: {0}")]
    DictionaryCorruption(String),

    /// A walked list length disagrees with its list base.
    #[error("List length mismatch: {0}")]
    ListLengthMismatch(String),

    /// An invalid argument was supplied (out-of-range page number, bad option).
    #[error("Invalid argument: {0}")]
    Argument(String),
}
