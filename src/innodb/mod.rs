//! InnoDB binary format parsing.
//!
//! This module contains types and functions for reading the on-disk
//! structures used by MySQL's InnoDB storage engine: the per-page FIL
//! envelope, file-space and extent bookkeeping, segment inodes, B+Tree
//! index pages and their records, transaction system and undo pages, BLOB
//! chains, SDI metadata, and the redo log.
//!
//! Start with [`space::Space`] to open a tablespace file, or
//! [`redo::LogGroup`] to open a set of redo log files.

pub mod blob;
pub mod btree;
pub mod checksum;
pub mod cursor;
pub mod data_types;
pub mod describer;
pub mod dict;
pub mod fsp;
pub mod ibuf_bitmap;
pub mod index_page;
pub mod inode;
pub mod list;
pub mod log;
pub mod page;
pub mod page_types;
pub mod record;
pub mod redo;
pub mod sdi;
pub mod space;
pub mod system;
pub mod trx_sys;
pub mod undo;
