//! CLI subcommand implementations for the `ibd-space` and `ibd-log`
//! binaries.
//!
//! Both front-ends are thin adapters over the library: each subcommand is
//! an `Options` struct plus an `execute(opts, writer)` entry point writing
//! text tables, CSV, or JSON to the supplied `Write`. The binaries exit 0
//! on success and 1 when a subcommand returns an error.

pub mod log;
pub mod space;
