//! The `ibd-space` tablespace inspector.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::innodb::btree::{CursorDirection, CursorPosition};
use crate::innodb::describer::RecordDescriber;
use crate::innodb::page::TypedPage;
use crate::innodb::record::Field;
use crate::innodb::space::Space;
use crate::innodb::system::System;
use crate::innodb::{dict, sdi};
use crate::util::hex::hex_dump;
use crate::IbdError;

/// Inspect InnoDB tablespace files.
#[derive(Parser)]
#[command(name = "ibd-space")]
#[command(about = "Inspect InnoDB tablespace files")]
#[command(version)]
pub struct Cli {
    /// Path to the tablespace file (.ibd or ibdata1)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Data directory for per-table file lookups
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Record describer name for record decoding
    /// (SYS_TABLES, SYS_COLUMNS, SYS_INDEXES, SYS_FIELDS, SDI)
    #[arg(long)]
    pub describer: Option<String>,

    /// Override page size (default: auto-detect)
    #[arg(long = "page-size")]
    pub page_size: Option<usize>,

    /// Emit CSV instead of aligned text
    #[arg(long)]
    pub csv: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Space-level summary: FSP header and size accounting
    Summary,
    /// One line per page: number, type, LSN, checksum state
    Pages,
    /// Run-length summary of the page-type sequence
    PageTypes,
    /// Validate every page's checksum; fails on any mismatch
    Checksum,
    /// List allocated file segment inodes
    Inodes,
    /// Hex dump one page
    Dump {
        /// Page number to dump
        #[arg(short, long)]
        page: u32,
    },
    /// Decode the records of an index (requires --describer)
    Records {
        /// Root page of the index
        #[arg(short, long)]
        root: u32,

        /// Surface delete-marked records too
        #[arg(long)]
        include_deleted: bool,
    },
    /// List the tables of the data dictionary (system tablespace only)
    SysTables,
}

/// Run a parsed command line against its tablespace.
pub fn execute(cli: &Cli, writer: &mut dyn Write) -> Result<(), IbdError> {
    let space = match cli.page_size {
        Some(size) => Space::open_with_page_size(&cli.file, size)?,
        None => Space::open(&cli.file)?,
    };
    match &cli.command {
        Command::Summary => summary(&space, writer),
        Command::Pages => pages(&space, cli.csv, writer),
        Command::PageTypes => page_types(&space, cli.csv, writer),
        Command::Checksum => checksum(&space, writer),
        Command::Inodes => inodes(&space, writer),
        Command::Dump { page } => dump(&space, *page, writer),
        Command::Records {
            root,
            include_deleted,
        } => records(
            &space,
            cli.describer.as_deref(),
            *root,
            *include_deleted,
            writer,
        ),
        Command::SysTables => sys_tables(cli, writer),
    }
}

/// Resolve a describer module name to its schema.
fn resolve_describer(name: &str) -> Result<RecordDescriber, IbdError> {
    match name.to_uppercase().as_str() {
        "SYS_TABLES" => dict::sys_tables_describer(),
        "SYS_COLUMNS" => dict::sys_columns_describer(),
        "SYS_INDEXES" => dict::sys_indexes_describer(),
        "SYS_FIELDS" => dict::sys_fields_describer(),
        "SDI" => sdi::sdi_describer(),
        other => Err(IbdError::SchemaMissing(format!(
            "no describer named {:?} (known: SYS_TABLES, SYS_COLUMNS, SYS_INDEXES, SYS_FIELDS, SDI)",
            other
        ))),
    }
}

fn out(writer: &mut dyn Write, line: &str) -> Result<(), IbdError> {
    writeln!(writer, "{}", line).map_err(|e| IbdError::Io(format!("write failed: {}", e)))
}

fn summary(space: &Space, writer: &mut dyn Write) -> Result<(), IbdError> {
    let fsp = space.fsp_header()?;
    out(writer, &format!("file:            {}", space.path().display()))?;
    out(writer, &format!("page size:       {}", space.page_size()))?;
    out(writer, &format!("pages:           {}", space.pages()))?;
    out(writer, &format!("size:            {}", space.size()))?;
    out(writer, &format!("space id:        {}", fsp.space_id))?;
    out(writer, &format!("fsp size:        {}", fsp.size))?;
    out(writer, &format!("free limit:      {}", fsp.free_limit))?;
    out(writer, &format!("frag pages used: {}", fsp.frag_n_used))?;
    out(writer, &format!("free extents:    {}", fsp.free.length))?;
    out(writer, &format!("free frag:       {}", fsp.free_frag.length))?;
    out(writer, &format!("full frag:       {}", fsp.full_frag.length))?;
    out(writer, &format!("next seg id:     {}", fsp.first_unused_seg))?;
    out(
        writer,
        &format!("system space:    {}", space.is_system_space()),
    )
}

fn pages(space: &Space, csv: bool, writer: &mut dyn Write) -> Result<(), IbdError> {
    if csv {
        out(writer, "page,type,lsn,checksum_ok")?;
    } else {
        out(writer, &format!("{:>8}  {:<14} {:>14}  {}", "PAGE", "TYPE", "LSN", "CHECKSUM"))?;
    }
    for entry in space.each_page() {
        let (n, page) = entry?;
        let ok = !page.checksum_result().corrupt() || page.freshly_allocated();
        if csv {
            out(
                writer,
                &format!("{},{},{},{}", n, page.page_type(), page.lsn(), ok),
            )?;
        } else {
            let status = if ok { "ok".green() } else { "FAIL".red() };
            out(
                writer,
                &format!(
                    "{:>8}  {:<14} {:>14}  {}",
                    n,
                    page.page_type().to_string(),
                    page.lsn(),
                    status
                ),
            )?;
        }
    }
    Ok(())
}

fn page_types(space: &Space, csv: bool, writer: &mut dyn Write) -> Result<(), IbdError> {
    if csv {
        out(writer, "start,end,count,type")?;
    } else {
        out(writer, &format!("{:>8} {:>8} {:>8}  TYPE", "START", "END", "COUNT"))?;
    }
    for region in space.page_type_regions()? {
        if csv {
            out(
                writer,
                &format!(
                    "{},{},{},{}",
                    region.start, region.end, region.count, region.page_type
                ),
            )?;
        } else {
            out(
                writer,
                &format!(
                    "{:>8} {:>8} {:>8}  {}",
                    region.start, region.end, region.count, region.page_type
                ),
            )?;
        }
    }
    Ok(())
}

fn checksum(space: &Space, writer: &mut dyn Write) -> Result<(), IbdError> {
    let mut failures = 0u32;
    for entry in space.each_page() {
        let (n, page) = entry?;
        if page.freshly_allocated() {
            continue;
        }
        let result = page.checksum_result();
        if result.corrupt() {
            failures += 1;
            out(
                writer,
                &format!(
                    "page {}: stored {:#010x}, crc32c {:#010x}, innodb {:#010x}",
                    n, result.stored, result.crc32c, result.innodb
                ),
            )?;
        }
    }
    if failures > 0 {
        return Err(IbdError::ChecksumMismatch(format!(
            "{} page(s) failed checksum validation",
            failures
        )));
    }
    out(writer, &format!("{}", "all pages ok".green()))
}

fn inodes(space: &Space, writer: &mut dyn Write) -> Result<(), IbdError> {
    out(
        writer,
        &format!("{:>8} {:>10} {:>6} {:>9} {:>9} {:>6}  FRAG", "PAGE", "FSEG", "USED", "NOT_FULL", "FULL", "FREE"),
    )?;
    for entry in space.each_page() {
        let (n, page) = entry?;
        let TypedPage::Inode(inode_page) = page.typed() else {
            continue;
        };
        for inode in inode_page.each_allocated_inode() {
            let inode = inode?;
            if !inode.magic_valid() {
                out(writer, &format!("page {}: inode with bad magic", n))?;
                continue;
            }
            out(
                writer,
                &format!(
                    "{:>8} {:>10} {:>6} {:>9} {:>9} {:>6}  {}",
                    n,
                    inode.fseg_id,
                    inode.not_full_n_used,
                    inode.not_full.length,
                    inode.full.length,
                    inode.free.length,
                    inode.used_fragment_pages().count()
                ),
            )?;
        }
    }
    Ok(())
}

fn dump(space: &Space, page_number: u32, writer: &mut dyn Write) -> Result<(), IbdError> {
    let page = space.page(page_number)?.ok_or_else(|| {
        IbdError::Argument(format!(
            "page {} beyond the {}-page space",
            page_number,
            space.pages()
        ))
    })?;
    out(writer, &hex_dump(page.data(), 0))
}

fn field_list(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| format!("{}={}", f.name, f.value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn records(
    space: &Space,
    describer_name: Option<&str>,
    root: u32,
    include_deleted: bool,
    writer: &mut dyn Write,
) -> Result<(), IbdError> {
    let name = describer_name.ok_or_else(|| {
        IbdError::SchemaMissing("record decoding needs --describer <name>".to_string())
    })?;
    let index = space.index(root, resolve_describer(name)?);
    let mut cursor = index
        .cursor(CursorPosition::Min, CursorDirection::Forward)?
        .include_deleted(include_deleted);

    while let Some(record) = cursor.record()? {
        let mut line = format!(
            "page {:>6} offset {:>6}  ({})",
            record.page_number,
            record.offset,
            field_list(&record.key)
        );
        if let Some(trx_id) = record.transaction_id {
            line.push_str(&format!("  trx {}", trx_id));
        }
        if !record.row.is_empty() {
            line.push_str(&format!("  -> ({})", field_list(&record.row)));
        }
        if record.header.deleted {
            line.push_str(&format!("  {}", "[deleted]".yellow()));
        }
        if record.corrupt {
            line.push_str(&format!("  {}", "[corrupt]".red()));
        }
        out(writer, &line)?;
    }
    Ok(())
}

fn sys_tables(cli: &Cli, writer: &mut dyn Write) -> Result<(), IbdError> {
    let system = System::open(&cli.file, cli.data_dir.as_deref())?;
    out(
        writer,
        &format!("{:>10} {:>8} {:>8}  NAME", "ID", "N_COLS", "SPACE"),
    )?;
    for table in system.data_dictionary()?.tables()? {
        out(
            writer,
            &format!(
                "{:>10} {:>8} {:>8}  {}",
                table.id, table.n_cols, table.space, table.name
            ),
        )?;
    }
    for orphan in system.orphans()? {
        out(writer, &format!("orphan: {}", orphan.yellow()))?;
    }
    Ok(())
}
