//! The `ibd-log` redo log inspector.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::innodb::log::LogFile;
use crate::innodb::redo::{LogGroup, LogRecordPayload};
use crate::IbdError;

/// Inspect InnoDB redo log files.
#[derive(Parser)]
#[command(name = "ibd-log")]
#[command(about = "Inspect InnoDB redo log files")]
#[command(version)]
pub struct Cli {
    /// A redo log file; repeat in group order (-f ib_logfile0 -f ib_logfile1)
    #[arg(short = 'f', long = "file", required = true)]
    pub files: Vec<PathBuf>,

    /// Emit records as JSON lines
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show each file's header
    Header,
    /// Show both checkpoint slots and the selected checkpoint
    Checkpoints,
    /// One line per written block: number, data length, first record group
    Blocks,
    /// Decode records, starting at the checkpoint (or --lsn)
    Records {
        /// Start LSN (default: the live checkpoint's LSN)
        #[arg(long)]
        lsn: Option<u64>,
    },
}

/// Run a parsed command line against its log group.
pub fn execute(cli: &Cli, writer: &mut dyn Write) -> Result<(), IbdError> {
    let files = cli
        .files
        .iter()
        .map(|path| {
            LogFile::open(path.to_str().ok_or_else(|| {
                IbdError::Argument(format!("non-UTF-8 path {:?}", path))
            })?)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let group = LogGroup::new(files)?;

    match &cli.command {
        Command::Header => header(&group, writer),
        Command::Checkpoints => checkpoints(&group, writer),
        Command::Blocks => blocks(&group, writer),
        Command::Records { lsn } => records(&group, *lsn, cli.json, writer),
    }
}

fn out(writer: &mut dyn Write, line: &str) -> Result<(), IbdError> {
    writeln!(writer, "{}", line).map_err(|e| IbdError::Io(format!("write failed: {}", e)))
}

fn header(group: &LogGroup, writer: &mut dyn Write) -> Result<(), IbdError> {
    for (i, file) in group.files().iter().enumerate() {
        let header = file.header()?;
        out(writer, &format!("file {}:", i))?;
        out(writer, &format!("  group id:   {}", header.group_id))?;
        out(writer, &format!("  start lsn:  {}", header.start_lsn))?;
        out(writer, &format!("  file no:    {}", header.file_no))?;
        out(writer, &format!("  created by: {}", header.created_by))?;
        out(writer, &format!("  capacity:   {}", file.capacity()))?;
    }
    out(writer, &format!("group capacity: {}", group.capacity()))
}

fn checkpoints(group: &LogGroup, writer: &mut dyn Write) -> Result<(), IbdError> {
    for slot in 0..2u8 {
        let checkpoint = group.files()[0].checkpoint(slot)?;
        let valid = if checkpoint.checksums_valid {
            "valid".green()
        } else {
            "invalid".red()
        };
        out(
            writer,
            &format!(
                "slot {}: number {} lsn {} offset {} archived {} fsp_magic {} ({})",
                slot,
                checkpoint.number,
                checkpoint.lsn,
                checkpoint.lsn_offset,
                checkpoint.archived_lsn,
                checkpoint.fsp_magic,
                valid
            ),
        )?;
    }
    let live = group.checkpoint()?;
    out(
        writer,
        &format!("selected: number {} lsn {}", live.number, live.lsn),
    )
}

fn blocks(group: &LogGroup, writer: &mut dyn Write) -> Result<(), IbdError> {
    out(
        writer,
        &format!("{:>6} {:>10} {:>9} {:>13} {:>9}", "FILE", "BLOCK", "DATA_LEN", "FIRST_REC_GRP", "CHECKSUM"),
    )?;
    for (i, file) in group.files().iter().enumerate() {
        for n in 0..file.block_count() {
            let block = file.block(n)?;
            if block.is_empty() {
                continue;
            }
            let header = block.header()?;
            let checksum = if block.checksum_valid() {
                "ok".to_string()
            } else {
                "FAIL".to_string()
            };
            out(
                writer,
                &format!(
                    "{:>6} {:>10} {:>9} {:>13} {:>9}",
                    i,
                    header.block_number,
                    header.data_length(),
                    header.first_rec_group,
                    checksum
                ),
            )?;
        }
    }
    Ok(())
}

fn records(
    group: &LogGroup,
    lsn: Option<u64>,
    json: bool,
    writer: &mut dyn Write,
) -> Result<(), IbdError> {
    let start = match lsn {
        Some(lsn) => lsn,
        None => group.checkpoint()?.lsn,
    };
    let mut reader = group.reader_at(start)?;
    while let Some(record) = reader.record()? {
        if json {
            let line = serde_json::to_string(&record)
                .map_err(|e| IbdError::Io(format!("JSON encode failed: {}", e)))?;
            out(writer, &line)?;
        } else {
            let target = match (record.space_id, record.page_number) {
                (Some(space), Some(page)) => format!("space {} page {}", space, page),
                _ => "-".to_string(),
            };
            let note = match &record.payload {
                LogRecordPayload::Insert(insert) => {
                    format!(" page_offset={} len={}", insert.page_offset, insert.end_seg_len)
                }
                LogRecordPayload::Write { page_offset, value } => {
                    format!(" page_offset={} value={}", page_offset, value)
                }
                LogRecordPayload::PageOffset { page_offset, .. } => {
                    format!(" page_offset={}", page_offset)
                }
                _ => String::new(),
            };
            out(
                writer,
                &format!(
                    "lsn {:>12} size {:>5} {:<26} {}{}",
                    record.start_lsn,
                    record.size,
                    record.record_type.name(),
                    target,
                    note
                ),
            )?;
        }
    }
    Ok(())
}
