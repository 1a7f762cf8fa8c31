//! Redo log files: block framing, file header, checkpoints.
//!
//! A redo log file is a 2048-byte header (group ID, start LSN, file number,
//! 32-byte creator string) with two checkpoint structs at byte offsets 512
//! and 1536, followed by 512-byte log blocks. Each block is a 12-byte
//! header (block number with a flush flag in the top bit, data length,
//! first-record-group offset, checkpoint number), 496 bytes of data, and a
//! 4-byte trailer holding the block checksum.
//!
//! The block checksum is InnoDB's shift-accumulate algorithm over the
//! first 508 bytes; checkpoint structs carry their own pair of fold
//! checksums.

use std::cell::RefCell;
use std::io::{Cursor as IoCursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::innodb::checksum::fold_bytes;
use crate::innodb::cursor::Cursor;
use crate::IbdError;

/// Size of a log block.
pub const LOG_BLOCK_SIZE: usize = 512;
/// Size of the block header.
pub const LOG_BLOCK_HEADER_SIZE: usize = 12;
/// Size of the block trailer.
pub const LOG_BLOCK_TRAILER_SIZE: usize = 4;
/// Data bytes per block.
pub const LOG_BLOCK_DATA_SIZE: usize =
    LOG_BLOCK_SIZE - LOG_BLOCK_HEADER_SIZE - LOG_BLOCK_TRAILER_SIZE;
/// Size of the per-file header area (4 blocks).
pub const LOG_FILE_HEADER_SIZE: usize = 2048;
/// Byte offset of the first checkpoint slot.
pub const LOG_CHECKPOINT_1: usize = 512;
/// Byte offset of the second checkpoint slot.
pub const LOG_CHECKPOINT_2: usize = 1536;
/// Flush flag bit in the block number field.
pub const LOG_BLOCK_FLUSH_BIT: u32 = 0x8000_0000;
/// Expected value of the checkpoint's FSP magic field.
pub const LOG_CHECKPOINT_FSP_MAGIC: u32 = 1_441_231_243;
/// Rollback/checkpoint group array slots.
pub const LOG_MAX_N_GROUPS: usize = 32;

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Compute the log block checksum over the first 508 bytes.
///
/// The running sum is masked to 31 bits and accumulates each byte twice,
/// once shifted by a rotating 0..=24 amount.
pub fn block_checksum(block: &[u8]) -> u32 {
    let mut sum: u32 = 1;
    let mut shift: u32 = 0;
    for &byte in &block[..LOG_BLOCK_SIZE - LOG_BLOCK_TRAILER_SIZE] {
        sum &= 0x7FFF_FFFF;
        sum = sum.wrapping_add(u32::from(byte));
        sum = sum.wrapping_add(u32::from(byte) << shift);
        shift += 1;
        if shift > 24 {
            shift = 0;
        }
    }
    sum
}

/// Parsed log file header (first block of the file).
#[derive(Debug, Clone, Serialize)]
pub struct LogFileHeader {
    /// Log group ID (always 0 in practice).
    pub group_id: u32,
    /// LSN of the first block of this file.
    pub start_lsn: u64,
    /// File number within the group.
    pub file_no: u32,
    /// Creator string ("MySQL x.y.z", or "ibbackup" after a hot backup).
    pub created_by: String,
}

impl LogFileHeader {
    /// Parse from the file's first 512 bytes.
    pub fn parse(block: &[u8]) -> Result<Self, IbdError> {
        let mut c = Cursor::new(block);
        c.name("log_file_header", |c| {
            let group_id = c.read_u32()?;
            let start_lsn = c.read_u64()?;
            let file_no = c.read_u32()?;
            let raw = c.read_bytes(32)?;
            let created_by = raw
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| b as char)
                .collect();
            Ok(LogFileHeader {
                group_id,
                start_lsn,
                file_no,
                created_by,
            })
        })
    }
}

/// Parsed log block header.
#[derive(Debug, Clone, Serialize)]
pub struct LogBlockHeader {
    /// Block number, flush bit masked off.
    pub block_number: u32,
    /// First block written in its flush batch.
    pub flush: bool,
    /// Bytes of log data in the block, headers included. Only 12 bits are
    /// significant; 0 means a full block.
    data_len_raw: u16,
    /// Offset of the first record group starting in this block; 0 if none.
    pub first_rec_group: u16,
    /// Low 32 bits of the checkpoint number the writer had seen.
    pub checkpoint_no: u32,
}

impl LogBlockHeader {
    /// Parse from a block buffer.
    pub fn parse(block: &[u8]) -> Result<Self, IbdError> {
        let mut c = Cursor::new(block);
        c.name("log_block_header", |c| {
            let raw_number = c.read_u32()?;
            Ok(LogBlockHeader {
                block_number: raw_number & !LOG_BLOCK_FLUSH_BIT,
                flush: raw_number & LOG_BLOCK_FLUSH_BIT != 0,
                data_len_raw: c.read_u16()?,
                first_rec_group: c.read_u16()?,
                checkpoint_no: c.read_u32()?,
            })
        })
    }

    /// Effective data length: the stored 12-bit value, where 0 means the
    /// block is full.
    pub fn data_length(&self) -> usize {
        match self.data_len_raw & 0x0FFF {
            0 => LOG_BLOCK_SIZE,
            len => len as usize,
        }
    }

    /// The raw stored data length field.
    pub fn data_length_raw(&self) -> u16 {
        self.data_len_raw
    }

    /// True when the block holds any log data beyond its header.
    pub fn has_data(&self) -> bool {
        self.data_len_raw != 0 || self.block_number != 0 || self.checkpoint_no != 0
    }
}

/// One 512-byte log block.
pub struct LogBlock {
    bytes: Vec<u8>,
}

impl LogBlock {
    /// Wrap a 512-byte buffer.
    pub fn new(bytes: Vec<u8>) -> Result<Self, IbdError> {
        if bytes.len() != LOG_BLOCK_SIZE {
            return Err(IbdError::InvalidBuffer(format!(
                "log block is {} bytes, expected {}",
                bytes.len(),
                LOG_BLOCK_SIZE
            )));
        }
        Ok(LogBlock { bytes })
    }

    /// The raw block bytes.
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    /// The parsed header.
    pub fn header(&self) -> Result<LogBlockHeader, IbdError> {
        LogBlockHeader::parse(&self.bytes)
    }

    /// The stored trailer checksum.
    pub fn stored_checksum(&self) -> u32 {
        BigEndian::read_u32(&self.bytes[LOG_BLOCK_SIZE - LOG_BLOCK_TRAILER_SIZE..])
    }

    /// True when the stored checksum matches the computed one.
    pub fn checksum_valid(&self) -> bool {
        self.stored_checksum() == block_checksum(&self.bytes)
    }

    /// True for a block that was never written (all zero).
    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

/// A checkpoint record.
#[derive(Debug, Clone, Serialize)]
pub struct Checkpoint {
    /// Monotonic checkpoint number; the larger of the two slots is the
    /// most recent.
    pub number: u64,
    /// LSN the checkpoint refers to.
    pub lsn: u64,
    /// Byte offset of that LSN within the group.
    pub lsn_offset: u32,
    /// Log buffer size at checkpoint time.
    pub buffer_size: u32,
    /// LSN up to which the log had been archived (`u64::MAX` when archiving
    /// was off).
    pub archived_lsn: u64,
    /// Per-group archive bookkeeping.
    pub group_array: Vec<CheckpointGroup>,
    /// Stored first checksum (over bytes 0..288).
    pub checksum_1: u32,
    /// Stored second checksum (over bytes 8..292).
    pub checksum_2: u32,
    /// FSP free limit at checkpoint time, in megabytes.
    pub fsp_free_limit: u32,
    /// FSP magic; 1441231243 in every genuine checkpoint.
    pub fsp_magic: u32,
    /// Whether both stored checksums validate.
    pub checksums_valid: bool,
}

/// One entry of the checkpoint's group array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointGroup {
    pub archived_file_no: u32,
    pub archived_offset: u32,
}

impl Checkpoint {
    /// Parse a checkpoint struct from a 512-byte slot buffer.
    pub fn parse(slot: &[u8]) -> Result<Self, IbdError> {
        let mut c = Cursor::new(slot);
        c.name("checkpoint", |c| {
            let number = c.read_u64()?;
            let lsn = c.read_u64()?;
            let lsn_offset = c.read_u32()?;
            let buffer_size = c.read_u32()?;
            let archived_lsn = c.read_u64()?;
            let mut group_array = Vec::with_capacity(LOG_MAX_N_GROUPS);
            for _ in 0..LOG_MAX_N_GROUPS {
                group_array.push(CheckpointGroup {
                    archived_file_no: c.read_u32()?,
                    archived_offset: c.read_u32()?,
                });
            }
            let checksum_1 = c.read_u32()?;
            let checksum_2 = c.read_u32()?;
            let fsp_free_limit = c.read_u32()?;
            let fsp_magic = c.read_u32()?;

            let checksums_valid = checksum_1 == fold_bytes(&slot[0..288])
                && checksum_2 == fold_bytes(&slot[8..292]);

            Ok(Checkpoint {
                number,
                lsn,
                lsn_offset,
                buffer_size,
                archived_lsn,
                group_array,
                checksum_1,
                checksum_2,
                fsp_free_limit,
                fsp_magic,
                checksums_valid,
            })
        })
    }

    /// Stamp the two fold checksums into a slot buffer (test support and
    /// fixture generation).
    pub fn stamp_checksums(slot: &mut [u8]) {
        let fold1 = fold_bytes(&slot[0..288]);
        BigEndian::write_u32(&mut slot[288..292], fold1);
        let fold2 = fold_bytes(&slot[8..292]);
        BigEndian::write_u32(&mut slot[292..296], fold2);
    }
}

/// One open redo log file.
pub struct LogFile {
    reader: RefCell<Box<dyn ReadSeek>>,
    size: u64,
}

impl LogFile {
    /// Open a log file read-only.
    pub fn open(path: &str) -> Result<Self, IbdError> {
        let file = std::fs::File::open(path)
            .map_err(|e| IbdError::Io(format!("cannot open {}: {}", path, e)))?;
        let size = file
            .metadata()
            .map_err(|e| IbdError::Io(format!("cannot stat {}: {}", path, e)))?
            .len();
        Self::from_reader(Box::new(file), size)
    }

    /// Wrap an in-memory buffer (fixtures and tests).
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, IbdError> {
        let size = data.len() as u64;
        Self::from_reader(Box::new(IoCursor::new(data)), size)
    }

    fn from_reader(reader: Box<dyn ReadSeek>, size: u64) -> Result<Self, IbdError> {
        if size < LOG_FILE_HEADER_SIZE as u64 + LOG_BLOCK_SIZE as u64 {
            return Err(IbdError::InvalidBuffer(format!(
                "{} bytes is too small for a redo log file",
                size
            )));
        }
        if size % LOG_BLOCK_SIZE as u64 != 0 {
            return Err(IbdError::InvalidBuffer(format!(
                "log file size {} is not a multiple of the block size",
                size
            )));
        }
        Ok(LogFile {
            reader: RefCell::new(reader),
            size,
        })
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Data capacity: everything after the per-file header.
    pub fn capacity(&self) -> u64 {
        self.size - LOG_FILE_HEADER_SIZE as u64
    }

    /// Number of data blocks (excluding the header area).
    pub fn block_count(&self) -> u64 {
        self.capacity() / LOG_BLOCK_SIZE as u64
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, IbdError> {
        if offset + len as u64 > self.size {
            return Err(IbdError::InvalidBuffer(format!(
                "read of {} bytes at offset {} exceeds the {}-byte log file",
                len, offset, self.size
            )));
        }
        let mut buf = vec![0u8; len];
        let mut reader = self.reader.borrow_mut();
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| IbdError::Io(format!("log seek failed: {}", e)))?;
        reader
            .read_exact(&mut buf)
            .map_err(|e| IbdError::Io(format!("log read failed: {}", e)))?;
        Ok(buf)
    }

    /// The parsed file header.
    pub fn header(&self) -> Result<LogFileHeader, IbdError> {
        LogFileHeader::parse(&self.read_at(0, LOG_BLOCK_SIZE)?)
    }

    /// Read a checkpoint slot (0 or 1).
    pub fn checkpoint(&self, slot: u8) -> Result<Checkpoint, IbdError> {
        let offset = match slot {
            0 => LOG_CHECKPOINT_1,
            1 => LOG_CHECKPOINT_2,
            other => {
                return Err(IbdError::Argument(format!(
                    "checkpoint slot {} (must be 0 or 1)",
                    other
                )))
            }
        };
        Checkpoint::parse(&self.read_at(offset as u64, LOG_BLOCK_SIZE)?)
    }

    /// Read data block `n` (0 is the first block after the file header).
    pub fn block(&self, n: u64) -> Result<LogBlock, IbdError> {
        let offset = LOG_FILE_HEADER_SIZE as u64 + n * LOG_BLOCK_SIZE as u64;
        LogBlock::new(self.read_at(offset, LOG_BLOCK_SIZE)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn build_block(
        block_number: u32,
        data_len: u16,
        first_rec_group: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut block = vec![0u8; LOG_BLOCK_SIZE];
        BigEndian::write_u32(&mut block[0..], block_number);
        BigEndian::write_u16(&mut block[4..], data_len);
        BigEndian::write_u16(&mut block[6..], first_rec_group);
        BigEndian::write_u32(&mut block[8..], 1); // checkpoint_no
        block[LOG_BLOCK_HEADER_SIZE..LOG_BLOCK_HEADER_SIZE + payload.len()]
            .copy_from_slice(payload);
        let checksum = block_checksum(&block);
        BigEndian::write_u32(&mut block[LOG_BLOCK_SIZE - 4..], checksum);
        block
    }

    #[test]
    fn test_block_header_fields() {
        let bytes = build_block(LOG_BLOCK_FLUSH_BIT | 17, 100, 12, b"data");
        let block = LogBlock::new(bytes).unwrap();
        let header = block.header().unwrap();
        assert_eq!(header.block_number, 17);
        assert!(header.flush);
        assert_eq!(header.data_length(), 100);
        assert_eq!(header.first_rec_group, 12);
        assert!(header.has_data());
        assert!(block.checksum_valid());
    }

    #[test]
    fn test_data_length_zero_means_full() {
        let bytes = build_block(5, 0, 0, &[]);
        let block = LogBlock::new(bytes).unwrap();
        assert_eq!(block.header().unwrap().data_length(), LOG_BLOCK_SIZE);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut bytes = build_block(5, 200, 12, b"payload");
        bytes[100] ^= 0xFF;
        let block = LogBlock::new(bytes).unwrap();
        assert!(!block.checksum_valid());
    }

    #[test]
    fn test_file_header_parse() {
        let mut block = vec![0u8; LOG_BLOCK_SIZE];
        BigEndian::write_u32(&mut block[0..], 0);
        BigEndian::write_u64(&mut block[4..], 8192);
        BigEndian::write_u32(&mut block[12..], 0);
        block[16..27].copy_from_slice(b"MySQL 5.6.1");
        let header = LogFileHeader::parse(&block).unwrap();
        assert_eq!(header.start_lsn, 8192);
        assert_eq!(header.created_by, "MySQL 5.6.1");
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut slot = vec![0u8; LOG_BLOCK_SIZE];
        BigEndian::write_u64(&mut slot[0..], 11);
        BigEndian::write_u64(&mut slot[8..], 1_603_732);
        BigEndian::write_u32(&mut slot[16..], 2060);
        BigEndian::write_u32(&mut slot[20..], 1024);
        BigEndian::write_u64(&mut slot[24..], u64::MAX);
        BigEndian::write_u32(&mut slot[296..], 5);
        BigEndian::write_u32(&mut slot[300..], LOG_CHECKPOINT_FSP_MAGIC);
        Checkpoint::stamp_checksums(&mut slot);

        let checkpoint = Checkpoint::parse(&slot).unwrap();
        assert_eq!(checkpoint.number, 11);
        assert_eq!(checkpoint.lsn, 1_603_732);
        assert_eq!(checkpoint.archived_lsn, u64::MAX);
        assert_eq!(checkpoint.fsp_magic, LOG_CHECKPOINT_FSP_MAGIC);
        assert!(checkpoint.checksums_valid);
    }

    #[test]
    fn test_checkpoint_bad_checksum() {
        let mut slot = vec![0u8; LOG_BLOCK_SIZE];
        BigEndian::write_u64(&mut slot[0..], 11);
        Checkpoint::stamp_checksums(&mut slot);
        slot[8] ^= 1; // corrupt the LSN after stamping
        assert!(!Checkpoint::parse(&slot).unwrap().checksums_valid);
    }

    #[test]
    fn test_log_file_from_bytes() {
        let mut data = vec![0u8; LOG_FILE_HEADER_SIZE];
        BigEndian::write_u64(&mut data[4..], 8192);
        data.extend(build_block(16, 20, 12, b"rec"));
        let file = LogFile::from_bytes(data).unwrap();

        assert_eq!(file.block_count(), 1);
        assert_eq!(file.header().unwrap().start_lsn, 8192);
        let block = file.block(0).unwrap();
        assert_eq!(block.header().unwrap().block_number, 16);
        assert!(file.block(1).is_err());
    }

    #[test]
    fn test_log_file_size_validation() {
        assert!(LogFile::from_bytes(vec![0u8; 100]).is_err());
        assert!(LogFile::from_bytes(vec![0u8; LOG_FILE_HEADER_SIZE + 100]).is_err());
    }
}
