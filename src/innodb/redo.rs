//! Redo log groups and the record reader.
//!
//! A [`LogGroup`] presents an ordered list of equally-sized log files as
//! one contiguous, LSN-addressed byte stream. LSNs count every block byte
//! (framing included) but skip the 2048-byte per-file headers; mapping an
//! LSN to a `(file, offset)` pair is pure arithmetic.
//!
//! [`LogReader`] walks that stream record by record: a 1-byte type (top
//! bit = "single record" mini-transaction), compressed space and page
//! numbers, then a type-specific payload. Records are reassembled across
//! block and file boundaries; a record that fails to decode — unknown
//! type, bad block checksum, truncation — aborts only itself, and the
//! reader resynchronizes at the next block's `first_rec_group`.

use serde::Serialize;

use crate::innodb::data_types::RollPointer;
use crate::innodb::log::{
    Checkpoint, LogBlock, LogFile, LOG_BLOCK_HEADER_SIZE, LOG_BLOCK_SIZE,
    LOG_BLOCK_TRAILER_SIZE, LOG_FILE_HEADER_SIZE,
};
use crate::util;
use crate::IbdError;

/// First data byte position within a block.
const BLOCK_DATA_START: u64 = LOG_BLOCK_HEADER_SIZE as u64;
/// First trailer byte position within a block.
const BLOCK_DATA_END: u64 = (LOG_BLOCK_SIZE - LOG_BLOCK_TRAILER_SIZE) as u64;

/// Redo record types, with the numeric codes from `mtr0mtr.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogRecordType {
    OneByte,
    TwoBytes,
    FourBytes,
    EightBytes,
    RecInsert,
    RecClustDeleteMark,
    RecSecDeleteMark,
    RecUpdateInPlace,
    RecDelete,
    ListEndDelete,
    ListStartDelete,
    ListEndCopyCreated,
    PageReorganize,
    PageCreate,
    UndoInsert,
    UndoEraseEnd,
    UndoInit,
    UndoHdrDiscard,
    UndoHdrReuse,
    UndoHdrCreate,
    RecMinMark,
    IbufBitmapInit,
    InitFilePage,
    WriteString,
    MultiRecEnd,
    DummyRecord,
    FileCreate,
    FileRename,
    FileDelete,
    CompRecMinMark,
    CompPageCreate,
    CompRecInsert,
    CompRecClustDeleteMark,
    CompRecSecDeleteMark,
    CompRecUpdateInPlace,
    CompRecDelete,
    CompListEndDelete,
    CompListStartDelete,
    CompListEndCopyCreated,
    CompPageReorganize,
}

impl LogRecordType {
    /// Map a type code, or None for codes outside the dispatch table.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            1 => LogRecordType::OneByte,
            2 => LogRecordType::TwoBytes,
            4 => LogRecordType::FourBytes,
            8 => LogRecordType::EightBytes,
            9 => LogRecordType::RecInsert,
            10 => LogRecordType::RecClustDeleteMark,
            11 => LogRecordType::RecSecDeleteMark,
            13 => LogRecordType::RecUpdateInPlace,
            14 => LogRecordType::RecDelete,
            15 => LogRecordType::ListEndDelete,
            16 => LogRecordType::ListStartDelete,
            17 => LogRecordType::ListEndCopyCreated,
            18 => LogRecordType::PageReorganize,
            19 => LogRecordType::PageCreate,
            20 => LogRecordType::UndoInsert,
            21 => LogRecordType::UndoEraseEnd,
            22 => LogRecordType::UndoInit,
            23 => LogRecordType::UndoHdrDiscard,
            24 => LogRecordType::UndoHdrReuse,
            25 => LogRecordType::UndoHdrCreate,
            26 => LogRecordType::RecMinMark,
            27 => LogRecordType::IbufBitmapInit,
            29 => LogRecordType::InitFilePage,
            30 => LogRecordType::WriteString,
            31 => LogRecordType::MultiRecEnd,
            32 => LogRecordType::DummyRecord,
            33 => LogRecordType::FileCreate,
            34 => LogRecordType::FileRename,
            35 => LogRecordType::FileDelete,
            36 => LogRecordType::CompRecMinMark,
            37 => LogRecordType::CompPageCreate,
            38 => LogRecordType::CompRecInsert,
            39 => LogRecordType::CompRecClustDeleteMark,
            40 => LogRecordType::CompRecSecDeleteMark,
            41 => LogRecordType::CompRecUpdateInPlace,
            42 => LogRecordType::CompRecDelete,
            43 => LogRecordType::CompListEndDelete,
            44 => LogRecordType::CompListStartDelete,
            45 => LogRecordType::CompListEndCopyCreated,
            46 => LogRecordType::CompPageReorganize,
            _ => return None,
        })
    }

    /// The conventional name for this type.
    pub fn name(&self) -> &'static str {
        match self {
            LogRecordType::OneByte => "1BYTE",
            LogRecordType::TwoBytes => "2BYTES",
            LogRecordType::FourBytes => "4BYTES",
            LogRecordType::EightBytes => "8BYTES",
            LogRecordType::RecInsert => "REC_INSERT",
            LogRecordType::RecClustDeleteMark => "REC_CLUST_DELETE_MARK",
            LogRecordType::RecSecDeleteMark => "REC_SEC_DELETE_MARK",
            LogRecordType::RecUpdateInPlace => "REC_UPDATE_IN_PLACE",
            LogRecordType::RecDelete => "REC_DELETE",
            LogRecordType::ListEndDelete => "LIST_END_DELETE",
            LogRecordType::ListStartDelete => "LIST_START_DELETE",
            LogRecordType::ListEndCopyCreated => "LIST_END_COPY_CREATED",
            LogRecordType::PageReorganize => "PAGE_REORGANIZE",
            LogRecordType::PageCreate => "PAGE_CREATE",
            LogRecordType::UndoInsert => "UNDO_INSERT",
            LogRecordType::UndoEraseEnd => "UNDO_ERASE_END",
            LogRecordType::UndoInit => "UNDO_INIT",
            LogRecordType::UndoHdrDiscard => "UNDO_HDR_DISCARD",
            LogRecordType::UndoHdrReuse => "UNDO_HDR_REUSE",
            LogRecordType::UndoHdrCreate => "UNDO_HDR_CREATE",
            LogRecordType::RecMinMark => "REC_MIN_MARK",
            LogRecordType::IbufBitmapInit => "IBUF_BITMAP_INIT",
            LogRecordType::InitFilePage => "INIT_FILE_PAGE",
            LogRecordType::WriteString => "WRITE_STRING",
            LogRecordType::MultiRecEnd => "MULTI_REC_END",
            LogRecordType::DummyRecord => "DUMMY_RECORD",
            LogRecordType::FileCreate => "FILE_CREATE",
            LogRecordType::FileRename => "FILE_RENAME",
            LogRecordType::FileDelete => "FILE_DELETE",
            LogRecordType::CompRecMinMark => "COMP_REC_MIN_MARK",
            LogRecordType::CompPageCreate => "COMP_PAGE_CREATE",
            LogRecordType::CompRecInsert => "COMP_REC_INSERT",
            LogRecordType::CompRecClustDeleteMark => "COMP_REC_CLUST_DELETE_MARK",
            LogRecordType::CompRecSecDeleteMark => "COMP_REC_SEC_DELETE_MARK",
            LogRecordType::CompRecUpdateInPlace => "COMP_REC_UPDATE_IN_PLACE",
            LogRecordType::CompRecDelete => "COMP_REC_DELETE",
            LogRecordType::CompListEndDelete => "COMP_LIST_END_DELETE",
            LogRecordType::CompListStartDelete => "COMP_LIST_START_DELETE",
            LogRecordType::CompListEndCopyCreated => "COMP_LIST_END_COPY_CREATED",
            LogRecordType::CompPageReorganize => "COMP_PAGE_REORGANIZE",
        }
    }

    /// True for the compact row-format variant of a record type. The bit
    /// decides whether the logged index description carries field data.
    pub fn is_compact(&self) -> bool {
        matches!(
            self,
            LogRecordType::CompRecMinMark
                | LogRecordType::CompPageCreate
                | LogRecordType::CompRecInsert
                | LogRecordType::CompRecClustDeleteMark
                | LogRecordType::CompRecSecDeleteMark
                | LogRecordType::CompRecUpdateInPlace
                | LogRecordType::CompRecDelete
                | LogRecordType::CompListEndDelete
                | LogRecordType::CompListStartDelete
                | LogRecordType::CompListEndCopyCreated
                | LogRecordType::CompPageReorganize
        )
    }

    /// True for record-type categories whose payload begins with an index
    /// description. Both row-format variants of a category parse it; the
    /// min-rec mark and page-create types never log one.
    fn parses_index(&self) -> bool {
        matches!(
            self,
            LogRecordType::RecInsert
                | LogRecordType::CompRecInsert
                | LogRecordType::RecClustDeleteMark
                | LogRecordType::CompRecClustDeleteMark
                | LogRecordType::RecSecDeleteMark
                | LogRecordType::CompRecSecDeleteMark
                | LogRecordType::RecUpdateInPlace
                | LogRecordType::CompRecUpdateInPlace
                | LogRecordType::RecDelete
                | LogRecordType::CompRecDelete
                | LogRecordType::ListEndDelete
                | LogRecordType::CompListEndDelete
                | LogRecordType::ListStartDelete
                | LogRecordType::CompListStartDelete
                | LogRecordType::ListEndCopyCreated
                | LogRecordType::CompListEndCopyCreated
                | LogRecordType::PageReorganize
                | LogRecordType::CompPageReorganize
        )
    }

    /// True for record types carrying no space/page addressing.
    fn is_unaddressed(&self) -> bool {
        matches!(self, LogRecordType::MultiRecEnd | LogRecordType::DummyRecord)
    }
}

/// Index description logged before the payload of compact row-format
/// record variants.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub n_fields: u16,
    pub n_unique: u16,
    /// Per-field packed length/flags words.
    pub field_info: Vec<u16>,
}

/// An insert record's decoded payload.
#[derive(Debug, Clone, Serialize)]
pub struct InsertRecord {
    pub index: Option<IndexInfo>,
    /// Offset of the predecessor record on the page.
    pub page_offset: u16,
    /// Length of the record's end segment (the bytes logged verbatim).
    pub end_seg_len: u32,
    /// Present when the record differed from its predecessor.
    pub info_and_status_bits: Option<u8>,
    pub origin_offset: Option<u32>,
    pub mismatch_index: Option<u32>,
    /// The record bytes.
    pub data: Vec<u8>,
}

/// One field change of an update vector.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateField {
    pub field_no: u32,
    /// None encodes SQL NULL.
    pub data: Option<Vec<u8>>,
}

/// Decoded payloads, by record type. Types whose interior layout is not
/// fully understood are surfaced as `Raw` bytes, never guessed.
#[derive(Debug, Clone, Serialize)]
pub enum LogRecordPayload {
    None,
    /// MLOG 1/2/4/8-byte writes.
    Write { page_offset: u16, value: u64 },
    Insert(InsertRecord),
    ClustDeleteMark {
        index: Option<IndexInfo>,
        flags: u8,
        value: u8,
        pos: u32,
        roll_ptr: RollPointer,
        trx_id: u64,
        page_offset: u16,
    },
    SecDeleteMark {
        index: Option<IndexInfo>,
        value: u8,
        page_offset: u16,
    },
    UpdateInPlace {
        index: Option<IndexInfo>,
        flags: u8,
        pos: u32,
        roll_ptr: RollPointer,
        trx_id: u64,
        page_offset: u16,
        info_bits: u8,
        fields: Vec<UpdateField>,
    },
    /// Single page-offset payloads (REC_DELETE, list deletes, min-rec mark).
    PageOffset {
        index: Option<IndexInfo>,
        page_offset: u16,
    },
    /// COMP_PAGE_REORGANIZE: only the index description.
    IndexOnly { index: IndexInfo },
    UndoInsert { data: Vec<u8> },
    UndoInit { undo_type: u32 },
    UndoHeader { trx_id: u64 },
    WriteString { page_offset: u16, data: Vec<u8> },
    FileOperation {
        name: String,
        new_name: Option<String>,
    },
    /// Partially decoded types: raw payload bytes.
    Raw(Vec<u8>),
}

/// One reassembled redo record.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub record_type: LogRecordType,
    /// Set when the type byte's top bit marked a single-record
    /// mini-transaction.
    pub single_record: bool,
    pub space_id: Option<u32>,
    pub page_number: Option<u32>,
    /// LSN of the first byte of the record.
    pub start_lsn: u64,
    /// LSN one past the last byte (framing bytes included when crossed).
    pub end_lsn: u64,
    /// Data bytes consumed by the record.
    pub size: usize,
    pub payload: LogRecordPayload,
}

/// An ordered list of equally-sized log files forming one LSN space.
pub struct LogGroup {
    files: Vec<LogFile>,
    start_lsn: u64,
    file_capacity: u64,
}

impl LogGroup {
    /// Assemble a group. All files must have the same size; the group's
    /// start LSN is taken from the first file's header.
    pub fn new(files: Vec<LogFile>) -> Result<Self, IbdError> {
        let first = files.first().ok_or_else(|| {
            IbdError::Argument("a log group needs at least one file".to_string())
        })?;
        let size = first.size();
        if files.iter().any(|f| f.size() != size) {
            return Err(IbdError::Argument(
                "log group files have differing sizes".to_string(),
            ));
        }
        let start_lsn = first.header()?.start_lsn;
        Ok(LogGroup {
            file_capacity: size - LOG_FILE_HEADER_SIZE as u64,
            files,
            start_lsn,
        })
    }

    /// The files of the group.
    pub fn files(&self) -> &[LogFile] {
        &self.files
    }

    /// LSN of the first block of the first file.
    pub fn start_lsn(&self) -> u64 {
        self.start_lsn
    }

    /// Log bytes addressable per file (block framing included).
    pub fn file_capacity(&self) -> u64 {
        self.file_capacity
    }

    /// Total capacity of the group.
    pub fn capacity(&self) -> u64 {
        self.file_capacity * self.files.len() as u64
    }

    /// Map an LSN to its `(file_index, byte_offset)` location, skipping
    /// the per-file headers. The group is circular: LSNs wrap around.
    pub fn location_of(&self, lsn: u64) -> Result<(usize, u64), IbdError> {
        if lsn < self.start_lsn {
            return Err(IbdError::Argument(format!(
                "LSN {} precedes the group start LSN {}",
                lsn, self.start_lsn
            )));
        }
        let delta = (lsn - self.start_lsn) % self.capacity();
        let file_index = (delta / self.file_capacity) as usize;
        let offset = LOG_FILE_HEADER_SIZE as u64 + delta % self.file_capacity;
        Ok((file_index, offset))
    }

    /// Read the block containing `lsn`, returning it with the LSN of its
    /// first byte.
    pub fn block_containing(&self, lsn: u64) -> Result<(u64, LogBlock), IbdError> {
        let base = lsn - lsn % LOG_BLOCK_SIZE as u64;
        let (file_index, offset) = self.location_of(base)?;
        let block_no = (offset - LOG_FILE_HEADER_SIZE as u64) / LOG_BLOCK_SIZE as u64;
        Ok((base, self.files[file_index].block(block_no)?))
    }

    /// The live checkpoint: of the two slots, the one with the larger
    /// number whose checksum pair validates.
    pub fn checkpoint(&self) -> Result<Checkpoint, IbdError> {
        let first = &self.files[0];
        let candidates = [first.checkpoint(0)?, first.checkpoint(1)?];
        candidates
            .into_iter()
            .filter(|c| c.checksums_valid)
            .max_by_key(|c| c.number)
            .ok_or_else(|| {
                IbdError::ChecksumMismatch(
                    "neither checkpoint slot validates".to_string(),
                )
            })
    }

    /// A reader positioned at the group start.
    pub fn reader(&self) -> LogReader<'_> {
        LogReader {
            group: self,
            lsn: self.start_lsn,
            block: None,
            consumed: 0,
        }
    }

    /// A reader positioned at `lsn`.
    pub fn reader_at(&self, lsn: u64) -> Result<LogReader<'_>, IbdError> {
        let mut reader = self.reader();
        reader.seek(lsn)?;
        Ok(reader)
    }
}

/// Iterates redo records in ascending LSN order.
pub struct LogReader<'a> {
    group: &'a LogGroup,
    lsn: u64,
    /// Cached current block: (base LSN, block).
    block: Option<(u64, LogBlock)>,
    /// Data bytes consumed by the record being parsed.
    consumed: usize,
}

impl LogReader<'_> {
    /// Position the reader at an LSN. Positions inside block framing are
    /// moved forward to the next data byte.
    pub fn seek(&mut self, lsn: u64) -> Result<(), IbdError> {
        if lsn < self.group.start_lsn() {
            return Err(IbdError::Argument(format!(
                "LSN {} precedes the group start LSN {}",
                lsn,
                self.group.start_lsn()
            )));
        }
        self.lsn = lsn;
        self.block = None;
        self.normalize();
        Ok(())
    }

    /// The current LSN.
    pub fn position(&self) -> u64 {
        self.lsn
    }

    /// Skip over block framing so the position is on a data byte.
    fn normalize(&mut self) {
        let in_block = self.lsn % LOG_BLOCK_SIZE as u64;
        if in_block < BLOCK_DATA_START {
            self.lsn += BLOCK_DATA_START - in_block;
        } else if in_block >= BLOCK_DATA_END {
            self.lsn += LOG_BLOCK_SIZE as u64 - in_block + BLOCK_DATA_START;
        }
    }

    fn current_block(&mut self) -> Result<&(u64, LogBlock), IbdError> {
        let base = self.lsn - self.lsn % LOG_BLOCK_SIZE as u64;
        let stale = match &self.block {
            Some((cached_base, _)) => *cached_base != base,
            None => true,
        };
        if stale {
            self.block = Some(self.group.block_containing(self.lsn)?);
        }
        self.block.as_ref().ok_or_else(|| {
            IbdError::Io("log reader lost its block cache".to_string())
        })
    }

    /// True when the position is past the last written byte of the log.
    fn at_end(&mut self) -> Result<bool, IbdError> {
        self.normalize();
        let lsn = self.lsn;
        let (base, block) = self.current_block()?;
        if block.is_empty() {
            return Ok(true);
        }
        let data_length = block.header()?.data_length() as u64;
        Ok(lsn - base >= data_length)
    }

    /// Read one data byte, hopping framing and file boundaries.
    fn read_u8(&mut self) -> Result<u8, IbdError> {
        self.normalize();
        let lsn = self.lsn;
        let (base, block) = self.current_block()?;
        if block.is_empty() {
            return Err(IbdError::InvalidBuffer(format!(
                "LSN {} is past the written log",
                lsn
            )));
        }
        if !block.checksum_valid() {
            return Err(IbdError::ChecksumMismatch(format!(
                "log block at LSN {} fails its checksum",
                base
            )));
        }
        let in_block = (lsn - base) as usize;
        if in_block as u64 >= block.header()?.data_length() as u64 {
            return Err(IbdError::InvalidBuffer(format!(
                "LSN {} is past the written log",
                lsn
            )));
        }
        let byte = block.data()[in_block];
        self.lsn += 1;
        self.consumed += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, IbdError> {
        Ok(u16::from(self.read_u8()?) << 8 | u16::from(self.read_u8()?))
    }

    fn read_u32(&mut self) -> Result<u32, IbdError> {
        Ok(u32::from(self.read_u16()?) << 16 | u32::from(self.read_u16()?))
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, IbdError> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_u8()?);
        }
        Ok(out)
    }

    /// Read an InnoDB compressed u32 from the stream.
    fn read_compressed_u32(&mut self) -> Result<u32, IbdError> {
        let flag = self.read_u8()?;
        if flag & 0x80 == 0x00 {
            Ok(u32::from(flag))
        } else if flag & 0xC0 == 0x80 {
            Ok(u32::from(flag & 0x3F) << 8 | u32::from(self.read_u8()?))
        } else if flag & 0xE0 == 0xC0 {
            Ok(u32::from(flag & 0x1F) << 16 | u32::from(self.read_u16()?))
        } else if flag & 0xF0 == 0xE0 {
            Ok(u32::from(flag & 0x0F) << 24
                | u32::from(self.read_u8()?) << 16
                | u32::from(self.read_u16()?))
        } else if flag & 0xF8 == 0xF0 {
            self.read_u32()
        } else {
            Err(IbdError::InvalidBuffer(format!(
                "invalid compressed integer prefix 0x{:02X} at LSN {}",
                flag,
                self.lsn - 1
            )))
        }
    }

    fn read_compressed_u64(&mut self) -> Result<u64, IbdError> {
        let high = self.read_compressed_u32()?;
        let low = self.read_u32()?;
        Ok(u64::from(high) << 32 | u64::from(low))
    }

    /// Move to the next block whose `first_rec_group` marks a record
    /// start. Returns false when the written log is exhausted.
    fn resync(&mut self) -> Result<bool, IbdError> {
        let max_blocks = self.group.capacity() / LOG_BLOCK_SIZE as u64;
        for _ in 0..max_blocks {
            let next_base =
                self.lsn - self.lsn % LOG_BLOCK_SIZE as u64 + LOG_BLOCK_SIZE as u64;
            self.lsn = next_base;
            self.block = None;

            let probe = match self.current_block() {
                Ok((base, block)) => {
                    if block.is_empty() {
                        return Ok(false);
                    }
                    let header = block.header()?;
                    (*base, header.first_rec_group, block.checksum_valid())
                }
                Err(_) => return Ok(false),
            };
            let (base, first_rec_group, usable) = probe;
            if !usable {
                continue;
            }
            if first_rec_group != 0 {
                self.lsn = base + u64::from(first_rec_group);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Parse and return the next record, or None at the end of the log.
    /// A record that fails to decode is skipped via resynchronization.
    pub fn record(&mut self) -> Result<Option<LogRecord>, IbdError> {
        loop {
            if self.at_end()? {
                return Ok(None);
            }
            let start_lsn = self.lsn;
            self.consumed = 0;
            match self.parse_record(start_lsn) {
                Ok(record) => return Ok(Some(record)),
                Err(IbdError::Io(message)) => return Err(IbdError::Io(message)),
                Err(error) => {
                    util::trace(&format!(
                        "skipping record at LSN {}: {}",
                        start_lsn, error
                    ));
                    if !self.resync()? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn parse_record(&mut self, start_lsn: u64) -> Result<LogRecord, IbdError> {
        let type_byte = self.read_u8()?;
        let single_record = type_byte & 0x80 != 0;
        let code = type_byte & 0x7F;
        let record_type = LogRecordType::from_u8(code).ok_or_else(|| {
            IbdError::UnknownType(format!(
                "redo record type {} at LSN {}",
                code, start_lsn
            ))
        })?;

        let (space_id, page_number) = if record_type.is_unaddressed() {
            (None, None)
        } else {
            (
                Some(self.read_compressed_u32()?),
                Some(self.read_compressed_u32()?),
            )
        };

        let index = if record_type.parses_index() {
            self.read_index_info(record_type.is_compact())?
        } else {
            None
        };

        let payload = self.read_payload(record_type, index)?;

        Ok(LogRecord {
            record_type,
            single_record,
            space_id,
            page_number,
            start_lsn,
            end_lsn: self.lsn,
            size: self.consumed,
            payload,
        })
    }

    /// Read the index description preceding a record payload. Only the
    /// compact row-format variants log field data; the plain variants
    /// imply a redundant-format index and log nothing.
    fn read_index_info(&mut self, compact: bool) -> Result<Option<IndexInfo>, IbdError> {
        if !compact {
            return Ok(None);
        }
        let n_fields = self.read_u16()?;
        let n_unique = self.read_u16()?;
        let mut field_info = Vec::with_capacity(n_fields as usize);
        for _ in 0..n_fields {
            field_info.push(self.read_u16()?);
        }
        Ok(Some(IndexInfo {
            n_fields,
            n_unique,
            field_info,
        }))
    }

    fn read_payload(
        &mut self,
        record_type: LogRecordType,
        index: Option<IndexInfo>,
    ) -> Result<LogRecordPayload, IbdError> {
        use LogRecordType::*;
        Ok(match record_type {
            OneByte | TwoBytes | FourBytes => LogRecordPayload::Write {
                page_offset: self.read_u16()?,
                value: u64::from(self.read_compressed_u32()?),
            },
            EightBytes => LogRecordPayload::Write {
                page_offset: self.read_u16()?,
                value: self.read_compressed_u64()?,
            },
            RecInsert | CompRecInsert => {
                LogRecordPayload::Insert(self.read_insert(index)?)
            }
            RecClustDeleteMark | CompRecClustDeleteMark => {
                let flags = self.read_u8()?;
                let value = self.read_u8()?;
                let pos = self.read_compressed_u32()?;
                let roll_ptr = RollPointer::parse(&self.read_bytes(7)?)?;
                let trx_id = self.read_compressed_u64()?;
                let page_offset = self.read_u16()?;
                LogRecordPayload::ClustDeleteMark {
                    index,
                    flags,
                    value,
                    pos,
                    roll_ptr,
                    trx_id,
                    page_offset,
                }
            }
            RecSecDeleteMark | CompRecSecDeleteMark => LogRecordPayload::SecDeleteMark {
                index,
                value: self.read_u8()?,
                page_offset: self.read_u16()?,
            },
            RecUpdateInPlace | CompRecUpdateInPlace => {
                let flags = self.read_u8()?;
                let pos = self.read_compressed_u32()?;
                let roll_ptr = RollPointer::parse(&self.read_bytes(7)?)?;
                let trx_id = self.read_compressed_u64()?;
                let page_offset = self.read_u16()?;
                let info_bits = self.read_u8()?;
                let n_fields = self.read_compressed_u32()?;
                let mut fields = Vec::with_capacity(n_fields as usize);
                for _ in 0..n_fields {
                    let field_no = self.read_compressed_u32()?;
                    let len = self.read_compressed_u32()?;
                    let data = if len == 0xFFFF_FFFF {
                        None
                    } else {
                        Some(self.read_bytes(len as usize)?)
                    };
                    fields.push(UpdateField { field_no, data });
                }
                LogRecordPayload::UpdateInPlace {
                    index,
                    flags,
                    pos,
                    roll_ptr,
                    trx_id,
                    page_offset,
                    info_bits,
                    fields,
                }
            }
            RecDelete | CompRecDelete | ListEndDelete | ListStartDelete
            | CompListEndDelete | CompListStartDelete | RecMinMark | CompRecMinMark => {
                LogRecordPayload::PageOffset {
                    index,
                    page_offset: self.read_u16()?,
                }
            }
            ListEndCopyCreated | CompListEndCopyCreated => {
                let length = self.read_u32()?;
                LogRecordPayload::Raw(self.read_bytes(length as usize)?)
            }
            PageReorganize | CompPageReorganize => match index {
                Some(index) => LogRecordPayload::IndexOnly { index },
                None => LogRecordPayload::None,
            },
            PageCreate | CompPageCreate | UndoEraseEnd | UndoHdrDiscard
            | IbufBitmapInit | MultiRecEnd | DummyRecord | InitFilePage => {
                LogRecordPayload::None
            }
            UndoInsert => {
                let length = self.read_u16()?;
                LogRecordPayload::UndoInsert {
                    data: self.read_bytes(length as usize)?,
                }
            }
            UndoInit => LogRecordPayload::UndoInit {
                undo_type: self.read_compressed_u32()?,
            },
            UndoHdrReuse | UndoHdrCreate => LogRecordPayload::UndoHeader {
                trx_id: self.read_compressed_u64()?,
            },
            WriteString => {
                let page_offset = self.read_u16()?;
                let length = self.read_u16()?;
                LogRecordPayload::WriteString {
                    page_offset,
                    data: self.read_bytes(length as usize)?,
                }
            }
            FileCreate | FileDelete => LogRecordPayload::FileOperation {
                name: self.read_file_name()?,
                new_name: None,
            },
            FileRename => {
                let name = self.read_file_name()?;
                let new_name = self.read_file_name()?;
                LogRecordPayload::FileOperation {
                    name,
                    new_name: Some(new_name),
                }
            }
        })
    }

    fn read_insert(&mut self, index: Option<IndexInfo>) -> Result<InsertRecord, IbdError> {
        let page_offset = self.read_u16()?;
        let end_seg_len = self.read_compressed_u32()?;

        let (info_and_status_bits, origin_offset, mismatch_index) = if end_seg_len & 0x01 != 0
        {
            (
                Some(self.read_u8()?),
                Some(self.read_compressed_u32()?),
                Some(self.read_compressed_u32()?),
            )
        } else {
            (None, None, None)
        };
        let data_len = (end_seg_len >> 1) as usize;
        Ok(InsertRecord {
            index,
            page_offset,
            end_seg_len: end_seg_len >> 1,
            info_and_status_bits,
            origin_offset,
            mismatch_index,
            data: self.read_bytes(data_len)?,
        })
    }

    fn read_file_name(&mut self) -> Result<String, IbdError> {
        let length = self.read_u16()?;
        let raw = self.read_bytes(length as usize)?;
        Ok(raw
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect())
    }
}
