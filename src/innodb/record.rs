//! Record headers and describer-driven field decoding.
//!
//! Records are variable-length and preceded by a small header read
//! *backward* from the record origin. The compact format stores a 5-byte
//! header, a NULL bitmap (one bit per nullable stored column, LSB-first per
//! byte), and a variable-length array (1 or 2 bytes per variable column
//! that is not NULL, with the two high bits of the 2-byte form flagging
//! length and off-page storage). The redundant format stores a 6-byte
//! header followed by an end-offset array covering every stored field.
//!
//! Field bytes are then read *forward* from the origin: key columns, the
//! hidden system columns (clustered leaf only), then non-key columns —
//! or a 4-byte child page number after the key on non-leaf pages.
//!
//! Decoding is best-effort-local: [`RecordReader::record_at`] turns a
//! failed decode into a placeholder record flagged corrupt so that page
//! iteration can continue.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::innodb::data_types::{
    decode_trx_id, ExternReference, RollPointer, Value, EXTERN_REFERENCE_SIZE,
};
use crate::innodb::describer::{ColumnDef, RecordDescriber};
use crate::innodb::index_page::{RowFormat, COMPACT_EXTRA_BYTES, REDUNDANT_EXTRA_BYTES};
use crate::innodb::page::Page;
use crate::IbdError;

/// Bytes of an off-page column kept in the record ("max prefix").
pub const EXTERN_PREFIX_SIZE: usize = 768;
/// Size of the hidden DB_TRX_ID column.
pub const TRX_ID_SIZE: usize = 6;
/// Size of the hidden DB_ROLL_PTR column.
pub const ROLL_PTR_SIZE: usize = 7;
/// Size of the child page number in node pointer records.
pub const CHILD_PAGE_SIZE: usize = 4;

/// Record type from the compact header's status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordType {
    /// Ordinary user record on a leaf page.
    Ordinary,
    /// Node pointer record on a non-leaf page.
    NodePtr,
    /// The infimum pseudo-record.
    Infimum,
    /// The supremum pseudo-record.
    Supremum,
}

impl RecordType {
    fn from_bits(value: u8) -> Self {
        match value & 0x07 {
            1 => RecordType::NodePtr,
            2 => RecordType::Infimum,
            3 => RecordType::Supremum,
            _ => RecordType::Ordinary,
        }
    }
}

/// A record header, normalized across both row formats.
#[derive(Debug, Clone, Serialize)]
pub struct RecordHeader {
    /// Which format the header was read in.
    pub format: RowFormat,
    /// Record type. Redundant pages have no type bits; the type is derived
    /// from the record's position and the page level.
    pub record_type: RecordType,
    /// Delete mark.
    pub deleted: bool,
    /// Minimum-record flag (leftmost node pointer of a non-leaf level).
    pub min_rec: bool,
    /// Records owned by this record in the page directory (0 unless the
    /// record closes an owned group).
    pub n_owned: u8,
    /// Heap number of the record within the page.
    pub heap_number: u16,
    /// Absolute origin offset of the next record, or None at the chain end.
    pub next: Option<usize>,
    /// Per stored field: resolved length and flags, in storage order.
    pub field_slots: Vec<FieldSlot>,
}

/// Length and flags resolved for one stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSlot {
    pub length: usize,
    pub null: bool,
    pub extern_stored: bool,
}

/// One decoded field.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
    /// On-page byte length (includes the prefix and reference for extern
    /// fields).
    pub length: usize,
    /// The off-page reference, when the field is externally stored.
    pub extern_ref: Option<ExternReference>,
}

/// A fully decoded record.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// Page the record was read from.
    pub page_number: u32,
    /// Origin offset within the page.
    pub offset: usize,
    pub header: RecordHeader,
    /// Key fields in declaration order.
    pub key: Vec<Field>,
    /// DB_TRX_ID (clustered leaf records only).
    pub transaction_id: Option<u64>,
    /// DB_ROLL_PTR (clustered leaf records only).
    pub roll_pointer: Option<RollPointer>,
    /// Non-key fields (leaf records only).
    pub row: Vec<Field>,
    /// Child page (node pointer records only).
    pub child_page_number: Option<u32>,
    /// Set when decoding failed and this is a placeholder.
    pub corrupt: bool,
}

impl Record {
    /// The key as plain values, for comparisons.
    pub fn key_values(&self) -> Vec<&Value> {
        self.key.iter().map(|f| &f.value).collect()
    }
}

/// Decodes records on one INDEX page against a describer.
pub struct RecordReader<'a> {
    page: &'a Page,
    describer: &'a RecordDescriber,
    format: RowFormat,
    leaf: bool,
}

impl<'a> RecordReader<'a> {
    /// Build a reader for a page whose format and level are already known.
    pub fn new(
        page: &'a Page,
        describer: &'a RecordDescriber,
        format: RowFormat,
        leaf: bool,
    ) -> Self {
        RecordReader {
            page,
            describer,
            format,
            leaf,
        }
    }

    /// Parse the header of the record at `origin`.
    pub fn header_at(&self, origin: usize) -> Result<RecordHeader, IbdError> {
        match self.format {
            RowFormat::Compact => self.compact_header(origin),
            RowFormat::Redundant => self.redundant_header(origin),
        }
    }

    /// Decode the record at `origin`, returning a corrupt placeholder if
    /// the bytes cannot be interpreted.
    pub fn record_at(&self, origin: usize) -> Record {
        self.try_record_at(origin).unwrap_or_else(|_| Record {
            page_number: self.page.number(),
            offset: origin,
            header: RecordHeader {
                format: self.format,
                record_type: if self.leaf {
                    RecordType::Ordinary
                } else {
                    RecordType::NodePtr
                },
                deleted: false,
                min_rec: false,
                n_owned: 0,
                heap_number: 0,
                next: None,
                field_slots: Vec::new(),
            },
            key: Vec::new(),
            transaction_id: None,
            roll_pointer: None,
            row: Vec::new(),
            child_page_number: None,
            corrupt: true,
        })
    }

    /// Decode the record at `origin`.
    pub fn try_record_at(&self, origin: usize) -> Result<Record, IbdError> {
        let header = self.header_at(origin)?;
        match header.record_type {
            RecordType::Infimum | RecordType::Supremum => {
                return Ok(self.system_record(origin, header))
            }
            _ => {}
        }

        let data = self.page.data();
        let mut pos = origin;
        let mut slots = header.field_slots.iter().copied();

        let mut take_field = |column: &ColumnDef,
                              slots: &mut dyn Iterator<Item = FieldSlot>,
                              pos: &mut usize|
         -> Result<Field, IbdError> {
            let slot = slots.next().ok_or_else(|| {
                IbdError::InvalidBuffer(format!(
                    "record at {} has no length slot for column {}",
                    origin, column.name
                ))
            })?;
            if slot.null {
                return Ok(Field {
                    name: column.name.clone(),
                    value: Value::Null,
                    length: 0,
                    extern_ref: None,
                });
            }
            if *pos + slot.length > data.len() {
                return Err(IbdError::InvalidBuffer(format!(
                    "field {} of record at {} runs past the page end",
                    column.name, origin
                )));
            }
            let bytes = &data[*pos..*pos + slot.length];
            *pos += slot.length;

            if slot.extern_stored {
                if slot.length < EXTERN_REFERENCE_SIZE {
                    return Err(IbdError::InvalidBuffer(format!(
                        "extern field {} of record at {} is shorter than a reference",
                        column.name, origin
                    )));
                }
                let split = slot.length - EXTERN_REFERENCE_SIZE;
                return Ok(Field {
                    name: column.name.clone(),
                    value: column.spec.decode(&bytes[..split])?,
                    length: slot.length,
                    extern_ref: Some(ExternReference::parse(&bytes[split..])?),
                });
            }
            Ok(Field {
                name: column.name.clone(),
                value: column.spec.decode(bytes)?,
                length: slot.length,
                extern_ref: None,
            })
        };

        let mut key = Vec::with_capacity(self.describer.key.len());
        for column in &self.describer.key {
            key.push(take_field(column, &mut slots, &mut pos)?);
        }

        let mut transaction_id = None;
        let mut roll_pointer = None;
        let mut row = Vec::new();
        let mut child_page_number = None;

        if self.leaf {
            if self.describer.is_clustered() {
                if self.format == RowFormat::Redundant {
                    // Redundant offsets cover the system columns too; their
                    // slots are consumed to keep positions aligned.
                    slots.next();
                    slots.next();
                }
                if pos + TRX_ID_SIZE + ROLL_PTR_SIZE > data.len() {
                    return Err(IbdError::InvalidBuffer(format!(
                        "system columns of record at {} run past the page end",
                        origin
                    )));
                }
                transaction_id = Some(decode_trx_id(&data[pos..pos + TRX_ID_SIZE])?);
                pos += TRX_ID_SIZE;
                roll_pointer = Some(RollPointer::parse(&data[pos..pos + ROLL_PTR_SIZE])?);
                pos += ROLL_PTR_SIZE;
            }
            for column in &self.describer.row {
                row.push(take_field(column, &mut slots, &mut pos)?);
            }
        } else {
            if pos + CHILD_PAGE_SIZE > data.len() {
                return Err(IbdError::InvalidBuffer(format!(
                    "child pointer of record at {} runs past the page end",
                    origin
                )));
            }
            child_page_number = Some(BigEndian::read_u32(&data[pos..]));
        }

        Ok(Record {
            page_number: self.page.number(),
            offset: origin,
            header,
            key,
            transaction_id,
            roll_pointer,
            row,
            child_page_number,
            corrupt: false,
        })
    }

    fn system_record(&self, origin: usize, header: RecordHeader) -> Record {
        Record {
            page_number: self.page.number(),
            offset: origin,
            header,
            key: Vec::new(),
            transaction_id: None,
            roll_pointer: None,
            row: Vec::new(),
            child_page_number: None,
            corrupt: false,
        }
    }

    // ── Compact format ───────────────────────────────────────────────

    fn compact_header(&self, origin: usize) -> Result<RecordHeader, IbdError> {
        let data = self.page.data();
        if origin < COMPACT_EXTRA_BYTES || origin >= data.len() {
            return Err(IbdError::InvalidBuffer(format!(
                "compact record origin {} outside page",
                origin
            )));
        }

        let byte0 = data[origin - 5];
        let bits = BigEndian::read_u16(&data[origin - 4..]);
        let next_rel = BigEndian::read_i16(&data[origin - 2..]);

        let record_type = RecordType::from_bits((bits & 0x07) as u8);
        let next = match next_rel {
            0 => None,
            rel => {
                let next = origin as i64 + i64::from(rel);
                if next <= 0 || next as usize >= data.len() {
                    return Err(IbdError::InvalidBuffer(format!(
                        "record at {} links to out-of-page offset {}",
                        origin, next
                    )));
                }
                Some(next as usize)
            }
        };

        let field_slots = match record_type {
            RecordType::Infimum | RecordType::Supremum => Vec::new(),
            RecordType::NodePtr => self.compact_slots(origin, false)?,
            RecordType::Ordinary => self.compact_slots(origin, true)?,
        };

        Ok(RecordHeader {
            format: RowFormat::Compact,
            record_type,
            deleted: byte0 & 0x20 != 0,
            min_rec: byte0 & 0x10 != 0,
            n_owned: byte0 & 0x0F,
            heap_number: (bits >> 3) & 0x1FFF,
            next,
            field_slots,
        })
    }

    /// Read the NULL bitmap and variable-length array backward from the
    /// compact header and resolve every stored column's length.
    fn compact_slots(&self, origin: usize, leaf: bool) -> Result<Vec<FieldSlot>, IbdError> {
        let data = self.page.data();
        let columns: Vec<&ColumnDef> = self.describer.stored_columns(leaf).collect();
        let nullable = self.describer.nullable_count(leaf);
        let bitmap_bytes = nullable.div_ceil(8);

        let bitmap_end = origin
            .checked_sub(COMPACT_EXTRA_BYTES)
            .filter(|end| *end >= bitmap_bytes)
            .ok_or_else(|| {
                IbdError::InvalidBuffer(format!(
                    "record at {} has no room for its NULL bitmap",
                    origin
                ))
            })?;

        // NULL bitmap: LSB-first per byte, bytes running backward.
        let mut nulls = Vec::with_capacity(nullable);
        for i in 0..nullable {
            let byte = data[bitmap_end - 1 - i / 8];
            nulls.push(byte & (1 << (i % 8)) != 0);
        }

        let mut slots = Vec::with_capacity(columns.len());
        let mut null_index = 0usize;
        let mut pos = bitmap_end - bitmap_bytes;

        for column in columns {
            let null = if column.spec.is_nullable() {
                let bit = nulls[null_index];
                null_index += 1;
                bit
            } else {
                false
            };
            if null {
                slots.push(FieldSlot {
                    length: 0,
                    null: true,
                    extern_stored: false,
                });
                continue;
            }
            if !column.spec.is_variable() {
                slots.push(FieldSlot {
                    length: column.spec.fixed_length().unwrap_or(0),
                    null: false,
                    extern_stored: false,
                });
                continue;
            }

            // Variable column: consume a length entry, moving backward.
            if pos == 0 {
                return Err(IbdError::InvalidBuffer(format!(
                    "record at {} truncates its variable-length array",
                    origin
                )));
            }
            pos -= 1;
            let first = data[pos];
            // Columns that can exceed 255 bytes may use the 2-byte form;
            // the high bit of the first byte selects it, and bit 14 of the
            // combined value marks off-page storage.
            if column.spec.max_length() > 255 && first & 0x80 != 0 {
                if pos == 0 {
                    return Err(IbdError::InvalidBuffer(format!(
                        "record at {} truncates a 2-byte length entry",
                        origin
                    )));
                }
                pos -= 1;
                let combined = u16::from(first) << 8 | u16::from(data[pos]);
                slots.push(FieldSlot {
                    length: usize::from(combined & 0x3FFF),
                    null: false,
                    extern_stored: combined & 0x4000 != 0,
                });
            } else {
                slots.push(FieldSlot {
                    length: usize::from(first),
                    null: false,
                    extern_stored: false,
                });
            }
        }
        Ok(slots)
    }

    // ── Redundant format ─────────────────────────────────────────────

    fn redundant_header(&self, origin: usize) -> Result<RecordHeader, IbdError> {
        let data = self.page.data();
        if origin < REDUNDANT_EXTRA_BYTES || origin >= data.len() {
            return Err(IbdError::InvalidBuffer(format!(
                "redundant record origin {} outside page",
                origin
            )));
        }

        let next_abs = BigEndian::read_u16(&data[origin - 2..]);
        let bits1 = BigEndian::read_u16(&data[origin - 4..]);
        let heap_word = BigEndian::read_u16(&data[origin - 5..]);
        let byte0 = data[origin - 6];

        let n_fields = usize::from((bits1 >> 1) & 0x3FF);
        let one_byte_offsets = bits1 & 0x01 != 0;
        let heap_number = (heap_word >> 3) & 0x1FFF;

        let record_type = self.redundant_record_type(origin);
        let next = match next_abs {
            0 => None,
            abs if (abs as usize) < data.len() => Some(abs as usize),
            abs => {
                return Err(IbdError::InvalidBuffer(format!(
                    "record at {} links to out-of-page offset {}",
                    origin, abs
                )))
            }
        };

        let field_slots = match record_type {
            RecordType::Infimum | RecordType::Supremum => Vec::new(),
            _ => self.redundant_slots(origin, n_fields, one_byte_offsets)?,
        };

        Ok(RecordHeader {
            format: RowFormat::Redundant,
            record_type,
            deleted: byte0 & 0x20 != 0,
            min_rec: byte0 & 0x10 != 0,
            n_owned: byte0 & 0x0F,
            heap_number,
            next,
            field_slots,
        })
    }

    fn redundant_record_type(&self, origin: usize) -> RecordType {
        use crate::innodb::index_page::{REDUNDANT_INFIMUM, REDUNDANT_SUPREMUM};
        if origin == REDUNDANT_INFIMUM {
            RecordType::Infimum
        } else if origin == REDUNDANT_SUPREMUM {
            RecordType::Supremum
        } else if self.leaf {
            RecordType::Ordinary
        } else {
            RecordType::NodePtr
        }
    }

    /// Resolve field lengths from the redundant end-offset array. Entry `i`
    /// holds the end offset of field `i` relative to the origin; lengths
    /// fall out of consecutive entries.
    fn redundant_slots(
        &self,
        origin: usize,
        n_fields: usize,
        one_byte: bool,
    ) -> Result<Vec<FieldSlot>, IbdError> {
        let data = self.page.data();
        let entry_size = if one_byte { 1 } else { 2 };
        let array_size = n_fields * entry_size;
        if origin < REDUNDANT_EXTRA_BYTES + array_size {
            return Err(IbdError::InvalidBuffer(format!(
                "record at {} has no room for {} offset entries",
                origin, n_fields
            )));
        }

        let mut slots = Vec::with_capacity(n_fields);
        let mut previous_end = 0usize;
        for i in 0..n_fields {
            let (end, null, extern_stored) = if one_byte {
                let raw = data[origin - REDUNDANT_EXTRA_BYTES - 1 - i];
                (usize::from(raw & 0x7F), raw & 0x80 != 0, false)
            } else {
                let base = origin - REDUNDANT_EXTRA_BYTES - 2 * (i + 1);
                let raw = BigEndian::read_u16(&data[base..]);
                (
                    usize::from(raw & 0x3FFF),
                    raw & 0x8000 != 0,
                    raw & 0x4000 != 0,
                )
            };
            let length = end.checked_sub(previous_end).ok_or_else(|| {
                IbdError::InvalidBuffer(format!(
                    "record at {} has a non-monotonic offset array",
                    origin
                ))
            })?;
            slots.push(FieldSlot {
                length: if null && one_byte { 0 } else { length },
                null,
                extern_stored,
            });
            previous_end = end;
        }
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::innodb::describer::RecordDescriber;
    use crate::innodb::index_page::COMPACT_INFIMUM;

    const PS: usize = 16384;

    fn describer() -> RecordDescriber {
        RecordDescriber::clustered()
            .key("id", "INT", &["NOT_NULL"])
            .unwrap()
            .row("name", "VARCHAR(300)", &[])
            .unwrap()
            .row("count", "SMALLINT", &["UNSIGNED", "NOT_NULL"])
            .unwrap()
    }

    /// Lay out one compact clustered-leaf record at `origin`.
    fn write_compact_record(
        buf: &mut [u8],
        origin: usize,
        id: i32,
        name: Option<&[u8]>,
        count: u16,
        next_rel: i16,
        heap_number: u16,
    ) {
        // Backward: 5-byte header, NULL bitmap (1 byte), var array.
        buf[origin - 5] = 0; // info bits, n_owned 0
        BigEndian::write_u16(&mut buf[origin - 4..], heap_number << 3); // ordinary
        BigEndian::write_i16(&mut buf[origin - 2..], next_rel);
        let bitmap = origin - 6;
        match name {
            None => buf[bitmap] = 0x01, // NULL bit for "name"
            Some(bytes) => {
                buf[bitmap] = 0;
                if bytes.len() > 127 {
                    buf[bitmap - 1] = 0x80 | (bytes.len() >> 8) as u8;
                    buf[bitmap - 2] = bytes.len() as u8;
                } else {
                    buf[bitmap - 1] = bytes.len() as u8;
                }
            }
        }

        // Forward: key, trx id, roll ptr, row.
        let mut fwd = origin;
        buf[fwd..fwd + 4]
            .copy_from_slice(&crate::innodb::data_types::encode_int(id as i64, 4, false));
        fwd += 4;
        buf[fwd..fwd + 6].copy_from_slice(&[0, 0, 0, 0, 0, 9]); // trx id 9
        fwd += 6;
        buf[fwd] = 0x80; // roll ptr: insert flag, rseg 0
        fwd += 7;
        if let Some(bytes) = name {
            buf[fwd..fwd + bytes.len()].copy_from_slice(bytes);
            fwd += bytes.len();
        }
        BigEndian::write_u16(&mut buf[fwd..], count ^ 0); // unsigned, no flip
    }

    fn leaf_page_with_record(
        id: i32,
        name: Option<&[u8]>,
        count: u16,
    ) -> (Page, usize) {
        let mut buf = vec![0u8; PS];
        BigEndian::write_u16(&mut buf[24..], 17855);
        BigEndian::write_u16(&mut buf[38 + 4..], 0x8003); // compact, 3 heap records
        let origin = 200;
        write_compact_record(&mut buf, origin, id, name, count, 0, 2);
        (Page::new(buf, PS, 3).unwrap(), origin)
    }

    #[test]
    fn test_compact_leaf_record() {
        let describer = describer();
        let (page, origin) = leaf_page_with_record(-7, Some(b"forty-two"), 42);
        let reader = RecordReader::new(&page, &describer, RowFormat::Compact, true);

        let record = reader.try_record_at(origin).unwrap();
        assert!(!record.corrupt);
        assert_eq!(record.header.record_type, RecordType::Ordinary);
        assert_eq!(record.header.heap_number, 2);
        assert_eq!(record.key[0].value, Value::Int(-7));
        assert_eq!(record.transaction_id, Some(9));
        assert!(record.roll_pointer.unwrap().insert);
        assert_eq!(record.row[0].value, Value::Str("forty-two".into()));
        assert_eq!(record.row[0].length, 9);
        assert_eq!(record.row[1].value, Value::Uint(42));
        assert_eq!(record.child_page_number, None);
    }

    #[test]
    fn test_compact_null_column() {
        let describer = describer();
        let (page, origin) = leaf_page_with_record(1, None, 3);
        let reader = RecordReader::new(&page, &describer, RowFormat::Compact, true);

        let record = reader.try_record_at(origin).unwrap();
        assert_eq!(record.row[0].value, Value::Null);
        assert_eq!(record.row[0].length, 0);
        assert_eq!(record.row[1].value, Value::Uint(3));
    }

    #[test]
    fn test_compact_two_byte_length() {
        let describer = describer();
        let long_name = vec![b'x'; 200];
        let (page, origin) = leaf_page_with_record(5, Some(&long_name), 1);
        let reader = RecordReader::new(&page, &describer, RowFormat::Compact, true);

        let record = reader.try_record_at(origin).unwrap();
        assert_eq!(record.row[0].length, 200);
        match &record.row[0].value {
            Value::Str(s) => assert_eq!(s.len(), 200),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_compact_node_pointer() {
        let describer = describer();
        let mut buf = vec![0u8; PS];
        BigEndian::write_u16(&mut buf[24..], 17855);
        let origin = 300;
        buf[origin - 5] = 0;
        BigEndian::write_u16(&mut buf[origin - 4..], (4 << 3) | 1); // node ptr
        BigEndian::write_i16(&mut buf[origin - 2..], 0);
        buf[origin..origin + 4]
            .copy_from_slice(&crate::innodb::data_types::encode_int(100, 4, false));
        BigEndian::write_u32(&mut buf[origin + 4..], 12); // child page
        let page = Page::new(buf, PS, 1).unwrap();

        let reader = RecordReader::new(&page, &describer, RowFormat::Compact, false);
        let record = reader.try_record_at(origin).unwrap();
        assert_eq!(record.header.record_type, RecordType::NodePtr);
        assert_eq!(record.key[0].value, Value::Int(100));
        assert_eq!(record.child_page_number, Some(12));
        assert!(record.row.is_empty());
        assert_eq!(record.transaction_id, None);
    }

    #[test]
    fn test_infimum_header_chain() {
        let describer = describer();
        let mut buf = vec![0u8; PS];
        BigEndian::write_u16(&mut buf[24..], 17855);
        BigEndian::write_u16(&mut buf[38 + 4..], 0x8002);
        buf[COMPACT_INFIMUM - 5] = 0x01; // n_owned 1
        BigEndian::write_u16(&mut buf[COMPACT_INFIMUM - 4..], 2); // heap 0, infimum
        BigEndian::write_i16(&mut buf[COMPACT_INFIMUM - 2..], 101); // next at 200
        buf[COMPACT_INFIMUM..COMPACT_INFIMUM + 8].copy_from_slice(b"infimum\0");
        let page = Page::new(buf, PS, 3).unwrap();

        let reader = RecordReader::new(&page, &describer, RowFormat::Compact, true);
        let header = reader.header_at(COMPACT_INFIMUM).unwrap();
        assert_eq!(header.record_type, RecordType::Infimum);
        assert_eq!(header.n_owned, 1);
        assert_eq!(header.next, Some(200));
        assert!(header.field_slots.is_empty());
    }

    #[test]
    fn test_corrupt_placeholder() {
        let describer = describer();
        let page = Page::new(vec![0u8; PS], PS, 3).unwrap();
        let reader = RecordReader::new(&page, &describer, RowFormat::Compact, true);
        // Origin 2 cannot hold a 5-byte header.
        let record = reader.record_at(2);
        assert!(record.corrupt);
        assert!(record.key.is_empty());
    }

    #[test]
    fn test_redundant_record() {
        // SYS_TABLES-like single-column redundant record: one key column,
        // two system columns, one row column.
        let describer = RecordDescriber::clustered()
            .key("NAME", "VARCHAR(100)", &["NOT_NULL"])
            .unwrap()
            .row("ID", "BIGINT", &["UNSIGNED", "NOT_NULL"])
            .unwrap();

        let mut buf = vec![0u8; PS];
        BigEndian::write_u16(&mut buf[24..], 17855);
        // Redundant page: n_heap without the compact bit.
        BigEndian::write_u16(&mut buf[38 + 4..], 3);
        let origin = 400;

        let name = b"test/t1";
        let ends = [
            name.len(),                           // NAME
            name.len() + TRX_ID_SIZE,             // DB_TRX_ID
            name.len() + TRX_ID_SIZE + ROLL_PTR_SIZE, // DB_ROLL_PTR
            name.len() + TRX_ID_SIZE + ROLL_PTR_SIZE + 8, // ID
        ];
        // Header: 6 bytes backward from origin. The 24-bit group after the
        // info byte packs heap_no(13) | n_fields(10) | short_flag(1).
        buf[origin - 6] = 0;
        let packed: u32 = 2 << 11 | 4 << 1 | 1; // heap 2, 4 fields, 1-byte offsets
        buf[origin - 5] = (packed >> 16) as u8;
        buf[origin - 4] = (packed >> 8) as u8;
        buf[origin - 3] = packed as u8;
        BigEndian::write_u16(&mut buf[origin - 2..], 0); // next: none
        for (i, end) in ends.iter().enumerate() {
            buf[origin - REDUNDANT_EXTRA_BYTES - 1 - i] = *end as u8;
        }
        // Field data forward.
        let mut fwd = origin;
        buf[fwd..fwd + name.len()].copy_from_slice(name);
        fwd += name.len();
        buf[fwd..fwd + 6].copy_from_slice(&[0, 0, 0, 0, 0, 5]);
        fwd += 6;
        buf[fwd] = 0x80;
        fwd += 7;
        BigEndian::write_u64(&mut buf[fwd..], 77);
        let page = Page::new(buf, PS, 8).unwrap();

        let reader = RecordReader::new(&page, &describer, RowFormat::Redundant, true);
        let record = reader.try_record_at(origin).unwrap();
        assert_eq!(record.header.record_type, RecordType::Ordinary);
        assert_eq!(record.header.heap_number, 2);
        assert_eq!(record.key[0].value, Value::Str("test/t1".into()));
        assert_eq!(record.transaction_id, Some(5));
        assert_eq!(record.row[0].value, Value::Uint(77));
        assert_eq!(record.header.next, None);
    }
}
