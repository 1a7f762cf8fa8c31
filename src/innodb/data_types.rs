//! Column data types and value decoding.
//!
//! InnoDB stores column values so that memcmp order equals SQL order:
//! integers are big-endian with the sign bit XORed, DECIMAL is a binary
//! packing of 9-digit groups with the sign folded into the first byte, and
//! the temporal types use MySQL's packed forms. This module provides the
//! textual type factory ([`ColumnSpec::parse`]) and the decoders that turn
//! raw field bytes into [`Value`]s.
//!
//! Character and binary types are length-prefixed externally — the record
//! header supplies the byte length, the decoder only interprets the bytes.
//! The hidden system columns (6-byte transaction ID, 7-byte roll pointer)
//! and the 20-byte off-page BLOB reference are decoded here as well.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::innodb::cursor::Cursor;
use crate::IbdError;

/// Bytes needed to store 0..=9 leftover decimal digits.
const DIG2BYTES: [usize; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];
/// Decimal digits per 4-byte group.
const DIG_PER_DEC: usize = 9;

/// Type modifier flags accepted by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Unsigned,
    NotNull,
    Zerofill,
}

impl Modifier {
    fn parse(text: &str) -> Result<Self, IbdError> {
        match text {
            "UNSIGNED" => Ok(Modifier::Unsigned),
            "NOT_NULL" => Ok(Modifier::NotNull),
            "ZEROFILL" => Ok(Modifier::Zerofill),
            other => Err(IbdError::InvalidSpecification(format!(
                "unknown modifier {:?}",
                other
            ))),
        }
    }
}

/// Base column type, without modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Decimal { precision: usize, scale: usize },
    Char(usize),
    VarChar(usize),
    Binary(usize),
    VarBinary(usize),
    Blob,
    Text,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Enum(Vec<String>),
}

/// A parsed column specification: base type plus modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub column_type: ColumnType,
    pub unsigned: bool,
    pub not_null: bool,
    pub zerofill: bool,
}

impl ColumnSpec {
    /// Parse a textual type specification such as `"VARCHAR(64)"` or
    /// `"DECIMAL(10,2)"`, with modifier flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::data_types::{ColumnSpec, ColumnType};
    ///
    /// let spec = ColumnSpec::parse("VARCHAR(64)", &["NOT_NULL"]).unwrap();
    /// assert_eq!(spec.column_type, ColumnType::VarChar(64));
    /// assert!(spec.not_null);
    /// assert!(spec.is_variable());
    ///
    /// assert!(ColumnSpec::parse("VARCHAR", &[]).is_err());
    /// assert!(ColumnSpec::parse("FROB(3)", &[]).is_err());
    /// ```
    pub fn parse(spec: &str, modifiers: &[&str]) -> Result<Self, IbdError> {
        let spec = spec.trim().to_uppercase();
        let (base, args) = match spec.find('(') {
            Some(open) => {
                let close = spec.rfind(')').ok_or_else(|| {
                    IbdError::InvalidSpecification(format!("unbalanced parentheses in {:?}", spec))
                })?;
                if close < open || close != spec.len() - 1 {
                    return Err(IbdError::InvalidSpecification(format!(
                        "malformed argument list in {:?}",
                        spec
                    )));
                }
                (&spec[..open], Some(&spec[open + 1..close]))
            }
            None => (spec.as_str(), None),
        };

        let column_type = match (base, args) {
            ("TINYINT", None) => ColumnType::TinyInt,
            ("SMALLINT", None) => ColumnType::SmallInt,
            ("MEDIUMINT", None) => ColumnType::MediumInt,
            ("INT" | "INTEGER", None) => ColumnType::Int,
            ("BIGINT", None) => ColumnType::BigInt,
            ("DECIMAL" | "NUMERIC", args) => {
                let (precision, scale) = parse_decimal_args(args)?;
                ColumnType::Decimal { precision, scale }
            }
            ("CHAR", args) => ColumnType::Char(parse_length(args, 1)?),
            ("VARCHAR", Some(args)) => ColumnType::VarChar(parse_length(Some(args), 0)?),
            ("BINARY", args) => ColumnType::Binary(parse_length(args, 1)?),
            ("VARBINARY", Some(args)) => ColumnType::VarBinary(parse_length(Some(args), 0)?),
            ("TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB", None) => ColumnType::Blob,
            ("TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT", None) => ColumnType::Text,
            ("DATE", None) => ColumnType::Date,
            ("TIME", None) => ColumnType::Time,
            ("DATETIME", None) => ColumnType::DateTime,
            ("TIMESTAMP", None) => ColumnType::Timestamp,
            ("YEAR", None) => ColumnType::Year,
            ("ENUM", Some(args)) => ColumnType::Enum(parse_enum_values(args)?),
            _ => {
                return Err(IbdError::InvalidSpecification(format!(
                    "unrecognized type specification {:?}",
                    spec
                )))
            }
        };

        let mut parsed = ColumnSpec {
            column_type,
            unsigned: false,
            not_null: false,
            zerofill: false,
        };
        for modifier in modifiers {
            match Modifier::parse(&modifier.trim().to_uppercase())? {
                Modifier::Unsigned => parsed.unsigned = true,
                Modifier::NotNull => parsed.not_null = true,
                Modifier::Zerofill => parsed.zerofill = true,
            }
        }
        Ok(parsed)
    }

    /// True for columns whose on-disk length varies row to row.
    pub fn is_variable(&self) -> bool {
        matches!(
            self.column_type,
            ColumnType::VarChar(_)
                | ColumnType::VarBinary(_)
                | ColumnType::Blob
                | ColumnType::Text
        )
    }

    /// True for columns that may be NULL.
    pub fn is_nullable(&self) -> bool {
        !self.not_null
    }

    /// Fixed on-disk length in bytes, or None for variable types.
    pub fn fixed_length(&self) -> Option<usize> {
        match &self.column_type {
            ColumnType::TinyInt | ColumnType::Year => Some(1),
            ColumnType::SmallInt => Some(2),
            ColumnType::MediumInt | ColumnType::Date | ColumnType::Time => Some(3),
            ColumnType::Int | ColumnType::Timestamp => Some(4),
            ColumnType::BigInt | ColumnType::DateTime => Some(8),
            ColumnType::Decimal { precision, scale } => {
                Some(decimal_storage_size(*precision, *scale))
            }
            ColumnType::Char(n) | ColumnType::Binary(n) => Some(*n),
            ColumnType::Enum(values) => Some(if values.len() > 255 { 2 } else { 1 }),
            _ => None,
        }
    }

    /// Maximum on-disk length in bytes; used to size variable-length headers.
    pub fn max_length(&self) -> usize {
        match &self.column_type {
            ColumnType::VarChar(n) | ColumnType::VarBinary(n) => *n,
            ColumnType::Blob | ColumnType::Text => u16::MAX as usize,
            _ => self.fixed_length().unwrap_or(0),
        }
    }

    /// Decode a field's bytes into a value. The caller supplies exactly the
    /// bytes the record header assigned to this field.
    pub fn decode(&self, data: &[u8]) -> Result<Value, IbdError> {
        match &self.column_type {
            ColumnType::TinyInt
            | ColumnType::SmallInt
            | ColumnType::MediumInt
            | ColumnType::Int
            | ColumnType::BigInt => decode_int(data, self.unsigned),
            ColumnType::Decimal { precision, scale } => {
                Ok(Value::Decimal(decode_decimal(data, *precision, *scale)?))
            }
            ColumnType::Char(_) => {
                let text = String::from_utf8_lossy(data);
                Ok(Value::Str(text.trim_end_matches(' ').to_string()))
            }
            ColumnType::VarChar(_) | ColumnType::Text => {
                Ok(Value::Str(String::from_utf8_lossy(data).into_owned()))
            }
            ColumnType::Binary(_) | ColumnType::VarBinary(_) | ColumnType::Blob => {
                Ok(Value::Bytes(data.to_vec()))
            }
            ColumnType::Date => decode_date(data),
            ColumnType::Time => decode_time(data),
            ColumnType::DateTime => decode_datetime(data),
            ColumnType::Timestamp => {
                expect_len(data, 4, "TIMESTAMP")?;
                Ok(Value::Timestamp(BigEndian::read_u32(data)))
            }
            ColumnType::Year => {
                expect_len(data, 1, "YEAR")?;
                let raw = data[0];
                Ok(Value::Year(if raw == 0 {
                    0
                } else {
                    1900 + u16::from(raw)
                }))
            }
            ColumnType::Enum(values) => {
                let index = match data.len() {
                    1 => usize::from(data[0]),
                    2 => usize::from(BigEndian::read_u16(data)),
                    n => {
                        return Err(IbdError::InvalidBuffer(format!(
                            "ENUM field of {} bytes",
                            n
                        )))
                    }
                };
                // 1-based; 0 is the empty invalid member.
                let symbol = index
                    .checked_sub(1)
                    .and_then(|i| values.get(i))
                    .cloned()
                    .unwrap_or_default();
                Ok(Value::Symbol(symbol))
            }
        }
    }
}

fn parse_length(args: Option<&str>, default: usize) -> Result<usize, IbdError> {
    match args {
        None => Ok(default),
        Some(text) => text.trim().parse::<usize>().map_err(|_| {
            IbdError::InvalidSpecification(format!("bad length argument {:?}", text))
        }),
    }
}

fn parse_decimal_args(args: Option<&str>) -> Result<(usize, usize), IbdError> {
    let Some(args) = args else {
        return Ok((10, 0));
    };
    let mut parts = args.split(',').map(str::trim);
    let precision = parts
        .next()
        .unwrap_or_default()
        .parse::<usize>()
        .map_err(|_| IbdError::InvalidSpecification(format!("bad precision in {:?}", args)))?;
    let scale = match parts.next() {
        None => 0,
        Some(text) => text
            .parse::<usize>()
            .map_err(|_| IbdError::InvalidSpecification(format!("bad scale in {:?}", args)))?,
    };
    if parts.next().is_some() || precision == 0 || precision > 65 || scale > precision {
        return Err(IbdError::InvalidSpecification(format!(
            "bad DECIMAL arguments {:?}",
            args
        )));
    }
    Ok((precision, scale))
}

fn parse_enum_values(args: &str) -> Result<Vec<String>, IbdError> {
    let mut values = Vec::new();
    for part in args.split(',') {
        let part = part.trim();
        let stripped = part
            .strip_prefix('\'')
            .and_then(|p| p.strip_suffix('\''))
            .ok_or_else(|| {
                IbdError::InvalidSpecification(format!("ENUM member {:?} is not quoted", part))
            })?;
        values.push(stripped.to_string());
    }
    if values.is_empty() {
        return Err(IbdError::InvalidSpecification(
            "ENUM with no members".to_string(),
        ));
    }
    Ok(values)
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Decimal rendered as a digit string with embedded sign and point.
    Decimal(String),
    /// Calendar date.
    Date { year: u16, month: u8, day: u8 },
    /// Time of day / interval (may be negative).
    Time {
        negative: bool,
        hours: u16,
        minutes: u8,
        seconds: u8,
    },
    /// Date and time.
    DateTime {
        year: u16,
        month: u8,
        day: u8,
        hours: u8,
        minutes: u8,
        seconds: u8,
    },
    /// Seconds since the Unix epoch.
    Timestamp(u32),
    /// Four-digit year (0 for the zero year).
    Year(u16),
    /// Character data.
    Str(String),
    /// Raw binary data.
    Bytes(Vec<u8>),
    /// An enumeration member name.
    Symbol(String),
}

impl Value {
    /// Compare two values of the same kind for key ordering. Integers of
    /// mixed signedness compare numerically. Returns None for kinds with no
    /// defined order against each other.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Uint(b)) => Some(if *a < 0 {
                Ordering::Less
            } else {
                (*a as u64).cmp(b)
            }),
            (Value::Uint(a), Value::Int(b)) => Some(if *b < 0 {
                Ordering::Greater
            } else {
                a.cmp(&(*b as u64))
            }),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Symbol(a), Value::Symbol(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(compare_decimal_strings(a, b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Year(a), Value::Year(b)) => Some(a.cmp(b)),
            (
                Value::Date { year, month, day },
                Value::Date {
                    year: y2,
                    month: m2,
                    day: d2,
                },
            ) => Some((year, month, day).cmp(&(y2, m2, d2))),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Uint(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Date { year, month, day } => {
                write!(f, "{:04}-{:02}-{:02}", year, month, day)
            }
            Value::Time {
                negative,
                hours,
                minutes,
                seconds,
            } => {
                let sign = if *negative { "-" } else { "" };
                write!(f, "{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds)
            }
            Value::DateTime {
                year,
                month,
                day,
                hours,
                minutes,
                seconds,
            } => write!(
                f,
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hours, minutes, seconds
            ),
            Value::Timestamp(v) => write!(f, "{}", v),
            Value::Year(v) => write!(f, "{:04}", v),
            Value::Str(v) | Value::Symbol(v) => write!(f, "{}", v),
            Value::Bytes(v) => {
                for byte in v {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

fn expect_len(data: &[u8], len: usize, what: &str) -> Result<(), IbdError> {
    if data.len() != len {
        return Err(IbdError::InvalidBuffer(format!(
            "{} field of {} bytes, expected {}",
            what,
            data.len(),
            len
        )));
    }
    Ok(())
}

/// Decode a stored integer of 1..=8 bytes.
///
/// InnoDB XORs the sign bit of signed integers so lexicographic byte order
/// matches numeric order; the flip is undone here. Unsigned integers are
/// plain big-endian.
pub fn decode_int(data: &[u8], unsigned: bool) -> Result<Value, IbdError> {
    if data.is_empty() || data.len() > 8 {
        return Err(IbdError::InvalidBuffer(format!(
            "integer field of {} bytes",
            data.len()
        )));
    }
    let mut raw: u64 = 0;
    for &byte in data {
        raw = raw << 8 | u64::from(byte);
    }
    if unsigned {
        return Ok(Value::Uint(raw));
    }

    let bits = data.len() * 8;
    let flipped = raw ^ (1 << (bits - 1));
    // Sign-extend from `bits` to 64.
    let shift = 64 - bits;
    Ok(Value::Int(((flipped << shift) as i64) >> shift))
}

/// Encode an integer in InnoDB's stored form (inverse of [`decode_int`]).
pub fn encode_int(value: i64, len: usize, unsigned: bool) -> Vec<u8> {
    let bits = len * 8;
    let raw = if unsigned {
        value as u64
    } else {
        (value as u64) ^ (1 << (bits - 1))
    };
    raw.to_be_bytes()[8 - len..].to_vec()
}

/// Decode a 6-byte transaction ID (DB_TRX_ID).
pub fn decode_trx_id(data: &[u8]) -> Result<u64, IbdError> {
    expect_len(data, 6, "DB_TRX_ID")?;
    Ok(BigEndian::read_u48(data))
}

/// A decoded 7-byte rollback pointer (DB_ROLL_PTR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollPointer {
    /// Set when the pointer refers to an insert undo record.
    pub insert: bool,
    /// Rollback segment id (7 bits).
    pub rseg_id: u8,
    /// Undo log page number.
    pub undo_page: u32,
    /// Byte offset of the undo record within its page.
    pub undo_offset: u16,
}

impl RollPointer {
    /// Decode from the 7 stored bytes.
    pub fn parse(data: &[u8]) -> Result<Self, IbdError> {
        expect_len(data, 7, "DB_ROLL_PTR")?;
        Ok(RollPointer {
            insert: data[0] & 0x80 != 0,
            rseg_id: data[0] & 0x7F,
            undo_page: BigEndian::read_u32(&data[1..5]),
            undo_offset: BigEndian::read_u16(&data[5..7]),
        })
    }
}

/// A 20-byte reference to an externally stored (off-page) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExternReference {
    /// Space the BLOB chain lives in.
    pub space_id: u32,
    /// First BLOB page of the chain.
    pub page_number: u32,
    /// Byte offset of the data within that page.
    pub offset: u32,
    /// Total off-page length (flag bits masked off).
    pub length: u64,
}

/// Size of an extern field reference.
pub const EXTERN_REFERENCE_SIZE: usize = 20;

impl ExternReference {
    /// Decode from the 20 stored bytes. The top two bits of the length
    /// word are ownership/inheritance flags, not part of the length.
    pub fn parse(data: &[u8]) -> Result<Self, IbdError> {
        expect_len(data, EXTERN_REFERENCE_SIZE, "extern reference")?;
        Ok(ExternReference {
            space_id: BigEndian::read_u32(&data[0..4]),
            page_number: BigEndian::read_u32(&data[4..8]),
            offset: BigEndian::read_u32(&data[8..12]),
            length: BigEndian::read_u64(&data[12..20]) & 0x3FFF_FFFF_FFFF_FFFF,
        })
    }
}

fn decode_date(data: &[u8]) -> Result<Value, IbdError> {
    expect_len(data, 3, "DATE")?;
    let mut c = Cursor::new(data);
    let raw = c.read_u24()? ^ 0x80_0000;
    Ok(Value::Date {
        year: (raw >> 9) as u16,
        month: ((raw >> 5) & 0x0F) as u8,
        day: (raw & 0x1F) as u8,
    })
}

fn decode_time(data: &[u8]) -> Result<Value, IbdError> {
    expect_len(data, 3, "TIME")?;
    let mut c = Cursor::new(data);
    let raw = c.read_u24()? ^ 0x80_0000;
    // 24-bit two's complement of HHMMSS.
    let packed = if raw & 0x80_0000 != 0 {
        (raw | 0xFF00_0000) as i32
    } else {
        raw as i32
    };
    let magnitude = packed.unsigned_abs();
    Ok(Value::Time {
        negative: packed < 0,
        hours: (magnitude / 10_000) as u16,
        minutes: (magnitude / 100 % 100) as u8,
        seconds: (magnitude % 100) as u8,
    })
}

fn decode_datetime(data: &[u8]) -> Result<Value, IbdError> {
    expect_len(data, 8, "DATETIME")?;
    let raw = BigEndian::read_u64(data) ^ 0x8000_0000_0000_0000;
    // Packed decimal YYYYMMDDHHMMSS.
    let date = raw / 1_000_000;
    let time = raw % 1_000_000;
    Ok(Value::DateTime {
        year: (date / 10_000) as u16,
        month: (date / 100 % 100) as u8,
        day: (date % 100) as u8,
        hours: (time / 10_000) as u8,
        minutes: (time / 100 % 100) as u8,
        seconds: (time % 100) as u8,
    })
}

/// Storage size in bytes of a binary DECIMAL(precision, scale).
pub fn decimal_storage_size(precision: usize, scale: usize) -> usize {
    let intg = precision - scale;
    (intg / DIG_PER_DEC) * 4
        + DIG2BYTES[intg % DIG_PER_DEC]
        + (scale / DIG_PER_DEC) * 4
        + DIG2BYTES[scale % DIG_PER_DEC]
}

/// Decode MySQL's binary DECIMAL format into a digit string.
///
/// Digits are packed 9 per 4-byte big-endian group with shorter leading and
/// trailing partial groups. The first byte's top bit is the sign (set =
/// non-negative after the storage flip); negative values are stored with
/// every byte inverted.
pub fn decode_decimal(data: &[u8], precision: usize, scale: usize) -> Result<String, IbdError> {
    if data.len() != decimal_storage_size(precision, scale) {
        return Err(IbdError::InvalidBuffer(format!(
            "DECIMAL({},{}) field of {} bytes, expected {}",
            precision,
            scale,
            data.len(),
            decimal_storage_size(precision, scale)
        )));
    }

    let mut bytes = data.to_vec();
    let negative = bytes[0] & 0x80 == 0;
    bytes[0] ^= 0x80;
    if negative {
        for byte in &mut bytes {
            *byte = !*byte;
        }
    }

    let intg = precision - scale;
    let mut digits = String::new();
    let mut pos = 0usize;

    let mut read_group = |pos: &mut usize, nbytes: usize| -> u32 {
        let mut value: u32 = 0;
        for _ in 0..nbytes {
            value = value << 8 | u32::from(bytes[*pos]);
            *pos += 1;
        }
        value
    };

    let lead_digits = intg % DIG_PER_DEC;
    if lead_digits > 0 {
        let group = read_group(&mut pos, DIG2BYTES[lead_digits]);
        digits.push_str(&format!("{:0width$}", group, width = lead_digits));
    }
    for _ in 0..intg / DIG_PER_DEC {
        let group = read_group(&mut pos, 4);
        digits.push_str(&format!("{:09}", group));
    }
    let int_part = digits.trim_start_matches('0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(if int_part.is_empty() { "0" } else { int_part });

    if scale > 0 {
        out.push('.');
        for _ in 0..scale / DIG_PER_DEC {
            let group = read_group(&mut pos, 4);
            out.push_str(&format!("{:09}", group));
        }
        let tail_digits = scale % DIG_PER_DEC;
        if tail_digits > 0 {
            let group = read_group(&mut pos, DIG2BYTES[tail_digits]);
            out.push_str(&format!("{:0width$}", group, width = tail_digits));
        }
    }
    Ok(out)
}

fn compare_decimal_strings(a: &str, b: &str) -> Ordering {
    // Compare by sign, then integer width, then digit strings.
    let neg_a = a.starts_with('-');
    let neg_b = b.starts_with('-');
    match (neg_a, neg_b) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    let magnitude = |s: &str| -> (usize, String) {
        let s = s.trim_start_matches('-');
        let (int_part, frac) = s.split_once('.').unwrap_or((s, ""));
        (int_part.len(), format!("{}{}", int_part, frac))
    };
    let (wa, da) = magnitude(a);
    let (wb, db) = magnitude(b);
    let unsigned = wa.cmp(&wb).then_with(|| da.cmp(&db));
    if neg_a {
        unsigned.reverse()
    } else {
        unsigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_types() {
        let spec = ColumnSpec::parse("INT", &["UNSIGNED", "NOT_NULL"]).unwrap();
        assert_eq!(spec.column_type, ColumnType::Int);
        assert!(spec.unsigned);
        assert!(!spec.is_nullable());
        assert_eq!(spec.fixed_length(), Some(4));

        let spec = ColumnSpec::parse("decimal(10,2)", &[]).unwrap();
        assert_eq!(
            spec.column_type,
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
        );

        let spec = ColumnSpec::parse("ENUM('a','b','c')", &[]).unwrap();
        assert_eq!(spec.fixed_length(), Some(1));
    }

    #[test]
    fn test_parse_invalid_specs() {
        for bad in ["", "VARCHAR", "VARCHAR()", "INT(", "DECIMAL(0)", "ENUM(a)"] {
            assert!(
                ColumnSpec::parse(bad, &[]).is_err(),
                "expected failure for {bad:?}"
            );
        }
        assert!(ColumnSpec::parse("INT", &["SPARKLY"]).is_err());
    }

    #[test]
    fn test_int_sign_flip_round_trip() {
        for len in 1..=8usize {
            let bits = len * 8;
            let (min, max) = if bits == 64 {
                (i64::MIN, i64::MAX)
            } else {
                (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
            };
            for value in [min, -1, 0, 1, max] {
                let encoded = encode_int(value, len, false);
                assert_eq!(
                    decode_int(&encoded, false).unwrap(),
                    Value::Int(value),
                    "width {len} value {value}"
                );
            }
            // encode(0) has the MSB set; encode(MIN) is all zero bytes;
            // encode(MAX) is all ones.
            assert_eq!(encode_int(0, len, false)[0] & 0x80, 0x80);
            assert!(encode_int(min, len, false).iter().all(|&b| b == 0));
            assert!(encode_int(max, len, false).iter().all(|&b| b == 0xFF));
        }
    }

    #[test]
    fn test_int_unsigned() {
        assert_eq!(
            decode_int(&[0x00, 0x00, 0x01, 0x00], true).unwrap(),
            Value::Uint(256)
        );
        assert_eq!(
            decode_int(&encode_int(300, 2, true), true).unwrap(),
            Value::Uint(300)
        );
    }

    #[test]
    fn test_decimal_decode() {
        // DECIMAL(4,2): 2 int digits (1 byte) + 2 frac digits (1 byte).
        assert_eq!(decimal_storage_size(4, 2), 2);
        // 12.34 -> int group 12 | 0x80 sign, frac group 34
        assert_eq!(decode_decimal(&[0x80 | 12, 34], 4, 2).unwrap(), "12.34");
        // -12.34 is stored inverted
        let encoded = [!(0x80u8 | 12), !34u8];
        assert_eq!(decode_decimal(&encoded, 4, 2).unwrap(), "-12.34");
    }

    #[test]
    fn test_decimal_wide() {
        // DECIMAL(14,4): intg=10 -> one 9-digit group + 1 leftover digit.
        let size = decimal_storage_size(14, 4);
        assert_eq!(size, 1 + 4 + 2);
        // Value 1234567891.0001
        let mut bytes = Vec::new();
        bytes.push(0x80 | 1); // leading partial group: digit "1", sign bit
        bytes.extend_from_slice(&234_567_891u32.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes()); // frac partial: "0001"
        assert_eq!(
            decode_decimal(&bytes, 14, 4).unwrap(),
            "1234567891.0001"
        );
    }

    #[test]
    fn test_temporal_decode() {
        // DATE 2024-02-29: v = 2024<<9 | 2<<5 | 29
        let v: u32 = (2024 << 9 | 2 << 5 | 29) ^ 0x80_0000;
        let bytes = [(v >> 16) as u8, (v >> 8) as u8, v as u8];
        assert_eq!(
            ColumnSpec::parse("DATE", &[]).unwrap().decode(&bytes).unwrap(),
            Value::Date {
                year: 2024,
                month: 2,
                day: 29
            }
        );

        // TIME 13:14:15 -> 131415 packed
        let v: u32 = 131_415 ^ 0x80_0000;
        let bytes = [(v >> 16) as u8, (v >> 8) as u8, v as u8];
        assert_eq!(
            ColumnSpec::parse("TIME", &[]).unwrap().decode(&bytes).unwrap(),
            Value::Time {
                negative: false,
                hours: 13,
                minutes: 14,
                seconds: 15
            }
        );

        // DATETIME 2024-02-29 13:14:15
        let packed: u64 = 20_240_229_131_415 ^ 0x8000_0000_0000_0000;
        assert_eq!(
            ColumnSpec::parse("DATETIME", &[])
                .unwrap()
                .decode(&packed.to_be_bytes())
                .unwrap(),
            Value::DateTime {
                year: 2024,
                month: 2,
                day: 29,
                hours: 13,
                minutes: 14,
                seconds: 15
            }
        );

        assert_eq!(
            ColumnSpec::parse("YEAR", &[]).unwrap().decode(&[124]).unwrap(),
            Value::Year(2024)
        );
    }

    #[test]
    fn test_char_trims_padding() {
        let spec = ColumnSpec::parse("CHAR(8)", &[]).unwrap();
        assert_eq!(
            spec.decode(b"abc     ").unwrap(),
            Value::Str("abc".to_string())
        );
    }

    #[test]
    fn test_roll_pointer() {
        let data = [0x80 | 3, 0x00, 0x00, 0x01, 0x10, 0x02, 0x30];
        let ptr = RollPointer::parse(&data).unwrap();
        assert!(ptr.insert);
        assert_eq!(ptr.rseg_id, 3);
        assert_eq!(ptr.undo_page, 0x110);
        assert_eq!(ptr.undo_offset, 0x230);
    }

    #[test]
    fn test_extern_reference_masks_flags() {
        let mut data = [0u8; 20];
        BigEndian::write_u32(&mut data[0..4], 5);
        BigEndian::write_u32(&mut data[4..8], 99);
        BigEndian::write_u32(&mut data[8..12], 38);
        BigEndian::write_u64(&mut data[12..20], 0xC000_0000_0000_1000);
        let extern_ref = ExternReference::parse(&data).unwrap();
        assert_eq!(extern_ref.space_id, 5);
        assert_eq!(extern_ref.page_number, 99);
        assert_eq!(extern_ref.offset, 38);
        assert_eq!(extern_ref.length, 0x1000);
    }

    #[test]
    fn test_value_compare() {
        use std::cmp::Ordering::*;
        assert_eq!(Value::Int(-5).compare(&Value::Int(3)), Some(Less));
        assert_eq!(Value::Int(-1).compare(&Value::Uint(0)), Some(Less));
        assert_eq!(Value::Uint(7).compare(&Value::Int(7)), Some(Equal));
        assert_eq!(
            Value::Str("b".into()).compare(&Value::Str("a".into())),
            Some(Greater)
        );
        assert_eq!(
            Value::Decimal("-12.34".into()).compare(&Value::Decimal("-2.0".into())),
            Some(Less)
        );
        assert_eq!(Value::Int(1).compare(&Value::Str("x".into())), None);
    }
}
