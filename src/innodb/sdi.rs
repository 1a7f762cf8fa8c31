//! Serialized Dictionary Information (SDI) pages.
//!
//! MySQL 8 embeds the data dictionary's JSON description of each table in
//! dedicated SDI index pages. SDI records are ordinary compact clustered
//! records with a fixed schema: a `(type, id)` key, the hidden system
//! columns, the uncompressed and compressed lengths, and a zlib-deflated
//! JSON payload (off-page via the usual extern mechanism when large).

use std::io::Read;

use flate2::read::ZlibDecoder;
use serde::Serialize;

use crate::innodb::blob::read_extern_value;
use crate::innodb::data_types::{ExternReference, Value};
use crate::innodb::describer::RecordDescriber;
use crate::innodb::index_page::{IndexPage, RowFormat};
use crate::innodb::page::Page;
use crate::innodb::record::{RecordReader, RecordType};
use crate::innodb::space::Space;
use crate::IbdError;

/// The fixed schema of the SDI clustered index.
pub fn sdi_describer() -> Result<RecordDescriber, IbdError> {
    RecordDescriber::clustered()
        .key("type", "INT", &["UNSIGNED", "NOT_NULL"])?
        .key("id", "BIGINT", &["UNSIGNED", "NOT_NULL"])?
        .row("uncompressed_len", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("compressed_len", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("data", "LONGBLOB", &["NOT_NULL"])
}

/// One SDI record: the dictionary object key plus its compressed payload.
#[derive(Debug, Clone, Serialize)]
pub struct SdiRecord {
    /// Object type (1 = table, 2 = tablespace).
    pub sdi_type: u32,
    /// Object ID.
    pub sdi_id: u64,
    /// Length of the JSON after inflation.
    pub uncompressed_len: u32,
    /// Length of the deflated payload.
    pub compressed_len: u32,
    /// The on-page portion of the deflated payload.
    pub data: Vec<u8>,
    /// Reference to the off-page remainder, when the payload overflowed.
    pub extern_ref: Option<ExternReference>,
}

impl SdiRecord {
    /// True when the whole payload is on the page.
    pub fn complete(&self) -> bool {
        self.extern_ref.is_none() && self.data.len() as u32 == self.compressed_len
    }

    /// Inflate an in-page payload to its JSON text.
    pub fn inflate(&self) -> Result<String, IbdError> {
        inflate_sdi(&self.data, self.uncompressed_len)
    }

    /// Inflate, pulling the off-page remainder through `space` if needed.
    pub fn inflate_via(&self, space: &Space) -> Result<String, IbdError> {
        match &self.extern_ref {
            None => self.inflate(),
            Some(reference) => {
                let mut compressed = self.data.clone();
                compressed.extend_from_slice(&read_extern_value(space, reference)?);
                inflate_sdi(&compressed, self.uncompressed_len)
            }
        }
    }
}

fn inflate_sdi(compressed: &[u8], expected_len: u32) -> Result<String, IbdError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut json = String::with_capacity(expected_len as usize);
    decoder
        .read_to_string(&mut json)
        .map_err(|e| IbdError::DictionaryCorruption(format!("SDI inflate failed: {}", e)))?;
    Ok(json)
}

/// Specialized view over an SDI index page.
pub struct SdiPage<'a> {
    page: &'a Page,
}

impl<'a> SdiPage<'a> {
    pub fn new(page: &'a Page) -> Self {
        SdiPage { page }
    }

    /// Decode every SDI record on this (leaf) page by walking the record
    /// chain from infimum to supremum.
    pub fn records(&self) -> Result<Vec<SdiRecord>, IbdError> {
        let index = IndexPage::new(self.page);
        let header = index.header()?;
        if !header.is_leaf() {
            return Ok(Vec::new());
        }

        let describer = sdi_describer()?;
        let reader = RecordReader::new(self.page, &describer, RowFormat::Compact, true);
        let mut records = Vec::new();

        let mut next = reader.header_at(index.infimum_origin()?)?.next;
        let mut remaining = header.n_recs as usize + 1;
        while let Some(origin) = next {
            if remaining == 0 {
                break;
            }
            remaining -= 1;

            let record = reader.try_record_at(origin)?;
            if record.header.record_type == RecordType::Supremum {
                break;
            }
            next = record.header.next;
            if record.header.record_type != RecordType::Ordinary || record.header.deleted {
                continue;
            }
            records.push(Self::from_record_fields(&record)?);
        }
        Ok(records)
    }

    fn from_record_fields(
        record: &crate::innodb::record::Record,
    ) -> Result<SdiRecord, IbdError> {
        let uint = |value: &Value, what: &str| -> Result<u64, IbdError> {
            match value {
                Value::Uint(v) => Ok(*v),
                other => Err(IbdError::DictionaryCorruption(format!(
                    "SDI field {} has unexpected value {:?}",
                    what, other
                ))),
            }
        };
        let data_field = record.row.get(2).ok_or_else(|| {
            IbdError::DictionaryCorruption("SDI record is missing its data field".to_string())
        })?;
        let data = match &data_field.value {
            Value::Bytes(bytes) => bytes.clone(),
            other => {
                return Err(IbdError::DictionaryCorruption(format!(
                    "SDI data field has unexpected value {:?}",
                    other
                )))
            }
        };
        Ok(SdiRecord {
            sdi_type: uint(&record.key[0].value, "type")? as u32,
            sdi_id: uint(&record.key[1].value, "id")?,
            uncompressed_len: uint(&record.row[0].value, "uncompressed_len")? as u32,
            compressed_len: uint(&record.row[1].value, "compressed_len")? as u32,
            data,
            extern_ref: data_field.extern_ref,
        })
    }
}
