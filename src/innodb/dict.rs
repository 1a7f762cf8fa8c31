//! The InnoDB data dictionary: bootstrap describers and record access.
//!
//! The dictionary describes every table and index, but it is itself stored
//! in four ordinary B+Trees (SYS_TABLES, SYS_COLUMNS, SYS_INDEXES,
//! SYS_FIELDS) inside the system tablespace. Bootstrapping therefore needs
//! hardcoded describers for exactly those tables; everything else can be
//! resolved through them. The root pages of the dictionary indexes are
//! recorded in the data dictionary header on page 7.
//!
//! These tables predate the compact format and are stored in redundant
//! row format; the describers here are the canonical schemas from
//! `dict0boot` in the MySQL source.

use serde::Serialize;

use crate::innodb::btree::{CursorDirection, CursorPosition, Index, Stats};
use crate::innodb::data_types::Value;
use crate::innodb::describer::RecordDescriber;
use crate::innodb::page::FIL_PAGE_DATA;
use crate::innodb::record::Record;
use crate::innodb::space::Space;
use crate::IbdError;

/// Page of the system space holding the data dictionary header.
pub const DICT_HEADER_PAGE: u32 = 7;

/// The data dictionary header.
#[derive(Debug, Clone, Serialize)]
pub struct DictHeader {
    /// Next row ID to assign.
    pub max_row_id: u64,
    /// Next table ID to assign.
    pub max_table_id: u64,
    /// Next index ID to assign.
    pub max_index_id: u64,
    /// Highest space ID in use.
    pub max_space_id: u32,
    /// Root page of the SYS_TABLES clustered index.
    pub sys_tables_root: u32,
    /// Root page of the SYS_TABLE_IDS secondary index.
    pub sys_table_ids_root: u32,
    /// Root page of the SYS_COLUMNS clustered index.
    pub sys_columns_root: u32,
    /// Root page of the SYS_INDEXES clustered index.
    pub sys_indexes_root: u32,
    /// Root page of the SYS_FIELDS clustered index.
    pub sys_fields_root: u32,
}

/// A row of SYS_TABLES.
#[derive(Debug, Clone, Serialize)]
pub struct DictTable {
    pub name: String,
    pub id: u64,
    pub n_cols: u32,
    pub space: u32,
}

/// A row of SYS_INDEXES.
#[derive(Debug, Clone, Serialize)]
pub struct DictIndex {
    pub table_id: u64,
    pub id: u64,
    pub name: String,
    pub n_fields: u32,
    pub index_type: u32,
    pub space: u32,
    pub root_page: u32,
}

/// A row of SYS_COLUMNS.
#[derive(Debug, Clone, Serialize)]
pub struct DictColumn {
    pub table_id: u64,
    pub pos: u32,
    pub name: String,
    pub mtype: u32,
    pub prtype: u32,
    pub len: u32,
}

/// A row of SYS_FIELDS.
#[derive(Debug, Clone, Serialize)]
pub struct DictField {
    pub index_id: u64,
    pub pos: u32,
    pub column_name: String,
}

/// Bootstrap describer for SYS_TABLES (clustered on NAME).
pub fn sys_tables_describer() -> Result<RecordDescriber, IbdError> {
    RecordDescriber::clustered()
        .key("NAME", "VARCHAR(100)", &["NOT_NULL"])?
        .row("ID", "BIGINT", &["UNSIGNED", "NOT_NULL"])?
        .row("N_COLS", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("TYPE", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("MIX_ID", "BIGINT", &["UNSIGNED", "NOT_NULL"])?
        .row("MIX_LEN", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("CLUSTER_NAME", "VARCHAR(100)", &[])?
        .row("SPACE", "INT", &["UNSIGNED", "NOT_NULL"])
}

/// Bootstrap describer for SYS_COLUMNS (clustered on TABLE_ID, POS).
pub fn sys_columns_describer() -> Result<RecordDescriber, IbdError> {
    RecordDescriber::clustered()
        .key("TABLE_ID", "BIGINT", &["UNSIGNED", "NOT_NULL"])?
        .key("POS", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("NAME", "VARCHAR(100)", &["NOT_NULL"])?
        .row("MTYPE", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("PRTYPE", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("LEN", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("PREC", "INT", &["UNSIGNED", "NOT_NULL"])
}

/// Bootstrap describer for SYS_INDEXES (clustered on TABLE_ID, ID).
pub fn sys_indexes_describer() -> Result<RecordDescriber, IbdError> {
    RecordDescriber::clustered()
        .key("TABLE_ID", "BIGINT", &["UNSIGNED", "NOT_NULL"])?
        .key("ID", "BIGINT", &["UNSIGNED", "NOT_NULL"])?
        .row("NAME", "VARCHAR(100)", &["NOT_NULL"])?
        .row("N_FIELDS", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("TYPE", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("SPACE", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("PAGE_NO", "INT", &["UNSIGNED", "NOT_NULL"])
}

/// Bootstrap describer for SYS_FIELDS (clustered on INDEX_ID, POS).
pub fn sys_fields_describer() -> Result<RecordDescriber, IbdError> {
    RecordDescriber::clustered()
        .key("INDEX_ID", "BIGINT", &["UNSIGNED", "NOT_NULL"])?
        .key("POS", "INT", &["UNSIGNED", "NOT_NULL"])?
        .row("COL_NAME", "VARCHAR(100)", &["NOT_NULL"])
}

/// The data dictionary of one system tablespace.
pub struct DataDictionary<'a> {
    space: &'a Space,
}

impl<'a> DataDictionary<'a> {
    /// Bind to a system space. Fails on non-system spaces, which have no
    /// dictionary.
    pub fn new(space: &'a Space) -> Result<Self, IbdError> {
        if !space.is_system_space() {
            return Err(IbdError::DictionaryCorruption(format!(
                "space {} is not the system space",
                space.space_id()
            )));
        }
        Ok(DataDictionary { space })
    }

    /// Parse the data dictionary header from page 7.
    pub fn header(&self) -> Result<DictHeader, IbdError> {
        let page = self.space.page(DICT_HEADER_PAGE)?.ok_or_else(|| {
            IbdError::DictionaryCorruption(
                "system space has no data dictionary header page".to_string(),
            )
        })?;
        let mut c = page.cursor(FIL_PAGE_DATA);
        c.name("dict_header", |c| {
            let max_row_id = c.read_u64()?;
            let max_table_id = c.read_u64()?;
            let max_index_id = c.read_u64()?;
            let max_space_id = c.read_u32()?;
            c.skip(4); // mix id low, unused
            Ok(DictHeader {
                max_row_id,
                max_table_id,
                max_index_id,
                max_space_id,
                sys_tables_root: c.read_u32()?,
                sys_table_ids_root: c.read_u32()?,
                sys_columns_root: c.read_u32()?,
                sys_indexes_root: c.read_u32()?,
                sys_fields_root: c.read_u32()?,
            })
        })
    }

    /// An index handle on SYS_TABLES.
    pub fn sys_tables(&self) -> Result<Index<'a>, IbdError> {
        Ok(self
            .space
            .index(self.header()?.sys_tables_root, sys_tables_describer()?))
    }

    /// An index handle on SYS_COLUMNS.
    pub fn sys_columns(&self) -> Result<Index<'a>, IbdError> {
        Ok(self
            .space
            .index(self.header()?.sys_columns_root, sys_columns_describer()?))
    }

    /// An index handle on SYS_INDEXES.
    pub fn sys_indexes(&self) -> Result<Index<'a>, IbdError> {
        Ok(self
            .space
            .index(self.header()?.sys_indexes_root, sys_indexes_describer()?))
    }

    /// An index handle on SYS_FIELDS.
    pub fn sys_fields(&self) -> Result<Index<'a>, IbdError> {
        Ok(self
            .space
            .index(self.header()?.sys_fields_root, sys_fields_describer()?))
    }

    /// All tables known to the dictionary.
    pub fn tables(&self) -> Result<Vec<DictTable>, IbdError> {
        let index = self.sys_tables()?;
        let mut cursor = index.cursor(CursorPosition::Min, CursorDirection::Forward)?;
        let mut tables = Vec::new();
        while let Some(record) = cursor.record()? {
            tables.push(table_from_record(&record)?);
        }
        Ok(tables)
    }

    /// Look a table up by its dictionary name (e.g. `sakila/actor`).
    pub fn table_by_name(&self, name: &str) -> Result<Option<DictTable>, IbdError> {
        let index = self.sys_tables()?;
        let mut stats = Stats::new();
        let found = index.binary_search(&[Value::Str(name.to_string())], &mut stats)?;
        found.map(|record| table_from_record(&record)).transpose()
    }

    /// All indexes of a table.
    pub fn indexes_for_table(&self, table_id: u64) -> Result<Vec<DictIndex>, IbdError> {
        let index = self.sys_indexes()?;
        let mut cursor = index.cursor(CursorPosition::Min, CursorDirection::Forward)?;
        let mut indexes = Vec::new();
        while let Some(record) = cursor.record()? {
            let entry = index_from_record(&record)?;
            if entry.table_id == table_id {
                indexes.push(entry);
            }
        }
        Ok(indexes)
    }

    /// Find an index row by its ID, scanning SYS_INDEXES.
    pub fn index_by_id(&self, index_id: u64) -> Result<Option<DictIndex>, IbdError> {
        let index = self.sys_indexes()?;
        let mut cursor = index.cursor(CursorPosition::Min, CursorDirection::Forward)?;
        while let Some(record) = cursor.record()? {
            let entry = index_from_record(&record)?;
            if entry.id == index_id {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// All columns of a table, in position order.
    pub fn columns_for_table(&self, table_id: u64) -> Result<Vec<DictColumn>, IbdError> {
        let index = self.sys_columns()?;
        let mut cursor = index.cursor(CursorPosition::Min, CursorDirection::Forward)?;
        let mut columns = Vec::new();
        while let Some(record) = cursor.record()? {
            let column = column_from_record(&record)?;
            if column.table_id == table_id {
                columns.push(column);
            }
        }
        Ok(columns)
    }

    /// All key fields of an index, in position order.
    pub fn fields_for_index(&self, index_id: u64) -> Result<Vec<DictField>, IbdError> {
        let index = self.sys_fields()?;
        let mut cursor = index.cursor(CursorPosition::Min, CursorDirection::Forward)?;
        let mut fields = Vec::new();
        while let Some(record) = cursor.record()? {
            let field = field_from_record(&record)?;
            if field.index_id == index_id {
                fields.push(field);
            }
        }
        Ok(fields)
    }
}

fn want_str(record: &Record, field: &str) -> Result<String, IbdError> {
    match field_value(record, field)? {
        Value::Str(s) => Ok(s.clone()),
        other => Err(IbdError::DictionaryCorruption(format!(
            "dictionary field {} has unexpected value {:?}",
            field, other
        ))),
    }
}

fn want_u64(record: &Record, field: &str) -> Result<u64, IbdError> {
    match field_value(record, field)? {
        Value::Uint(v) => Ok(*v),
        other => Err(IbdError::DictionaryCorruption(format!(
            "dictionary field {} has unexpected value {:?}",
            field, other
        ))),
    }
}

fn field_value<'r>(record: &'r Record, field: &str) -> Result<&'r Value, IbdError> {
    record
        .key
        .iter()
        .chain(record.row.iter())
        .find(|f| f.name == field)
        .map(|f| &f.value)
        .ok_or_else(|| {
            IbdError::DictionaryCorruption(format!("dictionary record lacks field {}", field))
        })
}

fn table_from_record(record: &Record) -> Result<DictTable, IbdError> {
    Ok(DictTable {
        name: want_str(record, "NAME")?,
        id: want_u64(record, "ID")?,
        n_cols: want_u64(record, "N_COLS")? as u32,
        space: want_u64(record, "SPACE")? as u32,
    })
}

fn index_from_record(record: &Record) -> Result<DictIndex, IbdError> {
    Ok(DictIndex {
        table_id: want_u64(record, "TABLE_ID")?,
        id: want_u64(record, "ID")?,
        name: want_str(record, "NAME")?,
        n_fields: want_u64(record, "N_FIELDS")? as u32,
        index_type: want_u64(record, "TYPE")? as u32,
        space: want_u64(record, "SPACE")? as u32,
        root_page: want_u64(record, "PAGE_NO")? as u32,
    })
}

fn column_from_record(record: &Record) -> Result<DictColumn, IbdError> {
    Ok(DictColumn {
        table_id: want_u64(record, "TABLE_ID")?,
        pos: want_u64(record, "POS")? as u32,
        name: want_str(record, "NAME")?,
        mtype: want_u64(record, "MTYPE")? as u32,
        prtype: want_u64(record, "PRTYPE")? as u32,
        len: want_u64(record, "LEN")? as u32,
    })
}

fn field_from_record(record: &Record) -> Result<DictField, IbdError> {
    Ok(DictField {
        index_id: want_u64(record, "INDEX_ID")?,
        pos: want_u64(record, "POS")? as u32,
        column_name: want_str(record, "COL_NAME")?,
    })
}
