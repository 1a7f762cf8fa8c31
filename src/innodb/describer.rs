//! Record describers: the schema needed to decode index records.
//!
//! InnoDB records carry no self-describing type information; decoding one
//! requires knowing the ordered key columns, the ordered non-key columns,
//! and whether the index is the clustered B+Tree or a secondary one. A
//! [`RecordDescriber`] states exactly that. The hidden system columns
//! (DB_TRX_ID, DB_ROLL_PTR) are implicit in clustered describers and never
//! declared.
//!
//! For a secondary index, the "row" columns are the primary key columns,
//! since that is what secondary leaf records store.

use serde::Serialize;

use crate::innodb::data_types::ColumnSpec;
use crate::IbdError;

/// Whether an index is the table's clustered B+Tree or a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexType {
    Clustered,
    Secondary,
}

/// One described column: a name and its parsed type.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub spec: ColumnSpec,
}

/// A declarative index schema.
#[derive(Debug, Clone, Serialize)]
pub struct RecordDescriber {
    pub index_type: IndexType,
    /// Key columns in declaration order.
    pub key: Vec<ColumnDef>,
    /// Non-key columns in declaration order (the primary key columns for a
    /// secondary index).
    pub row: Vec<ColumnDef>,
}

impl RecordDescriber {
    /// Start a clustered-index describer.
    pub fn clustered() -> Self {
        RecordDescriber {
            index_type: IndexType::Clustered,
            key: Vec::new(),
            row: Vec::new(),
        }
    }

    /// Start a secondary-index describer.
    pub fn secondary() -> Self {
        RecordDescriber {
            index_type: IndexType::Secondary,
            key: Vec::new(),
            row: Vec::new(),
        }
    }

    /// Append a key column.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::describer::RecordDescriber;
    ///
    /// let describer = RecordDescriber::clustered()
    ///     .key("id", "INT", &["UNSIGNED", "NOT_NULL"])
    ///     .unwrap()
    ///     .row("name", "VARCHAR(64)", &[])
    ///     .unwrap();
    /// assert_eq!(describer.key.len(), 1);
    /// assert_eq!(describer.row.len(), 1);
    /// ```
    pub fn key(mut self, name: &str, spec: &str, modifiers: &[&str]) -> Result<Self, IbdError> {
        self.key.push(ColumnDef {
            name: name.to_string(),
            spec: ColumnSpec::parse(spec, modifiers)?,
        });
        Ok(self)
    }

    /// Append a non-key column.
    pub fn row(mut self, name: &str, spec: &str, modifiers: &[&str]) -> Result<Self, IbdError> {
        self.row.push(ColumnDef {
            name: name.to_string(),
            spec: ColumnSpec::parse(spec, modifiers)?,
        });
        Ok(self)
    }

    /// True for the clustered index.
    pub fn is_clustered(&self) -> bool {
        self.index_type == IndexType::Clustered
    }

    /// The columns stored in a record: key then row for leaf records, key
    /// alone for node pointers.
    pub fn stored_columns(&self, leaf: bool) -> impl Iterator<Item = &ColumnDef> {
        let row = if leaf { &self.row[..] } else { &[] };
        self.key.iter().chain(row.iter())
    }

    /// Count of nullable columns among those stored (sizes the NULL bitmap).
    pub fn nullable_count(&self, leaf: bool) -> usize {
        self.stored_columns(leaf)
            .filter(|c| c.spec.is_nullable())
            .count()
    }
}
