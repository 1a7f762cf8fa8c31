//! Multi-space aggregation: the system tablespace plus per-table files.
//!
//! [`System`] owns one system space (`ibdata1`) and any number of
//! per-table spaces, and resolves names and IDs through the data
//! dictionary: add a table by its dictionary name and the matching `.ibd`
//! file is opened from the data directory; ask for an index by
//! `(table, index)` name and its dictionary row (with the root page) comes
//! back. Dictionary tables whose files cannot be found are "orphans".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::innodb::btree::Index;
use crate::innodb::describer::RecordDescriber;
use crate::innodb::dict::{DataDictionary, DictIndex, DictTable};
use crate::innodb::space::Space;
use crate::util;
use crate::IbdError;

/// The system space and its satellite per-table spaces.
pub struct System {
    system_space: Space,
    /// Per-table spaces keyed by dictionary table name (`db/table`).
    spaces: HashMap<String, Space>,
    data_directory: PathBuf,
}

impl System {
    /// Open a system tablespace. `data_directory` is where per-table
    /// `.ibd` files are looked up; it defaults to the system file's parent
    /// directory.
    pub fn open<P: AsRef<Path>>(
        system_file: P,
        data_directory: Option<&Path>,
    ) -> Result<Self, IbdError> {
        let system_file = system_file.as_ref();
        let space = Space::open(system_file)?;
        if !space.is_system_space() {
            return Err(IbdError::Argument(format!(
                "{} is not a system tablespace (space id {})",
                system_file.display(),
                space.space_id()
            )));
        }
        let data_directory = match data_directory {
            Some(dir) => dir.to_path_buf(),
            None => system_file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf(),
        };
        Ok(System {
            system_space: space,
            spaces: HashMap::new(),
            data_directory,
        })
    }

    /// The system space.
    pub fn system_space(&self) -> &Space {
        &self.system_space
    }

    /// The data dictionary of the system space.
    pub fn data_dictionary(&self) -> Result<DataDictionary<'_>, IbdError> {
        DataDictionary::new(&self.system_space)
    }

    /// Register an already-located space file under a table name.
    pub fn add_space(&mut self, table_name: &str, path: &Path) -> Result<(), IbdError> {
        let space = Space::open(path)?;
        self.spaces.insert(table_name.to_string(), space);
        Ok(())
    }

    /// Resolve a table through the dictionary and open its `.ibd` file
    /// from the data directory. Tables living in the system space need no
    /// file and are a no-op.
    pub fn add_table(&mut self, table_name: &str) -> Result<DictTable, IbdError> {
        let table = self
            .data_dictionary()?
            .table_by_name(table_name)?
            .ok_or_else(|| {
                IbdError::SchemaMissing(format!("table {} is not in the dictionary", table_name))
            })?;
        if table.space != 0 {
            let path = self.table_file_path(table_name);
            util::trace(&format!(
                "opening space {} for table {}",
                path.display(),
                table_name
            ));
            self.add_space(table_name, &path)?;
        }
        Ok(table)
    }

    fn table_file_path(&self, table_name: &str) -> PathBuf {
        self.data_directory.join(format!("{}.ibd", table_name))
    }

    /// The space holding a table's data: a registered per-table space, or
    /// the system space.
    pub fn space_for_table(&self, table_name: &str) -> &Space {
        self.spaces.get(table_name).unwrap_or(&self.system_space)
    }

    /// Find an index's dictionary row by `(table, index)` name.
    pub fn index_by_name(
        &self,
        table_name: &str,
        index_name: &str,
    ) -> Result<Option<DictIndex>, IbdError> {
        let dict = self.data_dictionary()?;
        let Some(table) = dict.table_by_name(table_name)? else {
            return Ok(None);
        };
        Ok(dict
            .indexes_for_table(table.id)?
            .into_iter()
            .find(|index| index.name == index_name))
    }

    /// Resolve an index ID back to `(table_name, index_name)`.
    pub fn table_and_index_name_by_id(
        &self,
        index_id: u64,
    ) -> Result<Option<(String, String)>, IbdError> {
        let dict = self.data_dictionary()?;
        let Some(index) = dict.index_by_id(index_id)? else {
            return Ok(None);
        };
        for table in dict.tables()? {
            if table.id == index.table_id {
                return Ok(Some((table.name, index.name)));
            }
        }
        Ok(None)
    }

    /// An index handle for `(table, index)`, decoding with `describer`.
    /// The caller supplies the describer; the dictionary only knows the
    /// root page and space.
    pub fn index(
        &self,
        table_name: &str,
        index_name: &str,
        describer: RecordDescriber,
    ) -> Result<Index<'_>, IbdError> {
        let entry = self.index_by_name(table_name, index_name)?.ok_or_else(|| {
            IbdError::SchemaMissing(format!(
                "index {}.{} is not in the dictionary",
                table_name, index_name
            ))
        })?;
        let space = if entry.space == 0 {
            &self.system_space
        } else {
            self.spaces.get(table_name).ok_or_else(|| {
                IbdError::SchemaMissing(format!(
                    "table {} lives in space {} but no file is open for it",
                    table_name, entry.space
                ))
            })?
        };
        Ok(space.index(entry.root_page, describer))
    }

    /// Dictionary tables that live outside the system space but have no
    /// openable file under the data directory.
    pub fn orphans(&self) -> Result<Vec<String>, IbdError> {
        let mut orphans = Vec::new();
        for table in self.data_dictionary()?.tables()? {
            if table.space == 0 || self.spaces.contains_key(&table.name) {
                continue;
            }
            if !self.table_file_path(&table.name).is_file() {
                orphans.push(table.name);
            }
        }
        Ok(orphans)
    }
}
