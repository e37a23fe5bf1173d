//! Helpers shared by unit tests.
use crate::catalog::Catalog;
use crate::catalog::create::{CreateTableInfo, OnConflict};
use crate::catalog::entry::ColumnEntry;
use crate::catalog::memory::{DEFAULT_SCHEMA, MemoryCatalog};
use crate::compile::CompileContext;
use crate::config::compile::CompileConfig;
use crate::config::session::{GlobalVariables, SessionIdentity};
use crate::types::datatype::DataType;

pub fn superuser() -> SessionIdentity {
    MemoryCatalog::superuser_session()
}

/// Create a table in the default schema.
pub fn create_table(catalog: &MemoryCatalog, name: &str, columns: &[(&str, DataType)]) {
    catalog
        .create_table(&CreateTableInfo {
            schema: DEFAULT_SCHEMA.to_string(),
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(name, datatype)| ColumnEntry::new(*name, datatype.clone()))
                .collect(),
            constraints: Vec::new(),
            temp: false,
            on_conflict: OnConflict::Error,
        })
        .unwrap();
}

/// Owns everything a `CompileContext` borrows.
#[derive(Debug)]
pub struct Fixture {
    pub catalog: MemoryCatalog,
    pub session: SessionIdentity,
    pub config: CompileConfig,
    pub globals: GlobalVariables,
}

impl Fixture {
    pub fn new() -> Self {
        Fixture {
            catalog: MemoryCatalog::new(),
            session: superuser(),
            config: CompileConfig::default(),
            globals: GlobalVariables::default(),
        }
    }

    pub fn with_table(self, name: &str, columns: &[(&str, DataType)]) -> Self {
        create_table(&self.catalog, name, columns);
        self
    }

    pub fn ctx(&self) -> CompileContext<'_> {
        CompileContext::new(&self.catalog, &self.session, &self.config, &self.globals)
    }
}
