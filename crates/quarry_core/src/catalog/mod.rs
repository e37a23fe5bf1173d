//! Catalog facade consulted during compilation.
//!
//! The compiler only reads from the catalog. Mutations exist so DDL plans can
//! be applied by the caller once a statement commits.
pub mod apply;
pub mod create;
pub mod entry;
pub mod memory;
pub mod privilege;

use std::fmt::Debug;
use std::sync::Arc;

use create::{
    AlterSchemaInfo,
    AlterSequenceInfo,
    AlterTableInfo,
    AlterUserInfo,
    CreateIndexInfo,
    CreateRoleInfo,
    CreateSchemaInfo,
    CreateSequenceInfo,
    CreateTableInfo,
    CreateTypeInfo,
    CreateUserInfo,
    CreateViewInfo,
    DropInfo,
    GrantInfo,
};
use entry::{
    CatalogEntryKind,
    FunctionEntry,
    IndexEntry,
    RoleEntry,
    SchemaEntry,
    SequenceEntry,
    TableEntry,
    TriggerEntry,
    TypeEntry,
    UserEntry,
};
use privilege::Privileges;
use quarry_error::{DbError, Result};

use crate::config::session::SessionIdentity;

pub trait Catalog: Debug + Sync + Send {
    /// Get a schema.
    ///
    /// Returns Ok(None) if a schema with the given name doesn't exist.
    fn get_schema(&self, name: &str) -> Result<Option<Arc<SchemaEntry>>>;

    /// Get a table or view in a schema.
    fn get_table(&self, schema: &str, name: &str) -> Result<Option<Arc<TableEntry>>>;

    fn get_sequence(&self, schema: &str, name: &str) -> Result<Option<Arc<SequenceEntry>>>;

    fn get_type(&self, schema: &str, name: &str) -> Result<Option<Arc<TypeEntry>>>;

    fn get_index(&self, schema: &str, name: &str) -> Result<Option<Arc<IndexEntry>>>;

    fn get_trigger(&self, schema: &str, name: &str) -> Result<Option<Arc<TriggerEntry>>>;

    /// Get a function by name or alias.
    fn get_function(&self, schema: &str, name: &str) -> Result<Option<Arc<FunctionEntry>>>;

    fn get_user(&self, name: &str) -> Result<Option<Arc<UserEntry>>>;

    fn get_role(&self, name: &str) -> Result<Option<Arc<RoleEntry>>>;

    /// All indexes on a table, in creation order.
    fn list_indexes(&self, schema: &str, table: &str) -> Result<Vec<Arc<IndexEntry>>>;

    /// Tables holding a foreign key that references `schema.table`.
    fn referencing_tables(&self, schema: &str, table: &str) -> Result<Vec<Arc<TableEntry>>>;

    /// Find the name of an entry similar to `name`.
    ///
    /// `schema` is ignored for global objects (schemas, users, roles).
    fn find_similar(
        &self,
        schema: Option<&str>,
        kind: CatalogEntryKind,
        name: &str,
    ) -> Result<Option<String>>;

    fn create_schema(&self, create: &CreateSchemaInfo) -> Result<()>;
    fn create_table(&self, create: &CreateTableInfo) -> Result<()>;
    fn create_view(&self, create: &CreateViewInfo) -> Result<()>;
    fn create_type(&self, create: &CreateTypeInfo) -> Result<()>;
    fn create_index(&self, create: &CreateIndexInfo) -> Result<()>;
    fn create_sequence(&self, create: &CreateSequenceInfo) -> Result<()>;
    fn create_user(&self, create: &CreateUserInfo) -> Result<()>;
    fn create_role(&self, create: &CreateRoleInfo) -> Result<()>;

    fn alter_table(&self, alter: &AlterTableInfo) -> Result<()>;
    fn alter_sequence(&self, alter: &AlterSequenceInfo) -> Result<()>;
    fn alter_schema(&self, alter: &AlterSchemaInfo) -> Result<()>;
    fn alter_user(&self, alter: &AlterUserInfo) -> Result<()>;

    /// Drop an entry in the catalog.
    fn drop_entry(&self, drop: &DropInfo) -> Result<()>;

    fn grant(&self, grant: &GrantInfo) -> Result<()>;
    fn revoke(&self, revoke: &GrantInfo) -> Result<()>;

    /// If the session may create, alter, and drop objects in `schema`.
    fn schema_privs(&self, session: &SessionIdentity, schema: &str) -> Result<bool>;

    /// If the session holds all of `privs` on a table.
    fn table_privs(
        &self,
        session: &SessionIdentity,
        schema: &str,
        table: &str,
        privs: Privileges,
    ) -> Result<bool>;

    /// If the session holds all of `privs` on a single column, either
    /// directly or through a table level grant.
    fn column_privs(
        &self,
        session: &SessionIdentity,
        schema: &str,
        table: &str,
        column: &str,
        privs: Privileges,
    ) -> Result<bool>;

    fn execute_priv(&self, session: &SessionIdentity, schema: &str, function: &str)
    -> Result<bool>;

    /// Get a schema, returning an error if it doesn't exist.
    fn require_schema(&self, name: &str) -> Result<Arc<SchemaEntry>> {
        match self.get_schema(name)? {
            Some(schema) => Ok(schema),
            None => Err(missing_entry_error(self, None, CatalogEntryKind::Schema, name)),
        }
    }

    /// Get a table or view, returning an error if it doesn't exist.
    fn require_table(&self, schema: &str, name: &str) -> Result<Arc<TableEntry>> {
        match self.get_table(schema, name)? {
            Some(table) => Ok(table),
            None => Err(missing_entry_error(
                self,
                Some(schema),
                CatalogEntryKind::Table,
                name,
            )),
        }
    }
}

/// Create a user facing error for a missing entry, suggesting a similarly
/// named entry if one exists.
pub fn missing_entry_error<C>(
    catalog: &C,
    schema: Option<&str>,
    kind: CatalogEntryKind,
    name: &str,
) -> DbError
where
    C: Catalog + ?Sized,
{
    // Suggestion lookup failing shouldn't hide the original error.
    let similar = catalog.find_similar(schema, kind, name).ok().flatten();

    let err = match similar {
        Some(similar) => DbError::not_found(format!(
            "Cannot resolve {kind} with name '{name}', did you mean '{similar}'?"
        )),
        None => DbError::not_found(format!("Cannot resolve {kind} with name '{name}'")),
    };

    let err = err.with_field("kind", kind).with_field("name", name);
    match schema {
        Some(schema) => err.with_field("schema", schema),
        None => err,
    }
}
