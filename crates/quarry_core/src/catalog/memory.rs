use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::create::{
    AlterSchemaInfo,
    AlterSequenceInfo,
    AlterTableInfo,
    AlterTableOp,
    AlterUserInfo,
    AlterUserOp,
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
    GrantTarget,
    OnConflict,
    PrivilegeObject,
};
use super::entry::{
    CatalogEntryKind,
    ColumnEntry,
    ConstraintEntry,
    ConstraintKind,
    FunctionEntry,
    IndexEntry,
    IndexKind,
    RoleEntry,
    SchemaEntry,
    SequenceEntry,
    TableEntry,
    TableKind,
    TriggerEntry,
    TypeEntry,
    UserEntry,
};
use super::privilege::Privileges;
use super::Catalog;
use crate::config::session::SessionIdentity;
use crate::functions::builtin::BUILTIN_FUNCTION_SETS;

/// Schema holding builtin functions.
pub const SYSTEM_SCHEMA: &str = "sys";
/// Schema holding temporary tables, writable by everyone.
pub const TEMP_SCHEMA: &str = "tmp";
/// Schema for user objects created by default.
pub const DEFAULT_SCHEMA: &str = "main";
pub const SUPERUSER: &str = "admin";
/// Members of this role bypass every privilege check.
pub const SUPERUSER_ROLE: &str = "sysadmin";
/// Implicit role every session is a member of.
pub const PUBLIC_ROLE: &str = "public";

/// Catalog keeping everything in memory behind a single lock.
#[derive(Debug)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

#[derive(Debug, Default)]
struct CatalogState {
    schemas: IndexMap<String, MemorySchema>,
    users: IndexMap<String, Arc<UserEntry>>,
    roles: IndexMap<String, Arc<RoleEntry>>,
    grants: Vec<GrantRecord>,
    memberships: Vec<Membership>,
}

#[derive(Debug)]
struct MemorySchema {
    entry: Arc<SchemaEntry>,
    /// Tables and views.
    tables: IndexMap<String, Arc<TableEntry>>,
    sequences: IndexMap<String, Arc<SequenceEntry>>,
    types: IndexMap<String, Arc<TypeEntry>>,
    indexes: IndexMap<String, Arc<IndexEntry>>,
    triggers: IndexMap<String, Arc<TriggerEntry>>,
    functions: IndexMap<String, Arc<FunctionEntry>>,
}

impl MemorySchema {
    fn new(entry: SchemaEntry) -> Self {
        MemorySchema {
            entry: Arc::new(entry),
            tables: IndexMap::new(),
            sequences: IndexMap::new(),
            types: IndexMap::new(),
            indexes: IndexMap::new(),
            triggers: IndexMap::new(),
            functions: IndexMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.sequences.is_empty()
            && self.types.is_empty()
            && self.indexes.is_empty()
            && self.triggers.is_empty()
            && self.functions.is_empty()
    }

    fn names(&self, kind: CatalogEntryKind) -> Vec<&str> {
        match kind {
            CatalogEntryKind::Table => self
                .tables
                .values()
                .filter(|t| !t.is_view())
                .map(|t| t.name.as_str())
                .collect(),
            CatalogEntryKind::View => self
                .tables
                .values()
                .filter(|t| t.is_view())
                .map(|t| t.name.as_str())
                .collect(),
            CatalogEntryKind::Sequence => self.sequences.keys().map(|s| s.as_str()).collect(),
            CatalogEntryKind::Type => self.types.keys().map(|s| s.as_str()).collect(),
            CatalogEntryKind::Index => self.indexes.keys().map(|s| s.as_str()).collect(),
            CatalogEntryKind::Trigger => self.triggers.keys().map(|s| s.as_str()).collect(),
            CatalogEntryKind::Function => self
                .functions
                .values()
                .flat_map(|f| std::iter::once(f.set.name).chain(f.set.aliases.iter().copied()))
                .collect(),
            CatalogEntryKind::Schema | CatalogEntryKind::User | CatalogEntryKind::Role => {
                Vec::new()
            }
        }
    }

    fn indexes_on<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Arc<IndexEntry>> {
        self.indexes.values().filter(move |idx| idx.table == table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GrantKey {
    Table { schema: String, table: String },
    Column { schema: String, table: String, column: String },
    Function { schema: String, name: String },
}

impl GrantKey {
    fn is_on_table(&self, on_schema: &str, on_table: &str) -> bool {
        match self {
            Self::Table { schema, table } | Self::Column { schema, table, .. } => {
                schema == on_schema && table == on_table
            }
            Self::Function { .. } => false,
        }
    }

    fn is_in_schema(&self, on_schema: &str) -> bool {
        match self {
            Self::Table { schema, .. }
            | Self::Column { schema, .. }
            | Self::Function { schema, .. } => schema == on_schema,
        }
    }
}

#[derive(Debug, Clone)]
struct GrantRecord {
    grantee: String,
    key: GrantKey,
    privileges: Privileges,
    grant_option: bool,
}

#[derive(Debug, Clone)]
struct Membership {
    role: String,
    member: String,
    admin_option: bool,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Create a catalog with the system, temp, and default schemas, the
    /// superuser, and all builtin functions.
    pub fn new() -> Self {
        let mut state = CatalogState::default();

        let mut sys = MemorySchema::new(SchemaEntry {
            name: SYSTEM_SCHEMA.to_string(),
            owner: SUPERUSER.to_string(),
            system: true,
        });
        for set in BUILTIN_FUNCTION_SETS {
            sys.functions.insert(
                set.name.to_string(),
                Arc::new(FunctionEntry {
                    name: set.name.to_string(),
                    schema: SYSTEM_SCHEMA.to_string(),
                    set,
                    system: true,
                }),
            );
        }
        state.schemas.insert(SYSTEM_SCHEMA.to_string(), sys);
        state.schemas.insert(
            TEMP_SCHEMA.to_string(),
            MemorySchema::new(SchemaEntry {
                name: TEMP_SCHEMA.to_string(),
                owner: PUBLIC_ROLE.to_string(),
                system: true,
            }),
        );
        state.schemas.insert(
            DEFAULT_SCHEMA.to_string(),
            MemorySchema::new(SchemaEntry {
                name: DEFAULT_SCHEMA.to_string(),
                owner: SUPERUSER.to_string(),
                system: false,
            }),
        );

        for role in [SUPERUSER_ROLE, PUBLIC_ROLE] {
            state.roles.insert(
                role.to_string(),
                Arc::new(RoleEntry {
                    name: role.to_string(),
                    admin: None,
                }),
            );
        }
        state.users.insert(
            SUPERUSER.to_string(),
            Arc::new(UserEntry {
                name: SUPERUSER.to_string(),
                full_name: Some("System administrator".to_string()),
                default_schema: DEFAULT_SCHEMA.to_string(),
                default_role: Some(SUPERUSER_ROLE.to_string()),
            }),
        );
        state.memberships.push(Membership {
            role: SUPERUSER_ROLE.to_string(),
            member: SUPERUSER.to_string(),
            admin_option: true,
        });

        MemoryCatalog {
            state: RwLock::new(state),
        }
    }

    /// Session for the superuser in the default schema.
    pub fn superuser_session() -> SessionIdentity {
        SessionIdentity::new(SUPERUSER, SUPERUSER_ROLE, DEFAULT_SCHEMA)
    }
}

impl CatalogState {
    fn schema(&self, name: &str) -> Result<&MemorySchema> {
        self.schemas
            .get(name)
            .ok_or_else(|| DbError::not_found(format!("Missing schema '{name}'")).with_field("schema", name))
    }

    fn schema_mut(&mut self, name: &str) -> Result<&mut MemorySchema> {
        self.schemas
            .get_mut(name)
            .ok_or_else(|| DbError::not_found(format!("Missing schema '{name}'")).with_field("schema", name))
    }

    /// Names the session acts as: the user, the session role, public, and
    /// every role reachable through memberships.
    fn principals(&self, session: &SessionIdentity) -> HashSet<String> {
        let mut principals = HashSet::new();
        let mut pending = vec![
            session.user.clone(),
            session.role.clone(),
            PUBLIC_ROLE.to_string(),
        ];

        while let Some(name) = pending.pop() {
            if !principals.insert(name.clone()) {
                continue;
            }
            for membership in &self.memberships {
                if membership.member == name {
                    pending.push(membership.role.clone());
                }
            }
        }

        principals
    }

    fn is_owner(&self, principals: &HashSet<String>, schema: &str) -> bool {
        if principals.contains(SUPERUSER_ROLE) {
            return true;
        }
        match self.schemas.get(schema) {
            Some(schema) => principals.contains(&schema.entry.owner),
            None => false,
        }
    }

    fn granted(&self, principals: &HashSet<String>, key: &GrantKey) -> Privileges {
        self.grants
            .iter()
            .filter(|g| &g.key == key && principals.contains(&g.grantee))
            .fold(Privileges::NONE, |acc, g| acc.union(g.privileges))
    }

    fn principal_exists(&self, name: &str) -> bool {
        self.users.contains_key(name) || self.roles.contains_key(name)
    }

    fn grant_keys(&self, object: &PrivilegeObject) -> Result<Vec<GrantKey>> {
        Ok(match object {
            PrivilegeObject::Table {
                schema,
                table,
                columns,
            } => {
                let entry = self
                    .schema(schema)?
                    .tables
                    .get(table)
                    .ok_or_else(|| DbError::not_found(format!("Missing table '{schema}.{table}'")))?;
                match columns {
                    Some(columns) => columns
                        .iter()
                        .map(|column| {
                            if entry.column_index(column).is_none() {
                                return Err(DbError::not_found(format!(
                                    "Missing column '{column}' in table '{table}'"
                                )));
                            }
                            Ok(GrantKey::Column {
                                schema: schema.clone(),
                                table: table.clone(),
                                column: column.clone(),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    None => vec![GrantKey::Table {
                        schema: schema.clone(),
                        table: table.clone(),
                    }],
                }
            }
            PrivilegeObject::Function { schema, name } => vec![GrantKey::Function {
                schema: schema.clone(),
                name: name.clone(),
            }],
        })
    }

    fn drop_table_entries(&mut self, schema: &str, table: &str) -> Result<()> {
        let mem = self.schema_mut(schema)?;
        mem.tables.shift_remove(table);
        mem.indexes.retain(|_, idx| idx.table != table);
        mem.triggers.retain(|_, trig| trig.table != table);
        self.grants.retain(|g| !g.key.is_on_table(schema, table));
        Ok(())
    }

    /// Remove foreign keys in other tables pointing at `schema.table`.
    fn drop_referencing_constraints(&mut self, schema: &str, table: &str) {
        for mem in self.schemas.values_mut() {
            for ent in mem.tables.values_mut() {
                let has_ref = ent.constraints.iter().any(|c| references(c, schema, table));
                if has_ref && !(ent.schema == schema && ent.name == table) {
                    Arc::make_mut(ent)
                        .constraints
                        .retain(|c| !references(c, schema, table));
                }
            }
        }
    }

    fn referencing(&self, schema: &str, table: &str) -> Vec<Arc<TableEntry>> {
        self.schemas
            .values()
            .flat_map(|mem| mem.tables.values())
            .filter(|ent| {
                !(ent.schema == schema && ent.name == table)
                    && ent.constraints.iter().any(|c| references(c, schema, table))
            })
            .cloned()
            .collect()
    }

    fn add_key_index(&mut self, table: &TableEntry, constraint: &ConstraintEntry) -> Result<()> {
        let columns = match constraint.key_columns() {
            Some(cols) => cols.to_vec(),
            None => return Ok(()),
        };
        let mem = self.schema_mut(&table.schema)?;
        if mem.indexes.contains_key(&constraint.name) {
            return Err(DbError::already_exists(format!(
                "Index '{}' already exists",
                constraint.name
            )));
        }
        mem.indexes.insert(
            constraint.name.clone(),
            Arc::new(IndexEntry {
                name: constraint.name.clone(),
                schema: table.schema.clone(),
                table: table.name.clone(),
                columns,
                kind: IndexKind::Hash,
                unique: true,
            }),
        );
        Ok(())
    }
}

fn references(constraint: &ConstraintEntry, schema: &str, table: &str) -> bool {
    matches!(&constraint.kind,
        ConstraintKind::ForeignKey { ref_schema, ref_table, .. }
            if ref_schema == schema && ref_table == table)
}

fn conflict<T>(
    map: &mut IndexMap<String, T>,
    name: &str,
    on_conflict: OnConflict,
    kind: CatalogEntryKind,
) -> Result<bool> {
    match (map.contains_key(name), on_conflict) {
        (false, _) => Ok(true),
        (true, OnConflict::Ignore) => Ok(false),
        (true, OnConflict::Replace) => {
            map.shift_remove(name);
            Ok(true)
        }
        (true, OnConflict::Error) => Err(DbError::already_exists(format!(
            "Duplicate {kind} name: '{name}'"
        ))
        .with_field("name", name)),
    }
}

/// Shift column indexes after removing column `removed`.
fn shift_columns(columns: &mut [usize], removed: usize) {
    for col in columns.iter_mut() {
        if *col > removed {
            *col -= 1;
        }
    }
}

#[derive(Debug, Clone)]
struct SimilarEntry {
    score: f64,
    name: String,
}

impl SimilarEntry {
    /// Maybe updates `current` with a new entry if the new entry scores higher
    /// in similarity with `name`.
    fn maybe_update(current: &mut Option<Self>, entry: &str, name: &str) {
        const SIMILARITY_THRESHOLD: f64 = 0.7;

        let score = strsim::jaro(entry, name);
        if score > SIMILARITY_THRESHOLD {
            match current {
                Some(existing) if existing.score >= score => (),
                _ => {
                    *current = Some(SimilarEntry {
                        score,
                        name: entry.to_string(),
                    })
                }
            }
        }
    }
}

impl Catalog for MemoryCatalog {
    fn get_schema(&self, name: &str) -> Result<Option<Arc<SchemaEntry>>> {
        Ok(self.state.read().schemas.get(name).map(|s| s.entry.clone()))
    }

    fn get_table(&self, schema: &str, name: &str) -> Result<Option<Arc<TableEntry>>> {
        let state = self.state.read();
        Ok(state
            .schemas
            .get(schema)
            .and_then(|s| s.tables.get(name).cloned()))
    }

    fn get_sequence(&self, schema: &str, name: &str) -> Result<Option<Arc<SequenceEntry>>> {
        let state = self.state.read();
        Ok(state
            .schemas
            .get(schema)
            .and_then(|s| s.sequences.get(name).cloned()))
    }

    fn get_type(&self, schema: &str, name: &str) -> Result<Option<Arc<TypeEntry>>> {
        let state = self.state.read();
        Ok(state
            .schemas
            .get(schema)
            .and_then(|s| s.types.get(name).cloned()))
    }

    fn get_index(&self, schema: &str, name: &str) -> Result<Option<Arc<IndexEntry>>> {
        let state = self.state.read();
        Ok(state
            .schemas
            .get(schema)
            .and_then(|s| s.indexes.get(name).cloned()))
    }

    fn get_trigger(&self, schema: &str, name: &str) -> Result<Option<Arc<TriggerEntry>>> {
        let state = self.state.read();
        Ok(state
            .schemas
            .get(schema)
            .and_then(|s| s.triggers.get(name).cloned()))
    }

    fn get_function(&self, schema: &str, name: &str) -> Result<Option<Arc<FunctionEntry>>> {
        let state = self.state.read();
        let schema = match state.schemas.get(schema) {
            Some(schema) => schema,
            None => return Ok(None),
        };
        if let Some(ent) = schema.functions.get(name) {
            return Ok(Some(ent.clone()));
        }
        Ok(schema
            .functions
            .values()
            .find(|ent| ent.set.matches_name(name))
            .cloned())
    }

    fn get_user(&self, name: &str) -> Result<Option<Arc<UserEntry>>> {
        Ok(self.state.read().users.get(name).cloned())
    }

    fn get_role(&self, name: &str) -> Result<Option<Arc<RoleEntry>>> {
        Ok(self.state.read().roles.get(name).cloned())
    }

    fn list_indexes(&self, schema: &str, table: &str) -> Result<Vec<Arc<IndexEntry>>> {
        let state = self.state.read();
        Ok(match state.schemas.get(schema) {
            Some(schema) => schema.indexes_on(table).cloned().collect(),
            None => Vec::new(),
        })
    }

    fn referencing_tables(&self, schema: &str, table: &str) -> Result<Vec<Arc<TableEntry>>> {
        Ok(self.state.read().referencing(schema, table))
    }

    fn find_similar(
        &self,
        schema: Option<&str>,
        kind: CatalogEntryKind,
        name: &str,
    ) -> Result<Option<String>> {
        let state = self.state.read();
        let mut similar: Option<SimilarEntry> = None;

        let candidates: Vec<&str> = match kind {
            CatalogEntryKind::Schema => state.schemas.keys().map(|s| s.as_str()).collect(),
            CatalogEntryKind::User => state.users.keys().map(|s| s.as_str()).collect(),
            CatalogEntryKind::Role => state.roles.keys().map(|s| s.as_str()).collect(),
            kind => match schema.and_then(|s| state.schemas.get(s)) {
                Some(mem) => {
                    let mut names = mem.names(kind);
                    // Tables and views share a namespace.
                    if kind == CatalogEntryKind::Table {
                        names.extend(mem.names(CatalogEntryKind::View));
                    }
                    names
                }
                None => Vec::new(),
            },
        };

        for candidate in candidates {
            SimilarEntry::maybe_update(&mut similar, candidate, name);
        }

        Ok(similar.map(|similar| similar.name))
    }

    fn create_schema(&self, create: &CreateSchemaInfo) -> Result<()> {
        let mut state = self.state.write();
        if let Some(existing) = state.schemas.get(&create.name) {
            if existing.entry.system {
                return Err(DbError::privilege_denied(format!(
                    "Cannot replace system schema '{}'",
                    create.name
                )));
            }
        }
        if !conflict(
            &mut state.schemas,
            &create.name,
            create.on_conflict,
            CatalogEntryKind::Schema,
        )? {
            return Ok(());
        }
        state.schemas.insert(
            create.name.clone(),
            MemorySchema::new(SchemaEntry {
                name: create.name.clone(),
                owner: create.owner.clone(),
                system: false,
            }),
        );
        debug!(schema = %create.name, "created schema");
        Ok(())
    }

    fn create_table(&self, create: &CreateTableInfo) -> Result<()> {
        let mut state = self.state.write();
        let mem = state.schema_mut(&create.schema)?;
        if let Some(existing) = mem.tables.get(&create.name) {
            if existing.is_view() && create.on_conflict != OnConflict::Ignore {
                return Err(DbError::already_exists(format!(
                    "'{}' already exists as a view",
                    create.name
                )));
            }
        }
        if !conflict(
            &mut mem.tables,
            &create.name,
            create.on_conflict,
            CatalogEntryKind::Table,
        )? {
            return Ok(());
        }
        // Indexes of a replaced table go with it.
        mem.indexes.retain(|_, idx| idx.table != create.name);

        let mut columns = create.columns.clone();
        columns.push(ColumnEntry::row_id());

        let table = TableEntry {
            name: create.name.clone(),
            schema: create.schema.clone(),
            columns,
            constraints: create.constraints.clone(),
            kind: TableKind::Base,
            system: false,
            temp: create.temp,
        };

        for constraint in &create.constraints {
            state.add_key_index(&table, constraint)?;
        }

        state
            .schema_mut(&create.schema)?
            .tables
            .insert(create.name.clone(), Arc::new(table));
        debug!(schema = %create.schema, table = %create.name, "created table");

        Ok(())
    }

    fn create_view(&self, create: &CreateViewInfo) -> Result<()> {
        let mut state = self.state.write();
        let mem = state.schema_mut(&create.schema)?;
        if let Some(existing) = mem.tables.get(&create.name) {
            if !existing.is_view() {
                return Err(DbError::already_exists(format!(
                    "'{}' already exists as a table",
                    create.name
                )));
            }
        }
        if !conflict(
            &mut mem.tables,
            &create.name,
            create.on_conflict,
            CatalogEntryKind::View,
        )? {
            return Ok(());
        }
        mem.tables.insert(
            create.name.clone(),
            Arc::new(TableEntry {
                name: create.name.clone(),
                schema: create.schema.clone(),
                columns: create.columns.clone(),
                constraints: Vec::new(),
                kind: TableKind::View {
                    query: create.query.clone(),
                    column_aliases: create.column_aliases.clone(),
                },
                system: false,
                temp: false,
            }),
        );
        Ok(())
    }

    fn create_type(&self, create: &CreateTypeInfo) -> Result<()> {
        let mut state = self.state.write();
        let mem = state.schema_mut(&create.schema)?;
        conflict(
            &mut mem.types,
            &create.name,
            OnConflict::Error,
            CatalogEntryKind::Type,
        )?;
        mem.types.insert(
            create.name.clone(),
            Arc::new(TypeEntry {
                name: create.name.clone(),
                schema: create.schema.clone(),
                datatype: create.datatype.clone(),
            }),
        );
        Ok(())
    }

    fn create_index(&self, create: &CreateIndexInfo) -> Result<()> {
        let mut state = self.state.write();
        let mem = state.schema_mut(&create.schema)?;
        match mem.tables.get(&create.table) {
            Some(table) if !table.is_view() => (),
            Some(_) => {
                return Err(DbError::invalid_input(format!(
                    "Cannot create an index on view '{}'",
                    create.table
                )));
            }
            None => {
                return Err(DbError::not_found(format!(
                    "Missing table '{}'",
                    create.table
                )));
            }
        }
        if !conflict(
            &mut mem.indexes,
            &create.name,
            create.on_conflict,
            CatalogEntryKind::Index,
        )? {
            return Ok(());
        }
        mem.indexes.insert(
            create.name.clone(),
            Arc::new(IndexEntry {
                name: create.name.clone(),
                schema: create.schema.clone(),
                table: create.table.clone(),
                columns: create.columns.clone(),
                kind: create.kind,
                unique: create.unique,
            }),
        );
        Ok(())
    }

    fn create_sequence(&self, create: &CreateSequenceInfo) -> Result<()> {
        let mut state = self.state.write();
        let mem = state.schema_mut(&create.schema)?;
        if !conflict(
            &mut mem.sequences,
            &create.name,
            create.on_conflict,
            CatalogEntryKind::Sequence,
        )? {
            return Ok(());
        }
        mem.sequences.insert(
            create.name.clone(),
            Arc::new(SequenceEntry {
                name: create.name.clone(),
                schema: create.schema.clone(),
                datatype: create.datatype.clone(),
                start: create.start,
                increment: create.increment,
                min_value: create.min_value,
                max_value: create.max_value,
                cycle: create.cycle,
                cache: create.cache,
            }),
        );
        Ok(())
    }

    fn create_user(&self, create: &CreateUserInfo) -> Result<()> {
        let mut state = self.state.write();
        if state.principal_exists(&create.name) {
            return Err(DbError::already_exists(format!(
                "User or role '{}' already exists",
                create.name
            )));
        }
        state.users.insert(
            create.name.clone(),
            Arc::new(UserEntry {
                name: create.name.clone(),
                full_name: create.full_name.clone(),
                default_schema: create.default_schema.clone(),
                default_role: create.default_role.clone(),
            }),
        );
        if let Some(role) = &create.default_role {
            state.memberships.push(Membership {
                role: role.clone(),
                member: create.name.clone(),
                admin_option: false,
            });
        }
        Ok(())
    }

    fn create_role(&self, create: &CreateRoleInfo) -> Result<()> {
        let mut state = self.state.write();
        if state.principal_exists(&create.name) {
            return Err(DbError::already_exists(format!(
                "User or role '{}' already exists",
                create.name
            )));
        }
        state.roles.insert(
            create.name.clone(),
            Arc::new(RoleEntry {
                name: create.name.clone(),
                admin: create.admin.clone(),
            }),
        );
        Ok(())
    }

    fn alter_table(&self, alter: &AlterTableInfo) -> Result<()> {
        let mut state = self.state.write();

        // Ops moving the table to a new key.
        match &alter.op {
            AlterTableOp::RenameTable { to } => {
                let mem = state.schema_mut(&alter.schema)?;
                if mem.tables.contains_key(to) {
                    return Err(DbError::already_exists(format!("Table '{to}' already exists")));
                }
                let mut ent = mem
                    .tables
                    .shift_remove(&alter.name)
                    .ok_or_else(|| DbError::not_found(format!("Missing table '{}'", alter.name)))?;
                Arc::make_mut(&mut ent).name = to.clone();
                mem.tables.insert(to.clone(), ent);
                for idx in mem.indexes.values_mut() {
                    if idx.table == alter.name {
                        Arc::make_mut(idx).table = to.clone();
                    }
                }
                return Ok(());
            }
            AlterTableOp::SetSchema { to } => {
                if state.schema(to)?.tables.contains_key(&alter.name) {
                    return Err(DbError::already_exists(format!(
                        "Table '{}' already exists in schema '{to}'",
                        alter.name
                    )));
                }
                let mem = state.schema_mut(&alter.schema)?;
                let mut ent = mem
                    .tables
                    .shift_remove(&alter.name)
                    .ok_or_else(|| DbError::not_found(format!("Missing table '{}'", alter.name)))?;
                let moved: Vec<_> = mem
                    .indexes
                    .iter()
                    .filter(|(_, idx)| idx.table == alter.name)
                    .map(|(name, _)| name.clone())
                    .collect();
                let mut indexes = Vec::new();
                for name in moved {
                    if let Some(mut idx) = mem.indexes.shift_remove(&name) {
                        Arc::make_mut(&mut idx).schema = to.clone();
                        indexes.push(idx);
                    }
                }
                Arc::make_mut(&mut ent).schema = to.clone();
                let target = state.schema_mut(to)?;
                target.tables.insert(alter.name.clone(), ent);
                for idx in indexes {
                    target.indexes.insert(idx.name.clone(), idx);
                }
                return Ok(());
            }
            _ => (),
        }

        let mut table = state
            .schema(&alter.schema)?
            .tables
            .get(&alter.name)
            .cloned()
            .ok_or_else(|| DbError::not_found(format!("Missing table '{}'", alter.name)))?;
        let ent = Arc::make_mut(&mut table);

        match &alter.op {
            AlterTableOp::AddColumn(column) => {
                if ent.column_index(&column.name).is_some() {
                    return Err(DbError::already_exists(format!(
                        "Column '{}' already exists",
                        column.name
                    )));
                }
                // Keep the row id last.
                let pos = ent.row_id_column().unwrap_or(ent.columns.len());
                ent.columns.insert(pos, column.clone());
            }
            AlterTableOp::DropColumn { column, cascade } => {
                let column = *column;
                let uses_column = |c: &ConstraintEntry| match &c.kind {
                    ConstraintKind::PrimaryKey(cols) | ConstraintKind::Unique(cols) => {
                        cols.contains(&column)
                    }
                    ConstraintKind::ForeignKey { columns, .. } => columns.contains(&column),
                    ConstraintKind::Check(_) => false,
                };
                if !cascade && ent.constraints.iter().any(uses_column) {
                    return Err(DbError::invalid_input(format!(
                        "Column '{}' is used by a constraint",
                        ent.columns.get(column).map(|c| c.name.as_str()).unwrap_or("?")
                    )));
                }
                let dropped: Vec<_> = ent
                    .constraints
                    .iter()
                    .filter(|c| uses_column(c))
                    .map(|c| c.name.clone())
                    .collect();
                ent.constraints.retain(|c| !uses_column(c));
                ent.columns.remove(column);
                for constraint in &mut ent.constraints {
                    match &mut constraint.kind {
                        ConstraintKind::PrimaryKey(cols) | ConstraintKind::Unique(cols) => {
                            shift_columns(cols, column)
                        }
                        ConstraintKind::ForeignKey { columns, .. } => shift_columns(columns, column),
                        ConstraintKind::Check(_) => (),
                    }
                }

                let mem = state.schema_mut(&alter.schema)?;
                mem.indexes.retain(|name, idx| {
                    !(idx.table == alter.name
                        && (dropped.contains(name) || idx.columns.contains(&column)))
                });
                for idx in mem.indexes.values_mut() {
                    if idx.table == alter.name {
                        shift_columns(&mut Arc::make_mut(idx).columns, column);
                    }
                }
            }
            AlterTableOp::SetDefault { column, default } => {
                let col = ent
                    .columns
                    .get_mut(*column)
                    .ok_or_else(|| DbError::new("Column index out of range"))?;
                col.default = default.clone();
            }
            AlterTableOp::SetNotNull { column, not_null } => {
                let col = ent
                    .columns
                    .get_mut(*column)
                    .ok_or_else(|| DbError::new("Column index out of range"))?;
                col.not_null = *not_null;
            }
            AlterTableOp::SetDataType { column, datatype } => {
                let col = ent
                    .columns
                    .get_mut(*column)
                    .ok_or_else(|| DbError::new("Column index out of range"))?;
                col.datatype = datatype.clone();
            }
            AlterTableOp::AddConstraint(constraint) => {
                if ent.find_constraint(&constraint.name).is_some() {
                    return Err(DbError::already_exists(format!(
                        "Constraint '{}' already exists",
                        constraint.name
                    )));
                }
                ent.constraints.push(constraint.clone());
                let snapshot = ent.clone();
                state.add_key_index(&snapshot, constraint)?;
            }
            AlterTableOp::DropConstraint { name, .. } => {
                if ent.find_constraint(name).is_none() {
                    return Err(DbError::not_found(format!("Missing constraint '{name}'")));
                }
                ent.constraints.retain(|c| &c.name != name);
                let mem = state.schema_mut(&alter.schema)?;
                mem.indexes
                    .retain(|idx_name, idx| !(idx.table == alter.name && idx_name == name));
            }
            AlterTableOp::RenameColumn { column, to } => {
                if ent.column_index(to).is_some() {
                    return Err(DbError::already_exists(format!("Column '{to}' already exists")));
                }
                let col = ent
                    .columns
                    .get_mut(*column)
                    .ok_or_else(|| DbError::new("Column index out of range"))?;
                col.name = to.clone();
            }
            AlterTableOp::RenameTable { .. } | AlterTableOp::SetSchema { .. } => (),
        }

        state
            .schema_mut(&alter.schema)?
            .tables
            .insert(alter.name.clone(), table);

        Ok(())
    }

    fn alter_sequence(&self, alter: &AlterSequenceInfo) -> Result<()> {
        let mut state = self.state.write();
        let mem = state.schema_mut(&alter.schema)?;
        let seq = mem
            .sequences
            .get_mut(&alter.name)
            .ok_or_else(|| DbError::not_found(format!("Missing sequence '{}'", alter.name)))?;
        let seq = Arc::make_mut(seq);
        if let Some(start) = alter.restart {
            seq.start = start;
        }
        if let Some(increment) = alter.increment {
            seq.increment = increment;
        }
        if let Some(min) = alter.min_value {
            seq.min_value = min;
        }
        if let Some(max) = alter.max_value {
            seq.max_value = max;
        }
        if let Some(cycle) = alter.cycle {
            seq.cycle = cycle;
        }
        Ok(())
    }

    fn alter_schema(&self, alter: &AlterSchemaInfo) -> Result<()> {
        let mut state = self.state.write();
        if state.schema(&alter.name)?.entry.system {
            return Err(DbError::privilege_denied(format!(
                "Cannot rename system schema '{}'",
                alter.name
            )));
        }
        if state.schemas.contains_key(&alter.rename_to) {
            return Err(DbError::already_exists(format!(
                "Schema '{}' already exists",
                alter.rename_to
            )));
        }

        let mut mem = state
            .schemas
            .shift_remove(&alter.name)
            .ok_or_else(|| DbError::not_found(format!("Missing schema '{}'", alter.name)))?;
        let to = alter.rename_to.clone();
        Arc::make_mut(&mut mem.entry).name = to.clone();
        for ent in mem.tables.values_mut() {
            Arc::make_mut(ent).schema = to.clone();
        }
        for ent in mem.sequences.values_mut() {
            Arc::make_mut(ent).schema = to.clone();
        }
        for ent in mem.types.values_mut() {
            Arc::make_mut(ent).schema = to.clone();
        }
        for ent in mem.indexes.values_mut() {
            Arc::make_mut(ent).schema = to.clone();
        }
        for ent in mem.triggers.values_mut() {
            Arc::make_mut(ent).schema = to.clone();
        }
        state.schemas.insert(to.clone(), mem);

        // Foreign keys anywhere may point into the renamed schema.
        for mem in state.schemas.values_mut() {
            for ent in mem.tables.values_mut() {
                let needs_update = ent.constraints.iter().any(|c| {
                    matches!(&c.kind, ConstraintKind::ForeignKey { ref_schema, .. } if ref_schema == &alter.name)
                });
                if needs_update {
                    for c in &mut Arc::make_mut(ent).constraints {
                        if let ConstraintKind::ForeignKey { ref_schema, .. } = &mut c.kind {
                            if *ref_schema == alter.name {
                                *ref_schema = to.clone();
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn alter_user(&self, alter: &AlterUserInfo) -> Result<()> {
        let mut state = self.state.write();
        let mut user = state
            .users
            .get(&alter.name)
            .cloned()
            .ok_or_else(|| DbError::not_found(format!("Missing user '{}'", alter.name)))?;

        match &alter.op {
            // Credentials are stored outside of the catalog.
            AlterUserOp::SetPassword => (),
            AlterUserOp::SetSchema(schema) => {
                state.schema(schema)?;
                Arc::make_mut(&mut user).default_schema = schema.clone();
            }
            AlterUserOp::SetDefaultRole(role) => {
                if !state.roles.contains_key(role) {
                    return Err(DbError::not_found(format!("Missing role '{role}'")));
                }
                Arc::make_mut(&mut user).default_role = Some(role.clone());
            }
            AlterUserOp::Rename(to) => {
                if state.principal_exists(to) {
                    return Err(DbError::already_exists(format!(
                        "User or role '{to}' already exists"
                    )));
                }
                state.users.shift_remove(&alter.name);
                Arc::make_mut(&mut user).name = to.clone();
                for m in &mut state.memberships {
                    if m.member == alter.name {
                        m.member = to.clone();
                    }
                }
                for g in &mut state.grants {
                    if g.grantee == alter.name {
                        g.grantee = to.clone();
                    }
                }
                state.users.insert(to.clone(), user);
                return Ok(());
            }
        }

        state.users.insert(alter.name.clone(), user);
        Ok(())
    }

    fn drop_entry(&self, drop: &DropInfo) -> Result<()> {
        let mut state = self.state.write();

        let schema_name = match (drop.kind, &drop.schema) {
            (CatalogEntryKind::Schema | CatalogEntryKind::User | CatalogEntryKind::Role, _) => None,
            (_, Some(schema)) => Some(schema.clone()),
            (kind, None) => {
                return Err(DbError::new(format!("Missing schema for dropping {kind}")));
            }
        };

        match (drop.kind, schema_name) {
            (CatalogEntryKind::Schema, _) => {
                let mem = state.schema(&drop.name)?;
                if mem.entry.system {
                    return Err(DbError::privilege_denied(format!(
                        "Cannot drop system schema '{}'",
                        drop.name
                    )));
                }
                if !drop.cascade && !mem.is_empty() {
                    return Err(DbError::invalid_input(format!(
                        "Schema '{}' is not empty, use CASCADE to drop its contents",
                        drop.name
                    )));
                }
                let tables: Vec<_> = mem.tables.keys().cloned().collect();
                for table in tables {
                    state.drop_referencing_constraints(&drop.name, &table);
                }
                state.schemas.shift_remove(&drop.name);
                state.grants.retain(|g| !g.key.is_in_schema(&drop.name));
            }
            (CatalogEntryKind::Table | CatalogEntryKind::View, Some(schema)) => {
                let ent = state
                    .schema(&schema)?
                    .tables
                    .get(&drop.name)
                    .cloned()
                    .ok_or_else(|| {
                        DbError::not_found(format!("Missing {} '{}'", drop.kind, drop.name))
                    })?;
                if ent.system {
                    return Err(DbError::privilege_denied(format!(
                        "Cannot drop system table '{}'",
                        drop.name
                    )));
                }
                if !ent.is_view() {
                    let dependents = state.referencing(&schema, &drop.name);
                    if !dependents.is_empty() && !drop.cascade {
                        return Err(DbError::invalid_input(format!(
                            "Table '{}' is referenced by '{}', use CASCADE to drop it",
                            drop.name, dependents[0].name
                        )));
                    }
                    state.drop_referencing_constraints(&schema, &drop.name);
                }
                state.drop_table_entries(&schema, &drop.name)?;
            }
            (CatalogEntryKind::Sequence, Some(schema)) => {
                if state
                    .schema_mut(&schema)?
                    .sequences
                    .shift_remove(&drop.name)
                    .is_none()
                {
                    return Err(DbError::not_found(format!("Missing sequence '{}'", drop.name)));
                }
            }
            (CatalogEntryKind::Type, Some(schema)) => {
                if state.schema_mut(&schema)?.types.shift_remove(&drop.name).is_none() {
                    return Err(DbError::not_found(format!("Missing type '{}'", drop.name)));
                }
            }
            (CatalogEntryKind::Index, Some(schema)) => {
                if state.schema_mut(&schema)?.indexes.shift_remove(&drop.name).is_none() {
                    return Err(DbError::not_found(format!("Missing index '{}'", drop.name)));
                }
            }
            (CatalogEntryKind::Trigger, Some(schema)) => {
                if state.schema_mut(&schema)?.triggers.shift_remove(&drop.name).is_none() {
                    return Err(DbError::not_found(format!("Missing trigger '{}'", drop.name)));
                }
            }
            (CatalogEntryKind::Function, Some(schema)) => {
                let mem = state.schema_mut(&schema)?;
                match mem.functions.get(&drop.name) {
                    Some(ent) if ent.system => {
                        return Err(DbError::privilege_denied(format!(
                            "Cannot drop system function '{}'",
                            drop.name
                        )));
                    }
                    Some(_) => {
                        mem.functions.shift_remove(&drop.name);
                    }
                    None => {
                        return Err(DbError::not_found(format!("Missing function '{}'", drop.name)));
                    }
                }
            }
            (CatalogEntryKind::User, _) => {
                if drop.name == SUPERUSER {
                    return Err(DbError::privilege_denied("Cannot drop the superuser"));
                }
                if state.users.shift_remove(&drop.name).is_none() {
                    return Err(DbError::not_found(format!("Missing user '{}'", drop.name)));
                }
                state.memberships.retain(|m| m.member != drop.name);
                state.grants.retain(|g| g.grantee != drop.name);
            }
            (CatalogEntryKind::Role, _) => {
                if drop.name == SUPERUSER_ROLE || drop.name == PUBLIC_ROLE {
                    return Err(DbError::privilege_denied(format!(
                        "Cannot drop builtin role '{}'",
                        drop.name
                    )));
                }
                if state.roles.shift_remove(&drop.name).is_none() {
                    return Err(DbError::not_found(format!("Missing role '{}'", drop.name)));
                }
                state
                    .memberships
                    .retain(|m| m.member != drop.name && m.role != drop.name);
                state.grants.retain(|g| g.grantee != drop.name);
            }
            (kind, None) => {
                return Err(DbError::new(format!("Missing schema for dropping {kind}")));
            }
        }

        debug!(kind = %drop.kind, name = %drop.name, "dropped entry");
        Ok(())
    }

    fn grant(&self, grant: &GrantInfo) -> Result<()> {
        let mut state = self.state.write();
        for grantee in &grant.grantees {
            if !state.principal_exists(grantee) {
                return Err(DbError::not_found(format!("Missing user or role '{grantee}'")));
            }
        }

        match &grant.target {
            GrantTarget::Privileges { privileges, object } => {
                let keys = state.grant_keys(object)?;
                for grantee in &grant.grantees {
                    for key in &keys {
                        let existing = state
                            .grants
                            .iter_mut()
                            .find(|g| &g.grantee == grantee && &g.key == key);
                        match existing {
                            Some(existing) => {
                                existing.privileges = existing.privileges.union(*privileges);
                                existing.grant_option |= grant.grant_option;
                            }
                            None => state.grants.push(GrantRecord {
                                grantee: grantee.clone(),
                                key: key.clone(),
                                privileges: *privileges,
                                grant_option: grant.grant_option,
                            }),
                        }
                    }
                }
            }
            GrantTarget::Roles(roles) => {
                for role in roles {
                    if !state.roles.contains_key(role) {
                        return Err(DbError::not_found(format!("Missing role '{role}'")));
                    }
                    for grantee in &grant.grantees {
                        let existing = state
                            .memberships
                            .iter_mut()
                            .find(|m| &m.role == role && &m.member == grantee);
                        match existing {
                            Some(existing) => existing.admin_option |= grant.grant_option,
                            None => state.memberships.push(Membership {
                                role: role.clone(),
                                member: grantee.clone(),
                                admin_option: grant.grant_option,
                            }),
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn revoke(&self, revoke: &GrantInfo) -> Result<()> {
        let mut state = self.state.write();
        match &revoke.target {
            GrantTarget::Privileges { privileges, object } => {
                let keys = state.grant_keys(object)?;
                for record in state.grants.iter_mut() {
                    if revoke.grantees.contains(&record.grantee) && keys.contains(&record.key) {
                        if revoke.grant_option {
                            record.grant_option = false;
                        } else {
                            record.privileges = record.privileges.difference(*privileges);
                        }
                    }
                }
                state.grants.retain(|g| !g.privileges.is_empty());
            }
            GrantTarget::Roles(roles) => {
                if revoke.grant_option {
                    for m in state.memberships.iter_mut() {
                        if roles.contains(&m.role) && revoke.grantees.contains(&m.member) {
                            m.admin_option = false;
                        }
                    }
                } else {
                    state
                        .memberships
                        .retain(|m| !(roles.contains(&m.role) && revoke.grantees.contains(&m.member)));
                }
            }
        }
        Ok(())
    }

    fn schema_privs(&self, session: &SessionIdentity, schema: &str) -> Result<bool> {
        let state = self.state.read();
        let principals = state.principals(session);
        Ok(state.is_owner(&principals, schema))
    }

    fn table_privs(
        &self,
        session: &SessionIdentity,
        schema: &str,
        table: &str,
        privs: Privileges,
    ) -> Result<bool> {
        let state = self.state.read();
        let principals = state.principals(session);
        if state.is_owner(&principals, schema) {
            return Ok(true);
        }
        let granted = state.granted(
            &principals,
            &GrantKey::Table {
                schema: schema.to_string(),
                table: table.to_string(),
            },
        );
        Ok(granted.contains(privs))
    }

    fn column_privs(
        &self,
        session: &SessionIdentity,
        schema: &str,
        table: &str,
        column: &str,
        privs: Privileges,
    ) -> Result<bool> {
        let state = self.state.read();
        let principals = state.principals(session);
        if state.is_owner(&principals, schema) {
            return Ok(true);
        }
        let on_table = state.granted(
            &principals,
            &GrantKey::Table {
                schema: schema.to_string(),
                table: table.to_string(),
            },
        );
        let on_column = state.granted(
            &principals,
            &GrantKey::Column {
                schema: schema.to_string(),
                table: table.to_string(),
                column: column.to_string(),
            },
        );
        Ok(on_table.union(on_column).contains(privs))
    }

    fn execute_priv(
        &self,
        session: &SessionIdentity,
        schema: &str,
        function: &str,
    ) -> Result<bool> {
        let state = self.state.read();
        let system = state
            .schemas
            .get(schema)
            .and_then(|s| s.functions.values().find(|f| f.set.matches_name(function)))
            .map(|f| f.system)
            .unwrap_or(false);
        if system {
            return Ok(true);
        }
        let principals = state.principals(session);
        if state.is_owner(&principals, schema) {
            return Ok(true);
        }
        let granted = state.granted(
            &principals,
            &GrantKey::Function {
                schema: schema.to_string(),
                name: function.to_string(),
            },
        );
        Ok(granted.contains(Privileges::EXECUTE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::datatype::DataType;

    fn create_table(catalog: &MemoryCatalog, name: &str, constraints: Vec<ConstraintEntry>) {
        catalog
            .create_table(&CreateTableInfo {
                schema: DEFAULT_SCHEMA.to_string(),
                name: name.to_string(),
                columns: vec![
                    ColumnEntry::new("a", DataType::Int32),
                    ColumnEntry::new("b", DataType::varchar(10)),
                ],
                constraints,
                temp: false,
                on_conflict: OnConflict::Error,
            })
            .unwrap();
    }

    fn session(user: &str) -> SessionIdentity {
        SessionIdentity::new(user, PUBLIC_ROLE, DEFAULT_SCHEMA)
    }

    #[test]
    fn create_table_adds_row_id_and_key_index() {
        let catalog = MemoryCatalog::new();
        create_table(
            &catalog,
            "t1",
            vec![ConstraintEntry {
                name: "t1_pk".to_string(),
                kind: ConstraintKind::PrimaryKey(vec![0]),
            }],
        );

        let table = catalog.get_table(DEFAULT_SCHEMA, "t1").unwrap().unwrap();
        assert_eq!(3, table.columns.len());
        assert_eq!(Some(2), table.row_id_column());
        assert_eq!(2, table.visible_columns().count());

        let indexes = catalog.list_indexes(DEFAULT_SCHEMA, "t1").unwrap();
        assert_eq!(1, indexes.len());
        assert_eq!(vec![0], indexes[0].columns);
        assert!(indexes[0].unique);
    }

    #[test]
    fn create_conflicts() {
        let catalog = MemoryCatalog::new();
        create_table(&catalog, "t1", Vec::new());

        let mut info = CreateTableInfo {
            schema: DEFAULT_SCHEMA.to_string(),
            name: "t1".to_string(),
            columns: vec![ColumnEntry::new("c", DataType::Boolean)],
            constraints: Vec::new(),
            temp: false,
            on_conflict: OnConflict::Error,
        };
        let err = catalog.create_table(&info).unwrap_err();
        assert_eq!(quarry_error::ErrorKind::AlreadyExists, err.kind());

        info.on_conflict = OnConflict::Ignore;
        catalog.create_table(&info).unwrap();
        let table = catalog.get_table(DEFAULT_SCHEMA, "t1").unwrap().unwrap();
        assert_eq!("a", table.columns[0].name);

        info.on_conflict = OnConflict::Replace;
        catalog.create_table(&info).unwrap();
        let table = catalog.get_table(DEFAULT_SCHEMA, "t1").unwrap().unwrap();
        assert_eq!("c", table.columns[0].name);
    }

    #[test]
    fn similarity_table_name() {
        let catalog = MemoryCatalog::new();
        create_table(&catalog, "customers", Vec::new());

        let similar = catalog
            .find_similar(Some(DEFAULT_SCHEMA), CatalogEntryKind::Table, "custmers")
            .unwrap();
        assert_eq!(Some("customers".to_string()), similar);

        let similar = catalog
            .find_similar(Some(DEFAULT_SCHEMA), CatalogEntryKind::Table, "zzz")
            .unwrap();
        assert_eq!(None, similar);
    }

    #[test]
    fn similarity_function_name() {
        let catalog = MemoryCatalog::new();
        let similar = catalog
            .find_similar(Some(SYSTEM_SCHEMA), CatalogEntryKind::Function, "summ")
            .unwrap();
        assert_eq!(Some("sum".to_string()), similar);
    }

    #[test]
    fn function_lookup_by_alias() {
        let catalog = MemoryCatalog::new();
        let func = catalog.get_function(SYSTEM_SCHEMA, "substr").unwrap().unwrap();
        assert_eq!("substring", func.set.name);
    }

    #[test]
    fn missing_entry_suggests() {
        let catalog = MemoryCatalog::new();
        create_table(&catalog, "orders", Vec::new());
        let err = catalog.require_table(DEFAULT_SCHEMA, "order").unwrap_err();
        assert_eq!(quarry_error::ErrorKind::NotFound, err.kind());
        assert!(err.get_msg().contains("did you mean 'orders'"), "{err}");
    }

    #[test]
    fn table_and_column_privileges() {
        let catalog = MemoryCatalog::new();
        create_table(&catalog, "t1", Vec::new());
        catalog
            .create_user(&CreateUserInfo {
                name: "bob".to_string(),
                full_name: None,
                default_schema: DEFAULT_SCHEMA.to_string(),
                default_role: None,
            })
            .unwrap();

        let bob = session("bob");
        assert!(!catalog.table_privs(&bob, DEFAULT_SCHEMA, "t1", Privileges::SELECT).unwrap());
        assert!(!catalog.schema_privs(&bob, DEFAULT_SCHEMA).unwrap());

        catalog
            .grant(&GrantInfo {
                target: GrantTarget::Privileges {
                    privileges: Privileges::SELECT,
                    object: PrivilegeObject::Table {
                        schema: DEFAULT_SCHEMA.to_string(),
                        table: "t1".to_string(),
                        columns: None,
                    },
                },
                grantees: vec!["bob".to_string()],
                grant_option: false,
                grantor: SUPERUSER.to_string(),
            })
            .unwrap();
        catalog
            .grant(&GrantInfo {
                target: GrantTarget::Privileges {
                    privileges: Privileges::UPDATE,
                    object: PrivilegeObject::Table {
                        schema: DEFAULT_SCHEMA.to_string(),
                        table: "t1".to_string(),
                        columns: Some(vec!["b".to_string()]),
                    },
                },
                grantees: vec!["bob".to_string()],
                grant_option: false,
                grantor: SUPERUSER.to_string(),
            })
            .unwrap();

        assert!(catalog.table_privs(&bob, DEFAULT_SCHEMA, "t1", Privileges::SELECT).unwrap());
        assert!(!catalog.table_privs(&bob, DEFAULT_SCHEMA, "t1", Privileges::UPDATE).unwrap());
        assert!(catalog
            .column_privs(&bob, DEFAULT_SCHEMA, "t1", "b", Privileges::UPDATE)
            .unwrap());
        assert!(!catalog
            .column_privs(&bob, DEFAULT_SCHEMA, "t1", "a", Privileges::UPDATE)
            .unwrap());
    }

    #[test]
    fn role_membership_grants_privileges() {
        let catalog = MemoryCatalog::new();
        catalog
            .create_role(&CreateRoleInfo {
                name: "admins".to_string(),
                admin: None,
            })
            .unwrap();
        catalog
            .create_user(&CreateUserInfo {
                name: "carol".to_string(),
                full_name: None,
                default_schema: DEFAULT_SCHEMA.to_string(),
                default_role: None,
            })
            .unwrap();
        catalog
            .grant(&GrantInfo {
                target: GrantTarget::Roles(vec![SUPERUSER_ROLE.to_string()]),
                grantees: vec!["admins".to_string()],
                grant_option: false,
                grantor: SUPERUSER.to_string(),
            })
            .unwrap();

        let carol = SessionIdentity::new("carol", "admins", DEFAULT_SCHEMA);
        assert!(catalog.schema_privs(&carol, DEFAULT_SCHEMA).unwrap());

        let carol_public = session("carol");
        assert!(!catalog.schema_privs(&carol_public, DEFAULT_SCHEMA).unwrap());
    }

    #[test]
    fn system_functions_executable_by_everyone() {
        let catalog = MemoryCatalog::new();
        assert!(catalog.execute_priv(&session("nobody"), SYSTEM_SCHEMA, "sum").unwrap());
    }

    #[test]
    fn drop_referenced_table_requires_cascade() {
        let catalog = MemoryCatalog::new();
        create_table(
            &catalog,
            "parent",
            vec![ConstraintEntry {
                name: "parent_pk".to_string(),
                kind: ConstraintKind::PrimaryKey(vec![0]),
            }],
        );
        create_table(
            &catalog,
            "child",
            vec![ConstraintEntry {
                name: "child_fk".to_string(),
                kind: ConstraintKind::ForeignKey {
                    columns: vec![0],
                    ref_schema: DEFAULT_SCHEMA.to_string(),
                    ref_table: "parent".to_string(),
                    ref_columns: vec![0],
                    on_delete: quarry_ast::ast::ReferentialAction::Restrict,
                    on_update: quarry_ast::ast::ReferentialAction::Restrict,
                },
            }],
        );

        let mut drop = DropInfo {
            kind: CatalogEntryKind::Table,
            schema: Some(DEFAULT_SCHEMA.to_string()),
            name: "parent".to_string(),
            cascade: false,
        };
        catalog.drop_entry(&drop).unwrap_err();

        drop.cascade = true;
        catalog.drop_entry(&drop).unwrap();
        assert!(catalog.get_table(DEFAULT_SCHEMA, "parent").unwrap().is_none());
        assert!(catalog.list_indexes(DEFAULT_SCHEMA, "parent").unwrap().is_empty());

        let child = catalog.get_table(DEFAULT_SCHEMA, "child").unwrap().unwrap();
        assert_eq!(0, child.foreign_keys().count());
    }

    #[test]
    fn drop_system_schema_denied() {
        let catalog = MemoryCatalog::new();
        let err = catalog
            .drop_entry(&DropInfo {
                kind: CatalogEntryKind::Schema,
                schema: None,
                name: SYSTEM_SCHEMA.to_string(),
                cascade: true,
            })
            .unwrap_err();
        assert_eq!(quarry_error::ErrorKind::PrivilegeDenied, err.kind());
    }

    #[test]
    fn alter_drop_column_shifts_indexes() {
        let catalog = MemoryCatalog::new();
        create_table(&catalog, "t1", Vec::new());
        catalog
            .create_index(&CreateIndexInfo {
                schema: DEFAULT_SCHEMA.to_string(),
                name: "t1_b".to_string(),
                table: "t1".to_string(),
                columns: vec![1],
                kind: IndexKind::Ordered,
                unique: false,
                on_conflict: OnConflict::Error,
            })
            .unwrap();

        catalog
            .alter_table(&AlterTableInfo {
                schema: DEFAULT_SCHEMA.to_string(),
                name: "t1".to_string(),
                op: AlterTableOp::DropColumn {
                    column: 0,
                    cascade: false,
                },
            })
            .unwrap();

        let table = catalog.get_table(DEFAULT_SCHEMA, "t1").unwrap().unwrap();
        assert_eq!("b", table.columns[0].name);
        let index = catalog.get_index(DEFAULT_SCHEMA, "t1_b").unwrap().unwrap();
        assert_eq!(vec![0], index.columns);
    }

    #[test]
    fn concurrent_reads() {
        let catalog = Arc::new(MemoryCatalog::new());
        create_table(&catalog, "t1", Vec::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let catalog = catalog.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(catalog.get_table(DEFAULT_SCHEMA, "t1").unwrap().is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
