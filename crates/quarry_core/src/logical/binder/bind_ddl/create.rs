use std::collections::HashSet;

use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::create_table::find_column;
use super::{DdlBinder, already_exists, ddl_plan, noop, on_conflict};
use crate::catalog::create::{
    CreateIndexInfo,
    CreateRoleInfo,
    CreateSchemaInfo,
    CreateSequenceInfo,
    CreateTypeInfo,
    CreateUserInfo,
    CreateViewInfo,
    OnConflict,
};
use crate::catalog::entry::{CatalogEntryKind, ColumnEntry, IndexKind, TableKind};
use crate::catalog::memory::DEFAULT_SCHEMA;
use crate::catalog::missing_entry_error;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_query::bind_from::single_output;
use crate::logical::binder::bind_query::plan_query;
use crate::logical::binder::expr_binder::bind_datatype;
use crate::logical::binder::scope_stack::FrameKind;
use crate::logical::logical_ddl::DdlAction;
use crate::logical::operator::LogicalOperator;
use crate::types::datatype::DataType;

impl<'a> DdlBinder<'a> {
    pub fn bind_create_schema(&self, create: &ast::CreateSchema) -> Result<LogicalOperator> {
        self.require_admin("create schemas")?;
        let name = create.name.as_normalized_string();

        if self.ctx.catalog.get_schema(&name)?.is_some() {
            if create.if_not_exists {
                return Ok(noop(format!("schema '{name}' already exists")));
            }
            return Err(already_exists(CatalogEntryKind::Schema, &name));
        }

        let owner = match &create.authorization {
            Some(owner) => {
                let owner = owner.as_normalized_string();
                if self.ctx.catalog.get_user(&owner)?.is_none() && self.ctx.catalog.get_role(&owner)?.is_none() {
                    return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::User, &owner));
                }
                owner
            }
            None => self.ctx.session.user.clone(),
        };

        Ok(ddl_plan(DdlAction::CreateSchema(CreateSchemaInfo {
            name,
            owner,
            on_conflict: on_conflict(false, create.if_not_exists),
        })))
    }

    pub fn bind_create_view(&self, bind_context: &mut BindContext, create: &ast::CreateView) -> Result<LogicalOperator> {
        if create.with_check_option {
            return Err(DbError::unsupported("WITH CHECK OPTION on views"));
        }

        let (schema, name) = self.ctx.schema_for(&create.name)?;
        self.require_schema_privs(&schema)?;

        if let Some(existing) = self.ctx.catalog.get_table(&schema, &name)? {
            if !create.or_replace {
                return Err(already_exists(CatalogEntryKind::View, &name).with_field("schema", &schema));
            }
            if !existing.is_view() {
                return Err(DbError::already_exists(format!(
                    "'{schema}.{name}' is a table, not a view"
                )));
            }
            if existing.system {
                return Err(DbError::privilege_denied(format!("Cannot replace system view '{name}'")));
            }
        }

        // Bind once to validate and discover the output columns. The stored
        // query is re-bound every time the view is referenced.
        let ctx = self.ctx;
        let label = format!("{schema}.{name}");
        let plan = bind_context.with_frame(FrameKind::View, label, |bind_context| {
            let scope = bind_context.new_orphan_scope();
            plan_query(ctx, bind_context, scope, &create.query)
        })?;
        let output = single_output(&plan, bind_context)?;
        let table = bind_context.get_table(output)?;

        let column_aliases = create
            .columns
            .as_ref()
            .map(|cols| cols.iter().map(|c| c.as_normalized_string()).collect::<Vec<_>>());
        let names = match &column_aliases {
            Some(aliases) => {
                if aliases.len() != table.column_types.len() {
                    return Err(DbError::arity_mismatch(format!(
                        "View '{name}' has {} columns but {} column aliases",
                        table.column_types.len(),
                        aliases.len()
                    ))
                    .with_field("expected", table.column_types.len())
                    .with_field("actual", aliases.len()));
                }
                aliases.clone()
            }
            None => table.column_names.clone(),
        };

        let mut seen = HashSet::new();
        for column in &names {
            if !seen.insert(column.as_str()) {
                return Err(DbError::already_exists(format!(
                    "View '{name}' has more than one column named '{column}'"
                ))
                .with_field("column", column));
            }
        }

        let columns = names
            .into_iter()
            .zip(table.column_types.iter().cloned())
            .map(|(name, datatype)| ColumnEntry::new(name, datatype))
            .collect();

        Ok(ddl_plan(DdlAction::CreateView(CreateViewInfo {
            schema,
            name,
            query: create.query.clone(),
            column_aliases,
            columns,
            on_conflict: on_conflict(create.or_replace, false),
        })))
    }

    pub fn bind_create_type(&self, create: &ast::CreateType) -> Result<LogicalOperator> {
        let (schema, name) = self.ctx.schema_for(&create.name)?;
        self.require_schema_privs(&schema)?;

        if self.ctx.catalog.get_type(&schema, &name)?.is_some() {
            return Err(already_exists(CatalogEntryKind::Type, &name).with_field("schema", &schema));
        }
        let datatype = bind_datatype(self.ctx, &create.datatype)?;

        Ok(ddl_plan(DdlAction::CreateType(CreateTypeInfo {
            schema,
            name,
            datatype,
        })))
    }

    pub fn bind_create_index(&self, create: &ast::CreateIndex) -> Result<LogicalOperator> {
        let (schema, table) = self.ctx.resolve_table(&create.table)?;
        if !matches!(table.kind, TableKind::Base) {
            return Err(DbError::invalid_input(format!(
                "Cannot create an index on view '{}'",
                table.name
            )));
        }
        self.require_schema_privs(&schema)?;

        let name = create.name.as_normalized_string();
        if self.ctx.catalog.get_index(&schema, &name)?.is_some() {
            if create.if_not_exists {
                return Ok(noop(format!("index '{schema}.{name}' already exists")));
            }
            return Err(already_exists(CatalogEntryKind::Index, &name).with_field("schema", &schema));
        }

        let mut columns = Vec::with_capacity(create.columns.len());
        for ident in &create.columns {
            let column = find_column(&table.columns, &table.name, &ident.as_normalized_string())?;
            if columns.contains(&column) {
                return Err(DbError::invalid_input(format!(
                    "Column '{ident}' appears twice in index '{name}'"
                )));
            }
            columns.push(column);
        }
        if columns.is_empty() {
            return Err(DbError::invalid_input("Index requires at least one column"));
        }

        let kind = match create.kind {
            ast::IndexKind::Hash => IndexKind::Hash,
            ast::IndexKind::Ordered => IndexKind::Ordered,
        };

        debug!(%schema, table = %table.name, index = %name, %kind, "bound create index");

        Ok(ddl_plan(DdlAction::CreateIndex(CreateIndexInfo {
            schema,
            name,
            table: table.name.clone(),
            columns,
            kind,
            unique: create.unique,
            on_conflict: on_conflict(false, create.if_not_exists),
        })))
    }

    pub fn bind_create_sequence(&self, create: &ast::CreateSequence) -> Result<LogicalOperator> {
        let (schema, name) = self.ctx.schema_for(&create.name)?;
        self.require_schema_privs(&schema)?;

        if self.ctx.catalog.get_sequence(&schema, &name)?.is_some() {
            if create.if_not_exists {
                return Ok(noop(format!("sequence '{schema}.{name}' already exists")));
            }
            return Err(already_exists(CatalogEntryKind::Sequence, &name).with_field("schema", &schema));
        }

        let datatype = match &create.options.datatype {
            Some(datatype) => bind_datatype(self.ctx, datatype)?,
            None => DataType::Int64,
        };

        let info = bind_sequence_options(
            &schema,
            &name,
            datatype,
            &create.options,
            on_conflict(false, create.if_not_exists),
        )?;
        Ok(ddl_plan(DdlAction::CreateSequence(info)))
    }

    pub fn bind_create_user(&self, create: &ast::CreateUser) -> Result<LogicalOperator> {
        self.require_admin("create users")?;

        let name = create.name.as_normalized_string();
        if self.ctx.catalog.get_user(&name)?.is_some() || self.ctx.catalog.get_role(&name)?.is_some() {
            return Err(already_exists(CatalogEntryKind::User, &name));
        }
        if create.password.is_empty() {
            return Err(DbError::invalid_input(format!("Password for user '{name}' cannot be empty")));
        }

        let default_schema = match &create.default_schema {
            Some(schema) => {
                let schema = schema.as_normalized_string();
                self.ctx.catalog.require_schema(&schema)?;
                schema
            }
            None => DEFAULT_SCHEMA.to_string(),
        };

        let default_role = match &create.default_role {
            Some(role) => {
                let role = role.as_normalized_string();
                if self.ctx.catalog.get_role(&role)?.is_none() {
                    return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::Role, &role));
                }
                Some(role)
            }
            None => None,
        };

        let full_name = (!create.full_name.is_empty()).then(|| create.full_name.clone());

        Ok(ddl_plan(DdlAction::CreateUser(CreateUserInfo {
            name,
            full_name,
            default_schema,
            default_role,
        })))
    }

    pub fn bind_create_role(&self, create: &ast::CreateRole) -> Result<LogicalOperator> {
        self.require_admin("create roles")?;

        let name = create.name.as_normalized_string();
        if self.ctx.catalog.get_role(&name)?.is_some() || self.ctx.catalog.get_user(&name)?.is_some() {
            return Err(already_exists(CatalogEntryKind::Role, &name));
        }

        let admin = match &create.admin {
            Some(admin) => {
                let admin = admin.as_normalized_string();
                if self.ctx.catalog.get_user(&admin)?.is_none() {
                    return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::User, &admin));
                }
                Some(admin)
            }
            None => None,
        };

        Ok(ddl_plan(DdlAction::CreateRole(CreateRoleInfo { name, admin })))
    }
}

/// Bounds of the values an integer type can hold, clamped to i64.
pub(crate) fn integer_bounds(datatype: &DataType) -> Result<(i64, i64)> {
    Ok(match datatype {
        DataType::Int8 => (i8::MIN as i64, i8::MAX as i64),
        DataType::Int16 => (i16::MIN as i64, i16::MAX as i64),
        DataType::Int32 => (i32::MIN as i64, i32::MAX as i64),
        DataType::Int64 | DataType::Int128 => (i64::MIN, i64::MAX),
        other => {
            return Err(DbError::type_mismatch(format!(
                "Sequence type must be an integer type, got {other}"
            )));
        }
    })
}

/// Fill in defaults for sequence options and check they're consistent.
pub fn bind_sequence_options(
    schema: &str,
    name: &str,
    datatype: DataType,
    options: &ast::SequenceOptions,
    on_conflict: OnConflict,
) -> Result<CreateSequenceInfo> {
    let (type_min, type_max) = integer_bounds(&datatype)?;

    let increment = options.increment.unwrap_or(1);
    if increment == 0 {
        return Err(DbError::invalid_input("Sequence increment cannot be zero").with_field("sequence", name));
    }

    let (default_min, default_max) = if increment > 0 { (1, type_max) } else { (type_min, -1) };
    let min_value = options.min_value.unwrap_or(default_min);
    let max_value = options.max_value.unwrap_or(default_max);

    for (option, value) in [("MINVALUE", min_value), ("MAXVALUE", max_value)] {
        if value < type_min || value > type_max {
            return Err(DbError::invalid_input(format!(
                "{option} {value} is out of range for sequence type {datatype}"
            ))
            .with_field("sequence", name));
        }
    }
    if min_value >= max_value {
        return Err(DbError::invalid_input(format!(
            "MINVALUE ({min_value}) must be less than MAXVALUE ({max_value})"
        ))
        .with_field("sequence", name));
    }

    let start = options
        .start
        .unwrap_or(if increment > 0 { min_value } else { max_value });
    if start < min_value || start > max_value {
        return Err(DbError::invalid_input(format!(
            "START value ({start}) must be between MINVALUE ({min_value}) and MAXVALUE ({max_value})"
        ))
        .with_field("sequence", name));
    }

    let cache = options.cache.unwrap_or(1);
    if cache <= 0 {
        return Err(DbError::invalid_input(format!("CACHE ({cache}) must be greater than zero"))
            .with_field("sequence", name));
    }

    Ok(CreateSequenceInfo {
        schema: schema.to_string(),
        name: name.to_string(),
        datatype,
        start,
        increment,
        min_value,
        max_value,
        cycle: options.cycle.unwrap_or(false),
        cache,
        on_conflict,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::catalog::Catalog;
    use crate::config::session::SessionIdentity;
    use crate::logical::binder::bind_ddl::testutil::{action, compile, run};
    use crate::testutil::Fixture;

    fn select_star(table: &str) -> ast::QueryNode {
        ast::QueryNode::select(ast::SelectNode::new(vec![ast::SelectExpr::Wildcard]).from(ast::FromNode::table(table)))
    }

    #[test]
    fn create_schema_requires_admin() {
        let mut fixture = Fixture::new();
        let create = ast::CreateSchema {
            if_not_exists: false,
            name: ast::Ident::new("analytics"),
            authorization: None,
        };
        run(&fixture, Statement::CreateSchema(create.clone())).unwrap();
        assert_eq!("admin", fixture.catalog.get_schema("analytics").unwrap().unwrap().owner);

        let err = compile(&fixture, Statement::CreateSchema(create.clone())).unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());

        fixture.session = SessionIdentity::new("bob", "public", "main");
        let err = compile(
            &fixture,
            Statement::CreateSchema(ast::CreateSchema {
                name: ast::Ident::new("other"),
                ..create
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::PrivilegeDenied, err.kind());
    }

    #[test]
    fn create_view_with_aliases() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32), ("b", DataType::UTF8)]);
        let create = ast::CreateView {
            or_replace: false,
            name: ast::ObjectReference::from("v"),
            columns: Some(vec![ast::Ident::new("x"), ast::Ident::new("y")]),
            query: select_star("t"),
            with_check_option: false,
        };
        let compiled = compile(&fixture, Statement::CreateView(create.clone())).unwrap();
        let DdlAction::CreateView(info) = action(&compiled.plan) else {
            panic!("expected create view");
        };
        assert_eq!(
            vec!["x", "y"],
            info.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        let err = compile(
            &fixture,
            Statement::CreateView(ast::CreateView {
                columns: Some(vec![ast::Ident::new("x")]),
                ..create
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::ArityMismatch, err.kind());
    }

    #[test]
    fn replace_table_with_view() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let create = ast::CreateView {
            or_replace: true,
            name: ast::ObjectReference::from("t"),
            columns: None,
            query: select_star("t"),
            with_check_option: false,
        };
        let err = compile(&fixture, Statement::CreateView(create)).unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());
    }

    #[test]
    fn create_index_columns() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32), ("b", DataType::Int32)]);
        let create = ast::CreateIndex {
            if_not_exists: false,
            name: ast::Ident::new("t_b_idx"),
            table: ast::ObjectReference::from("t"),
            columns: vec![ast::Ident::new("b")],
            kind: ast::IndexKind::Hash,
            unique: false,
        };
        let compiled = run(&fixture, Statement::CreateIndex(create.clone())).unwrap();
        let DdlAction::CreateIndex(info) = action(&compiled.plan) else {
            panic!("expected create index");
        };
        assert_eq!(vec![1], info.columns);

        let compiled = compile(
            &fixture,
            Statement::CreateIndex(ast::CreateIndex {
                if_not_exists: true,
                ..create.clone()
            }),
        )
        .unwrap();
        assert!(matches!(action(&compiled.plan), DdlAction::Noop { .. }));

        let err = compile(
            &fixture,
            Statement::CreateIndex(ast::CreateIndex {
                name: ast::Ident::new("other"),
                columns: vec![ast::Ident::new("c")],
                ..create
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn sequence_defaults() {
        let info = bind_sequence_options("main", "s", DataType::Int32, &Default::default(), OnConflict::Error).unwrap();
        assert_eq!((1, 1, i32::MAX as i64, 1), (info.start, info.min_value, info.max_value, info.increment));

        let descending = ast::SequenceOptions {
            increment: Some(-2),
            ..Default::default()
        };
        let info = bind_sequence_options("main", "s", DataType::Int64, &descending, OnConflict::Error).unwrap();
        assert_eq!((-1, i64::MIN, -1), (info.start, info.min_value, info.max_value));
    }

    #[test]
    fn sequence_invalid_options() {
        let cases = [
            ast::SequenceOptions {
                increment: Some(0),
                ..Default::default()
            },
            ast::SequenceOptions {
                min_value: Some(10),
                max_value: Some(5),
                ..Default::default()
            },
            ast::SequenceOptions {
                start: Some(100),
                max_value: Some(50),
                ..Default::default()
            },
            ast::SequenceOptions {
                cache: Some(0),
                ..Default::default()
            },
            ast::SequenceOptions {
                max_value: Some(1000),
                ..Default::default()
            },
        ];
        for (idx, options) in cases.iter().enumerate() {
            let datatype = if idx == 4 { DataType::Int8 } else { DataType::Int64 };
            let err = bind_sequence_options("main", "s", datatype, options, OnConflict::Error).unwrap_err();
            assert_eq!(ErrorKind::InvalidInput, err.kind(), "case {idx}");
        }

        let err =
            bind_sequence_options("main", "s", DataType::UTF8, &Default::default(), OnConflict::Error).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn create_user_and_role() {
        let fixture = Fixture::new();
        run(
            &fixture,
            Statement::CreateRole(ast::CreateRole {
                name: ast::Ident::new("analyst"),
                admin: None,
            }),
        )
        .unwrap();

        let user = ast::CreateUser {
            name: ast::Ident::new("bob"),
            password: "secret".to_string(),
            encrypted: false,
            full_name: String::new(),
            default_schema: None,
            default_role: Some(ast::Ident::new("analyst")),
        };
        let compiled = run(&fixture, Statement::CreateUser(user.clone())).unwrap();
        let DdlAction::CreateUser(info) = action(&compiled.plan) else {
            panic!("expected create user");
        };
        assert_eq!("main", info.default_schema);
        assert_eq!(None, info.full_name);

        let err = compile(&fixture, Statement::CreateUser(user.clone())).unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());

        let err = compile(
            &fixture,
            Statement::CreateUser(ast::CreateUser {
                name: ast::Ident::new("carol"),
                default_role: Some(ast::Ident::new("missing")),
                ..user
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }
}
