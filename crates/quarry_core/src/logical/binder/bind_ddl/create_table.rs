use std::collections::HashSet;

use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::create::bind_sequence_options;
use super::{DdlBinder, already_exists, ddl_plan, ddl_plan_with_source, noop, on_conflict};
use crate::catalog::create::{CreateSequenceInfo, CreateTableInfo, OnConflict};
use crate::catalog::entry::{
    CatalogEntryKind,
    ColumnEntry,
    ConstraintEntry,
    ConstraintKind,
    ROW_ID_COLUMN,
    TableKind,
};
use crate::catalog::memory::TEMP_SCHEMA;
use crate::catalog::privilege::Privileges;
use crate::compile::CompileContext;
use crate::expr::Expression;
use crate::expr::cast_expr::check_type;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::logical::binder::bind_context::{BindContext, TableAlias};
use crate::logical::binder::bind_query::bind_from::single_output;
use crate::logical::binder::bind_query::plan_query;
use crate::logical::binder::column_binder::{DefaultColumnBinder, ErroringColumnBinder};
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext, bind_datatype};
use crate::logical::logical_ddl::DdlAction;
use crate::logical::logical_guard::LogicalCascade;
use crate::logical::logical_project::LogicalProject;
use crate::logical::operator::{LogicalOperator, Node};
use crate::types::datatype::{DataType, TypeClass};

/// A column definition along with the constraints declared inline.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundColumnDef {
    pub entry: ColumnEntry,
    pub constraints: Vec<ast::TableConstraint>,
    /// Sequence backing an AUTO_INCREMENT column.
    pub sequence: Option<CreateSequenceInfo>,
}

impl<'a> DdlBinder<'a> {
    pub fn bind_create_table(&self, bind_context: &mut BindContext, create: &ast::CreateTable) -> Result<LogicalOperator> {
        let (schema, name) = self.ctx.schema_for(&create.name)?;
        let schema = match (create.temp, create.name.0.len()) {
            (true, 1) => TEMP_SCHEMA.to_string(),
            (true, _) if schema != TEMP_SCHEMA => {
                return Err(DbError::invalid_input(format!(
                    "Temporary tables can only be created in '{TEMP_SCHEMA}'"
                ))
                .with_field("schema", schema));
            }
            _ => schema,
        };
        self.require_schema_privs(&schema)?;

        if let Some(existing) = self.ctx.catalog.get_table(&schema, &name)? {
            if create.if_not_exists {
                return Ok(noop(format!("table '{schema}.{name}' already exists")));
            }
            if !create.or_replace || existing.is_view() {
                return Err(already_exists(CatalogEntryKind::Table, &name).with_field("schema", &schema));
            }
            if existing.system {
                return Err(DbError::privilege_denied(format!("Cannot replace system table '{name}'")));
            }
        }

        let source = match &create.source {
            Some(query) => {
                let scope = bind_context.new_orphan_scope();
                Some(plan_query(self.ctx, bind_context, scope, query)?)
            }
            None => None,
        };

        let mut columns = Vec::with_capacity(create.columns.len());
        let mut inline_constraints = Vec::new();
        let mut sequences = Vec::new();
        for def in &create.columns {
            let bound = bind_column_def(self.ctx, bind_context, &schema, &name, def)?;
            if columns.iter().any(|c: &ColumnEntry| c.name == bound.entry.name) {
                return Err(already_exists(CatalogEntryKind::Table, &name)
                    .with_field("column", &bound.entry.name)
                    .with_field("reason", "duplicate column"));
            }
            columns.push(bound.entry);
            inline_constraints.extend(bound.constraints);
            sequences.extend(bound.sequence);
        }

        let source = match source {
            Some(plan) => Some(self.source_columns(bind_context, plan, &mut columns)?),
            None => None,
        };

        if columns.is_empty() {
            return Err(DbError::invalid_input(format!("Table '{name}' must have at least one column")));
        }

        // Keys first so foreign keys on the same table can reference them.
        let mut pending: Vec<&ast::TableConstraint> = inline_constraints.iter().chain(&create.constraints).collect();
        pending.sort_by_key(|c| constraint_order(&c.kind));

        let mut builder = ConstraintBuilder::new(self.ctx, &schema, &name, &columns, Vec::new());
        for constraint in pending {
            builder.add(bind_context, constraint)?;
        }
        let constraints = builder.finish();

        // Primary key columns are implicitly NOT NULL.
        for constraint in &constraints {
            if let ConstraintKind::PrimaryKey(cols) = &constraint.kind {
                for &col in cols {
                    if let Some(column) = columns.get_mut(col) {
                        column.not_null = true;
                    }
                }
            }
        }

        debug!(
            %schema,
            table = %name,
            columns = columns.len(),
            constraints = constraints.len(),
            with_source = source.is_some(),
            "bound create table"
        );

        let action = DdlAction::CreateTable(CreateTableInfo {
            schema,
            name,
            columns,
            constraints,
            temp: create.temp,
            on_conflict: on_conflict(create.or_replace, create.if_not_exists),
        });

        let create_plan = match source {
            Some(source) if create.with_data => ddl_plan_with_source(action, source),
            _ => ddl_plan(action),
        };

        if sequences.is_empty() {
            return Ok(create_plan);
        }

        let mut children: Vec<_> = sequences
            .into_iter()
            .map(|seq| ddl_plan(DdlAction::CreateSequence(seq)))
            .collect();
        children.push(create_plan);
        Ok(LogicalOperator::Cascade(Node::new(
            LogicalCascade {
                label: "create_table".to_string(),
            },
            children,
        )))
    }

    /// Derive or check columns against the output of a CREATE TABLE AS
    /// query, casting the query output where needed.
    fn source_columns(
        &self,
        bind_context: &mut BindContext,
        plan: LogicalOperator,
        columns: &mut Vec<ColumnEntry>,
    ) -> Result<LogicalOperator> {
        let output = single_output(&plan, bind_context)?;
        let table = bind_context.get_table(output)?;
        let names = table.column_names.clone();
        let types = table.column_types.clone();

        if columns.is_empty() {
            let mut seen = HashSet::new();
            for (name, datatype) in names.iter().zip(&types) {
                if !seen.insert(name.as_str()) {
                    return Err(DbError::already_exists(format!(
                        "Query produces column '{name}' more than once, use aliases to rename it"
                    ))
                    .with_field("column", name));
                }
                if datatype.is_null() {
                    return Err(DbError::invalid_input(format!(
                        "Cannot infer the type of column '{name}', add a cast"
                    ))
                    .with_field("column", name));
                }
                columns.push(ColumnEntry::new(name.clone(), datatype.clone()));
            }
            return Ok(plan);
        }

        if columns.len() != types.len() {
            return Err(DbError::arity_mismatch(format!(
                "Table defines {} columns but the query produces {}",
                columns.len(),
                types.len()
            ))
            .with_field("expected", columns.len())
            .with_field("actual", types.len()));
        }

        if columns.iter().zip(&types).all(|(c, t)| &c.datatype == t) {
            return Ok(plan);
        }

        let projections = columns
            .iter()
            .zip(types)
            .enumerate()
            .map(|(idx, (column, datatype))| {
                let expr = Expression::Column(ColumnExpr::new(ColumnReference::new(output, idx), datatype));
                check_type(&column.datatype, expr).map_err(|e| e.with_field("column", &column.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let projection_table = bind_context.new_ephemeral_table_from_expressions("__generated_ctas", &projections)?;
        let cardinality = plan.cardinality();
        Ok(LogicalOperator::Project(
            Node::new(
                LogicalProject {
                    projections,
                    projection_table,
                },
                vec![plan],
            )
            .with_cardinality(cardinality),
        ))
    }
}

const fn constraint_order(kind: &ast::TableConstraintKind) -> u8 {
    match kind {
        ast::TableConstraintKind::PrimaryKey(_) => 0,
        ast::TableConstraintKind::Unique(_) => 1,
        ast::TableConstraintKind::ForeignKey { .. } => 2,
        ast::TableConstraintKind::Check(_) => 3,
    }
}

/// Bind a single column definition.
pub fn bind_column_def(
    ctx: &CompileContext,
    bind_context: &mut BindContext,
    schema: &str,
    table: &str,
    def: &ast::ColumnDef,
) -> Result<BoundColumnDef> {
    let name = def.name.as_normalized_string();
    if name == ROW_ID_COLUMN {
        return Err(DbError::invalid_input(format!("Column name '{name}' is reserved")));
    }

    let datatype = bind_datatype(ctx, &def.datatype)?;
    let mut entry = ColumnEntry::new(name.clone(), datatype);
    let mut nullability: Option<bool> = None;
    let mut constraints = Vec::new();
    let mut sequence = None;

    for option in &def.options {
        match option {
            ast::ColumnOption::Null | ast::ColumnOption::NotNull => {
                let not_null = matches!(option, ast::ColumnOption::NotNull);
                if nullability.is_some_and(|have| have != not_null) {
                    return Err(DbError::invalid_input(format!(
                        "Conflicting NULL/NOT NULL declarations for column '{name}'"
                    )));
                }
                nullability = Some(not_null);
                entry.not_null = not_null;
            }
            ast::ColumnOption::Default(expr) => {
                if entry.default.is_some() {
                    return Err(DbError::invalid_input(format!(
                        "Multiple default values specified for column '{name}'"
                    )));
                }
                bind_default(ctx, bind_context, &name, &entry.datatype, expr)?;
                entry.default = Some(expr.clone());
            }
            ast::ColumnOption::PrimaryKey => constraints.push(ast::TableConstraint {
                name: None,
                kind: ast::TableConstraintKind::PrimaryKey(vec![def.name.clone()]),
            }),
            ast::ColumnOption::Unique => constraints.push(ast::TableConstraint {
                name: None,
                kind: ast::TableConstraintKind::Unique(vec![def.name.clone()]),
            }),
            ast::ColumnOption::References { table, columns } => constraints.push(ast::TableConstraint {
                name: None,
                kind: ast::TableConstraintKind::ForeignKey {
                    columns: vec![def.name.clone()],
                    foreign_table: table.clone(),
                    referred_columns: columns.clone(),
                    on_delete: ast::ReferentialAction::default(),
                    on_update: ast::ReferentialAction::default(),
                },
            }),
            ast::ColumnOption::Check(expr) => constraints.push(ast::TableConstraint {
                name: None,
                kind: ast::TableConstraintKind::Check(expr.clone()),
            }),
            ast::ColumnOption::AutoIncrement => {
                if !entry.datatype.is_integer() {
                    return Err(DbError::type_mismatch(format!(
                        "AUTO_INCREMENT requires an integer column, '{name}' is {}",
                        entry.datatype
                    ))
                    .with_field("column", &name));
                }
                if entry.default.is_some() {
                    return Err(DbError::invalid_input(format!(
                        "Column '{name}' cannot have both a default and AUTO_INCREMENT"
                    )));
                }
                let seq_name = format!("{table}_{name}_seq");
                if ctx.catalog.get_sequence(schema, &seq_name)?.is_some() {
                    return Err(already_exists(CatalogEntryKind::Sequence, &seq_name));
                }
                sequence = Some(bind_sequence_options(
                    schema,
                    &seq_name,
                    entry.datatype.clone(),
                    &ast::SequenceOptions::default(),
                    OnConflict::Error,
                )?);
                entry.not_null = true;
                entry.default = Some(ast::Expr::NextValueFor(ast::ObjectReference::from_strings([
                    schema, &seq_name,
                ])));
            }
        }
    }

    Ok(BoundColumnDef {
        entry,
        constraints,
        sequence,
    })
}

/// Bind a column default, which must be a constant expression of the
/// column's type.
pub fn bind_default(
    ctx: &CompileContext,
    bind_context: &mut BindContext,
    column: &str,
    datatype: &DataType,
    default: &ast::Expr,
) -> Result<Expression> {
    let scope = bind_context.new_orphan_scope();
    let expr = BaseExpressionBinder::new(scope, ctx).bind_expression(
        bind_context,
        default,
        &mut ErroringColumnBinder::new("column defaults"),
        RecursionContext::new(BindClause::Default),
    )?;
    if expr.contains_subquery() {
        return Err(DbError::invalid_input(format!(
            "Default for column '{column}' cannot contain a subquery"
        )));
    }
    check_type(datatype, expr).map_err(|e| e.with_field("column", column))
}

/// Validates constraints against a table's columns and the constraints
/// already present, assigning names to unnamed constraints.
#[derive(Debug)]
pub struct ConstraintBuilder<'a> {
    ctx: &'a CompileContext<'a>,
    schema: &'a str,
    table: &'a str,
    columns: &'a [ColumnEntry],
    constraints: Vec<ConstraintEntry>,
    /// Number of constraints that were already on the table.
    existing: usize,
}

impl<'a> ConstraintBuilder<'a> {
    pub fn new(
        ctx: &'a CompileContext<'a>,
        schema: &'a str,
        table: &'a str,
        columns: &'a [ColumnEntry],
        existing: Vec<ConstraintEntry>,
    ) -> Self {
        let num_existing = existing.len();
        ConstraintBuilder {
            ctx,
            schema,
            table,
            columns,
            constraints: existing,
            existing: num_existing,
        }
    }

    /// Constraints added through this builder.
    pub fn finish(mut self) -> Vec<ConstraintEntry> {
        self.constraints.split_off(self.existing)
    }

    pub fn add(&mut self, bind_context: &mut BindContext, constraint: &ast::TableConstraint) -> Result<()> {
        let kind = match &constraint.kind {
            ast::TableConstraintKind::PrimaryKey(cols) => {
                if self
                    .constraints
                    .iter()
                    .any(|c| matches!(c.kind, ConstraintKind::PrimaryKey(_)))
                {
                    return Err(DbError::invalid_input(format!(
                        "Multiple primary keys for table '{}' are not allowed",
                        self.table
                    )));
                }
                ConstraintKind::PrimaryKey(self.column_indices(cols)?)
            }
            ast::TableConstraintKind::Unique(cols) => {
                let cols = self.column_indices(cols)?;
                if self.constraints.iter().any(|c| c.key_columns() == Some(cols.as_slice())) {
                    return Err(already_exists(CatalogEntryKind::Index, self.table)
                        .with_field("reason", "duplicate key on the same columns"));
                }
                ConstraintKind::Unique(cols)
            }
            ast::TableConstraintKind::ForeignKey {
                columns,
                foreign_table,
                referred_columns,
                on_delete,
                on_update,
            } => self.foreign_key(columns, foreign_table, referred_columns, *on_delete, *on_update)?,
            ast::TableConstraintKind::Check(expr) => {
                self.validate_check(bind_context, expr)?;
                ConstraintKind::Check(expr.clone())
            }
        };

        let name = match &constraint.name {
            Some(name) => {
                let name = name.as_normalized_string();
                if self.name_taken(&name)? {
                    return Err(DbError::already_exists(format!(
                        "Constraint '{name}' already exists on table '{}'",
                        self.table
                    ))
                    .with_field("constraint", name));
                }
                name
            }
            None => self.generate_name(&kind)?,
        };

        self.constraints.push(ConstraintEntry { name, kind });
        Ok(())
    }

    fn name_taken(&self, name: &str) -> Result<bool> {
        if self.constraints.iter().any(|c| c.name == name) {
            return Ok(true);
        }
        // Key constraints are backed by an index of the same name.
        Ok(self.ctx.catalog.get_index(self.schema, name)?.is_some())
    }

    fn generate_name(&self, kind: &ConstraintKind) -> Result<String> {
        let column_names = |cols: &[usize]| -> String {
            cols.iter()
                .filter_map(|&c| self.columns.get(c))
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join("_")
        };
        let base = match kind {
            ConstraintKind::PrimaryKey(_) => format!("{}_pkey", self.table),
            ConstraintKind::Unique(cols) => format!("{}_{}_key", self.table, column_names(cols)),
            ConstraintKind::ForeignKey { columns, .. } => {
                format!("{}_{}_fkey", self.table, column_names(columns))
            }
            ConstraintKind::Check(_) => format!("{}_check", self.table),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while self.name_taken(&name)? {
            name = format!("{base}{suffix}");
            suffix += 1;
        }
        Ok(name)
    }

    fn column_indices(&self, idents: &[ast::Ident]) -> Result<Vec<usize>> {
        let mut cols = Vec::with_capacity(idents.len());
        for ident in idents {
            let name = ident.as_normalized_string();
            let idx = find_column(self.columns, self.table, &name)?;
            if cols.contains(&idx) {
                return Err(DbError::invalid_input(format!(
                    "Column '{name}' appears twice in constraint"
                )));
            }
            cols.push(idx);
        }
        if cols.is_empty() {
            return Err(DbError::invalid_input("Constraint requires at least one column"));
        }
        Ok(cols)
    }

    fn foreign_key(
        &self,
        columns: &[ast::Ident],
        foreign_table: &ast::ObjectReference,
        referred_columns: &[ast::Ident],
        on_delete: ast::ReferentialAction,
        on_update: ast::ReferentialAction,
    ) -> Result<ConstraintKind> {
        let columns = self.column_indices(columns)?;

        let (ref_schema, ref_name) = foreign_table.schema_and_name()?;
        let self_reference =
            ref_name == self.table && ref_schema.as_deref().is_none_or(|schema| schema == self.schema);

        // Self references see the definition being built.
        let owned;
        let (ref_schema, ref_table, ref_columns, ref_constraints): (String, String, &[ColumnEntry], &[ConstraintEntry]) =
            if self_reference {
                (
                    self.schema.to_string(),
                    self.table.to_string(),
                    self.columns,
                    &self.constraints,
                )
            } else {
                let (schema, entry) = self.ctx.resolve_table(foreign_table)?;
                if !matches!(entry.kind, TableKind::Base) {
                    return Err(DbError::invalid_input(format!(
                        "Foreign key must reference a table, '{}' is a view",
                        entry.name
                    )));
                }
                if !self
                    .ctx
                    .catalog
                    .table_privs(self.ctx.session, &schema, &entry.name, Privileges::REFERENCES)?
                {
                    return Err(DbError::privilege_denied(format!(
                        "Permission denied to reference table '{schema}.{}'",
                        entry.name
                    ))
                    .with_field("user", &self.ctx.session.user));
                }
                owned = entry;
                (schema, owned.name.clone(), &owned.columns, &owned.constraints)
            };

        let referred: Vec<usize> = if referred_columns.is_empty() {
            ref_constraints
                .iter()
                .find_map(|c| match &c.kind {
                    ConstraintKind::PrimaryKey(cols) => Some(cols.clone()),
                    _ => None,
                })
                .ok_or_else(|| {
                    DbError::not_found(format!(
                        "Table '{ref_table}' has no primary key to reference"
                    ))
                    .with_field("table", &ref_table)
                })?
        } else {
            referred_columns
                .iter()
                .map(|ident| find_column(ref_columns, &ref_table, &ident.as_normalized_string()))
                .collect::<Result<_>>()?
        };

        if referred.len() != columns.len() {
            return Err(DbError::arity_mismatch(format!(
                "Foreign key has {} columns but references {}",
                columns.len(),
                referred.len()
            )));
        }

        let is_key = ref_constraints.iter().any(|c| match c.key_columns() {
            Some(key) => key.len() == referred.len() && key.iter().all(|col| referred.contains(col)),
            None => false,
        });
        if !is_key {
            return Err(DbError::not_found(format!(
                "No primary key or unique constraint on '{ref_table}' matches the referenced columns"
            ))
            .with_field("table", &ref_table));
        }

        for (&col, &ref_col) in columns.iter().zip(&referred) {
            let have = &self.columns[col];
            let want = &ref_columns[ref_col];
            if !key_types_compatible(&have.datatype, &want.datatype) {
                return Err(DbError::type_mismatch(format!(
                    "Foreign key column '{}' of type {} is incompatible with '{}.{}' of type {}",
                    have.name, have.datatype, ref_table, want.name, want.datatype
                ))
                .with_field("column", &have.name));
            }
        }

        Ok(ConstraintKind::ForeignKey {
            columns,
            ref_schema,
            ref_table,
            ref_columns: referred,
            on_delete,
            on_update,
        })
    }

    fn validate_check(&self, bind_context: &mut BindContext, expr: &ast::Expr) -> Result<()> {
        let scope = bind_context.new_orphan_scope();
        let table_ref = bind_context.push_table(
            scope,
            Some(TableAlias::new(None, self.table)),
            self.columns.iter().map(|c| c.datatype.clone()).collect(),
            self.columns.iter().map(|c| c.name.clone()).collect(),
        )?;
        let hidden = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.hidden)
            .map(|(idx, _)| idx);
        bind_context.get_table_mut(table_ref)?.hidden.extend(hidden);

        let bound = BaseExpressionBinder::new(scope, self.ctx).bind_expression(
            bind_context,
            expr,
            &mut DefaultColumnBinder,
            RecursionContext::new(BindClause::Check),
        )?;
        if bound.contains_subquery() {
            return Err(DbError::invalid_input("CHECK constraints cannot contain subqueries"));
        }
        check_type(&DataType::Boolean, bound)?;
        Ok(())
    }
}

pub(crate) fn find_column(columns: &[ColumnEntry], table: &str, name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| !c.hidden && c.name == name)
        .ok_or_else(|| {
            DbError::not_found(format!("Column '{name}' does not exist in table '{table}'"))
                .with_field("column", name)
                .with_field("table", table)
        })
}

/// Key columns compare without loss: same type class, with integers and
/// decimals considered interchangeable.
fn key_types_compatible(a: &DataType, b: &DataType) -> bool {
    if a.is_exact_numeric() && b.is_exact_numeric() {
        return true;
    }
    let class = a.type_class();
    class == b.type_class() && class != TypeClass::Null
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::catalog::Catalog;
    use crate::logical::binder::bind_ddl::testutil::{action, compile, run};
    use crate::logical::operator::LogicalNode;
    use crate::testutil::Fixture;

    fn column(name: &str, datatype: ast::DataType) -> ast::ColumnDef {
        ast::ColumnDef::new(name, datatype)
    }

    fn create_info(plan: &LogicalOperator) -> &CreateTableInfo {
        match action(plan) {
            DdlAction::CreateTable(info) => info,
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn create_basic_table() {
        let fixture = Fixture::new();
        let create = ast::CreateTable::new(
            "t",
            vec![
                column("a", ast::DataType::Integer).with_option(ast::ColumnOption::PrimaryKey),
                column("b", ast::DataType::Varchar(Some(10))).with_option(ast::ColumnOption::NotNull),
            ],
        );
        let compiled = compile(&fixture, Statement::CreateTable(create)).unwrap();
        let info = create_info(&compiled.plan);

        assert_eq!("main", info.schema);
        assert_eq!(
            vec![DataType::Int32, DataType::varchar(10)],
            info.columns.iter().map(|c| c.datatype.clone()).collect::<Vec<_>>()
        );
        assert!(info.columns[0].not_null);
        assert_eq!(1, info.constraints.len());
        assert_eq!("t_pkey", info.constraints[0].name);
    }

    #[test]
    fn duplicate_column() {
        let fixture = Fixture::new();
        let create = ast::CreateTable::new(
            "t",
            vec![column("a", ast::DataType::Integer), column("a", ast::DataType::Text)],
        );
        let err = compile(&fixture, Statement::CreateTable(create)).unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());
    }

    #[test]
    fn if_not_exists_is_noop() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let mut create = ast::CreateTable::new("t", vec![column("a", ast::DataType::Integer)]);

        let err = compile(&fixture, Statement::CreateTable(create.clone())).unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());

        create.if_not_exists = true;
        let compiled = compile(&fixture, Statement::CreateTable(create)).unwrap();
        assert!(matches!(action(&compiled.plan), DdlAction::Noop { .. }));
    }

    #[test]
    fn foreign_key_must_reference_key() {
        let fixture = Fixture::new();
        run(
            &fixture,
            Statement::CreateTable(ast::CreateTable::new(
                "parent",
                vec![
                    column("id", ast::DataType::Integer).with_option(ast::ColumnOption::PrimaryKey),
                    column("name", ast::DataType::Text),
                ],
            )),
        )
        .unwrap();

        let references = |col: &str| ast::ColumnOption::References {
            table: ast::ObjectReference::from("parent"),
            columns: vec![ast::Ident::new(col)],
        };

        let ok = ast::CreateTable::new(
            "child",
            vec![column("parent_id", ast::DataType::BigInt).with_option(references("id"))],
        );
        let compiled = compile(&fixture, Statement::CreateTable(ok)).unwrap();
        let info = create_info(&compiled.plan);
        assert_eq!("child_parent_id_fkey", info.constraints[0].name);

        let not_key = ast::CreateTable::new(
            "child",
            vec![column("parent_name", ast::DataType::Text).with_option(references("name"))],
        );
        let err = compile(&fixture, Statement::CreateTable(not_key)).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());

        let bad_type = ast::CreateTable::new(
            "child",
            vec![column("parent_id", ast::DataType::Text).with_option(references("id"))],
        );
        let err = compile(&fixture, Statement::CreateTable(bad_type)).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn self_referencing_foreign_key() {
        let fixture = Fixture::new();
        let create = ast::CreateTable::new(
            "node",
            vec![
                column("id", ast::DataType::Integer),
                column("parent", ast::DataType::Integer).with_option(ast::ColumnOption::References {
                    table: ast::ObjectReference::from("node"),
                    columns: Vec::new(),
                }),
            ],
        );
        let mut create = create;
        create.constraints.push(ast::TableConstraint {
            name: None,
            kind: ast::TableConstraintKind::PrimaryKey(vec![ast::Ident::new("id")]),
        });

        let compiled = compile(&fixture, Statement::CreateTable(create)).unwrap();
        let info = create_info(&compiled.plan);
        assert!(matches!(info.constraints[0].kind, ConstraintKind::PrimaryKey(_)));
        assert!(matches!(
            &info.constraints[1].kind,
            ConstraintKind::ForeignKey { ref_columns, .. } if ref_columns == &vec![0]
        ));
    }

    #[test]
    fn check_must_be_boolean() {
        let fixture = Fixture::new();
        let create = ast::CreateTable::new(
            "t",
            vec![column("a", ast::DataType::Integer).with_option(ast::ColumnOption::Check(
                ast::Expr::binary(ast::Expr::ident("a"), ast::BinaryOperator::Plus, ast::Expr::number(1)),
            ))],
        );
        let err = compile(&fixture, Statement::CreateTable(create)).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn default_cannot_reference_columns() {
        let fixture = Fixture::new();
        let create = ast::CreateTable::new(
            "t",
            vec![
                column("a", ast::DataType::Integer),
                column("b", ast::DataType::Integer).with_option(ast::ColumnOption::Default(ast::Expr::ident("a"))),
            ],
        );
        let err = compile(&fixture, Statement::CreateTable(create)).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn auto_increment_creates_sequence() {
        let fixture = Fixture::new();
        let create = ast::CreateTable::new(
            "t",
            vec![column("id", ast::DataType::BigInt).with_option(ast::ColumnOption::AutoIncrement)],
        );
        let compiled = run(&fixture, Statement::CreateTable(create)).unwrap();

        assert_eq!("Cascade", compiled.plan.name());
        assert!(fixture.catalog.get_sequence("main", "t_id_seq").unwrap().is_some());
        let table = fixture.catalog.get_table("main", "t").unwrap().unwrap();
        assert!(table.columns[0].default.is_some());
    }

    #[test]
    fn create_table_as_casts_to_declared_types() {
        let fixture = Fixture::new().with_table("src", &[("a", DataType::Int32)]);
        let mut create = ast::CreateTable::new("dst", vec![column("a", ast::DataType::BigInt)]);
        create.source = Some(ast::QueryNode::select(
            ast::SelectNode::new(vec![ast::SelectExpr::Wildcard]).from(ast::FromNode::table("src")),
        ));
        create.with_data = true;

        let compiled = compile(&fixture, Statement::CreateTable(create)).unwrap();
        let child = &compiled.plan.children()[0];
        assert_eq!("Project", child.name());
        assert_eq!(vec![DataType::Int64], {
            let info = create_info(&compiled.plan);
            info.columns.iter().map(|c| c.datatype.clone()).collect::<Vec<_>>()
        });
    }

    #[test]
    fn create_table_as_arity() {
        let fixture = Fixture::new().with_table("src", &[("a", DataType::Int32), ("b", DataType::Int32)]);
        let mut create = ast::CreateTable::new("dst", vec![column("a", ast::DataType::BigInt)]);
        create.source = Some(ast::QueryNode::select(
            ast::SelectNode::new(vec![ast::SelectExpr::Wildcard]).from(ast::FromNode::table("src")),
        ));
        let err = compile(&fixture, Statement::CreateTable(create)).unwrap_err();
        assert_eq!(ErrorKind::ArityMismatch, err.kind());
    }
}
