//! Row modifying statements.
//!
//! Each statement plans a query producing the rows to write, with any index
//! keys and foreign key checks the write needs appended as extra columns.
pub mod copy;
pub mod delete;
pub mod insert;
pub mod maintenance;
pub mod merge;
pub mod update;

use std::collections::HashSet;
use std::sync::Arc;

use quarry_ast::ast;
use quarry_error::{DbError, Result};

use super::bind_context::{BindContext, BindScopeRef, TableAlias, TableRef};
use super::bind_ddl::create_table::{bind_default, find_column};
use super::column_binder::DefaultColumnBinder;
use super::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext};
use crate::catalog::entry::{ColumnEntry, ConstraintKind, TableEntry};
use crate::catalog::privilege::Privileges;
use crate::compile::CompileContext;
use crate::expr::cast_expr::check_type;
use crate::expr::column_expr::ColumnReference;
use crate::expr::{self, Expression};
use crate::logical::logical_dml::ReferencingTable;
use crate::logical::logical_project::LogicalProject;
use crate::logical::operator::{LogicalOperator, Node};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, Copy)]
pub struct DmlBinder<'a> {
    pub ctx: &'a CompileContext<'a>,
}

/// A base table bound as the target of a modifying statement.
#[derive(Debug, Clone)]
pub struct BoundTarget {
    pub schema: String,
    pub entry: Arc<TableEntry>,
    pub table_ref: TableRef,
    pub row_id: usize,
}

impl BoundTarget {
    pub fn column(&self, idx: usize) -> Result<Expression> {
        let column = self.entry.columns.get(idx).ok_or_else(|| {
            DbError::new(format!("Missing column {idx} in table '{}'", self.entry.name))
        })?;
        Ok(expr::column(
            ColumnReference::new(self.table_ref, idx),
            column.datatype.clone(),
        ))
    }

    pub fn row_id_expr(&self) -> Expression {
        expr::column(ColumnReference::new(self.table_ref, self.row_id), DataType::RowId)
    }
}

impl<'a> DmlBinder<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>) -> Self {
        DmlBinder { ctx }
    }

    /// Find a base table rows can be written to.
    pub(crate) fn resolve_target(
        &self,
        reference: &ast::ObjectReference,
        verb: &str,
    ) -> Result<(String, Arc<TableEntry>)> {
        let (schema, entry) = self.ctx.resolve_table(reference)?;
        if entry.is_view() {
            return Err(DbError::invalid_input(format!(
                "Cannot {verb} view '{}'",
                entry.name
            ))
            .with_field("table", &entry.name));
        }
        if entry.system {
            return Err(DbError::privilege_denied(format!(
                "Cannot {verb} system table '{}'",
                entry.name
            ))
            .with_field("table", &entry.name));
        }
        Ok((schema, entry))
    }

    /// Resolve the target and add it to `scope` so the statement's
    /// expressions can reference its columns.
    pub(crate) fn bind_target(
        &self,
        bind_context: &mut BindContext,
        scope: BindScopeRef,
        reference: &ast::ObjectReference,
        alias: Option<&ast::Ident>,
        verb: &str,
    ) -> Result<BoundTarget> {
        let (schema, entry) = self.resolve_target(reference, verb)?;
        let row_id = entry.row_id_column().ok_or_else(|| {
            DbError::new(format!("Table '{}' has no row id column", entry.name))
        })?;

        let alias = match alias {
            Some(alias) => TableAlias::new(None, alias.as_normalized_string()),
            None => TableAlias::new(Some(schema.clone()), entry.name.clone()),
        };
        let names = entry.columns.iter().map(|c| c.name.clone()).collect();
        let types = entry.columns.iter().map(|c| c.datatype.clone()).collect();
        let table_ref = bind_context.push_table(scope, Some(alias), types, names)?;
        bind_context.get_table_mut(table_ref)?.hidden.extend(
            entry
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.hidden)
                .map(|(idx, _)| idx),
        );

        Ok(BoundTarget {
            schema,
            entry,
            table_ref,
            row_id,
        })
    }

    pub(crate) fn require_table_privs(&self, schema: &str, table: &str, privs: Privileges) -> Result<()> {
        if !self.ctx.catalog.table_privs(self.ctx.session, schema, table, privs)? {
            return Err(DbError::privilege_denied(format!(
                "Permission denied for table '{schema}.{table}'"
            ))
            .with_field("table", table)
            .with_field("user", &self.ctx.session.user));
        }
        Ok(())
    }

    /// Column level grants are enough when a statement only writes some
    /// columns.
    pub(crate) fn require_column_privs(
        &self,
        schema: &str,
        entry: &TableEntry,
        columns: &[usize],
        privs: Privileges,
    ) -> Result<()> {
        for &idx in columns {
            let Some(column) = entry.columns.get(idx) else {
                continue;
            };
            if !self
                .ctx
                .catalog
                .column_privs(self.ctx.session, schema, &entry.name, &column.name, privs)?
            {
                return Err(DbError::privilege_denied(format!(
                    "Permission denied for column '{}' of table '{schema}.{}'",
                    column.name, entry.name
                ))
                .with_field("column", &column.name)
                .with_field("user", &self.ctx.session.user));
            }
        }
        Ok(())
    }

    /// Bind an optional WHERE clause into its conjuncts.
    pub(crate) fn bind_where(
        &self,
        bind_context: &mut BindContext,
        scope: BindScopeRef,
        where_expr: Option<&ast::Expr>,
    ) -> Result<Vec<Expression>> {
        let Some(where_expr) = where_expr else {
            return Ok(Vec::new());
        };
        let expr = BaseExpressionBinder::new(scope, self.ctx).bind_expression(
            bind_context,
            where_expr,
            &mut DefaultColumnBinder,
            RecursionContext::new(BindClause::Where),
        )?;
        Ok(check_type(&DataType::Boolean, expr)?.split_conjunction())
    }

    /// Value written to a column that wasn't given one, or was given
    /// DEFAULT.
    pub(crate) fn default_value(&self, bind_context: &mut BindContext, column: &ColumnEntry) -> Result<Expression> {
        match &column.default {
            Some(default) => bind_default(self.ctx, bind_context, &column.name, &column.datatype, default),
            None if column.not_null => Err(not_null_violation(&column.name)),
            None => Ok(expr::lit(ScalarValue::Null(column.datatype.clone()))),
        }
    }

    /// Tables with a foreign key pointing at `entry`.
    pub(crate) fn referenced_by(&self, schema: &str, entry: &TableEntry) -> Result<Vec<ReferencingTable>> {
        let mut out = Vec::new();
        for table in self.ctx.catalog.referencing_tables(schema, &entry.name)? {
            for fk in table.foreign_keys() {
                if let ConstraintKind::ForeignKey {
                    ref_schema,
                    ref_table,
                    on_delete,
                    ..
                } = &fk.kind
                {
                    if ref_schema == schema && ref_table == &entry.name {
                        out.push(ReferencingTable {
                            schema: table.schema.clone(),
                            table: table.name.clone(),
                            constraint: fk.name.clone(),
                            on_delete: *on_delete,
                        });
                    }
                }
            }
        }
        out.sort_by(|a, b| (&a.schema, &a.table, &a.constraint).cmp(&(&b.schema, &b.table, &b.constraint)));
        Ok(out)
    }
}

/// Resolve an explicit column list against the visible columns of a table.
pub(crate) fn resolve_column_list(entry: &TableEntry, columns: &[ast::Ident]) -> Result<Vec<usize>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(columns.len());
    for ident in columns {
        let name = ident.as_normalized_string();
        let idx = find_column(&entry.columns, &entry.name, &name)?;
        if !seen.insert(idx) {
            return Err(DbError::invalid_input(format!(
                "Column '{name}' specified more than once"
            ))
            .with_field("column", name));
        }
        out.push(idx);
    }
    Ok(out)
}

/// Reject an explicit NULL written to a NOT NULL column. Non-constant values
/// are checked when the rows are written.
pub(crate) fn check_not_null(column: &ColumnEntry, value: &Expression) -> Result<()> {
    if column.not_null && is_null_literal(value) {
        return Err(not_null_violation(&column.name));
    }
    Ok(())
}

fn is_null_literal(expr: &Expression) -> bool {
    match expr {
        Expression::Literal(lit) => lit.literal.is_null(),
        Expression::Cast(cast) => is_null_literal(&cast.expr),
        _ => false,
    }
}

fn not_null_violation(column: &str) -> DbError {
    DbError::invalid_input(format!("Column '{column}' cannot be NULL")).with_field("column", column)
}

/// Wrap `child` in a projection with a new output table.
pub(crate) fn project(
    bind_context: &mut BindContext,
    prefix: &str,
    projections: Vec<Expression>,
    child: LogicalOperator,
) -> Result<(LogicalOperator, TableRef)> {
    let projection_table = bind_context.new_ephemeral_table_from_expressions(prefix, &projections)?;
    let plan = LogicalOperator::Project(Node::new(
        LogicalProject {
            projections,
            projection_table,
        },
        vec![child],
    ));
    Ok((plan, projection_table))
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::logical::operator::LogicalOperator;

    /// Find the first node matching `pred` in a pre-order walk.
    pub fn find<'a>(plan: &'a LogicalOperator, pred: &dyn Fn(&LogicalOperator) -> bool) -> Option<&'a LogicalOperator> {
        if pred(plan) {
            return Some(plan);
        }
        plan.children().iter().find_map(|child| find(child, pred))
    }

    pub fn child(plan: &LogicalOperator) -> &LogicalOperator {
        match plan.children() {
            [child, ..] => child,
            [] => panic!("expected a child: {plan:?}"),
        }
    }
}
