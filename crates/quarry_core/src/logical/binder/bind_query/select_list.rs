use std::collections::HashMap;

use quarry_ast::ast;
use quarry_error::{DbError, Result};

use super::bind_group_by::BoundGroupBy;
use super::bind_modifier::parse_ordinal;
use super::bind_select_list::SelectListBinder;
use crate::expr::Expression;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::logical::binder::bind_context::{BindContext, TableRef};

#[derive(Debug, Clone, PartialEq)]
pub struct OutputProjectionTable {
    /// Table containing just column references.
    pub table: TableRef,
    /// Column expressions referencing the original select list.
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSelectList {
    /// Output table used at the end of select planning.
    ///
    /// Is Some when columns were appended to the select list for ORDER BY.
    /// The pruned table removes those from the final output.
    pub output: Option<OutputProjectionTable>,
    pub projections_table: TableRef,
    /// Projection expressions, including any appended ones.
    pub projections: Vec<Expression>,
    pub aggregates_table: TableRef,
    /// Aggregates pushed up from subqueries, followed by those extracted from
    /// the select list, HAVING, and ORDER BY.
    pub aggregates: Vec<Expression>,
    pub windows_table: TableRef,
    pub windows: Vec<Expression>,
}

impl BoundSelectList {
    pub fn output_table(&self) -> TableRef {
        match &self.output {
            Some(output) => output.table,
            None => self.projections_table,
        }
    }
}

/// Extra clauses that get the same treatment as the select list when
/// finalizing.
#[derive(Debug)]
pub struct FinalizeInput<'a> {
    pub aggregates_table: TableRef,
    pub pushed_aggregates: Vec<Expression>,
    /// Outer columns read by subqueries in the select list, HAVING, or ORDER
    /// BY, recorded when there was no GROUP BY.
    pub ungrouped_outer_refs: Vec<String>,
    pub group_by: Option<&'a BoundGroupBy>,
    pub having: Option<&'a mut Expression>,
    pub distinct: bool,
}

#[derive(Debug)]
pub struct SelectList {
    /// Table that ORDER BY binds to when referencing select items.
    pub projections_table: TableRef,
    /// Mapping from user-provided alias to column index in the output.
    pub alias_map: HashMap<String, usize>,
    /// Expanded projections that will be shown in the output.
    pub projections: Vec<Expression>,
    /// Projections appended to the right of the output for ORDER BY.
    pub appended: Vec<Expression>,
}

impl SelectList {
    /// Finalizes the select list.
    ///
    /// Aggregates and windows are extracted into their own tables, and
    /// expressions matching a GROUP BY key are rewritten to reference the
    /// group column.
    pub fn finalize(mut self, bind_context: &mut BindContext, input: FinalizeInput) -> Result<BoundSelectList> {
        let FinalizeInput {
            aggregates_table,
            pushed_aggregates,
            ungrouped_outer_refs,
            group_by,
            mut having,
            distinct,
        } = input;

        let mut aggregates = pushed_aggregates;
        for expr in self
            .projections
            .iter_mut()
            .chain(self.appended.iter_mut())
            .chain(having.as_deref_mut())
        {
            SelectListBinder::extract_aggregates(aggregates_table, bind_context, expr, &mut aggregates)?;
        }

        if let Some(group_by) = group_by {
            for (idx, group_expr) in group_by.expressions.iter().enumerate() {
                let group_col = ColumnExpr::new(
                    ColumnReference::new(group_by.group_table, idx),
                    group_expr.datatype(),
                );
                for expr in self
                    .projections
                    .iter_mut()
                    .chain(self.appended.iter_mut())
                    .chain(having.as_deref_mut())
                {
                    replace_group_expr(group_expr, &group_col, expr)?;
                }
            }
        }

        let windows_table = bind_context.new_ephemeral_table()?;
        let mut windows = Vec::new();
        for expr in self.projections.iter_mut().chain(self.appended.iter_mut()) {
            SelectListBinder::extract_windows(windows_table, bind_context, expr, &mut windows)?;
        }

        let grouped = group_by.is_some() || !aggregates.is_empty() || having.is_some();
        if grouped {
            if let Some(name) = ungrouped_outer_refs.into_iter().next() {
                return Err(DbError::group_by_violation(format!(
                    "Subquery uses ungrouped column '{name}' from outer query"
                ))
                .with_field("column", name));
            }

            let mut allowed = vec![aggregates_table, windows_table];
            if let Some(group_by) = group_by {
                allowed.push(group_by.group_table);
            }
            for expr in self
                .projections
                .iter()
                .chain(&self.appended)
                .chain(&windows)
                .chain(having.as_deref())
            {
                verify_grouped_columns(bind_context, expr, &allowed)?;
            }
        }

        if distinct && !self.appended.is_empty() {
            return Err(DbError::invalid_input(
                "For SELECT DISTINCT, ORDER BY expressions must appear in the select list",
            ));
        }

        let output = if !self.appended.is_empty() {
            let len = self.projections.len();
            self.projections.append(&mut self.appended);

            let projections_table = bind_context.get_table(self.projections_table)?;
            let types: Vec<_> = projections_table.column_types.iter().take(len).cloned().collect();
            let names = projections_table.column_names.iter().take(len).cloned().collect();

            let expressions = types
                .iter()
                .enumerate()
                .map(|(idx, datatype)| {
                    Expression::Column(ColumnExpr::new(
                        ColumnReference::new(self.projections_table, idx),
                        datatype.clone(),
                    ))
                })
                .collect();
            let table = bind_context.new_ephemeral_table_with_columns(types, names)?;

            Some(OutputProjectionTable { table, expressions })
        } else {
            None
        };

        Ok(BoundSelectList {
            output,
            projections_table: self.projections_table,
            projections: self.projections,
            aggregates_table,
            aggregates,
            windows_table,
            windows,
        })
    }

    /// Appends an expression to the select list.
    pub fn append_projection(&mut self, bind_context: &mut BindContext, expr: Expression) -> Result<ColumnExpr> {
        let datatype = expr.datatype();
        self.appended.push(expr);
        let idx = bind_context.push_column_for_table(self.projections_table, "__appended_proj", datatype.clone())?;

        Ok(ColumnExpr::new(
            ColumnReference::new(self.projections_table, idx),
            datatype,
        ))
    }

    /// Get the select list column for an expression, appending the
    /// expression if nothing in the select list matches it.
    pub fn column_for_expression(&mut self, bind_context: &mut BindContext, expr: Expression) -> Result<ColumnExpr> {
        if let Expression::Column(col) = &expr {
            if col.reference.table_scope == self.projections_table {
                return Ok(col.clone());
            }
        }

        let found = self.projections.iter().chain(&self.appended).position(|p| p == &expr);
        match found {
            Some(idx) => Ok(ColumnExpr::new(
                ColumnReference::new(self.projections_table, idx),
                expr.datatype(),
            )),
            None => self.append_projection(bind_context, expr),
        }
    }

    pub fn column_by_user_alias(&self, bind_context: &BindContext, ident: &ast::Ident) -> Result<Option<ColumnExpr>> {
        match self.alias_map.get(&ident.as_normalized_string()) {
            Some(idx) => Ok(Some(self.column(bind_context, *idx)?)),
            None => Ok(None),
        }
    }

    pub fn column_by_ordinal(&self, bind_context: &BindContext, literal: &ast::Literal) -> Result<Option<ColumnExpr>> {
        match parse_ordinal(literal, self.projections.len())? {
            Some(idx) => Ok(Some(self.column(bind_context, idx)?)),
            None => Ok(None),
        }
    }

    fn column(&self, bind_context: &BindContext, idx: usize) -> Result<ColumnExpr> {
        let (_, datatype) = bind_context.get_column(self.projections_table, idx)?;
        Ok(ColumnExpr::new(
            ColumnReference::new(self.projections_table, idx),
            datatype.clone(),
        ))
    }
}

fn replace_group_expr(group_expr: &Expression, group_col: &ColumnExpr, expr: &mut Expression) -> Result<()> {
    if expr == group_expr {
        *expr = Expression::Column(group_col.clone());
        return Ok(());
    }
    expr.for_each_child_mut(&mut |child| replace_group_expr(group_expr, group_col, child))
}

/// Verify every column of the select references a group key, an aggregate,
/// or a window.
fn verify_grouped_columns(bind_context: &BindContext, expr: &Expression, allowed: &[TableRef]) -> Result<()> {
    match expr {
        Expression::Column(col) if col.depth == 0 => {
            if !allowed.contains(&col.reference.table_scope) {
                let (name, _) = bind_context.get_column(col.reference.table_scope, col.reference.column)?;
                return Err(DbError::group_by_violation(format!(
                    "Column '{name}' must appear in the GROUP BY clause or be used in an aggregate function"
                ))
                .with_field("column", name));
            }
            Ok(())
        }
        other => other.for_each_child(&mut |child| verify_grouped_columns(bind_context, child, allowed)),
    }
}
