//! Index keys and foreign key checks for rows being written.
use quarry_error::{DbError, Result};
use tracing::trace;

use crate::catalog::entry::{ConstraintKind, TableEntry};
use crate::compile::CompileContext;
use crate::expr::column_expr::ColumnReference;
use crate::expr::comparison_expr::ComparisonOperator;
use crate::expr::{self, Expression};
use crate::functions::builtin::boolean::{FUNCTION_SET_IS_NOT_NULL, FUNCTION_SET_IS_NULL};
use crate::functions::builtin::internal::{FUNCTION_SET_HASH, FUNCTION_SET_ROTATE_XOR_HASH};
use crate::logical::binder::bind_context::{BindContext, TableRef};
use crate::logical::binder::expr_binder::{coerce_to_supertype, scalar_call};
use crate::logical::logical_dml::{ForeignKeyCheck, IndexKeyColumn};
use crate::logical::logical_join::{JoinCondition, JoinType};
use crate::logical::operator::{LogicalOperator, NodeFlags};
use crate::logical::planner::filter_pushdown::plan_join_from_conditions;
use crate::logical::planner::plan_from::plan_scan;
use crate::types::datatype::DataType;

/// Where the values of a row being written can be read from.
#[derive(Debug, Clone)]
pub struct RowImage {
    pub table_ref: TableRef,
    /// Position in `table_ref` for each column of the target table.
    pub positions: Vec<Option<usize>>,
}

impl RowImage {
    pub fn column(&self, entry: &TableEntry, idx: usize) -> Result<Expression> {
        match (self.positions.get(idx).copied().flatten(), entry.columns.get(idx)) {
            (Some(pos), Some(column)) => Ok(expr::column(
                ColumnReference::new(self.table_ref, pos),
                column.datatype.clone(),
            )),
            _ => Err(DbError::new(format!(
                "Column {idx} of '{}' not available in row image",
                entry.name
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyExprs {
    pub constraint: String,
    pub referenced_row: Expression,
    pub violation: Expression,
}

/// Extra columns appended to the rows of an insert or update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Maintenance {
    pub index_keys: Vec<(String, Expression)>,
    pub foreign_keys: Vec<ForeignKeyExprs>,
}

impl Maintenance {
    pub fn is_empty(&self) -> bool {
        self.index_keys.is_empty() && self.foreign_keys.is_empty()
    }

    /// Append keys and checks to `projections`, recording where each one
    /// lands.
    pub fn append_to(
        self,
        mut projections: Vec<Expression>,
    ) -> (Vec<Expression>, Vec<IndexKeyColumn>, Vec<ForeignKeyCheck>) {
        let mut index_keys = Vec::with_capacity(self.index_keys.len());
        for (index, key) in self.index_keys {
            index_keys.push(IndexKeyColumn {
                index,
                position: projections.len(),
            });
            projections.push(key);
        }

        let mut fk_checks = Vec::with_capacity(self.foreign_keys.len());
        for fk in self.foreign_keys {
            let referenced_row = projections.len();
            projections.push(fk.referenced_row);
            fk_checks.push(ForeignKeyCheck {
                constraint: fk.constraint,
                position: projections.len(),
                referenced_row,
            });
            projections.push(fk.violation);
        }

        (projections, index_keys, fk_checks)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MaintenancePlanner<'a> {
    pub ctx: &'a CompileContext<'a>,
    pub schema: &'a str,
    pub entry: &'a TableEntry,
}

impl<'a> MaintenancePlanner<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>, schema: &'a str, entry: &'a TableEntry) -> Self {
        MaintenancePlanner { ctx, schema, entry }
    }

    /// If writing the columns accepted by `affected` touches an index or a
    /// foreign key.
    pub fn needed(&self, affected: impl Fn(usize) -> bool) -> Result<bool> {
        let indexed = self
            .ctx
            .catalog
            .list_indexes(self.schema, &self.entry.name)?
            .iter()
            .any(|index| index.columns.iter().any(|&col| affected(col)));
        let referencing = self.entry.foreign_keys().any(|fk| match &fk.kind {
            ConstraintKind::ForeignKey { columns, .. } => columns.iter().any(|&col| affected(col)),
            _ => false,
        });
        Ok(indexed || referencing)
    }

    /// Plan keys for every index over a column accepted by `affected`, and
    /// checks for every foreign key over such a column.
    ///
    /// Foreign key checks join the referenced tables onto `plan`.
    pub fn plan(
        &self,
        bind_context: &mut BindContext,
        image: &RowImage,
        plan: LogicalOperator,
        affected: impl Fn(usize) -> bool,
    ) -> Result<(LogicalOperator, Maintenance)> {
        let index_keys = self.index_keys(image, &affected)?;
        let (plan, foreign_keys) = self.foreign_key_checks(bind_context, image, plan, &affected)?;
        Ok((
            plan,
            Maintenance {
                index_keys,
                foreign_keys,
            },
        ))
    }

    pub fn index_keys(&self, image: &RowImage, affected: &impl Fn(usize) -> bool) -> Result<Vec<(String, Expression)>> {
        let mut indexes = self.ctx.catalog.list_indexes(self.schema, &self.entry.name)?;
        indexes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut keys = Vec::new();
        for index in indexes {
            if !index.columns.iter().any(|&col| affected(col)) {
                continue;
            }
            let columns = index
                .columns
                .iter()
                .map(|&col| image.column(self.entry, col))
                .collect::<Result<Vec<_>>>()?;
            trace!(index = %index.name, kind = %index.kind, "planned index key");
            keys.push((index.name.clone(), index_key(columns)?));
        }
        Ok(keys)
    }

    fn foreign_key_checks(
        &self,
        bind_context: &mut BindContext,
        image: &RowImage,
        mut plan: LogicalOperator,
        affected: &impl Fn(usize) -> bool,
    ) -> Result<(LogicalOperator, Vec<ForeignKeyExprs>)> {
        let mut checks = Vec::new();
        for fk in self.entry.foreign_keys() {
            let ConstraintKind::ForeignKey {
                columns,
                ref_schema,
                ref_table,
                ref_columns,
                ..
            } = &fk.kind
            else {
                continue;
            };
            if !columns.iter().any(|&col| affected(col)) {
                continue;
            }

            let referenced = self.ctx.catalog.require_table(ref_schema, ref_table)?;
            let ref_row_id = referenced.row_id_column().ok_or_else(|| {
                DbError::new(format!("Table '{ref_table}' has no row id column"))
            })?;
            let ref_table_ref = bind_context.new_ephemeral_table_with_columns(
                referenced.columns.iter().map(|c| c.datatype.clone()).collect(),
                referenced.columns.iter().map(|c| c.name.clone()).collect(),
            )?;
            let scan = plan_scan(ref_table_ref, ref_schema, &referenced);

            let mut conditions = Vec::with_capacity(columns.len());
            let mut key_present = Vec::with_capacity(columns.len());
            for (&col, &ref_col) in columns.iter().zip(ref_columns) {
                let value = image.column(self.entry, col)?;
                let ref_type = referenced
                    .columns
                    .get(ref_col)
                    .map(|c| c.datatype.clone())
                    .ok_or_else(|| DbError::new(format!("Missing column {ref_col} in '{ref_table}'")))?;
                let ref_value = expr::column(ColumnReference::new(ref_table_ref, ref_col), ref_type);

                key_present.push(scalar_call(&FUNCTION_SET_IS_NOT_NULL, vec![value.clone()])?);

                let (mut coerced, _) = coerce_to_supertype(vec![value, ref_value])?;
                let (Some(right), Some(left)) = (coerced.pop(), coerced.pop()) else {
                    return Err(DbError::new("Foreign key condition lost an operand"));
                };
                conditions.push(JoinCondition {
                    left: Box::new(left),
                    right: Box::new(right),
                    op: ComparisonOperator::Eq,
                });
            }

            plan = plan_join_from_conditions(
                bind_context,
                JoinType::Left,
                conditions,
                Vec::new(),
                plan,
                scan,
                NodeFlags::default(),
            )?;

            // Rows with a NULL in any key column aren't checked.
            let referenced_row = expr::column(ColumnReference::new(ref_table_ref, ref_row_id), DataType::RowId);
            key_present.push(scalar_call(&FUNCTION_SET_IS_NULL, vec![referenced_row.clone()])?);
            let violation = Expression::and_all(key_present)?
                .ok_or_else(|| DbError::new(format!("Foreign key '{}' has no columns", fk.name)))?;

            trace!(constraint = %fk.name, referenced = %ref_table, "planned foreign key check");

            checks.push(ForeignKeyExprs {
                constraint: fk.name.clone(),
                referenced_row,
                violation,
            });
        }
        Ok((plan, checks))
    }
}

/// Key for an index over `columns`: the hash of the first column, with each
/// further column folded in by `rotate_xor_hash`.
pub fn index_key(columns: Vec<Expression>) -> Result<Expression> {
    let bits = 1 + 63 / (columns.len() as i32 + 1);
    let mut columns = columns.into_iter();
    let first = columns
        .next()
        .ok_or_else(|| DbError::new("Index key without columns"))?;

    let mut key = scalar_call(&FUNCTION_SET_HASH, vec![first])?;
    for column in columns {
        key = scalar_call(&FUNCTION_SET_ROTATE_XOR_HASH, vec![key, expr::lit(bits), column])?;
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expr::scalar_function_expr::ScalarFunctionExpr;

    fn col(idx: usize, datatype: DataType) -> Expression {
        expr::column(ColumnReference::new(TableRef { table_idx: 0 }, idx), datatype)
    }

    fn function_name(expr: &Expression) -> &str {
        match expr {
            Expression::ScalarFunction(ScalarFunctionExpr { function, .. }) => &function.name,
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn single_column_key_is_hash() {
        let key = index_key(vec![col(0, DataType::Int32)]).unwrap();
        assert_eq!("hash", function_name(&key));
        assert_eq!(DataType::Int64, key.datatype());
    }

    #[test]
    fn multi_column_key_folds_hashes() {
        let key = index_key(vec![col(0, DataType::Int32), col(1, DataType::UTF8)]).unwrap();
        assert_eq!("rotate_xor_hash", function_name(&key));
        assert_eq!(DataType::Int64, key.datatype());
    }

    #[test]
    fn empty_key_errors() {
        index_key(Vec::new()).unwrap_err();
    }

    #[test]
    fn append_records_positions() {
        let maintenance = Maintenance {
            index_keys: vec![("idx".to_string(), expr::lit(1_i64))],
            foreign_keys: vec![ForeignKeyExprs {
                constraint: "fk".to_string(),
                referenced_row: expr::lit(0_i64),
                violation: expr::lit(false),
            }],
        };
        let (projections, keys, checks) = maintenance.append_to(vec![expr::lit(1), expr::lit(2)]);
        assert_eq!(5, projections.len());
        assert_eq!(2, keys[0].position);
        assert_eq!(3, checks[0].referenced_row);
        assert_eq!(4, checks[0].position);
    }
}
