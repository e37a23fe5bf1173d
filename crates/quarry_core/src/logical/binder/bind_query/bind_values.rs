use quarry_ast::ast;
use quarry_error::{DbError, Result};

use crate::compile::CompileContext;
use crate::expr::Expression;
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, TableRef};
use crate::logical::binder::column_binder::DefaultColumnBinder;
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext, coerce_to_supertype};

#[derive(Debug, Clone, PartialEq)]
pub struct BoundValues {
    pub rows: Vec<Vec<Expression>>,
    pub expressions_table: TableRef,
}

#[derive(Debug, Clone, Copy)]
pub struct ValuesBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> ValuesBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        ValuesBinder { current, ctx }
    }

    pub fn bind(&self, bind_context: &mut BindContext, values: &ast::Values) -> Result<BoundValues> {
        let rows = self.bind_rows(bind_context, &values.rows)?;
        let num_cols = rows.first().map(|row| row.len()).unwrap_or(0);

        let names = (0..num_cols).map(|idx| format!("column{}", idx + 1)).collect();
        let types = match rows.first() {
            Some(first) => first.iter().map(|expr| expr.datatype()).collect(),
            None => Vec::new(),
        };

        let expressions_table = bind_context.push_table(self.current, None, types, names)?;

        Ok(BoundValues {
            rows,
            expressions_table,
        })
    }

    /// Bind rows of a VALUES list, casting each column to the common
    /// supertype of its values.
    pub fn bind_rows(&self, bind_context: &mut BindContext, rows: &[Vec<ast::Expr>]) -> Result<Vec<Vec<Expression>>> {
        let num_cols = match rows.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(DbError::invalid_input("VALUES requires at least one row with at least one column")),
        };

        let expr_binder = BaseExpressionBinder::new(self.current, self.ctx);
        let mut columns: Vec<Vec<Expression>> = (0..num_cols).map(|_| Vec::with_capacity(rows.len())).collect();

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != num_cols {
                return Err(DbError::arity_mismatch(format!(
                    "All rows in VALUES must have the same number of columns, row {} has {} but expected {num_cols}",
                    row_idx + 1,
                    row.len(),
                ))
                .with_field("row", row_idx + 1));
            }
            let bound = expr_binder.bind_expressions(
                bind_context,
                row,
                &mut DefaultColumnBinder,
                RecursionContext::new(BindClause::Values),
            )?;
            for (column, expr) in columns.iter_mut().zip(bound) {
                column.push(expr);
            }
        }

        let columns = columns
            .into_iter()
            .map(|column| Ok(coerce_to_supertype(column)?.0))
            .collect::<Result<Vec<_>>>()?;

        // Back to row-major.
        let mut out: Vec<Vec<Expression>> = (0..rows.len()).map(|_| Vec::with_capacity(num_cols)).collect();
        for column in columns {
            for (row, expr) in out.iter_mut().zip(column) {
                row.push(expr);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::scope_stack::FrameKind;
    use crate::testutil::Fixture;
    use crate::types::datatype::DataType;

    fn bind(rows: Vec<Vec<ast::Expr>>) -> Result<(BindContext, BoundValues)> {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let scope = bind_context.root_scope_ref();
        let bound = bind_context.with_frame(FrameKind::Query, "test", |bind_context| {
            ValuesBinder::new(scope, &ctx).bind(bind_context, &ast::Values { rows })
        })?;
        Ok((bind_context, bound))
    }

    #[test]
    fn columns_coerced_to_supertype() {
        let (bind_context, bound) = bind(vec![
            vec![ast::Expr::number(1), ast::Expr::null()],
            vec![ast::Expr::number(3000000000i64), ast::Expr::boolean(true)],
        ])
        .unwrap();

        let table = bind_context.get_table(bound.expressions_table).unwrap();
        assert_eq!(vec![DataType::Int64, DataType::Boolean], table.column_types);
        assert_eq!(vec!["column1".to_string(), "column2".to_string()], table.column_names);
        for row in &bound.rows {
            assert_eq!(DataType::Int64, row[0].datatype());
            assert_eq!(DataType::Boolean, row[1].datatype());
        }
    }

    #[test]
    fn ragged_rows() {
        let err = bind(vec![
            vec![ast::Expr::number(1), ast::Expr::number(2)],
            vec![ast::Expr::number(1)],
        ])
        .unwrap_err();
        assert_eq!(ErrorKind::ArityMismatch, err.kind());
    }
}
