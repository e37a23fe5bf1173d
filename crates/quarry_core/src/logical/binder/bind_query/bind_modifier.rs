use quarry_ast::ast;
use quarry_error::{DbError, Result};

use crate::compile::CompileContext;
use crate::expr::{self, Expression};
use crate::expr::cast_expr::check_type;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::expr::literal_expr::LiteralExpr;
use crate::expr::subquery_expr::{SubqueryExpr, SubqueryType};
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, TableRef};
use crate::logical::binder::column_binder::{ErroringColumnBinder, ExpressionColumnBinder};
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext};
use crate::logical::logical_limit::SampleAmount;
use crate::logical::logical_order::OrderByExpr;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundOrderBy {
    pub exprs: Vec<OrderByExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundLimit {
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    pub sample: Option<SampleAmount>,
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundModifiers {
    pub order_by: Option<BoundOrderBy>,
    pub limit: Option<BoundLimit>,
}

#[derive(Debug, Clone, Copy)]
pub struct ModifierBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> ModifierBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        ModifierBinder { current, ctx }
    }

    pub fn bind_order_by(
        &self,
        bind_context: &mut BindContext,
        nodes: &[ast::OrderByNode],
        column_binder: &mut impl ExpressionColumnBinder,
    ) -> Result<Option<BoundOrderBy>> {
        if nodes.is_empty() {
            return Ok(None);
        }

        let binder = BaseExpressionBinder::new(self.current, self.ctx);
        let exprs = nodes
            .iter()
            .map(|node| {
                let expr = binder.bind_expression(
                    bind_context,
                    &node.expr,
                    column_binder,
                    RecursionContext::new(BindClause::OrderBy),
                )?;
                let desc = matches!(node.typ, Some(ast::OrderByType::Desc));
                let nulls_first = node.nulls.map(|n| n == ast::OrderByNulls::First);
                Ok(OrderByExpr::new(expr, desc, nulls_first))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(BoundOrderBy { exprs }))
    }

    pub fn bind_limit(&self, bind_context: &mut BindContext, limit: &ast::LimitModifier) -> Result<Option<BoundLimit>> {
        if limit.is_empty() {
            return Ok(None);
        }

        let limit_expr = limit
            .limit
            .as_ref()
            .map(|expr| self.bind_count(bind_context, expr, "LIMIT"))
            .transpose()?;
        let offset = limit
            .offset
            .as_ref()
            .map(|expr| self.bind_count(bind_context, expr, "OFFSET"))
            .transpose()?;
        let sample = limit
            .sample
            .as_ref()
            .map(|expr| self.bind_sample(bind_context, expr))
            .transpose()?;

        let seed = match &limit.seed {
            Some(expr) => {
                if sample.is_none() {
                    return Err(DbError::invalid_input("SEED requires SAMPLE"));
                }
                let seed = self.bind_constant(bind_context, expr, "SEED")?;
                match seed {
                    Expression::Literal(LiteralExpr { literal }) if literal.datatype().is_integer() => {
                        Some(literal.try_as_i64()?)
                    }
                    other => {
                        return Err(DbError::type_mismatch(format!(
                            "SEED must be an integer literal, got {}",
                            other.datatype()
                        )));
                    }
                }
            }
            None => None,
        };

        Ok(Some(BoundLimit {
            limit: limit_expr,
            offset,
            sample,
            seed,
        }))
    }

    fn bind_constant(&self, bind_context: &mut BindContext, expr: &ast::Expr, clause: &'static str) -> Result<Expression> {
        let expr = BaseExpressionBinder::new(self.current, self.ctx).bind_expression(
            bind_context,
            expr,
            &mut ErroringColumnBinder::new(clause),
            RecursionContext::new(BindClause::Limit),
        )?;

        let scalar_subquery = matches!(
            &expr,
            Expression::Subquery(SubqueryExpr {
                subquery_type: SubqueryType::Scalar,
                ..
            })
        );
        if !expr.is_constant() && !scalar_subquery {
            return Err(DbError::invalid_input(format!(
                "{clause} must be a constant expression"
            )));
        }

        Ok(expr)
    }

    /// LIMIT and OFFSET, non-negative Int64 values.
    fn bind_count(&self, bind_context: &mut BindContext, expr: &ast::Expr, clause: &'static str) -> Result<Expression> {
        let expr = self.bind_constant(bind_context, expr, clause)?;
        to_count(expr, clause)
    }

    /// SAMPLE takes a row count, or a fraction of the input between zero and
    /// one.
    fn bind_sample(&self, bind_context: &mut BindContext, expr: &ast::Expr) -> Result<SampleAmount> {
        let expr = self.bind_constant(bind_context, expr, "SAMPLE")?;

        if let Expression::Literal(LiteralExpr { literal }) = &expr {
            let datatype = literal.datatype();
            let whole = matches!(&datatype, DataType::Decimal64(m) | DataType::Decimal128(m) if m.scale == 0);
            if (datatype.is_decimal() && !whole) || datatype.is_float() {
                let fraction = literal.try_as_f64()?;
                if !(fraction > 0.0 && fraction < 1.0) {
                    return Err(DbError::invalid_input(format!(
                        "SAMPLE fraction must be between 0 and 1, got {literal}"
                    )));
                }
                return Ok(SampleAmount::Fraction(fraction));
            }
        }

        Ok(SampleAmount::Rows(to_count(expr, "SAMPLE")?))
    }
}

/// Coerce a bound count to Int64.
///
/// Literals are folded so the planner sees the value directly.
fn to_count(bound: Expression, clause: &'static str) -> Result<Expression> {
    let datatype = bound.datatype();
    if let Expression::Literal(LiteralExpr { literal }) = &bound {
        if literal.is_null() {
            return check_type(&DataType::Int64, bound);
        }
        let value = literal
            .try_as_i64()
            .map_err(|_| DbError::type_mismatch(format!("{clause} must be an integer, got {datatype}")))?;
        if value < 0 {
            return Err(DbError::invalid_input(format!(
                "{clause} must not be negative, got {value}"
            )));
        }
        return Ok(expr::lit(value));
    }

    if !datatype.is_integer() && !datatype.is_null() {
        return Err(DbError::type_mismatch(format!(
            "{clause} must be an integer, got {datatype}"
        )));
    }
    check_type(&DataType::Int64, bound)
}

/// Binds ORDER BY against the output of a query that has no select list of
/// its own (set operations, VALUES, parenthesized queries).
///
/// Columns may be referenced by name or by ordinal.
#[derive(Debug, Clone)]
pub struct OutputColumnBinder {
    pub table: TableRef,
    names: Vec<String>,
    types: Vec<DataType>,
}

impl OutputColumnBinder {
    pub fn new(bind_context: &BindContext, table: TableRef) -> Result<Self> {
        let output = bind_context.get_table(table)?;
        Ok(OutputColumnBinder {
            table,
            names: output.column_names.clone(),
            types: output.column_types.clone(),
        })
    }

    fn column(&self, idx: usize) -> Result<Expression> {
        let datatype = self
            .types
            .get(idx)
            .ok_or_else(|| DbError::new(format!("Missing output column {idx}")))?;
        Ok(Expression::Column(ColumnExpr::new(
            ColumnReference::new(self.table, idx),
            datatype.clone(),
        )))
    }
}

impl ExpressionColumnBinder for OutputColumnBinder {
    fn bind_from_root_literal(
        &mut self,
        _bind_scope: BindScopeRef,
        _bind_context: &mut BindContext,
        literal: &ast::Literal,
    ) -> Result<Option<Expression>> {
        match parse_ordinal(literal, self.names.len())? {
            Some(idx) => Ok(Some(self.column(idx)?)),
            None => Ok(None),
        }
    }

    fn bind_from_ident(
        &mut self,
        _bind_scope: BindScopeRef,
        _bind_context: &mut BindContext,
        ident: &ast::Ident,
        _recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        let name = ident.as_normalized_string();
        let mut found = None;
        for (idx, have) in self.names.iter().enumerate() {
            if have == &name {
                if found.is_some() {
                    return Err(DbError::ambiguous(format!(
                        "ORDER BY '{name}' is ambiguous"
                    ))
                    .with_field("column", name));
                }
                found = Some(idx);
            }
        }
        found.map(|idx| self.column(idx)).transpose()
    }

    fn bind_from_idents(
        &mut self,
        _bind_scope: BindScopeRef,
        _bind_context: &mut BindContext,
        idents: &[ast::Ident],
        _recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        Err(DbError::not_found(format!(
            "Qualified reference '{}' can't be used to order the output of this query",
            ast::ObjectReference(idents.to_vec())
        )))
    }
}

/// Parse a 1-based column ordinal.
///
/// Returns None for literals that aren't integers, errors for integers out
/// of range.
pub fn parse_ordinal(literal: &ast::Literal, num_columns: usize) -> Result<Option<usize>> {
    let ast::Literal::Number(s) = literal else {
        return Ok(None);
    };
    let Ok(n) = s.parse::<i64>() else {
        return Ok(None);
    };
    if n < 1 || n as usize > num_columns {
        return Err(DbError::invalid_input(format!(
            "Column position {n} is out of range, expected 1 - {num_columns}"
        )));
    }
    Ok(Some(n as usize - 1))
}

/// Fold a literal used as a count to the value it holds.
pub fn literal_count(expr: &Expression) -> Option<i64> {
    match expr {
        Expression::Literal(LiteralExpr {
            literal: ScalarValue::Int64(v),
        }) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::scope_stack::FrameKind;
    use crate::testutil::Fixture;

    fn num(s: &str) -> ast::Expr {
        ast::Expr::Literal(ast::Literal::Number(s.to_string()))
    }

    fn bind(limit: ast::LimitModifier) -> Result<Option<BoundLimit>> {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let root = bind_context.root_scope_ref();
        bind_context.with_frame(FrameKind::Statement, "test", |bind_context| {
            ModifierBinder::new(root, &ctx).bind_limit(bind_context, &limit)
        })
    }

    #[test]
    fn limit_offset_int64() {
        let bound = bind(ast::LimitModifier {
            limit: Some(num("10")),
            offset: Some(num("5")),
            ..Default::default()
        })
        .unwrap()
        .unwrap();

        assert_eq!(Some(10), bound.limit.as_ref().and_then(literal_count));
        assert_eq!(Some(5), bound.offset.as_ref().and_then(literal_count));
    }

    #[test]
    fn negative_limit() {
        let err = bind(ast::LimitModifier {
            limit: Some(ast::Expr::UnaryExpr {
                op: ast::UnaryOperator::Minus,
                expr: Box::new(num("1")),
            }),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn limit_rejects_columns() {
        let err = bind(ast::LimitModifier {
            limit: Some(ast::Expr::Ident(ast::Ident::new("a"))),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn limit_rejects_strings() {
        let err = bind(ast::LimitModifier {
            limit: Some(ast::Expr::Literal(ast::Literal::Boolean(true))),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn sample_fraction_and_seed() {
        let bound = bind(ast::LimitModifier {
            sample: Some(num("0.25")),
            seed: Some(num("42")),
            ..Default::default()
        })
        .unwrap()
        .unwrap();
        assert_eq!(Some(SampleAmount::Fraction(0.25)), bound.sample);
        assert_eq!(Some(42), bound.seed);
    }

    #[test]
    fn seed_without_sample() {
        let err = bind(ast::LimitModifier {
            seed: Some(num("42")),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn ordinal_out_of_range() {
        parse_ordinal(&ast::Literal::Number("3".to_string()), 2).unwrap_err();
        assert_eq!(
            Some(1),
            parse_ordinal(&ast::Literal::Number("2".to_string()), 2).unwrap()
        );
        assert_eq!(
            None,
            parse_ordinal(&ast::Literal::Number("1.5".to_string()), 2).unwrap()
        );
    }
}
