//! Bound scalar expressions.
//!
//! Every expression carries its resolved type. Expressions form owned trees,
//! rewrites build new nodes rather than patching shared ones.
pub mod aggregate_expr;
pub mod cast_expr;
pub mod column_expr;
pub mod comparison_expr;
pub mod in_list_expr;
pub mod literal_expr;
pub mod scalar_function_expr;
pub mod subquery_expr;
pub mod variable_expr;
pub mod window_expr;

use std::collections::BTreeSet;
use std::fmt;

use aggregate_expr::AggregateExpr;
use cast_expr::CastExpr;
use column_expr::{ColumnExpr, ColumnReference};
use comparison_expr::{ComparisonExpr, ComparisonOperator};
use in_list_expr::InListExpr;
use literal_expr::LiteralExpr;
use quarry_error::{DbError, Result};
use scalar_function_expr::ScalarFunctionExpr;
use subquery_expr::{SubqueryExpr, SubqueryType};
use variable_expr::{ParameterExpr, ValuesExpr, VariableExpr};
use window_expr::WindowExpr;

use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::functions::builtin::boolean::{FUNCTION_SET_AND, FUNCTION_SET_NOT, FUNCTION_SET_OR};
use crate::functions::builtin::find_builtin;
use crate::functions::resolve::plan_builtin;
use crate::logical::binder::bind_context::TableRef;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(ColumnExpr),
    Literal(LiteralExpr),
    Cast(CastExpr),
    /// Operator and function calls, including AND/OR/NOT.
    ScalarFunction(ScalarFunctionExpr),
    Aggregate(AggregateExpr),
    Window(WindowExpr),
    Comparison(ComparisonExpr),
    InList(InListExpr),
    Subquery(SubqueryExpr),
    Values(ValuesExpr),
    Variable(VariableExpr),
    Parameter(ParameterExpr),
}

impl Expression {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Column(expr) => expr.datatype.clone(),
            Self::Literal(expr) => expr.datatype(),
            Self::Cast(expr) => expr.to.clone(),
            Self::ScalarFunction(expr) => expr.function.return_type.clone(),
            Self::Aggregate(expr) => expr.agg.return_type.clone(),
            Self::Window(expr) => expr.agg.return_type.clone(),
            Self::Comparison(_) | Self::InList(_) => DataType::Boolean,
            Self::Subquery(expr) => expr.return_type.clone(),
            Self::Values(expr) => expr.datatype(),
            Self::Variable(expr) => expr.datatype.clone(),
            Self::Parameter(expr) => expr.datatype.clone(),
        }
    }

    /// Visit the direct children of this expression.
    ///
    /// Plans inside subqueries are not visited, only the expressions the
    /// subquery is compared against.
    pub fn for_each_child<F>(&self, func: &mut F) -> Result<()>
    where
        F: FnMut(&Expression) -> Result<()>,
    {
        match self {
            Self::Column(_) | Self::Literal(_) | Self::Variable(_) | Self::Parameter(_) => (),
            Self::Cast(expr) => func(&expr.expr)?,
            Self::ScalarFunction(expr) => {
                for input in &expr.function.inputs {
                    func(input)?;
                }
            }
            Self::Aggregate(expr) => {
                for input in &expr.agg.inputs {
                    func(input)?;
                }
                if let Some(filter) = &expr.filter {
                    func(filter)?;
                }
            }
            Self::Window(expr) => {
                for input in &expr.agg.inputs {
                    func(input)?;
                }
                for part in &expr.partition_by {
                    func(part)?;
                }
                for order in &expr.order_by {
                    func(&order.expr)?;
                }
                if let Some(diff) = &expr.partition_diff {
                    func(diff)?;
                }
                if let Some(diff) = &expr.order_diff {
                    func(diff)?;
                }
                func(&expr.frame_start)?;
                func(&expr.frame_end)?;
            }
            Self::Comparison(expr) => {
                func(&expr.left)?;
                func(&expr.right)?;
            }
            Self::InList(expr) => {
                func(&expr.expr)?;
                for item in &expr.list {
                    func(item)?;
                }
            }
            Self::Subquery(expr) => match &expr.subquery_type {
                SubqueryType::Any { expr, .. } | SubqueryType::All { expr, .. } => func(expr)?,
                _ => (),
            },
            Self::Values(expr) => {
                for value in &expr.values {
                    func(value)?;
                }
            }
        }
        Ok(())
    }

    pub fn for_each_child_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Expression) -> Result<()>,
    {
        match self {
            Self::Column(_) | Self::Literal(_) | Self::Variable(_) | Self::Parameter(_) => (),
            Self::Cast(expr) => func(&mut expr.expr)?,
            Self::ScalarFunction(expr) => {
                for input in &mut expr.function.inputs {
                    func(input)?;
                }
            }
            Self::Aggregate(expr) => {
                for input in &mut expr.agg.inputs {
                    func(input)?;
                }
                if let Some(filter) = &mut expr.filter {
                    func(filter)?;
                }
            }
            Self::Window(expr) => {
                for input in &mut expr.agg.inputs {
                    func(input)?;
                }
                for part in &mut expr.partition_by {
                    func(part)?;
                }
                for order in &mut expr.order_by {
                    func(&mut order.expr)?;
                }
                if let Some(diff) = &mut expr.partition_diff {
                    func(diff)?;
                }
                if let Some(diff) = &mut expr.order_diff {
                    func(diff)?;
                }
                func(&mut expr.frame_start)?;
                func(&mut expr.frame_end)?;
            }
            Self::Comparison(expr) => {
                func(&mut expr.left)?;
                func(&mut expr.right)?;
            }
            Self::InList(expr) => {
                func(&mut expr.expr)?;
                for item in &mut expr.list {
                    func(item)?;
                }
            }
            Self::Subquery(expr) => match &mut expr.subquery_type {
                SubqueryType::Any { expr, .. } | SubqueryType::All { expr, .. } => func(expr)?,
                _ => (),
            },
            Self::Values(expr) => {
                for value in &mut expr.values {
                    func(value)?;
                }
            }
        }
        Ok(())
    }

    fn any(&self, pred: &impl Fn(&Expression) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        // Closure never errors.
        let _ = self.for_each_child(&mut |child| {
            found = found || child.any(pred);
            Ok(())
        });
        found
    }

    pub fn contains_aggregate(&self) -> bool {
        self.any(&|e| matches!(e, Expression::Aggregate(_)))
    }

    pub fn contains_window(&self) -> bool {
        self.any(&|e| matches!(e, Expression::Window(_)))
    }

    pub fn contains_subquery(&self) -> bool {
        self.any(&|e| matches!(e, Expression::Subquery(_)))
    }

    /// If this expression references any columns from an outer scope, either
    /// directly or through a correlated subquery.
    pub fn is_correlated(&self) -> bool {
        self.any(&|e| match e {
            Expression::Column(col) => col.depth > 0,
            Expression::Subquery(sub) => sub.is_correlated(),
            _ => false,
        })
    }

    /// Expression can be evaluated once without any input rows.
    pub fn is_constant(&self) -> bool {
        !self.any(&|e| {
            matches!(
                e,
                Expression::Column(_)
                    | Expression::Aggregate(_)
                    | Expression::Window(_)
                    | Expression::Subquery(_)
            )
        })
    }

    /// Collect column references at the given depth, not descending into
    /// subquery plans.
    pub fn column_references_at(&self, depth: usize) -> Vec<ColumnReference> {
        let mut out = Vec::new();
        self.collect_columns(depth, &mut out);
        out
    }

    fn collect_columns(&self, depth: usize, out: &mut Vec<ColumnReference>) {
        if let Expression::Column(col) = self {
            if col.depth == depth {
                out.push(col.reference);
            }
            return;
        }
        let _ = self.for_each_child(&mut |child| {
            child.collect_columns(depth, out);
            Ok(())
        });
    }

    /// Tables referenced by local (depth 0) columns.
    pub fn get_table_references(&self) -> BTreeSet<TableRef> {
        self.column_references_at(0)
            .into_iter()
            .map(|c| c.table_scope)
            .collect()
    }

    pub fn is_column(&self) -> bool {
        matches!(self, Expression::Column(_))
    }

    /// Split a chain of ANDs into its conjuncts.
    pub fn split_conjunction(self) -> Vec<Expression> {
        let mut out = Vec::new();
        self.split_conjunction_into(&mut out);
        out
    }

    fn split_conjunction_into(self, out: &mut Vec<Expression>) {
        match self {
            Expression::ScalarFunction(func) if func.function.name == FUNCTION_SET_AND.name => {
                for input in func.function.inputs {
                    input.split_conjunction_into(out);
                }
            }
            other => out.push(other),
        }
    }

    /// Combine expressions with AND. Returns None for an empty input.
    pub fn and_all(exprs: impl IntoIterator<Item = Expression>) -> Result<Option<Expression>> {
        let mut exprs: Vec<_> = exprs.into_iter().collect();
        match exprs.len() {
            0 => Ok(None),
            1 => Ok(exprs.pop()),
            _ => Ok(Some(Expression::ScalarFunction(ScalarFunctionExpr {
                function: plan_builtin(&FUNCTION_SET_AND, exprs)?,
            }))),
        }
    }

    pub fn or_all(exprs: impl IntoIterator<Item = Expression>) -> Result<Option<Expression>> {
        let mut exprs: Vec<_> = exprs.into_iter().collect();
        match exprs.len() {
            0 => Ok(None),
            1 => Ok(exprs.pop()),
            _ => Ok(Some(Expression::ScalarFunction(ScalarFunctionExpr {
                function: plan_builtin(&FUNCTION_SET_OR, exprs)?,
            }))),
        }
    }

    /// Build the logical negation of this expression.
    ///
    /// Produces a new tree. Negations are pushed down where an equivalent
    /// form exists (comparisons, IN lists, De Morgan over AND/OR) and
    /// double negations cancel.
    pub fn negate(self) -> Result<Expression> {
        Ok(match self {
            Expression::Comparison(cmp) => Expression::Comparison(ComparisonExpr {
                left: cmp.left,
                right: cmp.right,
                op: cmp.op.negate(),
            }),
            Expression::InList(list) => Expression::InList(InListExpr {
                expr: list.expr,
                list: list.list,
                negated: !list.negated,
            }),
            Expression::Literal(LiteralExpr {
                literal: ScalarValue::Boolean(b),
            }) => lit(!b),
            Expression::Subquery(sub) => {
                let subquery_type = match sub.subquery_type {
                    SubqueryType::Exists { negated } => SubqueryType::Exists { negated: !negated },
                    SubqueryType::Any { expr, op } => SubqueryType::All {
                        expr,
                        op: op.negate(),
                    },
                    SubqueryType::All { expr, op } => SubqueryType::Any {
                        expr,
                        op: op.negate(),
                    },
                    SubqueryType::Scalar => {
                        return not(Expression::Subquery(SubqueryExpr {
                            subquery_type: SubqueryType::Scalar,
                            ..sub
                        }));
                    }
                };
                Expression::Subquery(SubqueryExpr {
                    subquery_type,
                    ..sub
                })
            }
            Expression::ScalarFunction(mut func) => {
                let name = func.function.name;
                if name == FUNCTION_SET_NOT.name {
                    return func
                        .function
                        .inputs
                        .pop()
                        .ok_or_else(|| DbError::new("NOT without an input"));
                }
                if name == FUNCTION_SET_AND.name || name == FUNCTION_SET_OR.name {
                    let negated = func
                        .function
                        .inputs
                        .into_iter()
                        .map(|input| input.negate())
                        .collect::<Result<Vec<_>>>()?;
                    return Ok(if name == FUNCTION_SET_AND.name {
                        Expression::ScalarFunction(ScalarFunctionExpr {
                            function: plan_builtin(&FUNCTION_SET_OR, negated)?,
                        })
                    } else {
                        Expression::ScalarFunction(ScalarFunctionExpr {
                            function: plan_builtin(&FUNCTION_SET_AND, negated)?,
                        })
                    });
                }
                match negated_predicate(name).and_then(find_builtin) {
                    Some(set) => {
                        func.function.name = set.name;
                        Expression::ScalarFunction(func)
                    }
                    None => not(Expression::ScalarFunction(func))?,
                }
            }
            other => not(other)?,
        })
    }
}

/// Pairs of IS predicates negating each other.
fn negated_predicate(name: &str) -> Option<&'static str> {
    Some(match name {
        "is_null" => "is_not_null",
        "is_not_null" => "is_null",
        "is_true" => "is_not_true",
        "is_not_true" => "is_true",
        "is_false" => "is_not_false",
        "is_not_false" => "is_false",
        _ => return None,
    })
}

/// Wrap in a NOT call.
pub fn not(expr: Expression) -> Result<Expression> {
    Ok(Expression::ScalarFunction(ScalarFunctionExpr {
        function: plan_builtin(&FUNCTION_SET_NOT, vec![expr])?,
    }))
}

pub fn lit(value: impl Into<ScalarValue>) -> Expression {
    Expression::Literal(LiteralExpr::new(value))
}

pub fn column(reference: ColumnReference, datatype: DataType) -> Expression {
    Expression::Column(ColumnExpr::new(reference, datatype))
}

/// Build a comparison. Operands must already share a type.
pub fn compare(op: ComparisonOperator, left: Expression, right: Expression) -> Expression {
    Expression::Comparison(ComparisonExpr {
        left: Box::new(left),
        right: Box::new(right),
        op,
    })
}

impl From<ColumnExpr> for Expression {
    fn from(value: ColumnExpr) -> Self {
        Expression::Column(value)
    }
}

impl From<LiteralExpr> for Expression {
    fn from(value: LiteralExpr) -> Self {
        Expression::Literal(value)
    }
}

impl From<CastExpr> for Expression {
    fn from(value: CastExpr) -> Self {
        Expression::Cast(value)
    }
}

impl From<ScalarFunctionExpr> for Expression {
    fn from(value: ScalarFunctionExpr) -> Self {
        Expression::ScalarFunction(value)
    }
}

impl From<AggregateExpr> for Expression {
    fn from(value: AggregateExpr) -> Self {
        Expression::Aggregate(value)
    }
}

impl From<SubqueryExpr> for Expression {
    fn from(value: SubqueryExpr) -> Self {
        Expression::Subquery(value)
    }
}

impl ContextDisplay for Expression {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Column(expr) => expr.fmt_using_context(mode, f),
            Self::Literal(expr) => expr.fmt_using_context(mode, f),
            Self::Cast(expr) => expr.fmt_using_context(mode, f),
            Self::ScalarFunction(expr) => expr.fmt_using_context(mode, f),
            Self::Aggregate(expr) => expr.fmt_using_context(mode, f),
            Self::Window(expr) => expr.fmt_using_context(mode, f),
            Self::Comparison(expr) => expr.fmt_using_context(mode, f),
            Self::InList(expr) => expr.fmt_using_context(mode, f),
            Self::Subquery(expr) => expr.fmt_using_context(mode, f),
            Self::Values(expr) => expr.fmt_using_context(mode, f),
            Self::Variable(expr) => expr.fmt_using_context(mode, f),
            Self::Parameter(expr) => expr.fmt_using_context(mode, f),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            ContextDisplayWrapper::with_mode(self, ContextDisplayMode::Raw)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::column_expr::ColumnReference;

    fn col(table: usize, column: usize, datatype: DataType) -> Expression {
        super::column(
            ColumnReference::new(TableRef::from(table), column),
            datatype,
        )
    }

    #[test]
    fn negate_comparison() {
        let expr = compare(
            ComparisonOperator::Lt,
            col(0, 0, DataType::Int32),
            lit(4_i32),
        );
        let negated = expr.clone().negate().unwrap();
        assert_eq!(
            compare(
                ComparisonOperator::GtEq,
                col(0, 0, DataType::Int32),
                lit(4_i32),
            ),
            negated
        );
        // Negation doesn't touch the original.
        assert!(matches!(
            expr,
            Expression::Comparison(ComparisonExpr {
                op: ComparisonOperator::Lt,
                ..
            })
        ));
    }

    #[test]
    fn negate_not_cancels() {
        let inner = col(0, 0, DataType::Boolean);
        let expr = not(inner.clone()).unwrap();
        assert_eq!(inner, expr.negate().unwrap());
    }

    #[test]
    fn negate_and_de_morgan() {
        let a = compare(ComparisonOperator::Eq, col(0, 0, DataType::Int32), lit(1_i32));
        let b = col(0, 1, DataType::Boolean);
        let expr = Expression::and_all([a, b]).unwrap().unwrap();

        let negated = expr.negate().unwrap();
        match negated {
            Expression::ScalarFunction(func) => {
                assert_eq!("or", func.function.name);
                assert!(matches!(
                    &func.function.inputs[0],
                    Expression::Comparison(ComparisonExpr {
                        op: ComparisonOperator::NotEq,
                        ..
                    })
                ));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn negate_is_null() {
        let expr = Expression::ScalarFunction(ScalarFunctionExpr {
            function: plan_builtin(
                &crate::functions::builtin::boolean::FUNCTION_SET_IS_NULL,
                vec![col(0, 0, DataType::Int32)],
            )
            .unwrap(),
        });
        match expr.negate().unwrap() {
            Expression::ScalarFunction(func) => assert_eq!("is_not_null", func.function.name),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn split_nested_conjunction() {
        let a = col(0, 0, DataType::Boolean);
        let b = col(0, 1, DataType::Boolean);
        let c = col(0, 2, DataType::Boolean);
        let inner = Expression::and_all([a.clone(), b.clone()]).unwrap().unwrap();
        let outer = Expression::and_all([inner, c.clone()]).unwrap().unwrap();

        assert_eq!(vec![a, b, c], outer.split_conjunction());
    }

    #[test]
    fn table_references_skip_outer_columns() {
        let local = col(1, 0, DataType::Int32);
        let outer = Expression::Column(
            ColumnExpr::new(ColumnReference::new(TableRef::from(2), 0), DataType::Int32)
                .with_depth(1),
        );
        let expr = compare(ComparisonOperator::Eq, local, outer);

        assert_eq!(
            BTreeSet::from([TableRef::from(1)]),
            expr.get_table_references()
        );
        assert!(expr.is_correlated());
    }
}
