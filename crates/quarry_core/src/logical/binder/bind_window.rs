use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::trace;

use super::bind_context::BindContext;
use super::column_binder::ExpressionColumnBinder;
use super::expr_binder::{BaseExpressionBinder, RecursionContext, scalar_call};
use crate::expr::cast_expr::check_type;
use crate::expr::literal_expr::LiteralExpr;
use crate::expr::window_expr::{
    WindowExpr,
    WindowFrame,
    WindowFrameBound,
    WindowFrameExclusion,
    WindowFrameUnit,
};
use crate::expr::{self, Expression};
use crate::functions::builtin::internal::{FUNCTION_SET_DIFF, FUNCTION_SET_WINDOW_BOUND};
use crate::functions::implicit::ImplicitCastConfig;
use crate::functions::resolve::{no_matching_overload, resolve_in_set};
use crate::functions::{FunctionKind, FunctionSet};
use crate::logical::logical_order::OrderByExpr;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// A window definition with any named window references resolved.
#[derive(Debug)]
struct ResolvedWindow<'a> {
    partition_by: &'a [ast::Expr],
    order_by: &'a [ast::OrderByNode],
    frame: Option<&'a ast::WindowFrame>,
}

impl<'a> BaseExpressionBinder<'a> {
    pub(crate) fn bind_window_function(
        &self,
        bind_context: &mut BindContext,
        set: &'static FunctionSet,
        func: &ast::Function,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        if !recur.allow_windows || recur.in_aggregate {
            return Err(DbError::invalid_input(format!(
                "Window functions are only allowed in the select list, found '{}' in {}",
                set.name, recur.clause
            )));
        }
        if !matches!(set.kind, FunctionKind::Window | FunctionKind::Aggregate) {
            return Err(DbError::invalid_input(format!(
                "'{}' is not an aggregate or window function",
                set.name
            )));
        }
        if func.distinct || func.filter.is_some() {
            return Err(DbError::unsupported(
                "DISTINCT and FILTER are not supported for window functions",
            ));
        }

        let spec = match &func.over {
            Some(spec) => spec,
            None => return Err(DbError::new("Window function missing OVER")),
        };
        let window = self.resolve_window(spec)?;

        let recur = RecursionContext {
            allow_windows: false,
            ..recur.nested()
        };

        let inputs = self.bind_function_args(bind_context, func, column_binder, recur)?;
        let types: Vec<_> = inputs.iter().map(|e| e.datatype()).collect();
        let agg = resolve_in_set(set, &types, ImplicitCastConfig::FUNCTION)?
            .ok_or_else(|| no_matching_overload(set, &types))?
            .plan(inputs)?;

        let partition_by =
            self.bind_expressions(bind_context, window.partition_by, column_binder, recur)?;
        let order_by = window
            .order_by
            .iter()
            .map(|node| {
                let expr = self.bind_expression(bind_context, &node.expr, column_binder, recur)?;
                let desc = matches!(node.typ, Some(ast::OrderByType::Desc));
                let nulls_first = node.nulls.map(|n| n == ast::OrderByNulls::First);
                Ok(OrderByExpr::new(expr, desc, nulls_first))
            })
            .collect::<Result<Vec<_>>>()?;

        let frame = match window.frame {
            Some(frame) => {
                self.bind_frame(bind_context, frame, &order_by, column_binder, recur)?
            }
            None if order_by.is_empty() => WindowFrame::default_unordered(),
            None => WindowFrame::default_ordered(),
        };

        let partition_diff = diff_chain(None, &partition_by)?;
        let order_keys: Vec<_> = order_by.iter().map(|o| o.expr.clone()).collect();
        let order_diff = diff_chain(partition_diff.clone(), &order_keys)?;

        // Frame bounds are computed relative to the finest boundary we have.
        let boundary = order_diff
            .clone()
            .or_else(|| partition_diff.clone())
            .unwrap_or_else(|| expr::lit(false));
        let frame_start = window_bound(&boundary, frame.unit, &frame.start)?;
        let frame_end = window_bound(&boundary, frame.unit, &frame.end)?;

        trace!(
            function = agg.name,
            unit = %frame.unit,
            partitions = partition_by.len(),
            orderings = order_by.len(),
            "bound window function"
        );

        Ok(Expression::Window(WindowExpr {
            agg,
            partition_by,
            order_by,
            frame,
            partition_diff: partition_diff.map(Box::new),
            order_diff: if order_keys.is_empty() {
                None
            } else {
                order_diff.map(Box::new)
            },
            frame_start: Box::new(frame_start),
            frame_end: Box::new(frame_end),
        }))
    }

    fn find_named_window(&self, name: &ast::Ident) -> Result<&'a ast::WindowDefinition> {
        let normalized = name.as_normalized_string();
        self.named_windows
            .iter()
            .find(|w| w.name.as_normalized_string() == normalized)
            .map(|w| &w.definition)
            .ok_or_else(|| {
                DbError::not_found(format!("Missing window definition '{normalized}'"))
                    .with_field("window", normalized)
            })
    }

    fn resolve_window<'b>(&self, spec: &'b ast::WindowSpec) -> Result<ResolvedWindow<'b>>
    where
        'a: 'b,
    {
        let def = match spec {
            ast::WindowSpec::Named(name) => self.find_named_window(name)?,
            ast::WindowSpec::Definition(def) => def,
        };

        let mut resolved = ResolvedWindow {
            partition_by: &def.partition_by,
            order_by: &def.order_by,
            frame: def.frame.as_ref(),
        };

        if let Some(existing) = &def.existing {
            let base = self.find_named_window(existing)?;
            if !def.partition_by.is_empty() && !base.partition_by.is_empty() {
                return Err(DbError::invalid_input(format!(
                    "Cannot override PARTITION BY of window '{}'",
                    existing.as_normalized_string()
                )));
            }
            if resolved.partition_by.is_empty() {
                resolved.partition_by = &base.partition_by;
            }
            if resolved.order_by.is_empty() {
                resolved.order_by = &base.order_by;
            }
            if resolved.frame.is_none() {
                resolved.frame = base.frame.as_ref();
            }
        }

        Ok(resolved)
    }

    fn bind_frame(
        &self,
        bind_context: &mut BindContext,
        frame: &ast::WindowFrame,
        order_by: &[OrderByExpr],
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<WindowFrame> {
        let unit = match frame.unit {
            ast::WindowFrameUnit::Rows => WindowFrameUnit::Rows,
            ast::WindowFrameUnit::Range => WindowFrameUnit::Range,
            ast::WindowFrameUnit::Groups => WindowFrameUnit::Groups,
        };

        if unit == WindowFrameUnit::Groups && order_by.is_empty() {
            return Err(DbError::invalid_input("GROUPS frames require an ORDER BY"));
        }

        let start = self.bind_frame_bound(bind_context, unit, &frame.start, order_by, column_binder, recur)?;
        let end = match &frame.end {
            Some(end) => self.bind_frame_bound(bind_context, unit, end, order_by, column_binder, recur)?,
            None => WindowFrameBound::CurrentRow,
        };

        if matches!(start, WindowFrameBound::UnboundedFollowing) {
            return Err(DbError::invalid_input(
                "Frame start cannot be UNBOUNDED FOLLOWING",
            ));
        }
        if matches!(end, WindowFrameBound::UnboundedPreceding) {
            return Err(DbError::invalid_input(
                "Frame end cannot be UNBOUNDED PRECEDING",
            ));
        }
        if start.rank() > end.rank() {
            return Err(DbError::invalid_input(
                "Frame starting from a later position cannot end at an earlier one",
            ));
        }

        let exclusion = match frame.exclusion {
            Some(ast::WindowFrameExclusion::CurrentRow) => WindowFrameExclusion::CurrentRow,
            Some(ast::WindowFrameExclusion::Group) => WindowFrameExclusion::Group,
            Some(ast::WindowFrameExclusion::Ties) => WindowFrameExclusion::Ties,
            Some(ast::WindowFrameExclusion::NoOthers) | None => WindowFrameExclusion::NoOthers,
        };

        Ok(WindowFrame {
            unit,
            start,
            end,
            exclusion,
        })
    }

    fn bind_frame_bound(
        &self,
        bind_context: &mut BindContext,
        unit: WindowFrameUnit,
        bound: &ast::WindowFrameBound,
        order_by: &[OrderByExpr],
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<WindowFrameBound> {
        let (offset, preceding) = match bound {
            ast::WindowFrameBound::CurrentRow => return Ok(WindowFrameBound::CurrentRow),
            ast::WindowFrameBound::UnboundedPreceding => {
                return Ok(WindowFrameBound::UnboundedPreceding);
            }
            ast::WindowFrameBound::UnboundedFollowing => {
                return Ok(WindowFrameBound::UnboundedFollowing);
            }
            ast::WindowFrameBound::Preceding(offset) => (offset, true),
            ast::WindowFrameBound::Following(offset) => (offset, false),
        };

        let offset = self.bind_expression(bind_context, offset, column_binder, recur)?;
        if !offset.is_constant() {
            return Err(DbError::invalid_input("Frame offsets must be constant"));
        }
        if is_negative_literal(&offset) {
            return Err(DbError::invalid_input("Frame offsets cannot be negative"));
        }

        let offset = match unit {
            WindowFrameUnit::Rows | WindowFrameUnit::Groups => check_type(&DataType::Int64, offset)?,
            WindowFrameUnit::Range => {
                let order_type = match order_by {
                    [order] => order.expr.datatype(),
                    _ => {
                        return Err(DbError::invalid_input(
                            "RANGE frames with an offset require exactly one ORDER BY column",
                        ));
                    }
                };
                if order_type.is_numeric() {
                    check_type(&order_type, offset)?
                } else if order_type.is_temporal() {
                    if !matches!(offset.datatype(), DataType::Interval(_)) {
                        return Err(DbError::type_mismatch(format!(
                            "RANGE offsets over {order_type} must be intervals, got {}",
                            offset.datatype()
                        )));
                    }
                    offset
                } else {
                    return Err(DbError::type_mismatch(format!(
                        "RANGE frames with an offset cannot order by {order_type}"
                    )));
                }
            }
        };

        Ok(if preceding {
            WindowFrameBound::Preceding(Box::new(offset))
        } else {
            WindowFrameBound::Following(Box::new(offset))
        })
    }
}

fn is_negative_literal(expr: &Expression) -> bool {
    let literal = match expr {
        Expression::Literal(LiteralExpr { literal }) => literal,
        _ => return false,
    };
    match literal {
        ScalarValue::Float32(v) => *v < 0.0,
        ScalarValue::Float64(v) => *v < 0.0,
        ScalarValue::Decimal64(_, v) => *v < 0,
        ScalarValue::Decimal128(_, v) => *v < 0,
        ScalarValue::Interval(_, v) => v.months < 0 || v.days < 0 || v.micros < 0,
        other => other.try_as_i64().map(|v| v < 0).unwrap_or(false),
    }
}

/// Chain `diff` calls over the keys, each continuing from the previous.
fn diff_chain(start: Option<Expression>, keys: &[Expression]) -> Result<Option<Expression>> {
    keys.iter().try_fold(start, |prev, key| {
        let inputs = match prev {
            Some(prev) => vec![prev, key.clone()],
            None => vec![key.clone()],
        };
        scalar_call(&FUNCTION_SET_DIFF, inputs).map(Some)
    })
}

fn window_bound(boundary: &Expression, unit: WindowFrameUnit, bound: &WindowFrameBound) -> Result<Expression> {
    let offset = bound
        .offset()
        .cloned()
        .unwrap_or_else(|| expr::lit(0_i64));
    scalar_call(
        &FUNCTION_SET_WINDOW_BOUND,
        vec![
            boundary.clone(),
            expr::lit(unit.code()),
            expr::lit(bound.code()),
            offset,
        ],
    )
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::compile::CompileContext;
    use crate::config::compile::CompileConfig;
    use crate::config::session::GlobalVariables;
    use crate::logical::binder::bind_context::TableAlias;
    use crate::logical::binder::column_binder::DefaultColumnBinder;
    use crate::logical::binder::expr_binder::BindClause;
    use crate::logical::binder::scope_stack::FrameKind;

    fn ident(s: &str) -> ast::Expr {
        ast::Expr::Ident(ast::Ident::new(s))
    }

    fn window_call(name: &str, args: Vec<ast::Expr>, def: ast::WindowDefinition) -> ast::Expr {
        ast::Expr::Function(Box::new(ast::Function {
            reference: ast::ObjectReference::from(name),
            args: args
                .into_iter()
                .map(|arg| ast::FunctionArg::Unnamed {
                    arg: ast::FunctionArgExpr::Expr(arg),
                })
                .collect(),
            distinct: false,
            filter: None,
            over: Some(ast::WindowSpec::Definition(def)),
        }))
    }

    fn definition(
        partition_by: Vec<ast::Expr>,
        order_by: Vec<ast::Expr>,
        frame: Option<ast::WindowFrame>,
    ) -> ast::WindowDefinition {
        ast::WindowDefinition {
            existing: None,
            partition_by,
            order_by: order_by.into_iter().map(ast::OrderByNode::asc).collect(),
            frame,
        }
    }

    fn bind(expr: &ast::Expr, clause: BindClause) -> Result<Expression> {
        let catalog = MemoryCatalog::new();
        let session = MemoryCatalog::superuser_session();
        let config = CompileConfig::default();
        let globals = GlobalVariables::default();
        let ctx = CompileContext::new(&catalog, &session, &config, &globals);

        let mut bind_context = BindContext::new();
        let root = bind_context.root_scope_ref();
        bind_context.push_table(
            root,
            Some(TableAlias::new(None, "t")),
            vec![DataType::Int32, DataType::Int64, DataType::Date32],
            vec!["a".to_string(), "b".to_string(), "d".to_string()],
        )?;

        bind_context.with_frame(FrameKind::Statement, "test", |bind_context| {
            BaseExpressionBinder::new(root, &ctx).bind_expression(
                bind_context,
                expr,
                &mut DefaultColumnBinder,
                RecursionContext::new(clause),
            )
        })
    }

    #[test]
    fn row_number_default_frame() {
        let expr = window_call(
            "row_number",
            Vec::new(),
            definition(vec![ident("a")], vec![ident("b")], None),
        );
        let window = match bind(&expr, BindClause::Select).unwrap() {
            Expression::Window(window) => window,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(WindowFrame::default_ordered(), window.frame);
        assert!(window.partition_diff.is_some());
        assert!(window.order_diff.is_some());
    }

    #[test]
    fn unordered_sum_uses_whole_partition() {
        let expr = window_call("sum", vec![ident("b")], definition(Vec::new(), Vec::new(), None));
        let window = match bind(&expr, BindClause::Select).unwrap() {
            Expression::Window(window) => window,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(WindowFrame::default_unordered(), window.frame);
        assert!(window.partition_diff.is_none());
        assert!(window.order_diff.is_none());
    }

    #[test]
    fn window_outside_select_list() {
        let expr = window_call("row_number", Vec::new(), definition(Vec::new(), Vec::new(), None));
        let err = bind(&expr, BindClause::Where).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn frame_start_after_end() {
        let frame = ast::WindowFrame {
            unit: ast::WindowFrameUnit::Rows,
            start: ast::WindowFrameBound::CurrentRow,
            end: Some(ast::WindowFrameBound::Preceding(Box::new(ast::Expr::Literal(
                ast::Literal::Number("1".to_string()),
            )))),
            exclusion: None,
        };
        let expr = window_call("sum", vec![ident("b")], definition(Vec::new(), vec![ident("b")], Some(frame)));
        bind(&expr, BindClause::Select).unwrap_err();
    }

    #[test]
    fn range_over_date_needs_interval() {
        let frame = |offset: ast::Expr| ast::WindowFrame {
            unit: ast::WindowFrameUnit::Range,
            start: ast::WindowFrameBound::Preceding(Box::new(offset)),
            end: None,
            exclusion: Some(ast::WindowFrameExclusion::Ties),
        };

        let expr = window_call(
            "sum",
            vec![ident("b")],
            definition(
                Vec::new(),
                vec![ident("d")],
                Some(frame(ast::Expr::Literal(ast::Literal::Number("3".to_string())))),
            ),
        );
        let err = bind(&expr, BindClause::Select).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());

        let expr = window_call(
            "sum",
            vec![ident("b")],
            definition(
                Vec::new(),
                vec![ident("d")],
                Some(frame(ast::Expr::Literal(ast::Literal::Interval {
                    value: "3".to_string(),
                    qualifier: ast::IntervalQualifier {
                        leading: ast::IntervalUnit::Day,
                        trailing: None,
                    },
                }))),
            ),
        );
        let window = match bind(&expr, BindClause::Select).unwrap() {
            Expression::Window(window) => window,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(WindowFrameExclusion::Ties, window.frame.exclusion);
    }

    #[test]
    fn groups_requires_order() {
        let frame = ast::WindowFrame {
            unit: ast::WindowFrameUnit::Groups,
            start: ast::WindowFrameBound::UnboundedPreceding,
            end: None,
            exclusion: None,
        };
        let expr = window_call("sum", vec![ident("b")], definition(Vec::new(), Vec::new(), Some(frame)));
        bind(&expr, BindClause::Select).unwrap_err();
    }

    #[test]
    fn window_node_summarises_each_window() {
        let ordered = window_call(
            "row_number",
            Vec::new(),
            definition(vec![ident("a")], vec![ident("b"), ident("d")], None),
        );
        let whole = window_call("sum", vec![ident("b")], definition(Vec::new(), Vec::new(), None));
        let node = crate::logical::logical_window::LogicalWindow {
            windows: vec![
                bind(&ordered, BindClause::Select).unwrap(),
                bind(&whole, BindClause::Select).unwrap(),
            ],
            windows_table: crate::logical::binder::bind_context::TableRef { table_idx: 9 },
        };
        assert_eq!(
            vec!["RANGE partitions=1 order=2".to_string(), "ROWS partitions=0 order=0".to_string()],
            node.window_shapes()
        );
    }
}
