//! Binding of AST expressions into typed expressions.
//!
//! Column lookups go through an [`ExpressionColumnBinder`] first so clause
//! specific binders can layer their own rules on top (select aliases, GROUP BY
//! ordinals). Anything the column binder doesn't resolve falls through to
//! declared variables, outer scopes, and session globals, in that order.
use std::collections::BTreeSet;
use std::fmt;

use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::trace;

use super::bind_context::{BindContext, BindScopeRef, CorrelatedColumn, OuterColumn, Resolution};
use super::bind_literal::bind_literal;
use super::bind_query::plan_subquery;
use super::column_binder::{ExpressionColumnBinder, split_qualified};
use crate::catalog::entry::CatalogEntryKind;
use crate::catalog::missing_entry_error;
use crate::compile::CompileContext;
use crate::expr::aggregate_expr::AggregateExpr;
use crate::expr::cast_expr::{CastExpr, check_type};
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::expr::comparison_expr::ComparisonOperator;
use crate::expr::in_list_expr::InListExpr;
use crate::expr::literal_expr::LiteralExpr;
use crate::expr::scalar_function_expr::ScalarFunctionExpr;
use crate::expr::subquery_expr::{SubqueryExpr, SubqueryType};
use crate::expr::variable_expr::{ParameterExpr, ValuesExpr, VariableExpr};
use crate::expr::{self, Expression};
use crate::functions::builtin::aggregate::FUNCTION_SET_COUNT_STAR;
use crate::functions::builtin::arith::{
    FUNCTION_SET_ADD,
    FUNCTION_SET_BIT_AND,
    FUNCTION_SET_BIT_OR,
    FUNCTION_SET_DIV,
    FUNCTION_SET_MUL,
    FUNCTION_SET_NEGATE,
    FUNCTION_SET_REM,
    FUNCTION_SET_SHL,
    FUNCTION_SET_SHR,
    FUNCTION_SET_SUB,
    FUNCTION_SET_XOR,
};
use crate::functions::builtin::boolean::{
    FUNCTION_SET_IS_FALSE,
    FUNCTION_SET_IS_NOT_FALSE,
    FUNCTION_SET_IS_NOT_NULL,
    FUNCTION_SET_IS_NOT_TRUE,
    FUNCTION_SET_IS_NULL,
    FUNCTION_SET_IS_TRUE,
};
use crate::functions::builtin::conditional::{
    FUNCTION_SET_CASEWHEN,
    FUNCTION_SET_COALESCE,
    FUNCTION_SET_IFTHENELSE,
    FUNCTION_SET_NULLIF,
};
use crate::functions::builtin::internal::{
    FUNCTION_SET_CURRENT_ROLE,
    FUNCTION_SET_CURRENT_SCHEMA,
    FUNCTION_SET_CURRENT_USER,
    FUNCTION_SET_NEXT_VALUE_FOR,
};
use crate::functions::builtin::string::{FUNCTION_SET_CONCAT, FUNCTION_SET_ILIKE, FUNCTION_SET_LIKE};
use crate::functions::decimal::{ArithOp, DecimalOperand, rescale_operands};
use crate::functions::implicit::ImplicitCastConfig;
use crate::functions::resolve::{no_matching_overload, plan_builtin, resolve_in_set};
use crate::functions::{FunctionKind, FunctionSet, PlannedFunction};
use crate::logical::logical_guard::LogicalCardinalityGuard;
use crate::logical::logical_project::LogicalProject;
use crate::logical::operator::{Cardinality, LogicalNode, LogicalOperator, Node};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;
use crate::types::supertype::supertype_of;

/// Clause an expression appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindClause {
    Select,
    Where,
    JoinOn,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Values,
    Set,
    Call,
    Default,
    Check,
    TableFunction,
}

impl fmt::Display for BindClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Select => "SELECT",
            Self::Where => "WHERE",
            Self::JoinOn => "JOIN conditions",
            Self::GroupBy => "GROUP BY",
            Self::Having => "HAVING",
            Self::OrderBy => "ORDER BY",
            Self::Limit => "LIMIT",
            Self::Values => "VALUES",
            Self::Set => "SET",
            Self::Call => "CALL arguments",
            Self::Default => "column defaults",
            Self::Check => "CHECK constraints",
            Self::TableFunction => "table function arguments",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionContext {
    pub clause: BindClause,
    /// Whether to allow aggregates in this expression.
    pub allow_aggregates: bool,
    /// Whether to allow window functions in this expression.
    pub allow_windows: bool,
    /// If we're at the root of the expression being bound.
    pub is_root: bool,
    /// Current nesting depth.
    pub depth: usize,
    /// Inside the arguments of an aggregate.
    pub in_aggregate: bool,
}

impl RecursionContext {
    pub const fn new(clause: BindClause) -> Self {
        let (allow_aggregates, allow_windows) = match clause {
            BindClause::Select => (true, true),
            BindClause::Having | BindClause::OrderBy => (true, false),
            _ => (false, false),
        };
        RecursionContext {
            clause,
            allow_aggregates,
            allow_windows,
            is_root: true,
            depth: 0,
            in_aggregate: false,
        }
    }

    pub const fn not_root(self) -> Self {
        RecursionContext {
            is_root: false,
            ..self
        }
    }

    /// Context for a child expression.
    pub const fn nested(self) -> Self {
        RecursionContext {
            is_root: false,
            depth: self.depth + 1,
            ..self
        }
    }

    /// Context for the arguments of an aggregate.
    const fn aggregate_args(self) -> Self {
        RecursionContext {
            allow_aggregates: false,
            allow_windows: false,
            in_aggregate: true,
            ..self.nested()
        }
    }
}

/// A subquery bound and planned in a child scope.
#[derive(Debug)]
struct PlannedSubquery {
    scope: BindScopeRef,
    plan: LogicalOperator,
    columns: Vec<(ColumnReference, DataType)>,
    correlated: Vec<CorrelatedColumn>,
}

#[derive(Debug, Clone, Copy)]
pub struct BaseExpressionBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
    /// Windows from the WINDOW clause of the select being bound.
    pub named_windows: &'a [ast::NamedWindow],
}

impl<'a> BaseExpressionBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        BaseExpressionBinder {
            current,
            ctx,
            named_windows: &[],
        }
    }

    pub const fn with_named_windows(mut self, windows: &'a [ast::NamedWindow]) -> Self {
        self.named_windows = windows;
        self
    }

    pub fn bind_expressions(
        &self,
        bind_context: &mut BindContext,
        exprs: &[ast::Expr],
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Vec<Expression>> {
        exprs
            .iter()
            .map(|expr| self.bind_expression(bind_context, expr, column_binder, recur))
            .collect()
    }

    pub fn bind_expression(
        &self,
        bind_context: &mut BindContext,
        expr: &ast::Expr,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        if recur.depth > self.ctx.config.max_expression_depth {
            return Err(DbError::resource_exhausted(format!(
                "Expression nested deeper than the max of {}",
                self.ctx.config.max_expression_depth
            ))
            .with_field("max_expression_depth", self.ctx.config.max_expression_depth));
        }

        match expr {
            ast::Expr::Ident(ident) => self.bind_ident(bind_context, ident, column_binder, recur),
            ast::Expr::CompoundIdent(idents) => {
                self.bind_compound_ident(bind_context, idents, column_binder, recur)
            }
            ast::Expr::Literal(literal) => {
                if recur.is_root {
                    if let Some(expr) =
                        column_binder.bind_from_root_literal(self.current, bind_context, literal)?
                    {
                        return Ok(expr);
                    }
                }
                bind_literal(literal, |reference| resolve_named_type(self.ctx, reference))
            }
            ast::Expr::Parameter(param) => self.bind_parameter(bind_context, param),
            ast::Expr::SessionValue(value) => {
                let set = match value {
                    ast::SessionValue::CurrentUser => &FUNCTION_SET_CURRENT_USER,
                    ast::SessionValue::CurrentRole => &FUNCTION_SET_CURRENT_ROLE,
                    ast::SessionValue::CurrentSchema => &FUNCTION_SET_CURRENT_SCHEMA,
                };
                scalar_call(set, Vec::new())
            }
            ast::Expr::Tuple(exprs) => {
                let mut values =
                    self.bind_expressions(bind_context, exprs, column_binder, recur.nested())?;
                if values.len() == 1 {
                    return values
                        .pop()
                        .ok_or_else(|| DbError::new("Missing tuple element"));
                }
                Ok(Expression::Values(ValuesExpr { values }))
            }
            ast::Expr::Nested(inner) => {
                self.bind_expression(bind_context, inner, column_binder, recur.nested())
            }
            ast::Expr::UnaryExpr { op, expr: inner } => {
                let inner = self.bind_expression(bind_context, inner, column_binder, recur.nested())?;
                match op {
                    ast::UnaryOperator::Plus => {
                        if !inner.datatype().is_numeric() && !inner.datatype().is_null() {
                            return Err(DbError::type_mismatch(format!(
                                "Unary plus expects a numeric input, got {}",
                                inner.datatype()
                            )));
                        }
                        Ok(inner)
                    }
                    ast::UnaryOperator::Minus => {
                        if let Expression::Literal(LiteralExpr { literal }) = &inner {
                            if let Some(negated) = literal.try_negate() {
                                return Ok(expr::lit(negated));
                            }
                        }
                        scalar_call(&FUNCTION_SET_NEGATE, vec![inner])
                    }
                    ast::UnaryOperator::Not => expr::not(check_type(&DataType::Boolean, inner)?),
                }
            }
            ast::Expr::BinaryExpr { left, op, right } => {
                self.bind_binary(bind_context, left, *op, right, column_binder, recur)
            }
            ast::Expr::Function(func) => self.bind_function(bind_context, func, column_binder, recur),
            ast::Expr::Case {
                expr: operand,
                conditions,
                results,
                else_expr,
            } => self.bind_case(
                bind_context,
                operand.as_deref(),
                conditions,
                results,
                else_expr.as_deref(),
                column_binder,
                recur,
            ),
            ast::Expr::Cast {
                datatype,
                expr: inner,
                try_cast,
            } => {
                let to = bind_datatype(self.ctx, datatype)?;
                let inner = self.bind_expression(bind_context, inner, column_binder, recur.nested())?;
                let cast = if *try_cast {
                    CastExpr::new_try(inner, to)?
                } else {
                    CastExpr::new(inner, to)?
                };
                Ok(Expression::Cast(cast))
            }
            ast::Expr::InList {
                expr: needle,
                list,
                negated,
            } => self.bind_in_list(bind_context, needle, list, *negated, column_binder, recur),
            ast::Expr::InSubquery {
                expr: needle,
                subquery,
                negated,
            } => {
                let needle = self.bind_expression(bind_context, needle, column_binder, recur.nested())?;
                let (op, quantifier) = if *negated {
                    (ComparisonOperator::NotEq, ast::SubqueryQuantifier::All)
                } else {
                    (ComparisonOperator::Eq, ast::SubqueryQuantifier::Any)
                };
                self.bind_quantified(bind_context, needle, op, quantifier, subquery)
            }
            ast::Expr::QuantifiedSubquery {
                left,
                op,
                quantifier,
                subquery,
            } => {
                let left = self.bind_expression(bind_context, left, column_binder, recur.nested())?;
                let op = ComparisonOperator::try_from_ast(*op)?;
                self.bind_quantified(bind_context, left, op, *quantifier, subquery)
            }
            ast::Expr::Exists {
                subquery,
                not_exists,
            } => {
                let planned = self.plan_subquery(bind_context, subquery)?;
                Ok(Expression::Subquery(SubqueryExpr {
                    bind_scope: planned.scope,
                    subquery: Box::new(planned.plan),
                    subquery_type: SubqueryType::Exists {
                        negated: *not_exists,
                    },
                    return_type: DataType::Boolean,
                    correlated_columns: planned.correlated,
                }))
            }
            ast::Expr::Subquery(subquery) => self.bind_scalar_subquery(bind_context, subquery),
            ast::Expr::Between {
                expr: needle,
                negated,
                symmetric,
                low,
                high,
            } => {
                let needle = self.bind_expression(bind_context, needle, column_binder, recur.nested())?;
                let low = self.bind_expression(bind_context, low, column_binder, recur.nested())?;
                let high = self.bind_expression(bind_context, high, column_binder, recur.nested())?;
                bind_between(needle, low, high, *negated, *symmetric)
            }
            ast::Expr::Like {
                expr: input,
                pattern,
                escape,
                negated,
                case_insensitive,
            } => {
                let mut inputs = vec![
                    self.bind_expression(bind_context, input, column_binder, recur.nested())?,
                    self.bind_expression(bind_context, pattern, column_binder, recur.nested())?,
                ];
                if let Some(escape) = escape {
                    inputs.push(self.bind_expression(
                        bind_context,
                        escape,
                        column_binder,
                        recur.nested(),
                    )?);
                }
                let inputs = inputs
                    .into_iter()
                    .map(coerce_to_string)
                    .collect::<Result<Vec<_>>>()?;

                let set = if *case_insensitive {
                    &FUNCTION_SET_ILIKE
                } else {
                    &FUNCTION_SET_LIKE
                };
                let like = scalar_call(set, inputs)?;
                if *negated { expr::not(like) } else { Ok(like) }
            }
            ast::Expr::IsNull {
                expr: inner,
                negated,
            } => {
                let inner = self.bind_expression(bind_context, inner, column_binder, recur.nested())?;
                let set = if *negated {
                    &FUNCTION_SET_IS_NOT_NULL
                } else {
                    &FUNCTION_SET_IS_NULL
                };
                scalar_call(set, vec![inner])
            }
            ast::Expr::IsBool {
                expr: inner,
                val,
                negated,
            } => {
                let inner = self.bind_expression(bind_context, inner, column_binder, recur.nested())?;
                let inner = check_type(&DataType::Boolean, inner)?;
                let set = match (val, negated) {
                    (true, false) => &FUNCTION_SET_IS_TRUE,
                    (true, true) => &FUNCTION_SET_IS_NOT_TRUE,
                    (false, false) => &FUNCTION_SET_IS_FALSE,
                    (false, true) => &FUNCTION_SET_IS_NOT_FALSE,
                };
                scalar_call(set, vec![inner])
            }
            ast::Expr::IsDistinctFrom {
                left,
                right,
                negated,
            } => {
                let left = self.bind_expression(bind_context, left, column_binder, recur.nested())?;
                let right = self.bind_expression(bind_context, right, column_binder, recur.nested())?;
                let op = if *negated {
                    ComparisonOperator::IsNotDistinctFrom
                } else {
                    ComparisonOperator::IsDistinctFrom
                };
                bind_comparison(left, op, right)
            }
            ast::Expr::NextValueFor(reference) => self.bind_next_value_for(reference),
        }
    }

    fn bind_ident(
        &self,
        bind_context: &mut BindContext,
        ident: &ast::Ident,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        if let Some(expr) = column_binder.bind_from_ident(self.current, bind_context, ident, recur)? {
            return Ok(expr);
        }

        let name = ident.as_normalized_string();
        match bind_context.resolve_name(self.current, None, &name)? {
            Some(Resolution::Variable { datatype }) => Ok(Expression::Variable(VariableExpr {
                name,
                datatype,
                global: false,
            })),
            Some(Resolution::Parameter { datatype }) => {
                Ok(Expression::Parameter(ParameterExpr { name, datatype }))
            }
            Some(Resolution::OuterColumn(outer)) => self.bind_outer_column(bind_context, outer, recur),
            Some(Resolution::Global { datatype }) => Ok(Expression::Variable(VariableExpr {
                name,
                datatype,
                global: true,
            })),
            None => Err(self.missing_column(bind_context, None, &name)),
        }
    }

    fn bind_compound_ident(
        &self,
        bind_context: &mut BindContext,
        idents: &[ast::Ident],
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        if let Some(expr) =
            column_binder.bind_from_idents(self.current, bind_context, idents, recur)?
        {
            return Ok(expr);
        }

        let (alias, column) = split_qualified(idents)?;
        match bind_context.resolve_name(self.current, Some(&alias), &column)? {
            Some(Resolution::OuterColumn(outer)) => self.bind_outer_column(bind_context, outer, recur),
            _ => Err(self.missing_column(bind_context, Some(&alias.to_string()), &column)),
        }
    }

    fn missing_column(&self, bind_context: &BindContext, qualifier: Option<&str>, column: &str) -> DbError {
        let display = match qualifier {
            Some(qualifier) => format!("{qualifier}.{column}"),
            None => column.to_string(),
        };
        let err = match bind_context.suggest_column(self.current, column) {
            Some(similar) => DbError::not_found(format!(
                "Missing column for reference: {display}, did you mean '{similar}'?"
            )),
            None => DbError::not_found(format!("Missing column for reference: {display}")),
        };
        err.with_field("column", display)
    }

    /// Bind a column found in an enclosing scope.
    ///
    /// If the enclosing select is grouped and its select list is being bound,
    /// the reference must be to a grouping expression and is rewritten to the
    /// group column.
    fn bind_outer_column(
        &self,
        bind_context: &mut BindContext,
        outer: OuterColumn,
        recur: RecursionContext,
    ) -> Result<Expression> {
        let datatype = bind_context.get_column(outer.table, outer.col_idx)?.1.clone();
        let local = ColumnExpr::new(ColumnReference::new(outer.table, outer.col_idx), datatype);

        // Found through join scopes only, no subquery boundary crossed.
        if outer.depth == 0 {
            return Ok(Expression::Column(local));
        }

        // Settled once it's known whether the aggregate moves to the outer
        // query.
        if recur.in_aggregate {
            trace!(table = %outer.table, depth = outer.depth, "deferred outer column in aggregate");
            return Ok(Expression::Column(local.with_depth(outer.depth)));
        }

        let column = self.settle_outer_column(bind_context, outer.scope, local, outer.depth)?;
        Ok(Expression::Column(column))
    }

    /// Apply the grouping of `scope` to a column of one of its tables read
    /// `depth` subqueries down, and record the correlation.
    fn settle_outer_column(
        &self,
        bind_context: &mut BindContext,
        scope: BindScopeRef,
        local: ColumnExpr,
        depth: usize,
    ) -> Result<ColumnExpr> {
        let name = bind_context
            .get_column(local.reference.table_scope, local.reference.column)?
            .0
            .to_string();

        let (column, grouped) = match bind_context.get_grouping_mut(scope)? {
            Some(grouping) if grouping.accepting => match grouping.group_table {
                Some(group_table) => {
                    let lookup = Expression::Column(local.clone());
                    match grouping.group_exprs.iter().position(|g| g == &lookup) {
                        Some(pos) => {
                            trace!(%name, depth, "rewrote outer reference to group column");
                            (ColumnExpr::new(ColumnReference::new(group_table, pos), local.datatype), true)
                        }
                        None => {
                            return Err(DbError::group_by_violation(format!(
                                "Subquery uses ungrouped column '{name}' from outer query"
                            ))
                            .with_field("column", name));
                        }
                    }
                }
                None => {
                    if !grouping.ungrouped_outer_refs.contains(&name) {
                        grouping.ungrouped_outer_refs.push(name.clone());
                    }
                    (local, false)
                }
            },
            _ => (local, false),
        };

        if !grouped {
            bind_context.mark_outer_referenced(column.reference.table_scope)?;
        }
        bind_context.push_correlation(
            self.current,
            CorrelatedColumn {
                outer: scope,
                table: column.reference.table_scope,
                col_idx: column.reference.column,
            },
        )?;

        trace!(%name, table = %column.reference.table_scope, depth, "bound outer column");

        Ok(column.with_depth(depth))
    }

    /// Settle the outer columns of an aggregate that stays in this scope.
    ///
    /// The aggregate is computed once per outer row, so its outer columns
    /// follow the outer grouping like any other outer reference.
    fn settle_aggregate_outer_columns(&self, bind_context: &mut BindContext, expr: &mut Expression) -> Result<()> {
        if let Expression::Column(col) = expr {
            if col.depth > 0 {
                let scope = bind_context.ancestor_at_depth(self.current, col.depth)?;
                let local = ColumnExpr::new(col.reference, col.datatype.clone());
                *col = self.settle_outer_column(bind_context, scope, local, col.depth)?;
            }
            return Ok(());
        }
        expr.for_each_child_mut(&mut |child| self.settle_aggregate_outer_columns(bind_context, child))
    }

    fn bind_parameter(&self, bind_context: &mut BindContext, param: &ast::ParameterRef) -> Result<Expression> {
        let name = match param {
            ast::ParameterRef::Positional(idx) => idx.to_string(),
            ast::ParameterRef::Named(name) => name.clone(),
        };

        if let Some(super::scope_stack::ScopeEntry::Parameter { datatype }) =
            bind_context.frames().resolve_local(&name)
        {
            return Ok(Expression::Parameter(ParameterExpr { name, datatype }));
        }

        let datatype = self
            .ctx
            .parameter_types
            .get(&name)
            .cloned()
            .unwrap_or(DataType::Null);
        bind_context
            .frames_mut()
            .declare_parameter(name.clone(), datatype.clone())?;

        Ok(Expression::Parameter(ParameterExpr { name, datatype }))
    }

    fn bind_binary(
        &self,
        bind_context: &mut BindContext,
        left: &ast::Expr,
        op: ast::BinaryOperator,
        right: &ast::Expr,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        use ast::BinaryOperator as Op;

        // Row comparisons compare element wise.
        if let (ast::Expr::Tuple(lefts), ast::Expr::Tuple(rights), Op::Eq | Op::NotEq) =
            (left, right, op)
        {
            if lefts.len() != rights.len() {
                return Err(DbError::arity_mismatch(format!(
                    "Cannot compare rows of {} and {} columns",
                    lefts.len(),
                    rights.len()
                )));
            }
            let cmp_op = ComparisonOperator::try_from_ast(op)?;
            let mut comparisons = Vec::with_capacity(lefts.len());
            for (l, r) in lefts.iter().zip(rights) {
                let l = self.bind_expression(bind_context, l, column_binder, recur.nested())?;
                let r = self.bind_expression(bind_context, r, column_binder, recur.nested())?;
                comparisons.push(bind_comparison(l, cmp_op, r)?);
            }
            let combined = if op == Op::Eq {
                Expression::and_all(comparisons)?
            } else {
                Expression::or_all(comparisons)?
            };
            return combined.ok_or_else(|| DbError::invalid_input("Cannot compare empty rows"));
        }

        let left = self.bind_expression(bind_context, left, column_binder, recur.nested())?;
        let right = self.bind_expression(bind_context, right, column_binder, recur.nested())?;

        match op {
            Op::And | Op::Or => {
                let inputs = vec![
                    check_type(&DataType::Boolean, left)?,
                    check_type(&DataType::Boolean, right)?,
                ];
                let combined = if op == Op::And {
                    Expression::and_all(inputs)?
                } else {
                    Expression::or_all(inputs)?
                };
                combined.ok_or_else(|| DbError::new("Missing boolean inputs"))
            }
            Op::Eq | Op::NotEq | Op::Lt | Op::LtEq | Op::Gt | Op::GtEq => {
                bind_comparison(left, ComparisonOperator::try_from_ast(op)?, right)
            }
            Op::Plus => bind_arith(left, ArithOp::Add, right),
            Op::Minus => bind_arith(left, ArithOp::Sub, right),
            Op::Multiply => bind_arith(left, ArithOp::Mul, right),
            Op::Divide => bind_arith(left, ArithOp::Div, right),
            Op::Modulo => bind_arith(left, ArithOp::Rem, right),
            Op::StringConcat => {
                let inputs = match (left.datatype(), right.datatype()) {
                    (DataType::Binary, DataType::Binary) => vec![left, right],
                    _ => vec![coerce_to_string(left)?, coerce_to_string(right)?],
                };
                scalar_call(&FUNCTION_SET_CONCAT, inputs)
            }
            Op::BitwiseAnd => scalar_call(&FUNCTION_SET_BIT_AND, vec![left, right]),
            Op::BitwiseOr => scalar_call(&FUNCTION_SET_BIT_OR, vec![left, right]),
            Op::BitwiseXor => scalar_call(&FUNCTION_SET_XOR, vec![left, right]),
            Op::ShiftLeft => scalar_call(&FUNCTION_SET_SHL, vec![left, right]),
            Op::ShiftRight => scalar_call(&FUNCTION_SET_SHR, vec![left, right]),
        }
    }

    fn bind_function(
        &self,
        bind_context: &mut BindContext,
        func: &ast::Function,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        let (schema, name) = func.reference.schema_and_name()?;

        // Conditionals coerce across their arguments rather than resolving an
        // overload per argument.
        if schema.is_none() && func.over.is_none() {
            let conditional = match name.as_str() {
                "coalesce" => Some(&FUNCTION_SET_COALESCE),
                "nullif" => Some(&FUNCTION_SET_NULLIF),
                "ifthenelse" => Some(&FUNCTION_SET_IFTHENELSE),
                _ => None,
            };
            if let Some(set) = conditional {
                let args = self.bind_function_args(bind_context, func, column_binder, recur)?;
                return bind_conditional(set, args);
            }
        }

        let (_, entry) = self.ctx.functions().find_set(schema.as_deref(), &name)?;
        let set = entry.set;

        if func.over.is_some() {
            return self.bind_window_function(bind_context, set, func, column_binder, recur);
        }

        match set.kind {
            FunctionKind::Aggregate => self.bind_aggregate(bind_context, set, func, column_binder, recur),
            FunctionKind::Window => Err(DbError::invalid_input(format!(
                "Window function '{name}' requires an OVER clause"
            ))),
            FunctionKind::Scalar | FunctionKind::Filter => {
                if func.distinct || func.filter.is_some() {
                    return Err(DbError::invalid_input(format!(
                        "DISTINCT and FILTER are only valid for aggregates, '{name}' is a {}",
                        set.kind
                    )));
                }
                let args = self.bind_function_args(bind_context, func, column_binder, recur)?;
                let function = plan_in_set(set, args)?;
                Ok(Expression::ScalarFunction(ScalarFunctionExpr { function }))
            }
            other => Err(DbError::invalid_input(format!(
                "Cannot call {other} '{name}' in an expression"
            ))),
        }
    }

    pub(crate) fn bind_function_args(
        &self,
        bind_context: &mut BindContext,
        func: &ast::Function,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Vec<Expression>> {
        func.args
            .iter()
            .map(|arg| {
                let arg = match arg {
                    ast::FunctionArg::Unnamed { arg } => arg,
                    ast::FunctionArg::Named { name, .. } => {
                        return Err(DbError::invalid_input(format!(
                            "Named argument '{name}' is not supported for '{}'",
                            func.reference
                        )));
                    }
                };
                match arg {
                    ast::FunctionArgExpr::Expr(expr) => {
                        self.bind_expression(bind_context, expr, column_binder, recur)
                    }
                    ast::FunctionArgExpr::Wildcard => Err(DbError::invalid_input(format!(
                        "'*' is not a valid argument to '{}'",
                        func.reference
                    ))),
                }
            })
            .collect()
    }

    fn bind_aggregate(
        &self,
        bind_context: &mut BindContext,
        set: &'static FunctionSet,
        func: &ast::Function,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        if recur.in_aggregate {
            return Err(DbError::group_by_violation(
                "Aggregate function calls cannot be nested",
            )
            .with_field("function", set.name));
        }

        let arg_recur = recur.aggregate_args();

        let is_count_star = matches!(
            func.args.as_slice(),
            [ast::FunctionArg::Unnamed {
                arg: ast::FunctionArgExpr::Wildcard
            }]
        ) && set.name == "count";

        let (set, inputs) = if is_count_star {
            (&FUNCTION_SET_COUNT_STAR, Vec::new())
        } else {
            (
                set,
                self.bind_function_args(bind_context, func, column_binder, arg_recur)?,
            )
        };

        let filter = match &func.filter {
            Some(filter) => {
                let filter = self.bind_expression(bind_context, filter, column_binder, arg_recur)?;
                Some(Box::new(check_type(&DataType::Boolean, filter)?))
            }
            None => None,
        };

        let agg = AggregateExpr {
            agg: plan_in_set(set, inputs)?,
            distinct: func.distinct,
            filter,
        };

        if let Some(pushed) = self.try_push_aggregate(bind_context, &agg)? {
            return Ok(pushed);
        }

        if !recur.allow_aggregates {
            return Err(DbError::group_by_violation(format!(
                "Aggregate functions are not allowed in {}",
                recur.clause
            ))
            .with_field("function", set.name));
        }

        let mut agg = Expression::Aggregate(agg);
        self.settle_aggregate_outer_columns(bind_context, &mut agg)?;
        Ok(agg)
    }

    /// Push an aggregate whose columns all come from a single enclosing scope
    /// into that scope's aggregates.
    ///
    /// Only possible while the enclosing select list is being bound. Returns
    /// the column referencing the pushed aggregate.
    fn try_push_aggregate(
        &self,
        bind_context: &mut BindContext,
        agg: &AggregateExpr,
    ) -> Result<Option<Expression>> {
        let mut depths = BTreeSet::new();
        let mut has_subquery = false;
        for input in agg.agg.inputs.iter().chain(agg.filter.as_deref()) {
            collect_column_depths(input, &mut depths)?;
            has_subquery |= input.contains_subquery();
        }

        let depth = match (depths.len(), depths.first()) {
            (1, Some(&depth)) if depth > 0 && !has_subquery => depth,
            _ => return Ok(None),
        };

        let target = bind_context.ancestor_at_depth(self.current, depth)?;
        let agg_table = match bind_context.get_grouping(target)? {
            Some(grouping) if grouping.accepting => grouping.aggregates_table,
            _ => return Ok(None),
        };

        let mut rebased = Expression::Aggregate(agg.clone());
        rebase_depth(&mut rebased, depth)?;
        let datatype = rebased.datatype();

        let col_idx = bind_context.push_column_for_table(agg_table, agg.agg.name, datatype.clone())?;
        if let Some(grouping) = bind_context.get_grouping_mut(target)? {
            grouping.pushed_aggregates.push(rebased);
        }
        bind_context.push_correlation(
            self.current,
            CorrelatedColumn {
                outer: target,
                table: agg_table,
                col_idx,
            },
        )?;

        trace!(function = agg.agg.name, depth, %agg_table, "pushed aggregate into outer query");

        Ok(Some(Expression::Column(ColumnExpr {
            reference: ColumnReference::new(agg_table, col_idx),
            datatype,
            depth,
        })))
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_case(
        &self,
        bind_context: &mut BindContext,
        operand: Option<&ast::Expr>,
        conditions: &[ast::Expr],
        results: &[ast::Expr],
        else_expr: Option<&ast::Expr>,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        if conditions.len() != results.len() || conditions.is_empty() {
            return Err(DbError::invalid_input(
                "CASE requires at least one WHEN with a matching THEN",
            ));
        }

        let operand = match operand {
            Some(operand) => Some(self.bind_expression(bind_context, operand, column_binder, recur.nested())?),
            None => None,
        };

        let mut conds = Vec::with_capacity(conditions.len());
        for cond in conditions {
            let cond = self.bind_expression(bind_context, cond, column_binder, recur.nested())?;
            let cond = match &operand {
                Some(operand) => bind_comparison(operand.clone(), ComparisonOperator::Eq, cond)?,
                None => check_type(&DataType::Boolean, cond)?,
            };
            conds.push(cond);
        }

        let mut branches = self.bind_expressions(bind_context, results, column_binder, recur.nested())?;
        branches.push(match else_expr {
            Some(else_expr) => self.bind_expression(bind_context, else_expr, column_binder, recur.nested())?,
            None => expr::lit(ScalarValue::null()),
        });

        let (mut branches, datatype) = coerce_to_supertype(branches)?;
        trace!(%datatype, branches = branches.len(), "coerced CASE branches");

        let else_branch = branches
            .pop()
            .ok_or_else(|| DbError::new("Missing ELSE branch"))?;
        let mut inputs = Vec::with_capacity(conds.len() * 2 + 1);
        for (cond, result) in conds.into_iter().zip(branches) {
            inputs.push(cond);
            inputs.push(result);
        }
        inputs.push(else_branch);

        conditional_call(&FUNCTION_SET_CASEWHEN, inputs)
    }

    fn bind_in_list(
        &self,
        bind_context: &mut BindContext,
        needle: &ast::Expr,
        list: &[ast::Expr],
        negated: bool,
        column_binder: &mut impl ExpressionColumnBinder,
        recur: RecursionContext,
    ) -> Result<Expression> {
        if list.is_empty() {
            return Err(DbError::invalid_input("IN list cannot be empty"));
        }

        let (eq, combine): (ComparisonOperator, fn(Vec<Expression>) -> Result<Option<Expression>>) =
            if negated {
                (ComparisonOperator::NotEq, |e| Expression::and_all(e))
            } else {
                (ComparisonOperator::Eq, |e| Expression::or_all(e))
            };

        // Row IN list, compare each element.
        if let ast::Expr::Tuple(needles) = needle {
            let needles = self.bind_expressions(bind_context, needles, column_binder, recur.nested())?;
            let mut rows = Vec::with_capacity(list.len());
            for item in list {
                let items = match item {
                    ast::Expr::Tuple(items) if items.len() == needles.len() => items,
                    _ => {
                        return Err(DbError::arity_mismatch(format!(
                            "IN list entries must be rows of {} values",
                            needles.len()
                        )));
                    }
                };
                let items = self.bind_expressions(bind_context, items, column_binder, recur.nested())?;
                let mut comparisons = Vec::with_capacity(items.len());
                for (needle, item) in needles.iter().zip(items) {
                    comparisons.push(bind_comparison(needle.clone(), ComparisonOperator::Eq, item)?);
                }
                let row = Expression::and_all(comparisons)?
                    .ok_or_else(|| DbError::new("Empty row comparison"))?;
                rows.push(if negated { row.negate()? } else { row });
            }
            return combine(rows)?.ok_or_else(|| DbError::new("Empty IN list"));
        }

        let needle = self.bind_expression(bind_context, needle, column_binder, recur.nested())?;
        let items = self.bind_expressions(bind_context, list, column_binder, recur.nested())?;

        if items.len() == 1 {
            let item = items
                .into_iter()
                .next()
                .ok_or_else(|| DbError::new("Missing IN list item"))?;
            return bind_comparison(needle, eq, item);
        }

        let mut all = Vec::with_capacity(items.len() + 1);
        all.push(needle);
        all.extend(items);
        let (mut all, datatype) = coerce_to_supertype(all)?;
        let needle = all.remove(0);

        let rewrite = self.ctx.config.enable_in_list_rewrite
            && all.len() <= self.ctx.config.in_list_rewrite_threshold
            && matches!(
                recur.clause,
                BindClause::Where | BindClause::Having | BindClause::JoinOn
            );

        if rewrite {
            trace!(items = all.len(), %datatype, negated, "rewrote IN list to comparisons");
            let comparisons = all
                .into_iter()
                .map(|item| expr::compare(eq, needle.clone(), item))
                .collect::<Vec<_>>();
            return combine(comparisons)?.ok_or_else(|| DbError::new("Empty IN list"));
        }

        Ok(Expression::InList(InListExpr {
            expr: Box::new(needle),
            list: all,
            negated,
        }))
    }

    fn plan_subquery(&self, bind_context: &mut BindContext, query: &ast::QueryNode) -> Result<PlannedSubquery> {
        let (scope, plan) = plan_subquery(self.ctx, bind_context, self.current, query)?;

        let mut columns = Vec::new();
        for table_ref in plan.get_output_table_refs(bind_context) {
            let table = bind_context.get_table(table_ref)?;
            for (col_idx, datatype) in table.column_types.iter().enumerate() {
                columns.push((ColumnReference::new(table_ref, col_idx), datatype.clone()));
            }
        }
        let correlated = bind_context.correlated_columns(scope)?.clone();

        Ok(PlannedSubquery {
            scope,
            plan,
            columns,
            correlated,
        })
    }

    fn bind_scalar_subquery(&self, bind_context: &mut BindContext, query: &ast::QueryNode) -> Result<Expression> {
        let planned = self.plan_subquery(bind_context, query)?;
        let return_type = match planned.columns.as_slice() {
            [(_, datatype)] => datatype.clone(),
            cols => {
                return Err(DbError::arity_mismatch(format!(
                    "Subquery used as an expression must return one column, got {}",
                    cols.len()
                )));
            }
        };

        let guarded = LogicalOperator::CardinalityGuard(
            Node::new(LogicalCardinalityGuard::max_one_row(), vec![planned.plan])
                .with_cardinality(Cardinality::AtMostOne),
        );

        Ok(Expression::Subquery(SubqueryExpr {
            bind_scope: planned.scope,
            subquery: Box::new(guarded),
            subquery_type: SubqueryType::Scalar,
            return_type,
            correlated_columns: planned.correlated,
        }))
    }

    /// `<left> <op> ANY|ALL (<subquery>)`.
    fn bind_quantified(
        &self,
        bind_context: &mut BindContext,
        left: Expression,
        op: ComparisonOperator,
        quantifier: ast::SubqueryQuantifier,
        query: &ast::QueryNode,
    ) -> Result<Expression> {
        let planned = self.plan_subquery(bind_context, query)?;
        let (column, col_type) = match planned.columns.as_slice() {
            [(column, datatype)] => (*column, datatype.clone()),
            cols => {
                return Err(DbError::arity_mismatch(format!(
                    "Subquery has too many columns, expected 1, got {}",
                    cols.len()
                )));
            }
        };

        let target = supertype_of([&left.datatype(), &col_type])?;
        let left = check_type(&target, left)?;
        let plan = if col_type != target {
            project_cast(bind_context, planned.plan, column, col_type, &target)?
        } else {
            planned.plan
        };

        let subquery_type = match quantifier {
            ast::SubqueryQuantifier::Any => SubqueryType::Any {
                expr: Box::new(left),
                op,
            },
            ast::SubqueryQuantifier::All => SubqueryType::All {
                expr: Box::new(left),
                op,
            },
        };

        Ok(Expression::Subquery(SubqueryExpr {
            bind_scope: planned.scope,
            subquery: Box::new(plan),
            subquery_type,
            return_type: DataType::Boolean,
            correlated_columns: planned.correlated,
        }))
    }

    fn bind_next_value_for(&self, reference: &ast::ObjectReference) -> Result<Expression> {
        let (schema, name) = reference.schema_and_name()?;
        let schema = schema.unwrap_or_else(|| self.ctx.session.schema.clone());
        let sequence = match self.ctx.catalog.get_sequence(&schema, &name)? {
            Some(sequence) => sequence,
            None => {
                return Err(missing_entry_error(
                    self.ctx.catalog,
                    Some(&schema),
                    CatalogEntryKind::Sequence,
                    &name,
                ));
            }
        };

        let next = scalar_call(
            &FUNCTION_SET_NEXT_VALUE_FOR,
            vec![expr::lit(schema.as_str()), expr::lit(name.as_str())],
        )?;
        check_type(&sequence.datatype, next)
    }
}

/// Resolve a user defined type, searching the session schema if unqualified.
pub fn resolve_named_type(ctx: &CompileContext, reference: &ast::ObjectReference) -> Result<DataType> {
    let (schema, name) = reference.schema_and_name()?;
    let schema = schema.unwrap_or_else(|| ctx.session.schema.clone());
    match ctx.catalog.get_type(&schema, &name)? {
        Some(entry) => Ok(entry.datatype.clone()),
        None => Err(missing_entry_error(
            ctx.catalog,
            Some(&schema),
            CatalogEntryKind::Type,
            &name,
        )),
    }
}

pub fn bind_datatype(ctx: &CompileContext, datatype: &ast::DataType) -> Result<DataType> {
    DataType::from_ast(datatype, |reference| resolve_named_type(ctx, reference))
}

/// Call a builtin scalar function.
pub fn scalar_call(set: &'static FunctionSet, inputs: Vec<Expression>) -> Result<Expression> {
    Ok(Expression::ScalarFunction(ScalarFunctionExpr {
        function: plan_builtin(set, inputs)?,
    }))
}

fn plan_in_set(set: &'static FunctionSet, inputs: Vec<Expression>) -> Result<PlannedFunction> {
    let types: Vec<_> = inputs.iter().map(|e| e.datatype()).collect();
    let resolved = resolve_in_set(set, &types, ImplicitCastConfig::FUNCTION)?
        .ok_or_else(|| no_matching_overload(set, &types))?;
    resolved.plan(inputs)
}

/// Build a conditional whose inputs are already coerced.
fn conditional_call(set: &'static FunctionSet, inputs: Vec<Expression>) -> Result<Expression> {
    let def = set
        .functions
        .first()
        .ok_or_else(|| DbError::new(format!("No overloads for '{}'", set.name)))?;
    Ok(Expression::ScalarFunction(ScalarFunctionExpr {
        function: PlannedFunction::from_def(set, def, inputs)?,
    }))
}

/// COALESCE, NULLIF, and IFTHENELSE.
fn bind_conditional(set: &'static FunctionSet, mut args: Vec<Expression>) -> Result<Expression> {
    match set.name {
        "ifthenelse" => {
            if args.len() != 3 {
                return Err(DbError::invalid_input(format!(
                    "IFTHENELSE expects 3 arguments, got {}",
                    args.len()
                )));
            }
            let cond = check_type(&DataType::Boolean, args.remove(0))?;
            let (branches, _) = coerce_to_supertype(args)?;
            let mut inputs = vec![cond];
            inputs.extend(branches);
            conditional_call(set, inputs)
        }
        "nullif" if args.len() != 2 => Err(DbError::invalid_input(format!(
            "NULLIF expects 2 arguments, got {}",
            args.len()
        ))),
        _ => {
            if args.is_empty() {
                return Err(DbError::invalid_input(format!(
                    "{} expects at least one argument",
                    set.name.to_uppercase()
                )));
            }
            let (args, _) = coerce_to_supertype(args)?;
            conditional_call(set, args)
        }
    }
}

fn is_null_literal(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Literal(LiteralExpr {
            literal: ScalarValue::Null(_)
        })
    )
}

/// Coerce expressions to their common supertype.
///
/// NULL literals don't contribute to the type, they take on whatever the
/// other expressions agree on.
pub fn coerce_to_supertype(exprs: Vec<Expression>) -> Result<(Vec<Expression>, DataType)> {
    let types: Vec<_> = exprs
        .iter()
        .filter(|e| !is_null_literal(e))
        .map(|e| e.datatype())
        .collect();
    let target = supertype_of(types.iter())?;
    let exprs = exprs
        .into_iter()
        .map(|e| check_type(&target, e))
        .collect::<Result<Vec<_>>>()?;
    Ok((exprs, target))
}

pub fn bind_comparison(left: Expression, op: ComparisonOperator, right: Expression) -> Result<Expression> {
    let (mut coerced, _) = coerce_to_supertype(vec![left, right])?;
    let right = coerced.pop();
    let left = coerced.pop();
    match (left, right) {
        (Some(left), Some(right)) => Ok(expr::compare(op, left, right)),
        _ => Err(DbError::new("Comparison lost an operand")),
    }
}

fn literal_digits(expr: &Expression) -> Option<u8> {
    match expr {
        Expression::Literal(LiteralExpr { literal }) => literal.literal_digits(),
        _ => None,
    }
}

/// Arithmetic with decimal operands rescaled ahead of overload resolution.
pub fn bind_arith(left: Expression, op: ArithOp, right: Expression) -> Result<Expression> {
    let (left_type, right_type) = (left.datatype(), right.datatype());
    let rescaled = rescale_operands(
        op,
        DecimalOperand {
            datatype: &left_type,
            literal_digits: literal_digits(&left),
        },
        DecimalOperand {
            datatype: &right_type,
            literal_digits: literal_digits(&right),
        },
    );

    let (left, right) = match rescaled {
        Some((left_target, right_target)) => {
            trace!(?op, left = %left_target, right = %right_target, "rescaled decimal operands");
            (check_type(&left_target, left)?, check_type(&right_target, right)?)
        }
        None => (left, right),
    };

    let set = match op {
        ArithOp::Add => &FUNCTION_SET_ADD,
        ArithOp::Sub => &FUNCTION_SET_SUB,
        ArithOp::Mul => &FUNCTION_SET_MUL,
        ArithOp::Div => &FUNCTION_SET_DIV,
        ArithOp::Rem => &FUNCTION_SET_REM,
    };
    scalar_call(set, vec![left, right])
}

fn coerce_to_string(expr: Expression) -> Result<Expression> {
    match expr.datatype() {
        DataType::Utf8 { .. } => Ok(expr),
        _ => check_type(&DataType::UTF8, expr),
    }
}

/// Lower BETWEEN to comparisons.
fn bind_between(
    needle: Expression,
    low: Expression,
    high: Expression,
    negated: bool,
    symmetric: bool,
) -> Result<Expression> {
    let (mut coerced, _) = coerce_to_supertype(vec![needle, low, high])?;
    let (high, low, needle) = match (coerced.pop(), coerced.pop(), coerced.pop()) {
        (Some(high), Some(low), Some(needle)) => (high, low, needle),
        _ => return Err(DbError::new("BETWEEN lost an operand")),
    };

    let range = |low: &Expression, high: &Expression| -> Result<Expression> {
        Expression::and_all([
            expr::compare(ComparisonOperator::GtEq, needle.clone(), low.clone()),
            expr::compare(ComparisonOperator::LtEq, needle.clone(), high.clone()),
        ])?
        .ok_or_else(|| DbError::new("Empty BETWEEN range"))
    };

    let between = if symmetric {
        Expression::or_all([range(&low, &high)?, range(&high, &low)?])?
            .ok_or_else(|| DbError::new("Empty BETWEEN range"))?
    } else {
        range(&low, &high)?
    };

    if negated { between.negate() } else { Ok(between) }
}

/// Wrap a single column subquery plan in a projection casting its output.
fn project_cast(
    bind_context: &mut BindContext,
    plan: LogicalOperator,
    column: ColumnReference,
    have: DataType,
    target: &DataType,
) -> Result<LogicalOperator> {
    let cast = check_type(target, expr::column(column, have))?;
    let projection_table = bind_context.new_ephemeral_table_from_types("__cast", vec![target.clone()])?;
    Ok(LogicalOperator::Project(Node::new(
        LogicalProject {
            projections: vec![cast],
            projection_table,
        },
        vec![plan],
    )))
}

fn collect_column_depths(expr: &Expression, depths: &mut BTreeSet<usize>) -> Result<()> {
    if let Expression::Column(col) = expr {
        depths.insert(col.depth);
        return Ok(());
    }
    expr.for_each_child(&mut |child| collect_column_depths(child, depths))
}

/// Rewrite columns at `depth` to be local.
fn rebase_depth(expr: &mut Expression, depth: usize) -> Result<()> {
    if let Expression::Column(col) = expr {
        if col.depth == depth {
            col.depth = 0;
        }
        return Ok(());
    }
    expr.for_each_child_mut(&mut |child| rebase_depth(child, depth))
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::config::compile::CompileConfig;
    use crate::config::session::GlobalVariables;
    use crate::logical::binder::bind_context::TableAlias;
    use crate::logical::binder::column_binder::DefaultColumnBinder;
    use crate::logical::binder::scope_stack::FrameKind;

    struct Fixture {
        catalog: MemoryCatalog,
        session: crate::config::session::SessionIdentity,
        config: CompileConfig,
        globals: GlobalVariables,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                catalog: MemoryCatalog::new(),
                session: MemoryCatalog::superuser_session(),
                config: CompileConfig::default(),
                globals: GlobalVariables::default(),
            }
        }

        fn ctx(&self) -> CompileContext<'_> {
            CompileContext::new(&self.catalog, &self.session, &self.config, &self.globals)
        }
    }

    fn bind_in(
        ctx: &CompileContext,
        bind_context: &mut BindContext,
        expr: &ast::Expr,
        clause: BindClause,
    ) -> Result<Expression> {
        let scope = bind_context.root_scope_ref();
        bind_context.with_frame(FrameKind::Statement, "test", |bind_context| {
            BaseExpressionBinder::new(scope, ctx).bind_expression(
                bind_context,
                expr,
                &mut DefaultColumnBinder,
                RecursionContext::new(clause),
            )
        })
    }

    fn num(n: &str) -> ast::Expr {
        ast::Expr::Literal(ast::Literal::Number(n.to_string()))
    }

    fn binary(left: ast::Expr, op: ast::BinaryOperator, right: ast::Expr) -> ast::Expr {
        ast::Expr::BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn with_table() -> BindContext {
        let mut bind_context = BindContext::new();
        let root = bind_context.root_scope_ref();
        bind_context
            .push_table(
                root,
                Some(TableAlias::new(None, "t")),
                vec![DataType::Int32, DataType::varchar(10)],
                vec!["a".to_string(), "b".to_string()],
            )
            .unwrap();
        bind_context
    }

    #[test]
    fn int_plus_decimal_literal() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();

        let expr = bind_in(
            &ctx,
            &mut bind_context,
            &binary(num("1"), ast::BinaryOperator::Plus, num("1.5")),
            BindClause::Select,
        )
        .unwrap();

        let func = match expr {
            Expression::ScalarFunction(func) => func.function,
            other => panic!("unexpected expression: {other:?}"),
        };
        assert_eq!("+", func.name);
        assert_eq!(DataType::decimal(3, 1), func.inputs[0].datatype());
        assert_eq!(DataType::decimal(3, 1), func.inputs[1].datatype());
        assert!(matches!(func.inputs[0], Expression::Cast(_)));
    }

    #[test]
    fn negative_literal_folds() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();

        let expr = bind_in(
            &ctx,
            &mut bind_context,
            &ast::Expr::UnaryExpr {
                op: ast::UnaryOperator::Minus,
                expr: Box::new(num("5")),
            },
            BindClause::Select,
        )
        .unwrap();
        assert_eq!(expr::lit(-5_i32), expr);
    }

    #[test]
    fn missing_column_suggests() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = with_table();

        let err = bind_in(
            &ctx,
            &mut bind_context,
            &ast::Expr::Ident(ast::Ident::new("aa")),
            BindClause::Where,
        )
        .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
        assert_eq!(bind_context.frames_pushed(), bind_context.frames_popped());
    }

    #[test]
    fn small_in_list_in_where_becomes_or() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = with_table();

        let expr = ast::Expr::InList {
            expr: Box::new(ast::Expr::Ident(ast::Ident::new("a"))),
            list: vec![num("1"), num("2"), num("3")],
            negated: false,
        };

        let bound = bind_in(&ctx, &mut bind_context, &expr, BindClause::Where).unwrap();
        match bound {
            Expression::ScalarFunction(func) => {
                assert_eq!("or", func.function.name);
                assert_eq!(3, func.function.inputs.len());
            }
            other => panic!("unexpected expression: {other:?}"),
        }

        let bound = bind_in(&ctx, &mut bind_context, &expr, BindClause::Select).unwrap();
        assert!(matches!(bound, Expression::InList(_)));
    }

    #[test]
    fn single_element_in_is_comparison() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = with_table();

        let expr = ast::Expr::InList {
            expr: Box::new(ast::Expr::Ident(ast::Ident::new("a"))),
            list: vec![num("1")],
            negated: true,
        };
        let bound = bind_in(&ctx, &mut bind_context, &expr, BindClause::Select).unwrap();
        match bound {
            Expression::Comparison(cmp) => assert_eq!(ComparisonOperator::NotEq, cmp.op),
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn aggregate_not_allowed_in_where() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = with_table();

        let expr = ast::Expr::Function(Box::new(ast::Function {
            reference: ast::ObjectReference::from("sum"),
            args: vec![ast::FunctionArg::Unnamed {
                arg: ast::FunctionArgExpr::Expr(ast::Expr::Ident(ast::Ident::new("a"))),
            }],
            distinct: false,
            filter: None,
            over: None,
        }));

        let err = bind_in(&ctx, &mut bind_context, &expr, BindClause::Where).unwrap_err();
        assert_eq!(ErrorKind::GroupByViolation, err.kind());

        let bound = bind_in(&ctx, &mut bind_context, &expr, BindClause::Select).unwrap();
        assert!(matches!(bound, Expression::Aggregate(_)));
    }

    #[test]
    fn case_coerces_branches() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = with_table();

        let expr = ast::Expr::Case {
            expr: None,
            conditions: vec![binary(
                ast::Expr::Ident(ast::Ident::new("a")),
                ast::BinaryOperator::Gt,
                num("0"),
            )],
            results: vec![num("1")],
            else_expr: Some(Box::new(ast::Expr::Literal(ast::Literal::Null))),
        };
        let bound = bind_in(&ctx, &mut bind_context, &expr, BindClause::Select).unwrap();
        assert_eq!(DataType::Int32, bound.datatype());
    }

    #[test]
    fn expression_depth_limit() {
        let mut fixture = Fixture::new();
        fixture.config.max_expression_depth = 4;
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();

        let mut expr = num("1");
        for _ in 0..10 {
            expr = ast::Expr::Nested(Box::new(expr));
        }
        let err = bind_in(&ctx, &mut bind_context, &expr, BindClause::Select).unwrap_err();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
    }

    #[test]
    fn parameters_declared_once() {
        let fixture = Fixture::new();
        let ctx = fixture
            .ctx()
            .with_parameter_types([("1".to_string(), DataType::Int64)]);
        let mut bind_context = BindContext::new();

        let param = ast::Expr::Parameter(ast::ParameterRef::Positional(1));
        let expr = binary(param.clone(), ast::BinaryOperator::Plus, param);
        let bound = bind_in(&ctx, &mut bind_context, &expr, BindClause::Select).unwrap();
        assert_eq!(DataType::Int64, bound.datatype());
    }
}
