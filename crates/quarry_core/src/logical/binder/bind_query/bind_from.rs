use std::sync::Arc;

use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::trace;

use super::plan_query;
use crate::catalog::entry::{TableEntry, TableKind};
use crate::catalog::privilege::Privileges;
use crate::compile::CompileContext;
use crate::expr::Expression;
use crate::expr::cast_expr::check_type;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::expr::comparison_expr::ComparisonOperator;
use crate::functions::implicit::ImplicitCastConfig;
use crate::functions::resolve::{no_matching_overload, resolve_in_set};
use crate::functions::{FunctionKind, PlannedFunction};
use crate::logical::binder::bind_context::{
    BindContext,
    BindScopeRef,
    CorrelatedColumn,
    TableAlias,
    TableRef,
    UsingColumn,
};
use crate::logical::binder::column_binder::DefaultColumnBinder;
use crate::logical::binder::expr_binder::{
    BaseExpressionBinder,
    BindClause,
    RecursionContext,
    bind_comparison,
};
use crate::logical::binder::scope_stack::FrameKind;
use crate::logical::logical_join::JoinType;
use crate::logical::operator::{LogicalNode, LogicalOperator};
use crate::types::datatype::DataType;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundFrom {
    pub bind_ref: BindScopeRef,
    pub item: BoundFromItem,
}

impl BoundFrom {
    pub const fn empty(bind_ref: BindScopeRef) -> Self {
        BoundFrom {
            bind_ref,
            item: BoundFromItem::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundFromItem {
    BaseTable(BoundBaseTable),
    Join(BoundJoin),
    TableFunction(BoundTableFunction),
    /// Subqueries, CTE references, and views. Already planned.
    Subquery(BoundSubquery),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundBaseTable {
    pub table_ref: TableRef,
    pub schema: String,
    pub entry: Arc<TableEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundTableFunction {
    pub table_ref: TableRef,
    pub function: PlannedFunction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSubquery {
    /// Table exposing the subquery's columns under the FROM alias.
    pub table_ref: TableRef,
    pub plan: LogicalOperator,
    /// Output table of the plan, mapped 1:1 onto `table_ref`.
    pub source: TableRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundJoin {
    /// Reference to binder for left side of join.
    pub left_bind_ref: BindScopeRef,
    /// Bound left.
    pub left: Box<BoundFrom>,
    /// Reference to binder for right side of join.
    pub right_bind_ref: BindScopeRef,
    /// Bound right.
    pub right: Box<BoundFrom>,
    pub join_type: JoinType,
    /// Expressions we're joining on, if any.
    pub conditions: Vec<Expression>,
    /// Columns on right side that are correlated with the left side of a join.
    pub right_correlated_columns: Vec<CorrelatedColumn>,
    /// Right side is evaluated per row of the left side.
    pub lateral: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FromBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> FromBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        FromBinder { current, ctx }
    }

    pub fn bind(&self, bind_context: &mut BindContext, from: Option<&ast::FromNode>) -> Result<BoundFrom> {
        let from = match from {
            Some(from) => from,
            None => return Ok(BoundFrom::empty(self.current)),
        };

        match &from.body {
            ast::FromNodeBody::BaseTable(table) => {
                self.bind_table(bind_context, &table.reference, from.alias.as_ref())
            }
            ast::FromNodeBody::Subquery(subquery) => {
                self.bind_subquery(bind_context, subquery, from.alias.as_ref())
            }
            ast::FromNodeBody::TableFunction(function) => {
                self.bind_table_function(bind_context, function, from.alias.as_ref())
            }
            ast::FromNodeBody::Join(join) => {
                if from.alias.is_some() {
                    return Err(DbError::unsupported("Aliasing a join is not supported"));
                }
                self.bind_join(bind_context, join)
            }
        }
    }

    fn push_table_scope_with_from_alias(
        &self,
        bind_context: &mut BindContext,
        mut default_alias: Option<TableAlias>,
        mut column_names: Vec<String>,
        column_types: Vec<DataType>,
        from_alias: Option<&ast::FromAlias>,
    ) -> Result<TableRef> {
        if let Some(ast::FromAlias { alias, columns }) = from_alias {
            default_alias = Some(TableAlias::new(None, alias.as_normalized_string()));

            // Columns without an alias keep their original names.
            if let Some(columns) = columns {
                if columns.len() > column_names.len() {
                    return Err(DbError::arity_mismatch(format!(
                        "Specified {} column aliases when only {} columns exist",
                        columns.len(),
                        column_names.len(),
                    ))
                    .with_field("table", alias));
                }

                for (orig, new) in column_names.iter_mut().zip(columns) {
                    *orig = new.as_normalized_string();
                }
            }
        }

        bind_context.push_table(self.current, default_alias, column_types, column_names)
    }

    fn bind_table(
        &self,
        bind_context: &mut BindContext,
        reference: &ast::ObjectReference,
        alias: Option<&ast::FromAlias>,
    ) -> Result<BoundFrom> {
        // Unqualified names check CTEs first.
        if let [name] = reference.0.as_slice() {
            if let Some(cte_ref) = bind_context.find_cte(&name.as_normalized_string()) {
                let cte = bind_context.get_cte(cte_ref)?;
                let default_alias = TableAlias::new(None, cte.name.clone());
                let names = cte.column_names.clone();
                let types = cte.column_types.clone();
                let plan = cte.plan.clone();
                let source = cte.output;

                trace!(cte = %cte.name, "binding cte reference");

                let table_ref = self.push_table_scope_with_from_alias(
                    bind_context,
                    Some(default_alias),
                    names,
                    types,
                    alias,
                )?;
                return Ok(BoundFrom {
                    bind_ref: self.current,
                    item: BoundFromItem::Subquery(BoundSubquery {
                        table_ref,
                        plan,
                        source,
                    }),
                });
            }
        }

        let (schema, entry) = self.ctx.resolve_table(reference)?;
        if !self
            .ctx
            .catalog
            .table_privs(self.ctx.session, &schema, &entry.name, Privileges::SELECT)?
        {
            return Err(DbError::privilege_denied(format!(
                "Permission denied for table '{schema}.{}'",
                entry.name
            ))
            .with_field("table", &entry.name)
            .with_field("user", &self.ctx.session.user));
        }

        if let TableKind::View {
            query,
            column_aliases,
        } = &entry.kind
        {
            return self.bind_view(bind_context, &schema, &entry, query, column_aliases.as_deref(), alias);
        }

        let default_alias = TableAlias::new(Some(schema.clone()), entry.name.clone());
        let names = entry.columns.iter().map(|c| c.name.clone()).collect();
        let types = entry.columns.iter().map(|c| c.datatype.clone()).collect();

        let table_ref =
            self.push_table_scope_with_from_alias(bind_context, Some(default_alias), names, types, alias)?;

        let table = bind_context.get_table_mut(table_ref)?;
        table.hidden.extend(
            entry
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.hidden)
                .map(|(idx, _)| idx),
        );

        Ok(BoundFrom {
            bind_ref: self.current,
            item: BoundFromItem::BaseTable(BoundBaseTable {
                table_ref,
                schema,
                entry,
            }),
        })
    }

    /// Inline a view's query.
    ///
    /// The query binds in a scope with no parents, inside a frame that hides
    /// CTEs and variables of the referencing statement.
    fn bind_view(
        &self,
        bind_context: &mut BindContext,
        schema: &str,
        entry: &TableEntry,
        query: &ast::QueryNode,
        column_aliases: Option<&[String]>,
        alias: Option<&ast::FromAlias>,
    ) -> Result<BoundFrom> {
        if bind_context.frames().depth() > self.ctx.config.max_expression_depth {
            return Err(DbError::resource_exhausted(format!(
                "Views nested too deeply while expanding '{schema}.{}'",
                entry.name
            ))
            .with_field("view", &entry.name));
        }

        trace!(%schema, view = %entry.name, "expanding view");

        let ctx = self.ctx;
        let label = format!("{schema}.{}", entry.name);
        let plan = bind_context.with_frame(FrameKind::View, label, |bind_context| {
            let scope = bind_context.new_orphan_scope();
            plan_query(ctx, bind_context, scope, query)
        })?;

        let source = single_output(&plan, bind_context)?;
        let table = bind_context.get_table(source)?;
        let types = table.column_types.clone();
        let mut names = table.column_names.clone();

        if let Some(aliases) = column_aliases {
            if aliases.len() != names.len() {
                return Err(DbError::arity_mismatch(format!(
                    "View '{}' has {} columns but {} column aliases",
                    entry.name,
                    names.len(),
                    aliases.len()
                )));
            }
            names = aliases.to_vec();
        }

        let default_alias = TableAlias::new(Some(schema.to_string()), entry.name.clone());
        let table_ref =
            self.push_table_scope_with_from_alias(bind_context, Some(default_alias), names, types, alias)?;

        Ok(BoundFrom {
            bind_ref: self.current,
            item: BoundFromItem::Subquery(BoundSubquery {
                table_ref,
                plan,
                source,
            }),
        })
    }

    fn bind_subquery(
        &self,
        bind_context: &mut BindContext,
        subquery: &ast::FromSubquery,
        alias: Option<&ast::FromAlias>,
    ) -> Result<BoundFrom> {
        // The subquery plan is inlined into this query, so it doesn't count
        // as a boundary for outer references.
        let nested_scope = bind_context.new_join_scope(self.current);
        let plan = plan_query(self.ctx, bind_context, nested_scope, &subquery.query)?;

        let source = single_output(&plan, bind_context)?;
        let table = bind_context.get_table(source)?;
        let names = table.column_names.clone();
        let types = table.column_types.clone();

        let table_ref = self.push_table_scope_with_from_alias(bind_context, None, names, types, alias)?;

        Ok(BoundFrom {
            bind_ref: self.current,
            item: BoundFromItem::Subquery(BoundSubquery {
                table_ref,
                plan,
                source,
            }),
        })
    }

    fn bind_table_function(
        &self,
        bind_context: &mut BindContext,
        function: &ast::FromTableFunction,
        alias: Option<&ast::FromAlias>,
    ) -> Result<BoundFrom> {
        let (schema, name) = function.reference.schema_and_name()?;
        let (_, entry) = self.ctx.functions().find_set(schema.as_deref(), &name)?;
        let set = entry.set;

        if set.kind != FunctionKind::TableFunction {
            return Err(DbError::invalid_input(format!(
                "'{name}' is a {}, not a table function",
                set.kind
            ))
            .with_field("function", name));
        }

        let binder = BaseExpressionBinder::new(self.current, self.ctx);
        let recur = RecursionContext::new(BindClause::TableFunction);
        let args = function
            .args
            .iter()
            .map(|arg| match arg {
                ast::FunctionArg::Unnamed {
                    arg: ast::FunctionArgExpr::Expr(expr),
                } => binder.bind_expression(bind_context, expr, &mut DefaultColumnBinder, recur),
                other => Err(DbError::invalid_input(format!(
                    "Unsupported argument to table function '{name}': {other:?}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let types: Vec<_> = args.iter().map(|a| a.datatype()).collect();
        let resolved = resolve_in_set(set, &types, ImplicitCastConfig::FUNCTION)?
            .ok_or_else(|| no_matching_overload(set, &types))?;
        let def = resolved.def()?;
        let function = resolved.plan(args)?;

        let mut names = Vec::with_capacity(def.table_columns.len());
        let mut column_types = Vec::with_capacity(def.table_columns.len());
        for (col_name, id) in def.table_columns {
            names.push(col_name.to_string());
            column_types.push(DataType::try_default_datatype(*id)?);
        }

        let default_alias = TableAlias::new(None, set.name);
        let table_ref = self.push_table_scope_with_from_alias(
            bind_context,
            Some(default_alias),
            names,
            column_types,
            alias,
        )?;

        Ok(BoundFrom {
            bind_ref: self.current,
            item: BoundFromItem::TableFunction(BoundTableFunction { table_ref, function }),
        })
    }

    fn bind_join(&self, bind_context: &mut BindContext, join: &ast::FromJoin) -> Result<BoundFrom> {
        // Bind left first.
        let left_idx = bind_context.new_join_scope(self.current);
        let left = FromBinder::new(left_idx, self.ctx).bind(bind_context, Some(&join.left))?;

        // A lateral right side binds as a child of the left, so references
        // into the left side are correlations.
        let lateral = is_lateral(&join.right);
        let right_idx = if lateral {
            bind_context.new_child_scope(left_idx)
        } else {
            bind_context.new_join_scope(self.current)
        };
        let right = FromBinder::new(right_idx, self.ctx).bind(bind_context, Some(&join.right))?;

        let right_correlated_columns: Vec<_> = bind_context
            .correlated_columns(right_idx)?
            .iter()
            .filter(|c| c.outer == left_idx)
            .copied()
            .collect();

        let join_type = match join.join_type {
            ast::JoinType::Cross | ast::JoinType::Inner => JoinType::Inner,
            ast::JoinType::Left => JoinType::Left,
            ast::JoinType::Right => JoinType::Right,
            ast::JoinType::Full => JoinType::Full,
        };

        let using_cols = match &join.join_condition {
            ast::JoinCondition::Using(cols) => {
                let mut names: Vec<String> = Vec::with_capacity(cols.len());
                for col in cols {
                    let name = col.as_normalized_string();
                    if names.contains(&name) {
                        return Err(DbError::ambiguous(format!(
                            "Column '{name}' appears more than once in USING"
                        ))
                        .with_field("column", name));
                    }
                    names.push(name);
                }
                names
            }
            ast::JoinCondition::Natural => natural_columns(bind_context, left_idx, right_idx)?,
            _ => Vec::new(),
        };

        // Move left and right into current context.
        bind_context.append_context(self.current, left_idx)?;
        bind_context.append_context(self.current, right_idx)?;

        let mut conditions = Vec::new();
        if let ast::JoinCondition::On(expr) = &join.join_condition {
            let condition = BaseExpressionBinder::new(self.current, self.ctx).bind_expression(
                bind_context,
                expr,
                &mut DefaultColumnBinder,
                RecursionContext::new(BindClause::JoinOn),
            )?;
            conditions.push(check_type(&DataType::Boolean, condition)?);
        }

        for using in using_cols {
            let missing_column = |side| {
                DbError::not_found(format!(
                    "Cannot find column '{using}' on {side} side of join"
                ))
                .with_field("column", &using)
            };

            let (left_table, left_col_idx) = bind_context
                .find_table_for_column(left_idx, None, &using)?
                .ok_or_else(|| missing_column("left"))?;
            let (right_table, right_col_idx) = bind_context
                .find_table_for_column(right_idx, None, &using)?
                .ok_or_else(|| missing_column("right"))?;

            let using_column = match join_type {
                JoinType::Right => UsingColumn {
                    column: using.clone(),
                    table_ref: right_table,
                    col_idx: right_col_idx,
                    hidden: (left_table, left_col_idx),
                },
                _ => UsingColumn {
                    column: using.clone(),
                    table_ref: left_table,
                    col_idx: left_col_idx,
                    hidden: (right_table, right_col_idx),
                },
            };
            bind_context.append_using_column(self.current, using_column)?;

            let left_col = column_expr(bind_context, left_table, left_col_idx)?;
            let right_col = column_expr(bind_context, right_table, right_col_idx)?;
            conditions.push(bind_comparison(left_col, ComparisonOperator::Eq, right_col)?);
        }

        trace!(%join_type, lateral, conditions = conditions.len(), "bound join");

        Ok(BoundFrom {
            bind_ref: self.current,
            item: BoundFromItem::Join(BoundJoin {
                left_bind_ref: left_idx,
                left: Box::new(left),
                right_bind_ref: right_idx,
                right: Box::new(right),
                join_type,
                conditions,
                right_correlated_columns,
                lateral,
            }),
        })
    }
}

fn is_lateral(node: &ast::FromNode) -> bool {
    match &node.body {
        ast::FromNodeBody::Subquery(subquery) => subquery.lateral,
        ast::FromNodeBody::TableFunction(function) => function.lateral,
        _ => false,
    }
}

/// Visible column names present on both sides, in left side order.
fn natural_columns(
    bind_context: &BindContext,
    left: BindScopeRef,
    right: BindScopeRef,
) -> Result<Vec<String>> {
    let visible_names = |scope| -> Result<Vec<String>> {
        let mut names = Vec::new();
        for table in bind_context.iter_tables(scope)? {
            for idx in table.visible_columns() {
                if bind_context.is_hidden_using_column(scope, table.reference, idx)? {
                    continue;
                }
                names.push(table.column_names[idx].clone());
            }
        }
        Ok(names)
    };

    let left_names = visible_names(left)?;
    let right_names = visible_names(right)?;

    let mut common = Vec::new();
    for name in left_names {
        if right_names.contains(&name) && !common.contains(&name) {
            common.push(name);
        }
    }
    Ok(common)
}

fn column_expr(bind_context: &BindContext, table: TableRef, col_idx: usize) -> Result<Expression> {
    let (_, datatype) = bind_context.get_column(table, col_idx)?;
    Ok(Expression::Column(ColumnExpr::new(
        ColumnReference::new(table, col_idx),
        datatype.clone(),
    )))
}

pub(crate) fn single_output(plan: &LogicalOperator, bind_context: &BindContext) -> Result<TableRef> {
    match plan.get_output_table_refs(bind_context).as_slice() {
        [table] => Ok(*table),
        refs => Err(DbError::new(format!(
            "Expected subquery to produce a single table, got {}",
            refs.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::bind_context::testutil::columns_in_scope;
    use crate::testutil::Fixture;

    fn fixture() -> Fixture {
        Fixture::new()
            .with_table("t1", &[("a", DataType::Int32), ("b", DataType::UTF8)])
            .with_table("t2", &[("a", DataType::Int64), ("c", DataType::Boolean)])
    }

    fn bind(fixture: &Fixture, from: ast::FromNode) -> Result<(BindContext, BoundFrom)> {
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let root = bind_context.root_scope_ref();
        let bound = FromBinder::new(root, &ctx).bind(&mut bind_context, Some(&from))?;
        Ok((bind_context, bound))
    }

    #[test]
    fn base_table_hides_row_id() {
        let fixture = fixture();
        let (bind_context, bound) = bind(&fixture, ast::FromNode::table("t1")).unwrap();

        let table_ref = match bound.item {
            BoundFromItem::BaseTable(table) => table.table_ref,
            other => panic!("unexpected item: {other:?}"),
        };
        let table = bind_context.get_table(table_ref).unwrap();
        assert_eq!(vec![0, 1], table.visible_columns().collect::<Vec<_>>());
        assert_eq!(3, table.num_columns());
    }

    #[test]
    fn using_join_hides_right_column() {
        let fixture = fixture();
        let from = ast::FromNode::table("t1").join(
            ast::FromNode::table("t2"),
            ast::JoinType::Inner,
            ast::JoinCondition::Using(vec![ast::Ident::new("a")]),
        );
        let (bind_context, bound) = bind(&fixture, from).unwrap();

        let join = match bound.item {
            BoundFromItem::Join(join) => join,
            other => panic!("unexpected item: {other:?}"),
        };
        assert_eq!(1, join.conditions.len());
        // Int32 vs Int64 compares after a cast.
        assert!(matches!(&join.conditions[0], Expression::Comparison(_)));

        let using = bind_context.get_using_columns(bound.bind_ref).unwrap();
        assert_eq!(1, using.len());
        assert_eq!("a", using[0].column);
    }

    #[test]
    fn natural_join_matches_by_name() {
        let fixture = fixture();
        let from = ast::FromNode::table("t1").join(
            ast::FromNode::table("t2"),
            ast::JoinType::Left,
            ast::JoinCondition::Natural,
        );
        let (_, bound) = bind(&fixture, from).unwrap();
        match bound.item {
            BoundFromItem::Join(join) => {
                assert_eq!(JoinType::Left, join.join_type);
                assert_eq!(1, join.conditions.len());
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn duplicate_alias() {
        let fixture = fixture();
        let from = ast::FromNode::table("t1").alias("x").join(
            ast::FromNode::table("t2").alias("x"),
            ast::JoinType::Cross,
            ast::JoinCondition::None,
        );
        let err = bind(&fixture, from).unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());
    }

    #[test]
    fn column_aliases_rename() {
        let fixture = fixture();
        let mut from = ast::FromNode::table("t1");
        from.alias = Some(ast::FromAlias {
            alias: ast::Ident::new("x"),
            columns: Some(vec![ast::Ident::new("c1")]),
        });
        let (bind_context, bound) = bind(&fixture, from).unwrap();
        let cols = columns_in_scope(&bind_context, bound.bind_ref);
        assert_eq!("c1", cols[0].0);
        assert_eq!("b", cols[1].0);
    }

    #[test]
    fn missing_table_suggests() {
        let fixture = fixture();
        let err = bind(&fixture, ast::FromNode::table("t3")).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn table_function_columns() {
        let fixture = fixture();
        let from = ast::FromNode {
            alias: None,
            body: ast::FromNodeBody::TableFunction(ast::FromTableFunction {
                lateral: false,
                reference: ast::ObjectReference::from("generate_series"),
                args: vec![
                    ast::FunctionArg::Unnamed {
                        arg: ast::FunctionArgExpr::Expr(ast::Expr::Literal(ast::Literal::Number(
                            "1".to_string(),
                        ))),
                    },
                    ast::FunctionArg::Unnamed {
                        arg: ast::FunctionArgExpr::Expr(ast::Expr::Literal(ast::Literal::Number(
                            "10".to_string(),
                        ))),
                    },
                ],
            }),
        };
        let (bind_context, bound) = bind(&fixture, from).unwrap();
        let cols = columns_in_scope(&bind_context, bound.bind_ref);
        assert_eq!(vec![("generate_series".to_string(), DataType::Int64)], cols);
    }
}
