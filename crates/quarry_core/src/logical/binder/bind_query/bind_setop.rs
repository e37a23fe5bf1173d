use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::trace;

use super::{BoundQuery, QueryBinder};
use crate::compile::CompileContext;
use crate::expr::Expression;
use crate::expr::cast_expr::check_type;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, TableRef};
use crate::logical::logical_setop::SetOpKind;
use crate::types::datatype::DataType;
use crate::types::supertype::supertype;

/// Projection placed on top of one side of a set operation to line its
/// columns up with the output.
#[derive(Debug, Clone, PartialEq)]
pub struct SideProjection {
    pub table: TableRef,
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOpSide {
    pub query: Box<BoundQuery>,
    pub scope: BindScopeRef,
    /// Casts and reorders columns. None when the side's output already
    /// matches.
    pub projection: Option<SideProjection>,
}

impl SetOpSide {
    pub fn output_table(&self) -> TableRef {
        match &self.projection {
            Some(projection) => projection.table,
            None => self.query.output_table(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSetOp {
    pub left: SetOpSide,
    pub right: SetOpSide,
    pub setop_table: TableRef,
    pub kind: SetOpKind,
    pub all: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SetOpBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> SetOpBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        SetOpBinder { current, ctx }
    }

    pub fn bind(
        &self,
        bind_context: &mut BindContext,
        left: &ast::QueryNodeBody,
        right: &ast::QueryNodeBody,
        operation: ast::SetOperation,
        all: bool,
        corresponding: Option<&ast::Corresponding>,
    ) -> Result<BoundSetOp> {
        let no_limit = ast::LimitModifier::default();

        let left_scope = bind_context.new_join_scope(self.current);
        let left = QueryBinder::new(left_scope, self.ctx).bind_body(bind_context, left, &[], &no_limit)?;

        let right_scope = bind_context.new_join_scope(self.current);
        let right = QueryBinder::new(right_scope, self.ctx).bind_body(bind_context, right, &[], &no_limit)?;

        let (left_names, left_types) = table_columns(bind_context, left.output_table())?;
        let (right_names, right_types) = table_columns(bind_context, right.output_table())?;

        // Column indices of each side feeding the output.
        let (left_cols, right_cols) = match corresponding {
            Some(corresponding) => corresponding_columns(&left_names, &right_names, &corresponding.columns)?,
            None => {
                if left_types.len() != right_types.len() {
                    return Err(DbError::arity_mismatch(format!(
                        "{} requires both sides to have the same number of columns, got {} and {}",
                        setop_name(operation),
                        left_types.len(),
                        right_types.len()
                    ))
                    .with_field("left", left_types.len())
                    .with_field("right", right_types.len()));
                }
                ((0..left_types.len()).collect(), (0..right_types.len()).collect())
            }
        };

        let mut output_types = Vec::with_capacity(left_cols.len());
        for (&l, &r) in left_cols.iter().zip(&right_cols) {
            output_types.push(supertype(&left_types[l], &right_types[r])?);
        }
        let output_names: Vec<_> = left_cols.iter().map(|&l| left_names[l].clone()).collect();

        let left = self.side(bind_context, left, left_scope, &left_cols, &left_types, &output_types)?;
        let right = self.side(bind_context, right, right_scope, &right_cols, &right_types, &output_types)?;

        let setop_table = bind_context.push_table(self.current, None, output_types, output_names)?;

        let kind = match operation {
            ast::SetOperation::Union => SetOpKind::Union,
            ast::SetOperation::Except => SetOpKind::Except,
            ast::SetOperation::Intersect => SetOpKind::Intersect,
        };

        trace!(%kind, all, %setop_table, "bound set operation");

        Ok(BoundSetOp {
            left,
            right,
            setop_table,
            kind,
            all,
        })
    }

    fn side(
        &self,
        bind_context: &mut BindContext,
        query: BoundQuery,
        scope: BindScopeRef,
        cols: &[usize],
        types: &[DataType],
        output_types: &[DataType],
    ) -> Result<SetOpSide> {
        let identity = cols.len() == types.len() && cols.iter().enumerate().all(|(i, &c)| i == c);
        let same_types = cols.iter().zip(output_types).all(|(&c, out)| &types[c] == out);

        let projection = if identity && same_types {
            None
        } else {
            let source = query.output_table();
            let expressions = cols
                .iter()
                .zip(output_types)
                .map(|(&c, out)| {
                    let col = Expression::Column(ColumnExpr::new(
                        ColumnReference::new(source, c),
                        types[c].clone(),
                    ));
                    check_type(out, col)
                })
                .collect::<Result<Vec<_>>>()?;
            let table = bind_context.new_ephemeral_table_from_types("__generated_setop_side", output_types.to_vec())?;
            Some(SideProjection { table, expressions })
        };

        Ok(SetOpSide {
            query: Box::new(query),
            scope,
            projection,
        })
    }
}

fn setop_name(operation: ast::SetOperation) -> &'static str {
    match operation {
        ast::SetOperation::Union => "UNION",
        ast::SetOperation::Except => "EXCEPT",
        ast::SetOperation::Intersect => "INTERSECT",
    }
}

fn table_columns(bind_context: &BindContext, table: TableRef) -> Result<(Vec<String>, Vec<DataType>)> {
    let table = bind_context.get_table(table)?;
    Ok((table.column_names.clone(), table.column_types.clone()))
}

/// Match columns by name for `CORRESPONDING [BY (...)]`.
///
/// Without a list, every name both sides share is used, in the order of the
/// left side.
fn corresponding_columns(
    left: &[String],
    right: &[String],
    by: &[ast::Ident],
) -> Result<(Vec<usize>, Vec<usize>)> {
    let position = |names: &[String], name: &str| -> Result<Option<usize>> {
        let mut found = None;
        for (idx, have) in names.iter().enumerate() {
            if have == name {
                if found.is_some() {
                    return Err(DbError::ambiguous(format!(
                        "Column '{name}' appears more than once in a CORRESPONDING input"
                    ))
                    .with_field("column", name));
                }
                found = Some(idx);
            }
        }
        Ok(found)
    };

    let names: Vec<String> = if by.is_empty() {
        left.iter().filter(|name| right.contains(name)).cloned().collect()
    } else {
        let mut names: Vec<String> = Vec::with_capacity(by.len());
        for ident in by {
            let name = ident.as_normalized_string();
            if names.contains(&name) {
                return Err(DbError::ambiguous(format!(
                    "Column '{name}' listed more than once in CORRESPONDING BY"
                ))
                .with_field("column", name));
            }
            names.push(name);
        }
        names
    };

    if names.is_empty() {
        return Err(DbError::invalid_input(
            "CORRESPONDING requires at least one column name shared by both inputs",
        ));
    }

    let mut left_cols = Vec::with_capacity(names.len());
    let mut right_cols = Vec::with_capacity(names.len());
    for name in &names {
        match (position(left, name)?, position(right, name)?) {
            (Some(l), Some(r)) => {
                left_cols.push(l);
                right_cols.push(r);
            }
            _ => {
                return Err(DbError::not_found(format!(
                    "Column '{name}' in CORRESPONDING BY is missing from one of the inputs"
                ))
                .with_field("column", name));
            }
        }
    }

    Ok((left_cols, right_cols))
}
