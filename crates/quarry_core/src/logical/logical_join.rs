use std::fmt;

use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::expr::comparison_expr::{ComparisonExpr, ComparisonOperator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    /// Left rows with at least one match. Only emits the left side.
    Semi,
    /// Left rows without a match. Only emits the left side.
    Anti,
}

impl JoinType {
    /// Sides of the join that may be padded with NULLs, as (left, right).
    pub const fn null_supplying(&self) -> (bool, bool) {
        match self {
            Self::Left => (false, true),
            Self::Right => (true, false),
            Self::Full => (true, true),
            Self::Inner | Self::Semi | Self::Anti => (false, false),
        }
    }

    /// Helper for determining the output refs for a given node type.
    fn output_refs<T>(self, node: &Node<T>, bind_context: &BindContext) -> Vec<TableRef> {
        match self {
            Self::Semi | Self::Anti => node
                .children
                .first()
                .map(|c| c.get_output_table_refs(bind_context))
                .unwrap_or_default(),
            _ => node.get_children_table_refs(bind_context),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER"),
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
            Self::Full => write!(f, "FULL"),
            Self::Semi => write!(f, "SEMI"),
            Self::Anti => write!(f, "ANTI"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub op: ComparisonOperator,
}

impl JoinCondition {
    /// Flips the sides of the condition, including flipping the operatator.
    ///
    /// E.g. 'a >= b' becomes 'b <= a'
    pub fn flip_sides(&mut self) {
        self.op = self.op.flip();
        std::mem::swap(&mut self.left, &mut self.right);
    }

    pub fn into_expression(self) -> Expression {
        Expression::Comparison(ComparisonExpr {
            left: self.left,
            right: self.right,
            op: self.op,
        })
    }
}

impl From<ComparisonExpr> for JoinCondition {
    fn from(expr: ComparisonExpr) -> Self {
        JoinCondition {
            left: expr.left,
            right: expr.right,
            op: expr.op,
        }
    }
}

impl ContextDisplay for JoinCondition {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            ContextDisplayWrapper::with_mode(self.left.as_ref(), mode),
            self.op,
            ContextDisplayWrapper::with_mode(self.right.as_ref(), mode),
        )
    }
}

/// Join on one or more comparisons between the two sides.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalComparisonJoin {
    pub join_type: JoinType,
    /// The expression on the left only references the left child, the
    /// expression on the right only the right child.
    pub conditions: Vec<JoinCondition>,
    /// Remaining predicates that could not be split into conditions.
    pub residual: Option<Expression>,
    /// Tables whose columns may be NULL padded by this join.
    pub null_supplying: Vec<TableRef>,
}

impl Explainable for LogicalComparisonJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("ComparisonJoin", conf)
            .with_contextual_values("conditions", &self.conditions)
            .with_value("join_type", self.join_type);
        if let Some(residual) = &self.residual {
            builder = builder.with_contextual_value("residual", residual);
        }
        builder
            .with_values_if_verbose("null_supplying", &self.null_supplying)
            .build()
    }
}

impl LogicalNode for Node<LogicalComparisonJoin> {
    fn name(&self) -> &'static str {
        "ComparisonJoin"
    }

    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.node.join_type.output_refs(self, bind_context)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for condition in &self.node.conditions {
            func(&condition.left)?;
            func(&condition.right)?;
        }
        if let Some(residual) = &self.node.residual {
            func(residual)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for condition in &mut self.node.conditions {
            func(&mut condition.left)?;
            func(&mut condition.right)?;
        }
        if let Some(residual) = &mut self.node.residual {
            func(residual)?;
        }
        Ok(())
    }
}

/// Join on an arbitrary predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalArbitraryJoin {
    pub join_type: JoinType,
    pub condition: Expression,
    pub null_supplying: Vec<TableRef>,
}

impl Explainable for LogicalArbitraryJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("ArbitraryJoin", conf)
            .with_contextual_value("condition", &self.condition)
            .with_value("join_type", self.join_type)
            .with_values_if_verbose("null_supplying", &self.null_supplying)
            .build()
    }
}

impl LogicalNode for Node<LogicalArbitraryJoin> {
    fn name(&self) -> &'static str {
        "ArbitraryJoin"
    }

    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.node.join_type.output_refs(self, bind_context)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        func(&self.node.condition)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        func(&mut self.node.condition)
    }
}

/// Cartesian product of both children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCrossJoin;

impl Explainable for LogicalCrossJoin {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("CrossJoin")
    }
}

impl LogicalNode for Node<LogicalCrossJoin> {
    fn name(&self) -> &'static str {
        "CrossJoin"
    }

    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.get_children_table_refs(bind_context)
    }

    fn for_each_expr<'a, F>(&'a self, _func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, _func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_supplying_sides() {
        assert_eq!((false, true), JoinType::Left.null_supplying());
        assert_eq!((true, false), JoinType::Right.null_supplying());
        assert_eq!((true, true), JoinType::Full.null_supplying());
        assert_eq!((false, false), JoinType::Semi.null_supplying());
    }
}
