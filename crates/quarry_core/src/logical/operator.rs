use std::fmt;

use quarry_error::{DbError, Result};

use super::binder::bind_context::{BindContext, TableRef};
use super::logical_aggregate::LogicalAggregate;
use super::logical_call::LogicalCall;
use super::logical_copy::{LogicalCopyFrom, LogicalCopyTo};
use super::logical_ddl::LogicalDdl;
use super::logical_distinct::LogicalDistinct;
use super::logical_dml::{LogicalDelete, LogicalInsert, LogicalTruncate, LogicalUpdate};
use super::logical_empty::{LogicalNoRows, LogicalSingleRow};
use super::logical_explain::LogicalExplain;
use super::logical_expression_list::LogicalExpressionList;
use super::logical_filter::LogicalFilter;
use super::logical_guard::{LogicalCardinalityGuard, LogicalCascade};
use super::logical_join::{LogicalArbitraryJoin, LogicalComparisonJoin, LogicalCrossJoin};
use super::logical_limit::{LogicalLimit, LogicalSample};
use super::logical_order::LogicalOrder;
use super::logical_project::LogicalProject;
use super::logical_scan::LogicalScan;
use super::logical_session::{LogicalDeclare, LogicalSetVariable, LogicalTransaction};
use super::logical_setop::LogicalSetop;
use super::logical_table_function::LogicalTableFunction;
use super::logical_window::LogicalWindow;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, ExplainValue, Explainable};
use crate::expr::Expression;

/// Bounds on the number of rows a node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    /// Always empty.
    NoRows,
    /// Zero or one row.
    AtMostOne,
    /// One row per group.
    Aggregated,
    #[default]
    MultiRow,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRows => write!(f, "NoRows"),
            Self::AtMostOne => write!(f, "AtMostOne"),
            Self::Aggregated => write!(f, "Aggregated"),
            Self::MultiRow => write!(f, "MultiRow"),
        }
    }
}

/// Properties attached to every node in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeFlags {
    /// Output rows are distinct.
    pub distinct: bool,
    /// Right side of a join is evaluated per row of the left side (LATERAL).
    pub dependent: bool,
    /// Node has been visited by the planner and needs no further rewriting.
    pub processed: bool,
    /// Node produces exactly one row.
    pub single_row: bool,
    /// Columns produced by this node are referenced from an inner query.
    pub outer_referenced: bool,
}

impl NodeFlags {
    pub const fn is_empty(&self) -> bool {
        !(self.distinct || self.dependent || self.processed || self.single_row || self.outer_referenced)
    }
}

impl fmt::Display for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = Vec::new();
        if self.distinct {
            set.push("distinct");
        }
        if self.dependent {
            set.push("dependent");
        }
        if self.processed {
            set.push("processed");
        }
        if self.single_row {
            set.push("single_row");
        }
        if self.outer_referenced {
            set.push("outer_referenced");
        }
        write!(f, "[{}]", set.join(", "))
    }
}

/// Common operations across all logical nodes in a plan.
///
/// For individual operators, this should be implemented on `Node<T>` and not
/// `T`.
pub trait LogicalNode {
    /// Name of the operator.
    fn name(&self) -> &'static str;

    /// Table refs making up the output of this operator.
    ///
    /// Expressions in a node may only reference the output refs of its direct
    /// children, or columns at depth > 0 belonging to an enclosing query.
    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef>;

    fn for_each_expr<'a, F>(&'a self, func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>;

    fn for_each_expr_mut<'a, F>(&'a mut self, func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>;
}

/// Wrapper around nodes in the logical plan holding metadata common to all
/// nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<N> {
    pub node: N,
    pub flags: NodeFlags,
    pub cardinality: Cardinality,
    /// Inputs to this node. A plan is a tree, every child has exactly one
    /// parent.
    pub children: Vec<LogicalOperator>,
}

impl<N> Node<N> {
    pub fn new(node: N, children: Vec<LogicalOperator>) -> Self {
        Node {
            node,
            flags: NodeFlags::default(),
            cardinality: Cardinality::default(),
            children,
        }
    }

    pub fn leaf(node: N) -> Self {
        Self::new(node, Vec::new())
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn into_inner(self) -> N {
        self.node
    }

    pub fn take_one_child_exact(&mut self) -> Result<LogicalOperator> {
        if self.children.len() != 1 {
            return Err(DbError::new(format!(
                "Expected 1 child to operator, have {}",
                self.children.len()
            )));
        }
        self.children
            .pop()
            .ok_or_else(|| DbError::new("Missing child"))
    }

    pub fn take_two_children_exact(&mut self) -> Result<[LogicalOperator; 2]> {
        if self.children.len() != 2 {
            return Err(DbError::new(format!(
                "Expected 2 children to operator, have {}",
                self.children.len()
            )));
        }

        let second = self
            .children
            .pop()
            .ok_or_else(|| DbError::new("Missing right child"))?;
        let first = self
            .children
            .pop()
            .ok_or_else(|| DbError::new("Missing left child"))?;

        Ok([first, second])
    }

    pub fn get_one_child_exact(&self) -> Result<&LogicalOperator> {
        if self.children.len() != 1 {
            return Err(DbError::new(format!(
                "Expected 1 child to operator, have {}",
                self.children.len()
            )));
        }
        Ok(&self.children[0])
    }

    pub fn get_nth_child(&self, n: usize) -> Result<&LogicalOperator> {
        self.children.get(n).ok_or_else(|| {
            DbError::new(format!(
                "Expected at least {} children, got {}",
                n + 1,
                self.children.len()
            ))
        })
    }

    pub fn get_nth_child_mut(&mut self, n: usize) -> Result<&mut LogicalOperator> {
        let len = self.children.len();
        self.children.get_mut(n).ok_or_else(|| {
            DbError::new(format!("Expected at least {} children, got {len}", n + 1))
        })
    }

    /// Get all table refs from the immediate children of this node.
    pub fn get_children_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.children.iter().fold(Vec::new(), |mut refs, child| {
            refs.append(&mut child.get_output_table_refs(bind_context));
            refs
        })
    }
}

impl<N> Explainable for Node<N>
where
    N: Explainable,
    Node<N>: LogicalNode,
{
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut ent = self.node.explain_entry(conf);

        if conf.verbose {
            ent.items.insert(
                "cardinality".to_string(),
                ExplainValue::Value(self.cardinality.to_string()),
            );
            if !self.flags.is_empty() {
                ent.items.insert(
                    "flags".to_string(),
                    ExplainValue::Value(self.flags.to_string()),
                );
            }
        } else if self.flags.dependent {
            ent.items.insert(
                "dependent".to_string(),
                ExplainValue::Value("true".to_string()),
            );
        }

        ent
    }
}

impl<N> AsRef<N> for Node<N> {
    fn as_ref(&self) -> &N {
        &self.node
    }
}

impl<N> AsMut<N> for Node<N> {
    fn as_mut(&mut self) -> &mut N {
        &mut self.node
    }
}

/// Implements the per-variant dispatch for `LogicalOperator`.
macro_rules! dispatch {
    ($self:expr, $n:ident => $body:expr) => {
        match $self {
            LogicalOperator::Project($n) => $body,
            LogicalOperator::Filter($n) => $body,
            LogicalOperator::Scan($n) => $body,
            LogicalOperator::CrossJoin($n) => $body,
            LogicalOperator::ComparisonJoin($n) => $body,
            LogicalOperator::ArbitraryJoin($n) => $body,
            LogicalOperator::SetOp($n) => $body,
            LogicalOperator::Aggregate($n) => $body,
            LogicalOperator::Order($n) => $body,
            LogicalOperator::Limit($n) => $body,
            LogicalOperator::Sample($n) => $body,
            LogicalOperator::Distinct($n) => $body,
            LogicalOperator::Window($n) => $body,
            LogicalOperator::ExpressionList($n) => $body,
            LogicalOperator::SingleRow($n) => $body,
            LogicalOperator::NoRows($n) => $body,
            LogicalOperator::TableFunction($n) => $body,
            LogicalOperator::CardinalityGuard($n) => $body,
            LogicalOperator::Cascade($n) => $body,
            LogicalOperator::Ddl($n) => $body,
            LogicalOperator::Insert($n) => $body,
            LogicalOperator::Update($n) => $body,
            LogicalOperator::Delete($n) => $body,
            LogicalOperator::Truncate($n) => $body,
            LogicalOperator::CopyFrom($n) => $body,
            LogicalOperator::CopyTo($n) => $body,
            LogicalOperator::Transaction($n) => $body,
            LogicalOperator::Declare($n) => $body,
            LogicalOperator::SetVariable($n) => $body,
            LogicalOperator::Call($n) => $body,
            LogicalOperator::Explain($n) => $body,
        }
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    Project(Node<LogicalProject>),
    Filter(Node<LogicalFilter>),
    Scan(Node<LogicalScan>),
    CrossJoin(Node<LogicalCrossJoin>),
    ComparisonJoin(Node<LogicalComparisonJoin>),
    ArbitraryJoin(Node<LogicalArbitraryJoin>),
    SetOp(Node<LogicalSetop>),
    Aggregate(Node<LogicalAggregate>),
    Order(Node<LogicalOrder>),
    Limit(Node<LogicalLimit>),
    Sample(Node<LogicalSample>),
    Distinct(Node<LogicalDistinct>),
    Window(Node<LogicalWindow>),
    ExpressionList(Node<LogicalExpressionList>),
    SingleRow(Node<LogicalSingleRow>),
    NoRows(Node<LogicalNoRows>),
    TableFunction(Node<LogicalTableFunction>),
    CardinalityGuard(Node<LogicalCardinalityGuard>),
    Cascade(Node<LogicalCascade>),
    Ddl(Node<LogicalDdl>),
    Insert(Node<LogicalInsert>),
    Update(Node<LogicalUpdate>),
    Delete(Node<LogicalDelete>),
    Truncate(Node<LogicalTruncate>),
    CopyFrom(Node<LogicalCopyFrom>),
    CopyTo(Node<LogicalCopyTo>),
    Transaction(Node<LogicalTransaction>),
    Declare(Node<LogicalDeclare>),
    SetVariable(Node<LogicalSetVariable>),
    Call(Node<LogicalCall>),
    Explain(Node<LogicalExplain>),
}

impl LogicalOperator {
    pub(crate) const SINGLE_ROW: LogicalOperator = LogicalOperator::SingleRow(Node {
        node: LogicalSingleRow,
        flags: NodeFlags {
            distinct: false,
            dependent: false,
            processed: false,
            single_row: true,
            outer_referenced: false,
        },
        cardinality: Cardinality::AtMostOne,
        children: Vec::new(),
    });

    /// Take the operator, leaving a single row placeholder in its place.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::SINGLE_ROW)
    }

    pub fn take_boxed(self: &mut Box<Self>) -> Box<Self> {
        std::mem::replace(self, Box::new(Self::SINGLE_ROW))
    }

    pub fn children(&self) -> &[LogicalOperator] {
        dispatch!(self, n => &n.children)
    }

    pub fn children_mut(&mut self) -> &mut Vec<LogicalOperator> {
        dispatch!(self, n => &mut n.children)
    }

    pub fn flags(&self) -> &NodeFlags {
        dispatch!(self, n => &n.flags)
    }

    pub fn flags_mut(&mut self) -> &mut NodeFlags {
        dispatch!(self, n => &mut n.flags)
    }

    pub fn cardinality(&self) -> Cardinality {
        dispatch!(self, n => n.cardinality)
    }

    pub fn set_cardinality(&mut self, cardinality: Cardinality) {
        dispatch!(self, n => n.cardinality = cardinality)
    }

    /// Replaces the children in the operator by running them through `modify`.
    ///
    /// Children will be left in an undetermined state if `modify` errors.
    pub fn modify_replace_children<F>(&mut self, modify: &mut F) -> Result<()>
    where
        F: FnMut(LogicalOperator) -> Result<LogicalOperator>,
    {
        let children = self.children_mut();
        let mut new_children = Vec::with_capacity(children.len());

        for child in children.drain(..) {
            new_children.push(modify(child)?);
        }

        *children = new_children;

        Ok(())
    }

    /// Visit this operator and all of its descendants, parents first.
    pub fn walk<F>(&self, func: &mut F) -> Result<()>
    where
        F: FnMut(&LogicalOperator) -> Result<()>,
    {
        func(self)?;
        for child in self.children() {
            child.walk(func)?;
        }
        Ok(())
    }

    pub fn walk_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut LogicalOperator) -> Result<()>,
    {
        func(self)?;
        for child in self.children_mut() {
            child.walk_mut(func)?;
        }
        Ok(())
    }

    pub fn is_project(&self) -> bool {
        matches!(self, LogicalOperator::Project(_))
    }

    /// Number of nodes in this plan, including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }
}

impl LogicalNode for LogicalOperator {
    fn name(&self) -> &'static str {
        dispatch!(self, n => n.name())
    }

    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        dispatch!(self, n => n.get_output_table_refs(bind_context))
    }

    fn for_each_expr<'a, F>(&'a self, func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        dispatch!(self, n => n.for_each_expr(func))
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        dispatch!(self, n => n.for_each_expr_mut(func))
    }
}

impl Explainable for LogicalOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        dispatch!(self, n => n.explain_entry(conf))
    }
}

/// Implements `LogicalNode` for nodes without expressions whose output is the
/// output of their children.
macro_rules! impl_passthrough_node {
    ($node:ty, $name:expr) => {
        impl $crate::logical::operator::LogicalNode for $crate::logical::operator::Node<$node> {
            fn name(&self) -> &'static str {
                $name
            }

            fn get_output_table_refs(
                &self,
                bind_context: &$crate::logical::binder::bind_context::BindContext,
            ) -> Vec<$crate::logical::binder::bind_context::TableRef> {
                self.get_children_table_refs(bind_context)
            }

            fn for_each_expr<'a, F>(&'a self, _func: F) -> quarry_error::Result<()>
            where
                F: FnMut(&'a $crate::expr::Expression) -> quarry_error::Result<()>,
            {
                Ok(())
            }

            fn for_each_expr_mut<'a, F>(&'a mut self, _func: F) -> quarry_error::Result<()>
            where
                F: FnMut(&'a mut $crate::expr::Expression) -> quarry_error::Result<()>,
            {
                Ok(())
            }
        }
    };
}

/// Implements `LogicalNode` for nodes without expressions and without output
/// columns (statements with only side effects).
macro_rules! impl_no_output_node {
    ($node:ty, $name:expr) => {
        impl $crate::logical::operator::LogicalNode for $crate::logical::operator::Node<$node> {
            fn name(&self) -> &'static str {
                $name
            }

            fn get_output_table_refs(
                &self,
                _bind_context: &$crate::logical::binder::bind_context::BindContext,
            ) -> Vec<$crate::logical::binder::bind_context::TableRef> {
                Vec::new()
            }

            fn for_each_expr<'a, F>(&'a self, _func: F) -> quarry_error::Result<()>
            where
                F: FnMut(&'a $crate::expr::Expression) -> quarry_error::Result<()>,
            {
                Ok(())
            }

            fn for_each_expr_mut<'a, F>(&'a mut self, _func: F) -> quarry_error::Result<()>
            where
                F: FnMut(&'a mut $crate::expr::Expression) -> quarry_error::Result<()>,
            {
                Ok(())
            }
        }
    };
}

pub(crate) use {impl_no_output_node, impl_passthrough_node};
