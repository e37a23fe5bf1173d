use quarry_error::Result;
use tracing::trace;

use super::plan_query::QueryPlanner;
use crate::compile::CompileContext;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_query::bind_setop::{BoundSetOp, SetOpSide};
use crate::logical::logical_project::LogicalProject;
use crate::logical::logical_setop::LogicalSetop;
use crate::logical::operator::{LogicalOperator, Node, NodeFlags};

#[derive(Debug, Clone, Copy)]
pub struct SetOpPlanner<'a> {
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> SetOpPlanner<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>) -> Self {
        SetOpPlanner { ctx }
    }

    pub fn plan(&self, bind_context: &mut BindContext, setop: BoundSetOp) -> Result<LogicalOperator> {
        let left = self.plan_side(bind_context, setop.left)?;
        let right = self.plan_side(bind_context, setop.right)?;

        trace!(kind = %setop.kind, all = setop.all, "planning set operation");

        // Distinctness is part of the set operation itself.
        Ok(LogicalOperator::SetOp(
            Node::new(
                LogicalSetop {
                    kind: setop.kind,
                    all: setop.all,
                    table_ref: setop.setop_table,
                },
                vec![left, right],
            )
            .with_flags(NodeFlags {
                distinct: !setop.all,
                ..Default::default()
            }),
        ))
    }

    /// Plan one input, adding the projection that casts it to the output
    /// types.
    fn plan_side(&self, bind_context: &mut BindContext, side: SetOpSide) -> Result<LogicalOperator> {
        let plan = QueryPlanner::new(self.ctx).plan(bind_context, *side.query)?;

        Ok(match side.projection {
            Some(projection) => LogicalOperator::Project(Node::new(
                LogicalProject {
                    projections: projection.expressions,
                    projection_table: projection.table,
                },
                vec![plan],
            )),
            None => plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::ast;

    use super::*;
    use crate::logical::binder::bind_query::plan_query;
    use crate::logical::operator::LogicalNode;
    use crate::testutil::Fixture;
    use crate::types::datatype::DataType;

    fn plan(query: ast::QueryNode) -> LogicalOperator {
        let fixture = Fixture::new()
            .with_table("t1", &[("a", DataType::Int32)])
            .with_table("t2", &[("a", DataType::Float64)]);
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let scope = bind_context.root_scope_ref();
        plan_query(&ctx, &mut bind_context, scope, &query).unwrap()
    }

    fn select_a(table: &str) -> ast::QueryNode {
        ast::QueryNode::select(
            ast::SelectNode::new(vec![ast::SelectExpr::Expr(ast::Expr::ident("a"))]).from(ast::FromNode::table(table)),
        )
    }

    #[test]
    fn union_distinct_casts_left() {
        let plan = plan(ast::QueryNode::set_op(select_a("t1"), ast::SetOperation::Union, false, select_a("t2")));

        let setop = &plan;
        assert_eq!("SetOp", setop.name());
        assert!(setop.flags().distinct);
        // Int32 side is cast to Float64.
        assert_eq!("Project", setop.children()[0].name());
        assert_eq!("Project", setop.children()[1].name());
        assert_eq!("Scan", setop.children()[1].children()[0].name());
    }

    #[test]
    fn except_all_keeps_duplicates() {
        let plan = plan(ast::QueryNode::set_op(select_a("t1"), ast::SetOperation::Except, true, select_a("t1")));
        assert_eq!("SetOp", plan.name());
        assert!(!plan.flags().distinct);
    }
}
