use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::{debug, trace};

use super::{BoundTarget, DmlBinder, resolve_column_list};
use crate::catalog::privilege::Privileges;
use crate::expr::Expression;
use crate::expr::cast_expr::check_type;
use crate::functions::builtin::boolean::{FUNCTION_SET_IS_NOT_TRUE, FUNCTION_SET_IS_NULL};
use crate::logical::binder::bind_context::{BindContext, BindScopeRef};
use crate::logical::binder::bind_query::bind_from::FromBinder;
use crate::logical::binder::column_binder::DefaultColumnBinder;
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext, scalar_call};
use crate::logical::logical_guard::{LogicalCardinalityGuard, LogicalCascade};
use crate::logical::logical_join::JoinType;
use crate::logical::operator::{LogicalNode, LogicalOperator, Node, NodeFlags};
use crate::logical::planner::filter_pushdown::{JoinConditionExtractor, filter_above, plan_join_from_conditions};
use crate::logical::planner::plan_from::{FromPlanner, mark_outer_referenced, plan_scan};
use crate::types::datatype::DataType;

/// Action of a WHEN MATCHED clause.
#[derive(Debug, Clone, Copy)]
enum MatchedAction<'a> {
    Update(&'a [ast::Assignment]),
    Delete,
}

impl MatchedAction<'_> {
    const fn clause_name(&self) -> &'static str {
        match self {
            Self::Update(_) => "WHEN MATCHED THEN UPDATE",
            Self::Delete => "WHEN MATCHED THEN DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MatchedClause<'a> {
    condition: Option<&'a ast::Expr>,
    action: MatchedAction<'a>,
}

/// The WHEN clauses of a MERGE, at most one of each kind.
///
/// Matched clauses keep their written order. A target row is handled by the
/// first matched clause whose condition holds.
#[derive(Debug, Default)]
struct MergeClauses<'a> {
    matched: Vec<MatchedClause<'a>>,
    insert: Option<(Option<&'a ast::Expr>, &'a [ast::Ident], &'a ast::MergeInsertValues)>,
}

impl<'a> MergeClauses<'a> {
    fn collect(clauses: &'a [ast::MergeClause]) -> Result<Self> {
        let mut out = MergeClauses::default();
        for clause in clauses {
            match clause {
                ast::MergeClause::Matched { condition, action } => {
                    let action = match action {
                        ast::MergeMatchedAction::Update(assignments) => MatchedAction::Update(assignments),
                        ast::MergeMatchedAction::Delete => MatchedAction::Delete,
                    };
                    let duplicate = out
                        .matched
                        .iter()
                        .any(|m| std::mem::discriminant(&m.action) == std::mem::discriminant(&action));
                    if duplicate {
                        return Err(DbError::unsupported(format!(
                            "MERGE with more than one {} clause",
                            action.clause_name()
                        )));
                    }
                    if let Some(earlier) = out.matched.iter().find(|m| m.condition.is_none()) {
                        return Err(DbError::invalid_input(format!(
                            "{} can never apply, every matched row is handled by the unconditional {} before it",
                            action.clause_name(),
                            earlier.action.clause_name()
                        )));
                    }
                    out.matched.push(MatchedClause {
                        condition: condition.as_ref(),
                        action,
                    });
                }
                ast::MergeClause::NotMatched {
                    condition,
                    columns,
                    values,
                } => {
                    if out.insert.replace((condition.as_ref(), columns.as_slice(), values)).is_some() {
                        return Err(DbError::unsupported(
                            "MERGE with more than one WHEN NOT MATCHED THEN INSERT clause",
                        ));
                    }
                }
            }
        }

        if out.matched.is_empty() && out.insert.is_none() {
            return Err(DbError::invalid_input("MERGE requires at least one WHEN clause"));
        }
        Ok(out)
    }
}

impl<'a> DmlBinder<'a> {
    /// Plan a MERGE as a cascade of one branch per WHEN clause: the matched
    /// clauses in written order, then the insert.
    ///
    /// Each branch joins the target and source on its own, so every branch
    /// sees the target as it was before the statement. A matched branch also
    /// excludes the rows taken by the matched clauses written before it.
    pub fn bind_merge(&self, bind_context: &mut BindContext, merge: &ast::Merge) -> Result<LogicalOperator> {
        let clauses = MergeClauses::collect(&merge.clauses)?;
        let mut branches = Vec::new();

        for (idx, clause) in clauses.matched.iter().enumerate() {
            let earlier: Vec<_> = clauses.matched[..idx].iter().filter_map(|m| m.condition).collect();
            let (scope, target, plan) = self.plan_matched(bind_context, merge, clause.condition, &earlier)?;

            let branch = match clause.action {
                MatchedAction::Update(assignments) => {
                    let assignments = self.bind_assignments(bind_context, scope, &target, assignments)?;
                    let columns: Vec<_> = assignments.iter().map(|(idx, _)| *idx).collect();
                    self.require_column_privs(&target.schema, &target.entry, &columns, Privileges::UPDATE)?;
                    self.plan_update_rows(bind_context, &target, plan, assignments)?
                }
                MatchedAction::Delete => {
                    self.require_table_privs(&target.schema, &target.entry.name, Privileges::DELETE)?;
                    self.plan_delete_rows(bind_context, &target, plan)?
                }
            };
            branches.push(branch);
        }

        if let Some((condition, columns, values)) = clauses.insert {
            branches.push(self.plan_not_matched(bind_context, merge, condition, columns, values)?);
        }

        debug!(
            target = %merge.target,
            branches = ?branches.iter().map(|b| b.name()).collect::<Vec<_>>(),
            "bound merge"
        );

        Ok(LogicalOperator::Cascade(Node::new(
            LogicalCascade {
                label: "merge".to_string(),
            },
            branches,
        )))
    }

    /// Target rows with a matching source row.
    ///
    /// Rows where any of the `earlier` conditions holds belong to an earlier
    /// clause. A NULL condition doesn't hold.
    fn plan_matched(
        &self,
        bind_context: &mut BindContext,
        merge: &ast::Merge,
        condition: Option<&ast::Expr>,
        earlier: &[&ast::Expr],
    ) -> Result<(BindScopeRef, BoundTarget, LogicalOperator)> {
        let (scope, target, plan) = self.plan_merge_join(bind_context, merge, JoinType::Inner)?;
        let plan = LogicalOperator::CardinalityGuard(Node::new(
            LogicalCardinalityGuard::max_one_match(&target.entry.name),
            vec![plan],
        ));

        let mut filters = Vec::with_capacity(earlier.len() + 1);
        for &earlier in earlier {
            let taken = self.bind_where(bind_context, scope, Some(earlier))?;
            if let Some(taken) = Expression::and_all(taken)? {
                filters.push(scalar_call(&FUNCTION_SET_IS_NOT_TRUE, vec![taken])?);
            }
        }
        filters.extend(self.bind_where(bind_context, scope, condition)?);
        trace!(earlier = earlier.len(), filters = filters.len(), "filtered matched branch");
        let mut plan = filter_above(plan, filters)?;
        mark_outer_referenced(bind_context, &mut plan)?;
        Ok((scope, target, plan))
    }

    /// Insert source rows without a matching target row.
    fn plan_not_matched(
        &self,
        bind_context: &mut BindContext,
        merge: &ast::Merge,
        condition: Option<&ast::Expr>,
        columns: &[ast::Ident],
        values: &ast::MergeInsertValues,
    ) -> Result<LogicalOperator> {
        let (scope, target, plan) = self.plan_merge_join(bind_context, merge, JoinType::Left)?;
        let entry = target.entry.clone();

        let plan = LogicalOperator::CardinalityGuard(Node::new(
            LogicalCardinalityGuard::row_count_unchanged(&entry.name),
            vec![plan],
        ));

        let mut filters = vec![scalar_call(&FUNCTION_SET_IS_NULL, vec![target.row_id_expr()])?];
        filters.extend(self.bind_where(bind_context, scope, condition)?);
        let mut plan = filter_above(plan, filters)?;

        let provided = match values {
            ast::MergeInsertValues::Values(exprs) => {
                let targets = if columns.is_empty() {
                    entry.visible_columns().map(|(idx, _)| idx).collect()
                } else {
                    resolve_column_list(&entry, columns)?
                };
                if targets.len() != exprs.len() {
                    return Err(DbError::arity_mismatch(format!(
                        "MERGE INSERT has {} target columns but {} values",
                        targets.len(),
                        exprs.len()
                    ))
                    .with_field("table", &entry.name));
                }
                self.require_column_privs(&target.schema, &entry, &targets, Privileges::INSERT)?;

                let mut provided = Vec::with_capacity(exprs.len());
                for (&col, expr) in targets.iter().zip(exprs) {
                    let value = BaseExpressionBinder::new(scope, self.ctx).bind_expression(
                        bind_context,
                        expr,
                        &mut DefaultColumnBinder,
                        RecursionContext::new(BindClause::Values),
                    )?;
                    if value.get_table_references().contains(&target.table_ref) {
                        return Err(DbError::invalid_input(
                            "Values inserted by WHEN NOT MATCHED cannot reference the target table",
                        )
                        .with_field("table", &entry.name));
                    }
                    provided.push((col, value));
                }
                provided
            }
            ast::MergeInsertValues::DefaultValues => {
                if !columns.is_empty() {
                    return Err(DbError::invalid_input(
                        "A column list can't be combined with DEFAULT VALUES",
                    ));
                }
                self.require_table_privs(&target.schema, &entry.name, Privileges::INSERT)?;
                Vec::new()
            }
        };

        mark_outer_referenced(bind_context, &mut plan)?;
        self.plan_insert_rows(bind_context, &target.schema, &entry, plan, provided)
    }

    /// Bind the target and source in a new scope and join them on the ON
    /// condition.
    ///
    /// Inner joins put the target on the left, left joins put the source on
    /// the left so unmatched source rows are kept.
    fn plan_merge_join(
        &self,
        bind_context: &mut BindContext,
        merge: &ast::Merge,
        join_type: JoinType,
    ) -> Result<(BindScopeRef, BoundTarget, LogicalOperator)> {
        let scope = bind_context.new_orphan_scope();
        let target = self.bind_target(bind_context, scope, &merge.target, merge.target_alias.as_ref(), "merge into")?;
        let target_plan = plan_scan(target.table_ref, &target.schema, &target.entry);

        let source = FromBinder::new(scope, self.ctx).bind(bind_context, Some(&merge.source))?;
        let source_plan = FromPlanner.plan(bind_context, source)?;

        let on = BaseExpressionBinder::new(scope, self.ctx).bind_expression(
            bind_context,
            &merge.on,
            &mut DefaultColumnBinder,
            RecursionContext::new(BindClause::JoinOn),
        )?;
        let on = check_type(&DataType::Boolean, on)?;

        let (left, right) = match join_type {
            JoinType::Left => (source_plan, target_plan),
            _ => (target_plan, source_plan),
        };
        let left_tables = left.get_output_table_refs(bind_context);
        let right_tables = right.get_output_table_refs(bind_context);
        let extracted = JoinConditionExtractor::new(&left_tables, &right_tables, join_type).extract(vec![on])?;

        trace!(
            %join_type,
            comparisons = extracted.comparisons.len(),
            arbitrary = extracted.arbitrary.len(),
            "planned merge join"
        );

        let left = filter_above(left, extracted.left_filter)?;
        let right = filter_above(right, extracted.right_filter)?;
        let plan = plan_join_from_conditions(
            bind_context,
            join_type,
            extracted.comparisons,
            extracted.arbitrary,
            left,
            right,
            NodeFlags::default(),
        )?;

        Ok((scope, target, plan))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::bind_ddl::testutil::compile;
    use crate::logical::binder::bind_dml::testutil::find;
    use crate::testutil::Fixture;

    fn fixture() -> Fixture {
        Fixture::new()
            .with_table("t", &[("id", DataType::Int32), ("v", DataType::UTF8)])
            .with_table("s", &[("id", DataType::Int32), ("v", DataType::UTF8)])
    }

    fn merge(clauses: Vec<ast::MergeClause>) -> Statement {
        Statement::Merge(ast::Merge {
            target: ast::ObjectReference::from("t"),
            target_alias: None,
            source: ast::FromNode::table("s"),
            on: ast::Expr::eq(ast::Expr::compound(&["t", "id"]), ast::Expr::compound(&["s", "id"])),
            clauses,
        })
    }

    fn update_clause() -> ast::MergeClause {
        ast::MergeClause::Matched {
            condition: None,
            action: ast::MergeMatchedAction::Update(vec![ast::Assignment::new("v", ast::Expr::compound(&["s", "v"]))]),
        }
    }

    fn insert_clause(values: Vec<ast::Expr>) -> ast::MergeClause {
        ast::MergeClause::NotMatched {
            condition: None,
            columns: Vec::new(),
            values: ast::MergeInsertValues::Values(values),
        }
    }

    fn has_guard(plan: &LogicalOperator) -> bool {
        find(plan, &|op| matches!(op, LogicalOperator::CardinalityGuard(_))).is_some()
    }

    #[test]
    fn update_and_insert_branches() {
        let fixture = fixture();
        let compiled = compile(
            &fixture,
            merge(vec![
                update_clause(),
                insert_clause(vec![ast::Expr::compound(&["s", "id"]), ast::Expr::compound(&["s", "v"])]),
            ]),
        )
        .unwrap();

        let LogicalOperator::Cascade(cascade) = &compiled.plan else {
            panic!("expected cascade, got {:?}", compiled.plan);
        };
        assert_eq!("merge", cascade.node.label);
        assert_eq!(2, cascade.children.len());

        let updates: Vec<_> = cascade
            .children
            .iter()
            .filter(|c| matches!(c, LogicalOperator::Update(_)))
            .collect();
        let inserts: Vec<_> = cascade
            .children
            .iter()
            .filter(|c| matches!(c, LogicalOperator::Insert(_)))
            .collect();
        assert_eq!(1, updates.len());
        assert_eq!(1, inserts.len());
        assert!(has_guard(updates[0]));
        assert!(has_guard(inserts[0]));
    }

    fn matched_when(condition: Option<ast::Expr>, action: ast::MergeMatchedAction) -> ast::MergeClause {
        ast::MergeClause::Matched { condition, action }
    }

    fn source_v_is(value: &str) -> ast::Expr {
        ast::Expr::eq(ast::Expr::compound(&["s", "v"]), ast::Expr::string(value))
    }

    fn set_v() -> ast::MergeMatchedAction {
        ast::MergeMatchedAction::Update(vec![ast::Assignment::new("v", ast::Expr::compound(&["s", "v"]))])
    }

    /// Names of the functions in the branch's filter, outermost first.
    fn filter_functions(branch: &LogicalOperator) -> Vec<&'static str> {
        fn collect(expr: &Expression, names: &mut Vec<&'static str>) -> Result<()> {
            if let Expression::ScalarFunction(func) = expr {
                names.push(func.function.name);
            }
            expr.for_each_child(&mut |child| collect(child, names))
        }

        let mut names = Vec::new();
        if let Some(LogicalOperator::Filter(filter)) = find(branch, &|op| matches!(op, LogicalOperator::Filter(_))) {
            collect(&filter.node.filter, &mut names).unwrap();
        }
        names
    }

    #[test]
    fn later_matched_clause_skips_rows_of_earlier_one() {
        let fixture = fixture();
        let compiled = compile(
            &fixture,
            merge(vec![
                matched_when(Some(source_v_is("keep")), set_v()),
                matched_when(None, ast::MergeMatchedAction::Delete),
            ]),
        )
        .unwrap();

        let children = compiled.plan.children();
        assert_eq!(2, children.len());
        assert!(matches!(children[0], LogicalOperator::Update(_)));
        assert!(matches!(children[1], LogicalOperator::Delete(_)));

        assert!(!filter_functions(&children[0]).contains(&"is_not_true"));
        assert_eq!(vec!["is_not_true"], filter_functions(&children[1]));

        for branch in children {
            match find(branch, &|op| matches!(op, LogicalOperator::ComparisonJoin(_))) {
                Some(LogicalOperator::ComparisonJoin(join)) => assert_eq!(JoinType::Inner, join.node.join_type),
                other => panic!("expected join, got {other:?}"),
            }
        }
    }

    #[test]
    fn matched_branches_follow_clause_order() {
        let fixture = fixture();
        let compiled = compile(
            &fixture,
            merge(vec![
                matched_when(Some(source_v_is("gone")), ast::MergeMatchedAction::Delete),
                matched_when(Some(source_v_is("new")), set_v()),
            ]),
        )
        .unwrap();

        let children = compiled.plan.children();
        assert!(matches!(children[0], LogicalOperator::Delete(_)));
        assert!(matches!(children[1], LogicalOperator::Update(_)));

        assert!(!filter_functions(&children[0]).contains(&"is_not_true"));
        let update_filter = filter_functions(&children[1]);
        assert!(update_filter.contains(&"is_not_true"), "{update_filter:?}");
    }

    #[test]
    fn clause_after_unconditional_match_is_unreachable() {
        let fixture = fixture();
        let err = compile(
            &fixture,
            merge(vec![
                update_clause(),
                matched_when(Some(source_v_is("gone")), ast::MergeMatchedAction::Delete),
            ]),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn insert_branch_uses_left_join() {
        let fixture = fixture();
        let compiled = compile(
            &fixture,
            merge(vec![insert_clause(vec![ast::Expr::compound(&["s", "id"]), ast::Expr::null()])]),
        )
        .unwrap();
        let join = find(&compiled.plan, &|op| matches!(op, LogicalOperator::ComparisonJoin(_)));
        match join {
            Some(LogicalOperator::ComparisonJoin(join)) => assert_eq!(JoinType::Left, join.node.join_type),
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn insert_values_cannot_reference_target() {
        let fixture = fixture();
        let err = compile(
            &fixture,
            merge(vec![insert_clause(vec![ast::Expr::compound(&["t", "id"]), ast::Expr::compound(&["s", "v"])])]),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn clause_errors() {
        let fixture = fixture();

        let err = compile(&fixture, merge(Vec::new())).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());

        let err = compile(&fixture, merge(vec![update_clause(), update_clause()])).unwrap_err();
        assert_eq!(ErrorKind::UnsupportedConstruct, err.kind());

        let err = compile(&fixture, merge(vec![insert_clause(vec![ast::Expr::compound(&["s", "id"])])])).unwrap_err();
        assert_eq!(ErrorKind::ArityMismatch, err.kind());
    }
}
