use std::collections::HashSet;

use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::maintenance::{MaintenancePlanner, RowImage};
use super::{BoundTarget, DmlBinder, check_not_null, project};
use crate::catalog::privilege::Privileges;
use crate::expr::cast_expr::check_type;
use crate::expr::column_expr::ColumnReference;
use crate::expr::{self, Expression};
use crate::logical::binder::bind_context::{BindContext, BindScopeRef};
use crate::logical::binder::bind_ddl::create_table::find_column;
use crate::logical::binder::bind_query::bind_from::FromBinder;
use crate::logical::binder::column_binder::DefaultColumnBinder;
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext};
use crate::logical::logical_dml::LogicalUpdate;
use crate::logical::logical_guard::LogicalCardinalityGuard;
use crate::logical::logical_join::JoinType;
use crate::logical::operator::{LogicalOperator, Node, NodeFlags};
use crate::logical::planner::filter_pushdown::{FilterPushdown, plan_join_from_conditions};
use crate::logical::planner::plan_from::{FromPlanner, mark_outer_referenced, plan_scan};
use crate::types::datatype::DataType;

impl<'a> DmlBinder<'a> {
    pub fn bind_update(&self, bind_context: &mut BindContext, update: &ast::Update) -> Result<LogicalOperator> {
        let scope = bind_context.new_orphan_scope();
        let target = self.bind_target(bind_context, scope, &update.table, update.alias.as_ref(), "update")?;
        let mut plan = plan_scan(target.table_ref, &target.schema, &target.entry);

        if let Some(from) = &update.from {
            let bound = FromBinder::new(scope, self.ctx).bind(bind_context, Some(from))?;
            let from_plan = FromPlanner.plan(bind_context, bound)?;
            plan = plan_join_from_conditions(
                bind_context,
                JoinType::Inner,
                Vec::new(),
                Vec::new(),
                plan,
                from_plan,
                NodeFlags::default(),
            )?;
        }

        let filters = self.bind_where(bind_context, scope, update.where_expr.as_ref())?;
        plan = FilterPushdown::new(bind_context).push(plan, filters)?;

        let assignments = self.bind_assignments(bind_context, scope, &target, &update.assignments)?;
        let columns: Vec<_> = assignments.iter().map(|(idx, _)| *idx).collect();
        self.require_column_privs(&target.schema, &target.entry, &columns, Privileges::UPDATE)?;

        if update.from.is_some() {
            // Joining FROM may produce a target row more than once.
            plan = LogicalOperator::CardinalityGuard(Node::new(
                LogicalCardinalityGuard::max_one_match(&target.entry.name),
                vec![plan],
            ));
        }
        mark_outer_referenced(bind_context, &mut plan)?;

        self.plan_update_rows(bind_context, &target, plan, assignments)
    }

    /// Bind SET clauses in `scope`, returning the target column and its new
    /// value for each.
    pub(crate) fn bind_assignments(
        &self,
        bind_context: &mut BindContext,
        scope: BindScopeRef,
        target: &BoundTarget,
        assignments: &[ast::Assignment],
    ) -> Result<Vec<(usize, Expression)>> {
        let entry = &target.entry;
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(assignments.len());

        for assignment in assignments {
            let name = assignment.column.as_normalized_string();
            let idx = find_column(&entry.columns, &entry.name, &name)?;
            if !seen.insert(idx) {
                return Err(DbError::invalid_input(format!(
                    "Multiple assignments to column '{name}'"
                ))
                .with_field("column", name));
            }
            let column = &entry.columns[idx];

            let value = match &assignment.value {
                ast::AssignmentValue::Expr(expr) => {
                    let value = BaseExpressionBinder::new(scope, self.ctx).bind_expression(
                        bind_context,
                        expr,
                        &mut DefaultColumnBinder,
                        RecursionContext::new(BindClause::Set),
                    )?;
                    let value =
                        check_type(&column.datatype, value).map_err(|e| e.with_field("column", &column.name))?;
                    check_not_null(column, &value)?;
                    value
                }
                ast::AssignmentValue::Default => self.default_value(bind_context, column)?,
            };
            out.push((idx, value));
        }

        Ok(out)
    }

    /// Plan updating the rows produced by `plan`, which must output the
    /// target's columns.
    pub(crate) fn plan_update_rows(
        &self,
        bind_context: &mut BindContext,
        target: &BoundTarget,
        plan: LogicalOperator,
        assignments: Vec<(usize, Expression)>,
    ) -> Result<LogicalOperator> {
        let entry = &target.entry;
        let columns: Vec<_> = assignments.iter().map(|(idx, _)| *idx).collect();
        let assigned = |col: usize| columns.contains(&col);

        // The full row after the update, keys may cover columns that aren't
        // assigned.
        let mut row = vec![target.row_id_expr()];
        let mut positions = vec![None; entry.columns.len()];
        for (idx, _) in entry.visible_columns() {
            positions[idx] = Some(row.len());
            match assignments.iter().find(|(col, _)| *col == idx) {
                Some((_, value)) => row.push(value.clone()),
                None => row.push(target.column(idx)?),
            }
        }

        let planner = MaintenancePlanner::new(self.ctx, &target.schema, entry);
        let needs_checks = planner.needed(assigned)?;

        let (plan, index_keys, fk_checks) = if needs_checks {
            let (plan, row_table) = project(bind_context, "__update", row, plan)?;
            let image = RowImage {
                table_ref: row_table,
                positions,
            };
            let (plan, maintenance) = planner.plan(bind_context, &image, plan, assigned)?;

            let mut leading = vec![expr::column(ColumnReference::new(row_table, 0), DataType::RowId)];
            for &idx in &columns {
                leading.push(image.column(entry, idx)?);
            }
            let (projections, index_keys, fk_checks) = maintenance.append_to(leading);
            let (plan, _) = project(bind_context, "__update_checked", projections, plan)?;
            (plan, index_keys, fk_checks)
        } else {
            let mut projections = vec![target.row_id_expr()];
            projections.extend(assignments.into_iter().map(|(_, value)| value));
            let (plan, _) = project(bind_context, "__update", projections, plan)?;
            (plan, Vec::new(), Vec::new())
        };

        debug!(
            table = %entry.name,
            columns = columns.len(),
            index_keys = index_keys.len(),
            fk_checks = fk_checks.len(),
            "bound update"
        );

        Ok(LogicalOperator::Update(Node::new(
            LogicalUpdate {
                schema: target.schema.clone(),
                table: entry.name.clone(),
                columns,
                index_keys,
                fk_checks,
            },
            vec![plan],
        )))
    }
}
