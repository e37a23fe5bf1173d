use quarry_error::{DbError, Result};

use crate::expr::Expression;
use crate::logical::binder::bind_context::{BindContext, TableRef};
use crate::logical::operator::{LogicalNode, LogicalOperator};
use crate::types::datatype::DataType;

/// Checks a finished plan is well formed.
///
/// Every local column must come from a direct child of the node using it,
/// exist in its table, and carry the table's type for that column. Since an
/// aggregate only outputs its group and aggregate tables, this also checks
/// nothing above it reads ungrouped columns.
#[derive(Debug, Clone, Copy)]
pub struct PlanVerifier<'a> {
    bind_context: &'a BindContext,
}

impl<'a> PlanVerifier<'a> {
    pub const fn new(bind_context: &'a BindContext) -> Self {
        PlanVerifier { bind_context }
    }

    pub fn verify(&self, plan: &LogicalOperator) -> Result<()> {
        plan.walk(&mut |op| self.verify_node(op))
    }

    fn verify_node(&self, op: &LogicalOperator) -> Result<()> {
        let mut allowed = Vec::new();
        for child in op.children() {
            allowed.extend(child.get_output_table_refs(self.bind_context));
        }

        let name = op.name();
        op.for_each_expr(|expr| self.verify_expr(name, expr, &allowed))?;

        if let LogicalOperator::Filter(filter) = op {
            let datatype = filter.node.filter.datatype();
            if datatype != DataType::Boolean {
                return Err(DbError::new(format!("Filter predicate has type {datatype}, expected BOOLEAN")));
            }
        }

        Ok(())
    }

    fn verify_expr(&self, node: &str, expr: &Expression, allowed: &[TableRef]) -> Result<()> {
        match expr {
            Expression::Column(col) if col.depth == 0 => {
                let table_ref = col.reference.table_scope;
                if !allowed.contains(&table_ref) {
                    return Err(DbError::new(format!(
                        "{node} references {table_ref} which isn't produced by its inputs"
                    ))
                    .with_field("column", col.reference.column));
                }

                let table = self.bind_context.get_table(table_ref)?;
                match table.column_types.get(col.reference.column) {
                    Some(datatype) if datatype == &col.datatype => (),
                    Some(datatype) => {
                        return Err(DbError::new(format!(
                            "{node} reads column {} of {table_ref} as {}, but the column is {datatype}",
                            col.reference.column, col.datatype
                        )));
                    }
                    None => {
                        return Err(DbError::new(format!(
                            "{node} references column {} of {table_ref}, which only has {} columns",
                            col.reference.column,
                            table.num_columns()
                        )));
                    }
                }
            }
            Expression::Subquery(subquery) => self.verify(&subquery.subquery)?,
            _ => (),
        }

        expr.for_each_child(&mut |child| self.verify_expr(node, child, allowed))
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::expr::column_expr::{ColumnExpr, ColumnReference};
    use crate::logical::logical_empty::LogicalNoRows;
    use crate::logical::logical_project::LogicalProject;
    use crate::logical::operator::Node;

    fn setup() -> (BindContext, TableRef, TableRef) {
        let mut bind_context = BindContext::new();
        let input = bind_context
            .new_ephemeral_table_from_types("input", vec![DataType::Int32])
            .unwrap();
        let output = bind_context
            .new_ephemeral_table_from_types("output", vec![DataType::Int32])
            .unwrap();
        (bind_context, input, output)
    }

    fn project(input: TableRef, output: TableRef, expr: Expression) -> LogicalOperator {
        LogicalOperator::Project(Node::new(
            LogicalProject {
                projections: vec![expr],
                projection_table: output,
            },
            vec![LogicalOperator::NoRows(Node::leaf(LogicalNoRows {
                table_refs: vec![input],
            }))],
        ))
    }

    #[test]
    fn valid_reference() {
        let (bind_context, input, output) = setup();
        let col = Expression::Column(ColumnExpr::new(ColumnReference::new(input, 0), DataType::Int32));
        PlanVerifier::new(&bind_context)
            .verify(&project(input, output, col))
            .unwrap();
    }

    #[test]
    fn reference_to_non_child_table() {
        let (bind_context, input, output) = setup();
        let col = Expression::Column(ColumnExpr::new(ColumnReference::new(output, 0), DataType::Int32));
        let err = PlanVerifier::new(&bind_context)
            .verify(&project(input, output, col))
            .unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }

    #[test]
    fn mismatched_type() {
        let (bind_context, input, output) = setup();
        let col = Expression::Column(ColumnExpr::new(ColumnReference::new(input, 0), DataType::Int64));
        assert!(PlanVerifier::new(&bind_context).verify(&project(input, output, col)).is_err());
    }

    #[test]
    fn outer_columns_skipped() {
        let (bind_context, input, output) = setup();
        let col = Expression::Column(
            ColumnExpr::new(ColumnReference::new(output, 0), DataType::Int32).with_depth(1),
        );
        PlanVerifier::new(&bind_context)
            .verify(&project(input, output, col))
            .unwrap();
    }
}
