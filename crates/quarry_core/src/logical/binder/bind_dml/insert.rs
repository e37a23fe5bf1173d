use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::maintenance::{MaintenancePlanner, RowImage};
use super::{DmlBinder, check_not_null, project, resolve_column_list};
use crate::catalog::entry::TableEntry;
use crate::catalog::privilege::Privileges;
use crate::expr::cast_expr::check_type;
use crate::expr::column_expr::ColumnReference;
use crate::expr::{self, Expression};
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_query::bind_from::single_output;
use crate::logical::binder::bind_query::plan_query;
use crate::logical::logical_dml::LogicalInsert;
use crate::logical::operator::{LogicalOperator, Node};

impl<'a> DmlBinder<'a> {
    pub fn bind_insert(&self, bind_context: &mut BindContext, insert: &ast::Insert) -> Result<LogicalOperator> {
        let (schema, entry) = self.resolve_target(&insert.table, "insert into")?;

        let targets = if insert.columns.is_empty() {
            entry.visible_columns().map(|(idx, _)| idx).collect()
        } else {
            resolve_column_list(&entry, &insert.columns)?
        };

        let (source, provided) = match &insert.source {
            ast::InsertSource::Query(query) => {
                self.require_column_privs(&schema, &entry, &targets, Privileges::INSERT)?;

                let scope = bind_context.new_orphan_scope();
                let source = plan_query(self.ctx, bind_context, scope, query)?;
                let output = single_output(&source, bind_context)?;
                let types = bind_context.get_table(output)?.column_types.clone();
                if types.len() != targets.len() {
                    return Err(DbError::arity_mismatch(format!(
                        "INSERT has {} target columns but the query produces {}",
                        targets.len(),
                        types.len()
                    ))
                    .with_field("table", &entry.name));
                }
                check_null_values(&entry, &targets, &source)?;

                let provided = targets
                    .iter()
                    .zip(types)
                    .enumerate()
                    .map(|(pos, (&col, datatype))| (col, expr::column(ColumnReference::new(output, pos), datatype)))
                    .collect();
                (source, provided)
            }
            ast::InsertSource::DefaultValues => {
                if !insert.columns.is_empty() {
                    return Err(DbError::invalid_input(
                        "A column list can't be combined with DEFAULT VALUES",
                    ));
                }
                self.require_table_privs(&schema, &entry.name, Privileges::INSERT)?;
                (LogicalOperator::SINGLE_ROW, Vec::new())
            }
        };

        self.plan_insert_rows(bind_context, &schema, &entry, source, provided)
    }

    /// Plan writing the rows of `source` into `entry`.
    ///
    /// `provided` holds the value for each explicitly written column, every
    /// other column gets its default.
    pub(crate) fn plan_insert_rows(
        &self,
        bind_context: &mut BindContext,
        schema: &str,
        entry: &TableEntry,
        source: LogicalOperator,
        provided: Vec<(usize, Expression)>,
    ) -> Result<LogicalOperator> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut positions = vec![None; entry.columns.len()];

        for (idx, column) in entry.visible_columns() {
            let value = match provided.iter().find(|(col, _)| *col == idx) {
                Some((_, value)) => {
                    let value = check_type(&column.datatype, value.clone())
                        .map_err(|e| e.with_field("column", &column.name))?;
                    check_not_null(column, &value)?;
                    value
                }
                None => self.default_value(bind_context, column)?,
            };
            positions[idx] = Some(values.len());
            columns.push(idx);
            values.push(value);
        }

        let (plan, row_table) = project(bind_context, "__insert", values, source)?;
        let image = RowImage {
            table_ref: row_table,
            positions,
        };

        let (plan, maintenance) =
            MaintenancePlanner::new(self.ctx, schema, entry).plan(bind_context, &image, plan, |_| true)?;

        let (plan, index_keys, fk_checks) = if maintenance.is_empty() {
            (plan, Vec::new(), Vec::new())
        } else {
            let leading = columns
                .iter()
                .map(|&idx| image.column(entry, idx))
                .collect::<Result<Vec<_>>>()?;
            let (projections, index_keys, fk_checks) = maintenance.append_to(leading);
            let (plan, _) = project(bind_context, "__insert_checked", projections, plan)?;
            (plan, index_keys, fk_checks)
        };

        debug!(
            table = %entry.name,
            columns = columns.len(),
            index_keys = index_keys.len(),
            fk_checks = fk_checks.len(),
            "bound insert"
        );

        Ok(LogicalOperator::Insert(Node::new(
            LogicalInsert {
                schema: schema.to_string(),
                table: entry.name.clone(),
                columns,
                index_keys,
                fk_checks,
            },
            vec![plan],
        )))
    }
}

/// Literal NULLs in a VALUES list are caught before any row is written.
fn check_null_values(entry: &TableEntry, targets: &[usize], source: &LogicalOperator) -> Result<()> {
    let LogicalOperator::ExpressionList(list) = source else {
        return Ok(());
    };
    for row in &list.node.rows {
        for (value, &col) in row.iter().zip(targets) {
            if let Some(column) = entry.columns.get(col) {
                check_not_null(column, value)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::catalog::Catalog;
    use crate::catalog::create::{CreateTableInfo, OnConflict};
    use crate::catalog::entry::ColumnEntry;
    use crate::logical::binder::bind_ddl::testutil::{compile, run};
    use crate::logical::binder::bind_dml::testutil::child;
    use crate::testutil::Fixture;
    use crate::types::datatype::DataType;

    fn insert_values(table: &str, rows: Vec<Vec<ast::Expr>>) -> Statement {
        Statement::Insert(ast::Insert::values(table, rows))
    }

    fn insert_node(plan: &LogicalOperator) -> &LogicalInsert {
        match plan {
            LogicalOperator::Insert(insert) => &insert.node,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    fn create_index(fixture: &Fixture, name: &str, table: &str, columns: &[&str]) {
        run(
            fixture,
            Statement::CreateIndex(ast::CreateIndex {
                if_not_exists: false,
                name: ast::Ident::new(name),
                table: ast::ObjectReference::from(table),
                columns: columns.iter().map(|c| ast::Ident::new(*c)).collect(),
                kind: ast::IndexKind::Hash,
                unique: false,
            }),
        )
        .unwrap();
    }

    #[test]
    fn insert_values_with_hash_index() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32), ("b", DataType::varchar(10))]);
        create_index(&fixture, "t_a_idx", "t", &["a"]);

        let compiled = compile(
            &fixture,
            insert_values(
                "t",
                vec![
                    vec![ast::Expr::number("1"), ast::Expr::string("x")],
                    vec![ast::Expr::number("2"), ast::Expr::string("y")],
                ],
            ),
        )
        .unwrap();

        let insert = insert_node(&compiled.plan);
        assert_eq!(vec![0, 1], insert.columns);
        assert_eq!(1, insert.index_keys.len());
        assert_eq!("t_a_idx", insert.index_keys[0].index);
        assert_eq!(2, insert.index_keys[0].position);

        match child(&compiled.plan) {
            LogicalOperator::Project(project) => {
                assert_eq!(3, project.node.projections.len());
                assert_eq!(DataType::Int64, project.node.projections[2].datatype());
            }
            other => panic!("expected project, got {other:?}"),
        }
    }

    #[test]
    fn insert_without_indexes_has_no_keys() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let compiled = compile(&fixture, insert_values("t", vec![vec![ast::Expr::number("1")]])).unwrap();
        let insert = insert_node(&compiled.plan);
        assert!(insert.index_keys.is_empty());
        assert!(insert.fk_checks.is_empty());
    }

    #[test]
    fn omitted_columns_get_defaults() {
        let fixture = Fixture::new();
        run(
            &fixture,
            Statement::CreateTable(ast::CreateTable::new(
                "t",
                vec![
                    ast::ColumnDef::new("a", ast::DataType::Integer),
                    ast::ColumnDef::new("b", ast::DataType::Integer)
                        .with_option(ast::ColumnOption::Default(ast::Expr::number("7"))),
                ],
            )),
        )
        .unwrap();

        let mut insert = ast::Insert::values("t", vec![vec![ast::Expr::number("1")]]);
        insert.columns = vec![ast::Ident::new("a")];
        let compiled = compile(&fixture, Statement::Insert(insert)).unwrap();

        match child(&compiled.plan) {
            LogicalOperator::Project(project) => {
                assert_eq!(expr::lit(7), project.node.projections[1]);
            }
            other => panic!("expected project, got {other:?}"),
        }
    }

    #[test]
    fn arity_mismatch() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32), ("b", DataType::Int32)]);
        let err = compile(&fixture, insert_values("t", vec![vec![ast::Expr::number("1")]])).unwrap_err();
        assert_eq!(ErrorKind::ArityMismatch, err.kind());
    }

    #[test]
    fn not_null_checks() {
        let fixture = Fixture::new();
        fixture
            .catalog
            .create_table(&CreateTableInfo {
                schema: "main".to_string(),
                name: "t".to_string(),
                columns: vec![
                    ColumnEntry::new("a", DataType::Int32).with_not_null(true),
                    ColumnEntry::new("b", DataType::Int32),
                ],
                constraints: Vec::new(),
                temp: false,
                on_conflict: OnConflict::Error,
            })
            .unwrap();

        // Omitted without a default.
        let mut insert = ast::Insert::values("t", vec![vec![ast::Expr::number("1")]]);
        insert.columns = vec![ast::Ident::new("b")];
        let err = compile(&fixture, Statement::Insert(insert)).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());

        // Explicit NULL.
        let err = compile(
            &fixture,
            insert_values("t", vec![vec![ast::Expr::null(), ast::Expr::number("1")]]),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn duplicate_and_missing_columns() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);

        let mut insert = ast::Insert::values("t", vec![vec![ast::Expr::number("1"), ast::Expr::number("2")]]);
        insert.columns = vec![ast::Ident::new("a"), ast::Ident::new("a")];
        let err = compile(&fixture, Statement::Insert(insert)).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());

        let mut insert = ast::Insert::values("t", vec![vec![ast::Expr::number("1")]]);
        insert.columns = vec![ast::Ident::new("c")];
        let err = compile(&fixture, Statement::Insert(insert)).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn default_values() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let compiled = compile(
            &fixture,
            Statement::Insert(ast::Insert {
                table: ast::ObjectReference::from("t"),
                columns: Vec::new(),
                source: ast::InsertSource::DefaultValues,
            }),
        )
        .unwrap();
        assert_eq!(vec![0], insert_node(&compiled.plan).columns);
    }

    #[test]
    fn insert_checks_foreign_keys() {
        let fixture = Fixture::new();
        run(
            &fixture,
            Statement::CreateTable(ast::CreateTable::new(
                "parent",
                vec![ast::ColumnDef::new("id", ast::DataType::BigInt).with_option(ast::ColumnOption::PrimaryKey)],
            )),
        )
        .unwrap();
        run(
            &fixture,
            Statement::CreateTable(ast::CreateTable::new(
                "child",
                vec![
                    ast::ColumnDef::new("pid", ast::DataType::Integer).with_option(ast::ColumnOption::References {
                        table: ast::ObjectReference::from("parent"),
                        columns: Vec::new(),
                    }),
                ],
            )),
        )
        .unwrap();

        let compiled = compile(&fixture, insert_values("child", vec![vec![ast::Expr::number("1")]])).unwrap();
        let insert = insert_node(&compiled.plan);
        assert_eq!(1, insert.fk_checks.len());
        assert_eq!(1, insert.fk_checks[0].referenced_row);
        assert_eq!(2, insert.fk_checks[0].position);

        // Checked project over the left join with the parent.
        let join = child(child(&compiled.plan));
        match join {
            LogicalOperator::ComparisonJoin(join) => {
                assert_eq!(crate::logical::logical_join::JoinType::Left, join.node.join_type);
            }
            other => panic!("expected join, got {other:?}"),
        }

        // The parent's primary key index is maintained on insert into parent.
        let compiled = compile(&fixture, insert_values("parent", vec![vec![ast::Expr::number("1")]])).unwrap();
        assert_eq!(1, insert_node(&compiled.plan).index_keys.len());
    }

    #[test]
    fn insert_into_view_rejected() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        run(
            &fixture,
            Statement::CreateView(ast::CreateView {
                or_replace: false,
                name: ast::ObjectReference::from("v"),
                columns: None,
                query: ast::QueryNode::select(
                    ast::SelectNode::new(vec![ast::SelectExpr::Wildcard]).from(ast::FromNode::table("t")),
                ),
                with_check_option: false,
            }),
        )
        .unwrap();
        let err = compile(&fixture, insert_values("v", vec![vec![ast::Expr::number("1")]])).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }
}
