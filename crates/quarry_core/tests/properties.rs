mod common;

use std::thread;

use common::{Harness, col, find_all, select, visit_exprs};
use pretty_assertions::assert_eq;
use quarry_ast::ast;
use quarry_ast::statement::Statement;
use quarry_core::compile::compile_into;
use quarry_core::expr::cast_expr::check_type;
use quarry_core::expr::column_expr::ColumnReference;
use quarry_core::expr::{self, Expression};
use quarry_core::logical::binder::bind_context::{BindContext, TableRef};
use quarry_core::logical::operator::{LogicalNode, LogicalOperator};
use quarry_core::logical::planner::verify::PlanVerifier;
use quarry_core::types::datatype::DataType;
use quarry_core::types::scalar::ScalarValue;

fn harness() -> Harness {
    let harness = Harness::new();
    harness.create_table(
        "t",
        &[
            ("a", ast::DataType::Integer),
            ("b", ast::DataType::Varchar(Some(10))),
            ("c", ast::DataType::BigInt),
        ],
    );
    harness.create_table("u", &[("a", ast::DataType::Integer), ("d", ast::DataType::Double)]);
    harness
}

/// A mix of statements touching most of the planner.
fn statements() -> Vec<Statement> {
    let t = || Some(ast::FromNode::table("t"));
    let grouped = ast::SelectNode::new(vec![col("a"), ast::SelectExpr::Expr(ast::Expr::count_star())])
        .from(ast::FromNode::table("t"))
        .group_by(vec![ast::GroupByExpr::Expr(ast::Expr::ident("a"))])
        .having(ast::Expr::binary(
            ast::Expr::count_star(),
            ast::BinaryOperator::Gt,
            ast::Expr::number(1),
        ));
    let joined = ast::SelectNode::new(vec![ast::SelectExpr::Wildcard]).from(ast::FromNode::table("t").join(
        ast::FromNode::table("u"),
        ast::JoinType::Left,
        ast::JoinCondition::Using(vec![ast::Ident::new("a")]),
    ));
    let correlated = ast::SelectNode::new(vec![col("a")])
        .from(ast::FromNode::table("t"))
        .filter(ast::Expr::exists(ast::QueryNode::select(
            ast::SelectNode::new(vec![col("d")])
                .from(ast::FromNode::table("u"))
                .filter(ast::Expr::eq(
                    ast::Expr::compound(&["u", "a"]),
                    ast::Expr::compound(&["t", "a"]),
                )),
        )));

    vec![
        select(vec![col("a"), col("b")], t()),
        select(
            vec![ast::SelectExpr::Expr(ast::Expr::binary(
                ast::Expr::ident("a"),
                ast::BinaryOperator::Plus,
                ast::Expr::ident("c"),
            ))],
            t(),
        ),
        Statement::Query(ast::QueryNode::select(grouped)),
        Statement::Query(ast::QueryNode::select(joined)),
        Statement::Query(ast::QueryNode::select(correlated)),
        Statement::Insert(ast::Insert::values(
            "t",
            vec![vec![ast::Expr::number(1), ast::Expr::string("x"), ast::Expr::number(2)]],
        )),
        Statement::Update(ast::Update {
            table: ast::ObjectReference::from("t"),
            alias: None,
            assignments: vec![ast::Assignment::new("c", ast::Expr::number(3))],
            from: None,
            where_expr: Some(ast::Expr::eq(ast::Expr::ident("a"), ast::Expr::number(1))),
        }),
        Statement::Delete(ast::Delete {
            table: ast::ObjectReference::from("u"),
            alias: None,
            where_expr: None,
        }),
    ]
}

#[test]
fn compiling_twice_gives_the_same_plan() {
    for stmt in statements() {
        let first = harness().compile(&stmt).unwrap();
        let second = harness().compile(&stmt).unwrap();
        assert_eq!(format!("{:?}", first.plan), format!("{:?}", second.plan));
        assert_eq!(first.output_columns().unwrap(), second.output_columns().unwrap());
    }
}

#[test]
fn plans_are_well_typed() {
    let harness = harness();
    for stmt in statements() {
        let compiled = harness.compile(&stmt).unwrap();
        PlanVerifier::new(&compiled.bind_context).verify(&compiled.plan).unwrap();

        for op in find_all(&compiled.plan, &|op| matches!(op, LogicalOperator::Project(_))) {
            let LogicalOperator::Project(project) = op else {
                unreachable!()
            };
            let table = compiled
                .bind_context
                .get_table(project.node.projection_table)
                .unwrap();
            let types: Vec<_> = project.node.projections.iter().map(|p| p.datatype()).collect();
            assert_eq!(table.column_types, types);
        }

        for op in find_all(&compiled.plan, &|op| matches!(op, LogicalOperator::Filter(_))) {
            let LogicalOperator::Filter(filter) = op else {
                unreachable!()
            };
            assert_eq!(DataType::Boolean, filter.node.filter.datatype());
        }
    }
}

#[test]
fn nothing_above_aggregate_reads_base_columns() {
    let harness = harness();
    let stmt = &statements()[2];
    let compiled = harness.compile(stmt).unwrap();

    let scans: Vec<TableRef> = find_all(&compiled.plan, &|op| matches!(op, LogicalOperator::Scan(_)))
        .into_iter()
        .flat_map(|op| op.get_output_table_refs(&compiled.bind_context))
        .collect();
    assert_eq!(1, scans.len());

    let aggregates = find_all(&compiled.plan, &|op| matches!(op, LogicalOperator::Aggregate(_)));
    assert_eq!(1, aggregates.len());

    // Walk the operators above the aggregate only.
    let mut above = Vec::new();
    collect_until_aggregate(&compiled.plan, &mut above);
    assert!(!above.is_empty());
    for op in above {
        op.for_each_expr(|expr| {
            assert!(
                expr.column_references_at(0).iter().all(|c| c.table_scope != scans[0]),
                "{} reads an ungrouped column: {expr:?}",
                op.name()
            );
            Ok(())
        })
        .unwrap();
    }
}

fn collect_until_aggregate<'a>(plan: &'a LogicalOperator, out: &mut Vec<&'a LogicalOperator>) {
    if matches!(plan, LogicalOperator::Aggregate(_)) {
        return;
    }
    out.push(plan);
    for child in plan.children() {
        collect_until_aggregate(child, out);
    }
}

#[test]
fn check_type_is_idempotent() {
    let column = expr::column(ColumnReference::new(TableRef { table_idx: 0 }, 0), DataType::Int32);
    let cases = [
        (DataType::Int64, column.clone()),
        (DataType::Int32, column),
        (DataType::decimal(10, 2), expr::lit(5)),
        (DataType::UTF8, expr::lit("abc")),
        (DataType::Float64, expr::lit(ScalarValue::Null(DataType::Null))),
        (DataType::Boolean, expr::lit(true)),
    ];

    for (target, input) in cases {
        let once = check_type(&target, input).unwrap();
        assert_eq!(target, once.datatype());
        let twice = check_type(&target, once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}

#[test]
fn frames_balance_on_success_and_failure() {
    let harness = harness();
    let mut failing = statements();
    failing.push(select(vec![col("missing")], Some(ast::FromNode::table("t"))));
    failing.push(select(vec![col("a")], Some(ast::FromNode::table("missing"))));
    failing.push(Statement::Query(ast::QueryNode::select(
        ast::SelectNode::new(vec![col("a"), col("b")])
            .from(ast::FromNode::table("t"))
            .group_by(vec![ast::GroupByExpr::Expr(ast::Expr::ident("a"))]),
    )));

    let ctx = harness.ctx();
    for stmt in &failing {
        let mut bind_context = BindContext::new_with_globals(&harness.globals);
        let _ = compile_into(&ctx, &mut bind_context, stmt);
        assert_eq!(bind_context.frames_pushed(), bind_context.frames_popped(), "{stmt:?}");
        assert_eq!(1, bind_context.frames().depth());
    }
}

#[test]
fn concurrent_compiles_match_serial() {
    let harness = harness();
    let expected: Vec<String> = statements()
        .iter()
        .map(|stmt| format!("{:?}", harness.compile(stmt).unwrap().plan))
        .collect();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    statements()
                        .iter()
                        .map(|stmt| format!("{:?}", harness.compile(stmt).unwrap().plan))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(expected, handle.join().unwrap());
        }
    });
}

#[test]
fn subquery_outer_references_have_positive_depth() {
    let harness = harness();
    let compiled = harness.compile(&statements()[4]).unwrap();

    let mut correlated = 0;
    visit_exprs(&compiled.plan, &mut |expr| {
        if let Expression::Subquery(subquery) = expr {
            assert!(subquery.is_correlated());
            correlated += 1;
        }
    });
    assert_eq!(1, correlated);
}
