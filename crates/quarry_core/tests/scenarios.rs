mod common;

use common::{Harness, col, find_all, select, visit_exprs};
use pretty_assertions::assert_eq;
use quarry_ast::ast;
use quarry_ast::statement::Statement;
use quarry_core::compile::StatementKind;
use quarry_core::expr::Expression;
use quarry_core::logical::operator::LogicalOperator;
use quarry_core::types::datatype::DataType;
use quarry_error::ErrorKind;

fn table_t(harness: &Harness) {
    harness.create_table(
        "t",
        &[("a", ast::DataType::Integer), ("b", ast::DataType::Varchar(Some(10)))],
    );
}

#[test]
fn select_column_projects_over_scan() {
    let harness = Harness::new();
    table_t(&harness);

    let compiled = harness
        .compile(&select(vec![col("a")], Some(ast::FromNode::table("t"))))
        .unwrap();

    assert_eq!(StatementKind::Table, compiled.kind);
    assert_eq!(vec![("a".to_string(), DataType::Int32)], compiled.output_columns().unwrap());

    let LogicalOperator::Project(project) = &compiled.plan else {
        panic!("expected project, got {:?}", compiled.plan);
    };
    assert_eq!(1, project.node.projections.len());
    assert_eq!(DataType::Int32, project.node.projections[0].datatype());
    match project.children.as_slice() {
        [LogicalOperator::Scan(scan)] => {
            assert_eq!("t", scan.node.table);
            assert_eq!(vec![0], scan.node.projection);
        }
        other => panic!("expected single scan child, got {other:?}"),
    }
}

#[test]
fn group_by_requires_grouped_columns() {
    let harness = Harness::new();
    table_t(&harness);
    let group_by_a = |projections| {
        let query = ast::SelectNode::new(projections)
            .from(ast::FromNode::table("t"))
            .group_by(vec![ast::GroupByExpr::Expr(ast::Expr::ident("a"))]);
        Statement::Query(ast::QueryNode::select(query))
    };

    let compiled = harness
        .compile(&group_by_a(vec![col("a"), ast::SelectExpr::Expr(ast::Expr::count_star())]))
        .unwrap();
    let columns = compiled.output_columns().unwrap();
    assert_eq!(2, columns.len());
    assert_eq!(DataType::Int64, columns[1].1);
    assert_eq!(
        1,
        find_all(&compiled.plan, &|op| matches!(op, LogicalOperator::Aggregate(_))).len()
    );

    let err = harness.compile(&group_by_a(vec![col("a"), col("b")])).unwrap_err();
    assert_eq!(ErrorKind::GroupByViolation, err.kind());
    assert!(err.to_string().contains('b'), "{err}");
}

#[test]
fn grouping_applies_through_correlated_subqueries() {
    let harness = Harness::new();
    harness.create_table("t", &[("a", ast::DataType::Integer), ("b", ast::DataType::Integer)]);
    harness.create_table("u", &[("x", ast::DataType::Integer)]);

    let from_u = |projection: ast::Expr| {
        ast::SelectExpr::Expr(ast::Expr::subquery(ast::QueryNode::select(
            ast::SelectNode::new(vec![ast::SelectExpr::Expr(projection)]).from(ast::FromNode::table("u")),
        )))
    };
    let sum_x_plus = |outer: &str| {
        ast::Expr::call(
            "sum",
            vec![ast::Expr::binary(
                ast::Expr::compound(&["u", "x"]),
                ast::BinaryOperator::Plus,
                ast::Expr::compound(&["t", outer]),
            )],
        )
    };
    let group_by_a = |select: ast::SelectNode| {
        select.group_by(vec![ast::GroupByExpr::Expr(ast::Expr::compound(&["t", "a"]))])
    };

    // Aggregated without GROUP BY.
    let implicit = ast::SelectNode::new(vec![
        ast::SelectExpr::Expr(ast::Expr::count_star()),
        from_u(ast::Expr::compound(&["t", "b"])),
    ])
    .from(ast::FromNode::table("t"));
    // Inner aggregate over both inner and outer columns.
    let mixed = group_by_a(ast::SelectNode::new(vec![from_u(sum_x_plus("b"))]).from(ast::FromNode::table("t")));

    for select in [implicit, mixed] {
        let err = harness
            .compile(&Statement::Query(ast::QueryNode::select(select)))
            .unwrap_err();
        assert_eq!(ErrorKind::GroupByViolation, err.kind(), "{err}");
    }

    let grouped = group_by_a(ast::SelectNode::new(vec![from_u(sum_x_plus("a"))]).from(ast::FromNode::table("t")));
    harness
        .compile(&Statement::Query(ast::QueryNode::select(grouped)))
        .unwrap();
}

#[test]
fn integer_plus_decimal_coerces_to_decimal() {
    let harness = Harness::new();
    let expr = ast::Expr::binary(
        ast::Expr::number(1),
        ast::BinaryOperator::Plus,
        ast::Expr::number("1.5"),
    );
    let compiled = harness.compile(&select(vec![ast::SelectExpr::Expr(expr)], None)).unwrap();

    let LogicalOperator::Project(project) = &compiled.plan else {
        panic!("expected project, got {:?}", compiled.plan);
    };
    let Expression::ScalarFunction(add) = &project.node.projections[0] else {
        panic!("expected function, got {:?}", project.node.projections[0]);
    };
    let left = add.function.inputs[0].datatype();
    let right = add.function.inputs[1].datatype();
    assert!(left.is_decimal(), "{left}");
    assert_eq!(left, right);
    assert!(matches!(add.function.inputs[0], Expression::Cast(_)));
    assert!(add.function.return_type.is_decimal());
}

#[test]
fn insert_values_computes_hash_key() {
    let harness = Harness::new();
    table_t(&harness);
    harness
        .run(&Statement::CreateIndex(ast::CreateIndex {
            if_not_exists: false,
            name: ast::Ident::new("t_a_idx"),
            table: ast::ObjectReference::from("t"),
            columns: vec![ast::Ident::new("a")],
            kind: ast::IndexKind::Hash,
            unique: false,
        }))
        .unwrap();

    let insert = ast::Insert::values(
        "t",
        vec![
            vec![ast::Expr::number(1), ast::Expr::string("x")],
            vec![ast::Expr::number(2), ast::Expr::string("y")],
        ],
    );
    let compiled = harness.compile(&Statement::Insert(insert)).unwrap();
    assert_eq!(StatementKind::Update, compiled.kind);

    let LogicalOperator::Insert(node) = &compiled.plan else {
        panic!("expected insert, got {:?}", compiled.plan);
    };
    assert_eq!(1, node.node.index_keys.len());
    let key_position = node.node.index_keys[0].position;

    let LogicalOperator::Project(keys) = &node.children[0] else {
        panic!("expected project, got {:?}", node.children[0]);
    };
    match &keys.node.projections[key_position] {
        Expression::ScalarFunction(func) => assert_eq!("hash", func.function.name),
        other => panic!("expected hash, got {other:?}"),
    }

    let rows = find_all(&compiled.plan, &|op| matches!(op, LogicalOperator::ExpressionList(_)));
    match rows.as_slice() {
        [LogicalOperator::ExpressionList(list)] => assert_eq!(2, list.node.rows.len()),
        other => panic!("expected one values list, got {other:?}"),
    }
}

#[test]
fn correlated_subquery_marks_outer_join() {
    let harness = Harness::new();
    for name in ["t1", "t2", "t3"] {
        harness.create_table(name, &[("x", ast::DataType::Integer), ("y", ast::DataType::Integer)]);
    }

    let inner = ast::SelectNode::new(vec![ast::SelectExpr::Expr(ast::Expr::number(1))])
        .from(ast::FromNode::table("t3"))
        .filter(ast::Expr::eq(
            ast::Expr::compound(&["t3", "y"]),
            ast::Expr::compound(&["t1", "y"]),
        ));
    let outer = ast::SelectNode::new(vec![ast::SelectExpr::Wildcard])
        .from(ast::FromNode::table("t1").join(
            ast::FromNode::table("t2"),
            ast::JoinType::Inner,
            ast::JoinCondition::On(ast::Expr::eq(
                ast::Expr::compound(&["t1", "x"]),
                ast::Expr::compound(&["t2", "x"]),
            )),
        ))
        .filter(ast::Expr::exists(ast::QueryNode::select(inner)));

    let compiled = harness.compile(&Statement::Query(ast::QueryNode::select(outer))).unwrap();

    let t1_ref = match find_all(&compiled.plan, &|op| matches!(op, LogicalOperator::Scan(s) if s.node.table == "t1"))
        .as_slice()
    {
        [LogicalOperator::Scan(scan)] => scan.node.table_ref,
        other => panic!("expected one t1 scan, got {other:?}"),
    };

    let joins = find_all(&compiled.plan, &|op| {
        matches!(
            op,
            LogicalOperator::ComparisonJoin(_) | LogicalOperator::ArbitraryJoin(_) | LogicalOperator::CrossJoin(_)
        )
    });
    assert_eq!(1, joins.len());
    assert!(joins[0].flags().outer_referenced, "{:?}", joins[0].flags());

    let mut subqueries = Vec::new();
    visit_exprs(&compiled.plan, &mut |expr| {
        if let Expression::Subquery(subquery) = expr {
            subqueries.push(subquery.clone());
        }
    });
    assert_eq!(1, subqueries.len());
    assert!(subqueries[0].is_correlated());
    assert!(subqueries[0].correlated_columns.iter().all(|c| c.table == t1_ref));

    let mut outer_refs = Vec::new();
    visit_exprs(&subqueries[0].subquery, &mut |expr| {
        if let Expression::Column(column) = expr {
            if column.depth > 0 {
                outer_refs.push(column.clone());
            }
        }
    });
    assert_eq!(1, outer_refs.len());
    assert_eq!(1, outer_refs[0].depth);
    assert_eq!(t1_ref, outer_refs[0].reference.table_scope);
    assert_eq!(1, outer_refs[0].reference.column);
}

#[test]
fn merge_plans_guarded_update_and_insert() {
    let harness = Harness::new();
    for name in ["t", "s"] {
        harness.create_table(name, &[("id", ast::DataType::Integer), ("v", ast::DataType::Varchar(None))]);
    }

    let merge = ast::Merge {
        target: ast::ObjectReference::from("t"),
        target_alias: None,
        source: ast::FromNode::table("s"),
        on: ast::Expr::eq(ast::Expr::compound(&["t", "id"]), ast::Expr::compound(&["s", "id"])),
        clauses: vec![
            ast::MergeClause::Matched {
                condition: None,
                action: ast::MergeMatchedAction::Update(vec![ast::Assignment::new(
                    "v",
                    ast::Expr::compound(&["s", "v"]),
                )]),
            },
            ast::MergeClause::NotMatched {
                condition: None,
                columns: Vec::new(),
                values: ast::MergeInsertValues::Values(vec![
                    ast::Expr::compound(&["s", "id"]),
                    ast::Expr::compound(&["s", "v"]),
                ]),
            },
        ],
    };
    let compiled = harness.compile(&Statement::Merge(merge)).unwrap();

    let branches = compiled.plan.children();
    let updates: Vec<_> = branches.iter().filter(|b| matches!(b, LogicalOperator::Update(_))).collect();
    let inserts: Vec<_> = branches.iter().filter(|b| matches!(b, LogicalOperator::Insert(_))).collect();
    assert_eq!(1, updates.len());
    assert_eq!(1, inserts.len());
    assert_eq!(2, branches.len());

    for branch in [updates[0], inserts[0]] {
        let guards = find_all(branch, &|op| matches!(op, LogicalOperator::CardinalityGuard(_)));
        assert_eq!(1, guards.len(), "{branch:?}");
        let joins = find_all(guards[0], &|op| matches!(op, LogicalOperator::ComparisonJoin(_)));
        assert_eq!(1, joins.len(), "guard should sit above the branch join");
    }
}
