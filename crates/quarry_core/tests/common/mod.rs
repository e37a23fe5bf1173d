//! Shared setup for compiling statements against an in-memory catalog.
#![allow(dead_code)]

use quarry_ast::ast;
use quarry_ast::statement::Statement;
use quarry_core::catalog::apply::apply_plan;
use quarry_core::catalog::memory::MemoryCatalog;
use quarry_core::compile::{CompileContext, CompiledStatement, compile_statement};
use quarry_core::config::compile::CompileConfig;
use quarry_core::config::session::{GlobalVariables, SessionIdentity};
use quarry_core::expr::Expression;
use quarry_core::logical::operator::{LogicalNode, LogicalOperator};
use quarry_error::Result;

#[derive(Debug)]
pub struct Harness {
    pub catalog: MemoryCatalog,
    pub session: SessionIdentity,
    pub config: CompileConfig,
    pub globals: GlobalVariables,
}

impl Harness {
    pub fn new() -> Self {
        logutil::init_test();
        Harness {
            catalog: MemoryCatalog::new(),
            session: MemoryCatalog::superuser_session(),
            config: CompileConfig {
                verify_plans: true,
                ..Default::default()
            },
            globals: GlobalVariables::default(),
        }
    }

    pub fn ctx(&self) -> CompileContext<'_> {
        CompileContext::new(&self.catalog, &self.session, &self.config, &self.globals)
    }

    pub fn compile(&self, stmt: &Statement) -> Result<CompiledStatement> {
        compile_statement(&self.ctx(), stmt)
    }

    /// Compile and apply any catalog changes.
    pub fn run(&self, stmt: &Statement) -> Result<CompiledStatement> {
        let compiled = self.compile(stmt)?;
        apply_plan(&self.catalog, &compiled.plan)?;
        Ok(compiled)
    }

    pub fn create_table(&self, name: &str, columns: &[(&str, ast::DataType)]) {
        let columns = columns
            .iter()
            .map(|(name, datatype)| ast::ColumnDef::new(name, datatype.clone()))
            .collect();
        self.run(&Statement::CreateTable(ast::CreateTable::new(name, columns)))
            .unwrap();
    }
}

pub fn select(projections: Vec<ast::SelectExpr>, from: Option<ast::FromNode>) -> Statement {
    let mut select = ast::SelectNode::new(projections);
    select.from = from;
    Statement::Query(ast::QueryNode::select(select))
}

pub fn col(name: &str) -> ast::SelectExpr {
    ast::SelectExpr::Expr(ast::Expr::ident(name))
}

/// All operators in `plan` matching `pred`, parents first.
pub fn find_all<'a>(plan: &'a LogicalOperator, pred: &dyn Fn(&LogicalOperator) -> bool) -> Vec<&'a LogicalOperator> {
    let mut out = Vec::new();
    collect(plan, pred, &mut out);
    out
}

fn collect<'a>(
    plan: &'a LogicalOperator,
    pred: &dyn Fn(&LogicalOperator) -> bool,
    out: &mut Vec<&'a LogicalOperator>,
) {
    if pred(plan) {
        out.push(plan);
    }
    for child in plan.children() {
        collect(child, pred, out);
    }
}

/// Visit every expression in `plan` along with its nested expressions.
///
/// Plans inside subqueries aren't entered.
pub fn visit_exprs(plan: &LogicalOperator, func: &mut dyn FnMut(&Expression)) {
    plan.walk(&mut |op| {
        op.for_each_expr(|expr| {
            visit_expr(expr, func);
            Ok(())
        })
    })
    .unwrap();
}

pub fn visit_expr(expr: &Expression, func: &mut dyn FnMut(&Expression)) {
    func(expr);
    expr.for_each_child(&mut |child| {
        visit_expr(child, func);
        Ok(())
    })
    .unwrap();
}
