//! Entry point for turning a parsed statement into a logical plan.
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use quarry_ast::ast;
use quarry_ast::statement::Statement;
use quarry_error::Result;
use tracing::debug;

use crate::catalog::entry::{CatalogEntryKind, TableEntry};
use crate::catalog::{Catalog, missing_entry_error};
use crate::config::compile::CompileConfig;
use crate::config::session::{GlobalVariables, SessionIdentity};
use crate::functions::resolve::FunctionLookup;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_statement::StatementBinder;
use crate::logical::binder::scope_stack::FrameKind;
use crate::logical::operator::{LogicalNode, LogicalOperator};
use crate::logical::planner::verify::PlanVerifier;
use crate::types::datatype::DataType;

/// What the caller should expect from executing a compiled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Produces a result set.
    Table,
    /// Modifies rows, produces a row count.
    Update,
    /// Modifies the catalog.
    Schema,
    /// Changes transaction or session state.
    Transaction,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Update => write!(f, "update"),
            Self::Schema => write!(f, "schema"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

#[derive(Debug)]
pub struct CompiledStatement {
    pub plan: LogicalOperator,
    pub kind: StatementKind,
    /// Tables and scopes the plan's expressions reference.
    pub bind_context: BindContext,
}

impl CompiledStatement {
    /// Names and types of the result columns.
    pub fn output_columns(&self) -> Result<Vec<(String, DataType)>> {
        let mut out = Vec::new();
        for table_ref in self.plan.get_output_table_refs(&self.bind_context) {
            let table = self.bind_context.get_table(table_ref)?;
            out.extend(
                table
                    .column_names
                    .iter()
                    .cloned()
                    .zip(table.column_types.iter().cloned()),
            );
        }
        Ok(out)
    }
}

/// Generates statement-unique labels for generated objects.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    next: Cell<usize>,
}

impl LabelGenerator {
    pub fn next(&self, prefix: &str) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        format!("{prefix}_{n}")
    }
}

/// Everything the binders need from the outside world.
#[derive(Debug)]
pub struct CompileContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub session: &'a SessionIdentity,
    pub config: &'a CompileConfig,
    pub globals: &'a GlobalVariables,
    /// Types for parameters supplied by the caller, keyed by name (`"1"` for
    /// the first positional parameter).
    pub parameter_types: HashMap<String, DataType>,
    pub labels: LabelGenerator,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        session: &'a SessionIdentity,
        config: &'a CompileConfig,
        globals: &'a GlobalVariables,
    ) -> Self {
        CompileContext {
            catalog,
            session,
            config,
            globals,
            parameter_types: HashMap::new(),
            labels: LabelGenerator::default(),
        }
    }

    pub fn with_parameter_types(
        mut self,
        types: impl IntoIterator<Item = (String, DataType)>,
    ) -> Self {
        self.parameter_types.extend(types);
        self
    }

    /// Find a table or view, searching the session schema then the fallback
    /// schema for unqualified names.
    ///
    /// Returns the schema the table was found in.
    pub fn resolve_table(&self, reference: &ast::ObjectReference) -> Result<(String, Arc<TableEntry>)> {
        let (schema, name) = reference.schema_and_name()?;
        if let Some(schema) = schema {
            let table = self.catalog.require_table(&schema, &name)?;
            return Ok((schema, table));
        }

        for schema in [self.session.schema.as_str(), self.config.default_schema_fallback.as_str()] {
            if let Some(table) = self.catalog.get_table(schema, &name)? {
                return Ok((schema.to_string(), table));
            }
        }

        Err(missing_entry_error(
            self.catalog,
            Some(&self.session.schema),
            CatalogEntryKind::Table,
            &name,
        ))
    }

    /// Schema an unqualified new object is created in.
    pub fn schema_for(&self, reference: &ast::ObjectReference) -> Result<(String, String)> {
        let (schema, name) = reference.schema_and_name()?;
        Ok((schema.unwrap_or_else(|| self.session.schema.clone()), name))
    }

    pub fn functions(&self) -> FunctionLookup<'_> {
        FunctionLookup::new(
            self.catalog,
            self.session,
            &self.config.default_schema_fallback,
        )
    }
}

/// Compile a single statement.
///
/// Nothing is returned on failure. The catalog isn't modified, DDL plans are
/// applied by the caller.
pub fn compile_statement(ctx: &CompileContext, stmt: &Statement) -> Result<CompiledStatement> {
    let mut bind_context = BindContext::new_with_globals(ctx.globals);
    let (plan, kind) = compile_into(ctx, &mut bind_context, stmt)?;

    if ctx.config.verify_plans {
        PlanVerifier::new(&bind_context).verify(&plan)?;
    }

    debug!(%kind, root = plan.name(), nodes = plan.node_count(), "compiled statement");

    Ok(CompiledStatement {
        plan,
        kind,
        bind_context,
    })
}

/// Compile using an existing bind context.
///
/// The statement frame is always popped, so the context's frame counts stay
/// balanced even if compilation fails.
pub fn compile_into(
    ctx: &CompileContext,
    bind_context: &mut BindContext,
    stmt: &Statement,
) -> Result<(LogicalOperator, StatementKind)> {
    bind_context.with_frame(FrameKind::Statement, "statement", |bind_context| {
        StatementBinder::new(ctx).bind(bind_context, stmt)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_unique() {
        let labels = LabelGenerator::default();
        assert_eq!("merge_0", labels.next("merge"));
        assert_eq!("merge_1", labels.next("merge"));
        assert_eq!("fk_2", labels.next("fk"));
    }
}
