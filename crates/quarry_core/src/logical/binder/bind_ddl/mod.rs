//! Catalog changing statements.
//!
//! Every statement is fully validated against the catalog here, the plan
//! carries a [`DdlAction`] the caller can apply without further checks.
pub mod alter;
pub mod create;
pub mod create_table;
pub mod drop;
pub mod grant;

use std::sync::Arc;

use quarry_error::{DbError, Result};
use tracing::warn;

use crate::catalog::create::OnConflict;
use crate::catalog::entry::{CatalogEntryKind, SchemaEntry};
use crate::catalog::missing_entry_error;
use crate::compile::CompileContext;
use crate::logical::logical_ddl::{DdlAction, LogicalDdl};
use crate::logical::operator::{LogicalOperator, Node};

#[derive(Debug, Clone, Copy)]
pub struct DdlBinder<'a> {
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> DdlBinder<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>) -> Self {
        DdlBinder { ctx }
    }

    /// Get a schema the session may create objects in.
    pub(crate) fn require_schema_privs(&self, schema: &str) -> Result<Arc<SchemaEntry>> {
        let entry = self.ctx.catalog.require_schema(schema)?;
        if !self.ctx.catalog.schema_privs(self.ctx.session, schema)? {
            return Err(DbError::privilege_denied(format!(
                "Permission denied for schema '{schema}'"
            ))
            .with_field("schema", schema)
            .with_field("user", &self.ctx.session.user));
        }
        Ok(entry)
    }

    /// Schemas, users, and roles are global. Managing them requires
    /// ownership of the system schema.
    pub(crate) fn require_admin(&self, what: &str) -> Result<()> {
        let system = &self.ctx.config.default_schema_fallback;
        if !self.ctx.catalog.schema_privs(self.ctx.session, system)? {
            return Err(DbError::privilege_denied(format!(
                "Insufficient privileges to {what}"
            ))
            .with_field("user", &self.ctx.session.user));
        }
        Ok(())
    }

    /// Error for a missing object unless the statement said IF EXISTS.
    pub(crate) fn missing(
        &self,
        if_exists: bool,
        schema: Option<&str>,
        kind: CatalogEntryKind,
        name: &str,
    ) -> Result<LogicalOperator> {
        if if_exists {
            let reason = match schema {
                Some(schema) => format!("{kind} '{schema}.{name}' does not exist"),
                None => format!("{kind} '{name}' does not exist"),
            };
            return Ok(noop(reason));
        }
        Err(missing_entry_error(self.ctx.catalog, schema, kind, name))
    }
}

pub(crate) fn ddl_plan(action: DdlAction) -> LogicalOperator {
    LogicalOperator::Ddl(Node::leaf(LogicalDdl { action }))
}

/// DDL whose rows come from a query, e.g. CREATE TABLE ... AS.
pub(crate) fn ddl_plan_with_source(action: DdlAction, source: LogicalOperator) -> LogicalOperator {
    LogicalOperator::Ddl(Node::new(LogicalDdl { action }, vec![source]))
}

/// Plan for a statement skipped because of IF [NOT] EXISTS.
pub(crate) fn noop(reason: String) -> LogicalOperator {
    warn!(%reason, "statement skipped");
    ddl_plan(DdlAction::Noop { reason })
}

pub(crate) const fn on_conflict(or_replace: bool, if_not_exists: bool) -> OnConflict {
    if or_replace {
        OnConflict::Replace
    } else if if_not_exists {
        OnConflict::Ignore
    } else {
        OnConflict::Error
    }
}

pub(crate) fn already_exists(kind: CatalogEntryKind, name: &str) -> DbError {
    DbError::already_exists(format!("{kind} '{name}' already exists"))
        .with_field("kind", kind)
        .with_field("name", name)
}
