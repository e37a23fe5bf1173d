use quarry_ast::ast;
use quarry_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::{DdlBinder, ddl_plan};
use crate::catalog::create::DropInfo;
use crate::catalog::entry::CatalogEntryKind;
use crate::catalog::memory::{PUBLIC_ROLE, SUPERUSER, SUPERUSER_ROLE};
use crate::logical::logical_ddl::DdlAction;
use crate::logical::operator::LogicalOperator;

const fn entry_kind(drop_type: ast::DropType) -> CatalogEntryKind {
    match drop_type {
        ast::DropType::Index => CatalogEntryKind::Index,
        ast::DropType::Function => CatalogEntryKind::Function,
        ast::DropType::Table => CatalogEntryKind::Table,
        ast::DropType::View => CatalogEntryKind::View,
        ast::DropType::Schema => CatalogEntryKind::Schema,
        ast::DropType::Sequence => CatalogEntryKind::Sequence,
        ast::DropType::Type => CatalogEntryKind::Type,
        ast::DropType::Trigger => CatalogEntryKind::Trigger,
        ast::DropType::User => CatalogEntryKind::User,
        ast::DropType::Role => CatalogEntryKind::Role,
    }
}

impl<'a> DdlBinder<'a> {
    pub fn bind_drop(&self, drop: &ast::DropStatement) -> Result<LogicalOperator> {
        let kind = entry_kind(drop.drop_type);
        let cascade = drop.behavior == ast::DropBehavior::Cascade;

        let (schema, name) = match kind {
            CatalogEntryKind::Schema | CatalogEntryKind::User | CatalogEntryKind::Role => {
                let name = drop.name.base()?.as_normalized_string();
                if drop.name.0.len() > 1 {
                    return Err(DbError::invalid_input(format!(
                        "{kind} names cannot be qualified: '{}'",
                        drop.name
                    )));
                }
                if let Some(plan) = self.check_global(drop.if_exists, kind, &name)? {
                    return Ok(plan);
                }
                (None, name)
            }
            CatalogEntryKind::Table | CatalogEntryKind::View => {
                let (schema, table) = match self.ctx.resolve_table(&drop.name) {
                    Ok(found) => found,
                    Err(e) if drop.if_exists && e.kind() == ErrorKind::NotFound => {
                        let (schema, name) = self.ctx.schema_for(&drop.name)?;
                        return self.missing(true, Some(&schema), kind, &name);
                    }
                    Err(e) => return Err(e),
                };
                match (kind, table.is_view()) {
                    (CatalogEntryKind::Table, true) => {
                        return Err(DbError::invalid_input(format!(
                            "'{}' is a view, use DROP VIEW",
                            table.name
                        )));
                    }
                    (CatalogEntryKind::View, false) => {
                        return Err(DbError::invalid_input(format!(
                            "'{}' is a table, use DROP TABLE",
                            table.name
                        )));
                    }
                    _ => (),
                }
                if table.system {
                    return Err(system_object(kind, &table.name));
                }
                self.require_schema_privs(&schema)?;

                if !cascade && !table.is_view() {
                    let referencing = self.ctx.catalog.referencing_tables(&schema, &table.name)?;
                    if let Some(other) = referencing.iter().find(|t| t.name != table.name || t.schema != schema) {
                        return Err(DbError::invalid_input(format!(
                            "Table '{}' is referenced by '{}', use CASCADE to drop it",
                            table.name, other.name
                        )));
                    }
                }
                (Some(schema), table.name.clone())
            }
            _ => {
                let (schema, name) = self.ctx.schema_for(&drop.name)?;
                if let Some(plan) = self.check_schema_object(drop.if_exists, kind, &schema, &name)? {
                    return Ok(plan);
                }
                self.require_schema_privs(&schema)?;
                (Some(schema), name)
            }
        };

        debug!(%kind, schema = ?schema, %name, cascade, "bound drop");

        Ok(ddl_plan(DdlAction::Drop(DropInfo {
            kind,
            schema,
            name,
            cascade,
        })))
    }

    /// Checks for dropping a schema, user, or role. Returns a plan if the
    /// statement should be skipped.
    fn check_global(&self, if_exists: bool, kind: CatalogEntryKind, name: &str) -> Result<Option<LogicalOperator>> {
        match kind {
            CatalogEntryKind::Schema => {
                let Some(entry) = self.ctx.catalog.get_schema(name)? else {
                    return self.missing(if_exists, None, kind, name).map(Some);
                };
                if entry.system {
                    return Err(system_object(kind, name));
                }
                self.require_schema_privs(name)?;
                if name == self.ctx.session.schema {
                    return Err(DbError::invalid_input(format!(
                        "Cannot drop schema '{name}', it's the current schema"
                    )));
                }
            }
            CatalogEntryKind::User => {
                if self.ctx.catalog.get_user(name)?.is_none() {
                    return self.missing(if_exists, None, kind, name).map(Some);
                }
                self.require_admin("drop users")?;
                if name == SUPERUSER {
                    return Err(system_object(kind, name));
                }
                if name == self.ctx.session.user {
                    return Err(DbError::invalid_input("Cannot drop the current session user"));
                }
            }
            CatalogEntryKind::Role => {
                if self.ctx.catalog.get_role(name)?.is_none() {
                    return self.missing(if_exists, None, kind, name).map(Some);
                }
                self.require_admin("drop roles")?;
                if name == SUPERUSER_ROLE || name == PUBLIC_ROLE {
                    return Err(system_object(kind, name));
                }
            }
            other => return Err(DbError::new(format!("{other} is not a global object"))),
        }
        Ok(None)
    }

    fn check_schema_object(
        &self,
        if_exists: bool,
        kind: CatalogEntryKind,
        schema: &str,
        name: &str,
    ) -> Result<Option<LogicalOperator>> {
        let catalog = self.ctx.catalog;
        let exists = match kind {
            CatalogEntryKind::Sequence => catalog.get_sequence(schema, name)?.is_some(),
            CatalogEntryKind::Type => catalog.get_type(schema, name)?.is_some(),
            CatalogEntryKind::Trigger => catalog.get_trigger(schema, name)?.is_some(),
            CatalogEntryKind::Function => match catalog.get_function(schema, name)? {
                Some(func) if func.system => return Err(system_object(kind, name)),
                Some(_) => true,
                None => false,
            },
            CatalogEntryKind::Index => match catalog.get_index(schema, name)? {
                Some(index) => {
                    // Indexes backing a key go away with the constraint.
                    let table = catalog.get_table(schema, &index.table)?;
                    if table.is_some_and(|t| t.find_constraint(name).is_some()) {
                        return Err(DbError::invalid_input(format!(
                            "Index '{name}' backs a constraint of table '{}', drop the constraint instead",
                            index.table
                        )));
                    }
                    true
                }
                None => false,
            },
            other => return Err(DbError::new(format!("Unexpected drop of {other}"))),
        };

        if exists {
            Ok(None)
        } else {
            self.missing(if_exists, Some(schema), kind, name).map(Some)
        }
    }
}

fn system_object(kind: CatalogEntryKind, name: &str) -> DbError {
    DbError::privilege_denied(format!("Cannot drop system {kind} '{name}'"))
        .with_field("kind", kind)
        .with_field("name", name)
}
