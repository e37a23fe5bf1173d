use std::sync::Arc;

use quarry_ast::ast;
use quarry_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::create::bind_sequence_options;
use super::create_table::{ConstraintBuilder, bind_column_def, find_column, bind_default};
use super::{DdlBinder, already_exists, ddl_plan, noop};
use crate::catalog::create::{
    AlterSchemaInfo,
    AlterSequenceInfo,
    AlterTableInfo,
    AlterTableOp,
    AlterUserInfo,
    AlterUserOp,
    OnConflict,
};
use crate::catalog::entry::{CatalogEntryKind, ConstraintEntry, ConstraintKind, TableEntry, TableKind};
use crate::catalog::missing_entry_error;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::expr_binder::bind_datatype;
use crate::logical::logical_ddl::DdlAction;
use crate::logical::operator::LogicalOperator;
use crate::types::cast::can_cast;

impl<'a> DdlBinder<'a> {
    pub fn bind_alter_table(&self, bind_context: &mut BindContext, alter: &ast::AlterTable) -> Result<LogicalOperator> {
        let (schema, table) = match self.ctx.resolve_table(&alter.name) {
            Ok(found) => found,
            Err(e) if alter.if_exists && e.kind() == ErrorKind::NotFound => {
                return Ok(noop(format!("table '{}' does not exist", alter.name)));
            }
            Err(e) => return Err(e),
        };
        if !matches!(table.kind, TableKind::Base) {
            return Err(DbError::invalid_input(format!(
                "'{schema}.{}' is a view, use CREATE OR REPLACE VIEW instead",
                table.name
            )));
        }
        if table.system {
            return Err(DbError::privilege_denied(format!("Cannot alter system table '{}'", table.name)));
        }
        self.require_schema_privs(&schema)?;

        let op = match &alter.operation {
            ast::AlterTableOperation::AddColumn { if_not_exists, column } => {
                let name = column.name.as_normalized_string();
                if table.column_index(&name).is_some() {
                    if *if_not_exists {
                        return Ok(noop(format!("column '{name}' already exists in '{}'", table.name)));
                    }
                    return Err(DbError::already_exists(format!(
                        "Column '{name}' already exists in table '{}'",
                        table.name
                    ))
                    .with_field("column", name));
                }
                let bound = bind_column_def(self.ctx, bind_context, &schema, &table.name, column)?;
                if !bound.constraints.is_empty() || bound.sequence.is_some() {
                    return Err(DbError::unsupported(
                        "Constraints on added columns, add them with ADD CONSTRAINT",
                    ));
                }
                // Existing rows get the default, so NOT NULL needs one.
                if bound.entry.not_null && bound.entry.default.is_none() {
                    return Err(DbError::invalid_input(format!(
                        "Column '{name}' is NOT NULL and needs a default to be added to an existing table"
                    )));
                }
                AlterTableOp::AddColumn(bound.entry)
            }
            ast::AlterTableOperation::DropColumn {
                name,
                if_exists,
                behavior,
            } => {
                let name = name.as_normalized_string();
                let column = match table.visible_columns().find(|(_, c)| c.name == name) {
                    Some((idx, _)) => idx,
                    None if *if_exists => {
                        return Ok(noop(format!("column '{name}' does not exist in '{}'", table.name)));
                    }
                    None => return Err(missing_column(&table, &name)),
                };
                if table.visible_columns().count() == 1 {
                    return Err(DbError::invalid_input(format!(
                        "Cannot drop '{name}', the only column of table '{}'",
                        table.name
                    )));
                }
                let cascade = *behavior == ast::DropBehavior::Cascade;
                if !cascade {
                    if let Some(constraint) = table.constraints.iter().find(|c| constraint_uses(c, column)) {
                        return Err(DbError::invalid_input(format!(
                            "Column '{name}' is used by constraint '{}', use CASCADE",
                            constraint.name
                        )));
                    }
                    self.check_not_referenced(&schema, &table, |key| key.contains(&column))?;
                }
                AlterTableOp::DropColumn { column, cascade }
            }
            ast::AlterTableOperation::AlterColumn { name, operation } => {
                let name = name.as_normalized_string();
                let column = find_column(&table.columns, &table.name, &name)?;
                match operation {
                    ast::AlterColumnOperation::SetDefault(expr) => {
                        let datatype = table.columns[column].datatype.clone();
                        bind_default(self.ctx, bind_context, &name, &datatype, expr)?;
                        AlterTableOp::SetDefault {
                            column,
                            default: Some(expr.clone()),
                        }
                    }
                    ast::AlterColumnOperation::DropDefault => AlterTableOp::SetDefault { column, default: None },
                    ast::AlterColumnOperation::SetNotNull => AlterTableOp::SetNotNull { column, not_null: true },
                    ast::AlterColumnOperation::DropNotNull => {
                        if table.primary_key().is_some_and(|pk| pk.contains(&column)) {
                            return Err(DbError::invalid_input(format!(
                                "Column '{name}' is part of the primary key"
                            )));
                        }
                        AlterTableOp::SetNotNull {
                            column,
                            not_null: false,
                        }
                    }
                    ast::AlterColumnOperation::SetDataType(datatype) => {
                        let datatype = bind_datatype(self.ctx, datatype)?;
                        let current = &table.columns[column].datatype;
                        if !can_cast(current, &datatype) {
                            return Err(DbError::type_mismatch(format!(
                                "Cannot change column '{name}' from {current} to {datatype}"
                            ))
                            .with_field("column", name));
                        }
                        AlterTableOp::SetDataType { column, datatype }
                    }
                }
            }
            ast::AlterTableOperation::AddConstraint(constraint) => {
                let mut builder =
                    ConstraintBuilder::new(self.ctx, &schema, &table.name, &table.columns, table.constraints.clone());
                builder.add(bind_context, constraint)?;
                let added = builder.finish().into_iter().next().ok_or_else(|| {
                    DbError::new("Constraint builder returned no constraint")
                })?;
                AlterTableOp::AddConstraint(added)
            }
            ast::AlterTableOperation::DropConstraint { name, behavior } => {
                let name = name.as_normalized_string();
                let constraint = table.find_constraint(&name).ok_or_else(|| {
                    DbError::not_found(format!(
                        "Constraint '{name}' does not exist on table '{}'",
                        table.name
                    ))
                    .with_field("constraint", &name)
                })?;
                let cascade = *behavior == ast::DropBehavior::Cascade;
                if let (false, Some(key)) = (cascade, constraint.key_columns()) {
                    self.check_not_referenced(&schema, &table, |cols| same_columns(cols, key))?;
                }
                AlterTableOp::DropConstraint { name, cascade }
            }
            ast::AlterTableOperation::RenameTable { to } => {
                let to = to.as_normalized_string();
                if self.ctx.catalog.get_table(&schema, &to)?.is_some() {
                    return Err(already_exists(CatalogEntryKind::Table, &to).with_field("schema", &schema));
                }
                AlterTableOp::RenameTable { to }
            }
            ast::AlterTableOperation::RenameColumn { from, to } => {
                let from = from.as_normalized_string();
                let to = to.as_normalized_string();
                let column = find_column(&table.columns, &table.name, &from)?;
                if table.column_index(&to).is_some() {
                    return Err(DbError::already_exists(format!(
                        "Column '{to}' already exists in table '{}'",
                        table.name
                    ))
                    .with_field("column", to));
                }
                AlterTableOp::RenameColumn { column, to }
            }
            ast::AlterTableOperation::SetSchema(to) => {
                let to = to.as_normalized_string();
                self.require_schema_privs(&to)?;
                if table.temp {
                    return Err(DbError::invalid_input("Cannot move a temporary table to another schema"));
                }
                if self.ctx.catalog.get_table(&to, &table.name)?.is_some() {
                    return Err(already_exists(CatalogEntryKind::Table, &table.name).with_field("schema", &to));
                }
                AlterTableOp::SetSchema { to }
            }
        };

        debug!(%schema, table = %table.name, ?op, "bound alter table");

        Ok(ddl_plan(DdlAction::AlterTable(AlterTableInfo {
            schema,
            name: table.name.clone(),
            op,
        })))
    }

    /// Error if a foreign key in another table references a key of `table`
    /// matching `matches`.
    fn check_not_referenced(&self, schema: &str, table: &TableEntry, matches: impl Fn(&[usize]) -> bool) -> Result<()> {
        for referencing in self.ctx.catalog.referencing_tables(schema, &table.name)? {
            for fk in referencing.foreign_keys() {
                if let ConstraintKind::ForeignKey {
                    ref_schema,
                    ref_table,
                    ref_columns,
                    ..
                } = &fk.kind
                {
                    let same_table = ref_schema == schema && ref_table == &table.name;
                    let self_reference = referencing.schema == schema && referencing.name == table.name;
                    if same_table && !self_reference && matches(ref_columns) {
                        return Err(DbError::invalid_input(format!(
                            "Referenced by foreign key '{}' on table '{}', use CASCADE",
                            fk.name, referencing.name
                        ))
                        .with_field("constraint", &fk.name));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn bind_alter_sequence(&self, alter: &ast::AlterSequence) -> Result<LogicalOperator> {
        let (schema, name) = self.ctx.schema_for(&alter.name)?;
        let sequence = self.ctx.catalog.get_sequence(&schema, &name)?.ok_or_else(|| {
            missing_entry_error(self.ctx.catalog, Some(&schema), CatalogEntryKind::Sequence, &name)
        })?;
        self.require_schema_privs(&schema)?;

        let restart = alter.restart.map(|restart| restart.unwrap_or(sequence.start));

        // Validate the combined options as if the sequence were created with
        // them.
        let options = ast::SequenceOptions {
            datatype: None,
            start: Some(restart.unwrap_or(sequence.start)),
            increment: Some(alter.increment.unwrap_or(sequence.increment)),
            min_value: Some(alter.min_value.unwrap_or(sequence.min_value)),
            max_value: Some(alter.max_value.unwrap_or(sequence.max_value)),
            cycle: Some(alter.cycle.unwrap_or(sequence.cycle)),
            cache: Some(sequence.cache),
        };
        bind_sequence_options(&schema, &name, sequence.datatype.clone(), &options, OnConflict::Error)?;

        Ok(ddl_plan(DdlAction::AlterSequence(AlterSequenceInfo {
            schema,
            name,
            restart,
            increment: alter.increment,
            min_value: alter.min_value,
            max_value: alter.max_value,
            cycle: alter.cycle,
        })))
    }

    pub fn bind_alter_schema(&self, alter: &ast::AlterSchema) -> Result<LogicalOperator> {
        let name = alter.name.as_normalized_string();
        let Some(entry) = self.ctx.catalog.get_schema(&name)? else {
            return self.missing(alter.if_exists, None, CatalogEntryKind::Schema, &name);
        };
        if entry.system {
            return Err(DbError::privilege_denied(format!("Cannot alter system schema '{name}'")));
        }
        self.require_schema_privs(&name)?;

        let rename_to = alter.rename_to.as_normalized_string();
        if self.ctx.catalog.get_schema(&rename_to)?.is_some() {
            return Err(already_exists(CatalogEntryKind::Schema, &rename_to));
        }

        Ok(ddl_plan(DdlAction::AlterSchema(AlterSchemaInfo { name, rename_to })))
    }

    pub fn bind_alter_user(&self, alter: &ast::AlterUser) -> Result<LogicalOperator> {
        let name = alter.name.as_normalized_string();
        if self.ctx.catalog.get_user(&name)?.is_none() {
            return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::User, &name));
        }

        // Users may change their own settings, anything else is for admins.
        let is_self = self.ctx.session.user == name;
        if !is_self || matches!(alter.operation, ast::AlterUserOperation::Rename(_)) {
            self.require_admin("alter users")?;
        }

        let op = match &alter.operation {
            ast::AlterUserOperation::SetPassword { password, .. } => {
                if password.is_empty() {
                    return Err(DbError::invalid_input("Password cannot be empty"));
                }
                AlterUserOp::SetPassword
            }
            ast::AlterUserOperation::SetSchema(schema) => {
                let schema = schema.as_normalized_string();
                self.ctx.catalog.require_schema(&schema)?;
                AlterUserOp::SetSchema(schema)
            }
            ast::AlterUserOperation::SetDefaultRole(role) => {
                let role = role.as_normalized_string();
                if self.ctx.catalog.get_role(&role)?.is_none() {
                    return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::Role, &role));
                }
                AlterUserOp::SetDefaultRole(role)
            }
            ast::AlterUserOperation::Rename(to) => {
                let to = to.as_normalized_string();
                if is_self {
                    return Err(DbError::invalid_input("Cannot rename the current session user"));
                }
                if self.ctx.catalog.get_user(&to)?.is_some() || self.ctx.catalog.get_role(&to)?.is_some() {
                    return Err(already_exists(CatalogEntryKind::User, &to));
                }
                AlterUserOp::Rename(to)
            }
        };

        Ok(ddl_plan(DdlAction::AlterUser(AlterUserInfo { name, op })))
    }
}

fn constraint_uses(constraint: &ConstraintEntry, column: usize) -> bool {
    match &constraint.kind {
        ConstraintKind::PrimaryKey(cols) | ConstraintKind::Unique(cols) => cols.contains(&column),
        ConstraintKind::ForeignKey { columns, .. } => columns.contains(&column),
        ConstraintKind::Check(_) => false,
    }
}

fn same_columns(a: &[usize], b: &[usize]) -> bool {
    a.len() == b.len() && a.iter().all(|col| b.contains(col))
}

fn missing_column(table: &Arc<TableEntry>, name: &str) -> DbError {
    DbError::not_found(format!("Column '{name}' does not exist in table '{}'", table.name))
        .with_field("column", name)
        .with_field("table", &table.name)
}
