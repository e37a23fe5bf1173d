//! Apply the catalog changes of a compiled statement.
use quarry_error::Result;
use tracing::{debug, info};

use super::Catalog;
use crate::logical::logical_ddl::DdlAction;
use crate::logical::operator::LogicalOperator;

/// Apply every DDL action found in `plan`, in execution order.
///
/// Actions were validated during compilation, errors here come from
/// concurrent catalog changes between compiling and applying. Plans without
/// DDL are a no-op.
pub fn apply_plan(catalog: &dyn Catalog, plan: &LogicalOperator) -> Result<()> {
    match plan {
        LogicalOperator::Ddl(ddl) => apply_action(catalog, &ddl.node.action),
        LogicalOperator::Cascade(cascade) => {
            for child in &cascade.children {
                apply_plan(catalog, child)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn apply_action(catalog: &dyn Catalog, action: &DdlAction) -> Result<()> {
    debug!(action = action.kind(), object = %action.object_name(), "applying catalog change");

    match action {
        DdlAction::CreateSchema(info) => catalog.create_schema(info)?,
        DdlAction::CreateTable(info) => catalog.create_table(info)?,
        DdlAction::CreateView(info) => catalog.create_view(info)?,
        DdlAction::CreateType(info) => catalog.create_type(info)?,
        DdlAction::CreateIndex(info) => catalog.create_index(info)?,
        DdlAction::CreateSequence(info) => catalog.create_sequence(info)?,
        DdlAction::CreateUser(info) => catalog.create_user(info)?,
        DdlAction::CreateRole(info) => catalog.create_role(info)?,
        DdlAction::AlterTable(info) => catalog.alter_table(info)?,
        DdlAction::AlterSequence(info) => catalog.alter_sequence(info)?,
        DdlAction::AlterSchema(info) => catalog.alter_schema(info)?,
        DdlAction::AlterUser(info) => catalog.alter_user(info)?,
        DdlAction::Drop(info) => catalog.drop_entry(info)?,
        DdlAction::Grant(info) => catalog.grant(info)?,
        DdlAction::Revoke(info) => catalog.revoke(info)?,
        DdlAction::Noop { reason } => {
            info!(%reason, "nothing to apply");
            return Ok(());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::create::{CreateSchemaInfo, OnConflict};
    use crate::catalog::memory::MemoryCatalog;
    use crate::logical::binder::bind_ddl::{ddl_plan, noop};
    use crate::logical::logical_guard::LogicalCascade;
    use crate::logical::operator::Node;

    #[test]
    fn apply_cascade_in_order() {
        let catalog = MemoryCatalog::new();
        let create = |name: &str| {
            ddl_plan(DdlAction::CreateSchema(CreateSchemaInfo {
                name: name.to_string(),
                owner: "admin".to_string(),
                on_conflict: OnConflict::Error,
            }))
        };
        let plan = LogicalOperator::Cascade(Node::new(
            LogicalCascade {
                label: "test".to_string(),
            },
            vec![create("a"), noop("skipped".to_string()), create("b")],
        ));

        apply_plan(&catalog, &plan).unwrap();
        assert!(catalog.get_schema("a").unwrap().is_some());
        assert!(catalog.get_schema("b").unwrap().is_some());

        // Applying again conflicts.
        apply_plan(&catalog, &plan).unwrap_err();
    }
}
