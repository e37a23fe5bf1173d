use super::operator::impl_no_output_node;
use crate::catalog::create::{
    AlterSchemaInfo,
    AlterSequenceInfo,
    AlterTableInfo,
    AlterUserInfo,
    CreateIndexInfo,
    CreateRoleInfo,
    CreateSchemaInfo,
    CreateSequenceInfo,
    CreateTableInfo,
    CreateTypeInfo,
    CreateUserInfo,
    CreateViewInfo,
    DropInfo,
    GrantInfo,
};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};

/// A fully validated catalog change.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlAction {
    CreateSchema(CreateSchemaInfo),
    CreateTable(CreateTableInfo),
    CreateView(CreateViewInfo),
    CreateType(CreateTypeInfo),
    CreateIndex(CreateIndexInfo),
    CreateSequence(CreateSequenceInfo),
    CreateUser(CreateUserInfo),
    CreateRole(CreateRoleInfo),
    AlterTable(AlterTableInfo),
    AlterSequence(AlterSequenceInfo),
    AlterSchema(AlterSchemaInfo),
    AlterUser(AlterUserInfo),
    Drop(DropInfo),
    Grant(GrantInfo),
    Revoke(GrantInfo),
    /// Nothing to do, e.g. `DROP ... IF EXISTS` for a missing object.
    Noop { reason: String },
}

impl DdlAction {
    /// Short name of the action.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateSchema(_) => "create_schema",
            Self::CreateTable(_) => "create_table",
            Self::CreateView(_) => "create_view",
            Self::CreateType(_) => "create_type",
            Self::CreateIndex(_) => "create_index",
            Self::CreateSequence(_) => "create_sequence",
            Self::CreateUser(_) => "create_user",
            Self::CreateRole(_) => "create_role",
            Self::AlterTable(_) => "alter_table",
            Self::AlterSequence(_) => "alter_sequence",
            Self::AlterSchema(_) => "alter_schema",
            Self::AlterUser(_) => "alter_user",
            Self::Drop(_) => "drop",
            Self::Grant(_) => "grant",
            Self::Revoke(_) => "revoke",
            Self::Noop { .. } => "noop",
        }
    }

    /// Name of the object being changed.
    pub fn object_name(&self) -> String {
        fn qualified(schema: &str, name: &str) -> String {
            format!("{schema}.{name}")
        }

        match self {
            Self::CreateSchema(info) => info.name.clone(),
            Self::CreateTable(info) => qualified(&info.schema, &info.name),
            Self::CreateView(info) => qualified(&info.schema, &info.name),
            Self::CreateType(info) => qualified(&info.schema, &info.name),
            Self::CreateIndex(info) => qualified(&info.schema, &info.name),
            Self::CreateSequence(info) => qualified(&info.schema, &info.name),
            Self::CreateUser(info) => info.name.clone(),
            Self::CreateRole(info) => info.name.clone(),
            Self::AlterTable(info) => qualified(&info.schema, &info.name),
            Self::AlterSequence(info) => qualified(&info.schema, &info.name),
            Self::AlterSchema(info) => info.name.clone(),
            Self::AlterUser(info) => info.name.clone(),
            Self::Drop(info) => match &info.schema {
                Some(schema) => qualified(schema, &info.name),
                None => info.name.clone(),
            },
            Self::Grant(info) | Self::Revoke(info) => info.grantees.join(", "),
            Self::Noop { reason } => reason.clone(),
        }
    }
}

/// Catalog change. A `CREATE TABLE ... AS` has the query as its only child.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDdl {
    pub action: DdlAction,
}

impl Explainable for LogicalDdl {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Ddl", conf)
            .with_value("action", self.action.kind())
            .with_value("object", self.action.object_name())
            .build()
    }
}

impl_no_output_node!(LogicalDdl, "Ddl");
