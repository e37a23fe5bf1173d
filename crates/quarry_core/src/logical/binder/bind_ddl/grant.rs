use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::create_table::find_column;
use super::{DdlBinder, ddl_plan};
use crate::catalog::create::{GrantInfo, GrantTarget, PrivilegeObject};
use crate::catalog::entry::CatalogEntryKind;
use crate::catalog::missing_entry_error;
use crate::catalog::privilege::Privileges;
use crate::logical::logical_ddl::DdlAction;
use crate::logical::logical_guard::LogicalCascade;
use crate::logical::operator::{LogicalOperator, Node};

/// Privileges that apply to tables and views.
const TABLE_PRIVILEGES: Privileges = Privileges::ALL.difference(Privileges::EXECUTE);

/// Privileges that may be limited to a list of columns.
const COLUMN_PRIVILEGES: Privileges = Privileges::SELECT
    .union(Privileges::INSERT)
    .union(Privileges::UPDATE)
    .union(Privileges::REFERENCES);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrantKind {
    Grant,
    Revoke,
}

impl<'a> DdlBinder<'a> {
    pub fn bind_grant(&self, grant: &ast::Grant) -> Result<LogicalOperator> {
        self.bind_grant_object(GrantKind::Grant, &grant.object, &grant.grantees, grant.with_grant_option)
    }

    pub fn bind_revoke(&self, revoke: &ast::Revoke) -> Result<LogicalOperator> {
        self.bind_grant_object(GrantKind::Revoke, &revoke.object, &revoke.grantees, revoke.grant_option_for)
    }

    fn bind_grant_object(
        &self,
        kind: GrantKind,
        object: &ast::GrantObject,
        grantees: &[ast::Ident],
        grant_option: bool,
    ) -> Result<LogicalOperator> {
        let grantees = self.bind_grantees(grantees)?;

        let targets = match object {
            ast::GrantObject::Privileges { privileges, on } => self.bind_privileges(privileges, on)?,
            ast::GrantObject::Roles(roles) => {
                self.require_admin("grant roles")?;
                let mut bound = Vec::with_capacity(roles.len());
                for role in roles {
                    let role = role.as_normalized_string();
                    if self.ctx.catalog.get_role(&role)?.is_none() {
                        return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::Role, &role));
                    }
                    if grantees.contains(&role) {
                        return Err(DbError::invalid_input(format!("Role '{role}' cannot be granted to itself")));
                    }
                    bound.push(role);
                }
                vec![GrantTarget::Roles(bound)]
            }
        };

        debug!(?kind, grantees = ?grantees, targets = targets.len(), "bound grant");

        let mut plans: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let info = GrantInfo {
                    target,
                    grantees: grantees.clone(),
                    grant_option,
                    grantor: self.ctx.session.user.clone(),
                };
                ddl_plan(match kind {
                    GrantKind::Grant => DdlAction::Grant(info),
                    GrantKind::Revoke => DdlAction::Revoke(info),
                })
            })
            .collect();

        if plans.len() == 1 {
            if let Some(plan) = plans.pop() {
                return Ok(plan);
            }
        }
        let label = match kind {
            GrantKind::Grant => "grant",
            GrantKind::Revoke => "revoke",
        };
        Ok(LogicalOperator::Cascade(Node::new(
            LogicalCascade {
                label: label.to_string(),
            },
            plans,
        )))
    }

    fn bind_grantees(&self, grantees: &[ast::Ident]) -> Result<Vec<String>> {
        if grantees.is_empty() {
            return Err(DbError::invalid_input("At least one grantee is required"));
        }
        let mut bound: Vec<String> = Vec::with_capacity(grantees.len());
        for grantee in grantees {
            let grantee = grantee.as_normalized_string();
            if self.ctx.catalog.get_user(&grantee)?.is_none() && self.ctx.catalog.get_role(&grantee)?.is_none() {
                return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::User, &grantee));
            }
            if !bound.contains(&grantee) {
                bound.push(grantee);
            }
        }
        Ok(bound)
    }

    /// Bind a privilege list to one target per distinct column list.
    fn bind_privileges(&self, privileges: &[ast::Privilege], on: &ast::PrivilegeObject) -> Result<Vec<GrantTarget>> {
        match on {
            ast::PrivilegeObject::Table(reference) => {
                let (schema, table) = self.ctx.resolve_table(reference)?;
                // Owners of the schema manage grants on its tables.
                if !self.ctx.catalog.schema_privs(self.ctx.session, &schema)? {
                    return Err(DbError::privilege_denied(format!(
                        "Only the owner of '{schema}.{}' can grant privileges on it",
                        table.name
                    ))
                    .with_field("user", &self.ctx.session.user));
                }

                let mut groups: Vec<(Option<Vec<String>>, Privileges)> = Vec::new();
                for privilege in privileges {
                    let privs = match privilege.kind {
                        ast::PrivilegeKind::Execute => {
                            return Err(DbError::invalid_input("EXECUTE cannot be granted on a table"));
                        }
                        ast::PrivilegeKind::All => TABLE_PRIVILEGES,
                        kind => Privileges::from_ast(kind),
                    };

                    let columns = match &privilege.columns {
                        Some(idents) => {
                            if !COLUMN_PRIVILEGES.contains(privs) {
                                return Err(DbError::invalid_input(format!(
                                    "{privs} cannot be limited to columns"
                                )));
                            }
                            let mut columns = Vec::with_capacity(idents.len());
                            for ident in idents {
                                let idx = find_column(&table.columns, &table.name, &ident.as_normalized_string())?;
                                let name = table.columns[idx].name.clone();
                                if !columns.contains(&name) {
                                    columns.push(name);
                                }
                            }
                            Some(columns)
                        }
                        None => None,
                    };

                    match groups.iter_mut().find(|(cols, _)| cols == &columns) {
                        Some((_, existing)) => *existing = existing.union(privs),
                        None => groups.push((columns, privs)),
                    }
                }
                if groups.is_empty() {
                    return Err(DbError::invalid_input("At least one privilege is required"));
                }

                Ok(groups
                    .into_iter()
                    .map(|(columns, privileges)| GrantTarget::Privileges {
                        privileges,
                        object: PrivilegeObject::Table {
                            schema: schema.clone(),
                            table: table.name.clone(),
                            columns,
                        },
                    })
                    .collect())
            }
            ast::PrivilegeObject::Function(reference) => {
                let (schema, name) = self.resolve_function(reference)?;
                for privilege in privileges {
                    if !matches!(privilege.kind, ast::PrivilegeKind::Execute | ast::PrivilegeKind::All) {
                        return Err(DbError::invalid_input(format!(
                            "Only EXECUTE can be granted on function '{name}'"
                        )));
                    }
                    if privilege.columns.is_some() {
                        return Err(DbError::invalid_input("Function privileges cannot list columns"));
                    }
                }
                Ok(vec![GrantTarget::Privileges {
                    privileges: Privileges::EXECUTE,
                    object: PrivilegeObject::Function { schema, name },
                }])
            }
        }
    }

    fn resolve_function(&self, reference: &ast::ObjectReference) -> Result<(String, String)> {
        let (schema, name) = reference.schema_and_name()?;
        let candidates = match schema {
            Some(schema) => vec![schema],
            None => vec![
                self.ctx.session.schema.clone(),
                self.ctx.config.default_schema_fallback.clone(),
            ],
        };

        for schema in &candidates {
            if let Some(func) = self.ctx.catalog.get_function(schema, &name)? {
                if func.system {
                    self.require_admin("grant privileges on system functions")?;
                } else if !self.ctx.catalog.schema_privs(self.ctx.session, schema)? {
                    return Err(DbError::privilege_denied(format!(
                        "Only the owner of '{schema}.{name}' can grant privileges on it"
                    )));
                }
                return Ok((schema.clone(), func.name.clone()));
            }
        }

        Err(missing_entry_error(
            self.ctx.catalog,
            candidates.first().map(|s| s.as_str()),
            CatalogEntryKind::Function,
            &name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::catalog::Catalog;
    use crate::config::session::SessionIdentity;
    use crate::logical::binder::bind_ddl::testutil::{action, compile, run};
    use crate::logical::operator::LogicalNode;
    use crate::testutil::Fixture;
    use crate::types::datatype::DataType;

    fn fixture_with_user() -> Fixture {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32), ("b", DataType::Int32)]);
        run(
            &fixture,
            Statement::CreateUser(ast::CreateUser {
                name: ast::Ident::new("bob"),
                password: "pw".to_string(),
                encrypted: false,
                full_name: String::new(),
                default_schema: None,
                default_role: None,
            }),
        )
        .unwrap();
        fixture
    }

    fn grant(privileges: Vec<ast::Privilege>, table: &str, grantee: &str) -> Statement {
        Statement::Grant(ast::Grant {
            object: ast::GrantObject::Privileges {
                privileges,
                on: ast::PrivilegeObject::Table(ast::ObjectReference::from(table)),
            },
            grantees: vec![ast::Ident::new(grantee)],
            with_grant_option: false,
        })
    }

    fn privilege(kind: ast::PrivilegeKind, columns: Option<&[&str]>) -> ast::Privilege {
        ast::Privilege {
            kind,
            columns: columns.map(|cols| cols.iter().map(|c| ast::Ident::new(*c)).collect()),
        }
    }

    #[test]
    fn grant_select_allows_query() {
        let mut fixture = fixture_with_user();
        run(&fixture, grant(vec![privilege(ast::PrivilegeKind::Select, None)], "t", "bob")).unwrap();

        fixture.session = SessionIdentity::new("bob", "public", "main");
        let query = ast::QueryNode::select(ast::SelectNode::new(vec![ast::SelectExpr::Wildcard]).from(ast::FromNode::table("t")));
        compile(&fixture, Statement::Query(query)).unwrap();
    }

    #[test]
    fn column_grants_split_by_column_list() {
        let fixture = fixture_with_user();
        let compiled = compile(
            &fixture,
            grant(
                vec![
                    privilege(ast::PrivilegeKind::Select, None),
                    privilege(ast::PrivilegeKind::Update, Some(&["b"])),
                ],
                "t",
                "bob",
            ),
        )
        .unwrap();
        assert_eq!("Cascade", compiled.plan.name());
        assert_eq!(2, compiled.plan.children().len());

        let DdlAction::Grant(info) = action(&compiled.plan.children()[1]) else {
            panic!("expected grant");
        };
        assert_eq!(
            GrantTarget::Privileges {
                privileges: Privileges::UPDATE,
                object: PrivilegeObject::Table {
                    schema: "main".to_string(),
                    table: "t".to_string(),
                    columns: Some(vec!["b".to_string()]),
                },
            },
            info.target
        );
    }

    #[test]
    fn grant_errors() {
        let fixture = fixture_with_user();

        let err = compile(&fixture, grant(vec![privilege(ast::PrivilegeKind::Select, None)], "t", "nobody")).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());

        let err = compile(
            &fixture,
            grant(vec![privilege(ast::PrivilegeKind::Select, Some(&["missing"]))], "t", "bob"),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());

        let err = compile(
            &fixture,
            grant(vec![privilege(ast::PrivilegeKind::Delete, Some(&["a"]))], "t", "bob"),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn non_owner_cannot_grant() {
        let mut fixture = fixture_with_user();
        fixture.session = SessionIdentity::new("bob", "public", "main");
        let err = compile(&fixture, grant(vec![privilege(ast::PrivilegeKind::Select, None)], "t", "bob")).unwrap_err();
        assert_eq!(ErrorKind::PrivilegeDenied, err.kind());
    }

    #[test]
    fn grant_role() {
        let fixture = fixture_with_user();
        run(
            &fixture,
            Statement::CreateRole(ast::CreateRole {
                name: ast::Ident::new("readers"),
                admin: None,
            }),
        )
        .unwrap();
        let stmt = Statement::Grant(ast::Grant {
            object: ast::GrantObject::Roles(vec![ast::Ident::new("readers")]),
            grantees: vec![ast::Ident::new("bob")],
            with_grant_option: false,
        });
        let compiled = run(&fixture, stmt).unwrap();
        assert!(matches!(action(&compiled.plan), DdlAction::Grant(_)));
        assert!(fixture.catalog.get_role("readers").unwrap().is_some());
    }
}
