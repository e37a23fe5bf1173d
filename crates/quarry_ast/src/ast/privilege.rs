use serde::{Deserialize, Serialize};

use super::{DropBehavior, Ident, ObjectReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivilegeKind {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    References,
    Execute,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub kind: PrivilegeKind,
    /// Column list for column level privileges, e.g. `UPDATE (a, b)`.
    pub columns: Option<Vec<Ident>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivilegeObject {
    Table(ObjectReference),
    Function(ObjectReference),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantObject {
    /// `GRANT SELECT, UPDATE (a) ON t TO ...`
    Privileges {
        privileges: Vec<Privilege>,
        on: PrivilegeObject,
    },
    /// `GRANT role TO user`
    Roles(Vec<Ident>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub object: GrantObject,
    pub grantees: Vec<Ident>,
    /// `WITH GRANT OPTION` for privileges, `WITH ADMIN OPTION` for roles.
    pub with_grant_option: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revoke {
    pub object: GrantObject,
    pub grantees: Vec<Ident>,
    /// `REVOKE GRANT OPTION FOR ...`
    pub grant_option_for: bool,
    pub behavior: DropBehavior,
}
