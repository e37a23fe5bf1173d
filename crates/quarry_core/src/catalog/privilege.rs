use std::fmt;
use std::ops::BitOr;

use quarry_ast::ast;

/// Set of object privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Privileges(u32);

impl Privileges {
    pub const NONE: Self = Privileges(0);
    pub const SELECT: Self = Privileges(1);
    pub const INSERT: Self = Privileges(1 << 1);
    pub const UPDATE: Self = Privileges(1 << 2);
    pub const DELETE: Self = Privileges(1 << 3);
    pub const TRUNCATE: Self = Privileges(1 << 4);
    pub const REFERENCES: Self = Privileges(1 << 5);
    pub const EXECUTE: Self = Privileges(1 << 6);
    pub const ALL: Self = Privileges((1 << 7) - 1);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Privileges(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Privileges(self.0 & !other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn from_ast(kind: ast::PrivilegeKind) -> Self {
        match kind {
            ast::PrivilegeKind::Select => Self::SELECT,
            ast::PrivilegeKind::Insert => Self::INSERT,
            ast::PrivilegeKind::Update => Self::UPDATE,
            ast::PrivilegeKind::Delete => Self::DELETE,
            ast::PrivilegeKind::Truncate => Self::TRUNCATE,
            ast::PrivilegeKind::References => Self::REFERENCES,
            ast::PrivilegeKind::Execute => Self::EXECUTE,
            ast::PrivilegeKind::All => Self::ALL,
        }
    }
}

impl BitOr for Privileges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Display for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Privileges, &str); 7] = [
            (Privileges::SELECT, "SELECT"),
            (Privileges::INSERT, "INSERT"),
            (Privileges::UPDATE, "UPDATE"),
            (Privileges::DELETE, "DELETE"),
            (Privileges::TRUNCATE, "TRUNCATE"),
            (Privileges::REFERENCES, "REFERENCES"),
            (Privileges::EXECUTE, "EXECUTE"),
        ];
        if *self == Self::ALL {
            return write!(f, "ALL");
        }
        let names: Vec<_> = NAMES
            .iter()
            .filter(|(p, _)| self.contains(*p))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_and_display() {
        let privs = Privileges::SELECT | Privileges::UPDATE;
        assert!(privs.contains(Privileges::SELECT));
        assert!(!privs.contains(Privileges::INSERT));
        assert!(Privileges::ALL.contains(privs));
        assert_eq!("SELECT, UPDATE", privs.to_string());
        assert_eq!("ALL", Privileges::ALL.to_string());
    }

    #[test]
    fn difference() {
        let privs = Privileges::ALL.difference(Privileges::DELETE);
        assert!(!privs.contains(Privileges::DELETE));
        assert!(privs.contains(Privileges::TRUNCATE));
    }
}
