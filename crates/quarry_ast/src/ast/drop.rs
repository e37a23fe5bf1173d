use serde::{Deserialize, Serialize};

use super::ObjectReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropType {
    Index,
    Function,
    Table,
    View,
    Schema,
    Sequence,
    Type,
    Trigger,
    User,
    Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DropBehavior {
    #[default]
    Restrict,
    Cascade,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropStatement {
    pub drop_type: DropType,
    pub if_exists: bool,
    pub name: ObjectReference,
    pub behavior: DropBehavior,
}

impl DropStatement {
    pub fn new(drop_type: DropType, name: &str) -> Self {
        DropStatement {
            drop_type,
            if_exists: false,
            name: ObjectReference::from(name),
            behavior: DropBehavior::Restrict,
        }
    }
}
