//! Rarely-changing lookup tables served through the reference cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub name: String,
    pub sequence: i32,
    pub is_won: bool,
}

/// Sales team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// User that can own records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salesperson {
    pub id: i64,
    pub name: String,
    pub login: Option<String>,
}

/// Record label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Stable cache key for each reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKey {
    Stages,
    Teams,
    Salespeople,
    Tags,
}

impl ReferenceKey {
    /// Every reference table, in a fixed order.
    pub const ALL: [Self; 4] = [Self::Stages, Self::Teams, Self::Salespeople, Self::Tags];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stages => "reference:stages",
            Self::Teams => "reference:teams",
            Self::Salespeople => "reference:salespeople",
            Self::Tags => "reference:tags",
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached payload for one reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTable {
    Stages(Vec<Stage>),
    Teams(Vec<Team>),
    Salespeople(Vec<Salesperson>),
    Tags(Vec<Tag>),
}

impl ReferenceTable {
    /// Key this table is cached under.
    pub const fn key(&self) -> ReferenceKey {
        match self {
            Self::Stages(_) => ReferenceKey::Stages,
            Self::Teams(_) => ReferenceKey::Teams,
            Self::Salespeople(_) => ReferenceKey::Salespeople,
            Self::Tags(_) => ReferenceKey::Tags,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Stages(rows) => rows.len(),
            Self::Teams(rows) => rows.len(),
            Self::Salespeople(rows) => rows.len(),
            Self::Tags(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
