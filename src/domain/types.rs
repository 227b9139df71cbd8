//! Shared domain enumerations.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// A single patchable facet of a relation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationFlag {
    Blocked,
    Following,
    Subscribed,
}

impl RelationFlag {
    pub const ALL: [RelationFlag; 3] = [
        RelationFlag::Blocked,
        RelationFlag::Following,
        RelationFlag::Subscribed,
    ];

    /// Column holding this facet in the `user_relations` table.
    pub fn column(self) -> &'static str {
        match self {
            RelationFlag::Blocked => "is_blocked",
            RelationFlag::Following => "is_following",
            RelationFlag::Subscribed => "is_subscribed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationFlag::Blocked => "blocked",
            RelationFlag::Following => "following",
            RelationFlag::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for RelationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationFlag {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blocked" | "is_blocked" => Ok(RelationFlag::Blocked),
            "following" | "is_following" => Ok(RelationFlag::Following),
            "subscribed" | "is_subscribed" => Ok(RelationFlag::Subscribed),
            other => Err(DomainError::validation(format!(
                "unknown relation flag `{other}`"
            ))),
        }
    }
}
