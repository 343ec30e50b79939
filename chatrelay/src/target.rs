//! Conversation participants and message handles exchanged with the
//! messaging platform.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An individual contact as reported by the platform directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub friend: bool,
}

/// A group conversation. `topic` is the value seen at lookup time and may drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Individual,
    Group,
}

/// Resolved handle to a conversation participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Individual(Individual),
    Group(Group),
}

impl Target {
    pub fn id(&self) -> &str {
        match self {
            Target::Individual(c) => &c.id,
            Target::Group(g) => &g.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Target::Individual(c) => &c.name,
            Target::Group(g) => &g.topic,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Individual(_) => TargetKind::Individual,
            Target::Group(_) => TargetKind::Group,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Target::Individual(c) => c.alias.as_deref().filter(|a| !a.is_empty()),
            Target::Group(_) => None,
        }
    }

    /// Only individuals carry a friend flag; groups are never "friended".
    pub fn is_friend(&self) -> bool {
        matches!(self, Target::Individual(c) if c.friend)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Individual(c) => write!(f, "Contact<{}>({})", c.name, c.id),
            Target::Group(g) => write!(f, "Room<{}>({})", g.topic, g.id),
        }
    }
}

/// Handle returned by the platform for a sent message; needed to retract it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub id: String,
}

impl MessageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Exact-match filter for individual directory lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndividualQuery {
    Alias(String),
    Name(String),
}

impl IndividualQuery {
    pub fn value(&self) -> &str {
        match self {
            IndividualQuery::Alias(v) | IndividualQuery::Name(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OutgoingContent {
    Text(String),
    File(PathBuf),
}
