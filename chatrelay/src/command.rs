//! Operator command syntax for queued outbound messages.

use std::path::PathBuf;

use crate::error::{RelayError, RelayResult};
use crate::target::TargetKind;

/// Addressing mode of a queue key, selected by reserved key literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// The key itself is the remark of the recipient.
    Normal,
    /// Every message names an individual with `#name#text`.
    Other,
    /// Every message names a group with `#topic#text`.
    Group,
}

impl QueueMode {
    pub fn for_key(key: &str, other_key: &str, group_key: &str) -> Self {
        if key == other_key {
            QueueMode::Other
        } else if key == group_key {
            QueueMode::Group
        } else {
            QueueMode::Normal
        }
    }

    pub fn ad_hoc_kind(self) -> Option<TargetKind> {
        match self {
            QueueMode::Normal => None,
            QueueMode::Other => Some(TargetKind::Individual),
            QueueMode::Group => Some(TargetKind::Group),
        }
    }
}

/// Parsed `#name#rest` body of an ad-hoc message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdHocAddress {
    pub name: String,
    pub text: String,
}

impl AdHocAddress {
    pub fn parse(body: &str) -> RelayResult<Self> {
        let rest = body
            .strip_prefix('#')
            .ok_or_else(|| RelayError::Malformed(format!("missing leading '#' in '{}'", body)))?;
        let (name, text) = rest
            .split_once('#')
            .ok_or_else(|| RelayError::Malformed(format!("missing closing '#' in '{}'", body)))?;
        if name.trim().is_empty() {
            return Err(RelayError::Malformed(format!("empty name in '{}'", body)));
        }
        if text.trim().is_empty() {
            return Err(RelayError::Malformed(format!("empty text in '{}'", body)));
        }
        Ok(Self {
            name: name.to_string(),
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Retract the latest message sent to the resolved target.
    Revoke,
    SendFile(PathBuf),
    /// Directory search; the result goes to the account itself.
    Contact(String),
    Text(String),
}

const REVOKE_VERBS: [&str; 2] = ["revoke", "recall"];
const FILE_VERBS: [&str; 3] = ["paste", "sendfile", "sz"];
const CONTACT_VERB: &str = "contact";

impl Command {
    /// First match wins: revoke, file, contact, then plain text.
    pub fn parse(text: &str) -> Self {
        if REVOKE_VERBS
            .iter()
            .any(|verb| text == *verb || text.starts_with(&format!("{} ", verb)))
        {
            return Command::Revoke;
        }
        for verb in FILE_VERBS {
            if let Some(path) = strip_verb(text, verb) {
                return Command::SendFile(PathBuf::from(path));
            }
        }
        if let Some(query) = strip_verb(text, CONTACT_VERB) {
            return Command::Contact(query.to_string());
        }
        Command::Text(text.to_string())
    }
}

fn strip_verb<'a>(text: &'a str, verb: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(verb)?.strip_prefix(' ')?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}
