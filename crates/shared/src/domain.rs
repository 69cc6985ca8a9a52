use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(EventId);
id_newtype!(SectionId);
id_newtype!(SessionId);

/// A column of the board. `order` is only compared, never used as an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub event_id: EventId,
    pub name: String,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Section {
    pub fn new(
        event_id: impl Into<EventId>,
        id: impl Into<SectionId>,
        name: impl Into<String>,
        order: i64,
    ) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            name: name.into(),
            order,
            date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    pub initials: String,
}

/// A card on the board, owned by exactly one section of the same event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub event_id: EventId,
    pub section_id: SectionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub order: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub speakers: Vec<Speaker>,
}

impl Session {
    pub fn new(
        event_id: impl Into<EventId>,
        section_id: impl Into<SectionId>,
        id: impl Into<SessionId>,
        name: impl Into<String>,
        order: i64,
    ) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            section_id: section_id.into(),
            name: name.into(),
            description: String::new(),
            order,
            tags: Vec::new(),
            speakers: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
