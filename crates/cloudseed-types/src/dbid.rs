use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SeedError};

/// Unique identifier of a database instance.
///
/// Always stored trimmed: the value registered externally is the value read
/// back from the local IDENTITY file, so surrounding whitespace never counts.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dbid(String);

impl Dbid {
    /// Generate a random RFC 4122 version 4 identifier.
    pub fn generate() -> Self {
        Dbid(uuid::Uuid::new_v4().to_string())
    }

    /// Parse the content of a persisted identity file.
    pub fn from_persisted(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SeedError::InvalidFormat("empty dbid".into()));
        }
        Ok(Dbid(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Dbid {
    type Error = SeedError;

    fn try_from(value: String) -> Result<Self> {
        Dbid::from_persisted(&value)
    }
}

impl From<Dbid> for String {
    fn from(value: Dbid) -> Self {
        value.0
    }
}

impl fmt::Debug for Dbid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dbid({})", self.0)
    }
}

impl fmt::Display for Dbid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
