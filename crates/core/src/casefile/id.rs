//! Validated case-file identifier.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static CASE_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^EX-[0-9]{4}-[0-9]{1,8}- -GDEBA-[A-Z0-9#]+$").expect("static pattern is valid")
});

/// Identifier rejected before any I/O.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid case file identifier: {0:?}")]
pub struct ValidationError(pub String);

/// A case-file identifier known to match the GDEBA grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseFileId(String);

impl CaseFileId {
    /// Validates `raw` against the case-file grammar.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if CASE_FILE_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the packaged archive (`<id>.zip`).
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.0)
    }
}

impl fmt::Display for CaseFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CaseFileId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CaseFileId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CaseFileId> for String {
    fn from(id: CaseFileId) -> Self {
        id.0
    }
}

impl AsRef<str> for CaseFileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
