//! Values exchanged with the remote content API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque optimistic-concurrency token (the remote's content hash).
///
/// Presented on every update or delete of an existing path. A token that no
/// longer matches the stored object makes the write fail with a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentToken(String);

impl ContentToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file as stored remotely, with the token that guards its next write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub bytes: Vec<u8>,
    pub token: ContentToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules and anything else the remote may report.
    #[serde(other)]
    Other,
}

/// One element of a directory listing, in the remote's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Undecoded result of a GET on the contents endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawContent {
    File(StoredObject),
    Directory(Vec<DirEntry>),
    NotFound,
}

/// Decoded result of [`ContentClient::fetch`](crate::ContentClient::fetch).
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// The file parsed as JSON.
    Json(Value),
    /// The file is not JSON; its bytes as text.
    Text(String),
    Directory(Vec<DirEntry>),
    NotFound,
}

impl Fetched {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was stored at the path; nothing to do.
    AlreadyAbsent,
}

/// Last path component of a slash-separated storage path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
