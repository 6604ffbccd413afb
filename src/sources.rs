use std::{fmt, io};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod local;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub i64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub i64);

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Photo,
    Text,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => write!(f, "photo"),
            Self::Text => write!(f, "text"),
        }
    }
}

pub enum SourceBody {
    /// the photo itself is fetched separately with [`ContentSource::download_photo`]
    Photo,
    Text(String),
}

pub struct SourceItem {
    pub id: SourceId,
    pub author: AuthorId,
    pub caption: Option<String>,
    pub body: SourceBody,
}

pub struct AuthorProfile {
    pub display_name: String,
    pub avatar: Option<Vec<u8>>,
}

#[derive(Debug)]
pub enum SourceError {
    Io(io::Error),
    Malformed(String),
    Unavailable(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "content source I/O error: {err}"),
            Self::Malformed(reason) => write!(f, "malformed content source: {reason}"),
            Self::Unavailable(reason) => write!(f, "content source unavailable: {reason}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<io::Error> for SourceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// An offset-addressable listing of photos and texts within one scope.
///
/// Two calls with the same offset are expected, but not guaranteed, to return the same item.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn count(&self, kind: ContentKind) -> Result<usize, SourceError>;

    async fn item_at(
        &self,
        kind: ContentKind,
        offset: usize,
    ) -> Result<Option<SourceItem>, SourceError>;

    /// encoded bytes of the photo identified by `id`
    async fn download_photo(&self, id: SourceId) -> Result<Vec<u8>, SourceError>;
}

#[async_trait]
pub trait AuthorResolver: Send + Sync {
    async fn resolve(&self, id: AuthorId) -> Result<Option<AuthorProfile>, SourceError>;
}
