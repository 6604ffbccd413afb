use std::fmt;
use std::sync::Arc;

use image::{ImageError, RgbaImage};

use crate::sources::{AuthorId, ContentKind, SourceError, SourceId};
use crate::utilities::cache::BoundedCache;

mod compose;
pub mod effects;
pub mod placement;
pub mod renderer;
pub mod request;
pub mod sampler;
pub mod templates;

pub type PhotoCache = BoundedCache<SourceId, Arc<RgbaImage>>;
pub type AuthorCache = BoundedCache<AuthorId, Arc<Author>>;

#[derive(Clone, Debug)]
pub enum Payload {
    Photo(Arc<RgbaImage>),
    Text(String),
}

/// A sampled photo or text, immutable once sampled.
#[derive(Clone, Debug)]
pub struct ContentItem {
    pub payload: Payload,
    pub source_id: SourceId,
    pub author_id: AuthorId,
    pub caption: Option<String>,
}

impl ContentItem {
    pub const fn kind(&self) -> ContentKind {
        match self.payload {
            Payload::Photo(_) => ContentKind::Photo,
            Payload::Text(_) => ContentKind::Text,
        }
    }

    pub fn photo(&self) -> Option<&RgbaImage> {
        match &self.payload {
            Payload::Photo(photo) => Some(photo),
            Payload::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Photo(_) => None,
        }
    }

    /// byte-exact for photos, exact match for texts
    pub fn same_content(&self, other: &Self) -> bool {
        match (&self.payload, &other.payload) {
            (Payload::Photo(a), Payload::Photo(b)) => {
                a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
            }
            (Payload::Text(a), Payload::Text(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct Author {
    pub id: AuthorId,
    pub display_name: String,
    pub avatar: Option<RgbaImage>,
}

/// A content item that could not be given an overlap-free spot and was left out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementMiss {
    pub index: usize,
    pub source_id: SourceId,
}

#[derive(Debug)]
pub enum RenderError {
    EmptyPool(ContentKind),
    InsufficientContent { kind: ContentKind, obtained: usize, required: usize },
    BackgroundUnavailable(String),
    SlotMismatch { kind: ContentKind, slots: usize, supplied: usize },
    Source(SourceError),
    Encoding(ImageError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPool(kind) => write!(f, "there are no {kind}s to sample from"),
            Self::InsufficientContent { kind, obtained, required } => {
                write!(f, "could only get {obtained} of {required} distinct {kind}s")
            }
            Self::BackgroundUnavailable(reason) => {
                write!(f, "failed to get a background image: {reason}")
            }
            Self::SlotMismatch { kind, slots, supplied } => {
                write!(f, "template has {slots} {kind} slots but {supplied} {kind}s were supplied")
            }
            Self::Source(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "failed to encode the image: {err}"),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<SourceError> for RenderError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}
