use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    AuthorId, AuthorProfile, AuthorResolver, ContentKind, ContentSource, SourceBody, SourceError,
    SourceId, SourceItem,
};

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    authors: Vec<AuthorEntry>,
    #[serde(default)]
    photos: Vec<PhotoEntry>,
    #[serde(default)]
    texts: Vec<TextEntry>,
}

#[derive(Deserialize)]
struct AuthorEntry {
    id: AuthorId,
    name: String,
    avatar: Option<PathBuf>,
}

#[derive(Deserialize)]
struct PhotoEntry {
    path: PathBuf,
    author: AuthorId,
    caption: Option<String>,
}

#[derive(Deserialize)]
struct TextEntry {
    text: String,
    author: AuthorId,
}

/// Content and authors described by a JSON manifest on disk.
///
/// Relative file paths in the manifest are resolved against the manifest's directory. Offsets
/// follow manifest order, and photo ids are their offsets.
pub struct LocalLibrary {
    root: PathBuf,
    manifest: Manifest,
}

impl LocalLibrary {
    pub async fn open(path: &Path) -> Result<Self, SourceError> {
        let data = tokio::fs::read(path).await?;
        let manifest = serde_json::from_slice(&data)
            .map_err(|err| SourceError::Malformed(format!("{}: {err}", path.display())))?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(Self { root, manifest })
    }
}

#[async_trait]
impl ContentSource for LocalLibrary {
    async fn count(&self, kind: ContentKind) -> Result<usize, SourceError> {
        Ok(match kind {
            ContentKind::Photo => self.manifest.photos.len(),
            ContentKind::Text => self.manifest.texts.len(),
        })
    }

    async fn item_at(
        &self,
        kind: ContentKind,
        offset: usize,
    ) -> Result<Option<SourceItem>, SourceError> {
        let id = SourceId(i64::try_from(offset).map_err(|_| {
            SourceError::Unavailable(format!("offset {offset} is out of range"))
        })?);

        let item = match kind {
            ContentKind::Photo => self.manifest.photos.get(offset).map(|photo| SourceItem {
                id,
                author: photo.author,
                caption: photo.caption.clone(),
                body: SourceBody::Photo,
            }),
            ContentKind::Text => self.manifest.texts.get(offset).map(|text| SourceItem {
                id,
                author: text.author,
                caption: None,
                body: SourceBody::Text(text.text.clone()),
            }),
        };

        Ok(item)
    }

    async fn download_photo(&self, id: SourceId) -> Result<Vec<u8>, SourceError> {
        let photo = usize::try_from(id.0)
            .ok()
            .and_then(|offset| self.manifest.photos.get(offset))
            .ok_or_else(|| SourceError::Unavailable(format!("no photo {id}")))?;

        Ok(tokio::fs::read(self.root.join(&photo.path)).await?)
    }
}

#[async_trait]
impl AuthorResolver for LocalLibrary {
    async fn resolve(&self, id: AuthorId) -> Result<Option<AuthorProfile>, SourceError> {
        let Some(author) = self.manifest.authors.iter().find(|author| author.id == id) else {
            return Ok(None);
        };

        let avatar = match &author.avatar {
            Some(path) => match tokio::fs::read(self.root.join(path)).await {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    log::warn!("avatar of {id} unreadable: {err}");
                    None
                }
            },
            None => None,
        };

        Ok(Some(AuthorProfile { display_name: author.name.clone(), avatar }))
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    const MANIFEST: &str = r#"{
        "authors": [
            {"id": 1, "name": "Alice", "avatar": "alice.png"},
            {"id": 2, "name": "Bob", "avatar": "missing.png"}
        ],
        "photos": [
            {"path": "photos/cat.png", "author": 1, "caption": "my cat"},
            {"path": "photos/dog.png", "author": 2}
        ],
        "texts": [
            {"text": "hello", "author": 2}
        ]
    }"#;

    fn library_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("photos")).unwrap();
        fs::write(dir.path().join("library.json"), MANIFEST).unwrap();
        fs::write(dir.path().join("photos/cat.png"), b"cat bytes").unwrap();
        fs::write(dir.path().join("alice.png"), b"alice bytes").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_counts_and_items() {
        let dir = library_dir();
        let library = LocalLibrary::open(&dir.path().join("library.json")).await.unwrap();

        assert_eq!(library.count(ContentKind::Photo).await.unwrap(), 2);
        assert_eq!(library.count(ContentKind::Text).await.unwrap(), 1);

        let photo = library.item_at(ContentKind::Photo, 0).await.unwrap().unwrap();
        assert_eq!(photo.id, SourceId(0));
        assert_eq!(photo.author, AuthorId(1));
        assert_eq!(photo.caption.as_deref(), Some("my cat"));
        assert!(matches!(photo.body, SourceBody::Photo));

        let text = library.item_at(ContentKind::Text, 0).await.unwrap().unwrap();
        assert!(matches!(text.body, SourceBody::Text(ref text) if text == "hello"));

        assert!(library.item_at(ContentKind::Text, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_photo() {
        let dir = library_dir();
        let library = LocalLibrary::open(&dir.path().join("library.json")).await.unwrap();

        assert_eq!(library.download_photo(SourceId(0)).await.unwrap(), b"cat bytes");
        assert!(matches!(library.download_photo(SourceId(1)).await, Err(SourceError::Io(_))));
        assert!(matches!(
            library.download_photo(SourceId(7)).await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_authors() {
        let dir = library_dir();
        let library = LocalLibrary::open(&dir.path().join("library.json")).await.unwrap();

        let alice = library.resolve(AuthorId(1)).await.unwrap().unwrap();
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(alice.avatar.as_deref(), Some(&b"alice bytes"[..]));

        let bob = library.resolve(AuthorId(2)).await.unwrap().unwrap();
        assert!(bob.avatar.is_none());

        assert!(library.resolve(AuthorId(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        fs::write(&path, "{ nope").unwrap();

        assert!(matches!(LocalLibrary::open(&path).await, Err(SourceError::Malformed(_))));
    }
}
