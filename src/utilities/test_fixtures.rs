use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};

use super::config::OutputFormat;
use super::typeface::Typeface;
use crate::collage::renderer::{CollageRenderer, RenderSettings};
use crate::collage::{AuthorCache, PhotoCache};
use crate::sources::{
    AuthorId, AuthorProfile, AuthorResolver, ContentKind, ContentSource, SourceBody, SourceError,
    SourceId, SourceItem,
};

pub fn solid_png(width: u32, height: u32, [red, green, blue]: [u8; 3]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([red, green, blue, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

struct MemoryPhoto {
    bytes: Vec<u8>,
    author: AuthorId,
    caption: Option<String>,
}

/// In-memory content source and author resolver that counts the calls made to it.
#[derive(Default)]
pub struct MemorySource {
    photos: Vec<MemoryPhoto>,
    texts: Vec<(String, AuthorId)>,
    authors: HashMap<AuthorId, (String, Option<Vec<u8>>)>,
    delay: Option<Duration>,
    photo_item_calls: AtomicUsize,
    text_item_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// adds one 40×30 solid photo per color, authored alternately by authors 1 and 2
    pub fn with_photos(mut self, colors: &[[u8; 3]]) -> Self {
        for color in colors {
            let author = AuthorId(i64::try_from(self.photos.len() % 2).unwrap() + 1);
            let bytes = solid_png(40, 30, *color);
            self.photos.push(MemoryPhoto { bytes, author, caption: None });
        }
        self
    }

    pub fn with_captioned_photo(mut self, color: [u8; 3], caption: &str) -> Self {
        self.photos.push(MemoryPhoto {
            bytes: solid_png(40, 30, color),
            author: AuthorId(1),
            caption: Some(caption.into()),
        });
        self
    }

    pub fn with_photo_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.photos.push(MemoryPhoto { bytes, author: AuthorId(1), caption: None });
        self
    }

    /// adds texts authored alternately by authors 2 and 1
    pub fn with_texts(mut self, texts: &[&str]) -> Self {
        for text in texts {
            let author = AuthorId(2 - i64::try_from(self.texts.len() % 2).unwrap());
            self.texts.push(((*text).into(), author));
        }
        self
    }

    pub fn with_author(mut self, id: i64, name: &str, avatar: Option<[u8; 3]>) -> Self {
        let avatar = avatar.map(|color| solid_png(16, 16, color));
        self.authors.insert(AuthorId(id), (name.into(), avatar));
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn item_calls(&self, kind: ContentKind) -> usize {
        match kind {
            ContentKind::Photo => self.photo_item_calls.load(Ordering::SeqCst),
            ContentKind::Text => self.text_item_calls.load(Ordering::SeqCst),
        }
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn count(&self, kind: ContentKind) -> Result<usize, SourceError> {
        Ok(match kind {
            ContentKind::Photo => self.photos.len(),
            ContentKind::Text => self.texts.len(),
        })
    }

    async fn item_at(
        &self,
        kind: ContentKind,
        offset: usize,
    ) -> Result<Option<SourceItem>, SourceError> {
        let id = SourceId(i64::try_from(offset).unwrap());

        match kind {
            ContentKind::Photo => {
                self.photo_item_calls.fetch_add(1, Ordering::SeqCst);
                self.wait().await;
                Ok(self.photos.get(offset).map(|photo| SourceItem {
                    id,
                    author: photo.author,
                    caption: photo.caption.clone(),
                    body: SourceBody::Photo,
                }))
            }
            ContentKind::Text => {
                self.text_item_calls.fetch_add(1, Ordering::SeqCst);
                self.wait().await;
                Ok(self.texts.get(offset).map(|(text, author)| SourceItem {
                    id: SourceId(1000 + id.0),
                    author: *author,
                    caption: None,
                    body: SourceBody::Text(text.clone()),
                }))
            }
        }
    }

    async fn download_photo(&self, id: SourceId) -> Result<Vec<u8>, SourceError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        usize::try_from(id.0)
            .ok()
            .and_then(|offset| self.photos.get(offset))
            .map(|photo| photo.bytes.clone())
            .ok_or_else(|| SourceError::Unavailable(format!("no photo {id}")))
    }
}

#[async_trait]
impl AuthorResolver for MemorySource {
    async fn resolve(&self, id: AuthorId) -> Result<Option<AuthorProfile>, SourceError> {
        Ok(self.authors.get(&id).map(|(display_name, avatar)| AuthorProfile {
            display_name: display_name.clone(),
            avatar: avatar.clone(),
        }))
    }
}

/// PNG output, a fixed seed and the block typeface, so renders only vary with sampling
pub fn test_settings() -> RenderSettings {
    RenderSettings {
        format: OutputFormat::Png,
        assets: None,
        seed: Some(7),
        sample_timeout: Duration::from_secs(5),
    }
}

pub fn renderer(source: &Arc<MemorySource>, settings: RenderSettings) -> CollageRenderer {
    CollageRenderer::new(
        source.clone(),
        source.clone(),
        Arc::new(PhotoCache::new(64)),
        Arc::new(AuthorCache::new(64)),
        Arc::new(Typeface::Block),
        settings,
    )
}
