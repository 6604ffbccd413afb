use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageError, RgbaImage};
use rand::Rng;

use super::{ContentItem, Payload, PhotoCache, RenderError};
use crate::sources::{ContentKind, ContentSource, SourceBody, SourceError, SourceId};
use crate::utilities::image_utils;
use crate::utilities::retry::{self, AttemptBudget};

/// side of the square every sampled photo is normalized to
pub const PHOTO_SIZE: u32 = 350;

/// attempts spent per desired item before a distinct collection gives up
const fn attempts_per_item(kind: ContentKind) -> usize {
    match kind {
        ContentKind::Photo => 3,
        ContentKind::Text => 4,
    }
}

#[derive(Debug)]
pub enum SampleError {
    EmptyPool(ContentKind),
    Timeout(Duration),
    Missing { kind: ContentKind, offset: usize },
    Source(SourceError),
    EmptyDownload(SourceId),
    Decode(ImageError),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPool(kind) => write!(f, "there are no {kind}s to sample from"),
            Self::Timeout(timeout) => write!(f, "content source timed out after {timeout:?}"),
            Self::Missing { kind, offset } => write!(f, "no {kind} at offset {offset}"),
            Self::Source(err) => write!(f, "{err}"),
            Self::EmptyDownload(id) => write!(f, "photo {id} downloaded empty"),
            Self::Decode(err) => write!(f, "failed to decode photo: {err}"),
        }
    }
}

impl std::error::Error for SampleError {}

impl From<SourceError> for SampleError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

/// Draws random photos and texts from a [`ContentSource`].
///
/// Decoded photos are kept in a cache shared with other renders, keyed by source item.
pub struct ContentSampler {
    source: Arc<dyn ContentSource>,
    cache: Arc<PhotoCache>,
    photo_size: u32,
    timeout: Duration,
}

impl ContentSampler {
    pub fn new(source: Arc<dyn ContentSource>, cache: Arc<PhotoCache>, timeout: Duration) -> Self {
        Self { source, cache, photo_size: PHOTO_SIZE, timeout }
    }

    pub async fn pool_size(&self, kind: ContentKind) -> Result<usize, SampleError> {
        self.bounded(self.source.count(kind)).await
    }

    /// samples one item at a uniformly random offset in `0..pool_size`
    pub async fn sample(
        &self,
        kind: ContentKind,
        pool_size: usize,
    ) -> Result<ContentItem, SampleError> {
        if pool_size == 0 {
            Err(SampleError::EmptyPool(kind))?;
        }

        let offset = rand::rng().random_range(0..pool_size);
        self.sample_at(kind, offset).await
    }

    pub async fn sample_at(
        &self,
        kind: ContentKind,
        offset: usize,
    ) -> Result<ContentItem, SampleError> {
        let item = self
            .bounded(self.source.item_at(kind, offset))
            .await?
            .ok_or(SampleError::Missing { kind, offset })?;

        let payload = match (kind, item.body) {
            (ContentKind::Photo, SourceBody::Photo) => Payload::Photo(self.photo(item.id).await?),
            (ContentKind::Text, SourceBody::Text(text)) => Payload::Text(text),
            _ => Err(SampleError::Missing { kind, offset })?,
        };

        Ok(ContentItem {
            payload,
            source_id: item.id,
            author_id: item.author,
            caption: item.caption,
        })
    }

    async fn photo(&self, id: SourceId) -> Result<Arc<RgbaImage>, SampleError> {
        if let Some(photo) = self.cache.get(&id) {
            return Ok(photo);
        }

        let bytes = self.bounded(self.source.download_photo(id)).await?;
        if bytes.is_empty() {
            Err(SampleError::EmptyDownload(id))?;
        }

        let image = image::load_from_memory(&bytes).map_err(SampleError::Decode)?.into_rgba8();
        let photo = Arc::new(image_utils::cover(&image, self.photo_size, self.photo_size));
        self.cache.insert(id, photo.clone());

        Ok(photo)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SampleError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SampleError::Timeout(self.timeout)),
        }
    }

    /// Collects `desired` items whose content differs from each other.
    ///
    /// Every sample, accepted or not, spends one attempt from a budget shared by the whole
    /// collection. Failed samples are logged and count as spent attempts. `on_accept` gets the
    /// number of items collected so far.
    pub async fn collect_distinct(
        &self,
        kind: ContentKind,
        pool_size: usize,
        desired: usize,
        mut on_accept: impl FnMut(usize),
    ) -> Result<Vec<ContentItem>, RenderError> {
        let mut budget = AttemptBudget::new(desired * attempts_per_item(kind));
        let mut accepted: Vec<ContentItem> = Vec::with_capacity(desired);

        while accepted.len() < desired {
            let found = retry::retry_async(
                &mut budget,
                |item: &ContentItem| !accepted.iter().any(|other| other.same_content(item)),
                move || self.attempt(kind, pool_size),
            )
            .await?;

            let Some(item) = found else {
                log::debug!("gave up on {kind}s after {} attempts", budget.used());
                return Err(RenderError::InsufficientContent {
                    kind,
                    obtained: accepted.len(),
                    required: desired,
                });
            };

            log::debug!("accepted {kind} {}, {} attempts left", item.source_id, budget.remaining());
            accepted.push(item);
            on_accept(accepted.len());
        }

        Ok(accepted)
    }

    async fn attempt(
        &self,
        kind: ContentKind,
        pool_size: usize,
    ) -> Result<Option<ContentItem>, RenderError> {
        match self.sample(kind, pool_size).await {
            Ok(item) => Ok(Some(item)),
            Err(SampleError::EmptyPool(kind)) => Err(RenderError::EmptyPool(kind)),
            Err(err) => {
                log::warn!("failed to sample a {kind}: {err}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utilities::test_fixtures::MemorySource;

    fn sampler(source: &Arc<MemorySource>, timeout: Duration) -> ContentSampler {
        ContentSampler::new(source.clone(), Arc::new(PhotoCache::new(16)), timeout)
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let source = Arc::new(MemorySource::new());
        let sampler = sampler(&source, Duration::from_secs(1));

        assert!(matches!(
            sampler.sample(ContentKind::Text, 0).await,
            Err(SampleError::EmptyPool(ContentKind::Text))
        ));
        assert!(matches!(
            sampler.collect_distinct(ContentKind::Photo, 0, 2, |_| ()).await,
            Err(RenderError::EmptyPool(ContentKind::Photo))
        ));
        assert_eq!(source.item_calls(ContentKind::Photo), 0);
    }

    #[tokio::test]
    async fn test_sample_text() {
        let source = Arc::new(MemorySource::new().with_texts(&["only one"]));
        let sampler = sampler(&source, Duration::from_secs(1));

        let pool_size = sampler.pool_size(ContentKind::Text).await.unwrap();
        let item = sampler.sample(ContentKind::Text, pool_size).await.unwrap();

        assert_eq!(item.text(), Some("only one"));
        assert_eq!(item.kind(), ContentKind::Text);
    }

    #[tokio::test]
    async fn test_photos_are_normalized_and_cached() {
        let source = Arc::new(MemorySource::new().with_photos(&[[200, 10, 10]]));
        let sampler = sampler(&source, Duration::from_secs(1));

        let first = sampler.sample(ContentKind::Photo, 1).await.unwrap();
        let second = sampler.sample(ContentKind::Photo, 1).await.unwrap();

        assert_eq!(first.photo().unwrap().dimensions(), (PHOTO_SIZE, PHOTO_SIZE));
        assert!(first.same_content(&second));
        assert_eq!(source.item_calls(ContentKind::Photo), 2);
        assert_eq!(source.download_calls(), 1);
    }

    #[tokio::test]
    async fn test_distinct_collection() {
        let texts = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let source = Arc::new(MemorySource::new().with_texts(&texts));
        let sampler = sampler(&source, Duration::from_secs(1));
        let mut progress = Vec::new();

        let items = sampler
            .collect_distinct(ContentKind::Text, texts.len(), 3, |count| progress.push(count))
            .await
            .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(progress, [1, 2, 3]);
        for (i, a) in items.iter().enumerate() {
            for b in &items[i + 1..] {
                assert!(!a.same_content(b));
            }
        }
    }

    #[tokio::test]
    async fn test_duplicates_exhaust_budget() {
        let source = Arc::new(MemorySource::new().with_texts(&["same", "other", "same", "other"]));
        let sampler = sampler(&source, Duration::from_secs(1));

        let result = sampler.collect_distinct(ContentKind::Text, 4, 3, |_| ()).await;

        assert!(matches!(
            result,
            Err(RenderError::InsufficientContent { kind: ContentKind::Text, obtained, required: 3 })
                if obtained <= 2
        ));
        assert_eq!(source.item_calls(ContentKind::Text), 3 * 4);
    }

    #[tokio::test]
    async fn test_timeouts_spend_attempts() {
        let source = Arc::new(
            MemorySource::new().with_texts(&["slow"]).with_delay(Duration::from_millis(200)),
        );
        let sampler = sampler(&source, Duration::from_millis(10));

        assert!(matches!(
            sampler.sample(ContentKind::Text, 1).await,
            Err(SampleError::Timeout(_))
        ));

        let result = sampler.collect_distinct(ContentKind::Text, 1, 1, |_| ()).await;
        assert!(matches!(
            result,
            Err(RenderError::InsufficientContent { obtained: 0, required: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_caption_and_author_are_kept() {
        let source = Arc::new(MemorySource::new().with_captioned_photo([5, 5, 5], "sunset"));
        let sampler = sampler(&source, Duration::from_secs(1));

        let item = sampler.sample(ContentKind::Photo, 1).await.unwrap();

        assert_eq!(item.caption.as_deref(), Some("sunset"));
        assert_eq!(item.author_id, crate::sources::AuthorId(1));
        assert_eq!(item.source_id, SourceId(0));
    }

    #[tokio::test]
    async fn test_undecodable_photo() {
        let source = Arc::new(MemorySource::new().with_photo_bytes(b"not an image".to_vec()));
        let sampler = sampler(&source, Duration::from_secs(1));

        assert!(matches!(sampler.sample(ContentKind::Photo, 1).await, Err(SampleError::Decode(_))));
    }
}
