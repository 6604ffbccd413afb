use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::compose::{self, FreeformScene};
use super::placement::{PlacementSet, Rect, RectPlacer};
use super::request::RenderRequest;
use super::sampler::{ContentSampler, SampleError};
use super::templates::{self, FreeformSpec, Layout, Template};
use super::{Author, AuthorCache, ContentItem, Payload, PhotoCache, PlacementMiss, RenderError};
use crate::sources::{AuthorId, AuthorResolver, ContentKind, ContentSource, SourceError};
use crate::utilities::config::OutputFormat;
use crate::utilities::image_utils;
use crate::utilities::typeface::Typeface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    SamplingBackground,
    SamplingContent,
    PlacingOrMapping,
    Compositing,
    Encoded,
    Failed,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Idle => "waiting",
            Self::SamplingBackground => "fetching background",
            Self::SamplingContent => "fetching content",
            Self::PlacingOrMapping => "laying out content",
            Self::Compositing => "putting it all together",
            Self::Encoded => "done",
            Self::Failed => "failed",
        };

        write!(f, "{status}")
    }
}

/// Advisory status updates; they have no effect on the render itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Stage(RenderState),
    Photo { current: usize, total: usize },
    Text { current: usize, total: usize },
    Authors(usize),
    Placing { current: usize, total: usize },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(state) => write!(f, "{state}"),
            Self::Photo { current, total } => write!(f, "fetching photo {current}/{total}"),
            Self::Text { current, total } => write!(f, "fetching text {current}/{total}"),
            Self::Authors(count) => write!(f, "fetching {count} authors"),
            Self::Placing { current, total } => write!(f, "placing photo {current}/{total}"),
        }
    }
}

pub type ProgressCallback<'a> = &'a (dyn Fn(Progress) + Send + Sync);

pub struct RenderSettings {
    pub format: OutputFormat,
    /// directory with template backdrops
    pub assets: Option<PathBuf>,
    /// makes placement, tilt and effects reproducible
    pub seed: Option<u64>,
    pub sample_timeout: Duration,
}

#[derive(Debug)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// number of content items drawn onto the canvas
    pub placed: usize,
    pub misses: Vec<PlacementMiss>,
}

pub struct CollageRenderer {
    sampler: ContentSampler,
    authors: Arc<dyn AuthorResolver>,
    author_cache: Arc<AuthorCache>,
    typeface: Arc<Typeface>,
    placer: RectPlacer,
    settings: RenderSettings,
}

impl CollageRenderer {
    pub fn new(
        source: Arc<dyn ContentSource>,
        authors: Arc<dyn AuthorResolver>,
        photo_cache: Arc<PhotoCache>,
        author_cache: Arc<AuthorCache>,
        typeface: Arc<Typeface>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            sampler: ContentSampler::new(source, photo_cache, settings.sample_timeout),
            authors,
            author_cache,
            typeface,
            placer: RectPlacer::default(),
            settings,
        }
    }

    /// Runs one request through the whole pipeline.
    ///
    /// Dropping the returned future stops the render without issuing further source calls.
    pub async fn render(
        &self,
        request: &RenderRequest,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<EncodedImage, RenderError> {
        let mut state = RenderState::Idle;
        let result = self.run(request, &mut state, progress).await;

        match &result {
            Ok(image) => {
                advance(&mut state, RenderState::Encoded, progress);
                log::info!(
                    "rendered a {}x{} collage, {} items placed, {} missed",
                    image.width,
                    image.height,
                    image.placed,
                    image.misses.len()
                );
            }
            Err(err) => {
                log::warn!("render failed while {state}: {err}");
                advance(&mut state, RenderState::Failed, progress);
            }
        }

        result
    }

    async fn run(
        &self,
        request: &RenderRequest,
        state: &mut RenderState,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<EncodedImage, RenderError> {
        let mut rng = self.settings.seed.map_or_else(
            || StdRng::from_rng(&mut rand::rng()),
            StdRng::seed_from_u64,
        );
        let layout = request.template.layout();

        advance(state, RenderState::SamplingBackground, progress);
        let backdrop = match layout {
            Layout::Fixed(template) => self.backdrop(template).await?,
            Layout::Freeform(_) => None,
        };

        let needs_photos = backdrop.is_none() || request.required_photo_count > 0;
        let photo_pool = if needs_photos { self.pool_size(ContentKind::Photo).await? } else { 0 };

        let background = match backdrop {
            Some(backdrop) => Arc::new(backdrop),
            None => self.sample_background(photo_pool).await?,
        };

        advance(state, RenderState::SamplingContent, progress);
        let total = request.required_photo_count;
        let photos = self
            .sampler
            .collect_distinct(ContentKind::Photo, photo_pool, total, |current| {
                notify(progress, Progress::Photo { current, total });
            })
            .await?;

        let texts = if request.required_text_count == 0 {
            Vec::new()
        } else {
            let total = request.required_text_count;
            let text_pool = self.pool_size(ContentKind::Text).await?;
            self.sampler
                .collect_distinct(ContentKind::Text, text_pool, total, |current| {
                    notify(progress, Progress::Text { current, total });
                })
                .await?
        };

        advance(state, RenderState::PlacingOrMapping, progress);
        let (canvas, placed, misses) = match layout {
            Layout::Fixed(template) => {
                let mapped = templates::apply(template, photos.into_iter().chain(texts).collect())?;

                advance(state, RenderState::Compositing, progress);
                let canvas = compose::draw_fixed(template, &background, &mapped, &self.typeface);
                (canvas, mapped.len(), Vec::new())
            }
            Layout::Freeform(spec) => {
                let ids = distinct_authors(photos.iter().chain(&texts));
                notify(progress, Progress::Authors(ids.len()));
                let authors = self.resolve_authors(&ids).await;
                let (photos, misses) = self.place_photos(spec, photos, progress, &mut rng);

                advance(state, RenderState::Compositing, progress);
                let scene = FreeformScene {
                    spec,
                    background: &background,
                    photos: &photos,
                    texts: &texts,
                    authors: &authors,
                };
                let (canvas, drawn) = compose::draw_freeform(&scene, &self.typeface, &mut rng);
                (canvas, drawn, misses)
            }
        };

        let (width, height) = canvas.dimensions();
        let bytes = image_utils::encode(canvas, self.settings.format.image_format())
            .map_err(RenderError::Encoding)?;

        Ok(EncodedImage { bytes, format: self.settings.format, width, height, placed, misses })
    }

    async fn pool_size(&self, kind: ContentKind) -> Result<usize, RenderError> {
        let pool_size = self.sampler.pool_size(kind).await.map_err(|err| match err {
            SampleError::Source(err) => RenderError::Source(err),
            err => RenderError::Source(SourceError::Unavailable(err.to_string())),
        })?;

        log::debug!("{pool_size} {kind}s to sample from");
        Ok(pool_size)
    }

    /// reads the template's backdrop from the assets directory, if both are configured
    async fn backdrop(&self, template: &Template) -> Result<Option<RgbaImage>, RenderError> {
        let (Some(assets), Some(backdrop)) = (&self.settings.assets, &template.backdrop) else {
            return Ok(None);
        };

        let path = assets.join(backdrop.as_ref());
        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            RenderError::BackgroundUnavailable(format!("{}: {err}", path.display()))
        })?;
        let image = image::load_from_memory(&bytes).map_err(|err| {
            RenderError::BackgroundUnavailable(format!("{}: {err}", path.display()))
        })?;

        Ok(Some(image.into_rgba8()))
    }

    async fn sample_background(&self, photo_pool: usize) -> Result<Arc<RgbaImage>, RenderError> {
        match self.sampler.sample(ContentKind::Photo, photo_pool).await {
            Ok(item) => match item.payload {
                Payload::Photo(photo) => Ok(photo),
                Payload::Text(_) => {
                    Err(RenderError::BackgroundUnavailable("source returned a text".into()))
                }
            },
            Err(SampleError::EmptyPool(kind)) => Err(RenderError::EmptyPool(kind)),
            Err(err) => Err(RenderError::BackgroundUnavailable(err.to_string())),
        }
    }

    fn place_photos<R: Rng + ?Sized>(
        &self,
        spec: &FreeformSpec,
        photos: Vec<ContentItem>,
        progress: Option<ProgressCallback<'_>>,
        rng: &mut R,
    ) -> (Vec<(Rect, ContentItem)>, Vec<PlacementMiss>) {
        let container = compose::picture_area(spec);
        let size = (spec.photo_size, spec.photo_size);
        let total = photos.len();
        let mut set = PlacementSet::default();
        let mut placed = Vec::with_capacity(total);
        let mut misses = Vec::new();

        for (index, item) in photos.into_iter().enumerate() {
            notify(progress, Progress::Placing { current: index + 1, total });

            match self.placer.place(size, container, &set, rng) {
                Some(rect) => {
                    set.insert(rect);
                    placed.push((rect, item));
                }
                None => {
                    log::info!("no free spot for photo {} ({})", index + 1, item.source_id);
                    misses.push(PlacementMiss { index, source_id: item.source_id });
                }
            }
        }

        (placed, misses)
    }

    /// authors that can't be resolved are left out; they never fail the render
    async fn resolve_authors(&self, ids: &[AuthorId]) -> Vec<Arc<Author>> {
        let mut authors = Vec::with_capacity(ids.len());

        for &id in ids {
            if let Some(author) = self.author(id).await {
                authors.push(author);
            }
        }

        authors
    }

    async fn author(&self, id: AuthorId) -> Option<Arc<Author>> {
        if let Some(author) = self.author_cache.get(&id) {
            return Some(author);
        }

        let profile =
            match tokio::time::timeout(self.settings.sample_timeout, self.authors.resolve(id)).await
            {
                Ok(Ok(Some(profile))) => profile,
                Ok(Ok(None)) => {
                    log::info!("author {id} is unknown");
                    return None;
                }
                Ok(Err(err)) => {
                    log::warn!("failed to resolve author {id}: {err}");
                    return None;
                }
                Err(_) => {
                    log::warn!("resolving author {id} timed out");
                    return None;
                }
            };

        let avatar = profile.avatar.and_then(|bytes| match image::load_from_memory(&bytes) {
            Ok(avatar) => Some(image_utils::cover(
                &avatar.into_rgba8(),
                compose::AVATAR_SIZE,
                compose::AVATAR_SIZE,
            )),
            Err(err) => {
                log::warn!("avatar of {id} is unreadable: {err}");
                None
            }
        });

        let author = Arc::new(Author { id, display_name: profile.display_name, avatar });
        self.author_cache.insert(id, author.clone());
        Some(author)
    }
}

fn advance(state: &mut RenderState, next: RenderState, progress: Option<ProgressCallback<'_>>) {
    log::debug!("render: {state} -> {next}");
    *state = next;
    notify(progress, Progress::Stage(next));
}

fn notify(progress: Option<ProgressCallback<'_>>, event: Progress) {
    if let Some(progress) = progress {
        progress(event);
    }
}

/// author ids in order of first appearance
fn distinct_authors<'a>(items: impl Iterator<Item = &'a ContentItem>) -> Vec<AuthorId> {
    let mut seen = HashSet::new();
    items.map(|item| item.author_id).filter(|id| seen.insert(*id)).collect()
}
