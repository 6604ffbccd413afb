use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rand::Rng;

use super::effects::EffectSelector;
use super::placement::Rect;
use super::templates::{FreeformSpec, Template};
use super::{Author, ContentItem, Payload};
use crate::sources::AuthorId;
use crate::utilities::image_utils;
use crate::utilities::text_utils::{self, TruncateWithEllipsis};
use crate::utilities::typeface::{Align, Typeface};

pub const FRAME: u32 = 50;
pub const CAPTION_BAND: u32 = 200;
pub const AVATAR_SIZE: u32 = 80;
const BORDER: u32 = 3;
const PHOTO_BORDER: u32 = 2;
const MAX_TILT_DEGREES: f32 = 20.;
const SHADOW_OFFSET: i64 = 6;
const QUOTE_BOX_HEIGHT: u32 = 80;
const QUOTE_AVATAR_SIZE: u32 = 60;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PLACEHOLDER: Rgba<u8> = Rgba([60, 60, 60, 255]);
const QUOTE_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 178]);
const WATERMARK: Rgba<u8> = Rgba([255, 255, 255, 77]);

#[expect(clippy::cast_precision_loss)]
const fn px(value: u32) -> f32 {
    value as f32
}

struct LineStyle {
    size: f32,
    line_height: f32,
    max_width: f32,
    color: Rgba<u8>,
    align: Align,
}

impl LineStyle {
    const fn new(size: f32, line_height: f32, max_width: f32, color: Rgba<u8>) -> Self {
        Self { size, line_height, max_width, color, align: Align::Center }
    }

    const fn aligned(mut self, align: Align) -> Self {
        self.align = align;
        self
    }
}

/// Wraps `text` and draws it line by line downward from `top`, anchored at `x`.
///
/// Lines that would reach below `bottom` are left out.
fn draw_wrapped(
    canvas: &mut RgbaImage,
    typeface: &Typeface,
    text: &str,
    (x, top): (f32, f32),
    bottom: f32,
    style: &LineStyle,
) {
    let block = text_utils::wrap(text, style.max_width, style.line_height, |line| {
        typeface.measure(line, style.size)
    });

    let mut y = top;
    for line in &block.lines {
        if y + style.size > bottom {
            break;
        }
        typeface.draw_aligned(canvas, line, (x, y), style.size, style.color, style.align);
        y += style.line_height;
    }
}

/// wraps `text` and centers the block in `rect` both ways
fn draw_centered(
    canvas: &mut RgbaImage,
    typeface: &Typeface,
    text: &str,
    rect: Rect,
    style: &LineStyle,
) {
    let block = text_utils::wrap(text, style.max_width, style.line_height, |line| {
        typeface.measure(line, style.size)
    });
    let (center_x, center_y) = rect.center();

    let mut y = center_y - block.block_height / 2. + (style.line_height - style.size) / 2.;
    for line in &block.lines {
        typeface.draw_aligned(canvas, line, (center_x, y), style.size, style.color, Align::Center);
        y += style.line_height;
    }
}

pub fn draw_fixed(
    template: &Template,
    base: &RgbaImage,
    mapped: &[(Rect, ContentItem)],
    typeface: &Typeface,
) -> RgbaImage {
    let mut canvas = image_utils::cover(base, template.width, template.height);
    let style = &template.text_style;

    for (rect, item) in mapped {
        match &item.payload {
            Payload::Photo(photo) => {
                let tile = image_utils::stretch(photo, rect.width, rect.height);
                image_utils::overlay(&mut canvas, &tile, i64::from(rect.x), i64::from(rect.y));
            }
            Payload::Text(text) => {
                let text = text_utils::sanitize(text).truncate_with_ellipsis(style.max_chars);
                let max_width = px(rect.width.saturating_sub(style.padding));
                let line_style =
                    LineStyle::new(style.size, style.line_height, max_width, Rgba(style.color));
                draw_centered(&mut canvas, typeface, &text, *rect, &line_style);
            }
        }
    }

    for caption in &*template.captions {
        let line_style = LineStyle::new(
            caption.size,
            caption.size * 1.25,
            px(caption.rect.width),
            Rgba(caption.color),
        );
        let text = text_utils::sanitize(&caption.text);
        draw_centered(&mut canvas, typeface, &text, caption.rect, &line_style);
    }

    canvas
}

pub const fn canvas_size(spec: &FreeformSpec) -> (u32, u32) {
    (spec.area.0 + FRAME * 2, spec.area.1 + FRAME + CAPTION_BAND)
}

/// where the background goes on the canvas; photos and quotes stay inside of it
pub const fn picture_area(spec: &FreeformSpec) -> Rect {
    Rect::new(FRAME, FRAME, spec.area.0, spec.area.1)
}

pub struct FreeformScene<'a> {
    pub spec: &'a FreeformSpec,
    pub background: &'a RgbaImage,
    /// photos that got a spot, in canvas coordinates
    pub photos: &'a [(Rect, ContentItem)],
    /// title, subtitle, then quotes
    pub texts: &'a [ContentItem],
    pub authors: &'a [Arc<Author>],
}

impl FreeformScene<'_> {
    fn author(&self, id: AuthorId) -> Option<&Author> {
        self.authors.iter().find(|author| author.id == id).map(Arc::as_ref)
    }
}

/// Draws the whole demotivator and counts the photos and texts that made it onto the canvas.
pub fn draw_freeform<R: Rng + ?Sized>(
    scene: &FreeformScene<'_>,
    typeface: &Typeface,
    rng: &mut R,
) -> (RgbaImage, usize) {
    let (width, height) = canvas_size(scene.spec);
    let area = picture_area(scene.spec);
    let mut canvas = RgbaImage::from_pixel(width, height, BLACK);

    image_utils::stroke_rect(
        &mut canvas,
        i64::from(area.x - BORDER),
        i64::from(area.y - BORDER),
        area.width + BORDER * 2,
        area.height + BORDER * 2,
        BORDER,
        WHITE,
    );
    let background = image_utils::cover(scene.background, area.width, area.height);
    image_utils::overlay(&mut canvas, &background, i64::from(area.x), i64::from(area.y));

    for (rect, item) in scene.photos {
        draw_photo(&mut canvas, typeface, *rect, item, rng);
    }

    draw_author_column(&mut canvas, typeface, scene.authors, area);

    let mut texts = scene.texts.iter();
    let title = texts.next();
    let subtitle = texts.next();
    let quotes = texts.collect::<Vec<_>>();

    let quotes_drawn = draw_quotes(&mut canvas, typeface, scene, &quotes, area);
    draw_headings(&mut canvas, typeface, scene, (title, subtitle), area);
    draw_watermark(&mut canvas, typeface, &quotes, area, rng);

    let headings = usize::from(title.is_some()) + usize::from(subtitle.is_some());
    (canvas, scene.photos.len() + headings + quotes_drawn)
}

#[expect(clippy::cast_possible_truncation)]
fn draw_photo<R: Rng + ?Sized>(
    canvas: &mut RgbaImage,
    typeface: &Typeface,
    rect: Rect,
    item: &ContentItem,
    rng: &mut R,
) {
    let Some(photo) = item.photo() else {
        return;
    };

    let effect = EffectSelector::choose(Some(rng.random()));
    log::debug!("photo {} gets {:?}", item.source_id, effect);

    let mut tile = effect.filter.apply(&image_utils::stretch(photo, rect.width, rect.height));
    if let Some(caption) = &item.caption {
        draw_caption_strip(&mut tile, typeface, caption);
    }
    image_utils::stroke_rect(&mut tile, 0, 0, rect.width, rect.height, PHOTO_BORDER, WHITE);

    let angle = rng.random_range(-MAX_TILT_DEGREES..=MAX_TILT_DEGREES).to_radians();
    let tilted = image_utils::rotate(&tile, angle);

    let (center_x, center_y) = rect.center();
    let x = (center_x - px(tilted.width()) / 2.).round() as i64;
    let y = (center_y - px(tilted.height()) / 2.).round() as i64;

    let shadow = RgbaImage::from_fn(tilted.width(), tilted.height(), |shadow_x, shadow_y| {
        Rgba([0, 0, 0, tilted.get_pixel(shadow_x, shadow_y)[3] / 2])
    });
    image_utils::overlay(canvas, &shadow, x + SHADOW_OFFSET, y + SHADOW_OFFSET);
    image_utils::overlay_with(canvas, &tilted, x, y, |backdrop, source| {
        effect.blend.blend_channel(backdrop, source)
    });
}

fn draw_caption_strip(tile: &mut RgbaImage, typeface: &Typeface, caption: &str) {
    let height = tile.height().min(20);
    let top = tile.height() - height;
    image_utils::fill_rect(tile, 0, i64::from(top), tile.width(), height, QUOTE_BACKGROUND);

    let text = text_utils::sanitize(caption).truncate_with_ellipsis(20);
    typeface.draw(tile, &text, (4., px(top) + 3.), 12., WHITE);
}

fn draw_avatar(canvas: &mut RgbaImage, avatar: Option<&RgbaImage>, (x, y): (u32, u32), size: u32) {
    let (x, y) = (i64::from(x), i64::from(y));
    match avatar {
        Some(avatar) => {
            image_utils::overlay(canvas, &image_utils::stretch(avatar, size, size), x, y);
        }
        None => image_utils::fill_rect(canvas, x, y, size, size, PLACEHOLDER),
    }
}

fn display_name(author: Option<&Author>, max_chars: usize) -> String {
    author.map_or_else(
        || "??".to_owned(),
        |author| text_utils::sanitize(&author.display_name).truncate_with_ellipsis(max_chars),
    )
}

/// avatars with names, top to bottom, starting a new column when the picture's bottom is reached
fn draw_author_column(
    canvas: &mut RgbaImage,
    typeface: &Typeface,
    authors: &[Arc<Author>],
    area: Rect,
) {
    let first_y = area.y + 20;
    let last_y = area.bottom().saturating_sub(AVATAR_SIZE);
    let (mut x, mut y) = (10, first_y);

    for author in authors {
        draw_avatar(canvas, author.avatar.as_ref(), (x, y), AVATAR_SIZE);
        image_utils::stroke_rect(
            canvas,
            i64::from(x),
            i64::from(y),
            AVATAR_SIZE,
            AVATAR_SIZE,
            PHOTO_BORDER,
            WHITE,
        );
        typeface.draw_aligned(
            canvas,
            &display_name(Some(author.as_ref()), 10),
            (px(x + AVATAR_SIZE / 2), px(y + AVATAR_SIZE + 3)),
            12.,
            WHITE,
            Align::Center,
        );

        y += AVATAR_SIZE + 30;
        if y > last_y {
            y = first_y;
            x += AVATAR_SIZE + 10;
        }
    }
}

/// quote boxes stacked upward from the bottom of the picture until they would leave it, returns
/// how many were drawn
fn draw_quotes(
    canvas: &mut RgbaImage,
    typeface: &Typeface,
    scene: &FreeformScene<'_>,
    quotes: &[&ContentItem],
    area: Rect,
) -> usize {
    let mut drawn = 0;
    let x = area.x + 20;
    let width = area.width.saturating_sub(40);
    let text_x = x + QUOTE_AVATAR_SIZE + 20;
    let style = LineStyle::new(
        14.,
        18.,
        px(width.saturating_sub(QUOTE_AVATAR_SIZE + 30)),
        Rgba([204, 204, 204, 255]),
    )
    .aligned(Align::Left);

    for (quote, position) in quotes.iter().zip(1u32..) {
        let Some(y) =
            area.bottom().checked_sub(QUOTE_BOX_HEIGHT * position + 20).filter(|y| *y >= area.y)
        else {
            log::debug!("no room left for quote {}", quote.source_id);
            break;
        };

        image_utils::fill_rect(
            canvas,
            i64::from(x),
            i64::from(y),
            width,
            QUOTE_BOX_HEIGHT,
            QUOTE_BACKGROUND,
        );

        let author = scene.author(quote.author_id);
        draw_avatar(
            canvas,
            author.and_then(|author| author.avatar.as_ref()),
            (x + 10, y + 10),
            QUOTE_AVATAR_SIZE,
        );
        typeface.draw(canvas, &display_name(author, 30), (px(text_x), px(y + 10)), 16., WHITE);

        let text = format!("\"{}\"", text_utils::sanitize(quote.text().unwrap_or_default()));
        let bottom = px(y + QUOTE_BOX_HEIGHT);
        draw_wrapped(canvas, typeface, &text, (px(text_x), px(y + 32)), bottom, &style);
        drawn += 1;
    }

    drawn
}

/// title and subtitle in the band under the picture, each with its author
fn draw_headings(
    canvas: &mut RgbaImage,
    typeface: &Typeface,
    scene: &FreeformScene<'_>,
    (title, subtitle): (Option<&ContentItem>, Option<&ContentItem>),
    area: Rect,
) {
    let width = canvas.width();
    let title_top = area.bottom() + 10;
    let subtitle_top = title_top + 80;

    if let Some(title) = title {
        let text = text_utils::sanitize(title.text().unwrap_or_default());
        let style = LineStyle::new(48., 60., px(width.saturating_sub(100)), WHITE);
        let (x, bottom) = (px(width / 2), px(subtitle_top));
        draw_wrapped(canvas, typeface, &text, (x, px(title_top)), bottom, &style);

        if let Some(author) = scene.author(title.author_id) {
            let (avatar_x, avatar_y) = (area.x + 20, title_top + 15);
            draw_avatar(canvas, author.avatar.as_ref(), (avatar_x, avatar_y), 60);
            typeface.draw(
                canvas,
                &format!("— {}", display_name(Some(author), 30)),
                (px(avatar_x + 70), px(avatar_y + 22)),
                16.,
                Rgba([153, 153, 153, 255]),
            );
        }
    }

    if let Some(subtitle) = subtitle {
        let text = text_utils::sanitize(subtitle.text().unwrap_or_default());
        let style =
            LineStyle::new(28., 36., px(width.saturating_sub(120)), Rgba([204, 204, 204, 255]));
        let (x, bottom) = (px(width / 2), px(canvas.height()));
        draw_wrapped(canvas, typeface, &text, (x, px(subtitle_top)), bottom, &style);

        if let Some(author) = scene.author(subtitle.author_id) {
            let avatar_x = width.saturating_sub(FRAME + 20 + 40);
            draw_avatar(canvas, author.avatar.as_ref(), (avatar_x, subtitle_top), 40);
            typeface.draw_aligned(
                canvas,
                &format!("— {}", display_name(Some(author), 30)),
                (px(avatar_x) - 5., px(subtitle_top + 12)),
                14.,
                Rgba([119, 119, 119, 255]),
                Align::Right,
            );
        }
    }
}

fn draw_watermark<R: Rng + ?Sized>(
    canvas: &mut RgbaImage,
    typeface: &Typeface,
    quotes: &[&ContentItem],
    area: Rect,
    rng: &mut R,
) {
    if quotes.is_empty() {
        return;
    }

    let quote = quotes[rng.random_range(0..quotes.len())];
    let text = text_utils::sanitize(quote.text().unwrap_or_default()).truncate_with_ellipsis(20);
    typeface.draw_aligned(
        canvas,
        &text,
        (px(area.right() - 10), px(area.y + 8)),
        14.,
        WATERMARK,
        Align::Right,
    );
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::collage::templates::{DRAKE, TWO_BUTTONS};
    use crate::sources::SourceId;

    fn photo(color: [u8; 4], author: i64) -> ContentItem {
        ContentItem {
            payload: Payload::Photo(Arc::new(RgbaImage::from_pixel(8, 8, Rgba(color)))),
            source_id: SourceId(author),
            author_id: AuthorId(author),
            caption: None,
        }
    }

    fn text(text: &str, author: i64) -> ContentItem {
        ContentItem {
            payload: Payload::Text(text.into()),
            source_id: SourceId(author),
            author_id: AuthorId(author),
            caption: None,
        }
    }

    #[test]
    fn test_fixed_photos_fill_their_slots() {
        let base = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]));
        let mapped = [
            (DRAKE.slots[0].rect, photo([255, 0, 0, 255], 1)),
            (DRAKE.slots[1].rect, photo([0, 255, 0, 255], 2)),
        ];

        let canvas = draw_fixed(&DRAKE, &base, &mapped, &Typeface::Block);

        assert_eq!(canvas.dimensions(), (960, 960));
        assert_eq!(*canvas.get_pixel(700, 200), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(700, 700), Rgba([0, 255, 0, 255]));
        assert_eq!(*canvas.get_pixel(100, 100), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_fixed_text_stays_in_its_slot() {
        let base = RgbaImage::from_pixel(10, 10, WHITE);
        let slot = TWO_BUTTONS.slots[2].rect;
        let mapped = [(slot, text("press the button", 1))];

        let canvas = draw_fixed(&TWO_BUTTONS, &base, &mapped, &Typeface::Block);

        let inked = canvas
            .enumerate_pixels()
            .filter(|(_, _, pixel)| **pixel != WHITE)
            .map(|(x, y, _)| (x, y))
            .collect::<Vec<_>>();
        assert!(!inked.is_empty());
        assert!(inked.iter().all(|(x, y)| slot.contains(&Rect::new(*x, *y, 1, 1))));
    }

    #[test]
    fn test_freeform_frame_and_background() {
        let spec = FreeformSpec::custom(0, 0).with_area(200, 150);
        let background = RgbaImage::from_pixel(4, 4, Rgba([10, 200, 10, 255]));
        let scene = FreeformScene {
            spec: &spec,
            background: &background,
            photos: &[],
            texts: &[],
            authors: &[],
        };

        let (canvas, drawn) =
            draw_freeform(&scene, &Typeface::Block, &mut StdRng::seed_from_u64(0));

        assert_eq!(drawn, 0);
        assert_eq!(canvas.dimensions(), (300, 400));
        assert_eq!(*canvas.get_pixel(5, 5), BLACK);
        assert_eq!(*canvas.get_pixel(FRAME - 1, FRAME + 10), WHITE);
        assert_eq!(*canvas.get_pixel(FRAME + 100, FRAME + 75), Rgba([10, 200, 10, 255]));
        assert_eq!(*canvas.get_pixel(150, 390), BLACK);
    }

    #[test]
    fn test_freeform_is_deterministic_with_seed() {
        let spec = FreeformSpec::custom(2, 2).with_area(400, 300);
        let background = RgbaImage::from_pixel(4, 4, Rgba([90, 90, 90, 255]));
        let photos = [
            (Rect::new(60, 60, 100, 100), photo([250, 10, 10, 255], 1)),
            (Rect::new(250, 100, 100, 100), photo([10, 10, 250, 255], 2)),
        ];
        let texts = [text("title", 1), text("subtitle", 2), text("one", 1), text("two", 2)];
        let authors = [Arc::new(Author {
            id: AuthorId(1),
            display_name: "Alice".into(),
            avatar: Some(RgbaImage::from_pixel(80, 80, Rgba([0, 255, 255, 255]))),
        })];
        let scene = FreeformScene {
            spec: &spec,
            background: &background,
            photos: &photos,
            texts: &texts,
            authors: &authors,
        };

        let (first, drawn) = draw_freeform(&scene, &Typeface::Block, &mut StdRng::seed_from_u64(3));
        let (second, _) = draw_freeform(&scene, &Typeface::Block, &mut StdRng::seed_from_u64(3));

        assert_eq!(first, second);
        assert_eq!(drawn, 6);
        assert_eq!(*first.get_pixel(10 + 40, FRAME + 20 + 40), Rgba([0, 255, 255, 255]));
    }

    #[test]
    fn test_quotes_that_do_not_fit_are_not_counted() {
        let spec = FreeformSpec::custom(0, 5).with_area(400, 300);
        let background = RgbaImage::from_pixel(4, 4, Rgba([90, 90, 90, 255]));
        let texts = ["title", "subtitle", "q1", "q2", "q3", "q4", "q5"].map(|quote| text(quote, 1));
        let scene = FreeformScene {
            spec: &spec,
            background: &background,
            photos: &[],
            texts: &texts,
            authors: &[],
        };

        let (_, drawn) = draw_freeform(&scene, &Typeface::Block, &mut StdRng::seed_from_u64(1));

        // boxes of 80 px stacked from 20 px above the bottom of a 300 px picture leave room for 3
        assert_eq!(drawn, 2 + 3);
    }
}
