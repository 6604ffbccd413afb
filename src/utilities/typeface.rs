use std::path::Path;
use std::{fmt, fs, io};

use image::{Rgba, RgbaImage};
use rusttype::{Font, Scale, point};

use super::image_utils;

#[derive(Debug)]
pub enum TypefaceError {
    Io(io::Error),
    InvalidFont,
}

impl fmt::Display for TypefaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read font: {err}"),
            Self::InvalidFont => write!(f, "not a TrueType or OpenType font"),
        }
    }
}

impl std::error::Error for TypefaceError {}

impl From<io::Error> for TypefaceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Measures and rasterizes text.
///
/// `Block` draws every character as a filled box with a fixed advance. It needs no font file,
/// which makes its output deterministic.
pub enum Typeface {
    TrueType(Box<Font<'static>>),
    Block,
}

const BLOCK_ADVANCE: f32 = 0.6;

impl Typeface {
    pub fn load(path: &Path) -> Result<Self, TypefaceError> {
        let font = Font::try_from_vec(fs::read(path)?).ok_or(TypefaceError::InvalidFont)?;
        Ok(Self::TrueType(Box::new(font)))
    }

    #[expect(clippy::cast_precision_loss)]
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match self {
            Self::TrueType(font) => font
                .layout(text, Scale::uniform(size), point(0., 0.))
                .last()
                .map_or(0., |glyph| {
                    glyph.position().x + glyph.unpositioned().h_metrics().advance_width
                }),
            Self::Block => text.chars().count() as f32 * size * BLOCK_ADVANCE,
        }
    }

    /// draws a single line of text; `y` is the top of the line
    pub fn draw(
        &self,
        image: &mut RgbaImage,
        text: &str,
        (x, y): (f32, f32),
        size: f32,
        color: Rgba<u8>,
    ) {
        match self {
            Self::TrueType(font) => draw_glyphs(image, font, text, (x, y), size, color),
            Self::Block => draw_blocks(image, text, (x, y), size, color),
        }
    }

    /// draws a single line of text anchored at `x` according to `align`
    pub fn draw_aligned(
        &self,
        image: &mut RgbaImage,
        text: &str,
        (x, y): (f32, f32),
        size: f32,
        color: Rgba<u8>,
        align: Align,
    ) {
        let x = match align {
            Align::Left => x,
            Align::Center => x - self.measure(text, size) / 2.,
            Align::Right => x - self.measure(text, size),
        };

        self.draw(image, text, (x, y), size, color);
    }
}

fn draw_glyphs(
    image: &mut RgbaImage,
    font: &Font<'static>,
    text: &str,
    (x, y): (f32, f32),
    size: f32,
    color: Rgba<u8>,
) {
    let scale = Scale::uniform(size);
    let ascent = font.v_metrics(scale).ascent;

    for glyph in font.layout(text, scale, point(x, y + ascent)) {
        let Some(bounds) = glyph.pixel_bounding_box() else {
            continue;
        };

        glyph.draw(|glyph_x, glyph_y, coverage| {
            let pixel_x = i64::from(bounds.min.x) + i64::from(glyph_x);
            let pixel_y = i64::from(bounds.min.y) + i64::from(glyph_y);
            let (Ok(pixel_x), Ok(pixel_y)) = (u32::try_from(pixel_x), u32::try_from(pixel_y))
            else {
                return;
            };

            if pixel_x < image.width() && pixel_y < image.height() {
                image_utils::blend_over(image.get_pixel_mut(pixel_x, pixel_y), color, coverage);
            }
        });
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn draw_blocks(image: &mut RgbaImage, text: &str, (x, y): (f32, f32), size: f32, color: Rgba<u8>) {
    let advance = size * BLOCK_ADVANCE;
    let block_width = (advance * 0.75).round().max(1.) as u32;
    let block_height = (size * 0.7).round().max(1.) as u32;
    let top = (size.mul_add(0.2, y)).round() as i64;

    for (index, char) in text.chars().enumerate() {
        if char.is_whitespace() {
            continue;
        }

        let left = (index as f32).mul_add(advance, x).round() as i64;
        image_utils::fill_rect(image, left, top, block_width, block_height, color);
    }
}
