use image::imageops;
use image::{DynamicImage, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utilities::image_utils::{channel_to_f32, channel_to_u8};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PixelFilter {
    Identity,
    Grayscale,
    Blur { sigma: f32 },
    Invert,
    Tint { red: u8, green: u8, blue: u8 },
    HueRotate { degrees: i32 },
    Saturate { factor: f32 },
}

impl PixelFilter {
    pub fn apply(self, image: &RgbaImage) -> RgbaImage {
        match self {
            Self::Identity => image.clone(),
            Self::Grayscale => {
                DynamicImage::ImageLumaA8(imageops::grayscale_alpha(image)).into_rgba8()
            }
            Self::Blur { sigma } => imageops::blur(image, sigma),
            Self::Invert => {
                let mut image = image.clone();
                imageops::invert(&mut image);
                image
            }
            Self::Tint { red, green, blue } => map_pixels(image, |Rgba([r, g, b, a])| {
                Rgba([scale(r, red), scale(g, green), scale(b, blue), a])
            }),
            Self::HueRotate { degrees } => imageops::huerotate(image, degrees),
            Self::Saturate { factor } => map_pixels(image, |Rgba([r, g, b, a])| {
                let [r, g, b] = [r, g, b].map(channel_to_f32);
                let luma = 0.299f32.mul_add(r, 0.587f32.mul_add(g, 0.114 * b));
                let [r, g, b] =
                    [r, g, b].map(|channel| channel_to_u8((channel - luma).mul_add(factor, luma)));
                Rgba([r, g, b, a])
            }),
        }
    }
}

fn scale(channel: u8, tint: u8) -> u8 {
    channel_to_u8(channel_to_f32(channel) * channel_to_f32(tint))
}

fn map_pixels(image: &RgbaImage, map: impl Fn(Rgba<u8>) -> Rgba<u8>) -> RgbaImage {
    let mut image = image.clone();
    for pixel in image.pixels_mut() {
        *pixel = map(*pixel);
    }
    image
}

/// Separable blend modes, named after their canvas `globalCompositeOperation` counterparts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    SourceOver,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    pub const ALL: [Self; 12] = [
        Self::SourceOver,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::SoftLight,
        Self::Difference,
        Self::Exclusion,
    ];

    /// mixes a backdrop and a source channel, both in `0..=1`
    pub fn blend_channel(self, backdrop: f32, source: f32) -> f32 {
        let blended = match self {
            Self::SourceOver => source,
            Self::Multiply => backdrop * source,
            Self::Screen => screen(backdrop, source),
            Self::Overlay => hard_light(source, backdrop),
            Self::Darken => backdrop.min(source),
            Self::Lighten => backdrop.max(source),
            Self::ColorDodge => {
                if backdrop <= 0. {
                    0.
                } else if source >= 1. {
                    1.
                } else {
                    (backdrop / (1. - source)).min(1.)
                }
            }
            Self::ColorBurn => {
                if backdrop >= 1. {
                    1.
                } else if source <= 0. {
                    0.
                } else {
                    1. - ((1. - backdrop) / source).min(1.)
                }
            }
            Self::HardLight => hard_light(backdrop, source),
            Self::SoftLight => {
                if source <= 0.5 {
                    (2f32.mul_add(-source, 1.) * backdrop).mul_add(-(1. - backdrop), backdrop)
                } else {
                    let darkened = if backdrop <= 0.25 {
                        16f32.mul_add(backdrop, -12.).mul_add(backdrop, 4.) * backdrop
                    } else {
                        backdrop.sqrt()
                    };
                    2f32.mul_add(source, -1.).mul_add(darkened - backdrop, backdrop)
                }
            }
            Self::Difference => (backdrop - source).abs(),
            Self::Exclusion => (2. * backdrop).mul_add(-source, backdrop + source),
        };

        blended.clamp(0., 1.)
    }
}

fn screen(backdrop: f32, source: f32) -> f32 {
    backdrop.mul_add(-source, backdrop + source)
}

fn hard_light(backdrop: f32, source: f32) -> f32 {
    if source <= 0.5 {
        backdrop * 2. * source
    } else {
        screen(backdrop, 2f32.mul_add(source, -1.))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectSpec {
    pub filter: PixelFilter,
    pub blend: BlendMode,
}

pub struct EffectSelector;

impl EffectSelector {
    /// Picks a random filter and, independently, a random blend mode.
    ///
    /// Without a seed the choice is not reproducible.
    pub fn choose(seed: Option<u64>) -> EffectSpec {
        match seed {
            Some(seed) => Self::choose_with(&mut StdRng::seed_from_u64(seed)),
            None => Self::choose_with(&mut rand::rng()),
        }
    }

    pub fn choose_with<R: Rng + ?Sized>(rng: &mut R) -> EffectSpec {
        let filter = match rng.random_range(0..7) {
            0 => PixelFilter::Identity,
            1 => PixelFilter::Grayscale,
            2 => PixelFilter::Blur { sigma: rng.random_range(0.5..3.) },
            3 => PixelFilter::Invert,
            4 => PixelFilter::Tint { red: 255, green: 100, blue: 100 },
            5 => PixelFilter::HueRotate { degrees: rng.random_range(0..360) },
            _ => PixelFilter::Saturate { factor: rng.random_range(1.5..3.) },
        };

        let blend = BlendMode::ALL[rng.random_range(0..BlendMode::ALL.len())];

        EffectSpec { filter, blend }
    }
}
