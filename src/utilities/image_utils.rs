use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, Rgba, RgbaImage};

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=255 first
pub fn channel_to_u8(value: f32) -> u8 {
    (value.clamp(0., 1.) * 255.).round() as u8
}

pub fn channel_to_f32(value: u8) -> f32 {
    f32::from(value) / 255.
}

/// source-over blend of `color` onto `pixel`, with `coverage` scaling the color's own alpha
pub fn blend_over(pixel: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let alpha = channel_to_f32(color[3]) * coverage.clamp(0., 1.);
    if alpha <= 0. {
        return;
    }

    for channel in 0..3 {
        let backdrop = channel_to_f32(pixel[channel]);
        let source = channel_to_f32(color[channel]);
        pixel[channel] = channel_to_u8(backdrop.mul_add(1. - alpha, source * alpha));
    }
    pixel[3] = channel_to_u8(channel_to_f32(pixel[3]).mul_add(1. - alpha, alpha));
}

/// Draws `top` onto `base` with its top-left corner at (`x`, `y`).
///
/// `blend` mixes a backdrop channel with a source channel (both in `0..=1`); the result is then
/// weighted by the source pixel's alpha. Parts of `top` outside of `base` are clipped.
pub fn overlay_with(
    base: &mut RgbaImage,
    top: &RgbaImage,
    x: i64,
    y: i64,
    blend: impl Fn(f32, f32) -> f32,
) {
    let (width, height) = base.dimensions();

    for (top_x, top_y, source) in top.enumerate_pixels() {
        let (Ok(base_x), Ok(base_y)) =
            (u32::try_from(x + i64::from(top_x)), u32::try_from(y + i64::from(top_y)))
        else {
            continue;
        };

        if base_x >= width || base_y >= height {
            continue;
        }

        let alpha = channel_to_f32(source[3]);
        if alpha <= 0. {
            continue;
        }

        let backdrop = base.get_pixel_mut(base_x, base_y);
        for channel in 0..3 {
            let backdrop_value = channel_to_f32(backdrop[channel]);
            let mixed = blend(backdrop_value, channel_to_f32(source[channel]));
            backdrop[channel] = channel_to_u8(backdrop_value.mul_add(1. - alpha, mixed * alpha));
        }
        backdrop[3] = channel_to_u8(channel_to_f32(backdrop[3]).mul_add(1. - alpha, alpha));
    }
}

pub fn overlay(base: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    overlay_with(base, top, x, y, |_, source| source);
}

pub fn fill_rect(image: &mut RgbaImage, x: i64, y: i64, width: u32, height: u32, color: Rgba<u8>) {
    let left = x.max(0);
    let top = y.max(0);
    let right = (x + i64::from(width)).min(i64::from(image.width()));
    let bottom = (y + i64::from(height)).min(i64::from(image.height()));

    for pixel_y in top..bottom {
        for pixel_x in left..right {
            let (Ok(pixel_x), Ok(pixel_y)) = (u32::try_from(pixel_x), u32::try_from(pixel_y))
            else {
                continue;
            };
            blend_over(image.get_pixel_mut(pixel_x, pixel_y), color, 1.);
        }
    }
}

/// strokes a rectangle outline of `thickness` pixels drawn inward from the given bounds
pub fn stroke_rect(
    image: &mut RgbaImage,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    thickness: u32,
    color: Rgba<u8>,
) {
    let thickness = thickness.min(width / 2).min(height / 2).max(1);
    let inner_height = height.saturating_sub(thickness * 2);
    let far_x = x + i64::from(width) - i64::from(thickness);
    let far_y = y + i64::from(height) - i64::from(thickness);
    let inner_y = y + i64::from(thickness);

    fill_rect(image, x, y, width, thickness, color);
    fill_rect(image, x, far_y, width, thickness, color);
    fill_rect(image, x, inner_y, thickness, inner_height, color);
    fill_rect(image, far_x, inner_y, thickness, inner_height, color);
}

pub fn stretch(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }

    imageops::resize(image, width.max(1), height.max(1), FilterType::Triangle)
}

/// scales `image` to cover `width`×`height` and crops the overflow around the center
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn cover(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (source_width, source_height) = image.dimensions();
    if source_width == 0 || source_height == 0 {
        return RgbaImage::new(width, height);
    }

    let scale = (width as f32 / source_width as f32).max(height as f32 / source_height as f32);
    let scaled_width = ((source_width as f32 * scale).ceil() as u32).max(width);
    let scaled_height = ((source_height as f32 * scale).ceil() as u32).max(height);

    let scaled = stretch(image, scaled_width, scaled_height);
    imageops::crop_imm(
        &scaled,
        (scaled_width - width) / 2,
        (scaled_height - height) / 2,
        width,
        height,
    )
    .to_image()
}

/// Rotates `image` around its center by `radians`, growing the canvas to fit the result.
///
/// Pixels outside of the rotated source are transparent.
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn rotate(image: &RgbaImage, radians: f32) -> RgbaImage {
    let (sin, cos) = radians.sin_cos();
    let width = image.width() as f32;
    let height = image.height() as f32;

    // the epsilon keeps float noise around right angles from adding a pixel
    let out_width = (width.mul_add(cos.abs(), height * sin.abs()) - 1e-3).ceil().max(1.) as u32;
    let out_height = (width.mul_add(sin.abs(), height * cos.abs()) - 1e-3).ceil().max(1.) as u32;

    let half_width = out_width as f32 / 2.;
    let half_height = out_height as f32 / 2.;

    RgbaImage::from_fn(out_width, out_height, |x, y| {
        let dx = x as f32 + 0.5 - half_width;
        let dy = y as f32 + 0.5 - half_height;
        let source_x = dx.mul_add(cos, dy * sin) + width / 2.;
        let source_y = (-dx).mul_add(sin, dy * cos) + height / 2.;
        sample_bilinear(image, source_x - 0.5, source_y - 0.5)
    })
}

#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn sample_bilinear(image: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    if x <= -1. || y <= -1. || x >= image.width() as f32 || y >= image.height() as f32 {
        return TRANSPARENT;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fraction_x = x - x0;
    let fraction_y = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let pixel = |px: i64, py: i64| {
        match (u32::try_from(px), u32::try_from(py)) {
            (Ok(px), Ok(py)) if px < image.width() && py < image.height() => {
                *image.get_pixel(px, py)
            }
            _ => TRANSPARENT,
        }
    };

    let corners = [
        (pixel(x0, y0), (1. - fraction_x) * (1. - fraction_y)),
        (pixel(x0 + 1, y0), fraction_x * (1. - fraction_y)),
        (pixel(x0, y0 + 1), (1. - fraction_x) * fraction_y),
        (pixel(x0 + 1, y0 + 1), fraction_x * fraction_y),
    ];

    let mut result = [0.; 4];
    for (corner, weight) in corners {
        for (value, channel) in result.iter_mut().zip(corner.0) {
            *value += f32::from(channel) * weight;
        }
    }

    Rgba(result.map(|value| channel_to_u8(value / 255.)))
}

pub fn encode(image: RgbaImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    let image = DynamicImage::ImageRgba8(image);
    let image = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    };

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format)?;

    Ok(bytes)
}
