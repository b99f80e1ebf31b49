//! Image decoding and post-processing directives.
//!
//! Images are decoded to 8-bit RGBA. Directives are applied in the order
//! they appear in the asset path:
//!
//! | Directive              | Effect                                      |
//! |------------------------|---------------------------------------------|
//! | `flipx`                | mirror horizontally                         |
//! | `flipy`                | mirror vertically                           |
//! | `flipxy`               | mirror both ways                            |
//! | `crop=x0;y0;x1;y1`     | keep `[x0, x1) × [y0, y1)`                  |
//! | `scalenearest=f`       | nearest-neighbour scale by `f`              |
//! | `scalenearest=fx;fy`   | nearest-neighbour scale per axis            |
//! | `multiply=RRGGBB[AA]`  | multiply every pixel by a colour            |

use std::fmt;

use ::image::imageops::{self, FilterType};
use ::image::Rgba;

use crate::error::{AssetError, AssetResult};
use crate::frames::Rect;

/// Largest width or height `scalenearest` may produce.
pub const MAX_SCALED_DIMENSION: u32 = 16384;

/// Largest pixel count `scalenearest` may produce (256MB of RGBA).
pub const MAX_SCALED_PIXELS: u64 = 64 * 1024 * 1024;

/// A decoded RGBA image.
pub type Image = ::image::RgbaImage;

/// Decode an encoded image (PNG and the other formats `image` detects).
pub fn decode(path: &str, bytes: &[u8]) -> AssetResult<Image> {
    let decoded =
        ::image::load_from_memory(bytes).map_err(|e| AssetError::malformed(path, e))?;
    Ok(decoded.to_rgba8())
}

/// Copy `rect` out of `image`.
///
/// # Errors
///
/// Fails if the rect is empty or extends past the image.
pub fn crop(path: &str, image: &Image, rect: Rect) -> AssetResult<Image> {
    if rect.is_empty() || !rect.fits_within(image.width(), image.height()) {
        return Err(AssetError::malformed(
            path,
            format!(
                "rect [{}, {}, {}, {}] is outside the {}x{} image",
                rect.x0,
                rect.y0,
                rect.x1,
                rect.y1,
                image.width(),
                image.height()
            ),
        ));
    }
    Ok(imageops::crop_imm(image, rect.x0, rect.y0, rect.width(), rect.height()).to_image())
}

/// A single image post-processing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Directive {
    FlipX,
    FlipY,
    FlipXY,
    Crop(Rect),
    ScaleNearest(f32, f32),
    Multiply([u8; 4]),
}

impl Directive {
    /// Parse one directive string (without the leading `?`).
    pub fn parse(directive: &str) -> Result<Self, String> {
        let (name, argument) = match directive.split_once('=') {
            Some((name, argument)) => (name, Some(argument)),
            None => (directive, None),
        };

        match (name.to_ascii_lowercase().as_str(), argument) {
            ("flipx", None) => Ok(Directive::FlipX),
            ("flipy", None) => Ok(Directive::FlipY),
            ("flipxy", None) => Ok(Directive::FlipXY),
            ("crop", Some(argument)) => {
                let values = parse_list::<u32>(argument)?;
                match values.as_slice() {
                    [x0, y0, x1, y1] => Ok(Directive::Crop(Rect::new(*x0, *y0, *x1, *y1))),
                    _ => Err(format!("crop expects x0;y0;x1;y1, got '{}'", argument)),
                }
            }
            ("scalenearest", Some(argument)) => {
                let values = parse_list::<f32>(argument)?;
                let (x, y) = match values.as_slice() {
                    [both] => (*both, *both),
                    [x, y] => (*x, *y),
                    _ => return Err(format!("scalenearest expects f or fx;fy, got '{}'", argument)),
                };
                if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
                    return Err(format!("scale factors must be positive, got '{}'", argument));
                }
                Ok(Directive::ScaleNearest(x, y))
            }
            ("multiply", Some(argument)) => parse_color(argument).map(Directive::Multiply),
            _ => Err(format!("unknown image directive '{}'", directive)),
        }
    }

    /// Apply this directive to `image`.
    pub fn apply(&self, image: Image) -> Result<Image, String> {
        match *self {
            Directive::FlipX => Ok(imageops::flip_horizontal(&image)),
            Directive::FlipY => Ok(imageops::flip_vertical(&image)),
            Directive::FlipXY => Ok(imageops::rotate180(&image)),
            Directive::Crop(rect) => {
                if rect.is_empty() || !rect.fits_within(image.width(), image.height()) {
                    return Err(format!(
                        "crop {} does not fit the {}x{} image",
                        self,
                        image.width(),
                        image.height()
                    ));
                }
                Ok(
                    imageops::crop_imm(&image, rect.x0, rect.y0, rect.width(), rect.height())
                        .to_image(),
                )
            }
            Directive::ScaleNearest(x, y) => {
                let width = scaled(image.width(), x)?;
                let height = scaled(image.height(), y)?;
                let pixels = (width as u64).checked_mul(height as u64);
                if pixels.map_or(true, |p| p > MAX_SCALED_PIXELS) {
                    return Err(format!(
                        "{} would produce a {}x{} image",
                        self, width, height
                    ));
                }
                Ok(imageops::resize(&image, width, height, FilterType::Nearest))
            }
            Directive::Multiply(color) => {
                let mut image = image;
                for Rgba(pixel) in image.pixels_mut() {
                    for (channel, factor) in pixel.iter_mut().zip(color) {
                        *channel = ((*channel as u16 * factor as u16 + 127) / 255) as u8;
                    }
                }
                Ok(image)
            }
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::FlipX => write!(f, "flipx"),
            Directive::FlipY => write!(f, "flipy"),
            Directive::FlipXY => write!(f, "flipxy"),
            Directive::Crop(r) => write!(f, "crop={};{};{};{}", r.x0, r.y0, r.x1, r.y1),
            Directive::ScaleNearest(x, y) => write!(f, "scalenearest={};{}", x, y),
            Directive::Multiply([r, g, b, a]) => {
                write!(f, "multiply={:02x}{:02x}{:02x}{:02x}", r, g, b, a)
            }
        }
    }
}

/// Parse and apply a directive list in order.
pub fn apply_directives(path: &str, image: Image, directives: &[String]) -> AssetResult<Image> {
    let parsed = directives
        .iter()
        .map(|d| Directive::parse(d))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| AssetError::malformed(path, reason))?;

    parsed.iter().try_fold(image, |image, directive| {
        directive
            .apply(image)
            .map_err(|reason| AssetError::malformed(path, reason))
    })
}

/// Scale `size` by `factor`, at least 1 and at most [`MAX_SCALED_DIMENSION`].
fn scaled(size: u32, factor: f32) -> Result<u32, String> {
    let target = (size as f64 * factor as f64).round();
    if !target.is_finite() || target > MAX_SCALED_DIMENSION as f64 {
        return Err(format!(
            "scaling {} by {} exceeds {} pixels",
            size, factor, MAX_SCALED_DIMENSION
        ));
    }
    Ok((target as u32).max(1))
}

fn parse_list<T: std::str::FromStr>(argument: &str) -> Result<Vec<T>, String> {
    argument
        .split(';')
        .map(|part| {
            part.trim()
                .parse::<T>()
                .map_err(|_| format!("invalid number '{}'", part))
        })
        .collect()
}

fn parse_color(hex: &str) -> Result<[u8; 4], String> {
    let hex = hex.trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("multiply expects RRGGBB or RRGGBBAA, got '{}'", hex));
    }

    let mut color = [255u8; 4];
    for (i, slot) in color.iter_mut().enumerate().take(hex.len() / 2) {
        *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("invalid colour '{}': {}", hex, e))?;
    }
    Ok(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    /// 2x2 image: red, green / blue, white.
    fn quad() -> Image {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        image.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        image
    }

    fn directives(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_png() {
        let mut encoded = Vec::new();
        quad()
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .unwrap();

        let decoded = decode("/quad.png", &encoded).unwrap();
        assert_eq!(decoded, quad());
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let result = decode("/bad.png", b"not an image");
        assert!(matches!(result, Err(AssetError::Malformed { .. })));
    }

    #[test]
    fn test_flip_directives() {
        let flipped = apply_directives("/q.png", quad(), &directives(&["flipx"])).unwrap();
        assert_eq!(flipped.get_pixel(0, 0), &Rgba([0, 255, 0, 255]));

        let flipped = apply_directives("/q.png", quad(), &directives(&["flipy"])).unwrap();
        assert_eq!(flipped.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));

        let flipped = apply_directives("/q.png", quad(), &directives(&["flipxy"])).unwrap();
        assert_eq!(flipped.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_directives_apply_in_order() {
        let image = apply_directives(
            "/q.png",
            quad(),
            &directives(&["crop=1;0;2;2", "scalenearest=3;1"]),
        )
        .unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_scale_uniform() {
        let image = apply_directives("/q.png", quad(), &directives(&["scalenearest=2"])).unwrap();
        assert_eq!(image.dimensions(), (4, 4));
        assert_eq!(image.get_pixel(3, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_multiply() {
        let image =
            apply_directives("/q.png", quad(), &directives(&["multiply=ff000080"])).unwrap();
        assert_eq!(image.get_pixel(1, 1), &Rgba([255, 0, 0, 128]));

        let image = apply_directives("/q.png", quad(), &directives(&["multiply=00ff00"])).unwrap();
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_bad_directives_are_malformed() {
        for bad in [
            "rotate",
            "flipx=1",
            "crop=0;0;1",
            "crop=0;0;3;3",
            "scalenearest=0",
            "scalenearest=a",
            "multiply=fff",
        ] {
            let result = apply_directives("/q.png", quad(), &directives(&[bad]));
            assert!(
                matches!(result, Err(AssetError::Malformed { .. })),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn test_oversized_scale_is_malformed() {
        for huge in [
            "scalenearest=1e30",
            "scalenearest=inf",
            "scalenearest=1;9000",
            "scalenearest=8000",
        ] {
            let result = apply_directives("/q.png", quad(), &directives(&[huge]));
            assert!(
                matches!(result, Err(AssetError::Malformed { .. })),
                "accepted {}",
                huge
            );
        }

        let large = apply_directives("/q.png", quad(), &directives(&["scalenearest=1024"])).unwrap();
        assert_eq!(large.dimensions(), (2048, 2048));
    }

    #[test]
    fn test_crop_helper() {
        let cropped = crop("/q.png", &quad(), Rect::new(0, 1, 2, 2)).unwrap();
        assert_eq!(cropped.dimensions(), (2, 1));
        assert_eq!(cropped.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert!(crop("/q.png", &quad(), Rect::new(0, 0, 3, 1)).is_err());
    }

    #[test]
    fn test_directive_display_round_trips_through_parse() {
        let directive = Directive::parse("crop=1;2;3;4").unwrap();
        assert_eq!(Directive::parse(&directive.to_string()).unwrap(), directive);
    }
}
