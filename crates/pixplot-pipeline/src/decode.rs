//! Image decoding and color-mode detection.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! [`Raster`] in one of the three classifiable color modes. Palette BMPs
//! keep their raw indices instead of being expanded to RGB, so line art
//! saved with a two-color palette can be classified by index.
//!
//! This is the first step in the pipeline: raw bytes in, `Raster` out.

use std::io::Cursor;

use image::codecs::bmp::BmpDecoder;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageFormat, RgbImage};

use crate::types::{ColorMode, Dimensions, PipelineError};

/// A decoded source image in a classifiable color mode.
#[derive(Debug, Clone)]
pub enum Raster {
    /// One 8-bit intensity per pixel.
    Gray(GrayImage),
    /// One palette index per pixel, row-major.
    Indexed {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Palette index of every pixel, row-major.
        indices: Vec<u8>,
        /// The palette the indices refer to.
        palette: Vec<[u8; 3]>,
    },
    /// Three 8-bit channels per pixel.
    Rgb(RgbImage),
}

impl Raster {
    /// Build an indexed raster, checking that `indices` covers every pixel.
    ///
    /// Returns `None` if `indices.len() != width * height`.
    #[must_use]
    pub fn indexed(
        width: u32,
        height: u32,
        indices: Vec<u8>,
        palette: Vec<[u8; 3]>,
    ) -> Option<Self> {
        let expected = u64::from(width) * u64::from(height);
        (indices.len() as u64 == expected).then_some(Self::Indexed {
            width,
            height,
            indices,
            palette,
        })
    }

    /// Pixel dimensions of the image.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        let (width, height) = match self {
            Self::Gray(img) => img.dimensions(),
            Self::Indexed { width, height, .. } => (*width, *height),
            Self::Rgb(img) => img.dimensions(),
        };
        Dimensions { width, height }
    }

    /// The color mode of this raster.
    #[must_use]
    pub const fn color_mode(&self) -> ColorMode {
        match self {
            Self::Gray(_) => ColorMode::Grayscale,
            Self::Indexed { .. } => ColorMode::Indexed,
            Self::Rgb(_) => ColorMode::Rgb,
        }
    }
}

/// Decode raw image bytes into a [`Raster`].
///
/// 8-bit single-channel images become [`Raster::Gray`] and 8-bit RGB
/// images become [`Raster::Rgb`]. BMP files with a palette become
/// [`Raster::Indexed`], unless the palette is the plain 256-entry gray
/// ramp BMP uses to store grayscale, or a black and white pair, in which
/// case they are [`Raster::Gray`]. Black and white pixels become
/// intensities 0 and 255.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::UnsupportedColorMode`] for any other pixel
/// layout (alpha channels, 16-bit, floating point).
pub fn decode(bytes: &[u8]) -> Result<Raster, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    if image::guess_format(bytes)? == ImageFormat::Bmp
        && let Some(raster) = decode_palette_bmp(bytes)?
    {
        return Ok(raster);
    }

    match image::load_from_memory(bytes)? {
        DynamicImage::ImageLuma8(img) => Ok(Raster::Gray(img)),
        DynamicImage::ImageRgb8(img) => Ok(Raster::Rgb(img)),
        other => Err(PipelineError::UnsupportedColorMode(format!(
            "{:?}",
            other.color()
        ))),
    }
}

/// Decode a palette BMP keeping raw indices.
///
/// Returns `Ok(None)` for BMPs without a palette.
fn decode_palette_bmp(bytes: &[u8]) -> Result<Option<Raster>, PipelineError> {
    let mut decoder = BmpDecoder::new(Cursor::new(bytes))?;
    let Some(palette) = decoder.get_palette().map(<[[u8; 3]]>::to_vec) else {
        return Ok(None);
    };

    decoder.set_indexed_color(true);
    let (width, height) = decoder.dimensions();
    let mut indices = vec![0; usize::try_from(decoder.total_bytes()).unwrap_or(usize::MAX)];
    decoder.read_image(&mut indices)?;

    if is_gray_ramp(&palette) {
        return Ok(GrayImage::from_raw(width, height, indices).map(Raster::Gray));
    }
    if is_black_and_white(&palette, &indices) {
        let levels = indices.into_iter().map(|i| if i == 0 { 0 } else { 255 }).collect();
        return Ok(GrayImage::from_raw(width, height, levels).map(Raster::Gray));
    }
    Ok(Raster::indexed(width, height, indices, palette))
}

/// Whether the image is monochrome: black at index 0, white at index 1,
/// and no pixel using any other entry. Decoders pad short palettes, so
/// unused trailing entries are ignored.
fn is_black_and_white(palette: &[[u8; 3]], indices: &[u8]) -> bool {
    palette.starts_with(&[[0, 0, 0], [255, 255, 255]]) && indices.iter().all(|&i| i < 2)
}

/// Whether `palette` maps every index `i` to the gray `(i, i, i)`.
fn is_gray_ramp(palette: &[[u8; 3]]) -> bool {
    palette.len() == 256
        && palette
            .iter()
            .zip(0..=u8::MAX)
            .all(|(entry, i)| *entry == [i, i, i])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use image::ImageEncoder;
    use image::codecs::bmp::BmpEncoder;
    use image::codecs::png::PngEncoder;

    use super::*;

    /// Encode an 8-bit buffer as a BMP with the given palette.
    fn palette_bmp(width: u32, height: u32, indices: &[u8], palette: &[[u8; 3]]) -> Vec<u8> {
        let mut buf = Vec::new();
        BmpEncoder::new(&mut buf)
            .encode_with_palette(
                indices,
                width,
                height,
                image::ExtendedColorType::L8,
                Some(palette),
            )
            .unwrap();
        buf
    }

    fn png(raw: &[u8], width: u32, height: u32, color: image::ExtendedColorType) -> Vec<u8> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(raw, width, height, color)
            .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn gray_png_decodes_to_gray() {
        let bytes = png(&[0, 128, 255, 7], 2, 2, image::ExtendedColorType::L8);
        let raster = decode(&bytes).unwrap();
        assert_eq!(raster.color_mode(), ColorMode::Grayscale);
        assert_eq!(
            raster.dimensions(),
            Dimensions {
                width: 2,
                height: 2
            }
        );
    }

    #[test]
    fn rgb_png_decodes_to_rgb() {
        let bytes = png(&[255, 0, 0, 0, 255, 0], 2, 1, image::ExtendedColorType::Rgb8);
        let raster = decode(&bytes).unwrap();
        assert_eq!(raster.color_mode(), ColorMode::Rgb);
    }

    #[test]
    fn rgba_png_is_unsupported() {
        let bytes = png(&[0, 0, 0, 255], 1, 1, image::ExtendedColorType::Rgba8);
        let result = decode(&bytes);
        assert!(matches!(result, Err(PipelineError::UnsupportedColorMode(_))));
    }

    #[test]
    fn two_color_bmp_keeps_palette_indices() {
        let indices = [0, 1, 1, 0, 0, 1];
        let bytes = palette_bmp(3, 2, &indices, &[[255, 255, 255], [0, 0, 0]]);
        let raster = decode(&bytes).unwrap();
        let Raster::Indexed {
            width,
            height,
            indices: decoded,
            palette,
        } = raster
        else {
            panic!("expected indexed raster");
        };
        assert_eq!((width, height), (3, 2));
        assert_eq!(decoded, indices);
        assert_eq!(palette[1], [0, 0, 0]);
    }

    #[test]
    fn gray_ramp_bmp_decodes_to_gray() {
        let ramp: Vec<[u8; 3]> = (0..=u8::MAX).map(|i| [i, i, i]).collect();
        let bytes = palette_bmp(2, 1, &[10, 251], &ramp);
        let Raster::Gray(img) = decode(&bytes).unwrap() else {
            panic!("expected grayscale raster");
        };
        assert_eq!(img.get_pixel(0, 0).0[0], 10);
        assert_eq!(img.get_pixel(1, 0).0[0], 251);
    }

    #[test]
    fn black_and_white_bmp_decodes_to_gray() {
        let bytes = palette_bmp(4, 1, &[0, 1, 1, 1], &[[0, 0, 0], [255, 255, 255]]);
        let Raster::Gray(img) = decode(&bytes).unwrap() else {
            panic!("expected grayscale raster");
        };
        let levels: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(levels, [0, 255, 255, 255]);
    }

    #[test]
    fn white_then_black_palette_stays_indexed() {
        let bytes = palette_bmp(2, 1, &[0, 1], &[[255, 255, 255], [0, 0, 0]]);
        assert_eq!(decode(&bytes).unwrap().color_mode(), ColorMode::Indexed);
    }

    #[test]
    fn black_and_white_detection_ignores_padding() {
        let mut palette = vec![[0, 0, 0], [255, 255, 255]];
        palette.resize(256, [0, 0, 0]);
        assert!(is_black_and_white(&palette, &[0, 1, 1]));
        assert!(!is_black_and_white(&palette, &[0, 1, 2]));
        assert!(!is_black_and_white(&[[255, 255, 255], [0, 0, 0]], &[0, 1]));
    }

    #[test]
    fn indexed_constructor_checks_length() {
        assert!(Raster::indexed(2, 2, vec![0; 3], vec![]).is_none());
        assert!(Raster::indexed(2, 2, vec![0; 4], vec![]).is_some());
    }

    #[test]
    fn gray_ramp_detection() {
        let ramp: Vec<[u8; 3]> = (0..=u8::MAX).map(|i| [i, i, i]).collect();
        assert!(is_gray_ramp(&ramp));
        assert!(!is_gray_ramp(&ramp[..2]));
        assert!(!is_gray_ramp(&[[255, 255, 255], [0, 0, 0]]));
    }
}
