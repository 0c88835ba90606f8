//! Decode strategies for directory-archive entries.
//!
//! Two strategies exist, selected once per reader from the extension filter:
//! JPEG entries go through a specialized fast decoder with blue-green-red
//! output requested from the decoder itself; everything else goes through a
//! general-purpose codec that infers bit depth and channel count from the
//! file header, with channels reversed to blue-green-red after decode.

use crate::{
    error::DecodeError,
    texture::{Image, Samples},
};
use image::DynamicImage;
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::{errors::DecodeErrors, JpegDecoder};

/// Decode strategy of a directory-archive reader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Codec {
    /// Specialized lossy-photographic decoder.
    Jpeg,
    /// General-purpose decoder for any supported bit depth and channel count.
    Any,
}

impl Codec {
    /// Picks the strategy for an extension filter.
    pub fn for_extension(ext: &str) -> Self {
        if ext.eq_ignore_ascii_case(".jpg") || ext.eq_ignore_ascii_case(".jpeg") {
            Codec::Jpeg
        } else {
            Codec::Any
        }
    }

    /// Decodes the full byte content of one entry.
    pub fn decode(&self, bytes: &[u8]) -> Result<Image, DecodeError> {
        match self {
            Codec::Jpeg => decode_jpeg(bytes),
            Codec::Any => decode_any(bytes),
        }
    }
}

fn decode_jpeg(bytes: &[u8]) -> Result<Image, DecodeError> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::BGR);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    let samples = decoder.decode()?;
    let (width, height) = decoder
        .dimensions()
        .ok_or_else(|| DecodeErrors::Format("no dimensions in jpeg stream".to_string()))?;
    let channels = if width * height == 0 {
        0
    } else {
        samples.len() / (width * height)
    };
    Ok(Image::new(
        [height, width, channels],
        Samples::U8(samples.into_boxed_slice()),
    ))
}

fn decode_any(bytes: &[u8]) -> Result<Image, DecodeError> {
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let image = match decoded {
        DynamicImage::ImageLuma8(buf) => {
            Image::new([height, width, 1], Samples::U8(buf.into_raw().into()))
        }
        DynamicImage::ImageLuma16(buf) => {
            Image::new([height, width, 1], Samples::U16(buf.into_raw().into()))
        }
        DynamicImage::ImageRgb8(buf) => Image::new(
            [height, width, 3],
            Samples::U8(bgr_from_rgb(buf.into_raw()).into()),
        ),
        DynamicImage::ImageRgb16(buf) => Image::new(
            [height, width, 3],
            Samples::U16(bgr_from_rgb(buf.into_raw()).into()),
        ),
        DynamicImage::ImageRgb32F(buf) => Image::new(
            [height, width, 3],
            Samples::F32(bgr_from_rgb(buf.into_raw()).into()),
        ),
        DynamicImage::ImageLumaA8(buf) => {
            let luma = DynamicImage::ImageLumaA8(buf).into_luma8();
            Image::new([height, width, 1], Samples::U8(luma.into_raw().into()))
        }
        DynamicImage::ImageLumaA16(buf) => {
            let luma = DynamicImage::ImageLumaA16(buf).into_luma16();
            Image::new([height, width, 1], Samples::U16(luma.into_raw().into()))
        }
        DynamicImage::ImageRgba8(buf) => {
            let rgb = DynamicImage::ImageRgba8(buf).into_rgb8();
            Image::new(
                [height, width, 3],
                Samples::U8(bgr_from_rgb(rgb.into_raw()).into()),
            )
        }
        DynamicImage::ImageRgba16(buf) => {
            let rgb = DynamicImage::ImageRgba16(buf).into_rgb16();
            Image::new(
                [height, width, 3],
                Samples::U16(bgr_from_rgb(rgb.into_raw()).into()),
            )
        }
        DynamicImage::ImageRgba32F(buf) => {
            let rgb = DynamicImage::ImageRgba32F(buf).into_rgb32f();
            Image::new(
                [height, width, 3],
                Samples::F32(bgr_from_rgb(rgb.into_raw()).into()),
            )
        }
        other => {
            let rgb = other.into_rgb8();
            Image::new(
                [height, width, 3],
                Samples::U8(bgr_from_rgb(rgb.into_raw()).into()),
            )
        }
    };
    Ok(image)
}

/// Reverses the channel order of interleaved 3-channel samples in place.
fn bgr_from_rgb<T: Copy>(mut samples: Vec<T>) -> Vec<T> {
    for pixel in samples.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
    samples
}
