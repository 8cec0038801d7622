use std::io::Cursor;

use image::{ImageError, ImageReader, Limits};

use crate::DecodedImage;

/// Upper bound on decoded dimensions; anything larger is refused before allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_width: u32,
    pub max_height: u32,
    /// Longest side of the returned frame. Larger images are scaled down to
    /// fit, keeping their aspect ratio.
    pub max_output_side: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_width: 8192,
            max_height: 8192,
            max_output_side: 2048,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("bytes are not a recognized image format")]
    UnknownFormat,
    #[error("{format} images are not supported")]
    Unsupported { format: &'static str },
    #[error("image exceeds {max_width}x{max_height}")]
    TooLarge { max_width: u32, max_height: u32 },
    #[error("failed to decode {format} image: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },
}

/// Decode raw bytes into RGBA8. The format is sniffed from the bytes, not the Content-Type.
pub fn decode_image(bytes: &[u8], limits: DecodeLimits) -> Result<DecodedImage, DecodeError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| DecodeError::UnknownFormat)?;
    let format = reader.format().ok_or(DecodeError::UnknownFormat)?;
    let mime = format.to_mime_type();

    let mut image_limits = Limits::default();
    image_limits.max_image_width = Some(limits.max_width);
    image_limits.max_image_height = Some(limits.max_height);
    reader.limits(image_limits);

    let image = reader.decode().map_err(|err| match err {
        ImageError::Limits(_) => DecodeError::TooLarge {
            max_width: limits.max_width,
            max_height: limits.max_height,
        },
        ImageError::Unsupported(_) => DecodeError::Unsupported { format: mime },
        other => DecodeError::Malformed {
            format: mime,
            message: other.to_string(),
        },
    })?;

    let max_side = limits.max_output_side.max(1);
    let image = if image.width() > max_side || image.height() > max_side {
        image.thumbnail(max_side, max_side)
    } else {
        image
    };

    let rgba = image.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
        format: mime,
    })
}
