use std::fmt;
use std::sync::Arc;

/// A decoded RGBA8 bitmap ready for display.
///
/// Pixels are row-major, four bytes per pixel, and shared so that handing a
/// frame from the state to the display surface never copies the buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFrame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl ImageFrame {
    /// Returns `None` when `pixels` does not hold exactly `width * height` RGBA pixels.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for ImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Terminal result of one flow, delivered back to the interactive context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded(ImageFrame),
    Failed(FetchFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge,
    NotAnImage,
    Network,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl FetchFailure {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Text shown on the error line for a failed request to `url`.
    pub fn user_message(&self, url: &str) -> String {
        match self.reason {
            FailureReason::InvalidUrl => format!("\"{url}\" is not a valid URL"),
            FailureReason::HttpStatus(code) => format!("Server answered with HTTP {code}"),
            FailureReason::Timeout => "Timed out waiting for the image".to_string(),
            FailureReason::TooLarge => "The image is too large".to_string(),
            FailureReason::NotAnImage => "The response is not a supported image".to_string(),
            FailureReason::Network => format!("Network error: {}", self.detail),
            FailureReason::Cancelled => "Download cancelled".to_string(),
        }
    }
}
