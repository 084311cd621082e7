// THEORY:
// Every failure the engine can report lives in one enum. Validation failures are
// raised once, before a batch starts, so a batch either runs to completion (or to
// a cancellation point) or never starts at all. Per-pixel math never fails: it
// wraps hue and clamps everything else.

use thiserror::Error;

/// Result type alias for recoloring operations.
pub type Result<T> = std::result::Result<T, VariantError>;

/// Errors that can occur while preparing or exporting a variant batch.
#[derive(Debug, Error)]
pub enum VariantError {
    /// A gradient needs at least two stops to interpolate between.
    #[error("gradient needs at least 2 stops, got {count}")]
    TooFewStops { count: usize },

    /// Width or height of zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The byte length does not describe a `width`x`height` RGBA image.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A numeric parameter was negative, NaN or infinite.
    #[error("{name} out of range: {value}")]
    OutOfRange { name: &'static str, value: f64 },

    /// A named option had an unrecognized value.
    #[error("invalid {name}: '{value}'")]
    InvalidOption { name: &'static str, value: String },

    /// Seed list is empty or longer than the supported batch size.
    #[error("variant count must be between 1 and {max}, got {count}")]
    InvalidVariantCount { count: usize, max: usize },

    /// A color string could not be parsed.
    #[error("invalid color: {reason}")]
    InvalidColor { reason: String },

    /// A pixel coordinate outside of the image.
    #[error("pixel ({x}, {y}) is outside of a {width}x{height} image")]
    PixelOutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    /// Encoding or decoding an image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error during file operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or config (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VariantError {
    /// Create a new invalid color error.
    #[must_use]
    pub fn invalid_color(reason: impl Into<String>) -> Self {
        Self::InvalidColor {
            reason: reason.into(),
        }
    }

    /// Create an out-of-range error for a named parameter.
    #[must_use]
    pub fn out_of_range(name: &'static str, value: f64) -> Self {
        Self::OutOfRange { name, value }
    }

    /// Create an invalid option error.
    #[must_use]
    pub fn invalid_option(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            name,
            value: value.into(),
        }
    }

    /// True for errors raised by up-front request validation.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::TooFewStops { .. }
                | Self::InvalidDimensions { .. }
                | Self::BufferSizeMismatch { .. }
                | Self::OutOfRange { .. }
                | Self::InvalidOption { .. }
                | Self::InvalidVariantCount { .. }
                | Self::InvalidColor { .. }
                | Self::PixelOutOfBounds { .. }
        )
    }
}

/// Checks that a numeric parameter is finite and non-negative.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(VariantError::out_of_range(name, value))
    }
}
