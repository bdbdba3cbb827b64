//! Error types for the driver
//!
//! Almost everything in this crate is infallible: pixel writes outside the
//! panel are ignored and a full coprocessor queue blocks instead of failing.
//! What remains are GPIO errors surfaced by the `embedded-hal` pins and an
//! out-of-range brightness request.
//!
//! Font parsing has its own error type, [`FontError`](crate::font::FontError).

use crate::brightness::MAX_BRIGHTNESS;

/// Errors that can occur while driving the panel
///
/// Generic over the GPIO error type so callers can still match on the
/// underlying hardware error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// A GPIO pin reported an error
    Pin(E),
    /// Requested brightness is above [`MAX_BRIGHTNESS`]
    ///
    /// Nothing is transmitted to the driver chips when this is returned.
    BrightnessOutOfRange {
        /// Level that was requested
        level: u8,
    },
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Pin(err)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pin(err) => write!(f, "Pin error: {err:?}"),
            Self::BrightnessOutOfRange { level } => {
                write!(f, "Brightness {level} out of range (max {MAX_BRIGHTNESS})")
            }
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for Error<E> {}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Pin(err) => defmt::write!(f, "Pin error: {}", err),
            Self::BrightnessOutOfRange { level } => {
                defmt::write!(f, "Brightness {} out of range (max {})", level, MAX_BRIGHTNESS);
            }
        }
    }
}
