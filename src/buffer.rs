//! One-bit-per-channel pixel storage for the panel.
//!
//! The image is held as three independent bit-planes, one per colour. Each
//! plane is [`PLANE_BYTES`] long; pixel `(x, y)` lives in byte
//! `(x >> 3) + y * (COLS / 8)` and within that byte the most significant bit
//! is the leftmost pixel. That is the order [`ScanEncoder`](crate::scan::ScanEncoder)
//! reads eight pixels at a time.
//!
//! Every coordinate-taking method silently ignores pixels outside the panel,
//! so text or shapes may run off the edge.
//!
//! # Example
//! ```rust
//! use embedded_graphics::pixelcolor::RgbColor;
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use ledpanel::{Channel, Color, PixelBuffer};
//!
//! let mut buffer = PixelBuffer::new();
//! buffer.set(Channel::Red, 3, 2, true);
//!
//! Rectangle::new(Point::new(10, 4), Size::new(8, 8))
//!     .into_styled(PrimitiveStyle::with_fill(Color::CYAN))
//!     .draw(&mut buffer)
//!     .unwrap();
//!
//! assert!(buffer.get(Channel::Green, 12, 6));
//! assert!(!buffer.get(Channel::Red, 12, 6));
//! ```

use core::convert::Infallible;

use bitfield::bitfield;
use embedded_graphics::pixelcolor::RgbColor;
use embedded_graphics::prelude::{OriginDimensions, Size};

use crate::font::Font;
use crate::{Color, COLS, PLANE_BYTES, ROWS};

/// A component at or above this value lights its channel (one bit per channel)
const LIT_THRESHOLD: u8 = 1 << (8 - 1);

const BYTES_PER_ROW: usize = COLS / 8;

/// One colour plane of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Channel {
    /// Red plane
    Red = 0,
    /// Green plane
    Green = 1,
    /// Blue plane
    Blue = 2,
}

impl Channel {
    /// All channels in storage order
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    const fn index(self) -> usize {
        self as usize
    }
}

bitfield! {
    /// A set of colour planes that a drawing operation writes to.
    ///
    /// The bit layout matches the colour index used by the text writer:
    /// - Bit 2: Blue
    /// - Bit 1: Green
    /// - Bit 0: Red
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Channels(u8);
    impl Debug;
    /// Red plane selected
    pub red, set_red: 0;
    /// Green plane selected
    pub green, set_green: 1;
    /// Blue plane selected
    pub blue, set_blue: 2;
}

impl Channels {
    /// No planes
    pub const NONE: Self = Self(0);
    /// Red only
    pub const RED: Self = Self(0b001);
    /// Green only
    pub const GREEN: Self = Self(0b010);
    /// Blue only
    pub const BLUE: Self = Self(0b100);
    /// All three planes (white)
    pub const ALL: Self = Self(0b111);

    /// Build a set from a 3-bit colour index: bit 0 red, bit 1 green, bit 2 blue.
    ///
    /// Bits above bit 2 are ignored.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        Self(index & 0b111)
    }

    /// Returns `true` if `channel` is part of the set
    #[must_use]
    pub fn contains(self, channel: Channel) -> bool {
        match channel {
            Channel::Red => self.red(),
            Channel::Green => self.green(),
            Channel::Blue => self.blue(),
        }
    }

    /// Iterate over the selected channels in storage order
    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl From<Channel> for Channels {
    fn from(channel: Channel) -> Self {
        Self(1 << channel.index())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Channels {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Channels {{ red: {}, green: {}, blue: {} }}",
            self.red(),
            self.green(),
            self.blue()
        );
    }
}

/// Maps a coordinate to its byte index and bit mask, or `None` off-panel.
#[inline]
fn locate(x: i32, y: i32) -> Option<(usize, u8)> {
    if x < 0 || y < 0 {
        return None;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= COLS || y >= ROWS {
        return None;
    }
    Some(((x >> 3) + y * BYTES_PER_ROW, 0x80 >> (x & 7)))
}

/// Three 1-bpp bit-planes holding the current panel image
///
/// The buffer is a fixed-size value; creating one never allocates and nothing
/// here resizes it afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    planes: [[u8; PLANE_BYTES]; 3],
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelBuffer {
    /// Create a buffer with every pixel off
    #[must_use]
    pub const fn new() -> Self {
        Self {
            planes: [[0; PLANE_BYTES]; 3],
        }
    }

    /// Read one pixel. Off-panel coordinates read as `false`.
    #[must_use]
    pub fn get(&self, channel: Channel, x: i32, y: i32) -> bool {
        match locate(x, y) {
            Some((byte, mask)) => self.planes[channel.index()][byte] & mask != 0,
            None => false,
        }
    }

    /// Write one pixel. Off-panel coordinates are ignored.
    pub fn set(&mut self, channel: Channel, x: i32, y: i32, on: bool) {
        let Some((byte, mask)) = locate(x, y) else {
            return;
        };
        let cell = &mut self.planes[channel.index()][byte];
        if on {
            *cell |= mask;
        } else {
            *cell &= !mask;
        }
    }

    /// Write the same value to one pixel in every channel of `channels`.
    pub fn set_pixel(&mut self, x: i32, y: i32, channels: Channels, on: bool) {
        for channel in channels.iter() {
            self.set(channel, x, y, on);
        }
    }

    /// Turn off every pixel of one channel
    pub fn clear(&mut self, channel: Channel) {
        self.planes[channel.index()].fill(0);
    }

    /// Turn off every pixel of every channel
    pub fn clear_all(&mut self) {
        for channel in Channel::ALL {
            self.clear(channel);
        }
    }

    /// Raw plane bytes, row-major, MSB = leftmost pixel
    #[must_use]
    pub fn plane(&self, channel: Channel) -> &[u8; PLANE_BYTES] {
        &self.planes[channel.index()]
    }

    /// Render `text` with `font` into the selected channels.
    ///
    /// `(x, y)` is the top-left corner of the first glyph. In each glyph row a
    /// `#` turns the pixel on, a `-` turns it off and anything else leaves it
    /// alone. Characters missing from the font are skipped. Pixels falling
    /// outside the panel are ignored, so the text may overflow the edges.
    ///
    /// Returns the x position just past the last glyph drawn.
    pub fn write_text(
        &mut self,
        channels: Channels,
        x: i32,
        y: i32,
        font: &Font<'_>,
        text: &str,
    ) -> i32 {
        let mut pen = x;
        for ch in text.chars() {
            let Some(glyph) = font.glyph(u32::from(ch)) else {
                continue;
            };
            for (dy, row) in glyph.rows().enumerate() {
                let py = y.saturating_add(dy as i32);
                for (dx, cell) in row.chars().enumerate() {
                    let px = pen.saturating_add(dx as i32);
                    match cell {
                        '#' => self.set_pixel(px, py, channels, true),
                        '-' => self.set_pixel(px, py, channels, false),
                        _ => {}
                    }
                }
            }
            pen = pen.saturating_add(glyph.width() as i32);
        }
        pen
    }

    fn count_lit(&self, channel: Channel) -> u32 {
        self.planes[channel.index()]
            .iter()
            .map(|b| b.count_ones())
            .sum()
    }
}

impl core::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("size", &core::mem::size_of_val(&self.planes))
            .field("red_lit", &self.count_lit(Channel::Red))
            .field("green_lit", &self.count_lit(Channel::Green))
            .field("blue_lit", &self.count_lit(Channel::Blue))
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PixelBuffer {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PixelBuffer<{}, {}>", COLS, ROWS);
        defmt::write!(
            f,
            " lit r/g/b: {}/{}/{}",
            self.count_lit(Channel::Red),
            self.count_lit(Channel::Green),
            self.count_lit(Channel::Blue)
        );
    }
}

impl OriginDimensions for PixelBuffer {
    fn size(&self) -> Size {
        Size::new(COLS as u32, ROWS as u32)
    }
}

impl embedded_graphics::draw_target::DrawTarget for PixelBuffer {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for embedded_graphics::Pixel(point, color) in pixels {
            self.set(Channel::Red, point.x, point.y, color.r() >= LIT_THRESHOLD);
            self.set(Channel::Green, point.x, point.y, color.g() >= LIT_THRESHOLD);
            self.set(Channel::Blue, point.x, point.y, color.b() >= LIT_THRESHOLD);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = |lit: bool| if lit { 0xFF } else { 0x00 };
        self.planes[Channel::Red.index()].fill(fill(color.r() >= LIT_THRESHOLD));
        self.planes[Channel::Green.index()].fill(fill(color.g() >= LIT_THRESHOLD));
        self.planes[Channel::Blue.index()].fill(fill(color.b() >= LIT_THRESHOLD));
        Ok(())
    }
}
