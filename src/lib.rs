//! Allocation-free driver for 64 × 16 quarter-scan RGB LED panels.
//!
//! ## How the panel works
//!
//! The panel is a chain of constant-current LED driver chips wired as one long
//! shift register. Nothing is random-access: to show an image the controller
//! has to keep streaming it, one row group at a time, fast enough that the eye
//! fuses the groups into a steady picture.
//!
//! ### Signal names
//! - **D1 / D2** – The two serial data lanes. Each clock shifts one bit into each lane
//! - **CLK** – Shift-register clock
//! - **LAT** – Latch; a rising then falling edge copies the shift registers into the output drivers
//! - **OE** – Output enable, active low; the selected row group goes dark while it is high
//! - **A0 A1** – Row-address select lines (choose one of four row groups)
//!
//! ### Quarter-scan addressing
//! The panel is 1/4 multiplexed: address value *g* lights rows
//! {g, g+4, g+8, g+12} at once. D1 carries rows g and g+4, D2 carries rows
//! g+8 and g+12, so one clock feeds both halves of the group in lockstep.
//!
//! ### Refresh workflow
//! 1. Shift the whole next row group into the chain while the current one stays lit.
//! 2. Raise OE to blank the LEDs.
//! 3. Select the new group on A0/A1, then pulse LAT.
//! 4. Drop OE again, lighting the new group.
//! 5. Repeat for every group, forever.
//!
//! ## Pieces
//!
//! - [`buffer::PixelBuffer`] holds three 1-bit planes (red, green, blue) that
//!   drawing code mutates, either directly, through text rendered with a
//!   [`font::Font`], or through `embedded-graphics`.
//! - [`scan::ScanEncoder`] packs the planes into the wire format: 48 sixteen-bit
//!   words per row group, in physical shift order.
//! - [`scan::SharedScanTable`] triple-buffers encoded tables between the drawing
//!   context and the refresh context so frames are never torn.
//! - [`panel::Panel`] owns every panel line during configuration, where it can
//!   bit-bang the driver-chip brightness register ([`brightness`]).
//! - [`panel::Panel::activate`] hands the clock and data lines to the shift-out
//!   coprocessor ([`coprocessor::ShiftQueue`]) and returns the
//!   [`refresh::RefreshLoop`], which owns only OE, A0, A1 and LAT.
//!
//! ## Available Feature Flags
//!
//! ### `rp2040` Feature
//! Adds [`rp`], a PIO state-machine implementation of
//! [`coprocessor::ShiftQueue`] for the RP2040 built on `embassy-rp`.
//!
//! ### `std` Feature
//! Adds [`refresh::RefreshTask`], which runs the refresh loop on its own
//! thread with a stop flag and a join handle.
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and routes the crate's
//! log statements to `defmt`.
//!
//! ### `log` Feature
//! Routes the crate's log statements to the `log` facade instead.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

#[cfg(any(test, feature = "std"))]
extern crate std;

use embedded_graphics::pixelcolor::Rgb888;

// must stay first so the macros are visible to the modules below
mod fmt;

pub mod brightness;
pub mod buffer;
pub mod config;
pub mod coprocessor;
pub mod error;
pub mod font;
#[cfg(test)]
mod mock;
pub mod panel;
pub mod refresh;
#[cfg(feature = "rp2040")]
pub mod rp;
pub mod scan;

pub use brightness::Brightness;
pub use buffer::{Channel, Channels, PixelBuffer};
pub use config::{LatchSync, PanelConfig};
pub use coprocessor::ShiftQueue;
pub use error::Error;
pub use font::Font;
pub use panel::{BusPins, ControlPins, Handover, Panel};
pub use refresh::{RefreshLoop, StopFlag};
pub use scan::{ScanEncoder, ScanTable, SharedScanTable};

/// Color type accepted by the `embedded-graphics` draw target
pub type Color = Rgb888;

/// Panel width in pixels
pub const COLS: usize = 64;

/// Panel height in pixels
pub const ROWS: usize = 16;

/// Number of row-address values (the panel is 1/4 multiplexed)
pub const ADDRESS_LINES: usize = 4;

/// Number of colour planes
pub const CHANNELS: usize = 3;

/// Bits carried by one wire word
pub const WORD_BITS: usize = 16;

/// Words streamed to the coprocessor for one row group
pub const WORDS_PER_GROUP: usize = compute_words_per_group(COLS, ROWS, ADDRESS_LINES);

/// Bytes in one colour plane
pub const PLANE_BYTES: usize = compute_plane_bytes(COLS, ROWS);

/// Computes the number of bytes needed to hold one 1-bpp plane
///
/// # Arguments
///
/// * `cols` - Panel width, a multiple of 8
/// * `rows` - Panel height
#[must_use]
pub const fn compute_plane_bytes(cols: usize, rows: usize) -> usize {
    cols * rows / 8
}

/// Computes how many wire words make up one row group
///
/// Every pixel contributes one bit per channel. The pixels are split evenly
/// across the address lines and each word carries [`WORD_BITS`] of them.
///
/// # Arguments
///
/// * `cols` - Panel width
/// * `rows` - Panel height
/// * `address_lines` - Number of row groups (the scan ratio)
#[must_use]
pub const fn compute_words_per_group(cols: usize, rows: usize, address_lines: usize) -> usize {
    cols * rows * CHANNELS / address_lines / WORD_BITS
}
