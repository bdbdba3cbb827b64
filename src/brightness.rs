//! Global brightness configuration of the LED driver chips.
//!
//! Each driver chip in the chain has a configuration register that scales its
//! output current. It is written by bit-banging a 16-bit word on both data
//! lanes:
//!
//! - Bits 15-6: fixed preamble `0111000101`
//! - Bits 5-0: brightness level, 0 (12.5 %) to 63 (200 %)
//!
//! bits go out MSB first with one clock pulse each. The latch is raised after
//! the 12th bit has been clocked and released once the word is complete; the
//! chip reads the latch-high clock count as "write configuration register".
//! The word is repeated once per chip, otherwise only part of the panel picks
//! up the new setting.
//!
//! This needs the clock and data lines, so it can only run while the
//! configuring [`Panel`](crate::panel::Panel) still owns them, before the
//! coprocessor takes over.

use bitfield::bitfield;
use embedded_hal::digital::{OutputPin, PinState};

use crate::panel::BusPins;

/// Highest accepted brightness level
pub const MAX_BRIGHTNESS: u8 = 63;

/// Fixed upper ten bits of the configuration word
pub const PREAMBLE: u16 = 0b01_1100_0101;

/// Bits in one configuration word
pub const CONFIG_BITS: usize = 16;

/// Zero-based bit index after which the latch is raised
pub const LATCH_AFTER_BIT: usize = 11;

/// Number of driver chips on the reference panel
pub const DEFAULT_DRIVER_CHIPS: u8 = 24;

/// A validated brightness level in `0..=63`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Brightness(u8);

impl Brightness {
    /// Dimmest setting (12.5 %)
    pub const MIN: Self = Self(0);
    /// Brightest setting (200 %)
    pub const MAX: Self = Self(MAX_BRIGHTNESS);

    /// Returns `None` if `level` is above [`MAX_BRIGHTNESS`].
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level > MAX_BRIGHTNESS {
            None
        } else {
            Some(Self(level))
        }
    }

    /// The raw six-bit level
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }
}

bitfield! {
    /// 16-bit configuration word sent to each driver chip.
    ///
    /// The bit layout is as follows:
    /// - Bits 15-6: Preamble
    /// - Bits 5-0: Brightness level
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct ConfigWord(u16);
    impl Debug;
    /// Fixed preamble, always [`PREAMBLE`] for a valid word
    pub preamble, set_preamble: 15, 6;
    /// Brightness level
    pub u8, level, set_level: 5, 0;
}

impl ConfigWord {
    /// Word that sets `brightness`
    #[must_use]
    pub fn new(brightness: Brightness) -> Self {
        let mut word = Self(0);
        word.set_preamble(PREAMBLE);
        word.set_level(brightness.level());
        word
    }

    /// Raw 16-bit value
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Bits in transmission order (MSB first)
    pub fn iter_bits(self) -> impl Iterator<Item = bool> {
        (0..CONFIG_BITS).rev().map(move |i| (self.0 >> i) & 1 != 0)
    }
}

/// Write `brightness` into every driver chip of the chain.
///
/// Leaves the clock low, both lanes at the last bit sent and the latch low.
///
/// # Errors
///
/// Returns the first GPIO error reported by any pin.
pub fn transmit<CLK, D1, D2, LAT, E>(
    bus: &mut BusPins<CLK, D1, D2>,
    lat: &mut LAT,
    brightness: Brightness,
    driver_chips: u8,
) -> Result<(), E>
where
    CLK: OutputPin<Error = E>,
    D1: OutputPin<Error = E>,
    D2: OutputPin<Error = E>,
    LAT: OutputPin<Error = E>,
{
    let word = ConfigWord::new(brightness);
    debug!(
        "brightness: writing level {} to {} chips",
        brightness.level(),
        driver_chips
    );

    lat.set_low()?;
    bus.clk.set_low()?;
    bus.d1.set_low()?;
    bus.d2.set_low()?;

    for _ in 0..driver_chips {
        for (index, bit) in word.iter_bits().enumerate() {
            let level = PinState::from(bit);
            bus.d1.set_state(level)?;
            bus.d2.set_state(level)?;
            bus.clk.set_high()?;
            bus.clk.set_low()?;
            if index == LATCH_AFTER_BIT {
                lat.set_high()?;
            }
        }
        lat.set_low()?;
    }
    Ok(())
}
