//! Panel configuration types and builder

use crate::brightness::{Brightness, DEFAULT_DRIVER_CHIPS};

/// Clock pulses sent during [`Panel::init`](crate::panel::Panel::init) to
/// flush the shift registers of the reference panel
pub const DEFAULT_FLUSH_CLOCKS: u16 = 768;

/// How the refresh loop makes sure a row group has been shifted out before it
/// is latched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LatchSync {
    /// Poll the queue until every pushed item has left the coprocessor
    #[default]
    WaitDrained,
    /// Latch straight after pushing and rely on the timing of the loop.
    ///
    /// Latches that happen before the queue is drained are counted in
    /// [`RefreshStats::early_latches`](crate::refresh::RefreshStats).
    Assume,
}

/// Panel configuration
///
/// Use [`PanelConfig::builder`] to create one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelConfig {
    /// Driver chips in the shift chain, one brightness word is sent per chip
    pub driver_chips: u8,
    /// Clock pulses sent while flushing the shift registers
    pub flush_clocks: u16,
    /// Brightness programmed during init
    pub brightness: Brightness,
    /// Latch synchronisation strategy of the refresh loop
    pub latch_sync: LatchSync,
}

impl PanelConfig {
    /// Start building a configuration from the reference panel defaults
    pub fn builder() -> PanelConfigBuilder {
        PanelConfigBuilder::default()
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfigBuilder::default().build()
    }
}

/// Builder for [`PanelConfig`]
///
/// # Example
///
/// ```rust
/// use ledpanel::{Brightness, LatchSync, PanelConfig};
///
/// let config = PanelConfig::builder()
///     .brightness(Brightness::MAX)
///     .latch_sync(LatchSync::Assume)
///     .build();
/// assert_eq!(config.driver_chips, 24);
/// ```
#[must_use]
#[derive(Clone, Copy, Debug)]
pub struct PanelConfigBuilder {
    driver_chips: u8,
    flush_clocks: u16,
    brightness: Brightness,
    latch_sync: LatchSync,
}

impl Default for PanelConfigBuilder {
    fn default() -> Self {
        Self {
            // Three chips per lane per row pair on the 64x16 reference panel
            driver_chips: DEFAULT_DRIVER_CHIPS,
            flush_clocks: DEFAULT_FLUSH_CLOCKS,
            // Dimmest setting
            brightness: Brightness::MIN,
            latch_sync: LatchSync::WaitDrained,
        }
    }
}

impl PanelConfigBuilder {
    /// Create a builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of driver chips in the chain
    pub fn driver_chips(mut self, chips: u8) -> Self {
        self.driver_chips = chips;
        self
    }

    /// Set the number of flush clock pulses sent during init
    pub fn flush_clocks(mut self, clocks: u16) -> Self {
        self.flush_clocks = clocks;
        self
    }

    /// Set the brightness programmed during init
    pub fn brightness(mut self, brightness: Brightness) -> Self {
        self.brightness = brightness;
        self
    }

    /// Set the latch synchronisation strategy
    pub fn latch_sync(mut self, sync: LatchSync) -> Self {
        self.latch_sync = sync;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> PanelConfig {
        PanelConfig {
            driver_chips: self.driver_chips,
            flush_clocks: self.flush_clocks,
            brightness: self.brightness,
            latch_sync: self.latch_sync,
        }
    }
}
