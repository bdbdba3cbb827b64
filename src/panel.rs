//! Panel pins and the configuring phase.
//!
//! A panel goes through two phases:
//!
//! 1. **Configuring**: [`Panel`] owns every line. It can flush the shift
//!    registers ([`Panel::init`]) and bit-bang the brightness register
//!    ([`Panel::set_brightness`]).
//! 2. **Refreshing**: [`Panel::activate`] gives the clock and data lines to
//!    the shift-out coprocessor and returns a [`RefreshLoop`] that only owns
//!    OE, A0, A1 and LAT. [`Panel::detach_bus`] splits this in two for
//!    coprocessors that need the pins back first (see [`Handover`]).
//!
//! Because the second phase no longer has the clock and data pins, changing
//! the brightness while the coprocessor is streaming cannot be expressed.
//!
//! # Example
//!
//! ```rust,ignore
//! if interlock_engaged(&mut stop_button)? {
//!     return Ok(());
//! }
//! let mut panel = Panel::new(control, bus, PanelConfig::default());
//! panel.init()?;
//! let mut refresh = panel.activate(reader, |bus| make_queue(bus));
//! refresh.run(&STOP)?;
//! ```

use embedded_hal::digital::{InputPin, OutputPin};

use crate::brightness::{self, Brightness};
use crate::config::PanelConfig;
use crate::coprocessor::ShiftQueue;
use crate::error::Error;
use crate::refresh::RefreshLoop;
use crate::scan::ScanReader;

/// Lines the refresh loop keeps driving after activation
#[derive(Debug)]
pub struct ControlPins<OE, A0, A1, LAT> {
    /// Output enable, active low
    pub oe: OE,
    /// Row address bit 0
    pub a0: A0,
    /// Row address bit 1
    pub a1: A1,
    /// Latch
    pub lat: LAT,
}

/// Lines handed to the coprocessor on activation
#[derive(Debug)]
pub struct BusPins<CLK, D1, D2> {
    /// Shift clock
    pub clk: CLK,
    /// Data lane 1 (upper half of the panel)
    pub d1: D1,
    /// Data lane 2 (lower half of the panel)
    pub d2: D2,
}

/// A panel in its configuring phase
pub struct Panel<OE, A0, A1, LAT, CLK, D1, D2> {
    control: ControlPins<OE, A0, A1, LAT>,
    bus: BusPins<CLK, D1, D2>,
    config: PanelConfig,
}

impl<OE, A0, A1, LAT, CLK, D1, D2, E> Panel<OE, A0, A1, LAT, CLK, D1, D2>
where
    OE: OutputPin<Error = E>,
    A0: OutputPin<Error = E>,
    A1: OutputPin<Error = E>,
    LAT: OutputPin<Error = E>,
    CLK: OutputPin<Error = E>,
    D1: OutputPin<Error = E>,
    D2: OutputPin<Error = E>,
{
    /// Take ownership of the panel lines. Nothing is driven yet.
    pub fn new(
        control: ControlPins<OE, A0, A1, LAT>,
        bus: BusPins<CLK, D1, D2>,
        config: PanelConfig,
    ) -> Self {
        Self {
            control,
            bus,
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Blank the panel, flush the shift registers and program the configured
    /// brightness.
    ///
    /// Leaves OE high; the first refresh step lights the panel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if any line fails to switch.
    pub fn init(&mut self) -> Result<(), Error<E>> {
        info!(
            "panel: init, {} flush clocks, {} driver chips",
            self.config.flush_clocks,
            self.config.driver_chips
        );
        self.control.oe.set_high()?;
        self.control.lat.set_low()?;
        self.bus.clk.set_low()?;
        self.control.a0.set_low()?;
        self.control.a1.set_low()?;
        self.bus.d1.set_low()?;
        self.bus.d2.set_low()?;

        for _ in 0..self.config.flush_clocks {
            self.bus.clk.set_high()?;
            self.bus.clk.set_low()?;
        }
        self.control.lat.set_high()?;
        self.control.lat.set_low()?;

        brightness::transmit(
            &mut self.bus,
            &mut self.control.lat,
            self.config.brightness,
            self.config.driver_chips,
        )?;
        Ok(())
    }

    /// Program the brightness register of every driver chip.
    ///
    /// `level` runs from 0 (12.5 %) to 63 (200 %).
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrightnessOutOfRange`] without touching any line if
    /// `level` is above 63, or [`Error::Pin`] if a line fails to switch.
    pub fn set_brightness(&mut self, level: u8) -> Result<(), Error<E>> {
        let Some(brightness) = Brightness::new(level) else {
            warn!("panel: brightness {} rejected", level);
            return Err(Error::BrightnessOutOfRange { level });
        };
        brightness::transmit(
            &mut self.bus,
            &mut self.control.lat,
            brightness,
            self.config.driver_chips,
        )?;
        self.config.brightness = brightness;
        Ok(())
    }

    /// End the configuring phase.
    ///
    /// `start` receives the clock and data lines and must return the running
    /// coprocessor queue. The returned loop streams whatever `reader` sees.
    ///
    /// When the coprocessor needs the original pin resources rather than the
    /// output drivers (embassy-rp's PIO takes `Peri` handles), use
    /// [`detach_bus`](Self::detach_bus) instead.
    pub fn activate<'a, Q, F>(
        self,
        reader: ScanReader<'a>,
        start: F,
    ) -> RefreshLoop<'a, Q, OE, A0, A1, LAT>
    where
        Q: ShiftQueue,
        F: FnOnce(BusPins<CLK, D1, D2>) -> Q,
    {
        let (handover, bus) = self.detach_bus();
        handover.start(reader, start(bus))
    }

    /// End the configuring phase, giving back the clock and data lines.
    ///
    /// The returned [`Handover`] no longer refers to the bus types, so the
    /// bus can be dropped and its pins reborrowed by the coprocessor before
    /// [`Handover::start`] builds the refresh loop.
    pub fn detach_bus(self) -> (Handover<OE, A0, A1, LAT>, BusPins<CLK, D1, D2>) {
        info!("panel: handing bus to coprocessor");
        let handover = Handover {
            control: self.control,
            config: self.config,
        };
        (handover, self.bus)
    }

    /// Give all lines back
    pub fn release(self) -> (ControlPins<OE, A0, A1, LAT>, BusPins<CLK, D1, D2>) {
        (self.control, self.bus)
    }
}

/// A panel between its configuring and refreshing phases
///
/// Holds the control lines and the configuration; the bus is gone, so the
/// brightness can no longer be changed.
pub struct Handover<OE, A0, A1, LAT> {
    control: ControlPins<OE, A0, A1, LAT>,
    config: PanelConfig,
}

impl<OE, A0, A1, LAT, E> Handover<OE, A0, A1, LAT>
where
    OE: OutputPin<Error = E>,
    A0: OutputPin<Error = E>,
    A1: OutputPin<Error = E>,
    LAT: OutputPin<Error = E>,
{
    /// Configuration the panel was set up with
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Start refreshing through the running coprocessor `queue`
    pub fn start<'a, Q: ShiftQueue>(
        self,
        reader: ScanReader<'a>,
        queue: Q,
    ) -> RefreshLoop<'a, Q, OE, A0, A1, LAT> {
        RefreshLoop::new(self.control, queue, reader, self.config.latch_sync)
    }
}

/// Check the safety interlock input.
///
/// The input is pulled up, so a pressed button reads low. Call this before
/// any other line is configured and stop if it returns `true`.
///
/// # Errors
///
/// Returns the pin's error if it cannot be read.
pub fn interlock_engaged<P: InputPin>(pin: &mut P) -> Result<bool, P::Error> {
    let engaged = pin.is_low()?;
    if engaged {
        warn!("panel: safety interlock engaged");
    }
    Ok(engaged)
}
