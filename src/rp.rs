//! RP2040 PIO implementation of [`ShiftQueue`].
//!
//! One PIO state machine runs the shift-out program:
//!
//! ```text
//! out null, 16      ; autopull, drop the upper half
//! set x, 7
//! loop:
//!   out pins, 2     ; low bit to D1, high bit to D2
//!   set pins, 1     ; CLK high
//!   set pins, 0     ; CLK low
//!   jmp x-- loop
//! ```
//!
//! D1 and D2 must be consecutive GPIOs (D2 = D1 + 1).
//!
//! The configuring [`Panel`](crate::panel::Panel) drives CLK, D1 and D2 as
//! plain outputs built from reborrowed pins. [`Panel::detach_bus`] hands
//! those outputs back so they can be dropped before the same pins go to the
//! PIO:
//!
//! ```rust,ignore
//! let bus = BusPins {
//!     clk: Output::new(clk.reborrow(), Level::Low),
//!     d1: Output::new(d1.reborrow(), Level::Low),
//!     d2: Output::new(d2.reborrow(), Level::Low),
//! };
//! let mut panel = Panel::new(control, bus, config);
//! panel.init()?;
//! let (handover, bus) = panel.detach_bus();
//! drop(bus);
//! let queue = PioShiftQueue::new(&mut common, sm0, clk, d1, d2);
//! let mut refresh = handover.start(reader, queue);
//! ```
//!
//! [`Panel::detach_bus`]: crate::panel::Panel::detach_bus

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::pio::{
    Common, Config, Direction, Instance, Pin, PioPin, ShiftConfig, ShiftDirection, StateMachine,
};
use embassy_rp::Peri;
use fixed::types::U24F8;

use crate::coprocessor::{ShiftQueue, PIXEL_CLOCK_HZ};

/// Divider that runs a state machine at `target_hz` from `sys_hz`, with
/// eight fractional bits
fn clock_divider(sys_hz: u32, target_hz: u32) -> U24F8 {
    let bits = (u64::from(sys_hz) << 8) / u64::from(target_hz.max(1));
    U24F8::from_bits(bits.clamp(1 << 8, u64::from(u32::MAX)) as u32)
}

/// Shift-out coprocessor on one PIO state machine
pub struct PioShiftQueue<'d, PIO: Instance, const SM: usize> {
    sm: StateMachine<'d, PIO, SM>,
    _pins: [Pin<'d, PIO>; 3],
}

impl<'d, PIO: Instance, const SM: usize> PioShiftQueue<'d, PIO, SM> {
    /// Load the program, claim the pins and start the state machine
    pub fn new(
        common: &mut Common<'d, PIO>,
        mut sm: StateMachine<'d, PIO, SM>,
        clk: Peri<'d, impl PioPin + 'd>,
        d1: Peri<'d, impl PioPin + 'd>,
        d2: Peri<'d, impl PioPin + 'd>,
    ) -> Self {
        let prg = pio::pio_asm!(
            "out null, 16",
            "set x, 7",
            "loop:",
            "    out pins, 2",
            "    set pins, 1",
            "    set pins, 0",
            "    jmp x-- loop",
        );
        let installed = common.load_program(&prg.program);

        let clk = common.make_pio_pin(clk);
        let d1 = common.make_pio_pin(d1);
        let d2 = common.make_pio_pin(d2);

        let mut cfg = Config::default();
        cfg.use_program(&installed, &[]);
        cfg.set_out_pins(&[&d1, &d2]);
        cfg.set_set_pins(&[&clk]);
        cfg.shift_out = ShiftConfig {
            auto_fill: true,
            threshold: 32,
            direction: ShiftDirection::Left,
        };
        let sys_hz = clk_sys_freq();
        cfg.clock_divider = clock_divider(sys_hz, PIXEL_CLOCK_HZ);

        sm.set_config(&cfg);
        sm.set_pin_dirs(Direction::Out, &[&clk, &d1, &d2]);
        sm.set_enable(true);
        info!(
            "rp: shift-out state machine {} running at {} Hz (sys {} Hz)",
            SM,
            PIXEL_CLOCK_HZ,
            sys_hz
        );

        Self {
            sm,
            _pins: [clk, d1, d2],
        }
    }

    /// Stop the state machine and hand it back
    pub fn into_inner(mut self) -> StateMachine<'d, PIO, SM> {
        self.sm.set_enable(false);
        self.sm
    }
}

impl<PIO: Instance, const SM: usize> ShiftQueue for PioShiftQueue<'_, PIO, SM> {
    fn push(&mut self, word: u32) {
        let tx = self.sm.tx();
        while !tx.try_push(word) {
            core::hint::spin_loop();
        }
        // reading the stall flag clears it, so a stall left over from the
        // previous group cannot make `is_drained` report early
        let _ = tx.stalled();
    }

    fn is_drained(&mut self) -> bool {
        let tx = self.sm.tx();
        tx.empty() && tx.stalled()
    }
}
