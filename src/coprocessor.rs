//! Interface to the shift-out coprocessor.
//!
//! The coprocessor is fixed hardware behaviour, not something this crate
//! designs. It accepts 32-bit items through a FIFO and for each one:
//!
//! 1. discards the upper 16 bits,
//! 2. eight times: drives the two most significant remaining bits onto the
//!    data lanes (high bit on D2, low bit on D1) and pulses the clock high
//!    then low.
//!
//! On the RP2040 this is a four-instruction PIO program (see the `rp` module
//! behind the `rp2040` feature) running at [`PIXEL_CLOCK_HZ`]. [`shift_out`]
//! models the same behaviour on the host so wire words can be decoded in
//! tests.

/// Rate at which the coprocessor executes instructions
pub const PIXEL_CLOCK_HZ: u32 = 10_000_000;

/// Lane pairs produced per queued item
pub const PAIRS_PER_ITEM: usize = 8;

/// FIFO feeding the shift-out coprocessor
///
/// Implementations own the clock and both data lines for as long as they exist.
pub trait ShiftQueue {
    /// Enqueue one item, blocking while the FIFO is full.
    ///
    /// Only the low 16 bits reach the panel.
    fn push(&mut self, word: u32);

    /// Returns `true` once every pushed item has been completely shifted out.
    fn is_drained(&mut self) -> bool;
}

impl<Q: ShiftQueue + ?Sized> ShiftQueue for &mut Q {
    fn push(&mut self, word: u32) {
        (**self).push(word);
    }

    fn is_drained(&mut self) -> bool {
        (**self).is_drained()
    }
}

/// The `(D1, D2)` levels the coprocessor clocks out for one item, in order.
pub fn shift_out(word: u32) -> impl Iterator<Item = (bool, bool)> {
    let data = word as u16;
    (0..PAIRS_PER_ITEM).rev().map(move |pair| {
        let bits = (data >> (pair * 2)) & 0b11;
        (bits & 0b01 != 0, bits & 0b10 != 0)
    })
}
