//! The refresh loop.
//!
//! Each [`RefreshLoop::step`] shows the next row group:
//!
//! 1. advance the address (1, 2, 3, 0, 1, ...)
//! 2. push the group's 48 words to the coprocessor queue
//! 3. wait for the queue to drain, or count an early latch ([`LatchSync`])
//! 4. OE high
//! 5. drive A0 / A1
//! 6. pulse LAT
//! 7. OE low
//!
//! The new data is shifted in while the previous group is still lit, so the
//! panel is only dark for the few pin writes between steps 4 and 7.
//!
//! [`RefreshLoop::run`] repeats this until a [`StopFlag`] is raised, also
//! while it sits in the drain wait. The loop never allocates; the only
//! blocking points are a full queue and the drain wait.

use bitfield::bitfield;
use embedded_hal::digital::{OutputPin, PinState};
use portable_atomic::{AtomicBool, Ordering};

use crate::config::LatchSync;
use crate::coprocessor::ShiftQueue;
use crate::error::Error;
use crate::panel::ControlPins;
use crate::scan::ScanReader;
use crate::ADDRESS_LINES;

bitfield! {
    /// Row address as driven on A0 / A1.
    ///
    /// The bit layout is as follows:
    /// - Bit 0: A0
    /// - Bit 1: A1
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct RowAddress(u8);
    impl Debug;
    /// Level of A0
    pub a0, set_a0: 0;
    /// Level of A1
    pub a1, set_a1: 1;
}

impl RowAddress {
    /// Address `value`, wrapped into `0..4`
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value % ADDRESS_LINES as u8)
    }

    /// Numeric address
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The address that follows this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self::new(self.0 + 1)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RowAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "RowAddress({})", self.0);
    }
}

/// Signal to end [`RefreshLoop::run`]
///
/// Can live in a `static`; raise it from any context.
#[derive(Debug, Default)]
pub struct StopFlag(AtomicBool);

impl StopFlag {
    /// A lowered flag
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Ask the loop to stop after its current step
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`stop`](Self::stop) has been called
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Lower the flag again so a loop can be restarted
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Counters kept by the refresh loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshStats {
    /// Completed steps (one row group each)
    pub cycles: u32,
    /// Steps that latched before the queue had drained.
    ///
    /// Only counted with [`LatchSync::Assume`]; stays zero with
    /// [`LatchSync::WaitDrained`].
    pub early_latches: u32,
}

/// Streams the latest scan table to the panel, one row group per step
pub struct RefreshLoop<'a, Q, OE, A0, A1, LAT> {
    control: ControlPins<OE, A0, A1, LAT>,
    queue: Q,
    reader: ScanReader<'a>,
    address: RowAddress,
    latch_sync: LatchSync,
    stats: RefreshStats,
}

impl<'a, Q, OE, A0, A1, LAT, E> RefreshLoop<'a, Q, OE, A0, A1, LAT>
where
    Q: ShiftQueue,
    OE: OutputPin<Error = E>,
    A0: OutputPin<Error = E>,
    A1: OutputPin<Error = E>,
    LAT: OutputPin<Error = E>,
{
    /// Build a loop from pins and a running coprocessor queue.
    ///
    /// Usually obtained through [`Panel::activate`](crate::panel::Panel::activate).
    /// The first step shows address 1.
    pub fn new(
        control: ControlPins<OE, A0, A1, LAT>,
        queue: Q,
        reader: ScanReader<'a>,
        latch_sync: LatchSync,
    ) -> Self {
        Self {
            control,
            queue,
            reader,
            address: RowAddress::new(0),
            latch_sync,
            stats: RefreshStats::default(),
        }
    }

    /// Address shown by the most recent step
    pub fn address(&self) -> RowAddress {
        self.address
    }

    /// Counters since construction
    pub fn stats(&self) -> RefreshStats {
        self.stats
    }

    /// Show the next row group and return its address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if a control line fails to switch. The loop can
    /// be stepped again afterwards.
    pub fn step(&mut self) -> Result<u8, Error<E>> {
        self.show(None)?;
        Ok(self.address.value())
    }

    /// Step until `stop` is raised.
    ///
    /// The flag is checked before each step and on every poll of the drain
    /// wait, so a queue that never drains cannot hold the loop. A step cut
    /// short there leaves the pins untouched and is not counted.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first pin error.
    pub fn run(&mut self, stop: &StopFlag) -> Result<(), Error<E>> {
        info!("refresh: loop started");
        while !stop.is_stopped() {
            if !self.show(Some(stop))? {
                break;
            }
        }
        info!(
            "refresh: loop stopped after {} cycles, {} early latches",
            self.stats.cycles,
            self.stats.early_latches
        );
        Ok(())
    }

    /// One step; `false` if `stop` was raised while waiting for the drain.
    fn show(&mut self, stop: Option<&StopFlag>) -> Result<bool, Error<E>> {
        self.address = self.address.next();

        let group = self.reader.latest().group(usize::from(self.address.value()));
        for &word in group.words() {
            self.queue.push(u32::from(word));
        }

        match self.latch_sync {
            LatchSync::WaitDrained => {
                while !self.queue.is_drained() {
                    if stop.is_some_and(StopFlag::is_stopped) {
                        warn!("refresh: stopped while waiting for the queue to drain");
                        return Ok(false);
                    }
                    core::hint::spin_loop();
                }
            }
            LatchSync::Assume => {
                if !self.queue.is_drained() {
                    self.stats.early_latches = self.stats.early_latches.wrapping_add(1);
                }
            }
        }

        self.control.oe.set_high()?;
        self.control.a0.set_state(PinState::from(self.address.a0()))?;
        self.control.a1.set_state(PinState::from(self.address.a1()))?;
        self.control.lat.set_high()?;
        self.control.lat.set_low()?;
        self.control.oe.set_low()?;

        self.stats.cycles = self.stats.cycles.wrapping_add(1);
        Ok(true)
    }

    /// Tear the loop down, returning the control pins and the queue
    pub fn release(self) -> (ControlPins<OE, A0, A1, LAT>, Q) {
        (self.control, self.queue)
    }
}

#[cfg(any(test, feature = "std"))]
pub use task::RefreshTask;

#[cfg(any(test, feature = "std"))]
mod task {
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    use embedded_hal::digital::OutputPin;

    use super::{RefreshLoop, StopFlag};
    use crate::coprocessor::ShiftQueue;
    use crate::error::Error;

    type Finished<Q, OE, A0, A1, LAT, E> =
        Result<RefreshLoop<'static, Q, OE, A0, A1, LAT>, Error<E>>;

    /// A [`RefreshLoop`] running on its own thread
    pub struct RefreshTask<Q, OE, A0, A1, LAT, E> {
        stop: Arc<StopFlag>,
        handle: JoinHandle<Finished<Q, OE, A0, A1, LAT, E>>,
    }

    impl<Q, OE, A0, A1, LAT, E> RefreshTask<Q, OE, A0, A1, LAT, E>
    where
        Q: ShiftQueue + Send + 'static,
        OE: OutputPin<Error = E> + Send + 'static,
        A0: OutputPin<Error = E> + Send + 'static,
        A1: OutputPin<Error = E> + Send + 'static,
        LAT: OutputPin<Error = E> + Send + 'static,
        E: Send + 'static,
    {
        /// Start `refresh` on a new thread.
        ///
        /// The loop must read from a `'static` shared table, for example one
        /// held in a `static`.
        pub fn spawn(mut refresh: RefreshLoop<'static, Q, OE, A0, A1, LAT>) -> Self {
            let stop = Arc::new(StopFlag::new());
            let flag = Arc::clone(&stop);
            let handle = thread::spawn(move || {
                refresh.run(&flag)?;
                Ok(refresh)
            });
            Self { stop, handle }
        }

        /// Ask the loop to stop after its current step
        pub fn stop(&self) {
            self.stop.stop();
        }

        /// Whether the thread has exited, either stopped or failed
        pub fn is_finished(&self) -> bool {
            self.handle.is_finished()
        }

        /// Stop the loop and wait for the thread.
        ///
        /// Returns the loop so the pins can be reclaimed.
        ///
        /// # Errors
        ///
        /// Returns the pin error that ended the loop early.
        ///
        /// # Panics
        ///
        /// Resumes the panic if the refresh thread panicked.
        pub fn join(self) -> Finished<Q, OE, A0, A1, LAT, E> {
            self.stop.stop();
            match self.handle.join() {
                Ok(finished) => finished,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    }
}
