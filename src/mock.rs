//! Recording pins and queue shared by the unit tests

use std::sync::{Arc, Mutex};
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::coprocessor::ShiftQueue;
use crate::panel::{BusPins, ControlPins};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Oe,
    A0,
    A1,
    Lat,
    Clk,
    D1,
    D2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Pin(Line, bool),
    Push(u32),
    DrainPoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFault;

impl embedded_hal::digital::Error for PinFault {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<Event>>>);

impl Trace {
    pub fn record(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// Levels written to one line, in order
    pub fn levels(&self, line: Line) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Pin(l, level) if l == line => Some(level),
                _ => None,
            })
            .collect()
    }

    pub fn pushes(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Push(word) => Some(word),
                _ => None,
            })
            .collect()
    }
}

pub struct MockPin {
    line: Line,
    trace: Trace,
    fail: bool,
}

impl MockPin {
    pub fn new(line: Line, trace: &Trace) -> Self {
        Self {
            line,
            trace: trace.clone(),
            fail: false,
        }
    }

    pub fn failing(line: Line, trace: &Trace) -> Self {
        Self {
            fail: true,
            ..Self::new(line, trace)
        }
    }

    fn write(&mut self, level: bool) -> Result<(), PinFault> {
        if self.fail {
            return Err(PinFault);
        }
        self.trace.record(Event::Pin(self.line, level));
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = PinFault;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

/// Queue that records pushes and reports drained after `busy_polls` polls
pub struct MockQueue {
    trace: Trace,
    busy_polls: usize,
    polls_left: usize,
}

impl MockQueue {
    pub fn new(trace: &Trace, busy_polls: usize) -> Self {
        Self {
            trace: trace.clone(),
            busy_polls,
            polls_left: busy_polls,
        }
    }
}

impl ShiftQueue for MockQueue {
    fn push(&mut self, word: u32) {
        self.polls_left = self.busy_polls;
        self.trace.record(Event::Push(word));
    }

    fn is_drained(&mut self) -> bool {
        self.trace.record(Event::DrainPoll);
        if self.polls_left == 0 {
            true
        } else {
            self.polls_left -= 1;
            false
        }
    }
}

pub type MockControl = ControlPins<MockPin, MockPin, MockPin, MockPin>;
pub type MockBus = BusPins<MockPin, MockPin, MockPin>;

pub fn control_pins(trace: &Trace) -> MockControl {
    ControlPins {
        oe: MockPin::new(Line::Oe, trace),
        a0: MockPin::new(Line::A0, trace),
        a1: MockPin::new(Line::A1, trace),
        lat: MockPin::new(Line::Lat, trace),
    }
}

pub fn bus_pins(trace: &Trace) -> MockBus {
    BusPins {
        clk: MockPin::new(Line::Clk, trace),
        d1: MockPin::new(Line::D1, trace),
        d2: MockPin::new(Line::D2, trace),
    }
}
