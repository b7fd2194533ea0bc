//! Recording fakes for the SPI bus, the output pins and the delay.
//!
//! All of them append to one shared [`Log`], so a test can check the order of pin
//! changes, bytes and settle times exactly as the controller would see them.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::spi::{ErrorKind, Operation};

#[cfg(feature = "async")]
pub fn block_on<F: core::future::Future>(f: F) -> F::Output {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    RegisterSelect(bool),
    Reset(bool),
    Byte(u8),
    DelayNs(u64),
}

/// A decoded controller transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    /// Instruction set select byte followed by the command, both with RS low.
    Command { set: u8, value: u8 },
    /// One byte with RS high.
    Data(u8),
}

#[derive(Debug, Clone, Default)]
pub struct Log(Rc<RefCell<Vec<Event>>>);

impl Log {
    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Pairs up command bytes and splits out data bytes. Panics on a byte sent before
    /// the register select line was driven, or on a dangling instruction set select.
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut out = Vec::new();
        let mut data_mode = None;
        let mut pending_set = None;
        for event in self.events() {
            match event {
                Event::RegisterSelect(high) => data_mode = Some(high),
                Event::Byte(byte) => match data_mode.expect("byte sent before RS was driven") {
                    true => {
                        assert!(pending_set.is_none(), "data byte inside a command");
                        out.push(Transaction::Data(byte));
                    }
                    false => match pending_set.take() {
                        None => pending_set = Some(byte),
                        Some(set) => out.push(Transaction::Command { set, value: byte }),
                    },
                },
                _ => {}
            }
        }
        assert!(pending_set.is_none(), "instruction set select without command");
        out
    }

    /// Commands only, as `(set, value)`.
    pub fn commands(&self) -> Vec<(u8, u8)> {
        self.transactions()
            .into_iter()
            .filter_map(|t| match t {
                Transaction::Command { set, value } => Some((set, value)),
                Transaction::Data(_) => None,
            })
            .collect()
    }

    /// Every byte with the total delay observed before the next byte (or the end).
    pub fn settle_times(&self) -> Vec<(u8, u64)> {
        let mut out: Vec<(u8, u64)> = Vec::new();
        for event in self.events() {
            match event {
                Event::Byte(byte) => out.push((byte, 0)),
                Event::DelayNs(ns) => {
                    if let Some(last) = out.last_mut() {
                        last.1 += ns;
                    }
                }
                _ => {}
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

impl embedded_hal::spi::Error for BusFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// SPI device recording every written byte. Fails once `fail_after` bytes went out.
pub struct FakeSpi {
    log: Log,
    fail_after: Option<usize>,
    written: usize,
}

impl FakeSpi {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            fail_after: None,
            written: 0,
        }
    }

    pub fn failing_after(log: &Log, bytes: usize) -> Self {
        Self {
            fail_after: Some(bytes),
            ..Self::new(log)
        }
    }

    fn record(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BusFault> {
        for op in operations.iter() {
            if let Operation::Write(buf) = op {
                for byte in buf.iter() {
                    if self.fail_after.map_or(false, |n| self.written >= n) {
                        return Err(BusFault);
                    }
                    self.written += 1;
                    self.log.push(Event::Byte(*byte));
                }
            }
        }
        Ok(())
    }
}

impl embedded_hal::spi::ErrorType for FakeSpi {
    type Error = BusFault;
}

impl embedded_hal::spi::SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.record(operations)
    }
}

#[cfg(feature = "async")]
impl embedded_hal_async::spi::SpiDevice for FakeSpi {
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        self.record(operations)
    }
}

#[derive(Debug, Clone, Copy)]
enum Line {
    RegisterSelect,
    Reset,
}

pub struct FakePin {
    log: Log,
    line: Line,
}

impl FakePin {
    pub fn register_select(log: &Log) -> Self {
        Self {
            log: log.clone(),
            line: Line::RegisterSelect,
        }
    }

    pub fn reset(log: &Log) -> Self {
        Self {
            log: log.clone(),
            line: Line::Reset,
        }
    }

    fn set(&mut self, high: bool) {
        self.log.push(match self.line {
            Line::RegisterSelect => Event::RegisterSelect(high),
            Line::Reset => Event::Reset(high),
        });
    }
}

impl embedded_hal::digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

pub struct FakeDelay {
    log: Log,
}

impl FakeDelay {
    pub fn new(log: &Log) -> Self {
        Self { log: log.clone() }
    }
}

impl embedded_hal::delay::DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.push(Event::DelayNs(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        self.log.push(Event::DelayNs(u64::from(us) * 1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.push(Event::DelayNs(u64::from(ms) * 1_000_000));
    }
}

#[cfg(feature = "async")]
impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.log.push(Event::DelayNs(u64::from(ns)));
    }

    async fn delay_us(&mut self, us: u32) {
        self.log.push(Event::DelayNs(u64::from(us) * 1_000));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.log.push(Event::DelayNs(u64::from(ms) * 1_000_000));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::OutputPin;
    use embedded_hal::spi::SpiDevice;

    #[test]
    fn decodes_commands_and_data() {
        let log = Log::default();
        let mut spi = FakeSpi::new(&log);
        let mut rs = FakePin::register_select(&log);
        rs.set_low().unwrap();
        spi.write(&[0x38]).unwrap();
        spi.write(&[0x01]).unwrap();
        rs.set_high().unwrap();
        spi.write(&[b'A']).unwrap();
        assert_eq!(
            log.transactions(),
            [
                Transaction::Command {
                    set: 0x38,
                    value: 0x01
                },
                Transaction::Data(b'A')
            ]
        );
        assert_eq!(log.commands(), [(0x38, 0x01)]);
    }

    #[test]
    fn sums_delays_after_each_byte() {
        let log = Log::default();
        let mut spi = FakeSpi::new(&log);
        let mut delay = FakeDelay::new(&log);
        spi.write(&[1]).unwrap();
        embedded_hal::delay::DelayNs::delay_us(&mut delay, 60);
        embedded_hal::delay::DelayNs::delay_ms(&mut delay, 2);
        spi.write(&[2]).unwrap();
        assert_eq!(log.settle_times(), [(1, 2_060_000), (2, 0)]);
    }

    #[test]
    fn fails_after_budget() {
        let log = Log::default();
        let mut spi = FakeSpi::failing_after(&log, 1);
        assert!(spi.write(&[1]).is_ok());
        assert_eq!(spi.write(&[2]), Err(BusFault));
        assert_eq!(log.events(), [Event::Byte(1)]);
    }
}
