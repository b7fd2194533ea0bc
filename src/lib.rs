#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! Driver for character LCD modules built around the ST7036 controller, like the
//! [DOGM163] from the DOG-LCD family, connected via SPI plus a register select line.
//! It requires a SPI device implementing [`embedded_hal::spi::SpiDevice`], an
//! [`embedded_hal::digital::OutputPin`] for the register select (RS) line and an
//! instance to delay execution with [`embedded_hal::delay::DelayNs`].
//!
//! The controller is timing sensitive: build the SPI bus with [`SPI_FREQUENCY_HZ`] and
//! [`SPI_MODE`]. Faster clocks lose bits.
//!
//! Usage:
//! ```ignore
//! let mut lcd = st7036::sync_lcd::Lcd::new(spi, register_select, delay)
//!     .with_rows(3)
//!     .with_columns(16)
//!     .with_reset_pin(reset)
//!     .init()?;
//!
//! lcd.write("Hello")?;
//! lcd.set_cursor_position(0, 1)?;
//! lcd.create_animation(0, &HEART, 4)?;
//!
//! loop {
//!     lcd.update_animations(clock.now())?;
//! }
//! ```
//!
//! Every call is sent to the device immediately, there is no framebuffer.
//!
//! [DOGM163]: https://www.lcd-module.de/eng/pdf/doma/dog-me.pdf

#[macro_use]
mod fmt;

pub mod animation;
mod error;
mod state;
pub mod sync_lcd;

#[cfg(feature = "async")]
pub mod async_lcd;

#[cfg(feature = "std")]
pub mod worker;

#[cfg(test)]
mod testing_device;

use core::marker::PhantomData;

pub use animation::{Glyph, MAX_ANIMATION_FRAMES, SLOTS};
pub use error::Error;

/// SPI clock the controller is driven with.
pub const SPI_FREQUENCY_HZ: u32 = 1_000_000;

/// SPI mode the controller is driven with.
pub const SPI_MODE: embedded_hal::spi::Mode = embedded_hal::spi::MODE_0;

/// Display mode bits, OR'd onto the display control opcode.
pub enum DisplayControl {
    Off = 0x00,
    CursorBlink = 0x01,
    CursorOn = 0x02,
    DisplayOn = 0x04,
}

/// Instruction table selected by the low bits of the function set byte.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InstructionSet {
    Normal = 0x00,
    Extended = 0x01,
    DoubleHeight = 0x02,
}

/// Bias ratio of the LCD voltage generator.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bias {
    OneFifth = 0x00,
    OneQuarter = 0x08,
}

/// Which half of the screen shows the double height line.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DoubleHeightPosition {
    Bottom = 0x00,
    Top = 0x08,
}

#[repr(u8)]
#[derive(Copy, Clone)]
enum Mode {
    EntrySet = 0x04,
    DisplayControl = 0x08,
    CGRAMAddr = 0x40,
    DDRAMAddr = 0x80,
}

enum Commands {
    Clear = 0x01,
    ShiftCursorLeft = 0x10,
    ShiftCursorRight = 0x10 | 0x04,
    ShiftDisplayLeft = 0x10 | 0x08,
    ShiftDisplayRight = 0x10 | 0x08 | 0x04,
}

/// Commands only understood with [`InstructionSet::Extended`] selected.
enum ExtendedCommands {
    BiasSet = 0x14,
    PowerIconContrast = 0x54,
    FollowerControl = 0x6B,
    ContrastSet = 0x70,
}

/// Command only understood with [`InstructionSet::DoubleHeight`] selected.
const DOUBLE_HEIGHT_POSITION: u8 = 0x10;

#[repr(u8)]
#[derive(Copy, Clone)]
enum CursorMoveDir {
    LeftToRight = 0x02,
}

#[repr(u8)]
#[derive(Copy, Clone)]
enum DisplayShift {
    Off = 0x00,
}

/// Bit of the function set byte enabling double height characters.
const DOUBLE_HEIGHT_BIT: u8 = 0x04;

/// Settle time after an instruction set select or command byte.
const COMMAND_DELAY_US: u32 = 60;
/// Settle time after a data byte.
const DATA_DELAY_US: u32 = 100;
/// Clear and DDRAM address changes need at least 1.08 ms.
const LONG_DELAY_US: u32 = 1_500;
/// Length of each half of the reset pulse.
const RESET_DELAY_MS: u32 = 1;

/// Output pin standing in for an unconnected reset line.
///
/// Carries the error type of the register select pin so both can share one
/// [`Error`] type.
#[derive(Debug, Clone, Copy)]
pub struct NoPin<E>(PhantomData<E>);

impl<E> NoPin<E> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for NoPin<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: embedded_hal::digital::Error> embedded_hal::digital::ErrorType for NoPin<E> {
    type Error = E;
}

impl<E: embedded_hal::digital::Error> embedded_hal::digital::OutputPin for NoPin<E> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
