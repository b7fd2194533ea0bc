use core::fmt;

/// Errors returned by the LCD drivers.
///
/// Validation variants are returned before anything is sent to the device, so a
/// rejected call never leaves a half-written transaction behind. Bus and pin errors
/// are passed through untouched and are not retried: re-initialize the display if the
/// controller may have lost track of the instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<SpiE, PinE> {
    /// Unsupported geometry, rows must be 1, 2 or 3 and every row must fit into DDRAM.
    Configuration,
    /// Cursor position, contrast, character slot or character code out of bounds.
    OutOfRange,
    /// Glyph data is not exactly 8 bytes, or an animation has no or too many frames.
    InvalidBitmap,
    /// The SPI transfer failed.
    Bus(SpiE),
    /// Driving the register select or reset line failed.
    Pin(PinE),
}

impl<SpiE, PinE> Error<SpiE, PinE> {
    pub(crate) fn bus(err: SpiE) -> Self {
        Error::Bus(err)
    }

    pub(crate) fn pin(err: PinE) -> Self {
        Error::Pin(err)
    }
}

impl<SpiE: fmt::Debug, PinE: fmt::Debug> fmt::Display for Error<SpiE, PinE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration => f.write_str("unsupported display geometry"),
            Error::OutOfRange => f.write_str("value out of range"),
            Error::InvalidBitmap => f.write_str("invalid glyph bitmap"),
            Error::Bus(e) => write!(f, "spi transfer failed: {:?}", e),
            Error::Pin(e) => write!(f, "output pin failed: {:?}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<SpiE: fmt::Debug, PinE: fmt::Debug> std::error::Error for Error<SpiE, PinE> {}
