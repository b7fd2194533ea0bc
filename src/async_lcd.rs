//! Async flavour of [`crate::sync_lcd`], on top of `embedded-hal-async`.

use core::time::Duration;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{self, SpiDevice};

use crate::animation::{glyph, Animation, Glyph, SLOTS};
use crate::state::{cgram_address, contrast_commands, ddram_address, State, MAX_CONTRAST};
use crate::{
    Bias, Commands, DoubleHeightPosition, Error, InstructionSet, NoPin, COMMAND_DELAY_US,
    DATA_DELAY_US, LONG_DELAY_US, RESET_DELAY_MS,
};

/// Error type of an [`Lcd`] built from SPI device `S` and register select pin `RS`.
pub type LcdError<S, RS> =
    Error<<S as spi::ErrorType>::Error, <RS as digital::ErrorType>::Error>;

/// API to write to the LCD.
pub struct Lcd<S, RS, RST, D>
where
    S: SpiDevice,
    RS: OutputPin,
    RST: OutputPin<Error = RS::Error>,
    D: DelayNs,
{
    spi: S,
    register_select: RS,
    reset: Option<RST>,
    delay: D,
    state: State,
}

impl<S, RS, D> Lcd<S, RS, NoPin<RS::Error>, D>
where
    S: SpiDevice,
    RS: OutputPin,
    D: DelayNs,
{
    /// Create new instance with the SPI device, the register select pin and the delay.
    ///
    /// The SPI device has to run at [`crate::SPI_FREQUENCY_HZ`].
    pub fn new(spi: S, register_select: RS, delay: D) -> Self {
        Self {
            spi,
            register_select,
            reset: None,
            delay,
            state: State::default(),
        }
    }

    /// Pin wired to the reset input of the controller, pulsed during [`Lcd::init`].
    pub fn with_reset_pin<RST>(self, reset: RST) -> Lcd<S, RS, RST, D>
    where
        RST: OutputPin<Error = RS::Error>,
    {
        Lcd {
            spi: self.spi,
            register_select: self.register_select,
            reset: Some(reset),
            delay: self.delay,
            state: self.state,
        }
    }
}

impl<S, RS, RST, D> Lcd<S, RS, RST, D>
where
    S: SpiDevice,
    RS: OutputPin,
    RST: OutputPin<Error = RS::Error>,
    D: DelayNs,
{
    /// Number of rows, 1 to 3.
    pub fn with_rows(mut self, rows: u8) -> Self {
        self.state.rows = rows;
        self
    }

    pub fn with_columns(mut self, columns: u8) -> Self {
        self.state.columns = columns;
        self
    }

    /// Fixed high bits of every function set byte, `0b0011_1000` (8 bit, 2 line
    /// addressing) unless the module is wired differently.
    pub fn with_instruction_set_template(mut self, template: u8) -> Self {
        self.state.instruction_set_template = template;
        self
    }

    /// Contrast programmed by [`Lcd::init`], 0 to 63.
    pub fn with_contrast(mut self, contrast: u8) -> Self {
        self.state.contrast = contrast;
        self
    }

    pub fn with_bias(mut self, bias: Bias) -> Self {
        self.state.bias = bias;
        self
    }

    pub fn with_cursor_on(mut self, on: bool) -> Self {
        self.state.cursor_on = on;
        self
    }

    pub fn with_cursor_blink(mut self, blink: bool) -> Self {
        self.state.cursor_blink = blink;
        self
    }

    /// Initializes the hardware.
    ///
    /// Pulses the reset line if there is one, then sends display mode, entry mode,
    /// bias, contrast and clear, in this order. Any other order leaves the glyphs and
    /// the cursor in an undefined state.
    pub async fn init(mut self) -> Result<Self, LcdError<S, RS>> {
        if !self.state.validate_geometry() {
            return Err(Error::Configuration);
        }
        if self.state.contrast > MAX_CONTRAST {
            return Err(Error::OutOfRange);
        }
        debug!("init st7036 {}x{}", self.state.columns, self.state.rows);

        // Data mode at rest.
        self.register_select.set_high().map_err(Error::pin)?;
        self.reset().await?;

        self.update_display_mode().await?;
        self.send_command(self.state.entry_mode(), InstructionSet::Normal).await?;
        self.set_bias(self.state.bias).await?;
        self.set_contrast(self.state.contrast).await?;
        self.clear().await?;
        Ok(self)
    }

    /// Gives back the bus, the pins and the delay.
    pub fn release(self) -> (S, RS, Option<RST>, D) {
        (self.spi, self.register_select, self.reset, self.delay)
    }

    pub fn rows(&self) -> u8 {
        self.state.rows
    }

    pub fn columns(&self) -> u8 {
        self.state.columns
    }

    /// Hardware reset pulse, does nothing without a reset pin.
    pub async fn reset(&mut self) -> Result<(), LcdError<S, RS>> {
        if let Some(reset) = self.reset.as_mut() {
            trace!("reset pulse");
            reset.set_low().map_err(Error::pin)?;
            self.delay.delay_ms(RESET_DELAY_MS).await;
            reset.set_high().map_err(Error::pin)?;
            self.delay.delay_ms(RESET_DELAY_MS).await;
        }
        Ok(())
    }

    async fn write_instruction_set(
        &mut self,
        instruction_set: InstructionSet,
    ) -> Result<(), LcdError<S, RS>> {
        self.register_select.set_low().map_err(Error::pin)?;
        self.spi
            .write(&[self.state.function_set(instruction_set)])
            .await
            .map_err(Error::bus)?;
        self.delay.delay_us(COMMAND_DELAY_US).await;
        Ok(())
    }

    /// Sends `value` with `instruction_set` selected. The controller forgets the
    /// instruction set between commands, so it is selected again every time.
    async fn send_command(
        &mut self,
        value: u8,
        instruction_set: InstructionSet,
    ) -> Result<(), LcdError<S, RS>> {
        self.write_instruction_set(instruction_set).await?;
        self.spi.write(&[value]).await.map_err(Error::bus)?;
        self.delay.delay_us(COMMAND_DELAY_US).await;
        Ok(())
    }

    async fn send_char(&mut self, value: u8) -> Result<(), LcdError<S, RS>> {
        self.register_select.set_high().map_err(Error::pin)?;
        self.spi.write(&[value]).await.map_err(Error::bus)?;
        self.delay.delay_us(DATA_DELAY_US).await;
        Ok(())
    }

    /// Write string to display.
    ///
    /// Characters map 1:1 to the controller's character table, so only code points up
    /// to 255 are accepted; 0 to 7 show the custom glyphs.
    pub async fn write(&mut self, data: &str) -> Result<(), LcdError<S, RS>> {
        if data.chars().any(|c| u32::from(c) > 0xFF) {
            return Err(Error::OutOfRange);
        }
        for c in data.chars() {
            self.send_char(u32::from(c) as u8).await?;
        }
        Ok(())
    }

    /// Write raw character codes to display.
    pub async fn write_bytes(&mut self, data: &[u8]) -> Result<(), LcdError<S, RS>> {
        for byte in data {
            self.send_char(*byte).await?;
        }
        Ok(())
    }

    /// Clear the display and move the cursor to (0, 0).
    pub async fn clear(&mut self) -> Result<(), LcdError<S, RS>> {
        self.send_command(Commands::Clear as u8, InstructionSet::Normal).await?;
        self.delay.delay_us(LONG_DELAY_US).await;
        self.home().await
    }

    /// Return cursor to upper left corner, i.e. (0,0).
    pub async fn home(&mut self) -> Result<(), LcdError<S, RS>> {
        self.set_cursor_position(0, 0).await
    }

    /// Set the cursor to a raw DDRAM address.
    pub async fn set_cursor_offset(&mut self, offset: u8) -> Result<(), LcdError<S, RS>> {
        if offset > 0x7F {
            return Err(Error::OutOfRange);
        }
        self.send_command(ddram_address(offset), InstructionSet::Normal).await
    }

    /// Set the cursor to (column, row). Coordinates are zero-based.
    pub async fn set_cursor_position(
        &mut self,
        column: u8,
        row: u8,
    ) -> Result<(), LcdError<S, RS>> {
        let offset = self.state.offset(column, row).ok_or(Error::OutOfRange)?;
        self.set_cursor_offset(offset).await?;
        self.delay.delay_us(LONG_DELAY_US).await;
        Ok(())
    }

    /// Set the contrast, 0 to 63.
    pub async fn set_contrast(&mut self, contrast: u8) -> Result<(), LcdError<S, RS>> {
        if contrast > MAX_CONTRAST {
            return Err(Error::OutOfRange);
        }
        for command in contrast_commands(contrast) {
            self.send_command(command, InstructionSet::Extended).await?;
        }
        self.state.contrast = contrast;
        Ok(())
    }

    pub async fn set_bias(&mut self, bias: Bias) -> Result<(), LcdError<S, RS>> {
        self.state.bias = bias;
        self.send_command(self.state.bias_set(), InstructionSet::Extended).await
    }

    /// Set display, cursor and blink flags at once.
    pub async fn set_display_mode(
        &mut self,
        enabled: bool,
        cursor_on: bool,
        cursor_blink: bool,
    ) -> Result<(), LcdError<S, RS>> {
        self.state.enabled = enabled;
        self.state.cursor_on = cursor_on;
        self.state.cursor_blink = cursor_blink;
        self.update_display_mode().await
    }

    /// Sends the configured display mode flags.
    async fn update_display_mode(&mut self) -> Result<(), LcdError<S, RS>> {
        self.send_command(self.state.display_control(), InstructionSet::Normal).await
    }

    // Set the cursor visibility
    pub async fn enable_cursor(&mut self, on: bool) -> Result<(), LcdError<S, RS>> {
        self.state.cursor_on = on;
        self.update_display_mode().await
    }

    // Set if the cursor is blinking
    pub async fn enable_blink(&mut self, blink: bool) -> Result<(), LcdError<S, RS>> {
        self.state.cursor_blink = blink;
        self.update_display_mode().await
    }

    /// Switch double height characters on or off, shown in the `position` half.
    pub async fn set_double_height(
        &mut self,
        enabled: bool,
        position: DoubleHeightPosition,
    ) -> Result<(), LcdError<S, RS>> {
        self.state.double_height = enabled;
        let command = self.state.double_height_position(position);
        self.send_command(command, InstructionSet::DoubleHeight).await
    }

    /// Scrolls the display one char to the left
    pub async fn scroll_display_left(&mut self) -> Result<(), LcdError<S, RS>> {
        self.send_command(Commands::ShiftDisplayLeft as u8, InstructionSet::Normal).await
    }

    /// Scrolls the display one char to the right
    pub async fn scroll_display_right(&mut self) -> Result<(), LcdError<S, RS>> {
        self.send_command(Commands::ShiftDisplayRight as u8, InstructionSet::Normal).await
    }

    /// Scrolls the cursor one char to the left
    pub async fn scroll_cursor_left(&mut self) -> Result<(), LcdError<S, RS>> {
        self.send_command(Commands::ShiftCursorLeft as u8, InstructionSet::Normal).await
    }

    /// Scrolls the cursor one char to the right
    pub async fn scroll_cursor_right(&mut self) -> Result<(), LcdError<S, RS>> {
        self.send_command(Commands::ShiftCursorRight as u8, InstructionSet::Normal).await
    }

    /// Program custom character `slot` (0 to 7) with an 8 byte bitmap, one byte per
    /// row. Print it by writing the character code `slot`.
    pub async fn create_char(
        &mut self,
        slot: usize,
        bitmap: &[u8],
    ) -> Result<(), LcdError<S, RS>> {
        if slot >= SLOTS {
            return Err(Error::OutOfRange);
        }
        let glyph = glyph(bitmap).ok_or(Error::InvalidBitmap)?;
        self.state.animations.forget_shown(slot);
        self.program_glyph(slot, &glyph).await
    }

    async fn program_glyph(
        &mut self,
        slot: usize,
        glyph: &Glyph,
    ) -> Result<(), LcdError<S, RS>> {
        let base = slot as u8 * 8;
        for (row, bits) in (0u8..).zip(glyph.iter()) {
            self.send_command(cgram_address(base + row), InstructionSet::Normal).await?;
            self.send_char(*bits).await?;
        }
        // The address counter is in CGRAM now, point it back at the screen.
        self.home().await?;
        self.update_display_mode().await
    }

    /// Cycle custom character `slot` through `frames` at `frame_rate` frames per second.
    ///
    /// The first frame is programmed right away, the rest by
    /// [`Lcd::update_animations`]. Replaces any animation running in `slot`.
    pub async fn create_animation<F>(
        &mut self,
        slot: usize,
        frames: F,
        frame_rate: u32,
    ) -> Result<(), LcdError<S, RS>>
    where
        F: IntoIterator,
        F::Item: AsRef<[u8]>,
    {
        if slot >= SLOTS {
            return Err(Error::OutOfRange);
        }
        let animation = Animation::new(frames, frame_rate).ok_or(Error::InvalidBitmap)?;
        trace!("animation in slot {}", slot);
        let first = animation.frames()[0];
        // A half written glyph must not count as the frame shown.
        self.state.animations.forget_shown(slot);
        self.program_glyph(slot, &first).await?;
        self.state.animations.insert(slot, animation);
        Ok(())
    }

    /// Program the frame due at `now` into every animated slot.
    ///
    /// `now` is wall clock time, the frame is picked from it alone. Call this from your
    /// own loop as often as the fastest animation needs. Slots already showing the due
    /// frame are not rewritten.
    pub async fn update_animations(&mut self, now: Duration) -> Result<(), LcdError<S, RS>> {
        for slot in 0..SLOTS {
            if let Some((index, frame)) = self.state.animations.pending(slot, now) {
                self.program_glyph(slot, &frame).await?;
                self.state.animations.mark_shown(slot, index);
            }
        }
        Ok(())
    }

    /// [`Lcd::update_animations`] with the system clock.
    #[cfg(feature = "std")]
    pub async fn update_animations_now(&mut self) -> Result<(), LcdError<S, RS>> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        self.update_animations(now).await
    }
}
