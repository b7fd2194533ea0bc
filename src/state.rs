//! Bus independent part of the driver: geometry, flags and the bytes they turn into.
//! Shared by the blocking and the async driver so both emit identical transactions.

use crate::animation::Animations;
use crate::{
    Bias, CursorMoveDir, DisplayControl, DisplayShift, DoubleHeightPosition, ExtendedCommands,
    InstructionSet, Mode, DOUBLE_HEIGHT_BIT, DOUBLE_HEIGHT_POSITION,
};

/// DDRAM start address of every row, indexed by `rows - 1`.
const ROW_OFFSETS: [&[u8]; 3] = [&[0x00], &[0x00, 0x40], &[0x00, 0x10, 0x20]];

/// Widest row each geometry can address, indexed by `rows - 1`. One row gets the
/// whole 80 byte DDRAM, two rows 40 each, and the last of three rows has to end
/// below address 0x80.
const MAX_COLUMNS: [u8; 3] = [80, 40, 40];

pub(crate) const DEFAULT_CONTRAST: u8 = 40;
pub(crate) const MAX_CONTRAST: u8 = 0x3F;
pub(crate) const DEFAULT_INSTRUCTION_SET_TEMPLATE: u8 = 0b0011_1000;

/// Everything the driver remembers about the controller.
#[derive(Debug)]
pub(crate) struct State {
    pub rows: u8,
    pub columns: u8,
    pub instruction_set_template: u8,
    pub contrast: u8,
    pub bias: Bias,
    pub enabled: bool,
    pub cursor_on: bool,
    pub cursor_blink: bool,
    pub double_height: bool,
    pub animations: Animations,
}

impl Default for State {
    fn default() -> Self {
        Self {
            rows: 3,
            columns: 16,
            instruction_set_template: DEFAULT_INSTRUCTION_SET_TEMPLATE,
            contrast: DEFAULT_CONTRAST,
            bias: Bias::OneQuarter,
            enabled: true,
            cursor_on: false,
            cursor_blink: false,
            double_height: false,
            animations: Animations::new(),
        }
    }
}

impl State {
    /// Checks rows and columns before the hardware is touched.
    pub fn validate_geometry(&self) -> bool {
        let rows_ok = (1..=3).contains(&self.rows);
        let columns_ok =
            rows_ok && (1..=MAX_COLUMNS[usize::from(self.rows) - 1]).contains(&self.columns);
        if !rows_ok || !columns_ok {
            warn!("unsupported geometry {}x{}", self.columns, self.rows);
        }
        rows_ok && columns_ok
    }

    /// DDRAM base address of each row.
    pub fn row_offsets(&self) -> &'static [u8] {
        ROW_OFFSETS[usize::from(self.rows.clamp(1, 3)) - 1]
    }

    /// DDRAM address of `(column, row)`, `None` outside the screen.
    pub fn offset(&self, column: u8, row: u8) -> Option<u8> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.row_offsets()
            .get(usize::from(row))
            .map(|base| base + column)
    }

    /// Instruction set select byte preceding every command.
    pub fn function_set(&self, instruction_set: InstructionSet) -> u8 {
        let double_height = if self.double_height {
            DOUBLE_HEIGHT_BIT
        } else {
            0
        };
        self.instruction_set_template | instruction_set as u8 | double_height
    }

    pub fn display_control(&self) -> u8 {
        let mut display_ctrl = if self.enabled {
            DisplayControl::DisplayOn as u8
        } else {
            DisplayControl::Off as u8
        };
        if self.cursor_on {
            display_ctrl |= DisplayControl::CursorOn as u8;
        }
        if self.cursor_blink {
            display_ctrl |= DisplayControl::CursorBlink as u8;
        }
        Mode::DisplayControl as u8 | display_ctrl
    }

    pub fn entry_mode(&self) -> u8 {
        Mode::EntrySet as u8 | CursorMoveDir::LeftToRight as u8 | DisplayShift::Off as u8
    }

    /// Bias set, with the FX bit high for three line displays.
    pub fn bias_set(&self) -> u8 {
        let three_lines = if self.rows == 3 { 0x01 } else { 0x00 };
        ExtendedCommands::BiasSet as u8 | self.bias as u8 | three_lines
    }

    pub fn double_height_position(&self, position: DoubleHeightPosition) -> u8 {
        DOUBLE_HEIGHT_POSITION | position as u8
    }
}

/// The three extended instruction set commands programming `contrast`.
///
/// The booster has to be on for 3.3V operation and shares its command with the two
/// high bits of the contrast.
pub(crate) fn contrast_commands(contrast: u8) -> [u8; 3] {
    [
        ExtendedCommands::PowerIconContrast as u8 | ((contrast >> 4) & 0x03),
        ExtendedCommands::FollowerControl as u8,
        ExtendedCommands::ContrastSet as u8 | (contrast & 0x0F),
    ]
}

pub(crate) fn ddram_address(offset: u8) -> u8 {
    Mode::DDRAMAddr as u8 | (offset & 0x7F)
}

pub(crate) fn cgram_address(address: u8) -> u8 {
    Mode::CGRAMAddr as u8 | (address & 0x3F)
}
