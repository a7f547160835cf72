//! GPIO pin assignments for the matrix display board.
//!
//! Single source of truth: the display and the light sensor both reference
//! this module rather than hard-coding pin numbers.
//!
//! The 5×5 visible matrix is wired electrically as 3 rows × 9 columns.
//! Columns are the LED cathodes; the first three sit on ADC1-capable GPIOs
//! so they double as light-sensing sites:
//!
//! ```text
//!  ___________________
//! | 1 |   | 2 |   | 3 |
//! |___|___|___|___|___|
//! |   |   |   |   |   |
//! |___|___|___|___|___|
//! | 2 |   | 3 |   | 1 |
//! |___|___|___|___|___|
//! |   |   |   |   |   |
//! |___|___|___|___|___|
//! | 3 |   | 1 |   | 2 |
//! |___|___|___|___|___|
//! ```
//!
//! Each number is the sensing channel whose column drives that LED.

use crate::app::ports::PinId;

// ---------------------------------------------------------------------------
// Matrix rows (anodes, digital only)
// ---------------------------------------------------------------------------

pub const ROW_GPIOS: [PinId; 3] = [PinId(35), PinId(36), PinId(37)];

// ---------------------------------------------------------------------------
// Matrix columns (cathodes)
// ---------------------------------------------------------------------------

/// ESP32-S3 GPIO1..GPIO9 map to ADC1 channels 0..8.
pub const COLUMN_GPIOS: [PinId; 9] = [
    PinId(1),
    PinId(2),
    PinId(3),
    PinId(4),
    PinId(5),
    PinId(6),
    PinId(7),
    PinId(8),
    PinId(9),
];

/// Board mapping from logical sensing channel to physical pins.
#[derive(Debug, Clone, Copy)]
pub struct MatrixMap {
    /// Row drive lines, all driven low while a column is sensed.
    pub rows: &'static [PinId],
    /// Column lines; sensing channel `c` uses `columns[c]`.
    pub columns: &'static [PinId],
}

impl MatrixMap {
    /// Mapping for the production board.
    pub const fn board() -> Self {
        Self {
            rows: &ROW_GPIOS,
            columns: &COLUMN_GPIOS,
        }
    }

    /// Column pin for a sensing channel, if the board has one.
    pub fn sense_pin(&self, channel: usize) -> Option<PinId> {
        self.columns.get(channel).copied()
    }
}

impl Default for MatrixMap {
    fn default() -> Self {
        Self::board()
    }
}
