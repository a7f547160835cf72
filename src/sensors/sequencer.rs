//! Channel sequencer: electrically isolates one sensing column.
//!
//! The LED on a column only behaves as a photodiode when no row is
//! forward-biasing it, so every row goes low first.  The column is then
//! driven high to charge the LED's junction capacitance, and finally
//! floated as an input with both pulls disabled so the ambient-light
//! discharge is the only current path during the settle window.

use log::trace;

use crate::app::ports::{DigitalPort, Level, PinId, PinMode};

/// Isolate column `pin` for sensing.  `rows` are every row drive line of
/// the matrix.
///
/// Does not advance the channel; that happens only after a conversion.
pub fn prepare(hw: &mut impl DigitalPort, rows: &[PinId], pin: PinId) {
    for &row in rows {
        hw.write(row, Level::Low);
    }

    hw.set_mode(pin, PinMode::Output);
    hw.write(pin, Level::High);

    hw.set_mode(pin, PinMode::Input);
    hw.clear_pull(pin);

    trace!("sequencer: GPIO{} isolated for sensing", pin.0);
}
