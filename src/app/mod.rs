//! Application core: sensing logic behind port traits, zero direct I/O.
//!
//! All interaction with hardware happens through the **port traits**
//! defined in [`ports`], keeping the sensing core fully testable without
//! real peripherals.  [`service`] is the main-loop facade.

pub mod ports;
pub mod service;
