//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                  |
//! |------------|--------------|------------------------------|
//! | `hardware` | DigitalPort  | ESP32-S3 GPIO matrix         |
//! |            | AnalogPort   | ADC1 oneshot driver          |
//! | `nvs`      | ConfigPort   | NVS / in-memory store        |
//! |            | StoragePort  |                              |
//!
//! The settle timer lives in [`crate::drivers::hw_timer`].

pub mod hardware;
pub mod nvs;
