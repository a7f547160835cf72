//! Matrix light sensor library.
//!
//! Measures ambient light through the LEDs of a multiplexed display matrix,
//! interleaved with normal display refresh.  Exposes the pure-logic modules
//! for integration testing.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod pins;
pub mod scheduler;
pub mod sensors;
