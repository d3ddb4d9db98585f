#![no_std]

// Shared logic for the multi-relay accessory.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing abstractions the other crates can adopt.
pub mod accessory;
pub mod bridge;
pub mod button;
pub mod error;
pub mod hal;
pub mod indicator;
pub mod relay;
pub mod stack;
pub mod status;
pub mod telemetry;
pub mod time;

pub use accessory::{AccessoryConfig, AccessoryStateMachine, Phase, TickReport};
pub use error::{AccessoryError, ConfigurationError, InitError};
