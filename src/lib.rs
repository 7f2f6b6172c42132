//! Bridges SystemAIR SAVE ventilation units into a home-automation host.
//!
//! Register values reported by the vendor are projected onto a [`state::DeviceState`], from
//! which the [`entity`] module derives sensors, alarm sensors and the ventilation fan.

pub mod api;
pub mod availability;
pub mod commands;
pub mod device;
pub mod entity;
pub mod fan;
pub mod iam2;
pub mod integration;
pub mod output;
pub mod registers;
pub mod state;
pub mod value;
