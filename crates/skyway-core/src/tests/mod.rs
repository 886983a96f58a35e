//! Cross-module tests for the movement engine.
//!
//! - `helpers.rs`: the [`Harness`](helpers::Harness) every test module builds on
//! - `integration.rs`: end-to-end scenarios through the airspace
//! - `determinism.rs`: same seed, same run
//! - `properties.rs`: proptest checks of engine invariants

pub mod helpers;

mod determinism;
mod properties;
