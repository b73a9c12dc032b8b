//! Lighting system
//!
//! Light definitions and per-frame resolved light state.

pub mod lighting;

pub use lighting::*;
