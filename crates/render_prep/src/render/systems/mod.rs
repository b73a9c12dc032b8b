//! Render systems
//!
//! - `lighting`: light definitions
//! - `shadows`: per-light shadow map resource tracking

pub mod lighting;
pub mod shadows;
