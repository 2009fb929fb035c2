//! Platform backends.
//!
//! This module contains implementations of the speech and location platform
//! traits.
//!
//! # Available Backends
//!
//! Enable backends via Cargo features:
//! - `simulated` - virtual-time speech and a scripted location route, for demos and host-less runs

#[cfg(feature = "simulated")]
pub mod simulated;
