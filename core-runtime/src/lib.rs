//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the streamer:
//! - Logging and tracing setup
//! - Host capability configuration
//! - Shared error type
//!
//! ## Overview
//!
//! Everything here is independent of the audio pipeline itself. The
//! `core-playback` crate depends on it for logging conventions and the
//! capability bundle a session is built from.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
