//! # Core Runtime Module
//!
//! Ambient infrastructure shared by the audio session crates:
//! - Logging and tracing setup
//! - Configuration and capability validation
//! - Playback lifecycle event bus
//!
//! ## Overview
//!
//! Nothing in here knows about playback state. The session store in
//! `core-playback` consumes these pieces; hosts use them to bootstrap.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
