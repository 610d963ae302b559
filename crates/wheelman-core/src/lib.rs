//! Core types, config, and errors for Wheelman.

pub mod config;
pub mod error;
pub mod version;

pub use error::{Result, WheelmanError};
pub use version::BrowserVersion;
