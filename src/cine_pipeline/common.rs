//! Common utilities module
//!
//! This module contains shared utilities used across the cine pipeline.

pub mod cursor;
pub mod error;

pub use cursor::{ByteCursor, Primitive};
pub use error::{ConversionError, Result};
