//! Utility functions for formatting ages, coordinates, and strings.

pub mod format;

pub use format::{format_age, format_coordinates, truncate_string};
