//! String utilities.

mod format;

pub use format::{format_template, format_value, format_with, placeholders};
