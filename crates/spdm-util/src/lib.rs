//! spdm-util - small building blocks shared by the spdm crates.

pub mod layered;
pub mod lazy_function;
pub mod merge;
pub mod strings;

pub use layered::Envs;
pub use lazy_function::{lazy, CachedProperty, Lazy};
pub use merge::{deep_merge, merged};
pub use strings::{format_template, format_value, format_with, placeholders};
