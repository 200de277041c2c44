//! Small shared helpers.

pub mod timezone;
