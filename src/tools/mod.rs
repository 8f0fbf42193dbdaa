//! Tools module - toolkits agents can register.
//!
//! - Calculator: `add_numbers`, `subtract_numbers`

pub mod calculator;

pub use calculator::{calculator_toolkit, AddNumbersTool, SubtractNumbersTool};
