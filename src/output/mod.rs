//! Output formatting for plans and gateway state.
//!
//! - [`terminal`] - Terminal output with colors

mod terminal;

pub use terminal::{
    format_field, observed_lines, plan_lines, print_observed, print_plan, print_report,
};
