//! Terminal output helpers
//!
//! Interactive terminals get colors and a spinner; CI and pipes get plain
//! bracketed prefixes so output stays greppable.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, section, step_error, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
