//! Misc utilities.

mod checkpoint;
mod early_stop;

pub use checkpoint::*;
pub use early_stop::*;
