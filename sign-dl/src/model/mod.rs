//! Model definitions.

mod classifier;
mod mobilenet;

pub use classifier::*;
pub use mobilenet::*;
