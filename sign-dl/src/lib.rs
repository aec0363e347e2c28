//! Traffic sign classification library for the sign-dl project.

pub mod common;
pub mod dataset;
pub mod metrics;
pub mod model;
pub mod transform;
