//! The training program for the sign-dl project.

pub mod common;
pub mod config;
pub mod data;
pub mod logging;
pub mod trainer;
pub mod utils;
