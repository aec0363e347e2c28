//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use image::{imageops::FilterType, DynamicImage, RgbImage};
pub use itertools::Itertools;
pub use ndarray::{s, Array3};
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    fmt::Debug,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
pub use tch::{
    nn::{self, ModuleT, OptimizerConfig as _},
    Device, IndexOp, Kind, Tensor,
};
