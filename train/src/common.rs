//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use chrono::{DateTime, Local};
pub use itertools::Itertools;
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng, seq::SliceRandom};
pub use serde::{Deserialize, Serialize};
pub use sign_dl::{
    dataset::{random_split, GtsrbDataset, RandomAccessDataset, Subset},
    metrics::Accuracy,
    model::{Classifier, MobileNetV2, MobileNetV2Init},
    transform::{Transform, TransformInit},
};
pub use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
pub use structopt::StructOpt;
pub use tch::{
    nn::{self, ModuleT, OptimizerConfig as _},
    Device, Kind, Tensor,
};
pub use tracing::{info, warn};
