//! Training program configuration format.
//!
//! Every field has a compiled-in default carrying the standard training
//! recipe, so the program runs without any configuration file.

use crate::common::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub logging: LoggingConfig,
    pub training: TrainingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: Default::default(),
            logging: Default::default(),
            training: Default::default(),
        }
    }
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

/// Dataset options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// The dataset root; index files and image paths are relative to it.
    pub dataset_dir: PathBuf,
    pub train_index: PathBuf,
    pub test_index: PathBuf,
    /// The input spatial resolution after resizing.
    pub image_size: NonZeroUsize,
    pub num_classes: NonZeroUsize,
    /// Fixed partition sizes of the single random train/validation
    /// split; they must sum to the training index length.
    pub train_split: usize,
    pub valid_split: usize,
    /// Number of batch loading worker threads.
    pub num_workers: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("./datasets"),
            train_index: PathBuf::from("Train.csv"),
            test_index: PathBuf::from("Test.csv"),
            image_size: NonZeroUsize::new(32).unwrap(),
            num_classes: NonZeroUsize::new(43).unwrap(),
            train_split: 34209,
            valid_split: 5000,
            num_workers: 4,
        }
    }
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub log_every_n_steps: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            log_every_n_steps: 100,
        }
    }
}

/// The training options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: NonZeroUsize,
    pub max_epochs: usize,
    pub learning_rate: R64,
    pub early_stopping: EarlyStoppingConfig,
    /// Checkpoint file loading method.
    pub load_checkpoint: LoadCheckpoint,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(128).unwrap(),
            max_epochs: 50,
            learning_rate: r64(0.01),
            early_stopping: Default::default(),
            load_checkpoint: LoadCheckpoint::Disabled,
        }
    }
}

/// Early stopping options for the maximized validation metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    pub patience: usize,
    pub min_delta: R64,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience: 3,
            min_delta: r64(0.0),
        }
    }
}

/// Checkpoint file loading method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LoadCheckpoint {
    /// Disable checkpoint file loading.
    Disabled,
    /// Load the most recent checkpoint file under the logging directory.
    FromRecent,
    /// Load the checkpoint file at specified path.
    FromFile { file: PathBuf },
}
