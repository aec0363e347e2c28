//! Run metrics logging.

use crate::common::*;

pub const TRAIN_LOSS: &str = "train_loss";
pub const TRAIN_ACC: &str = "train_acc";
pub const VALID_LOSS: &str = "valid_loss";
pub const VALID_ACC: &str = "valid_acc";
pub const TEST_ACC: &str = "test_acc";

/// Every metric name the trainer writes to the log. Run-control
/// policies must monitor one of these.
pub const LOGGED_METRICS: [&str; 5] = [TRAIN_LOSS, TRAIN_ACC, VALID_LOSS, VALID_ACC, TEST_ACC];

/// One row of the metrics log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub epoch: usize,
    pub step: usize,
    pub metric: String,
    pub value: f64,
}

/// Row-oriented metrics writer backed by a CSV file under the run
/// directory.
pub struct MetricsLogger {
    writer: csv::Writer<fs::File>,
}

impl Debug for MetricsLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsLogger").finish()
    }
}

impl MetricsLogger {
    pub const FILE_NAME: &'static str = "metrics.csv";

    pub fn new(run_dir: &Path) -> Result<Self> {
        let path = run_dir.join(Self::FILE_NAME);
        let writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create metrics log '{}'", path.display()))?;
        Ok(Self { writer })
    }

    pub fn log(&mut self, epoch: usize, step: usize, metric: &str, value: f64) -> Result<()> {
        self.writer.serialize(MetricRecord {
            epoch,
            step,
            metric: metric.to_owned(),
            value,
        })?;
        self.writer.flush()?;
        Ok(())
    }
}
