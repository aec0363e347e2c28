use crate::common::*;

/// Stops training once a maximized metric stops improving for a number
/// of consecutive epochs.
#[derive(Debug)]
pub struct EarlyStopping {
    monitor: &'static str,
    patience: usize,
    min_delta: f64,
    best: Option<f64>,
    stale_epochs: usize,
}

impl EarlyStopping {
    pub fn max(monitor: &'static str, patience: usize, min_delta: f64) -> Self {
        Self {
            monitor,
            patience,
            min_delta,
            best: None,
            stale_epochs: 0,
        }
    }

    /// The metric name this policy monitors.
    pub fn monitor(&self) -> &'static str {
        self.monitor
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Record the monitored value for one epoch. Returns true when
    /// training should stop.
    pub fn update(&mut self, value: f64) -> bool {
        match self.best {
            Some(best) if value <= best + self.min_delta => {
                self.stale_epochs += 1;
                self.stale_epochs >= self.patience
            }
            _ => {
                self.best = Some(value);
                self.stale_epochs = 0;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_after_patience_exhausted() {
        let mut early_stopping = EarlyStopping::max("valid_acc", 3, 0.0);

        assert!(!early_stopping.update(0.5));
        assert!(!early_stopping.update(0.6));
        assert!(!early_stopping.update(0.6));
        assert!(!early_stopping.update(0.55));
        assert!(early_stopping.update(0.6));
        assert_eq!(early_stopping.best(), Some(0.6));
    }

    #[test]
    fn improvement_resets_patience() {
        let mut early_stopping = EarlyStopping::max("valid_acc", 2, 0.0);

        assert!(!early_stopping.update(0.5));
        assert!(!early_stopping.update(0.4));
        assert!(!early_stopping.update(0.6));
        assert!(!early_stopping.update(0.6));
        assert!(early_stopping.update(0.6));
    }

    #[test]
    fn min_delta_requires_meaningful_improvement() {
        let mut early_stopping = EarlyStopping::max("valid_acc", 1, 0.05);

        assert!(!early_stopping.update(0.5));
        // 0.52 is within min_delta of the best, not an improvement
        assert!(early_stopping.update(0.52));
    }
}
