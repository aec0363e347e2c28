//! Running classification metrics.

use crate::common::*;

/// Running accuracy over one phase, updated per batch and reset at
/// epoch boundaries.
#[derive(Debug, Default)]
pub struct Accuracy {
    correct: i64,
    total: i64,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with predicted and true labels of one batch.
    pub fn update(&mut self, predicted: &Tensor, actual: &Tensor) {
        self.correct += i64::from(&predicted.eq_tensor(actual).count_nonzero(0));
        self.total += actual.numel() as i64;
    }

    pub fn compute(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn accumulates_over_batches() {
        let mut accuracy = Accuracy::new();

        accuracy.update(
            &Tensor::of_slice(&[1i64, 2, 3, 4]),
            &Tensor::of_slice(&[1i64, 2, 0, 0]),
        );
        assert_abs_diff_eq!(accuracy.compute(), 0.5);

        accuracy.update(
            &Tensor::of_slice(&[5i64, 6]),
            &Tensor::of_slice(&[5i64, 6]),
        );
        assert_abs_diff_eq!(accuracy.compute(), 4.0 / 6.0);

        accuracy.reset();
        assert_abs_diff_eq!(accuracy.compute(), 0.0);
    }
}
