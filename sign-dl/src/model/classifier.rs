use crate::{common::*, metrics::Accuracy};

/// The output of the step shared by all phases.
#[derive(Debug)]
pub struct StepOutput {
    pub loss: Tensor,
    pub actual: Tensor,
    pub predicted: Tensor,
}

/// The classifier wrapper defining the per-phase steps over a backbone
/// network.
#[derive(Debug)]
pub struct Classifier<M>
where
    M: nn::ModuleT,
{
    model: M,
    learning_rate: f64,
    pub train_acc: Accuracy,
    pub valid_acc: Accuracy,
    pub test_acc: Accuracy,
}

impl<M> Classifier<M>
where
    M: nn::ModuleT,
{
    pub fn new(model: M, learning_rate: f64) -> Self {
        Self {
            model,
            learning_rate,
            train_acc: Accuracy::new(),
            valid_acc: Accuracy::new(),
            test_acc: Accuracy::new(),
        }
    }

    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        self.model.forward_t(input, train)
    }

    fn shared_step(&self, images: &Tensor, labels: &Tensor, train: bool) -> StepOutput {
        let logits = self.forward_t(images, train);
        let loss = logits.cross_entropy_for_logits(labels);
        let (_, predicted) = logits.max_dim(1, false);

        StepOutput {
            loss,
            actual: labels.shallow_clone(),
            predicted,
        }
    }

    /// Returns the train-mode loss for backpropagation. Predictions for
    /// the running train accuracy are recomputed in eval mode under
    /// no_grad, so dropout and batch-norm noise do not reach the metric.
    pub fn training_step(&mut self, images: &Tensor, labels: &Tensor) -> Tensor {
        let StepOutput { loss, .. } = self.shared_step(images, labels, true);

        tch::no_grad(|| {
            let StepOutput {
                actual, predicted, ..
            } = self.shared_step(images, labels, false);
            self.train_acc.update(&predicted, &actual);
        });

        loss
    }

    /// Eval-mode loss, with the running validation accuracy updated.
    pub fn validation_step(&mut self, images: &Tensor, labels: &Tensor) -> Tensor {
        let StepOutput {
            loss,
            actual,
            predicted,
        } = self.shared_step(images, labels, false);
        self.valid_acc.update(&predicted, &actual);
        loss
    }

    /// Accuracy only; no loss is tracked for the test phase.
    pub fn test_step(&mut self, images: &Tensor, labels: &Tensor) {
        let StepOutput {
            actual, predicted, ..
        } = self.shared_step(images, labels, false);
        self.test_acc.update(&predicted, &actual);
    }

    /// A single Adam optimizer over all wrapped parameters at the fixed
    /// learning rate; no schedule.
    pub fn configure_optimizer(&self, vs: &nn::VarStore) -> Result<nn::Optimizer> {
        let optimizer = nn::Adam::default().build(vs, self.learning_rate)?;
        Ok(optimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A linear stand-in backbone keeps the step tests fast.
    fn linear_classifier(vs: &nn::VarStore, num_classes: i64) -> Classifier<impl nn::ModuleT> {
        let linear = nn::linear(&vs.root() / "fc", 4, num_classes, Default::default());
        Classifier::new(linear, 0.01)
    }

    #[test]
    fn training_step_produces_finite_loss_and_updates_accuracy() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut classifier = linear_classifier(&vs, 3);

        let images = Tensor::rand(&[8, 4], (Kind::Float, Device::Cpu));
        let labels = Tensor::zeros(&[8], (Kind::Int64, Device::Cpu));

        let loss = classifier.training_step(&images, &labels);
        assert!(f64::from(&loss).is_finite());
        assert!(loss.requires_grad());
        // one batch of 8 samples went through the train metric
        assert!(classifier.train_acc.compute() >= 0.0);

        Ok(())
    }

    #[test]
    fn optimizer_reduces_loss() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut classifier = linear_classifier(&vs, 2);
        let mut optimizer = classifier.configure_optimizer(&vs)?;
        optimizer.set_lr(0.1);

        let images = Tensor::rand(&[16, 4], (Kind::Float, Device::Cpu));
        let labels = Tensor::randint(2, &[16], (Kind::Int64, Device::Cpu));

        let initial = f64::from(&classifier.training_step(&images, &labels));
        for _ in 0..200 {
            let loss = classifier.training_step(&images, &labels);
            optimizer.backward_step(&loss);
        }
        let trained = f64::from(&classifier.training_step(&images, &labels));
        ensure!(trained < initial, "the loss does not decrease");

        Ok(())
    }

    #[test]
    fn validation_and_test_steps_track_separate_metrics() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut classifier = linear_classifier(&vs, 3);

        let images = Tensor::rand(&[4, 4], (Kind::Float, Device::Cpu));
        let labels = Tensor::zeros(&[4], (Kind::Int64, Device::Cpu));

        let loss = tch::no_grad(|| classifier.validation_step(&images, &labels));
        assert!(f64::from(&loss).is_finite());
        tch::no_grad(|| classifier.test_step(&images, &labels));

        assert_in_unit_interval(classifier.valid_acc.compute());
        assert_in_unit_interval(classifier.test_acc.compute());

        Ok(())
    }

    fn assert_in_unit_interval(value: f64) {
        assert!((0.0..=1.0).contains(&value));
    }
}
