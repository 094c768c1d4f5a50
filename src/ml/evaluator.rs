// ============================================================
// Layer 5 - Losses and Evaluators
// ============================================================
// Every label position is its own 10-way classification, so
// both the loss and the accuracy are computed per position and
// then combined:
//
//   loss     = Σ_i  CE(logits_i, labels[:, i])     (loss_digit_i)
//   accuracy = mean_i  acc(logits_i, labels[:, i]) (acc_digit_i)
//
// Reference: Burn Book §5 (Training)

use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

/// Name of the loss component for one position
pub fn loss_name(position: usize) -> String {
    format!("loss_digit_{position}")
}

/// Name of the accuracy evaluator for one position
pub fn accuracy_name(position: usize) -> String {
    format!("acc_digit_{position}")
}

/// Column `position` of the [N, P] label tensor, as [N]
fn label_column<B: Backend>(labels: &Tensor<B, 2, Int>, position: usize) -> Tensor<B, 1, Int> {
    let [batch_size, _] = labels.dims();
    labels
        .clone()
        .slice([0..batch_size, position..position + 1])
        .reshape([batch_size])
}

// ─── CompositeLoss ────────────────────────────────────────────────────────────
/// Sum of one softmax cross-entropy loss per position.
#[derive(Debug, Clone)]
pub struct CompositeLoss {
    positions: usize,
}

/// The total loss plus each named component, for logging
pub struct LossOutput<B: Backend> {
    pub total:      Tensor<B, 1>,
    pub components: Vec<(String, Tensor<B, 1>)>,
}

impl CompositeLoss {
    pub fn new(positions: usize) -> Self {
        Self { positions }
    }

    /// logits: P tensors of [N, O]; labels: [N, P]
    pub fn forward<B: Backend>(
        &self,
        logits: &[Tensor<B, 2>],
        labels: &Tensor<B, 2, Int>,
    ) -> LossOutput<B> {
        debug_assert_eq!(logits.len(), self.positions);
        let ce = CrossEntropyLossConfig::new().init(&labels.device());

        let components: Vec<(String, Tensor<B, 1>)> = logits
            .iter()
            .enumerate()
            .map(|(i, l)| (loss_name(i), ce.forward(l.clone(), label_column(labels, i))))
            .collect();

        let total = components
            .iter()
            .map(|(_, loss)| loss.clone())
            .reduce(|acc, loss| acc + loss)
            .unwrap_or_else(|| Tensor::zeros([1], &labels.device()));

        LossOutput { total, components }
    }
}

// ─── PositionAccuracy ─────────────────────────────────────────────────────────
/// Running correct/total counts for every position.
#[derive(Debug, Clone)]
pub struct PositionAccuracy {
    correct: Vec<usize>,
    total:   usize,
}

impl PositionAccuracy {
    pub fn new(positions: usize) -> Self {
        Self { correct: vec![0; positions], total: 0 }
    }

    /// Add one batch: logits are P tensors of [N, O], labels [N, P]
    pub fn update<B: Backend>(&mut self, logits: &[Tensor<B, 2>], labels: &Tensor<B, 2, Int>) {
        let [batch_size, _] = labels.dims();

        for (i, l) in logits.iter().enumerate() {
            // argmax(1) returns shape [batch, 1], flatten to [batch]
            let predicted = l.clone().argmax(1).flatten::<1>(0, 1);
            let hits: i64 = predicted
                .equal(label_column(labels, i))
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>();
            self.correct[i] += hits as usize;
        }
        self.total += batch_size;
    }

    /// Accuracy per position, 0.0 when nothing has been seen
    pub fn per_position(&self) -> Vec<f64> {
        self.correct
            .iter()
            .map(|&c| if self.total > 0 { c as f64 / self.total as f64 } else { 0.0 })
            .collect()
    }

    /// Mean of the per-position accuracies
    pub fn overall(&self) -> f64 {
        let per = self.per_position();
        if per.is_empty() {
            0.0
        } else {
            per.iter().sum::<f64>() / per.len() as f64
        }
    }

    pub fn samples_seen(&self) -> usize {
        self.total
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn logits(values: Vec<f32>, n: usize, o: usize) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(values, [n, o]), &Default::default())
    }

    fn labels(values: Vec<i64>, n: usize, p: usize) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(values, [n, p]), &Default::default())
    }

    #[test]
    fn test_names() {
        assert_eq!(loss_name(3), "loss_digit_3");
        assert_eq!(accuracy_name(0), "acc_digit_0");
    }

    #[test]
    fn test_accuracy_counts_per_position() {
        // 2 samples, 2 positions, 3 options
        // position 0 predicts [2, 0]; position 1 predicts [1, 1]
        let p0 = logits(vec![0.0, 0.0, 5.0, 5.0, 0.0, 0.0], 2, 3);
        let p1 = logits(vec![0.0, 5.0, 0.0, 0.0, 5.0, 0.0], 2, 3);
        // truth: sample 0 = [2, 1], sample 1 = [1, 2]
        let y  = labels(vec![2, 1, 1, 2], 2, 2);

        let mut acc = PositionAccuracy::new(2);
        acc.update(&[p0, p1], &y);

        assert_eq!(acc.samples_seen(), 2);
        assert_eq!(acc.per_position(), vec![0.5, 0.5]);
        assert!((acc.overall() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_accuracy_is_zero() {
        let acc = PositionAccuracy::new(5);
        assert_eq!(acc.per_position(), vec![0.0; 5]);
        assert_eq!(acc.overall(), 0.0);
    }

    #[test]
    fn test_composite_loss_is_sum_of_components() {
        let p0 = logits(vec![1.0, 2.0, 0.5, 0.1], 2, 2);
        let p1 = logits(vec![0.3, 0.3, 2.0, -1.0], 2, 2);
        let y  = labels(vec![0, 1, 1, 0], 2, 2);

        let out = CompositeLoss::new(2).forward(&[p0, p1], &y);
        assert_eq!(out.components.len(), 2);
        assert_eq!(out.components[1].0, "loss_digit_1");

        let total: f32 = out.total.into_scalar().elem();
        let sum: f32 = out.components
            .into_iter()
            .map(|(_, l)| l.into_scalar().elem::<f32>())
            .sum();
        assert!((total - sum).abs() < 1e-5);
        assert!(total > 0.0);
    }
}
