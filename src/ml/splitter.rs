// ============================================================
// Layer 5 - Output Splitter
// ============================================================
// The backbone produces ONE output row per image, of width
// positions * options. The loss and the evaluators need one
// independent logit tensor per label position instead.
//
//   [N, P*O]  ──reshape──▶  [N, P, O]
//             ──chunk(P, dim 1)──▶  P × [N, 1, O]
//             ──squeeze dim 1──▶    P × [N, O]
//
// Output i holds columns i*O .. (i+1)*O of the input, so the
// order of the Vec is the order of the label positions.
//
// merge() is the exact inverse and exists so the round-trip
// law can be stated (and tested) in code.

use anyhow::{bail, ensure, Result};
use burn::prelude::*;

/// Reshape-split-squeeze pipeline from one combined output
/// to per-position predictions. Pure and stateless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSplitter {
    positions: usize,
    options:   usize,
}

impl OutputSplitter {
    pub fn new(positions: usize, options: usize) -> Result<Self> {
        ensure!(positions > 0, "output splitter needs at least one position");
        ensure!(options > 0, "output splitter needs at least one option per position");
        Ok(Self { positions, options })
    }

    /// Width the combined output must have: positions * options
    pub fn output_width(&self) -> usize {
        self.positions * self.options
    }

    /// Split [N, P*O] into P tensors of shape [N, O].
    pub fn split<B: Backend>(&self, output: Tensor<B, 2>) -> Result<Vec<Tensor<B, 2>>> {
        let [batch_size, width] = output.dims();
        if width != self.output_width() {
            bail!(
                "shape mismatch: output width is {} but {} positions x {} options needs {}",
                width,
                self.positions,
                self.options,
                self.output_width()
            );
        }

        let parts = output
            .reshape([batch_size, self.positions, self.options])
            .chunk(self.positions, 1)
            .into_iter()
            .map(|part| part.reshape([batch_size, self.options]))
            .collect();

        Ok(parts)
    }

    /// Inverse of split: stack P tensors of [N, O] back into [N, P*O].
    pub fn merge<B: Backend>(&self, parts: Vec<Tensor<B, 2>>) -> Result<Tensor<B, 2>> {
        ensure!(
            parts.len() == self.positions,
            "expected {} position tensors, got {}",
            self.positions,
            parts.len()
        );

        let [batch_size, _] = parts[0].dims();
        if let Some(bad) = parts.iter().find(|p| p.dims() != [batch_size, self.options]) {
            bail!(
                "shape mismatch: position tensor is {:?}, expected [{}, {}]",
                bad.dims(),
                batch_size,
                self.options
            );
        }

        let stacked: Tensor<B, 3> = Tensor::stack(parts, 1);
        Ok(stacked.reshape([batch_size, self.output_width()]))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    /// [n, width] tensor filled with 0, 1, 2, ... in row-major order
    fn counting(n: usize, width: usize) -> Tensor<TestBackend, 2> {
        let values: Vec<f32> = (0..n * width).map(|v| v as f32).collect();
        Tensor::from_data(TensorData::new(values, [n, width]), &Default::default())
    }

    fn values(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_captcha_scenario_shapes() {
        // N=4, P=5, O=10 → input [4, 50] → 5 tensors of [4, 10]
        let splitter = OutputSplitter::new(5, 10).unwrap();
        let parts    = splitter.split(counting(4, 50)).unwrap();

        assert_eq!(parts.len(), 5);
        for part in &parts {
            assert_eq!(part.dims(), [4, 10]);
        }
    }

    #[test]
    fn test_order_preserved() {
        let (n, p, o) = (3, 4, 6);
        let splitter  = OutputSplitter::new(p, o).unwrap();
        let input     = counting(n, p * o);
        let parts     = splitter.split(input.clone()).unwrap();

        for (i, part) in parts.into_iter().enumerate() {
            let expected = input.clone().slice([0..n, i * o..(i + 1) * o]);
            assert_eq!(values(part), values(expected), "position {i}");
        }
    }

    #[test]
    fn test_round_trip() {
        let splitter = OutputSplitter::new(5, 10).unwrap();
        let input    = counting(2, 50);
        let parts    = splitter.split(input.clone()).unwrap();
        let merged   = splitter.merge(parts).unwrap();

        assert_eq!(merged.dims(), [2, 50]);
        assert_eq!(values(merged), values(input));
    }

    #[test]
    fn test_single_position_is_identity() {
        let splitter = OutputSplitter::new(1, 7).unwrap();
        let input    = counting(3, 7);
        let parts    = splitter.split(input.clone()).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].dims(), [3, 7]);
        assert_eq!(values(parts[0].clone()), values(input));
    }

    #[test]
    fn test_width_mismatch_is_error() {
        let splitter = OutputSplitter::new(5, 10).unwrap();
        let err      = splitter.split(counting(4, 49)).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_merge_rejects_wrong_count() {
        let splitter = OutputSplitter::new(3, 2).unwrap();
        let parts    = vec![counting(1, 2), counting(1, 2)];
        assert!(splitter.merge(parts).is_err());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(OutputSplitter::new(0, 10).is_err());
        assert!(OutputSplitter::new(5, 0).is_err());
    }
}
