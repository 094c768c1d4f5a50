// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
// Key Burn insight:
//   - Training runs on Autodiff<Backend> for gradients
//   - model.valid() returns the model on the inner backend
//     (no autodiff overhead, batch norm in inference mode)
//   - The batcher is backend-agnostic, so the same CaptchaBatcher
//     feeds both loaders; only the batch type differs
//
// Device selection follows --max-gpus:
//   0     → NdArray on the CPU
//   1+    → Wgpu on the default GPU adapter
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use std::sync::Arc;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{CaptchaBatch, CaptchaBatcher},
    dataset::CaptchaDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::evaluator::{accuracy_name, loss_name, PositionAccuracy};
use crate::ml::model::CaptchaModel;

type CpuBackend = burn::backend::Autodiff<burn::backend::NdArray>;
type GpuBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

// ─── TrainingResult ───────────────────────────────────────────────────────────
/// Per-epoch metrics of a finished run.
#[derive(Debug, Clone, Default)]
pub struct TrainingResult {
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingResult {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Training loss of the final epoch
    pub fn train_loss(&self) -> Option<f64> {
        self.last().map(|m| m.train_loss)
    }

    /// Validation loss of the final epoch
    pub fn validate_loss(&self) -> Option<f64> {
        self.last().map(|m| m.validate_loss)
    }

    /// Mean per-position validation accuracy of the final epoch
    pub fn accuracy(&self) -> Option<f64> {
        self.last().map(EpochMetrics::accuracy)
    }

    /// Epoch with the lowest validation loss
    pub fn best_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().fold(None, |best: Option<&EpochMetrics>, m| match best {
            Some(b) if !m.is_improvement(b.validate_loss) => Some(b),
            _ => Some(m),
        })
    }
}

pub fn run_training(
    cfg:          &TrainConfig,
    train:        CaptchaDataset,
    validate:     CaptchaDataset,
    checkpoints:  &CheckpointManager,
    metrics:      &MetricsLogger,
) -> Result<TrainingResult> {
    ensure!(
        train.sample_count() > 0,
        "the training set is empty, add labelled images under '{}/train'",
        cfg.data_dir
    );

    if cfg.max_gpus == 0 {
        let device = burn::backend::ndarray::NdArrayDevice::Cpu;
        tracing::info!("Using CPU device: {:?}", device);
        train_loop::<CpuBackend>(cfg, train, validate, checkpoints, metrics, device)
    } else {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        train_loop::<GpuBackend>(cfg, train, validate, checkpoints, metrics, device)
    }
}

fn train_loop<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    train:        CaptchaDataset,
    validate:     CaptchaDataset,
    checkpoints:  &CheckpointManager,
    metrics:      &MetricsLogger,
    device:       B::Device,
) -> Result<TrainingResult> {
    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = cfg.model_config();
    let mut model: CaptchaModel<B> = model_cfg.init(&device)?;
    let positions = model_cfg.positions;
    tracing::info!(
        "Model ready: ResNet-{} (base filters {}), {} positions x {} options",
        model_cfg.num_layers,
        model_cfg.base_filters,
        positions,
        model_cfg.options
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    // Epochs stop after num_iterations() batches, the loaders hold every sample
    let train_iters = train.num_iterations();
    let val_iters   = validate.num_iterations();

    let train_loader = build_loader::<B>(train, cfg.seed, &device);
    // Validation runs on the inner backend, no autodiff overhead
    let val_loader   = build_loader::<B::InnerBackend>(validate, cfg.seed.wrapping_add(1), &device);

    tracing::info!(
        "Training {} epochs: {} train / {} validation iterations per epoch",
        cfg.epochs,
        train_iters,
        val_iters
    );

    let mut result = TrainingResult::default();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum  = 0.0f64;
        let mut component_sums  = vec![0.0f64; positions];
        let mut train_batches   = 0usize;
        let mut train_acc       = PositionAccuracy::new(positions);

        for batch in train_loader.iter().take(train_iters) {
            let batch: CaptchaBatch<B> = batch;
            let (loss, output) = model.forward_loss(batch.images, &batch.labels)?;

            train_loss_sum += loss.total.clone().into_scalar().elem::<f64>();
            for (sum, (_, component)) in component_sums.iter_mut().zip(&loss.components) {
                *sum += component.clone().into_scalar().elem::<f64>();
            }
            train_acc.update(&output.digits, &batch.labels);
            train_batches += 1;

            // Backward pass + Adam update
            let grads = loss.total.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        if train_batches > 0 {
            let parts: Vec<String> = component_sums
                .iter()
                .enumerate()
                .map(|(i, s)| format!("{}={:.4}", loss_name(i), s / train_batches as f64))
                .collect();
            tracing::debug!("Epoch {} components: {}", epoch, parts.join(", "));
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;
        let mut val_acc      = PositionAccuracy::new(positions);

        for batch in val_loader.iter().take(val_iters) {
            let batch: CaptchaBatch<B::InnerBackend> = batch;
            let (loss, output) = model_valid.forward_loss(batch.images, &batch.labels)?;

            val_loss_sum += loss.total.into_scalar().elem::<f64>();
            val_batches  += 1;
            val_acc.update(&output.digits, &batch.labels);
        }

        if val_acc.samples_seen() == 0 && epoch == 1 {
            tracing::warn!("Validation set is empty, validation metrics will be NaN/0");
        }

        let avg_val_loss = if val_batches > 0 {
            val_loss_sum / val_batches as f64
        } else { f64::NAN };

        let epoch_metrics = EpochMetrics::new(
            epoch,
            avg_train_loss,
            avg_val_loss,
            val_acc.per_position(),
        );

        let per_digit: Vec<String> = epoch_metrics
            .position_acc
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}={:.1}%", accuracy_name(i), a * 100.0))
            .collect();

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.1}% | validate_loss={:.4} | accuracy={:.1}% | {}",
            epoch,
            cfg.epochs,
            avg_train_loss,
            train_acc.overall() * 100.0,
            avg_val_loss,
            epoch_metrics.accuracy() * 100.0,
            per_digit.join(" "),
        );

        if let Some(best) = result.best_epoch() {
            if epoch_metrics.is_improvement(best.validate_loss) {
                tracing::info!(
                    "Validation loss improved: {:.4} → {:.4}",
                    best.validate_loss,
                    epoch_metrics.validate_loss
                );
            }
        }

        metrics.log(&epoch_metrics)?;
        checkpoints.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);

        result.epochs.push(epoch_metrics);
    }

    tracing::info!("Training complete!");
    Ok(result)
}

/// Loader over the whole dataset, reshuffled on every pass when
/// the dataset samples randomly.
fn build_loader<B: Backend>(
    dataset: CaptchaDataset,
    seed:    u64,
    device:  &B::Device,
) -> Arc<dyn DataLoader<B, CaptchaBatch<B>>> {
    let sampling = dataset.sampling();
    let builder  = DataLoaderBuilder::new(CaptchaBatcher::new())
        .batch_size(sampling.batch_size)
        .num_workers(1)
        .set_device(device.clone());

    if sampling.random {
        builder.shuffle(seed).build(dataset)
    } else {
        builder.build(dataset)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::captcha::{CaptchaLabel, CaptchaSample};
    use crate::domain::usage::Usage;

    fn metrics(epoch: usize, validate_loss: f64) -> EpochMetrics {
        EpochMetrics::new(epoch, 1.0, validate_loss, vec![0.5; 5])
    }

    #[test]
    fn test_result_accessors() {
        let result = TrainingResult {
            epochs: vec![metrics(1, 3.0), metrics(2, 2.0), metrics(3, 2.5)],
        };
        assert_eq!(result.validate_loss(), Some(2.5));
        assert_eq!(result.train_loss(), Some(1.0));
        assert_eq!(result.accuracy(), Some(0.5));
        assert_eq!(result.best_epoch().map(|m| m.epoch), Some(2));
    }

    #[test]
    fn test_empty_result() {
        let result = TrainingResult::default();
        assert!(result.accuracy().is_none());
        assert!(result.best_epoch().is_none());
    }

    fn dataset(usage: Usage, samples: Vec<CaptchaSample>) -> CaptchaDataset {
        CaptchaDataset::builder()
            .usage(usage)
            .sampling(2, true)
            .build()
            .unwrap()
            .with_samples(samples)
    }

    #[test]
    fn test_capped_epochs_draw_from_whole_dataset() {
        use crate::domain::captcha::{IMAGE_HEIGHT, IMAGE_WIDTH};
        use std::collections::BTreeSet;

        type TestBackend = burn::backend::NdArray;

        // Sorted labels 00000, 00001, ... 00049
        let samples: Vec<CaptchaSample> = (0..50)
            .map(|i| CaptchaSample {
                pixels: vec![0.0; IMAGE_WIDTH * IMAGE_HEIGHT],
                label:  CaptchaLabel::parse(&format!("{i:05}")).unwrap(),
            })
            .collect();
        let train = CaptchaDataset::builder()
            .sampling(2, true)
            .max_iteration(Some(1))
            .build()
            .unwrap()
            .with_samples(samples);
        assert_eq!(train.num_iterations(), 1);

        let device = Default::default();
        let loader = build_loader::<TestBackend>(train, 42, &device);

        let mut seen = BTreeSet::new();
        for _ in 0..10 {
            for batch in loader.iter().take(1) {
                let labels: Vec<i64> = batch.labels.into_data().convert::<i64>().to_vec().unwrap();
                for row in labels.chunks(5) {
                    seen.insert(row.iter().map(|d| d.to_string()).collect::<String>());
                }
            }
        }

        let lowest: BTreeSet<String> = ["00000".to_string(), "00001".to_string()].into();
        assert_ne!(seen, lowest);
        assert!(seen.len() >= 2);
    }

    #[test]
    fn test_empty_training_set_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = TrainConfig { max_gpus: 0, ..TrainConfig::default() };
        let ckpt = CheckpointManager::new(dir.path(), "captcha").unwrap();
        let log  = MetricsLogger::new(dir.path(), 5).unwrap();

        let err = run_training(
            &cfg,
            dataset(Usage::Train, Vec::new()),
            dataset(Usage::Validation, Vec::new()),
            &ckpt,
            &log,
        )
        .unwrap_err();
        assert!(err.to_string().contains("training set is empty"));
    }

    #[test]
    fn test_one_epoch_on_cpu_writes_checkpoint_and_metrics() {
        use crate::domain::captcha::{IMAGE_HEIGHT, IMAGE_WIDTH};

        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            epochs:       1,
            batch_size:   2,
            max_gpus:     0,
            num_layers:   18,
            base_filters: 4,
            output_dir:   dir.path().display().to_string(),
            ..TrainConfig::default()
        };
        let ckpt = CheckpointManager::new(dir.path(), "captcha").unwrap();
        let log  = MetricsLogger::new(dir.path(), 5).unwrap();

        let sample = |text: &str, shade: f32| CaptchaSample {
            pixels: vec![shade; IMAGE_WIDTH * IMAGE_HEIGHT],
            label:  CaptchaLabel::parse(text).unwrap(),
        };
        let train = vec![sample("01234", 0.1), sample("56789", 0.9), sample("13579", 0.5)];
        let valid = vec![sample("02468", 0.3)];

        let result = run_training(
            &cfg,
            dataset(Usage::Train, train),
            dataset(Usage::Validation, valid),
            &ckpt,
            &log,
        )
        .unwrap();

        assert_eq!(result.epochs.len(), 1);
        assert!(result.train_loss().unwrap().is_finite());
        assert!(result.validate_loss().unwrap().is_finite());
        assert_eq!(result.last().unwrap().position_acc.len(), 5);
        assert_eq!(ckpt.latest_epoch().unwrap(), 1);

        let csv = std::fs::read_to_string(log.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
