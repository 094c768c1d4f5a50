use anyhow::Result;
use burn::prelude::*;

use crate::ml::backbone::{ResNetV1, ResNetV1Config};
use crate::ml::evaluator::{CompositeLoss, LossOutput};
use crate::ml::splitter::OutputSplitter;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct CaptchaModelConfig {
    pub num_layers:   usize,
    pub base_filters: usize,
    pub positions:    usize,
    pub options:      usize,
    #[config(default = 1)]
    pub channels:     usize,
    #[config(default = 60)]
    pub image_height: usize,
    #[config(default = 160)]
    pub image_width:  usize,
}

impl CaptchaModelConfig {
    /// The backbone's output width is derived from positions * options,
    /// so the splitter's width invariant holds by construction.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<CaptchaModel<B>> {
        let splitter = OutputSplitter::new(self.positions, self.options)?;
        let backbone = ResNetV1Config::new(
            self.num_layers,
            [self.channels, self.image_height, self.image_width],
            splitter.output_width(),
        )
        .with_base_filters(self.base_filters)
        .init(device)?;

        Ok(CaptchaModel {
            backbone,
            positions: self.positions,
            options:   self.options,
        })
    }
}

#[derive(Module, Debug)]
pub struct CaptchaModel<B: Backend> {
    pub backbone:  ResNetV1<B>,
    pub positions: usize,
    pub options:   usize,
}

/// One logit tensor per label position, each [batch, options]
pub struct CaptchaOutput<B: Backend> {
    pub digits: Vec<Tensor<B, 2>>,
}

impl<B: Backend> CaptchaModel<B> {
    pub fn splitter(&self) -> Result<OutputSplitter> {
        OutputSplitter::new(self.positions, self.options)
    }

    /// images: [batch, 1, H, W] → positions × [batch, options]
    pub fn forward(&self, images: Tensor<B, 4>) -> Result<CaptchaOutput<B>> {
        let combined = self.backbone.forward(images); // [batch, positions * options]
        let digits   = self.splitter()?.split(combined)?;
        Ok(CaptchaOutput { digits })
    }

    /// Forward pass plus the composite per-position loss.
    pub fn forward_loss(
        &self,
        images: Tensor<B, 4>,
        labels: &Tensor<B, 2, Int>,
    ) -> Result<(LossOutput<B>, CaptchaOutput<B>)> {
        let output = self.forward(images)?;
        let loss   = CompositeLoss::new(self.positions).forward(&output.digits, labels);
        Ok((loss, output))
    }
}
