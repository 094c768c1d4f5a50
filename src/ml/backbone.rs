// ============================================================
// Layer 5 - ResNet v1 Backbone
// ============================================================
// He et al. (2016) residual network, v1 ordering
// (conv → batch norm → relu, addition before the final relu).
//
// Depth selects the unit type and how many units each of the
// four stages holds:
//
//   layers │ unit        │ units per stage
//   ───────┼─────────────┼────────────────
//     18   │ basic       │ 2, 2, 2, 2
//     34   │ basic       │ 3, 4, 6, 3
//     50   │ bottleneck  │ 3, 4, 6, 3
//    101   │ bottleneck  │ 3, 4, 23, 3
//    152   │ bottleneck  │ 3, 8, 36, 3
//
// A basic unit is two 3x3 convs. A bottleneck unit squeezes the
// channels to a quarter with a 1x1 conv, runs a 3x3 conv, and
// expands back with another 1x1 conv.
//
// Images taller than 32 px get the ImageNet stem (7x7 stride 2
// conv plus 3x3 max pool). Small images keep full resolution
// with a single 3x3 conv.
//
// Reference: Burn Book §3 (Building Blocks)
//            He et al. (2016) Deep Residual Learning

use anyhow::{bail, ensure, Result};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig,
        Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Images at or below this height skip the downsampling stem
const SMALL_IMAGE_HEIGHT: usize = 32;

#[derive(Config, Debug)]
pub struct ResNetV1Config {
    /// Network depth: 18, 34, 50, 101 or 152
    pub num_layers:   usize,
    /// [channels, height, width] of one input image
    pub image_shape:  [usize; 3],
    /// Width of the final linear layer
    pub out_size:     usize,
    /// Filters of the first stage; later stages scale from it
    #[config(default = 64)]
    pub base_filters: usize,
}

impl ResNetV1Config {
    /// Units per stage and whether the units are bottlenecks
    fn layout(&self) -> Result<([usize; 4], bool)> {
        let layout = match self.num_layers {
            18  => ([2, 2, 2, 2], false),
            34  => ([3, 4, 6, 3], false),
            50  => ([3, 4, 6, 3], true),
            101 => ([3, 4, 23, 3], true),
            152 => ([3, 8, 36, 3], true),
            n   => bail!("unsupported ResNet depth {n}, expected one of 18, 34, 50, 101, 152"),
        };
        Ok(layout)
    }

    /// Channels after the stem and after each of the four stages
    fn filters(&self, bottleneck: bool) -> [usize; 5] {
        let b = self.base_filters;
        if bottleneck {
            [b, 4 * b, 8 * b, 16 * b, 32 * b]
        } else {
            [b, b, 2 * b, 4 * b, 8 * b]
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResNetV1<B>> {
        ensure!(self.out_size > 0, "ResNet output size must be greater than zero");
        ensure!(self.base_filters >= 4, "ResNet base filters must be at least 4");
        let (units, bottleneck) = self.layout()?;
        let filters = self.filters(bottleneck);
        let [channels, height, _] = self.image_shape;

        let stem = if height <= SMALL_IMAGE_HEIGHT {
            Stem {
                conv: conv(channels, filters[0], 3, 1, device),
                norm: None,
                pool: None,
            }
        } else {
            Stem {
                conv: conv(channels, filters[0], 7, 2, device),
                norm: Some(BatchNormConfig::new(filters[0]).init(device)),
                pool: Some(
                    MaxPool2dConfig::new([3, 3])
                        .with_strides([2, 2])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .init(),
                ),
            }
        };

        let mut stages = Vec::with_capacity(units.iter().sum());
        for (i, &count) in units.iter().enumerate() {
            let stride = if i == 0 { 1 } else { 2 };
            let (in_ch, out_ch) = (filters[i], filters[i + 1]);
            stages.push(ResidualUnit::new(in_ch, out_ch, stride, false, bottleneck, device));
            for _ in 1..count {
                stages.push(ResidualUnit::new(out_ch, out_ch, 1, true, bottleneck, device));
            }
        }

        tracing::debug!(
            "ResNet-{}: {} residual units, {} output features",
            self.num_layers,
            stages.len(),
            self.out_size
        );

        Ok(ResNetV1 {
            stem,
            units: stages,
            pool:  AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head:  LinearConfig::new(filters[4], self.out_size).init(device),
            relu:  Relu::new(),
        })
    }
}

/// Conv with "same" padding for odd kernels and no bias (batch norm follows)
fn conv<B: Backend>(
    in_ch:  usize,
    out_ch: usize,
    kernel: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    let pad = kernel / 2;
    Conv2dConfig::new([in_ch, out_ch], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(pad, pad))
        .with_bias(false)
        .init(device)
}

// ─── Stem ─────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv: Conv2d<B>,
    norm: Option<BatchNorm<B>>,
    pool: Option<MaxPool2d>,
}

// ─── Residual Unit ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ResidualUnit<B: Backend> {
    conv1:    Conv2d<B>,
    norm1:    BatchNorm<B>,
    conv2:    Conv2d<B>,
    norm2:    BatchNorm<B>,
    /// Third conv of a bottleneck unit, absent in basic units
    conv3:    Option<Conv2d<B>>,
    norm3:    Option<BatchNorm<B>>,
    /// 1x1 projection used when the unit changes shape
    proj:     Option<Conv2d<B>>,
    proj_norm: Option<BatchNorm<B>>,
    relu:     Relu,
}

impl<B: Backend> ResidualUnit<B> {
    fn new(
        in_ch:      usize,
        out_ch:     usize,
        stride:     usize,
        dim_match:  bool,
        bottleneck: bool,
        device:     &B::Device,
    ) -> Self {
        let (conv1, conv2, conv3, norm3, mid) = if bottleneck {
            let mid = out_ch / 4;
            (
                conv(in_ch, mid, 1, stride, device),
                conv(mid, mid, 3, 1, device),
                Some(conv(mid, out_ch, 1, 1, device)),
                Some(BatchNormConfig::new(out_ch).init(device)),
                mid,
            )
        } else {
            (
                conv(in_ch, out_ch, 3, stride, device),
                conv(out_ch, out_ch, 3, 1, device),
                None,
                None,
                out_ch,
            )
        };

        let (proj, proj_norm) = if dim_match {
            (None, None)
        } else {
            (
                Some(conv(in_ch, out_ch, 1, stride, device)),
                Some(BatchNormConfig::new(out_ch).init(device)),
            )
        };

        Self {
            conv1,
            norm1: BatchNormConfig::new(mid).init(device),
            conv2,
            norm2: BatchNormConfig::new(mid).init(device),
            conv3,
            norm3,
            proj,
            proj_norm,
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = match (&self.proj, &self.proj_norm) {
            (Some(proj), Some(norm)) => norm.forward(proj.forward(x.clone())),
            _ => x.clone(),
        };

        let y = self.relu.forward(self.norm1.forward(self.conv1.forward(x)));
        let y = self.norm2.forward(self.conv2.forward(y));
        let y = match (&self.conv3, &self.norm3) {
            (Some(conv3), Some(norm3)) => norm3.forward(conv3.forward(self.relu.forward(y))),
            _ => y,
        };

        self.relu.forward(y + shortcut)
    }
}

// ─── ResNetV1 ─────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ResNetV1<B: Backend> {
    pub stem:  Stem<B>,
    pub units: Vec<ResidualUnit<B>>,
    pub pool:  AdaptiveAvgPool2d,
    pub head:  Linear<B>,
    pub relu:  Relu,
}

impl<B: Backend> ResNetV1<B> {
    /// images: [batch, channels, height, width] → [batch, out_size]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.stem.conv.forward(images);
        if let Some(norm) = &self.stem.norm {
            x = self.relu.forward(norm.forward(x));
        }
        if let Some(pool) = &self.stem.pool {
            x = pool.forward(x);
        }

        for unit in &self.units {
            x = unit.forward(x);
        }

        // Global average pool leaves [batch, channels, 1, 1]
        let x: Tensor<B, 2> = self.pool.forward(x).flatten(1, 3);
        self.head.forward(x)
    }
}
